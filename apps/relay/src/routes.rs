//! HTTP and WebSocket surface
//!
//! - `GET /datahub` upgrades to a WebSocket that receives an `update` event per snapshot
//! - `POST /api/updatedata` republishes a JSON snapshot through the hub
//! - `GET /api/current`, `GET /api/stats`, `GET /api/test`

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::time;
use tracing::{debug, info, warn};

use relay_ingest_core::Snapshot;

use crate::session::AppSession;

/// Longest a single frame may wait on a client before the client is dropped.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub fn router(session: AppSession) -> Router {
    Router::new()
        .route("/datahub", get(datahub))
        .route("/api/test", get(api_test))
        .route("/api/current", get(current))
        .route("/api/stats", get(stats))
        .route("/api/updatedata", post(update_data))
        .with_state(session)
}

/// Push event envelope.
#[derive(Serialize)]
struct PushEvent<'a> {
    event: &'static str,
    data: &'a Snapshot,
}

fn update_frame(snapshot: &Snapshot) -> serde_json::Result<Message> {
    let text = serde_json::to_string(&PushEvent { event: "update", data: snapshot })?;
    Ok(Message::Text(text.into()))
}

async fn datahub(ws: WebSocketUpgrade, State(app): State<AppSession>) -> Response {
    ws.on_upgrade(move |socket| stream_updates(socket, app))
}

async fn stream_updates(socket: WebSocket, app: AppSession) {
    let (handle, mut updates) = app.hub.subscribe();
    let (mut sink, mut incoming) = socket.split();
    debug!(id = handle.id(), "push client connected");

    let mut connected = match app.current() {
        Some(snapshot) => push(&mut sink, &snapshot, SEND_TIMEOUT).await,
        None => true,
    };

    while connected {
        tokio::select! {
            update = updates.recv() => {
                let Some(snapshot) = update else {
                    debug!(id = handle.id(), "push client fell behind, disconnecting");
                    break;
                };
                connected = push(&mut sink, &snapshot, SEND_TIMEOUT).await;
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    app.hub.unsubscribe(handle);
    let _ = sink.close().await;
    debug!(id = handle.id(), "push client disconnected");
}

/// Send one update frame. Returns false once the client can no longer be written to,
/// either because the socket failed or because it did not accept the frame in time.
async fn push<S>(sink: &mut S, snapshot: &Snapshot, within: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    let frame = match update_frame(snapshot) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "skipping unserializable snapshot");
            return true;
        }
    };
    match time::timeout(within, sink.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(_)) => false,
        Err(_) => {
            warn!(timeout_ms = within.as_millis() as u64, "push client stalled, disconnecting");
            false
        }
    }
}

async fn api_test() -> &'static str {
    "hello!"
}

async fn current(State(app): State<AppSession>) -> Response {
    match app.current() {
        Some(snapshot) => Json(Snapshot::clone(&snapshot)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn update_data(State(app): State<AppSession>, Json(snapshot): Json<Snapshot>) -> StatusCode {
    let delivered = app.hub.publish(Arc::new(snapshot));
    info!(delivered, "received update data");
    StatusCode::ACCEPTED
}

#[derive(Debug, Serialize)]
struct StatsView {
    subscribers: usize,
    published: u64,
    delivered: u64,
    dropped_subscribers: u64,
    ingest: Option<IngestView>,
}

#[derive(Debug, Serialize)]
struct IngestView {
    datagrams: u64,
    malformed: u64,
    published: u64,
}

async fn stats(State(app): State<AppSession>) -> Json<StatsView> {
    let hub = app.hub.stats();
    let ingest = app.ingest_stats.as_ref().map(|s| IngestView {
        datagrams: s.datagrams.load(Ordering::Relaxed),
        malformed: s.malformed.load(Ordering::Relaxed),
        published: s.published.load(Ordering::Relaxed),
    });
    Json(StatsView {
        subscribers: hub.subscriber_count,
        published: hub.published,
        delivered: hub.delivered,
        dropped_subscribers: hub.dropped_subscribers,
        ingest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SnapshotHub;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use http_body_util::BodyExt;
    use relay_ingest_fh::{FhConfig, IngestService};
    use serde_json::{json, Value};
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<SnapshotHub>) {
        let hub = Arc::new(SnapshotHub::default());
        (router(AppSession::new(Arc::clone(&hub))), hub)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_endpoint_says_hello() {
        let (app, _) = app();
        let request = Request::builder().uri("/api/test").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello!");
    }

    #[tokio::test]
    async fn update_data_is_republished_to_subscribers() {
        let (app, hub) = app();
        let (_h, mut rx) = hub.subscribe();

        let mut body = serde_json::to_value(Snapshot::default()).unwrap();
        body["Vehicle"]["ID"] = json!(77);
        body["Speed"] = json!(12.5);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/updatedata")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let got = rx.try_recv().unwrap();
        assert_eq!(got.vehicle.id, 77);
        assert_eq!(got.speed, 12.5);
    }

    #[tokio::test]
    async fn malformed_update_is_rejected_and_not_published() {
        let (app, hub) = app();
        let (_h, mut rx) = hub.subscribe();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/updatedata")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"Vehicle": "nope"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.stats().published, 0);
    }

    #[tokio::test]
    async fn current_is_empty_without_ingest() {
        let (app, _) = app();
        let request = Request::builder().uri("/api/current").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn stats_report_hub_counters() {
        let (app, hub) = app();
        let (_h, _rx) = hub.subscribe();
        hub.publish(Arc::new(Snapshot::default()));

        let request = Request::builder().uri("/api/stats").body(Body::empty()).unwrap();
        let v = body_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(v["subscribers"], json!(1));
        assert_eq!(v["published"], json!(1));
        assert_eq!(v["delivered"], json!(1));
        assert_eq!(v["ingest"], Value::Null);
    }

    #[tokio::test]
    async fn push_gives_up_on_a_stalled_client() {
        let s = Snapshot::default();
        assert!(push(&mut futures::sink::drain(), &s, Duration::from_millis(50)).await);

        // receiver is held but never read, so the channel stops accepting frames
        let (mut stalled, _rx) = futures::channel::mpsc::channel::<Message>(0);
        let started = std::time::Instant::now();
        let mut accepted = Vec::new();
        for _ in 0..3 {
            accepted.push(push(&mut stalled, &s, Duration::from_millis(50)).await);
        }
        assert_eq!(accepted.last(), Some(&false));
        assert!(started.elapsed() < Duration::from_secs(2));

        let (mut gone, rx) = futures::channel::mpsc::channel::<Message>(1);
        drop(rx);
        assert!(!push(&mut gone, &s, Duration::from_millis(50)).await);
    }

    async fn next_event<S>(ws: &mut S) -> Value
    where
        S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("no frame within 5s")
                .expect("socket closed")
                .unwrap();
            if msg.is_text() {
                return serde_json::from_str(msg.to_text().unwrap()).unwrap();
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn push_channel_sends_current_state_then_each_update() {
        // live ingest so the client has a retained vehicle to receive on connect
        let ingest = IngestService::bind(FhConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let udp_addr = ingest.local_addr().unwrap();
        let state = ingest.current_state();
        let hub = Arc::new(SnapshotHub::default());
        let session = AppSession::new(Arc::clone(&hub)).with_ingest(state.clone(), ingest.stats());
        let (tx, _rx) = relay_ingest_core::channel();
        let _listener = ingest.start(tx);

        let mut datagram = vec![0u8; 311];
        datagram[212..216].copy_from_slice(&7i32.to_le_bytes());
        let udp = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        udp.send_to(&datagram, udp_addr).await.unwrap();
        let deadline = time::Instant::now() + Duration::from_secs(5);
        while state.load().is_none() && time::Instant::now() < deadline {
            time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.load().is_some());

        let http = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_addr = http.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(http, router(session)).await });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{http_addr}/datahub"))
            .await
            .unwrap();

        let first = next_event(&mut ws).await;
        assert_eq!(first["event"], json!("update"));
        assert_eq!(first["data"]["Vehicle"]["ID"], json!(7));
        assert_eq!(hub.subscriber_count(), 1);

        for id in [11, 12] {
            let mut s = Snapshot::default();
            s.vehicle.id = id;
            assert_eq!(hub.publish(Arc::new(s)), 1);
        }
        for id in [11, 12] {
            let v = next_event(&mut ws).await;
            assert_eq!(v["event"], json!("update"));
            assert_eq!(v["data"]["Vehicle"]["ID"], json!(id));
        }

        ws.close(None).await.unwrap();
        let deadline = time::Instant::now() + Duration::from_secs(5);
        while hub.subscriber_count() > 0 && time::Instant::now() < deadline {
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn update_frame_is_named_event_with_snapshot() {
        let mut s = Snapshot::default();
        s.vehicle.id = 5;
        let Message::Text(text) = update_frame(&s).unwrap() else {
            panic!("expected a text frame");
        };
        let v: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(v["event"], json!("update"));
        assert_eq!(v["data"]["Vehicle"]["ID"], json!(5));
    }
}
