mod config;
mod logging;
mod presence;
mod routes;
mod session;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use config::Cli;
use presence::{spawn_presence, LogPresence};
use relay_ingest_core::channel;
use relay_ingest_fh::IngestService;
use session::{spawn_pump, AppSession, SnapshotHub};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format)?;

    let hub = Arc::new(SnapshotHub::new(cli.hub_config()));
    let mut session = AppSession::new(Arc::clone(&hub));

    let (tx, rx) = channel();
    let _pump = spawn_pump(rx, Arc::clone(&hub)).context("spawn snapshot pump")?;

    // The one and only ingestion service. Without it the hub still serves HTTP updates.
    match IngestService::bind(cli.fh_config()).await {
        Ok(service) => {
            session = session.with_ingest(service.current_state(), service.stats());
            spawn_presence(service.current_state(), Arc::new(LogPresence), cli.presence_interval());

            let listener = service.start(tx);
            tokio::spawn(async move {
                match listener.await {
                    Ok(Ok(())) => warn!("telemetry listener exited"),
                    Ok(Err(e)) => error!("telemetry listener stopped: {:#}", anyhow::Error::new(e)),
                    Err(e) => error!(error = %e, "telemetry listener task failed"),
                }
            });
        }
        Err(e) => {
            error!("live telemetry disabled: {:#}", anyhow::Error::new(e));
            drop(tx);
        }
    }

    let http = tokio::net::TcpListener::bind(&cli.http_bind)
        .await
        .with_context(|| format!("bind {}", cli.http_bind))?;
    info!(addr = %cli.http_bind, "serving push channel on /datahub");

    axum::serve(http, routes::router(session))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
