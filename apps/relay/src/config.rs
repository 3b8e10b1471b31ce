use std::time::Duration;

use clap::{Parser, ValueEnum};
use relay_hub::HubConfig;
use relay_ingest_fh::FhConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Relays live telemetry to dashboard clients
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Local UDP endpoint the simulation sends telemetry to
    #[arg(long, env = "RELAY_UDP_BIND", default_value = "127.0.0.1:9909")]
    pub udp_bind: String,

    /// HTTP / WebSocket listen address
    #[arg(long, env = "RELAY_HTTP_BIND", default_value = "127.0.0.1:5000")]
    pub http_bind: String,

    /// Presence refresh period in milliseconds
    #[arg(long, env = "RELAY_PRESENCE_INTERVAL_MS", default_value_t = 1250)]
    pub presence_interval_ms: u64,

    /// Updates buffered per push client before it is disconnected as too slow
    #[arg(long, env = "RELAY_SUBSCRIBER_QUEUE", default_value_t = 64)]
    pub subscriber_queue: usize,

    /// UDP socket receive buffer size in bytes
    #[arg(long, env = "RELAY_RECV_BUFFER_SIZE", default_value_t = 256 * 1024)]
    pub recv_buffer_size: usize,

    /// Log filter (trace, debug, info, warn, error or a full directive); RUST_LOG wins
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn fh_config(&self) -> FhConfig {
        FhConfig {
            bind_addr: self.udp_bind.clone(),
            recv_buffer_size: self.recv_buffer_size,
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig { queue_capacity: self.subscriber_queue }
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms.max(100))
    }
}
