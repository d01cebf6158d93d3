use apns::{ApnsConfig, DEFAULT_PUSH_ADDR};
use clap::{Parser, ValueEnum};
use common::StartMode;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(version, about = "HTTP gateway for APNs push delivery", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "APNS_GATEWAY_BIND_ADDR", default_value = "127.0.0.1:8888")]
    pub bind_addr: String,

    /// Push backend to use
    #[arg(long, value_enum, env = "APNS_GATEWAY_START_MODE", default_value_t = Mode::Mock)]
    pub start_mode: Mode,

    /// PEM file holding the client certificate and private key (online mode)
    #[arg(long, env = "APNS_GATEWAY_CERT_PATH")]
    pub cert_path: Option<String>,

    /// APNs provider API base URL
    #[arg(long, env = "APNS_GATEWAY_PUSH_ADDR", default_value = DEFAULT_PUSH_ADDR)]
    pub push_addr: String,

    /// apns-topic header, usually the app bundle id
    #[arg(long, env = "APNS_GATEWAY_TOPIC")]
    pub topic: Option<String>,

    /// Default expiry for enhanced notifications in seconds
    #[arg(long, env = "APNS_GATEWAY_EXPIRED_SECONDS", default_value_t = 3600)]
    pub expired_seconds: u32,

    /// Capacity of the shared feedback channel
    #[arg(long, env = "APNS_GATEWAY_FEEDBACK_CAPACITY", default_value_t = 1000)]
    pub feedback_capacity: usize,

    /// Feedback entries kept by the client until fetched
    #[arg(long, env = "APNS_GATEWAY_STORAGE_CAPACITY", default_value_t = 1000)]
    pub storage_capacity: usize,

    /// Per-entry wait when draining feedback, 0 waits forever
    #[arg(long, env = "APNS_GATEWAY_FEEDBACK_RECV_TIMEOUT_SECS", default_value_t = 0)]
    pub feedback_recv_timeout_secs: u64,

    /// Request timeout against the push backend in seconds
    #[arg(long, env = "APNS_GATEWAY_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Retries per notification for transient backend failures
    #[arg(long, env = "APNS_GATEWAY_RETRY_COUNT", default_value_t = 3)]
    pub retry_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Online,
    Mock,
}

impl From<Mode> for StartMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Online => StartMode::Online,
            Mode::Mock => StartMode::Mock,
        }
    }
}

impl Config {
    pub fn apns_config(&self) -> ApnsConfig {
        ApnsConfig {
            push_addr: self.push_addr.clone(),
            cert_path: self.cert_path.clone(),
            topic: self.topic.clone(),
            timeout_secs: self.timeout_secs,
            retry_count: self.retry_count,
            storage_capacity: self.storage_capacity,
        }
    }

    pub fn feedback_recv_timeout(&self) -> Option<Duration> {
        (self.feedback_recv_timeout_secs > 0)
            .then(|| Duration::from_secs(self.feedback_recv_timeout_secs))
    }
}
