use common::{
    ClientFactory, ClientRegistry, FeedbackSender, PushClient, PushError, PushInitConfig,
    StartMode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

mod mock;
mod online;
mod store;

pub use mock::MockApnsClient;
pub use online::OnlineApnsClient;
pub use store::{Counters, FeedbackStore, deliver_feedback};

const PLATFORM_NAME: &str = "apns";
pub const DEFAULT_PUSH_ADDR: &str = "https://api.push.apple.com";

/// APNs 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApnsConfig {
    #[serde(default = "default_push_addr")]
    pub push_addr: String,
    /// PEM 格式的证书和私钥
    #[serde(default)]
    pub cert_path: Option<String>,
    /// apns-topic，通常为 bundle id
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// 客户端内部 feedback 暂存容量
    #[serde(default = "default_storage_capacity")]
    pub storage_capacity: usize,
}

fn default_push_addr() -> String {
    DEFAULT_PUSH_ADDR.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_storage_capacity() -> usize {
    1000
}

impl Default for ApnsConfig {
    fn default() -> Self {
        Self {
            push_addr: default_push_addr(),
            cert_path: None,
            topic: None,
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            storage_capacity: default_storage_capacity(),
        }
    }
}

impl PushInitConfig for ApnsConfig {
    fn platform_name(&self) -> &str {
        PLATFORM_NAME
    }

    fn push_url(&self) -> String {
        self.push_addr.trim_end_matches('/').to_string()
    }

    fn cert_path(&self) -> Option<&str> {
        self.cert_path.as_deref()
    }

    fn timeout(&self) -> u64 {
        self.timeout_secs
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

/// 是否是 64 位十六进制的设备 token
pub fn is_device_token(token: &str) -> bool {
    token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_config(config: Value) -> Result<ApnsConfig, PushError> {
    serde_json::from_value(config).map_err(|e| PushError::ConfigError(e.to_string()))
}

// --- Client Factories ---

pub struct MockClientFactory;

impl ClientFactory for MockClientFactory {
    fn create(
        &self,
        config: Value,
        feedback_tx: FeedbackSender,
    ) -> Result<Arc<dyn PushClient>, PushError> {
        let config = parse_config(config)?;
        Ok(Arc::new(MockApnsClient::new(config, feedback_tx)))
    }

    fn mode(&self) -> StartMode {
        StartMode::Mock
    }
}

pub struct OnlineClientFactory;

impl ClientFactory for OnlineClientFactory {
    fn create(
        &self,
        config: Value,
        feedback_tx: FeedbackSender,
    ) -> Result<Arc<dyn PushClient>, PushError> {
        let config = parse_config(config)?;
        Ok(Arc::new(OnlineApnsClient::new(config, feedback_tx)?))
    }

    fn mode(&self) -> StartMode {
        StartMode::Online
    }
}

/// 注册了全部客户端工厂的注册表
pub fn default_registry() -> ClientRegistry {
    let mut registry = ClientRegistry::new();
    registry.register(Box::new(MockClientFactory));
    registry.register(Box::new(OnlineClientFactory));
    registry
}
