use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

mod payload;

pub use payload::{Aps, Payload, PayloadBuilder, PayloadError, normalize_token};

/// 推送客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Platform error: {0}")]
    PlatformError(String),
}

/// 后端报告的一条投递失败记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// 设备 token
    pub device_token: String,
    /// 失败时间
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEntry {
    pub fn new(device_token: impl Into<String>) -> Self {
        Self {
            device_token: device_token.into(),
            timestamp: Utc::now(),
        }
    }
}

/// feedback 通道中的元素，`None` 表示本批次没有更多记录
pub type FeedbackItem = Option<FeedbackEntry>;
pub type FeedbackSender = mpsc::Sender<FeedbackItem>;
pub type FeedbackReceiver = mpsc::Receiver<FeedbackItem>;

/// 创建进程内共享的 feedback 通道
pub fn feedback_channel(capacity: usize) -> (FeedbackSender, FeedbackReceiver) {
    mpsc::channel(capacity.max(1))
}

/// 客户端启动模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    /// 连接真实的推送后端
    Online,
    /// 模拟后端
    Mock,
}

/// 客户端监控快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientStats {
    pub mode: StartMode,
    /// 发送成功次数
    pub sent: u64,
    /// 发送失败次数
    pub failed: u64,
    /// 重试次数
    pub retried: u64,
    /// 尚未被拉取的 feedback 数量
    pub feedback_pending: usize,
    pub timestamp: DateTime<Utc>,
}

/// 初始化配置trait
pub trait PushInitConfig: Send + Sync {
    /// 获取平台名称
    fn platform_name(&self) -> &str;

    /// 获取推送地址
    fn push_url(&self) -> String;

    /// 获取证书路径
    fn cert_path(&self) -> Option<&str>;

    /// 获取超时时间（秒）
    fn timeout(&self) -> u64;

    /// 获取重试次数
    fn retry_count(&self) -> u32;
}

/// 推送客户端trait（用于dyn兼容）
///
/// 实现者自行负责连接、重试和 feedback 的获取，可被多个请求并发调用。
#[async_trait]
pub trait PushClient: Send + Sync {
    /// 简单格式发送，无过期时间
    async fn send_simple(&self, token: &str, payload: &Payload) -> Result<(), PushError>;

    /// 增强格式发送，携带过期秒数
    async fn send_enhanced(
        &self,
        expiry_secs: u32,
        token: &str,
        payload: &Payload,
    ) -> Result<(), PushError>;

    /// 异步拉取最多 `limit` 条 feedback 到共享通道
    ///
    /// 少于 `limit` 条时必须在最后写入 `None`；恰好 `limit` 条时不写。
    async fn fetch_feedback(&self, limit: usize) -> Result<(), PushError>;

    /// 获取监控快照
    fn monitor(&self) -> ClientStats;

    /// 关闭客户端
    async fn shutdown(&self);
}

/// 客户端工厂trait
pub trait ClientFactory: Send + Sync {
    /// 根据JSON Value创建客户端实例
    fn create(
        &self,
        config: Value,
        feedback_tx: FeedbackSender,
    ) -> Result<Arc<dyn PushClient>, PushError>;

    /// 对应的启动模式
    fn mode(&self) -> StartMode;
}

/// 客户端注册表
#[derive(Default)]
pub struct ClientRegistry {
    factories: HashMap<StartMode, Box<dyn ClientFactory>>,
}

impl ClientRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 注册客户端工厂
    pub fn register(&mut self, factory: Box<dyn ClientFactory>) {
        self.factories.insert(factory.mode(), factory);
    }

    /// 获取客户端工厂
    pub fn get_factory(&self, mode: StartMode) -> Option<&dyn ClientFactory> {
        self.factories.get(&mode).map(|f| f.as_ref())
    }

    /// 获取所有支持的启动模式
    pub fn list_modes(&self) -> Vec<StartMode> {
        self.factories.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopFactory;

    impl ClientFactory for NoopFactory {
        fn create(
            &self,
            _config: Value,
            _feedback_tx: FeedbackSender,
        ) -> Result<Arc<dyn PushClient>, PushError> {
            Err(PushError::ConfigError("noop".to_string()))
        }

        fn mode(&self) -> StartMode {
            StartMode::Mock
        }
    }

    #[test]
    fn test_client_registry() {
        let mut registry = ClientRegistry::new();
        assert!(registry.list_modes().is_empty());

        registry.register(Box::new(NoopFactory));
        assert_eq!(registry.list_modes(), vec![StartMode::Mock]);
        assert!(registry.get_factory(StartMode::Mock).is_some());
        assert!(registry.get_factory(StartMode::Online).is_none());
    }

    #[test]
    fn test_start_mode_serde() {
        assert_eq!(serde_json::to_string(&StartMode::Online).unwrap(), "\"online\"");
        let mode: StartMode = serde_json::from_str("\"mock\"").unwrap();
        assert_eq!(mode, StartMode::Mock);
    }

    #[test]
    fn test_feedback_entry_json() {
        let entry = FeedbackEntry::new("abc123");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["device_token"], "abc123");
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_feedback_channel_fifo() {
        let (tx, mut rx) = feedback_channel(4);
        tx.send(Some(FeedbackEntry::new("a"))).await.unwrap();
        tx.send(Some(FeedbackEntry::new("b"))).await.unwrap();
        tx.send(None).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap().device_token, "a");
        assert_eq!(rx.recv().await.unwrap().unwrap().device_token, "b");
        assert_eq!(rx.recv().await.unwrap(), None);
    }
}
