use crate::store::{Counters, FeedbackStore, deliver_feedback};
use crate::{ApnsConfig, is_device_token};
use async_trait::async_trait;
use common::{
    ClientStats, FeedbackEntry, FeedbackSender, Payload, PushClient, PushError, PushInitConfig,
    StartMode,
};
use log::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 模拟后端的推送客户端
///
/// 所有发送都会成功；非法的设备 token 会被记为 feedback，模拟设备不可达。
pub struct MockApnsClient {
    store: Arc<FeedbackStore>,
    feedback_tx: FeedbackSender,
    counters: Counters,
    closed: AtomicBool,
}

impl MockApnsClient {
    pub fn new(config: ApnsConfig, feedback_tx: FeedbackSender) -> Self {
        info!("{}|MOCK CLIENT|capacity {}", config.platform_name(), config.storage_capacity);
        Self {
            store: Arc::new(FeedbackStore::new(config.storage_capacity)),
            feedback_tx,
            counters: Counters::default(),
            closed: AtomicBool::new(false),
        }
    }

    fn accept(&self, token: &str, payload: &Payload, expiry: Option<u32>) -> Result<(), PushError> {
        if self.closed.load(Ordering::Acquire) {
            self.counters.record_failed();
            return Err(PushError::PlatformError("client is shut down".to_string()));
        }
        if !is_device_token(token) {
            self.store.record(FeedbackEntry::new(token));
        }
        self.counters.record_sent();
        debug!("MockApnsClient|SEND|{}|{:?}|{}", token, expiry, payload);
        Ok(())
    }
}

#[async_trait]
impl PushClient for MockApnsClient {
    async fn send_simple(&self, token: &str, payload: &Payload) -> Result<(), PushError> {
        self.accept(token, payload, None)
    }

    async fn send_enhanced(
        &self,
        expiry_secs: u32,
        token: &str,
        payload: &Payload,
    ) -> Result<(), PushError> {
        self.accept(token, payload, Some(expiry_secs))
    }

    async fn fetch_feedback(&self, limit: usize) -> Result<(), PushError> {
        if self.feedback_tx.is_closed() {
            return Err(PushError::PlatformError("feedback channel closed".to_string()));
        }
        let entries = self.store.take(limit);
        let tx = self.feedback_tx.clone();
        tokio::spawn(async move {
            deliver_feedback(&tx, entries, limit).await;
        });
        Ok(())
    }

    fn monitor(&self) -> ClientStats {
        self.counters.snapshot(StartMode::Mock, self.store.len())
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        info!("MockApnsClient|SHUTDOWN");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::feedback_channel;

    fn client(capacity: usize) -> (MockApnsClient, common::FeedbackReceiver) {
        let (tx, rx) = feedback_channel(capacity);
        (MockApnsClient::new(ApnsConfig::default(), tx), rx)
    }

    #[tokio::test]
    async fn test_send_counts() {
        let (client, _rx) = client(8);
        let payload = Payload::builder().alert("hi").build();

        client.send_simple(&"ab".repeat(32), &payload).await.unwrap();
        client.send_enhanced(60, &"cd".repeat(32), &payload).await.unwrap();

        let stats = client.monitor();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.feedback_pending, 0);
    }

    #[tokio::test]
    async fn test_bad_token_becomes_feedback() {
        let (client, mut rx) = client(8);
        let payload = Payload::builder().alert("hi").build();
        client.send_enhanced(60, "bad1", &payload).await.unwrap();
        client.send_enhanced(60, "bad2", &payload).await.unwrap();
        assert_eq!(client.monitor().feedback_pending, 2);

        client.fetch_feedback(5).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap().device_token, "bad1");
        assert_eq!(rx.recv().await.unwrap().unwrap().device_token, "bad2");
        assert_eq!(rx.recv().await.unwrap(), None);
        assert_eq!(client.monitor().feedback_pending, 0);
    }

    #[tokio::test]
    async fn test_fetch_with_nothing_pending() {
        let (client, mut rx) = client(8);
        client.fetch_feedback(3).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_after_channel_closed() {
        let (client, rx) = client(8);
        drop(rx);
        assert!(client.fetch_feedback(3).await.is_err());
    }

    #[tokio::test]
    async fn test_send_after_shutdown() {
        let (client, _rx) = client(8);
        client.shutdown().await;
        let payload = Payload::builder().alert("hi").build();
        assert!(client.send_simple(&"ab".repeat(32), &payload).await.is_err());
        assert_eq!(client.monitor().failed, 1);
    }
}
