//! 测试用的推送客户端

use apns::deliver_feedback;
use async_trait::async_trait;
use chrono::Utc;
use common::{
    ClientStats, FeedbackEntry, FeedbackSender, Payload, PushClient, PushError, StartMode,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 发送到这个 token 时客户端会 panic
pub const PANIC_TOKEN: &str = "boom";

pub struct StubClient {
    feedback_tx: FeedbackSender,
    sends: AtomicUsize,
    fetches: AtomicUsize,
    pub last_expiry: Mutex<Option<u32>>,
    reject: bool,
    fail_fetch: bool,
    silent_fetch: bool,
    feedback: usize,
}

impl StubClient {
    pub fn new(feedback_tx: FeedbackSender) -> Self {
        Self {
            feedback_tx,
            sends: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            last_expiry: Mutex::new(None),
            reject: false,
            fail_fetch: false,
            silent_fetch: false,
            feedback: 0,
        }
    }

    /// 所有发送都返回错误
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// 每次拉取时产生 n 条 feedback
    pub fn with_feedback(mut self, n: usize) -> Self {
        self.feedback = n;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// 拉取成功但什么都不产生
    pub fn silent_fetch(mut self) -> Self {
        self.silent_fetch = true;
        self
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn send(&self, token: &str, expiry: Option<u32>) -> Result<(), PushError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        *self.last_expiry.lock().unwrap() = expiry;
        if token == PANIC_TOKEN {
            panic!("simulated client fault");
        }
        if self.reject {
            return Err(PushError::NetworkError("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PushClient for StubClient {
    async fn send_simple(&self, token: &str, _payload: &Payload) -> Result<(), PushError> {
        self.send(token, None)
    }

    async fn send_enhanced(
        &self,
        expiry_secs: u32,
        token: &str,
        _payload: &Payload,
    ) -> Result<(), PushError> {
        self.send(token, Some(expiry_secs))
    }

    async fn fetch_feedback(&self, limit: usize) -> Result<(), PushError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(PushError::PlatformError("feedback unavailable".to_string()));
        }
        if self.silent_fetch {
            return Ok(());
        }
        let entries = (0..self.feedback.min(limit))
            .map(|i| FeedbackEntry::new(format!("device{i}")))
            .collect();
        let tx = self.feedback_tx.clone();
        tokio::spawn(async move {
            deliver_feedback(&tx, entries, limit).await;
        });
        Ok(())
    }

    fn monitor(&self) -> ClientStats {
        ClientStats {
            mode: StartMode::Mock,
            sent: self.sends() as u64,
            failed: 0,
            retried: 0,
            feedback_pending: 0,
            timestamp: Utc::now(),
        }
    }

    async fn shutdown(&self) {}
}
