use crate::ApnsConfig;
use crate::store::{Counters, FeedbackStore, deliver_feedback};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    ClientStats, FeedbackEntry, FeedbackSender, Payload, PushClient, PushError, PushInitConfig,
    StartMode,
};
use log::*;
use reqwest::{Client, Identity, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const RETRY_BACKOFF_MS: u64 = 200;

/// 基于 APNs HTTP/2 provider API 的推送客户端
pub struct OnlineApnsClient {
    config: ApnsConfig,
    http_client: Client,
    store: Arc<FeedbackStore>,
    feedback_tx: FeedbackSender,
    counters: Counters,
    closed: AtomicBool,
}

impl OnlineApnsClient {
    pub fn new(config: ApnsConfig, feedback_tx: FeedbackSender) -> Result<Self, PushError> {
        let cert_path = config.cert_path().ok_or_else(|| {
            PushError::ConfigError("online mode requires a certificate".to_string())
        })?;
        let pem = std::fs::read(cert_path).map_err(|e| {
            PushError::ConfigError(format!("failed to read certificate {cert_path}: {e}"))
        })?;
        let identity = Identity::from_pem(&pem).map_err(|e| PushError::AuthError(e.to_string()))?;
        let http_client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(Duration::from_secs(config.timeout()))
            .build()
            .map_err(|e| PushError::ConfigError(e.to_string()))?;
        Ok(Self::with_client(config, http_client, feedback_tx))
    }

    /// 使用已构建好的 HTTP 客户端
    pub(crate) fn with_client(
        config: ApnsConfig,
        http_client: Client,
        feedback_tx: FeedbackSender,
    ) -> Self {
        info!(
            "{}|ONLINE CLIENT|{}|retry {}",
            config.platform_name(),
            config.push_url(),
            config.retry_count()
        );
        Self {
            store: Arc::new(FeedbackStore::new(config.storage_capacity)),
            config,
            http_client,
            feedback_tx,
            counters: Counters::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// 发送一条通知，可重试的失败最多重试 retry_count 次
    async fn send_notification(
        &self,
        token: &str,
        payload: &Payload,
        expiration: i64,
    ) -> Result<(), PushError> {
        if self.closed.load(Ordering::Acquire) {
            self.counters.record_failed();
            return Err(PushError::PlatformError("client is shut down".to_string()));
        }

        let url = format!("{}/3/device/{}", self.config.push_url(), token);
        let mut attempt = 0;
        loop {
            match self.send_once(&url, token, payload, expiration).await {
                Ok(()) => {
                    self.counters.record_sent();
                    return Ok(());
                }
                Err(SendFailure::Retryable(e)) if attempt < self.config.retry_count() => {
                    attempt += 1;
                    self.counters.record_retry();
                    warn!("OnlineApnsClient|RETRY|{}|{}|{}", attempt, token, e);
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                Err(SendFailure::Retryable(e)) | Err(SendFailure::Terminal(e)) => {
                    self.counters.record_failed();
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        token: &str,
        payload: &Payload,
        expiration: i64,
    ) -> Result<(), SendFailure> {
        let mut request = self
            .http_client
            .post(url)
            .header("apns-expiration", expiration.to_string())
            .header("apns-push-type", "alert")
            .json(payload);
        if let Some(topic) = &self.config.topic {
            request = request.header("apns-topic", topic);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SendFailure::Retryable(PushError::NetworkError(e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let error: ApnsErrorBody = serde_json::from_str(&text).unwrap_or(ApnsErrorBody {
            reason: text,
            timestamp: None,
        });

        if is_unreachable(status, &error.reason) {
            let timestamp = error
                .timestamp
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .unwrap_or_else(Utc::now);
            self.store.record(FeedbackEntry {
                device_token: token.to_string(),
                timestamp,
            });
        }

        Err(classify(status, &error.reason))
    }
}

#[async_trait]
impl PushClient for OnlineApnsClient {
    async fn send_simple(&self, token: &str, payload: &Payload) -> Result<(), PushError> {
        self.send_notification(token, payload, 0).await
    }

    async fn send_enhanced(
        &self,
        expiry_secs: u32,
        token: &str,
        payload: &Payload,
    ) -> Result<(), PushError> {
        let expiration = Utc::now().timestamp() + i64::from(expiry_secs);
        self.send_notification(token, payload, expiration).await
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
        self.counters.snapshot(StartMode::Online, self.store.len())
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        info!("OnlineApnsClient|SHUTDOWN");
    }
}

#[derive(Debug)]
enum SendFailure {
    Retryable(PushError),
    Terminal(PushError),
}

#[derive(Deserialize)]
struct ApnsErrorBody {
    reason: String,
    timestamp: Option<i64>,
}

/// 设备不可达，需要进入 feedback
fn is_unreachable(status: StatusCode, reason: &str) -> bool {
    status == StatusCode::GONE || reason == "BadDeviceToken" || reason == "Unregistered"
}

fn classify(status: StatusCode, reason: &str) -> SendFailure {
    let message = format!("APNs Error: status={}, reason={}", status, reason);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SendFailure::Retryable(PushError::PlatformError(message))
    } else if status == StatusCode::FORBIDDEN {
        SendFailure::Terminal(PushError::AuthError(message))
    } else {
        SendFailure::Terminal(PushError::PlatformError(message))
    }
}
