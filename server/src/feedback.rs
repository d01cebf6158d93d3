use crate::error::GatewayError;
use common::{FeedbackEntry, FeedbackReceiver, PushClient};
use log::*;
use std::num::IntErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// 单次最多拉取的 feedback 条数
pub const MAX_FEEDBACK_LIMIT: usize = 100;

/// feedback 拉取协调器，持有共享通道的接收端
///
/// 通道在整个进程内共享，接收端每次只锁一条记录，
/// 并发的拉取请求会按到达顺序瓜分同一批记录，记录与请求之间没有关联。
pub struct FeedbackDrain {
    client: Arc<dyn PushClient>,
    rx: Mutex<FeedbackReceiver>,
    /// 每次接收的等待上限，`None` 时一直等到结束标记
    ///
    /// 超时后生产者迟到的记录和结束标记仍留在共享通道里，
    /// 下一次拉取会先收到它们，并可能被这个旧的结束标记提前截断。
    recv_timeout: Option<Duration>,
}

impl FeedbackDrain {
    pub fn new(
        client: Arc<dyn PushClient>,
        rx: FeedbackReceiver,
        recv_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            rx: Mutex::new(rx),
            recv_timeout,
        }
    }

    /// 解析 limit，无法解析时为 0，负数按 0 处理
    ///
    /// 超出 i64 范围的正整数同样视为超过上限。
    pub fn parse_limit(raw: &str) -> Result<usize, GatewayError> {
        let limit: i64 = match raw.parse() {
            Ok(limit) => limit,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
            Err(_) => 0,
        };
        if limit > MAX_FEEDBACK_LIMIT as i64 {
            return Err(GatewayError::FetchFeedbackOverLimit {
                requested: limit,
                max: MAX_FEEDBACK_LIMIT,
            });
        }
        Ok(limit.max(0) as usize)
    }

    /// 触发客户端拉取，再从通道收集最多 limit 条记录
    pub async fn drain(&self, raw_limit: &str) -> Result<Vec<FeedbackEntry>, GatewayError> {
        let limit = Self::parse_limit(raw_limit)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.client
            .fetch_feedback(limit)
            .await
            .map_err(GatewayError::FetchFeedback)?;

        let mut packet = Vec::with_capacity(limit);
        while packet.len() < limit {
            match self.recv().await {
                Some(entry) => packet.push(entry),
                None => break,
            }
        }
        debug!("FeedbackDrain|drain|SUCC|{}/{}", packet.len(), limit);
        Ok(packet)
    }

    /// 收到结束标记、通道关闭或超时都返回 None
    async fn recv(&self) -> Option<FeedbackEntry> {
        let mut rx = self.rx.lock().await;
        match self.recv_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(item) => item.flatten(),
                Err(_) => {
                    warn!("FeedbackDrain|recv|TIMEOUT|{:?}", timeout);
                    None
                }
            },
            None => rx.recv().await.flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Status;
    use crate::testing::StubClient;
    use common::feedback_channel;

    fn setup(
        build: impl FnOnce(StubClient) -> StubClient,
        recv_timeout: Option<Duration>,
    ) -> (Arc<StubClient>, FeedbackDrain) {
        let (tx, rx) = feedback_channel(1000);
        let client = Arc::new(build(StubClient::new(tx)));
        let drain = FeedbackDrain::new(client.clone(), rx, recv_timeout);
        (client, drain)
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(FeedbackDrain::parse_limit("5").unwrap(), 5);
        assert_eq!(FeedbackDrain::parse_limit("100").unwrap(), 100);
        assert_eq!(FeedbackDrain::parse_limit("").unwrap(), 0);
        assert_eq!(FeedbackDrain::parse_limit("many").unwrap(), 0);
        assert_eq!(FeedbackDrain::parse_limit("-3").unwrap(), 0);
        assert_eq!(FeedbackDrain::parse_limit("-99999999999999999999").unwrap(), 0);

        let err = FeedbackDrain::parse_limit("101").unwrap_err();
        assert_eq!(err.status(), Status::FetchFeedbackOverLimit);
    }

    #[test]
    fn test_parse_limit_overflow_is_over_limit() {
        let err = FeedbackDrain::parse_limit("99999999999999999999").unwrap_err();
        assert_eq!(err.status(), Status::FetchFeedbackOverLimit);
        assert!(matches!(
            err,
            GatewayError::FetchFeedbackOverLimit { requested: i64::MAX, .. }
        ));
    }

    #[actix_web::test]
    async fn test_short_batch() {
        let (client, drain) = setup(|c| c.with_feedback(3), None);
        let packet = drain.drain("5").await.unwrap();
        assert_eq!(packet.len(), 3);
        assert_eq!(packet[0].device_token, "device0");
        assert_eq!(client.fetches(), 1);
    }

    #[actix_web::test]
    async fn test_full_batch_then_next_batch() {
        let (client, drain) = setup(|c| c.with_feedback(2), None);
        assert_eq!(drain.drain("2").await.unwrap().len(), 2);
        assert_eq!(drain.drain("4").await.unwrap().len(), 2);
        assert_eq!(client.fetches(), 2);
    }

    #[actix_web::test]
    async fn test_over_limit_never_fetches() {
        let (client, drain) = setup(|c| c.with_feedback(3), None);
        let err = drain.drain("150").await.unwrap_err();
        assert_eq!(err.status(), Status::FetchFeedbackOverLimit);
        assert_eq!(client.fetches(), 0);
    }

    #[actix_web::test]
    async fn test_zero_limit_drains_nothing() {
        let (client, drain) = setup(|c| c.with_feedback(3), None);
        assert!(drain.drain("abc").await.unwrap().is_empty());
        assert_eq!(client.fetches(), 0);
    }

    #[actix_web::test]
    async fn test_fetch_failure() {
        let (_client, drain) = setup(|c| c.failing_fetch(), None);
        let err = drain.drain("5").await.unwrap_err();
        assert_eq!(err.status(), Status::Error);
        assert!(err.to_string().contains("feedback unavailable"));
    }

    #[actix_web::test]
    async fn test_recv_timeout_ends_batch() {
        let (_client, drain) = setup(|c| c.silent_fetch(), Some(Duration::from_millis(50)));
        assert!(drain.drain("5").await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_late_entries_stay_for_next_drain() {
        let (tx, rx) = feedback_channel(16);
        let client = Arc::new(StubClient::new(tx.clone()).silent_fetch());
        let drain = FeedbackDrain::new(client, rx, Some(Duration::from_millis(50)));

        assert!(drain.drain("5").await.unwrap().is_empty());

        // 上一次拉取超时之后才到达的记录
        tx.send(Some(FeedbackEntry::new("late"))).await.unwrap();
        tx.send(None).await.unwrap();

        let packet = drain.drain("5").await.unwrap();
        assert_eq!(packet.len(), 1);
        assert_eq!(packet[0].device_token, "late");
    }
}
