use chrono::Utc;
use common::{ClientStats, FeedbackEntry, FeedbackSender, StartMode};
use log::*;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// 客户端内部的 feedback 暂存区，容量满时丢弃最旧的记录
pub struct FeedbackStore {
    entries: Mutex<VecDeque<FeedbackEntry>>,
    capacity: usize,
}

impl FeedbackStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, entry: FeedbackEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            if let Some(dropped) = entries.pop_front() {
                debug!("FeedbackStore|FULL|DROP|{}", dropped.device_token);
            }
        }
        entries.push_back(entry);
    }

    /// 取出最多 `limit` 条记录
    pub fn take(&self, limit: usize) -> Vec<FeedbackEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let n = limit.min(entries.len());
        entries.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 把一批 feedback 写入共享通道，不足 `limit` 条时追加结束标记
pub async fn deliver_feedback(tx: &FeedbackSender, entries: Vec<FeedbackEntry>, limit: usize) {
    let short = entries.len() < limit;
    let count = entries.len();
    for entry in entries {
        if tx.send(Some(entry)).await.is_err() {
            warn!("deliver_feedback|CHANNEL CLOSED|{} entries lost", count);
            return;
        }
    }
    if short && tx.send(None).await.is_err() {
        warn!("deliver_feedback|CHANNEL CLOSED|sentinel lost");
    }
    debug!("deliver_feedback|SUCC|{}/{}", count, limit);
}

/// 发送统计
#[derive(Default)]
pub struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

impl Counters {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, mode: StartMode, feedback_pending: usize) -> ClientStats {
        ClientStats {
            mode,
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            feedback_pending,
            timestamp: Utc::now(),
        }
    }
}
