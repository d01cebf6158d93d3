use crate::api::{ApiResponse, PushForm};
use crate::decode::{decode_payload, parse_or};
use crate::error::GatewayError;
use common::{Payload, PushClient};
use futures::FutureExt;
use log::*;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

/// 通知格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyFormat {
    /// 无过期时间
    Simple,
    /// 带过期时间，可能产生 feedback
    Enhanced,
}

impl FromStr for NotifyFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(NotifyFormat::Simple),
            "enhanced" => Ok(NotifyFormat::Enhanced),
            other => Err(GatewayError::InvalidNotifyFormat(other.to_string())),
        }
    }
}

/// 推送分发：校验、选择发送方式、调用客户端并把结果转成响应
pub struct Dispatcher {
    client: Arc<dyn PushClient>,
    default_expiry: u32,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn PushClient>, default_expiry: u32) -> Self {
        Self {
            client,
            default_expiry,
        }
    }

    /// 过期秒数，缺省或无法解析时使用配置的默认值
    pub fn resolve_expiry(&self, raw: &str) -> u32 {
        parse_or(raw, self.default_expiry)
    }

    /// 处理一个推送请求，只尝试发送一次
    pub async fn dispatch(&self, form: &PushForm) -> ApiResponse {
        let (token, payload) = match decode_payload(form) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Dispatcher|dispatch|FAIL|{}|{}", e, form.trace);
                return e.into();
            }
        };

        let expiry = self.resolve_expiry(&form.expired_seconds);
        match self.send(&form.pt, &token, &payload, expiry, &form.trace).await {
            Ok(()) => {
                debug!(
                    "Dispatcher|dispatch|SUCC|FORMAT:{}|{}|{}",
                    form.pt, payload, form.trace
                );
                ApiResponse::success()
            }
            Err(e) => e.into(),
        }
    }

    async fn send(
        &self,
        pt: &str,
        token: &str,
        payload: &Payload,
        expiry: u32,
        trace: &str,
    ) -> Result<(), GatewayError> {
        let format: NotifyFormat = pt.parse()?;

        let send = async {
            match format {
                NotifyFormat::Simple => self.client.send_simple(token, payload).await,
                NotifyFormat::Enhanced => {
                    self.client.send_enhanced(expiry, token, payload).await
                }
            }
        };

        match AssertUnwindSafe(send).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(
                    "Dispatcher|send|FORMAT:{}|FAIL|{}|{}|{}",
                    pt, payload, e, trace
                );
                Err(GatewayError::SendOverTry(e))
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!(
                    "Dispatcher|send|FORMAT:{}|PANIC|{}|{}|{}",
                    pt, msg, payload, trace
                );
                Err(GatewayError::ClientFault(msg))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}
