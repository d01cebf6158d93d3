use crate::api::Status;
use common::{PayloadError, PushError};

/// 网关错误类型，每一种都对应一个非成功的状态码
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid protocol: {0}")]
    InvalidProto(String),

    #[error("Notification params are invalid: {0}")]
    ArgumentsInvalid(&'static str),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Invalid notification format {0}")]
    InvalidNotifyFormat(String),

    #[error("Send notification failed: {0}")]
    SendOverTry(#[source] PushError),

    #[error("Push client fault: {0}")]
    ClientFault(String),

    #[error("Fetch feedback over limit {max}: requested {requested}")]
    FetchFeedbackOverLimit { requested: i64, max: usize },

    #[error("Fetch feedback failed: {0}")]
    FetchFeedback(#[source] PushError),
}

impl GatewayError {
    pub fn status(&self) -> Status {
        match self {
            GatewayError::InvalidProto(_) => Status::InvalidProto,
            GatewayError::ArgumentsInvalid(_) => Status::ArgumentsInvalid,
            GatewayError::Payload(PayloadError::Decode(_)) => Status::PayloadDecodeError,
            GatewayError::Payload(PayloadError::DeepNesting(_)) => Status::PayloadDeepNesting,
            GatewayError::InvalidNotifyFormat(_) => Status::InvalidNotifyFormat,
            GatewayError::SendOverTry(_) => Status::SendOverTryError,
            GatewayError::ClientFault(_) | GatewayError::FetchFeedback(_) => Status::Error,
            GatewayError::FetchFeedbackOverLimit { .. } => Status::FetchFeedbackOverLimit,
        }
    }
}
