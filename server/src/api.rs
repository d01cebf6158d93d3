use crate::error::GatewayError;
use actix_web::HttpResponse;
use common::FeedbackEntry;
use log::*;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

const CONTENT_TYPE: &str = "text/json";

/// 响应状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    InvalidProto,
    ArgumentsInvalid,
    Error,
    PayloadDecodeError,
    PayloadDeepNesting,
    InvalidNotifyFormat,
    SendOverTryError,
    FetchFeedbackOverLimit,
}

impl Status {
    /// 写入响应体的数值
    pub fn code(self) -> u16 {
        match self {
            Status::Success => 200,
            Status::InvalidProto => 201,
            Status::ArgumentsInvalid => 400,
            Status::Error => 500,
            Status::PayloadDecodeError => 505,
            Status::PayloadDeepNesting => 510,
            Status::InvalidNotifyFormat => 511,
            Status::SendOverTryError => 512,
            Status::FetchFeedbackOverLimit => 520,
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

/// 推送请求表单
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushForm {
    /// 设备 token
    pub token: String,
    pub sound: String,
    pub badge: String,
    /// 提示文字
    pub body: String,
    /// 通知格式：simple / enhanced
    pub pt: String,
    #[serde(rename = "expiredSeconds")]
    pub expired_seconds: String,
    /// 扩展参数，一层的 JSON 对象
    #[serde(rename = "extArgs")]
    pub ext_args: String,
    /// 链路追踪 id，仅用于日志
    pub trace: String,
}

impl PushForm {
    /// 由表单键值对构建，同名字段只取第一个值，未知字段忽略
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut fields = Map::new();
        for (key, value) in pairs {
            fields.entry(key).or_insert(Value::String(value));
        }
        serde_json::from_value(Value::Object(fields)).unwrap_or_default()
    }
}

/// feedback 查询参数
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackQuery {
    pub limit: String,
}

/// 统一响应体
///
/// `status` 为 `Success` 时 `error` 一定为空，反之一定不为空。
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<FeedbackEntry>>,
}

impl ApiResponse {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            error: None,
            body: None,
        }
    }

    pub fn with_body(body: Vec<FeedbackEntry>) -> Self {
        Self {
            body: Some(body),
            ..Self::success()
        }
    }

    /// 写成 HTTP 响应，失败也只体现在 JSON 中
    pub fn to_http(&self) -> HttpResponse {
        text_json(self)
    }
}

impl From<GatewayError> for ApiResponse {
    fn from(err: GatewayError) -> Self {
        Self {
            status: err.status(),
            error: Some(err.to_string()),
            body: None,
        }
    }
}

/// 以 `text/json` 写出任意可序列化的值
pub fn text_json<T: Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_string(value) {
        Ok(json) => HttpResponse::Ok().content_type(CONTENT_TYPE).body(json),
        Err(e) => {
            error!("text_json|MARSHAL|FAIL|{}", e);
            let fallback = serde_json::json!({
                "status": Status::Error.code(),
                "error": e.to_string(),
            });
            HttpResponse::Ok()
                .content_type(CONTENT_TYPE)
                .body(fallback.to_string())
        }
    }
}
