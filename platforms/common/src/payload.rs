use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// 通知内容错误类型
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload body decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("deep payload body: value of `{0}` is nested")]
    DeepNesting(String),
}

/// aps 字典
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<i32>,
}

/// 一条通知的内容
///
/// 构建之后只允许追加 extras，且 extras 的值只能是标量
/// (字符串、数字、布尔、null)。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    aps: Aps,
    extras: Map<String, Value>,
}

impl Payload {
    pub fn builder() -> PayloadBuilder {
        PayloadBuilder::default()
    }

    pub fn alert(&self) -> Option<&str> {
        self.aps.alert.as_deref()
    }

    pub fn sound(&self) -> Option<&str> {
        self.aps.sound.as_deref()
    }

    pub fn badge(&self) -> Option<i32> {
        self.aps.badge
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// 追加一个扩展字段
    pub fn add_ext_param(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), PayloadError> {
        let key = key.into();
        if value.is_object() || value.is_array() {
            return Err(PayloadError::DeepNesting(key));
        }
        self.extras.insert(key, value);
        Ok(())
    }

    /// 把一个 JSON 对象字符串的顶层字段合并进 extras
    ///
    /// 遇到嵌套值立即中止，之前已合并的字段保留。
    pub fn merge_ext_args(&mut self, raw: &str) -> Result<(), PayloadError> {
        let args: Map<String, Value> = serde_json::from_str(raw).map_err(PayloadError::Decode)?;
        for (key, value) in args {
            self.add_ext_param(key, value)?;
        }
        Ok(())
    }

    /// APNs 格式的 JSON：`{"aps": {...}, <extras>}`
    pub fn to_json(&self) -> Value {
        let mut root = self.extras.clone();
        // aps is reserved; an ext param with the same key never overrides it
        root.insert(
            "aps".to_string(),
            serde_json::to_value(&self.aps).unwrap_or_default(),
        );
        Value::Object(root)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// 通知内容构建器
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    aps: Aps,
}

impl PayloadBuilder {
    /// 设置提示文字
    pub fn alert(mut self, alert: impl Into<String>) -> Self {
        self.aps.alert = Some(alert.into());
        self
    }

    /// 设置声音
    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    /// 设置角标
    pub fn badge(mut self, badge: i32) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    /// 构建通知内容
    pub fn build(self) -> Payload {
        Payload {
            aps: self.aps,
            extras: Map::new(),
        }
    }
}

/// 规范化设备 token：只保留字母、数字和下划线
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
