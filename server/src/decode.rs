use crate::api::PushForm;
use crate::error::GatewayError;
use common::{Payload, normalize_token};
use std::str::FromStr;

/// 不会失败的解析，格式错误或为空时返回默认值
pub fn parse_or<T: FromStr>(raw: &str, default: T) -> T {
    raw.parse().unwrap_or(default)
}

/// 校验表单并构建 (规范化 token, 通知内容)
///
/// 按顺序检查，第一个失败即返回：
/// token 为空、sound/badge/body 全为空、extArgs 不是 JSON 对象、extArgs 有嵌套。
/// badge 解析失败时视为没有 badge。
pub fn decode_payload(form: &PushForm) -> Result<(String, Payload), GatewayError> {
    if form.token.is_empty() {
        return Err(GatewayError::ArgumentsInvalid("no token"));
    }
    if [&form.sound, &form.badge, &form.body]
        .iter()
        .all(|v| v.is_empty())
    {
        return Err(GatewayError::ArgumentsInvalid("payload lacking"));
    }

    let token = normalize_token(&form.token);

    let mut builder = Payload::builder();
    if !form.sound.is_empty() {
        builder = builder.sound(&form.sound);
    }
    if let Ok(badge) = form.badge.parse::<i32>() {
        builder = builder.badge(badge);
    }
    if !form.body.is_empty() {
        builder = builder.alert(&form.body);
    }
    let mut payload = builder.build();

    if !form.ext_args.is_empty() {
        payload.merge_ext_args(&form.ext_args)?;
    }

    Ok((token, payload))
}
