//! # 문자열 유틸리티
//!
//! 요청 값과 디바이스 메타데이터의 공백 정리 규칙입니다.

use serde::Deserialize;

use crate::errors::AppError;

/// 앞뒤 공백을 제거하고, 비어 있으면 `ValidationError`
///
/// ```rust,ignore
/// assert_eq!(require_trimmed("  u-1 ", "user_id")?, "u-1");
/// assert!(require_trimmed("   ", "device_id").is_err());
/// ```
pub fn require_trimmed<'a>(value: &'a str, field_name: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(format!("{}은(는) 비어 있을 수 없습니다", field_name)));
    }
    Ok(trimmed)
}

/// 공백만 있는 값은 "없음"으로 봅니다.
pub fn clean_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// serde용: `""`, `"   "`, `null`을 모두 `None`으로 역직렬화
///
/// ```rust,ignore
/// #[serde(default, deserialize_with = "deserialize_optional_string")]
/// pub device_name: Option<String>,
/// ```
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(clean_optional_string(opt))
}
