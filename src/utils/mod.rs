//! 공통 유틸리티 모듈
//!
//! - [`string_utils`] - 요청 문자열 정리와 검증
//! - [`bson_time`] - `chrono::DateTime<Utc>` ↔ BSON DateTime 직렬화

pub mod bson_time;
pub mod string_utils;
