//! # Domain Models
//!
//! 저장소와 무관한 도메인 규칙과 값 타입입니다.

pub mod token;
