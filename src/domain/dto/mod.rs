//! # Data Transfer Objects (DTO) Module
//!
//! HTTP 경계에서 주고받는 데이터 계약입니다.
//!
//! | 모듈 | 역할 |
//! |------|------|
//! | [`tokens::request`] | 요청 본문 매핑 + `validator` 입력 검증 |
//! | [`tokens::response`] | 응답 본문 매핑 (암호문, 조회 해시 제외) |
//!
//! ```rust,ignore
//! use validator::Validate;
//!
//! payload.validate()
//!     .map_err(|e| AppError::ValidationError(e.to_string()))?;
//! let issued = service.issue(payload.into_inner().into_command(ip, ua)).await?;
//! Ok(HttpResponse::Created().json(IssueTokenResponse::from(issued)))
//! ```

pub mod tokens;

pub use tokens::*;
