//! # HTTP Request Handlers Module
//!
//! HTTP 요청을 [`TokenService`](crate::services::auth::TokenService) 호출로 바꾸는 웹 계층입니다.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//!   Auth flow / Operator (API 키 보유)
//! └─────────────────────┬───────────────────────┘
//!                       │ HTTP Request/Response
//! ┌─────────────────────▼───────────────────────┐
//!   Handlers (이 모듈)                           ← Web Layer
//! ├─────────────────────────────────────────────┤
//!   TokenService - 발급/검증/폐기/정리            ← Service Layer
//! ├─────────────────────────────────────────────┤
//!   TokenStore / UserDirectory                   ← Repository Layer
//! └─────────────────────────────────────────────┘
//! ```
//!
//! 모든 핸들러는 `Result<HttpResponse, AppError>`를 반환하고, 상태 코드는
//! `AppError`의 `ResponseError` 구현이 결정합니다. 입력은 `validator`로 먼저 검사합니다.
//!
//! - [`tokens`] - 발급, 검증, 실패 기록, 폐기
//! - [`sessions`] - 세션/디바이스 목록, 일괄 폐기
//! - [`admin`] - 정리, 초기화, 소프트 삭제/복원

pub mod admin;
pub mod sessions;
pub mod tokens;
