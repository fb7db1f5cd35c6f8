//! 미들웨어 모듈
//!
//! 요청 처리 파이프라인의 횡단 관심사를 담당합니다.
//!
//! ### API 키 미들웨어 (ApiKeyGuard)
//! - `X-Api-Key` 헤더 검사, 상수 시간 비교
//! - 헤더 없음 401, 불일치 403
//! - 스코프별로 다른 키 (`SERVICE_API_KEY`, `ADMIN_API_KEY`)
//!
//! ```rust,ignore
//! use actix_web::{web, App};
//!
//! App::new()
//!     .service(
//!         web::scope("/api/v1/admin")
//!             .wrap(ApiKeyGuard::admin())
//!             .service(handlers::admin::sweep_tokens)
//!     )
//! ```

pub mod api_key_middleware;
mod api_key_inner;

pub use api_key_middleware::{ApiKeyGuard, API_KEY_HEADER};
