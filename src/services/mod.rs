//! 비즈니스 로직 계층
//!
//! - [`auth`] - 토큰 코덱, 시계, 리프레시 토큰 엔진
//! - [`maintenance`] - 주기적 정리 작업
//!
//! ```rust,ignore
//! use crate::services::auth::TokenService;
//!
//! let tokens = TokenService::instance();
//! let outcome = tokens.validate(&presented).await?;
//! ```

pub mod auth;
pub mod maintenance;
