//! # Configuration Module
//!
//! 환경 변수 기반 설정값을 한곳에서 관리합니다.
//! `.env.dev` / `.env.prod` 파일은 `main`에서 `PROFILE`에 따라 먼저 로드됩니다.
//!
//! ## 모듈 구성
//!
//! - [`data_config`] - 실행 환경, 서버 바인딩, 요청 제한
//! - [`token_config`] - 암호화 키 자료, 토큰 정책, API 키, 정리 스케줄
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use crate::config::{ServerConfig, TokenPolicyConfig, TokenSecurityConfig};
//!
//! let bind = ServerConfig::bind_address();
//! let policy = TokenPolicyConfig::policy();
//! let keys = TokenSecurityConfig::key_material()?;
//! ```

pub mod data_config;
pub mod token_config;

pub use data_config::*;
pub use token_config::*;
