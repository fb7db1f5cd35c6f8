//! 리프레시 토큰 서비스
//!
//! 불투명(opaque) 리프레시 토큰의 발급, 사용, 오용 차단, 세션 관리, 정리를 담당하는
//! 엔진과 그 HTTP 경계입니다.
//!
//! # Features
//!
//! - **암호화 저장**: 평문 토큰은 저장하지 않고 AES-256-GCM 암호문과 HMAC 조회 해시만 보관
//! - **상태 판정**: 삭제 → 폐기 → 만료 → 차단 → 소진 → 유효 순서의 순수 함수
//! - **오용 차단**: 원자적 실패 카운터, 임계값 도달 시 차단 기간 설정
//! - **세션/디바이스**: 최근 사용 순 세션 목록, 디바이스별 집계와 일괄 폐기
//! - **보존/정리**: 유예 기간이 지난 종료 토큰의 배치 삭제, 분산 잠금 스케줄러
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HTTP Routes   │ ← ApiKeyGuard (service / admin)
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Handlers     │ ← DTO 검증, 응답 매핑
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  TokenService   │ ← TokenCipher + 도메인 규칙 + Clock
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   TokenStore    │ ← TokenRepository (MongoDB) / InMemoryTokenStore
//! └─────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use refresh_token_service::domain::models::token::{IssueTokenCommand, TokenLifetime};
//! use refresh_token_service::services::auth::TokenService;
//!
//! let service = TokenService::instance();
//! let issued = service.issue(IssueTokenCommand {
//!     user_id: user_id.clone(),
//!     lifetime: TokenLifetime::Default,
//!     metadata: Default::default(),
//! }).await?;
//!
//! let outcome = service.validate(&issued.token).await?;
//! assert!(outcome.is_valid());
//! ```

pub mod core;
pub mod config;
pub mod db;
pub mod caching;
pub mod domain;
pub mod repositories;
pub mod services;
pub mod utils;
pub mod routes;
pub mod handlers;
pub mod errors;
pub mod middlewares;
