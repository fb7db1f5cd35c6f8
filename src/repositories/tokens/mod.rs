//! 리프레시 토큰 저장소 모듈
//!
//! - [`token_store`] - 엔진이 의존하는 저장소 계약 ([`TokenStore`], [`SweepLock`])
//! - [`token_repository`] - MongoDB `refresh_tokens` 컬렉션 구현
//! - [`memory_store`] - 로컬 실행과 테스트용 인메모리 구현
//!
//! ```rust,ignore
//! use crate::repositories::tokens::{TokenRepository, TokenStore};
//!
//! let repo = TokenRepository::instance();
//! repo.create_indexes().await?;
//! let record = repo.find_by_lookup_hash(&hash).await?;
//! ```

pub mod memory_store;
pub mod token_repository;
pub mod token_store;

pub use memory_store::{InMemoryTokenStore, LocalSweepLock};
pub use token_repository::TokenRepository;
pub use token_store::{RevokeScope, SweepLock, TokenStore, TokenStream};
