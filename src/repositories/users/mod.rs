//! 토큰 소유자 확인 계층
//!
//! [`UserDirectory`] 계약과 MongoDB([`UserRepository`]), 인메모리 구현을 제공합니다.
//!
//! ```rust,ignore
//! let users = UserRepository::instance();
//! if !users.user_exists("65a1b2c3d4e5f60718293a4b").await? { /* NotFound */ }
//! ```

pub mod user_directory;
pub mod user_repo;

pub use user_directory::{InMemoryUserDirectory, UserDirectory};
pub use user_repo::UserRepository;
