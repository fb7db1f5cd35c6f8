//! # Domain Entities
//!
//! MongoDB에 저장되는 영속 객체입니다.
//!
//! - [`tokens::RefreshToken`] - `refresh_tokens` 컬렉션 문서
//! - [`soft_delete::SoftDeletable`] - 삭제 표시/복원 capability

pub mod soft_delete;
pub mod tokens;

pub use soft_delete::SoftDeletable;
