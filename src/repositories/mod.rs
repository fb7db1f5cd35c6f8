//! 데이터 액세스 계층
//!
//! `#[repository]` 매크로로 싱글톤 관리되는 MongoDB 리포지토리와,
//! 같은 계약을 따르는 인메모리 구현을 제공합니다.
//!
//! - [`tokens`] - 리프레시 토큰 레코드 (`refresh_tokens` 컬렉션)
//! - [`users`] - 토큰 소유자 존재 확인 (`users` 컬렉션, 읽기 전용)

pub mod tokens;
pub mod users;
