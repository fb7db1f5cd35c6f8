//! 리프레시 토큰 엔티티

pub mod refresh_token;

pub use refresh_token::*;
