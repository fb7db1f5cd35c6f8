//! # Core Infrastructure Module
//!
//! 싱글톤 레지스트리([`registry::ServiceLocator`])를 제공합니다.
//! `singleton_macro::repository`가 생성하는 코드는 이 모듈의 [`registry::Repository`]와
//! [`registry::RepositoryRegistration`]을 사용합니다.
//!
//! ```rust,ignore
//! use crate::core::registry::ServiceLocator;
//!
//! let repository = ServiceLocator::get::<TokenRepository>();
//! ```

pub mod registry;

pub use registry::*;
