//! # Domain Layer Module
//!
//! 리프레시 토큰 엔진의 도메인 계층입니다.
//!
//! ```text
//! Domain Layer (이 모듈)
//! ├── entities  - RefreshToken 문서, SoftDeletable
//! ├── models    - 상태 판정, 실패 누적, 보존 규칙, 정책 (순수 함수)
//! └── dto       - HTTP 요청/응답 계약
//!      │
//!      ▼
//! Services (TokenService, CleanupScheduler)
//!      │
//!      ▼
//! Repositories (TokenStore, UserDirectory)
//! ```
//!
//! [`models`]의 함수는 시계와 저장소를 인자로 받지 않습니다. 현재 시각은 호출자가
//! 넘기고, 같은 입력에는 항상 같은 상태를 돌려줍니다.

pub mod dto;
pub mod entities;
pub mod models;
