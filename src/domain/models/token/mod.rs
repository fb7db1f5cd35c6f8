//! # 리프레시 토큰 도메인 모델
//!
//! 저장소나 시계에 의존하지 않는 순수 규칙 모음입니다.
//!
//! - [`validity`] - 상태 판정 (`classify`, `is_usable`)
//! - [`abuse`] - 실패 횟수 누적과 차단 기간
//! - [`retention`] - 정리 대상 판정
//! - [`policy`] - 임계값, 기간, 배치 크기
//! - [`outcome`] - 검증 결과와 실패 사유
//! - [`issuance`] - 발급 요청과 만료 시각 결정
//! - [`session`] - 세션/디바이스 목록 뷰
//! - [`sealed_token`] - 암호화된 토큰 값

pub mod abuse;
pub mod issuance;
pub mod outcome;
pub mod policy;
pub mod retention;
pub mod sealed_token;
pub mod session;
pub mod validity;

pub use issuance::{IssueTokenCommand, IssuedToken, TokenLifetime};
pub use outcome::{InvalidReason, ValidationOutcome};
pub use policy::{AbusePolicy, RetentionPolicy, TokenPolicy};
pub use sealed_token::SealedToken;
pub use session::{DeviceSummary, SessionSummary};
pub use validity::{classify, is_usable, TokenState};
