//! 리프레시 토큰 보안 서비스
//!
//! - [`token_cipher`] - 불투명 토큰 값 생성, AES-256-GCM 봉인, HMAC 조회 해시
//! - [`clock`] - 현재 시각 주입
//! - [`token_service`] - 발급/검증/폐기/정리 엔진
//!
//! # Security
//!
//! - 평문 토큰은 발급 응답에서 한 번만 나가고 저장되지 않습니다.
//! - 암호화 키는 환경 변수에서만 읽고, 키 ID를 암호문과 함께 저장해 키 교체를 지원합니다.
//! - 후보 값 비교는 상수 시간으로 수행합니다.

pub mod clock;
pub mod token_cipher;
pub mod token_service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use token_cipher::TokenCipher;
pub use token_service::TokenService;
