//! 캐싱 및 분산 잠금 계층
//!
//! - 사용자 존재 여부 조회 캐시 (JSON, TTL)
//! - 정리 작업용 단일 실행 잠금 (`SET NX EX` + compare-and-delete 해제)
//!
//! ```bash
//! REDIS_URL=redis://localhost:6379  # 기본값
//! ```

pub mod redis;
