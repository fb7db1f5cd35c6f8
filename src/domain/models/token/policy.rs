//! 토큰 정책 값 객체
//!
//! 환경 변수에서 읽은 값은 [`crate::config::TokenPolicyConfig::policy`]가
//! 이 구조체들로 변환합니다. 도메인 로직은 환경 변수를 직접 읽지 않습니다.

use chrono::Duration;

pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
pub const DEFAULT_BLOCK_WINDOW_MINUTES: i64 = 60;
pub const DEFAULT_CLEANUP_BATCH_SIZE: usize = 1000;
pub const DEFAULT_CLEANUP_GRACE_DAYS: i64 = 7;
pub const DEFAULT_TTL_DAYS: i64 = 14;
pub const DEFAULT_MAX_TTL_DAYS: i64 = 90;
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 3000;

/// 실패 횟수 누적과 차단 기간 정책
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbusePolicy {
    pub max_failed_attempts: u32,
    pub block_window: Duration,
}

impl Default for AbusePolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            block_window: Duration::minutes(DEFAULT_BLOCK_WINDOW_MINUTES),
        }
    }
}

/// 보존/정리 정책
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    /// 발급 후 이 기간이 지나야 정리 대상이 됩니다 (감사 기간)
    pub grace_period: Duration,
    pub batch_size: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::days(DEFAULT_CLEANUP_GRACE_DAYS),
            batch_size: DEFAULT_CLEANUP_BATCH_SIZE,
        }
    }
}

/// 엔진 전체 정책
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPolicy {
    pub abuse: AbusePolicy,
    pub retention: RetentionPolicy,
    pub default_ttl: Duration,
    pub max_ttl: Duration,
    /// validate/issue 호출의 기본 시간 제한
    pub operation_timeout: std::time::Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            abuse: AbusePolicy::default(),
            retention: RetentionPolicy::default(),
            default_ttl: Duration::days(DEFAULT_TTL_DAYS),
            max_ttl: Duration::days(DEFAULT_MAX_TTL_DAYS),
            operation_timeout: std::time::Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }
}
