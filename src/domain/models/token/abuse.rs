//! 실패 횟수 카운터와 차단 기간 계산
//!
//! 이 함수들은 메모리상의 레코드에 적용되는 기준 구현입니다.
//! MongoDB 저장소는 같은 규칙을 `$inc`/파이프라인 업데이트로 서버에서 원자적으로 수행하고,
//! 인메모리 저장소는 쓰기 잠금 안에서 이 함수들을 그대로 호출합니다.

use chrono::{DateTime, Utc};

use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::policy::AbusePolicy;

/// 성공한 사용을 기록합니다. 실패 횟수와 차단을 지우고 사용 정보를 갱신합니다.
pub fn record_success(record: &mut RefreshToken, now: DateTime<Utc>) {
    record.failed_attempts = 0;
    record.blocked_until = None;
    record.usage_count = record.usage_count.saturating_add(1);
    record.last_used_at = Some(now);
    record.version += 1;
}

/// 실패를 기록합니다. 임계값에 도달하면 `now + block_window`까지 차단합니다.
pub fn record_failure(record: &mut RefreshToken, now: DateTime<Utc>, policy: &AbusePolicy) {
    record.failed_attempts = record.failed_attempts.saturating_add(1);
    if record.failed_attempts >= policy.max_failed_attempts {
        record.blocked_until = Some(now + policy.block_window);
    }
    record.version += 1;
}

/// 관리자 초기화: 차단 기간이 지난 뒤에도 `Exhausted`로 남은 토큰을 풀어줍니다.
pub fn reset_failures(record: &mut RefreshToken) {
    record.failed_attempts = 0;
    record.blocked_until = None;
    record.version += 1;
}

pub fn has_exceeded_max_attempts(record: &RefreshToken, policy: &AbusePolicy) -> bool {
    record.failed_attempts >= policy.max_failed_attempts
}

pub fn is_blocked(record: &RefreshToken, now: DateTime<Utc>) -> bool {
    record.blocked_until.is_some_and(|until| now < until)
}
