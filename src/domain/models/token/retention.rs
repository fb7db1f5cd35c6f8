//! 보존 및 정리 정책
//!
//! 만료/폐기/삭제된 레코드, 그리고 관리자가 정리 표시한 레코드가 정리 대상입니다.
//! 자연 만료 대상은 발급 후 유예 기간(grace period)이 지나야 실제로 삭제되고,
//! 정리 표시된 레코드는 유예 기간 없이 다음 정리 작업에 포함됩니다.

use chrono::{DateTime, Utc};

use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::policy::{AbusePolicy, RetentionPolicy};
use crate::domain::models::token::validity::{classify, TokenState};

/// 상태상 더 이상 존재할 필요가 없는 레코드인지 여부
pub fn is_eligible_for_cleanup(record: &RefreshToken, now: DateTime<Utc>, abuse: &AbusePolicy) -> bool {
    record.marked_for_cleanup
        || matches!(
            classify(record, now, abuse),
            TokenState::Expired | TokenState::Revoked | TokenState::Deleted
        )
}

/// 이 시각 이전에 발급된 레코드만 자연 정리 대상이 됩니다.
pub fn grace_cutoff(now: DateTime<Utc>, retention: &RetentionPolicy) -> DateTime<Utc> {
    now - retention.grace_period
}

/// 정리 작업이 지금 이 레코드를 물리 삭제해도 되는지 여부
pub fn should_purge(
    record: &RefreshToken,
    now: DateTime<Utc>,
    abuse: &AbusePolicy,
    retention: &RetentionPolicy,
) -> bool {
    if record.marked_for_cleanup {
        return true;
    }
    record.issued_at <= grace_cutoff(now, retention) && is_eligible_for_cleanup(record, now, abuse)
}
