//! 토큰 유효성 상태 기계
//!
//! 저장된 상태 필드 없이 레코드 필드와 현재 시각만으로 상태를 계산하는 순수 함수입니다.
//! 판정 순서는 고정입니다.
//!
//! 1. `Deleted`   - 소프트 삭제됨
//! 2. `Revoked`   - 폐기됨
//! 3. `Expired`   - `now >= expires_at` (만료 시각 자체도 만료)
//! 4. `Blocked`   - `now < blocked_until`
//! 5. `Exhausted` - `failed_attempts >= max_failed_attempts`
//! 6. `Valid`
//!
//! 차단 기간이 지나도 실패 횟수가 임계값 이상이면 `Exhausted`로 남습니다.
//! 이 상태는 관리자 초기화로만 풀립니다.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::abuse::{has_exceeded_max_attempts, is_blocked};
use crate::domain::models::token::outcome::InvalidReason;
use crate::domain::models::token::policy::AbusePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Valid,
    Expired,
    Revoked,
    Blocked,
    Exhausted,
    Deleted,
}

impl TokenState {
    /// 사용할 수 없는 상태라면 그 사유
    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self {
            TokenState::Valid => None,
            TokenState::Expired => Some(InvalidReason::Expired),
            TokenState::Revoked => Some(InvalidReason::Revoked),
            TokenState::Blocked => Some(InvalidReason::Blocked),
            TokenState::Exhausted => Some(InvalidReason::Exhausted),
            TokenState::Deleted => Some(InvalidReason::Deleted),
        }
    }

    /// 시간이 지나거나 성공 처리로 되돌아올 수 없는 상태
    pub fn is_terminal(&self) -> bool {
        matches!(self, TokenState::Expired | TokenState::Revoked | TokenState::Deleted)
    }
}

pub fn classify(record: &RefreshToken, now: DateTime<Utc>, policy: &AbusePolicy) -> TokenState {
    if record.soft_deleted {
        return TokenState::Deleted;
    }
    if record.revoked {
        return TokenState::Revoked;
    }
    if now >= record.expires_at {
        return TokenState::Expired;
    }
    if is_blocked(record, now) {
        return TokenState::Blocked;
    }
    if has_exceeded_max_attempts(record, policy) {
        return TokenState::Exhausted;
    }
    TokenState::Valid
}

pub fn is_usable(record: &RefreshToken, now: DateTime<Utc>, policy: &AbusePolicy) -> bool {
    classify(record, now, policy) == TokenState::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::tokens::SessionMetadata;
    use crate::domain::models::token::abuse::record_success;
    use crate::domain::models::token::sealed_token::SealedToken;
    use chrono::{Duration, TimeZone};

    fn token_expiring_at(expires_at: DateTime<Utc>) -> RefreshToken {
        RefreshToken::new(
            "user-1".to_string(),
            "hash".to_string(),
            SealedToken { key_id: "v1".to_string(), ciphertext: "x".to_string() },
            expires_at - Duration::days(7),
            expires_at,
            SessionMetadata::default(),
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let policy = AbusePolicy::default();
        let token = token_expiring_at(t0());

        assert_eq!(classify(&token, t0(), &policy), TokenState::Expired);
        assert_eq!(
            classify(&token, t0() - Duration::milliseconds(1), &policy),
            TokenState::Valid
        );
    }

    #[test]
    fn test_deleted_wins_over_everything() {
        let policy = AbusePolicy::default();
        let mut token = token_expiring_at(t0());
        token.revoked = true;
        token.soft_deleted = true;
        token.failed_attempts = 10;

        assert_eq!(classify(&token, t0() + Duration::days(1), &policy), TokenState::Deleted);
    }

    #[test]
    fn test_revoked_checked_before_expiry() {
        let policy = AbusePolicy::default();
        let mut token = token_expiring_at(t0());
        token.revoked = true;

        assert_eq!(classify(&token, t0() + Duration::days(1), &policy), TokenState::Revoked);
    }

    #[test]
    fn test_blocked_then_exhausted_after_window() {
        let policy = AbusePolicy::default();
        let now = t0() - Duration::days(3);
        let mut token = token_expiring_at(t0());
        token.failed_attempts = policy.max_failed_attempts;
        token.blocked_until = Some(now + policy.block_window);

        assert_eq!(classify(&token, now, &policy), TokenState::Blocked);
        assert_eq!(
            classify(&token, now + policy.block_window, &policy),
            TokenState::Exhausted
        );
    }

    #[test]
    fn test_stale_block_has_no_effect() {
        let policy = AbusePolicy::default();
        let now = t0() - Duration::days(3);
        let mut token = token_expiring_at(t0());
        token.blocked_until = Some(now - Duration::seconds(1));

        assert!(is_usable(&token, now, &policy));
    }

    #[test]
    fn test_revocation_is_terminal() {
        let policy = AbusePolicy::default();
        let now = t0() - Duration::days(3);
        let mut token = token_expiring_at(t0());
        token.revoked = true;

        for i in 0..5 {
            record_success(&mut token, now + Duration::minutes(i));
            assert_eq!(classify(&token, now + Duration::minutes(i), &policy), TokenState::Revoked);
        }
        assert!(TokenState::Revoked.is_terminal());
    }

    #[test]
    fn test_invalid_reason_mapping() {
        assert_eq!(TokenState::Valid.invalid_reason(), None);
        assert_eq!(TokenState::Blocked.invalid_reason(), Some(InvalidReason::Blocked));
        assert_eq!(TokenState::Deleted.invalid_reason(), Some(InvalidReason::Deleted));
    }
}
