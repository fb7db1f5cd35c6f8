//! 발급 요청과 만료 시각 결정

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::entities::tokens::SessionMetadata;
use crate::domain::models::token::policy::TokenPolicy;
use crate::errors::{AppError, AppResult};

/// 토큰 수명 지정 방식
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TokenLifetime {
    /// 정책의 기본 TTL
    #[default]
    Default,
    Ttl(Duration),
    ExpiresAt(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueTokenCommand {
    pub user_id: String,
    pub lifetime: TokenLifetime,
    pub metadata: SessionMetadata,
}

/// 발급 결과. 평문 토큰 값이 밖으로 나가는 유일한 지점입니다.
#[derive(Clone, Serialize)]
pub struct IssuedToken {
    pub token_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token_id", &self.token_id)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// 요청된 수명을 검사하고 만료 시각을 계산합니다.
///
/// 만료 시각은 `now`보다 엄격히 뒤여야 하고, 최대 TTL을 넘을 수 없습니다.
pub fn resolve_expiry(lifetime: TokenLifetime, now: DateTime<Utc>, policy: &TokenPolicy) -> AppResult<DateTime<Utc>> {
    let expires_at = match lifetime {
        TokenLifetime::Default => add_lifetime(now, policy.default_ttl, policy)?,
        TokenLifetime::Ttl(ttl) => {
            if ttl <= Duration::zero() {
                return Err(AppError::InvalidExpiry("ttl must be positive".to_string()));
            }
            add_lifetime(now, ttl, policy)?
        }
        TokenLifetime::ExpiresAt(at) => at,
    };

    if expires_at <= now {
        return Err(AppError::InvalidExpiry("expires_at must be in the future".to_string()));
    }
    if expires_at - now > policy.max_ttl {
        return Err(exceeds_max_ttl(policy));
    }

    Ok(expires_at)
}

/// 최대 TTL을 먼저 확인한 뒤 더합니다. 날짜 범위를 벗어나는 덧셈은 패닉 대신 거부합니다.
fn add_lifetime(now: DateTime<Utc>, ttl: Duration, policy: &TokenPolicy) -> AppResult<DateTime<Utc>> {
    if ttl > policy.max_ttl {
        return Err(exceeds_max_ttl(policy));
    }
    now.checked_add_signed(ttl)
        .ok_or_else(|| AppError::InvalidExpiry("expires_at is out of range".to_string()))
}

fn exceeds_max_ttl(policy: &TokenPolicy) -> AppError {
    AppError::InvalidExpiry(format!(
        "lifetime exceeds the maximum of {} days",
        policy.max_ttl.num_days()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_default_lifetime_uses_policy_ttl() {
        let policy = TokenPolicy::default();
        let expires_at = resolve_expiry(TokenLifetime::Default, now(), &policy).unwrap();

        assert_eq!(expires_at, now() + policy.default_ttl);
    }

    #[test]
    fn test_expiry_must_be_strictly_in_future() {
        let policy = TokenPolicy::default();

        let at_now = resolve_expiry(TokenLifetime::ExpiresAt(now()), now(), &policy);
        assert!(matches!(at_now, Err(AppError::InvalidExpiry(_))));

        let zero_ttl = resolve_expiry(TokenLifetime::Ttl(Duration::zero()), now(), &policy);
        assert!(matches!(zero_ttl, Err(AppError::InvalidExpiry(_))));

        let one_ms = resolve_expiry(TokenLifetime::Ttl(Duration::milliseconds(1)), now(), &policy);
        assert!(one_ms.is_ok());
    }

    #[test]
    fn test_lifetime_is_capped() {
        let policy = TokenPolicy::default();

        let at_cap = resolve_expiry(TokenLifetime::Ttl(policy.max_ttl), now(), &policy);
        assert!(at_cap.is_ok());

        let over = resolve_expiry(
            TokenLifetime::Ttl(policy.max_ttl + Duration::seconds(1)),
            now(),
            &policy,
        );
        assert!(matches!(over, Err(AppError::InvalidExpiry(_))));
    }

    #[test]
    fn test_huge_ttl_is_rejected_without_overflow() {
        let policy = TokenPolicy::default();

        let huge = resolve_expiry(
            TokenLifetime::Ttl(Duration::seconds(100_000_000_000_000)),
            now(),
            &policy,
        );
        assert!(matches!(huge, Err(AppError::InvalidExpiry(_))));

        let max = resolve_expiry(TokenLifetime::Ttl(Duration::MAX), now(), &policy);
        assert!(matches!(max, Err(AppError::InvalidExpiry(_))));
    }

    #[test]
    fn test_out_of_range_addition_is_rejected() {
        // 최대 TTL 검사를 통과해도 날짜 범위를 넘으면 거부
        let policy = TokenPolicy { max_ttl: Duration::MAX, ..TokenPolicy::default() };

        let result = resolve_expiry(
            TokenLifetime::Ttl(Duration::seconds(100_000_000_000_000)),
            now(),
            &policy,
        );
        assert!(matches!(result, Err(AppError::InvalidExpiry(_))));
    }

    #[test]
    fn test_issued_token_debug_hides_plaintext() {
        let issued = IssuedToken {
            token_id: "abc".to_string(),
            token: "secret-value".to_string(),
            expires_at: now(),
        };

        let rendered = format!("{:?}", issued);
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("abc"));
    }
}
