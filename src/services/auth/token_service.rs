//! # 리프레시 토큰 엔진
//!
//! 발급, 검증(사용), 실패 기록, 세션/디바이스 관리, 정리 작업을 하나의 서비스로 묶습니다.
//!
//! ## 검증 흐름
//!
//! 1. 평문의 HMAC 조회 해시로 레코드를 찾습니다. 없으면 `not_found` (벌점 없음).
//! 2. 저장된 암호문을 복호화해 상수 시간으로 비교합니다.
//! 3. [`classify`]로 상태를 계산합니다.
//!    - `Valid`: `version` CAS로 성공을 기록합니다. CAS에서 지면 한 번 다시 읽어 판정합니다.
//!    - `Blocked`/`Exhausted`: 저장소에서 원자적으로 실패 횟수를 올립니다.
//!    - `Expired`/`Revoked`/`Deleted`: 종료 상태이므로 아무것도 바꾸지 않습니다.
//!
//! 모든 상태 변경은 저장소 호출 한 번으로 끝나므로, 시간 초과로 future가 버려져도
//! 변경은 반영되었거나 반영되지 않았거나 둘 중 하나입니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use futures_util::future;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use mongodb::bson::oid::ObjectId;
use once_cell::sync::OnceCell;

use crate::config::TokenPolicyConfig;
use crate::core::registry::ServiceLocator;
use crate::domain::entities::soft_delete::SoftDeletable;
use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::issuance::resolve_expiry;
use crate::domain::models::token::session::group_by_device;
use crate::domain::models::token::{
    classify, is_usable, DeviceSummary, InvalidReason, IssueTokenCommand, IssuedToken, SessionSummary,
    TokenPolicy, TokenState, ValidationOutcome,
};
use crate::errors::{AppError, AppResult};
use crate::repositories::tokens::{RevokeScope, TokenRepository, TokenStore};
use crate::repositories::users::{UserDirectory, UserRepository};
use crate::services::auth::clock::{Clock, SystemClock};
use crate::services::auth::token_cipher::TokenCipher;
use crate::utils::string_utils::require_trimmed;

pub struct TokenService {
    store: Arc<dyn TokenStore>,
    users: Arc<dyn UserDirectory>,
    cipher: Arc<TokenCipher>,
    policy: TokenPolicy,
    clock: Arc<dyn Clock>,
}

static TOKEN_SERVICE_INSTANCE: OnceCell<Arc<TokenService>> = OnceCell::new();

fn parse_token_id(token_id: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(token_id.trim())
        .map_err(|_| AppError::ValidationError("유효하지 않은 토큰 ID 형식입니다".to_string()))
}

fn record_id(record: &RefreshToken) -> AppResult<ObjectId> {
    record
        .id
        .ok_or_else(|| AppError::InternalError("stored token record has no id".to_string()))
}

/// `limit` 안에 끝나지 않으면 `Timeout`
async fn bounded<T, F>(operation: &'static str, limit: StdDuration, work: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("⏱️ {} 작업이 {}ms 안에 끝나지 않았습니다", operation, limit.as_millis());
            Err(AppError::Timeout(format!("{} exceeded {}ms", operation, limit.as_millis())))
        }
    }
}

impl TokenService {
    pub fn new(
        store: Arc<dyn TokenStore>,
        users: Arc<dyn UserDirectory>,
        cipher: Arc<TokenCipher>,
        policy: TokenPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, users, cipher, policy, clock }
    }

    /// 싱글톤 인스턴스
    ///
    /// `TokenCipher`는 `main`에서 키 검증 후 `ServiceLocator::set`으로 등록되어 있어야 합니다.
    pub fn instance() -> Arc<Self> {
        TOKEN_SERVICE_INSTANCE
            .get_or_init(|| {
                let store: Arc<dyn TokenStore> = ServiceLocator::get::<TokenRepository>();
                let users: Arc<dyn UserDirectory> = ServiceLocator::get::<UserRepository>();
                Arc::new(Self::new(
                    store,
                    users,
                    ServiceLocator::get::<TokenCipher>(),
                    TokenPolicyConfig::policy(),
                    Arc::new(SystemClock),
                ))
            })
            .clone()
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// 현재 시각 기준 상태
    pub fn state_of(&self, record: &RefreshToken) -> TokenState {
        classify(record, self.clock.now(), &self.policy.abuse)
    }

    async fn ensure_user(&self, user_id: &str) -> AppResult<()> {
        if self.users.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("user {} not found", user_id)))
        }
    }

    /// 관리 경로에서 쓰는 조회. 소프트 삭제된 레코드는 없는 것으로 봅니다.
    async fn find_live(&self, token_id: &str) -> AppResult<(ObjectId, RefreshToken)> {
        let id = parse_token_id(token_id)?;
        match self.store.find_by_id(&id).await? {
            Some(record) if record.is_active() => Ok((id, record)),
            _ => Err(AppError::NotFound(format!("token {} not found", token_id))),
        }
    }

    // ========== 발급 ==========

    pub async fn issue(&self, command: IssueTokenCommand) -> AppResult<IssuedToken> {
        self.issue_within(command, self.policy.operation_timeout).await
    }

    pub async fn issue_within(&self, command: IssueTokenCommand, limit: StdDuration) -> AppResult<IssuedToken> {
        bounded("issue", limit, self.issue_now(command)).await
    }

    async fn issue_now(&self, command: IssueTokenCommand) -> AppResult<IssuedToken> {
        let user_id = require_trimmed(&command.user_id, "user_id")?;

        let now = self.clock.now();
        let expires_at = resolve_expiry(command.lifetime, now, &self.policy)?;
        self.ensure_user(user_id).await?;

        let plaintext = TokenCipher::generate();
        let sealed = self.cipher.encrypt_for_storage(&plaintext)?;
        let token_hash = self.cipher.lookup_hash(&plaintext)?;

        let record = RefreshToken::new(
            user_id.to_string(),
            token_hash,
            sealed,
            now,
            expires_at,
            command.metadata,
        );
        let saved = self.store.insert(record).await?;
        let token_id = saved
            .id_string()
            .ok_or_else(|| AppError::InternalError("inserted token has no id".to_string()))?;

        log::info!(
            "🔑 리프레시 토큰 발급: token_id={}, user_id={}, device_id={:?}, key_id={}",
            token_id,
            saved.user_id,
            saved.device_id,
            saved.encryption_key_id
        );

        Ok(IssuedToken {
            token_id,
            token: plaintext,
            expires_at,
        })
    }

    // ========== 검증 ==========

    pub async fn validate(&self, plaintext: &str) -> AppResult<ValidationOutcome> {
        self.validate_within(plaintext, self.policy.operation_timeout).await
    }

    pub async fn validate_within(&self, plaintext: &str, limit: StdDuration) -> AppResult<ValidationOutcome> {
        bounded("validate", limit, self.validate_now(plaintext)).await
    }

    async fn validate_now(&self, plaintext: &str) -> AppResult<ValidationOutcome> {
        let candidate = plaintext.trim();
        if candidate.is_empty() {
            return Ok(ValidationOutcome::Invalid(InvalidReason::NotFound));
        }

        let token_hash = self.cipher.lookup_hash(candidate)?;
        let Some(record) = self.store.find_by_lookup_hash(&token_hash).await? else {
            log::debug!("조회 해시와 일치하는 토큰 없음");
            return Ok(ValidationOutcome::Invalid(InvalidReason::NotFound));
        };

        if !self.cipher.matches(candidate, &record.sealed())? {
            log::warn!(
                "⚠️ 조회 해시는 일치하지만 암호문이 다릅니다: token_id={:?}, key_id={}",
                record.id_string(),
                record.encryption_key_id
            );
            return Ok(ValidationOutcome::Invalid(InvalidReason::NotFound));
        }

        let id = record_id(&record)?;
        let now = self.clock.now();
        match classify(&record, now, &self.policy.abuse).invalid_reason() {
            None => self.consume(id, record).await,
            Some(reason) => self.reject(id, &record.user_id, reason).await,
        }
    }

    /// 사용할 수 없는 토큰이 제시되었을 때의 처리
    async fn reject(&self, id: ObjectId, user_id: &str, reason: InvalidReason) -> AppResult<ValidationOutcome> {
        if reason.counts_as_failure() {
            let now = self.clock.now();
            if let Some(updated) = self.store.record_failure(&id, now, &self.policy.abuse).await? {
                log::warn!(
                    "🚫 {} 상태 토큰 사용 시도: token_id={}, user_id={}, failed_attempts={}",
                    reason,
                    id.to_hex(),
                    user_id,
                    updated.failed_attempts
                );
            }
        } else {
            log::info!("토큰 사용 거부: token_id={}, reason={}", id.to_hex(), reason);
        }
        Ok(ValidationOutcome::Invalid(reason))
    }

    /// 유효한 토큰의 성공 기록 (CAS, 진 경우 한 번 재판정)
    async fn consume(&self, id: ObjectId, seen: RefreshToken) -> AppResult<ValidationOutcome> {
        let now = self.clock.now();
        if let Some(updated) = self.store.record_success(&id, seen.version, now).await? {
            return Ok(self.accepted(id, updated));
        }

        let Some(current) = self.store.find_by_id(&id).await? else {
            return Ok(ValidationOutcome::Invalid(InvalidReason::NotFound));
        };

        let now = self.clock.now();
        if let Some(reason) = classify(&current, now, &self.policy.abuse).invalid_reason() {
            return self.reject(id, &current.user_id, reason).await;
        }

        // 같은 버전을 본 다른 요청이 이미 성공을 기록함
        if current.usage_count != seen.usage_count {
            log::warn!(
                "⚠️ 같은 토큰의 동시 사용 감지: token_id={}, user_id={}",
                id.to_hex(),
                current.user_id
            );
            return Err(AppError::ConcurrencyConflict(format!("token {} was used concurrently", id.to_hex())));
        }

        match self.store.record_success(&id, current.version, now).await? {
            Some(updated) => Ok(self.accepted(id, updated)),
            None => Err(AppError::ConcurrencyConflict(format!("token {} is being modified", id.to_hex()))),
        }
    }

    fn accepted(&self, id: ObjectId, updated: RefreshToken) -> ValidationOutcome {
        log::debug!("토큰 사용 성공: token_id={}, usage_count={}", id.to_hex(), updated.usage_count);
        ValidationOutcome::Valid {
            token_id: id.to_hex(),
            user_id: updated.user_id,
        }
    }

    // ========== 실패 횟수 ==========

    /// 인증 흐름이 다른 경로로 토큰 오용을 감지했을 때 실패를 기록합니다.
    pub async fn record_failure(&self, token_id: &str) -> AppResult<RefreshToken> {
        let (id, _) = self.find_live(token_id).await?;
        let now = self.clock.now();

        let updated = self
            .store
            .record_failure(&id, now, &self.policy.abuse)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("token {} not found", token_id)))?;

        if updated.blocked_until.is_some_and(|until| until > now)
            && updated.failed_attempts == self.policy.abuse.max_failed_attempts
        {
            log::warn!(
                "🔒 실패 횟수 초과로 토큰 차단: token_id={}, user_id={}, blocked_until={:?}",
                token_id,
                updated.user_id,
                updated.blocked_until
            );
        }
        Ok(updated)
    }

    /// 관리자 초기화. 차단 기간이 지난 뒤에도 남아 있는 `Exhausted` 상태를 풉니다.
    pub async fn reset_failures(&self, token_id: &str) -> AppResult<RefreshToken> {
        let (id, _) = self.find_live(token_id).await?;

        let updated = self
            .store
            .reset_failures(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("token {} not found", token_id)))?;

        log::info!("🔓 실패 횟수 초기화: token_id={}, user_id={}", token_id, updated.user_id);
        Ok(updated)
    }

    // ========== 세션/디바이스 ==========

    /// 지금 사용 가능한 토큰을 최근 사용 순으로 흘려보냅니다.
    ///
    /// 판정 시각은 호출 시점에 고정됩니다. 한 번만 소비할 수 있습니다.
    pub async fn find_usable_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<BoxStream<'static, AppResult<RefreshToken>>> {
        self.ensure_user(user_id).await?;
        let now = self.clock.now();
        let abuse = self.policy.abuse;

        let stream = self.store.find_live_by_user(user_id).await?;
        Ok(stream
            .try_filter(move |record| future::ready(is_usable(record, now, &abuse)))
            .boxed())
    }

    /// 종료 상태(만료/폐기/삭제)가 아닌 레코드. 차단 중인 세션도 포함합니다.
    async fn open_sessions(&self, user_id: &str) -> AppResult<Vec<RefreshToken>> {
        self.ensure_user(user_id).await?;
        let now = self.clock.now();
        let abuse = self.policy.abuse;

        self.store
            .find_live_by_user(user_id)
            .await?
            .try_filter(move |record| future::ready(!classify(record, now, &abuse).is_terminal()))
            .try_collect()
            .await
    }

    pub async fn list_sessions(&self, user_id: &str) -> AppResult<Vec<SessionSummary>> {
        let records = self.open_sessions(user_id).await?;
        Ok(records.iter().map(SessionSummary::from).collect())
    }

    pub async fn list_devices(&self, user_id: &str) -> AppResult<Vec<DeviceSummary>> {
        let records = self.open_sessions(user_id).await?;
        Ok(group_by_device(&records))
    }

    /// 토큰 하나를 폐기합니다. 이미 폐기/삭제된 토큰이면 0.
    pub async fn revoke(&self, token_id: &str) -> AppResult<u64> {
        let id = parse_token_id(token_id)?;
        if self.store.find_by_id(&id).await?.is_none() {
            return Err(AppError::NotFound(format!("token {} not found", token_id)));
        }

        let affected = self.store.revoke(&RevokeScope::Token(id), self.clock.now()).await?;
        if affected > 0 {
            log::info!("🛑 토큰 폐기: token_id={}", token_id);
        }
        Ok(affected)
    }

    /// "여기 빼고 모두 로그아웃"
    pub async fn revoke_all_for_user(&self, user_id: &str, except_token_id: Option<&str>) -> AppResult<u64> {
        self.ensure_user(user_id).await?;
        let except = except_token_id.map(parse_token_id).transpose()?;

        let scope = RevokeScope::User {
            user_id: user_id.to_string(),
            except,
        };
        let affected = self.store.revoke(&scope, self.clock.now()).await?;

        log::info!(
            "🛑 사용자 토큰 일괄 폐기: user_id={}, except={:?}, affected={}",
            user_id,
            except_token_id,
            affected
        );
        Ok(affected)
    }

    pub async fn revoke_all_for_device(&self, user_id: &str, device_id: &str) -> AppResult<u64> {
        let device_id = require_trimmed(device_id, "device_id")?;
        self.ensure_user(user_id).await?;

        let scope = RevokeScope::Device {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
        };
        let affected = self.store.revoke(&scope, self.clock.now()).await?;

        log::info!(
            "🛑 디바이스 토큰 폐기: user_id={}, device_id={}, affected={}",
            user_id,
            device_id,
            affected
        );
        Ok(affected)
    }

    // ========== 보존/정리 ==========

    /// 정리 대상을 최대 `batch_size`개 골라 물리 삭제하고 삭제한 개수를 돌려줍니다.
    pub async fn sweep(&self, batch_size: usize) -> AppResult<u64> {
        if batch_size == 0 {
            return Ok(0);
        }
        let now = self.clock.now();
        let abuse = &self.policy.abuse;
        let retention = &self.policy.retention;

        let candidates = self
            .store
            .find_cleanup_candidates(now, abuse, retention, batch_size)
            .await?;
        if candidates.is_empty() {
            log::debug!("정리 대상 없음");
            return Ok(0);
        }

        let removed = self.store.purge(&candidates, now, abuse, retention).await?;
        log::info!("🧹 리프레시 토큰 정리: 후보 {}개 중 {}개 삭제", candidates.len(), removed);
        Ok(removed)
    }

    /// 다음 정리 작업에 유예 기간 없이 포함시킵니다.
    pub async fn mark_for_cleanup(&self, token_ids: &[String]) -> AppResult<u64> {
        let ids = token_ids
            .iter()
            .map(|token_id| parse_token_id(token_id))
            .collect::<AppResult<Vec<_>>>()?;

        let marked = self.store.mark_for_cleanup(&ids).await?;
        log::info!("🏷️ 정리 표시: 요청 {}개, 새로 표시 {}개", ids.len(), marked);
        Ok(marked)
    }

    pub async fn soft_delete(&self, token_id: &str) -> AppResult<bool> {
        let id = parse_token_id(token_id)?;
        if self.store.find_by_id(&id).await?.is_none() {
            return Err(AppError::NotFound(format!("token {} not found", token_id)));
        }

        let changed = self.store.soft_delete(&id, self.clock.now()).await?;
        if changed {
            log::info!("🗑️ 토큰 소프트 삭제: token_id={}", token_id);
        }
        Ok(changed)
    }

    pub async fn restore(&self, token_id: &str) -> AppResult<bool> {
        let id = parse_token_id(token_id)?;
        if self.store.find_by_id(&id).await?.is_none() {
            return Err(AppError::NotFound(format!("token {} not found", token_id)));
        }

        let changed = self.store.restore(&id).await?;
        if changed {
            log::info!("♻️ 토큰 복원: token_id={}", token_id);
        }
        Ok(changed)
    }
}

fn token_service_constructor() -> Box<dyn std::any::Any + Send + Sync> {
    Box::new(TokenService::instance())
}

inventory::submit! {
    crate::core::registry::ServiceRegistration {
        name: "token_service",
        constructor: token_service_constructor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::domain::entities::tokens::SessionMetadata;
    use crate::domain::models::token::{AbusePolicy, RetentionPolicy, SealedToken, TokenLifetime};
    use crate::repositories::tokens::{InMemoryTokenStore, TokenStream};
    use crate::repositories::users::InMemoryUserDirectory;
    use crate::services::auth::clock::ManualClock;
    use crate::services::auth::token_cipher::tests::test_cipher;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    struct Harness {
        service: TokenService,
        store: Arc<InMemoryTokenStore>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(policy: TokenPolicy) -> Harness {
        let store = Arc::new(InMemoryTokenStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let service = TokenService::new(
            store.clone(),
            Arc::new(InMemoryUserDirectory::with_users(["u1", "u2"])),
            Arc::new(test_cipher()),
            policy,
            clock.clone(),
        );
        Harness { service, store, clock }
    }

    fn harness() -> Harness {
        harness_with(TokenPolicy::default())
    }

    fn command(user_id: &str, device_id: Option<&str>, lifetime: TokenLifetime) -> IssueTokenCommand {
        IssueTokenCommand {
            user_id: user_id.to_string(),
            lifetime,
            metadata: SessionMetadata {
                device_id: device_id.map(str::to_string),
                device_name: device_id.map(|d| format!("{} name", d)),
                source_ip: Some("10.0.0.1".to_string()),
                ..Default::default()
            },
        }
    }

    fn week() -> TokenLifetime {
        TokenLifetime::Ttl(Duration::days(7))
    }

    async fn stored(h: &Harness, token_id: &str) -> RefreshToken {
        let id = ObjectId::parse_str(token_id).unwrap();
        h.store.find_by_id(&id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_issue_then_immediate_use() {
        let h = harness();
        let issued = h.service.issue(command("u1", Some("phone-1"), week())).await.unwrap();

        assert_eq!(issued.expires_at, start() + Duration::days(7));

        let outcome = h.service.validate(&issued.token).await.unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Valid { token_id: issued.token_id.clone(), user_id: "u1".to_string() }
        );

        let record = stored(&h, &issued.token_id).await;
        assert_eq!(record.usage_count, 1);
        assert_eq!(record.failed_attempts, 0);
        assert_eq!(record.last_used_at, Some(start()));
        assert_eq!(record.device_id.as_deref(), Some("phone-1"));
    }

    #[tokio::test]
    async fn test_plaintext_is_never_stored() {
        let h = harness();
        let issued = h.service.issue(command("u1", None, week())).await.unwrap();
        let record = stored(&h, &issued.token_id).await;

        assert_ne!(record.encrypted_value, issued.token);
        assert_ne!(record.token_hash, issued.token);
        assert!(!record.encrypted_value.contains(&issued.token));
    }

    #[tokio::test]
    async fn test_issue_rejects_unknown_user_and_bad_expiry() {
        let h = harness();

        let unknown = h.service.issue(command("ghost", None, week())).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let past = h
            .service
            .issue(command("u1", None, TokenLifetime::ExpiresAt(start())))
            .await;
        assert!(matches!(past, Err(AppError::InvalidExpiry(_))));

        assert!(h.store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_unknown_value_is_not_found_without_penalty() {
        let h = harness();
        let issued = h.service.issue(command("u1", None, week())).await.unwrap();

        let outcome = h.service.validate("not-a-real-token").await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::NotFound));

        let record = stored(&h, &issued.token_id).await;
        assert_eq!(record.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_inclusive() {
        let h = harness();
        let issued = h
            .service
            .issue(command("u1", None, TokenLifetime::Ttl(Duration::hours(1))))
            .await
            .unwrap();

        h.clock.set(issued.expires_at - Duration::milliseconds(1));
        assert!(h.service.validate(&issued.token).await.unwrap().is_valid());

        h.clock.set(issued.expires_at);
        let outcome = h.service.validate(&issued.token).await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::Expired));
    }

    #[tokio::test]
    async fn test_five_failures_block_then_exhaust_until_reset() {
        let h = harness();
        let issued = h.service.issue(command("u1", Some("phone-1"), week())).await.unwrap();

        for attempt in 1..=5 {
            let record = h.service.record_failure(&issued.token_id).await.unwrap();
            assert_eq!(record.failed_attempts, attempt);
        }
        let record = stored(&h, &issued.token_id).await;
        assert_eq!(record.blocked_until, Some(start() + Duration::hours(1)));

        // 올바른 값도 차단 기간 동안 거부되고, 제시할 때마다 실패로 기록됨
        let outcome = h.service.validate(&issued.token).await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::Blocked));
        assert_eq!(stored(&h, &issued.token_id).await.failed_attempts, 6);

        h.clock.advance(Duration::hours(1) + Duration::minutes(1));
        let outcome = h.service.validate(&issued.token).await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::Exhausted));

        h.service.reset_failures(&issued.token_id).await.unwrap();
        let outcome = h.service.validate(&issued.token).await.unwrap();
        assert!(outcome.is_valid());

        let record = stored(&h, &issued.token_id).await;
        assert_eq!(record.failed_attempts, 0);
        assert_eq!(record.blocked_until, None);
        assert_eq!(record.usage_count, 1);
    }

    #[tokio::test]
    async fn test_revoke_is_terminal_and_idempotent() {
        let h = harness();
        let issued = h.service.issue(command("u1", None, week())).await.unwrap();

        assert_eq!(h.service.revoke(&issued.token_id).await.unwrap(), 1);
        assert_eq!(h.service.revoke(&issued.token_id).await.unwrap(), 0);
        assert!(stored(&h, &issued.token_id).await.revoked);

        for _ in 0..3 {
            let outcome = h.service.validate(&issued.token).await.unwrap();
            assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::Revoked));
        }
        // 종료 상태는 벌점 대상이 아님
        assert_eq!(stored(&h, &issued.token_id).await.failed_attempts, 0);

        let missing = h.service.revoke(&ObjectId::new().to_hex()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let malformed = h.service.revoke("not-an-id").await;
        assert!(matches!(malformed, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_revoke_all_for_user_keeps_current_session() {
        let h = harness();
        let current = h.service.issue(command("u1", Some("phone"), week())).await.unwrap();
        let other = h.service.issue(command("u1", Some("laptop"), week())).await.unwrap();
        let foreign = h.service.issue(command("u2", Some("laptop"), week())).await.unwrap();

        let affected = h
            .service
            .revoke_all_for_user("u1", Some(&current.token_id))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        assert!(h.service.validate(&current.token).await.unwrap().is_valid());
        assert!(!h.service.validate(&other.token).await.unwrap().is_valid());
        assert!(h.service.validate(&foreign.token).await.unwrap().is_valid());

        let unknown = h.service.revoke_all_for_user("ghost", None).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_revoke_all_for_device() {
        let h = harness();
        h.service.issue(command("u1", Some("tablet"), week())).await.unwrap();
        h.service.issue(command("u1", Some("tablet"), week())).await.unwrap();
        let phone = h.service.issue(command("u1", Some("phone"), week())).await.unwrap();

        assert_eq!(h.service.revoke_all_for_device("u1", "tablet").await.unwrap(), 2);
        assert_eq!(h.service.revoke_all_for_device("u1", "tablet").await.unwrap(), 0);
        assert!(h.service.validate(&phone.token).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_sessions_and_devices_exclude_closed_tokens() {
        let h = harness();
        let phone_old = h.service.issue(command("u1", Some("phone"), week())).await.unwrap();
        let phone_new = h.service.issue(command("u1", Some("phone"), week())).await.unwrap();
        let laptop = h.service.issue(command("u1", Some("laptop"), week())).await.unwrap();
        let revoked = h.service.issue(command("u1", Some("tv"), week())).await.unwrap();
        h.service.revoke(&revoked.token_id).await.unwrap();

        h.clock.advance(Duration::minutes(1));
        h.service.validate(&phone_old.token).await.unwrap();
        h.clock.advance(Duration::minutes(1));
        h.service.validate(&laptop.token).await.unwrap();

        let sessions = h.service.list_sessions("u1").await.unwrap();
        let ids: Vec<_> = sessions.iter().map(|s| s.token_id.as_str()).collect();
        assert_eq!(ids, vec![laptop.token_id.as_str(), phone_old.token_id.as_str(), phone_new.token_id.as_str()]);
        assert_eq!(sessions[0].ip_address.as_deref(), Some("10.0.0.1"));

        let devices = h.service.list_devices("u1").await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id.as_deref(), Some("laptop"));
        assert_eq!(devices[1].device_id.as_deref(), Some("phone"));
        assert_eq!(devices[1].token_count, 2);
        assert_eq!(devices[1].last_used_at, Some(start() + Duration::minutes(1)));
    }

    #[tokio::test]
    async fn test_find_usable_by_user_skips_blocked() {
        let h = harness_with(TokenPolicy {
            abuse: AbusePolicy { max_failed_attempts: 1, ..AbusePolicy::default() },
            ..TokenPolicy::default()
        });
        let good = h.service.issue(command("u1", None, week())).await.unwrap();
        let blocked = h.service.issue(command("u1", None, week())).await.unwrap();
        h.service.record_failure(&blocked.token_id).await.unwrap();

        let usable: Vec<RefreshToken> = h
            .service
            .find_usable_by_user("u1")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].id_string().as_deref(), Some(good.token_id.as_str()));
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_and_revoked_only() {
        let h = harness_with(TokenPolicy {
            retention: RetentionPolicy { grace_period: Duration::zero(), batch_size: 1000 },
            ..TokenPolicy::default()
        });
        let expiring = h
            .service
            .issue(command("u1", None, TokenLifetime::Ttl(Duration::days(1))))
            .await
            .unwrap();
        let revoked = h.service.issue(command("u1", None, week())).await.unwrap();
        let valid = h
            .service
            .issue(command("u1", None, TokenLifetime::Ttl(Duration::days(8))))
            .await
            .unwrap();
        h.service.revoke(&revoked.token_id).await.unwrap();

        // 첫 토큰은 어제 만료, 마지막 토큰은 6일 남음
        h.clock.advance(Duration::days(2));

        assert_eq!(h.service.sweep(10).await.unwrap(), 2);
        assert_eq!(h.store.len().unwrap(), 1);
        assert!(h.service.validate(&valid.token).await.unwrap().is_valid());
        assert_eq!(
            h.service.validate(&expiring.token).await.unwrap(),
            ValidationOutcome::Invalid(InvalidReason::NotFound)
        );
    }

    #[tokio::test]
    async fn test_sweep_honours_grace_period_and_marks() {
        let h = harness();
        let revoked = h.service.issue(command("u1", None, week())).await.unwrap();
        let marked = h.service.issue(command("u1", None, week())).await.unwrap();
        h.service.revoke(&revoked.token_id).await.unwrap();

        // 기본 유예 기간(7일) 안이므로 폐기된 토큰은 남아 있음
        assert_eq!(h.service.sweep(1000).await.unwrap(), 0);

        assert_eq!(h.service.mark_for_cleanup(&[marked.token_id.clone()]).await.unwrap(), 1);
        assert_eq!(h.service.sweep(1000).await.unwrap(), 1);
        assert_eq!(h.store.len().unwrap(), 1);

        h.clock.advance(Duration::days(8));
        assert_eq!(h.service.sweep(1000).await.unwrap(), 1);
        assert!(h.store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let h = harness();
        let issued = h.service.issue(command("u1", Some("phone"), week())).await.unwrap();

        assert!(h.service.soft_delete(&issued.token_id).await.unwrap());
        assert!(!h.service.soft_delete(&issued.token_id).await.unwrap());

        let outcome = h.service.validate(&issued.token).await.unwrap();
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::Deleted));
        assert!(h.service.list_sessions("u1").await.unwrap().is_empty());

        let failure = h.service.record_failure(&issued.token_id).await;
        assert!(matches!(failure, Err(AppError::NotFound(_))));

        assert!(h.service.restore(&issued.token_id).await.unwrap());
        assert!(h.service.validate(&issued.token).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_decryption_failure_surfaces_as_error() {
        let h = harness();
        let cipher = test_cipher();
        let plaintext = "orphaned-token";
        let orphan = RefreshToken::new(
            "u1".to_string(),
            cipher.lookup_hash(plaintext).unwrap(),
            SealedToken { key_id: "retired".to_string(), ciphertext: "AAAA".to_string() },
            start(),
            start() + Duration::days(1),
            SessionMetadata::default(),
        );
        h.store.insert(orphan).await.unwrap();

        let result = h.service.validate(plaintext).await;
        assert!(matches!(result, Err(AppError::DecryptionError(_))));
    }

    /// `record_success` 주변에 경합과 지연을 끼워 넣는 저장소
    ///
    /// - `race_first_success`: 첫 호출 직전에 다른 요청이 같은 버전으로 먼저 성공
    /// - `delay_before_commit` / `delay_after_commit`: 저장 전후의 지연
    #[derive(Default)]
    struct InterceptingStore {
        inner: InMemoryTokenStore,
        race_first_success: bool,
        raced: AtomicBool,
        delay_before_commit: Option<StdDuration>,
        delay_after_commit: Option<StdDuration>,
    }

    #[async_trait]
    impl TokenStore for InterceptingStore {
        async fn insert(&self, record: RefreshToken) -> AppResult<RefreshToken> {
            self.inner.insert(record).await
        }
        async fn find_by_id(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>> {
            self.inner.find_by_id(id).await
        }
        async fn find_by_lookup_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
            self.inner.find_by_lookup_hash(token_hash).await
        }
        async fn find_live_by_user(&self, user_id: &str) -> AppResult<TokenStream> {
            self.inner.find_live_by_user(user_id).await
        }
        async fn record_success(
            &self,
            id: &ObjectId,
            expected_version: i64,
            now: DateTime<Utc>,
        ) -> AppResult<Option<RefreshToken>> {
            if self.race_first_success && !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.record_success(id, expected_version, now).await?;
            }
            if let Some(delay) = self.delay_before_commit {
                tokio::time::sleep(delay).await;
            }
            let updated = self.inner.record_success(id, expected_version, now).await?;
            if let Some(delay) = self.delay_after_commit {
                tokio::time::sleep(delay).await;
            }
            Ok(updated)
        }
        async fn record_failure(
            &self,
            id: &ObjectId,
            now: DateTime<Utc>,
            policy: &AbusePolicy,
        ) -> AppResult<Option<RefreshToken>> {
            self.inner.record_failure(id, now, policy).await
        }
        async fn reset_failures(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>> {
            self.inner.reset_failures(id).await
        }
        async fn revoke(&self, scope: &RevokeScope, now: DateTime<Utc>) -> AppResult<u64> {
            self.inner.revoke(scope, now).await
        }
        async fn mark_for_cleanup(&self, ids: &[ObjectId]) -> AppResult<u64> {
            self.inner.mark_for_cleanup(ids).await
        }
        async fn soft_delete(&self, id: &ObjectId, now: DateTime<Utc>) -> AppResult<bool> {
            self.inner.soft_delete(id, now).await
        }
        async fn restore(&self, id: &ObjectId) -> AppResult<bool> {
            self.inner.restore(id).await
        }
        async fn find_cleanup_candidates(
            &self,
            now: DateTime<Utc>,
            abuse: &AbusePolicy,
            retention: &RetentionPolicy,
            limit: usize,
        ) -> AppResult<Vec<ObjectId>> {
            self.inner.find_cleanup_candidates(now, abuse, retention, limit).await
        }
        async fn purge(
            &self,
            ids: &[ObjectId],
            now: DateTime<Utc>,
            abuse: &AbusePolicy,
            retention: &RetentionPolicy,
        ) -> AppResult<u64> {
            self.inner.purge(ids, now, abuse, retention).await
        }
    }

    fn intercepted_service(store: Arc<InterceptingStore>) -> TokenService {
        TokenService::new(
            store,
            Arc::new(InMemoryUserDirectory::with_users(["u1"])),
            Arc::new(test_cipher()),
            TokenPolicy::default(),
            Arc::new(ManualClock::new(start())),
        )
    }

    #[tokio::test]
    async fn test_losing_concurrent_use_is_a_conflict_not_a_second_success() {
        let store = Arc::new(InterceptingStore { race_first_success: true, ..Default::default() });
        let service = intercepted_service(store.clone());
        let issued = service.issue(command("u1", None, week())).await.unwrap();

        let result = service.validate(&issued.token).await;
        assert!(matches!(result, Err(AppError::ConcurrencyConflict(_))));

        let record = store.find_by_id(&ObjectId::parse_str(&issued.token_id).unwrap()).await.unwrap().unwrap();
        assert_eq!(record.usage_count, 1);
        assert_eq!(record.version, 1);

        // 충돌 뒤 재시도는 정상 처리
        assert!(service.validate(&issued.token).await.unwrap().is_valid());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_validations_never_lose_updates() {
        let h = harness();
        let service = Arc::new(h.service);
        let issued = service.issue(command("u1", None, week())).await.unwrap();

        // 임계값 직전까지 실패를 쌓아 둠
        for _ in 0..(AbusePolicy::default().max_failed_attempts - 1) {
            service.record_failure(&issued.token_id).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let token = issued.token.clone();
            handles.push(tokio::spawn(async move { service.validate(&token).await }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) if outcome.is_valid() => successes += 1,
                Ok(other) => panic!("unexpected outcome {:?}", other),
                Err(AppError::ConcurrencyConflict(_)) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }

        let record = h.store.find_by_id(&ObjectId::parse_str(&issued.token_id).unwrap()).await.unwrap().unwrap();
        assert!(successes >= 1);
        assert_eq!(record.usage_count, successes);
        assert_eq!(record.failed_attempts, 0);
        assert_eq!(record.blocked_until, None);
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        struct SlowUsers;

        #[async_trait]
        impl UserDirectory for SlowUsers {
            async fn user_exists(&self, _user_id: &str) -> AppResult<bool> {
                tokio::time::sleep(StdDuration::from_millis(200)).await;
                Ok(true)
            }
        }

        let service = TokenService::new(
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(SlowUsers),
            Arc::new(test_cipher()),
            TokenPolicy::default(),
            Arc::new(ManualClock::new(start())),
        );

        let result = service
            .issue_within(command("u1", None, week()), StdDuration::from_millis(10))
            .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_validate_timeout_before_commit_leaves_record_untouched() {
        let store = Arc::new(InterceptingStore {
            delay_before_commit: Some(StdDuration::from_millis(200)),
            ..Default::default()
        });
        let service = intercepted_service(store.clone());
        let issued = service.issue(command("u1", None, week())).await.unwrap();

        let result = service.validate_within(&issued.token, StdDuration::from_millis(10)).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));

        let record = store.find_by_id(&ObjectId::parse_str(&issued.token_id).unwrap()).await.unwrap().unwrap();
        assert_eq!(record.usage_count, 0);
        assert_eq!(record.failed_attempts, 0);
        assert_eq!(record.last_used_at, None);
        assert_eq!(record.version, 0);
    }

    #[tokio::test]
    async fn test_validate_timeout_after_commit_keeps_full_update() {
        let store = Arc::new(InterceptingStore {
            delay_after_commit: Some(StdDuration::from_millis(200)),
            ..Default::default()
        });
        let service = intercepted_service(store.clone());
        let issued = service.issue(command("u1", None, week())).await.unwrap();

        let result = service.validate_within(&issued.token, StdDuration::from_millis(10)).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));

        let record = store.find_by_id(&ObjectId::parse_str(&issued.token_id).unwrap()).await.unwrap().unwrap();
        assert_eq!(record.usage_count, 1);
        assert_eq!(record.failed_attempts, 0);
        assert_eq!(record.last_used_at, Some(start()));
        assert_eq!(record.version, 1);
    }
}
