//! 리프레시 토큰 저장소 계약
//!
//! 엔진은 이 trait만 알고, MongoDB([`super::TokenRepository`])와
//! 인메모리([`super::InMemoryTokenStore`]) 구현이 같은 의미를 제공합니다.
//!
//! ## 원자성 규칙
//!
//! - `record_success`는 `version` 비교 후 교체(CAS)입니다. 다른 쓰기가 먼저
//!   반영되었으면 아무것도 바꾸지 않고 `None`을 돌려줍니다.
//! - `record_failure`는 저장소 안에서 실행되는 원자적 증가입니다.
//!   애플리케이션 메모리에서 읽고-고치고-쓰지 않습니다.
//! - 모든 상태 변경은 `version`을 1 올립니다.
//! - `purge`는 삭제 시점에 정리 조건을 다시 확인합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use mongodb::bson::oid::ObjectId;

use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::{AbusePolicy, RetentionPolicy};
use crate::errors::AppResult;

/// 일괄 폐기 범위
#[derive(Debug, Clone, PartialEq)]
pub enum RevokeScope {
    Token(ObjectId),
    User {
        user_id: String,
        except: Option<ObjectId>,
    },
    Device {
        user_id: String,
        device_id: String,
    },
}

pub type TokenStream = BoxStream<'static, AppResult<RefreshToken>>;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 새 레코드를 저장하고 ID가 채워진 레코드를 돌려줍니다.
    /// 조회 해시나 암호문이 중복되면 `ConflictError`.
    async fn insert(&self, record: RefreshToken) -> AppResult<RefreshToken>;

    async fn find_by_id(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>>;

    /// 소프트 삭제된 레코드도 돌려줍니다 (`deleted` 사유 판정용).
    async fn find_by_lookup_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>>;

    /// 사용자의 삭제되지 않은 레코드를 최근 사용 순으로 흘려보냅니다.
    /// 한 번도 쓰이지 않은 레코드는 뒤쪽에 발급 시각 역순으로 옵니다.
    async fn find_live_by_user(&self, user_id: &str) -> AppResult<TokenStream>;

    async fn record_success(
        &self,
        id: &ObjectId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshToken>>;

    async fn record_failure(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
        policy: &AbusePolicy,
    ) -> AppResult<Option<RefreshToken>>;

    async fn reset_failures(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>>;

    /// 폐기되지 않았고 삭제되지 않은 레코드만 바꾸고, 바뀐 개수를 돌려줍니다.
    async fn revoke(&self, scope: &RevokeScope, now: DateTime<Utc>) -> AppResult<u64>;

    async fn mark_for_cleanup(&self, ids: &[ObjectId]) -> AppResult<u64>;

    /// 실제로 상태가 바뀌었으면 `true`
    async fn soft_delete(&self, id: &ObjectId, now: DateTime<Utc>) -> AppResult<bool>;

    async fn restore(&self, id: &ObjectId) -> AppResult<bool>;

    /// 지금 물리 삭제해도 되는 레코드 ID를 최대 `limit`개 고릅니다.
    async fn find_cleanup_candidates(
        &self,
        now: DateTime<Utc>,
        abuse: &AbusePolicy,
        retention: &RetentionPolicy,
        limit: usize,
    ) -> AppResult<Vec<ObjectId>>;

    /// 주어진 ID 중 여전히 정리 조건을 만족하는 레코드만 삭제합니다.
    async fn purge(
        &self,
        ids: &[ObjectId],
        now: DateTime<Utc>,
        abuse: &AbusePolicy,
        retention: &RetentionPolicy,
    ) -> AppResult<u64>;
}

/// 여러 인스턴스가 같은 컬렉션을 정리할 때 한 곳에서만 실행되도록 하는 잠금
#[async_trait]
pub trait SweepLock: Send + Sync {
    /// 잠금을 얻었으면 `true`. 이미 다른 보유자가 있으면 `false`.
    async fn try_acquire(&self, holder: &str, ttl_secs: u64) -> AppResult<bool>;

    async fn release(&self, holder: &str) -> AppResult<()>;
}
