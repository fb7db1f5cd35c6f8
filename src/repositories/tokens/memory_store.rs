//! 인메모리 토큰 저장소
//!
//! 로컬 개발과 엔진 테스트용 구현입니다. MongoDB 구현과 같은 원자성 규칙을 따릅니다.
//!
//! - 맵 잠금은 레코드를 찾거나 넣고 뺄 때만 잠깐 잡습니다.
//! - 레코드마다 별도의 `Mutex`가 있어서 서로 다른 토큰의 검증은 잠금을 공유하지 않습니다.
//! - 잠금 순서는 항상 `records` → `by_hash` → 레코드 `Mutex`입니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use mongodb::bson::oid::ObjectId;

use crate::domain::entities::soft_delete::SoftDeletable;
use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::abuse;
use crate::domain::models::token::retention::should_purge;
use crate::domain::models::token::{AbusePolicy, RetentionPolicy};
use crate::errors::{AppError, AppResult};
use crate::repositories::tokens::token_store::{RevokeScope, SweepLock, TokenStore, TokenStream};

type Slot = Arc<Mutex<RefreshToken>>;

fn poisoned<T>(_: T) -> AppError {
    AppError::InternalError("token store lock poisoned".to_string())
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    records: RwLock<HashMap<ObjectId, Slot>>,
    by_hash: RwLock<HashMap<String, ObjectId>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 수 (소프트 삭제 포함)
    pub fn len(&self) -> AppResult<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    fn slot(&self, id: &ObjectId) -> AppResult<Option<Slot>> {
        Ok(self.records.read().map_err(poisoned)?.get(id).cloned())
    }

    fn slots(&self) -> AppResult<Vec<Slot>> {
        Ok(self.records.read().map_err(poisoned)?.values().cloned().collect())
    }

    /// 레코드 하나를 잠근 채로 `f`를 적용하고 결과 사본을 돌려줍니다.
    fn with_record<F, R>(&self, id: &ObjectId, f: F) -> AppResult<Option<R>>
    where
        F: FnOnce(&mut RefreshToken) -> R,
    {
        match self.slot(id)? {
            Some(slot) => {
                let mut record = slot.lock().map_err(poisoned)?;
                Ok(Some(f(&mut record)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn insert(&self, mut record: RefreshToken) -> AppResult<RefreshToken> {
        let mut records = self.records.write().map_err(poisoned)?;
        let mut by_hash = self.by_hash.write().map_err(poisoned)?;

        if by_hash.contains_key(&record.token_hash) {
            return Err(AppError::ConflictError("token_hash already exists".to_string()));
        }
        for slot in records.values() {
            let existing = slot.lock().map_err(poisoned)?;
            if existing.is_active() && existing.encrypted_value == record.encrypted_value {
                return Err(AppError::ConflictError("encrypted_value already exists".to_string()));
            }
        }

        let id = ObjectId::new();
        record.id = Some(id);
        by_hash.insert(record.token_hash.clone(), id);
        records.insert(id, Arc::new(Mutex::new(record.clone())));

        Ok(record)
    }

    async fn find_by_id(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>> {
        self.with_record(id, |record| record.clone())
    }

    async fn find_by_lookup_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
        let id = self.by_hash.read().map_err(poisoned)?.get(token_hash).copied();
        match id {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn find_live_by_user(&self, user_id: &str) -> AppResult<TokenStream> {
        let mut live = Vec::new();
        for slot in self.slots()? {
            let record = slot.lock().map_err(poisoned)?;
            if record.user_id == user_id && record.is_active() {
                live.push(record.clone());
            }
        }
        live.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));

        Ok(stream::iter(live.into_iter().map(Ok)).boxed())
    }

    async fn record_success(
        &self,
        id: &ObjectId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshToken>> {
        let applied = self.with_record(id, |record| {
            if record.version != expected_version {
                return None;
            }
            abuse::record_success(record, now);
            Some(record.clone())
        })?;
        Ok(applied.flatten())
    }

    async fn record_failure(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
        policy: &AbusePolicy,
    ) -> AppResult<Option<RefreshToken>> {
        self.with_record(id, |record| {
            abuse::record_failure(record, now, policy);
            record.clone()
        })
    }

    async fn reset_failures(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>> {
        self.with_record(id, |record| {
            abuse::reset_failures(record);
            record.clone()
        })
    }

    async fn revoke(&self, scope: &RevokeScope, now: DateTime<Utc>) -> AppResult<u64> {
        let targets = match scope {
            RevokeScope::Token(id) => self.slot(id)?.into_iter().collect(),
            _ => self.slots()?,
        };

        let mut affected = 0;
        for slot in targets {
            let mut record = slot.lock().map_err(poisoned)?;
            let in_scope = match scope {
                RevokeScope::Token(_) => true,
                RevokeScope::User { user_id, except } => {
                    record.user_id == *user_id && (except.is_none() || record.id != *except)
                }
                RevokeScope::Device { user_id, device_id } => {
                    record.user_id == *user_id && record.device_id.as_deref() == Some(device_id.as_str())
                }
            };
            if in_scope && !record.revoked && record.is_active() {
                record.revoked = true;
                record.revoked_at = Some(now);
                record.version += 1;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn mark_for_cleanup(&self, ids: &[ObjectId]) -> AppResult<u64> {
        let mut affected = 0;
        for id in ids {
            let changed = self.with_record(id, |record| {
                if record.marked_for_cleanup {
                    return false;
                }
                record.marked_for_cleanup = true;
                record.version += 1;
                true
            })?;
            if changed == Some(true) {
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn soft_delete(&self, id: &ObjectId, now: DateTime<Utc>) -> AppResult<bool> {
        let changed = self.with_record(id, |record| {
            if !record.is_active() {
                return false;
            }
            record.mark_deleted(now);
            true
        })?;
        Ok(changed.unwrap_or(false))
    }

    async fn restore(&self, id: &ObjectId) -> AppResult<bool> {
        let changed = self.with_record(id, |record| {
            if record.is_active() {
                return false;
            }
            SoftDeletable::restore(record);
            true
        })?;
        Ok(changed.unwrap_or(false))
    }

    async fn find_cleanup_candidates(
        &self,
        now: DateTime<Utc>,
        abuse: &AbusePolicy,
        retention: &RetentionPolicy,
        limit: usize,
    ) -> AppResult<Vec<ObjectId>> {
        let mut candidates = Vec::new();
        for slot in self.slots()? {
            if candidates.len() >= limit {
                break;
            }
            let record = slot.lock().map_err(poisoned)?;
            if should_purge(&record, now, abuse, retention) {
                if let Some(id) = record.id {
                    candidates.push(id);
                }
            }
        }
        Ok(candidates)
    }

    async fn purge(
        &self,
        ids: &[ObjectId],
        now: DateTime<Utc>,
        abuse: &AbusePolicy,
        retention: &RetentionPolicy,
    ) -> AppResult<u64> {
        let mut records = self.records.write().map_err(poisoned)?;
        let mut by_hash = self.by_hash.write().map_err(poisoned)?;

        let mut removed = 0;
        for id in ids {
            let token_hash = match records.get(id) {
                Some(slot) => {
                    let record = slot.lock().map_err(poisoned)?;
                    if !should_purge(&record, now, abuse, retention) {
                        continue;
                    }
                    record.token_hash.clone()
                }
                None => continue,
            };
            records.remove(id);
            by_hash.remove(&token_hash);
            removed += 1;
        }
        Ok(removed)
    }
}

/// 단일 프로세스용 정리 잠금. TTL은 무시하고 보유자만 기억합니다.
#[derive(Debug, Default)]
pub struct LocalSweepLock {
    holder: Mutex<Option<String>>,
}

#[async_trait]
impl SweepLock for LocalSweepLock {
    async fn try_acquire(&self, holder: &str, _ttl_secs: u64) -> AppResult<bool> {
        let mut current = self.holder.lock().map_err(poisoned)?;
        if current.is_some() {
            return Ok(false);
        }
        *current = Some(holder.to_string());
        Ok(true)
    }

    async fn release(&self, holder: &str) -> AppResult<()> {
        let mut current = self.holder.lock().map_err(poisoned)?;
        if current.as_deref() == Some(holder) {
            *current = None;
        }
        Ok(())
    }
}
