//! # MongoDB 리프레시 토큰 리포지토리
//!
//! `refresh_tokens` 컬렉션에 대한 [`TokenStore`] 구현입니다.
//!
//! ## 원자성
//!
//! - 성공 기록: `{_id, version}` 필터의 `find_one_and_update` (CAS)
//! - 실패 기록: 집계 파이프라인 업데이트로 증가와 차단 판정을 서버에서 한 번에 수행
//! - 폐기/정리 표시/소프트 삭제: 조건부 `update_many`/`update_one`, 바뀐 문서 수로 멱등성 판단
//! - 물리 삭제: 정리 조건을 필터에 다시 넣은 `delete_many`
//!
//! ## 인덱스
//!
//! | 이름 | 키 | 옵션 |
//! |------|----|------|
//! | `token_hash_unique` | `token_hash` | unique |
//! | `encrypted_value_unique_live` | `encrypted_value` | unique, partial(`soft_deleted: false`) |
//! | `user_device` | `user_id, device_id` | |
//! | `expires_at` | `expires_at` | |
//! | `blocked_until` | `blocked_until` | |
//! | `issued_at` | `issued_at` | |
//!
//! 토큰 레코드는 Redis에 캐시하지 않습니다. Redis는 정리 작업 잠금에만 사용합니다.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, TryStreamExt};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::IndexModel;
use singleton_macro::repository;

use crate::caching::redis::RedisClient;
use crate::core::registry::Repository;
use crate::db::{is_duplicate_key_error, Database};
use crate::domain::entities::soft_delete::SoftDeletable;
use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::retention::grace_cutoff;
use crate::domain::models::token::{AbusePolicy, RetentionPolicy};
use crate::errors::{AppError, AppResult, ErrorContext};
use crate::repositories::tokens::token_store::{RevokeScope, SweepLock, TokenStore, TokenStream};
use crate::utils::bson_time;

/// 정리 작업 잠금 키
const SWEEP_LOCK_KEY: &str = "lock:refresh_tokens:sweep";

#[repository(name = "token", collection = "refresh_tokens")]
pub struct TokenRepository {
    db: Arc<Database>,
    redis: Arc<RedisClient>,
}

/// 정리 대상 필터
///
/// 정리 표시된 문서는 유예 기간 없이 포함되고, 나머지는 유예 기간 이전에 발급되었으면서
/// 만료/폐기/소프트 삭제 중 하나에 해당해야 합니다.
fn cleanup_filter(now: DateTime<Utc>, retention: &RetentionPolicy) -> Document {
    doc! {
        "$or": [
            { "marked_for_cleanup": true },
            {
                "issued_at": { "$lte": bson_time::to_bson(grace_cutoff(now, retention)) },
                "$or": [
                    { "expires_at": { "$lte": bson_time::to_bson(now) } },
                    { "revoked": true },
                    { "soft_deleted": true },
                ],
            },
        ]
    }
}

/// 폐기 범위를 필터로 바꿉니다. 이미 폐기/삭제된 문서는 항상 제외합니다.
fn revoke_filter(scope: &RevokeScope) -> Document {
    let mut filter = match scope {
        RevokeScope::Token(id) => doc! { "_id": *id },
        RevokeScope::User { user_id, except: None } => doc! { "user_id": user_id.as_str() },
        RevokeScope::User { user_id, except: Some(keep) } => doc! {
            "user_id": user_id.as_str(),
            "_id": { "$ne": *keep },
        },
        RevokeScope::Device { user_id, device_id } => doc! {
            "user_id": user_id.as_str(),
            "device_id": device_id.as_str(),
        },
    };
    filter.insert("revoked", doc! { "$ne": true });
    filter.extend(RefreshToken::active_filter());
    filter
}

/// 실패 기록 파이프라인
///
/// 1단계에서 증가시킨 `failed_attempts`를 2단계에서 읽어 차단 여부를 정합니다.
fn failure_pipeline(now: DateTime<Utc>, policy: &AbusePolicy) -> Vec<Document> {
    let blocked_until = bson_time::to_bson(now + policy.block_window);
    let threshold = policy.max_failed_attempts as i64;

    vec![
        doc! {
            "$set": {
                "failed_attempts": { "$add": [{ "$ifNull": ["$failed_attempts", 0] }, 1] },
                "version": { "$add": [{ "$ifNull": ["$version", 0] }, 1] },
            }
        },
        doc! {
            "$set": {
                "blocked_until": {
                    "$cond": [
                        { "$gte": ["$failed_attempts", threshold] },
                        blocked_until,
                        { "$ifNull": ["$blocked_until", Bson::Null] },
                    ]
                }
            }
        },
    ]
}

impl TokenRepository {
    /// 애플리케이션 시작 시 한 번 호출합니다.
    pub async fn create_indexes(&self) -> AppResult<()> {
        let collection = self.collection::<RefreshToken>();

        let hash_index = IndexModel::builder()
            .keys(doc! { "token_hash": 1 })
            .options(IndexOptions::builder()
                .unique(true)
                .name("token_hash_unique".to_string())
                .build())
            .build();

        // 소프트 삭제된 문서는 암호문 유일성 검사에서 빠짐
        let ciphertext_index = IndexModel::builder()
            .keys(doc! { "encrypted_value": 1 })
            .options(IndexOptions::builder()
                .unique(true)
                .partial_filter_expression(doc! { "soft_deleted": false })
                .name("encrypted_value_unique_live".to_string())
                .build())
            .build();

        let user_device_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "device_id": 1 })
            .options(IndexOptions::builder()
                .name("user_device".to_string())
                .build())
            .build();

        let expires_index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(IndexOptions::builder()
                .name("expires_at".to_string())
                .build())
            .build();

        let blocked_index = IndexModel::builder()
            .keys(doc! { "blocked_until": 1 })
            .options(IndexOptions::builder()
                .name("blocked_until".to_string())
                .build())
            .build();

        let issued_index = IndexModel::builder()
            .keys(doc! { "issued_at": 1 })
            .options(IndexOptions::builder()
                .name("issued_at".to_string())
                .build())
            .build();

        collection
            .create_indexes([
                hash_index,
                ciphertext_index,
                user_device_index,
                expires_index,
                blocked_index,
                issued_index,
            ])
            .await?;

        log::info!("✅ refresh_tokens 인덱스 준비 완료");
        Ok(())
    }

    async fn update_and_return(&self, filter: Document, update: Document) -> AppResult<Option<RefreshToken>> {
        let updated = self.collection::<RefreshToken>()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }
}

#[async_trait]
impl TokenStore for TokenRepository {
    async fn insert(&self, mut record: RefreshToken) -> AppResult<RefreshToken> {
        let result = self.collection::<RefreshToken>()
            .insert_one(&record)
            .await
            .map_err(|e| {
                if is_duplicate_key_error(&e) {
                    AppError::ConflictError("token_hash or encrypted_value already exists".to_string())
                } else {
                    AppError::from(e)
                }
            })?;

        record.id = result.inserted_id.as_object_id();
        Ok(record)
    }

    async fn find_by_id(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>> {
        let record = self.collection::<RefreshToken>()
            .find_one(doc! { "_id": *id })
            .await?;
        Ok(record)
    }

    async fn find_by_lookup_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
        let record = self.collection::<RefreshToken>()
            .find_one(doc! { "token_hash": token_hash })
            .await?;
        Ok(record)
    }

    async fn find_live_by_user(&self, user_id: &str) -> AppResult<TokenStream> {
        let mut filter = doc! { "user_id": user_id };
        filter.extend(RefreshToken::active_filter());

        // 내림차순 정렬에서 null(미사용)은 뒤로 감
        let cursor = self.collection::<RefreshToken>()
            .find(filter)
            .sort(doc! { "last_used_at": -1, "issued_at": -1 })
            .await?;

        Ok(cursor.map_err(AppError::from).boxed())
    }

    async fn record_success(
        &self,
        id: &ObjectId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshToken>> {
        self.update_and_return(
            doc! { "_id": *id, "version": expected_version },
            doc! {
                "$set": {
                    "failed_attempts": 0_i64,
                    "blocked_until": Bson::Null,
                    "last_used_at": bson_time::to_bson(now),
                },
                "$inc": { "usage_count": 1_i64, "version": 1_i64 },
            },
        )
        .await
    }

    async fn record_failure(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
        policy: &AbusePolicy,
    ) -> AppResult<Option<RefreshToken>> {
        let updated = self.collection::<RefreshToken>()
            .find_one_and_update(doc! { "_id": *id }, failure_pipeline(now, policy))
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn reset_failures(&self, id: &ObjectId) -> AppResult<Option<RefreshToken>> {
        self.update_and_return(
            doc! { "_id": *id },
            doc! {
                "$set": { "failed_attempts": 0_i64, "blocked_until": Bson::Null },
                "$inc": { "version": 1_i64 },
            },
        )
        .await
    }

    async fn revoke(&self, scope: &RevokeScope, now: DateTime<Utc>) -> AppResult<u64> {
        let result = self.collection::<RefreshToken>()
            .update_many(
                revoke_filter(scope),
                doc! {
                    "$set": { "revoked": true, "revoked_at": bson_time::to_bson(now) },
                    "$inc": { "version": 1_i64 },
                },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn mark_for_cleanup(&self, ids: &[ObjectId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = self.collection::<RefreshToken>()
            .update_many(
                doc! { "_id": { "$in": ids.to_vec() }, "marked_for_cleanup": { "$ne": true } },
                doc! {
                    "$set": { "marked_for_cleanup": true },
                    "$inc": { "version": 1_i64 },
                },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn soft_delete(&self, id: &ObjectId, now: DateTime<Utc>) -> AppResult<bool> {
        let mut filter = doc! { "_id": *id };
        filter.extend(RefreshToken::active_filter());

        let result = self.collection::<RefreshToken>()
            .update_one(
                filter,
                doc! {
                    "$set": { "soft_deleted": true, "deleted_at": bson_time::to_bson(now) },
                    "$inc": { "version": 1_i64 },
                },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn restore(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.collection::<RefreshToken>()
            .update_one(
                doc! { "_id": *id, "soft_deleted": true },
                doc! {
                    "$set": { "soft_deleted": false, "deleted_at": Bson::Null },
                    "$inc": { "version": 1_i64 },
                },
            )
            .await
            .map_err(|e| {
                // 같은 암호문의 살아있는 레코드가 이미 있으면 되살릴 수 없음
                if is_duplicate_key_error(&e) {
                    AppError::ConflictError("a live token with the same value exists".to_string())
                } else {
                    AppError::from(e)
                }
            })?;
        Ok(result.modified_count > 0)
    }

    async fn find_cleanup_candidates(
        &self,
        now: DateTime<Utc>,
        _abuse: &AbusePolicy,
        retention: &RetentionPolicy,
        limit: usize,
    ) -> AppResult<Vec<ObjectId>> {
        let documents: Vec<Document> = self.collection::<Document>()
            .find(cleanup_filter(now, retention))
            .projection(doc! { "_id": 1 })
            .limit(limit as i64)
            .await?
            .try_collect()
            .await?;

        Ok(documents
            .iter()
            .filter_map(|document| document.get_object_id("_id").ok())
            .collect())
    }

    async fn purge(
        &self,
        ids: &[ObjectId],
        now: DateTime<Utc>,
        _abuse: &AbusePolicy,
        retention: &RetentionPolicy,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let filter = doc! {
            "$and": [
                { "_id": { "$in": ids.to_vec() } },
                cleanup_filter(now, retention),
            ]
        };

        let result = self.collection::<RefreshToken>()
            .delete_many(filter)
            .await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl SweepLock for TokenRepository {
    async fn try_acquire(&self, holder: &str, ttl_secs: u64) -> AppResult<bool> {
        self.redis
            .try_acquire_lock(SWEEP_LOCK_KEY, holder, ttl_secs)
            .await
            .context("정리 잠금 획득 실패")
    }

    async fn release(&self, holder: &str) -> AppResult<()> {
        let released = self.redis
            .release_lock(SWEEP_LOCK_KEY, holder)
            .await
            .context("정리 잠금 해제 실패")?;
        if !released {
            log::warn!("⚠️ 정리 잠금이 이미 만료되었거나 다른 보유자에게 넘어갔습니다");
        }
        Ok(())
    }
}
