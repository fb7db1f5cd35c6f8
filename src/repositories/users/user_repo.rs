//! # 사용자 존재 확인 리포지토리
//!
//! 계정 서비스가 관리하는 `users` 컬렉션을 읽기 전용으로 조회합니다.
//! 문서 구조에는 의존하지 않고 `_id`만 봅니다.
//!
//! ## 캐싱
//!
//! - **키**: `user:{user_id}` (리포지토리 매크로의 `cache_key()`)
//! - **TTL**: 600초
//! - 존재하는 사용자만 캐시합니다. 없는 사용자를 캐시하면 방금 가입한 계정이 10분 동안 거부됩니다.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Document};
use singleton_macro::repository;

use crate::caching::redis::RedisClient;
use crate::core::registry::Repository;
use crate::db::Database;
use crate::errors::AppResult;
use crate::repositories::users::user_directory::UserDirectory;

const USER_EXISTS_TTL_SECS: usize = 600;

#[repository(name = "user", collection = "users")]
pub struct UserRepository {
    db: Arc<Database>,
    redis: Arc<RedisClient>,
}

/// 계정 서비스는 `_id`로 ObjectId를 쓰지만, 이관된 계정은 문자열 ID를 가질 수 있음
fn id_filter(user_id: &str) -> Document {
    match ObjectId::parse_str(user_id) {
        Ok(object_id) => doc! { "$or": [{ "_id": object_id }, { "_id": user_id }] },
        Err(_) => doc! { "_id": user_id },
    }
}

/// 캐시 오류는 조회를 막지 않습니다. 경고를 남기고 `None`을 돌려줍니다.
fn cache_outcome<T>(result: Result<T, redis::RedisError>, action: &str, user_id: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("⚠️ 사용자 존재 캐시 {} 실패: user_id={}, error={}", action, user_id, e);
            None
        }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn user_exists(&self, user_id: &str) -> AppResult<bool> {
        let cache_key = self.cache_key(user_id);

        let cached = self.redis.get::<bool>(&cache_key).await;
        if let Some(Some(true)) = cache_outcome(cached, "조회", user_id) {
            return Ok(true);
        }

        let count = self.collection::<Document>()
            .count_documents(id_filter(user_id))
            .limit(1)
            .await?;

        let exists = count > 0;
        if exists {
            let written = self.redis
                .set_with_expiry(&cache_key, &true, USER_EXISTS_TTL_SECS)
                .await;
            cache_outcome(written, "저장", user_id);
        }

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_filter_accepts_both_id_shapes() {
        let hex = "65a1b2c3d4e5f60718293a4b";
        let filter = id_filter(hex);
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);

        let filter = id_filter("legacy-user-7");
        assert_eq!(filter.get_str("_id").unwrap(), "legacy-user-7");
    }

    #[test]
    fn test_cache_errors_fall_through_instead_of_failing() {
        let down: Result<Option<bool>, redis::RedisError> = Err(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )));
        assert_eq!(cache_outcome(down, "조회", "u1"), None);

        assert_eq!(cache_outcome(Ok(Some(true)), "조회", "u1"), Some(Some(true)));
        assert_eq!(cache_outcome(Ok(()), "저장", "u1"), Some(()));
    }
}
