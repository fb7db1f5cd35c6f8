//! # Redis 클라이언트
//!
//! 두 가지 용도로 사용합니다.
//!
//! - **조회 캐시**: 사용자 존재 여부 같은 자주 읽는 값을 JSON으로 TTL과 함께 저장
//! - **분산 잠금**: 여러 인스턴스 중 한 곳에서만 정리 작업이 돌도록 `SET NX EX` 잠금 제공
//!
//! 리프레시 토큰 레코드 자체는 캐시하지 않습니다. 검증 경로는 항상 MongoDB의
//! 최신 `version`을 읽어야 하기 때문입니다.
//!
//! 연결은 멀티플렉싱 연결을 요청마다 얻어 씁니다.

use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use std::env;

/// 자신이 잡은 잠금만 해제하는 compare-and-delete 스크립트
const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis 클라이언트 래퍼
///
/// ```rust,ignore
/// let redis = RedisClient::new().await?;
///
/// redis.set_with_expiry("user:exists:abc", &true, 600).await?;
/// let cached: Option<bool> = redis.get("user:exists:abc").await?;
///
/// if redis.try_acquire_lock("lock:token_sweep", "node-1", 300).await? {
///     // 정리 작업
///     redis.release_lock("lock:token_sweep", "node-1").await?;
/// }
/// ```
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "Serialization failed", e.to_string()))
}

impl RedisClient {
    /// `REDIS_URL`(기본값 `redis://localhost:6379`)로 연결하고 PING으로 확인합니다.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let redis_url = env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = Client::open(redis_url)?;

        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;

        log::info!("✅ Redis 연결 성공");

        Ok(Self { client })
    }

    /// JSON으로 저장된 값을 읽습니다. 키가 없으면 `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(json) => {
                let deserialized = serde_json::from_str(&json).map_err(|e| {
                    redis::RedisError::from((redis::ErrorKind::TypeError, "Deserialization failed", e.to_string()))
                })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(value).map_err(serialization_error)?;
        conn.set(key, json).await
    }

    pub async fn set_with_expiry<T: Serialize>(&self, key: &str, value: &T, seconds: usize) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(value).map_err(serialization_error)?;
        conn.set_ex(key, json, seconds as u64).await
    }

    pub async fn del(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(key).await
    }

    pub async fn del_multiple(&self, keys: &[String]) -> Result<(), redis::RedisError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(keys).await
    }

    /// KEYS 명령 래퍼. 블로킹 명령이므로 좁은 패턴에만 사용합니다.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.keys(pattern).await
    }

    /// `SET key holder NX EX ttl`
    ///
    /// 잠금을 얻었으면 `true`, 다른 보유자가 있으면 `false`.
    /// 보유자가 죽어도 TTL이 지나면 잠금이 풀립니다.
    pub async fn try_acquire_lock(&self, key: &str, holder: &str, ttl_secs: u64) -> Result<bool, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(holder)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    /// 보유자가 일치할 때만 잠금을 지웁니다. 지웠으면 `true`.
    pub async fn release_lock(&self, key: &str, holder: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let deleted: i64 = redis::Script::new(RELEASE_LOCK_SCRIPT)
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await?;

        Ok(deleted > 0)
    }
}

impl Default for RedisClient {
    /// 연결 확인 없이 클라이언트만 만듭니다. 운영 코드는 `RedisClient::new().await`를 사용하세요.
    fn default() -> Self {
        let redis_url = env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = Client::open(redis_url)
            .expect("Failed to create Redis client with default configuration");

        Self { client }
    }
}
