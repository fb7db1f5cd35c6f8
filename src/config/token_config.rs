//! # Token Configuration Module
//!
//! 리프레시 토큰 엔진의 키 자료, 정책 값, API 키, 정리 스케줄 설정을 관리합니다.
//!
//! ## 필수 환경 변수
//!
//! ```bash
//! # 암호화 키 목록: key_id:base64(32바이트) 를 쉼표로 구분
//! export TOKEN_ENCRYPTION_KEYS="v1:3q2+7w...=,v2:Zm9vYmFy...="
//! # 새 토큰 암호화에 사용할 키 ID (생략 시 첫 번째 키)
//! export TOKEN_ENCRYPTION_ACTIVE_KEY="v2"
//! # 조회용 HMAC 키 (base64, 32바이트 이상)
//! export TOKEN_LOOKUP_KEY="c2VjcmV0LWxvb2t1cC1rZXk..."
//!
//! export SERVICE_API_KEY="..."
//! export ADMIN_API_KEY="..."
//! ```
//!
//! 키 자료에는 기본값이 없습니다. 값이 없거나 형식이 잘못되면 시작 시점에
//! `EncryptionError`로 실패합니다.

use std::env;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Duration;

use crate::domain::models::token::policy::{
    AbusePolicy, RetentionPolicy, TokenPolicy, DEFAULT_BLOCK_WINDOW_MINUTES,
    DEFAULT_CLEANUP_BATCH_SIZE, DEFAULT_CLEANUP_GRACE_DAYS, DEFAULT_MAX_FAILED_ATTEMPTS,
    DEFAULT_MAX_TTL_DAYS, DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_TTL_DAYS,
};
use crate::errors::{AppError, AppResult};

/// AES-256 키 길이
pub const ENCRYPTION_KEY_LEN: usize = 32;
/// HMAC 조회 키 최소 길이
pub const MIN_LOOKUP_KEY_LEN: usize = 32;

/// 환경 변수에서 파싱한 원시 키 자료
#[derive(Clone)]
pub struct TokenKeyMaterial {
    pub active_key_id: String,
    pub encryption_keys: Vec<(String, Vec<u8>)>,
    pub lookup_key: Vec<u8>,
}

impl std::fmt::Debug for TokenKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key_ids: Vec<&str> = self.encryption_keys.iter().map(|(id, _)| id.as_str()).collect();
        f.debug_struct("TokenKeyMaterial")
            .field("active_key_id", &self.active_key_id)
            .field("key_ids", &key_ids)
            .finish_non_exhaustive()
    }
}

pub struct TokenSecurityConfig;

impl TokenSecurityConfig {
    pub fn key_material() -> AppResult<TokenKeyMaterial> {
        let keys = env::var("TOKEN_ENCRYPTION_KEYS").map_err(|_| {
            AppError::EncryptionError("TOKEN_ENCRYPTION_KEYS가 설정되지 않았습니다".to_string())
        })?;
        let lookup = env::var("TOKEN_LOOKUP_KEY").map_err(|_| {
            AppError::EncryptionError("TOKEN_LOOKUP_KEY가 설정되지 않았습니다".to_string())
        })?;
        let active = env::var("TOKEN_ENCRYPTION_ACTIVE_KEY").ok();

        parse_key_material(&keys, active.as_deref(), &lookup)
    }
}

/// `key_id:base64,key_id:base64` 형식의 키 목록을 파싱합니다.
pub fn parse_key_material(
    keys_raw: &str,
    active_key_id: Option<&str>,
    lookup_raw: &str,
) -> AppResult<TokenKeyMaterial> {
    let mut encryption_keys: Vec<(String, Vec<u8>)> = Vec::new();

    for entry in keys_raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key_id, encoded) = entry.split_once(':').ok_or_else(|| {
            AppError::EncryptionError("암호화 키 항목은 key_id:base64 형식이어야 합니다".to_string())
        })?;
        let key_id = key_id.trim();
        if key_id.is_empty() {
            return Err(AppError::EncryptionError("암호화 키 ID가 비어 있습니다".to_string()));
        }
        if encryption_keys.iter().any(|(id, _)| id == key_id) {
            return Err(AppError::EncryptionError(format!("중복된 암호화 키 ID: {}", key_id)));
        }

        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
            AppError::EncryptionError(format!("키 {} base64 디코딩 실패: {}", key_id, e))
        })?;
        if bytes.len() != ENCRYPTION_KEY_LEN {
            return Err(AppError::EncryptionError(format!(
                "키 {}는 {}바이트여야 합니다 (현재 {}바이트)",
                key_id,
                ENCRYPTION_KEY_LEN,
                bytes.len()
            )));
        }
        encryption_keys.push((key_id.to_string(), bytes));
    }

    let first_key_id = encryption_keys
        .first()
        .map(|(id, _)| id.clone())
        .ok_or_else(|| AppError::EncryptionError("암호화 키가 하나도 없습니다".to_string()))?;

    let active_key_id = match active_key_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) if encryption_keys.iter().any(|(key_id, _)| key_id == id) => id.to_string(),
        Some(id) => {
            return Err(AppError::EncryptionError(format!(
                "활성 키 {}가 키 목록에 없습니다",
                id
            )));
        }
        None => first_key_id,
    };

    let lookup_key = STANDARD.decode(lookup_raw.trim()).map_err(|e| {
        AppError::EncryptionError(format!("TOKEN_LOOKUP_KEY base64 디코딩 실패: {}", e))
    })?;
    if lookup_key.len() < MIN_LOOKUP_KEY_LEN {
        return Err(AppError::EncryptionError(format!(
            "TOKEN_LOOKUP_KEY는 최소 {}바이트여야 합니다",
            MIN_LOOKUP_KEY_LEN
        )));
    }

    Ok(TokenKeyMaterial {
        active_key_id,
        encryption_keys,
        lookup_key,
    })
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{} 파싱 실패, 기본값 사용", name);
            default
        }),
        Err(_) => default,
    }
}

pub struct TokenPolicyConfig;

impl TokenPolicyConfig {
    pub fn max_failed_attempts() -> u32 {
        env_or("TOKEN_MAX_FAILED_ATTEMPTS", DEFAULT_MAX_FAILED_ATTEMPTS).max(1)
    }

    pub fn block_window_minutes() -> i64 {
        env_or("TOKEN_BLOCK_WINDOW_MINUTES", DEFAULT_BLOCK_WINDOW_MINUTES).max(1)
    }

    pub fn default_ttl_days() -> i64 {
        env_or("TOKEN_DEFAULT_TTL_DAYS", DEFAULT_TTL_DAYS).max(1)
    }

    pub fn max_ttl_days() -> i64 {
        env_or("TOKEN_MAX_TTL_DAYS", DEFAULT_MAX_TTL_DAYS).max(1)
    }

    pub fn operation_timeout_ms() -> u64 {
        env_or("TOKEN_OPERATION_TIMEOUT_MS", DEFAULT_OPERATION_TIMEOUT_MS).max(1)
    }

    pub fn cleanup_grace_days() -> i64 {
        env_or("TOKEN_CLEANUP_GRACE_DAYS", DEFAULT_CLEANUP_GRACE_DAYS).max(0)
    }

    pub fn cleanup_batch_size() -> usize {
        env_or("TOKEN_CLEANUP_BATCH_SIZE", DEFAULT_CLEANUP_BATCH_SIZE).max(1)
    }

    /// 환경 변수 값을 도메인 정책으로 조립합니다.
    pub fn policy() -> TokenPolicy {
        let default_ttl_days = Self::default_ttl_days();
        let max_ttl_days = Self::max_ttl_days().max(default_ttl_days);

        TokenPolicy {
            abuse: AbusePolicy {
                max_failed_attempts: Self::max_failed_attempts(),
                block_window: Duration::minutes(Self::block_window_minutes()),
            },
            retention: RetentionPolicy {
                grace_period: Duration::days(Self::cleanup_grace_days()),
                batch_size: Self::cleanup_batch_size(),
            },
            default_ttl: Duration::days(default_ttl_days),
            max_ttl: Duration::days(max_ttl_days),
            operation_timeout: std::time::Duration::from_millis(Self::operation_timeout_ms()),
        }
    }
}

/// 라우트 스코프별 API 키
pub struct ApiKeyConfig;

impl ApiKeyConfig {
    /// 인증 흐름(발급/검증/폐기/조회)용 키
    pub fn service_key() -> Option<String> {
        env::var("SERVICE_API_KEY").ok().filter(|k| !k.trim().is_empty())
    }

    /// 관리/유지보수(정리, 초기화, 소프트 삭제)용 키
    pub fn admin_key() -> Option<String> {
        env::var("ADMIN_API_KEY").ok().filter(|k| !k.trim().is_empty())
    }
}

/// 주기적 정리 작업 설정
pub struct SweepScheduleConfig;

impl SweepScheduleConfig {
    /// 0이면 스케줄러를 띄우지 않습니다.
    pub fn interval_secs() -> u64 {
        env_or("TOKEN_CLEANUP_INTERVAL_SECS", 3600u64)
    }

    /// 여러 인스턴스 중 하나만 정리하도록 잡는 Redis 잠금의 TTL
    pub fn lock_ttl_secs() -> u64 {
        env_or("TOKEN_CLEANUP_LOCK_TTL_SECS", 300u64).max(1)
    }
}
