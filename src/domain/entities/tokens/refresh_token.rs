//! Refresh Token Entity
//!
//! `refresh_tokens` 컬렉션에 저장되는 리프레시 토큰 레코드입니다.
//! 평문 토큰 값은 이 구조체에 절대 들어오지 않고, 암호문(`encrypted_value`)과
//! 조회용 HMAC 해시(`token_hash`)만 저장됩니다.
//!
//! "유효한가", "만료되었는가" 같은 상태 필드는 없습니다. 상태는 항상
//! [`crate::domain::models::token::validity::classify`]로 다시 계산합니다.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::domain::entities::soft_delete::SoftDeletable;
use crate::domain::models::token::sealed_token::SealedToken;
use crate::utils::bson_time;
use crate::utils::string_utils::clean_optional_string;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// 소유 사용자 ID (생성 후 불변)
    pub user_id: String,

    /// HMAC-SHA256(lookup key, 평문) - 유니크 인덱스
    pub token_hash: String,

    /// base64(nonce || AES-256-GCM 암호문)
    pub encrypted_value: String,

    /// 암호화에 사용한 키 ID (키 교체 지원)
    pub encryption_key_id: String,

    #[serde(with = "bson_time")]
    pub issued_at: DateTime<Utc>,

    #[serde(with = "bson_time")]
    pub expires_at: DateTime<Utc>,

    /// false → true 단방향
    #[serde(default)]
    pub revoked: bool,

    #[serde(default, with = "bson_time::option")]
    pub revoked_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub failed_attempts: u32,

    #[serde(default, with = "bson_time::option")]
    pub blocked_until: Option<DateTime<Utc>>,

    #[serde(default)]
    pub usage_count: u64,

    #[serde(default, with = "bson_time::option")]
    pub last_used_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,

    /// 감사용 메타데이터, 인가 판단에는 사용하지 않음
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub marked_for_cleanup: bool,

    #[serde(default)]
    pub soft_deleted: bool,

    #[serde(default, with = "bson_time::option")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// 낙관적 잠금 버전, 모든 상태 변경마다 1 증가
    #[serde(default)]
    pub version: i64,
}

/// 발급 시점에 고정되는 세션/디바이스 정보
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetadata {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl SessionMetadata {
    /// 앞뒤 공백을 제거하고 빈 문자열은 `None`으로 정리합니다.
    pub fn normalized(self) -> Self {
        Self {
            device_id: clean_optional_string(self.device_id),
            device_name: clean_optional_string(self.device_name),
            device_type: clean_optional_string(self.device_type),
            source_ip: clean_optional_string(self.source_ip),
            user_agent: clean_optional_string(self.user_agent),
        }
    }
}

impl RefreshToken {
    pub fn new(
        user_id: String,
        token_hash: String,
        sealed: SealedToken,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        metadata: SessionMetadata,
    ) -> Self {
        let metadata = metadata.normalized();

        Self {
            id: None,
            user_id,
            token_hash,
            encrypted_value: sealed.ciphertext,
            encryption_key_id: sealed.key_id,
            issued_at,
            expires_at,
            revoked: false,
            revoked_at: None,
            failed_attempts: 0,
            blocked_until: None,
            usage_count: 0,
            last_used_at: None,
            device_id: metadata.device_id,
            device_name: metadata.device_name,
            device_type: metadata.device_type,
            source_ip: metadata.source_ip,
            user_agent: metadata.user_agent,
            marked_for_cleanup: false,
            soft_deleted: false,
            deleted_at: None,
            version: 0,
        }
    }

    pub fn id_string(&self) -> Option<String> {
        self.id.map(|id| id.to_hex())
    }

    /// 복호화에 필요한 (키 ID, 암호문) 쌍
    pub fn sealed(&self) -> SealedToken {
        SealedToken {
            key_id: self.encryption_key_id.clone(),
            ciphertext: self.encrypted_value.clone(),
        }
    }

    /// 한 번도 사용되지 않은 토큰은 `None`이므로 정렬 시 가장 뒤로 갑니다.
    pub fn recency_key(&self) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
        (self.last_used_at, self.issued_at)
    }
}

impl SoftDeletable for RefreshToken {
    fn is_active(&self) -> bool {
        !self.soft_deleted
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        if !self.soft_deleted {
            self.soft_deleted = true;
            self.deleted_at = Some(at);
            self.version += 1;
        }
    }

    fn restore(&mut self) {
        if self.soft_deleted {
            self.soft_deleted = false;
            self.deleted_at = None;
            self.version += 1;
        }
    }
}
