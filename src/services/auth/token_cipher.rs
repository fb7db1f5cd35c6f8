//! 토큰 식별자 생성 및 암호화 코덱
//!
//! 리프레시 토큰 평문은 발급 응답에 한 번만 실리고, 저장소에는 두 가지 형태로만 남습니다.
//!
//! - **암호문**: AES-256-GCM, 12바이트 랜덤 nonce, AAD = 키 ID.
//!   `base64(nonce || ciphertext || tag)` 형식으로 키 ID와 함께 저장합니다.
//! - **조회 해시**: HMAC-SHA256(lookup key, 평문)의 base64url. 결정적이므로
//!   유니크 인덱스로 레코드를 바로 찾을 수 있습니다.
//!
//! 키 자료는 [`crate::config::TokenSecurityConfig`]에서만 들어옵니다.
//! 여러 키를 동시에 들고 있을 수 있어서, 활성 키를 바꿔도 이전 키로 암호화된
//! 레코드는 계속 복호화됩니다.
//!
//! # 보안
//!
//! - 평문, 조회 해시, 키 바이트는 절대 로그에 남기지 않습니다.
//! - 후보 평문 비교는 `subtle`의 상수 시간 비교를 사용합니다.

use std::collections::HashMap;
use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::{TokenKeyMaterial, TokenSecurityConfig};
use crate::domain::models::token::SealedToken;
use crate::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub struct TokenCipher {
    keys: HashMap<String, Aes256Gcm>,
    active_key_id: String,
    lookup_key: Vec<u8>,
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher")
            .field("active_key_id", &self.active_key_id)
            .field("key_count", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl TokenCipher {
    pub fn new(material: &TokenKeyMaterial) -> AppResult<Self> {
        let mut keys = HashMap::with_capacity(material.encryption_keys.len());
        for (key_id, bytes) in &material.encryption_keys {
            let cipher = Aes256Gcm::new_from_slice(bytes).map_err(|_| {
                AppError::EncryptionError(format!("키 {}의 길이가 AES-256에 맞지 않습니다", key_id))
            })?;
            keys.insert(key_id.clone(), cipher);
        }

        if !keys.contains_key(&material.active_key_id) {
            return Err(AppError::EncryptionError(format!(
                "활성 키 {}를 찾을 수 없습니다",
                material.active_key_id
            )));
        }
        if material.lookup_key.is_empty() {
            return Err(AppError::EncryptionError("조회 키가 비어 있습니다".to_string()));
        }

        Ok(Self {
            keys,
            active_key_id: material.active_key_id.clone(),
            lookup_key: material.lookup_key.clone(),
        })
    }

    /// 환경 변수의 키 자료로 코덱을 만듭니다. 키가 없으면 `EncryptionError`.
    pub fn from_env() -> AppResult<Self> {
        let material = TokenSecurityConfig::key_material()?;
        let cipher = Self::new(&material)?;
        log::info!(
            "🔐 토큰 암호화 키 로드: 활성 키 {} (총 {}개)",
            cipher.active_key_id,
            cipher.keys.len()
        );
        Ok(cipher)
    }

    pub fn active_key_id(&self) -> &str {
        &self.active_key_id
    }

    /// 122비트 엔트로피의 불투명 토큰 값 (UUID v4, OS 난수 기반)
    pub fn generate() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn encrypt_for_storage(&self, plaintext: &str) -> AppResult<SealedToken> {
        let cipher = self.keys.get(&self.active_key_id).ok_or_else(|| {
            AppError::EncryptionError(format!("활성 키 {}를 사용할 수 없습니다", self.active_key_id))
        })?;

        let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().r#gen();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: self.active_key_id.as_bytes(),
                },
            )
            .map_err(|e| AppError::EncryptionError(format!("AES-GCM 암호화 실패: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(SealedToken {
            key_id: self.active_key_id.clone(),
            ciphertext: STANDARD.encode(sealed),
        })
    }

    pub fn decrypt_for_use(&self, sealed: &SealedToken) -> AppResult<String> {
        let cipher = self.keys.get(&sealed.key_id).ok_or_else(|| {
            log::error!(
                "🔑 알 수 없는 암호화 키 {} - 키 교체 과정에서 제거된 키일 수 있습니다",
                sealed.key_id
            );
            AppError::DecryptionError(format!("unknown key id {}", sealed.key_id))
        })?;

        let raw = STANDARD.decode(&sealed.ciphertext).map_err(|_| {
            log::error!("🚨 키 {}의 암호문이 base64 형식이 아닙니다 (데이터 손상)", sealed.key_id);
            AppError::DecryptionError("ciphertext is not valid base64".to_string())
        })?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            log::error!("🚨 키 {}의 암호문이 너무 짧습니다 (데이터 손상)", sealed.key_id);
            return Err(AppError::DecryptionError("ciphertext too short".to_string()));
        }

        let (nonce_bytes, body) = raw.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: body,
                    aad: sealed.key_id.as_bytes(),
                },
            )
            .map_err(|_| {
                log::error!(
                    "🚨 키 {}로 인증 태그 검증 실패 - 변조되었거나 키가 바뀌었습니다",
                    sealed.key_id
                );
                AppError::DecryptionError("authentication tag mismatch".to_string())
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::DecryptionError("plaintext is not valid UTF-8".to_string()))
    }

    /// 저장된 암호문을 복호화한 뒤 후보 평문과 상수 시간으로 비교합니다.
    pub fn matches(&self, candidate: &str, sealed: &SealedToken) -> AppResult<bool> {
        let stored = self.decrypt_for_use(sealed)?;
        Ok(bool::from(stored.as_bytes().ct_eq(candidate.as_bytes())))
    }

    /// 조회용 결정적 해시
    pub fn lookup_hash(&self, plaintext: &str) -> AppResult<String> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.lookup_key)
            .map_err(|e| AppError::EncryptionError(format!("HMAC 초기화 실패: {}", e)))?;
        mac.update(plaintext.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn material(keys: &[(&str, u8)], active: &str) -> TokenKeyMaterial {
        TokenKeyMaterial {
            active_key_id: active.to_string(),
            encryption_keys: keys
                .iter()
                .map(|(id, byte)| (id.to_string(), vec![*byte; 32]))
                .collect(),
            lookup_key: vec![42u8; 32],
        }
    }

    pub(crate) fn test_cipher() -> TokenCipher {
        TokenCipher::new(&material(&[("v1", 1)], "v1")).unwrap()
    }

    #[test]
    fn test_generate_is_uuid_v4_and_unique() {
        let a = TokenCipher::generate();
        let b = TokenCipher::generate();

        assert_ne!(a, b);
        let parsed = Uuid::parse_str(&a).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = test_cipher();
        let value = TokenCipher::generate();

        let sealed = cipher.encrypt_for_storage(&value).unwrap();

        assert_eq!(sealed.key_id, "v1");
        assert!(!sealed.ciphertext.contains(&value));
        assert_eq!(cipher.decrypt_for_use(&sealed).unwrap(), value);
    }

    #[test]
    fn test_encrypt_produces_different_ciphertexts() {
        let cipher = test_cipher();

        let first = cipher.encrypt_for_storage("same-token").unwrap();
        let second = cipher.encrypt_for_storage("same-token").unwrap();

        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_matches_candidate() {
        let cipher = test_cipher();
        let sealed = cipher.encrypt_for_storage("correct-value").unwrap();

        assert!(cipher.matches("correct-value", &sealed).unwrap());
        assert!(!cipher.matches("correct-valuf", &sealed).unwrap());
        assert!(!cipher.matches("", &sealed).unwrap());
    }

    #[test]
    fn test_corrupted_ciphertext_is_decryption_error() {
        let cipher = test_cipher();
        let mut sealed = cipher.encrypt_for_storage("value").unwrap();
        let mut raw = STANDARD.decode(&sealed.ciphertext).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        sealed.ciphertext = STANDARD.encode(raw);

        assert!(matches!(cipher.decrypt_for_use(&sealed), Err(AppError::DecryptionError(_))));

        let truncated = SealedToken { key_id: "v1".to_string(), ciphertext: STANDARD.encode([0u8; 8]) };
        assert!(matches!(cipher.decrypt_for_use(&truncated), Err(AppError::DecryptionError(_))));
    }

    #[test]
    fn test_key_id_is_bound_as_aad() {
        let cipher = TokenCipher::new(&material(&[("v1", 1), ("v2", 1)], "v1")).unwrap();
        let mut sealed = cipher.encrypt_for_storage("value").unwrap();

        // 같은 키 바이트라도 키 ID를 바꿔치기하면 복호화되지 않음
        sealed.key_id = "v2".to_string();
        assert!(matches!(cipher.decrypt_for_use(&sealed), Err(AppError::DecryptionError(_))));
    }

    #[test]
    fn test_rotation_keeps_old_ciphertexts_readable() {
        let old = TokenCipher::new(&material(&[("v1", 1)], "v1")).unwrap();
        let sealed_old = old.encrypt_for_storage("issued-before-rotation").unwrap();

        let rotated = TokenCipher::new(&material(&[("v1", 1), ("v2", 2)], "v2")).unwrap();
        let sealed_new = rotated.encrypt_for_storage("issued-after-rotation").unwrap();

        assert_eq!(sealed_new.key_id, "v2");
        assert_eq!(rotated.decrypt_for_use(&sealed_old).unwrap(), "issued-before-rotation");

        let retired = TokenCipher::new(&material(&[("v2", 2)], "v2")).unwrap();
        assert!(matches!(
            retired.decrypt_for_use(&sealed_old),
            Err(AppError::DecryptionError(msg)) if msg.contains("unknown key id")
        ));
    }

    #[test]
    fn test_lookup_hash_is_deterministic_and_keyed() {
        let cipher = test_cipher();
        let mut other_material = material(&[("v1", 1)], "v1");
        other_material.lookup_key = vec![7u8; 32];
        let other = TokenCipher::new(&other_material).unwrap();

        let h1 = cipher.lookup_hash("token").unwrap();
        assert_eq!(h1, cipher.lookup_hash("token").unwrap());
        assert_ne!(h1, cipher.lookup_hash("token2").unwrap());
        assert_ne!(h1, other.lookup_hash("token").unwrap());
        assert_eq!(h1.len(), 43);
    }

    #[test]
    fn test_missing_active_key_rejected() {
        let result = TokenCipher::new(&material(&[("v1", 1)], "v9"));
        assert!(matches!(result, Err(AppError::EncryptionError(_))));
    }

    #[test]
    fn test_invalid_key_length_rejected() {
        let mut bad = material(&[("v1", 1)], "v1");
        bad.encryption_keys[0].1 = vec![1u8; 16];

        assert!(matches!(TokenCipher::new(&bad), Err(AppError::EncryptionError(_))));
    }
}
