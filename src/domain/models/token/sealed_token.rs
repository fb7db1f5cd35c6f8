//! 저장용으로 봉인된 토큰 값

use serde::{Deserialize, Serialize};

/// 암호화된 토큰 값과 그 암호화에 사용된 키 ID
///
/// `ciphertext`는 base64(nonce 12바이트 || 암호문 || 인증 태그)입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedToken {
    pub key_id: String,
    pub ciphertext: String,
}
