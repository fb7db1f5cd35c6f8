//! 리프레시 토큰 API 요청 DTO
//!
//! JSON 역직렬화 후 `validator`로 형식을 검사하고, 엔진 명령으로 변환합니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::domain::entities::tokens::SessionMetadata;
use crate::domain::models::token::{IssueTokenCommand, TokenLifetime};
use crate::utils::string_utils::deserialize_optional_string;

/// 입력 단계의 TTL 상한 (10년). 실제 상한은 정책의 최대 TTL이 다시 적용합니다.
const MAX_TTL_SECONDS_INPUT: i64 = 10 * 365 * 24 * 60 * 60;

/// 토큰 발급 요청
///
/// `ttl_seconds`와 `expires_at`은 둘 중 하나만 지정할 수 있습니다.
/// 둘 다 없으면 정책의 기본 TTL을 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_single_lifetime"))]
pub struct IssueTokenRequest {
    #[validate(length(min = 1, max = 128, message = "user_id는 1-128자여야 합니다"))]
    pub user_id: String,

    #[validate(range(min = 1, max = MAX_TTL_SECONDS_INPUT, message = "ttl_seconds는 1초 이상 10년 이하여야 합니다"))]
    pub ttl_seconds: Option<i64>,

    pub expires_at: Option<DateTime<Utc>>,

    #[validate(length(max = 256))]
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub device_id: Option<String>,

    #[validate(length(max = 256))]
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub device_name: Option<String>,

    #[validate(length(max = 64))]
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub device_type: Option<String>,

    /// 생략하면 요청의 클라이언트 주소를 사용합니다.
    #[validate(length(max = 64))]
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub ip_address: Option<String>,

    #[validate(length(max = 512))]
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub user_agent: Option<String>,
}

fn validate_single_lifetime(req: &IssueTokenRequest) -> Result<(), ValidationError> {
    if req.ttl_seconds.is_some() && req.expires_at.is_some() {
        return Err(ValidationError::new("ambiguous_lifetime")
            .with_message("ttl_seconds와 expires_at 중 하나만 지정해주세요".into()));
    }
    Ok(())
}

impl IssueTokenRequest {
    pub fn lifetime(&self) -> TokenLifetime {
        match (self.ttl_seconds, self.expires_at) {
            // 표현할 수 없는 값은 최대값으로 두고 발급 단계에서 InvalidExpiry로 거부
            (Some(seconds), _) => {
                TokenLifetime::Ttl(Duration::try_seconds(seconds).unwrap_or(Duration::MAX))
            }
            (None, Some(at)) => TokenLifetime::ExpiresAt(at),
            (None, None) => TokenLifetime::Default,
        }
    }

    /// 본문에 없는 IP/User-Agent는 HTTP 요청에서 얻은 값으로 채웁니다.
    pub fn into_command(self, peer_ip: Option<String>, peer_user_agent: Option<String>) -> IssueTokenCommand {
        let lifetime = self.lifetime();
        IssueTokenCommand {
            user_id: self.user_id,
            lifetime,
            metadata: SessionMetadata {
                device_id: self.device_id,
                device_name: self.device_name,
                device_type: self.device_type,
                source_ip: self.ip_address.or(peer_ip),
                user_agent: self.user_agent.or(peer_user_agent),
            },
        }
    }
}

/// 토큰 검증(사용) 요청
#[derive(Deserialize, Validate)]
pub struct ValidateTokenRequest {
    #[validate(length(min = 1, max = 512))]
    pub token: String,
}

impl std::fmt::Debug for ValidateTokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidateTokenRequest").field("token", &"<redacted>").finish()
    }
}

/// 사용자 전체 폐기 요청 ("이 세션만 남기고 로그아웃")
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RevokeAllRequest {
    #[validate(length(equal = 24, message = "token_id는 24자리 16진수여야 합니다"))]
    pub except_token_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MarkCleanupRequest {
    #[validate(length(min = 1, max = 1000, message = "token_ids는 1-1000개여야 합니다"))]
    pub token_ids: Vec<String>,
}

/// 수동 정리 요청. `batch_size`를 생략하면 설정된 기본값을 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SweepRequest {
    #[validate(range(min = 1, max = 100000))]
    pub batch_size: Option<usize>,
}
