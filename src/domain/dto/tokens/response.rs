//! 리프레시 토큰 API 응답 DTO
//!
//! 저장된 암호문, 조회 해시는 어떤 응답에도 싣지 않습니다.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::tokens::RefreshToken;
use crate::domain::models::token::{DeviceSummary, IssuedToken, SessionSummary, TokenState};

/// 발급 응답. 평문 토큰은 여기서 한 번만 전달됩니다.
#[derive(Serialize)]
pub struct IssueTokenResponse {
    pub token_id: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for IssueTokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token_id: issued.token_id,
            refresh_token: issued.token,
            expires_at: issued.expires_at,
        }
    }
}

/// 검증 성공 응답. 실패는 사유 없이 401로 통일됩니다.
#[derive(Debug, Serialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub token_id: String,
    pub user_id: String,
}

/// 일괄 변경 작업의 영향 받은 레코드 수
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub affected: u64,
}

impl CountResponse {
    pub fn new(affected: u64) -> Self {
        Self { affected }
    }
}

/// 관리 경로에서 돌려주는 토큰 상태
#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    pub token_id: String,
    pub user_id: String,
    pub state: TokenState,
    pub failed_attempts: u32,
    pub blocked_until: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl TokenStatusResponse {
    pub fn new(record: &RefreshToken, state: TokenState) -> Self {
        Self {
            token_id: record.id_string().unwrap_or_default(),
            user_id: record.user_id.clone(),
            state,
            failed_attempts: record.failed_attempts,
            blocked_until: record.blocked_until,
            usage_count: record.usage_count,
            last_used_at: record.last_used_at,
            expires_at: record.expires_at,
        }
    }
}

/// 소프트 삭제/복원 결과
#[derive(Debug, Serialize)]
pub struct ChangedResponse {
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub user_id: String,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub user_id: String,
    pub devices: Vec<DeviceSummary>,
}
