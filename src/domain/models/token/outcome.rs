//! 검증 결과 타입

use serde::{Deserialize, Serialize};
use std::fmt;

/// 토큰을 사용할 수 없는 이유
///
/// 내부 로깅/메트릭 전용입니다. 신뢰할 수 없는 호출자에게는
/// 사유를 구분하지 않은 "invalid session"만 전달합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    NotFound,
    Expired,
    Revoked,
    Blocked,
    Exhausted,
    Deleted,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::NotFound => "not_found",
            InvalidReason::Expired => "expired",
            InvalidReason::Revoked => "revoked",
            InvalidReason::Blocked => "blocked",
            InvalidReason::Exhausted => "exhausted",
            InvalidReason::Deleted => "deleted",
        }
    }

    /// 제시될 때마다 실패 횟수를 올리는 사유인지 여부
    ///
    /// 종료 상태(만료/폐기/삭제)와 레코드가 없는 경우는 벌점 대상이 아닙니다.
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, InvalidReason::Blocked | InvalidReason::Exhausted)
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// validate 호출 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// `record_success`가 이미 반영된 상태
    Valid { token_id: String, user_id: String },
    /// 벌점 대상 사유라면 `record_failure`가 이미 반영된 상태
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid { .. })
    }
}
