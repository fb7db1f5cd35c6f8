//! 애플리케이션 전역에서 사용하는 에러 시스템
//!
//! 리프레시 토큰 엔진의 모든 계층(저장소, 암호화, 엔진, HTTP)이 공유하는
//! 단일 에러 타입입니다. `thiserror`로 `Error`를 구현하고
//! `actix_web::ResponseError`로 HTTP 응답에 매핑됩니다.
//!
//! ## HTTP 응답 매핑
//!
//! | AppError | HTTP Status | 사용 시나리오 |
//! |----------|-------------|---------------|
//! | `ValidationError` | 400 Bad Request | 입력값 검증 실패, 잘못된 ID 형식 |
//! | `InvalidExpiry` | 400 Bad Request | 과거 만료 시각, 허용 범위를 벗어난 TTL |
//! | `AuthenticationError` | 401 Unauthorized | 유효하지 않은 세션 (사유 비공개) |
//! | `AuthorizationError` | 403 Forbidden | API 키 누락/불일치 |
//! | `NotFound` | 404 Not Found | 존재하지 않는 토큰 ID, 사용자 |
//! | `ConflictError` | 409 Conflict | 토큰 해시/암호문 유니크 제약 위반 |
//! | `ConcurrencyConflict` | 503 Service Unavailable | 낙관적 잠금 충돌 (재시도 가능) |
//! | `Timeout` | 503 Service Unavailable | 호출자가 지정한 시간 초과 |
//! | 그 외 | 500 Internal Server Error | DB, Redis, 암복호화, 내부 오류 |
//!
//! 5xx 응답 본문에는 내부 메시지를 싣지 않습니다. 원인은 로그로만 남깁니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use crate::errors::AppError;
//!
//! let record = store.find_by_id(&id).await?
//!     .ok_or_else(|| AppError::NotFound(format!("토큰을 찾을 수 없습니다: {}", id)))?;
//! ```

use actix_web::http::StatusCode;
use thiserror::Error;

/// 애플리케이션 전역 에러 타입
#[derive(Error, Debug)]
pub enum AppError {
    /// 데이터베이스 관련 에러 (500 Internal Server Error)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Redis 캐시 관련 에러 (500 Internal Server Error)
    #[error("Redis error: {0}")]
    RedisError(String),

    /// 입력값 검증 에러 (400 Bad Request)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 발급 요청의 만료 시각이 현재보다 미래가 아니거나 최대 TTL을 넘은 경우 (400 Bad Request)
    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),

    /// 리소스 찾을 수 없음 에러 (404 Not Found)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 충돌/중복 에러 (409 Conflict)
    #[error("Conflict error: {0}")]
    ConflictError(String),

    /// 인증 실패 에러 (401 Unauthorized)
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// 권한 부족 에러 (403 Forbidden)
    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    /// 키 자료가 없거나 잘못되어 암호화할 수 없는 경우 (500 Internal Server Error)
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    /// 저장된 암호문이 손상되었거나 키가 맞지 않는 경우 (500 Internal Server Error)
    #[error("Decryption error: {0}")]
    DecryptionError(String),

    /// 낙관적 잠금 충돌이 재시도 후에도 해소되지 않은 경우 (503 Service Unavailable)
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// 호출자가 지정한 시간 안에 작업이 끝나지 않은 경우 (503 Service Unavailable)
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// 내부 서버 에러 (500 Internal Server Error)
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// 호출자가 같은 요청을 그대로 재시도해도 안전한 일시적 오류인지 여부
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_) | AppError::Timeout(_))
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::InvalidExpiry(_) => "invalid_expiry",
            AppError::NotFound(_) => "not_found",
            AppError::ConflictError(_) => "conflict",
            AppError::AuthenticationError(_) => "invalid_session",
            AppError::AuthorizationError(_) => "forbidden",
            AppError::ConcurrencyConflict(_) | AppError::Timeout(_) => "temporarily_unavailable",
            _ => "internal_error",
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidExpiry(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ConcurrencyConflict(_) | AppError::Timeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 각 에러 타입을 적절한 HTTP 상태 코드와 JSON 응답으로 변환합니다.
    ///
    /// 4xx는 메시지를 그대로 전달하고, 5xx와 인증 실패는 코드만 전달합니다.
    fn error_response(&self) -> actix_web::HttpResponse {
        let status = self.status_code();

        if status.is_server_error() {
            log::error!("❌ {}", self);
        }

        let body = match self {
            AppError::ValidationError(msg)
            | AppError::InvalidExpiry(msg)
            | AppError::NotFound(msg)
            | AppError::ConflictError(msg) => serde_json::json!({
                "error": self.error_code(),
                "message": msg,
            }),
            _ => serde_json::json!({ "error": self.error_code() }),
        };

        actix_web::HttpResponse::build(status).json(body)
    }
}

/// 편의성을 위한 Result 타입 별칭
pub type AppResult<T> = Result<T, AppError>;

/// 외부 라이브러리 에러를 AppError로 변환하는 확장 trait
pub trait ErrorContext<T> {
    /// 컨텍스트 정보와 함께 에러를 변환합니다.
    fn context(self, msg: &str) -> AppResult<T>;

    /// 클로저를 사용하여 지연 평가된 컨텍스트를 제공합니다.
    fn with_context<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::InternalError(format!("{}: {}", msg, e)))
    }

    fn with_context<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::InternalError(format!("{}: {}", f(), e)))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        AppError::DatabaseError(e.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::RedisError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::body::MessageBody;

    #[test]
    fn test_validation_error_response() {
        let error = AppError::ValidationError("token_id 형식 오류".to_string());
        let response = error.error_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_expiry_is_bad_request() {
        let error = AppError::InvalidExpiry("expires_at must be in the future".to_string());

        assert_eq!(error.error_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_response() {
        let error = AppError::NotFound("token".to_string());

        assert_eq!(error.error_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_authentication_error_hides_message() {
        let error = AppError::AuthenticationError("revoked".to_string());
        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().try_into_bytes().unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("invalid_session"));
        assert!(!text.contains("revoked"));
    }

    #[test]
    fn test_transient_errors_are_service_unavailable() {
        let conflict = AppError::ConcurrencyConflict("version moved".to_string());
        let timeout = AppError::Timeout("validate".to_string());

        assert!(conflict.is_transient());
        assert!(timeout.is_transient());
        assert_eq!(conflict.error_response().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(timeout.error_response().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!AppError::NotFound("x".to_string()).is_transient());
    }

    #[test]
    fn test_decryption_error_body_is_generic() {
        let error = AppError::DecryptionError("key id k9 unknown".to_string());
        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().try_into_bytes().unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("k9"));
    }

    #[test]
    fn test_error_context_trait() {
        let result: Result<(), &str> = Err("original error");
        let app_result = result.context("Additional context");

        if let Err(AppError::InternalError(msg)) = app_result {
            assert!(msg.contains("Additional context"));
            assert!(msg.contains("original error"));
        } else {
            panic!("Expected InternalError");
        }
    }
}
