//! # Refresh Token HTTP Handlers
//!
//! 인증 흐름(로그인, 토큰 갱신)이 호출하는 발급/검증/폐기 엔드포인트입니다.
//! 스코프는 `ApiKeyGuard::service()`로 보호됩니다.
//!
//! | 메서드 | 경로 | 설명 | 상태 코드 |
//! |--------|------|------|-----------|
//! | `POST` | `/api/v1/tokens` | 토큰 발급 | 201 Created |
//! | `POST` | `/api/v1/tokens/validate` | 토큰 검증(사용) | 200 OK / 401 |
//! | `POST` | `/api/v1/tokens/{token_id}/failures` | 오용 감지 기록 | 200 OK |
//! | `DELETE` | `/api/v1/tokens/{token_id}` | 토큰 폐기 | 200 OK |
//!
//! ## 검증 실패 응답
//!
//! 만료, 폐기, 차단, 삭제, 미존재는 물론 복호화 실패와 동시 사용 충돌도 모두
//! 같은 `401 {"error":"invalid_session"}`으로 응답합니다. 사유는 로그에만 남습니다.

use actix_web::{delete, post, web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::domain::dto::tokens::{
    CountResponse, IssueTokenRequest, IssueTokenResponse, TokenStatusResponse, ValidateTokenRequest,
    ValidateTokenResponse,
};
use crate::domain::models::token::ValidationOutcome;
use crate::errors::{AppError, AppResult};
use crate::services::auth::TokenService;

/// 프록시 헤더를 고려한 클라이언트 IP
///
/// `X-Forwarded-For`의 첫 번째 값, `X-Real-IP`, peer 주소 순으로 확인합니다.
pub(crate) fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    let forwarded = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    if let Some(real_ip) = req.headers().get("X-Real-IP").and_then(|h| h.to_str().ok()) {
        return Some(real_ip.trim().to_string());
    }

    req.peer_addr().map(|addr| addr.ip().to_string())
}

fn extract_user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

/// 검증 결과를 HTTP 응답으로 바꿉니다.
fn validation_response(result: AppResult<ValidationOutcome>) -> Result<HttpResponse, AppError> {
    match result {
        Ok(ValidationOutcome::Valid { token_id, user_id }) => Ok(HttpResponse::Ok().json(ValidateTokenResponse {
            valid: true,
            token_id,
            user_id,
        })),
        Ok(ValidationOutcome::Invalid(reason)) => {
            log::info!("토큰 검증 실패: reason={}", reason);
            Err(AppError::AuthenticationError(reason.to_string()))
        }
        Err(AppError::DecryptionError(detail)) => {
            log::error!("❌ 토큰 복호화 실패: {}", detail);
            Err(AppError::AuthenticationError("decryption".to_string()))
        }
        Err(AppError::ConcurrencyConflict(detail)) => {
            log::warn!("토큰 동시 사용 충돌: {}", detail);
            Err(AppError::AuthenticationError("concurrency".to_string()))
        }
        Err(transient) if transient.is_transient() => {
            log::warn!("⏱️ 토큰 검증 일시 실패 (재시도 가능): {}", transient);
            Err(transient)
        }
        Err(other) => Err(other),
    }
}

/// 토큰 발급
///
/// ```bash
/// curl -X POST http://localhost:8080/api/v1/tokens \
///   -H "X-Api-Key: $SERVICE_API_KEY" -H "Content-Type: application/json" \
///   -d '{"user_id":"65f0...","ttl_seconds":1209600,"device_id":"iphone-15"}'
/// ```
#[post("/tokens")]
pub async fn issue_token(
    req: HttpRequest,
    payload: web::Json<IssueTokenRequest>,
) -> Result<HttpResponse, AppError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let command = payload
        .into_inner()
        .into_command(extract_client_ip(&req), extract_user_agent(&req));

    let service = TokenService::instance();
    let issued = service.issue(command).await?;

    Ok(HttpResponse::Created().json(IssueTokenResponse::from(issued)))
}

#[post("/tokens/validate")]
pub async fn validate_token(
    payload: web::Json<ValidateTokenRequest>,
) -> Result<HttpResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::AuthenticationError("malformed".to_string()));
    }

    let service = TokenService::instance();
    validation_response(service.validate(&payload.token).await)
}

/// 다른 경로(디바이스 불일치 등)로 감지한 오용을 실패 횟수에 반영합니다.
#[post("/tokens/{token_id}/failures")]
pub async fn record_token_failure(
    token_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let service = TokenService::instance();
    let updated = service.record_failure(&token_id).await?;
    let state = service.state_of(&updated);

    Ok(HttpResponse::Ok().json(TokenStatusResponse::new(&updated, state)))
}

#[delete("/tokens/{token_id}")]
pub async fn revoke_token(
    token_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let service = TokenService::instance();
    let affected = service.revoke(&token_id).await?;

    Ok(HttpResponse::Ok().json(CountResponse::new(affected)))
}
