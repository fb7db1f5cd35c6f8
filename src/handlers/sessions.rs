//! # Session / Device HTTP Handlers
//!
//! 사용자별 활성 세션 조회와 일괄 폐기("다른 기기에서 로그아웃")를 제공합니다.
//!
//! | 메서드 | 경로 | 설명 |
//! |--------|------|------|
//! | `GET` | `/api/v1/users/{user_id}/sessions` | 세션 목록 (최근 사용 순) |
//! | `GET` | `/api/v1/users/{user_id}/devices` | 디바이스별 집계 |
//! | `POST` | `/api/v1/users/{user_id}/tokens/revoke` | 전체 폐기, `except_token_id` 제외 |
//! | `POST` | `/api/v1/users/{user_id}/devices/{device_id}/revoke` | 디바이스 단위 폐기 |

use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::domain::dto::tokens::{CountResponse, DeviceListResponse, RevokeAllRequest, SessionListResponse};
use crate::errors::AppError;
use crate::services::auth::TokenService;

#[get("/users/{user_id}/sessions")]
pub async fn list_sessions(
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let service = TokenService::instance();
    let sessions = service.list_sessions(&user_id).await?;

    Ok(HttpResponse::Ok().json(SessionListResponse {
        user_id: user_id.into_inner(),
        sessions,
    }))
}

#[get("/users/{user_id}/devices")]
pub async fn list_devices(
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let service = TokenService::instance();
    let devices = service.list_devices(&user_id).await?;

    Ok(HttpResponse::Ok().json(DeviceListResponse {
        user_id: user_id.into_inner(),
        devices,
    }))
}

/// 본문은 선택입니다. 없으면 사용자의 모든 토큰을 폐기합니다.
#[post("/users/{user_id}/tokens/revoke")]
pub async fn revoke_user_tokens(
    user_id: web::Path<String>,
    payload: Option<web::Json<RevokeAllRequest>>,
) -> Result<HttpResponse, AppError> {
    let request = payload.map(web::Json::into_inner).unwrap_or_default();
    request.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let service = TokenService::instance();
    let affected = service
        .revoke_all_for_user(&user_id, request.except_token_id.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(CountResponse::new(affected)))
}

#[post("/users/{user_id}/devices/{device_id}/revoke")]
pub async fn revoke_device_tokens(
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (user_id, device_id) = path.into_inner();

    let service = TokenService::instance();
    let affected = service.revoke_all_for_device(&user_id, &device_id).await?;

    Ok(HttpResponse::Ok().json(CountResponse::new(affected)))
}
