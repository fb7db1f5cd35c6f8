//! # Token Maintenance HTTP Handlers
//!
//! 운영자용 정리/복구 엔드포인트입니다. `ApiKeyGuard::admin()`으로 보호됩니다.
//!
//! | 메서드 | 경로 | 설명 |
//! |--------|------|------|
//! | `POST` | `/api/v1/admin/tokens/sweep` | 정리 작업 즉시 실행 |
//! | `POST` | `/api/v1/admin/tokens/cleanup-marks` | 유예 기간 없이 정리 대상으로 표시 |
//! | `POST` | `/api/v1/admin/tokens/{token_id}/reset-failures` | 실패 횟수/차단 초기화 |
//! | `DELETE` | `/api/v1/admin/tokens/{token_id}` | 소프트 삭제 |
//! | `POST` | `/api/v1/admin/tokens/{token_id}/restore` | 소프트 삭제 복원 |

use actix_web::{delete, post, web, HttpResponse};
use validator::Validate;

use crate::domain::dto::tokens::{ChangedResponse, CountResponse, MarkCleanupRequest, SweepRequest, TokenStatusResponse};
use crate::errors::AppError;
use crate::services::auth::TokenService;

#[post("/tokens/sweep")]
pub async fn sweep_tokens(
    payload: Option<web::Json<SweepRequest>>,
) -> Result<HttpResponse, AppError> {
    let request = payload.map(web::Json::into_inner).unwrap_or_default();
    request.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let service = TokenService::instance();
    let batch_size = request
        .batch_size
        .unwrap_or(service.policy().retention.batch_size);
    let removed = service.sweep(batch_size).await?;

    Ok(HttpResponse::Ok().json(CountResponse::new(removed)))
}

#[post("/tokens/cleanup-marks")]
pub async fn mark_tokens_for_cleanup(
    payload: web::Json<MarkCleanupRequest>,
) -> Result<HttpResponse, AppError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let service = TokenService::instance();
    let marked = service.mark_for_cleanup(&payload.token_ids).await?;

    Ok(HttpResponse::Ok().json(CountResponse::new(marked)))
}

/// 차단 기간이 끝난 뒤에도 `exhausted`로 남은 토큰은 이 경로로만 풀립니다.
#[post("/tokens/{token_id}/reset-failures")]
pub async fn reset_token_failures(
    token_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let service = TokenService::instance();
    let updated = service.reset_failures(&token_id).await?;
    let state = service.state_of(&updated);

    Ok(HttpResponse::Ok().json(TokenStatusResponse::new(&updated, state)))
}

#[delete("/tokens/{token_id}")]
pub async fn soft_delete_token(
    token_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let service = TokenService::instance();
    let changed = service.soft_delete(&token_id).await?;

    Ok(HttpResponse::Ok().json(ChangedResponse { changed }))
}

#[post("/tokens/{token_id}/restore")]
pub async fn restore_token(
    token_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let service = TokenService::instance();
    let changed = service.restore(&token_id).await?;

    Ok(HttpResponse::Ok().json(ChangedResponse { changed }))
}
