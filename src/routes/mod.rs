//! API 라우트 설정 모듈
//!
//! 엔드포인트를 보호 수준별 스코프로 묶어 등록합니다.
//!
//! | 스코프 | 미들웨어 | 내용 |
//! |--------|----------|------|
//! | `/health` | 없음 | 헬스체크 |
//! | `/api/v1/admin` | `ApiKeyGuard::admin()` | 정리, 실패 초기화, 소프트 삭제/복원 |
//! | `/api/v1` | `ApiKeyGuard::service()` | 발급, 검증, 폐기, 세션/디바이스 조회 |
//!
//! `/api/v1/admin`은 `/api/v1`보다 먼저 등록해야 합니다. 스코프는 먼저 등록된
//! 접두사가 요청을 가져갑니다.
//!
//! # Examples
//!
//! ```rust,ignore
//! use actix_web::App;
//!
//! let app = App::new().configure(configure_all_routes);
//! ```

use crate::handlers;
use crate::middlewares::ApiKeyGuard;
use actix_web::web;
use chrono;
use serde_json::json;

/// 모든 라우트를 설정합니다
pub fn configure_all_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check);

    configure_admin_routes(cfg);
    configure_token_routes(cfg);
}

/// 관리 라우트
///
/// ```bash
/// curl -X POST http://localhost:8080/api/v1/admin/tokens/sweep \
///   -H "X-Api-Key: $ADMIN_API_KEY" \
///   -H "Content-Type: application/json" -d '{"batch_size":500}'
/// ```
fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/admin")
            .wrap(ApiKeyGuard::admin())
            .service(handlers::admin::sweep_tokens)
            .service(handlers::admin::mark_tokens_for_cleanup)
            .service(handlers::admin::reset_token_failures)
            .service(handlers::admin::soft_delete_token)
            .service(handlers::admin::restore_token)
    );
}

/// 인증 흐름 라우트
///
/// ```bash
/// curl -X POST http://localhost:8080/api/v1/tokens/validate \
///   -H "X-Api-Key: $SERVICE_API_KEY" \
///   -H "Content-Type: application/json" -d '{"token":"..."}'
/// ```
fn configure_token_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .wrap(ApiKeyGuard::service())
            // 토큰
            .service(handlers::tokens::issue_token)
            .service(handlers::tokens::validate_token)
            .service(handlers::tokens::record_token_failure)
            .service(handlers::tokens::revoke_token)
            // 세션/디바이스
            .service(handlers::sessions::list_sessions)
            .service(handlers::sessions::list_devices)
            .service(handlers::sessions::revoke_user_tokens)
            .service(handlers::sessions::revoke_device_tokens)
    );
}

/// 서비스 상태를 확인하는 헬스체크 엔드포인트
///
/// ```bash
/// curl http://localhost:8080/health
/// ```
#[actix_web::get("/health")]
async fn health_check() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "refresh_token_service",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_health_check_is_unguarded() {
        let app = test::init_service(App::new().service(health_check)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "refresh_token_service");
    }

    #[actix_web::test]
    async fn test_admin_scope_rejects_service_routes_without_admin_key() {
        let app = test::init_service(
            App::new().service(
                web::scope("/api/v1/admin")
                    .wrap(ApiKeyGuard::new("admin", Some("admin-key".to_string())))
                    .service(handlers::admin::sweep_tokens),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/admin/tokens/sweep")
            .insert_header(("X-Api-Key", "service-key"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
