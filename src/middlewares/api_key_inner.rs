//! ApiKeyGuard 검사 로직
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse};
use actix_web::{Error, HttpResponse};
use futures_util::future::LocalBoxFuture;
use subtle::ConstantTimeEq;

use crate::middlewares::api_key_middleware::API_KEY_HEADER;

pub struct ApiKeyMiddlewareService<S> {
    pub service: Rc<S>,
    pub scope: &'static str,
    pub expected: Option<Arc<String>>,
}

enum KeyCheck {
    Accepted,
    Missing,
    Rejected,
}

fn check_key(presented: Option<&str>, expected: Option<&str>) -> KeyCheck {
    let Some(presented) = presented else {
        return KeyCheck::Missing;
    };
    match expected {
        Some(expected) if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) => KeyCheck::Accepted,
        _ => KeyCheck::Rejected,
    }
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, actix_web::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let scope = self.scope;
        let expected = self.expected.clone();

        Box::pin(async move {
            let presented = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::trim);

            let rejection = match check_key(presented, expected.as_deref().map(String::as_str)) {
                KeyCheck::Accepted => None,
                KeyCheck::Missing => {
                    log::warn!("API 키 없음: scope={}, path={}", scope, req.path());
                    Some(HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "api_key_required",
                        "message": "X-Api-Key 헤더가 필요합니다"
                    })))
                }
                KeyCheck::Rejected => {
                    log::warn!("API 키 불일치: scope={}, path={}", scope, req.path());
                    Some(HttpResponse::Forbidden().json(serde_json::json!({
                        "error": "forbidden"
                    })))
                }
            };

            if let Some(response) = rejection {
                let (req, _) = req.into_parts();
                return Ok(ServiceResponse::new(req, response).map_into_right_body());
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
