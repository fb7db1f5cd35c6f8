//! API 키 미들웨어
//!
//! 라우트 스코프마다 다른 키를 요구합니다. `X-Api-Key` 헤더 값을 설정된 키와
//! 상수 시간으로 비교합니다.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error, Result,
};

use crate::config::ApiKeyConfig;
use crate::middlewares::api_key_inner::ApiKeyMiddlewareService;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// 스코프 이름은 로그에만 쓰입니다.
pub struct ApiKeyGuard {
    scope: &'static str,
    expected: Option<Arc<String>>,
}

impl ApiKeyGuard {
    pub fn new(scope: &'static str, expected: Option<String>) -> Self {
        Self {
            scope,
            expected: expected.map(Arc::new),
        }
    }

    /// 인증 흐름용 스코프 (`SERVICE_API_KEY`)
    pub fn service() -> Self {
        Self::new("service", ApiKeyConfig::service_key())
    }

    /// 관리용 스코프 (`ADMIN_API_KEY`)
    pub fn admin() -> Self {
        Self::new("admin", ApiKeyConfig::admin_key())
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiKeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        if self.expected.is_none() {
            log::error!("❌ {} 스코프의 API 키가 설정되지 않아 모든 요청을 거부합니다", self.scope);
        }
        ready(Ok(ApiKeyMiddlewareService {
            service: Rc::new(service),
            scope: self.scope,
            expected: self.expected.clone(),
        }))
    }
}
