//! 리프레시 토큰 서비스 메인 애플리케이션
//!
//! 키 자료를 검증하고 MongoDB, Redis 연결과 싱글톤 레지스트리를 초기화한 뒤
//! 정리 스케줄러와 HTTP 서버를 띄웁니다.

use std::sync::Arc;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, App, HttpServer};
use actix_governor::{Governor, GovernorConfigBuilder};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use refresh_token_service::caching::redis::RedisClient;
use refresh_token_service::config::{ApiKeyConfig, RateLimitConfig, ServerConfig};
use refresh_token_service::core::registry::ServiceLocator;
use refresh_token_service::db::Database;
use refresh_token_service::repositories::tokens::TokenRepository;
use refresh_token_service::routes::configure_all_routes;
use refresh_token_service::services::auth::{TokenCipher, TokenService};
use refresh_token_service::services::maintenance::CleanupScheduler;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    load_env_file();
    init_logging();

    info!("🚀 리프레시 토큰 서비스 시작중...");

    // 키 자료가 없거나 잘못되면 연결을 만들기 전에 실패
    let cipher = match TokenCipher::from_env() {
        Ok(cipher) => cipher,
        Err(e) => {
            error!("❌ 토큰 암호화 키 로드 실패: {}", e);
            std::process::exit(1);
        }
    };
    info!("🔐 토큰 암호화 키 로드 완료 (active key: {})", cipher.active_key_id());
    warn_missing_api_keys();

    let (database, redis_client) = initialize_data_stores().await;

    ServiceLocator::set(database);
    ServiceLocator::set(redis_client);
    ServiceLocator::set(Arc::new(cipher));

    ServiceLocator::initialize_all()
        .await
        .expect("서비스 초기화 실패");

    let token_repository = TokenRepository::instance();
    if let Err(e) = token_repository.create_indexes().await {
        error!("❌ refresh_tokens 인덱스 생성 실패: {}", e);
        std::process::exit(1);
    }

    info!("✅ 모든 서비스가 성공적으로 초기화되었습니다!");

    match CleanupScheduler::from_env(TokenService::instance(), token_repository) {
        Some(scheduler) => {
            scheduler.spawn();
        }
        None => info!("🧹 정리 스케줄러 비활성화 (TOKEN_CLEANUP_INTERVAL_SECS=0)"),
    }

    start_http_server().await
}

/// HTTP 서버를 구성하고 실행합니다
///
/// 요청 제한, CORS, 접근 로그, 경로 정규화 미들웨어를 적용합니다.
async fn start_http_server() -> std::io::Result<()> {
    let bind_address = ServerConfig::bind_address();

    info!("🌐 서버가 http://{} 에서 실행중입니다", bind_address);
    info!("📍 Health check: http://{}/health", bind_address);

    let rate_limit_config = RateLimitConfig::load();
    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_second(rate_limit_config.per_second)
        .burst_size(rate_limit_config.burst_size)
        .use_headers()
        .finish()
        .expect("Rate Limiting 설정이 올바르지 않습니다");

    info!(
        "🛡️ Rate Limiting 활성화: 초당 {}요청, 버스트 {}개",
        rate_limit_config.per_second,
        rate_limit_config.burst_size
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Governor::new(&governor_conf))
            .wrap(configure_cors())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_all_routes)
    })
        .bind(bind_address)?
        .workers(ServerConfig::workers())
        .run()
        .await
}

/// PROFILE 환경변수에 따라 .env 파일을 로드합니다
///
/// * `PROFILE=dev` - .env.dev (기본값)
/// * `PROFILE=prod` - .env.prod
/// * 기타 - .env
fn load_env_file() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "dev".to_string());

    // 로거 초기화 전이므로 결과는 stderr로만 확인 가능
    let loaded = match profile.as_str() {
        "prod" => dotenv::from_filename(".env.prod").map(|_| ()),
        "dev" => dotenv::from_filename(".env.dev").map(|_| ()),
        _ => dotenv().map(|_| ()),
    };
    if let Err(e) = loaded {
        eprintln!("{} 프로필 .env 파일 로드 실패: {}", profile, e);
    }
}

/// `RUST_LOG`가 없으면 "info,actix_web=info"
fn init_logging() {
    env_logger::init_from_env(Env::default().default_filter_or("info,actix_web=info"));
}

fn warn_missing_api_keys() {
    if ApiKeyConfig::service_key().is_none() {
        error!("❌ SERVICE_API_KEY가 없습니다. /api/v1 요청은 모두 거부됩니다");
    }
    if ApiKeyConfig::admin_key().is_none() {
        error!("❌ ADMIN_API_KEY가 없습니다. /api/v1/admin 요청은 모두 거부됩니다");
    }
}

/// MongoDB와 Redis 연결을 초기화합니다. 실패하면 프로세스를 종료합니다.
async fn initialize_data_stores() -> (Arc<Database>, Arc<RedisClient>) {
    info!("📡 데이터베이스 연결 중...");

    let database = Arc::new(
        Database::new()
            .await
            .expect("데이터베이스 연결 실패")
    );

    let redis_client = Arc::new(
        RedisClient::new()
            .await
            .expect("Redis 연결 실패")
    );

    info!("✅ Redis 연결 성공");

    (database, redis_client)
}

/// 토큰 서비스는 서버 간 호출만 받으므로 브라우저 출처는 설정된 것만 허용합니다.
///
/// `CORS_ALLOWED_ORIGINS` - 쉼표로 구분된 출처 목록 (기본값: http://localhost:3000)
fn configure_cors() -> Cors {
    let origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());

    origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
        .max_age(3600)
}
