//! # Service Registry - 싱글톤 의존성 주입
//!
//! 리포지토리와 서비스를 타입별 싱글톤으로 보관하는 전역 레지스트리입니다.
//!
//! - `#[repository]` 매크로와 `inventory::submit!`으로 등록 정보가 링크 시점에 수집됩니다.
//! - `Database`, `RedisClient`, `TokenCipher`처럼 외부 자원이 필요한 인스턴스는
//!   `main`에서 [`ServiceLocator::set`]으로 직접 등록합니다.
//! - [`ServiceLocator::get`]은 타입 이름으로 등록 정보를 찾아 처음 한 번만 생성합니다.
//!
//! ## 이름 규칙
//!
//! | 타입 | 등록 이름 | 조회 키 |
//! |------|-----------|---------|
//! | `TokenRepository` | `token` | `token` |
//! | `UserRepository` | `user` | `user` |
//! | `TokenService` | `token_service` | `token` |
//!
//! ## 초기화 순서
//!
//! ```rust,ignore
//! ServiceLocator::set(database);
//! ServiceLocator::set(redis_client);
//! ServiceLocator::set(Arc::new(cipher));
//! ServiceLocator::initialize_all().await?; // 리포지토리 → 서비스
//! ```
//!
//! 생성자는 레지스트리 잠금 밖에서 호출됩니다. 생성자 안에서 다른 타입을 `get` 해도
//! 교착 상태가 생기지 않고, 같은 타입을 다시 요청하면 순환 참조로 패닉합니다.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;

/// `#[repository]` 매크로가 구현하는 trait
#[async_trait]
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;
    fn collection_name(&self) -> &str;
    async fn init(&self) -> Result<(), Box<dyn std::error::Error>>;
}

/// 생성자는 `Box<Arc<T>>`를 돌려줘야 `get::<T>()`에서 downcast 됩니다.
pub struct ServiceRegistration {
    pub name: &'static str,
    pub constructor: fn() -> Box<dyn Any + Send + Sync>,
}

pub struct RepositoryRegistration {
    pub name: &'static str,
    pub constructor: fn() -> Box<dyn Any + Send + Sync>,
}

inventory::collect!(ServiceRegistration);
inventory::collect!(RepositoryRegistration);

static SERVICE_NAME_CACHE: Lazy<HashMap<String, &'static ServiceRegistration>> = Lazy::new(|| {
    let cache: HashMap<_, _> = inventory::iter::<ServiceRegistration>()
        .map(|registration| (registration_key(registration.name), registration))
        .collect();
    log::debug!("서비스 등록 정보 {}개 로드", cache.len());
    cache
});

static REPOSITORY_NAME_CACHE: Lazy<HashMap<String, &'static RepositoryRegistration>> = Lazy::new(|| {
    let cache: HashMap<_, _> = inventory::iter::<RepositoryRegistration>()
        .map(|registration| (registration_key(registration.name), registration))
        .collect();
    log::debug!("리포지토리 등록 정보 {}개 로드", cache.len());
    cache
});

/// "token_service" -> "token", "token_repository" -> "token"
fn registration_key(name: &str) -> String {
    name.strip_suffix("_service")
        .or_else(|| name.strip_suffix("_repository"))
        .unwrap_or(name)
        .to_string()
}

/// "crate::services::auth::token_service::TokenService" -> "TokenService"
fn short_type_name(type_name: &str) -> &str {
    type_name.rsplit("::").next().unwrap_or(type_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Repository,
    Service,
}

/// 타입 이름에서 종류와 조회 키를 얻습니다. "TokenService" -> (Service, "token")
fn lookup_key(type_name: &str) -> Option<(Kind, String)> {
    let short = short_type_name(type_name);
    if let Some(entity) = short.strip_suffix("Repository") {
        return Some((Kind::Repository, entity.to_lowercase()));
    }
    if let Some(entity) = short.strip_suffix("Service") {
        return Some((Kind::Service, entity.to_lowercase()));
    }
    None
}

pub struct ServiceLocator {
    instances: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    initializing: RwLock<HashSet<TypeId>>,
}

/// 생성 중 표시를 어떤 경로로 빠져나가든 지웁니다.
struct InitializingGuard<'a> {
    locator: &'a ServiceLocator,
    type_id: TypeId,
}

impl Drop for InitializingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut initializing) = self.locator.initializing.write() {
            initializing.remove(&self.type_id);
        }
    }
}

impl ServiceLocator {
    fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            initializing: RwLock::new(HashSet::new()),
        }
    }

    fn cached<T: 'static + Send + Sync>(&self, type_id: TypeId) -> Option<Arc<T>> {
        let instances = self.instances.read().expect("ServiceLocator lock poisoned");
        instances
            .get(&type_id)
            .cloned()
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    /// 싱글톤 인스턴스를 가져옵니다. 없으면 등록 정보로 생성합니다.
    ///
    /// # Panics
    ///
    /// 등록되지 않은 타입, 순환 참조, 생성자 타입 불일치. 모두 시작 시점의 설정 오류입니다.
    pub fn get<T: 'static + Send + Sync>() -> Arc<T> {
        LOCATOR.get_or_create::<T>()
    }

    fn get_or_create<T: 'static + Send + Sync>(&self) -> Arc<T> {
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();

        if let Some(instance) = self.cached::<T>(type_id) {
            return instance;
        }

        {
            let mut initializing = self.initializing.write().expect("ServiceLocator lock poisoned");
            if !initializing.insert(type_id) {
                log::error!("❌ 순환 참조 감지: {}", type_name);
                panic!("Circular dependency detected: {} is already being initialized", type_name);
            }
        }
        let _guard = InitializingGuard { locator: self, type_id };

        let boxed = match lookup_key(type_name) {
            Some((Kind::Repository, key)) => REPOSITORY_NAME_CACHE
                .get(&key)
                .map(|registration| (registration.name, (registration.constructor)())),
            Some((Kind::Service, key)) => SERVICE_NAME_CACHE
                .get(&key)
                .map(|registration| (registration.name, (registration.constructor)())),
            None => None,
        };

        let Some((registered_as, boxed)) = boxed else {
            panic!(
                "Service not found: {}. Register it with #[repository], inventory::submit! or ServiceLocator::set()",
                type_name
            );
        };

        let instance = match boxed.downcast::<Arc<T>>() {
            Ok(instance) => *instance,
            Err(_) => panic!("Type mismatch for registration: {}", registered_as),
        };

        let mut instances = self.instances.write().expect("ServiceLocator lock poisoned");
        // 잠금을 놓은 사이 다른 스레드가 먼저 넣었다면 그 인스턴스를 사용
        let stored = instances
            .entry(type_id)
            .or_insert_with(|| instance.clone() as Arc<dyn Any + Send + Sync>)
            .clone();
        stored.downcast::<T>().unwrap_or(instance)
    }

    /// 외부 자원이 필요한 인스턴스를 직접 등록합니다. 같은 타입은 덮어씁니다.
    pub fn set<T: 'static + Send + Sync>(instance: Arc<T>) {
        let type_id = TypeId::of::<T>();
        log::info!("📦 등록: {}", short_type_name(std::any::type_name::<T>()));

        let mut instances = LOCATOR.instances.write().expect("ServiceLocator lock poisoned");
        instances.insert(type_id, instance as Arc<dyn Any + Send + Sync>);
    }

    /// 모든 리포지토리, 그다음 모든 서비스를 생성합니다.
    ///
    /// 첫 요청이 들어오기 전에 설정 오류(키 누락, 미등록 타입)를 드러내기 위한 단계입니다.
    pub async fn initialize_all() -> Result<(), Box<dyn std::error::Error>> {
        log::info!("🔄 서비스 레지스트리 초기화");

        let mut repo_count = 0;
        for registration in inventory::iter::<RepositoryRegistration>() {
            let _instance = (registration.constructor)();
            log::debug!("  ✓ repository {}", registration.name);
            repo_count += 1;
        }

        let mut service_count = 0;
        for registration in inventory::iter::<ServiceRegistration>() {
            let _instance = (registration.constructor)();
            log::debug!("  ✓ service {}", registration.name);
            service_count += 1;
        }

        log::info!("✅ 리포지토리 {}개, 서비스 {}개 초기화 완료", repo_count, service_count);
        Ok(())
    }
}

static LOCATOR: Lazy<ServiceLocator> = Lazy::new(ServiceLocator::new);
