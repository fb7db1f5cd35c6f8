//! 주기적 리프레시 토큰 정리 작업
//!
//! `tokio::time::interval`로 정해진 주기마다 [`TokenService::sweep`]을 실행합니다.
//! 여러 인스턴스가 떠 있어도 매 주기 한 곳에서만 돌도록 [`SweepLock`]을 먼저 잡습니다.
//! 잠금은 중복 작업을 줄이기 위한 것이고, 삭제 조건은 저장소가 삭제 시점에 다시 확인합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::SweepScheduleConfig;
use crate::errors::AppResult;
use crate::repositories::tokens::SweepLock;
use crate::services::auth::TokenService;

pub struct CleanupScheduler {
    service: Arc<TokenService>,
    lock: Arc<dyn SweepLock>,
    period: Duration,
    lock_ttl_secs: u64,
    batch_size: usize,
    holder: String,
}

impl CleanupScheduler {
    pub fn new(
        service: Arc<TokenService>,
        lock: Arc<dyn SweepLock>,
        period: Duration,
        lock_ttl_secs: u64,
        batch_size: usize,
    ) -> Self {
        Self {
            service,
            lock,
            period,
            lock_ttl_secs,
            batch_size,
            holder: format!("sweeper-{}", Uuid::new_v4()),
        }
    }

    /// 환경 변수 설정으로 만듭니다. 주기가 0이면 `None` (비활성).
    pub fn from_env(service: Arc<TokenService>, lock: Arc<dyn SweepLock>) -> Option<Self> {
        let interval_secs = SweepScheduleConfig::interval_secs();
        if interval_secs == 0 {
            return None;
        }
        let batch_size = service.policy().retention.batch_size;

        Some(Self::new(
            service,
            lock,
            Duration::from_secs(interval_secs),
            SweepScheduleConfig::lock_ttl_secs(),
            batch_size,
        ))
    }

    /// 한 번 실행합니다. 다른 인스턴스가 잠금을 갖고 있으면 `Ok(None)`.
    pub async fn run_once(&self) -> AppResult<Option<u64>> {
        if !self.lock.try_acquire(&self.holder, self.lock_ttl_secs).await? {
            log::debug!("다른 인스턴스가 정리 작업 중이라 이번 주기는 건너뜁니다");
            return Ok(None);
        }

        let result = self.service.sweep(self.batch_size).await;

        if let Err(e) = self.lock.release(&self.holder).await {
            log::warn!("⚠️ 정리 잠금 해제 실패: {}", e);
        }

        result.map(Some)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        log::info!(
            "🧹 토큰 정리 스케줄러 시작: 주기 {}초, 배치 {}개",
            self.period.as_secs(),
            self.batch_size
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                match self.run_once().await {
                    Ok(Some(removed)) if removed > 0 => {
                        log::info!("🧹 정기 정리 완료: {}개 삭제", removed)
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("❌ 정기 정리 실패: {}", e),
                }
            }
        })
    }
}
