//! 백그라운드 유지보수 작업

pub mod cleanup_scheduler;

pub use cleanup_scheduler::CleanupScheduler;
