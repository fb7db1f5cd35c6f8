//! 토큰 소유자 확인 계약
//!
//! 사용자 계정 관리는 이 서비스의 범위 밖입니다. 토큰 발급과 사용자 단위 조회 전에
//! 소유자가 존재하는지만 확인합니다.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::{AppError, AppResult};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: &str) -> AppResult<bool>;
}

/// 등록된 ID만 존재한다고 답하는 디렉터리 (테스트, 로컬 실행용)
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashSet<String>>,
}

impl InMemoryUserDirectory {
    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: RwLock::new(users.into_iter().map(Into::into).collect()),
        }
    }

    pub fn add(&self, user_id: &str) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user_id.to_string());
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_exists(&self, user_id: &str) -> AppResult<bool> {
        let users = self
            .users
            .read()
            .map_err(|_| AppError::InternalError("user directory lock poisoned".to_string()))?;
        Ok(users.contains(user_id))
    }
}
