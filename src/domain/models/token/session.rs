//! 세션/디바이스 목록 뷰
//!
//! 토큰 값은 절대 포함하지 않습니다.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::tokens::RefreshToken;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub token_id: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub ip_address: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<&RefreshToken> for SessionSummary {
    fn from(record: &RefreshToken) -> Self {
        Self {
            token_id: record.id_string().unwrap_or_default(),
            device_id: record.device_id.clone(),
            device_name: record.device_name.clone(),
            device_type: record.device_type.clone(),
            ip_address: record.source_ip.clone(),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
        }
    }
}

/// 디바이스 단위 집계
///
/// `device_id`가 없는 토큰들은 `device_id: None`인 항목 하나로 묶입니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub token_count: u64,
}

/// 레코드를 디바이스별로 묶습니다.
///
/// 입력이 최근 사용 순이면 출력도 각 디바이스의 첫 등장 순서, 즉 최근 사용 순입니다.
/// 이름/종류는 가장 최근 레코드에 값이 없을 때 다음 레코드의 값으로 채웁니다.
pub fn group_by_device<'a, I>(records: I) -> Vec<DeviceSummary>
where
    I: IntoIterator<Item = &'a RefreshToken>,
{
    let mut devices: Vec<DeviceSummary> = Vec::new();

    for record in records {
        match devices.iter_mut().find(|device| device.device_id == record.device_id) {
            Some(device) => {
                device.token_count += 1;
                device.last_used_at = device.last_used_at.max(record.last_used_at);
                if device.device_name.is_none() {
                    device.device_name = record.device_name.clone();
                }
                if device.device_type.is_none() {
                    device.device_type = record.device_type.clone();
                }
            }
            None => devices.push(DeviceSummary {
                device_id: record.device_id.clone(),
                device_name: record.device_name.clone(),
                device_type: record.device_type.clone(),
                last_used_at: record.last_used_at,
                token_count: 1,
            }),
        }
    }

    devices
}
