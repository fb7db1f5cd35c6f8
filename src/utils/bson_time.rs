//! # chrono ↔ BSON 날짜 변환
//!
//! 엔티티는 `chrono::DateTime<Utc>`로 시간을 다루지만 MongoDB에는 BSON Date로
//! 저장해야 범위 쿼리(`$lte`, `$gt`)와 인덱스가 제대로 동작합니다.
//! `#[serde(with = "crate::utils::bson_time")]`으로 필드에 적용합니다.

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// chrono 시각을 BSON Date로 변환합니다. 밀리초 미만은 버립니다.
pub fn to_bson(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

/// BSON Date를 chrono 시각으로 변환합니다.
pub fn from_bson(dt: bson::DateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    to_bson(*dt).serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    bson::DateTime::deserialize(deserializer).map(from_bson)
}

/// `Option<DateTime<Utc>>` 필드용
pub mod option {
    use super::*;

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.map(to_bson).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<bson::DateTime>::deserialize(deserializer).map(|dt| dt.map(from_bson))
    }
}
