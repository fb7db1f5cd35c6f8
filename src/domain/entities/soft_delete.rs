//! 소프트 삭제 capability
//!
//! 공통 베이스 구조체를 상속하는 대신 엔티티마다 이 trait을 구현합니다.
//! 저장소는 [`SoftDeletable::active_filter`]를 조회 필터에 합성해서
//! 삭제 표시된 문서를 목록/집계에서 제외합니다.

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};

pub trait SoftDeletable {
    /// 삭제 표시가 없는 살아있는 레코드인지 여부
    fn is_active(&self) -> bool;

    /// 삭제 표시를 남깁니다. 물리 삭제는 보존 정책의 정리 작업이 담당합니다.
    fn mark_deleted(&mut self, at: DateTime<Utc>);

    /// 삭제 표시를 되돌립니다.
    fn restore(&mut self);

    /// 살아있는 문서만 고르는 MongoDB 필터
    fn active_filter() -> Document
    where
        Self: Sized,
    {
        doc! { "soft_deleted": { "$ne": true } }
    }
}
