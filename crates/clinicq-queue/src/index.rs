//! 队列索引
//!
//! 按需从存储快照派生各站点的有序等待列表，自身不保存任何副本。
//! 排序是确定性的全序：相同输入必然产生相同输出。

use crate::store::PatientStore;
use clinicq_core::{Patient, PatientStatus, Station, StationKind};
use std::sync::Arc;

/// 队列索引
pub struct QueueIndex {
    store: Arc<PatientStore>,
}

impl QueueIndex {
    pub fn new(store: Arc<PatientStore>) -> Self {
        Self { store }
    }

    /// 指定站点的有序等待列表
    ///
    /// 每次调用重新读取存储状态，任何写入之后调用方应重新获取。
    pub async fn waiting_for(&self, station: &Station) -> Vec<Patient> {
        order_waiting(self.store.snapshot().await, station)
    }
}

/// 对快照应用站点资格过滤与排序
///
/// 资格：分诊台叫 `Waiting` 池中的全部患者；诊室只叫被分派到
/// 本站点的 `WaitingDoctor` 患者。排序键为（优先级等级，登记时间，
/// ID）升序，ID作为最终决胜项保证全序确定性。
pub fn order_waiting(snapshot: Vec<Patient>, station: &Station) -> Vec<Patient> {
    let mut eligible: Vec<Patient> = snapshot
        .into_iter()
        .filter(|p| match station.kind {
            StationKind::Triage => p.status == PatientStatus::Waiting,
            StationKind::Consultation => {
                p.status == PatientStatus::WaitingDoctor
                    && p.station.as_deref() == Some(station.id.as_str())
            }
        })
        .collect();

    eligible.sort_by(|a, b| {
        (a.priority.rank(), a.created_at, a.id).cmp(&(b.priority.rank(), b.created_at, b.id))
    });
    eligible
}
