//! 患者记录存储
//!
//! 患者实体及其生命周期状态的单一数据源。所有组件都通过存储读取
//! 当前状态，站点控制器只持有患者ID引用，不保留副本。
//!
//! 状态转换采用条件更新：写入以期望的当前状态为前提，不匹配即拒绝。
//! 两个站点对同一患者的并发叫号因此恰好只有一个成功。

use crate::events::{ChangeEvent, ChangeKind};
use chrono::{DateTime, Utc};
use clinicq_core::{
    utils::valid_patient_name, CallHistoryEntry, ClinicError, Patient, PatientStatus, Priority,
    Result, Station, StationKind,
};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// 变更事件通道容量
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 伴随状态转换的字段更新
#[derive(Debug, Clone, Default)]
pub struct TransitionUpdate {
    /// 设置最近叫号时间
    pub set_called_at: Option<DateTime<Utc>>,
    /// 清除叫号时间；仅在改派到下一站点排队时使用，
    /// 进入终态的患者保留叫号时间供等待时长统计
    pub clear_called_at: bool,
    /// 设置目标站点；`Some(None)` 表示清除
    pub set_station: Option<Option<String>>,
}

impl TransitionUpdate {
    /// 叫号更新：记录叫号时间并绑定站点
    pub fn called(at: DateTime<Utc>, station_id: &str) -> Self {
        Self {
            set_called_at: Some(at),
            clear_called_at: false,
            set_station: Some(Some(station_id.to_string())),
        }
    }

    /// 完成分诊后的改派更新：清除叫号时间，指向下一站点
    pub fn routed(station_id: &str) -> Self {
        Self {
            set_called_at: None,
            clear_called_at: true,
            set_station: Some(Some(station_id.to_string())),
        }
    }
}

/// 患者记录存储
///
/// 按诊所单元标签隔离，内存表持有全部活跃记录，叫号历史只追加。
pub struct PatientStore {
    unit: String,
    patients: RwLock<HashMap<Uuid, Patient>>,
    history: RwLock<Vec<CallHistoryEntry>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl PatientStore {
    /// 创建指定诊所单元的存储
    pub fn new(unit: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            unit: unit.into(),
            patients: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            events,
        }
    }

    /// 所属诊所单元标签
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// 订阅变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// 登记患者
    ///
    /// 初始状态为 `Waiting`；预先分派到诊室的患者直接进入 `WaitingDoctor`。
    /// 空白姓名在任何写入发生之前被拒绝。
    pub async fn register(
        &self,
        name: &str,
        priority: Priority,
        station: Option<&Station>,
    ) -> Result<Patient> {
        let name = valid_patient_name(name)?;

        let status = match station.map(|s| s.kind) {
            Some(StationKind::Consultation) => PatientStatus::WaitingDoctor,
            _ => PatientStatus::Waiting,
        };

        let patient = Patient {
            id: Uuid::new_v4(),
            unit: self.unit.clone(),
            name,
            priority,
            status,
            station: station.map(|s| s.id.clone()),
            created_at: Utc::now(),
            called_at: None,
            notes: None,
        };

        let mut patients = self.patients.write().await;
        patients.insert(patient.id, patient.clone());
        drop(patients);

        tracing::info!(
            "Registered patient {} ({:?}, {}) in unit {}",
            patient.id,
            patient.priority,
            patient.status,
            self.unit
        );
        self.publish(patient.id, ChangeKind::Registered, patient.status);
        Ok(patient)
    }

    /// 按ID读取患者
    pub async fn get(&self, id: Uuid) -> Result<Patient> {
        self.patients
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound(format!("patient {} not found", id)))
    }

    /// 当前全部患者快照
    pub async fn snapshot(&self) -> Vec<Patient> {
        self.patients.read().await.values().cloned().collect()
    }

    /// 叫号历史快照
    pub async fn history(&self) -> Vec<CallHistoryEntry> {
        self.history.read().await.clone()
    }

    /// 条件状态转换
    ///
    /// 只有当患者当前状态等于 `expected` 时写入才会发生，否则返回
    /// `InvalidStateTransition`，由调用方刷新视图后重试。进入叫号中
    /// 状态（分诊中/就诊中）时追加一条叫号历史。
    pub async fn transition(
        &self,
        id: Uuid,
        expected: PatientStatus,
        next: PatientStatus,
        update: TransitionUpdate,
    ) -> Result<Patient> {
        let mut patients = self.patients.write().await;
        let patient = patients
            .get_mut(&id)
            .ok_or_else(|| ClinicError::NotFound(format!("patient {} not found", id)))?;

        if patient.status != expected {
            return Err(ClinicError::InvalidStateTransition {
                from: patient.status.to_string(),
                event: format!("expected {}, move to {}", expected, next),
            });
        }

        let old_status = patient.status;
        patient.status = next;
        if let Some(called_at) = update.set_called_at {
            // 叫号时间不得早于登记时间
            patient.called_at = Some(called_at.max(patient.created_at));
        } else if update.clear_called_at {
            patient.called_at = None;
        }
        if let Some(station) = update.set_station {
            patient.station = station;
        }

        let snapshot = patient.clone();
        drop(patients);

        if next.is_active() {
            self.append_history(&snapshot).await;
        }

        tracing::info!(
            "Patient {} transitioned from {} to {}",
            id,
            old_status,
            next
        );
        self.publish(id, ChangeKind::Updated, next);
        Ok(snapshot)
    }

    /// 重复叫号：仅刷新叫号时间，不改变状态与排队位置
    pub async fn touch_called_at(&self, id: Uuid) -> Result<Patient> {
        let mut patients = self.patients.write().await;
        let patient = patients
            .get_mut(&id)
            .ok_or_else(|| ClinicError::NotFound(format!("patient {} not found", id)))?;

        if !patient.status.is_active() {
            return Err(ClinicError::InvalidStateTransition {
                from: patient.status.to_string(),
                event: "recall".to_string(),
            });
        }

        patient.called_at = Some(Utc::now().max(patient.created_at));
        let snapshot = patient.clone();
        drop(patients);

        // 每次重复播报同样落一条历史
        self.append_history(&snapshot).await;
        self.publish(id, ChangeKind::Updated, snapshot.status);
        Ok(snapshot)
    }

    /// 更新内部备注，任何站点均可修改
    pub async fn set_notes(&self, id: Uuid, notes: Option<String>) -> Result<Patient> {
        let mut patients = self.patients.write().await;
        let patient = patients
            .get_mut(&id)
            .ok_or_else(|| ClinicError::NotFound(format!("patient {} not found", id)))?;
        patient.notes = notes;
        let snapshot = patient.clone();
        drop(patients);

        self.publish(id, ChangeKind::Updated, snapshot.status);
        Ok(snapshot)
    }

    /// 改派等待中的患者到另一站点（无播报）
    pub async fn reroute(&self, id: Uuid, station: &Station) -> Result<Patient> {
        let mut patients = self.patients.write().await;
        let patient = patients
            .get_mut(&id)
            .ok_or_else(|| ClinicError::NotFound(format!("patient {} not found", id)))?;

        if !patient.status.is_waiting() {
            return Err(ClinicError::InvalidStateTransition {
                from: patient.status.to_string(),
                event: format!("reroute to {}", station.id),
            });
        }
        if patient.status == PatientStatus::WaitingDoctor
            && station.kind != StationKind::Consultation
        {
            return Err(ClinicError::Validation(format!(
                "patient waiting for doctor cannot be rerouted to {} station",
                station.id
            )));
        }

        patient.station = Some(station.id.clone());
        let snapshot = patient.clone();
        drop(patients);

        tracing::info!("Patient {} rerouted to station {}", id, station.id);
        self.publish(id, ChangeKind::Updated, snapshot.status);
        Ok(snapshot)
    }

    /// 删除患者记录，幂等：不存在的ID是空操作
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.patients.write().await.remove(&id);
        match removed {
            Some(patient) => {
                tracing::info!("Removed patient {} ({})", id, patient.name);
                self.publish(id, ChangeKind::Removed, patient.status);
                true
            }
            None => false,
        }
    }

    /// 批量条件删除，供闲置清理使用
    ///
    /// 删除两类记录：登记于 `day_start` 之前的全部患者（终态记录
    /// 一并清除，历史保留由只追加的叫号历史承担），以及登记早于
    /// `inactive_before` 且处于叫号中状态的患者。`exclude` 中的ID
    /// （站点叫号位占用者）一律保留。
    pub async fn reap(
        &self,
        day_start: DateTime<Utc>,
        inactive_before: DateTime<Utc>,
        exclude: &[Uuid],
    ) -> Vec<Patient> {
        let mut patients = self.patients.write().await;
        let doomed: Vec<Uuid> = patients
            .values()
            .filter(|p| !exclude.contains(&p.id))
            .filter(|p| {
                let stale_day = p.created_at < day_start;
                let abandoned = p.status.is_active() && p.created_at < inactive_before;
                stale_day || abandoned
            })
            .map(|p| p.id)
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            if let Some(patient) = patients.remove(&id) {
                removed.push(patient);
            }
        }
        drop(patients);

        for patient in &removed {
            self.publish(patient.id, ChangeKind::Removed, patient.status);
        }
        removed
    }

    /// 追加叫号历史
    async fn append_history(&self, patient: &Patient) {
        let called_by = match patient.status {
            PatientStatus::InTriage => StationKind::Triage,
            _ => StationKind::Consultation,
        };
        let entry = CallHistoryEntry {
            id: Uuid::new_v4(),
            unit: self.unit.clone(),
            patient_id: patient.id,
            patient_name: patient.name.clone(),
            called_by,
            station_id: patient.station.clone().unwrap_or_default(),
            called_at: patient.called_at.unwrap_or_else(Utc::now),
        };
        self.history.write().await.push(entry);
    }

    /// 测试辅助：直接插入一条记录（用于构造特定的登记时间）
    #[cfg(test)]
    pub(crate) async fn inject_for_test(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }

    fn publish(&self, patient_id: Uuid, kind: ChangeKind, status: PatientStatus) {
        // 无订阅者时发送失败是正常情况
        let _ = self.events.send(ChangeEvent {
            unit: self.unit.clone(),
            patient_id,
            kind,
            status,
        });
    }
}
