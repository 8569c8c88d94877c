//! 队列引擎
//!
//! 协调患者存储、队列索引、占用登记与播报调度的核心引擎。
//! 每个站点的动作由各自的互斥锁串行化，不同站点可并发操作
//! 互不相交的患者；对同一患者的跨站点竞争由存储层的条件转换
//! 裁决，恰好一方成功。

use crate::controller::StationController;
use crate::state_machine::{PatientEvent, PatientStateMachine};
use chrono::Utc;
use clinicq_core::{
    Announcer, CallAnnouncement, ClinicError, Patient, PatientStatus, Priority, Result, Station,
    StationKind,
};
use clinicq_queue::{OccupancyRegistry, PatientStore, QueueIndex, TransitionUpdate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// 队列引擎
pub struct QueueEngine {
    store: Arc<PatientStore>,
    index: QueueIndex,
    registry: Arc<OccupancyRegistry>,
    announcer: Arc<dyn Announcer>,
    machine: PatientStateMachine,
    configs: HashMap<String, Station>,
    stations: HashMap<String, Mutex<StationController>>,
}

impl QueueEngine {
    /// 创建队列引擎
    ///
    /// 存储句柄显式传入，不存在全局实例。
    pub fn new(
        store: Arc<PatientStore>,
        registry: Arc<OccupancyRegistry>,
        announcer: Arc<dyn Announcer>,
        stations: Vec<Station>,
    ) -> Self {
        let configs: HashMap<String, Station> =
            stations.iter().map(|s| (s.id.clone(), s.clone())).collect();
        let controllers = stations
            .into_iter()
            .map(|s| (s.id.clone(), Mutex::new(StationController::new(s))))
            .collect();
        Self {
            index: QueueIndex::new(store.clone()),
            store,
            registry,
            announcer,
            machine: PatientStateMachine::new(),
            configs,
            stations: controllers,
        }
    }

    /// 患者存储句柄
    pub fn store(&self) -> &Arc<PatientStore> {
        &self.store
    }

    /// 占用登记表句柄（供清理任务共享）
    pub fn registry(&self) -> &Arc<OccupancyRegistry> {
        &self.registry
    }

    /// 全部站点配置
    pub fn stations(&self) -> Vec<Station> {
        let mut stations: Vec<Station> = self.configs.values().cloned().collect();
        stations.sort_by(|a, b| a.id.cmp(&b.id));
        stations
    }

    /// 查找站点配置
    pub fn station_config(&self, station_id: &str) -> Result<Station> {
        self.configs
            .get(station_id)
            .cloned()
            .ok_or_else(|| ClinicError::NotFound(format!("station {} not found", station_id)))
    }

    /// 登记患者
    pub async fn register(
        &self,
        name: &str,
        priority: Priority,
        station_id: Option<&str>,
    ) -> Result<Patient> {
        let station = match station_id {
            Some(id) => Some(self.station_config(id)?),
            None => None,
        };
        self.store.register(name, priority, station.as_ref()).await
    }

    /// 指定站点的有序等待列表
    pub async fn waiting_for(&self, station_id: &str) -> Result<Vec<Patient>> {
        let station = self.station_config(station_id)?;
        Ok(self.index.waiting_for(&station).await)
    }

    /// 站点当前叫号的患者
    pub async fn current_call(&self, station_id: &str) -> Result<Option<Patient>> {
        let cell = self.controller(station_id)?;
        let mut ctl = cell.lock().await;
        match ctl.current() {
            None => Ok(None),
            Some(id) => match self.store.get(id).await {
                Ok(patient) => Ok(Some(patient)),
                // 占用者已被外部删除，回收叫号位
                Err(ClinicError::NotFound(_)) => {
                    ctl.clear();
                    self.registry.release(station_id);
                    Ok(None)
                }
                Err(e) => Err(e),
            },
        }
    }

    /// 叫号：取队首患者进入本站点接待
    ///
    /// 前置条件：本站点叫号位空闲。这是唯一把患者移出等待状态的
    /// 操作，成功后恰好发出一次播报；播报失败只记录日志，状态
    /// 转换不回滚。
    pub async fn call(&self, station_id: &str) -> Result<Patient> {
        let cell = self.controller(station_id)?;
        let mut ctl = cell.lock().await;

        if !ctl.is_free() {
            return Err(ClinicError::SlotOccupied {
                station: station_id.to_string(),
            });
        }

        let station = ctl.station().clone();
        let waiting = self.index.waiting_for(&station).await;
        let head = waiting.first().ok_or_else(|| ClinicError::EmptyQueue {
            station: station_id.to_string(),
        })?;

        let event = PatientEvent::Called(station.kind);
        let next = self.machine.transition(head.status, &event)?;

        // 条件转换是原子步骤：另一控制器抢先时此处失败，叫号位不动
        let called = self
            .store
            .transition(
                head.id,
                head.status,
                next,
                TransitionUpdate::called(Utc::now(), &station.id),
            )
            .await?;

        ctl.occupy(called.id)?;
        self.registry.occupy(&station.id, called.id);
        drop(ctl);

        tracing::info!(
            "Station {} called patient {} ({})",
            station.id,
            called.id,
            called.name
        );
        self.announce(&called, &station, false).await;
        Ok(called)
    }

    /// 重复叫号：刷新叫号时间并重新播报，不改变状态与排队位置
    pub async fn recall(&self, station_id: &str) -> Result<Patient> {
        let cell = self.controller(station_id)?;
        let ctl = cell.lock().await;

        // 空叫号位上的重复叫号是客户端视图过期，按并发冲突处理
        let current = ctl.current().ok_or_else(|| ClinicError::SlotEmpty {
            station: station_id.to_string(),
        })?;
        let station = ctl.station().clone();
        drop(ctl);

        let patient = self.store.touch_called_at(current).await?;
        tracing::info!(
            "Station {} recalled patient {} ({})",
            station.id,
            patient.id,
            patient.name
        );
        self.announce(&patient, &station, true).await;
        Ok(patient)
    }

    /// 完成接待
    ///
    /// 分诊完成后必须指定下一诊室（`route_to`），患者进入等待医生
    /// 队列；诊室完成后患者标记为已完成。
    pub async fn finish(
        &self,
        station_id: &str,
        patient_id: Uuid,
        route_to: Option<&str>,
    ) -> Result<Patient> {
        let cell = self.controller(station_id)?;
        let mut ctl = cell.lock().await;

        if ctl.current() != Some(patient_id) {
            return Err(ClinicError::NotOccupant {
                station: station_id.to_string(),
                patient: patient_id.to_string(),
            });
        }

        let station = ctl.station().clone();
        let patient = self.store.get(patient_id).await?;
        let event = PatientEvent::Finished(station.kind);
        let next = self.machine.transition(patient.status, &event)?;

        let update = match station.kind {
            StationKind::Triage => {
                let target_id = route_to.ok_or_else(|| {
                    ClinicError::Validation(
                        "finishing triage requires a destination station".to_string(),
                    )
                })?;
                let target = self.station_config(target_id)?;
                if target.kind != StationKind::Consultation {
                    return Err(ClinicError::Validation(format!(
                        "station {} is not a consultation station",
                        target_id
                    )));
                }
                TransitionUpdate::routed(&target.id)
            }
            StationKind::Consultation => TransitionUpdate::default(),
        };

        let finished = self
            .store
            .transition(patient_id, patient.status, next, update)
            .await?;

        ctl.release(patient_id)?;
        self.registry.release(&station.id);
        drop(ctl);

        tracing::info!(
            "Station {} finished patient {} -> {}",
            station.id,
            patient_id,
            finished.status
        );
        Ok(finished)
    }

    /// 标记未到场
    ///
    /// 清空叫号位，患者进入终态 `NoShow`，等待保留策略移除。
    pub async fn no_show(&self, station_id: &str, patient_id: Uuid) -> Result<Patient> {
        let cell = self.controller(station_id)?;
        let mut ctl = cell.lock().await;

        if ctl.current() != Some(patient_id) {
            return Err(ClinicError::NotOccupant {
                station: station_id.to_string(),
                patient: patient_id.to_string(),
            });
        }

        let station = ctl.station().clone();
        let patient = self.store.get(patient_id).await?;
        let next = self
            .machine
            .transition(patient.status, &PatientEvent::MarkedNoShow)?;

        let marked = self
            .store
            .transition(patient_id, patient.status, next, TransitionUpdate::default())
            .await?;

        ctl.release(patient_id)?;
        self.registry.release(&station.id);
        drop(ctl);

        tracing::info!("Station {} marked patient {} as no-show", station.id, patient_id);
        Ok(marked)
    }

    /// 改派等待中的患者到另一站点（无播报）
    pub async fn reroute(&self, patient_id: Uuid, station_id: &str) -> Result<Patient> {
        let station = self.station_config(station_id)?;
        self.store.reroute(patient_id, &station).await
    }

    /// 更新患者备注
    pub async fn update_notes(&self, patient_id: Uuid, notes: Option<String>) -> Result<Patient> {
        self.store.set_notes(patient_id, notes).await
    }

    /// 显式删除患者，同时回收其占用的叫号位
    pub async fn remove_patient(&self, patient_id: Uuid) -> bool {
        for cell in self.stations.values() {
            let mut ctl = cell.lock().await;
            if ctl.current() == Some(patient_id) {
                ctl.clear();
                self.registry.release(&ctl.station().id);
            }
        }
        self.store.remove(patient_id).await
    }

    /// 系统概览
    pub async fn overview(&self) -> EngineOverview {
        let snapshot = self.store.snapshot().await;
        let count = |status: PatientStatus| snapshot.iter().filter(|p| p.status == status).count();

        let mut queues = Vec::new();
        for station in self.stations() {
            let waiting = clinicq_queue::index::order_waiting(snapshot.clone(), &station).len();
            let occupant = self.registry.occupant(&station.id);
            queues.push(StationQueueSummary {
                station_id: station.id,
                display_name: station.display_name,
                kind: station.kind,
                waiting,
                occupant,
            });
        }

        EngineOverview {
            unit: self.store.unit().to_string(),
            total_patients: snapshot.len(),
            waiting_triage: count(PatientStatus::Waiting),
            in_triage: count(PatientStatus::InTriage),
            waiting_doctor: count(PatientStatus::WaitingDoctor),
            in_consultation: count(PatientStatus::InConsultation),
            attended: count(PatientStatus::Attended),
            occupied_slots: self.registry.occupied_ids().len(),
            queues,
        }
    }

    async fn announce(&self, patient: &Patient, station: &Station, repeat: bool) {
        let announcement = CallAnnouncement {
            unit: self.store.unit().to_string(),
            patient_name: patient.name.clone(),
            station_id: station.id.clone(),
            station_display_name: station.display_name.clone(),
            repeat,
            at: patient.called_at.unwrap_or_else(Utc::now),
        };
        if let Err(e) = self.announcer.announce(&announcement).await {
            // 播报失败不影响已完成的状态转换
            tracing::error!(
                "Announcement for patient {} on station {} failed: {}",
                patient.id,
                station.id,
                e
            );
        }
    }

    fn controller(&self, station_id: &str) -> Result<&Mutex<StationController>> {
        self.stations
            .get(station_id)
            .ok_or_else(|| ClinicError::NotFound(format!("station {} not found", station_id)))
    }
}

/// 系统概览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOverview {
    pub unit: String,
    pub total_patients: usize,
    pub waiting_triage: usize,
    pub in_triage: usize,
    pub waiting_doctor: usize,
    pub in_consultation: usize,
    pub attended: usize,
    pub occupied_slots: usize,
    pub queues: Vec<StationQueueSummary>,
}

/// 单站点队列摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationQueueSummary {
    pub station_id: String,
    pub display_name: String,
    pub kind: StationKind,
    pub waiting: usize,
    pub occupant: Option<Uuid>,
}
