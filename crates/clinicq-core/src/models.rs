//! 核心数据模型定义

use crate::error::{ClinicError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 患者优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Emergency, // 急救
    Priority,  // 优先
    Normal,    // 普通
}

impl Priority {
    /// 排序等级，数值越小越靠前
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Emergency => 0,
            Priority::Priority => 1,
            Priority::Normal => 2,
        }
    }

    /// 从外部输入解析优先级
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "emergency" => Ok(Priority::Emergency),
            "priority" => Ok(Priority::Priority),
            "normal" => Ok(Priority::Normal),
            other => Err(ClinicError::Validation(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

/// 患者生命周期状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PatientStatus {
    Waiting,        // 等待分诊
    InTriage,       // 分诊中
    WaitingDoctor,  // 等待医生
    InConsultation, // 就诊中
    Attended,       // 已完成
    NoShow,         // 未到场
}

impl PatientStatus {
    /// 是否为被叫号中的活跃状态（占用站点叫号位）
    pub fn is_active(&self) -> bool {
        matches!(self, PatientStatus::InTriage | PatientStatus::InConsultation)
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, PatientStatus::Attended | PatientStatus::NoShow)
    }

    /// 是否为等待类状态（可被叫号或改派）
    pub fn is_waiting(&self) -> bool {
        matches!(self, PatientStatus::Waiting | PatientStatus::WaitingDoctor)
    }
}

impl std::fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PatientStatus::Waiting => "waiting",
            PatientStatus::InTriage => "in-triage",
            PatientStatus::WaitingDoctor => "waiting-doctor",
            PatientStatus::InConsultation => "in-consultation",
            PatientStatus::Attended => "attended",
            PatientStatus::NoShow => "no-show",
        };
        write!(f, "{}", s)
    }
}

/// 患者记录，对应一次到院就诊
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub unit: String,                        // 所属诊所单元（多租户隔离标签）
    pub name: String,                        // 患者姓名
    pub priority: Priority,                  // 优先级
    pub status: PatientStatus,               // 生命周期状态
    pub station: Option<String>,             // 被分派的目标站点
    pub created_at: DateTime<Utc>,           // 登记时间，不可变
    pub called_at: Option<DateTime<Utc>>,    // 最近一次被叫号时间
    pub notes: Option<String>,               // 内部备注
}

/// 站点类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StationKind {
    Triage,       // 分诊台
    Consultation, // 诊室/处置室（医生、心电、换药、放射等）
}

impl StationKind {
    /// 叫号后患者进入的活跃状态
    pub fn in_status(&self) -> PatientStatus {
        match self {
            StationKind::Triage => PatientStatus::InTriage,
            StationKind::Consultation => PatientStatus::InConsultation,
        }
    }

    /// 完成后患者进入的下一状态
    pub fn next_status(&self) -> PatientStatus {
        match self {
            StationKind::Triage => PatientStatus::WaitingDoctor,
            StationKind::Consultation => PatientStatus::Attended,
        }
    }
}

/// 站点（叫号端点）配置数据，运行期不增删
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,           // 站点标识，如 "triage"、"room-1"
    pub display_name: String, // 播报与大屏显示名称
    pub kind: StationKind,
}

impl Station {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: StationKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
        }
    }
}

/// 叫号历史记录，写入后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHistoryEntry {
    pub id: Uuid,
    pub unit: String,
    pub patient_id: Uuid,
    pub patient_name: String,            // 患者姓名快照
    pub called_by: StationKind,          // 叫号站点类型
    pub station_id: String,              // 叫号站点标识
    pub called_at: DateTime<Utc>,
}

/// 叫号播报事件，交给播报调度器处理
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnnouncement {
    pub unit: String,
    pub patient_name: String,
    pub station_id: String,
    pub station_display_name: String,
    pub repeat: bool, // 重复叫号（recall）
    pub at: DateTime<Utc>,
}

/// 播报调度接口
///
/// 站点控制器通过该接口发出叫号播报，具体实现（语音合成、大屏推送）
/// 在 clinicq-announce 中。播报失败不得回滚状态转换。
#[async_trait::async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, call: &CallAnnouncement) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rank_ordering() {
        assert!(Priority::Emergency.rank() < Priority::Priority.rank());
        assert!(Priority::Priority.rank() < Priority::Normal.rank());
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("emergency").unwrap(), Priority::Emergency);
        assert_eq!(Priority::parse(" Normal ").unwrap(), Priority::Normal);
        assert!(Priority::parse("vip").is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(PatientStatus::InTriage.is_active());
        assert!(PatientStatus::InConsultation.is_active());
        assert!(!PatientStatus::Waiting.is_active());

        assert!(PatientStatus::Attended.is_terminal());
        assert!(PatientStatus::NoShow.is_terminal());

        assert!(PatientStatus::Waiting.is_waiting());
        assert!(PatientStatus::WaitingDoctor.is_waiting());
        assert!(!PatientStatus::InTriage.is_waiting());
    }

    #[test]
    fn test_station_kind_status_mapping() {
        assert_eq!(StationKind::Triage.in_status(), PatientStatus::InTriage);
        assert_eq!(StationKind::Triage.next_status(), PatientStatus::WaitingDoctor);
        assert_eq!(
            StationKind::Consultation.in_status(),
            PatientStatus::InConsultation
        );
        assert_eq!(StationKind::Consultation.next_status(), PatientStatus::Attended);
    }
}
