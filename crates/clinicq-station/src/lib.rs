//! # ClinicQ 站点模块
//!
//! 管理分诊台与诊室的叫号流程，包括：
//! - 患者状态机：登记到完成/未到场的完整生命周期转换
//! - 站点控制器：每站点唯一的当前叫号位及 call/recall/finish/no-show 动作
//! - 队列引擎：协调存储、队列索引、占用登记与播报调度的统一入口

pub mod controller;
pub mod engine;
pub mod state_machine;

// 重新导出主要类型
pub use controller::StationController;
pub use engine::{EngineOverview, QueueEngine, StationQueueSummary};
pub use state_machine::{PatientEvent, PatientStateMachine};
