//! # ClinicQ 队列模块
//!
//! 提供患者记录与排队视图的单一数据源，包括：
//! - 患者记录存储：全部状态变更的唯一写入点，条件更新保证原子性
//! - 队列索引：按（优先级，登记时间）派生各站点的有序等待列表
//! - 变更事件：基于广播通道的订阅契约，替代外部实时推送
//! - 占用登记表：站点叫号位与清理任务之间的共享视图
//! - 闲置清理：周期性清除隔日遗留与超时未响应的排队记录

pub mod events;
pub mod index;
pub mod occupancy;
pub mod reaper;
pub mod store;

// 重新导出主要类型
pub use events::{ChangeEvent, ChangeKind};
pub use index::QueueIndex;
pub use occupancy::OccupancyRegistry;
pub use reaper::{InactivityReaper, ReaperConfig, SweepReport};
pub use store::{PatientStore, TransitionUpdate};
