//! # ClinicQ 管理模块
//!
//! 提供诊所排队系统的运行配置与运营统计能力：
//! - 配置加载与验证（默认值、配置文件、环境变量分层）
//! - 队列统计聚合（状态计数、平均等待、按小时叫号分布）
//! - 日报生成（文本摘要与JSON导出）

pub mod config;
pub mod report;
pub mod stats;

// 重新导出主要类型
pub use config::{ClinicConfig, ConfigLoader, StationEntry};
pub use report::DailyReport;
pub use stats::{HourlyBucket, QueueStatistics, StatusCounts};
