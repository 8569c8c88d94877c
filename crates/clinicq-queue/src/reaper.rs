//! 闲置清理任务
//!
//! 周期性扫描存储，删除两类遗留记录：
//! 1. 登记于本地日历当天零点之前的全部患者（隔日遗留，含已完成
//!    与未到场的终态记录，叫号历史另行保留报表数据）；
//! 2. 处于叫号中状态但登记时间超过闲置阈值的患者（废弃登记）。
//!
//! 这是一个粗粒度的最终一致清理，允许延迟或跳过一轮，下一轮会兜底。
//! 正在占用站点叫号位的患者一律不清理。

use crate::occupancy::OccupancyRegistry;
use crate::store::PatientStore;
use chrono::{FixedOffset, Utc};
use clinicq_core::utils::{minutes_ago, offset_from_hours, start_of_local_day};
use clinicq_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// 清理任务配置
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// 扫描间隔
    pub interval: Duration,
    /// 叫号中状态的闲置阈值（分钟）
    pub inactive_after_minutes: i64,
    /// 诊所本地时区相对UTC的小时偏移
    pub utc_offset_hours: i8,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            inactive_after_minutes: 10,
            utc_offset_hours: -3,
        }
    }
}

/// 单轮清理结果
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed_previous_day: usize,
    pub removed_inactive: usize,
    pub released_slots: usize,
}

/// 闲置清理任务
pub struct InactivityReaper {
    store: Arc<PatientStore>,
    registry: Arc<OccupancyRegistry>,
    offset: FixedOffset,
    config: ReaperConfig,
}

impl InactivityReaper {
    pub fn new(
        store: Arc<PatientStore>,
        registry: Arc<OccupancyRegistry>,
        config: ReaperConfig,
    ) -> Result<Self> {
        let offset = offset_from_hours(config.utc_offset_hours)?;
        Ok(Self {
            store,
            registry,
            offset,
            config,
        })
    }

    /// 执行一轮清理
    pub async fn sweep(&self) -> SweepReport {
        let now = Utc::now();
        let day_start = start_of_local_day(now, self.offset);
        let inactive_before = minutes_ago(now, self.config.inactive_after_minutes);

        tracing::debug!(
            "Running patient cleanup for {} (day start {}, inactive before {})",
            self.store.unit(),
            day_start,
            inactive_before
        );

        // 先释放占用者已不存在的叫号位，再以剩余占用者为排除集合
        let snapshot = self.store.snapshot().await;
        let released = self
            .registry
            .reconcile(|id| snapshot.iter().any(|p| p.id == id));
        for station in &released {
            tracing::warn!("Released stale call slot on station {}", station);
        }

        let exclude = self.registry.occupied_ids();
        let removed = self.store.reap(day_start, inactive_before, &exclude).await;

        let mut report = SweepReport {
            released_slots: released.len(),
            ..Default::default()
        };
        for patient in &removed {
            if patient.created_at < day_start {
                report.removed_previous_day += 1;
            } else {
                report.removed_inactive += 1;
            }
            tracing::info!(
                "Reaped patient {} ({}, {}) from unit {}",
                patient.id,
                patient.name,
                patient.status,
                self.store.unit()
            );
        }

        if report.removed_previous_day + report.removed_inactive > 0 {
            tracing::info!(
                "Cleanup removed {} previous-day and {} inactive patients",
                report.removed_previous_day,
                report.removed_inactive
            );
        }
        report
    }

    /// 周期运行，直到关停信号
    ///
    /// 启动时立即执行一轮；单轮失败只记录日志，下一轮重试。
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        tracing::info!(
            "Inactivity reaper started for unit {} (interval {:?}, threshold {} min)",
            self.store.unit(),
            self.config.interval,
            self.config.inactive_after_minutes
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Inactivity reaper stopping");
                        break;
                    }
                }
            }
        }
    }
}
