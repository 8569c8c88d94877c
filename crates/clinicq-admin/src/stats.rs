//! 队列统计聚合
//!
//! 全部是快照上的纯函数，不做缓存：调用方传入患者快照与叫号历史，
//! 每次现算。诊所规模的数据量下这样最简单也足够快。

use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use clinicq_core::{CallHistoryEntry, Patient, PatientStatus};
use serde::{Deserialize, Serialize};

/// 按状态的患者计数
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusCounts {
    pub waiting: usize,
    pub in_triage: usize,
    pub waiting_doctor: usize,
    pub in_consultation: usize,
    pub attended: usize,
    pub no_show: usize,
    pub total: usize,
}

/// 小时叫号分布桶
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourlyBucket {
    /// 桶起始时刻（整点，UTC）
    pub hour_start: DateTime<Utc>,
    pub calls: usize,
}

/// 聚合后的队列统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatistics {
    pub status_counts: StatusCounts,
    /// 平均等待时长（分钟），无已叫号患者时为None
    pub average_wait_minutes: Option<f64>,
    pub hourly_calls: Vec<HourlyBucket>,
    pub calls_by_station: HashMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

/// 按状态统计患者数量
pub fn status_counts(patients: &[Patient]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for patient in patients {
        match patient.status {
            PatientStatus::Waiting => counts.waiting += 1,
            PatientStatus::InTriage => counts.in_triage += 1,
            PatientStatus::WaitingDoctor => counts.waiting_doctor += 1,
            PatientStatus::InConsultation => counts.in_consultation += 1,
            PatientStatus::Attended => counts.attended += 1,
            PatientStatus::NoShow => counts.no_show += 1,
        }
        counts.total += 1;
    }
    counts
}

/// 平均等待时长（登记到首次叫号，分钟）
///
/// 只统计已被叫号的患者；还没叫到的不计入，避免把正在变长的
/// 等待时间算成均值。
pub fn average_wait_minutes(patients: &[Patient]) -> Option<f64> {
    let waits: Vec<i64> = patients
        .iter()
        .filter_map(|p| {
            p.called_at
                .map(|called| (called - p.created_at).num_seconds().max(0))
        })
        .collect();

    if waits.is_empty() {
        return None;
    }

    let total: i64 = waits.iter().sum();
    Some(total as f64 / waits.len() as f64 / 60.0)
}

/// 最近N小时的叫号分布
///
/// 返回`hours`个整点桶，最旧的在前，当前小时在最后；窗口外的
/// 历史记录忽略。
pub fn hourly_histogram(
    history: &[CallHistoryEntry],
    now: DateTime<Utc>,
    hours: usize,
) -> Vec<HourlyBucket> {
    let current_hour = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let mut buckets: Vec<HourlyBucket> = (0..hours)
        .rev()
        .map(|offset| HourlyBucket {
            hour_start: current_hour - Duration::hours(offset as i64),
            calls: 0,
        })
        .collect();

    let window_start = current_hour - Duration::hours(hours.saturating_sub(1) as i64);
    for entry in history {
        if entry.called_at < window_start || entry.called_at >= current_hour + Duration::hours(1) {
            continue;
        }
        let offset = (entry.called_at - window_start).num_hours() as usize;
        if let Some(bucket) = buckets.get_mut(offset) {
            bucket.calls += 1;
        }
    }

    buckets
}

/// 各站点的叫号次数
pub fn calls_by_station(history: &[CallHistoryEntry]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for entry in history {
        *counts.entry(entry.station_id.clone()).or_insert(0) += 1;
    }
    counts
}

impl QueueStatistics {
    /// 统计窗口：最近8小时，对应一个门诊班次
    pub const HISTOGRAM_HOURS: usize = 8;

    pub fn collect(
        patients: &[Patient],
        history: &[CallHistoryEntry],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status_counts: status_counts(patients),
            average_wait_minutes: average_wait_minutes(patients),
            hourly_calls: hourly_histogram(history, now, Self::HISTOGRAM_HOURS),
            calls_by_station: calls_by_station(history),
            generated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use clinicq_core::{Priority, StationKind};
    use uuid::Uuid;

    use super::*;

    fn patient(status: PatientStatus, wait_minutes: Option<i64>) -> Patient {
        let created_at = Utc::now() - Duration::hours(1);
        Patient {
            id: Uuid::new_v4(),
            unit: "unit-a".to_string(),
            name: "Ana".to_string(),
            priority: Priority::Normal,
            status,
            station: None,
            created_at,
            called_at: wait_minutes.map(|m| created_at + Duration::minutes(m)),
            notes: None,
        }
    }

    fn history_entry(called_at: DateTime<Utc>, station_id: &str) -> CallHistoryEntry {
        CallHistoryEntry {
            id: Uuid::new_v4(),
            unit: "unit-a".to_string(),
            patient_id: Uuid::new_v4(),
            patient_name: "Ana".to_string(),
            called_by: StationKind::Triage,
            station_id: station_id.to_string(),
            called_at,
        }
    }

    #[test]
    fn test_status_counts() {
        let patients = vec![
            patient(PatientStatus::Waiting, None),
            patient(PatientStatus::Waiting, None),
            patient(PatientStatus::InConsultation, Some(5)),
            patient(PatientStatus::Attended, Some(8)),
        ];

        let counts = status_counts(&patients);
        assert_eq!(counts.waiting, 2);
        assert_eq!(counts.in_consultation, 1);
        assert_eq!(counts.attended, 1);
        assert_eq!(counts.no_show, 0);
        assert_eq!(counts.total, 4);
    }

    #[test]
    fn test_average_wait_ignores_uncalled() {
        let patients = vec![
            patient(PatientStatus::Waiting, None),
            patient(PatientStatus::InTriage, Some(4)),
            patient(PatientStatus::Attended, Some(8)),
        ];

        let avg = average_wait_minutes(&patients).unwrap();
        assert!((avg - 6.0).abs() < 0.01);
    }

    #[test]
    fn test_average_wait_empty() {
        assert!(average_wait_minutes(&[]).is_none());
        assert!(average_wait_minutes(&[patient(PatientStatus::Waiting, None)]).is_none());
    }

    #[test]
    fn test_hourly_histogram_buckets() {
        let now = Utc::now();
        let history = vec![
            history_entry(now, "triage"),
            history_entry(now - Duration::hours(1), "triage"),
            history_entry(now - Duration::hours(1), "room-1"),
            // 窗口之外
            history_entry(now - Duration::hours(12), "triage"),
        ];

        let buckets = hourly_histogram(&history, now, 8);
        assert_eq!(buckets.len(), 8);
        assert_eq!(buckets[7].calls, 1); // 当前小时
        assert_eq!(buckets[6].calls, 2);
        let total: usize = buckets.iter().map(|b| b.calls).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_calls_by_station() {
        let now = Utc::now();
        let history = vec![
            history_entry(now, "triage"),
            history_entry(now, "triage"),
            history_entry(now, "room-1"),
        ];

        let counts = calls_by_station(&history);
        assert_eq!(counts["triage"], 2);
        assert_eq!(counts["room-1"], 1);
    }

    #[test]
    fn test_collect_bundles_everything() {
        let now = Utc::now();
        let patients = vec![patient(PatientStatus::Attended, Some(10))];
        let history = vec![history_entry(now, "triage")];

        let stats = QueueStatistics::collect(&patients, &history, now);
        assert_eq!(stats.status_counts.total, 1);
        assert!(stats.average_wait_minutes.is_some());
        assert_eq!(stats.hourly_calls.len(), QueueStatistics::HISTOGRAM_HOURS);
        assert_eq!(stats.calls_by_station["triage"], 1);
    }
}
