//! 日报生成
//!
//! 把一天的队列统计汇总成可读文本与JSON，供前台导出或值班交接。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::QueueStatistics;

/// 日运营报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub unit: String,
    pub date: NaiveDate,
    pub stats: QueueStatistics,
}

impl DailyReport {
    pub fn build(unit: impl Into<String>, date: NaiveDate, stats: QueueStatistics) -> Self {
        Self {
            unit: unit.into(),
            date,
            stats,
        }
    }

    /// 渲染为值班人员可读的文本摘要
    pub fn render_text(&self) -> String {
        let counts = &self.stats.status_counts;
        let mut out = String::new();

        out.push_str(&format!("=== Relatório diário — {} ===\n", self.unit));
        out.push_str(&format!("Data: {}\n\n", self.date));

        out.push_str(&format!("Pacientes registrados: {}\n", counts.total));
        out.push_str(&format!("  Aguardando triagem:  {}\n", counts.waiting));
        out.push_str(&format!("  Em triagem:          {}\n", counts.in_triage));
        out.push_str(&format!("  Aguardando consulta: {}\n", counts.waiting_doctor));
        out.push_str(&format!("  Em consulta:         {}\n", counts.in_consultation));
        out.push_str(&format!("  Atendidos:           {}\n", counts.attended));
        out.push_str(&format!("  Não compareceram:    {}\n", counts.no_show));

        match self.stats.average_wait_minutes {
            Some(avg) => {
                out.push_str(&format!("\nEspera média até a chamada: {:.1} min\n", avg))
            }
            None => out.push_str("\nEspera média até a chamada: sem chamadas\n"),
        }

        if !self.stats.calls_by_station.is_empty() {
            out.push_str("\nChamadas por estação:\n");
            let mut stations: Vec<_> = self.stats.calls_by_station.iter().collect();
            stations.sort_by(|a, b| a.0.cmp(b.0));
            for (station, calls) in stations {
                out.push_str(&format!("  {}: {}\n", station, calls));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use clinicq_core::{Patient, PatientStatus, Priority};
    use uuid::Uuid;

    use super::*;

    fn stats() -> QueueStatistics {
        let patients = vec![Patient {
            id: Uuid::new_v4(),
            unit: "unit-a".to_string(),
            name: "Ana".to_string(),
            priority: Priority::Normal,
            status: PatientStatus::Attended,
            station: None,
            created_at: Utc::now() - chrono::Duration::minutes(30),
            called_at: Some(Utc::now() - chrono::Duration::minutes(20)),
            notes: None,
        }];
        QueueStatistics::collect(&patients, &[], Utc::now())
    }

    #[test]
    fn test_render_text_contains_counts() {
        let report = DailyReport::build(
            "unit-a",
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            stats(),
        );

        let text = report.render_text();
        assert!(text.contains("unit-a"));
        assert!(text.contains("2025-06-02"));
        assert!(text.contains("Pacientes registrados: 1"));
        assert!(text.contains("Atendidos:           1"));
        assert!(text.contains("Espera média"));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = DailyReport::build(
            "unit-a",
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            stats(),
        );

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"unit\":\"unit-a\""));
        assert!(json.contains("status_counts"));
    }
}
