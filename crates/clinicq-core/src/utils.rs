//! 通用工具函数

use crate::error::{ClinicError, Result};
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};

/// 患者姓名长度上限
pub const MAX_PATIENT_NAME_LEN: usize = 120;

/// 校验并规整患者姓名
///
/// 去除首尾空白；空白姓名在任何写入发生之前被拒绝。
pub fn valid_patient_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ClinicError::Validation("patient name is empty".to_string()));
    }
    if trimmed.len() > MAX_PATIENT_NAME_LEN {
        return Err(ClinicError::Validation(format!(
            "patient name exceeds {} bytes",
            MAX_PATIENT_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// 计算诊所本地时区当天零点对应的UTC时刻
///
/// 清理任务以此为界删除前一天遗留的排队记录。
pub fn start_of_local_day(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let midnight = local
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(local);
    midnight.with_timezone(&Utc)
}

/// 根据小时偏移构造固定时区
pub fn offset_from_hours(hours: i8) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours as i32 * 3600)
        .ok_or_else(|| ClinicError::Config(format!("invalid utc offset: {}", hours)))
}

/// now 减去 minutes 分钟
pub fn minutes_ago(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    now - Duration::minutes(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_valid_patient_name() {
        assert_eq!(valid_patient_name("  Ana Souza  ").unwrap(), "Ana Souza");
        assert!(valid_patient_name("   ").is_err());
        assert!(valid_patient_name(&"x".repeat(200)).is_err());
    }

    #[test]
    fn test_start_of_local_day() {
        // UTC-3 时区：UTC 02:30 仍属于本地前一天
        let offset = offset_from_hours(-3).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 2, 30, 0).unwrap();
        let day_start = start_of_local_day(now, offset);
        assert_eq!(
            day_start,
            Utc.with_ymd_and_hms(2024, 6, 9, 3, 0, 0).unwrap()
        );
        assert!(day_start <= now);
    }

    #[test]
    fn test_offset_from_hours() {
        assert!(offset_from_hours(-3).is_ok());
        assert!(offset_from_hours(0).is_ok());
        assert!(offset_from_hours(30).is_err());
    }
}
