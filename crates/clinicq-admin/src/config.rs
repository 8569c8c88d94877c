//! 配置管理
//!
//! 分层加载运行配置：内置默认值 → 可选的TOML配置文件 → `CLINICQ_*`
//! 环境变量覆盖。加载后统一验证，站点列表在启动时定型，运行期不增删。

use anyhow::{bail, Context, Result};
use clinicq_core::{Station, StationKind};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 诊所系统完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicConfig {
    /// 服务器配置
    pub server: ServerSettings,
    /// 诊所单元名称（多租户隔离标签）
    pub unit_name: String,
    /// 诊所本地时区相对UTC的小时偏移
    pub utc_offset_hours: i8,
    /// 站点列表
    pub stations: Vec<StationEntry>,
    /// 清理任务配置
    pub reaper: ReaperSettings,
    /// 语音播报配置
    pub voice: VoiceSettings,
    /// 大屏显示配置
    pub display: DisplaySettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// 站点配置条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationEntry {
    pub id: String,
    pub display_name: String,
    pub kind: StationKind,
}

/// 清理任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperSettings {
    /// 扫描间隔（秒）
    pub interval_secs: u64,
    /// 活跃状态多久无动作视为放弃（分钟）
    pub inactive_after_minutes: i64,
}

/// 语音播报配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub voice_id: String,
    pub model_id: String,
    pub api_keys: Vec<String>,
}

/// 大屏显示配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub endpoints: Vec<DisplayEndpointEntry>,
}

/// 显示端点条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEndpointEntry {
    pub url: String,
    pub secret: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            unit_name: "clinic".to_string(),
            utc_offset_hours: -3,
            stations: vec![
                StationEntry {
                    id: "triage".to_string(),
                    display_name: "Triagem".to_string(),
                    kind: StationKind::Triage,
                },
                StationEntry {
                    id: "room-1".to_string(),
                    display_name: "Consultório 1".to_string(),
                    kind: StationKind::Consultation,
                },
            ],
            reaper: ReaperSettings {
                interval_secs: 60,
                inactive_after_minutes: 10,
            },
            voice: VoiceSettings {
                enabled: false,
                endpoint: "https://api.elevenlabs.io/v1/text-to-speech".to_string(),
                voice_id: "SVgp5d1fyFQRW1eQbwkq".to_string(),
                model_id: "eleven_multilingual_v2".to_string(),
                api_keys: Vec::new(),
            },
            display: DisplaySettings {
                endpoints: Vec::new(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl ClinicConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.unit_name.trim().is_empty() {
            bail!("unit_name must not be empty");
        }

        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }

        if !self
            .stations
            .iter()
            .any(|s| s.kind == StationKind::Triage)
        {
            bail!("at least one triage station is required");
        }
        if !self
            .stations
            .iter()
            .any(|s| s.kind == StationKind::Consultation)
        {
            bail!("at least one consultation station is required");
        }

        let mut seen = std::collections::HashSet::new();
        for station in &self.stations {
            if station.id.trim().is_empty() {
                bail!("station id must not be empty");
            }
            if !seen.insert(station.id.as_str()) {
                bail!("duplicate station id: {}", station.id);
            }
        }

        if self.reaper.interval_secs == 0 {
            bail!("reaper.interval_secs must be positive");
        }
        if self.reaper.inactive_after_minutes <= 0 {
            bail!("reaper.inactive_after_minutes must be positive");
        }

        if self.voice.enabled && self.voice.api_keys.is_empty() {
            bail!("voice is enabled but no API keys are configured");
        }

        Ok(())
    }

    /// 构建运行期站点列表
    pub fn to_stations(&self) -> Vec<Station> {
        self.stations
            .iter()
            .map(|entry| Station::new(entry.id.clone(), entry.display_name.clone(), entry.kind))
            .collect()
    }
}

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 分层加载并验证配置
    pub fn load(config_path: Option<&str>) -> Result<ClinicConfig> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&ClinicConfig::default())
                .context("Failed to build default configuration")?,
        );

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("CLINICQ").separator("__"))
            .build()
            .context("Failed to assemble configuration sources")?;

        let config: ClinicConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from built-in defaults"),
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClinicConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_unit_name_rejected() {
        let mut config = ClinicConfig::default();
        config.unit_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_consultation_station_rejected() {
        let mut config = ClinicConfig::default();
        config.stations.retain(|s| s.kind != StationKind::Consultation);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_station_id_rejected() {
        let mut config = ClinicConfig::default();
        let mut duplicate = config.stations[1].clone();
        duplicate.display_name = "Consultório 2".to_string();
        config.stations.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_reaper_interval_rejected() {
        let mut config = ClinicConfig::default();
        config.reaper.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_voice_enabled_without_keys_rejected() {
        let mut config = ClinicConfig::default();
        config.voice.enabled = true;
        assert!(config.validate().is_err());

        config.voice.api_keys.push("key-a".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_stations_preserves_order_and_kind() {
        let config = ClinicConfig::default();
        let stations = config.to_stations();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "triage");
        assert_eq!(stations[1].kind, StationKind::Consultation);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ConfigLoader::load(None).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.unit_name, "clinic");
    }
}
