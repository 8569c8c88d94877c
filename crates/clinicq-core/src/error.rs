//! 错误定义模块

use thiserror::Error;

/// 排队系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("站点 {station} 已有叫号中的患者")]
    SlotOccupied { station: String },

    #[error("站点 {station} 的等待队列为空")]
    EmptyQueue { station: String },

    #[error("站点 {station} 当前没有叫号中的患者")]
    SlotEmpty { station: String },

    #[error("患者 {patient} 不是站点 {station} 当前叫号的占用者")]
    NotOccupant { station: String, patient: String },

    #[error("外部服务错误: {0}")]
    ExternalService(String),

    #[error("全部 {attempts} 个凭据均失败: {last_error}")]
    AllProvidersFailed { attempts: usize, last_error: String },

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 排队系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
