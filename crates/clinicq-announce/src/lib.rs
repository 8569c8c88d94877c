//! # ClinicQ 播报模块
//!
//! 把站点的叫号事件转换成对外的播报请求，包括：
//! - 语音合成客户端：多凭据轮换与逐个故障转移
//! - 大屏通道：进程内广播加对外的显示端点推送（签名Webhook）
//! - 播报调度器：语音失败降级为仅显示，绝不影响已落盘的状态转换

pub mod dispatcher;
pub mod display;
pub mod voice;

// 重新导出主要类型
pub use dispatcher::AnnouncementDispatcher;
pub use display::{DisplayChannel, DisplayEndpoint, DisplayEvent, DisplayNotifier};
pub use voice::{TtsBackend, VoiceConfig, VoiceSynthesizer};
