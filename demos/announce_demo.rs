//! 播报链路演示程序
//!
//! 展示播报调度器的工作方式：语句拼装、多密钥语音合成故障转移、
//! 语音失败时降级为纯显示播报。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use clinicq_announce::{
    AnnouncementDispatcher, DisplayChannel, DisplayNotifier, TtsBackend, VoiceConfig,
    VoiceSynthesizer,
};
use clinicq_core::{Announcer, CallAnnouncement, ClinicError, Result as ClinicResult};

/// 模拟TTS后端：第一把密钥总是失败
struct DemoBackend;

#[async_trait]
impl TtsBackend for DemoBackend {
    async fn request(&self, _config: &VoiceConfig, api_key: &str, text: &str) -> ClinicResult<Vec<u8>> {
        if api_key == "key-primary" {
            println!("   ❌ 密钥 {} 调用失败（模拟配额耗尽）", api_key);
            return Err(ClinicError::ExternalService("quota exceeded".to_string()));
        }
        println!("   ✅ 密钥 {} 合成成功: \"{}\"", api_key, text);
        Ok(text.as_bytes().to_vec())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("📢 ClinicQ 播报链路演示\n");

    // 1. 组装播报链路：两把密钥，主密钥会失败
    let config = VoiceConfig {
        enabled: true,
        api_keys: vec!["key-primary".to_string(), "key-backup".to_string()],
        ..VoiceConfig::default()
    };
    let voice = VoiceSynthesizer::with_backend(config, Box::new(DemoBackend));

    let channel = Arc::new(DisplayChannel::new());
    let notifier = Arc::new(DisplayNotifier::new());
    let dispatcher = AnnouncementDispatcher::new(Some(voice), channel.clone(), notifier);
    println!("✅ 播报调度器就绪（2把TTS密钥）");

    // 2. 订阅大屏事件
    let mut display = channel.subscribe();

    // 3. 发出一次叫号播报
    println!("\n🔔 叫号播报（观察密钥故障转移）:");
    let call = CallAnnouncement {
        unit: "demo-clinic".to_string(),
        patient_name: "Ana Souza".to_string(),
        station_id: "room-1".to_string(),
        station_display_name: "Consultório 1".to_string(),
        repeat: false,
        at: Utc::now(),
    };
    dispatcher.announce(&call).await?;

    let event = display.recv().await?;
    println!("\n🖥️  大屏收到事件:");
    println!("   患者: {}", event.patient_name);
    println!("   站点: {}", event.station_display_name);
    println!("   携带音频: {}", event.audio.is_some());

    // 4. 重复叫号带提示前缀
    println!("\n🔔 重复叫号:");
    let recall = CallAnnouncement { repeat: true, ..call };
    println!(
        "   语句: \"{}\"",
        AnnouncementDispatcher::compose_sentence(&recall)
    );
    dispatcher.announce(&recall).await?;
    let event = display.recv().await?;
    println!("   大屏事件 repeat = {}", event.repeat);

    println!("\n🎉 演示完成");
    Ok(())
}
