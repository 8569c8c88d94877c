//! 播报调度器
//!
//! 把一次叫号变成对外可感知的播报：拼装播报语句、调用语音合成、
//! 发布大屏事件、推送注册的显示端点。语音合成失败时降级为纯显示
//! 播报，绝不向上游报错，叫号状态转换不因播报链路受影响。

use std::sync::Arc;

use async_trait::async_trait;
use clinicq_core::{Announcer, CallAnnouncement, Result};
use tracing::{info, warn};

use crate::display::{DisplayChannel, DisplayEvent, DisplayNotifier};
use crate::voice::VoiceSynthesizer;

/// 播报调度器
pub struct AnnouncementDispatcher {
    voice: Option<VoiceSynthesizer>,
    channel: Arc<DisplayChannel>,
    notifier: Arc<DisplayNotifier>,
}

impl AnnouncementDispatcher {
    pub fn new(
        voice: Option<VoiceSynthesizer>,
        channel: Arc<DisplayChannel>,
        notifier: Arc<DisplayNotifier>,
    ) -> Self {
        Self {
            voice,
            channel,
            notifier,
        }
    }

    /// 拼装播报语句
    ///
    /// 重复叫号加上提示前缀，避免大厅里听成新叫号。
    pub fn compose_sentence(call: &CallAnnouncement) -> String {
        let base = format!(
            "{}. Por favor, dirija-se à {}.",
            call.patient_name, call.station_display_name
        );
        if call.repeat {
            format!("Atenção: {}", base)
        } else {
            base
        }
    }

    /// 合成播报音频；失败降级为纯显示
    async fn synthesize(&self, call: &CallAnnouncement) -> Option<Vec<u8>> {
        let voice = self.voice.as_ref()?;
        let sentence = Self::compose_sentence(call);

        match voice.synthesize(&sentence).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!(
                    "Voice synthesis failed, falling back to display-only: {}",
                    e
                );
                None
            }
        }
    }
}

#[async_trait]
impl Announcer for AnnouncementDispatcher {
    async fn announce(&self, call: &CallAnnouncement) -> Result<()> {
        info!(
            "Announcing {} -> {} (repeat: {})",
            call.patient_name, call.station_display_name, call.repeat
        );

        let audio = self.synthesize(call).await;
        let event = DisplayEvent::from_announcement(call, audio);

        self.notifier.push(&event).await;
        self.channel.publish(event);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use clinicq_core::ClinicError;

    use super::*;
    use crate::voice::{TtsBackend, VoiceConfig};

    struct StubBackend {
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TtsBackend for StubBackend {
        async fn request(
            &self,
            _config: &VoiceConfig,
            _api_key: &str,
            text: &str,
        ) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(ClinicError::ExternalService("simulated outage".to_string()))
            } else {
                Ok(vec![0xAB])
            }
        }
    }

    fn call(repeat: bool) -> CallAnnouncement {
        CallAnnouncement {
            unit: "unit-a".to_string(),
            patient_name: "Carlos Silva".to_string(),
            station_id: "room-1".to_string(),
            station_display_name: "Consultório 1".to_string(),
            repeat,
            at: Utc::now(),
        }
    }

    fn synth(fail: bool, calls: Arc<Mutex<Vec<String>>>) -> VoiceSynthesizer {
        let config = VoiceConfig {
            enabled: true,
            api_keys: vec!["key-a".to_string()],
            ..VoiceConfig::default()
        };
        VoiceSynthesizer::with_backend(config, Box::new(StubBackend { fail, calls }))
    }

    #[test]
    fn test_compose_sentence() {
        let sentence = AnnouncementDispatcher::compose_sentence(&call(false));
        assert_eq!(sentence, "Carlos Silva. Por favor, dirija-se à Consultório 1.");
    }

    #[test]
    fn test_compose_sentence_recall_prefix() {
        let sentence = AnnouncementDispatcher::compose_sentence(&call(true));
        assert!(sentence.starts_with("Atenção: Carlos Silva."));
    }

    #[tokio::test]
    async fn test_announce_with_voice_attaches_audio() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let channel = Arc::new(DisplayChannel::new());
        let mut rx = channel.subscribe();

        let dispatcher = AnnouncementDispatcher::new(
            Some(synth(false, calls.clone())),
            channel,
            Arc::new(DisplayNotifier::new()),
        );

        dispatcher.announce(&call(false)).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.audio, Some(vec![0xAB]));
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &["Carlos Silva. Por favor, dirija-se à Consultório 1.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_voice_failure_degrades_to_display_only() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let channel = Arc::new(DisplayChannel::new());
        let mut rx = channel.subscribe();

        let dispatcher = AnnouncementDispatcher::new(
            Some(synth(true, calls.clone())),
            channel,
            Arc::new(DisplayNotifier::new()),
        );

        // 语音失败只降级，不报错
        dispatcher.announce(&call(false)).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(event.audio.is_none());
        assert_eq!(event.patient_name, "Carlos Silva");
    }

    #[tokio::test]
    async fn test_announce_without_voice() {
        let channel = Arc::new(DisplayChannel::new());
        let mut rx = channel.subscribe();

        let dispatcher =
            AnnouncementDispatcher::new(None, channel, Arc::new(DisplayNotifier::new()));
        dispatcher.announce(&call(true)).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(event.audio.is_none());
        assert!(event.repeat);
    }
}
