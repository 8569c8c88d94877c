//! 语音合成客户端
//!
//! 对接外部文本转语音服务。多把API密钥轮换使用：每次请求从
//! 下一把密钥开始，单把失败则继续尝试其余密钥，全部失败才向
//! 调用方返回 `AllProvidersFailed`。

use clinicq_core::{ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 语音合成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// 是否启用语音合成
    pub enabled: bool,
    /// 服务端点
    pub endpoint: String,
    /// 音色标识
    pub voice_id: String,
    /// 模型标识
    pub model_id: String,
    /// 可用API密钥列表
    pub api_keys: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.elevenlabs.io/v1/text-to-speech".to_string(),
            voice_id: "SVgp5d1fyFQRW1eQbwkq".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            api_keys: Vec::new(),
        }
    }
}

/// 语音合成后端接口
///
/// 生产实现走HTTP；测试用桩实现验证故障转移逻辑。
#[async_trait::async_trait]
pub trait TtsBackend: Send + Sync {
    async fn request(&self, config: &VoiceConfig, api_key: &str, text: &str) -> Result<Vec<u8>>;
}

/// HTTP后端
struct HttpTtsBackend {
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl TtsBackend for HttpTtsBackend {
    async fn request(&self, config: &VoiceConfig, api_key: &str, text: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", config.endpoint.trim_end_matches('/'), config.voice_id);
        let body = serde_json::json!({
            "text": text,
            "model_id": config.model_id,
            "output_format": "mp3_44100_128",
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
                "style": 0.3,
                "use_speaker_boost": true,
            },
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClinicError::ExternalService(format!("tts request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ClinicError::ExternalService(format!(
                "tts provider returned status {}",
                response.status()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| ClinicError::ExternalService(format!("tts body read failed: {}", e)))?;
        Ok(audio.to_vec())
    }
}

/// 语音合成器
pub struct VoiceSynthesizer {
    config: VoiceConfig,
    backend: Box<dyn TtsBackend>,
    next_key: AtomicUsize,
}

impl VoiceSynthesizer {
    /// 创建使用HTTP后端的合成器
    pub fn new(config: VoiceConfig) -> Self {
        Self::with_backend(
            config,
            Box::new(HttpTtsBackend {
                client: reqwest::Client::new(),
            }),
        )
    }

    /// 使用指定后端创建合成器
    pub fn with_backend(config: VoiceConfig, backend: Box<dyn TtsBackend>) -> Self {
        Self {
            config,
            backend,
            next_key: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// 合成语音，逐个尝试密钥直到成功
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let keys = &self.config.api_keys;
        if keys.is_empty() {
            return Err(ClinicError::Config("no tts api keys configured".to_string()));
        }

        // 轮换起点，请求量分摊到所有密钥
        let start = self.next_key.fetch_add(1, Ordering::Relaxed);
        let mut last_error: Option<ClinicError> = None;

        for attempt in 0..keys.len() {
            let idx = (start + attempt) % keys.len();
            tracing::debug!("Trying tts api key {} of {}", idx + 1, keys.len());

            match self.backend.request(&self.config, &keys[idx], text).await {
                Ok(audio) => {
                    tracing::info!(
                        "Synthesized {} bytes of audio with key {}",
                        audio.len(),
                        idx + 1
                    );
                    return Ok(audio);
                }
                Err(e) => {
                    tracing::warn!("Tts api key {} failed: {}", idx + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(ClinicError::AllProvidersFailed {
            attempts: keys.len(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// 指定密钥失败、其余成功的桩后端
    struct FlakyBackend {
        failing_keys: HashSet<String>,
        attempts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl TtsBackend for FlakyBackend {
        async fn request(
            &self,
            _config: &VoiceConfig,
            api_key: &str,
            _text: &str,
        ) -> Result<Vec<u8>> {
            self.attempts.lock().unwrap().push(api_key.to_string());
            if self.failing_keys.contains(api_key) {
                Err(ClinicError::ExternalService("quota exceeded".to_string()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn config(keys: &[&str]) -> VoiceConfig {
        VoiceConfig {
            enabled: true,
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..VoiceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failover_to_next_key() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let backend = FlakyBackend {
            failing_keys: HashSet::from(["key-a".to_string()]),
            attempts: attempts.clone(),
        };
        let synth = VoiceSynthesizer::with_backend(config(&["key-a", "key-b"]), Box::new(backend));

        let audio = synth.synthesize("Ana. Por favor, dirija-se à Triagem.").await;
        assert_eq!(audio.unwrap(), vec![1, 2, 3]);
        assert_eq!(*attempts.lock().unwrap(), vec!["key-a", "key-b"]);
    }

    #[tokio::test]
    async fn test_all_keys_failing_surfaces_error() {
        let backend = FlakyBackend {
            failing_keys: HashSet::from(["key-a".to_string(), "key-b".to_string()]),
            attempts: Arc::new(Mutex::new(Vec::new())),
        };
        let synth = VoiceSynthesizer::with_backend(config(&["key-a", "key-b"]), Box::new(backend));

        let err = synth.synthesize("texto").await.unwrap_err();
        match err {
            ClinicError::AllProvidersFailed { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_key_rotation_spreads_requests() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let backend = FlakyBackend {
            failing_keys: HashSet::new(),
            attempts: attempts.clone(),
        };
        let synth = VoiceSynthesizer::with_backend(config(&["key-a", "key-b"]), Box::new(backend));

        synth.synthesize("um").await.unwrap();
        synth.synthesize("dois").await.unwrap();

        // 每次请求从下一把密钥开始
        assert_eq!(*attempts.lock().unwrap(), vec!["key-a", "key-b"]);
    }

    #[tokio::test]
    async fn test_no_keys_is_config_error() {
        let synth = VoiceSynthesizer::with_backend(
            config(&[]),
            Box::new(FlakyBackend {
                failing_keys: HashSet::new(),
                attempts: Arc::new(Mutex::new(Vec::new())),
            }),
        );
        assert!(matches!(
            synth.synthesize("texto").await.unwrap_err(),
            ClinicError::Config(_)
        ));
    }
}
