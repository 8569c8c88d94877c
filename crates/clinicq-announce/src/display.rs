//! 大屏显示通道
//!
//! 叫号事件通过两条路径送达公共显示端：
//! - 进程内广播通道，本机大屏/演示程序直接订阅；
//! - 对外显示端点推送（带签名的Webhook），送达注册的电视终端。
//!
//! 两条路径都是即发即弃：至少一次送达即可，重复播报无害，
//! 落后的接收端只会丢失旧事件。

use chrono::{DateTime, Utc};
use clinicq_core::CallAnnouncement;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

/// 显示通道容量
const DISPLAY_CHANNEL_CAPACITY: usize = 64;

/// 大屏显示事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEvent {
    pub unit: String,
    pub patient_name: String,
    pub station_id: String,
    pub station_display_name: String,
    pub repeat: bool,
    pub timestamp: DateTime<Utc>,
    /// 合成好的播报音频；只在进程内传递，不进入Webhook负载
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
}

impl DisplayEvent {
    pub fn from_announcement(call: &CallAnnouncement, audio: Option<Vec<u8>>) -> Self {
        Self {
            unit: call.unit.clone(),
            patient_name: call.patient_name.clone(),
            station_id: call.station_id.clone(),
            station_display_name: call.station_display_name.clone(),
            repeat: call.repeat,
            timestamp: call.at,
            audio,
        }
    }
}

/// 进程内显示通道
pub struct DisplayChannel {
    tx: broadcast::Sender<DisplayEvent>,
}

impl DisplayChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DISPLAY_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// 订阅显示事件
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.tx.subscribe()
    }

    /// 广播显示事件；无订阅者是正常情况
    pub fn publish(&self, event: DisplayEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!("Display event delivered to {} receivers", receivers),
            Err(_) => debug!("No display receivers attached"),
        }
    }
}

impl Default for DisplayChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// 注册的显示端点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEndpoint {
    pub id: String,
    pub url: String,
    pub secret: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl DisplayEndpoint {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url,
            secret,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// 生成负载签名
    pub fn generate_signature(&self, payload: &str) -> Option<String> {
        use sha2::{Digest, Sha256};

        if let Some(secret) = &self.secret {
            let mut hasher = Sha256::new();
            hasher.update(payload);
            hasher.update(secret);
            Some(format!("sha256={:x}", hasher.finalize()))
        } else {
            None
        }
    }
}

/// 显示端点推送器
pub struct DisplayNotifier {
    endpoints: RwLock<Vec<DisplayEndpoint>>,
    client: reqwest::Client,
}

impl DisplayNotifier {
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(Vec::new()),
            client: reqwest::Client::new(),
        }
    }

    /// 注册显示端点
    pub async fn register(&self, endpoint: DisplayEndpoint) -> String {
        let id = endpoint.id.clone();
        self.endpoints.write().await.push(endpoint);
        info!("Registered display endpoint {}", id);
        id
    }

    /// 注销显示端点
    pub async fn unregister(&self, endpoint_id: &str) -> bool {
        let mut endpoints = self.endpoints.write().await;
        let before = endpoints.len();
        endpoints.retain(|e| e.id != endpoint_id);
        before != endpoints.len()
    }

    /// 当前端点数量
    pub async fn endpoint_count(&self) -> usize {
        self.endpoints.read().await.len()
    }

    /// 推送事件到全部活跃端点
    ///
    /// 并发发送，单个端点失败只记录日志，不阻塞也不回传。
    pub async fn push(&self, event: &DisplayEvent) {
        let endpoints: Vec<DisplayEndpoint> = self
            .endpoints
            .read()
            .await
            .iter()
            .filter(|e| e.active)
            .cloned()
            .collect();

        if endpoints.is_empty() {
            return;
        }

        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize display event: {}", e);
                return;
            }
        };

        let mut handles = Vec::new();
        for endpoint in endpoints {
            let client = self.client.clone();
            let payload = payload.clone();

            handles.push(tokio::spawn(async move {
                Self::send(&client, &endpoint, &payload).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Display push task failed: {}", e);
            }
        }
    }

    async fn send(client: &reqwest::Client, endpoint: &DisplayEndpoint, payload: &str) {
        let mut request = client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", "ClinicQ-Display/1.0")
            .body(payload.to_string());

        if let Some(signature) = endpoint.generate_signature(payload) {
            request = request.header("X-ClinicQ-Signature", signature);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Display event pushed to {}", endpoint.url);
            }
            Ok(response) => {
                error!(
                    "Display endpoint {} responded with {}",
                    endpoint.url,
                    response.status()
                );
            }
            Err(e) => {
                error!("Failed to push display event to {}: {}", endpoint.url, e);
            }
        }
    }
}

impl Default for DisplayNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> DisplayEvent {
        DisplayEvent {
            unit: "unit-a".to_string(),
            patient_name: "Ana".to_string(),
            station_id: "triage".to_string(),
            station_display_name: "Triagem".to_string(),
            repeat: false,
            timestamp: Utc::now(),
            audio: Some(vec![1, 2, 3]),
        }
    }

    #[tokio::test]
    async fn test_channel_delivers_to_subscriber() {
        let channel = DisplayChannel::new();
        let mut rx = channel.subscribe();

        channel.publish(event());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.patient_name, "Ana");
        assert_eq!(received.audio, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let channel = DisplayChannel::new();
        channel.publish(event()); // 不应panic
    }

    #[test]
    fn test_signature_requires_secret() {
        let with_secret =
            DisplayEndpoint::new("https://tv.example/hook".to_string(), Some("s3cret".to_string()));
        let signature = with_secret.generate_signature("{}").unwrap();
        assert!(signature.starts_with("sha256="));

        let without_secret = DisplayEndpoint::new("https://tv.example/hook".to_string(), None);
        assert!(without_secret.generate_signature("{}").is_none());
    }

    #[test]
    fn test_audio_not_serialized_into_payload() {
        let payload = serde_json::to_string(&event()).unwrap();
        assert!(!payload.contains("audio"));
        assert!(payload.contains("Ana"));
    }

    #[tokio::test]
    async fn test_register_and_unregister_endpoint() {
        let notifier = DisplayNotifier::new();
        let id = notifier
            .register(DisplayEndpoint::new("https://tv.example".to_string(), None))
            .await;
        assert_eq!(notifier.endpoint_count().await, 1);

        assert!(notifier.unregister(&id).await);
        assert!(!notifier.unregister(&id).await);
        assert_eq!(notifier.endpoint_count().await, 0);
    }
}
