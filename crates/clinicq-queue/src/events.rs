//! 变更事件订阅
//!
//! 存储层的每次写入都会在广播通道上发布一个事件，调用方通过
//! `PatientStore::subscribe` 获得接收端，丢弃接收端即取消订阅。
//! 落后的接收端只会丢失旧事件，随后重新读取快照即可追平。

use clinicq_core::PatientStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 变更类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    Registered, // 新登记
    Updated,    // 状态或字段变更
    Removed,    // 删除（完成、未到场清理、闲置清理）
}

/// 变更事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub unit: String,
    pub patient_id: Uuid,
    pub kind: ChangeKind,
    /// 变更后的状态；Removed 事件携带删除前的状态
    pub status: PatientStatus,
}
