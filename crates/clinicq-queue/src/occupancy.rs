//! 站点占用登记表
//!
//! 记录每个站点当前叫号位上的患者ID，由队列引擎写入、闲置清理
//! 读取。清理任务据此排除正在被叫号的患者，避免把占用中的记录
//! 从站点脚下删掉。

use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// 站点占用登记表
#[derive(Debug, Default)]
pub struct OccupancyRegistry {
    slots: RwLock<HashMap<String, Uuid>>,
}

impl OccupancyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记站点叫号位占用者
    pub fn occupy(&self, station_id: &str, patient_id: Uuid) {
        self.slots
            .write()
            .expect("occupancy lock poisoned")
            .insert(station_id.to_string(), patient_id);
    }

    /// 释放站点叫号位
    pub fn release(&self, station_id: &str) {
        self.slots
            .write()
            .expect("occupancy lock poisoned")
            .remove(station_id);
    }

    /// 查询站点当前占用者
    pub fn occupant(&self, station_id: &str) -> Option<Uuid> {
        self.slots
            .read()
            .expect("occupancy lock poisoned")
            .get(station_id)
            .copied()
    }

    /// 全部被占用的患者ID
    pub fn occupied_ids(&self) -> Vec<Uuid> {
        self.slots
            .read()
            .expect("occupancy lock poisoned")
            .values()
            .copied()
            .collect()
    }

    /// 释放占用者不在存活集合中的叫号位，返回被释放的站点
    pub fn reconcile(&self, alive: impl Fn(Uuid) -> bool) -> Vec<String> {
        let mut slots = self.slots.write().expect("occupancy lock poisoned");
        let stale: Vec<String> = slots
            .iter()
            .filter(|(_, id)| !alive(**id))
            .map(|(station, _)| station.clone())
            .collect();
        for station in &stale {
            slots.remove(station);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupy_release_roundtrip() {
        let registry = OccupancyRegistry::new();
        let id = Uuid::new_v4();

        registry.occupy("triage", id);
        assert_eq!(registry.occupant("triage"), Some(id));
        assert_eq!(registry.occupied_ids(), vec![id]);

        registry.release("triage");
        assert_eq!(registry.occupant("triage"), None);
        assert!(registry.occupied_ids().is_empty());
    }

    #[test]
    fn test_reconcile_releases_stale_slots() {
        let registry = OccupancyRegistry::new();
        let alive_id = Uuid::new_v4();
        let gone_id = Uuid::new_v4();
        registry.occupy("triage", alive_id);
        registry.occupy("room-1", gone_id);

        let released = registry.reconcile(|id| id == alive_id);
        assert_eq!(released, vec!["room-1".to_string()]);
        assert_eq!(registry.occupant("triage"), Some(alive_id));
        assert_eq!(registry.occupant("room-1"), None);
    }
}
