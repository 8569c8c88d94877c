//! 站点控制器
//!
//! 每个站点持有唯一的当前叫号位。控制器只保存被叫患者的ID引用，
//! 患者数据始终从存储读取，避免副本发散。

use clinicq_core::{ClinicError, Result, Station};
use uuid::Uuid;

/// 站点控制器
///
/// 引擎为每个站点维护一个控制器并用互斥锁串行化其动作，
/// 一个站点同一时刻只有一个 call/finish/no-show 在途。
#[derive(Debug)]
pub struct StationController {
    station: Station,
    current: Option<Uuid>,
}

impl StationController {
    pub fn new(station: Station) -> Self {
        Self {
            station,
            current: None,
        }
    }

    /// 站点配置
    pub fn station(&self) -> &Station {
        &self.station
    }

    /// 当前叫号位占用者
    pub fn current(&self) -> Option<Uuid> {
        self.current
    }

    /// 叫号位是否空闲
    pub fn is_free(&self) -> bool {
        self.current.is_none()
    }

    /// 占用叫号位；已被占用时拒绝
    pub fn occupy(&mut self, patient_id: Uuid) -> Result<()> {
        if self.current.is_some() {
            return Err(ClinicError::SlotOccupied {
                station: self.station.id.clone(),
            });
        }
        self.current = Some(patient_id);
        Ok(())
    }

    /// 校验占用者并释放叫号位
    ///
    /// `patient_id` 与占用者不一致说明客户端视图过期，拒绝并要求刷新。
    pub fn release(&mut self, patient_id: Uuid) -> Result<()> {
        match self.current {
            Some(current) if current == patient_id => {
                self.current = None;
                Ok(())
            }
            _ => Err(ClinicError::NotOccupant {
                station: self.station.id.clone(),
                patient: patient_id.to_string(),
            }),
        }
    }

    /// 无条件清空叫号位（占用者已被外部删除时的回收路径）
    pub fn clear(&mut self) -> Option<Uuid> {
        self.current.take()
    }
}
