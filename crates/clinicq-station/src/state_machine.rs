//! 患者状态机
//!
//! 管理患者从登记到离开队列的完整生命周期状态转换

use clinicq_core::{ClinicError, PatientStatus, Result, StationKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 状态转换事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PatientEvent {
    Called(StationKind),   // 被站点叫号
    Finished(StationKind), // 站点完成接待
    MarkedNoShow,          // 叫号后未到场
}

impl std::fmt::Display for PatientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatientEvent::Called(kind) => write!(f, "called({:?})", kind),
            PatientEvent::Finished(kind) => write!(f, "finished({:?})", kind),
            PatientEvent::MarkedNoShow => write!(f, "no-show"),
        }
    }
}

/// 患者状态机
#[derive(Debug)]
pub struct PatientStateMachine {
    transitions: HashMap<(PatientStatus, PatientEvent), PatientStatus>,
}

impl PatientStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert(
            (PatientStatus::Waiting, PatientEvent::Called(StationKind::Triage)),
            PatientStatus::InTriage,
        );
        transitions.insert(
            (
                PatientStatus::WaitingDoctor,
                PatientEvent::Called(StationKind::Consultation),
            ),
            PatientStatus::InConsultation,
        );
        transitions.insert(
            (
                PatientStatus::InTriage,
                PatientEvent::Finished(StationKind::Triage),
            ),
            PatientStatus::WaitingDoctor,
        );
        transitions.insert(
            (
                PatientStatus::InConsultation,
                PatientEvent::Finished(StationKind::Consultation),
            ),
            PatientStatus::Attended,
        );
        transitions.insert(
            (PatientStatus::InTriage, PatientEvent::MarkedNoShow),
            PatientStatus::NoShow,
        );
        transitions.insert(
            (PatientStatus::InConsultation, PatientEvent::MarkedNoShow),
            PatientStatus::NoShow,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: PatientStatus, event: &PatientEvent) -> bool {
        self.transitions.contains_key(&(from, event.clone()))
    }

    /// 执行状态转换
    pub fn transition(&self, from: PatientStatus, event: &PatientEvent) -> Result<PatientStatus> {
        match self.transitions.get(&(from, event.clone())) {
            Some(to) => Ok(*to),
            None => Err(ClinicError::InvalidStateTransition {
                from: from.to_string(),
                event: event.to_string(),
            }),
        }
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: PatientStatus) -> Vec<PatientEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Default for PatientStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = PatientStateMachine::new();

        assert!(sm.can_transition(
            PatientStatus::Waiting,
            &PatientEvent::Called(StationKind::Triage)
        ));
        assert!(sm.can_transition(
            PatientStatus::InTriage,
            &PatientEvent::Finished(StationKind::Triage)
        ));
        assert!(sm.can_transition(
            PatientStatus::WaitingDoctor,
            &PatientEvent::Called(StationKind::Consultation)
        ));
        assert!(sm.can_transition(PatientStatus::InConsultation, &PatientEvent::MarkedNoShow));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = PatientStateMachine::new();

        // 等待中的患者不能直接进诊室
        assert!(!sm.can_transition(
            PatientStatus::Waiting,
            &PatientEvent::Called(StationKind::Consultation)
        ));
        // 终态不再转换
        assert!(!sm.can_transition(
            PatientStatus::Attended,
            &PatientEvent::Called(StationKind::Triage)
        ));
        assert!(!sm.can_transition(PatientStatus::NoShow, &PatientEvent::MarkedNoShow));
        // 未被叫号不能标记未到场
        assert!(!sm.can_transition(PatientStatus::Waiting, &PatientEvent::MarkedNoShow));
    }

    #[test]
    fn test_transition_execution() {
        let sm = PatientStateMachine::new();

        let next = sm
            .transition(
                PatientStatus::Waiting,
                &PatientEvent::Called(StationKind::Triage),
            )
            .unwrap();
        assert_eq!(next, PatientStatus::InTriage);

        let next = sm
            .transition(next, &PatientEvent::Finished(StationKind::Triage))
            .unwrap();
        assert_eq!(next, PatientStatus::WaitingDoctor);

        let err = sm
            .transition(next, &PatientEvent::Finished(StationKind::Triage))
            .unwrap_err();
        assert!(matches!(
            err,
            ClinicError::InvalidStateTransition { .. }
        ));
    }

    #[test]
    fn test_possible_events() {
        let sm = PatientStateMachine::new();
        let events = sm.possible_events(PatientStatus::InTriage);
        assert_eq!(events.len(), 2);
        assert!(events.contains(&PatientEvent::Finished(StationKind::Triage)));
        assert!(events.contains(&PatientEvent::MarkedNoShow));
    }
}
