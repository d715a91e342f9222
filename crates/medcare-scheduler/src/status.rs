//! 预约状态流转
//!
//! 新建预约始终处于 scheduled 状态。管理改写入口允许在四个合法状态
//! 之间任意改写（包括 completed → scheduled 这样的回退），未知状态值
//! 一律拒绝且不发生任何变更。

use medcare_core::{AppointmentStatus, ClinicError, Result};

/// 预约状态机
#[derive(Debug)]
pub struct AppointmentStatusMachine;

impl AppointmentStatusMachine {
    /// 全部合法状态
    pub const ALL_STATUSES: [AppointmentStatus; 4] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// 新建预约的初始状态
    pub fn initial() -> AppointmentStatus {
        AppointmentStatus::Scheduled
    }

    /// 指定状态的可改写目标：四个合法状态间任意方向均可
    pub fn override_targets(_from: AppointmentStatus) -> &'static [AppointmentStatus] {
        &Self::ALL_STATUSES
    }

    /// 解析管理改写的目标状态；未知值返回错误
    pub fn apply_override(target: &str) -> Result<AppointmentStatus> {
        AppointmentStatus::parse(target)
            .ok_or_else(|| ClinicError::Validation(format!("invalid appointment status: {target:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_scheduled() {
        assert_eq!(
            AppointmentStatusMachine::initial(),
            AppointmentStatus::Scheduled
        );
    }

    #[test]
    fn test_any_status_can_be_forced_to_any_other() {
        for from in AppointmentStatusMachine::ALL_STATUSES {
            let targets = AppointmentStatusMachine::override_targets(from);
            assert_eq!(targets.len(), 4);
            // 回退也在允许范围内
            assert!(targets.contains(&AppointmentStatus::Scheduled));
        }
    }

    #[test]
    fn test_valid_override_targets_parse() {
        for raw in ["scheduled", "completed", "cancelled", "no-show"] {
            let status = AppointmentStatusMachine::apply_override(raw).unwrap();
            assert_eq!(status.as_str(), raw);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        for raw in ["", "noshow", "done", "SCHEDULED"] {
            assert!(matches!(
                AppointmentStatusMachine::apply_override(raw),
                Err(ClinicError::Validation(_))
            ));
        }
    }
}
