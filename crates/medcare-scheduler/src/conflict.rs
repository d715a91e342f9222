//! 预约冲突校验
//!
//! 对候选预约做纯校验：不允许起始于过去的预约，也不允许与同一医生
//! 同日既有预约的时段重叠。时段采用半开区间 [start, start + duration)，
//! 因此首尾相接的连续预约不构成冲突。

use chrono::NaiveDateTime;
use medcare_core::{Appointment, AppointmentStatus, ClinicError, Result};

/// 参与冲突比较的状态集合（cancelled/no-show 不占用时段）
pub const BLOCKING_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Scheduled, AppointmentStatus::Completed];

/// 从既有预约集合中筛出与候选预约参与比较的记录：
/// 同一医生、同一日期、占用时段的状态，且排除候选自身（编辑场景）
pub fn comparison_set<'a>(
    candidate: &Appointment,
    existing: &'a [Appointment],
) -> Vec<&'a Appointment> {
    existing
        .iter()
        .filter(|other| {
            other.practitioner_id == candidate.practitioner_id
                && other.scheduled_date == candidate.scheduled_date
                && BLOCKING_STATUSES.contains(&other.status)
                && other.id != candidate.id
        })
        .collect()
}

/// 校验候选预约能否落位
///
/// 纯函数：只读比较集合，不产生副作用。校验通过后由调用方在同一
/// 事务内完成持久化。`now` 由调用方显式传入，核心逻辑不依赖系统时钟。
pub fn validate(
    candidate: &Appointment,
    existing: &[Appointment],
    now: NaiveDateTime,
) -> Result<()> {
    if candidate.duration_minutes <= 0 {
        return Err(ClinicError::Validation(
            "appointment duration must be a positive number of minutes".to_string(),
        ));
    }

    let start = candidate.starts_at();
    let end = candidate.ends_at();

    if start < now {
        return Err(ClinicError::PastDate);
    }

    for other in comparison_set(candidate, existing) {
        let other_start = other.starts_at();
        let other_end = other.ends_at();

        // 半开区间：end <= other.start 或 start >= other.end 则无重叠
        if !(end <= other_start || start >= other_end) {
            tracing::debug!(
                candidate_id = %candidate.id,
                conflicting_id = %other.id,
                "Appointment slot conflicts with an existing booking"
            );
            return Err(ClinicError::Overlap {
                date: other.scheduled_date,
                start: other.scheduled_time,
                end: other_end.time(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use medcare_core::AppointmentType;
    use uuid::Uuid;

    fn appointment(
        practitioner_id: Uuid,
        date: (i32, u32, u32),
        time: (u32, u32),
        duration_minutes: i32,
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            practitioner_id,
            patient_id: Uuid::new_v4(),
            appointment_type: AppointmentType::Checkup,
            scheduled_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            duration_minutes,
            notes: None,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn early_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_overlapping_slot_is_rejected() {
        let practitioner = Uuid::new_v4();
        let existing = vec![appointment(
            practitioner,
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        )];
        let candidate = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 15),
            30,
            AppointmentStatus::Scheduled,
        );

        let err = validate(&candidate, &existing, early_clock()).unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("09:00 to 09:30 on 2024-06-10"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn test_overlap_is_detected_in_both_directions() {
        let practitioner = Uuid::new_v4();
        let first = appointment(
            practitioner,
            (2024, 6, 10),
            (10, 0),
            60,
            AppointmentStatus::Scheduled,
        );
        // 被既有长预约完全覆盖
        let inside = appointment(
            practitioner,
            (2024, 6, 10),
            (10, 15),
            15,
            AppointmentStatus::Scheduled,
        );
        // 完全覆盖既有预约
        let around = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 30),
            120,
            AppointmentStatus::Scheduled,
        );

        let existing = vec![first];
        assert!(validate(&inside, &existing, early_clock()).is_err());
        assert!(validate(&around, &existing, early_clock()).is_err());
    }

    #[test]
    fn test_back_to_back_appointments_are_allowed() {
        let practitioner = Uuid::new_v4();
        let existing = vec![appointment(
            practitioner,
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        )];
        // 09:30 正好是前一个预约的结束时刻
        let candidate = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 30),
            30,
            AppointmentStatus::Scheduled,
        );

        assert!(validate(&candidate, &existing, early_clock()).is_ok());
    }

    #[test]
    fn test_cancelled_and_no_show_do_not_block() {
        let practitioner = Uuid::new_v4();
        let existing = vec![
            appointment(
                practitioner,
                (2024, 6, 10),
                (9, 0),
                30,
                AppointmentStatus::Cancelled,
            ),
            appointment(
                practitioner,
                (2024, 6, 10),
                (9, 0),
                30,
                AppointmentStatus::NoShow,
            ),
        ];
        let candidate = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        );

        assert!(validate(&candidate, &existing, early_clock()).is_ok());
    }

    #[test]
    fn test_completed_appointment_still_blocks() {
        let practitioner = Uuid::new_v4();
        let existing = vec![appointment(
            practitioner,
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Completed,
        )];
        let candidate = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 15),
            30,
            AppointmentStatus::Scheduled,
        );

        assert!(matches!(
            validate(&candidate, &existing, early_clock()),
            Err(ClinicError::Overlap { .. })
        ));
    }

    #[test]
    fn test_edit_does_not_conflict_with_itself() {
        let practitioner = Uuid::new_v4();
        let mut stored = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        );
        let existing = vec![stored.clone()];

        // 编辑同一条记录：仅改时长，比较集合须排除自身
        stored.duration_minutes = 45;
        assert!(validate(&stored, &existing, early_clock()).is_ok());
    }

    #[test]
    fn test_other_practitioner_is_ignored() {
        let existing = vec![appointment(
            Uuid::new_v4(),
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        )];
        let candidate = appointment(
            Uuid::new_v4(),
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        );

        assert!(validate(&candidate, &existing, early_clock()).is_ok());
    }

    #[test]
    fn test_past_start_is_rejected() {
        let practitioner = Uuid::new_v4();
        let candidate = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        );
        let now = NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 1)
            .unwrap();

        assert!(matches!(
            validate(&candidate, &[], now),
            Err(ClinicError::PastDate)
        ));

        // 恰好等于当前时刻的预约仍然允许
        let now = NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(validate(&candidate, &[], now).is_ok());
    }

    #[test]
    fn test_non_positive_duration_is_rejected() {
        let candidate = appointment(
            Uuid::new_v4(),
            (2024, 6, 10),
            (9, 0),
            0,
            AppointmentStatus::Scheduled,
        );

        assert!(matches!(
            validate(&candidate, &[], early_clock()),
            Err(ClinicError::Validation(_))
        ));
    }

    #[test]
    fn test_booking_scenario_end_to_end() {
        // 既有 2024-06-10 09:00 起 30 分钟的预约：09:15 冲突，09:30 可约
        let practitioner = Uuid::new_v4();
        let existing = vec![appointment(
            practitioner,
            (2024, 6, 10),
            (9, 0),
            30,
            AppointmentStatus::Scheduled,
        )];

        let conflicting = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 15),
            30,
            AppointmentStatus::Scheduled,
        );
        let err = validate(&conflicting, &existing, early_clock()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "This time slot is not available. There is already an appointment \
             from 09:00 to 09:30 on 2024-06-10."
        );

        let adjacent = appointment(
            practitioner,
            (2024, 6, 10),
            (9, 30),
            30,
            AppointmentStatus::Scheduled,
        );
        assert!(validate(&adjacent, &existing, early_clock()).is_ok());
    }
}
