//! 预约列表排序与过滤
//!
//! 列表按复合键升序排列：状态优先级（scheduled → completed → cancelled）、
//! 未过期在前、日期临近在前、时间临近在前。排序是输入集合与参考日期的
//! 纯函数，采用稳定排序，键相同的记录保持原有相对顺序。

use chrono::{Duration, NaiveDate, NaiveTime};
use medcare_core::{AppointmentStatus, AppointmentWithPatient};
use serde::{Deserialize, Serialize};

/// 状态优先级：scheduled 0，completed 1，cancelled 2，其余 3
pub fn status_priority(status: AppointmentStatus) -> u8 {
    match status {
        AppointmentStatus::Scheduled => 0,
        AppointmentStatus::Completed => 1,
        AppointmentStatus::Cancelled => 2,
        _ => 3,
    }
}

/// 按展示顺序排列预约列表
///
/// 对同一输入集合与同一 `today` 结果完全确定。
pub fn order_for_listing(
    mut entries: Vec<AppointmentWithPatient>,
    today: NaiveDate,
) -> Vec<AppointmentWithPatient> {
    entries.sort_by_key(|entry| listing_key(&entry.appointment, today));
    entries
}

fn listing_key(
    appointment: &medcare_core::Appointment,
    today: NaiveDate,
) -> (u8, u8, NaiveDate, NaiveTime) {
    let is_past = u8::from(appointment.scheduled_date < today);
    (
        status_priority(appointment.status),
        is_past,
        appointment.scheduled_date,
        appointment.scheduled_time,
    )
}

/// 相对日期区间
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateBucket {
    Today,
    Tomorrow,
    Week,  // 今日起 7 天（含端点）
    Month, // 今日起 30 天（含端点）
}

impl DateBucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "today" => Some(DateBucket::Today),
            "tomorrow" => Some(DateBucket::Tomorrow),
            "week" => Some(DateBucket::Week),
            "month" => Some(DateBucket::Month),
            _ => None,
        }
    }

    /// 区间的起止日期（闭区间）
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DateBucket::Today => (today, today),
            DateBucket::Tomorrow => {
                let tomorrow = today + Duration::days(1);
                (tomorrow, tomorrow)
            }
            DateBucket::Week => (today, today + Duration::days(7)),
            DateBucket::Month => (today, today + Duration::days(30)),
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        let (from, to) = self.range(today);
        from <= date && date <= to
    }
}

/// 预约列表过滤器，条件之间为与关系
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    /// 状态精确匹配
    pub status: Option<AppointmentStatus>,
    /// 相对日期区间
    pub date_bucket: Option<DateBucket>,
    /// 患者名或姓的大小写不敏感子串匹配
    pub patient_name: Option<String>,
}

impl AppointmentFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.date_bucket.is_none() && self.patient_name.is_none()
    }

    /// 应用过滤条件
    pub fn apply(
        &self,
        mut entries: Vec<AppointmentWithPatient>,
        today: NaiveDate,
    ) -> Vec<AppointmentWithPatient> {
        if let Some(status) = self.status {
            entries.retain(|entry| entry.appointment.status == status);
        }

        if let Some(bucket) = self.date_bucket {
            entries.retain(|entry| bucket.contains(entry.appointment.scheduled_date, today));
        }

        if let Some(needle) = self
            .patient_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let needle = needle.to_lowercase();
            entries.retain(|entry| {
                entry.patient.first_name.to_lowercase().contains(&needle)
                    || entry.patient.last_name.to_lowercase().contains(&needle)
            });
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medcare_core::{
        Appointment, AppointmentType, Gender, Patient, PatientStatus,
    };
    use uuid::Uuid;

    fn entry(
        first_name: &str,
        last_name: &str,
        date: (i32, u32, u32),
        time: (u32, u32),
        status: AppointmentStatus,
    ) -> AppointmentWithPatient {
        let practitioner_id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();
        AppointmentWithPatient {
            appointment: Appointment {
                id: Uuid::new_v4(),
                practitioner_id,
                patient_id,
                appointment_type: AppointmentType::Checkup,
                scheduled_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
                scheduled_time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
                duration_minutes: 30,
                notes: None,
                status,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            patient: Patient {
                id: patient_id,
                practitioner_id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: format!("{first_name}.{last_name}@example.com").to_lowercase(),
                phone: "+15550000000".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                gender: Gender::Other,
                address: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                zip_code: "62701".to_string(),
                emergency_contact: "n/a".to_string(),
                emergency_phone: "n/a".to_string(),
                medical_history: None,
                allergies: None,
                status: PatientStatus::Active,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_status_priority_order() {
        let entries = vec![
            entry("A", "One", (2024, 6, 10), (9, 0), AppointmentStatus::Cancelled),
            entry("B", "Two", (2024, 6, 10), (9, 0), AppointmentStatus::Scheduled),
            entry("C", "Three", (2024, 6, 10), (9, 0), AppointmentStatus::Completed),
        ];

        let ordered = order_for_listing(entries, today());
        let statuses: Vec<_> = ordered
            .iter()
            .map(|e| e.appointment.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ]
        );
    }

    #[test]
    fn test_future_sorts_before_past() {
        let entries = vec![
            entry("A", "One", (2024, 5, 20), (9, 0), AppointmentStatus::Scheduled),
            entry("B", "Two", (2024, 6, 20), (9, 0), AppointmentStatus::Scheduled),
        ];

        let ordered = order_for_listing(entries, today());
        assert_eq!(ordered[0].patient.first_name, "B");
        assert_eq!(ordered[1].patient.first_name, "A");
    }

    #[test]
    fn test_ordering_is_deterministic_and_stable() {
        let entries = vec![
            entry("A", "One", (2024, 6, 10), (9, 0), AppointmentStatus::Scheduled),
            entry("B", "Two", (2024, 6, 10), (9, 0), AppointmentStatus::Scheduled),
            entry("C", "Three", (2024, 6, 5), (14, 0), AppointmentStatus::Scheduled),
        ];

        let first = order_for_listing(entries.clone(), today());
        let second = order_for_listing(entries, today());

        let names = |v: &[AppointmentWithPatient]| {
            v.iter()
                .map(|e| e.patient.first_name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
        // 同日同时的 A 与 B 保持输入顺序
        assert_eq!(names(&first), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_date_bucket_boundaries() {
        let today = today();
        assert!(DateBucket::Week.contains(today, today));
        assert!(DateBucket::Week.contains(today + Duration::days(7), today));
        assert!(!DateBucket::Week.contains(today + Duration::days(8), today));
        assert!(!DateBucket::Week.contains(today - Duration::days(1), today));

        assert!(DateBucket::Month.contains(today + Duration::days(30), today));
        assert!(!DateBucket::Month.contains(today + Duration::days(31), today));

        assert!(DateBucket::Tomorrow.contains(today + Duration::days(1), today));
        assert!(!DateBucket::Tomorrow.contains(today, today));
    }

    #[test]
    fn test_filters_compose_conjunctively() {
        let entries = vec![
            entry("Alice", "Stone", (2024, 6, 3), (9, 0), AppointmentStatus::Scheduled),
            entry("Alice", "Stone", (2024, 6, 3), (10, 0), AppointmentStatus::Completed),
            entry("Bob", "Stone", (2024, 6, 3), (11, 0), AppointmentStatus::Scheduled),
            entry("Alice", "Stone", (2024, 7, 3), (9, 0), AppointmentStatus::Scheduled),
        ];

        let filter = AppointmentFilter {
            status: Some(AppointmentStatus::Scheduled),
            date_bucket: Some(DateBucket::Week),
            patient_name: Some("alice".to_string()),
        };

        let filtered = filter.apply(entries, today());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].patient.first_name, "Alice");
        assert_eq!(
            filtered[0].appointment.scheduled_time,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_name_filter_matches_first_or_last_name() {
        let entries = vec![
            entry("Alice", "Brown", (2024, 6, 3), (9, 0), AppointmentStatus::Scheduled),
            entry("Carol", "Alicedottir", (2024, 6, 3), (10, 0), AppointmentStatus::Scheduled),
            entry("Bob", "Gray", (2024, 6, 3), (11, 0), AppointmentStatus::Scheduled),
        ];

        let filter = AppointmentFilter {
            patient_name: Some("ALICE".to_string()),
            ..Default::default()
        };

        let filtered = filter.apply(entries, today());
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let entries = vec![
            entry("Alice", "Brown", (2024, 6, 3), (9, 0), AppointmentStatus::Scheduled),
            entry("Bob", "Gray", (2024, 5, 3), (11, 0), AppointmentStatus::Cancelled),
        ];

        let filter = AppointmentFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(entries, today()).len(), 2);
    }
}
