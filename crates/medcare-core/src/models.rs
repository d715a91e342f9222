//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils;

/// 执业医生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: Uuid,
    pub email: String, // 登录邮箱，全局唯一
    pub first_name: String,
    pub last_name: String,
    pub license_number: String, // 执业许可证号，全局唯一
    pub specialty: Specialty,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Practitioner {
    /// 展示名，如 "Dr. Jane Doe"
    pub fn display_name(&self) -> String {
        format!("Dr. {} {}", self.first_name, self.last_name)
    }
}

/// 医生专科
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Specialty {
    Cardiology,
    Dermatology,
    Orthopedics,
    Neurology,
    Pediatrics,
    Psychiatry,
    General,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Cardiology => "cardiology",
            Specialty::Dermatology => "dermatology",
            Specialty::Orthopedics => "orthopedics",
            Specialty::Neurology => "neurology",
            Specialty::Pediatrics => "pediatrics",
            Specialty::Psychiatry => "psychiatry",
            Specialty::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cardiology" => Some(Specialty::Cardiology),
            "dermatology" => Some(Specialty::Dermatology),
            "orthopedics" => Some(Specialty::Orthopedics),
            "neurology" => Some(Specialty::Neurology),
            "pediatrics" => Some(Specialty::Pediatrics),
            "psychiatry" => Some(Specialty::Psychiatry),
            "general" => Some(Specialty::General),
            _ => None,
        }
    }
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String, // 全局唯一
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub emergency_contact: String,
    pub emergency_phone: String,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub status: PatientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// 按公历精确计算患者在指定日期的年龄
    pub fn age(&self, today: NaiveDate) -> i32 {
        utils::age_on(self.date_of_birth, today)
    }
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            "O" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// 患者生命周期状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Active,
    Inactive,
    Pending,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Inactive => "inactive",
            PatientStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PatientStatus::Active),
            "inactive" => Some(PatientStatus::Inactive),
            "pending" => Some(PatientStatus::Pending),
            _ => None,
        }
    }
}

/// 预约记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type: AppointmentType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32, // 时长（分钟），必须为正
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// 预约区间起点
    pub fn starts_at(&self) -> NaiveDateTime {
        utils::combine_date_time(self.scheduled_date, self.scheduled_time)
    }

    /// 预约区间终点（半开区间，不含该时刻）
    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}

/// 预约类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentType {
    Checkup,
    Followup,
    Consultation,
    Test,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Checkup => "checkup",
            AppointmentType::Followup => "followup",
            AppointmentType::Consultation => "consultation",
            AppointmentType::Test => "test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checkup" => Some(AppointmentType::Checkup),
            "followup" => Some(AppointmentType::Followup),
            "consultation" => Some(AppointmentType::Consultation),
            "test" => Some(AppointmentType::Test),
            _ => None,
        }
    }
}

/// 预约状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled, // 初始状态
    Completed,
    Cancelled,
    #[serde(rename = "no-show")]
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "no-show" => Some(AppointmentStatus::NoShow),
            _ => None,
        }
    }
}

/// 预约及其患者信息，用于列表展示与按姓名过滤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentWithPatient {
    pub appointment: Appointment,
    pub patient: Patient,
}

/// 问诊记录，与一次预约一一对应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub practitioner_id: Uuid, // 冗余自预约，便于按医生查询
    pub patient_id: Uuid,      // 冗余自预约，便于按患者查询
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub medications: Option<String>,
    pub follow_up_notes: Option<String>,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 问诊及其患者信息，用于列表展示与按姓名过滤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationWithPatient {
    pub consultation: Consultation,
    pub patient: Patient,
}

/// 问诊状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Ongoing,
    Completed,
    Pending,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Ongoing => "ongoing",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(ConsultationStatus::Ongoing),
            "completed" => Some(ConsultationStatus::Completed),
            "pending" => Some(ConsultationStatus::Pending),
            _ => None,
        }
    }
}

/// 处方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub prescription_date: NaiveDate,
    pub notes: Option<String>, // 附加用药说明
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 处方药品条目，按录入顺序排列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub name: String,      // 药品名称与规格
    pub dosage: String,    // 如 "500mg, 1 tablet"
    pub frequency: String, // 如 "Twice daily"
    pub duration: String,  // 如 "7 days"
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patient(date_of_birth: NaiveDate) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            practitioner_id: Uuid::new_v4(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane.doe@example.com".to_string(),
            phone: "+15550000000".to_string(),
            date_of_birth,
            gender: Gender::Female,
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip_code: "62701".to_string(),
            emergency_contact: "John Doe".to_string(),
            emergency_phone: "+15550000001".to_string(),
            medical_history: None,
            allergies: None,
            status: PatientStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_patient_full_name_and_age() {
        let patient = sample_patient(NaiveDate::from_ymd_opt(1990, 6, 15).unwrap());
        assert_eq!(patient.full_name(), "Jane Doe");

        // 生日前一天还未满岁
        let before = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let after = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(patient.age(before), 33);
        assert_eq!(patient.age(after), 34);
    }

    #[test]
    fn test_appointment_interval_is_half_open() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            practitioner_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            appointment_type: AppointmentType::Checkup,
            scheduled_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            notes: None,
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(
            appointment.ends_at() - appointment.starts_at(),
            chrono::Duration::minutes(30)
        );
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::NoShow.as_str(), "no-show");
        assert_eq!(AppointmentStatus::parse("noshow"), None);
    }
}
