//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use medcare_core::*;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库医生表
#[derive(Debug, FromRow)]
pub struct DbPractitioner {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
    pub specialty: String, // 存储为字符串，转换为Specialty枚举
    pub phone: String,
    pub address: String,
    pub city: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPractitioner> for Practitioner {
    fn from(row: DbPractitioner) -> Self {
        Practitioner {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            license_number: row.license_number,
            specialty: Specialty::parse(&row.specialty).unwrap_or(Specialty::General),
            phone: row.phone,
            address: row.address,
            city: row.city,
            bio: row.bio,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub emergency_contact: String,
    pub emergency_phone: String,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub status: String, // 存储为字符串，转换为PatientStatus枚举
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(row: DbPatient) -> Self {
        Patient {
            id: row.id,
            practitioner_id: row.practitioner_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            gender: Gender::parse(&row.gender).unwrap_or(Gender::Other),
            address: row.address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            emergency_contact: row.emergency_contact,
            emergency_phone: row.emergency_phone,
            medical_history: row.medical_history,
            allergies: row.allergies,
            status: PatientStatus::parse(&row.status).unwrap_or(PatientStatus::Active), // 默认状态
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 数据库预约表
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbAppointment> for Appointment {
    fn from(row: DbAppointment) -> Self {
        Appointment {
            id: row.id,
            practitioner_id: row.practitioner_id,
            patient_id: row.patient_id,
            appointment_type: AppointmentType::parse(&row.appointment_type)
                .unwrap_or(AppointmentType::Checkup),
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            duration_minutes: row.duration_minutes,
            notes: row.notes,
            status: AppointmentStatus::parse(&row.status).unwrap_or(AppointmentStatus::Scheduled), // 默认状态
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 数据库问诊表
#[derive(Debug, FromRow)]
pub struct DbConsultation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub medications: Option<String>,
    pub follow_up_notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbConsultation> for Consultation {
    fn from(row: DbConsultation) -> Self {
        Consultation {
            id: row.id,
            appointment_id: row.appointment_id,
            practitioner_id: row.practitioner_id,
            patient_id: row.patient_id,
            chief_complaint: row.chief_complaint,
            diagnosis: row.diagnosis,
            treatment_plan: row.treatment_plan,
            medications: row.medications,
            follow_up_notes: row.follow_up_notes,
            status: ConsultationStatus::parse(&row.status).unwrap_or(ConsultationStatus::Pending),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 数据库处方表
#[derive(Debug, FromRow)]
pub struct DbPrescription {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub prescription_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPrescription> for Prescription {
    fn from(row: DbPrescription) -> Self {
        Prescription {
            id: row.id,
            practitioner_id: row.practitioner_id,
            patient_id: row.patient_id,
            prescription_date: row.prescription_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 数据库药品条目表
#[derive(Debug, FromRow)]
pub struct DbMedicine {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbMedicine> for Medicine {
    fn from(row: DbMedicine) -> Self {
        Medicine {
            id: row.id,
            prescription_id: row.prescription_id,
            name: row.name,
            dosage: row.dosage,
            frequency: row.frequency,
            duration: row.duration,
            created_at: row.created_at,
        }
    }
}

// 插入模型 - 用于创建新记录

/// 新医生插入模型
#[derive(Debug)]
pub struct NewPractitioner {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
    pub specialty: Specialty,
    pub phone: String,
    pub address: String,
    pub city: String,
}

/// 新患者插入模型
#[derive(Debug)]
pub struct NewPatient {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
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
}

/// 新预约插入模型
#[derive(Debug)]
pub struct NewAppointment {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type: AppointmentType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

impl NewAppointment {
    /// 构造用于冲突校验的候选预约
    pub fn to_candidate(&self) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: self.id,
            practitioner_id: self.practitioner_id,
            patient_id: self.patient_id,
            appointment_type: self.appointment_type,
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time,
            duration_minutes: self.duration_minutes,
            notes: self.notes.clone(),
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 新问诊插入模型
#[derive(Debug)]
pub struct NewConsultation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub medications: Option<String>,
    pub follow_up_notes: Option<String>,
    pub status: ConsultationStatus,
}

/// 新处方插入模型
#[derive(Debug)]
pub struct NewPrescription {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Uuid,
    pub prescription_date: NaiveDate,
    pub notes: Option<String>,
}

/// 新药品条目插入模型
#[derive(Debug)]
pub struct NewMedicine {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_appointment(status: &str, appointment_type: &str) -> DbAppointment {
        DbAppointment {
            id: Uuid::new_v4(),
            practitioner_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            appointment_type: appointment_type.to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            notes: None,
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_appointment_row_conversion() {
        let appointment = Appointment::from(db_appointment("no-show", "followup"));
        assert_eq!(appointment.status, AppointmentStatus::NoShow);
        assert_eq!(appointment.appointment_type, AppointmentType::Followup);
    }

    #[test]
    fn test_unknown_strings_fall_back_to_defaults() {
        let appointment = Appointment::from(db_appointment("garbage", "garbage"));
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(appointment.appointment_type, AppointmentType::Checkup);
    }
}
