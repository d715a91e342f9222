//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use chrono::{NaiveDate, NaiveDateTime};
use medcare_core::{
    Appointment, AppointmentStatus, AppointmentWithPatient, ClinicError, Consultation,
    ConsultationWithPatient, Medicine, Patient, PatientStatus, Practitioner, Prescription, Result,
};
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

/// sqlx错误到统一错误类型的映射；唯一约束与外键冲突单独归类
fn db_err(e: sqlx::Error) -> ClinicError {
    match &e {
        sqlx::Error::RowNotFound => ClinicError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_foreign_key_violation() =>
        {
            ClinicError::Constraint(db.message().to_string())
        }
        _ => ClinicError::Database(e.to_string()),
    }
}

fn status_strings(statuses: &[AppointmentStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建医生表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS practitioners (
                id UUID PRIMARY KEY,
                email VARCHAR(255) UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                first_name VARCHAR(100) NOT NULL,
                last_name VARCHAR(100) NOT NULL,
                license_number VARCHAR(50) UNIQUE NOT NULL,
                specialty VARCHAR(20) NOT NULL,
                phone VARCHAR(17) NOT NULL,
                address TEXT NOT NULL DEFAULT '',
                city VARCHAR(100) NOT NULL DEFAULT '',
                bio TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                practitioner_id UUID NOT NULL REFERENCES practitioners(id) ON DELETE CASCADE,
                first_name VARCHAR(100) NOT NULL,
                last_name VARCHAR(100) NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                phone VARCHAR(17) NOT NULL,
                date_of_birth DATE NOT NULL,
                gender CHAR(1) NOT NULL,
                address TEXT NOT NULL,
                city VARCHAR(100) NOT NULL,
                state VARCHAR(100) NOT NULL,
                zip_code VARCHAR(10) NOT NULL,
                emergency_contact VARCHAR(100) NOT NULL,
                emergency_phone VARCHAR(17) NOT NULL,
                medical_history TEXT,
                allergies TEXT,
                status VARCHAR(10) NOT NULL DEFAULT 'active',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建预约表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id UUID PRIMARY KEY,
                practitioner_id UUID NOT NULL REFERENCES practitioners(id) ON DELETE CASCADE,
                patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
                appointment_type VARCHAR(20) NOT NULL,
                scheduled_date DATE NOT NULL,
                scheduled_time TIME NOT NULL,
                duration_minutes INTEGER NOT NULL DEFAULT 30,
                notes TEXT,
                status VARCHAR(15) NOT NULL DEFAULT 'scheduled',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建问诊表，与预约一一对应
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS consultations (
                id UUID PRIMARY KEY,
                appointment_id UUID UNIQUE NOT NULL REFERENCES appointments(id) ON DELETE CASCADE,
                practitioner_id UUID NOT NULL REFERENCES practitioners(id) ON DELETE CASCADE,
                patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
                chief_complaint TEXT NOT NULL,
                diagnosis TEXT NOT NULL,
                treatment_plan TEXT NOT NULL,
                medications TEXT,
                follow_up_notes TEXT,
                status VARCHAR(15) NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建处方表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS prescriptions (
                id UUID PRIMARY KEY,
                practitioner_id UUID NOT NULL REFERENCES practitioners(id) ON DELETE CASCADE,
                patient_id UUID NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
                prescription_date DATE NOT NULL,
                notes TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建药品条目表，position 保证条目顺序
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS medicines (
                id UUID PRIMARY KEY,
                prescription_id UUID NOT NULL REFERENCES prescriptions(id) ON DELETE CASCADE,
                name VARCHAR(200) NOT NULL,
                dosage VARCHAR(100) NOT NULL,
                frequency VARCHAR(100) NOT NULL,
                duration VARCHAR(100) NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(db_err)?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_patients_practitioner_id ON patients(practitioner_id)",
            "CREATE INDEX IF NOT EXISTS idx_patients_email ON patients(email)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_practitioner_date ON appointments(practitioner_id, scheduled_date)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_practitioner_id ON consultations(practitioner_id)",
            "CREATE INDEX IF NOT EXISTS idx_consultations_patient_id ON consultations(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_prescriptions_practitioner_created ON prescriptions(practitioner_id, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_prescriptions_patient_created ON prescriptions(patient_id, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_medicines_prescription_id ON medicines(prescription_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(db_err)?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    // ========== 医生相关操作 ==========

    /// 创建新医生账户
    pub async fn create_practitioner(&self, practitioner: &NewPractitioner) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO practitioners
                (id, email, password_hash, first_name, last_name, license_number, specialty, phone, address, city)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
        "#)
        .bind(practitioner.id)
        .bind(&practitioner.email)
        .bind(&practitioner.password_hash)
        .bind(&practitioner.first_name)
        .bind(&practitioner.last_name)
        .bind(&practitioner.license_number)
        .bind(practitioner.specialty.as_str())
        .bind(&practitioner.phone)
        .bind(&practitioner.address)
        .bind(&practitioner.city)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(db_err)
    }

    /// 根据ID查找医生
    pub async fn get_practitioner_by_id(&self, id: &Uuid) -> Result<Option<Practitioner>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPractitioner>(
            "SELECT * FROM practitioners WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

        Ok(result.map(Practitioner::from))
    }

    /// 根据邮箱取登录凭据（医生ID与密码哈希）
    pub async fn get_credentials_by_email(&self, email: &str) -> Result<Option<(Uuid, String)>> {
        let pool = self.pool.pool();

        let row = sqlx::query(
            "SELECT id, password_hash FROM practitioners WHERE email = $1"
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|row| (row.get("id"), row.get("password_hash"))))
    }

    /// 邮箱是否已被其他账户占用
    pub async fn email_taken_by_other(&self, email: &str, own_id: &Uuid) -> Result<bool> {
        let pool = self.pool.pool();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM practitioners WHERE email = $1 AND id <> $2"
        )
        .bind(email)
        .bind(own_id)
        .fetch_one(pool)
        .await
        .map_err(db_err)?;

        Ok(count > 0)
    }

    /// 更新医生资料
    pub async fn update_practitioner_profile(&self, practitioner: &Practitioner) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            UPDATE practitioners
            SET email = $1, first_name = $2, last_name = $3, license_number = $4,
                specialty = $5, phone = $6, address = $7, city = $8, bio = $9,
                updated_at = NOW()
            WHERE id = $10
        "#)
        .bind(&practitioner.email)
        .bind(&practitioner.first_name)
        .bind(&practitioner.last_name)
        .bind(&practitioner.license_number)
        .bind(practitioner.specialty.as_str())
        .bind(&practitioner.phone)
        .bind(&practitioner.address)
        .bind(&practitioner.city)
        .bind(&practitioner.bio)
        .bind(practitioner.id)
        .execute(pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// 更新医生密码哈希
    pub async fn update_practitioner_password(&self, id: &Uuid, password_hash: &str) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(
            "UPDATE practitioners SET password_hash = $1, updated_at = NOW() WHERE id = $2"
        )
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// 删除医生账户，级联删除其患者、预约、问诊与处方
    pub async fn delete_practitioner(&self, id: &Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM practitioners WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(db_err)?;

        tracing::info!(practitioner_id = %id, "Practitioner account deleted");
        Ok(())
    }

    // ========== 患者相关操作 ==========

    /// 创建新患者
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO patients
                (id, practitioner_id, first_name, last_name, email, phone, date_of_birth, gender,
                 address, city, state, zip_code, emergency_contact, emergency_phone,
                 medical_history, allergies, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id
        "#)
        .bind(patient.id)
        .bind(patient.practitioner_id)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(patient.date_of_birth)
        .bind(patient.gender.as_str())
        .bind(&patient.address)
        .bind(&patient.city)
        .bind(&patient.state)
        .bind(&patient.zip_code)
        .bind(&patient.emergency_contact)
        .bind(&patient.emergency_phone)
        .bind(&patient.medical_history)
        .bind(&patient.allergies)
        .bind(patient.status.as_str())
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(db_err)
    }

    /// 根据ID查找患者
    pub async fn get_patient_by_id(&self, id: &Uuid) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

        Ok(result.map(Patient::from))
    }

    /// 分页查询某医生的患者；支持姓名/邮箱/电话搜索与状态过滤
    pub async fn list_patients(
        &self,
        practitioner_id: &Uuid,
        search: Option<&str>,
        status: Option<PatientStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Patient>> {
        let pool = self.pool.pool();
        let pattern = search.map(|s| format!("%{}%", s));
        let status_str = status.map(|s| s.as_str().to_string());

        let results = sqlx::query_as::<_, DbPatient>(r#"
            SELECT * FROM patients
            WHERE practitioner_id = $1
              AND ($2::text IS NULL
                   OR first_name ILIKE $2 OR last_name ILIKE $2
                   OR email ILIKE $2 OR phone ILIKE $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
        "#)
        .bind(practitioner_id)
        .bind(&pattern)
        .bind(&status_str)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        Ok(results.into_iter().map(Patient::from).collect())
    }

    /// 统计某医生的患者数量，过滤条件与 [`Self::list_patients`] 一致
    pub async fn count_patients(
        &self,
        practitioner_id: &Uuid,
        search: Option<&str>,
        status: Option<PatientStatus>,
    ) -> Result<i64> {
        let pool = self.pool.pool();
        let pattern = search.map(|s| format!("%{}%", s));
        let status_str = status.map(|s| s.as_str().to_string());

        sqlx::query_scalar(r#"
            SELECT COUNT(*) FROM patients
            WHERE practitioner_id = $1
              AND ($2::text IS NULL
                   OR first_name ILIKE $2 OR last_name ILIKE $2
                   OR email ILIKE $2 OR phone ILIKE $2)
              AND ($3::text IS NULL OR status = $3)
        "#)
        .bind(practitioner_id)
        .bind(&pattern)
        .bind(&status_str)
        .fetch_one(pool)
        .await
        .map_err(db_err)
    }

    /// 最近登记的患者
    pub async fn recent_patients(&self, practitioner_id: &Uuid, limit: i64) -> Result<Vec<Patient>> {
        self.list_patients(practitioner_id, None, None, limit, 0).await
    }

    /// 更新患者资料
    pub async fn update_patient(&self, patient: &Patient) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            UPDATE patients
            SET first_name = $1, last_name = $2, email = $3, phone = $4, date_of_birth = $5,
                gender = $6, address = $7, city = $8, state = $9, zip_code = $10,
                emergency_contact = $11, emergency_phone = $12, medical_history = $13,
                allergies = $14, status = $15, updated_at = NOW()
            WHERE id = $16
        "#)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(patient.date_of_birth)
        .bind(patient.gender.as_str())
        .bind(&patient.address)
        .bind(&patient.city)
        .bind(&patient.state)
        .bind(&patient.zip_code)
        .bind(&patient.emergency_contact)
        .bind(&patient.emergency_phone)
        .bind(&patient.medical_history)
        .bind(&patient.allergies)
        .bind(patient.status.as_str())
        .bind(patient.id)
        .execute(pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// 删除患者，级联删除其预约、问诊与处方
    pub async fn delete_patient(&self, id: &Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    /// 根据ID集合批量取患者，用于内存侧关联
    pub async fn patients_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Patient>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE id = ANY($1)"
        )
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        Ok(results
            .into_iter()
            .map(|row| {
                let patient = Patient::from(row);
                (patient.id, patient)
            })
            .collect())
    }

    // ========== 预约相关操作 ==========

    /// 查询某医生某日的预约；可排除指定记录并限定状态集合
    pub async fn appointments_for_practitioner_date(
        &self,
        practitioner_id: &Uuid,
        date: NaiveDate,
        exclude_id: Option<&Uuid>,
        statuses: Option<&[AppointmentStatus]>,
    ) -> Result<Vec<Appointment>> {
        let pool = self.pool.pool();
        let status_list = statuses.map(status_strings);

        let results = sqlx::query_as::<_, DbAppointment>(r#"
            SELECT * FROM appointments
            WHERE practitioner_id = $1 AND scheduled_date = $2
              AND ($3::uuid IS NULL OR id <> $3)
              AND ($4::text[] IS NULL OR status = ANY($4))
            ORDER BY scheduled_time
        "#)
        .bind(practitioner_id)
        .bind(date)
        .bind(exclude_id)
        .bind(&status_list)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        Ok(results.into_iter().map(Appointment::from).collect())
    }

    /// 预约落位：冲突校验与插入在同一事务内完成
    ///
    /// 先用 FOR UPDATE 锁定同医生同日占用时段的行，使并发的落位请求
    /// 串行化，再校验并插入。任何校验失败都会回滚且不产生半成品状态。
    pub async fn schedule_appointment(
        &self,
        new: &NewAppointment,
        now: NaiveDateTime,
    ) -> Result<Appointment> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        let rows = sqlx::query_as::<_, DbAppointment>(r#"
            SELECT * FROM appointments
            WHERE practitioner_id = $1 AND scheduled_date = $2 AND status = ANY($3)
            FOR UPDATE
        "#)
        .bind(new.practitioner_id)
        .bind(new.scheduled_date)
        .bind(status_strings(&medcare_scheduler::BLOCKING_STATUSES))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let existing: Vec<Appointment> = rows.into_iter().map(Appointment::from).collect();
        let candidate = new.to_candidate();
        medcare_scheduler::validate(&candidate, &existing, now)?;

        let inserted = sqlx::query_as::<_, DbAppointment>(r#"
            INSERT INTO appointments
                (id, practitioner_id, patient_id, appointment_type, scheduled_date,
                 scheduled_time, duration_minutes, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
        "#)
        .bind(new.id)
        .bind(new.practitioner_id)
        .bind(new.patient_id)
        .bind(new.appointment_type.as_str())
        .bind(new.scheduled_date)
        .bind(new.scheduled_time)
        .bind(new.duration_minutes)
        .bind(&new.notes)
        .bind(new.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        tracing::info!(appointment_id = %new.id, "Appointment scheduled");
        Ok(Appointment::from(inserted))
    }

    /// 预约改期/编辑：与落位同样在单事务内校验后更新
    ///
    /// 比较集合由校验逻辑排除记录自身，编辑不会与修改前的自己冲突。
    pub async fn reschedule_appointment(
        &self,
        updated: &Appointment,
        now: NaiveDateTime,
    ) -> Result<()> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        let rows = sqlx::query_as::<_, DbAppointment>(r#"
            SELECT * FROM appointments
            WHERE practitioner_id = $1 AND scheduled_date = $2 AND status = ANY($3)
            FOR UPDATE
        "#)
        .bind(updated.practitioner_id)
        .bind(updated.scheduled_date)
        .bind(status_strings(&medcare_scheduler::BLOCKING_STATUSES))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let existing: Vec<Appointment> = rows.into_iter().map(Appointment::from).collect();
        medcare_scheduler::validate(updated, &existing, now)?;

        sqlx::query(r#"
            UPDATE appointments
            SET patient_id = $1, appointment_type = $2, scheduled_date = $3,
                scheduled_time = $4, duration_minutes = $5, notes = $6, status = $7,
                updated_at = NOW()
            WHERE id = $8
        "#)
        .bind(updated.patient_id)
        .bind(updated.appointment_type.as_str())
        .bind(updated.scheduled_date)
        .bind(updated.scheduled_time)
        .bind(updated.duration_minutes)
        .bind(&updated.notes)
        .bind(updated.status.as_str())
        .bind(updated.id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        tracing::info!(appointment_id = %updated.id, "Appointment rescheduled");
        Ok(())
    }

    /// 根据ID查找预约
    pub async fn get_appointment(&self, id: &Uuid) -> Result<Option<Appointment>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbAppointment>(
            "SELECT * FROM appointments WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

        Ok(result.map(Appointment::from))
    }

    /// 取某医生全部预约并关联患者信息，供列表排序与过滤使用
    pub async fn list_appointments_with_patients(
        &self,
        practitioner_id: &Uuid,
    ) -> Result<Vec<AppointmentWithPatient>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbAppointment>(
            "SELECT * FROM appointments WHERE practitioner_id = $1"
        )
        .bind(practitioner_id)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        let appointments: Vec<Appointment> = rows.into_iter().map(Appointment::from).collect();
        let patient_ids: Vec<Uuid> = appointments.iter().map(|a| a.patient_id).collect();
        let patients = self.patients_by_ids(&patient_ids).await?;

        Ok(appointments
            .into_iter()
            .filter_map(|appointment| {
                patients
                    .get(&appointment.patient_id)
                    .cloned()
                    .map(|patient| AppointmentWithPatient { appointment, patient })
            })
            .collect())
    }

    /// 取某患者的全部预约
    pub async fn list_patient_appointments(&self, patient_id: &Uuid) -> Result<Vec<Appointment>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbAppointment>(
            "SELECT * FROM appointments WHERE patient_id = $1 ORDER BY scheduled_date DESC, scheduled_time DESC"
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    /// 更新预约状态
    pub async fn update_appointment_status(
        &self,
        id: &Uuid,
        status: AppointmentStatus,
    ) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(
            "UPDATE appointments SET status = $1, updated_at = NOW() WHERE id = $2"
        )
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// 统计某医生的预约总数
    pub async fn count_appointments(&self, practitioner_id: &Uuid) -> Result<i64> {
        let pool = self.pool.pool();

        sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE practitioner_id = $1")
            .bind(practitioner_id)
            .fetch_one(pool)
            .await
            .map_err(db_err)
    }

    /// 统计某医生某日的预约数
    pub async fn count_appointments_on_date(
        &self,
        practitioner_id: &Uuid,
        date: NaiveDate,
    ) -> Result<i64> {
        let pool = self.pool.pool();

        sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments WHERE practitioner_id = $1 AND scheduled_date = $2"
        )
        .bind(practitioner_id)
        .bind(date)
        .fetch_one(pool)
        .await
        .map_err(db_err)
    }

    // ========== 问诊相关操作 ==========

    /// 创建新问诊记录
    pub async fn create_consultation(&self, consultation: &NewConsultation) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO consultations
                (id, appointment_id, practitioner_id, patient_id, chief_complaint, diagnosis,
                 treatment_plan, medications, follow_up_notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
        "#)
        .bind(consultation.id)
        .bind(consultation.appointment_id)
        .bind(consultation.practitioner_id)
        .bind(consultation.patient_id)
        .bind(&consultation.chief_complaint)
        .bind(&consultation.diagnosis)
        .bind(&consultation.treatment_plan)
        .bind(&consultation.medications)
        .bind(&consultation.follow_up_notes)
        .bind(consultation.status.as_str())
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(db_err)
    }

    /// 根据ID查找问诊记录
    pub async fn get_consultation(&self, id: &Uuid) -> Result<Option<Consultation>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbConsultation>(
            "SELECT * FROM consultations WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

        Ok(result.map(Consultation::from))
    }

    /// 取某医生全部问诊记录并关联患者信息
    pub async fn list_consultations_with_patients(
        &self,
        practitioner_id: &Uuid,
    ) -> Result<Vec<ConsultationWithPatient>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbConsultation>(
            "SELECT * FROM consultations WHERE practitioner_id = $1 ORDER BY created_at DESC"
        )
        .bind(practitioner_id)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        let consultations: Vec<Consultation> = rows.into_iter().map(Consultation::from).collect();
        let patient_ids: Vec<Uuid> = consultations.iter().map(|c| c.patient_id).collect();
        let patients = self.patients_by_ids(&patient_ids).await?;

        Ok(consultations
            .into_iter()
            .filter_map(|consultation| {
                patients
                    .get(&consultation.patient_id)
                    .cloned()
                    .map(|patient| ConsultationWithPatient { consultation, patient })
            })
            .collect())
    }

    /// 取某患者的全部问诊记录
    pub async fn list_patient_consultations(&self, patient_id: &Uuid) -> Result<Vec<Consultation>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbConsultation>(
            "SELECT * FROM consultations WHERE patient_id = $1 ORDER BY created_at DESC"
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Consultation::from).collect())
    }

    /// 更新问诊记录
    pub async fn update_consultation(&self, consultation: &Consultation) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            UPDATE consultations
            SET chief_complaint = $1, diagnosis = $2, treatment_plan = $3, medications = $4,
                follow_up_notes = $5, status = $6, updated_at = NOW()
            WHERE id = $7
        "#)
        .bind(&consultation.chief_complaint)
        .bind(&consultation.diagnosis)
        .bind(&consultation.treatment_plan)
        .bind(&consultation.medications)
        .bind(&consultation.follow_up_notes)
        .bind(consultation.status.as_str())
        .bind(consultation.id)
        .execute(pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// 统计某医生的问诊记录数
    pub async fn count_consultations(&self, practitioner_id: &Uuid) -> Result<i64> {
        let pool = self.pool.pool();

        sqlx::query_scalar("SELECT COUNT(*) FROM consultations WHERE practitioner_id = $1")
            .bind(practitioner_id)
            .fetch_one(pool)
            .await
            .map_err(db_err)
    }

    // ========== 处方相关操作 ==========

    /// 创建处方及其药品条目，整体在一个事务内
    pub async fn create_prescription(
        &self,
        prescription: &NewPrescription,
        medicines: &[NewMedicine],
    ) -> Result<Uuid> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        sqlx::query(r#"
            INSERT INTO prescriptions (id, practitioner_id, patient_id, prescription_date, notes)
            VALUES ($1, $2, $3, $4, $5)
        "#)
        .bind(prescription.id)
        .bind(prescription.practitioner_id)
        .bind(prescription.patient_id)
        .bind(prescription.prescription_date)
        .bind(&prescription.notes)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for (position, medicine) in medicines.iter().enumerate() {
            sqlx::query(r#"
                INSERT INTO medicines (id, prescription_id, name, dosage, frequency, duration, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#)
            .bind(Uuid::new_v4())
            .bind(prescription.id)
            .bind(&medicine.name)
            .bind(&medicine.dosage)
            .bind(&medicine.frequency)
            .bind(&medicine.duration)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        tracing::info!(prescription_id = %prescription.id, "Prescription created");
        Ok(prescription.id)
    }

    /// 根据ID查找处方
    pub async fn get_prescription(&self, id: &Uuid) -> Result<Option<Prescription>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPrescription>(
            "SELECT * FROM prescriptions WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

        Ok(result.map(Prescription::from))
    }

    /// 取处方的药品条目，按录入顺序
    pub async fn medicines_for_prescription(&self, prescription_id: &Uuid) -> Result<Vec<Medicine>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbMedicine>(
            "SELECT * FROM medicines WHERE prescription_id = $1 ORDER BY position"
        )
        .bind(prescription_id)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Medicine::from).collect())
    }

    /// 批量取多个处方的药品条目，按处方分组
    pub async fn medicines_for_prescriptions(
        &self,
        prescription_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Medicine>>> {
        if prescription_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbMedicine>(
            "SELECT * FROM medicines WHERE prescription_id = ANY($1) ORDER BY prescription_id, position"
        )
        .bind(prescription_ids)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        let mut grouped: HashMap<Uuid, Vec<Medicine>> = HashMap::new();
        for row in rows {
            let medicine = Medicine::from(row);
            grouped.entry(medicine.prescription_id).or_default().push(medicine);
        }
        Ok(grouped)
    }

    /// 取某医生全部处方并关联患者信息，创建时间倒序
    pub async fn list_prescriptions_with_patients(
        &self,
        practitioner_id: &Uuid,
    ) -> Result<Vec<(Prescription, Patient)>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbPrescription>(
            "SELECT * FROM prescriptions WHERE practitioner_id = $1 ORDER BY created_at DESC"
        )
        .bind(practitioner_id)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        let prescriptions: Vec<Prescription> = rows.into_iter().map(Prescription::from).collect();
        let patient_ids: Vec<Uuid> = prescriptions.iter().map(|p| p.patient_id).collect();
        let patients = self.patients_by_ids(&patient_ids).await?;

        Ok(prescriptions
            .into_iter()
            .filter_map(|prescription| {
                patients
                    .get(&prescription.patient_id)
                    .cloned()
                    .map(|patient| (prescription, patient))
            })
            .collect())
    }

    /// 取某患者的全部处方，创建时间倒序
    pub async fn list_patient_prescriptions(&self, patient_id: &Uuid) -> Result<Vec<Prescription>> {
        let pool = self.pool.pool();

        let rows = sqlx::query_as::<_, DbPrescription>(
            "SELECT * FROM prescriptions WHERE patient_id = $1 ORDER BY created_at DESC"
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Prescription::from).collect())
    }

    /// 删除处方，级联删除其药品条目
    pub async fn delete_prescription(&self, id: &Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM prescriptions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    /// 统计某医生的处方总数
    pub async fn count_prescriptions(&self, practitioner_id: &Uuid) -> Result<i64> {
        let pool = self.pool.pool();

        sqlx::query_scalar("SELECT COUNT(*) FROM prescriptions WHERE practitioner_id = $1")
            .bind(practitioner_id)
            .fetch_one(pool)
            .await
            .map_err(db_err)
    }

    /// 统计某医生自某日（含）以来开出的处方数
    pub async fn count_prescriptions_since(
        &self,
        practitioner_id: &Uuid,
        since: NaiveDate,
    ) -> Result<i64> {
        let pool = self.pool.pool();

        sqlx::query_scalar(
            "SELECT COUNT(*) FROM prescriptions WHERE practitioner_id = $1 AND created_at::date >= $2"
        )
        .bind(practitioner_id)
        .bind(since)
        .fetch_one(pool)
        .await
        .map_err(db_err)
    }

    /// 统计某医生开过处方的患者数（去重）
    pub async fn count_distinct_prescription_patients(
        &self,
        practitioner_id: &Uuid,
    ) -> Result<i64> {
        let pool = self.pool.pool();

        sqlx::query_scalar(
            "SELECT COUNT(DISTINCT patient_id) FROM prescriptions WHERE practitioner_id = $1"
        )
        .bind(practitioner_id)
        .fetch_one(pool)
        .await
        .map_err(db_err)
    }
}
