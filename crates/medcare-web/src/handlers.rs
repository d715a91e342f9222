//! HTTP处理器

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use medcare_core::{
    Appointment, AppointmentStatus, AppointmentType, ClinicError, Consultation,
    ConsultationStatus, Gender, Patient, PatientStatus, Practitioner, Specialty,
};
use medcare_database::{
    DatabasePool, DatabaseQueries, NewAppointment, NewConsultation, NewMedicine, NewPatient,
    NewPrescription,
};
use medcare_scheduler::{
    order_for_listing, AppointmentFilter, AppointmentStatusMachine, DateBucket,
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, AuthService, CurrentPractitioner};
use crate::document::{DocumentRenderer, PlainTextRenderer, PrescriptionDocument};
use crate::error::{ApiError, ApiResult};

/// 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub db: DatabasePool,
    pub auth: AuthService,
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "MedCare Clinic API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "auth": "/auth",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

// 服务器本地时钟；排班语义使用本地日期与时刻
fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

fn to_json<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError(ClinicError::from(e)))
}

/// 内存分页，返回当前页与总条数
fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> (Vec<T>, usize) {
    let total = items.len();
    let per_page = per_page.max(1) as usize;
    let start = (page.max(1) as usize - 1) * per_page;
    let page_items = items
        .into_iter()
        .skip(start)
        .take(per_page)
        .collect();
    (page_items, total)
}

/// 患者序列化时附带派生字段
fn patient_json(patient: &Patient, today: NaiveDate) -> ApiResult<Value> {
    let mut value = to_json(patient)?;
    value["age"] = json!(patient.age(today));
    value["full_name"] = json!(patient.full_name());
    Ok(value)
}

fn not_found(entity: &str, id: &Uuid) -> ApiError {
    ApiError(ClinicError::NotFound(format!("{entity} {id} not found")))
}

async fn owned_patient(
    queries: &DatabaseQueries<'_>,
    id: &Uuid,
    practitioner: &Practitioner,
) -> ApiResult<Patient> {
    let patient = queries
        .get_patient_by_id(id)
        .await?
        .ok_or_else(|| not_found("patient", id))?;
    if patient.practitioner_id != practitioner.id {
        return Err(ApiError(ClinicError::Permission(
            "You can only access your own patients.".to_string(),
        )));
    }
    Ok(patient)
}

/// 预约目标患者的归属检查，越权时使用排班场景的提示文案
async fn schedulable_patient(
    queries: &DatabaseQueries<'_>,
    id: &Uuid,
    practitioner: &Practitioner,
) -> ApiResult<Patient> {
    owned_patient(queries, id, practitioner)
        .await
        .map_err(|err| match err.0 {
            ClinicError::Permission(_) => ApiError(ClinicError::Permission(
                "You can only schedule appointments for your own patients.".to_string(),
            )),
            other => ApiError(other),
        })
}

async fn owned_appointment(
    queries: &DatabaseQueries<'_>,
    id: &Uuid,
    practitioner: &Practitioner,
) -> ApiResult<Appointment> {
    let appointment = queries
        .get_appointment(id)
        .await?
        .ok_or_else(|| not_found("appointment", id))?;
    if appointment.practitioner_id != practitioner.id {
        return Err(ApiError(ClinicError::Permission(
            "You can only access your own appointments.".to_string(),
        )));
    }
    Ok(appointment)
}

async fn owned_consultation(
    queries: &DatabaseQueries<'_>,
    id: &Uuid,
    practitioner: &Practitioner,
) -> ApiResult<Consultation> {
    let consultation = queries
        .get_consultation(id)
        .await?
        .ok_or_else(|| not_found("consultation", id))?;
    if consultation.practitioner_id != practitioner.id {
        return Err(ApiError(ClinicError::Permission(
            "You can only access your own consultations.".to_string(),
        )));
    }
    Ok(consultation)
}

async fn owned_prescription(
    queries: &DatabaseQueries<'_>,
    id: &Uuid,
    practitioner: &Practitioner,
) -> ApiResult<medcare_core::Prescription> {
    let prescription = queries
        .get_prescription(id)
        .await?
        .ok_or_else(|| not_found("prescription", id))?;
    if prescription.practitioner_id != practitioner.id {
        return Err(ApiError(ClinicError::Permission(
            "You can only access your own prescriptions.".to_string(),
        )));
    }
    Ok(prescription)
}

// ========== 工作台 ==========

/// 工作台汇总：统计数字、今日日程与新近患者
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let practitioner = &current.0;
    let today = today_local();

    let total_patients = queries.count_patients(&practitioner.id, None, None).await?;
    let total_appointments = queries.count_appointments(&practitioner.id).await?;
    let total_consultations = queries.count_consultations(&practitioner.id).await?;
    let pending_follow_ups = queries
        .count_patients(&practitioner.id, None, Some(PatientStatus::Pending))
        .await?;
    let appointments_today = queries
        .count_appointments_on_date(&practitioner.id, today)
        .await?;

    // 今日日程：只取 scheduled 状态，按时间排序，最多展示 4 条
    let mut day_schedule = queries
        .appointments_for_practitioner_date(
            &practitioner.id,
            today,
            None,
            Some(&[AppointmentStatus::Scheduled]),
        )
        .await?;
    day_schedule.truncate(4);

    let patient_ids: Vec<Uuid> = day_schedule.iter().map(|a| a.patient_id).collect();
    let patients = queries.patients_by_ids(&patient_ids).await?;
    let todays: Vec<_> = day_schedule
        .into_iter()
        .filter_map(|appointment| {
            patients
                .get(&appointment.patient_id)
                .cloned()
                .map(|patient| medcare_core::AppointmentWithPatient { appointment, patient })
        })
        .collect();

    let recent_patients = queries.recent_patients(&practitioner.id, 5).await?;
    let recent_patients = recent_patients
        .iter()
        .map(|p| patient_json(p, today))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(json!({
        "total_patients": total_patients,
        "total_appointments": total_appointments,
        "total_consultations": total_consultations,
        "pending_follow_ups": pending_follow_ups,
        "appointments_today": appointments_today,
        "todays_appointments": todays,
        "recent_patients": recent_patients,
    })))
}

// ========== 患者相关处理器 ==========

/// 患者列表查询参数
#[derive(Debug, Deserialize)]
pub struct PatientListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn non_empty(param: Option<&str>) -> Option<&str> {
    param.map(str::trim).filter(|s| !s.is_empty())
}

/// 患者列表，支持搜索、状态过滤与分页
pub async fn list_patients(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Query(params): Query<PatientListParams>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let search = non_empty(params.search.as_deref());
    let status = match non_empty(params.status.as_deref()) {
        Some(raw) => Some(PatientStatus::parse(raw).ok_or_else(|| {
            ApiError(ClinicError::Validation(format!("unknown patient status: {raw:?}")))
        })?),
        None => None,
    };

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(8).clamp(1, 100);
    let offset = i64::from(page - 1) * i64::from(per_page);

    let total = queries.count_patients(&current.0.id, search, status).await?;
    let patients = queries
        .list_patients(&current.0.id, search, status, i64::from(per_page), offset)
        .await?;

    let today = today_local();
    let patients = patients
        .iter()
        .map(|p| patient_json(p, today))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(json!({
        "patients": patients,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

/// 患者创建/编辑载荷
#[derive(Debug, Deserialize)]
pub struct PatientPayload {
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
    pub status: Option<PatientStatus>,
}

/// 新建患者
pub async fn create_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<PatientPayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);

    let new_patient = NewPatient {
        id: Uuid::new_v4(),
        practitioner_id: current.0.id,
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        phone: payload.phone,
        date_of_birth: payload.date_of_birth,
        gender: payload.gender,
        address: payload.address,
        city: payload.city,
        state: payload.state,
        zip_code: payload.zip_code,
        emergency_contact: payload.emergency_contact,
        emergency_phone: payload.emergency_phone,
        medical_history: payload.medical_history,
        allergies: payload.allergies,
        status: payload.status.unwrap_or(PatientStatus::Active),
    };

    let id = queries.create_patient(&new_patient).await?;
    info!(patient_id = %id, "Patient added");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Patient added successfully!",
            "patient_id": id
        })),
    ))
}

/// 患者详情，含预约与问诊历史
pub async fn patient_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = owned_patient(&queries, &id, &current.0).await?;

    let appointments = queries.list_patient_appointments(&id).await?;
    let consultations = queries.list_patient_consultations(&id).await?;

    Ok(Json(json!({
        "patient": patient_json(&patient, today_local())?,
        "appointments": appointments,
        "consultations": consultations,
    })))
}

/// 更新患者资料
pub async fn update_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PatientPayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let mut patient = owned_patient(&queries, &id, &current.0).await?;

    patient.first_name = payload.first_name;
    patient.last_name = payload.last_name;
    patient.email = payload.email;
    patient.phone = payload.phone;
    patient.date_of_birth = payload.date_of_birth;
    patient.gender = payload.gender;
    patient.address = payload.address;
    patient.city = payload.city;
    patient.state = payload.state;
    patient.zip_code = payload.zip_code;
    patient.emergency_contact = payload.emergency_contact;
    patient.emergency_phone = payload.emergency_phone;
    patient.medical_history = payload.medical_history;
    patient.allergies = payload.allergies;
    if let Some(status) = payload.status {
        patient.status = status;
    }

    queries.update_patient(&patient).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Patient updated successfully!"
    })))
}

/// 删除患者，级联删除其预约、问诊与处方
pub async fn delete_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = owned_patient(&queries, &id, &current.0).await?;

    queries.delete_patient(&patient.id).await?;
    info!(patient_id = %id, "Patient deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Patient deleted successfully!"
    })))
}

// ========== 预约相关处理器 ==========

/// 预约列表查询参数
#[derive(Debug, Deserialize)]
pub struct AppointmentListParams {
    pub status: Option<String>,
    pub date: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// 预约列表：组合过滤后按展示顺序排列
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Query(params): Query<AppointmentListParams>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);

    let status = match non_empty(params.status.as_deref()) {
        Some(raw) => Some(AppointmentStatus::parse(raw).ok_or_else(|| {
            ApiError(ClinicError::Validation(format!("unknown appointment status: {raw:?}")))
        })?),
        None => None,
    };
    let date_bucket = match non_empty(params.date.as_deref()) {
        Some(raw) => Some(DateBucket::parse(raw).ok_or_else(|| {
            ApiError(ClinicError::Validation(format!("unknown date filter: {raw:?}")))
        })?),
        None => None,
    };

    let filter = AppointmentFilter {
        status,
        date_bucket,
        patient_name: non_empty(params.search.as_deref()).map(str::to_string),
    };

    let today = today_local();
    let entries = queries.list_appointments_with_patients(&current.0.id).await?;
    let entries = filter.apply(entries, today);
    let entries = order_for_listing(entries, today);

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(10).clamp(1, 100);
    let (entries, total) = paginate(entries, page, per_page);

    Ok(Json(json!({
        "appointments": entries,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

/// 预约创建/编辑载荷
#[derive(Debug, Deserialize)]
pub struct AppointmentPayload {
    pub patient_id: Uuid,
    pub appointment_type: AppointmentType,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub status: Option<AppointmentStatus>,
}

fn default_duration() -> i32 {
    30
}

/// 新建预约：校验与落库在持久层的同一事务内完成
pub async fn create_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<AppointmentPayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = schedulable_patient(&queries, &payload.patient_id, &current.0).await?;

    let new_appointment = NewAppointment {
        id: Uuid::new_v4(),
        practitioner_id: current.0.id,
        patient_id: patient.id,
        appointment_type: payload.appointment_type,
        scheduled_date: payload.scheduled_date,
        scheduled_time: payload.scheduled_time,
        duration_minutes: payload.duration_minutes,
        notes: payload.notes,
        status: payload.status.unwrap_or_else(AppointmentStatusMachine::initial),
    };

    let appointment = queries
        .schedule_appointment(&new_appointment, now_local())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!(
                "Appointment with {} scheduled successfully!",
                patient.full_name()
            ),
            "appointment": appointment,
        })),
    ))
}

/// 预约详情
pub async fn appointment_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let appointment = owned_appointment(&queries, &id, &current.0).await?;
    let patient = queries
        .get_patient_by_id(&appointment.patient_id)
        .await?
        .ok_or_else(|| not_found("patient", &appointment.patient_id))?;

    Ok(Json(json!({
        "appointment": appointment,
        "patient": patient_json(&patient, today_local())?,
    })))
}

/// 编辑预约：重新校验时比较集合会排除记录自身
pub async fn update_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AppointmentPayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let existing = owned_appointment(&queries, &id, &current.0).await?;
    let patient = schedulable_patient(&queries, &payload.patient_id, &current.0).await?;

    let updated = Appointment {
        id: existing.id,
        practitioner_id: current.0.id,
        patient_id: patient.id,
        appointment_type: payload.appointment_type,
        scheduled_date: payload.scheduled_date,
        scheduled_time: payload.scheduled_time,
        duration_minutes: payload.duration_minutes,
        notes: payload.notes,
        status: payload.status.unwrap_or(existing.status),
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    };

    queries.reschedule_appointment(&updated, now_local()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment updated successfully!"
    })))
}

/// 取消预约
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let appointment = owned_appointment(&queries, &id, &current.0).await?;
    let patient = queries
        .get_patient_by_id(&appointment.patient_id)
        .await?
        .ok_or_else(|| not_found("patient", &appointment.patient_id))?;

    queries
        .update_appointment_status(&appointment.id, AppointmentStatus::Cancelled)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Appointment with {} has been cancelled.",
            patient.full_name()
        )
    })))
}

/// 管理改写预约状态；未知状态值被拒绝且不发生任何变更
pub async fn update_appointment_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path((id, status)): Path<(Uuid, String)>,
) -> ApiResult<impl IntoResponse> {
    let target = AppointmentStatusMachine::apply_override(&status)?;

    let queries = DatabaseQueries::new(&state.db);
    let appointment = owned_appointment(&queries, &id, &current.0).await?;
    queries.update_appointment_status(&appointment.id, target).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment status updated successfully."
    })))
}

/// 月历查询参数
#[derive(Debug, Deserialize)]
pub struct CalendarParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// 月历视图：只展示 scheduled/completed 的预约，按日分组、按时间排列
pub async fn calendar_view(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Query(params): Query<CalendarParams>,
) -> ApiResult<impl IntoResponse> {
    let today = today_local();
    let year = params.year.unwrap_or_else(|| today.year());
    let month = params.month.unwrap_or_else(|| today.month());
    if !(1..=12).contains(&month) {
        return Err(ApiError(ClinicError::Validation(format!(
            "invalid month: {month}"
        ))));
    }

    let queries = DatabaseQueries::new(&state.db);
    let mut entries = queries.list_appointments_with_patients(&current.0.id).await?;
    entries.retain(|entry| {
        matches!(
            entry.appointment.status,
            AppointmentStatus::Scheduled | AppointmentStatus::Completed
        )
    });
    entries.sort_by_key(|entry| {
        (
            entry.appointment.scheduled_date,
            entry.appointment.scheduled_time,
        )
    });

    let today_appointments: Vec<_> = entries
        .iter()
        .filter(|entry| entry.appointment.scheduled_date == today)
        .cloned()
        .collect();

    let mut days: BTreeMap<u32, Vec<_>> = BTreeMap::new();
    for entry in entries {
        let date = entry.appointment.scheduled_date;
        if date.year() == year && date.month() == month {
            days.entry(date.day()).or_default().push(entry);
        }
    }

    Ok(Json(json!({
        "year": year,
        "month": month,
        "days": days,
        "today": today,
        "today_appointments": today_appointments,
    })))
}

// ========== 问诊相关处理器 ==========

/// 问诊列表查询参数
#[derive(Debug, Deserialize)]
pub struct ConsultationListParams {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// 问诊列表
pub async fn list_consultations(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Query(params): Query<ConsultationListParams>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);

    let status = match non_empty(params.status.as_deref()) {
        Some(raw) => Some(ConsultationStatus::parse(raw).ok_or_else(|| {
            ApiError(ClinicError::Validation(format!("unknown consultation status: {raw:?}")))
        })?),
        None => None,
    };

    let mut entries = queries
        .list_consultations_with_patients(&current.0.id)
        .await?;
    if let Some(status) = status {
        entries.retain(|entry| entry.consultation.status == status);
    }
    if let Some(needle) = non_empty(params.search.as_deref()) {
        let needle = needle.to_lowercase();
        entries.retain(|entry| {
            entry.patient.first_name.to_lowercase().contains(&needle)
                || entry.patient.last_name.to_lowercase().contains(&needle)
        });
    }

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(10).clamp(1, 100);
    let (entries, total) = paginate(entries, page, per_page);

    Ok(Json(json!({
        "consultations": entries,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

/// 问诊创建载荷
#[derive(Debug, Deserialize)]
pub struct ConsultationPayload {
    pub appointment_id: Uuid,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub medications: Option<String>,
    pub follow_up_notes: Option<String>,
    pub status: Option<ConsultationStatus>,
}

/// 新建问诊记录；患者引用从预约冗余而来
pub async fn create_consultation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<ConsultationPayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let appointment = owned_appointment(&queries, &payload.appointment_id, &current.0).await?;

    let new_consultation = NewConsultation {
        id: Uuid::new_v4(),
        appointment_id: appointment.id,
        practitioner_id: current.0.id,
        patient_id: appointment.patient_id,
        chief_complaint: payload.chief_complaint,
        diagnosis: payload.diagnosis,
        treatment_plan: payload.treatment_plan,
        medications: payload.medications,
        follow_up_notes: payload.follow_up_notes,
        status: payload.status.unwrap_or(ConsultationStatus::Pending),
    };

    let id = queries.create_consultation(&new_consultation).await?;
    info!(consultation_id = %id, "Consultation added");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Consultation added successfully!",
            "consultation_id": id
        })),
    ))
}

/// 问诊详情
pub async fn consultation_detail(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let consultation = owned_consultation(&queries, &id, &current.0).await?;
    let patient = queries
        .get_patient_by_id(&consultation.patient_id)
        .await?
        .ok_or_else(|| not_found("patient", &consultation.patient_id))?;

    Ok(Json(json!({
        "consultation": consultation,
        "patient": patient_json(&patient, today_local())?,
    })))
}

/// 问诊编辑载荷；关联的预约不可变更
#[derive(Debug, Deserialize)]
pub struct ConsultationUpdatePayload {
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub medications: Option<String>,
    pub follow_up_notes: Option<String>,
    pub status: Option<ConsultationStatus>,
}

/// 更新问诊记录
pub async fn update_consultation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConsultationUpdatePayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let mut consultation = owned_consultation(&queries, &id, &current.0).await?;

    consultation.chief_complaint = payload.chief_complaint;
    consultation.diagnosis = payload.diagnosis;
    consultation.treatment_plan = payload.treatment_plan;
    consultation.medications = payload.medications;
    consultation.follow_up_notes = payload.follow_up_notes;
    if let Some(status) = payload.status {
        consultation.status = status;
    }

    queries.update_consultation(&consultation).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Consultation updated successfully!"
    })))
}

// ========== 处方相关处理器 ==========

/// 处方药品载荷
#[derive(Debug, Deserialize)]
pub struct MedicinePayload {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

/// 处方创建载荷
#[derive(Debug, Deserialize)]
pub struct PrescriptionPayload {
    pub patient_id: Uuid,
    pub prescription_date: NaiveDate,
    pub notes: Option<String>,
    #[serde(default)]
    pub medicines: Vec<MedicinePayload>,
}

/// 开具处方；处方与药品条目在同一事务内写入
pub async fn create_prescription(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<PrescriptionPayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = owned_patient(&queries, &payload.patient_id, &current.0).await?;

    let new_prescription = NewPrescription {
        id: Uuid::new_v4(),
        practitioner_id: current.0.id,
        patient_id: patient.id,
        prescription_date: payload.prescription_date,
        notes: payload.notes,
    };
    let medicines: Vec<NewMedicine> = payload
        .medicines
        .into_iter()
        .map(|m| NewMedicine {
            name: m.name,
            dosage: m.dosage,
            frequency: m.frequency,
            duration: m.duration,
        })
        .collect();

    let id = queries
        .create_prescription(&new_prescription, &medicines)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Prescription created successfully!",
            "prescription_id": id
        })),
    ))
}

/// 处方列表查询参数
#[derive(Debug, Deserialize)]
pub struct PrescriptionListParams {
    pub search: Option<String>,
    pub patient: Option<Uuid>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// 处方列表与汇总统计
pub async fn list_prescriptions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Query(params): Query<PrescriptionListParams>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let practitioner = &current.0;

    let mut entries = queries
        .list_prescriptions_with_patients(&practitioner.id)
        .await?;

    if let Some(patient_id) = params.patient {
        entries.retain(|(prescription, _)| prescription.patient_id == patient_id);
    }
    if let Some(needle) = non_empty(params.search.as_deref()) {
        let needle = needle.to_lowercase();
        entries.retain(|(_, patient)| {
            patient.first_name.to_lowercase().contains(&needle)
                || patient.last_name.to_lowercase().contains(&needle)
                || patient.email.to_lowercase().contains(&needle)
        });
    }
    if let Some(from) = params.from_date {
        entries.retain(|(prescription, _)| prescription.created_at.date_naive() >= from);
    }
    if let Some(to) = params.to_date {
        // 包含截止日当天
        entries.retain(|(prescription, _)| prescription.created_at.date_naive() <= to);
    }

    let today = today_local();
    let week_start = today - chrono::Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let total_prescriptions = queries.count_prescriptions(&practitioner.id).await?;
    let today_prescriptions = queries
        .count_prescriptions_since(&practitioner.id, today)
        .await?;
    let week_prescriptions = queries
        .count_prescriptions_since(&practitioner.id, week_start)
        .await?;
    let unique_patients = queries
        .count_distinct_prescription_patients(&practitioner.id)
        .await?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(10).clamp(1, 100);
    let (entries, total) = paginate(entries, page, per_page);

    let prescription_ids: Vec<Uuid> = entries.iter().map(|(p, _)| p.id).collect();
    let mut medicines = queries.medicines_for_prescriptions(&prescription_ids).await?;

    let entries = entries
        .into_iter()
        .map(|(prescription, patient)| {
            let medicines = medicines.remove(&prescription.id).unwrap_or_default();
            json!({
                "prescription": prescription,
                "patient_name": patient.full_name(),
                "patient_email": patient.email,
                "medicine_count": medicines.len(),
                "medicines": medicines,
            })
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "prescriptions": entries,
        "total": total,
        "page": page,
        "per_page": per_page,
        "stats": {
            "total_prescriptions": total_prescriptions,
            "today_prescriptions": today_prescriptions,
            "week_prescriptions": week_prescriptions,
            "unique_patients": unique_patients,
        }
    })))
}

/// 某患者的处方列表
pub async fn patient_prescriptions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(patient_id): Path<Uuid>,
    Query(params): Query<PrescriptionListParams>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let patient = owned_patient(&queries, &patient_id, &current.0).await?;

    let prescriptions = queries.list_patient_prescriptions(&patient.id).await?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(10).clamp(1, 100);
    let (prescriptions, total) = paginate(prescriptions, page, per_page);

    let prescription_ids: Vec<Uuid> = prescriptions.iter().map(|p| p.id).collect();
    let mut medicines = queries.medicines_for_prescriptions(&prescription_ids).await?;

    let prescriptions = prescriptions
        .into_iter()
        .map(|prescription| {
            let medicines = medicines.remove(&prescription.id).unwrap_or_default();
            json!({ "prescription": prescription, "medicines": medicines })
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "patient": patient_json(&patient, today_local())?,
        "prescriptions": prescriptions,
        "total": total,
        "page": page,
        "per_page": per_page,
    })))
}

/// 处方详情
pub async fn prescription_view(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let prescription = owned_prescription(&queries, &id, &current.0).await?;
    let patient = queries
        .get_patient_by_id(&prescription.patient_id)
        .await?
        .ok_or_else(|| not_found("patient", &prescription.patient_id))?;
    let medicines = queries.medicines_for_prescription(&prescription.id).await?;

    Ok(Json(json!({
        "id": prescription.id,
        "patient_name": patient.full_name(),
        "patient_email": patient.email,
        "doctor_name": current.0.display_name(),
        "date": prescription.created_at.format("%B %d, %Y").to_string(),
        "notes": prescription.notes.clone().unwrap_or_default(),
        "medicines": medicines,
    })))
}

/// 删除处方
pub async fn prescription_delete(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let prescription = owned_prescription(&queries, &id, &current.0).await?;

    queries.delete_prescription(&prescription.id).await?;
    info!(prescription_id = %id, "Prescription deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Prescription deleted successfully"
    })))
}

/// 下载处方文档
pub async fn prescription_download(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let prescription = owned_prescription(&queries, &id, &current.0).await?;
    let patient = queries
        .get_patient_by_id(&prescription.patient_id)
        .await?
        .ok_or_else(|| not_found("patient", &prescription.patient_id))?;
    let medicines = queries.medicines_for_prescription(&prescription.id).await?;

    let document =
        PrescriptionDocument::assemble(&prescription, &medicines, &patient, &current.0);
    let renderer = PlainTextRenderer;
    let rendered = renderer.render(&document)?;
    let filename = document.suggested_filename(renderer.file_extension());

    Ok((
        [
            (header::CONTENT_TYPE, renderer.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        rendered,
    ))
}

// ========== 设置相关处理器 ==========

/// 设置页汇总
pub async fn settings_view(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);
    let practitioner = &current.0;

    let total_patients = queries.count_patients(&practitioner.id, None, None).await?;
    let total_appointments = queries.count_appointments(&practitioner.id).await?;
    let total_prescriptions = queries.count_prescriptions(&practitioner.id).await?;

    Ok(Json(json!({
        "practitioner": practitioner,
        "total_patients": total_patients,
        "total_appointments": total_appointments,
        "total_prescriptions": total_prescriptions,
    })))
}

/// 资料更新载荷
#[derive(Debug, Deserialize)]
pub struct ProfileUpdatePayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub license_number: String,
    pub specialty: String,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// 更新医生资料
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<ProfileUpdatePayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);

    if queries
        .email_taken_by_other(&payload.email, &current.0.id)
        .await?
    {
        return Err(ApiError(ClinicError::Validation(
            "This email is already in use by another account".to_string(),
        )));
    }
    let specialty = Specialty::parse(&payload.specialty).ok_or_else(|| {
        ApiError(ClinicError::Validation(format!(
            "unknown specialty: {:?}",
            payload.specialty
        )))
    })?;

    let mut practitioner = current.0.clone();
    practitioner.first_name = payload.first_name;
    practitioner.last_name = payload.last_name;
    practitioner.email = payload.email;
    practitioner.phone = payload.phone;
    practitioner.license_number = payload.license_number;
    practitioner.specialty = specialty;
    practitioner.bio = payload.bio;
    if let Some(address) = payload.address {
        practitioner.address = address;
    }
    if let Some(city) = payload.city {
        practitioner.city = city;
    }

    queries.update_practitioner_profile(&practitioner).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully"
    })))
}

/// 改密载荷
#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
    pub current_password: Secret<String>,
    pub new_password: Secret<String>,
    pub confirm_password: Secret<String>,
}

/// 修改登录密码
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<ChangePasswordPayload>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);

    let (_, stored_hash) = queries
        .get_credentials_by_email(&current.0.email)
        .await?
        .ok_or_else(|| not_found("practitioner", &current.0.id))?;

    auth::verify_password(&stored_hash, &payload.current_password).map_err(|_| {
        ApiError(ClinicError::Validation(
            "Current password is incorrect".to_string(),
        ))
    })?;
    if payload.new_password.expose_secret() != payload.confirm_password.expose_secret() {
        return Err(ApiError(ClinicError::Validation(
            "New passwords do not match".to_string(),
        )));
    }
    if payload.new_password.expose_secret().len() < 8 {
        return Err(ApiError(ClinicError::Validation(
            "password must be at least 8 characters".to_string(),
        )));
    }

    let new_hash = auth::hash_password(&payload.new_password)?;
    queries
        .update_practitioner_password(&current.0.id, &new_hash)
        .await?;
    info!(practitioner_id = %current.0.id, "Password changed");

    Ok(Json(json!({
        "success": true,
        "message": "Password changed successfully"
    })))
}

/// 通知偏好载荷
#[derive(Debug, Deserialize)]
pub struct NotificationPreferencesPayload {
    #[serde(default)]
    pub email_notifications: bool,
    #[serde(default)]
    pub appointment_reminders: bool,
    #[serde(default)]
    pub new_patient_alerts: bool,
    #[serde(default)]
    pub system_updates: bool,
}

/// 更新通知偏好
///
/// 偏好不持久化：通知投递不在本系统范围内，仅校验并确认请求。
pub async fn update_notifications(
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<NotificationPreferencesPayload>,
) -> ApiResult<impl IntoResponse> {
    info!(
        practitioner_id = %current.0.id,
        email = payload.email_notifications,
        reminders = payload.appointment_reminders,
        "Notification preferences acknowledged"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Notification preferences updated successfully"
    })))
}

/// 显示偏好载荷
#[derive(Debug, Deserialize)]
pub struct DisplayPreferencesPayload {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub date_format: Option<String>,
    pub time_format: Option<String>,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub compact_view: bool,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// 更新显示偏好
///
/// 偏好不持久化：仅校验并确认请求。
pub async fn update_preferences(
    Extension(current): Extension<CurrentPractitioner>,
    Json(payload): Json<DisplayPreferencesPayload>,
) -> ApiResult<impl IntoResponse> {
    info!(
        practitioner_id = %current.0.id,
        language = %payload.language,
        timezone = %payload.timezone,
        "Display preferences acknowledged"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Display preferences updated successfully"
    })))
}

/// 注销账户：级联删除全部业务数据并吊销所有会话
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentPractitioner>,
) -> ApiResult<impl IntoResponse> {
    let queries = DatabaseQueries::new(&state.db);

    queries.delete_practitioner(&current.0.id).await?;
    state.auth.revoke_all_for(current.0.id).await;

    Ok(Json(json!({
        "success": true,
        "message": "Account deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_slices_and_counts() {
        let items: Vec<i32> = (1..=25).collect();
        let (page, total) = paginate(items.clone(), 1, 10);
        assert_eq!(total, 25);
        assert_eq!(page, (1..=10).collect::<Vec<_>>());

        let (page, _) = paginate(items.clone(), 3, 10);
        assert_eq!(page, vec![21, 22, 23, 24, 25]);

        let (page, total) = paginate(items, 9, 10);
        assert_eq!(total, 25);
        assert!(page.is_empty());
    }

    #[test]
    fn test_non_empty_trims_blank_params() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" scheduled ")), Some("scheduled"));
    }
}
