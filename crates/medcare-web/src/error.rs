//! HTTP层错误翻译
//!
//! 调度核心只抛出类型化错误，转换为用户可见文案与状态码是本层的职责。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use medcare_core::ClinicError;
use serde_json::json;

/// 包装统一错误类型以实现axum响应转换
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<ClinicError> for ApiError {
    fn from(e: ClinicError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ClinicError::Overlap { .. } | ClinicError::Constraint(_) => StatusCode::CONFLICT,
            ClinicError::PastDate | ClinicError::Validation(_) => StatusCode::BAD_REQUEST,
            ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
            ClinicError::Permission(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // 内部错误不把细节透给调用方，只落日志
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Request failed with internal error");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(json!({
            "error": true,
            "message": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_status_code_mapping() {
        let overlap = ApiError(ClinicError::Overlap {
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        });
        assert_eq!(overlap.into_response().status(), StatusCode::CONFLICT);

        let past = ApiError(ClinicError::PastDate);
        assert_eq!(past.into_response().status(), StatusCode::BAD_REQUEST);

        let missing = ApiError(ClinicError::NotFound("appointment".to_string()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let broken = ApiError(ClinicError::Database("connection reset".to_string()));
        assert_eq!(
            broken.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
