//! 错误定义模块

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// 诊所系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// 预约时间段与既有预约冲突，携带冲突时段用于展示
    #[error(
        "This time slot is not available. There is already an appointment from {} to {} on {}.",
        .start.format("%H:%M"),
        .end.format("%H:%M"),
        .date
    )]
    Overlap {
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("Cannot schedule appointments in the past.")]
    PastDate,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// 诊所系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
