//! # MedCare Web模块
//!
//! 提供诊所管理系统的HTTP接口，包括医生认证、患者档案、预约排班、
//! 问诊记录、处方管理与处方文档导出。

pub mod auth;
pub mod document;
pub mod error;
pub mod handlers;
pub mod server;

// 重新导出主要类型
pub use auth::{AuthService, CurrentPractitioner};
pub use error::{ApiError, ApiResult};
pub use handlers::AppState;
pub use server::WebServer;
