//! # MedCare 数据库模块
//!
//! 负责诊所业务数据的存储和管理，提供 PostgreSQL 连接池和完整的 CRUD
//! 操作。预约的“校验 + 落库”在同一事务内完成，并发请求无法同时通过
//! 冲突校验。

pub mod connection;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use models::*;
pub use queries::DatabaseQueries;
