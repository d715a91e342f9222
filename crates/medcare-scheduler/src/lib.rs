//! # MedCare 预约调度模块
//!
//! 提供预约排班的核心规则，包括：
//! - 冲突校验：同一医生同日时段重叠检测与过期预约拦截
//! - 列表排序：按状态优先级与临近程度的确定性排序
//! - 条件过滤：状态、相对日期区间、患者姓名的组合过滤
//! - 状态流转：预约状态的解析与管理改写规则
//!
//! 模块内全部为同步纯函数，只读取已取出的预约集合，由持久层负责
//! 在同一事务内完成“校验 + 落库”。

pub mod conflict;
pub mod listing;
pub mod status;

// 重新导出主要类型
pub use conflict::{comparison_set, validate, BLOCKING_STATUSES};
pub use listing::{order_for_listing, status_priority, AppointmentFilter, DateBucket};
pub use status::AppointmentStatusMachine;
