// ==========================================
// 仓储作业核心 - 配置层
// ==========================================
// 职责: 订单上限、存储重试等运行参数
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod order_limits;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use order_limits::OrderLimits;
