// ==========================================
// 仓储作业核心 - 应用层
// ==========================================
// 职责: 装配各层，供二进制入口与集成测试使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
