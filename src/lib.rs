// ==========================================
// 仓储作业核心 - 核心库
// ==========================================
// 覆盖: 入库上架 / 大件存储订单创建、补货拣货状态机
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体、类型与状态机
pub mod domain;

// 数据仓储层 - 数据访问与重试
pub mod repository;

// 引擎层 - 库存检查与库存移动通知接缝
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能埋点
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OrderKind, ReplenishmentStatus};

// 领域实体
pub use domain::{NewOrderLine, OrderDraft, OrderHeader, ReplenishmentLine, ReplenishmentOrder};

// API
pub use api::{ApiError, ApiResult, OrderApi, ReplenishmentApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓储作业核心";
