// ==========================================
// 仓储作业核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
//       所有访问经由 SqliteStore 的有界重试
// ==========================================

pub mod error;
pub mod movement_outbox_repo;
pub mod order_repo;
pub mod replenishment_repo;
pub mod retry;
pub mod store;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use movement_outbox_repo::{MovementOutboxEntity, MovementOutboxRepository};
pub use order_repo::OrderRepository;
pub use replenishment_repo::{
    ActiveReplenishmentOrderRow, PickWrite, PickWriteOutcome, ReplenishmentRepository,
};
pub use retry::RetryPolicy;
pub use store::SqliteStore;
