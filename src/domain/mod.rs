// ==========================================
// 仓储作业核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态转换规则
// 红线: 不含数据访问逻辑
// ==========================================

pub mod order;
pub mod replenishment;
pub mod types;

// 重导出核心类型
pub use order::{NewOrderLine, OrderDraft, OrderHeader, OrderLine};
pub use replenishment::{
    decide_completion, transition, CompletionDecision, PickProgress, ReplenishmentEvent,
    ReplenishmentLine, ReplenishmentOrder, TransitionError,
};
pub use types::{OrderKind, ReplenishmentStatus};
