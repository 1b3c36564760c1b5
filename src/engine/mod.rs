// ==========================================
// 仓储作业核心 - 引擎层
// ==========================================
// 职责: 外部依赖的接缝（库存检查、库存移动通知）
// 说明: API 层只依赖这里的 trait，具体实现由 AppState 装配
// ==========================================

pub mod events;
pub mod stock;

pub use events::{
    InventoryMovementEvent, InventoryMovementPublisher, MovementOutboxPublisher,
    NoOpMovementPublisher, OptionalMovementPublisher,
};
pub use stock::{
    PlaceholderStockChecker, StockCheckOutcome, StockCheckRequest, StockCheckTarget, StockChecker,
};
