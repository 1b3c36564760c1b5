// ==========================================
// 仓储作业核心 - API 层
// ==========================================
// 职责: 业务操作入口，编排校验、仓储、引擎接缝
// 约束: 返回 ApiResult，错误带稳定错误码与大类
// ==========================================

pub mod error;
pub mod order_api;
pub mod replenishment_api;
pub mod validator;

pub use error::{ApiError, ApiResult, ErrorCategory, ErrorResponse};
pub use order_api::{CreateOrderResponse, OrderApi};
pub use replenishment_api::{
    ActiveOrdersResponse, CancelPickingResponse, CompleteOrderResponse, CompletionOutcome,
    RecordPickRequest, RecordPickResponse, ReplenishmentApi, ReplenishmentOrderView,
    RetrieveOrderResponse,
};
