// ==========================================
// 仓储作业核心 - 补货拣货 API
// ==========================================
// 状态机: Unassigned → In Process → Completed；In Process → Unassigned（取消）
// 红线:
// - 首次读取即把 Unassigned 推进到 In Process
// - Completed 之后拒绝任何拣货与取消
// - 拣货从不自动完成订单；完成只由 complete_order 显式触发
// - 库存移动通知失败不影响拣货结果
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{
    validate_note, validate_quantity_picked, validate_rack_location, validate_ro_id, validate_sku,
};
use crate::domain::replenishment::{
    decide_completion, transition, CompletionDecision, ReplenishmentEvent, ReplenishmentLine,
    ReplenishmentOrder, TransitionError,
};
use crate::domain::types::ReplenishmentStatus;
use crate::engine::events::{InventoryMovementEvent, OptionalMovementPublisher};
use crate::engine::stock::{StockCheckOutcome, StockCheckRequest, StockChecker};
use crate::perf::PerfGuard;
use crate::repository::replenishment_repo::{
    ActiveReplenishmentOrderRow, PickWrite, PickWriteOutcome, ReplenishmentRepository,
};

/// 拣货写入时期望状态被并发改变后的最多尝试次数
const MAX_PICK_STATUS_ATTEMPTS: u32 = 3;

// ==========================================
// ReplenishmentApi - 补货拣货 API
// ==========================================

/// 补货拣货API
///
/// 职责：
/// 1. 未完成补货单列表
/// 2. 读取补货单（首次读取开始作业）
/// 3. 记录拣货、取消拣货、完成订单
/// 4. 拣货后发布库存移动通知
pub struct ReplenishmentApi {
    replenishment_repo: Arc<ReplenishmentRepository>,
    stock_checker: Arc<dyn StockChecker>,
    movement_publisher: OptionalMovementPublisher,
}

impl ReplenishmentApi {
    pub fn new(
        replenishment_repo: Arc<ReplenishmentRepository>,
        stock_checker: Arc<dyn StockChecker>,
        movement_publisher: OptionalMovementPublisher,
    ) -> Self {
        Self {
            replenishment_repo,
            stock_checker,
            movement_publisher,
        }
    }

    /// 未完成补货单列表（创建时间倒序）
    pub fn list_active_orders(&self) -> ApiResult<ActiveOrdersResponse> {
        let _perf = PerfGuard::new("replenishment_api.list_active_orders");

        let orders = self
            .replenishment_repo
            .list_active()
            .map_err(|e| ApiError::store("replenishment.list_active", e))?;

        Ok(ActiveOrdersResponse {
            count: orders.len(),
            orders,
        })
    }

    /// 读取补货单
    ///
    /// 首次读取 Unassigned 订单时推进到 In Process，并在响应中标明状态已变化。
    ///
    /// # 返回
    /// - Ok(RetrieveOrderResponse): 订单头、明细、读取后的状态
    /// - Err(OrderNotFound): 订单不存在
    pub fn retrieve_order(&self, ro_id: &str) -> ApiResult<RetrieveOrderResponse> {
        let _perf = PerfGuard::new("replenishment_api.retrieve_order");
        let ro_id = validate_ro_id(ro_id)?;

        let mut order = self.load_order(&ro_id)?;
        let previous_status = order.status;
        let next = transition(previous_status, ReplenishmentEvent::Retrieve)
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let mut status_changed = false;
        if next != previous_status {
            if self
                .replenishment_repo
                .compare_and_set_status(&ro_id, previous_status, next)
                .map_err(|e| ApiError::store("replenishment.compare_and_set_status", e))?
            {
                status_changed = true;
                order.status = next;
                tracing::info!(ro_id = %ro_id, from = %previous_status, to = %next, "补货单开始作业");
            } else {
                // 并发读取或操作已改变状态，以存储中的当前值为准
                order.status = self.load_status(&ro_id)?;
            }
        }

        Ok(RetrieveOrderResponse {
            previous_status,
            status_changed,
            order: ReplenishmentOrderView::from(order),
        })
    }

    /// 记录单行拣货
    ///
    /// 拣货数量覆盖写，不截断到需求数量；note 为空时保留原备注。
    ///
    /// # 返回
    /// - Ok(RecordPickResponse): 已写入
    /// - Err(OrderNotFound / LineNotFound): 订单或明细不存在
    /// - Err(OrderAlreadyCompleted): 订单已完成
    /// - Err(InsufficientStock): 库存检查不通过，未写入
    pub fn record_pick(&self, request: RecordPickRequest) -> ApiResult<RecordPickResponse> {
        let _perf = PerfGuard::new("replenishment_api.record_pick");

        let ro_id = validate_ro_id(&request.ro_id)?;
        let sku = validate_sku("sku", &request.sku, true)?;
        let rack_location = validate_rack_location(&request.rack_location)?;
        let quantity_picked = validate_quantity_picked(request.quantity_picked)?;
        let note = validate_note(request.note.as_deref())?;

        let order = self.load_order(&ro_id)?;
        let line = order
            .find_line(&sku, &rack_location)
            .ok_or_else(|| ApiError::LineNotFound {
                ro_id: ro_id.clone(),
                sku: sku.clone(),
                rack_location: rack_location.clone(),
            })?;
        let quantity_requested = line.quantity_requested;

        let already_completed = |ro_id: &str| ApiError::OrderAlreadyCompleted {
            ro_id: ro_id.to_string(),
        };
        transition(order.status, ReplenishmentEvent::Pick).map_err(|_| already_completed(&ro_id))?;

        let stock_request = StockCheckRequest::pick(
            &ro_id,
            &sku,
            &rack_location,
            quantity_picked,
            request.simulate_insufficient_stock,
        );
        if let StockCheckOutcome::Insufficient { reason } = self.stock_checker.check(&stock_request) {
            tracing::warn!(ro_id = %ro_id, sku = %sku, rack_location = %rack_location, reason = %reason, "拣货库存不足");
            return Err(ApiError::InsufficientStock(reason));
        }

        let write = PickWrite {
            ro_id: &ro_id,
            sku: &sku,
            rack_location: &rack_location,
            quantity_picked,
            note: note.as_deref(),
        };

        // 期望状态在读取后可能被并发的首次拣货/取消改变；非终态时按最新状态重新推导
        let mut previous_status = order.status;
        let mut attempt = 1;
        let next = loop {
            let next = transition(previous_status, ReplenishmentEvent::Pick)
                .map_err(|_| already_completed(&ro_id))?;
            let outcome = self
                .replenishment_repo
                .apply_pick(&write, previous_status, next)
                .map_err(|e| ApiError::store("replenishment.apply_pick", e))?;

            match outcome {
                PickWriteOutcome::Applied => break next,
                PickWriteOutcome::LineMissing => {
                    return Err(ApiError::LineNotFound {
                        ro_id: ro_id.clone(),
                        sku: sku.clone(),
                        rack_location: rack_location.clone(),
                    });
                }
                PickWriteOutcome::StatusChanged => {
                    let current = self.load_status(&ro_id)?;
                    tracing::warn!(ro_id = %ro_id, expected = %previous_status, current = %current, attempt, "拣货时订单状态已变化");
                    if current.is_terminal() {
                        return Err(already_completed(&ro_id));
                    }
                    if attempt >= MAX_PICK_STATUS_ATTEMPTS {
                        return Err(ApiError::ConcurrentModification { ro_id: ro_id.clone() });
                    }
                    previous_status = current;
                    attempt += 1;
                }
            }
        };

        if quantity_picked > quantity_requested {
            tracing::info!(
                ro_id = %ro_id,
                sku = %sku,
                quantity_requested,
                quantity_picked,
                "拣货数量超过需求数量，按实际记录"
            );
        }
        tracing::info!(ro_id = %ro_id, sku = %sku, rack_location = %rack_location, quantity_picked, "拣货已记录");

        let event = InventoryMovementEvent::pick(
            ro_id.clone(),
            sku.clone(),
            rack_location.clone(),
            quantity_picked,
            note.clone(),
        );
        let movement_notified = self.movement_publisher.publish_best_effort(&event);

        Ok(RecordPickResponse {
            ro_id,
            sku,
            rack_location,
            quantity_requested,
            quantity_picked,
            note,
            previous_status,
            status: next,
            status_changed: next != previous_status,
            movement_notified,
        })
    }

    /// 取消拣货：In Process → Unassigned，全部明细拣货数量清零
    ///
    /// # 返回
    /// - Err(InvalidStatusForCancel): 当前不是 In Process
    pub fn cancel_picking(&self, ro_id: &str) -> ApiResult<CancelPickingResponse> {
        let _perf = PerfGuard::new("replenishment_api.cancel_picking");
        let ro_id = validate_ro_id(ro_id)?;

        let previous_status = self.load_status(&ro_id)?;
        let next = transition(previous_status, ReplenishmentEvent::CancelPicking).map_err(|e| match e {
            TransitionError::InvalidStatusForCancel { from } => ApiError::InvalidStatusForCancel {
                ro_id: ro_id.clone(),
                status: from,
            },
            other => ApiError::InternalError(other.to_string()),
        })?;

        let reset = self
            .replenishment_repo
            .reset_picks(&ro_id, previous_status, next)
            .map_err(|e| ApiError::store("replenishment.reset_picks", e))?;

        let Some(lines_reset) = reset else {
            let current = self.load_status(&ro_id)?;
            tracing::warn!(ro_id = %ro_id, current = %current, "取消拣货时订单状态已变化");
            return Err(ApiError::InvalidStatusForCancel {
                ro_id,
                status: current,
            });
        };

        tracing::info!(ro_id = %ro_id, lines_reset, "拣货已取消");

        Ok(CancelPickingResponse {
            message: format!("补货单 {} 已取消拣货，{} 行明细已清零", ro_id, lines_reset),
            ro_id,
            previous_status,
            new_status: next,
            lines_reset,
        })
    }

    /// 完成补货单
    ///
    /// 每一行都拣过（qty_picked > 0）才能完成；否则返回警告且状态不变。
    /// 对已完成订单重复调用是幂等成功。
    pub fn complete_order(&self, ro_id: &str) -> ApiResult<CompleteOrderResponse> {
        let _perf = PerfGuard::new("replenishment_api.complete_order");
        let ro_id = validate_ro_id(ro_id)?;

        let order = self.load_order(&ro_id)?;
        let previous_status = order.status;
        let progress = order.pick_progress();

        match decide_completion(&order) {
            CompletionDecision::AlreadyCompleted => Ok(CompleteOrderResponse::already_completed(
                ro_id,
                progress.picked_count,
                progress.total_count,
            )),
            CompletionDecision::NotAllPicked(progress) => {
                tracing::warn!(
                    ro_id = %ro_id,
                    picked_count = progress.picked_count,
                    total_count = progress.total_count,
                    "仍有未拣明细，补货单未完成"
                );
                Ok(CompleteOrderResponse {
                    status: "warning".to_string(),
                    outcome: CompletionOutcome::Warning,
                    message: format!(
                        "补货单 {} 仍有未拣明细：已拣 {}/{} 行",
                        ro_id, progress.picked_count, progress.total_count
                    ),
                    ro_id,
                    previous_status,
                    new_status: previous_status,
                    picked_count: progress.picked_count,
                    total_count: progress.total_count,
                })
            }
            CompletionDecision::Complete(progress) => {
                let next = transition(previous_status, ReplenishmentEvent::Complete)
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;

                if !self
                    .replenishment_repo
                    .compare_and_set_status(&ro_id, previous_status, next)
                    .map_err(|e| ApiError::store("replenishment.compare_and_set_status", e))?
                {
                    let current = self.load_status(&ro_id)?;
                    if current.is_terminal() {
                        return Ok(CompleteOrderResponse::already_completed(
                            ro_id,
                            progress.picked_count,
                            progress.total_count,
                        ));
                    }
                    tracing::warn!(ro_id = %ro_id, expected = %previous_status, current = %current, "完成时订单状态已变化");
                    return Err(ApiError::ConcurrentModification { ro_id });
                }

                tracing::info!(ro_id = %ro_id, total_count = progress.total_count, "补货单已完成");
                Ok(CompleteOrderResponse {
                    status: "success".to_string(),
                    outcome: CompletionOutcome::Completed,
                    message: format!("补货单 {} 已完成", ro_id),
                    ro_id,
                    previous_status,
                    new_status: next,
                    picked_count: progress.picked_count,
                    total_count: progress.total_count,
                })
            }
        }
    }

    fn load_order(&self, ro_id: &str) -> ApiResult<ReplenishmentOrder> {
        self.replenishment_repo
            .find_order(ro_id)
            .map_err(|e| ApiError::store("replenishment.find_order", e))?
            .ok_or_else(|| ApiError::OrderNotFound {
                ro_id: ro_id.to_string(),
            })
    }

    fn load_status(&self, ro_id: &str) -> ApiResult<ReplenishmentStatus> {
        self.replenishment_repo
            .find_status(ro_id)
            .map_err(|e| ApiError::store("replenishment.find_status", e))?
            .ok_or_else(|| ApiError::OrderNotFound {
                ro_id: ro_id.to_string(),
            })
    }
}

// ==========================================
// DTO
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct ActiveOrdersResponse {
    pub count: usize,
    pub orders: Vec<ActiveReplenishmentOrderRow>,
}

/// 补货单视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishmentOrderView {
    pub ro_id: String,
    pub status: ReplenishmentStatus,
    pub destination: String,
    pub created_at: NaiveDateTime,
    pub picked_count: usize,
    pub total_count: usize,
    pub lines: Vec<ReplenishmentLine>,
}

impl From<ReplenishmentOrder> for ReplenishmentOrderView {
    fn from(order: ReplenishmentOrder) -> Self {
        let progress = order.pick_progress();
        Self {
            ro_id: order.ro_id,
            status: order.status,
            destination: order.destination,
            created_at: order.created_at,
            picked_count: progress.picked_count,
            total_count: progress.total_count,
            lines: order.lines,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveOrderResponse {
    pub order: ReplenishmentOrderView,
    pub previous_status: ReplenishmentStatus,
    pub status_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPickRequest {
    pub ro_id: String,
    pub sku: String,
    pub rack_location: String,
    pub quantity_picked: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub simulate_insufficient_stock: bool,
}

impl RecordPickRequest {
    pub fn new(
        ro_id: impl Into<String>,
        sku: impl Into<String>,
        rack_location: impl Into<String>,
        quantity_picked: i64,
    ) -> Self {
        Self {
            ro_id: ro_id.into(),
            sku: sku.into(),
            rack_location: rack_location.into(),
            quantity_picked,
            note: None,
            simulate_insufficient_stock: false,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPickResponse {
    pub ro_id: String,
    pub sku: String,
    pub rack_location: String,
    pub quantity_requested: i64,
    pub quantity_picked: i64,
    pub note: Option<String>,
    pub previous_status: ReplenishmentStatus,
    pub status: ReplenishmentStatus,
    pub status_changed: bool,
    /// 库存移动通知是否送达（失败不影响拣货结果）
    pub movement_notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPickingResponse {
    pub ro_id: String,
    pub previous_status: ReplenishmentStatus,
    pub new_status: ReplenishmentStatus,
    pub lines_reset: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionOutcome {
    Completed,
    AlreadyCompleted,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteOrderResponse {
    pub status: String, // "success" / "warning"
    pub outcome: CompletionOutcome,
    pub message: String,
    pub ro_id: String,
    pub previous_status: ReplenishmentStatus,
    pub new_status: ReplenishmentStatus,
    pub picked_count: usize,
    pub total_count: usize,
}

impl CompleteOrderResponse {
    fn already_completed(ro_id: String, picked_count: usize, total_count: usize) -> Self {
        Self {
            status: "success".to_string(),
            outcome: CompletionOutcome::AlreadyCompleted,
            message: format!("补货单 {} 已是完成状态", ro_id),
            ro_id,
            previous_status: ReplenishmentStatus::Completed,
            new_status: ReplenishmentStatus::Completed,
            picked_count,
            total_count,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.outcome == CompletionOutcome::Warning
    }
}
