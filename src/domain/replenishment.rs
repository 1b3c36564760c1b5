// ==========================================
// 仓储作业核心 - 补货单领域模型与状态机
// ==========================================
// 状态: Unassigned → In Process → Completed
//       In Process → Unassigned (取消拣货，拣货数量清零)
// 红线:
// - Completed 为终态，终态后禁止任何明细变更
// - 完成条件是“每一行都拣过(qty_picked > 0)”，不是“拣货数 = 需求数”
// - 拣货数量不截断到需求数量
// ==========================================

use crate::domain::types::ReplenishmentStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// ReplenishmentLine - 补货明细
// ==========================================
// 自然键: (sku, rack_location)，同一 SKU 可出现在多个货架位
// 对齐: replen_order_items 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentLine {
    pub sku: String,
    pub rack_location: String,
    pub quantity_requested: i64, // 需求数量，创建后不变
    pub quantity_picked: i64,    // 已拣数量，覆盖写
    pub note: Option<String>,    // 备注，最后一次写入生效
}

impl ReplenishmentLine {
    pub fn new(sku: impl Into<String>, rack_location: impl Into<String>, quantity_requested: i64) -> Self {
        Self {
            sku: sku.into(),
            rack_location: rack_location.into(),
            quantity_requested,
            quantity_picked: 0,
            note: None,
        }
    }

    /// 是否已拣过（完成判定口径）
    pub fn is_touched(&self) -> bool {
        self.quantity_picked > 0
    }
}

// ==========================================
// ReplenishmentOrder - 补货单
// ==========================================
// 对齐: replen_orders 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishmentOrder {
    pub ro_id: String,
    pub status: ReplenishmentStatus,
    pub destination: String,
    pub created_at: NaiveDateTime,
    pub lines: Vec<ReplenishmentLine>,
}

impl ReplenishmentOrder {
    /// 创建新的补货单（初始状态 Unassigned）
    pub fn new(
        ro_id: impl Into<String>,
        destination: impl Into<String>,
        created_at: NaiveDateTime,
        lines: Vec<ReplenishmentLine>,
    ) -> Self {
        Self {
            ro_id: ro_id.into(),
            status: ReplenishmentStatus::Unassigned,
            destination: destination.into(),
            created_at,
            lines,
        }
    }

    /// 拣货进度
    pub fn pick_progress(&self) -> PickProgress {
        PickProgress {
            picked_count: self.lines.iter().filter(|l| l.is_touched()).count(),
            total_count: self.lines.len(),
        }
    }

    /// 按自然键查找明细
    pub fn find_line(&self, sku: &str, rack_location: &str) -> Option<&ReplenishmentLine> {
        self.lines
            .iter()
            .find(|l| l.sku == sku && l.rack_location == rack_location)
    }
}

// ==========================================
// PickProgress - 拣货进度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickProgress {
    pub picked_count: usize,
    pub total_count: usize,
}

impl PickProgress {
    /// 全部明细都已拣过
    pub fn all_touched(&self) -> bool {
        self.picked_count >= self.total_count
    }
}

// ==========================================
// 状态机
// ==========================================

/// 驱动补货单状态变化的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplenishmentEvent {
    /// 读取订单（首次读取即开始作业）
    Retrieve,
    /// 记录拣货
    Pick,
    /// 取消拣货
    CancelPicking,
    /// 完成订单（已通过完成条件校验）
    Complete,
}

/// 非法状态转换
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("订单已完成，禁止变更")]
    AlreadyCompleted,

    #[error("当前状态 {from} 不允许取消拣货（仅 In Process 可取消）")]
    InvalidStatusForCancel { from: ReplenishmentStatus },
}

/// 状态转换函数
///
/// 读取引起的 Unassigned → In Process 在这里显式建模，
/// 而不是隐藏在普通查询里。
///
/// # 返回
/// - Ok(next): 转换后的状态（可能与当前状态相同）
/// - Err(TransitionError): 该状态下不允许此事件
pub fn transition(
    current: ReplenishmentStatus,
    event: ReplenishmentEvent,
) -> Result<ReplenishmentStatus, TransitionError> {
    use ReplenishmentEvent as E;
    use ReplenishmentStatus as S;

    match (current, event) {
        (S::Unassigned, E::Retrieve) | (S::Unassigned, E::Pick) => Ok(S::InProcess),
        (S::InProcess, E::Retrieve) | (S::InProcess, E::Pick) => Ok(S::InProcess),
        (S::Completed, E::Retrieve) => Ok(S::Completed),
        (S::Completed, E::Pick) => Err(TransitionError::AlreadyCompleted),

        (S::InProcess, E::CancelPicking) => Ok(S::Unassigned),
        (from @ S::Unassigned, E::CancelPicking) | (from @ S::Completed, E::CancelPicking) => {
            Err(TransitionError::InvalidStatusForCancel { from })
        }

        // 完成条件由 CompletionDecision 判定；Completed 上重复完成是幂等的
        (_, E::Complete) => Ok(S::Completed),
    }
}

// ==========================================
// 完成判定
// ==========================================

/// 完成订单的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDecision {
    /// 已是 Completed，幂等成功
    AlreadyCompleted,
    /// 仍有未拣明细，返回警告且不改变状态
    NotAllPicked(PickProgress),
    /// 可以完成
    Complete(PickProgress),
}

/// 判定补货单能否完成
pub fn decide_completion(order: &ReplenishmentOrder) -> CompletionDecision {
    if order.status.is_terminal() {
        return CompletionDecision::AlreadyCompleted;
    }

    let progress = order.pick_progress();
    if progress.all_touched() {
        CompletionDecision::Complete(progress)
    } else {
        CompletionDecision::NotAllPicked(progress)
    }
}
