// ==========================================
// 仓储作业核心 - 库存可用性检查
// ==========================================
// 职责: 在订单落库、拣货写入之前询问库存是否足够
// 说明: 真正的库存服务尚未接入，默认实现只响应显式的模拟开关
// ==========================================

use crate::domain::order::NewOrderLine;
use crate::domain::types::OrderKind;

/// 检查对象
#[derive(Debug, Clone)]
pub enum StockCheckTarget<'a> {
    /// 入库上架 / 大件存储订单
    Order {
        kind: OrderKind,
        header_key: &'a str,
        lines: &'a [NewOrderLine],
    },
    /// 补货拣货
    Pick {
        ro_id: &'a str,
        sku: &'a str,
        rack_location: &'a str,
        quantity: i64,
    },
}

#[derive(Debug, Clone)]
pub struct StockCheckRequest<'a> {
    pub target: StockCheckTarget<'a>,
    /// 调用方显式要求按库存不足处理
    pub simulate_insufficient: bool,
}

impl<'a> StockCheckRequest<'a> {
    pub fn order(
        kind: OrderKind,
        header_key: &'a str,
        lines: &'a [NewOrderLine],
        simulate_insufficient: bool,
    ) -> Self {
        Self {
            target: StockCheckTarget::Order { kind, header_key, lines },
            simulate_insufficient,
        }
    }

    pub fn pick(
        ro_id: &'a str,
        sku: &'a str,
        rack_location: &'a str,
        quantity: i64,
        simulate_insufficient: bool,
    ) -> Self {
        Self {
            target: StockCheckTarget::Pick { ro_id, sku, rack_location, quantity },
            simulate_insufficient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockCheckOutcome {
    Sufficient,
    Insufficient { reason: String },
}

/// 库存检查 Trait
pub trait StockChecker: Send + Sync {
    fn check(&self, request: &StockCheckRequest<'_>) -> StockCheckOutcome;
}

/// 占位实现：除非调用方打开模拟开关，否则一律视为库存充足
#[derive(Debug, Clone, Default)]
pub struct PlaceholderStockChecker;

impl StockChecker for PlaceholderStockChecker {
    fn check(&self, request: &StockCheckRequest<'_>) -> StockCheckOutcome {
        if !request.simulate_insufficient {
            return StockCheckOutcome::Sufficient;
        }

        let reason = match &request.target {
            StockCheckTarget::Order { kind, header_key, lines } => format!(
                "{} 订单 {} 共 {} 行明细库存不足",
                kind, header_key, lines.len()
            ),
            StockCheckTarget::Pick { sku, rack_location, quantity, .. } => format!(
                "货架位 {} 上 SKU {} 不足 {} 件",
                rack_location, sku, quantity
            ),
        };
        tracing::debug!(reason = %reason, "库存检查按模拟开关返回不足");
        StockCheckOutcome::Insufficient { reason }
    }
}
