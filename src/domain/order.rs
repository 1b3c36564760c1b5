// ==========================================
// 仓储作业核心 - 库存移动订单领域模型
// ==========================================
// 覆盖: 入库上架订单 / 大件存储订单（订单头 + 明细行）
// 红线: 没有任何明细行成功落库的订单头不得存在
// ==========================================

use crate::domain::types::OrderKind;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// NewOrderLine - 待创建的明细行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub sku: String,     // SKU（单个订单内唯一）
    pub name: String,    // 商品名称
    pub barcode: String, // 条码（8-14位数字；大件存储允许 NA）
    pub quantity: i64,   // 数量（正整数）
}

impl NewOrderLine {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, barcode: impl Into<String>, quantity: i64) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            barcode: barcode.into(),
            quantity,
        }
    }
}

// ==========================================
// OrderDraft - 订单创建请求（已由传输层做过结构校验）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub kind: OrderKind,
    pub header_key: String,
    pub lines: Vec<NewOrderLine>,

    /// 库存不足模拟开关（测试钩子，显式输入而非硬编码）
    #[serde(default)]
    pub simulate_insufficient_stock: bool,
}

impl OrderDraft {
    pub fn new(kind: OrderKind, header_key: impl Into<String>, lines: Vec<NewOrderLine>) -> Self {
        Self {
            kind,
            header_key: header_key.into(),
            lines,
            simulate_insufficient_stock: false,
        }
    }

    /// 打开库存不足模拟
    pub fn with_insufficient_stock(mut self) -> Self {
        self.simulate_insufficient_stock = true;
        self
    }

    /// 明细数量合计
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// ==========================================
// OrderHeader / OrderLine - 已落库的订单
// ==========================================
// 对齐: inventory_order / inventory_order_item 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHeader {
    pub order_id: i64, // 自增主键
    pub kind: OrderKind,
    pub header_key: String,
    pub created_at: NaiveDateTime,
    pub lines: Vec<OrderLine>, // 按输入顺序（line_no）
}

impl OrderHeader {
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: i64,
    pub line_no: i64,
    pub sku: String,
    pub name: String,
    pub barcode: String,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_total_quantity() {
        let draft = OrderDraft::new(
            OrderKind::Putaway,
            "TOTE-01",
            vec![
                NewOrderLine::new("A", "Alpha", "12345678", 10),
                NewOrderLine::new("B", "Beta", "12345679", 5),
            ],
        );
        assert_eq!(draft.total_quantity(), 15);
        assert!(!draft.simulate_insufficient_stock);
        assert!(draft.with_insufficient_stock().simulate_insufficient_stock);
    }
}
