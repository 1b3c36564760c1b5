// ==========================================
// 仓储作业核心 - 订单校验上限
// ==========================================
// 默认值与两类订单的业务口径保持一致，可被 config_kv 覆写
// ==========================================

use crate::domain::types::OrderKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLimits {
    pub max_lines: usize,          // 每单最多明细行数
    pub max_line_quantity: i64,    // 单行数量上限
    pub max_total_quantity: i64,   // 整单数量合计上限
    pub max_header_key_len: usize, // 周转箱号/库位最大长度
}

impl OrderLimits {
    /// 按订单类型给出默认上限
    pub fn defaults_for(kind: OrderKind) -> Self {
        match kind {
            OrderKind::Putaway => Self {
                max_lines: 50,
                max_line_quantity: 10_000,
                max_total_quantity: 100_000,
                max_header_key_len: 20,
            },
            OrderKind::BulkStorage => Self {
                max_lines: 100,
                max_line_quantity: 100_000,
                max_total_quantity: 1_000_000,
                max_header_key_len: 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        let putaway = OrderLimits::defaults_for(OrderKind::Putaway);
        assert_eq!(putaway.max_total_quantity, 100_000);
        assert_eq!(putaway.max_lines, 50);

        let bulk = OrderLimits::defaults_for(OrderKind::BulkStorage);
        assert_eq!(bulk.max_total_quantity, 1_000_000);
        assert_eq!(bulk.max_header_key_len, 30);
    }
}
