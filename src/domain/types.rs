// ==========================================
// 仓储作业核心 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单类型 (Order Kind)
// ==========================================
// 入库订单以周转箱(tote)为头键，大件存储订单以库位为头键
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Putaway,     // 入库上架
    BulkStorage, // 大件存储
}

impl OrderKind {
    /// 数据库存储值
    pub fn as_db_str(&self) -> &'static str {
        match self {
            OrderKind::Putaway => "PUTAWAY",
            OrderKind::BulkStorage => "BULK_STORAGE",
        }
    }

    /// 从数据库存储值解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PUTAWAY" => Some(OrderKind::Putaway),
            "BULK_STORAGE" => Some(OrderKind::BulkStorage),
            _ => None,
        }
    }

    /// 配置键前缀（config_kv）
    pub fn config_prefix(&self) -> &'static str {
        match self {
            OrderKind::Putaway => "order.putaway",
            OrderKind::BulkStorage => "order.bulk_storage",
        }
    }

    /// 头键的业务名称（用于错误提示）
    pub fn header_key_label(&self) -> &'static str {
        match self {
            OrderKind::Putaway => "周转箱",
            OrderKind::BulkStorage => "库位",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 补货单状态 (Replenishment Status)
// ==========================================
// 状态流转: Unassigned → In Process → Completed
//           In Process → Unassigned (取消拣货)
// Completed 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplenishmentStatus {
    #[serde(rename = "Unassigned")]
    Unassigned, // 未分配
    #[serde(rename = "In Process")]
    InProcess, // 拣货中
    #[serde(rename = "Completed")]
    Completed, // 已完成
}

impl ReplenishmentStatus {
    /// 数据库存储值（与历史数据一致，含空格）
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ReplenishmentStatus::Unassigned => "Unassigned",
            ReplenishmentStatus::InProcess => "In Process",
            ReplenishmentStatus::Completed => "Completed",
        }
    }

    /// 从数据库存储值解析
    ///
    /// 兼容大小写与 "IN_PROCESS" 写法；无法识别时返回 None，由调用方决定如何处理
    pub fn from_db_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "UNASSIGNED" => Some(ReplenishmentStatus::Unassigned),
            "IN PROCESS" => Some(ReplenishmentStatus::InProcess),
            "COMPLETED" => Some(ReplenishmentStatus::Completed),
            _ => None,
        }
    }

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplenishmentStatus::Completed)
    }
}

impl fmt::Display for ReplenishmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}
