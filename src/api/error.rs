// ==========================================
// 仓储作业核心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户可读的错误消息
// 约束: 存储层原始错误文本只进日志，不进入返回给调用方的消息
// ==========================================

use crate::domain::types::{OrderKind, ReplenishmentStatus};
use crate::repository::error::RepositoryError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// 输入不合法
    Validation,
    /// 订单或明细不存在
    NotFound,
    /// 与当前状态冲突（重复、已完成、状态不允许）
    Conflict,
    /// 资源不足（库存）
    Resource,
    /// 依赖不可用（存储）
    Dependency,
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验错误
    // ==========================================
    #[error("无效输入({field}): {message}")]
    InvalidInput { field: String, message: String },

    #[error("数量超限: 合计 {total} 超过上限 {limit}")]
    QuantityExceeded { total: i64, limit: i64 },

    // ==========================================
    // 冲突错误
    // ==========================================
    #[error("{}{} 已存在订单", .kind.header_key_label(), .header_key)]
    DuplicateKey { kind: OrderKind, header_key: String },

    #[error("订单明细写入失败: SKU {sku}，订单未创建")]
    ItemInsertFailed { sku: String },

    #[error("补货单 {ro_id} 已完成，禁止修改")]
    OrderAlreadyCompleted { ro_id: String },

    #[error("补货单 {ro_id} 当前状态为 {status}，仅 In Process 状态可以取消拣货")]
    InvalidStatusForCancel {
        ro_id: String,
        status: ReplenishmentStatus,
    },

    #[error("补货单 {ro_id} 状态已被其他操作修改，请刷新后重试")]
    ConcurrentModification { ro_id: String },

    // ==========================================
    // 资源错误
    // ==========================================
    #[error("库存不足: {0}")]
    InsufficientStock(String),

    // ==========================================
    // 未找到
    // ==========================================
    #[error("补货单 {ro_id} 不存在")]
    OrderNotFound { ro_id: String },

    #[error("补货单 {ro_id} 中不存在明细: sku={sku}, rack_location={rack_location}")]
    LineNotFound {
        ro_id: String,
        sku: String,
        rack_location: String,
    },

    // ==========================================
    // 依赖错误
    // ==========================================
    #[error("数据存储暂不可用，请稍后重试（{operation}）")]
    StoreUnavailable { operation: String },

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 稳定错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput { .. } => "VALIDATION_ERROR",
            ApiError::QuantityExceeded { .. } => "QUANTITY_EXCEEDED",
            ApiError::DuplicateKey { kind: OrderKind::Putaway, .. } => "DUPLICATE_TOTE",
            ApiError::DuplicateKey { kind: OrderKind::BulkStorage, .. } => "DUPLICATE_LOCATION",
            ApiError::ItemInsertFailed { .. } => "ITEM_INSERT_FAILED",
            ApiError::OrderAlreadyCompleted { .. } => "ORDER_ALREADY_COMPLETED",
            ApiError::InvalidStatusForCancel { .. } => "INVALID_STATUS_FOR_CANCEL",
            ApiError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            ApiError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            ApiError::OrderNotFound { .. } => "RO_NOT_FOUND",
            ApiError::LineNotFound { .. } => "ITEM_NOT_FOUND",
            ApiError::StoreUnavailable { .. } => "DATABASE_ERROR",
            ApiError::InternalError(_) => "SERVER_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::InvalidInput { .. } | ApiError::QuantityExceeded { .. } => {
                ErrorCategory::Validation
            }
            ApiError::DuplicateKey { .. }
            | ApiError::ItemInsertFailed { .. }
            | ApiError::OrderAlreadyCompleted { .. }
            | ApiError::InvalidStatusForCancel { .. }
            | ApiError::ConcurrentModification { .. } => ErrorCategory::Conflict,
            ApiError::InsufficientStock(_) => ErrorCategory::Resource,
            ApiError::OrderNotFound { .. } | ApiError::LineNotFound { .. } => ErrorCategory::NotFound,
            ApiError::StoreUnavailable { .. } | ApiError::InternalError(_) => ErrorCategory::Dependency,
        }
    }

    /// 出错字段（仅校验错误）
    pub fn field(&self) -> Option<&str> {
        match self {
            ApiError::InvalidInput { field, .. } => Some(field.as_str()),
            ApiError::QuantityExceeded { .. } => Some("lines"),
            _ => None,
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 存储层错误统一收敛为 StoreUnavailable
    ///
    /// 原始错误写日志；返回给调用方的只有操作名。
    pub fn store(operation: &str, err: RepositoryError) -> Self {
        tracing::error!(operation, error = %err, "存储层错误");
        match err {
            RepositoryError::StoreUnavailable { operation, .. } => {
                ApiError::StoreUnavailable { operation }
            }
            _ => ApiError::StoreUnavailable {
                operation: operation.to_string(),
            },
        }
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        ApiError::store("数据访问", err)
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 错误响应 DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String, // 固定 "error"
    pub message: String,
    pub error_code: String,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub timestamp: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            status: "error".to_string(),
            message: err.to_string(),
            error_code: err.error_code().to_string(),
            category: err.category(),
            field: err.field().map(str::to_string),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}
