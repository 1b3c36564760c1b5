// ==========================================
// 仓储作业核心 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 瞬时错误(busy/locked/连接失败)可重试，约束违反不可重试
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库繁忙: {0}")]
    DatabaseBusy(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    #[error("检查约束违反: {0}")]
    CheckConstraintViolation(String),

    /// 订单明细写入失败（事务已回滚）
    #[error("明细写入失败: sku={sku}, 原因={message}")]
    LineInsertFailed { sku: String, message: String },

    /// 重试耗尽
    #[error("存储不可用: operation={operation}, attempts={attempts}, last_error={last_error}")]
    StoreUnavailable {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    // ===== 数据质量错误 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },
}

impl RepositoryError {
    /// 是否为瞬时错误（可重试）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepositoryError::DatabaseBusy(_) | RepositoryError::DatabaseConnectionError(_)
        )
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                return RepositoryError::DatabaseBusy(err.to_string());
            }
            Some(ErrorCode::CannotOpen) => {
                return RepositoryError::DatabaseConnectionError(err.to_string());
            }
            _ => {}
        }

        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else if msg.contains("CHECK") {
                    RepositoryError::CheckConstraintViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
