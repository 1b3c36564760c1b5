// ==========================================
// 仓储作业核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 约定: 配置缺失或无法解析时回退默认值，不阻断业务
// ==========================================

use crate::config::order_limits::OrderLimits;
use crate::domain::types::OrderKind;
use crate::repository::error::RepositoryResult;
use crate::repository::retry::{RetryPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS};
use crate::repository::store::SqliteStore;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    store: Arc<SqliteStore>,
}

impl ConfigManager {
    /// 创建 ConfigManager
    ///
    /// # 参数
    /// - store: 共享存储；读写与业务数据一样经过它的重试策略
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        self.store.run("config.get", |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        self.store.run("config.set", |conn| {
            conn.execute(
                r#"
                INSERT INTO config_kv (scope_id, key, value, updated_at)
                VALUES ('global', ?1, ?2, datetime('now'))
                ON CONFLICT(scope_id, key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                "#,
                params![key, value],
            )?;
            Ok(())
        })
    }

    /// 获取所有 global 配置
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        self.store.run("config.snapshot", |conn| {
            let mut stmt = conn
                .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
            let rows =
                stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

            let mut snapshot = BTreeMap::new();
            for row in rows {
                let (key, value) = row?;
                snapshot.insert(key, value);
            }
            Ok(snapshot)
        })
    }

    /// 读取数值配置，缺失或格式错误时回退默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 获取某类订单的校验上限
    pub fn get_order_limits(&self, kind: OrderKind) -> RepositoryResult<OrderLimits> {
        let defaults = OrderLimits::defaults_for(kind);
        let prefix = kind.config_prefix();

        Ok(OrderLimits {
            max_lines: self.get_parsed_or(
                &format!("{}.{}", prefix, config_keys::MAX_LINES),
                defaults.max_lines,
            )?,
            max_line_quantity: self.get_parsed_or(
                &format!("{}.{}", prefix, config_keys::MAX_LINE_QUANTITY),
                defaults.max_line_quantity,
            )?,
            max_total_quantity: self.get_parsed_or(
                &format!("{}.{}", prefix, config_keys::MAX_TOTAL_QUANTITY),
                defaults.max_total_quantity,
            )?,
            max_header_key_len: self.get_parsed_or(
                &format!("{}.{}", prefix, config_keys::MAX_HEADER_KEY_LEN),
                defaults.max_header_key_len,
            )?,
        })
    }

    /// 获取存储重试策略
    pub fn get_retry_policy(&self) -> RepositoryResult<RetryPolicy> {
        let max_attempts = self.get_parsed_or(config_keys::STORE_RETRY_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS)?;
        let base_delay_ms = self.get_parsed_or(config_keys::STORE_RETRY_BASE_DELAY_MS, DEFAULT_BASE_DELAY_MS)?;

        Ok(RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 订单上限（前缀 order.putaway / order.bulk_storage）
    pub const MAX_LINES: &str = "max_lines";
    pub const MAX_LINE_QUANTITY: &str = "max_line_quantity";
    pub const MAX_TOTAL_QUANTITY: &str = "max_total_quantity";
    pub const MAX_HEADER_KEY_LEN: &str = "max_header_key_len";

    // 存储重试
    pub const STORE_RETRY_MAX_ATTEMPTS: &str = "store.retry.max_attempts";
    pub const STORE_RETRY_BASE_DELAY_MS: &str = "store.retry.base_delay_ms";
}
