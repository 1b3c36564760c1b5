// ==========================================
// 仓储作业核心 - 库存移动订单仓储
// ==========================================
// 表: inventory_order / inventory_order_item
// 红线: 订单头与明细在同一事务内写入，任何明细失败整体回滚
// ==========================================

use crate::domain::order::{NewOrderLine, OrderHeader, OrderLine};
use crate::domain::types::OrderKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::SqliteStore;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct OrderRepository {
    store: Arc<SqliteStore>,
}

impl OrderRepository {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// 指定类型下 header_key 是否已有订单
    pub fn exists(&self, kind: OrderKind, header_key: &str) -> RepositoryResult<bool> {
        Ok(self.count_by_key(kind, header_key)? > 0)
    }

    pub fn count_by_key(&self, kind: OrderKind, header_key: &str) -> RepositoryResult<i64> {
        self.store.run("order.count_by_key", |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM inventory_order WHERE order_kind = ?1 AND header_key = ?2",
                params![kind.as_db_str(), header_key],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// 事务内写入订单头与全部明细
    ///
    /// # 返回
    /// - Ok(order_id): 新订单主键
    /// - Err(UniqueConstraintViolation): 同类型同 header_key 已存在（并发竞争的失败方）
    /// - Err(LineInsertFailed): 某一行写入失败，事务已回滚
    pub fn create_with_lines(
        &self,
        kind: OrderKind,
        header_key: &str,
        created_at: NaiveDateTime,
        lines: &[NewOrderLine],
    ) -> RepositoryResult<i64> {
        let created_at = created_at.format(DATETIME_FORMAT).to_string();

        self.store.run("order.create_with_lines", |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO inventory_order (order_kind, header_key, created_at) VALUES (?1, ?2, ?3)",
                params![kind.as_db_str(), header_key, created_at],
            )?;
            let order_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO inventory_order_item (order_id, line_no, sku, name, barcode, quantity)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )?;

                for (idx, line) in lines.iter().enumerate() {
                    let result = stmt.execute(params![
                        order_id,
                        (idx + 1) as i64,
                        line.sku,
                        line.name,
                        line.barcode,
                        line.quantity,
                    ]);

                    if let Err(e) = result {
                        let err = RepositoryError::from(e);
                        if err.is_transient() {
                            return Err(err);
                        }
                        tracing::error!(
                            order_kind = kind.as_db_str(),
                            header_key,
                            sku = %line.sku,
                            error = %err,
                            "订单明细写入失败，事务回滚"
                        );
                        return Err(RepositoryError::LineInsertFailed {
                            sku: line.sku.clone(),
                            message: err.to_string(),
                        });
                    }
                }
            }

            tx.commit()?;
            Ok(order_id)
        })
    }

    /// 按 (kind, header_key) 查询订单（含明细）
    pub fn find_by_key(
        &self,
        kind: OrderKind,
        header_key: &str,
    ) -> RepositoryResult<Option<OrderHeader>> {
        self.store.run("order.find_by_key", |conn| {
            let header = conn
                .query_row(
                    r#"
                    SELECT order_id, header_key, created_at
                    FROM inventory_order
                    WHERE order_kind = ?1 AND header_key = ?2
                    "#,
                    params![kind.as_db_str(), header_key],
                    |row| {
                        let created_at: String = row.get(2)?;
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, created_at))
                    },
                )
                .optional()?;

            let Some((order_id, header_key, created_at)) = header else {
                return Ok(None);
            };

            let created_at = parse_datetime("inventory_order.created_at", &created_at)?;
            let lines = Self::load_lines(conn, order_id)?;

            Ok(Some(OrderHeader {
                order_id,
                kind,
                header_key,
                created_at,
                lines,
            }))
        })
    }

    fn load_lines(conn: &Connection, order_id: i64) -> RepositoryResult<Vec<OrderLine>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT item_id, line_no, sku, name, barcode, quantity
            FROM inventory_order_item
            WHERE order_id = ?1
            ORDER BY line_no
            "#,
        )?;

        let lines = stmt
            .query_map(params![order_id], |row| {
                Ok(OrderLine {
                    item_id: row.get(0)?,
                    line_no: row.get(1)?,
                    sku: row.get(2)?,
                    name: row.get(3)?,
                    barcode: row.get(4)?,
                    quantity: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lines)
    }
}

pub(crate) fn parse_datetime(field: &str, raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("无法解析时间 '{}': {}", raw, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::retry::RetryPolicy;
    use chrono::Local;

    fn repo() -> OrderRepository {
        let store = SqliteStore::open_in_memory(RetryPolicy::immediate(3)).unwrap();
        OrderRepository::new(Arc::new(store))
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    #[test]
    fn test_create_and_find() {
        let repo = repo();
        let lines = vec![
            NewOrderLine::new("SKU-A", "Alpha", "12345678", 3),
            NewOrderLine::new("SKU-B", "Beta", "87654321", 4),
        ];

        let order_id = repo
            .create_with_lines(OrderKind::Putaway, "TOTE01", now(), &lines)
            .unwrap();

        let order = repo.find_by_key(OrderKind::Putaway, "TOTE01").unwrap().unwrap();
        assert_eq!(order.order_id, order_id);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].sku, "SKU-A");
        assert_eq!(order.lines[1].line_no, 2);
        assert_eq!(order.total_quantity(), 7);

        assert!(repo.exists(OrderKind::Putaway, "TOTE01").unwrap());
        assert!(!repo.exists(OrderKind::BulkStorage, "TOTE01").unwrap());
    }

    #[test]
    fn test_duplicate_header_is_unique_violation() {
        let repo = repo();
        let lines = vec![NewOrderLine::new("SKU-A", "Alpha", "12345678", 1)];

        repo.create_with_lines(OrderKind::BulkStorage, "A-01", now(), &lines)
            .unwrap();
        let err = repo
            .create_with_lines(OrderKind::BulkStorage, "A-01", now(), &lines)
            .unwrap_err();

        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(repo.count_by_key(OrderKind::BulkStorage, "A-01").unwrap(), 1);
    }

    #[test]
    fn test_line_failure_rolls_back_header() {
        let repo = repo();
        // 同一订单内 SKU 重复触发明细唯一约束
        let lines = vec![
            NewOrderLine::new("SKU-A", "Alpha", "12345678", 1),
            NewOrderLine::new("SKU-A", "Alpha again", "12345678", 2),
        ];

        let err = repo
            .create_with_lines(OrderKind::Putaway, "TOTE02", now(), &lines)
            .unwrap_err();

        match err {
            RepositoryError::LineInsertFailed { sku, .. } => assert_eq!(sku, "SKU-A"),
            other => panic!("Expected LineInsertFailed, got {:?}", other),
        }
        assert!(repo.find_by_key(OrderKind::Putaway, "TOTE02").unwrap().is_none());
    }
}
