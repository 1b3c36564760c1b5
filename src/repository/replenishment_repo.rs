// ==========================================
// 仓储作业核心 - 补货单仓储
// ==========================================
// 表: replen_orders / replen_order_items
// 并发: 所有状态写入都是 compare-and-set（WHERE ro_status = 期望状态），
//       影响行数为 0 表示状态已被他人改变，由 API 层决定如何回应
// ==========================================

use crate::domain::replenishment::{ReplenishmentLine, ReplenishmentOrder};
use crate::domain::types::ReplenishmentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_repo::{parse_datetime, DATETIME_FORMAT};
use crate::repository::store::SqliteStore;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::sync::Arc;

// ==========================================
// 查询/写入载体
// ==========================================

/// 未完成补货单列表行
#[derive(Debug, Clone, Serialize)]
pub struct ActiveReplenishmentOrderRow {
    pub ro_id: String,
    pub created_at: NaiveDateTime,
    pub status: ReplenishmentStatus,
    pub destination: String,
    pub skus_in_order: i64,
}

/// 单行拣货写入
#[derive(Debug, Clone)]
pub struct PickWrite<'a> {
    pub ro_id: &'a str,
    pub sku: &'a str,
    pub rack_location: &'a str,
    pub quantity_picked: i64,
    pub note: Option<&'a str>,
}

/// 拣货写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickWriteOutcome {
    /// 已写入
    Applied,
    /// 订单状态已不是期望状态，未写入
    StatusChanged,
    /// 明细不存在，未写入
    LineMissing,
}

pub struct ReplenishmentRepository {
    store: Arc<SqliteStore>,
}

impl ReplenishmentRepository {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// 写入补货单（头 + 明细，同一事务）
    ///
    /// 补货单由上游系统生成，这里只服务于导入与测试数据准备。
    pub fn insert_order(&self, order: &ReplenishmentOrder) -> RepositoryResult<()> {
        let created_at = order.created_at.format(DATETIME_FORMAT).to_string();

        self.store.run("replenishment.insert_order", |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                r#"
                INSERT INTO replen_orders (ro_id, ro_date_created, ro_status, destination)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    order.ro_id,
                    created_at,
                    order.status.as_db_str(),
                    order.destination
                ],
            )?;

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO replen_order_items (ro_id, sku, rack_location, qty, qty_picked, note)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )?;
                for line in &order.lines {
                    stmt.execute(params![
                        order.ro_id,
                        line.sku,
                        line.rack_location,
                        line.quantity_requested,
                        line.quantity_picked,
                        line.note,
                    ])?;
                }
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// 查询补货单（头 + 明细）
    pub fn find_order(&self, ro_id: &str) -> RepositoryResult<Option<ReplenishmentOrder>> {
        self.store.run("replenishment.find_order", |conn| {
            let header = conn
                .query_row(
                    r#"
                    SELECT ro_id, ro_date_created, ro_status, destination
                    FROM replen_orders
                    WHERE ro_id = ?1
                    "#,
                    params![ro_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((ro_id, created_at, status, destination)) = header else {
                return Ok(None);
            };

            let lines = Self::load_lines(conn, &ro_id)?;
            Ok(Some(ReplenishmentOrder {
                created_at: parse_datetime("replen_orders.ro_date_created", &created_at)?,
                status: parse_status(&status)?,
                ro_id,
                destination,
                lines,
            }))
        })
    }

    /// 仅查询状态
    pub fn find_status(&self, ro_id: &str) -> RepositoryResult<Option<ReplenishmentStatus>> {
        self.store.run("replenishment.find_status", |conn| {
            let status: Option<String> = conn
                .query_row(
                    "SELECT ro_status FROM replen_orders WHERE ro_id = ?1",
                    params![ro_id],
                    |row| row.get(0),
                )
                .optional()?;

            status.as_deref().map(parse_status).transpose()
        })
    }

    /// 所有未完成补货单，按创建时间倒序
    pub fn list_active(&self) -> RepositoryResult<Vec<ActiveReplenishmentOrderRow>> {
        self.store.run("replenishment.list_active", |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT ro.ro_id, ro.ro_date_created, ro.ro_status, ro.destination,
                       COUNT(roi.sku) AS skus_in_order
                FROM replen_orders ro
                LEFT JOIN replen_order_items roi ON ro.ro_id = roi.ro_id
                WHERE ro.ro_status <> ?1
                GROUP BY ro.ro_id, ro.ro_date_created, ro.ro_status, ro.destination
                ORDER BY ro.ro_date_created DESC, ro.ro_id
                "#,
            )?;

            let raw_rows = stmt
                .query_map(params![ReplenishmentStatus::Completed.as_db_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            raw_rows
                .into_iter()
                .map(|(ro_id, created_at, status, destination, skus_in_order)| -> RepositoryResult<_> {
                    Ok(ActiveReplenishmentOrderRow {
                        created_at: parse_datetime("replen_orders.ro_date_created", &created_at)?,
                        status: parse_status(&status)?,
                        ro_id,
                        destination,
                        skus_in_order,
                    })
                })
                .collect()
        })
    }

    /// 状态 compare-and-set
    ///
    /// # 返回
    /// - true: 状态已从 expected 改为 next
    /// - false: 当前状态不是 expected（或订单不存在），未修改
    pub fn compare_and_set_status(
        &self,
        ro_id: &str,
        expected: ReplenishmentStatus,
        next: ReplenishmentStatus,
    ) -> RepositoryResult<bool> {
        self.store.run("replenishment.compare_and_set_status", |conn| {
            let rows = conn.execute(
                "UPDATE replen_orders SET ro_status = ?1 WHERE ro_id = ?2 AND ro_status = ?3",
                params![next.as_db_str(), ro_id, expected.as_db_str()],
            )?;
            Ok(rows == 1)
        })
    }

    /// 写入单行拣货（含首次拣货触发的状态推进）
    ///
    /// 订单状态 CAS 与明细更新在同一事务内；note 为 None 时保留原备注。
    pub fn apply_pick(
        &self,
        pick: &PickWrite<'_>,
        expected: ReplenishmentStatus,
        next: ReplenishmentStatus,
    ) -> RepositoryResult<PickWriteOutcome> {
        self.store.run("replenishment.apply_pick", |conn| {
            let tx = conn.transaction()?;

            let header_rows = tx.execute(
                "UPDATE replen_orders SET ro_status = ?1 WHERE ro_id = ?2 AND ro_status = ?3",
                params![next.as_db_str(), pick.ro_id, expected.as_db_str()],
            )?;
            if header_rows == 0 {
                return Ok(PickWriteOutcome::StatusChanged);
            }

            let line_rows = tx.execute(
                r#"
                UPDATE replen_order_items
                SET qty_picked = ?1, note = COALESCE(?2, note)
                WHERE ro_id = ?3 AND sku = ?4 AND rack_location = ?5
                "#,
                params![
                    pick.quantity_picked,
                    pick.note,
                    pick.ro_id,
                    pick.sku,
                    pick.rack_location
                ],
            )?;
            if line_rows == 0 {
                return Ok(PickWriteOutcome::LineMissing);
            }

            tx.commit()?;
            Ok(PickWriteOutcome::Applied)
        })
    }

    /// 取消拣货：状态 CAS + 全部明细 qty_picked 清零（备注保留）
    ///
    /// # 返回
    /// - Some(n): 已重置，n 为明细行数
    /// - None: 当前状态不是 expected，未修改
    pub fn reset_picks(
        &self,
        ro_id: &str,
        expected: ReplenishmentStatus,
        next: ReplenishmentStatus,
    ) -> RepositoryResult<Option<usize>> {
        self.store.run("replenishment.reset_picks", |conn| {
            let tx = conn.transaction()?;

            let header_rows = tx.execute(
                "UPDATE replen_orders SET ro_status = ?1 WHERE ro_id = ?2 AND ro_status = ?3",
                params![next.as_db_str(), ro_id, expected.as_db_str()],
            )?;
            if header_rows == 0 {
                return Ok(None);
            }

            let reset = tx.execute(
                "UPDATE replen_order_items SET qty_picked = 0 WHERE ro_id = ?1",
                params![ro_id],
            )?;

            tx.commit()?;
            Ok(Some(reset))
        })
    }

    fn load_lines(conn: &Connection, ro_id: &str) -> RepositoryResult<Vec<ReplenishmentLine>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT sku, rack_location, qty, qty_picked, note
            FROM replen_order_items
            WHERE ro_id = ?1
            ORDER BY id
            "#,
        )?;

        let lines = stmt
            .query_map(params![ro_id], |row| {
                Ok(ReplenishmentLine {
                    sku: row.get(0)?,
                    rack_location: row.get(1)?,
                    quantity_requested: row.get(2)?,
                    quantity_picked: row.get(3)?,
                    note: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lines)
    }
}

fn parse_status(raw: &str) -> RepositoryResult<ReplenishmentStatus> {
    ReplenishmentStatus::from_db_str(raw).ok_or_else(|| RepositoryError::FieldValueError {
        field: "replen_orders.ro_status".to_string(),
        message: format!("未知状态: {}", raw),
    })
}
