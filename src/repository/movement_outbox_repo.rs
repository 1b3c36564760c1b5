// ==========================================
// 仓储作业核心 - 库存移动通知发件箱
// ==========================================
// 表: inventory_movement_outbox
// 说明: 拣货成功后写入一条待投递记录，由下游库存系统消费后标记已投递
// ==========================================

use crate::repository::error::RepositoryResult;
use crate::repository::store::SqliteStore;
use rusqlite::params;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementOutboxEntity {
    pub event_id: String,
    pub ro_id: String,
    pub sku: String,
    pub rack_location: String,
    pub qty_picked: i64,
    pub note: Option<String>,
    pub created_at: String,
    pub delivered: bool,
}

pub struct MovementOutboxRepository {
    store: Arc<SqliteStore>,
}

impl MovementOutboxRepository {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// 写入待投递记录（event_id 重复时忽略，保证至少一次写入可重放）
    pub fn insert(&self, entity: &MovementOutboxEntity) -> RepositoryResult<()> {
        self.store.run("movement_outbox.insert", |conn| {
            conn.execute(
                r#"
                INSERT OR IGNORE INTO inventory_movement_outbox
                  (event_id, ro_id, sku, rack_location, qty_picked, note, created_at, delivered)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
                "#,
                params![
                    entity.event_id,
                    entity.ro_id,
                    entity.sku,
                    entity.rack_location,
                    entity.qty_picked,
                    entity.note,
                    entity.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_pending(&self, limit: usize) -> RepositoryResult<Vec<MovementOutboxEntity>> {
        self.store.run("movement_outbox.list_pending", |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT event_id, ro_id, sku, rack_location, qty_picked, note, created_at, delivered
                FROM inventory_movement_outbox
                WHERE delivered = 0
                ORDER BY created_at ASC, rowid ASC
                LIMIT ?1
                "#,
            )?;

            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    Ok(MovementOutboxEntity {
                        event_id: row.get(0)?,
                        ro_id: row.get(1)?,
                        sku: row.get(2)?,
                        rack_location: row.get(3)?,
                        qty_picked: row.get(4)?,
                        note: row.get(5)?,
                        created_at: row.get(6)?,
                        delivered: row.get::<_, i64>(7)? != 0,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// 标记已投递，返回是否命中
    pub fn mark_delivered(&self, event_id: &str) -> RepositoryResult<bool> {
        self.store.run("movement_outbox.mark_delivered", |conn| {
            let rows = conn.execute(
                "UPDATE inventory_movement_outbox SET delivered = 1 WHERE event_id = ?1",
                params![event_id],
            )?;
            Ok(rows > 0)
        })
    }

    pub fn count_pending(&self) -> RepositoryResult<i64> {
        self.store.run("movement_outbox.count_pending", |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM inventory_movement_outbox WHERE delivered = 0",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::retry::RetryPolicy;

    fn entity(event_id: &str) -> MovementOutboxEntity {
        MovementOutboxEntity {
            event_id: event_id.to_string(),
            ro_id: "RO-1".to_string(),
            sku: "SKU1".to_string(),
            rack_location: "R-01".to_string(),
            qty_picked: 3,
            note: None,
            created_at: "2026-03-01 10:00:00".to_string(),
            delivered: false,
        }
    }

    #[test]
    fn test_insert_is_idempotent_and_mark_delivered() {
        let store = SqliteStore::open_in_memory(RetryPolicy::immediate(1)).unwrap();
        let repo = MovementOutboxRepository::new(Arc::new(store));

        repo.insert(&entity("E1")).unwrap();
        repo.insert(&entity("E1")).unwrap();
        repo.insert(&entity("E2")).unwrap();
        assert_eq!(repo.count_pending().unwrap(), 2);

        assert!(repo.mark_delivered("E1").unwrap());
        assert!(!repo.mark_delivered("E404").unwrap());

        let pending = repo.list_pending(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_id, "E2");
    }
}
