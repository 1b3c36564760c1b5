// ==========================================
// 仓储作业核心 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键必须逐连接开启）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等建表，测试与正式库共用同一份 DDL
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（明细行依赖 ON DELETE CASCADE）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 幂等建表
///
/// 表结构:
/// - inventory_order / inventory_order_item: 入库、大件存储订单（头 + 明细）
/// - replen_orders / replen_order_items: 补货单（头 + 明细）
/// - inventory_movement_outbox: 拣货后的库存移动通知
/// - config_kv: 全局配置
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS inventory_order (
            order_id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_kind TEXT NOT NULL,
            header_key TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (order_kind, header_key)
        );

        CREATE TABLE IF NOT EXISTS inventory_order_item (
            item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES inventory_order(order_id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            sku TEXT NOT NULL,
            name TEXT NOT NULL,
            barcode TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            UNIQUE (order_id, sku)
        );

        CREATE TABLE IF NOT EXISTS replen_orders (
            ro_id TEXT PRIMARY KEY,
            ro_date_created TEXT NOT NULL,
            ro_status TEXT NOT NULL DEFAULT 'Unassigned',
            destination TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS replen_order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ro_id TEXT NOT NULL REFERENCES replen_orders(ro_id) ON DELETE CASCADE,
            sku TEXT NOT NULL,
            rack_location TEXT NOT NULL,
            qty INTEGER NOT NULL CHECK (qty > 0),
            qty_picked INTEGER NOT NULL DEFAULT 0 CHECK (qty_picked >= 0),
            note TEXT,
            UNIQUE (ro_id, sku, rack_location)
        );

        CREATE INDEX IF NOT EXISTS idx_replen_orders_status
            ON replen_orders(ro_status, ro_date_created);

        CREATE TABLE IF NOT EXISTS inventory_movement_outbox (
            event_id TEXT PRIMARY KEY,
            ro_id TEXT NOT NULL,
            sku TEXT NOT NULL,
            rack_location TEXT NOT NULL,
            qty_picked INTEGER NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL,
            delivered INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_order_item_cascade_on_header_delete() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO inventory_order (order_kind, header_key, created_at) VALUES ('PUTAWAY', 'TOTE1', '2026-01-01 00:00:00')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO inventory_order_item (order_id, line_no, sku, name, barcode, quantity) VALUES (1, 1, 'A', 'a', '12345678', 1)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM inventory_order WHERE order_id = 1", []).unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM inventory_order_item", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
