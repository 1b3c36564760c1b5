// ==========================================
// 仓储作业核心 - 操作耗时与慢 SQL 统计
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PERF_DEPTH: Cell<u32> = Cell::new(0);
    static SQL_COUNT: Cell<u64> = Cell::new(0);
    static SLOW_SQL_COUNT: Cell<u64> = Cell::new(0);
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn truncate_sql(sql: &str, max_len: usize) -> String {
    let s = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s,
    }
}

/// 安装 SQLite 语句 profile（SQL 计数 + 慢查询日志）
///
/// 开关：
/// - Debug 默认开启；Release 默认关闭
/// - `WAREHOUSE_OPS_PERF_SQL=1` 强制开启
/// - `WAREHOUSE_OPS_SLOW_SQL_MS=50` 配置慢 SQL 阈值（毫秒）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = match std::env::var("WAREHOUSE_OPS_PERF_SQL") {
        Ok(v) => is_true(&v),
        Err(_) => cfg!(debug_assertions),
    };
    let slow_ms = std::env::var("WAREHOUSE_OPS_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });

    apply_sqlite_profile(conn, enabled, slow_ms);
}

// sqlite3_profile 会清掉 sqlite3_trace 的旧式 trace 位，两者不能同时安装；
// 语句计数与慢 SQL 都在 profile 回调里完成
fn apply_sqlite_profile(conn: &mut Connection, enabled: bool, slow_ms: u64) {
    PERF_SQL_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.profile(None);
        return;
    }

    SLOW_SQL_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);
    conn.profile(Some(sql_profile_callback));
}

fn sql_profile_callback(sql: &str, duration: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let in_guard = PERF_DEPTH.with(|d| d.get() > 0);
    if in_guard {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold > 0 && ms >= threshold {
        tracing::warn!(
            target: "slow_sql",
            duration_ms = ms,
            sql = %truncate_sql(sql, 420),
            "slow sql"
        );
        if in_guard {
            SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
        }
    }
}

/// 操作耗时 Guard：记录 elapsed_ms + SQL 语句数 + 慢 SQL 数
///
/// ```ignore
/// let _perf = warehouse_ops::perf::PerfGuard::new("replenishment.record_pick");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_start: u64,
    slow_sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }

    /// 本 Guard 创建以来当前线程执行的 SQL 语句数
    pub fn sql_count(&self) -> u64 {
        SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start)
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let sql_count = self.sql_count();
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            sql_count,
            slow_sql_count,
            "done"
        );

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
