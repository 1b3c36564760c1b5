// ==========================================
// 仓储作业核心 - 共享存储句柄
// ==========================================
// 职责: 持有唯一的 SQLite 连接，并把每次存储访问包在 RetryPolicy 里
// 约束: 每次尝试单独加锁，退避等待期间不持有连接锁
// ==========================================

use crate::db;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::retry::RetryPolicy;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    retry: RetryPolicy,
}

impl SqliteStore {
    pub fn new(conn: Arc<Mutex<Connection>>, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    /// 打开数据库文件并确保表结构存在
    pub fn open(db_path: &str, retry: RetryPolicy) -> RepositoryResult<Self> {
        let conn = db::open_sqlite_connection(db_path)?;
        db::ensure_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), retry))
    }

    /// 内存库（测试用）
    pub fn open_in_memory(retry: RetryPolicy) -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        db::configure_sqlite_connection(&conn)?;
        db::ensure_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), retry))
    }

    /// 以重试策略执行一次存储访问
    ///
    /// # 参数
    /// - operation: 操作名（日志与 StoreUnavailable 中使用）
    /// - f: 拿到连接后执行的读写；可能被调用多次，必须可重入
    pub fn run<T, F>(&self, operation: &str, mut f: F) -> RepositoryResult<T>
    where
        F: FnMut(&mut Connection) -> RepositoryResult<T>,
    {
        self.retry.run(operation, || {
            let mut conn = self
                .conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            f(&mut *conn)
        })
    }
}
