// ==========================================
// 仓储作业核心 - 应用状态
// ==========================================
// 职责: 装配共享连接、仓储、引擎接缝与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{OrderApi, ReplenishmentApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{
    InventoryMovementPublisher, OptionalMovementPublisher,
    PlaceholderStockChecker, StockChecker,
};
use crate::repository::{
    MovementOutboxRepository, OrderRepository, ReplenishmentRepository, RetryPolicy, SqliteStore,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 订单创建API
    pub order_api: Arc<OrderApi>,

    /// 补货拣货API
    pub replenishment_api: Arc<ReplenishmentApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 补货单仓储（导入与运维使用）
    pub replenishment_repo: Arc<ReplenishmentRepository>,

    /// 库存移动发件箱
    pub movement_outbox_repo: Arc<MovementOutboxRepository>,
}

impl AppState {
    /// 创建新的AppState实例（默认把库存移动通知写入发件箱）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_components(db_path, Arc::new(PlaceholderStockChecker), None)
    }

    /// 指定库存检查与通知发布实现创建 AppState
    ///
    /// publisher 为 None 时使用发件箱发布者。
    pub fn with_components(
        db_path: String,
        stock_checker: Arc<dyn StockChecker>,
        publisher: Option<Arc<dyn InventoryMovementPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // 重试策略本身来自配置：先用默认策略读取，再按读到的策略装配共享存储
        let bootstrap_config =
            ConfigManager::new(Arc::new(SqliteStore::new(conn.clone(), RetryPolicy::default())));
        let retry = match bootstrap_config.get_retry_policy() {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!("读取重试配置失败，使用默认值: {}", e);
                RetryPolicy::default()
            }
        };
        tracing::debug!(
            max_attempts = retry.max_attempts,
            base_delay_ms = retry.base_delay.as_millis() as u64,
            "存储重试策略"
        );

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let store = Arc::new(SqliteStore::new(conn, retry));
        let config_manager = Arc::new(ConfigManager::new(store.clone()));
        let order_repo = Arc::new(OrderRepository::new(store.clone()));
        let replenishment_repo = Arc::new(ReplenishmentRepository::new(store.clone()));
        let movement_outbox_repo = Arc::new(MovementOutboxRepository::new(store));

        // ==========================================
        // 初始化API层
        // ==========================================
        let movement_publisher = match publisher {
            Some(publisher) => OptionalMovementPublisher::with_publisher(publisher, retry),
            None => OptionalMovementPublisher::outbox(movement_outbox_repo.clone()),
        };

        let order_api = Arc::new(OrderApi::new(
            order_repo,
            config_manager.clone(),
            stock_checker.clone(),
        ));
        let replenishment_api = Arc::new(ReplenishmentApi::new(
            replenishment_repo.clone(),
            stock_checker,
            movement_publisher,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            order_api,
            replenishment_api,
            config_manager,
            replenishment_repo,
            movement_outbox_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 WAREHOUSE_OPS_DB > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("WAREHOUSE_OPS_DB") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./warehouse_ops.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("warehouse-ops");
        // 确保目录存在
        std::fs::create_dir_all(&dir).ok();
        path = dir.join("warehouse_ops.db");
    }

    path.to_string_lossy().to_string()
}
