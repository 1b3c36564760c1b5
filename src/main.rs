// ==========================================
// 仓储作业核心 - 命令行入口
// ==========================================
// 用法:
//   warehouse-ops [db_path]
// 初始化数据库后输出当前未完成的补货单（JSON）
// ==========================================

use anyhow::Context;
use warehouse_ops::app::{get_default_db_path, AppState};

fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    warehouse_ops::logging::init_from_env();

    tracing::info!("==================================================");
    tracing::info!("{}", warehouse_ops::APP_NAME);
    tracing::info!("系统版本: {}", warehouse_ops::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = std::env::args()
        .nth(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    let active = app_state
        .replenishment_api
        .list_active_orders()
        .context("查询未完成补货单失败")?;
    let pending_movements = app_state.movement_outbox_repo.count_pending()?;

    tracing::info!(
        active_orders = active.count,
        pending_movements,
        "数据库就绪"
    );
    println!("{}", serde_json::to_string_pretty(&active)?);
    Ok(())
}
