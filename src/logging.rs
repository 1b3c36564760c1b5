// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=warehouse_ops=trace,perf=info
///
/// # 示例
/// ```no_run
/// use warehouse_ops::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init: 二进制与库调用方都可能已初始化过全局 subscriber
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .try_init();
}

/// 以 JSON 行格式初始化日志（供日志采集使用）
///
/// 由 `WAREHOUSE_OPS_LOG_FORMAT=json` 触发
pub fn init_json() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .try_init();
}

/// 按环境变量选择日志格式
pub fn init_from_env() {
    match std::env::var("WAREHOUSE_OPS_LOG_FORMAT") {
        Ok(v) if v.trim().eq_ignore_ascii_case("json") => init_json(),
        _ => init(),
    }
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
