// ==========================================
// 仓储作业核心 - 订单创建 API
// ==========================================
// 覆盖: 入库上架（周转箱）/ 大件存储（库位）
// 流程: 校验 → 重复检查 → 库存检查 → 事务写入头与明细
// 红线: 不得留下没有明细的订单头
// ==========================================

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{validate_header_key, validate_order_lines};
use crate::config::{ConfigManager, OrderLimits};
use crate::domain::order::{OrderDraft, OrderHeader};
use crate::domain::types::OrderKind;
use crate::engine::stock::{StockCheckOutcome, StockCheckRequest, StockChecker};
use crate::perf::PerfGuard;
use crate::repository::error::RepositoryError;
use crate::repository::order_repo::OrderRepository;

// ==========================================
// OrderApi - 订单创建 API
// ==========================================

pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    config_manager: Arc<ConfigManager>,
    stock_checker: Arc<dyn StockChecker>,
}

impl OrderApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        config_manager: Arc<ConfigManager>,
        stock_checker: Arc<dyn StockChecker>,
    ) -> Self {
        Self {
            order_repo,
            config_manager,
            stock_checker,
        }
    }

    /// 创建订单（头 + 明细）
    ///
    /// # 参数
    /// - draft: 订单类型、周转箱号/库位、明细行、库存不足模拟开关
    ///
    /// # 返回
    /// - Ok(CreateOrderResponse): 创建成功
    /// - Err(InvalidInput / QuantityExceeded): 校验失败，未访问存储
    /// - Err(DuplicateKey): 同类型同键已有订单（含并发竞争失败）
    /// - Err(InsufficientStock): 库存检查不通过
    /// - Err(ItemInsertFailed): 某行明细写入失败，整单未创建
    /// - Err(StoreUnavailable): 存储不可用（已重试）
    pub fn create_order(&self, draft: OrderDraft) -> ApiResult<CreateOrderResponse> {
        let _perf = PerfGuard::new("order_api.create_order");
        let kind = draft.kind;
        let limits = self.order_limits(kind);

        // 1. 校验与规范化
        let header_key = validate_header_key(kind, &draft.header_key, &limits)?;
        let (lines, total_quantity) = validate_order_lines(kind, &draft.lines, &limits)?;

        tracing::info!(
            order_kind = kind.as_db_str(),
            header_key = %header_key,
            items_count = lines.len(),
            total_quantity,
            "开始创建订单"
        );

        // 2. 重复检查
        if self
            .order_repo
            .exists(kind, &header_key)
            .map_err(|e| ApiError::store("order.exists", e))?
        {
            tracing::warn!(order_kind = kind.as_db_str(), header_key = %header_key, "订单键重复");
            return Err(ApiError::DuplicateKey { kind, header_key });
        }

        // 3. 库存检查
        let stock_request = StockCheckRequest::order(
            kind,
            &header_key,
            &lines,
            draft.simulate_insufficient_stock,
        );
        if let StockCheckOutcome::Insufficient { reason } = self.stock_checker.check(&stock_request) {
            tracing::warn!(order_kind = kind.as_db_str(), header_key = %header_key, reason = %reason, "库存不足");
            return Err(ApiError::InsufficientStock(reason));
        }

        // 4. 事务写入
        let created_at = now_seconds();
        let order_id = match self
            .order_repo
            .create_with_lines(kind, &header_key, created_at, &lines)
        {
            Ok(id) => id,
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                tracing::warn!(
                    order_kind = kind.as_db_str(),
                    header_key = %header_key,
                    detail = %msg,
                    "并发创建同键订单，本次失败"
                );
                return Err(ApiError::DuplicateKey { kind, header_key });
            }
            Err(RepositoryError::LineInsertFailed { sku, .. }) => {
                return Err(ApiError::ItemInsertFailed { sku });
            }
            Err(e) => return Err(ApiError::store("order.create_with_lines", e)),
        };

        tracing::info!(
            order_id,
            order_kind = kind.as_db_str(),
            header_key = %header_key,
            items_processed = lines.len(),
            "订单创建成功"
        );

        Ok(CreateOrderResponse {
            status: "success".to_string(),
            message: format!(
                "{}订单创建成功: {}={}，共 {} 行",
                kind,
                kind.header_key_label(),
                header_key,
                lines.len()
            ),
            order_id,
            kind,
            header_key,
            items_processed: lines.len(),
            total_quantity,
            created_at,
        })
    }

    /// 按类型与键查询订单
    pub fn find_order(&self, kind: OrderKind, header_key: &str) -> ApiResult<Option<OrderHeader>> {
        let _perf = PerfGuard::new("order_api.find_order");
        let limits = self.order_limits(kind);
        let header_key = validate_header_key(kind, header_key, &limits)?;

        self.order_repo
            .find_by_key(kind, &header_key)
            .map_err(|e| ApiError::store("order.find_by_key", e))
    }

    fn order_limits(&self, kind: OrderKind) -> OrderLimits {
        match self.config_manager.get_order_limits(kind) {
            Ok(limits) => limits,
            Err(e) => {
                tracing::warn!(order_kind = kind.as_db_str(), error = %e, "读取订单上限配置失败，使用默认值");
                OrderLimits::defaults_for(kind)
            }
        }
    }
}

fn now_seconds() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

// ==========================================
// DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub status: String, // 固定 "success"
    pub message: String,
    pub order_id: i64,
    pub kind: OrderKind,
    pub header_key: String,
    pub items_processed: usize,
    pub total_quantity: i64,
    pub created_at: NaiveDateTime,
}
