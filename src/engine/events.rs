// ==========================================
// 仓储作业核心 - 库存移动通知
// ==========================================
// 职责: 定义拣货后的库存移动事件与发布 trait
// 语义: 尽力而为；拣货写入成功后才发布，发布失败不回滚拣货
// ==========================================

use crate::repository::movement_outbox_repo::{MovementOutboxEntity, MovementOutboxRepository};
use crate::repository::retry::RetryPolicy;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ==========================================
// 库存移动事件
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovementEvent {
    /// 事件 ID（重试时保持不变，供下游去重）
    pub event_id: String,
    pub ro_id: String,
    pub sku: String,
    pub rack_location: String,
    pub quantity_picked: i64,
    pub note: Option<String>,
    pub occurred_at: NaiveDateTime,
}

impl InventoryMovementEvent {
    /// 由一次拣货生成事件
    pub fn pick(
        ro_id: impl Into<String>,
        sku: impl Into<String>,
        rack_location: impl Into<String>,
        quantity_picked: i64,
        note: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            ro_id: ro_id.into(),
            sku: sku.into(),
            rack_location: rack_location.into(),
            quantity_picked,
            note,
            occurred_at: Local::now().naive_local(),
        }
    }
}

// ==========================================
// 发布 Trait
// ==========================================

/// 库存移动事件发布者
///
/// # 实现说明
/// - `MovementOutboxPublisher` 写入发件箱表，由下游库存系统消费
/// - 测试中可替换为记录型实现
pub trait InventoryMovementPublisher: Send + Sync {
    fn publish(&self, event: &InventoryMovementEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpMovementPublisher;

impl InventoryMovementPublisher for NoOpMovementPublisher {
    fn publish(&self, event: &InventoryMovementEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpMovementPublisher: 跳过事件发布 - ro_id={}, sku={}",
            event.ro_id,
            event.sku
        );
        Ok(())
    }
}

/// 可选的发布者包装，附带有界重试
pub struct OptionalMovementPublisher {
    inner: Option<Arc<dyn InventoryMovementPublisher>>,
    retry: RetryPolicy,
}

impl OptionalMovementPublisher {
    pub fn with_publisher(publisher: Arc<dyn InventoryMovementPublisher>, retry: RetryPolicy) -> Self {
        Self {
            inner: Some(publisher),
            retry,
        }
    }

    /// 发件箱发布者
    ///
    /// 写入发件箱本身经过存储层重试，这里只尝试一次，避免两层重试叠加。
    pub fn outbox(repo: Arc<MovementOutboxRepository>) -> Self {
        Self {
            inner: Some(Arc::new(MovementOutboxPublisher::new(repo))),
            retry: RetryPolicy::new(1, Duration::ZERO),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self {
            inner: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    /// 单个事件的最多发布尝试次数
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts.max(1)
    }

    /// 尽力发布：失败按策略重试，仍失败则记录日志后放弃
    ///
    /// # 返回
    /// - true: 已发布（或未配置发布者）
    /// - false: 重试耗尽，事件未送达
    pub fn publish_best_effort(&self, event: &InventoryMovementEvent) -> bool {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalMovementPublisher: 未配置发布者，跳过事件 - ro_id={}, sku={}",
                event.ro_id,
                event.sku
            );
            return true;
        };

        let max_attempts = self.max_attempts();
        for attempt in 1..=max_attempts {
            match publisher.publish(event) {
                Ok(()) => return true,
                Err(e) if attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        event_id = %event.event_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "库存移动通知发布失败，准备重试"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        event_id = %event.event_id,
                        ro_id = %event.ro_id,
                        sku = %event.sku,
                        attempts = attempt,
                        error = %e,
                        "库存移动通知发布失败，已放弃（拣货结果不受影响）"
                    );
                }
            }
        }
        false
    }
}

impl Default for OptionalMovementPublisher {
    fn default() -> Self {
        Self::none()
    }
}

// ==========================================
// 发件箱适配器
// ==========================================

/// 把事件写入 inventory_movement_outbox
pub struct MovementOutboxPublisher {
    repo: Arc<MovementOutboxRepository>,
}

impl MovementOutboxPublisher {
    pub fn new(repo: Arc<MovementOutboxRepository>) -> Self {
        Self { repo }
    }
}

impl InventoryMovementPublisher for MovementOutboxPublisher {
    fn publish(&self, event: &InventoryMovementEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        let entity = MovementOutboxEntity {
            event_id: event.event_id.clone(),
            ro_id: event.ro_id.clone(),
            sku: event.sku.clone(),
            rack_location: event.rack_location.clone(),
            qty_picked: event.quantity_picked,
            note: event.note.clone(),
            created_at: event.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            delivered: false,
        };
        self.repo.insert(&entity)?;

        tracing::debug!(
            "MovementOutboxPublisher: 事件已写入发件箱 - event_id={}, ro_id={}",
            event.event_id,
            event.ro_id
        );
        Ok(())
    }
}
