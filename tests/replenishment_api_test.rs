// ==========================================
// 补货拣货 API 集成测试
// ==========================================
// 覆盖: 首次读取推进状态、拣货覆盖写、取消清零、完成判定与幂等、
//       状态守卫、未完成列表、库存移动通知、存储被锁时的重试耗尽
// ==========================================


#[cfg(test)]
mod replenishment_api_test {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use rusqlite::Connection;
    use warehouse_ops::api::{
        ApiError, CompletionOutcome, ErrorCategory, RecordPickRequest, ReplenishmentApi,
    };
    use warehouse_ops::engine::{OptionalMovementPublisher, PlaceholderStockChecker};
    use warehouse_ops::repository::{ReplenishmentRepository, RetryPolicy, SqliteStore};
    use warehouse_ops::ReplenishmentStatus;

    use crate::test_helpers::{ts, ApiTestEnv, RecordingPublisher};

    fn env_with_ro1() -> ApiTestEnv {
        let env = ApiTestEnv::new();
        env.seed_replenishment_order("RO-1", &[("SKU1", "R-01", 10), ("SKU2", "R-02", 5)]);
        env
    }

    fn status_of(env: &ApiTestEnv, ro_id: &str) -> ReplenishmentStatus {
        env.state
            .replenishment_repo
            .find_status(ro_id)
            .expect("查询状态失败")
            .expect("补货单不存在")
    }

    // ==========================================
    // RetrieveOrder
    // ==========================================

    #[test]
    fn test_retrieve_首次读取推进到_in_process() {
        let env = env_with_ro1();

        let first = env.replenishment_api().retrieve_order("RO-1").unwrap();
        assert!(first.status_changed);
        assert_eq!(first.previous_status, ReplenishmentStatus::Unassigned);
        assert_eq!(first.order.status, ReplenishmentStatus::InProcess);
        assert_eq!(first.order.lines.len(), 2);
        assert_eq!(first.order.total_count, 2);
        assert_eq!(status_of(&env, "RO-1"), ReplenishmentStatus::InProcess);

        let second = env.replenishment_api().retrieve_order(" RO-1 ").unwrap();
        assert!(!second.status_changed);
        assert_eq!(second.order.status, ReplenishmentStatus::InProcess);
    }

    #[test]
    fn test_retrieve_not_found() {
        let env = env_with_ro1();

        let err = env.replenishment_api().retrieve_order("RO-404").unwrap_err();
        assert_eq!(err.error_code(), "RO_NOT_FOUND");
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err = env.replenishment_api().retrieve_order("   ").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    // ==========================================
    // RecordPick
    // ==========================================

    #[test]
    fn test_record_pick_推进状态并覆盖写() {
        let env = env_with_ro1();

        let resp = env
            .replenishment_api()
            .record_pick(RecordPickRequest::new("RO-1", "sku1", "r-01", 4))
            .unwrap();
        assert_eq!(resp.sku, "SKU1");
        assert_eq!(resp.rack_location, "R-01");
        assert_eq!(resp.previous_status, ReplenishmentStatus::Unassigned);
        assert_eq!(resp.status, ReplenishmentStatus::InProcess);
        assert!(resp.status_changed);

        // 覆盖写，不累加
        let resp = env
            .replenishment_api()
            .record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 2))
            .unwrap();
        assert!(!resp.status_changed);
        assert_eq!(env.picked("RO-1", "SKU1", "R-01"), 2);
    }

    #[test]
    fn test_record_pick_超过需求数量不截断() {
        let env = env_with_ro1();

        let resp = env
            .replenishment_api()
            .record_pick(RecordPickRequest::new("RO-1", "SKU2", "R-02", 8))
            .unwrap();

        assert_eq!(resp.quantity_requested, 5);
        assert_eq!(resp.quantity_picked, 8);
        assert_eq!(env.picked("RO-1", "SKU2", "R-02"), 8);
    }

    #[test]
    fn test_record_pick_note_last_write_wins() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 1).with_note(" damaged box "))
            .unwrap();
        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 3))
            .unwrap();
        let order = api.retrieve_order("RO-1").unwrap().order;
        let line = order.lines.iter().find(|l| l.sku == "SKU1").unwrap();
        assert_eq!(line.note.as_deref(), Some("damaged box"));

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 3).with_note("recounted"))
            .unwrap();
        let order = api.retrieve_order("RO-1").unwrap().order;
        let line = order.lines.iter().find(|l| l.sku == "SKU1").unwrap();
        assert_eq!(line.note.as_deref(), Some("recounted"));
    }

    #[test]
    fn test_record_pick_line_not_found_状态不变() {
        let env = env_with_ro1();

        let err = env
            .replenishment_api()
            .record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-99", 1))
            .unwrap_err();

        match &err {
            ApiError::LineNotFound { ro_id, sku, rack_location } => {
                assert_eq!(ro_id, "RO-1");
                assert_eq!(sku, "SKU1");
                assert_eq!(rack_location, "R-99");
            }
            other => panic!("Expected LineNotFound, got {:?}", other),
        }
        assert_eq!(err.error_code(), "ITEM_NOT_FOUND");
        assert_eq!(status_of(&env, "RO-1"), ReplenishmentStatus::Unassigned);

        let err = env
            .replenishment_api()
            .record_pick(RecordPickRequest::new("RO-404", "SKU1", "R-01", 1))
            .unwrap_err();
        assert_eq!(err.error_code(), "RO_NOT_FOUND");
    }

    #[test]
    fn test_record_pick_insufficient_stock_不写入() {
        let env = env_with_ro1();

        let mut request = RecordPickRequest::new("RO-1", "SKU1", "R-01", 4);
        request.simulate_insufficient_stock = true;
        let err = env.replenishment_api().record_pick(request).unwrap_err();

        assert_eq!(err.error_code(), "INSUFFICIENT_STOCK");
        assert_eq!(env.picked("RO-1", "SKU1", "R-01"), 0);
        assert_eq!(status_of(&env, "RO-1"), ReplenishmentStatus::Unassigned);
        assert!(env.publisher.events().is_empty());
    }

    #[test]
    fn test_record_pick_negative_quantity_rejected() {
        let env = env_with_ro1();

        let err = env
            .replenishment_api()
            .record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", -1))
            .unwrap_err();
        assert_eq!(err.field(), Some("quantity_picked"));
    }

    #[test]
    fn test_record_pick_on_completed_rejected() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 10)).unwrap();
        api.record_pick(RecordPickRequest::new("RO-1", "SKU2", "R-02", 5)).unwrap();
        api.complete_order("RO-1").unwrap();

        let err = api
            .record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 1))
            .unwrap_err();
        assert_eq!(err.error_code(), "ORDER_ALREADY_COMPLETED");
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(env.picked("RO-1", "SKU1", "R-01"), 10);
    }

    // ==========================================
    // CancelPicking
    // ==========================================

    #[test]
    fn test_cancel_清零但不删除明细() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 6).with_note("keep me"))
            .unwrap();
        api.record_pick(RecordPickRequest::new("RO-1", "SKU2", "R-02", 5)).unwrap();

        let resp = api.cancel_picking("RO-1").unwrap();
        assert_eq!(resp.previous_status, ReplenishmentStatus::InProcess);
        assert_eq!(resp.new_status, ReplenishmentStatus::Unassigned);
        assert_eq!(resp.lines_reset, 2);

        let order = env.state.replenishment_repo.find_order("RO-1").unwrap().unwrap();
        assert_eq!(order.status, ReplenishmentStatus::Unassigned);
        assert_eq!(order.lines.len(), 2);
        assert!(order.lines.iter().all(|l| l.quantity_picked == 0));
        assert_eq!(order.lines[0].note.as_deref(), Some("keep me"));
    }

    #[test]
    fn test_cancel_guarded_by_status() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        // Unassigned
        let err = api.cancel_picking("RO-1").unwrap_err();
        match &err {
            ApiError::InvalidStatusForCancel { status, .. } => {
                assert_eq!(*status, ReplenishmentStatus::Unassigned)
            }
            other => panic!("Expected InvalidStatusForCancel, got {:?}", other),
        }
        assert_eq!(err.error_code(), "INVALID_STATUS_FOR_CANCEL");
        assert_eq!(status_of(&env, "RO-1"), ReplenishmentStatus::Unassigned);

        // Completed
        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 1)).unwrap();
        api.record_pick(RecordPickRequest::new("RO-1", "SKU2", "R-02", 1)).unwrap();
        api.complete_order("RO-1").unwrap();

        let err = api.cancel_picking("RO-1").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATUS_FOR_CANCEL");
        assert_eq!(status_of(&env, "RO-1"), ReplenishmentStatus::Completed);
        assert_eq!(env.picked("RO-1", "SKU1", "R-01"), 1);

        let err = api.cancel_picking("RO-404").unwrap_err();
        assert_eq!(err.error_code(), "RO_NOT_FOUND");
    }

    // ==========================================
    // CompleteOrder
    // ==========================================

    #[test]
    fn test_complete_touched_not_matched() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 1)).unwrap();
        api.record_pick(RecordPickRequest::new("RO-1", "SKU2", "R-02", 5)).unwrap();

        let resp = api.complete_order("RO-1").unwrap();
        assert_eq!(resp.outcome, CompletionOutcome::Completed);
        assert_eq!(resp.status, "success");
        assert_eq!(resp.previous_status, ReplenishmentStatus::InProcess);
        assert_eq!(resp.new_status, ReplenishmentStatus::Completed);
        assert_eq!((resp.picked_count, resp.total_count), (2, 2));
    }

    #[test]
    fn test_complete_warning_状态不变() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 10)).unwrap();

        let resp = api.complete_order("RO-1").unwrap();
        assert!(resp.is_warning());
        assert_eq!(resp.status, "warning");
        assert_eq!((resp.picked_count, resp.total_count), (1, 2));
        assert_eq!(resp.new_status, ReplenishmentStatus::InProcess);
        assert_eq!(status_of(&env, "RO-1"), ReplenishmentStatus::InProcess);
    }

    #[test]
    fn test_complete_idempotent() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 10)).unwrap();
        api.record_pick(RecordPickRequest::new("RO-1", "SKU2", "R-02", 5)).unwrap();

        let first = api.complete_order("RO-1").unwrap();
        let second = api.complete_order("RO-1").unwrap();

        assert_eq!(first.outcome, CompletionOutcome::Completed);
        assert_eq!(second.outcome, CompletionOutcome::AlreadyCompleted);
        assert_eq!(second.status, "success");
        assert_eq!(second.new_status, ReplenishmentStatus::Completed);
        assert_eq!(status_of(&env, "RO-1"), ReplenishmentStatus::Completed);
        assert_eq!(env.picked("RO-1", "SKU1", "R-01"), 10);
    }

    #[test]
    fn test_complete_not_found() {
        let env = env_with_ro1();
        let err = env.replenishment_api().complete_order("RO-404").unwrap_err();
        assert_eq!(err.error_code(), "RO_NOT_FOUND");
    }

    #[test]
    fn test_retrieve_completed_order_stays_completed() {
        let env = env_with_ro1();
        let api = env.replenishment_api();

        api.record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 1)).unwrap();
        api.record_pick(RecordPickRequest::new("RO-1", "SKU2", "R-02", 1)).unwrap();
        api.complete_order("RO-1").unwrap();

        let resp = api.retrieve_order("RO-1").unwrap();
        assert!(!resp.status_changed);
        assert_eq!(resp.order.status, ReplenishmentStatus::Completed);
    }

    // ==========================================
    // ListActive
    // ==========================================

    #[test]
    fn test_list_active_newest_first_excludes_completed() {
        let env = ApiTestEnv::new();
        env.seed_replenishment_order_at("RO-OLD", ts(1, 8), &[("SKU1", "R-01", 1)]);
        env.seed_replenishment_order_at(
            "RO-NEW",
            ts(3, 8),
            &[("SKU1", "R-01", 1), ("SKU2", "R-02", 2), ("SKU2", "R-03", 2)],
        );
        env.seed_replenishment_order_at("RO-DONE", ts(2, 8), &[("SKU1", "R-01", 1)]);

        let api = env.replenishment_api();
        api.record_pick(RecordPickRequest::new("RO-DONE", "SKU1", "R-01", 1)).unwrap();
        api.complete_order("RO-DONE").unwrap();

        let active = api.list_active_orders().unwrap();
        assert_eq!(active.count, 2);
        assert_eq!(active.orders[0].ro_id, "RO-NEW");
        assert_eq!(active.orders[0].skus_in_order, 3);
        assert_eq!(active.orders[1].ro_id, "RO-OLD");
    }

    // ==========================================
    // 库存移动通知
    // ==========================================

    #[test]
    fn test_pick_publishes_movement_event() {
        let env = env_with_ro1();

        env.replenishment_api()
            .record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 7).with_note("ok"))
            .unwrap();

        let events = env.publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ro_id, "RO-1");
        assert_eq!(events[0].sku, "SKU1");
        assert_eq!(events[0].quantity_picked, 7);
        assert_eq!(events[0].note.as_deref(), Some("ok"));
    }

    #[test]
    fn test_notification_failure_does_not_fail_pick() {
        let publisher = Arc::new(RecordingPublisher::failing());
        let env = ApiTestEnv::with_publisher(publisher.clone());
        env.seed_replenishment_order("RO-1", &[("SKU1", "R-01", 10)]);

        let resp = env
            .replenishment_api()
            .record_pick(RecordPickRequest::new("RO-1", "SKU1", "R-01", 3))
            .expect("通知失败不应影响拣货");

        assert!(!resp.movement_notified);
        assert_eq!(publisher.attempts(), 3);
        assert_eq!(env.picked("RO-1", "SKU1", "R-01"), 3);
    }

    // ==========================================
    // 存储不可用
    // ==========================================

    /// 独立连接上的 API：busy_timeout 很短，重试不等待
    fn api_with_short_busy_timeout(db_path: &str) -> ReplenishmentApi {
        let conn = Connection::open(db_path).expect("打开数据库失败");
        conn.busy_timeout(Duration::from_millis(20)).unwrap();
        let store = Arc::new(SqliteStore::new(
            Arc::new(Mutex::new(conn)),
            RetryPolicy::immediate(3),
        ));
        ReplenishmentApi::new(
            Arc::new(ReplenishmentRepository::new(store)),
            Arc::new(PlaceholderStockChecker),
            OptionalMovementPublisher::none(),
        )
    }

    #[test]
    fn test_locked_store_returns_database_error() {
        let env = ApiTestEnv::new();
        env.seed_replenishment_order("RO-LOCK", &[("SKU1", "R-01", 1)]);
        let api = api_with_short_busy_timeout(&env.db_path);

        let locker = Connection::open(&env.db_path).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = api.retrieve_order("RO-LOCK").unwrap_err();
        assert!(matches!(err, ApiError::StoreUnavailable { .. }));
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert_eq!(err.category(), ErrorCategory::Dependency);
        assert!(!err.to_string().contains("locked"));

        locker.execute_batch("ROLLBACK").unwrap();

        // 锁释放后同一实例恢复正常，之前的失败没有改变状态
        assert_eq!(status_of(&env, "RO-LOCK"), ReplenishmentStatus::Unassigned);
        let resp = api.retrieve_order("RO-LOCK").expect("锁释放后读取失败");
        assert!(resp.status_changed);
    }
}
