// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证同键并发创建只成功一次、并发拣货互不覆盖、
//       并发完成保持幂等
// ==========================================


#[cfg(test)]
mod concurrent_control_test {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use rusqlite::Connection;
    use warehouse_ops::api::{ApiError, CompletionOutcome, RecordPickRequest};
    use warehouse_ops::ReplenishmentStatus;

    use crate::test_helpers::{line, putaway_draft, ApiTestEnv};

    const THREADS: usize = 8;

    #[test]
    fn test_concurrent_create_same_tote_只成功一次() {
        let env = ApiTestEnv::new();
        let order_api = env.state.order_api.clone();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let order_api = order_api.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    order_api.create_order(putaway_draft(
                        "TOTE-RACE",
                        vec![line(&format!("SKU-{}", i), 1)],
                    ))
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("线程 panic"))
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(ApiError::DuplicateKey { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(duplicates, THREADS - 1);

        let conn = Connection::open(&env.db_path).unwrap();
        let headers: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM inventory_order WHERE header_key = 'TOTE-RACE'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(headers, 1);
    }

    #[test]
    fn test_concurrent_picks_on_different_lines() {
        let env = ApiTestEnv::new();
        let lines: Vec<(String, String)> = (0..THREADS)
            .map(|i| (format!("SKU{}", i), format!("R-{:02}", i)))
            .collect();
        let seed: Vec<(&str, &str, i64)> = lines
            .iter()
            .map(|(sku, rack)| (sku.as_str(), rack.as_str(), 5))
            .collect();
        env.seed_replenishment_order("RO-PAR", &seed);

        let api = env.state.replenishment_api.clone();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = lines
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, (sku, rack))| {
                let api = api.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    api.record_pick(RecordPickRequest::new("RO-PAR", sku, rack, (i + 1) as i64))
                })
            })
            .collect();

        for h in handles {
            h.join().expect("线程 panic").expect("并发拣货失败");
        }

        for (i, (sku, rack)) in lines.iter().enumerate() {
            assert_eq!(env.picked("RO-PAR", sku, rack), (i + 1) as i64);
        }

        let resp = api.complete_order("RO-PAR").unwrap();
        assert_eq!(resp.outcome, CompletionOutcome::Completed);
    }

    #[test]
    fn test_concurrent_complete_is_idempotent() {
        let env = ApiTestEnv::new();
        env.seed_replenishment_order("RO-C", &[("SKU1", "R-01", 1)]);
        let api = env.state.replenishment_api.clone();
        api.record_pick(RecordPickRequest::new("RO-C", "SKU1", "R-01", 1))
            .unwrap();

        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let api = api.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    api.complete_order("RO-C")
                })
            })
            .collect();

        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("线程 panic").expect("完成失败").outcome)
            .collect();

        assert_eq!(
            outcomes.iter().filter(|o| **o == CompletionOutcome::Completed).count(),
            1
        );
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, CompletionOutcome::Completed | CompletionOutcome::AlreadyCompleted)));

        let status = env
            .state
            .replenishment_repo
            .find_status("RO-C")
            .unwrap()
            .unwrap();
        assert_eq!(status, ReplenishmentStatus::Completed);
    }
}
