// 把上游系统导出的补货单 CSV 导入本地库。
//
// Usage:
//   cargo run --bin import_replenishment_orders -- <csv_path> [db_path]
//
// CSV 列: ro_id,destination,sku,rack_location,qty
// 同一 ro_id 的多行合并为一张补货单；库中已存在的 ro_id 跳过。

use anyhow::{bail, Context};
use chrono::Local;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use warehouse_ops::app::get_default_db_path;
use warehouse_ops::domain::{ReplenishmentLine, ReplenishmentOrder};
use warehouse_ops::repository::{ReplenishmentRepository, RetryPolicy, SqliteStore};

#[derive(Debug, Deserialize)]
struct CsvRow {
    ro_id: String,
    destination: String,
    sku: String,
    rack_location: String,
    qty: i64,
}

fn main() -> anyhow::Result<()> {
    warehouse_ops::logging::init();

    let mut args = std::env::args().skip(1);
    let Some(csv_path) = args.next() else {
        bail!("usage: import_replenishment_orders <csv_path> [db_path]");
    };
    let db_path = args.next().unwrap_or_else(get_default_db_path);

    let orders = read_orders(&csv_path)?;
    tracing::info!(csv_path = %csv_path, orders = orders.len(), "CSV 解析完成");

    let store = Arc::new(SqliteStore::open(&db_path, RetryPolicy::default())?);
    let repo = ReplenishmentRepository::new(store);

    let (mut imported, mut skipped) = (0usize, 0usize);
    for order in &orders {
        if repo.find_status(&order.ro_id)?.is_some() {
            tracing::warn!(ro_id = %order.ro_id, "补货单已存在，跳过");
            skipped += 1;
            continue;
        }
        repo.insert_order(order)
            .with_context(|| format!("写入补货单 {} 失败", order.ro_id))?;
        imported += 1;
    }

    println!("imported={} skipped={}", imported, skipped);
    Ok(())
}

fn read_orders(csv_path: &str) -> anyhow::Result<Vec<ReplenishmentOrder>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("无法打开 CSV: {}", csv_path))?;

    let created_at = Local::now().naive_local();
    let mut orders: Vec<ReplenishmentOrder> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (row_no, record) in reader.deserialize::<CsvRow>().enumerate() {
        let row = record.with_context(|| format!("第 {} 行格式错误", row_no + 2))?;
        if row.ro_id.is_empty() || row.sku.is_empty() || row.rack_location.is_empty() {
            bail!("第 {} 行缺少 ro_id/sku/rack_location", row_no + 2);
        }
        if row.qty <= 0 {
            bail!("第 {} 行 qty 必须为正整数", row_no + 2);
        }

        let line = ReplenishmentLine::new(
            row.sku.to_uppercase(),
            row.rack_location.to_uppercase(),
            row.qty,
        );
        match index.get(&row.ro_id) {
            Some(&i) => orders[i].lines.push(line),
            None => {
                index.insert(row.ro_id.clone(), orders.len());
                orders.push(ReplenishmentOrder::new(
                    row.ro_id,
                    row.destination,
                    created_at,
                    vec![line],
                ));
            }
        }
    }

    Ok(orders)
}
