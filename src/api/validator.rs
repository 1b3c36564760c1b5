// ==========================================
// 仓储作业核心 - 请求校验器
// ==========================================
// 职责: 订单创建、补货操作的输入校验与规范化（去空白、转大写）
// 约束: 校验全部在访问存储之前完成；失败返回 InvalidInput/QuantityExceeded
// ==========================================

use std::collections::HashSet;

use crate::api::error::{ApiError, ApiResult};
use crate::config::OrderLimits;
use crate::domain::order::NewOrderLine;
use crate::domain::types::OrderKind;

pub const MAX_SKU_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_RO_ID_LEN: usize = 50;
pub const MAX_RACK_LOCATION_LEN: usize = 30;
pub const MAX_NOTE_LEN: usize = 500;
pub const MAX_QUANTITY_PICKED: i64 = 1_000_000;

const TOTE_PREFIX: &str = "TOTE";
const TOTE_SUFFIX_MAX_LEN: usize = 15;
const BARCODE_MIN_DIGITS: usize = 8;
const BARCODE_MAX_DIGITS: usize = 14;
const BARCODE_NOT_AVAILABLE: &str = "NA";

// ==========================================
// 订单创建
// ==========================================

/// 校验并规范化订单头键（周转箱号 / 库位）
pub fn validate_header_key(kind: OrderKind, raw: &str, limits: &OrderLimits) -> ApiResult<String> {
    let label = kind.header_key_label();
    // 周转箱号区分大小写，按原样匹配；库位统一转大写
    let key = match kind {
        OrderKind::Putaway => raw.trim().to_string(),
        OrderKind::BulkStorage => raw.trim().to_uppercase(),
    };

    if key.is_empty() {
        return Err(ApiError::invalid("header_key", format!("{}不能为空", label)));
    }
    if key.chars().count() > limits.max_header_key_len {
        return Err(ApiError::invalid(
            "header_key",
            format!("{}长度不能超过 {} 个字符", label, limits.max_header_key_len),
        ));
    }

    match kind {
        OrderKind::Putaway => {
            let suffix = key.strip_prefix(TOTE_PREFIX).unwrap_or("");
            let valid = key.starts_with(TOTE_PREFIX)
                && !suffix.is_empty()
                && suffix.chars().count() <= TOTE_SUFFIX_MAX_LEN
                && suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
            if !valid {
                return Err(ApiError::invalid(
                    "header_key",
                    "周转箱号格式错误，应为 TOTE 开头并跟 1-15 位大写字母、数字或连字符",
                ));
            }
        }
        OrderKind::BulkStorage => {
            if key.chars().any(|c| c.is_control()) {
                return Err(ApiError::invalid("header_key", "库位包含非法字符"));
            }
        }
    }

    Ok(key)
}

/// 校验并规范化明细行，同时检查整单数量合计
///
/// # 返回
/// - Ok((lines, total)): 规范化后的明细与数量合计
pub fn validate_order_lines(
    kind: OrderKind,
    lines: &[NewOrderLine],
    limits: &OrderLimits,
) -> ApiResult<(Vec<NewOrderLine>, i64)> {
    if lines.is_empty() {
        return Err(ApiError::invalid("lines", "订单至少需要一行明细"));
    }
    if lines.len() > limits.max_lines {
        return Err(ApiError::invalid(
            "lines",
            format!("明细行数 {} 超过上限 {}", lines.len(), limits.max_lines),
        ));
    }

    let mut normalized = Vec::with_capacity(lines.len());
    let mut seen_skus = HashSet::new();
    let mut total: i64 = 0;

    for (idx, line) in lines.iter().enumerate() {
        let field = |name: &str| format!("lines[{}].{}", idx, name);

        let sku = validate_sku(&field("sku"), &line.sku, kind == OrderKind::BulkStorage)?;
        if !seen_skus.insert(sku.clone()) {
            return Err(ApiError::invalid(field("sku"), format!("SKU {} 在订单内重复", sku)));
        }

        let name = line.name.trim();
        if name.is_empty() {
            return Err(ApiError::invalid(field("name"), "商品名称不能为空"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::invalid(
                field("name"),
                format!("商品名称长度不能超过 {} 个字符", MAX_NAME_LEN),
            ));
        }

        let barcode = validate_barcode(&field("barcode"), kind, &line.barcode)?;

        if line.quantity <= 0 {
            return Err(ApiError::invalid(field("quantity"), "数量必须为正整数"));
        }
        if line.quantity > limits.max_line_quantity {
            return Err(ApiError::invalid(
                field("quantity"),
                format!("单行数量不能超过 {}", limits.max_line_quantity),
            ));
        }

        total = total.saturating_add(line.quantity);
        normalized.push(NewOrderLine {
            sku,
            name: name.to_string(),
            barcode,
            quantity: line.quantity,
        });
    }

    if total > limits.max_total_quantity {
        return Err(ApiError::QuantityExceeded {
            total,
            limit: limits.max_total_quantity,
        });
    }

    Ok((normalized, total))
}

/// SKU: 1-50 位字母、数字、连字符或下划线
pub fn validate_sku(field: &str, raw: &str, uppercase: bool) -> ApiResult<String> {
    let trimmed = raw.trim();
    let sku = if uppercase {
        trimmed.to_uppercase()
    } else {
        trimmed.to_string()
    };

    if sku.is_empty() || sku.chars().count() > MAX_SKU_LEN {
        return Err(ApiError::invalid(
            field,
            format!("SKU 长度必须在 1-{} 个字符之间", MAX_SKU_LEN),
        ));
    }
    if !sku.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ApiError::invalid(field, "SKU 只能包含字母、数字、连字符和下划线"));
    }
    Ok(sku)
}

fn validate_barcode(field: &str, kind: OrderKind, raw: &str) -> ApiResult<String> {
    let barcode = raw.trim();

    if kind == OrderKind::BulkStorage && barcode.eq_ignore_ascii_case(BARCODE_NOT_AVAILABLE) {
        return Ok(BARCODE_NOT_AVAILABLE.to_string());
    }

    let len = barcode.len();
    let all_digits = barcode.chars().all(|c| c.is_ascii_digit());
    if !all_digits || !(BARCODE_MIN_DIGITS..=BARCODE_MAX_DIGITS).contains(&len) {
        let hint = match kind {
            OrderKind::Putaway => "条码必须为 8-14 位数字",
            OrderKind::BulkStorage => "条码必须为 8-14 位数字或 NA",
        };
        return Err(ApiError::invalid(field, hint));
    }
    Ok(barcode.to_string())
}

// ==========================================
// 补货操作
// ==========================================

pub fn validate_ro_id(raw: &str) -> ApiResult<String> {
    let ro_id = raw.trim();
    if ro_id.is_empty() {
        return Err(ApiError::invalid("ro_id", "补货单号不能为空"));
    }
    if ro_id.chars().count() > MAX_RO_ID_LEN {
        return Err(ApiError::invalid(
            "ro_id",
            format!("补货单号长度不能超过 {} 个字符", MAX_RO_ID_LEN),
        ));
    }
    Ok(ro_id.to_string())
}

pub fn validate_rack_location(raw: &str) -> ApiResult<String> {
    let rack = raw.trim().to_uppercase();
    if rack.is_empty() {
        return Err(ApiError::invalid("rack_location", "货架位不能为空"));
    }
    if rack.chars().count() > MAX_RACK_LOCATION_LEN {
        return Err(ApiError::invalid(
            "rack_location",
            format!("货架位长度不能超过 {} 个字符", MAX_RACK_LOCATION_LEN),
        ));
    }
    Ok(rack)
}

/// 拣货数量允许 0（撤回该行），不做需求数量截断
pub fn validate_quantity_picked(quantity: i64) -> ApiResult<i64> {
    if !(0..=MAX_QUANTITY_PICKED).contains(&quantity) {
        return Err(ApiError::invalid(
            "quantity_picked",
            format!("拣货数量必须在 0-{} 之间", MAX_QUANTITY_PICKED),
        ));
    }
    Ok(quantity)
}

/// 备注: 去空白，空串视为未提供
pub fn validate_note(raw: Option<&str>) -> ApiResult<Option<String>> {
    let Some(note) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(ApiError::invalid(
            "note",
            format!("备注长度不能超过 {} 个字符", MAX_NOTE_LEN),
        ));
    }
    Ok(Some(note.to_string()))
}
