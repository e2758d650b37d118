// ==========================================
// 仓储库存同步系统 - 表格行规范化
// ==========================================
// 职责: 二维单元格数组 → 表头键控记录,按列名做类型矫正
// 红线: 单元格解析失败一律置 null,绝不补 0 或报错
// ==========================================

use crate::ingest::inventory_ingest_trait::RowNormalizer;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use std::collections::HashMap;

/// 按表头名识别的数值列（去千分位逗号后转 f64）
pub const NUMERIC_KEYS: &[&str] = &[
    "Tot. Qty.",
    "Available Qty.",
    "Exchg. Avlb. Qty.",
    "Exchg. Tot. Qty.",
    "Volume",
    "Weight",
    "Amount",
];

/// 按表头名识别的日期列（统一转 ISO 日期串）
pub const DATE_KEYS: &[&str] = &["Inb. Date", "Valid Date", "Prod. Date"];

/// 宽松日期解析: 先 ISO,再 MM/DD/YYYY
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").ok()
}

fn to_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', "").parse::<f64>().ok()
}

fn coerce_cell(header: &str, cell: Option<&str>) -> Value {
    if NUMERIC_KEYS.contains(&header) {
        return cell
            .and_then(to_number)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if DATE_KEYS.contains(&header) {
        return cell
            .and_then(parse_flexible_date)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null);
    }
    match cell {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        None => Value::Null,
    }
}

// ==========================================
// SheetRowNormalizer
// ==========================================
pub struct SheetRowNormalizer;

impl RowNormalizer for SheetRowNormalizer {
    /// 二维数组 → 记录序列（首行为表头,全空白行丢弃）
    ///
    /// # 说明
    /// - 行短于表头时缺失单元格记 null
    /// - 输出保持行序,一次性物化为 Vec
    fn normalize(&self, values: &[Vec<Option<String>>]) -> Vec<HashMap<String, Value>> {
        let Some(header_row) = values.first() else {
            return Vec::new();
        };
        if header_row.is_empty() {
            return Vec::new();
        }

        let headers: Vec<String> = header_row
            .iter()
            .map(|c| c.as_deref().unwrap_or("").trim().to_string())
            .collect();

        let mut records = Vec::new();
        for row in &values[1..] {
            let blank = row
                .iter()
                .all(|c| c.as_deref().map(str::trim).unwrap_or("").is_empty());
            if blank {
                continue;
            }

            let mut record = HashMap::with_capacity(headers.len());
            for (idx, header) in headers.iter().enumerate() {
                let cell = row.get(idx).and_then(|c| c.as_deref());
                record.insert(header.clone(), coerce_cell(header, cell));
            }
            records.push(record);
        }
        records
    }
}
