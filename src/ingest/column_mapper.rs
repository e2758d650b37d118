// ==========================================
// 仓储库存同步系统 - 列映射器实现
// ==========================================
// 职责: 规范化记录 → 规范列名记录 → RawRow 字段填充
// 规则: 按有序规则表逐条求值,表头一经消费不再参与后续规则
// ==========================================

use crate::domain::inventory::RawRow;
use crate::domain::source::ClassificationConfig;
use crate::domain::types::SourceType;
use crate::ingest::column_rules::{
    build_mapping_rules, clean_numeric_value, dictionary_target, normalize_column_name,
    HeaderMatcher, MappingTarget,
};
use crate::ingest::inventory_ingest_trait::ColumnMapper;
use crate::ingest::row_normalizer::parse_flexible_date;
use chrono::NaiveDate;
use serde_json::{Number, Value};
use std::collections::{HashMap, HashSet};

// ==========================================
// StandardColumnMapper
// ==========================================
pub struct StandardColumnMapper;

impl ColumnMapper for StandardColumnMapper {
    /// 规范化记录 → 规范列名记录
    ///
    /// # 说明
    /// - 分类规则在前,字典规则在后;未命中任何规则的表头静默丢弃
    /// - 表头按字典序扫描,大小写不敏感命中并列时结果确定
    fn map_record(
        &self,
        source_type: SourceType,
        classification: &ClassificationConfig,
        record: &HashMap<String, Value>,
    ) -> HashMap<String, Value> {
        let rules = build_mapping_rules(source_type, classification);
        let mut headers: Vec<&str> = record.keys().map(String::as_str).collect();
        headers.sort_unstable();

        let mut consumed: HashSet<&str> = HashSet::new();
        let mut mapped = HashMap::new();

        for rule in &rules {
            let Some(header) = rule.matcher.find(&headers, &consumed) else {
                continue;
            };
            consumed.insert(header);

            let target = match &rule.target {
                MappingTarget::Fixed(name) => (*name).to_string(),
                MappingTarget::NormalizedHeader => normalize_column_name(header),
            };

            if matches!(rule.matcher, HeaderMatcher::Flexible(_)) {
                if let Some(dict) = dictionary_target(source_type, header) {
                    if dict != target {
                        tracing::debug!(
                            header = header,
                            classification_target = %target,
                            dictionary_target = dict,
                            "分类目标与字典目标不一致,以分类为准"
                        );
                    }
                }
            }

            let value = record.get(header).cloned().unwrap_or(Value::Null);
            let value = if rule.clean_numeric {
                clean_numeric_value(&value)
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            } else {
                value
            };
            mapped.insert(target, value);
        }
        mapped
    }

    /// 从映射后记录提取拆分键
    ///
    /// # 说明
    /// - 键名取拆分列表头的规范化形式
    /// - 值去首尾空白;空串视为无拆分键（None）
    fn split_key(
        &self,
        classification: &ClassificationConfig,
        mapped: &HashMap<String, Value>,
    ) -> Option<String> {
        if !classification.split_enabled {
            return None;
        }
        let column = classification.split_by_column.as_deref()?;
        if column.trim().is_empty() {
            return None;
        }

        let normalized = normalize_column_name(column);
        match mapped.get(&normalized)? {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

// ==========================================
// RawRow 字段填充
// ==========================================

/// 规范列名记录写入 RawRow: 已建模字段提取为类型化值,其余进 extras
pub fn apply_mapped_columns(row: &mut RawRow, mapped: HashMap<String, Value>) {
    let mut columns = mapped;
    match row.source_type {
        SourceType::Wms => {
            row.item_code = take_string(&mut columns, "item_code");
            row.description = take_string(&mut columns, "description");
            row.unit = take_string(&mut columns, "unit");
            row.zone_code = take_string(&mut columns, "zone_cd")
                .or_else(|| take_string(&mut columns, "zone"));
            row.location = take_string(&mut columns, "cell_no");
            row.lot_key = take_string(&mut columns, "production_lot_no")
                .or_else(|| take_string(&mut columns, "lot_no"));
            row.available_qty = take_f64(&mut columns, "available_qty");
            row.total_qty = take_f64(&mut columns, "tot_qty");
            row.inbound_date = take_date(&mut columns, "inb_date");
            row.valid_date = take_date(&mut columns, "valid_date");
            row.production_date = take_date(&mut columns, "prod_date");
        }
        SourceType::Sap => {
            row.item_code = take_string(&mut columns, "material");
            row.description = take_string(&mut columns, "material_description");
            row.unit = take_string(&mut columns, "base_unit_of_measure");
            row.zone_code = take_string(&mut columns, "zone_cd")
                .or_else(|| take_string(&mut columns, "zone"));
            row.location = take_string(&mut columns, "storage_location");
            row.lot_key = take_string(&mut columns, "batch");
            row.unrestricted_qty = take_f64(&mut columns, "unrestricted_qty");
            row.quality_inspection_qty = take_f64(&mut columns, "quality_inspection_qty");
            row.blocked_qty = take_f64(&mut columns, "blocked_qty");
            row.returns_qty = take_f64(&mut columns, "returns_qty");
        }
    }

    for (column, value) in columns {
        row.extras.insert(column, value);
    }
}

fn take_string(columns: &mut HashMap<String, Value>, key: &str) -> Option<String> {
    match columns.remove(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn take_f64(columns: &mut HashMap<String, Value>, key: &str) -> Option<f64> {
    columns.remove(key).as_ref().and_then(clean_numeric_value)
}

fn take_date(columns: &mut HashMap<String, Value>, key: &str) -> Option<NaiveDate> {
    match columns.remove(key)? {
        Value::String(s) => parse_flexible_date(&s),
        _ => None,
    }
}
