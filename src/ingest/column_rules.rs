// ==========================================
// 仓储库存同步系统 - 列映射规则
// ==========================================
// 职责: 表头 → 规范列名的静态字典与分类规则编排
// 规则: 分类规则优先于字典规则;同一表头只被第一条命中规则消费
// 红线: 字典外的未知表头静默丢弃,不得让表格加列导致摄取失败
// ==========================================

use crate::domain::source::ClassificationConfig;
use crate::domain::types::SourceType;
use serde_json::Value;
use std::collections::HashSet;

// ==========================================
// 静态列字典（表头 → 规范列名）
// ==========================================

/// WMS 导出列字典
pub const WMS_COLUMN_MAP: &[(&str, &str)] = &[
    ("Item Code", "item_code"),
    ("Cell No.", "cell_no"),
    ("Production Lot No.", "production_lot_no"),
    ("Tot. Qty.", "tot_qty"),
    ("Inb. Date", "inb_date"),
    ("Valid Date", "valid_date"),
    ("ULD ID", "uld_id"),
    ("Source No.", "source_no"),
    ("Lot Attr. 5", "lot_attr_5"),
    ("Lot Attr. 6", "lot_attr_6"),
    ("Item Tcd", "item_tcd"),
    ("Item Gcd", "item_gcd"),
    ("Item Gcd Nm", "item_gcd_nm"),
    ("Item Status", "item_status"),
    ("Zone Cd", "zone_cd"),
    ("Exchg. Avlb. Qty", "exchg_avlb_qty"),
    ("Exchg. Tot. Qty.", "exchg_tot_qty"),
    ("Available Qty.", "available_qty"),
    ("Unit", "unit"),
    ("Exchg. Unit", "exchg_unit"),
    ("Prod. Date", "prod_date"),
    ("Volume", "volume"),
    ("Weight", "weight"),
    ("Amount", "amount"),
    ("Storer Nm", "storer_nm"),
    ("Alt. Code", "alt_code"),
    ("Comment", "comment"),
    ("Lot Attr. 1", "lot_attr_1"),
    ("Lot Attr. 2", "lot_attr_2"),
    ("Lot Attr. 3", "lot_attr_3"),
    ("Lot Attr. 4", "lot_attr_4"),
    ("W/H Item Type", "wh_item_type"),
    ("Item User Col3", "item_user_col3"),
    ("Item User Col4", "item_user_col4"),
    ("Item User Col5", "item_user_col5"),
    ("Desc", "description"),
    ("Lot No.", "lot_no"),
    ("Item Nm", "item_nm"),
    ("Supplier Code", "supplier_code"),
    ("BOE No.", "boe_no"),
];

/// SAP 导出列字典
pub const SAP_COLUMN_MAP: &[(&str, &str)] = &[
    ("Plant", "plant"),
    ("Storage location", "storage_location"),
    ("Material", "material"),
    ("Material Description", "material_description"),
    ("Batch", "batch"),
    ("Stock Segment", "stock_segment"),
    ("Unrestricted", "unrestricted_qty"),
    ("Quality Inspection", "quality_inspection_qty"),
    ("Blocked", "blocked_qty"),
    ("Returns", "returns_qty"),
    ("Transit and Transfer", "transit_and_transfer"),
    ("Base Unit of Measure", "base_unit_of_measure"),
    ("Value Unrestricted", "value_unrestricted"),
    ("Currency", "currency"),
    ("Stock in Transit", "stock_in_transit"),
    ("Name 1", "name_1"),
    ("Material type", "material_type"),
    ("Material Group", "material_group"),
    ("DF stor. loc. level", "df_stor_loc_level"),
    ("Restricted-Use Stock", "restricted_use_stock"),
    ("Valuated Goods Receipt Blocked Stock", "valuated_goods_receipt_blocked_stock"),
    ("Tied Empties", "tied_empties"),
    ("In transfer (plant)", "in_transfer_plant"),
    ("Val. in Trans./Tfr", "val_in_trans_tfr"),
    ("Value Restricted", "value_restricted"),
    ("Val. GR Blocked St.", "val_gr_blocked_st"),
    ("Value in QualInsp.", "value_in_qualinsp"),
    ("Val. Tied Empties", "val_tied_empties"),
    ("Value BlockedStock", "value_blockedstock"),
    ("Value Rets Blocked", "value_rets_blocked"),
    ("Value in Transit", "value_in_transit"),
    ("Value in Stock Tfr", "value_in_stock_tfr"),
];

/// 需要去千分位并转数值的 WMS 规范列
pub const WMS_NUMERIC_COLUMNS: &[&str] = &[
    "tot_qty",
    "exchg_avlb_qty",
    "exchg_tot_qty",
    "available_qty",
    "volume",
    "weight",
    "amount",
];

/// 需要去千分位并转数值的 SAP 规范列
pub const SAP_NUMERIC_COLUMNS: &[&str] = &[
    "unrestricted_qty",
    "quality_inspection_qty",
    "blocked_qty",
    "returns_qty",
    "transit_and_transfer",
    "value_unrestricted",
    "stock_in_transit",
    "restricted_use_stock",
    "valuated_goods_receipt_blocked_stock",
    "tied_empties",
    "in_transfer_plant",
    "val_in_trans_tfr",
    "value_restricted",
    "val_gr_blocked_st",
    "value_in_qualinsp",
    "val_tied_empties",
    "value_blockedstock",
    "value_rets_blocked",
    "value_in_transit",
    "value_in_stock_tfr",
];

/// 查字典: 表头的规范列名（精确匹配）
pub fn dictionary_target(source_type: SourceType, header: &str) -> Option<&'static str> {
    let map = match source_type {
        SourceType::Wms => WMS_COLUMN_MAP,
        SourceType::Sap => SAP_COLUMN_MAP,
    };
    map.iter().find(|(h, _)| *h == header).map(|(_, t)| *t)
}

/// 规范列是否为数值列（决定是否做数值清洗）
pub fn is_numeric_column(source_type: SourceType, column: &str) -> bool {
    match source_type {
        SourceType::Wms => WMS_NUMERIC_COLUMNS.contains(&column),
        SourceType::Sap => SAP_NUMERIC_COLUMNS.contains(&column),
    }
}

// ==========================================
// 表头规范化与数值清洗
// ==========================================

/// 表头 → 规范列名
///
/// # 规则
/// - 小写;空格与 / 换成下划线;去掉点和括号
/// - 只保留 [a-z0-9_];去首尾下划线;连续下划线折叠为一个
pub fn normalize_column_name(header: &str) -> String {
    let mut name = header.to_lowercase();
    name = name.replace(' ', "_").replace('/', "_");
    name = name.replace('.', "");
    name = name.replace('(', "").replace(')', "");
    name.retain(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    let trimmed = name.trim_matches('_');
    let mut out = String::with_capacity(trimmed.len());
    let mut prev_underscore = false;
    for c in trimmed.chars() {
        if c == '_' {
            if prev_underscore {
                continue;
            }
            prev_underscore = true;
        } else {
            prev_underscore = false;
        }
        out.push(c);
    }
    out
}

/// 数值清洗: 去千分位逗号后转 f64
///
/// # 说明
/// - 空串/null/解析失败 → None,绝不补 0
pub fn clean_numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.replace(',', "").parse::<f64>().ok()
        }
        _ => None,
    }
}

// ==========================================
// 有序映射规则
// ==========================================

/// 表头命中方式
#[derive(Debug, Clone)]
pub enum HeaderMatcher {
    /// 先精确命中,再大小写不敏感命中（分类规则用,表头名来自用户配置）
    Flexible(String),
    /// 仅精确命中（字典规则用）
    Exact(&'static str),
}

impl HeaderMatcher {
    /// 在尚未被占用的表头中寻找命中者
    ///
    /// # 说明
    /// - headers 需已排序,保证大小写不敏感命中在并列时结果确定
    pub fn find<'a>(&self, headers: &[&'a str], consumed: &HashSet<&str>) -> Option<&'a str> {
        match self {
            HeaderMatcher::Exact(name) => headers
                .iter()
                .copied()
                .find(|h| !consumed.contains(h) && h == name),
            HeaderMatcher::Flexible(name) => {
                if let Some(h) = headers
                    .iter()
                    .copied()
                    .find(|h| !consumed.contains(h) && *h == name.as_str())
                {
                    return Some(h);
                }
                let wanted = name.trim().to_lowercase();
                headers
                    .iter()
                    .copied()
                    .find(|h| !consumed.contains(h) && h.trim().to_lowercase() == wanted)
            }
        }
    }
}

/// 命中后的写入目标
#[derive(Debug, Clone)]
pub enum MappingTarget {
    /// 固定规范列名
    Fixed(&'static str),
    /// 规范列名取命中表头的规范化形式
    NormalizedHeader,
}

/// 一条映射规则: 命中方式 + 写入目标 + 是否数值清洗
#[derive(Debug, Clone)]
pub struct MappingRule {
    pub matcher: HeaderMatcher,
    pub target: MappingTarget,
    pub clean_numeric: bool,
}

impl MappingRule {
    fn flexible(name: &str, target: MappingTarget, clean_numeric: bool) -> Self {
        MappingRule {
            matcher: HeaderMatcher::Flexible(name.to_string()),
            target,
            clean_numeric,
        }
    }
}

/// 构建一次映射的有序规则表: 分类规则在前,字典规则在后
///
/// # 说明
/// - 分类角色未配置（None 或空白）不产生规则
/// - SAP 的 source_location/unrestricted 规则排在 location/qty 之后,
///   命中不同表头时以后写覆盖前写实现改写
pub fn build_mapping_rules(
    source_type: SourceType,
    classification: &ClassificationConfig,
) -> Vec<MappingRule> {
    let mut rules = Vec::new();
    fn configured(col: &Option<String>) -> Option<&str> {
        col.as_deref().filter(|s| !s.trim().is_empty())
    }

    match source_type {
        SourceType::Wms => {
            if let Some(col) = configured(&classification.zone_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::NormalizedHeader, false));
            }
            if let Some(col) = configured(&classification.location_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::Fixed("cell_no"), false));
            }
            if let Some(col) = configured(&classification.lot_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::NormalizedHeader, false));
            }
            if let Some(col) = configured(&classification.item_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::NormalizedHeader, false));
            }
            if let Some(col) = configured(&classification.qty_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::NormalizedHeader, true));
            }
        }
        SourceType::Sap => {
            if let Some(col) = configured(&classification.zone_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::NormalizedHeader, false));
            }
            if let Some(col) = configured(&classification.location_col) {
                rules.push(MappingRule::flexible(
                    col,
                    MappingTarget::Fixed("storage_location"),
                    false,
                ));
            }
            if let Some(col) = configured(&classification.lot_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::Fixed("batch"), false));
            }
            if let Some(col) = configured(&classification.item_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::Fixed("material"), false));
            }
            if let Some(col) = configured(&classification.qty_col) {
                rules.push(MappingRule::flexible(
                    col,
                    MappingTarget::Fixed("unrestricted_qty"),
                    true,
                ));
            }
            if let Some(col) = configured(&classification.blocked_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::Fixed("blocked_qty"), true));
            }
            if let Some(col) = configured(&classification.returns_col) {
                rules.push(MappingRule::flexible(col, MappingTarget::Fixed("returns_qty"), true));
            }
            if let Some(col) = configured(&classification.quality_inspection_col) {
                rules.push(MappingRule::flexible(
                    col,
                    MappingTarget::Fixed("quality_inspection_qty"),
                    true,
                ));
            }
            if let Some(col) = configured(&classification.source_location_col) {
                rules.push(MappingRule::flexible(
                    col,
                    MappingTarget::Fixed("storage_location"),
                    false,
                ));
            }
            if let Some(col) = configured(&classification.unrestricted_col) {
                rules.push(MappingRule::flexible(
                    col,
                    MappingTarget::Fixed("unrestricted_qty"),
                    true,
                ));
            }
        }
    }

    let dictionary = match source_type {
        SourceType::Wms => WMS_COLUMN_MAP,
        SourceType::Sap => SAP_COLUMN_MAP,
    };
    for (header, target) in dictionary {
        rules.push(MappingRule {
            matcher: HeaderMatcher::Exact(header),
            target: MappingTarget::Fixed(target),
            clean_numeric: is_numeric_column(source_type, target),
        });
    }

    rules
}
