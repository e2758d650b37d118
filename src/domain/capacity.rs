// ==========================================
// 仓储库存同步系统 - 库区容量缓存模型
// ==========================================
// 用途: zone_capacities 缓存文档的结构与展示投影
// 红线: 缓存文档整体重算整体覆盖,禁止增量修补
// ==========================================

use crate::domain::inventory::MaterialInfo;
use crate::domain::layout::Component;
use crate::domain::types::ComponentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ==========================================
// ComponentCapacity - 组件容量与在库状态
// ==========================================
// 说明: max_capacity 为布局刷新时算好的有效容量（rack/flat 同口径）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCapacity {
    // ===== 布局快照 =====
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub location: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub w: f64,
    pub h: f64,
    pub rows: i64,
    pub cols: i64,
    pub floors: Option<i64>,
    pub numbering: Option<String>,
    pub order_dir: Option<String>,
    pub per_floor_locations: Option<Value>,
    pub floor_capacities: Option<Vec<f64>>,
    pub max_capacity: f64, // 有效容量（布局刷新时计算）

    // ===== 在库状态（同步时计算）=====
    pub current_stock: i64,            // 占用数 = 已匹配物料条目数
    pub utilization_percentage: f64,   // 占用率（容量 0 时恒为 0.0）
    #[serde(default)]
    pub materials: Vec<MaterialInfo>,  // 已匹配物料明细
}

impl ComponentCapacity {
    /// 从布局组件构造缓存条目,在库状态归零
    pub fn from_component(comp: &Component) -> Self {
        ComponentCapacity {
            id: comp.id.clone(),
            component_type: comp.component_type,
            location: comp.location.clone(),
            x: comp.x,
            y: comp.y,
            rotation: comp.rotation,
            w: comp.w,
            h: comp.h,
            rows: comp.rows,
            cols: comp.cols,
            floors: comp.floors,
            numbering: comp.numbering.clone(),
            order_dir: comp.order_dir.clone(),
            per_floor_locations: comp.per_floor_locations.clone(),
            floor_capacities: comp.floor_capacities.clone(),
            max_capacity: comp.capacity(),
            current_stock: 0,
            utilization_percentage: 0.0,
            materials: Vec::new(),
        }
    }

    /// 按 materials 重算占用数与占用率
    pub fn sync_stock(&mut self) {
        self.current_stock = self.materials.len() as i64;
        self.utilization_percentage = if self.max_capacity > 0.0 {
            (self.current_stock as f64 / self.max_capacity) * 100.0
        } else {
            0.0
        };
    }

    pub fn normalized_location(&self) -> String {
        self.location.trim().to_uppercase()
    }
}

// ==========================================
// ZoneCapacityInfo - 库区容量缓存条目
// ==========================================
// 对齐: KV 键 zone_capacities 下 zone_id → 本结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneCapacityInfo {
    pub zone_id: String,
    pub zone_code: String,
    pub zone_name: Option<String>,
    pub warehouse_code: Option<String>,
    pub grid: Option<Value>,

    pub max_capacity: f64,            // 库区总容量（组件容量之和）
    pub item_count: i64,              // 组件数量
    pub current_stock: i64,           // 在库条目总数（组件之和）
    pub utilization_percentage: f64,  // 库区占用率（容量 0 时恒为 0.0）

    pub components: Vec<ComponentCapacity>,
    #[serde(default)]
    pub cached_display_data: Option<CachedDisplayData>, // 预计算展示数据

    pub last_updated: DateTime<Utc>,       // 布局刷新时间
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,  // 在库同步时间
}

impl ZoneCapacityInfo {
    /// 按组件在库状态重算库区合计
    pub fn sync_totals(&mut self) {
        self.current_stock = self.components.iter().map(|c| c.current_stock).sum();
        self.utilization_percentage = if self.max_capacity > 0.0 {
            (self.current_stock as f64 / self.max_capacity) * 100.0
        } else {
            0.0
        };
    }

    /// 库区代码匹配变体: 大写、去连字符、连字符前缀
    pub fn zone_code_variations(&self) -> Vec<String> {
        let code = self.zone_code.trim();
        let upper = code.to_uppercase();
        let mut variations = vec![upper.replace('-', ""), upper.clone()];
        if let Some((prefix, _)) = code.split_once('-') {
            variations.push(prefix.to_uppercase());
        }
        variations.sort();
        variations.dedup();
        variations
    }
}

// ==========================================
// 展示投影结构
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotDistributionInfo {
    pub lot_key: Option<String>, // 无批次条目归入 None 桶
    pub quantity: f64,
    pub percentage: f64, // 占库区条目总数的比例,1 位小数
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSummaryInfo {
    pub item_code: String,
    pub total_quantity: f64,
    pub lots: Vec<String>, // 不含无批次桶
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDisplayInfo {
    pub id: String,
    pub location: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub max_capacity: f64,
    pub current_stock: i64,
    pub utilization_percentage: f64,
    pub materials: Vec<MaterialInfo>,
}

// ==========================================
// CachedDisplayData - 库区预计算展示数据
// ==========================================
// 说明: 由 project() 整体生成,调用前库区合计必须已是最新值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDisplayData {
    pub total_items: i64,
    pub unique_skus: i64,
    pub max_capacity: f64,
    pub current_stock: i64,
    pub utilization_percentage: f64,
    pub lot_distribution: Vec<LotDistributionInfo>,
    pub materials_summary: Vec<MaterialSummaryInfo>,
    pub components: Vec<ComponentDisplayInfo>,
}

impl CachedDisplayData {
    /// 对库区的全部已匹配物料做展示投影。
    /// 批次分布按批次键聚合数量,百分比以条目总数为分母;
    /// 物料汇总按物料编码聚合,批次列表剔除无批次桶。
    pub fn project(zone: &ZoneCapacityInfo) -> Self {
        let zone_materials: Vec<&MaterialInfo> = zone
            .components
            .iter()
            .flat_map(|c| c.materials.iter())
            .collect();

        let total_items = zone_materials.len() as i64;

        let unique_skus = zone_materials
            .iter()
            .filter(|m| !m.item_code.is_empty())
            .map(|m| m.item_code.as_str())
            .collect::<HashSet<_>>()
            .len() as i64;

        // 批次分布
        let mut lot_counts: BTreeMap<Option<String>, f64> = BTreeMap::new();
        for mat in &zone_materials {
            *lot_counts.entry(mat.lot_key.clone()).or_insert(0.0) += mat.quantity;
        }
        let mut lot_distribution: Vec<LotDistributionInfo> = lot_counts
            .into_iter()
            .map(|(lot_key, quantity)| {
                let percentage = if total_items > 0 {
                    quantity / total_items as f64 * 100.0
                } else {
                    0.0
                };
                LotDistributionInfo {
                    lot_key,
                    quantity,
                    percentage: (percentage * 10.0).round() / 10.0,
                }
            })
            .collect();
        lot_distribution.sort_by(|a, b| {
            b.quantity
                .partial_cmp(&a.quantity)
                .unwrap_or(Ordering::Equal)
        });

        // 物料汇总
        let mut material_counts: BTreeMap<String, f64> = BTreeMap::new();
        let mut material_lots: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for mat in &zone_materials {
            if mat.item_code.is_empty() {
                continue;
            }
            *material_counts.entry(mat.item_code.clone()).or_insert(0.0) += mat.quantity;
            if let Some(lot) = &mat.lot_key {
                material_lots
                    .entry(mat.item_code.clone())
                    .or_default()
                    .insert(lot.clone());
            }
        }
        let mut materials_summary: Vec<MaterialSummaryInfo> = material_counts
            .into_iter()
            .map(|(item_code, total_quantity)| {
                let lots = material_lots
                    .remove(&item_code)
                    .map(|set| set.into_iter().collect())
                    .unwrap_or_default();
                MaterialSummaryInfo {
                    item_code,
                    total_quantity,
                    lots,
                }
            })
            .collect();
        materials_summary.sort_by(|a, b| {
            b.total_quantity
                .partial_cmp(&a.total_quantity)
                .unwrap_or(Ordering::Equal)
        });

        let components = zone
            .components
            .iter()
            .map(|c| ComponentDisplayInfo {
                id: c.id.clone(),
                location: c.location.clone(),
                component_type: c.component_type,
                max_capacity: c.max_capacity,
                current_stock: c.materials.len() as i64,
                utilization_percentage: c.utilization_percentage,
                materials: c.materials.clone(),
            })
            .collect();

        CachedDisplayData {
            total_items,
            unique_skus,
            max_capacity: zone.max_capacity,
            current_stock: zone.current_stock,
            utilization_percentage: zone.utilization_percentage,
            lot_distribution,
            materials_summary,
            components,
        }
    }
}

// ==========================================
// ZoneCapacityResponse - 聚合读取结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneCapacityResponse {
    pub zones: Vec<ZoneCapacityInfo>, // 按占用率降序
    pub last_updated: Option<DateTime<Utc>>, // 所有库区中最新的刷新时间
}
