// ==========================================
// 仓储库存同步系统 - 库存领域模型
// ==========================================
// 用途: 摄取管道产物与容量聚合的基础数据结构
// 红线: 规范化字段只在列映射层写入,下游只读
// ==========================================

use crate::domain::types::SourceType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ==========================================
// RawRow - 库存原始行
// ==========================================
// 用途: 列映射输出（表格行 → 规范化字段 → 此结构）
// 对齐: inventory_raw_rows 表
// 说明: 规范名之外的列保留在 extras,不丢弃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRow {
    // ===== 来源标识 =====
    pub source_id: String,             // 所属表格来源ID
    pub source_type: SourceType,       // 来源类型（wms/sap）
    pub split_key: Option<String>,     // 拆分键值（启用拆分时的该行取值）
    pub batch_id: String,              // 摄取批次ID（同批删除/追溯用）
    pub fetched_at: DateTime<Utc>,     // 抓取时间

    // ===== 物料标识 =====
    pub item_code: Option<String>,     // 物料编码（WMS item_code / SAP material）
    pub description: Option<String>,   // 物料描述
    pub unit: Option<String>,          // 计量单位

    // ===== 库位信息 =====
    pub zone_code: Option<String>,     // 库区代码
    pub location: Option<String>,      // 库位（WMS cell_no / SAP storage_location）
    pub lot_key: Option<String>,       // 批次键（WMS 生产批号 / SAP batch）

    // ===== 数量口径 =====
    pub available_qty: Option<f64>,        // 可用数量（WMS）
    pub total_qty: Option<f64>,            // 总数量（WMS）
    pub unrestricted_qty: Option<f64>,     // 非限制库存（SAP）
    pub quality_inspection_qty: Option<f64>, // 质检库存（SAP）
    pub blocked_qty: Option<f64>,          // 冻结库存（SAP）
    pub returns_qty: Option<f64>,          // 退货库存（SAP）

    // ===== 日期字段 =====
    pub inbound_date: Option<NaiveDate>,    // 入库日期（WMS）
    pub valid_date: Option<NaiveDate>,      // 有效期（WMS,临期计算依据）
    pub production_date: Option<NaiveDate>, // 生产日期（WMS）

    // ===== 其余映射字段 =====
    pub extras: Map<String, Value>, // 规范名之外的列（JSON 对象持久化）
}

impl RawRow {
    /// 构造空行,只带来源标记。规范化字段由列映射层填充。
    pub fn new(
        source_id: String,
        source_type: SourceType,
        batch_id: String,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        RawRow {
            source_id,
            source_type,
            split_key: None,
            batch_id,
            fetched_at,
            item_code: None,
            description: None,
            unit: None,
            zone_code: None,
            location: None,
            lot_key: None,
            available_qty: None,
            total_qty: None,
            unrestricted_qty: None,
            quality_inspection_qty: None,
            blocked_qty: None,
            returns_qty: None,
            inbound_date: None,
            valid_date: None,
            production_date: None,
            extras: Map::new(),
        }
    }

    /// 容量聚合口径: 可用数量优先,其次总数量,都缺省计 1 件
    pub fn stock_quantity(&self) -> f64 {
        self.available_qty
            .or(self.total_qty)
            .unwrap_or(1.0)
    }

    /// SAP 在库口径: 非限制 + 质检 + 冻结（退货不计入）
    pub fn sap_stock_quantity(&self) -> f64 {
        self.unrestricted_qty.unwrap_or(0.0)
            + self.quality_inspection_qty.unwrap_or(0.0)
            + self.blocked_qty.unwrap_or(0.0)
    }
}

// ==========================================
// MaterialInfo - 库位占用明细
// ==========================================
// 用途: 库区容量聚合的中间产物,挂在组件库位下
// 说明: 货架组件会改写 location 为组件位置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialInfo {
    pub location: String,          // 归一化库位（大写去空格）
    pub item_code: String,         // 物料编码
    pub lot_key: Option<String>,   // 批次键（无批次为 None）
    pub quantity: f64,             // 占用数量（stock_quantity 口径）
    pub source_id: String,         // 行来源ID
    pub split_key: Option<String>, // 行拆分键值
}

// ==========================================
// CatalogEntry - 物料目录条目
// ==========================================
// 用途: 摄取成功后按批次沉淀的物料主档
// 对齐: materials_catalog 表（item_code 唯一,upsert）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_code: String,            // 物料编码（唯一键）
    pub description: Option<String>,  // 物料描述
    pub unit: Option<String>,         // 计量单位
    pub source_system: SourceType,    // 最近一次出现的来源系统
    pub last_seen_at: DateTime<Utc>,  // 最近一次摄取见到的时间
}
