// ==========================================
// 仓储库存同步系统 - 看板指标模型
// ==========================================
// 用途: 看板缓存文档（{cached_at, data}）的数据部分
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// InventoryStats - 库存总览指标
// ==========================================
// 口径: WMS 取可用数量,SAP 取 非限制+质检+冻结
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_quantity: f64,   // WMS + SAP 合计
    pub wms_quantity: f64,     // WMS 可用数量合计
    pub sap_quantity: f64,     // SAP 在库合计
    pub unique_items: i64,     // 物料编码去重数（WMS ∪ SAP）
    pub last_updated: DateTime<Utc>,
}

// ==========================================
// ZoneUtilizationEntry - 库区占用排行条目
// ==========================================
// 说明: 取自库区容量缓存,按占用率降序取前 10
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneUtilizationEntry {
    pub zone_id: String,
    pub zone_code: String,
    pub zone_name: Option<String>,
    pub current_quantity: i64,           // 在库条目数
    pub total_capacity: f64,             // 库区总容量
    pub utilization_percentage: f64,     // 占用率,封顶 100
    pub avg_component_utilization: f64,  // 组件占用率均值,2 位小数
    pub component_count: i64,
}

// ==========================================
// ExpiringItem - 临期物料条目
// ==========================================
// 说明: 有效期落在临期窗口内的 WMS 行,按剩余天数升序取前 20
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiringItem {
    pub item_code: String,
    pub location: Option<String>,
    pub quantity: f64,              // 可用数量,缺省按 0
    pub valid_date: NaiveDate,
    pub days_until_expiry: i64,     // 已过期按 0 计
}
