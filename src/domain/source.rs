// ==========================================
// 仓储库存同步系统 - 数据源领域模型
// ==========================================
// 职责: 表格数据源及其列角色分类配置
// 用途: 配置层写入, 接入管道只读
// ==========================================

use crate::domain::types::SourceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ClassificationConfig - 列角色分类配置
// ==========================================
// 每个字段指定一个语义角色对应的表头名; None 表示该角色未配置。
// 匹配规则: 先精确匹配, 再大小写不敏感匹配（均先去首尾空白）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    // ===== 通用角色 =====
    pub item_col: Option<String>,     // 物料编码列
    pub lot_col: Option<String>,      // 批号列
    pub qty_col: Option<String>,      // 数量列
    pub zone_col: Option<String>,     // 货区列
    pub location_col: Option<String>, // 库位列

    // ===== 分库（split）配置 =====
    #[serde(default)]
    pub split_enabled: bool,              // 是否按列拆分多仓库
    pub split_by_column: Option<String>,  // 拆分依据列（表头名）

    // ===== SAP 专有角色 =====
    pub source_location_col: Option<String>,     // 来源库位列
    pub unrestricted_col: Option<String>,        // 非限制库存列
    pub quality_inspection_col: Option<String>,  // 质检库存列
    pub blocked_col: Option<String>,             // 冻结库存列
    pub returns_col: Option<String>,             // 退货库存列
}

// ==========================================
// SheetSource - 表格数据源
// ==========================================
// 一条库存数据馈送: 表格定位 + 工作表名 + 分类配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetSource {
    // ===== 主键 =====
    pub id: String, // 数据源唯一标识

    // ===== 基础信息 =====
    pub label: String,              // 展示名称
    pub source_type: SourceType,    // 数据源类型（wms/sap）
    pub spreadsheet_id: String,     // 表格定位符（文件路径）
    pub sheet_name: String,         // 工作表名（默认 Sheet1）

    // ===== 列分类 =====
    pub classification: ClassificationConfig,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl SheetSource {
    /// 默认工作表名
    pub const DEFAULT_SHEET_NAME: &'static str = "Sheet1";

    pub fn new(id: &str, label: &str, source_type: SourceType, spreadsheet_id: &str) -> Self {
        let now = Utc::now();
        SheetSource {
            id: id.to_string(),
            label: label.to_string(),
            source_type,
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: Self::DEFAULT_SHEET_NAME.to_string(),
            classification: ClassificationConfig::default(),
            created_at: now,
            updated_at: now,
            created_by: None,
        }
    }
}
