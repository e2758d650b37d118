// ==========================================
// 仓储库存同步系统 - 领域类型定义
// ==========================================
// 职责: 数据源类型 / 组件类型 / 绑定键等跨模块共享类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 数据源类型 (Source Type)
// ==========================================
// 序列化格式: 小写 (与数据库及缓存 JSON 一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Wms, // 仓库管理系统导出
    Sap, // SAP 库存导出
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Wms => write!(f, "wms"),
            SourceType::Sap => write!(f, "sap"),
        }
    }
}

impl SourceType {
    /// 从字符串解析数据源类型（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wms" => Some(SourceType::Wms),
            "sap" => Some(SourceType::Sap),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SourceType::Wms => "wms",
            SourceType::Sap => "sap",
        }
    }
}

// ==========================================
// 货区组件类型 (Component Type)
// ==========================================
// rack: 多层货架, 容量 = 层容量之和或 层数×行×列
// flat: 平置区, 容量 = max_capacity 或 行×列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Rack,
    Flat,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::Rack => write!(f, "rack"),
            ComponentType::Flat => write!(f, "flat"),
        }
    }
}

impl ComponentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rack" => Some(ComponentType::Rack),
            "flat" => Some(ComponentType::Flat),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ComponentType::Rack => "rack",
            ComponentType::Flat => "flat",
        }
    }
}

// ==========================================
// 绑定键 (Bind Key)
// ==========================================
// 仓库绑定条目的键: "source_id" 或 "source_id::split_value"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindKey {
    pub source_id: String,
    pub split_value: Option<String>,
}

impl BindKey {
    /// 解析绑定键
    ///
    /// # 说明
    /// - "abc::1000" → source_id=abc, split_value=Some("1000")
    /// - "abc" → source_id=abc, split_value=None
    /// - 只在第一个 "::" 处切分
    pub fn parse(key: &str) -> Self {
        match key.split_once("::") {
            Some((source_id, split_value)) => BindKey {
                source_id: source_id.to_string(),
                split_value: Some(split_value.to_string()),
            },
            None => BindKey {
                source_id: key.to_string(),
                split_value: None,
            },
        }
    }
}
