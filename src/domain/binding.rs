// ==========================================
// 仓储库存同步系统 - 仓库绑定领域模型
// ==========================================
// 职责: 仓库 → (数据源, 拆分值) 绑定关系
// ==========================================

use crate::domain::types::{BindKey, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// SourceBinding - 单条绑定
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBinding {
    #[serde(rename = "type")]
    pub source_type: SourceType,      // 数据源类型
    pub split_value: Option<String>,  // 拆分值（未拆分的源为 None）
}

// ==========================================
// WarehouseBinding - 仓库绑定
// ==========================================
// source_bindings 的键为绑定键: "source_id" 或 "source_id::split_value"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseBinding {
    pub warehouse_code: String,
    pub source_bindings: HashMap<String, SourceBinding>,
    pub updated_at: DateTime<Utc>,
}

/// 绑定解析结果: 一个待接入的 (数据源, 拆分值) 对
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSource {
    pub source_id: String,
    pub source_type: SourceType,
    pub split_value: Option<String>,
}

impl WarehouseBinding {
    pub fn new(warehouse_code: &str) -> Self {
        WarehouseBinding {
            warehouse_code: warehouse_code.to_string(),
            source_bindings: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// 解析出指定类型的 (数据源, 拆分值) 对
    ///
    /// # 说明
    /// - 绑定键格式 "source_id::split_value"; 显式的 split_value 字段优先于键后缀
    /// - 类型不在 types 内的条目被跳过
    pub fn bound_sources(&self, types: &[SourceType]) -> Vec<BoundSource> {
        let mut out = Vec::new();
        for (key, binding) in &self.source_bindings {
            if !types.contains(&binding.source_type) {
                continue;
            }
            let parsed = BindKey::parse(key);
            let split_value = binding
                .split_value
                .clone()
                .or(parsed.split_value)
                .filter(|v| !v.trim().is_empty());
            out.push(BoundSource {
                source_id: parsed.source_id,
                source_type: binding.source_type,
                split_value,
            });
        }
        out
    }

    /// 本仓库绑定的 WMS (source_id, split_value) 对集合
    ///
    /// 用途: 货区库存同步时按 (source_id, split_key) 归属行
    pub fn wms_pairs(&self) -> Vec<(String, Option<String>)> {
        self.bound_sources(&[SourceType::Wms])
            .into_iter()
            .map(|b| (b.source_id, b.split_value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding_with(entries: &[(&str, SourceType, Option<&str>)]) -> WarehouseBinding {
        let mut b = WarehouseBinding::new("EA2-F");
        for (key, source_type, split) in entries {
            b.source_bindings.insert(
                key.to_string(),
                SourceBinding {
                    source_type: *source_type,
                    split_value: split.map(|s| s.to_string()),
                },
            );
        }
        b
    }

    #[test]
    fn test_bound_sources_parses_split_from_key() {
        let b = binding_with(&[("src-1::1000", SourceType::Wms, None)]);
        let bound = b.bound_sources(&[SourceType::Wms]);
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].source_id, "src-1");
        assert_eq!(bound[0].split_value, Some("1000".to_string()));
    }

    #[test]
    fn test_bound_sources_explicit_split_wins() {
        let b = binding_with(&[("src-1::1000", SourceType::Wms, Some("2000"))]);
        let bound = b.bound_sources(&[SourceType::Wms]);
        assert_eq!(bound[0].split_value, Some("2000".to_string()));
    }

    #[test]
    fn test_bound_sources_filters_types() {
        let b = binding_with(&[
            ("src-w", SourceType::Wms, None),
            ("src-s", SourceType::Sap, None),
        ]);
        let wms_only = b.bound_sources(&[SourceType::Wms]);
        assert_eq!(wms_only.len(), 1);
        assert_eq!(wms_only[0].source_id, "src-w");
    }
}
