// ==========================================
// 仓储库存同步系统 - 库区布局模型
// ==========================================
// 用途: 静态布局实体（库区/组件）与容量计算规则
// 红线: 布局是容量的唯一事实来源,库存不反向修改布局
// ==========================================

use crate::domain::types::ComponentType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==========================================
// Component - 库区组件（货架/平面堆放区）
// ==========================================
// 说明: rack 组件容量由层容量数组决定,flat 组件由 max_capacity 决定
// 对齐: zone_components 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    // ===== 标识 =====
    pub id: String,                 // 组件唯一标识
    #[serde(rename = "type")]
    pub component_type: ComponentType, // 组件类型（rack/flat）
    pub location: String,           // 组件库位标签（与 WMS 库位匹配的前缀）

    // ===== 平面几何 =====
    pub x: f64,                     // 画布 X 坐标
    pub y: f64,                     // 画布 Y 坐标
    pub rotation: f64,              // 旋转角度
    pub w: f64,                     // 宽度
    pub h: f64,                     // 高度
    pub rows: i64,                  // 行数
    pub cols: i64,                  // 列数

    // ===== rack 专属 =====
    pub floors: Option<i64>,            // 层数（回退容量公式用）
    pub numbering: Option<String>,      // 库位编号方案
    pub order_dir: Option<String>,      // 编号方向
    pub per_floor_locations: Option<Value>, // 每层库位明细（JSON,展示用）
    pub floor_capacities: Option<Vec<f64>>, // 每层容量（非空时为容量口径）

    // ===== flat 专属 =====
    pub max_capacity: Option<f64>,  // 平面区最大容量
}

impl Component {
    /// 组件有效容量。
    /// rack: 层容量数组非空取其和,否则 层数×行×列;
    /// flat: max_capacity 为正时取之,否则 行×列。
    /// 缺少几何信息时容量为 0,不报错。
    pub fn capacity(&self) -> f64 {
        match self.component_type {
            ComponentType::Rack => match &self.floor_capacities {
                Some(caps) if !caps.is_empty() => caps.iter().sum(),
                _ => {
                    let floors = self.floors.unwrap_or(0);
                    if floors > 0 && self.rows > 0 && self.cols > 0 {
                        (floors * self.rows * self.cols) as f64
                    } else {
                        0.0
                    }
                }
            },
            ComponentType::Flat => match self.max_capacity {
                Some(cap) if cap > 0.0 => cap,
                _ => {
                    if self.rows > 0 && self.cols > 0 {
                        (self.rows * self.cols) as f64
                    } else {
                        0.0
                    }
                }
            },
        }
    }

    /// 库位匹配口径: 去空格后大写
    pub fn normalized_location(&self) -> String {
        self.location.trim().to_uppercase()
    }
}

// ==========================================
// Zone - 库区
// ==========================================
// 对齐: zones 表 + zone_components 关联
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: String,                // 库区唯一标识
    pub zone_code: String,              // 库区代码（如 F-zone）
    pub zone_name: Option<String>,      // 库区名称
    pub warehouse_code: Option<String>, // 所属仓库代码
    pub grid: Option<Value>,            // 画布网格配置（展示用,原样透传）
    pub components: Vec<Component>,     // 组件列表
}

impl Zone {
    /// 库区总容量 = 各组件有效容量之和
    pub fn max_capacity(&self) -> f64 {
        self.components.iter().map(Component::capacity).sum()
    }

    /// 组件数量
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}
