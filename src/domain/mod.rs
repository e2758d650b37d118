// ==========================================
// 仓储库存同步系统 - 领域模型层
// ==========================================
// 职责: 定义来源/绑定/库存/布局/容量缓存等领域实体与纯计算规则
// 红线: 不含数据访问逻辑,不含摄取编排逻辑
// ==========================================

pub mod binding;
pub mod capacity;
pub mod dashboard;
pub mod inventory;
pub mod layout;
pub mod report;
pub mod source;
pub mod types;

// 重导出核心类型
pub use binding::{BoundSource, SourceBinding, WarehouseBinding};
pub use capacity::{
    CachedDisplayData, ComponentCapacity, ComponentDisplayInfo, LotDistributionInfo,
    MaterialSummaryInfo, ZoneCapacityInfo, ZoneCapacityResponse,
};
pub use dashboard::{ExpiringItem, InventoryStats, ZoneUtilizationEntry};
pub use inventory::{CatalogEntry, MaterialInfo, RawRow};
pub use layout::{Component, Zone};
pub use report::{HeaderPreview, IngestIssue, IngestReport, IssueKind, SourceOutcome, SplitValueInfo};
pub use source::{ClassificationConfig, SheetSource};
pub use types::{BindKey, ComponentType, SourceType};
