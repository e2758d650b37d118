// ==========================================
// 仓储库存同步系统 - 缓存层
// ==========================================
// 红线: 缓存文档整体重算整体覆盖,禁止增量修补
// 职责: KV 文件存储、库区容量聚合、库存快照、看板指标
// 约束: 刷新失败只记告警,不得影响摄取结果
// ==========================================

pub mod dashboard;
pub mod error;
pub mod inventory_snapshot;
pub mod kv_store;
pub mod refresher;
pub mod zone_capacity;

// 重导出核心缓存组件
pub use dashboard::DashboardCache;
pub use error::{CacheError, CacheResult};
pub use inventory_snapshot::{InventorySnapshot, InventorySnapshotBuilder};
pub use kv_store::{JsonFileStore, KvStore};
pub use refresher::CacheRefresher;
pub use zone_capacity::{ZoneCapacityAggregator, ZONE_CAPACITIES_KEY};
