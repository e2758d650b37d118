// ==========================================
// 仓储库存同步系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + 本地 JSON 缓存
// 系统定位: 多来源库存表格的统一摄取与聚合
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 摄取层 - 外部表格数据
pub mod ingest;

// 缓存层 - 容量聚合/快照/看板
pub mod cache;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 应用层 - 服务组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BindKey, ComponentType, SourceType};

// 领域实体
pub use domain::{
    CatalogEntry, ClassificationConfig, Component, HeaderPreview, IngestIssue, IngestReport,
    IssueKind, RawRow, SheetSource, SourceBinding, SourceOutcome, SplitValueInfo,
    WarehouseBinding, Zone, ZoneCapacityInfo, ZoneCapacityResponse,
};

// 摄取管线
pub use ingest::{
    FileSheetFetcher, IngestError, IngestResult, InventoryIngestor, InventoryIngestorImpl,
    SheetRowNormalizer, StandardColumnMapper,
};

// 缓存服务
pub use cache::{
    DashboardCache, InventorySnapshotBuilder, JsonFileStore, KvStore, ZoneCapacityAggregator,
};

// 应用状态
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓储库存同步系统";

// ==========================================
// 预编译检查
// ==========================================
