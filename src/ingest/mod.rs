// ==========================================
// 仓储库存同步系统 - 摄取层
// ==========================================
// 职责: 外部表格数据摄取,生成内部库存行
// 支持: Excel (xlsx), CSV
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod column_rules;
pub mod error;
pub mod inventory_ingest_trait;
pub mod inventory_ingestor_impl;
pub mod row_normalizer;
pub mod sheet_fetcher;

// 重导出核心类型
pub use column_mapper::StandardColumnMapper;
pub use error::{IngestError, IngestResult};
pub use inventory_ingestor_impl::InventoryIngestorImpl;
pub use row_normalizer::SheetRowNormalizer;
pub use sheet_fetcher::{CsvSheetReader, ExcelSheetReader, FileSheetFetcher};

// 重导出 Trait 接口
pub use inventory_ingest_trait::{ColumnMapper, InventoryIngestor, RowNormalizer, SheetFetcher};
