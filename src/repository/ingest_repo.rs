// ==========================================
// 仓储库存同步系统 - 摄取 Repository Trait
// ==========================================
// 职责: 定义摄取链路的数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则,只做数据 CRUD
// ==========================================

use crate::domain::binding::WarehouseBinding;
use crate::domain::inventory::{CatalogEntry, RawRow};
use crate::domain::source::SheetSource;
use crate::domain::types::SourceType;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;

// ==========================================
// InventoryIngestRepository Trait
// ==========================================
// 用途: 表格来源、仓库绑定、原始行、物料目录的数据访问
// 实现者: InventoryIngestRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait InventoryIngestRepository: Send + Sync {
    // ===== 表格来源 =====

    /// 新增或覆盖表格来源（按 id 全量覆盖）
    async fn upsert_source(&self, source: &SheetSource) -> RepositoryResult<()>;

    /// 查询单个来源,不存在返回 None
    async fn get_source(&self, source_id: &str) -> RepositoryResult<Option<SheetSource>>;

    /// 列出来源,可按类型过滤
    ///
    /// # 参数
    /// - source_type: None 表示全部类型
    async fn list_sources(&self, source_type: Option<SourceType>)
        -> RepositoryResult<Vec<SheetSource>>;

    /// 删除来源,返回是否存在过
    async fn delete_source(&self, source_id: &str) -> RepositoryResult<bool>;

    // ===== 仓库绑定 =====

    /// 新增或覆盖仓库绑定（按 warehouse_code 全量覆盖）
    async fn upsert_binding(&self, binding: &WarehouseBinding) -> RepositoryResult<()>;

    /// 查询单个仓库的绑定,不存在返回 None
    async fn get_binding(&self, warehouse_code: &str)
        -> RepositoryResult<Option<WarehouseBinding>>;

    /// 列出全部仓库绑定
    async fn list_bindings(&self) -> RepositoryResult<Vec<WarehouseBinding>>;

    /// 删除绑定,返回是否存在过
    async fn delete_binding(&self, warehouse_code: &str) -> RepositoryResult<bool>;

    // ===== 原始行 =====

    /// 批量插入原始行（单事务,任一行失败整批回滚）
    ///
    /// # 返回
    /// - Ok(usize): 成功插入的行数
    /// - Err: 数据库错误（整个事务回滚）
    async fn insert_rows(&self, rows: &[RawRow]) -> RepositoryResult<usize>;

    /// 按来源类型清空原始行,返回删除行数
    async fn clear_rows(&self, source_type: SourceType) -> RepositoryResult<usize>;

    /// 全量扫描某类型的原始行（容量聚合/看板统计用）
    async fn scan_rows(&self, source_type: SourceType) -> RepositoryResult<Vec<RawRow>>;

    /// 分页查询某 (来源, 拆分值) 的原始行
    ///
    /// # 参数
    /// - split_value: None 表示该来源未拆分,返回全部行
    /// - limit/offset: 分页窗口
    async fn rows_for_pair(
        &self,
        source_id: &str,
        split_value: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> RepositoryResult<Vec<RawRow>>;

    /// 查询有效期不晚于 cutoff 的 WMS 行（临期看板用）
    async fn expiring_rows(&self, cutoff: NaiveDate) -> RepositoryResult<Vec<RawRow>>;

    /// 统计某批次已入库的行数
    async fn count_batch_rows(&self, batch_id: &str) -> RepositoryResult<usize>;

    // ===== 物料目录 =====

    /// 批量 upsert 物料目录（item_code 唯一,重复出现只刷新）
    async fn upsert_catalog_entries(&self, entries: &[CatalogEntry]) -> RepositoryResult<usize>;

    /// 查询单条目录记录
    async fn get_catalog_entry(&self, item_code: &str)
        -> RepositoryResult<Option<CatalogEntry>>;

    /// 列出全部目录记录（按 item_code 排序）
    async fn list_catalog(&self) -> RepositoryResult<Vec<CatalogEntry>>;
}
