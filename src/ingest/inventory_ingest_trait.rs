// ==========================================
// 仓储库存同步系统 - 摄取管线接口定义
// ==========================================
// 管线: 抓取 → 行规范化 → 列映射 → 入库落库
// 各阶段以 trait 解耦,编排器通过组合注入具体实现
// ==========================================

use crate::domain::report::{HeaderPreview, IngestReport, SourceOutcome, SplitValueInfo};
use crate::domain::source::{ClassificationConfig, SheetSource};
use crate::domain::types::SourceType;
use crate::ingest::error::IngestResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

// ==========================================
// 表格抓取
// ==========================================

/// 表格数据抓取接口
///
/// # 说明
/// - 返回单元格矩阵,首行为表头行
/// - 空单元格为 None,本层不做行过滤与类型转换
#[async_trait]
pub trait SheetFetcher: Send + Sync {
    /// 抓取指定表格的全部单元格
    ///
    /// # 参数
    /// - `spreadsheet_id`: 表格标识（文件实现下即路径）
    /// - `sheet_name`: 工作表名（CSV 实现忽略此参数）
    async fn fetch(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> IngestResult<Vec<Vec<Option<String>>>>;
}

// ==========================================
// 行规范化
// ==========================================

/// 行规范化接口: 单元格矩阵 → 记录列表
///
/// # 说明
/// - 首行作表头,表头去首尾空白
/// - 整行为空的行丢弃;短行缺失单元格补 null
/// - 已知数值列与日期列做类型强转,失败置 null
pub trait RowNormalizer: Send + Sync {
    fn normalize(&self, values: &[Vec<Option<String>>]) -> Vec<HashMap<String, Value>>;
}

// ==========================================
// 列映射
// ==========================================

/// 列映射接口: 原始表头记录 → 规范列名记录
pub trait ColumnMapper: Send + Sync {
    /// 按来源类型与分类配置映射单条记录
    ///
    /// # 返回
    /// 规范列名到值的映射;未命中规则的表头不进入结果
    fn map_record(
        &self,
        source_type: SourceType,
        classification: &ClassificationConfig,
        record: &HashMap<String, Value>,
    ) -> HashMap<String, Value>;

    /// 从映射结果中提取拆分键
    ///
    /// # 返回
    /// 去空白后的拆分值;未启用拆分或值为空时 None
    fn split_key(
        &self,
        classification: &ClassificationConfig,
        mapped: &HashMap<String, Value>,
    ) -> Option<String>;
}

// ==========================================
// 摄取编排
// ==========================================

/// 库存摄取编排接口
#[async_trait]
pub trait InventoryIngestor: Send + Sync {
    /// 摄取单个数据源
    ///
    /// # 参数
    /// - `batch_id`: 本次摄取批次号,同批各源共用
    /// - `split_filter`: 指定时仅保留拆分键等于该值的行
    /// - `dry_run`: 只统计不落库
    ///
    /// # 返回
    /// 单源结果;抓取/解析失败折叠为 errors 文本,不向上抛错
    async fn ingest_source(
        &self,
        source: &SheetSource,
        batch_id: &str,
        split_filter: Option<&str>,
        dry_run: bool,
    ) -> SourceOutcome;

    /// 按仓库绑定摄取
    ///
    /// # 说明
    /// - 逐绑定条目解析数据源与拆分值,各任务并发执行
    /// - 任意单源失败不影响其余源,失败记入报告 errors
    /// - 摄取到 WMS 行且非演练模式时,串行刷新各缓存,刷新失败仅记告警
    async fn ingest_warehouse(
        &self,
        warehouse_code: &str,
        types: &[SourceType],
        dry_run: bool,
        batch_id: Option<String>,
    ) -> IngestReport;

    /// 全量摄取指定类型的所有数据源
    ///
    /// # 说明
    /// - 非演练模式先清空对应类型的既有行,清空失败直接返回错误
    /// - 不做拆分过滤,不触发缓存刷新
    async fn ingest_all_sources(
        &self,
        types: &[SourceType],
        dry_run: bool,
    ) -> IngestResult<IngestReport>;

    /// 预览数据源表头与数据行数
    async fn preview_headers(&self, source: &SheetSource) -> IngestResult<HeaderPreview>;

    /// 列出数据源中各拆分值及行数
    ///
    /// # 返回
    /// 按行数降序（行数相同按值升序）;无拆分键的行不计入
    async fn list_split_values(&self, source: &SheetSource) -> IngestResult<Vec<SplitValueInfo>>;
}
