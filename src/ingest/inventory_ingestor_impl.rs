// ==========================================
// 仓储库存同步系统 - 库存摄取编排器实现
// ==========================================
// 职责: 整合摄取流程,从表格数据到数据库
// 流程: 抓取 → 行规范化 → 列映射 → 拆分过滤 → 批量落库 → 目录更新 → 缓存刷新
// ==========================================

use crate::cache::CacheRefresher;
use crate::config::SyncConfig;
use crate::domain::inventory::{CatalogEntry, RawRow};
use crate::domain::report::{
    HeaderPreview, IngestIssue, IngestReport, IssueKind, SourceOutcome, SplitValueInfo,
};
use crate::domain::source::SheetSource;
use crate::domain::types::SourceType;
use crate::ingest::column_mapper::apply_mapped_columns;
use crate::ingest::error::IngestResult;
use crate::ingest::inventory_ingest_trait::{
    ColumnMapper, InventoryIngestor, RowNormalizer, SheetFetcher,
};
use crate::repository::InventoryIngestRepository;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// InventoryIngestorImpl - 库存摄取编排器实现
// ==========================================
pub struct InventoryIngestorImpl {
    // 数据访问层
    repo: Arc<dyn InventoryIngestRepository>,

    // 配置读取器
    config: Arc<dyn SyncConfig>,

    // 管线组件
    fetcher: Box<dyn SheetFetcher>,
    normalizer: Box<dyn RowNormalizer>,
    mapper: Box<dyn ColumnMapper>,

    // 摄取完成后按序触发的缓存刷新器
    refreshers: Vec<Arc<dyn CacheRefresher>>,
}

impl InventoryIngestorImpl {
    /// 创建摄取编排器实例
    ///
    /// # 参数
    /// - repo: 摄取数据仓储
    /// - config: 配置读取器
    /// - fetcher: 表格抓取器
    /// - normalizer: 行规范化器
    /// - mapper: 列映射器
    pub fn new(
        repo: Arc<dyn InventoryIngestRepository>,
        config: Arc<dyn SyncConfig>,
        fetcher: Box<dyn SheetFetcher>,
        normalizer: Box<dyn RowNormalizer>,
        mapper: Box<dyn ColumnMapper>,
    ) -> Self {
        Self {
            repo,
            config,
            fetcher,
            normalizer,
            mapper,
            refreshers: Vec::new(),
        }
    }

    /// 注册摄取后缓存刷新器,按注册顺序执行
    pub fn register_refresher(&mut self, refresher: Arc<dyn CacheRefresher>) {
        self.refreshers.push(refresher);
    }

    /// 将规范化记录装配为 RawRow 列表
    ///
    /// # 说明
    /// - 拆分过滤在装配前执行,被过滤的行不占用插入批次
    /// - 无物料编码的行默认丢弃;保留模式下以 NO_MATERIAL_{序号} 占位
    fn prepare_rows(
        &self,
        source: &SheetSource,
        records: &[HashMap<String, Value>],
        batch_id: &str,
        split_filter: Option<&str>,
        keep_unidentified: bool,
    ) -> Vec<RawRow> {
        let fetched_at = Utc::now();
        let mut rows = Vec::new();
        let mut skipped_no_item = 0usize;

        for (index, record) in records.iter().enumerate() {
            let mapped = self
                .mapper
                .map_record(source.source_type, &source.classification, record);
            let split_key = self.mapper.split_key(&source.classification, &mapped);

            if let Some(filter) = split_filter {
                if split_key.as_deref() != Some(filter) {
                    continue;
                }
            }

            let mut row = RawRow::new(
                source.id.clone(),
                source.source_type,
                batch_id.to_string(),
                fetched_at,
            );
            row.split_key = split_key;
            apply_mapped_columns(&mut row, mapped);

            if row.item_code.is_none() {
                if keep_unidentified {
                    row.item_code = Some(format!("NO_MATERIAL_{}", index));
                } else {
                    skipped_no_item += 1;
                    continue;
                }
            }
            rows.push(row);
        }

        if skipped_no_item > 0 {
            warn!(
                source_id = %source.id,
                skipped = skipped_no_item,
                "丢弃无物料编码的行"
            );
        }
        rows
    }

    /// 物料目录候选: 按 item_code 去重,首次出现者胜出
    fn catalog_entries(rows: &[RawRow], source_type: SourceType) -> Vec<CatalogEntry> {
        let now = Utc::now();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries = Vec::new();

        for row in rows {
            let Some(item_code) = row.item_code.as_deref() else {
                continue;
            };
            if !seen.insert(item_code) {
                continue;
            }
            entries.push(CatalogEntry {
                item_code: item_code.to_string(),
                description: Self::catalog_description(row),
                unit: row.unit.clone(),
                source_system: source_type,
                last_seen_at: now,
            });
        }
        entries
    }

    // WMS 描述缺失时回退 item_nm 列
    fn catalog_description(row: &RawRow) -> Option<String> {
        if row.description.is_some() {
            return row.description.clone();
        }
        match row.source_type {
            SourceType::Wms => row
                .extras
                .get("item_nm")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            SourceType::Sap => None,
        }
    }

    /// 批量插入并在成功后更新物料目录,目录失败只记告警
    async fn insert_prepared_rows(
        &self,
        source: &SheetSource,
        rows: &[RawRow],
        outcome: &mut SourceOutcome,
    ) {
        let batch_size = match match source.source_type {
            SourceType::Wms => self.config.get_wms_insert_batch_size().await,
            SourceType::Sap => self.config.get_sap_insert_batch_size().await,
        } {
            Ok(size) => size.max(1),
            Err(e) => {
                error!(source_id = %source.id, error = %e, "读取插入批次配置失败");
                outcome
                    .errors
                    .push(format!("Source {}: {}", source.label, e));
                return;
            }
        };

        let mut inserted = 0usize;
        for chunk in rows.chunks(batch_size) {
            match self.repo.insert_rows(chunk).await {
                Ok(count) => inserted += count,
                Err(e) => {
                    error!(
                        source_id = %source.id,
                        rows = chunk.len(),
                        error = %e,
                        "批次插入失败"
                    );
                    outcome
                        .errors
                        .push(format!("Source {}: {}", source.label, e));
                }
            }
        }
        outcome.rows_emitted = inserted;

        if inserted > 0 {
            let entries = Self::catalog_entries(rows, source.source_type);
            if let Err(e) = self.repo.upsert_catalog_entries(&entries).await {
                warn!(source_id = %source.id, error = %e, "物料目录更新失败");
            }
        }
    }

    /// 汇总并发摄取结果进报告
    fn fold_outcomes(report: &mut IngestReport, results: Vec<(&SheetSource, SourceOutcome)>) {
        for (source, outcome) in results {
            report.sources_processed += 1;
            report.rows_inserted += outcome.rows_emitted;
            for message in outcome.errors {
                report.errors.push(IngestIssue::for_source(
                    IssueKind::ProcessingError,
                    source.id.clone(),
                    source.label.clone(),
                    message,
                ));
            }
        }
    }

    fn type_names(types: &[SourceType]) -> String {
        types
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait::async_trait]
impl InventoryIngestor for InventoryIngestorImpl {
    /// 摄取单个数据源
    ///
    /// # 说明
    /// 抓取、规范化、配置读取的失败一律折叠进 outcome.errors,
    /// 以便并发摄取时单源失败不影响兄弟源
    #[instrument(skip(self, source), fields(source_id = %source.id))]
    async fn ingest_source(
        &self,
        source: &SheetSource,
        batch_id: &str,
        split_filter: Option<&str>,
        dry_run: bool,
    ) -> SourceOutcome {
        let mut outcome = SourceOutcome::default();

        let values = match self
            .fetcher
            .fetch(&source.spreadsheet_id, &source.sheet_name)
            .await
        {
            Ok(values) => values,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "数据源抓取失败");
                outcome
                    .errors
                    .push(format!("Source {}: {}", source.label, e));
                return outcome;
            }
        };
        if values.len() < 2 {
            outcome
                .errors
                .push(format!("Source {}: No data found", source.label));
            return outcome;
        }

        let records = self.normalizer.normalize(&values);
        if records.is_empty() {
            outcome.errors.push(format!(
                "Source {}: No valid rows after normalization",
                source.label
            ));
            return outcome;
        }

        let keep_unidentified = match self.config.get_keep_unidentified_rows().await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "读取保留未识别行配置失败,按丢弃处理");
                false
            }
        };

        let rows = self.prepare_rows(source, &records, batch_id, split_filter, keep_unidentified);
        if rows.is_empty() {
            debug!(source_id = %source.id, "过滤后无行可入库");
            return outcome;
        }

        if dry_run {
            info!(source_id = %source.id, rows = rows.len(), "演练模式,跳过落库");
            outcome.rows_emitted = rows.len();
            return outcome;
        }

        self.insert_prepared_rows(source, &rows, &mut outcome).await;
        info!(
            source_id = %source.id,
            rows = outcome.rows_emitted,
            errors = outcome.errors.len(),
            "数据源摄取完成"
        );
        outcome
    }

    /// 按仓库绑定摄取
    #[instrument(skip(self), fields(warehouse = %warehouse_code))]
    async fn ingest_warehouse(
        &self,
        warehouse_code: &str,
        types: &[SourceType],
        dry_run: bool,
        batch_id: Option<String>,
    ) -> IngestReport {
        let start_time = Instant::now();
        let batch_id = batch_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut report = IngestReport::new(Some(warehouse_code.to_string()), batch_id.clone());

        info!(batch_id = %batch_id, types = %Self::type_names(types), dry_run, "开始仓库摄取");

        let binding = match self.repo.get_binding(warehouse_code).await {
            Ok(Some(binding)) => binding,
            Ok(None) => {
                report.errors.push(IngestIssue::new(
                    IssueKind::BindingError,
                    format!("No binding found for warehouse {}", warehouse_code),
                ));
                report.duration_seconds = start_time.elapsed().as_secs_f64();
                return report;
            }
            Err(e) => {
                report.errors.push(IngestIssue::new(
                    IssueKind::DatabaseError,
                    format!(
                        "Failed to load binding for warehouse {}: {}",
                        warehouse_code, e
                    ),
                ));
                report.duration_seconds = start_time.elapsed().as_secs_f64();
                return report;
            }
        };

        let bound = binding.bound_sources(types);
        if bound.is_empty() {
            report.warnings.push(format!(
                "No sources configured for types: {}",
                Self::type_names(types)
            ));
            report.duration_seconds = start_time.elapsed().as_secs_f64();
            return report;
        }

        // 解析绑定指向的数据源,缺失视为配置错误
        let mut tasks: Vec<(SheetSource, Option<String>)> = Vec::new();
        for bound_source in bound {
            match self.repo.get_source(&bound_source.source_id).await {
                Ok(Some(source)) => {
                    if !types.contains(&source.source_type) {
                        debug!(
                            source_id = %source.id,
                            source_type = %source.source_type,
                            "数据源类型不在本次摄取范围,跳过"
                        );
                        continue;
                    }
                    tasks.push((source, bound_source.split_value));
                }
                Ok(None) => {
                    report.errors.push(IngestIssue::new(
                        IssueKind::ConfigError,
                        format!("Source {} not found", bound_source.source_id),
                    ));
                }
                Err(e) => {
                    report.errors.push(IngestIssue::new(
                        IssueKind::DatabaseError,
                        format!("Failed to load source {}: {}", bound_source.source_id, e),
                    ));
                }
            }
        }

        // 并发执行各 (数据源, 拆分值) 摄取任务
        let ingest_tasks = tasks.iter().map(|(source, split_value)| {
            let batch_id = batch_id.clone();
            async move {
                info!(
                    source_id = %source.id,
                    label = %source.label,
                    split = ?split_value,
                    "开始摄取数据源"
                );
                let outcome = self
                    .ingest_source(source, &batch_id, split_value.as_deref(), dry_run)
                    .await;
                (source, outcome)
            }
        });
        let results = join_all(ingest_tasks).await;
        Self::fold_outcomes(&mut report, results);

        // WMS 行落库后重建容量/快照/看板缓存,失败只记告警
        if types.contains(&SourceType::Wms) && report.rows_inserted > 0 && !dry_run {
            let codes = vec![warehouse_code.to_string()];
            for refresher in &self.refreshers {
                if let Err(e) = refresher.refresh(&codes).await {
                    warn!(refresher = refresher.name(), error = %e, "摄取后缓存刷新失败");
                    report.warnings.push(format!(
                        "Cache refresh '{}' failed: {}",
                        refresher.name(),
                        e
                    ));
                }
            }
        }

        report.duration_seconds = start_time.elapsed().as_secs_f64();
        info!(
            sources = report.sources_processed,
            rows = report.rows_inserted,
            errors = report.errors.len(),
            duration = report.duration_seconds,
            "仓库摄取完成"
        );
        report
    }

    /// 全量摄取指定类型的所有数据源
    #[instrument(skip(self))]
    async fn ingest_all_sources(
        &self,
        types: &[SourceType],
        dry_run: bool,
    ) -> IngestResult<IngestReport> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let mut report = IngestReport::new(None, batch_id.clone());

        info!(batch_id = %batch_id, types = %Self::type_names(types), dry_run, "开始全量摄取");

        let mut sources = Vec::new();
        for source_type in types {
            sources.extend(self.repo.list_sources(Some(*source_type)).await?);
        }
        if sources.is_empty() {
            report.warnings.push(format!(
                "No sources configured for types: {}",
                Self::type_names(types)
            ));
            report.duration_seconds = start_time.elapsed().as_secs_f64();
            return Ok(report);
        }

        // 全量重建: 先清空既有行,清空失败直接中止
        if !dry_run {
            for source_type in types {
                let cleared = self.repo.clear_rows(*source_type).await?;
                info!(source_type = %source_type, cleared, "清空既有行");
            }
        }

        let ingest_tasks = sources.iter().map(|source| {
            let batch_id = batch_id.clone();
            async move {
                let outcome = self.ingest_source(source, &batch_id, None, dry_run).await;
                (source, outcome)
            }
        });
        let results = join_all(ingest_tasks).await;
        Self::fold_outcomes(&mut report, results);

        report.duration_seconds = start_time.elapsed().as_secs_f64();
        info!(
            sources = report.sources_processed,
            rows = report.rows_inserted,
            errors = report.errors.len(),
            duration = report.duration_seconds,
            "全量摄取完成"
        );
        Ok(report)
    }

    /// 预览数据源表头与数据行数
    async fn preview_headers(&self, source: &SheetSource) -> IngestResult<HeaderPreview> {
        let values = self
            .fetcher
            .fetch(&source.spreadsheet_id, &source.sheet_name)
            .await?;

        let Some(header_row) = values.first() else {
            return Ok(HeaderPreview {
                headers: Vec::new(),
                row_count: 0,
            });
        };
        let headers = header_row
            .iter()
            .map(|cell| cell.as_deref().unwrap_or("").trim().to_string())
            .collect();
        Ok(HeaderPreview {
            headers,
            row_count: values.len() - 1,
        })
    }

    /// 列出数据源中各拆分值及行数
    async fn list_split_values(&self, source: &SheetSource) -> IngestResult<Vec<SplitValueInfo>> {
        let values = self
            .fetcher
            .fetch(&source.spreadsheet_id, &source.sheet_name)
            .await?;
        let records = self.normalizer.normalize(&values);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in &records {
            let mapped = self
                .mapper
                .map_record(source.source_type, &source.classification, record);
            if let Some(split) = self.mapper.split_key(&source.classification, &mapped) {
                *counts.entry(split).or_insert(0) += 1;
            }
        }

        let mut out: Vec<SplitValueInfo> = counts
            .into_iter()
            .map(|(value, row_count)| SplitValueInfo { value, row_count })
            .collect();
        out.sort_by(|a, b| {
            b.row_count
                .cmp(&a.row_count)
                .then_with(|| a.value.cmp(&b.value))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{config_keys, ConfigManager};
    use crate::db::open_sqlite_connection;
    use crate::domain::source::ClassificationConfig;
    use crate::ingest::column_mapper::StandardColumnMapper;
    use crate::ingest::error::IngestError;
    use crate::ingest::row_normalizer::SheetRowNormalizer;
    use crate::repository::InventoryIngestRepositoryImpl;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubFetcher {
        sheets: HashMap<String, Vec<Vec<Option<String>>>>,
    }

    #[async_trait]
    impl SheetFetcher for StubFetcher {
        async fn fetch(
            &self,
            spreadsheet_id: &str,
            _sheet_name: &str,
        ) -> IngestResult<Vec<Vec<Option<String>>>> {
            self.sheets
                .get(spreadsheet_id)
                .cloned()
                .ok_or_else(|| IngestError::FileNotFound(spreadsheet_id.to_string()))
        }
    }

    struct TestCtx {
        ingestor: InventoryIngestorImpl,
        repo: Arc<InventoryIngestRepositoryImpl>,
        config: Arc<ConfigManager>,
    }

    fn setup(sheets: Vec<(&str, Vec<Vec<Option<String>>>)>) -> TestCtx {
        let conn = Arc::new(Mutex::new(
            open_sqlite_connection(":memory:").expect("Failed to open test db"),
        ));
        let repo = Arc::new(InventoryIngestRepositoryImpl::new(conn.clone()));
        let config =
            Arc::new(ConfigManager::from_connection(conn).expect("Failed to create config"));
        let fetcher = StubFetcher {
            sheets: sheets
                .into_iter()
                .map(|(id, values)| (id.to_string(), values))
                .collect(),
        };
        let ingestor = InventoryIngestorImpl::new(
            repo.clone(),
            config.clone(),
            Box::new(fetcher),
            Box::new(SheetRowNormalizer),
            Box::new(StandardColumnMapper),
        );
        TestCtx {
            ingestor,
            repo,
            config,
        }
    }

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<Option<String>>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn wms_source(id: &str, sheet_id: &str) -> SheetSource {
        let mut source = SheetSource::new(id, "东库 WMS", SourceType::Wms, sheet_id);
        source.classification = ClassificationConfig {
            item_col: Some("Item Code".to_string()),
            location_col: Some("Cell No.".to_string()),
            qty_col: Some("Available Qty.".to_string()),
            ..Default::default()
        };
        source
    }

    fn wms_sheet() -> Vec<Vec<Option<String>>> {
        sheet(&[
            &["Item Code", "Cell No.", "Available Qty."],
            &["A1", "Z-01", "10"],
            &["A2", "Z-01", "5"],
            &["", "Z-02", "3"],
        ])
    }

    #[tokio::test]
    async fn test_ingest_source_skips_rows_without_item_code() {
        let ctx = setup(vec![("wms.csv", wms_sheet())]);
        let source = wms_source("src-1", "wms.csv");

        let outcome = ctx
            .ingestor
            .ingest_source(&source, "batch-1", None, false)
            .await;
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.rows_emitted, 2);

        let rows = ctx.repo.scan_rows(SourceType::Wms).await.unwrap();
        assert_eq!(rows.len(), 2);
        let z01_total: f64 = rows
            .iter()
            .filter(|r| r.location.as_deref() == Some("Z-01"))
            .filter_map(|r| r.available_qty)
            .sum();
        assert_eq!(z01_total, 15.0);
    }

    #[tokio::test]
    async fn test_ingest_source_keep_unidentified_placeholder() {
        let ctx = setup(vec![("wms.csv", wms_sheet())]);
        ctx.config
            .set_config_value(config_keys::KEEP_UNIDENTIFIED_ROWS, "true")
            .unwrap();
        let source = wms_source("src-1", "wms.csv");

        let outcome = ctx
            .ingestor
            .ingest_source(&source, "batch-1", None, false)
            .await;
        assert_eq!(outcome.rows_emitted, 3);

        let rows = ctx.repo.scan_rows(SourceType::Wms).await.unwrap();
        // 占位编码使用规范化记录中的行序号
        assert!(rows
            .iter()
            .any(|r| r.item_code.as_deref() == Some("NO_MATERIAL_2")));
    }

    #[tokio::test]
    async fn test_ingest_source_split_filter() {
        let values = sheet(&[
            &["Material", "Plant", "Unrestricted"],
            &["M-1", "1000", "10"],
            &["M-2", "2000", "20"],
            &["M-3", "1000", "30"],
        ]);
        let ctx = setup(vec![("sap.csv", values)]);
        let mut source = SheetSource::new("src-s", "SAP 库存", SourceType::Sap, "sap.csv");
        source.classification = ClassificationConfig {
            item_col: Some("Material".to_string()),
            qty_col: Some("Unrestricted".to_string()),
            split_enabled: true,
            split_by_column: Some("Plant".to_string()),
            ..Default::default()
        };

        let outcome = ctx
            .ingestor
            .ingest_source(&source, "batch-1", Some("1000"), false)
            .await;
        assert_eq!(outcome.rows_emitted, 2);

        let rows = ctx.repo.scan_rows(SourceType::Sap).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.split_key.as_deref() == Some("1000")));
        assert!(rows.iter().all(|r| r.item_code.as_deref() != Some("M-2")));
    }

    #[tokio::test]
    async fn test_ingest_source_fetch_error_and_no_data() {
        let ctx = setup(vec![(
            "empty.csv",
            sheet(&[&["Item Code", "Cell No.", "Available Qty."]]),
        )]);

        let missing = wms_source("src-1", "ghost.csv");
        let outcome = ctx
            .ingestor
            .ingest_source(&missing, "batch-1", None, false)
            .await;
        assert_eq!(outcome.rows_emitted, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("Source 东库 WMS:"));
        assert!(outcome.errors[0].contains("ghost.csv"));

        // 仅有表头视为无数据
        let header_only = wms_source("src-2", "empty.csv");
        let outcome = ctx
            .ingestor
            .ingest_source(&header_only, "batch-1", None, false)
            .await;
        assert_eq!(
            outcome.errors,
            vec!["Source 东库 WMS: No data found".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ingest_source_dry_run_counts_without_insert() {
        let ctx = setup(vec![("wms.csv", wms_sheet())]);
        let source = wms_source("src-1", "wms.csv");

        let outcome = ctx
            .ingestor
            .ingest_source(&source, "batch-1", None, true)
            .await;
        assert_eq!(outcome.rows_emitted, 2);

        let rows = ctx.repo.scan_rows(SourceType::Wms).await.unwrap();
        assert!(rows.is_empty());
        assert!(ctx.repo.list_catalog().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_source_updates_catalog_first_occurrence_wins() {
        let values = sheet(&[
            &["Item Code", "Desc", "Unit", "Available Qty."],
            &["A1", "钢卷 A", "EA", "10"],
            &["A1", "钢卷 A 改", "EA", "5"],
            &["B2", "", "KG", "3"],
        ]);
        let ctx = setup(vec![("wms.csv", values)]);
        let mut source = wms_source("src-1", "wms.csv");
        source.classification.location_col = None;

        ctx.ingestor
            .ingest_source(&source, "batch-1", None, false)
            .await;

        let a1 = ctx
            .repo
            .get_catalog_entry("A1")
            .await
            .unwrap()
            .expect("catalog entry");
        assert_eq!(a1.description.as_deref(), Some("钢卷 A"));
        assert_eq!(a1.unit.as_deref(), Some("EA"));
        assert_eq!(a1.source_system, SourceType::Wms);

        let b2 = ctx
            .repo
            .get_catalog_entry("B2")
            .await
            .unwrap()
            .expect("catalog entry");
        assert_eq!(b2.description, None);
    }

    #[tokio::test]
    async fn test_ingest_warehouse_concurrent_sources_share_batch() {
        let sap_values = sheet(&[
            &["Material", "Storage location", "Unrestricted"],
            &["M-1", "1000", "7"],
        ]);
        let ctx = setup(vec![("wms.csv", wms_sheet()), ("sap.csv", sap_values)]);

        let wms = wms_source("src-w", "wms.csv");
        ctx.repo.upsert_source(&wms).await.unwrap();
        let mut sap = SheetSource::new("src-s", "SAP 库存", SourceType::Sap, "sap.csv");
        sap.classification = ClassificationConfig {
            item_col: Some("Material".to_string()),
            location_col: Some("Storage location".to_string()),
            qty_col: Some("Unrestricted".to_string()),
            ..Default::default()
        };
        ctx.repo.upsert_source(&sap).await.unwrap();

        let mut binding = crate::domain::binding::WarehouseBinding::new("EA2-F");
        binding.source_bindings.insert(
            "src-w".to_string(),
            crate::domain::binding::SourceBinding {
                source_type: SourceType::Wms,
                split_value: None,
            },
        );
        binding.source_bindings.insert(
            "src-s".to_string(),
            crate::domain::binding::SourceBinding {
                source_type: SourceType::Sap,
                split_value: None,
            },
        );
        ctx.repo.upsert_binding(&binding).await.unwrap();

        let report = ctx
            .ingestor
            .ingest_warehouse("EA2-F", &[SourceType::Wms, SourceType::Sap], false, None)
            .await;

        assert_eq!(report.sources_processed, 2);
        assert_eq!(report.rows_inserted, 3);
        assert!(report.errors.is_empty());
        assert_eq!(report.warehouse_code.as_deref(), Some("EA2-F"));

        // 同一次运行的各源共享批次号
        let batch_rows = ctx.repo.count_batch_rows(&report.batch_id).await.unwrap();
        assert_eq!(batch_rows, 3);
    }

    #[tokio::test]
    async fn test_ingest_warehouse_missing_binding_and_source() {
        let ctx = setup(vec![("wms.csv", wms_sheet())]);

        let report = ctx
            .ingestor
            .ingest_warehouse("GHOST", &[SourceType::Wms], false, None)
            .await;
        assert_eq!(report.sources_processed, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::BindingError);
        assert!(report.errors[0].message.contains("GHOST"));

        // 绑定存在但指向不存在的数据源
        let mut binding = crate::domain::binding::WarehouseBinding::new("EA2-F");
        binding.source_bindings.insert(
            "missing-src".to_string(),
            crate::domain::binding::SourceBinding {
                source_type: SourceType::Wms,
                split_value: None,
            },
        );
        ctx.repo.upsert_binding(&binding).await.unwrap();

        let report = ctx
            .ingestor
            .ingest_warehouse("EA2-F", &[SourceType::Wms], false, None)
            .await;
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::ConfigError);
        assert!(report.errors[0].message.contains("missing-src"));
    }

    #[tokio::test]
    async fn test_ingest_warehouse_no_matching_types_warns() {
        let ctx = setup(vec![]);
        let mut binding = crate::domain::binding::WarehouseBinding::new("EA2-F");
        binding.source_bindings.insert(
            "src-s".to_string(),
            crate::domain::binding::SourceBinding {
                source_type: SourceType::Sap,
                split_value: None,
            },
        );
        ctx.repo.upsert_binding(&binding).await.unwrap();

        let report = ctx
            .ingestor
            .ingest_warehouse("EA2-F", &[SourceType::Wms], false, None)
            .await;
        assert_eq!(report.sources_processed, 0);
        assert_eq!(
            report.warnings,
            vec!["No sources configured for types: wms".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ingest_all_sources_clears_previous_rows() {
        let ctx = setup(vec![("wms.csv", wms_sheet())]);
        let source = wms_source("src-1", "wms.csv");
        ctx.repo.upsert_source(&source).await.unwrap();

        let first = ctx
            .ingestor
            .ingest_all_sources(&[SourceType::Wms], false)
            .await
            .unwrap();
        assert_eq!(first.rows_inserted, 2);

        let second = ctx
            .ingestor
            .ingest_all_sources(&[SourceType::Wms], false)
            .await
            .unwrap();
        assert_eq!(second.rows_inserted, 2);

        // 全量重建后旧批次不复存在
        assert_eq!(ctx.repo.count_batch_rows(&first.batch_id).await.unwrap(), 0);
        assert_eq!(
            ctx.repo.count_batch_rows(&second.batch_id).await.unwrap(),
            2
        );
        assert_eq!(ctx.repo.scan_rows(SourceType::Wms).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_all_sources_dry_run_keeps_rows() {
        let ctx = setup(vec![("wms.csv", wms_sheet())]);
        let source = wms_source("src-1", "wms.csv");
        ctx.repo.upsert_source(&source).await.unwrap();

        ctx.ingestor
            .ingest_all_sources(&[SourceType::Wms], false)
            .await
            .unwrap();
        let report = ctx
            .ingestor
            .ingest_all_sources(&[SourceType::Wms], true)
            .await
            .unwrap();

        assert_eq!(report.rows_inserted, 2);
        // 演练模式不清空、不写入
        assert_eq!(ctx.repo.scan_rows(SourceType::Wms).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_preview_headers() {
        let ctx = setup(vec![("wms.csv", wms_sheet())]);
        let source = wms_source("src-1", "wms.csv");

        let preview = ctx.ingestor.preview_headers(&source).await.unwrap();
        assert_eq!(preview.headers, vec!["Item Code", "Cell No.", "Available Qty."]);
        assert_eq!(preview.row_count, 3);
    }

    #[tokio::test]
    async fn test_list_split_values_ordering() {
        let values = sheet(&[
            &["Material", "Plant", "Unrestricted"],
            &["M-1", "2000", "1"],
            &["M-2", "1000", "1"],
            &["M-3", "2000", "1"],
            &["M-4", "3000", "1"],
            &["M-5", "1000", "1"],
            &["M-6", "", "1"],
        ]);
        let ctx = setup(vec![("sap.csv", values)]);
        let mut source = SheetSource::new("src-s", "SAP 库存", SourceType::Sap, "sap.csv");
        source.classification = ClassificationConfig {
            item_col: Some("Material".to_string()),
            split_enabled: true,
            split_by_column: Some("Plant".to_string()),
            ..Default::default()
        };

        let splits = ctx.ingestor.list_split_values(&source).await.unwrap();
        let pairs: Vec<(&str, usize)> = splits
            .iter()
            .map(|s| (s.value.as_str(), s.row_count))
            .collect();
        // 行数降序,并列按值升序;空拆分值不计入
        assert_eq!(pairs, vec![("1000", 2), ("2000", 2), ("3000", 1)]);
    }
}
