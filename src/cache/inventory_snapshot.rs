// ==========================================
// 仓储库存同步系统 - 库存快照构建器
// ==========================================
// 职责: 按仓库预聚合原始行,写入 inventory_snapshot_{code} 缓存文档
// 红线: 快照无 TTL,只能显式重建;读取永不触发重算
// ==========================================

use crate::cache::error::CacheResult;
use crate::cache::kv_store::KvStore;
use crate::cache::refresher::CacheRefresher;
use crate::domain::binding::SourceBinding;
use crate::domain::inventory::RawRow;
use crate::domain::types::SourceType;
use crate::repository::ingest_repo::InventoryIngestRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 快照键前缀,完整键为 inventory_snapshot_{warehouse_code}
pub const SNAPSHOT_KEY_PREFIX: &str = "inventory_snapshot_";

// 分页窗口: 每页行数与页数上限,防止异常数据量拖垮重建
const PAGE_SIZE: usize = 1000;
const MAX_PAGES: usize = 20;

fn snapshot_key(warehouse_code: &str) -> String {
    format!("{}{}", SNAPSHOT_KEY_PREFIX, warehouse_code)
}

// ==========================================
// InventorySnapshot - 仓库库存快照文档
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub warehouse_code: String,
    pub wms_data: Vec<RawRow>,
    pub sap_data: Vec<RawRow>,
    pub total_wms: usize,
    pub total_sap: usize,
    pub last_updated: DateTime<Utc>,
    pub source_bindings: HashMap<String, SourceBinding>,
}

// ==========================================
// InventorySnapshotBuilder
// ==========================================
pub struct InventorySnapshotBuilder {
    kv: Arc<dyn KvStore>,
    repo: Arc<dyn InventoryIngestRepository>,
}

impl InventorySnapshotBuilder {
    pub fn new(kv: Arc<dyn KvStore>, repo: Arc<dyn InventoryIngestRepository>) -> Self {
        Self { kv, repo }
    }

    /// 重建单个仓库的库存快照
    ///
    /// # 返回
    /// - (usize, usize): (WMS 行数, SAP 行数)
    ///
    /// # 说明
    /// 仓库未配置绑定时记告警并返回零值,不落任何文档
    pub async fn build_for_warehouse(&self, warehouse_code: &str) -> CacheResult<(usize, usize)> {
        let binding = match self.repo.get_binding(warehouse_code).await? {
            Some(binding) if !binding.source_bindings.is_empty() => binding,
            _ => {
                tracing::warn!(warehouse = warehouse_code, "仓库未配置数据源绑定,跳过快照重建");
                return Ok((0, 0));
            }
        };

        let mut wms_data: Vec<RawRow> = Vec::new();
        let mut sap_data: Vec<RawRow> = Vec::new();

        for bound in binding.bound_sources(&[SourceType::Wms, SourceType::Sap]) {
            let rows = self
                .fetch_rows_paged(&bound.source_id, bound.split_value.as_deref())
                .await?;
            tracing::debug!(
                source_id = %bound.source_id,
                split = ?bound.split_value,
                rows = rows.len(),
                "快照收集来源行"
            );
            match bound.source_type {
                SourceType::Wms => wms_data.extend(rows),
                SourceType::Sap => sap_data.extend(rows),
            }
        }

        let snapshot = InventorySnapshot {
            warehouse_code: warehouse_code.to_string(),
            total_wms: wms_data.len(),
            total_sap: sap_data.len(),
            wms_data,
            sap_data,
            last_updated: Utc::now(),
            source_bindings: binding.source_bindings.clone(),
        };

        let value = serde_json::to_value(&snapshot)?;
        self.kv.set(&snapshot_key(warehouse_code), &value).await?;
        tracing::info!(
            warehouse = warehouse_code,
            wms = snapshot.total_wms,
            sap = snapshot.total_sap,
            "库存快照已重建"
        );
        Ok((snapshot.total_wms, snapshot.total_sap))
    }

    /// 重建全部已绑定仓库的快照
    ///
    /// # 返回
    /// - (usize, usize): (成功仓库数, 失败仓库数)
    ///
    /// # 说明
    /// 单个仓库失败记告警后继续,不中断其余仓库
    pub async fn build_all(&self) -> CacheResult<(usize, usize)> {
        let bindings = self.repo.list_bindings().await?;
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for binding in bindings {
            match self.build_for_warehouse(&binding.warehouse_code).await {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(
                        warehouse = %binding.warehouse_code,
                        "重建库存快照失败: {}",
                        e
                    );
                    failed += 1;
                }
            }
        }

        Ok((succeeded, failed))
    }

    /// 读取缓存的快照文档,不触发重建
    pub async fn get_snapshot(&self, warehouse_code: &str) -> CacheResult<Option<InventorySnapshot>> {
        match self.kv.get(&snapshot_key(warehouse_code)).await? {
            Some(value) => match serde_json::from_value(value) {
                Ok(snapshot) => Ok(Some(snapshot)),
                Err(e) => {
                    tracing::warn!(warehouse = warehouse_code, "快照文档结构不符,按缺失处理: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn fetch_rows_paged(
        &self,
        source_id: &str,
        split_value: Option<&str>,
    ) -> CacheResult<Vec<RawRow>> {
        let mut all_rows = Vec::new();
        let mut offset = 0usize;

        for _ in 0..MAX_PAGES {
            let page = self
                .repo
                .rows_for_pair(source_id, split_value, PAGE_SIZE, offset)
                .await?;
            let fetched = page.len();
            all_rows.extend(page);
            if fetched < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(all_rows)
    }
}

// ==========================================
// CacheRefresher 实现
// ==========================================
#[async_trait]
impl CacheRefresher for InventorySnapshotBuilder {
    fn name(&self) -> &'static str {
        "inventory_snapshots"
    }

    async fn refresh(&self, warehouse_codes: &[String]) -> CacheResult<()> {
        if warehouse_codes.is_empty() {
            self.build_all().await?;
            return Ok(());
        }

        // 逐仓重建,全部尝试后再上抛首个失败
        let mut first_err = None;
        for code in warehouse_codes {
            if let Err(e) = self.build_for_warehouse(code).await {
                tracing::warn!(warehouse = %code, "重建库存快照失败: {}", e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::kv_store::JsonFileStore;
    use crate::db::open_sqlite_connection;
    use crate::domain::binding::WarehouseBinding;
    use crate::repository::ingest_repo_impl::InventoryIngestRepositoryImpl;
    use std::sync::Mutex;

    fn setup() -> (tempfile::TempDir, InventorySnapshotBuilder, Arc<InventoryIngestRepositoryImpl>) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let conn = Arc::new(Mutex::new(
            open_sqlite_connection(":memory:").expect("Failed to open test db"),
        ));
        let repo = Arc::new(InventoryIngestRepositoryImpl::new(conn));
        let kv = Arc::new(JsonFileStore::new(dir.path().join("cache")));
        let builder = InventorySnapshotBuilder::new(kv, repo.clone());
        (dir, builder, repo)
    }

    fn wms_row(source_id: &str, split: Option<&str>, item: &str) -> RawRow {
        let mut row = RawRow::new(
            source_id.to_string(),
            SourceType::Wms,
            "batch-1".to_string(),
            Utc::now(),
        );
        row.split_key = split.map(|s| s.to_string());
        row.item_code = Some(item.to_string());
        row
    }

    async fn bind(
        repo: &InventoryIngestRepositoryImpl,
        warehouse: &str,
        key: &str,
        source_type: SourceType,
    ) {
        let mut binding = WarehouseBinding::new(warehouse);
        binding.source_bindings.insert(
            key.to_string(),
            SourceBinding {
                source_type,
                split_value: None,
            },
        );
        repo.upsert_binding(&binding).await.unwrap();
    }

    #[tokio::test]
    async fn test_build_collects_rows_per_bound_pair() {
        let (_dir, builder, repo) = setup();
        bind(&repo, "WH01", "src-1::A2", SourceType::Wms).await;
        repo.insert_rows(&[
            wms_row("src-1", Some("A2"), "MAT-A"),
            wms_row("src-1", Some("A2"), "MAT-B"),
            wms_row("src-1", Some("A2"), "MAT-C"),
            // 其他拆分值的行不进入该仓快照
            wms_row("src-1", Some("B1"), "MAT-X"),
            wms_row("src-1", Some("B1"), "MAT-Y"),
        ])
        .await
        .unwrap();

        let (wms, sap) = builder.build_for_warehouse("WH01").await.unwrap();
        assert_eq!(wms, 3);
        assert_eq!(sap, 0);

        let snapshot = builder.get_snapshot("WH01").await.unwrap().unwrap();
        assert_eq!(snapshot.warehouse_code, "WH01");
        assert_eq!(snapshot.total_wms, 3);
        assert_eq!(snapshot.wms_data.len(), 3);
        assert!(snapshot.sap_data.is_empty());
        assert_eq!(snapshot.source_bindings.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_binding_persists_nothing() {
        let (_dir, builder, _repo) = setup();
        let (wms, sap) = builder.build_for_warehouse("WH99").await.unwrap();
        assert_eq!((wms, sap), (0, 0));
        assert!(builder.get_snapshot("WH99").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pagination_crosses_page_boundary() {
        let (_dir, builder, repo) = setup();
        bind(&repo, "WH01", "src-1", SourceType::Wms).await;

        let rows: Vec<RawRow> = (0..1500)
            .map(|i| wms_row("src-1", None, &format!("MAT-{:04}", i)))
            .collect();
        repo.insert_rows(&rows).await.unwrap();

        let (wms, _) = builder.build_for_warehouse("WH01").await.unwrap();
        assert_eq!(wms, 1500);
    }

    #[tokio::test]
    async fn test_build_all_counts_warehouses() {
        let (_dir, builder, repo) = setup();
        bind(&repo, "WH01", "src-1", SourceType::Wms).await;
        bind(&repo, "WH02", "src-2", SourceType::Sap).await;
        repo.insert_rows(&[wms_row("src-1", None, "MAT-A")]).await.unwrap();

        let (succeeded, failed) = builder.build_all().await.unwrap();
        assert_eq!(succeeded, 2);
        assert_eq!(failed, 0);

        assert!(builder.get_snapshot("WH01").await.unwrap().is_some());
        let wh2 = builder.get_snapshot("WH02").await.unwrap().unwrap();
        assert_eq!(wh2.total_sap, 0);
    }
}
