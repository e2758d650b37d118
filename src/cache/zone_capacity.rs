// ==========================================
// 仓储库存同步系统 - 库区容量聚合器
// ==========================================
// 职责: zone_capacities 缓存文档的布局刷新与在库同步
// 模式: 读文档 → 内存重算 → 原子覆写,不做实时查询
// 红线: 展示投影必须在库区合计更新之后生成,口径一致
// ==========================================

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::kv_store::KvStore;
use crate::cache::refresher::CacheRefresher;
use crate::config::sync_config_trait::SyncConfig;
use crate::domain::binding::WarehouseBinding;
use crate::domain::capacity::{
    CachedDisplayData, ComponentCapacity, ZoneCapacityInfo, ZoneCapacityResponse,
};
use crate::domain::inventory::{MaterialInfo, RawRow};
use crate::domain::types::{ComponentType, SourceType};
use crate::repository::ingest_repo::InventoryIngestRepository;
use crate::repository::layout_repo::LayoutStore;
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 容量缓存文档的 KV 键
pub const ZONE_CAPACITIES_KEY: &str = "zone_capacities";

/// 缓存文档结构: zone_id → 库区容量条目
type CapacityDoc = BTreeMap<String, ZoneCapacityInfo>;

/// 同一库位聚合后的在库桶
struct LocationBucket {
    zone_label: String, // 行上的库区标签（大写去空格,可为空）
    materials: Vec<MaterialInfo>,
}

// ==========================================
// ZoneCapacityAggregator
// ==========================================
pub struct ZoneCapacityAggregator {
    kv: Arc<dyn KvStore>,
    layout: Arc<dyn LayoutStore>,
    repo: Arc<dyn InventoryIngestRepository>,
    config: Arc<dyn SyncConfig>,
}

impl ZoneCapacityAggregator {
    pub fn new(
        kv: Arc<dyn KvStore>,
        layout: Arc<dyn LayoutStore>,
        repo: Arc<dyn InventoryIngestRepository>,
        config: Arc<dyn SyncConfig>,
    ) -> Self {
        Self {
            kv,
            layout,
            repo,
            config,
        }
    }

    async fn load_doc(&self) -> CacheResult<CapacityDoc> {
        match self.kv.get(ZONE_CAPACITIES_KEY).await? {
            Some(value) => match serde_json::from_value(value) {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    // 结构不符按空文档处理,下次保存整体覆盖
                    tracing::warn!(key = ZONE_CAPACITIES_KEY, "容量缓存结构不符,按空文档处理: {}", e);
                    Ok(CapacityDoc::new())
                }
            },
            None => Ok(CapacityDoc::new()),
        }
    }

    async fn save_doc(&self, doc: &CapacityDoc) -> CacheResult<()> {
        let value = serde_json::to_value(doc)?;
        self.kv.set(ZONE_CAPACITIES_KEY, &value).await
    }

    /// 布局刷新: 从布局存储重算每个库区的容量与组件清单
    ///
    /// # 说明
    /// - 组件容量: 货架取 floor_capacities 之和（为空退化为 层×行×列）,
    ///   平面取 max_capacity（非正退化为 行×列）
    /// - 存续库区保留上次同步的在库合计与展示数据（增量刷新）
    /// - 上游已删除的库区随整体覆写一起移除
    ///
    /// # 返回
    /// - usize: 刷新后文档中的库区数
    pub async fn update_zone_capacities(&self) -> CacheResult<usize> {
        let zones = self.layout.zones_with_components(None).await?;
        let mut existing = self.load_doc().await?;
        let now = Utc::now();

        let mut next = CapacityDoc::new();
        for zone in &zones {
            let components: Vec<ComponentCapacity> = zone
                .components
                .iter()
                .map(ComponentCapacity::from_component)
                .collect();

            let mut info = ZoneCapacityInfo {
                zone_id: zone.zone_id.clone(),
                zone_code: zone.zone_code.clone(),
                zone_name: zone.zone_name.clone(),
                warehouse_code: zone.warehouse_code.clone(),
                grid: zone.grid.clone(),
                max_capacity: zone.max_capacity(),
                item_count: components.len() as i64,
                current_stock: 0,
                utilization_percentage: 0.0,
                components,
                cached_display_data: None,
                last_updated: now,
                last_sync: None,
            };

            if let Some(prev) = existing.remove(&zone.zone_id) {
                // 在库口径仍是上次同步的结果,待下次在库同步刷新
                info.current_stock = prev.current_stock;
                info.utilization_percentage = prev.utilization_percentage;
                info.cached_display_data = prev.cached_display_data;
                info.last_sync = prev.last_sync;
            }

            next.insert(zone.zone_id.clone(), info);
        }

        self.save_doc(&next).await?;
        tracing::info!(zones = next.len(), "库区容量布局刷新完成");
        Ok(next.len())
    }

    /// 在库同步（权威路径）: 扫描 WMS 行,按绑定归属仓库,
    /// 按库位聚桶后匹配到库区组件,重算在库合计与展示数据
    ///
    /// # 返回
    /// - usize: 完成同步的库区数
    pub async fn update_current_quantities(&self) -> CacheResult<usize> {
        let mut doc = self.load_doc().await?;
        if doc.is_empty() {
            tracing::info!("容量缓存为空,跳过在库同步（请先刷新布局）");
            return Ok(0);
        }

        let rows = self.repo.scan_rows(SourceType::Wms).await?;
        let bindings = self.repo.list_bindings().await?;
        let alias_map = self
            .config
            .get_zone_alias_map()
            .await
            .map_err(|e| CacheError::Config(e.to_string()))?;

        let buckets = build_location_buckets(&rows, &bindings);
        let now = Utc::now();
        let mut updated = 0usize;

        for zone in doc.values_mut() {
            let warehouse_code = zone.warehouse_code.clone();
            // 未标注仓库的库区参与全部仓的桶匹配
            let candidates: Vec<(&String, &LocationBucket)> = match &warehouse_code {
                Some(wh) => buckets
                    .get(wh)
                    .map(|m| m.iter().collect())
                    .unwrap_or_default(),
                None => buckets.values().flat_map(|m| m.iter()).collect(),
            };

            let variations = zone.zone_code_variations();
            let zone_code = zone.zone_code.clone();

            for comp in zone.components.iter_mut() {
                comp.materials.clear();
            }

            for (location, bucket) in candidates {
                if !zone_label_matches(&bucket.zone_label, &variations, &zone_code, &alias_map) {
                    continue;
                }
                // 桶归属第一个库位前缀匹配的组件,其余组件不重复计入
                let Some(comp) = zone.components.iter_mut().find(|c| {
                    let comp_loc = c.normalized_location();
                    !comp_loc.is_empty() && location.starts_with(&comp_loc)
                }) else {
                    continue;
                };

                match comp.component_type {
                    ComponentType::Rack => {
                        let comp_location = comp.normalized_location();
                        for material in &bucket.materials {
                            let mut item = material.clone();
                            item.location = comp_location.clone(); // 货架按组件位置改写
                            comp.materials.push(item);
                        }
                    }
                    ComponentType::Flat => {
                        comp.materials.extend(bucket.materials.iter().cloned());
                    }
                }
            }

            for comp in zone.components.iter_mut() {
                comp.sync_stock();
            }
            zone.sync_totals();
            // 合计已是本轮数值,投影与合计同口径
            let display = CachedDisplayData::project(zone);
            zone.cached_display_data = Some(display);
            zone.last_sync = Some(now);
            updated += 1;
        }

        self.save_doc(&doc).await?;
        tracing::info!(zones = updated, rows = rows.len(), "库区在库同步完成");
        Ok(updated)
    }

    /// 在库同步（快速路径）: 组件已带匹配好的物料清单,
    /// 只做计数、合计与展示投影,不访问数据库
    pub async fn update_current_quantities_fast(&self) -> CacheResult<usize> {
        let mut doc = self.load_doc().await?;
        let now = Utc::now();
        let mut updated = 0usize;

        for zone in doc.values_mut() {
            for comp in zone.components.iter_mut() {
                comp.sync_stock();
            }
            zone.sync_totals();
            let display = CachedDisplayData::project(zone);
            zone.cached_display_data = Some(display);
            zone.last_sync = Some(now);
            updated += 1;
        }

        self.save_doc(&doc).await?;
        Ok(updated)
    }

    /// 读取库区容量,按占用率降序
    ///
    /// # 参数
    /// - warehouse_code: 指定时只返回该仓库的库区
    pub async fn get_zone_capacities(
        &self,
        warehouse_code: Option<&str>,
    ) -> CacheResult<ZoneCapacityResponse> {
        let doc = self.load_doc().await?;
        let mut zones: Vec<ZoneCapacityInfo> = doc
            .into_values()
            .filter(|z| match warehouse_code {
                Some(code) => z.warehouse_code.as_deref() == Some(code),
                None => true,
            })
            .collect();

        zones.sort_by(|a, b| {
            b.utilization_percentage
                .partial_cmp(&a.utilization_percentage)
                .unwrap_or(Ordering::Equal)
        });

        let last_updated = zones.iter().map(|z| z.last_updated).max();
        Ok(ZoneCapacityResponse {
            zones,
            last_updated,
        })
    }

    /// 读取单个库区的容量条目
    pub async fn get_zone_capacity(&self, zone_id: &str) -> CacheResult<Option<ZoneCapacityInfo>> {
        let mut doc = self.load_doc().await?;
        Ok(doc.remove(zone_id))
    }
}

/// 按绑定归属把 WMS 行聚成 仓库 → 库位 → 在库桶
fn build_location_buckets(
    rows: &[RawRow],
    bindings: &[WarehouseBinding],
) -> HashMap<String, HashMap<String, LocationBucket>> {
    let mut out: HashMap<String, HashMap<String, LocationBucket>> = HashMap::new();

    for binding in bindings {
        let pairs = binding.wms_pairs();
        if pairs.is_empty() {
            continue;
        }
        let wh_buckets = out.entry(binding.warehouse_code.clone()).or_default();

        for row in rows {
            let matched = pairs.iter().any(|(source_id, split)| {
                source_id == &row.source_id
                    && match split {
                        Some(v) => row.split_key.as_deref() == Some(v.as_str()),
                        // 未拆分的绑定吃下该来源全部行
                        None => true,
                    }
            });
            if !matched {
                continue;
            }

            let location = match &row.location {
                Some(loc) => {
                    let normalized = loc.trim().to_uppercase();
                    if normalized.is_empty() {
                        continue;
                    }
                    normalized
                }
                None => continue,
            };
            let zone_label = row
                .zone_code
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_uppercase();

            let bucket = wh_buckets
                .entry(location.clone())
                .or_insert_with(|| LocationBucket {
                    zone_label: zone_label.clone(),
                    materials: Vec::new(),
                });
            if bucket.zone_label.is_empty() && !zone_label.is_empty() {
                bucket.zone_label = zone_label;
            }
            bucket.materials.push(MaterialInfo {
                location: location.clone(),
                item_code: row.item_code.clone().unwrap_or_default(),
                lot_key: row.lot_key.clone(),
                quantity: row.stock_quantity(),
                source_id: row.source_id.clone(),
                split_key: row.split_key.clone(),
            });
        }
    }

    out
}

/// 库区标签匹配: 代码变体命中,或别名映射指向该库区代码
fn zone_label_matches(
    bucket_label: &str,
    variations: &[String],
    zone_code: &str,
    alias_map: &HashMap<String, String>,
) -> bool {
    if bucket_label.is_empty() {
        return false;
    }
    if variations.iter().any(|v| v == bucket_label) {
        return true;
    }
    alias_map.iter().any(|(raw_label, target_code)| {
        raw_label.trim().to_uppercase() == bucket_label
            && target_code.trim().eq_ignore_ascii_case(zone_code.trim())
    })
}

// ==========================================
// CacheRefresher 实现
// ==========================================
#[async_trait]
impl CacheRefresher for ZoneCapacityAggregator {
    fn name(&self) -> &'static str {
        "zone_quantities"
    }

    async fn refresh(&self, _warehouse_codes: &[String]) -> CacheResult<()> {
        self.update_current_quantities().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::kv_store::JsonFileStore;
    use crate::config::config_manager::ConfigManager;
    use crate::db::open_sqlite_connection;
    use crate::domain::binding::SourceBinding;
    use crate::domain::layout::{Component, Zone};
    use crate::repository::ingest_repo_impl::InventoryIngestRepositoryImpl;
    use crate::repository::layout_repo::LayoutStoreImpl;
    use std::sync::Mutex;

    struct TestCtx {
        _dir: tempfile::TempDir,
        aggregator: ZoneCapacityAggregator,
        repo: Arc<InventoryIngestRepositoryImpl>,
        layout: Arc<LayoutStoreImpl>,
        config: Arc<ConfigManager>,
    }

    fn setup() -> TestCtx {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let conn = Arc::new(Mutex::new(
            open_sqlite_connection(":memory:").expect("Failed to open test db"),
        ));
        let repo = Arc::new(InventoryIngestRepositoryImpl::new(conn.clone()));
        let layout = Arc::new(LayoutStoreImpl::new(conn.clone()));
        let config =
            Arc::new(ConfigManager::from_connection(conn).expect("Failed to create config"));
        let kv = Arc::new(JsonFileStore::new(dir.path().join("cache")));

        let aggregator = ZoneCapacityAggregator::new(
            kv,
            layout.clone(),
            repo.clone(),
            config.clone(),
        );
        TestCtx {
            _dir: dir,
            aggregator,
            repo,
            layout,
            config,
        }
    }

    fn rack(id: &str, location: &str, floor_capacities: Vec<f64>) -> Component {
        Component {
            id: id.to_string(),
            component_type: ComponentType::Rack,
            location: location.to_string(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            w: 100.0,
            h: 40.0,
            rows: 2,
            cols: 2,
            floors: Some(2),
            numbering: None,
            order_dir: None,
            per_floor_locations: None,
            floor_capacities: Some(floor_capacities),
            max_capacity: None,
        }
    }

    fn flat(id: &str, location: &str, max_capacity: f64) -> Component {
        Component {
            id: id.to_string(),
            component_type: ComponentType::Flat,
            location: location.to_string(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            w: 60.0,
            h: 60.0,
            rows: 1,
            cols: 1,
            floors: None,
            numbering: None,
            order_dir: None,
            per_floor_locations: None,
            floor_capacities: None,
            max_capacity: Some(max_capacity),
        }
    }

    fn zone(id: &str, code: &str, warehouse: &str, components: Vec<Component>) -> Zone {
        Zone {
            zone_id: id.to_string(),
            zone_code: code.to_string(),
            zone_name: Some(format!("{} 区", code)),
            warehouse_code: Some(warehouse.to_string()),
            grid: None,
            components,
        }
    }

    fn wms_row(source_id: &str, zone: &str, location: &str, item: &str, qty: f64) -> RawRow {
        let mut row = RawRow::new(
            source_id.to_string(),
            SourceType::Wms,
            "batch-1".to_string(),
            Utc::now(),
        );
        row.zone_code = Some(zone.to_string());
        row.location = Some(location.to_string());
        row.item_code = Some(item.to_string());
        row.available_qty = Some(qty);
        row
    }

    async fn bind_wms(repo: &InventoryIngestRepositoryImpl, warehouse: &str, source_id: &str) {
        let mut binding = WarehouseBinding::new(warehouse);
        binding.source_bindings.insert(
            source_id.to_string(),
            SourceBinding {
                source_type: SourceType::Wms,
                split_value: None,
            },
        );
        repo.upsert_binding(&binding).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_zone_capacities_computes_effective_capacity() {
        let ctx = setup();
        ctx.layout
            .replace_layout(&[zone(
                "z1",
                "F-zone",
                "WH01",
                vec![rack("c1", "EA2-F", vec![10.0, 10.0]), flat("c2", "562", 5.0)],
            )])
            .await
            .unwrap();

        let count = ctx.aggregator.update_zone_capacities().await.unwrap();
        assert_eq!(count, 1);

        let response = ctx.aggregator.get_zone_capacities(None).await.unwrap();
        let z1 = &response.zones[0];
        assert_eq!(z1.max_capacity, 25.0);
        assert_eq!(z1.item_count, 2);
        assert_eq!(z1.current_stock, 0);
        assert_eq!(z1.components[0].max_capacity, 20.0);
        assert_eq!(z1.components[1].max_capacity, 5.0);
    }

    #[tokio::test]
    async fn test_layout_refresh_preserves_stock_and_removes_gone_zones() {
        let ctx = setup();
        ctx.layout
            .replace_layout(&[
                zone("z1", "F-zone", "WH01", vec![rack("c1", "EA2-F", vec![10.0])]),
                zone("z2", "A-zone", "WH01", vec![flat("c2", "562", 5.0)]),
            ])
            .await
            .unwrap();
        ctx.aggregator.update_zone_capacities().await.unwrap();

        bind_wms(&ctx.repo, "WH01", "src-1").await;
        ctx.repo
            .insert_rows(&[wms_row("src-1", "FZONE", "EA2-F-01", "MAT-A", 5.0)])
            .await
            .unwrap();
        ctx.aggregator.update_current_quantities().await.unwrap();

        // z2 下架,布局重刷后 z1 在库保留、z2 移除
        ctx.layout
            .replace_layout(&[zone(
                "z1",
                "F-zone",
                "WH01",
                vec![rack("c1", "EA2-F", vec![10.0])],
            )])
            .await
            .unwrap();
        let count = ctx.aggregator.update_zone_capacities().await.unwrap();
        assert_eq!(count, 1);

        let z1 = ctx.aggregator.get_zone_capacity("z1").await.unwrap().unwrap();
        assert_eq!(z1.current_stock, 1);
        assert!(z1.last_sync.is_some());
        assert!(ctx.aggregator.get_zone_capacity("z2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_authoritative_sync_matches_rows_to_components() {
        let ctx = setup();
        ctx.layout
            .replace_layout(&[zone(
                "z1",
                "F-zone",
                "WH01",
                vec![rack("c1", "EA2-F", vec![10.0, 10.0])],
            )])
            .await
            .unwrap();
        ctx.aggregator.update_zone_capacities().await.unwrap();

        bind_wms(&ctx.repo, "WH01", "src-1").await;
        ctx.repo
            .insert_rows(&[
                wms_row("src-1", "FZONE", "EA2-F-01", "MAT-A", 5.0),
                wms_row("src-1", "F-ZONE", "EA2-F-01", "MAT-A", 3.0),
                wms_row("src-1", "FZONE", "EA2-F-02", "MAT-B", 2.0),
                // 未绑定来源的行不参与归属
                wms_row("src-9", "FZONE", "EA2-F-03", "MAT-C", 1.0),
            ])
            .await
            .unwrap();

        let updated = ctx.aggregator.update_current_quantities().await.unwrap();
        assert_eq!(updated, 1);

        let z1 = ctx.aggregator.get_zone_capacity("z1").await.unwrap().unwrap();
        assert_eq!(z1.current_stock, 3);
        assert!((z1.utilization_percentage - 15.0).abs() < 1e-9);

        let comp = &z1.components[0];
        assert_eq!(comp.current_stock, 3);
        // 货架组件把物料库位改写为组件位置
        assert!(comp.materials.iter().all(|m| m.location == "EA2-F"));

        // 展示投影与本轮合计同口径
        let display = z1.cached_display_data.as_ref().unwrap();
        assert_eq!(display.current_stock, 3);
        assert_eq!(display.total_items, 3);
        assert_eq!(display.unique_skus, 2);
    }

    #[tokio::test]
    async fn test_zone_alias_map_routes_foreign_labels() {
        let ctx = setup();
        ctx.layout
            .replace_layout(&[zone(
                "z2",
                "A-zone",
                "WH01",
                vec![flat("c2", "562", 10.0)],
            )])
            .await
            .unwrap();
        ctx.aggregator.update_zone_capacities().await.unwrap();

        ctx.config
            .set_config_value("zone_alias_map", r#"{"TRAILER": "A-zone"}"#)
            .unwrap();
        bind_wms(&ctx.repo, "WH01", "src-1").await;
        ctx.repo
            .insert_rows(&[
                wms_row("src-1", "TRAILER", "562-01", "MAT-A", 4.0),
                wms_row("src-1", "ELSEWHERE", "562-02", "MAT-B", 4.0),
            ])
            .await
            .unwrap();

        ctx.aggregator.update_current_quantities().await.unwrap();

        let z2 = ctx.aggregator.get_zone_capacity("z2").await.unwrap().unwrap();
        assert_eq!(z2.current_stock, 1);
        // 平面组件保留行库位
        assert_eq!(z2.components[0].materials[0].location, "562-01");
    }

    #[tokio::test]
    async fn test_fast_path_recomputes_from_prematched_materials() {
        let ctx = setup();
        ctx.layout
            .replace_layout(&[zone(
                "z1",
                "F-zone",
                "WH01",
                vec![rack("c1", "EA2-F", vec![10.0, 10.0])],
            )])
            .await
            .unwrap();
        ctx.aggregator.update_zone_capacities().await.unwrap();

        bind_wms(&ctx.repo, "WH01", "src-1").await;
        ctx.repo
            .insert_rows(&[
                wms_row("src-1", "FZONE", "EA2-F-01", "MAT-A", 5.0),
                wms_row("src-1", "FZONE", "EA2-F-02", "MAT-B", 2.0),
            ])
            .await
            .unwrap();
        ctx.aggregator.update_current_quantities().await.unwrap();

        // 快速路径不触库,结果与权威路径一致
        let updated = ctx.aggregator.update_current_quantities_fast().await.unwrap();
        assert_eq!(updated, 1);

        let z1 = ctx.aggregator.get_zone_capacity("z1").await.unwrap().unwrap();
        assert_eq!(z1.current_stock, 2);
        let display = z1.cached_display_data.as_ref().unwrap();
        assert_eq!(display.current_stock, 2);
        assert!((z1.utilization_percentage - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_get_zone_capacities_sorted_and_filtered() {
        let ctx = setup();
        ctx.layout
            .replace_layout(&[
                zone("z1", "F-zone", "WH01", vec![rack("c1", "EA2-F", vec![10.0])]),
                zone("z2", "A-zone", "WH01", vec![flat("c2", "562", 2.0)]),
                zone("z3", "B-zone", "WH02", vec![flat("c3", "900", 4.0)]),
            ])
            .await
            .unwrap();
        ctx.aggregator.update_zone_capacities().await.unwrap();

        bind_wms(&ctx.repo, "WH01", "src-1").await;
        ctx.repo
            .insert_rows(&[
                wms_row("src-1", "FZONE", "EA2-F-01", "MAT-A", 1.0),
                wms_row("src-1", "AZONE", "562-01", "MAT-B", 1.0),
                wms_row("src-1", "AZONE", "562-02", "MAT-C", 1.0),
            ])
            .await
            .unwrap();
        ctx.aggregator.update_current_quantities().await.unwrap();

        // A-zone 2/2=100%, F-zone 1/10=10%, B-zone 0%
        let all = ctx.aggregator.get_zone_capacities(None).await.unwrap();
        let codes: Vec<&str> = all.zones.iter().map(|z| z.zone_code.as_str()).collect();
        assert_eq!(codes, vec!["A-zone", "F-zone", "B-zone"]);
        assert!(all.last_updated.is_some());

        let wh2 = ctx.aggregator.get_zone_capacities(Some("WH02")).await.unwrap();
        assert_eq!(wh2.zones.len(), 1);
        assert_eq!(wh2.zones[0].zone_code, "B-zone");
    }

    #[tokio::test]
    async fn test_sync_with_empty_cache_is_noop() {
        let ctx = setup();
        let updated = ctx.aggregator.update_current_quantities().await.unwrap();
        assert_eq!(updated, 0);
    }
}
