// ==========================================
// 仓储库存同步系统 - 看板缓存
// ==========================================
// 职责: 看板三类指标的 TTL 读穿缓存（{cached_at, data} 信封）
// 键格式: {kind}_{仓库代码排序后下划线连接}
// 红线: 缓存条目损坏或过期一律重算,读取永不报错降级为空
// ==========================================

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::kv_store::KvStore;
use crate::cache::refresher::CacheRefresher;
use crate::cache::zone_capacity::ZoneCapacityAggregator;
use crate::config::sync_config_trait::SyncConfig;
use crate::domain::dashboard::{ExpiringItem, InventoryStats, ZoneUtilizationEntry};
use crate::domain::types::SourceType;
use crate::repository::ingest_repo::InventoryIngestRepository;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

const KIND_INVENTORY_STATS: &str = "inventory_stats";
const KIND_ZONE_UTILIZATION: &str = "zone_utilization";
const KIND_EXPIRING_ITEMS: &str = "expiring_items";

const ZONE_UTILIZATION_TOP_N: usize = 10;
const EXPIRING_ITEMS_TOP_N: usize = 20;

/// 看板缓存键: {kind}_{排序后的仓库代码}
fn cache_key(kind: &str, warehouse_codes: &[String]) -> String {
    let mut codes: Vec<&str> = warehouse_codes.iter().map(|c| c.as_str()).collect();
    codes.sort_unstable();
    format!("{}_{}", kind, codes.join("_"))
}

/// 缓存信封: 写入时间 + 指标数据
#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope<T> {
    cached_at: DateTime<Utc>,
    data: T,
}

// ==========================================
// DashboardCache
// ==========================================
pub struct DashboardCache {
    kv: Arc<dyn KvStore>,
    repo: Arc<dyn InventoryIngestRepository>,
    aggregator: Arc<ZoneCapacityAggregator>,
    config: Arc<dyn SyncConfig>,
}

impl DashboardCache {
    pub fn new(
        kv: Arc<dyn KvStore>,
        repo: Arc<dyn InventoryIngestRepository>,
        aggregator: Arc<ZoneCapacityAggregator>,
        config: Arc<dyn SyncConfig>,
    ) -> Self {
        Self {
            kv,
            repo,
            aggregator,
            config,
        }
    }

    async fn ttl_minutes(&self) -> CacheResult<i64> {
        self.config
            .get_dashboard_cache_ttl_minutes()
            .await
            .map_err(|e| CacheError::Config(e.to_string()))
    }

    /// 读取未过期的缓存条目;缺失、损坏、过期均为未命中
    async fn load_fresh<T: DeserializeOwned>(&self, key: &str, ttl_minutes: i64) -> Option<T> {
        let value = self.kv.get(key).await.ok()??;
        let envelope: CacheEnvelope<T> = serde_json::from_value(value).ok()?;
        if Utc::now() - envelope.cached_at < Duration::minutes(ttl_minutes) {
            tracing::debug!(key = key, "看板缓存命中");
            Some(envelope.data)
        } else {
            tracing::debug!(key = key, "看板缓存过期,重新计算");
            None
        }
    }

    async fn store<T: Serialize>(&self, key: &str, data: &T) -> CacheResult<()> {
        let envelope = serde_json::to_value(CacheEnvelope {
            cached_at: Utc::now(),
            data,
        })?;
        self.kv.set(key, &envelope).await
    }

    /// 库存总览指标（TTL 读穿）
    ///
    /// # 参数
    /// - warehouse_codes: 只参与缓存键;指标口径为全量行
    /// - force: 跳过缓存强制重算
    pub async fn get_inventory_stats(
        &self,
        warehouse_codes: &[String],
        force: bool,
    ) -> CacheResult<InventoryStats> {
        let key = cache_key(KIND_INVENTORY_STATS, warehouse_codes);
        if !force {
            let ttl = self.ttl_minutes().await?;
            if let Some(stats) = self.load_fresh::<InventoryStats>(&key, ttl).await {
                return Ok(stats);
            }
        }

        let stats = self.compute_inventory_stats().await?;
        self.store(&key, &stats).await?;
        Ok(stats)
    }

    async fn compute_inventory_stats(&self) -> CacheResult<InventoryStats> {
        let wms_rows = self.repo.scan_rows(SourceType::Wms).await?;
        let sap_rows = self.repo.scan_rows(SourceType::Sap).await?;

        let wms_quantity: f64 = wms_rows.iter().filter_map(|r| r.available_qty).sum();
        let sap_quantity: f64 = sap_rows.iter().map(|r| r.sap_stock_quantity()).sum();

        let unique_items: HashSet<&str> = wms_rows
            .iter()
            .chain(sap_rows.iter())
            .filter_map(|r| r.item_code.as_deref())
            .filter(|code| !code.is_empty())
            .collect();

        Ok(InventoryStats {
            total_quantity: wms_quantity + sap_quantity,
            wms_quantity,
            sap_quantity,
            unique_items: unique_items.len() as i64,
            last_updated: Utc::now(),
        })
    }

    /// 库区占用排行（TTL 读穿,前 10）
    pub async fn get_zone_utilization(
        &self,
        warehouse_codes: &[String],
        force: bool,
    ) -> CacheResult<Vec<ZoneUtilizationEntry>> {
        let key = cache_key(KIND_ZONE_UTILIZATION, warehouse_codes);
        if !force {
            let ttl = self.ttl_minutes().await?;
            if let Some(entries) = self.load_fresh::<Vec<ZoneUtilizationEntry>>(&key, ttl).await {
                return Ok(entries);
            }
        }

        let entries = self.compute_zone_utilization(warehouse_codes).await?;
        self.store(&key, &entries).await?;
        Ok(entries)
    }

    async fn compute_zone_utilization(
        &self,
        warehouse_codes: &[String],
    ) -> CacheResult<Vec<ZoneUtilizationEntry>> {
        let response = self.aggregator.get_zone_capacities(None).await?;

        let mut entries: Vec<ZoneUtilizationEntry> = response
            .zones
            .iter()
            .filter(|zone| {
                if warehouse_codes.is_empty() {
                    return true;
                }
                zone.warehouse_code
                    .as_deref()
                    .map(|wh| warehouse_codes.iter().any(|c| c == wh))
                    .unwrap_or(false)
            })
            .map(|zone| {
                let avg_component_utilization = if zone.components.is_empty() {
                    0.0
                } else {
                    zone.components
                        .iter()
                        .map(|c| c.utilization_percentage)
                        .sum::<f64>()
                        / zone.components.len() as f64
                };
                let utilization_percentage = if zone.max_capacity > 0.0 {
                    ((zone.current_stock as f64 / zone.max_capacity) * 100.0).min(100.0)
                } else {
                    0.0
                };
                ZoneUtilizationEntry {
                    zone_id: zone.zone_id.clone(),
                    zone_code: zone.zone_code.clone(),
                    zone_name: zone.zone_name.clone(),
                    current_quantity: zone.current_stock,
                    total_capacity: zone.max_capacity,
                    utilization_percentage,
                    avg_component_utilization: (avg_component_utilization * 100.0).round() / 100.0,
                    component_count: zone.components.len() as i64,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.utilization_percentage
                .partial_cmp(&a.utilization_percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(ZONE_UTILIZATION_TOP_N);
        Ok(entries)
    }

    /// 临期物料列表（TTL 读穿,剩余天数升序前 20）
    pub async fn get_expiring_items(
        &self,
        warehouse_codes: &[String],
        force: bool,
    ) -> CacheResult<Vec<ExpiringItem>> {
        let key = cache_key(KIND_EXPIRING_ITEMS, warehouse_codes);
        if !force {
            let ttl = self.ttl_minutes().await?;
            if let Some(items) = self.load_fresh::<Vec<ExpiringItem>>(&key, ttl).await {
                return Ok(items);
            }
        }

        let items = self.compute_expiring_items().await?;
        self.store(&key, &items).await?;
        Ok(items)
    }

    async fn compute_expiring_items(&self) -> CacheResult<Vec<ExpiringItem>> {
        let window_days = self
            .config
            .get_expiring_window_days()
            .await
            .map_err(|e| CacheError::Config(e.to_string()))?;
        let today = Utc::now().date_naive();
        let cutoff = today + Duration::days(window_days);

        let rows = self.repo.expiring_rows(cutoff).await?;
        let mut items: Vec<ExpiringItem> = rows
            .iter()
            .filter_map(|row| {
                let valid_date = row.valid_date?;
                Some(ExpiringItem {
                    item_code: row.item_code.clone().unwrap_or_default(),
                    location: row.location.clone(),
                    quantity: row.available_qty.unwrap_or(0.0),
                    valid_date,
                    days_until_expiry: (valid_date - today).num_days().max(0),
                })
            })
            .collect();

        items.sort_by_key(|item| item.days_until_expiry);
        items.truncate(EXPIRING_ITEMS_TOP_N);
        Ok(items)
    }

    /// 强制重建三类指标缓存（摄取完成后调用）
    pub async fn rebuild_for(&self, warehouse_codes: &[String]) -> CacheResult<()> {
        self.get_inventory_stats(warehouse_codes, true).await?;
        self.get_zone_utilization(warehouse_codes, true).await?;
        self.get_expiring_items(warehouse_codes, true).await?;
        Ok(())
    }

    /// 清除看板缓存条目
    ///
    /// # 参数
    /// - pattern: 键包含该子串的条目被删除;空串清除全部看板条目
    ///
    /// # 返回
    /// - usize: 删除的条目数
    pub async fn clear_cache(&self, pattern: &str) -> CacheResult<usize> {
        if pattern.is_empty() {
            let mut removed = 0;
            for kind in [
                KIND_INVENTORY_STATS,
                KIND_ZONE_UTILIZATION,
                KIND_EXPIRING_ITEMS,
            ] {
                removed += self.kv.delete_matching(kind).await?;
            }
            return Ok(removed);
        }
        self.kv.delete_matching(pattern).await
    }
}

// ==========================================
// CacheRefresher 实现
// ==========================================
#[async_trait]
impl CacheRefresher for DashboardCache {
    fn name(&self) -> &'static str {
        "dashboard_cache"
    }

    async fn refresh(&self, warehouse_codes: &[String]) -> CacheResult<()> {
        self.rebuild_for(warehouse_codes).await
    }
}
