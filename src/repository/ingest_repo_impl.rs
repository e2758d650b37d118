// ==========================================
// 仓储库存同步系统 - 摄取 Repository 实现
// ==========================================
// 职责: 实现摄取链路数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则,只做数据 CRUD
// ==========================================

use crate::domain::binding::{SourceBinding, WarehouseBinding};
use crate::domain::inventory::{CatalogEntry, RawRow};
use crate::domain::source::SheetSource;
use crate::domain::types::SourceType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ingest_repo::InventoryIngestRepository;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 将文本列的解析失败转换为 rusqlite 转换错误
fn invalid_text(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn parse_source_type(idx: usize, raw: &str) -> SqliteResult<SourceType> {
    SourceType::parse(raw).ok_or_else(|| invalid_text(idx, format!("未知来源类型: {}", raw)))
}

fn map_source_row(row: &Row) -> SqliteResult<SheetSource> {
    let id: String = row.get(0)?;
    let label: String = row.get(1)?;
    let source_type_str: String = row.get(2)?;
    let spreadsheet_id: String = row.get(3)?;
    let sheet_name: String = row.get(4)?;
    let classification_json: Option<String> = row.get(5)?;
    let created_at: DateTime<Utc> = row.get(6)?;
    let updated_at: DateTime<Utc> = row.get(7)?;
    let created_by: Option<String> = row.get(8)?;

    let classification = match classification_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| invalid_text(5, e.to_string()))?,
        None => Default::default(),
    };

    Ok(SheetSource {
        id,
        label,
        source_type: parse_source_type(2, &source_type_str)?,
        spreadsheet_id,
        sheet_name,
        classification,
        created_at,
        updated_at,
        created_by,
    })
}

fn map_binding_row(row: &Row) -> SqliteResult<WarehouseBinding> {
    let warehouse_code: String = row.get(0)?;
    let source_bindings_json: String = row.get(1)?;
    let updated_at: DateTime<Utc> = row.get(2)?;

    let source_bindings: HashMap<String, SourceBinding> =
        serde_json::from_str(&source_bindings_json)
            .map_err(|e| invalid_text(1, e.to_string()))?;

    Ok(WarehouseBinding {
        warehouse_code,
        source_bindings,
        updated_at,
    })
}

fn map_raw_row(row: &Row) -> SqliteResult<RawRow> {
    let source_type_str: String = row.get(1)?;
    let extras_json: Option<String> = row.get(20)?;
    let extras: Map<String, Value> = match extras_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| invalid_text(20, e.to_string()))?,
        None => Map::new(),
    };

    Ok(RawRow {
        source_id: row.get(0)?,
        source_type: parse_source_type(1, &source_type_str)?,
        split_key: row.get(2)?,
        batch_id: row.get(3)?,
        fetched_at: row.get(4)?,
        item_code: row.get(5)?,
        description: row.get(6)?,
        unit: row.get(7)?,
        zone_code: row.get(8)?,
        location: row.get(9)?,
        lot_key: row.get(10)?,
        available_qty: row.get(11)?,
        total_qty: row.get(12)?,
        unrestricted_qty: row.get(13)?,
        quality_inspection_qty: row.get(14)?,
        blocked_qty: row.get(15)?,
        returns_qty: row.get(16)?,
        inbound_date: row.get(17)?,
        valid_date: row.get(18)?,
        production_date: row.get(19)?,
        extras,
    })
}

fn map_catalog_row(row: &Row) -> SqliteResult<CatalogEntry> {
    let source_system_str: String = row.get(3)?;
    Ok(CatalogEntry {
        item_code: row.get(0)?,
        description: row.get(1)?,
        unit: row.get(2)?,
        source_system: parse_source_type(3, &source_system_str)?,
        last_seen_at: row.get(4)?,
    })
}

/// 原始行查询的统一列清单（与 map_raw_row 的下标一一对应）
const RAW_ROW_COLUMNS: &str = "source_id, source_type, split_key, batch_id, fetched_at, \
     item_code, description, unit, zone_code, location, lot_key, \
     available_qty, total_qty, unrestricted_qty, quality_inspection_qty, \
     blocked_qty, returns_qty, inbound_date, valid_date, production_date, extras_json";

// ==========================================
// InventoryIngestRepositoryImpl
// ==========================================
pub struct InventoryIngestRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryIngestRepositoryImpl {
    /// 创建 Repository 实例并确保表结构存在
    ///
    /// # 参数
    /// - conn: 共享的 SQLite 连接
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let repo = Self { conn };
        if let Err(e) = repo.ensure_tables() {
            tracing::warn!("初始化摄取相关表失败（可能已存在或权限不足）: {}", e);
        }
        repo
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 建表（幂等）
    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sheet_sources (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                source_type TEXT NOT NULL,
                spreadsheet_id TEXT NOT NULL,
                sheet_name TEXT NOT NULL,
                classification_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                created_by TEXT
            );

            CREATE TABLE IF NOT EXISTS warehouse_bindings (
                warehouse_code TEXT PRIMARY KEY,
                source_bindings_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS inventory_raw_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                source_type TEXT NOT NULL,
                split_key TEXT,
                batch_id TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                item_code TEXT,
                description TEXT,
                unit TEXT,
                zone_code TEXT,
                location TEXT,
                lot_key TEXT,
                available_qty REAL,
                total_qty REAL,
                unrestricted_qty REAL,
                quality_inspection_qty REAL,
                blocked_qty REAL,
                returns_qty REAL,
                inbound_date TEXT,
                valid_date TEXT,
                production_date TEXT,
                extras_json TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_raw_rows_pair
                ON inventory_raw_rows(source_id, split_key);
            CREATE INDEX IF NOT EXISTS idx_raw_rows_type
                ON inventory_raw_rows(source_type);
            CREATE INDEX IF NOT EXISTS idx_raw_rows_batch
                ON inventory_raw_rows(batch_id);

            CREATE TABLE IF NOT EXISTS materials_catalog (
                item_code TEXT PRIMARY KEY,
                description TEXT,
                unit TEXT,
                source_system TEXT NOT NULL,
                last_seen_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl InventoryIngestRepository for InventoryIngestRepositoryImpl {
    // ===== 表格来源 =====

    async fn upsert_source(&self, source: &SheetSource) -> RepositoryResult<()> {
        let classification_json = serde_json::to_string(&source.classification)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO sheet_sources (
                id, label, source_type, spreadsheet_id, sheet_name,
                classification_json, created_at, updated_at, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                source.id,
                source.label,
                source.source_type.to_db_str(),
                source.spreadsheet_id,
                source.sheet_name,
                classification_json,
                source.created_at,
                source.updated_at,
                source.created_by,
            ],
        )?;
        Ok(())
    }

    async fn get_source(&self, source_id: &str) -> RepositoryResult<Option<SheetSource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, label, source_type, spreadsheet_id, sheet_name,
                   classification_json, created_at, updated_at, created_by
            FROM sheet_sources
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![source_id], map_source_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn list_sources(
        &self,
        source_type: Option<SourceType>,
    ) -> RepositoryResult<Vec<SheetSource>> {
        let conn = self.get_conn()?;
        let mut result = Vec::new();
        match source_type {
            Some(st) => {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, label, source_type, spreadsheet_id, sheet_name,
                           classification_json, created_at, updated_at, created_by
                    FROM sheet_sources
                    WHERE source_type = ?1
                    ORDER BY label
                    "#,
                )?;
                let rows = stmt.query_map(params![st.to_db_str()], map_source_row)?;
                for row in rows {
                    result.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, label, source_type, spreadsheet_id, sheet_name,
                           classification_json, created_at, updated_at, created_by
                    FROM sheet_sources
                    ORDER BY label
                    "#,
                )?;
                let rows = stmt.query_map([], map_source_row)?;
                for row in rows {
                    result.push(row?);
                }
            }
        }
        Ok(result)
    }

    async fn delete_source(&self, source_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM sheet_sources WHERE id = ?1",
            params![source_id],
        )?;
        Ok(affected > 0)
    }

    // ===== 仓库绑定 =====

    async fn upsert_binding(&self, binding: &WarehouseBinding) -> RepositoryResult<()> {
        let source_bindings_json = serde_json::to_string(&binding.source_bindings)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO warehouse_bindings (
                warehouse_code, source_bindings_json, updated_at
            ) VALUES (?1, ?2, ?3)
            "#,
            params![
                binding.warehouse_code,
                source_bindings_json,
                binding.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn get_binding(
        &self,
        warehouse_code: &str,
    ) -> RepositoryResult<Option<WarehouseBinding>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT warehouse_code, source_bindings_json, updated_at
            FROM warehouse_bindings
            WHERE warehouse_code = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![warehouse_code], map_binding_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn list_bindings(&self) -> RepositoryResult<Vec<WarehouseBinding>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT warehouse_code, source_bindings_json, updated_at
            FROM warehouse_bindings
            ORDER BY warehouse_code
            "#,
        )?;
        let rows = stmt.query_map([], map_binding_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    async fn delete_binding(&self, warehouse_code: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM warehouse_bindings WHERE warehouse_code = ?1",
            params![warehouse_code],
        )?;
        Ok(affected > 0)
    }

    // ===== 原始行 =====

    async fn insert_rows(&self, rows: &[RawRow]) -> RepositoryResult<usize> {
        // extras 先整体序列化,失败不进入事务
        let mut extras_jsons = Vec::with_capacity(rows.len());
        for row in rows {
            extras_jsons.push(serde_json::to_string(&row.extras)?);
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO inventory_raw_rows (
                    source_id, source_type, split_key, batch_id, fetched_at,
                    item_code, description, unit, zone_code, location, lot_key,
                    available_qty, total_qty, unrestricted_qty, quality_inspection_qty,
                    blocked_qty, returns_qty, inbound_date, valid_date, production_date,
                    extras_json
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
                )
                "#,
            )?;

            for (row, extras_json) in rows.iter().zip(extras_jsons.iter()) {
                stmt.execute(params![
                    row.source_id,
                    row.source_type.to_db_str(),
                    row.split_key,
                    row.batch_id,
                    row.fetched_at,
                    row.item_code,
                    row.description,
                    row.unit,
                    row.zone_code,
                    row.location,
                    row.lot_key,
                    row.available_qty,
                    row.total_qty,
                    row.unrestricted_qty,
                    row.quality_inspection_qty,
                    row.blocked_qty,
                    row.returns_qty,
                    row.inbound_date,
                    row.valid_date,
                    row.production_date,
                    extras_json,
                ])?;
                count += 1;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    async fn clear_rows(&self, source_type: SourceType) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM inventory_raw_rows WHERE source_type = ?1",
            params![source_type.to_db_str()],
        )?;
        Ok(affected)
    }

    async fn scan_rows(&self, source_type: SourceType) -> RepositoryResult<Vec<RawRow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM inventory_raw_rows WHERE source_type = ?1 ORDER BY id",
            RAW_ROW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![source_type.to_db_str()], map_raw_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    async fn rows_for_pair(
        &self,
        source_id: &str,
        split_value: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> RepositoryResult<Vec<RawRow>> {
        let conn = self.get_conn()?;
        let mut result = Vec::new();
        match split_value {
            Some(split) => {
                let sql = format!(
                    "SELECT {} FROM inventory_raw_rows \
                     WHERE source_id = ?1 AND split_key = ?2 \
                     ORDER BY id LIMIT ?3 OFFSET ?4",
                    RAW_ROW_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    params![source_id, split, limit as i64, offset as i64],
                    map_raw_row,
                )?;
                for row in rows {
                    result.push(row?);
                }
            }
            // 未拆分的绑定返回该来源全部行,不按 split_key 过滤
            None => {
                let sql = format!(
                    "SELECT {} FROM inventory_raw_rows \
                     WHERE source_id = ?1 \
                     ORDER BY id LIMIT ?2 OFFSET ?3",
                    RAW_ROW_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(
                    params![source_id, limit as i64, offset as i64],
                    map_raw_row,
                )?;
                for row in rows {
                    result.push(row?);
                }
            }
        }
        Ok(result)
    }

    async fn expiring_rows(&self, cutoff: NaiveDate) -> RepositoryResult<Vec<RawRow>> {
        let conn = self.get_conn()?;
        // valid_date 以 ISO 文本存储,字典序即日期序
        let sql = format!(
            "SELECT {} FROM inventory_raw_rows \
             WHERE source_type = 'wms' AND valid_date IS NOT NULL AND valid_date <= ?1 \
             ORDER BY valid_date",
            RAW_ROW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cutoff], map_raw_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    async fn count_batch_rows(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM inventory_raw_rows WHERE batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ===== 物料目录 =====

    async fn upsert_catalog_entries(&self, entries: &[CatalogEntry]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO materials_catalog (
                    item_code, description, unit, source_system, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.item_code,
                    entry.description,
                    entry.unit,
                    entry.source_system.to_db_str(),
                    entry.last_seen_at,
                ])?;
                count += 1;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    async fn get_catalog_entry(&self, item_code: &str) -> RepositoryResult<Option<CatalogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT item_code, description, unit, source_system, last_seen_at
            FROM materials_catalog
            WHERE item_code = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![item_code], map_catalog_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn list_catalog(&self) -> RepositoryResult<Vec<CatalogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT item_code, description, unit, source_system, last_seen_at
            FROM materials_catalog
            ORDER BY item_code
            "#,
        )?;
        let rows = stmt.query_map([], map_catalog_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_sqlite_connection;
    use crate::domain::source::ClassificationConfig;

    fn setup_test_repo() -> InventoryIngestRepositoryImpl {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open test db");
        InventoryIngestRepositoryImpl::new(Arc::new(Mutex::new(conn)))
    }

    fn sample_source(id: &str, source_type: SourceType) -> SheetSource {
        let mut source = SheetSource::new(id, &format!("来源 {}", id), source_type, "sheet-doc-1");
        source.classification = ClassificationConfig {
            item_col: Some("Item Code".to_string()),
            qty_col: Some("Available Qty.".to_string()),
            ..Default::default()
        };
        source
    }

    fn sample_row(source_id: &str, batch_id: &str) -> RawRow {
        let mut row = RawRow::new(
            source_id.to_string(),
            SourceType::Wms,
            batch_id.to_string(),
            Utc::now(),
        );
        row.item_code = Some("A1".to_string());
        row.location = Some("Z-01".to_string());
        row.available_qty = Some(10.0);
        row
    }

    #[tokio::test]
    async fn test_source_round_trip() {
        let repo = setup_test_repo();
        let source = sample_source("src-1", SourceType::Wms);
        repo.upsert_source(&source).await.expect("upsert failed");

        let loaded = repo
            .get_source("src-1")
            .await
            .expect("get failed")
            .expect("source missing");
        assert_eq!(loaded.label, "来源 src-1");
        assert_eq!(loaded.source_type, SourceType::Wms);
        assert_eq!(loaded.classification.item_col.as_deref(), Some("Item Code"));

        assert!(repo.get_source("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sources_filters_by_type() {
        let repo = setup_test_repo();
        repo.upsert_source(&sample_source("w1", SourceType::Wms))
            .await
            .unwrap();
        repo.upsert_source(&sample_source("s1", SourceType::Sap))
            .await
            .unwrap();

        let all = repo.list_sources(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let wms_only = repo.list_sources(Some(SourceType::Wms)).await.unwrap();
        assert_eq!(wms_only.len(), 1);
        assert_eq!(wms_only[0].id, "w1");
    }

    #[tokio::test]
    async fn test_binding_round_trip_and_delete() {
        let repo = setup_test_repo();
        let mut source_bindings = HashMap::new();
        source_bindings.insert(
            "src-1::1000".to_string(),
            SourceBinding {
                source_type: SourceType::Wms,
                split_value: None,
            },
        );
        let binding = WarehouseBinding {
            warehouse_code: "WH01".to_string(),
            source_bindings,
            updated_at: Utc::now(),
        };
        repo.upsert_binding(&binding).await.unwrap();

        let loaded = repo.get_binding("WH01").await.unwrap().expect("binding missing");
        assert_eq!(loaded.source_bindings.len(), 1);

        let listed = repo.list_bindings().await.unwrap();
        assert_eq!(listed.len(), 1);

        assert!(repo.delete_binding("WH01").await.unwrap());
        assert!(!repo.delete_binding("WH01").await.unwrap());
        assert!(repo.get_binding("WH01").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rows_and_count_batch() {
        let repo = setup_test_repo();
        let rows = vec![sample_row("src-1", "batch-1"), sample_row("src-1", "batch-1")];
        let inserted = repo.insert_rows(&rows).await.unwrap();
        assert_eq!(inserted, 2);

        assert_eq!(repo.count_batch_rows("batch-1").await.unwrap(), 2);
        assert_eq!(repo.count_batch_rows("batch-2").await.unwrap(), 0);

        let scanned = repo.scan_rows(SourceType::Wms).await.unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].item_code.as_deref(), Some("A1"));
        assert_eq!(scanned[0].available_qty, Some(10.0));
    }

    #[tokio::test]
    async fn test_clear_rows_only_targets_type() {
        let repo = setup_test_repo();
        let mut sap_row = sample_row("src-2", "batch-1");
        sap_row.source_type = SourceType::Sap;
        repo.insert_rows(&[sample_row("src-1", "batch-1"), sap_row])
            .await
            .unwrap();

        let cleared = repo.clear_rows(SourceType::Wms).await.unwrap();
        assert_eq!(cleared, 1);
        assert!(repo.scan_rows(SourceType::Wms).await.unwrap().is_empty());
        assert_eq!(repo.scan_rows(SourceType::Sap).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rows_for_pair_split_filter_and_paging() {
        let repo = setup_test_repo();
        let mut rows = Vec::new();
        for i in 0..5 {
            let mut row = sample_row("src-1", "batch-1");
            row.split_key = Some("1000".to_string());
            row.item_code = Some(format!("A{}", i));
            rows.push(row);
        }
        let mut other = sample_row("src-1", "batch-1");
        other.split_key = Some("2000".to_string());
        rows.push(other);
        repo.insert_rows(&rows).await.unwrap();

        let filtered = repo
            .rows_for_pair("src-1", Some("1000"), 100, 0)
            .await
            .unwrap();
        assert_eq!(filtered.len(), 5);

        let page = repo
            .rows_for_pair("src-1", Some("1000"), 2, 2)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].item_code.as_deref(), Some("A2"));

        // 未拆分绑定: 返回该来源全部行
        let unfiltered = repo.rows_for_pair("src-1", None, 100, 0).await.unwrap();
        assert_eq!(unfiltered.len(), 6);
    }

    #[tokio::test]
    async fn test_expiring_rows_window() {
        let repo = setup_test_repo();
        let mut soon = sample_row("src-1", "batch-1");
        soon.valid_date = Some(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        let mut later = sample_row("src-1", "batch-1");
        later.valid_date = Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let mut none = sample_row("src-1", "batch-1");
        none.valid_date = None;
        repo.insert_rows(&[soon, later, none]).await.unwrap();

        let cutoff = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let expiring = repo.expiring_rows(cutoff).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(
            expiring[0].valid_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
        );
    }

    #[tokio::test]
    async fn test_catalog_upsert_idempotent() {
        let repo = setup_test_repo();
        let first_seen = Utc::now();
        let entry = CatalogEntry {
            item_code: "A1".to_string(),
            description: Some("物料A1".to_string()),
            unit: Some("EA".to_string()),
            source_system: SourceType::Wms,
            last_seen_at: first_seen,
        };
        repo.upsert_catalog_entries(&[entry.clone()]).await.unwrap();

        let mut updated = entry.clone();
        updated.last_seen_at = first_seen + chrono::Duration::minutes(5);
        repo.upsert_catalog_entries(&[updated]).await.unwrap();

        let catalog = repo.list_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog[0].last_seen_at > first_seen);
    }
}
