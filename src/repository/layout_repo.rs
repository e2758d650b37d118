// ==========================================
// 仓储库存同步系统 - 库区布局存储
// ==========================================
// 职责: zones / zone_components 表的读写
// 红线: 布局由画布编辑器整体替换,不做逐组件修补
// ==========================================

use crate::domain::layout::{Component, Zone};
use crate::domain::types::ComponentType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// LayoutStore Trait
// ==========================================
// 用途: 容量聚合读取布局定义;种子/测试整体写入
#[async_trait]
pub trait LayoutStore: Send + Sync {
    /// 读取库区及其组件,可按仓库过滤
    async fn zones_with_components(&self, warehouse_code: Option<&str>)
        -> RepositoryResult<Vec<Zone>>;

    /// 整体替换布局（先清空再写入,单事务）
    async fn replace_layout(&self, zones: &[Zone]) -> RepositoryResult<()>;
}

fn invalid_text(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn map_component_row(row: &Row) -> SqliteResult<(String, Component)> {
    let zone_id: String = row.get(0)?;
    let component_type_str: String = row.get(2)?;
    let component_type = ComponentType::parse(&component_type_str)
        .ok_or_else(|| invalid_text(2, format!("未知组件类型: {}", component_type_str)))?;

    let per_floor_locations_json: Option<String> = row.get(13)?;
    let per_floor_locations = match per_floor_locations_json {
        Some(json) => {
            Some(serde_json::from_str(&json).map_err(|e| invalid_text(13, e.to_string()))?)
        }
        None => None,
    };
    let floor_capacities_json: Option<String> = row.get(14)?;
    let floor_capacities = match floor_capacities_json {
        Some(json) => {
            Some(serde_json::from_str(&json).map_err(|e| invalid_text(14, e.to_string()))?)
        }
        None => None,
    };

    let component = Component {
        id: row.get(1)?,
        component_type,
        location: row.get(3)?,
        x: row.get(4)?,
        y: row.get(5)?,
        rotation: row.get(6)?,
        w: row.get(7)?,
        h: row.get(8)?,
        rows: row.get(9)?,
        cols: row.get(10)?,
        floors: row.get(11)?,
        numbering: row.get(12)?,
        per_floor_locations,
        floor_capacities,
        order_dir: row.get(15)?,
        max_capacity: row.get(16)?,
    };
    Ok((zone_id, component))
}

// ==========================================
// LayoutStoreImpl
// ==========================================
pub struct LayoutStoreImpl {
    conn: Arc<Mutex<Connection>>,
}

impl LayoutStoreImpl {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let store = Self { conn };
        if let Err(e) = store.ensure_tables() {
            tracing::warn!("初始化布局表失败（可能已存在或权限不足）: {}", e);
        }
        store
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS zones (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                name TEXT,
                warehouse_code TEXT,
                grid_json TEXT
            );

            CREATE TABLE IF NOT EXISTS zone_components (
                id TEXT PRIMARY KEY,
                zone_id TEXT NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
                component_type TEXT NOT NULL,
                location TEXT NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                rotation REAL NOT NULL DEFAULT 0,
                w REAL NOT NULL,
                h REAL NOT NULL,
                rows INTEGER NOT NULL,
                cols INTEGER NOT NULL,
                floors INTEGER,
                numbering TEXT,
                per_floor_locations_json TEXT,
                floor_capacities_json TEXT,
                order_dir TEXT,
                max_capacity REAL
            );
            CREATE INDEX IF NOT EXISTS idx_zone_components_zone
                ON zone_components(zone_id);
            "#,
        )?;
        Ok(())
    }

    /// 读取全部组件,按库区分组
    fn load_components(
        conn: &Connection,
    ) -> RepositoryResult<HashMap<String, Vec<Component>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT zone_id, id, component_type, location, x, y, rotation, w, h,
                   rows, cols, floors, numbering, per_floor_locations_json,
                   floor_capacities_json, order_dir, max_capacity
            FROM zone_components
            ORDER BY zone_id, id
            "#,
        )?;
        let rows = stmt.query_map([], map_component_row)?;
        let mut by_zone: HashMap<String, Vec<Component>> = HashMap::new();
        for row in rows {
            let (zone_id, component) = row?;
            by_zone.entry(zone_id).or_default().push(component);
        }
        Ok(by_zone)
    }
}

#[async_trait]
impl LayoutStore for LayoutStoreImpl {
    async fn zones_with_components(
        &self,
        warehouse_code: Option<&str>,
    ) -> RepositoryResult<Vec<Zone>> {
        let conn = self.get_conn()?;
        let mut by_zone = Self::load_components(&conn)?;

        let map_zone = |row: &Row| -> SqliteResult<(String, String, Option<String>, Option<String>, Option<String>)> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        };

        let mut zone_rows = Vec::new();
        match warehouse_code {
            Some(code) => {
                let mut stmt = conn.prepare(
                    "SELECT id, code, name, warehouse_code, grid_json FROM zones \
                     WHERE warehouse_code = ?1 ORDER BY code",
                )?;
                let rows = stmt.query_map(params![code], map_zone)?;
                for row in rows {
                    zone_rows.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, code, name, warehouse_code, grid_json FROM zones ORDER BY code",
                )?;
                let rows = stmt.query_map([], map_zone)?;
                for row in rows {
                    zone_rows.push(row?);
                }
            }
        }

        let mut zones = Vec::with_capacity(zone_rows.len());
        for (id, code, name, warehouse, grid_json) in zone_rows {
            let grid = match grid_json {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };
            let components = by_zone.remove(&id).unwrap_or_default();
            zones.push(Zone {
                zone_id: id,
                zone_code: code,
                zone_name: name,
                warehouse_code: warehouse,
                grid,
                components,
            });
        }
        Ok(zones)
    }

    async fn replace_layout(&self, zones: &[Zone]) -> RepositoryResult<()> {
        // JSON 字段先序列化,失败不进入事务
        let mut prepared = Vec::with_capacity(zones.len());
        for zone in zones {
            let grid_json = zone.grid.as_ref().map(serde_json::to_string).transpose()?;
            let mut components = Vec::with_capacity(zone.components.len());
            for comp in &zone.components {
                let per_floor_json = comp
                    .per_floor_locations
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                let caps_json = comp
                    .floor_capacities
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                components.push((comp, per_floor_json, caps_json));
            }
            prepared.push((zone, grid_json, components));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute("DELETE FROM zone_components", [])?;
        tx.execute("DELETE FROM zones", [])?;

        {
            let mut zone_stmt = tx.prepare(
                r#"
                INSERT INTO zones (id, code, name, warehouse_code, grid_json)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            let mut comp_stmt = tx.prepare(
                r#"
                INSERT INTO zone_components (
                    id, zone_id, component_type, location, x, y, rotation, w, h,
                    rows, cols, floors, numbering, per_floor_locations_json,
                    floor_capacities_json, order_dir, max_capacity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
            )?;

            for (zone, grid_json, components) in &prepared {
                zone_stmt.execute(params![
                    zone.zone_id,
                    zone.zone_code,
                    zone.zone_name,
                    zone.warehouse_code,
                    grid_json,
                ])?;
                for (comp, per_floor_json, caps_json) in components {
                    comp_stmt.execute(params![
                        comp.id,
                        zone.zone_id,
                        comp.component_type.to_db_str(),
                        comp.location,
                        comp.x,
                        comp.y,
                        comp.rotation,
                        comp.w,
                        comp.h,
                        comp.rows,
                        comp.cols,
                        comp.floors,
                        comp.numbering,
                        per_floor_json,
                        caps_json,
                        comp.order_dir,
                        comp.max_capacity,
                    ])?;
                }
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}
