// ==========================================
// 仓储库存同步系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::config::sync_config_trait::SyncConfig;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        manager.ensure_tables()?;
        Ok(manager)
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        let manager = Self { conn };
        manager.ensure_tables()?;
        Ok(manager)
    }

    fn ensure_tables(&self) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Utc::now()],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照
    ///
    /// # 返回
    /// - HashMap<String, String>: key → value
    ///
    /// # 用途
    /// - 诊断输出、问题排查时记录当前完整配置
    pub fn config_snapshot(&self) -> Result<HashMap<String, String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(config_map)
    }

    fn parse_usize_or(&self, key: &str, default: usize) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        let parsed = value.parse::<usize>().unwrap_or(default);
        // 批次大小为 0 会使 chunks() panic,视为非法配置回退默认值
        if parsed == 0 {
            Ok(default)
        } else {
            Ok(parsed)
        }
    }

    fn parse_i64_or(&self, key: &str, default: i64) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.parse::<i64>().unwrap_or(default))
    }
}

// ==========================================
// SyncConfig Trait 实现
// ==========================================
#[async_trait]
impl SyncConfig for ConfigManager {
    // ===== 摄取批次配置 =====

    async fn get_wms_insert_batch_size(&self) -> Result<usize, Box<dyn Error>> {
        self.parse_usize_or(config_keys::WMS_INSERT_BATCH_SIZE, 3000)
    }

    async fn get_sap_insert_batch_size(&self) -> Result<usize, Box<dyn Error>> {
        self.parse_usize_or(config_keys::SAP_INSERT_BATCH_SIZE, 1000)
    }

    async fn get_keep_unidentified_rows(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::KEEP_UNIDENTIFIED_ROWS, "false")?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            _ => Ok(false), // 默认不保留
        }
    }

    // ===== 看板缓存配置 =====

    async fn get_dashboard_cache_ttl_minutes(&self) -> Result<i64, Box<dyn Error>> {
        self.parse_i64_or(config_keys::DASHBOARD_CACHE_TTL_MINUTES, 30)
    }

    async fn get_expiring_window_days(&self) -> Result<i64, Box<dyn Error>> {
        self.parse_i64_or(config_keys::EXPIRING_WINDOW_DAYS, 30)
    }

    // ===== 库区归属配置 =====

    async fn get_zone_alias_map(&self) -> Result<HashMap<String, String>, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ZONE_ALIAS_MAP, "{}")?;
        let alias_map: HashMap<String, String> =
            serde_json::from_str(&value).unwrap_or_else(|_| {
                tracing::warn!(
                    config_key = config_keys::ZONE_ALIAS_MAP,
                    raw_value = %value,
                    "库区别名配置格式错误，使用空映射"
                );
                HashMap::new()
            });
        Ok(alias_map)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 摄取批次
    pub const WMS_INSERT_BATCH_SIZE: &str = "wms_insert_batch_size";
    pub const SAP_INSERT_BATCH_SIZE: &str = "sap_insert_batch_size";

    // 行过滤
    pub const KEEP_UNIDENTIFIED_ROWS: &str = "keep_unidentified_rows";

    // 看板缓存
    pub const DASHBOARD_CACHE_TTL_MINUTES: &str = "dashboard_cache_ttl_minutes";
    pub const EXPIRING_WINDOW_DAYS: &str = "expiring_window_days";

    // 库区归属
    pub const ZONE_ALIAS_MAP: &str = "zone_alias_map"; // 别名映射 (JSON)
}
