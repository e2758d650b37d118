// ==========================================
// 仓储库存同步系统 - KV 缓存存储
// ==========================================
// 职责: 缓存文档的键值读写抽象与 JSON 文件实现
// 红线: 写入必须原子（临时文件 + rename）,损坏条目视为缺失
// ==========================================

use crate::cache::error::{CacheError, CacheResult};
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

// ==========================================
// KvStore Trait
// ==========================================
// 用途: 聚合器/快照/看板读写缓存文档的统一入口
// 实现者: JsonFileStore（数据目录下每键一个 JSON 文件）
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 读取缓存文档
    ///
    /// # 返回
    /// - Some(Value): 文档内容
    /// - None: 键不存在,或文件损坏（损坏会记录告警）
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// 写入缓存文档（整体覆盖）
    async fn set(&self, key: &str, value: &Value) -> CacheResult<()>;

    /// 列出全部缓存键（已脱敏后的存储名）
    async fn list_keys(&self) -> CacheResult<Vec<String>>;

    /// 删除键名包含指定子串的条目
    ///
    /// # 返回
    /// - usize: 删除的条目数
    async fn delete_matching(&self, pattern: &str) -> CacheResult<usize>;
}

// ==========================================
// JsonFileStore - JSON 文件实现
// ==========================================
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// 创建存储,根目录不存在时自动建立
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if let Err(e) = fs::create_dir_all(&root) {
            tracing::warn!(dir = %root.display(), "创建缓存目录失败: {}", e);
        }
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 键名脱敏: 只保留字母数字与 . _ -,其余替换为下划线
    fn sanitize_key(key: &str) -> String {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if sanitized.is_empty() {
            "_".to_string()
        } else {
            sanitized
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::sanitize_key(key)))
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let path = self.entry_path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e)),
        };

        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // 损坏条目按缺失处理,下次 set 会整体覆盖
                tracing::warn!(key = key, path = %path.display(), "缓存文件损坏,按缺失处理: {}", e);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &Value) -> CacheResult<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.entry_path(key);
        let tmp_path = self.root.join(format!("{}.json.tmp", Self::sanitize_key(key)));

        let text = serde_json::to_string_pretty(value)?;
        fs::write(&tmp_path, text)?;
        // 同目录 rename 为原子替换,读方不会看到半截文件
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    async fn list_keys(&self) -> CacheResult<Vec<String>> {
        let mut keys = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(CacheError::Io(e)),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete_matching(&self, pattern: &str) -> CacheResult<usize> {
        let mut removed = 0;
        for key in self.list_keys().await? {
            if key.contains(pattern) {
                let path = self.root.join(format!("{}.json", key));
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_test_store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = JsonFileStore::new(dir.path().join("cache"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_set_and_get_round_trip() {
        let (_dir, store) = setup_test_store();
        let doc = json!({"total_wms": 3, "warehouse_code": "WH01"});

        store.set("inventory_snapshot_WH01", &doc).await.unwrap();
        let loaded = store.get("inventory_snapshot_WH01").await.unwrap();
        assert_eq!(loaded, Some(doc));
    }

    #[tokio::test]
    async fn test_get_missing_key_returns_none() {
        let (_dir, store) = setup_test_store();
        assert_eq!(store.get("no_such_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_treated_as_missing() {
        let (_dir, store) = setup_test_store();
        store.set("zone_capacities", &json!({"z1": {}})).await.unwrap();

        let path = store.root().join("zone_capacities.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(store.get("zone_capacities").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_key_sanitization() {
        let (_dir, store) = setup_test_store();
        let doc = json!([1, 2, 3]);
        store.set("stats/主仓::A", &doc).await.unwrap();

        // 同一逻辑键写后可读,文件名不含危险字符
        assert_eq!(store.get("stats/主仓::A").await.unwrap(), Some(doc));
        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(!keys[0].contains('/'));
        assert!(!keys[0].contains(':'));
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_value() {
        let (_dir, store) = setup_test_store();
        store.set("doc", &json!({"v": 1})).await.unwrap();
        store.set("doc", &json!({"v": 2})).await.unwrap();
        assert_eq!(store.get("doc").await.unwrap(), Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_delete_matching_by_substring() {
        let (_dir, store) = setup_test_store();
        store.set("inventory_stats_WH01", &json!(1)).await.unwrap();
        store.set("inventory_stats_WH02", &json!(2)).await.unwrap();
        store.set("zone_capacities", &json!(3)).await.unwrap();

        let removed = store.delete_matching("inventory_stats").await.unwrap();
        assert_eq!(removed, 2);

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["zone_capacities".to_string()]);
    }
}
