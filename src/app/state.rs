// ==========================================
// 仓储库存同步系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和服务实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::cache::{
    CacheRefresher, DashboardCache, InventorySnapshotBuilder, JsonFileStore, ZoneCapacityAggregator,
};
use crate::config::ConfigManager;
use crate::db::open_sqlite_connection;
use crate::ingest::{
    FileSheetFetcher, InventoryIngestorImpl, SheetRowNormalizer, StandardColumnMapper,
};
use crate::repository::{InventoryIngestRepositoryImpl, LayoutStoreImpl};

/// 应用状态
///
/// 持有全部共享服务实例,命令行入口按需取用
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 数据目录（缓存文档与本地表格文件的根）
    pub data_dir: PathBuf,

    /// 摄取数据仓储
    pub repo: Arc<InventoryIngestRepositoryImpl>,

    /// 仓库布局存储
    pub layout: Arc<LayoutStoreImpl>,

    /// 配置管理器
    pub config: Arc<ConfigManager>,

    /// 缓存文档 KV 存储
    pub kv: Arc<JsonFileStore>,

    /// 库区容量聚合器
    pub aggregator: Arc<ZoneCapacityAggregator>,

    /// 库存快照构建器
    pub snapshot: Arc<InventorySnapshotBuilder>,

    /// 看板缓存
    pub dashboard: Arc<DashboardCache>,

    /// 库存摄取编排器
    pub ingestor: Arc<InventoryIngestorImpl>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - data_dir: 数据目录（cache/ 与 sheets/ 子目录在此之下）
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享 SQLite 连接并确保表结构
    /// 2. 初始化仓储、配置与缓存组件
    /// 3. 组装摄取管线并注册摄取后刷新器
    pub fn new(db_path: String, data_dir: PathBuf) -> Result<Self, String> {
        tracing::info!("初始化 AppState,数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化 Repository 层
        // ==========================================
        let repo = Arc::new(InventoryIngestRepositoryImpl::new(conn.clone()));
        let layout = Arc::new(LayoutStoreImpl::new(conn.clone()));
        let config = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建 ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化缓存层
        // ==========================================
        let kv = Arc::new(JsonFileStore::new(data_dir.join("cache")));
        let aggregator = Arc::new(ZoneCapacityAggregator::new(
            kv.clone(),
            layout.clone(),
            repo.clone(),
            config.clone(),
        ));
        let snapshot = Arc::new(InventorySnapshotBuilder::new(kv.clone(), repo.clone()));
        let dashboard = Arc::new(DashboardCache::new(
            kv.clone(),
            repo.clone(),
            aggregator.clone(),
            config.clone(),
        ));

        // ==========================================
        // 组装摄取管线
        // ==========================================
        let sheets_dir = data_dir.join("sheets");
        // best-effort: 目录创建失败不阻塞启动,抓取时再报具体错误
        std::fs::create_dir_all(&sheets_dir).ok();

        let mut ingestor = InventoryIngestorImpl::new(
            repo.clone(),
            config.clone(),
            Box::new(FileSheetFetcher::new(sheets_dir)),
            Box::new(SheetRowNormalizer),
            Box::new(StandardColumnMapper),
        );
        // 刷新顺序: 库区数量 → 库存快照 → 看板指标
        ingestor.register_refresher(aggregator.clone() as Arc<dyn CacheRefresher>);
        ingestor.register_refresher(snapshot.clone() as Arc<dyn CacheRefresher>);
        ingestor.register_refresher(dashboard.clone() as Arc<dyn CacheRefresher>);
        let ingestor = Arc::new(ingestor);

        tracing::info!("AppState 初始化完成");

        Ok(Self {
            db_path,
            data_dir,
            repo,
            layout,
            config,
            kv,
            aggregator,
            snapshot,
            dashboard,
            ingestor,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认路径辅助函数
// ==========================================

/// 获取默认数据目录
///
/// # 返回
/// - 开发环境: 用户数据目录/warehouse-sync-dev
/// - 生产环境: 用户数据目录/warehouse-sync
pub fn get_default_data_dir() -> PathBuf {
    // 允许通过环境变量显式指定数据目录（便于调试/测试/CI）
    if let Ok(path) = std::env::var("WAREHOUSE_SYNC_DATA_DIR") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    let mut dir = PathBuf::from("./warehouse-sync-data");
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录,避免污染生产数据
        #[cfg(debug_assertions)]
        {
            dir = data_dir.join("warehouse-sync-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            dir = data_dir.join("warehouse-sync");
        }
    }

    // 确保目录存在
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// 获取默认数据库路径
///
/// # 返回
/// - 数据目录下的 warehouse_sync.db;环境变量可覆盖
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("WAREHOUSE_SYNC_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    get_default_data_dir()
        .join("warehouse_sync.db")
        .to_string_lossy()
        .to_string()
}
