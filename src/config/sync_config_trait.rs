// ==========================================
// 仓储库存同步系统 - 同步配置读取 Trait
// ==========================================
// 职责: 定义同步/聚合模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;

// ==========================================
// SyncConfig Trait
// ==========================================
// 用途: 摄取/缓存模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait SyncConfig: Send + Sync {
    // ===== 摄取批次配置 =====

    /// 获取 WMS 行插入批次大小
    ///
    /// # 返回
    /// - usize: 单事务插入的最大行数
    ///
    /// # 默认值
    /// - 3000
    async fn get_wms_insert_batch_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取 SAP 行插入批次大小
    ///
    /// # 默认值
    /// - 1000
    async fn get_sap_insert_batch_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 是否保留无法识别物料编码的行
    ///
    /// # 返回
    /// - true: 保留（调试用途,行以占位编码落库）
    /// - false: 丢弃并记录告警
    ///
    /// # 默认值
    /// - false
    async fn get_keep_unidentified_rows(&self) -> Result<bool, Box<dyn Error>>;

    // ===== 看板缓存配置 =====

    /// 获取看板缓存有效期（分钟）
    ///
    /// # 默认值
    /// - 30
    async fn get_dashboard_cache_ttl_minutes(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取临期窗口天数（valid_date 距今不足该天数即进入临期看板）
    ///
    /// # 默认值
    /// - 30
    async fn get_expiring_window_days(&self) -> Result<i64, Box<dyn Error>>;

    // ===== 库区归属配置 =====

    /// 获取库区别名映射（WMS 原始库区标签 → 布局库区代码）
    ///
    /// # 返回
    /// - HashMap<String, String>: 别名 → 库区代码
    ///
    /// # 说明
    /// 配置格式为 JSON: {"EAGLE2": "F-zone", "TRAILER": "A-zone"}
    /// 配置不存在或格式错误时返回空映射（不启用别名归属）
    async fn get_zone_alias_map(&self) -> Result<HashMap<String, String>, Box<dyn Error>>;
}
