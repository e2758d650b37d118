// ==========================================
// 仓储库存同步系统 - 缓存刷新 Trait
// ==========================================
// 职责: 摄取完成后触发缓存重建的统一入口
// 红线: 刷新失败只记告警,不得回滚摄取结果
// ==========================================

use crate::cache::error::CacheResult;
use async_trait::async_trait;

// ==========================================
// CacheRefresher Trait
// ==========================================
// 实现者: 库区容量聚合器、库存快照构建器、看板缓存
#[async_trait]
pub trait CacheRefresher: Send + Sync {
    /// 刷新器名称（告警日志用）
    fn name(&self) -> &'static str;

    /// 针对指定仓库重建缓存；空列表表示全量
    async fn refresh(&self, warehouse_codes: &[String]) -> CacheResult<()>;
}
