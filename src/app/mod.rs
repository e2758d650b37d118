// ==========================================
// 仓储库存同步系统 - 应用层
// ==========================================
// 职责: 服务组装与命令行入口共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_data_dir, get_default_db_path, AppState};
