// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供集成测试所需的应用状态组装与表格文件生成
// ==========================================

#![allow(dead_code)]

use std::path::PathBuf;
use tempfile::TempDir;
use warehouse_sync::app::AppState;
use warehouse_sync::domain::binding::{SourceBinding, WarehouseBinding};
use warehouse_sync::domain::source::{ClassificationConfig, SheetSource};
use warehouse_sync::domain::types::SourceType;
use warehouse_sync::repository::InventoryIngestRepository;

/// 创建临时数据目录上的完整应用状态
///
/// # 返回
/// - TempDir: 临时目录（需要保持存活）
/// - AppState: 以目录内 SQLite 与 sheets/ 为根的应用状态
pub fn create_test_state() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("warehouse_sync_test.db");
    let state = AppState::new(
        db_path.to_string_lossy().to_string(),
        dir.path().to_path_buf(),
    )
    .expect("Failed to build app state");
    (dir, state)
}

/// 在数据目录 sheets/ 下写入一个表格文件,返回其相对标识
pub fn write_sheet(state: &AppState, name: &str, content: &str) -> String {
    let path = state.data_dir.join("sheets").join(name);
    std::fs::write(&path, content).expect("Failed to write sheet fixture");
    name.to_string()
}

/// WMS 测试源: Item Code / Cell No. / Available Qty. 三列分类
pub fn wms_test_source(id: &str, sheet_id: &str) -> SheetSource {
    let mut source = SheetSource::new(id, "测试 WMS", SourceType::Wms, sheet_id);
    source.classification = ClassificationConfig {
        item_col: Some("Item Code".to_string()),
        location_col: Some("Cell No.".to_string()),
        qty_col: Some("Available Qty.".to_string()),
        ..Default::default()
    };
    source
}

/// SAP 测试源: 按 Plant 拆分
pub fn sap_split_source(id: &str, sheet_id: &str) -> SheetSource {
    let mut source = SheetSource::new(id, "测试 SAP", SourceType::Sap, sheet_id);
    source.classification = ClassificationConfig {
        item_col: Some("Material".to_string()),
        location_col: Some("Storage location".to_string()),
        qty_col: Some("Unrestricted".to_string()),
        split_enabled: true,
        split_by_column: Some("Plant".to_string()),
        ..Default::default()
    };
    source
}

/// 注册数据源并绑定到仓库
///
/// # 参数
/// - entries: (bind_key, source_type) 列表,bind_key 可带 ::split 后缀
pub async fn bind_warehouse(
    state: &AppState,
    warehouse_code: &str,
    entries: &[(&str, SourceType)],
) {
    let mut binding = WarehouseBinding::new(warehouse_code);
    for (key, source_type) in entries {
        binding.source_bindings.insert(
            key.to_string(),
            SourceBinding {
                source_type: *source_type,
                split_value: None,
            },
        );
    }
    state
        .repo
        .upsert_binding(&binding)
        .await
        .expect("Failed to upsert binding");
}

/// 数据目录下 sheets/ 的绝对路径（直接操作文件的用例用）
pub fn sheets_dir(state: &AppState) -> PathBuf {
    state.data_dir.join("sheets")
}
