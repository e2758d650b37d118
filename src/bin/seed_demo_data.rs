// Small dev utility: generate demo CSV sheets and seed demo
// sources/bindings/layout, then run one warehouse ingestion so caches
// and dashboards have data right after seeding.
//
// Usage:
//   cargo run --bin seed_demo_data
//
// Idempotent: previous demo rows are cleared before re-ingesting.

use anyhow::{anyhow, Context};
use warehouse_sync::app::{get_default_data_dir, get_default_db_path, AppState};
use warehouse_sync::domain::binding::{SourceBinding, WarehouseBinding};
use warehouse_sync::domain::source::{ClassificationConfig, SheetSource};
use warehouse_sync::domain::types::{ComponentType, SourceType};
use warehouse_sync::domain::{Component, Zone};
use warehouse_sync::ingest::InventoryIngestor;
use warehouse_sync::repository::{InventoryIngestRepository, LayoutStore};

const DEMO_WAREHOUSE: &str = "EA2-F";
const WMS_SOURCE_ID: &str = "wms-demo";
const SAP_SOURCE_ID: &str = "sap-demo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warehouse_sync::logging::init();

    let db_path = get_default_db_path();
    let data_dir = get_default_data_dir();
    eprintln!("Seeding demo data into {} ({})", db_path, data_dir.display());

    let state = AppState::new(db_path, data_dir.clone()).map_err(|e| anyhow!(e))?;

    write_demo_sheets(&data_dir)?;
    seed_layout(&state).await?;
    seed_sources_and_binding(&state).await?;

    // 布局先行,容量骨架就绪后再摄取
    state.aggregator.update_zone_capacities().await?;

    // 重新播种时清掉旧的演示行
    state.repo.clear_rows(SourceType::Wms).await?;
    state.repo.clear_rows(SourceType::Sap).await?;

    let report = state
        .ingestor
        .ingest_warehouse(DEMO_WAREHOUSE, &[SourceType::Wms, SourceType::Sap], false, None)
        .await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    print_quick_counts(&state).await?;
    Ok(())
}

fn write_demo_sheets(data_dir: &std::path::Path) -> anyhow::Result<()> {
    let sheets_dir = data_dir.join("sheets");
    std::fs::create_dir_all(&sheets_dir)?;

    let wms_csv = "\
Zone Cd,Cell No.,Item Code,Desc,Unit,Lot No,Tot. Qty.,Available Qty.,Inb. Date,Valid Date
FZONE,F01-01,MAT-1001,冷轧钢卷 1.2mm,EA,LOT-A1,8,6,2026-07-02,2026-09-05
FZONE,F01-02,MAT-1002,冷轧钢卷 1.5mm,EA,LOT-A2,5,5,2026-07-15,2026-08-30
FZONE,F01-03,MAT-1003,热轧板坯 3.0mm,EA,LOT-B1,4,3,2026-07-20,2026-10-12
FZONE,F90-01,MAT-1004,镀锌卷 0.8mm,EA,LOT-B2,6,6,2026-08-01,2026-09-18
AZONE,A01-02,MAT-1005,不锈钢带 0.5mm,KG,LOT-C1,\"1,250\",\"1,137.05\",2026-08-05,2027-01-09
AZONE,A01-04,MAT-1001,冷轧钢卷 1.2mm,EA,LOT-C2,3,2,2026-08-10,2026-09-05
AZONE,A01-05,,空行示例,EA,LOT-C3,1,1,2026-08-11,2026-12-01
";
    std::fs::write(sheets_dir.join("demo_wms.csv"), wms_csv)
        .context("写入 demo_wms.csv 失败")?;

    let sap_csv = "\
Material,Material Description,Plant,Storage location,Batch,Unrestricted,In Quality Insp.,Blocked,Returns,Base Unit of Measure
MAT-1001,Cold rolled coil 1.2mm,1000,0001,B-2026-01,40,2,0,1,EA
MAT-1002,Cold rolled coil 1.5mm,1000,0001,B-2026-02,25,0,3,0,EA
MAT-1005,Stainless strip 0.5mm,1000,0002,B-2026-03,\"2,400\",10,0,0,KG
MAT-2001,Galvanized coil 0.8mm,2000,0001,B-2026-04,18,0,0,0,EA
";
    std::fs::write(sheets_dir.join("demo_sap.csv"), sap_csv)
        .context("写入 demo_sap.csv 失败")?;

    eprintln!("Demo sheets written under {}", sheets_dir.display());
    Ok(())
}

async fn seed_layout(state: &AppState) -> anyhow::Result<()> {
    let zones = vec![
        Zone {
            zone_id: "z-f01".to_string(),
            zone_code: "F-zone".to_string(),
            zone_name: Some("F 区（货架）".to_string()),
            warehouse_code: Some(DEMO_WAREHOUSE.to_string()),
            grid: None,
            components: vec![
                Component {
                    id: "f01-rack".to_string(),
                    component_type: ComponentType::Rack,
                    location: "F01".to_string(),
                    x: 0.0,
                    y: 0.0,
                    rotation: 0.0,
                    w: 6.0,
                    h: 2.0,
                    rows: 1,
                    cols: 3,
                    floors: Some(3),
                    numbering: None,
                    order_dir: None,
                    per_floor_locations: None,
                    floor_capacities: Some(vec![10.0, 10.0, 5.0]),
                    max_capacity: None,
                },
                Component {
                    id: "f90-flat".to_string(),
                    component_type: ComponentType::Flat,
                    location: "F90".to_string(),
                    x: 8.0,
                    y: 0.0,
                    rotation: 0.0,
                    w: 4.0,
                    h: 5.0,
                    rows: 1,
                    cols: 1,
                    floors: None,
                    numbering: None,
                    order_dir: None,
                    per_floor_locations: None,
                    floor_capacities: None,
                    max_capacity: None,
                },
            ],
        },
        Zone {
            zone_id: "z-a01".to_string(),
            zone_code: "A-zone".to_string(),
            zone_name: Some("A 区（平面）".to_string()),
            warehouse_code: Some(DEMO_WAREHOUSE.to_string()),
            grid: None,
            components: vec![Component {
                id: "a01-flat".to_string(),
                component_type: ComponentType::Flat,
                location: "A01".to_string(),
                x: 0.0,
                y: 8.0,
                rotation: 0.0,
                w: 5.0,
                h: 6.0,
                rows: 1,
                cols: 1,
                floors: None,
                numbering: None,
                order_dir: None,
                per_floor_locations: None,
                floor_capacities: None,
                max_capacity: Some(30.0),
            }],
        },
    ];
    state.layout.replace_layout(&zones).await?;
    eprintln!("Layout seeded: {} zones", zones.len());
    Ok(())
}

async fn seed_sources_and_binding(state: &AppState) -> anyhow::Result<()> {
    let mut wms = SheetSource::new(WMS_SOURCE_ID, "演示 WMS 库存", SourceType::Wms, "demo_wms.csv");
    wms.classification = ClassificationConfig {
        item_col: Some("Item Code".to_string()),
        location_col: Some("Cell No.".to_string()),
        qty_col: Some("Available Qty.".to_string()),
        zone_col: Some("Zone Cd".to_string()),
        lot_col: Some("Lot No".to_string()),
        ..Default::default()
    };
    state.repo.upsert_source(&wms).await?;

    let mut sap = SheetSource::new(SAP_SOURCE_ID, "演示 SAP 库存", SourceType::Sap, "demo_sap.csv");
    sap.classification = ClassificationConfig {
        item_col: Some("Material".to_string()),
        location_col: Some("Storage location".to_string()),
        lot_col: Some("Batch".to_string()),
        qty_col: Some("Unrestricted".to_string()),
        quality_inspection_col: Some("In Quality Insp.".to_string()),
        blocked_col: Some("Blocked".to_string()),
        returns_col: Some("Returns".to_string()),
        split_enabled: true,
        split_by_column: Some("Plant".to_string()),
        ..Default::default()
    };
    state.repo.upsert_source(&sap).await?;

    let mut binding = WarehouseBinding::new(DEMO_WAREHOUSE);
    binding.source_bindings.insert(
        WMS_SOURCE_ID.to_string(),
        SourceBinding {
            source_type: SourceType::Wms,
            split_value: None,
        },
    );
    // SAP 源按 Plant=1000 绑定到演示仓库
    binding.source_bindings.insert(
        format!("{}::1000", SAP_SOURCE_ID),
        SourceBinding {
            source_type: SourceType::Sap,
            split_value: None,
        },
    );
    state.repo.upsert_binding(&binding).await?;

    eprintln!("Sources and binding seeded for warehouse {}", DEMO_WAREHOUSE);
    Ok(())
}

async fn print_quick_counts(state: &AppState) -> anyhow::Result<()> {
    let wms_rows = state.repo.scan_rows(SourceType::Wms).await?.len();
    let sap_rows = state.repo.scan_rows(SourceType::Sap).await?.len();
    let catalog = state.repo.list_catalog().await?.len();
    let zones = state
        .aggregator
        .get_zone_capacities(Some(DEMO_WAREHOUSE))
        .await?
        .zones
        .len();

    println!();
    println!("wms_rows={}", wms_rows);
    println!("sap_rows={}", sap_rows);
    println!("catalog_entries={}", catalog);
    println!("zones={}", zones);
    println!();
    println!("试试: warehouse-sync zone-capacities {}", DEMO_WAREHOUSE);
    println!("     warehouse-sync snapshot {}", DEMO_WAREHOUSE);
    Ok(())
}
