// ==========================================
// 仓储库存同步系统 - 命令行主入口
// ==========================================
// 技术栈: Rust + SQLite + 本地 JSON 缓存
// 子命令: ingest / ingest-all / rebuild-caches / zone-capacities / snapshot
// ==========================================

use anyhow::{anyhow, bail, Context};
use warehouse_sync::app::{get_default_data_dir, get_default_db_path, AppState};
use warehouse_sync::cache::CacheRefresher;
use warehouse_sync::domain::types::SourceType;
use warehouse_sync::ingest::InventoryIngestor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    warehouse_sync::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };

    tracing::info!("==================================================");
    tracing::info!("仓储库存同步系统");
    tracing::info!("系统版本: {}", warehouse_sync::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    let data_dir = get_default_data_dir();
    tracing::info!("使用数据库: {}", db_path);
    tracing::info!("数据目录: {}", data_dir.display());

    let state = AppState::new(db_path, data_dir).map_err(|e| anyhow!(e))?;

    match command {
        "ingest" => {
            let warehouse = positional_arg(&args, 1)
                .context("用法: warehouse-sync ingest <warehouse> [--types wms,sap] [--dry-run]")?;
            let types = parse_types(&args)?;
            let dry_run = has_flag(&args, "--dry-run");

            let report = state
                .ingestor
                .ingest_warehouse(&warehouse, &types, dry_run, None)
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "ingest-all" => {
            let types = parse_types(&args)?;
            let dry_run = has_flag(&args, "--dry-run");

            let report = state.ingestor.ingest_all_sources(&types, dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "rebuild-caches" => {
            let codes: Vec<String> = positional_arg(&args, 1).into_iter().collect();

            // 与摄取后刷新同序: 库区数量 → 库存快照 → 看板指标
            let refreshers: [&dyn CacheRefresher; 3] = [
                state.aggregator.as_ref(),
                state.snapshot.as_ref(),
                state.dashboard.as_ref(),
            ];
            for refresher in refreshers {
                refresher
                    .refresh(&codes)
                    .await
                    .with_context(|| format!("缓存刷新失败: {}", refresher.name()))?;
                tracing::info!(refresher = refresher.name(), "缓存重建完成");
            }
        }
        "zone-capacities" => {
            let warehouse = positional_arg(&args, 1);
            let response = state
                .aggregator
                .get_zone_capacities(warehouse.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "snapshot" => {
            let warehouse = positional_arg(&args, 1)
                .context("用法: warehouse-sync snapshot <warehouse>")?;

            let (wms_count, sap_count) =
                state.snapshot.build_for_warehouse(&warehouse).await?;
            tracing::info!(
                warehouse = %warehouse,
                wms = wms_count,
                sap = sap_count,
                "库存快照构建完成"
            );
            match state.snapshot.get_snapshot(&warehouse).await? {
                Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                None => bail!("快照构建后读取失败: {}", warehouse),
            }
        }
        other => {
            print_usage();
            bail!("未知子命令: {}", other);
        }
    }

    Ok(())
}

/// 取第 index 个位置参数,跳过 flag 及 --types 的取值
fn positional_arg(args: &[String], index: usize) -> Option<String> {
    let mut positionals = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--types" {
            iter.next();
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        positionals.push(arg);
    }
    positionals.get(index).map(|s| s.to_string())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// 解析 --types 参数,缺省为全部类型
fn parse_types(args: &[String]) -> anyhow::Result<Vec<SourceType>> {
    let Some(position) = args.iter().position(|a| a == "--types") else {
        return Ok(vec![SourceType::Wms, SourceType::Sap]);
    };
    let raw = args
        .get(position + 1)
        .context("--types 需要参数,例如 --types wms,sap")?;

    let mut types = Vec::new();
    for part in raw.split(',') {
        let source_type =
            SourceType::parse(part).ok_or_else(|| anyhow!("无法识别的数据源类型: {}", part))?;
        if !types.contains(&source_type) {
            types.push(source_type);
        }
    }
    Ok(types)
}

fn print_usage() {
    println!("仓储库存同步系统 v{}", warehouse_sync::VERSION);
    println!();
    println!("用法: warehouse-sync <子命令> [参数]");
    println!();
    println!("子命令:");
    println!("  ingest <warehouse> [--types wms,sap] [--dry-run]   按仓库绑定摄取");
    println!("  ingest-all [--types wms,sap] [--dry-run]           全量重建摄取");
    println!("  rebuild-caches [warehouse]                         重建容量/快照/看板缓存");
    println!("  zone-capacities [warehouse]                        查看库区容量聚合");
    println!("  snapshot <warehouse>                               构建并输出库存快照");
    println!();
    println!("环境变量:");
    println!("  WAREHOUSE_SYNC_DB_PATH    覆盖数据库路径");
    println!("  WAREHOUSE_SYNC_DATA_DIR   覆盖数据目录");
    println!("  RUST_LOG                  日志级别（默认 info）");
}
