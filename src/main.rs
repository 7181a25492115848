use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use inventory_control::adapters::{HttpInventoryStore, InMemoryStore, LocalStorage, LogNotifier};
use inventory_control::config::toml_config::SourceType;
use inventory_control::config::{Cli, Command, InventoryConfig};
use inventory_control::demo;
use inventory_control::domain::ports::{FieldDirectory, InventoryStore, JobSummary, Notifier};
use inventory_control::utils::error::{ErrorSeverity, InventoryError, Result};
use inventory_control::utils::{logger, validation::Validate};
use inventory_control::{AnalysisJob, CleanupJob, JobEngine, ReconciliationJob};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 載入 TOML 配置
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.logging.json {
        logger::init_scheduled_logger(if cli.verbose { "debug" } else { config.logging.level.as_str() });
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("🚀 Starting inventory-control ({:?})", cli.command);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &cli);

    match run(&cli, Arc::new(config)).await {
        Ok(summaries) => {
            for summary in &summaries {
                tracing::info!("✅ {} completed", summary.job);
                println!(
                    "✅ {}: {} items, {} failures",
                    summary.job, summary.items, summary.failures
                );
                for artifact in &summary.artifacts {
                    println!("📁 {}", artifact);
                }
            }
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let code = exit_code(&e);
            if code > 0 {
                std::process::exit(code);
            }
        }
    }
}

/// 根據錯誤嚴重程度決定退出碼
fn exit_code(error: &InventoryError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 重試錯誤
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<InventoryConfig> {
    // demo 模式在沒有設定檔時使用內建配置
    if matches!(cli.command, Command::Demo { .. }) && !Path::new(&cli.config).exists() {
        return demo::demo_config().context("Failed to build the built-in demo configuration");
    }
    InventoryConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config file '{}'", cli.config))
}

fn display_config_summary(config: &InventoryConfig, cli: &Cli) {
    println!("📋 Configuration Summary:");
    println!("  Job: {} v{}", config.job.name, config.job.version);
    match config.source.r#type {
        SourceType::Http => println!(
            "  Source: {}",
            config.source.endpoint.as_deref().unwrap_or("N/A")
        ),
        SourceType::Memory => println!(
            "  Source: {} (in-memory)",
            config.source.dataset_path.as_deref().unwrap_or("N/A")
        ),
    }
    println!("  Output: {}", config.output.base_path);
    println!(
        "  Cleanup: {:?}, cap {} per run",
        config.cleanup.strategy, config.cleanup.max_records_per_run
    );
    if let Command::Cleanup { apply, .. } = cli.command {
        if apply || !config.cleanup.dry_run {
            println!("  ⚠️ LIVE MODE: records will be modified");
        } else {
            println!("  🔍 DRY RUN MODE ENABLED");
        }
    }
    println!();
}

async fn run(cli: &Cli, config: Arc<InventoryConfig>) -> Result<Vec<JobSummary>> {
    let storage = LocalStorage::new(config.output.base_path.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    if let Command::Demo { count, seed } = cli.command {
        let (mut rng, seed) = demo::demo_rng(seed);
        let today = Utc::now().date_naive();
        let transactions = demo::generate_transactions(count, &mut rng, today);
        tracing::info!(
            "🎲 Generated {} mock transactions (seed {})",
            transactions.len(),
            seed
        );
        let store = Arc::new(InMemoryStore::new(demo::to_dataset(&transactions, &mut rng, today)));
        return run_command(&cli.command, config, store, storage, notifier).await;
    }

    match config.source.r#type {
        SourceType::Http => {
            let store = Arc::new(HttpInventoryStore::from_config(&config.source)?);
            run_command(&cli.command, config, store, storage, notifier).await
        }
        SourceType::Memory => {
            let path = config
                .source
                .dataset_path
                .clone()
                .ok_or_else(|| InventoryError::MissingConfig {
                    field: "source.dataset_path".to_string(),
                })?;
            let store = Arc::new(InMemoryStore::from_json_file(path)?);
            run_command(&cli.command, config, store, storage, notifier).await
        }
    }
}

async fn run_command<R>(
    command: &Command,
    config: Arc<InventoryConfig>,
    store: Arc<R>,
    storage: LocalStorage,
    notifier: Arc<dyn Notifier>,
) -> Result<Vec<JobSummary>>
where
    R: InventoryStore + FieldDirectory + 'static,
{
    let analyze = || AnalysisJob::new(config.clone(), store.clone(), storage.clone(), notifier.clone());
    let reconcile =
        || ReconciliationJob::new(config.clone(), store.clone(), storage.clone(), notifier.clone());

    match command {
        Command::Analyze => Ok(vec![JobEngine::new(analyze()).run().await?]),
        Command::Cleanup { apply, strategy } => {
            let mut job = CleanupJob::new(config.clone(), store.clone(), storage.clone(), notifier.clone());
            if *apply {
                job = job.with_dry_run(false);
            }
            if let Some(strategy) = strategy {
                job = job.with_strategy(*strategy);
            }
            Ok(vec![JobEngine::new(job).run().await?])
        }
        Command::Reconcile => Ok(vec![JobEngine::new(reconcile()).run().await?]),
        Command::Demo { .. } => {
            // 完整流程：分析 -> 試跑清理 -> 對帳
            let analysis = JobEngine::new(analyze()).run().await?;
            let cleanup = JobEngine::new(
                CleanupJob::new(config.clone(), store.clone(), storage.clone(), notifier.clone())
                    .with_dry_run(true),
            )
            .run()
            .await?;
            let reconciliation = JobEngine::new(reconcile()).run().await?;
            Ok(vec![analysis, cleanup, reconciliation])
        }
    }
}
