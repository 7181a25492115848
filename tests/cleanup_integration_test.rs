mod common;

use chrono::{TimeZone, Utc};
use common::{config, line, now, FlakyStore, LOT_FIELD};
use inventory_control::adapters::memory_store::{Dataset, InMemoryStore, StoredLine};
use inventory_control::adapters::{LocalStorage, RecordingNotifier};
use inventory_control::domain::model::{
    CleanupStrategy, FieldKind, ScanSource, TransactionLineRef,
};
use inventory_control::domain::ports::{FieldDirectory, InventoryStore, Storage};
use inventory_control::utils::error::InventoryError;
use inventory_control::{AnalysisJob, CleanupJob, InventoryConfig, JobEngine};
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

fn lot() -> ScanSource {
    ScanSource::custom(FieldKind::Lot, LOT_FIELD)
}

fn triple_a() -> Dataset {
    Dataset {
        lines: vec![
            line("1", LOT_FIELD, "A", 5.0, 1),
            line("2", LOT_FIELD, "A", 2.0, 3),
            line("3", LOT_FIELD, "A", 0.0, 40),
            line("4", LOT_FIELD, "B", 1.0, 2),
        ],
        ..Dataset::default()
    }
}

async fn analyze<R>(cfg: &Arc<InventoryConfig>, store: &Arc<R>, storage: &LocalStorage)
where
    R: InventoryStore + FieldDirectory + 'static,
{
    let job = AnalysisJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .at(now());
    JobEngine::new(job).run().await.unwrap();
}

async fn read_text(storage: &LocalStorage, path: &str) -> String {
    String::from_utf8(storage.read_file(path).await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_dry_run_plans_without_mutation() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));
    let store = Arc::new(InMemoryStore::new(triple_a()));
    analyze(&cfg, &store, &storage).await;

    let notifier = Arc::new(RecordingNotifier::new());
    let job = CleanupJob::new(cfg.clone(), store.clone(), storage.clone(), notifier.clone())
        .with_dry_run(true)
        .at(Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap());
    let summary = JobEngine::new(job).run().await.unwrap();

    assert_eq!(summary.items, 1);
    assert_eq!(summary.failures, 0);
    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("Processed: 1"));
    assert!(report.contains("A -> CLN-100000 (DRY RUN)"));

    assert_eq!(store.lines_with_value(&lot(), "A").await.unwrap().len(), 3);
    assert!(storage.list_files("Backups").await.unwrap().is_empty());
    assert!(notifier.sent()[0].subject.contains("DRY RUN"));
}

#[tokio::test]
async fn test_apply_keeps_exactly_one_original() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));
    let store = Arc::new(InMemoryStore::new(triple_a()));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(now());
    let summary = JobEngine::new(job).run().await.unwrap();

    let kept = store.lines_with_value(&lot(), "A").await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].transaction_id, "1");

    let moved = store.lines_with_value(&lot(), "CLN-100000").await.unwrap();
    let moved_ids: Vec<&str> = moved.iter().map(|l| l.transaction_id.as_str()).collect();
    assert_eq!(moved_ids, vec!["2", "3"]);
    assert_eq!(store.lines_with_value(&lot(), "B").await.unwrap().len(), 1);

    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("Success: 1"));
    assert!(report.contains("A -> CLN-100000 (COMPLETED)"));

    let backups = storage.list_files("Backups").await.unwrap();
    assert_eq!(backups, vec!["Backup_2026-10-19T03-00-00Z.csv".to_string()]);
    let backup = read_text(&storage, &format!("Backups/{}", backups[0])).await;
    assert!(backup.contains("\"custom-lot\",\"L100000001\",\"A\",3"));
}

#[tokio::test]
async fn test_live_run_outside_window_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));
    let store = Arc::new(InMemoryStore::new(triple_a()));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap());
    let err = JobEngine::new(job).run().await.unwrap_err();

    assert!(matches!(
        err,
        InventoryError::OutsideOffPeakWindow { hour: 14, start: 2, end: 6 }
    ));
    assert_eq!(store.lines_with_value(&lot(), "A").await.unwrap().len(), 3);
    assert!(storage.list_files("Cleanup Reports").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_artifact_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());

    let job = CleanupJob::new(
        Arc::new(config(&base, "")),
        Arc::new(InMemoryStore::new(triple_a())),
        storage,
        Arc::new(RecordingNotifier::new()),
    )
    .at(now());
    let err = JobEngine::new(job).run().await.unwrap_err();

    assert!(matches!(err, InventoryError::ArtifactLoad { .. }));
    assert!(err.is_run_fatal());
}

#[tokio::test]
async fn test_flag_strategy_never_mutates() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));
    let store = Arc::new(InMemoryStore::new(triple_a()));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_strategy(CleanupStrategy::Flag)
    .with_dry_run(false)
    .at(Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap());
    let summary = JobEngine::new(job).run().await.unwrap();

    assert_eq!(store.lines_with_value(&lot(), "A").await.unwrap().len(), 3);
    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("Strategy: FLAG"));
    assert!(report.contains("Flagged for manual review:"));
    assert!(report.contains("A [custom-lot L100000001] count 3"));
}

#[tokio::test]
async fn test_member_failure_recorded_and_rest_continue() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));

    let mut dataset = triple_a();
    dataset.lines.push(line("5", LOT_FIELD, "C", 0.0, 400));
    dataset.lines.push(line("6", LOT_FIELD, "C", 0.0, 400));
    let mut flaky = FlakyStore::new(dataset);
    flaky.failing_renumber_ids.insert("2".to_string());
    let store = Arc::new(flaky);
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(now());
    let summary = JobEngine::new(job).run().await.unwrap();

    assert_eq!(summary.items, 2);
    assert_eq!(summary.failures, 1);

    // 失敗的成員保留原值，其餘成員照常改號
    let remaining: Vec<String> = store
        .lines_with_value(&lot(), "A")
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.transaction_id)
        .collect();
    assert_eq!(remaining, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(store.lines_with_value(&lot(), "C").await.unwrap().len(), 1);

    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("A -> CLN-100000 (FAILED)"));
    assert!(report.contains("C -> CLN-100001 (COMPLETED)"));
    assert!(report.contains("Failures:"));
    assert!(report.contains("record locked"));
}

#[tokio::test]
async fn test_new_numbers_skip_existing_values() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));
    let store = Arc::new(InMemoryStore::new(Dataset {
        lines: vec![
            line("1", LOT_FIELD, "A", 0.0, 400),
            line("2", LOT_FIELD, "A", 0.0, 400),
            line("3", LOT_FIELD, "CLN-100000", 0.0, 400),
            line("4", LOT_FIELD, "CLN-100000", 0.0, 400),
        ],
        ..Dataset::default()
    }));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(now());
    let summary = JobEngine::new(job).run().await.unwrap();

    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("A -> CLN-100001 (COMPLETED)"));
    assert!(report.contains("CLN-100000 -> CLN-100002 (COMPLETED)"));
    assert_eq!(store.lines_with_value(&lot(), "CLN-100000").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_compressed_backup_contains_csv() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let mut cfg = config(&base, "");
    cfg.output.compress_backups = true;
    let cfg = Arc::new(cfg);
    let store = Arc::new(InMemoryStore::new(triple_a()));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(now());
    JobEngine::new(job).run().await.unwrap();

    let zip_path = temp_dir
        .path()
        .join("Backups")
        .join("Backup_2026-10-19T03-00-00Z.zip");
    let zip_data = std::fs::read(&zip_path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert_eq!(archive.len(), 1);

    let mut csv_file = archive.by_name("Backup_2026-10-19T03-00-00Z.csv").unwrap();
    let mut csv_content = String::new();
    csv_file.read_to_string(&mut csv_content).unwrap();
    assert!(csv_content.starts_with("\"Type\",\"Field\",\"Number\",\"Count\""));
}

#[tokio::test]
async fn test_cap_limits_groups_per_run() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, "[cleanup]\nmax_records_per_run = 1\n"));
    let mut dataset = triple_a();
    dataset.lines.push(line("5", LOT_FIELD, "C", 0.0, 400));
    dataset.lines.push(line("6", LOT_FIELD, "C", 0.0, 400));
    let store = Arc::new(InMemoryStore::new(dataset));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .at(now());
    let summary = JobEngine::new(job).run().await.unwrap();

    assert_eq!(summary.items, 1);
    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("A -> CLN-100000 (DRY RUN)"));
    assert!(!report.contains("C -> "));
}

fn line_on(id: &str, line_id: &str, value: &str) -> StoredLine {
    let mut stored = line(id, LOT_FIELD, value, 1.0, 5);
    stored.line.line_id = line_id.to_string();
    stored
}

fn labels(lines: &[TransactionLineRef]) -> Vec<String> {
    lines.iter().map(TransactionLineRef::member_label).collect()
}

#[tokio::test]
async fn test_shared_transaction_keeps_only_the_first_line() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));
    let store = Arc::new(InMemoryStore::new(Dataset {
        lines: vec![line_on("1", "1", "A"), line_on("1", "2", "A"), line_on("2", "1", "A")],
        ..Dataset::default()
    }));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(now());
    let summary = JobEngine::new(job).run().await.unwrap();

    assert_eq!(summary.failures, 0);
    let kept = store.lines_with_value(&lot(), "A").await.unwrap();
    assert_eq!(labels(&kept), vec!["1/1".to_string()]);
    let moved = store.lines_with_value(&lot(), "CLN-100000").await.unwrap();
    assert_eq!(labels(&moved), vec!["1/2".to_string(), "2/1".to_string()]);

    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("A -> CLN-100000 (COMPLETED)"));
}

fn twelve_a() -> Dataset {
    Dataset {
        lines: (1..=12)
            .map(|id| line(&id.to_string(), LOT_FIELD, "A", 1.0, 5))
            .collect(),
        ..Dataset::default()
    }
}

#[tokio::test]
async fn test_lines_over_group_limit_are_reported_not_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, ""));
    let store = Arc::new(InMemoryStore::new(twelve_a()));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(now());
    let summary = JobEngine::new(job).run().await.unwrap();

    // 第 1 行保留，2-10 行改號，11、12 行超出上限
    let still_a = store.lines_with_value(&lot(), "A").await.unwrap();
    assert_eq!(
        labels(&still_a),
        vec!["1/1".to_string(), "11/1".to_string(), "12/1".to_string()]
    );
    assert_eq!(store.lines_with_value(&lot(), "CLN-100000").await.unwrap().len(), 9);
    assert_eq!(summary.failures, 1);

    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("Success: 0\nFailed: 1\nSkipped Lines: 2\n"));
    assert!(report.contains("A -> CLN-100000 (FAILED)"));
    assert!(report.contains("A [custom-lot L100000001]: 11/1, 12/1"));
}

#[tokio::test]
async fn test_raised_group_limit_renumbers_every_line() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().to_str().unwrap().to_string();
    let storage = LocalStorage::new(base.clone());
    let cfg = Arc::new(config(&base, "[cleanup]\nmax_lines_per_group = 20\n"));
    let store = Arc::new(InMemoryStore::new(twelve_a()));
    analyze(&cfg, &store, &storage).await;

    let job = CleanupJob::new(
        cfg.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .with_dry_run(false)
    .at(now());
    let summary = JobEngine::new(job).run().await.unwrap();

    assert_eq!(summary.failures, 0);
    assert_eq!(store.lines_with_value(&lot(), "A").await.unwrap().len(), 1);
    assert_eq!(store.lines_with_value(&lot(), "CLN-100000").await.unwrap().len(), 11);
    let report = read_text(&storage, &summary.artifacts[0]).await;
    assert!(report.contains("Skipped Lines: 0"));
    assert!(report.contains("A -> CLN-100000 (COMPLETED)"));
}
