//! Flat report artifacts: the duplicate analysis CSV (and its parser), the
//! cleanup report, the pre-cleanup backup and the reconciliation reports.

use crate::domain::model::{
    AnalysisReport, CleanupOutcome, CleanupStrategy, DuplicateCategory, DuplicateGroup, Priority,
    ReconciliationExceptions, TransactionLineRef,
};
use crate::utils::error::{InventoryError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashMap;
use std::fmt::Write as _;

pub const PLACEHOLDER: &str = "N/A";

/// Column order of the analysis artifact. Changing it breaks older artifacts.
pub const ANALYSIS_COLUMNS: [&str; 16] = [
    "Category",
    "Type",
    "Number",
    "Duplicate Count",
    "Item",
    "Item ID",
    "Location",
    "Transaction ID",
    "Line ID",
    "Transaction #",
    "Transaction Type",
    "Date",
    "Quantity",
    "Created By",
    "Last Modified",
    "Priority",
];

pub const BACKUP_COLUMNS: [&str; 4] = ["Type", "Field", "Number", "Count"];

pub const EXCEPTION_COLUMNS: [&str; 6] =
    ["Exception", "Reference", "Number", "Item", "Detail", "Severity"];

fn or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

fn from_placeholder(value: &str) -> Option<String> {
    if value.is_empty() || value == PLACEHOLDER {
        None
    } else {
        Some(value.to_string())
    }
}

fn finish_writer(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| InventoryError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| InventoryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// 以 csv 的跳脫規則為單一欄位加上引號
fn quote(text: &str) -> Result<String> {
    let mut field = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());
    field.write_field(text)?;
    finish_writer(field)
}

/// A report cell. Only counts are written bare, so a numeric-looking lot
/// number or id still comes out quoted.
#[derive(Debug, Clone, Copy)]
enum Cell<'a> {
    Text(&'a str),
    Count(u32),
}

struct RowWriter {
    // 欄位已預先加好引號，這裡不可再加
    inner: csv::Writer<Vec<u8>>,
}

impl RowWriter {
    fn new() -> Self {
        Self {
            inner: WriterBuilder::new()
                .quote_style(QuoteStyle::Never)
                .from_writer(Vec::new()),
        }
    }

    fn write_row<'a>(&mut self, cells: impl IntoIterator<Item = Cell<'a>>) -> Result<()> {
        let fields = cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Text(text) => quote(text),
                Cell::Count(count) => Ok(count.to_string()),
            })
            .collect::<Result<Vec<String>>>()?;
        self.inner.write_record(&fields)?;
        Ok(())
    }

    fn write_text_row<I>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let fields = cells
            .into_iter()
            .map(|cell| quote(cell.as_ref()))
            .collect::<Result<Vec<String>>>()?;
        self.inner.write_record(&fields)?;
        Ok(())
    }

    fn finish(self) -> Result<String> {
        finish_writer(self.inner)
    }
}

fn member_columns(member: &TransactionLineRef) -> [String; 11] {
    [
        or_placeholder(Some(&member.item)),
        or_placeholder(Some(&member.item_id)),
        or_placeholder(member.location.as_deref()),
        or_placeholder(Some(&member.transaction_id)),
        or_placeholder(Some(&member.line_id)),
        or_placeholder(member.transaction_number.as_deref()),
        or_placeholder(Some(&member.transaction_type)),
        member
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        member
            .quantity
            .map(|q| q.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        or_placeholder(member.created_by.as_deref()),
        member
            .last_modified
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    ]
}

/// One row per (group, member); a group without members gets a single
/// placeholder row.
pub fn render_analysis_csv(groups: &[DuplicateGroup]) -> Result<String> {
    let mut writer = RowWriter::new();
    writer.write_text_row(ANALYSIS_COLUMNS)?;

    for group in groups {
        let head = [
            Cell::Text(group.category.as_str()),
            Cell::Text(group.type_label()),
            Cell::Text(group.value.as_str()),
            Cell::Count(group.occurrence_count),
        ];
        let priority = Cell::Text(group.priority.as_str());

        if group.members.is_empty() {
            let blanks = std::iter::repeat(Cell::Text(PLACEHOLDER)).take(11);
            writer.write_row(head.into_iter().chain(blanks).chain([priority]))?;
            continue;
        }

        for member in &group.members {
            let detail = member_columns(member);
            let detail = detail.iter().map(|d| Cell::Text(d.as_str()));
            writer.write_row(head.into_iter().chain(detail).chain([priority]))?;
        }
    }

    writer.finish()
}

fn artifact_error(name: &str, message: impl Into<String>) -> InventoryError {
    InventoryError::ArtifactLoad {
        path: name.to_string(),
        message: message.into(),
    }
}

fn parse_member(record: &StringRecord) -> Option<TransactionLineRef> {
    let transaction_id = from_placeholder(record.get(7)?)?;

    Some(TransactionLineRef {
        transaction_id,
        line_id: from_placeholder(record.get(8)?).unwrap_or_default(),
        transaction_number: from_placeholder(record.get(9)?),
        transaction_type: from_placeholder(record.get(10)?).unwrap_or_default(),
        date: record
            .get(11)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        item: from_placeholder(record.get(4)?).unwrap_or_default(),
        item_id: from_placeholder(record.get(5)?).unwrap_or_default(),
        quantity: record.get(12).and_then(|q| q.parse::<f64>().ok()),
        location: from_placeholder(record.get(6)?),
        created_by: from_placeholder(record.get(13)?),
        last_modified: record
            .get(14)
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc)),
    })
}

/// Rebuilds groups from an analysis artifact. Groups come back in first-seen
/// order; member rows are restored on a best-effort basis.
pub fn parse_analysis_csv(name: &str, contents: &str) -> Result<Vec<DuplicateGroup>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| artifact_error(name, format!("unreadable header: {}", e)))?;
    if headers.iter().ne(ANALYSIS_COLUMNS.iter().copied()) {
        return Err(artifact_error(name, "unexpected header row"));
    }

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut index: HashMap<(DuplicateCategory, String, String), usize> = HashMap::new();

    for (row_number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| artifact_error(name, format!("row {}: {}", row_number + 2, e)))?;
        if record.len() != ANALYSIS_COLUMNS.len() {
            return Err(artifact_error(
                name,
                format!("row {}: expected {} columns", row_number + 2, ANALYSIS_COLUMNS.len()),
            ));
        }

        let category: DuplicateCategory = record[0]
            .parse()
            .map_err(|e: String| artifact_error(name, format!("row {}: {}", row_number + 2, e)))?;
        let type_label = record[1].to_string();
        let value = record[2].to_string();
        let count: u32 = record[3].parse().map_err(|_| {
            artifact_error(name, format!("row {}: invalid count '{}'", row_number + 2, &record[3]))
        })?;
        let priority: Priority = record[15]
            .parse()
            .map_err(|e: String| artifact_error(name, format!("row {}: {}", row_number + 2, e)))?;

        let key = (category, type_label.clone(), value.clone());
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                let field_id = if category.is_native() {
                    None
                } else {
                    Some(type_label)
                };
                groups.push(DuplicateGroup {
                    category,
                    field_id,
                    value,
                    occurrence_count: count,
                    members: Vec::new(),
                    priority,
                });
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };

        if let Some(member) = parse_member(&record) {
            groups[slot].members.push(member);
        }
    }

    Ok(groups)
}

/// Text summary written next to the analysis CSV.
pub fn render_analysis_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Duplicate Analysis Summary");
    let _ = writeln!(out, "Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "Total Duplicates: {}", report.groups.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "By Category:");
    for category in [
        DuplicateCategory::NativeSerial,
        DuplicateCategory::NativeLot,
        DuplicateCategory::CustomLot,
        DuplicateCategory::CustomUnit,
    ] {
        let _ = writeln!(out, "  {}: {}", category, report.count_by_category(category));
    }

    let _ = writeln!(out, "By Priority:");
    for priority in [Priority::Critical, Priority::High, Priority::Medium, Priority::Low] {
        let _ = writeln!(out, "  {}: {}", priority, report.count_by_priority(priority));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Failed Fields: {}", report.failures.len());
    for failure in &report.failures {
        let _ = writeln!(out, "  {}: {}", failure.target, failure.message);
    }
    out
}

pub fn render_cleanup_report(outcome: &CleanupOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Cleanup Report");
    let _ = writeln!(
        out,
        "Strategy: {}",
        match outcome.strategy {
            CleanupStrategy::Renumber => "RENUMBER",
            CleanupStrategy::Flag => "FLAG",
        }
    );
    let _ = writeln!(out, "Dry Run: {}", outcome.dry_run);
    let _ = writeln!(out, "Processed: {}", outcome.processed);
    let _ = writeln!(out, "Success: {}", outcome.success_count());
    let _ = writeln!(out, "Failed: {}", outcome.failed_count());
    let _ = writeln!(out, "Skipped Lines: {}", outcome.skipped_member_count());
    let _ = writeln!(out);

    let _ = writeln!(out, "Changes:");
    for change in &outcome.changes {
        let _ = writeln!(
            out,
            "{} -> {} ({})",
            change.original_value,
            change.new_value,
            change.status_label()
        );
    }

    let failed: Vec<_> = outcome.changes.iter().filter(|c| c.is_failed()).collect();
    if !failed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures:");
        for change in failed {
            for failure in &change.failures {
                let _ = writeln!(
                    out,
                    "{} [{} {}] {}: {}",
                    change.original_value,
                    change.category,
                    change.field_id.as_deref().unwrap_or(PLACEHOLDER),
                    failure.member_id,
                    failure.message
                );
            }
        }
    }

    let skipped: Vec<_> = outcome
        .changes
        .iter()
        .filter(|c| !c.skipped_member_ids.is_empty())
        .collect();
    if !skipped.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Over the per-group line limit (still on the old value):");
        for change in skipped {
            let _ = writeln!(
                out,
                "{} [{} {}]: {}",
                change.original_value,
                change.category,
                change.field_id.as_deref().unwrap_or(PLACEHOLDER),
                change.skipped_member_ids.join(", ")
            );
        }
    }

    if !outcome.flagged.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Flagged for manual review:");
        for group in &outcome.flagged {
            let _ = writeln!(
                out,
                "{} [{} {}] count {} priority {}",
                group.value,
                group.category,
                group.type_label(),
                group.occurrence_count,
                group.priority
            );
        }
    }

    out
}

/// Snapshot of the groups a destructive cleanup is about to touch.
pub fn render_backup_csv(groups: &[DuplicateGroup]) -> Result<String> {
    let mut writer = RowWriter::new();
    writer.write_text_row(BACKUP_COLUMNS)?;
    for group in groups {
        writer.write_row([
            Cell::Text(group.category.as_str()),
            Cell::Text(group.type_label()),
            Cell::Text(group.value.as_str()),
            Cell::Count(group.occurrence_count),
        ])?;
    }
    writer.finish()
}

pub fn render_reconciliation_report(
    exceptions: &ReconciliationExceptions,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Daily Reconciliation Report");
    let _ = writeln!(out, "Date: {}", generated_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "Duplicates: {}", exceptions.duplicates.len());
    let _ = writeln!(out, "Unauthorized: {}", exceptions.unauthorized.len());
    let _ = writeln!(out, "Variances: {}", exceptions.variances.len());
    let _ = writeln!(out, "Stale WO: {}", exceptions.stale_work_orders.len());
    let _ = writeln!(out, "Total Exceptions: {}", exceptions.total());

    if !exceptions.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Incomplete Checks: {}", exceptions.failures.len());
        for failure in &exceptions.failures {
            let _ = writeln!(out, "  {}: {}", failure.target, failure.message);
        }
    }
    out
}

pub fn render_exceptions_csv(exceptions: &ReconciliationExceptions) -> Result<String> {
    let mut writer = RowWriter::new();
    writer.write_text_row(EXCEPTION_COLUMNS)?;

    for group in &exceptions.duplicates {
        let item = group
            .members
            .first()
            .map(|m| m.item.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string());
        writer.write_text_row([
            "DUPLICATE".to_string(),
            group.type_label().to_string(),
            group.value.clone(),
            item,
            format!("{} occurrences", group.occurrence_count),
            group.priority.to_string(),
        ])?;
    }

    for transfer in &exceptions.unauthorized {
        writer.write_text_row([
            "UNAUTHORIZED_TRANSFER".to_string(),
            transfer.transaction_id.clone(),
            transfer.transaction_number.clone(),
            PLACEHOLDER.to_string(),
            format!(
                "created by {} (status: {})",
                transfer.created_by.as_deref().unwrap_or(PLACEHOLDER),
                transfer.authorization_status.as_deref().unwrap_or("empty")
            ),
            Priority::High.to_string(),
        ])?;
    }

    for variance in &exceptions.variances {
        let snapshot = &variance.snapshot;
        writer.write_text_row([
            "QUANTITY_VARIANCE".to_string(),
            snapshot.item_id.clone(),
            or_placeholder(snapshot.location.as_deref()),
            snapshot.item.clone(),
            format!(
                "expected {} counted {} ({:.2}%)",
                snapshot.expected, snapshot.actual, variance.variance_pct
            ),
            Priority::Medium.to_string(),
        ])?;
    }

    for stale in &exceptions.stale_work_orders {
        let wo = &stale.work_order;
        writer.write_text_row([
            "STALE_WORK_ORDER".to_string(),
            wo.transaction_id.clone(),
            wo.transaction_number.clone(),
            wo.item.clone(),
            format!("{} for {} days", wo.status, stale.age_days),
            if stale.critical {
                Priority::Critical.to_string()
            } else {
                Priority::Medium.to_string()
            },
        ])?;
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        FieldKind, MemberFailure, RenumberChange, ScanFailure, ScanSource,
    };
    use chrono::TimeZone;

    fn member(id: &str, quantity: f64) -> TransactionLineRef {
        TransactionLineRef {
            transaction_id: id.to_string(),
            line_id: "1".to_string(),
            transaction_number: Some(format!("IF{}", id)),
            transaction_type: "ItemShip".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 5),
            item: "Widget, Large".to_string(),
            item_id: "501".to_string(),
            quantity: Some(quantity),
            location: Some("Main Warehouse".to_string()),
            created_by: Some("Jane Doe".to_string()),
            last_modified: Some(Utc.with_ymd_and_hms(2026, 1, 6, 8, 30, 0).unwrap()),
        }
    }

    fn sample_groups() -> Vec<DuplicateGroup> {
        let mut lot = DuplicateGroup::new(
            &ScanSource::custom(FieldKind::Lot, "L123456789"),
            "LOT-2024-001",
            2,
            vec![member("11", 5.0), member("12", 2.5)],
        );
        lot.priority = Priority::Critical;

        let mut native = DuplicateGroup::new(&ScanSource::NativeSerial, "SN,42", 3, Vec::new());
        native.priority = Priority::Low;

        vec![lot, native]
    }

    #[test]
    fn test_render_header_and_rows() {
        let csv = render_analysis_csv(&sample_groups()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4); // header + 2 members + 1 placeholder
        assert!(lines[0].starts_with("\"Category\",\"Type\",\"Number\",\"Duplicate Count\""));
        assert!(lines[1].starts_with("\"custom-lot\",\"L123456789\",\"LOT-2024-001\",2,"));
        assert!(lines[1].contains("\"Widget, Large\""));
        assert!(lines[1].ends_with(",\"CRITICAL\""));
        assert!(lines[3].starts_with("\"native-serial\",\"Native Serial\",\"SN,42\",3,\"N/A\""));
    }

    #[test]
    fn test_numeric_looking_text_is_quoted() {
        let mut group = DuplicateGroup::new(
            &ScanSource::custom(FieldKind::Lot, "L100000001"),
            "12345",
            2,
            vec![member("7", 2.0)],
        );
        group.priority = Priority::High;

        let csv = render_analysis_csv(&[group]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("\"custom-lot\",\"L100000001\",\"12345\",2,"));
        assert!(row.contains(",\"501\",\"Main Warehouse\",\"7\",\"1\",\"IF7\","));
        assert!(row.contains(",\"2\",\"Jane Doe\","));
    }

    #[test]
    fn test_round_trip_recovers_group_tuples() {
        let groups = sample_groups();
        let csv = render_analysis_csv(&groups).unwrap();
        let parsed = parse_analysis_csv("artifact.csv", &csv).unwrap();

        assert_eq!(parsed.len(), 2);
        for (original, restored) in groups.iter().zip(parsed.iter()) {
            assert_eq!(original.category, restored.category);
            assert_eq!(original.field_id, restored.field_id);
            assert_eq!(original.value, restored.value);
            assert_eq!(original.occurrence_count, restored.occurrence_count);
            assert_eq!(original.priority, restored.priority);
        }
        assert_eq!(parsed[0].members, groups[0].members);
        assert!(parsed[1].members.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_artifacts() {
        let err = parse_analysis_csv("a.csv", "Type,Field ID,Number,Count,Item\n").unwrap_err();
        assert!(matches!(err, InventoryError::ArtifactLoad { .. }));

        let mut csv = render_analysis_csv(&sample_groups()).unwrap();
        csv = csv.replace("CRITICAL", "URGENT");
        assert!(matches!(
            parse_analysis_csv("a.csv", &csv),
            Err(InventoryError::ArtifactLoad { .. })
        ));

        let csv = render_analysis_csv(&sample_groups()).unwrap().replacen(",2,", ",two,", 1);
        assert!(parse_analysis_csv("a.csv", &csv).is_err());
    }

    #[test]
    fn test_parse_header_only_is_empty() {
        let csv = render_analysis_csv(&[]).unwrap();
        assert!(parse_analysis_csv("a.csv", &csv).unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_report_lists_changes_and_failures() {
        let outcome = CleanupOutcome {
            strategy: CleanupStrategy::Renumber,
            dry_run: false,
            processed: 2,
            changes: vec![
                RenumberChange {
                    category: DuplicateCategory::CustomLot,
                    field_id: Some("L123456789".to_string()),
                    original_value: "A".to_string(),
                    new_value: "CLN-100000".to_string(),
                    kept_member_id: Some("1".to_string()),
                    affected_member_ids: vec!["2".to_string()],
                    skipped_member_ids: Vec::new(),
                    applied: true,
                    dry_run: false,
                    failures: Vec::new(),
                },
                RenumberChange {
                    category: DuplicateCategory::CustomUnit,
                    field_id: Some("U111222333".to_string()),
                    original_value: "B".to_string(),
                    new_value: "CLN-100001".to_string(),
                    kept_member_id: Some("3".to_string()),
                    affected_member_ids: vec!["4".to_string()],
                    skipped_member_ids: Vec::new(),
                    applied: false,
                    dry_run: false,
                    failures: vec![MemberFailure {
                        member_id: "4".to_string(),
                        message: "record locked".to_string(),
                    }],
                },
            ],
            flagged: Vec::new(),
        };

        let text = render_cleanup_report(&outcome);
        assert!(text.contains("Processed: 2\nSuccess: 1\nFailed: 1\n"));
        assert!(text.contains("A -> CLN-100000 (COMPLETED)"));
        assert!(text.contains("B -> CLN-100001 (FAILED)"));
        assert!(text.contains("B [custom-unit U111222333] 4: record locked"));
    }

    #[test]
    fn test_cleanup_report_lists_skipped_lines() {
        let outcome = CleanupOutcome {
            strategy: CleanupStrategy::Renumber,
            dry_run: false,
            processed: 1,
            changes: vec![RenumberChange {
                category: DuplicateCategory::CustomLot,
                field_id: Some("L123456789".to_string()),
                original_value: "A".to_string(),
                new_value: "CLN-100000".to_string(),
                kept_member_id: Some("1".to_string()),
                affected_member_ids: vec!["2".to_string()],
                skipped_member_ids: vec!["3".to_string(), "4".to_string()],
                applied: false,
                dry_run: false,
                failures: Vec::new(),
            }],
            flagged: Vec::new(),
        };

        let text = render_cleanup_report(&outcome);
        assert!(text.contains("Success: 0\nFailed: 1\nSkipped Lines: 2\n"));
        assert!(text.contains("A -> CLN-100000 (FAILED)"));
        assert!(text.contains("A [custom-lot L123456789]: 3, 4"));
    }

    #[test]
    fn test_summary_reports_failed_fields() {
        let report = AnalysisReport {
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap(),
            groups: sample_groups(),
            failures: vec![ScanFailure {
                target: "unit field U1".to_string(),
                message: "timed out".to_string(),
            }],
        };
        let text = render_analysis_summary(&report);
        assert!(text.contains("Total Duplicates: 2"));
        assert!(text.contains("  custom-lot: 1"));
        assert!(text.contains("  CRITICAL: 1"));
        assert!(text.contains("Failed Fields: 1\n  unit field U1: timed out"));
    }

    #[test]
    fn test_backup_csv_rows() {
        let csv = render_backup_csv(&sample_groups()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "\"Type\",\"Field\",\"Number\",\"Count\"");
        assert_eq!(lines[1], "\"custom-lot\",\"L123456789\",\"LOT-2024-001\",2");
        assert_eq!(lines[2], "\"native-serial\",\"Native Serial\",\"SN,42\",3");
    }
}
