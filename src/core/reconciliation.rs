use crate::domain::model::{
    QuantitySnapshot, QuantityVariance, StaleWorkOrder, UnauthorizedTransfer, WorkOrderRef,
};
use chrono::NaiveDate;

/// Percentage difference of `actual` against `expected`. `None` when
/// `expected` is zero (no meaningful base).
pub fn variance_pct(snapshot: &QuantitySnapshot) -> Option<f64> {
    if snapshot.expected == 0.0 {
        return None;
    }
    Some((snapshot.actual - snapshot.expected).abs() / snapshot.expected.abs() * 100.0)
}

/// Snapshots whose variance exceeds `threshold_pct`. A zero expected
/// quantity is flagged whenever anything was counted.
pub fn find_variances(snapshots: &[QuantitySnapshot], threshold_pct: f64) -> Vec<QuantityVariance> {
    snapshots
        .iter()
        .filter_map(|snapshot| match variance_pct(snapshot) {
            Some(pct) if pct > threshold_pct => Some(QuantityVariance {
                snapshot: snapshot.clone(),
                variance_pct: pct,
            }),
            None if snapshot.actual != 0.0 => Some(QuantityVariance {
                snapshot: snapshot.clone(),
                variance_pct: 100.0,
            }),
            _ => None,
        })
        .collect()
}

/// Open work orders dated `stale_days` or more before `today`.
pub fn find_stale_work_orders(
    orders: &[WorkOrderRef],
    open_statuses: &[String],
    today: NaiveDate,
    stale_days: i64,
    critical_days: i64,
) -> Vec<StaleWorkOrder> {
    orders
        .iter()
        .filter(|wo| open_statuses.iter().any(|s| s == &wo.status))
        .filter_map(|wo| {
            let age_days = (today - wo.date).num_days();
            (age_days >= stale_days).then(|| StaleWorkOrder {
                work_order: wo.clone(),
                age_days,
                critical: age_days >= critical_days,
            })
        })
        .collect()
}

pub fn is_unauthorized(transfer: &UnauthorizedTransfer, approved_value: &str) -> bool {
    match transfer.authorization_status.as_deref() {
        Some(status) => status.trim().is_empty() || status != approved_value,
        None => true,
    }
}

/// Keeps the transfers still lacking approval. The store already filters
/// server-side; this guards against adapters that return the full list.
pub fn filter_unauthorized(
    transfers: Vec<UnauthorizedTransfer>,
    approved_value: &str,
) -> Vec<UnauthorizedTransfer> {
    transfers
        .into_iter()
        .filter(|t| is_unauthorized(t, approved_value))
        .collect()
}
