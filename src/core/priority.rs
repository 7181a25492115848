use crate::domain::model::{DuplicateGroup, Priority};
use chrono::{DateTime, Duration, Utc};

pub const COUNT_WEIGHT: u32 = 10;
pub const ACTIVE_QUANTITY_BONUS: u32 = 50;
pub const RECENT_ACTIVITY_BONUS: u32 = 30;
pub const RECENT_ACTIVITY_DAYS: i64 = 30;

/// Inputs the tier depends on, kept for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityScore {
    pub value: u32,
    pub has_active_quantity: bool,
    pub has_recent_activity: bool,
}

pub fn score_parts(occurrence_count: u32, has_active_quantity: bool, has_recent_activity: bool) -> u32 {
    let mut score = occurrence_count.saturating_mul(COUNT_WEIGHT);
    if has_active_quantity {
        score = score.saturating_add(ACTIVE_QUANTITY_BONUS);
    }
    if has_recent_activity {
        score = score.saturating_add(RECENT_ACTIVITY_BONUS);
    }
    score
}

/// Descending ladder, first match wins.
pub fn tier(score: u32) -> Priority {
    if score > 80 {
        Priority::Critical
    } else if score > 50 {
        Priority::High
    } else if score > 30 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

pub fn evaluate(group: &DuplicateGroup, now: DateTime<Utc>) -> PriorityScore {
    let has_active_quantity = group
        .members
        .iter()
        .any(|m| m.quantity.is_some_and(|q| q > 0.0));

    let window = Duration::days(RECENT_ACTIVITY_DAYS);
    let has_recent_activity = group
        .members
        .iter()
        .filter_map(|m| m.activity_at())
        .any(|at| now.signed_duration_since(at) < window);

    PriorityScore {
        value: score_parts(group.occurrence_count, has_active_quantity, has_recent_activity),
        has_active_quantity,
        has_recent_activity,
    }
}

pub fn score(group: &DuplicateGroup, now: DateTime<Utc>) -> Priority {
    tier(evaluate(group, now).value)
}

/// Fills in `priority` on every group.
pub fn score_all(groups: &mut [DuplicateGroup], now: DateTime<Utc>) {
    for group in groups.iter_mut() {
        let result = evaluate(group, now);
        group.priority = tier(result.value);
        tracing::debug!(
            "Scored '{}' ({}): {} -> {}",
            group.value,
            group.category,
            result.value,
            group.priority
        );
    }
}
