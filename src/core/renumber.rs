//! Plans RENUMBER cleanup: the first stored occurrence of a duplicated value
//! keeps it, every later occurrence moves to one freshly generated value.

use crate::domain::model::{DuplicateGroup, RenumberChange, TransactionLineRef};
use std::collections::HashSet;

pub trait SuffixGenerator: Send {
    fn next_suffix(&mut self) -> String;
}

/// Monotonic counter suffix (`100000`, `100001`, ...).
#[derive(Debug, Clone)]
pub struct SequentialSuffix {
    next: u64,
}

impl SequentialSuffix {
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }
}

impl SuffixGenerator for SequentialSuffix {
    fn next_suffix(&mut self) -> String {
        let suffix = self.next.to_string();
        self.next = self.next.saturating_add(1);
        suffix
    }
}

pub struct RenumberPlanner<G: SuffixGenerator> {
    prefix: String,
    cap: usize,
    generator: G,
    /// Members per group, the kept one included.
    member_limit: usize,
    /// Values a new number must never collide with: the loaded catalog plus
    /// everything issued by this planner.
    reserved: HashSet<String>,
}

impl<G: SuffixGenerator> RenumberPlanner<G> {
    pub fn new(prefix: impl Into<String>, cap: usize, generator: G) -> Self {
        Self {
            prefix: prefix.into(),
            cap,
            generator,
            member_limit: usize::MAX,
            reserved: HashSet::new(),
        }
    }

    /// Members past `limit` are listed as skipped instead of affected.
    pub fn with_member_limit(mut self, limit: usize) -> Self {
        self.member_limit = limit.max(1);
        self
    }

    pub fn with_catalog<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(values.into_iter().map(Into::into));
        self
    }

    /// Generator must eventually yield an unseen suffix.
    fn next_value(&mut self) -> String {
        loop {
            let candidate = format!("{}{}", self.prefix, self.generator.next_suffix());
            if self.reserved.insert(candidate.clone()) {
                return candidate;
            }
            tracing::debug!("Skipping renumber candidate '{}' (already in use)", candidate);
        }
    }

    /// Up to `cap` groups, in the order given. Nothing is mutated here; live
    /// runs hand the result to the cleanup job which applies it.
    pub fn plan(&mut self, groups: &[DuplicateGroup], dry_run: bool) -> Vec<RenumberChange> {
        // 既有的重複值本身也不可再被發出
        self.reserved.extend(groups.iter().map(|g| g.value.clone()));

        groups
            .iter()
            .take(self.cap)
            .map(|group| {
                let new_value = self.next_value();
                let kept_member_id = group.members.first().map(TransactionLineRef::member_label);
                let affected_member_ids = group
                    .members
                    .iter()
                    .take(self.member_limit)
                    .skip(1)
                    .map(TransactionLineRef::member_label)
                    .collect();
                let skipped_member_ids: Vec<String> = group
                    .members
                    .iter()
                    .skip(self.member_limit)
                    .map(TransactionLineRef::member_label)
                    .collect();
                if !skipped_member_ids.is_empty() {
                    tracing::warn!(
                        "⚠️ '{}' has {} members over the limit of {}",
                        group.value,
                        skipped_member_ids.len(),
                        self.member_limit
                    );
                }

                if dry_run {
                    tracing::info!("DRY RUN: would renumber {} to {}", group.value, new_value);
                }

                RenumberChange {
                    category: group.category,
                    field_id: group.field_id.clone(),
                    original_value: group.value.clone(),
                    new_value,
                    kept_member_id,
                    affected_member_ids,
                    skipped_member_ids,
                    applied: false,
                    dry_run,
                    failures: Vec::new(),
                }
            })
            .collect()
    }
}
