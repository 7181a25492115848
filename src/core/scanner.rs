//! Groups transaction lines by an exact key value and keeps the values that
//! occur more than once.

use crate::config::toml_config::ValueNormalization;
use crate::domain::model::{DuplicateGroup, ScanSource, TransactionLineRef};
use std::collections::HashMap;

/// A line paired with its grouping key (`None` when the field is empty).
pub type KeyedLine = (Option<String>, TransactionLineRef);

pub fn normalize(value: &str, normalization: ValueNormalization) -> String {
    match normalization {
        ValueNormalization::None => value.to_string(),
        ValueNormalization::Trim => value.trim().to_string(),
        ValueNormalization::TrimUppercase => value.trim().to_uppercase(),
    }
}

/// Collects lines per key in first-seen order. One accumulator may cover a
/// single partition of the input; partials are merged by partition index.
#[derive(Debug, Clone, Default)]
pub struct GroupAccumulator {
    partition: usize,
    normalization: ValueNormalization,
    index: HashMap<String, usize>,
    buckets: Vec<(String, Vec<TransactionLineRef>)>,
}

impl GroupAccumulator {
    pub fn new(normalization: ValueNormalization) -> Self {
        Self::for_partition(0, normalization)
    }

    pub fn for_partition(partition: usize, normalization: ValueNormalization) -> Self {
        Self {
            partition,
            normalization,
            index: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    pub fn push(&mut self, key: Option<&str>, line: TransactionLineRef) {
        let key = match key {
            Some(raw) if !raw.is_empty() => normalize(raw, self.normalization),
            _ => return,
        };
        if key.is_empty() {
            return;
        }

        match self.index.get(&key) {
            Some(&slot) => self.buckets[slot].1.push(line),
            None => {
                self.index.insert(key.clone(), self.buckets.len());
                self.buckets.push((key, vec![line]));
            }
        }
    }

    pub fn extend<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = KeyedLine>,
    {
        for (key, line) in rows {
            self.push(key.as_deref(), line);
        }
    }

    /// Appends `other` after everything already collected.
    pub fn absorb(&mut self, other: GroupAccumulator) {
        for (key, lines) in other.buckets {
            match self.index.get(&key) {
                Some(&slot) => self.buckets[slot].1.extend(lines),
                None => {
                    self.index.insert(key.clone(), self.buckets.len());
                    self.buckets.push((key, lines));
                }
            }
        }
    }

    /// `(value, count)` for every key seen, singletons included.
    pub fn counts(&self) -> Vec<(String, usize)> {
        self.buckets
            .iter()
            .map(|(key, lines)| (key.clone(), lines.len()))
            .collect()
    }

    pub fn lines_for(&self, key: &str) -> &[TransactionLineRef] {
        self.index
            .get(key)
            .map(|&slot| self.buckets[slot].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn finish(self, source: &ScanSource) -> Vec<DuplicateGroup> {
        self.buckets
            .into_iter()
            .filter(|(_, lines)| lines.len() > 1)
            .map(|(key, lines)| {
                let count = u32::try_from(lines.len()).unwrap_or(u32::MAX);
                DuplicateGroup::new(source, key, count, lines)
            })
            .collect()
    }
}

/// Single-pass scan of one source.
pub fn scan<I>(source: &ScanSource, rows: I, normalization: ValueNormalization) -> Vec<DuplicateGroup>
where
    I: IntoIterator<Item = KeyedLine>,
{
    let mut acc = GroupAccumulator::new(normalization);
    acc.extend(rows);
    acc.finish(source)
}

/// Merges partition partials in partition-index order, so the result equals a
/// single-pass scan over the concatenated partitions.
pub fn merge_partitions(
    source: &ScanSource,
    mut partials: Vec<GroupAccumulator>,
    normalization: ValueNormalization,
) -> Vec<DuplicateGroup> {
    partials.sort_by_key(GroupAccumulator::partition);

    let mut merged = GroupAccumulator::new(normalization);
    for partial in partials {
        merged.absorb(partial);
    }
    merged.finish(source)
}
