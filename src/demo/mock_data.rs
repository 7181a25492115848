//! Random mock transactions for demo runs. The same seed always yields the
//! same dataset.

use crate::adapters::memory_store::{Dataset, StoredLine};
use crate::domain::model::{
    QuantitySnapshot, TransactionLineRef, UnauthorizedTransfer, WorkOrderRef,
};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEMO_LOT_FIELD: &str = "L000000001";
pub const DEMO_UNIT_FIELD: &str = "U000000001";

const TYPES: [&str; 5] = [
    "Item Fulfillment",
    "Item Receipt",
    "Inventory Transfer",
    "Work Order",
    "Assembly Build",
];
const ITEMS: [&str; 6] = [
    "Widget A",
    "Widget B",
    "Widget C",
    "Component X",
    "Component Y",
    "Assembly Z",
];

/// 每種重複情境注入的筆數
const INJECTED_PER_SCENARIO: usize = 3;

/// Seeded generator for a demo run. Without a seed one is drawn from the
/// thread RNG and returned so the run can be reproduced.
pub fn demo_rng(seed: Option<u64>) -> (StdRng, u64) {
    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
    (StdRng::seed_from_u64(seed), seed)
}

fn pick<R: Rng + ?Sized>(rng: &mut R, options: &[&str]) -> String {
    options.choose(rng).copied().unwrap_or_default().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTransaction {
    pub id: String,
    pub transaction_type: String,
    pub date: NaiveDate,
    pub lot_number: String,
    pub unit_number: String,
    pub item: String,
    pub quantity: u32,
    pub authorized: bool,
}

fn random_date<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> NaiveDate {
    today - Duration::days(rng.gen_range(0..=30))
}

/// `count` base transactions, then three clones each sharing the lot, the
/// unit, or both with an earlier transaction. Shuffled.
pub fn generate_transactions<R: Rng + ?Sized>(
    count: usize,
    rng: &mut R,
    today: NaiveDate,
) -> Vec<MockTransaction> {
    let mut transactions: Vec<MockTransaction> = (0..count)
        .map(|i| MockTransaction {
            id: format!("TXN{}", 1000 + i),
            transaction_type: pick(rng, &TYPES),
            date: random_date(rng, today),
            lot_number: format!("LOT-2024-{}", rng.gen_range(100..=999)),
            unit_number: format!("UNIT-{}", rng.gen_range(1000..=9999)),
            item: pick(rng, &ITEMS),
            quantity: rng.gen_range(1..=100),
            authorized: rng.gen_bool(0.9),
        })
        .collect();

    let base = transactions.len();
    let slots = |scenario: usize| {
        let start = scenario * INJECTED_PER_SCENARIO;
        start.min(base)..(start + INJECTED_PER_SCENARIO).min(base)
    };

    for i in slots(0) {
        let original = transactions[i].clone();
        transactions.push(MockTransaction {
            id: format!("DUP-LOT-{}", original.id),
            unit_number: format!("UNIT-{}", rng.gen_range(1000..=9999)),
            quantity: original.quantity + rng.gen_range(1u32..=5),
            date: random_date(rng, today),
            ..original
        });
    }

    for i in slots(1) {
        let original = transactions[i].clone();
        transactions.push(MockTransaction {
            id: format!("DUP-UNIT-{}", original.id),
            lot_number: format!("LOT-2024-{}", rng.gen_range(100..=999)),
            quantity: original.quantity + rng.gen_range(1u32..=5),
            date: random_date(rng, today),
            ..original
        });
    }

    for i in slots(2) {
        let original = transactions[i].clone();
        transactions.push(MockTransaction {
            id: format!("DUP-EXACT-{}", original.id),
            ..original
        });
    }

    transactions.shuffle(rng);
    transactions
}

/// Lays the transactions out as a store dataset: one line each carrying the
/// demo lot/unit fields, fulfillments with their approval, open work orders
/// and one quantity snapshot per item.
pub fn to_dataset<R: Rng + ?Sized>(
    transactions: &[MockTransaction],
    rng: &mut R,
    today: NaiveDate,
) -> Dataset {
    let lines = transactions
        .iter()
        .map(|t| StoredLine {
            line: TransactionLineRef {
                transaction_id: t.id.clone(),
                line_id: "1".to_string(),
                transaction_number: Some(t.id.clone()),
                transaction_type: t.transaction_type.clone(),
                date: Some(t.date),
                item: t.item.clone(),
                item_id: item_id(&t.item),
                quantity: Some(f64::from(t.quantity)),
                location: Some("Main Warehouse".to_string()),
                created_by: Some("demo".to_string()),
                last_modified: None,
            },
            values: HashMap::from([
                (DEMO_LOT_FIELD.to_string(), t.lot_number.clone()),
                (DEMO_UNIT_FIELD.to_string(), t.unit_number.clone()),
            ]),
            mainline: false,
            active: true,
        })
        .collect();

    let fulfillments = transactions
        .iter()
        .filter(|t| t.transaction_type == "Item Fulfillment")
        .map(|t| UnauthorizedTransfer {
            transaction_id: t.id.clone(),
            transaction_number: t.id.clone(),
            created_by: Some("demo".to_string()),
            date: Some(t.date),
            authorization_status: t.authorized.then(|| "Approved".to_string()),
        })
        .collect();

    let work_orders = transactions
        .iter()
        .filter(|t| t.transaction_type == "Work Order")
        .map(|t| WorkOrderRef {
            transaction_id: t.id.clone(),
            transaction_number: t.id.clone(),
            item: t.item.clone(),
            status: "Released".to_string(),
            // 拉長工單年齡，讓部分工單超過停滯門檻
            date: t.date - Duration::days(rng.gen_range(0..=120)),
        })
        .collect();

    let mut totals: Vec<(&str, u32)> = Vec::new();
    for t in transactions {
        match totals.iter_mut().find(|(item, _)| *item == t.item) {
            Some((_, qty)) => *qty += t.quantity,
            None => totals.push((t.item.as_str(), t.quantity)),
        }
    }
    let snapshots = totals
        .into_iter()
        .map(|(item, expected)| {
            let expected = f64::from(expected);
            let drift = if rng.gen_bool(0.3) {
                f64::from(rng.gen_range(1u32..=10))
            } else {
                0.0
            };
            QuantitySnapshot {
                item: item.to_string(),
                item_id: item_id(item),
                location: Some("Main Warehouse".to_string()),
                expected,
                actual: expected - drift,
            }
        })
        .collect();

    tracing::debug!("Generated demo dataset as of {}", today);

    Dataset {
        custom_fields: vec![DEMO_LOT_FIELD.to_string(), DEMO_UNIT_FIELD.to_string()],
        lines,
        inventory_numbers: Vec::new(),
        fulfillments,
        work_orders,
        snapshots,
    }
}

fn item_id(item: &str) -> String {
    ITEMS
        .iter()
        .position(|i| *i == item)
        .map(|p| (100 + p).to_string())
        .unwrap_or_else(|| "0".to_string())
}
