// 📊 Metrics Engine - pure aggregations over a RecordSet
//
// Nothing here performs I/O or fails. Degenerate inputs resolve to 0.0 or
// None instead of dividing by zero.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::record_set::{GroupField, RecordSet};

/// A `(label, total)` pair produced by grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTotal {
    pub label: String,
    pub total: f64,
}

/// Result of a Pareto concentration analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoContribution {
    pub contributors: Vec<String>,
    /// Share of the grand total held by `contributors`, in percent.
    /// `None` when the record set is empty or its grand total is zero.
    pub contribution_percentage: Option<f64>,
}

pub fn total_sales(records: &RecordSet) -> f64 {
    records.iter().map(|r| r.amount).sum()
}

pub fn order_count(records: &RecordSet) -> usize {
    records.len()
}

/// Mean amount per record; 0.0 for an empty set.
pub fn average_order_value(records: &RecordSet) -> f64 {
    let count = order_count(records);
    if count == 0 {
        return 0.0;
    }
    total_sales(records) / count as f64
}

/// Sum amounts per group, sorted descending by total.
///
/// Ties keep first-encountered group order.
pub fn group_totals(records: &RecordSet, field: GroupField) -> Vec<GroupTotal> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<GroupTotal> = Vec::new();

    for record in records {
        let label = field.value(record);
        match index.get(label) {
            Some(&i) => groups[i].total += record.amount,
            None => {
                index.insert(label, groups.len());
                groups.push(GroupTotal {
                    label: label.to_string(),
                    total: record.amount,
                });
            }
        }
    }

    // sort_by is stable
    groups.sort_by(|a, b| b.total.total_cmp(&a.total));
    groups
}

pub fn top_n(records: &RecordSet, field: GroupField, n: usize) -> Vec<GroupTotal> {
    let mut groups = group_totals(records, field);
    groups.truncate(n);
    groups
}

/// Percentage change from `baseline` to `current`; 0.0 when `baseline <= 0`.
pub fn growth_rate(current: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        (current - baseline) / baseline * 100.0
    } else {
        0.0
    }
}

/// Share of total sales held by the top `fraction` of groups.
///
/// The number of contributors is `ceil(groups * fraction)`, with `fraction`
/// clamped to `[0, 1]`.
pub fn pareto_contribution(
    records: &RecordSet,
    field: GroupField,
    fraction: f64,
) -> ParetoContribution {
    if records.is_empty() {
        return ParetoContribution {
            contributors: Vec::new(),
            contribution_percentage: None,
        };
    }

    let ranked = group_totals(records, field);
    let take = (ranked.len() as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize;
    let top = &ranked[..take.min(ranked.len())];

    let grand_total = total_sales(records);
    let top_total: f64 = top.iter().map(|g| g.total).sum();

    let contribution_percentage = if grand_total == 0.0 {
        None
    } else {
        Some(top_total / grand_total * 100.0)
    };

    ParetoContribution {
        contributors: top.iter().map(|g| g.label.clone()).collect(),
        contribution_percentage,
    }
}
