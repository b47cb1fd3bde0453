// 📋 RecordSet - immutable views over sales records
// Every filter returns a new RecordSet; the source is never touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::SalesRecord;

/// Field a record set can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupField {
    Representative,
    Region,
    Category,
    Product,
}

impl GroupField {
    pub fn value<'a>(&self, record: &'a SalesRecord) -> &'a str {
        match self {
            GroupField::Representative => &record.representative,
            GroupField::Region => &record.region,
            GroupField::Category => &record.category,
            GroupField::Product => &record.product,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GroupField::Representative => "representative",
            GroupField::Region => "region",
            GroupField::Category => "category",
            GroupField::Product => "product",
        }
    }
}

/// Key used to compare entity names: surrounding whitespace dropped, lowercased.
pub fn normalize_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Total amount for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<SalesRecord>,
}

impl RecordSet {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        RecordSet { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SalesRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    /// Project the records matching `predicate` into a new set.
    pub fn filter<F>(&self, predicate: F) -> RecordSet
    where
        F: Fn(&SalesRecord) -> bool,
    {
        RecordSet {
            records: self.records.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    pub fn on_date(&self, date: NaiveDate) -> RecordSet {
        self.filter(|r| r.date == date)
    }

    pub fn up_to(&self, date: NaiveDate) -> RecordSet {
        self.filter(|r| r.date <= date)
    }

    /// Keep records whose `field` value is one of `values` (exact match).
    pub fn with_values(&self, field: GroupField, values: &[String]) -> RecordSet {
        self.filter(|r| values.iter().any(|v| v == field.value(r)))
    }

    /// Keep records whose `field` value, passed through `normalize_name`,
    /// is one of `normalized`.
    pub fn with_values_ignore_case(&self, field: GroupField, normalized: &[String]) -> RecordSet {
        self.filter(|r| {
            let value = normalize_name(field.value(r));
            normalized.iter().any(|v| *v == value)
        })
    }

    /// Distinct values of `field`, in first-encountered order.
    pub fn distinct(&self, field: GroupField) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut values = Vec::new();

        for record in &self.records {
            let value = field.value(record);
            if seen.insert(value) {
                values.push(value.to_string());
            }
        }

        values
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some((min, max))
    }

    /// Sum of amounts per calendar day, ascending by date. Days without
    /// records are absent, not zero.
    pub fn daily_totals(&self) -> Vec<DailyTotal> {
        let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();

        for record in &self.records {
            *by_day.entry(record.date).or_insert(0.0) += record.amount;
        }

        let mut totals: Vec<DailyTotal> = by_day
            .into_iter()
            .map(|(date, total)| DailyTotal { date, total })
            .collect();

        totals.sort_by_key(|d| d.date);
        totals
    }
}

impl From<Vec<SalesRecord>> for RecordSet {
    fn from(records: Vec<SalesRecord>) -> Self {
        RecordSet::new(records)
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a SalesRecord;
    type IntoIter = std::slice::Iter<'a, SalesRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
