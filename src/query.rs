// 💬 Query Resolver - keyword answers over the sales data
//
// Entities are found by plain case-insensitive substring matching against the
// distinct representative, region and category names in the record set.
// No tokenization or fuzzy matching: the same question always yields the
// same entities.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QueryConfig;
use crate::format::format_currency;
use crate::metrics::{group_totals, order_count, top_n, total_sales, GroupTotal};
use crate::record_set::{normalize_name, GroupField, RecordSet};

// ============================================================================
// ENTITY CATALOG & EXTRACTION
// ============================================================================

/// Lowercased distinct entity names of a record set, first-seen order.
/// Empty names are left out since they would match every query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCatalog {
    pub representatives: Vec<String>,
    pub regions: Vec<String>,
    pub categories: Vec<String>,
}

impl EntityCatalog {
    pub fn from_records(records: &RecordSet) -> Self {
        EntityCatalog {
            representatives: lowered_distinct(records, GroupField::Representative),
            regions: lowered_distinct(records, GroupField::Region),
            categories: lowered_distinct(records, GroupField::Category),
        }
    }
}

fn lowered_distinct(records: &RecordSet, field: GroupField) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in records.distinct(field) {
        let key = normalize_name(&value);
        if !key.is_empty() && !values.contains(&key) {
            values.push(key);
        }
    }
    values
}

/// The name behind a catalog key as spelled in the data, first occurrence wins.
pub fn spelled_name(records: &RecordSet, field: GroupField, key: &str) -> Option<String> {
    records
        .iter()
        .map(|r| field.value(r))
        .find(|value| normalize_name(value) == key)
        .map(|value| value.trim().to_string())
}

/// Entities found in a query, lowercased.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchedEntities {
    pub representatives: Vec<String>,
    pub regions: Vec<String>,
    pub categories: Vec<String>,
}

impl MatchedEntities {
    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty() && self.regions.is_empty() && self.categories.is_empty()
    }

    /// Exactly one representative and nothing else.
    pub fn is_single_representative(&self) -> bool {
        self.representatives.len() == 1 && self.regions.is_empty() && self.categories.is_empty()
    }
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Every catalog entry that occurs as a substring of `normalized`.
pub fn extract_entities(normalized: &str, catalog: &EntityCatalog) -> MatchedEntities {
    let found = |names: &[String]| -> Vec<String> {
        names
            .iter()
            .filter(|name| normalized.contains(name.as_str()))
            .cloned()
            .collect()
    };

    MatchedEntities {
        representatives: found(&catalog.representatives),
        regions: found(&catalog.regions),
        categories: found(&catalog.categories),
    }
}

/// Narrow `records` by every entity class that has at least one hit.
pub fn filter_by_entities(records: &RecordSet, matched: &MatchedEntities) -> RecordSet {
    let mut filtered = records.clone();

    if !matched.representatives.is_empty() {
        filtered =
            filtered.with_values_ignore_case(GroupField::Representative, &matched.representatives);
    }
    if !matched.regions.is_empty() {
        filtered = filtered.with_values_ignore_case(GroupField::Region, &matched.regions);
    }
    if !matched.categories.is_empty() {
        filtered = filtered.with_values_ignore_case(GroupField::Category, &matched.categories);
    }

    filtered
}

// ============================================================================
// REPRESENTATIVE REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeReport {
    /// Name as spelled in the data
    pub name: String,
    pub total_sales: f64,
    pub order_count: usize,
    /// All regions, descending by total
    pub regions: Vec<GroupTotal>,
    /// Top 3 products
    pub top_products: Vec<GroupTotal>,
    pub top_region: String,
    pub top_category: String,
}

/// Build the per-representative report, matching `name` case-insensitively.
/// `None` when the representative has no records.
pub fn representative_report(records: &RecordSet, name: &str) -> Option<RepresentativeReport> {
    let rep_records =
        records.with_values_ignore_case(GroupField::Representative, &[normalize_name(name)]);

    let first = rep_records.iter().next()?;
    let regions = group_totals(&rep_records, GroupField::Region);
    let categories = group_totals(&rep_records, GroupField::Category);

    Some(RepresentativeReport {
        name: first.representative.trim().to_string(),
        total_sales: total_sales(&rep_records),
        order_count: order_count(&rep_records),
        top_region: regions.first()?.label.clone(),
        top_category: categories.first()?.label.clone(),
        top_products: top_n(&rep_records, GroupField::Product, 3),
        regions,
    })
}

impl RepresentativeReport {
    pub fn render(&self, currency: &str) -> String {
        let mut out = format!(
            "Sales report for representative **{}**:\n### **Total sales: {}**\n",
            self.name,
            format_currency(currency, self.total_sales)
        );

        out.push_str("\n#### **Sales by region:**\n");
        for region in &self.regions {
            out.push_str(&format!(
                "- **{}:** {}\n",
                region.label,
                format_currency(currency, region.total)
            ));
        }

        out.push_str("\n#### **Top 3 products:**\n");
        for (i, product) in self.top_products.iter().enumerate() {
            out.push_str(&format!(
                "**{}. {}:** {}\n",
                i + 1,
                product.label,
                format_currency(currency, product.total)
            ));
        }

        out.push_str(&format!(
            "\n#### **Summary:**\n**{}** does most business in the **{}** region \
             and sells **{}** products best.",
            self.name, self.top_region, self.top_category
        ));

        out
    }
}

// ============================================================================
// ANSWERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    SmallTalk { reply: String },
    NoKeyword,
    RepresentativeReport { report: RepresentativeReport },
    RepresentativeNotFound { name: String },
    NoMatch,
    OrderCount { count: usize },
    TotalSales { total: f64 },
}

impl Answer {
    pub fn render(&self, currency: &str) -> String {
        match self {
            Answer::SmallTalk { reply } => reply.clone(),
            Answer::NoKeyword => "Sorry, your question doesn't mention anything I recognize \
                 (a representative, region or product category). Please try asking another way (T_T)"
                .to_string(),
            Answer::RepresentativeReport { report } => report.render(currency),
            Answer::RepresentativeNotFound { name } => {
                format!("No records found for representative **{}**. (T_T)", name)
            }
            Answer::NoMatch => "I understood the question, but no records match all of its \
                 conditions (T_T)"
                .to_string(),
            Answer::OrderCount { count } => format!("Found **{}** matching orders.", count),
            Answer::TotalSales { total } => format!(
                "Total sales for the matching records: **{}**",
                format_currency(currency, *total)
            ),
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct QueryResolver {
    config: QueryConfig,
}

impl QueryResolver {
    pub fn new(config: QueryConfig) -> Self {
        QueryResolver { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Resolve a free-text question against the full record set.
    pub fn resolve(&self, query: &str, records: &RecordSet) -> Answer {
        let normalized = normalize_query(query);

        if let Some(rule) = self.config.small_talk.iter().find(|r| r.matches(&normalized)) {
            return Answer::SmallTalk {
                reply: rule.reply.clone(),
            };
        }

        let catalog = EntityCatalog::from_records(records);
        let matched = extract_entities(&normalized, &catalog);
        debug!(?matched, "entities extracted from query");

        if matched.is_empty() {
            return Answer::NoKeyword;
        }

        if matched.is_single_representative() {
            let key = &matched.representatives[0];
            return match representative_report(records, key) {
                Some(report) => Answer::RepresentativeReport { report },
                None => Answer::RepresentativeNotFound {
                    name: spelled_name(records, GroupField::Representative, key)
                        .unwrap_or_else(|| key.clone()),
                },
            };
        }

        let filtered = filter_by_entities(records, &matched);
        if filtered.is_empty() {
            return Answer::NoMatch;
        }

        if self.wants_order_count(&normalized) {
            Answer::OrderCount {
                count: order_count(&filtered),
            }
        } else {
            Answer::TotalSales {
                total: total_sales(&filtered),
            }
        }
    }

    /// Resolve and render to the markdown response text.
    pub fn answer(&self, query: &str, records: &RecordSet) -> String {
        self.resolve(query, records).render(&self.config.currency_symbol)
    }

    fn wants_order_count(&self, normalized: &str) -> bool {
        self.config
            .order_count_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .any(|p| !p.is_empty() && normalized.contains(&p))
    }
}

impl Default for QueryResolver {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GREETING_REPLY;
    use crate::db::SalesRecord;
    use chrono::NaiveDate;

    fn create_test_record(
        rep: &str,
        region: &str,
        category: &str,
        product: &str,
        amount: f64,
    ) -> SalesRecord {
        SalesRecord::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            rep,
            region,
            category,
            product,
            amount,
        )
    }

    fn sample() -> RecordSet {
        RecordSet::new(vec![
            create_test_record("Alice", "East", "Tools", "Hammer", 100.0),
            create_test_record("Alice", "West", "Paint", "Brush", 300.0),
            create_test_record("Alice", "East", "Tools", "Drill", 150.0),
            create_test_record("Alice", "East", "Tools", "Saw", 20.0),
            create_test_record("Bob", "West", "Tools", "Hammer", 40.0),
            create_test_record("Bob", "North", "Paint", "Roller", 60.0),
            create_test_record("张三", "华东", "软件", "Office", 1200.0),
        ])
    }

    #[test]
    fn test_greeting_skips_data() {
        let resolver = QueryResolver::default();

        assert_eq!(resolver.answer("你好", &sample()), GREETING_REPLY);
        assert_eq!(resolver.answer("  HELLO ", &RecordSet::empty()), GREETING_REPLY);
        // A greeting that happens to contain an entity name is still small talk
        let named_hello =
            RecordSet::new(vec![create_test_record("hello", "East", "Tools", "X", 1.0)]);
        assert_eq!(
            resolver.resolve("hello", &named_hello),
            Answer::SmallTalk {
                reply: GREETING_REPLY.to_string()
            }
        );
    }

    #[test]
    fn test_contains_small_talk() {
        let resolver = QueryResolver::default();
        let answer = resolver.resolve("emm 不是哥们", &sample());
        assert!(matches!(answer, Answer::SmallTalk { .. }));
    }

    #[test]
    fn test_no_keyword() {
        let resolver = QueryResolver::default();
        assert_eq!(resolver.resolve("what is the weather", &sample()), Answer::NoKeyword);
        assert_eq!(resolver.resolve("alice", &RecordSet::empty()), Answer::NoKeyword);
    }

    #[test]
    fn test_extract_entities_substring_and_case() {
        let catalog = EntityCatalog::from_records(&sample());
        let matched = extract_entities(&normalize_query("How did ALICE do in the east?"), &catalog);

        assert_eq!(matched.representatives, vec!["alice"]);
        assert_eq!(matched.regions, vec!["east"]);
        assert!(matched.categories.is_empty());
    }

    #[test]
    fn test_extract_entities_chinese() {
        let catalog = EntityCatalog::from_records(&sample());
        let matched = extract_entities(&normalize_query("张三在华东的总业绩是多少？"), &catalog);

        assert_eq!(matched.representatives, vec!["张三"]);
        assert_eq!(matched.regions, vec!["华东"]);
    }

    #[test]
    fn test_catalog_skips_empty_names() {
        let rs = RecordSet::new(vec![create_test_record("", "East", "Tools", "X", 1.0)]);
        let catalog = EntityCatalog::from_records(&rs);
        assert!(catalog.representatives.is_empty());
        assert_eq!(catalog.regions, vec!["east"]);
    }

    #[test]
    fn test_single_representative_report() {
        let rs = RecordSet::new(vec![create_test_record("Dana", "East", "Tools", "Hammer", 500.0)]);
        let resolver = QueryResolver::default();

        match resolver.resolve("How is dana doing?", &rs) {
            Answer::RepresentativeReport { report } => {
                assert_eq!(report.name, "Dana");
                assert_eq!(report.total_sales, 500.0);
                assert_eq!(report.top_region, "East");
                assert_eq!(report.top_category, "Tools");
            }
            other => panic!("expected report, got {:?}", other),
        }
    }

    #[test]
    fn test_padded_stored_names_still_resolve() {
        let rs = RecordSet::new(vec![create_test_record("Alice ", "East", "Tools", "Hammer", 500.0)]);
        let resolver = QueryResolver::default();

        match resolver.resolve("alice", &rs) {
            Answer::RepresentativeReport { report } => {
                assert_eq!(report.name, "Alice");
                assert_eq!(report.total_sales, 500.0);
                assert_eq!(report.top_region, "East");
            }
            other => panic!("expected report, got {:?}", other),
        }
        assert_eq!(
            resolver.resolve("alice east", &rs),
            Answer::TotalSales { total: 500.0 }
        );
    }

    #[test]
    fn test_spelled_name_keeps_data_spelling() {
        let rs = RecordSet::new(vec![
            create_test_record(" McKenzie", "East", "Tools", "Hammer", 1.0),
            create_test_record("mckenzie", "West", "Tools", "Saw", 1.0),
        ]);

        assert_eq!(
            spelled_name(&rs, GroupField::Representative, "mckenzie"),
            Some("McKenzie".to_string())
        );
        assert_eq!(spelled_name(&rs, GroupField::Representative, "zoe"), None);
    }

    #[test]
    fn test_report_breakdowns() {
        let report = representative_report(&sample(), "alice").unwrap();

        assert_eq!(report.total_sales, 570.0);
        assert_eq!(report.order_count, 4);
        assert_eq!(report.regions[0].label, "West");
        assert_eq!(report.regions[0].total, 300.0);
        assert_eq!(report.regions[1].label, "East");
        assert_eq!(report.regions[1].total, 270.0);
        assert_eq!(report.top_region, "West");
        assert_eq!(report.top_category, "Paint");

        let products: Vec<_> = report.top_products.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(products, vec!["Brush", "Drill", "Hammer"]);

        let text = report.render("¥");
        assert!(text.contains("**Total sales: ¥ 570.00**"));
        assert!(text.contains("- **West:** ¥ 300.00"));
        assert!(text.contains("**1. Brush:** ¥ 300.00"));
    }

    #[test]
    fn test_report_missing_representative() {
        assert_eq!(representative_report(&sample(), "zoe"), None);
        assert_eq!(
            Answer::RepresentativeNotFound { name: "zoe".to_string() }.render("¥"),
            "No records found for representative **zoe**. (T_T)"
        );
    }

    #[test]
    fn test_rep_and_region_with_no_overlap() {
        let resolver = QueryResolver::default();
        // Bob never sold in the East
        assert_eq!(resolver.resolve("bob east", &sample()), Answer::NoMatch);
    }

    #[test]
    fn test_general_case_total() {
        let resolver = QueryResolver::default();
        assert_eq!(
            resolver.resolve("alice tools", &sample()),
            Answer::TotalSales { total: 270.0 }
        );
        assert_eq!(
            resolver.answer("alice tools", &sample()),
            "Total sales for the matching records: **¥ 270.00**"
        );
    }

    #[test]
    fn test_general_case_order_count() {
        let resolver = QueryResolver::default();
        assert_eq!(
            resolver.resolve("How many orders for paint?", &sample()),
            Answer::OrderCount { count: 2 }
        );
        assert_eq!(
            resolver.resolve("软件有多少笔订单？", &sample()),
            Answer::OrderCount { count: 1 }
        );
    }

    #[test]
    fn test_multiple_representatives_use_general_case() {
        let resolver = QueryResolver::default();
        assert_eq!(
            resolver.resolve("alice and bob", &sample()),
            Answer::TotalSales { total: 670.0 }
        );
    }

    #[test]
    fn test_multiple_values_in_one_class_are_unioned() {
        let resolver = QueryResolver::default();
        // West (300 + 40) + North (60)
        assert_eq!(
            resolver.resolve("west or north", &sample()),
            Answer::TotalSales { total: 400.0 }
        );
    }

    #[test]
    fn test_order_phrases_are_configurable() {
        let mut config = QueryConfig::default();
        config.order_count_phrases = vec!["transactions".to_string()];
        let resolver = QueryResolver::new(config);

        assert_eq!(
            resolver.resolve("paint transactions", &sample()),
            Answer::OrderCount { count: 2 }
        );
        assert_eq!(
            resolver.resolve("paint orders", &sample()),
            Answer::TotalSales { total: 360.0 }
        );
    }

    #[test]
    fn test_resolve_does_not_mutate_records() {
        let rs = sample();
        let before = rs.clone();
        let resolver = QueryResolver::default();

        let _ = resolver.resolve("alice east", &rs);
        let _ = resolver.resolve("bob", &rs);

        assert_eq!(rs, before);
    }

    #[test]
    fn test_answer_json_is_tagged() {
        let json = serde_json::to_value(Answer::OrderCount { count: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "order_count", "count": 2 }));

        let json = serde_json::to_value(Answer::NoMatch).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "no_match" }));
    }
}
