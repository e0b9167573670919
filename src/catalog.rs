// 🪙 Denomination Catalog - Denominations as Data
// The set of physical cash units (bills, coins, coin rolls) and the priority
// orders the solver walks. Loaded from JSON so another currency only needs a
// different table, never different code.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Built-in Canadian table (bills, coins, rolls)
const CANADIAN_TABLE: &str = include_str!("../config/denominations_cad.json");

// ============================================================================
// DENOMINATION ID
// ============================================================================

/// Stable key of a denomination ("bill_100", "coin_025", "roll_2", ...)
///
/// Labels are for humans and can change; the id is what ledgers, pins and
/// persisted records are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DenominationId(String);

impl DenominationId {
    pub fn new(id: impl Into<String>) -> Self {
        DenominationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DenominationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DenominationId {
    fn from(id: &str) -> Self {
        DenominationId::new(id)
    }
}

// ============================================================================
// DENOMINATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominationGroup {
    /// $100, $50, $20
    LargeBill,

    /// $10, $5
    SmallBill,

    /// Loose coins
    Coin,

    /// Pre-rolled coins, counted as a single unit worth the whole roll
    Roll,
}

impl DenominationGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenominationGroup::LargeBill => "Large bill",
            DenominationGroup::SmallBill => "Small bill",
            DenominationGroup::Coin => "Coin",
            DenominationGroup::Roll => "Roll",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Denomination {
    pub id: DenominationId,

    /// Display label, e.g. "Rouleau 2 $ (25) — 50 $"
    pub label: String,

    /// Face value of ONE unit in cents (a roll of 25 × $2 is 5000)
    pub face_value: i64,

    pub group: DenominationGroup,
}

impl Denomination {
    /// Case-insensitive match on id or label
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.id.as_str().eq_ignore_ascii_case(key) || self.label.to_lowercase() == key.to_lowercase()
    }
}

// ============================================================================
// PRIORITY ORDER
// ============================================================================

/// Ordered list of denominations the greedy solver walks, first to last.
///
/// Denominations absent from the list are never chosen by the greedy pass
/// (pinned ones are still honored).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityOrder(Vec<DenominationId>);

impl PriorityOrder {
    pub fn new(ids: Vec<DenominationId>) -> Self {
        PriorityOrder(ids)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DenominationId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// CATALOG FILE (JSON shape)
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_currency")]
    currency: String,

    denominations: Vec<Denomination>,

    #[serde(default)]
    priorities: PrioritiesFile,

    #[serde(default)]
    change_box_allowed: Option<Vec<DenominationId>>,
}

#[derive(Debug, Default, Deserialize)]
struct PrioritiesFile {
    till: Option<Vec<DenominationId>>,
    change_box: Option<Vec<DenominationId>>,
}

fn default_currency() -> String {
    "CAD".to_string()
}

// ============================================================================
// DENOMINATION CATALOG
// ============================================================================

/// Fixed, ordered table of denominations.
///
/// Catalog order is the display order; it also seeds the derived priority
/// orders when the data file does not list them explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct DenominationCatalog {
    currency: String,
    denominations: Vec<Denomination>,
    till_priority: PriorityOrder,
    change_box_priority: PriorityOrder,
    change_box_allowed: BTreeSet<DenominationId>,
}

impl DenominationCatalog {
    /// The built-in Canadian table
    pub fn canadian() -> Self {
        Self::from_json(CANADIAN_TABLE).expect("embedded Canadian denomination table is valid")
    }

    /// Load a catalog from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&content)
    }

    /// Parse and validate a catalog from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Self::from_parts(
            file.currency,
            file.denominations,
            file.priorities.till,
            file.priorities.change_box,
            file.change_box_allowed,
        )
    }

    fn from_parts(
        currency: String,
        denominations: Vec<Denomination>,
        till: Option<Vec<DenominationId>>,
        change_box: Option<Vec<DenominationId>>,
        change_box_allowed: Option<Vec<DenominationId>>,
    ) -> Result<Self> {
        if denominations.is_empty() {
            return Err(Error::InvalidCatalog("no denominations".to_string()));
        }

        let mut seen = BTreeSet::new();
        for d in &denominations {
            if d.face_value <= 0 {
                return Err(Error::InvalidCatalog(format!(
                    "{} has non-positive face value {}",
                    d.id, d.face_value
                )));
            }
            if !seen.insert(d.id.clone()) {
                return Err(Error::InvalidCatalog(format!("duplicate id {}", d.id)));
            }
        }

        let mut catalog = DenominationCatalog {
            currency,
            denominations,
            till_priority: PriorityOrder::default(),
            change_box_priority: PriorityOrder::default(),
            change_box_allowed: BTreeSet::new(),
        };

        catalog.till_priority = match till {
            Some(ids) => catalog.checked_order("till", ids)?,
            None => catalog.derived_till_priority(),
        };
        catalog.change_box_priority = match change_box {
            Some(ids) => catalog.checked_order("change_box", ids)?,
            None => catalog.derived_change_box_priority(),
        };
        catalog.change_box_allowed = match change_box_allowed {
            Some(ids) => {
                for id in &ids {
                    catalog.require(id)?;
                }
                ids.into_iter().collect()
            }
            None => catalog
                .denominations
                .iter()
                .filter(|d| d.group != DenominationGroup::LargeBill)
                .map(|d| d.id.clone())
                .collect(),
        };

        Ok(catalog)
    }

    fn checked_order(&self, name: &str, ids: Vec<DenominationId>) -> Result<PriorityOrder> {
        let mut seen = BTreeSet::new();
        for id in &ids {
            self.require(id)?;
            if !seen.insert(id.clone()) {
                return Err(Error::InvalidCatalog(format!(
                    "priority '{}' lists {} twice",
                    name, id
                )));
            }
        }
        Ok(PriorityOrder::new(ids))
    }

    fn require(&self, id: &DenominationId) -> Result<&Denomination> {
        self.get(id)
            .ok_or_else(|| Error::UnknownDenomination(id.to_string()))
    }

    /// Group members sorted by face value, highest first (stable on ties)
    fn group_desc(&self, group: DenominationGroup) -> Vec<DenominationId> {
        let mut members: Vec<&Denomination> = self.by_group(group).collect();
        members.sort_by(|a, b| b.face_value.cmp(&a.face_value));
        members.into_iter().map(|d| d.id.clone()).collect()
    }

    /// Large bills → small bills → coins high-to-low → rolls high-to-low
    fn derived_till_priority(&self) -> PriorityOrder {
        let mut ids = self.group_desc(DenominationGroup::LargeBill);
        ids.extend(self.group_desc(DenominationGroup::SmallBill));
        ids.extend(self.group_desc(DenominationGroup::Coin));
        ids.extend(self.group_desc(DenominationGroup::Roll));
        PriorityOrder::new(ids)
    }

    /// Small bills → coins → rolls, largest bills last
    fn derived_change_box_priority(&self) -> PriorityOrder {
        let mut ids = self.group_desc(DenominationGroup::SmallBill);
        ids.extend(self.group_desc(DenominationGroup::Coin));
        ids.extend(self.group_desc(DenominationGroup::Roll));
        let mut large = self.group_desc(DenominationGroup::LargeBill);
        large.reverse();
        ids.extend(large);
        PriorityOrder::new(ids)
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Denominations in display order
    pub fn iter(&self) -> impl Iterator<Item = &Denomination> {
        self.denominations.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DenominationId> {
        self.denominations.iter().map(|d| &d.id)
    }

    pub fn len(&self) -> usize {
        self.denominations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.denominations.is_empty()
    }

    pub fn get(&self, id: &DenominationId) -> Option<&Denomination> {
        self.denominations.iter().find(|d| &d.id == id)
    }

    pub fn contains(&self, id: &DenominationId) -> bool {
        self.get(id).is_some()
    }

    pub fn face_value(&self, id: &DenominationId) -> Option<i64> {
        self.get(id).map(|d| d.face_value)
    }

    pub fn by_group(&self, group: DenominationGroup) -> impl Iterator<Item = &Denomination> {
        self.denominations.iter().filter(move |d| d.group == group)
    }

    /// Find a denomination by id or label (case-insensitive)
    pub fn find(&self, key: &str) -> Option<&Denomination> {
        self.denominations.iter().find(|d| d.matches(key))
    }

    /// Resolve user input (id or label) to an id
    pub fn resolve(&self, key: &str) -> Result<DenominationId> {
        self.find(key)
            .map(|d| d.id.clone())
            .ok_or_else(|| Error::UnknownDenomination(key.to_string()))
    }

    pub fn till_priority(&self) -> &PriorityOrder {
        &self.till_priority
    }

    pub fn change_box_priority(&self) -> &PriorityOrder {
        &self.change_box_priority
    }

    /// Denominations the change box may hand out unless the cashier changes it
    pub fn default_change_box_allowed(&self) -> &BTreeSet<DenominationId> {
        &self.change_box_allowed
    }

    /// Every denomination in the catalog
    pub fn all_allowed(&self) -> BTreeSet<DenominationId> {
        self.ids().cloned().collect()
    }
}

impl Default for DenominationCatalog {
    fn default() -> Self {
        Self::canadian()
    }
}

// ============================================================================
// MONEY FORMATTING
// ============================================================================

/// "12.34" from 1234 cents (sign kept)
pub fn format_dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// "12.34 $" from 1234 cents
pub fn format_cents(cents: i64) -> String {
    format!("{} $", format_dollars(cents))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canadian_catalog_loads() {
        let catalog = DenominationCatalog::from_json(CANADIAN_TABLE).unwrap();

        assert_eq!(catalog.len(), 15);
        assert_eq!(catalog.currency(), "CAD");
        assert_eq!(catalog.by_group(DenominationGroup::LargeBill).count(), 3);
        assert_eq!(catalog.by_group(DenominationGroup::SmallBill).count(), 2);
        assert_eq!(catalog.by_group(DenominationGroup::Coin).count(), 5);
        assert_eq!(catalog.by_group(DenominationGroup::Roll).count(), 5);
    }

    #[test]
    fn test_display_order_is_catalog_order() {
        let catalog = DenominationCatalog::canadian();
        let ids: Vec<&str> = catalog.ids().map(|id| id.as_str()).collect();

        assert_eq!(ids[0], "bill_100");
        assert_eq!(ids[4], "bill_5");
        assert_eq!(ids[9], "coin_005");
        assert_eq!(ids[14], "roll_005");
    }

    #[test]
    fn test_roll_is_single_unit_worth_whole_roll() {
        let catalog = DenominationCatalog::canadian();
        assert_eq!(catalog.face_value(&"roll_2".into()), Some(5000));
        assert_eq!(catalog.face_value(&"roll_005".into()), Some(200));
    }

    #[test]
    fn test_find_by_label_or_id() {
        let catalog = DenominationCatalog::canadian();

        assert_eq!(catalog.find("Billet 20 $").unwrap().id.as_str(), "bill_20");
        assert_eq!(catalog.find("billet 20 $").unwrap().id.as_str(), "bill_20");
        assert_eq!(catalog.find("COIN_2").unwrap().id.as_str(), "coin_2");
        assert!(catalog.find("Billet 1000 $").is_none());
        assert!(matches!(
            catalog.resolve("nope"),
            Err(Error::UnknownDenomination(_))
        ));
    }

    #[test]
    fn test_change_box_priority_keeps_large_bills_last() {
        let catalog = DenominationCatalog::canadian();
        let order: Vec<&str> = catalog.change_box_priority().iter().map(|id| id.as_str()).collect();

        assert_eq!(order.first(), Some(&"bill_20"));
        assert_eq!(&order[order.len() - 2..], &["bill_50", "bill_100"]);
        assert!(!catalog.default_change_box_allowed().contains(&"bill_100".into()));
        assert!(catalog.default_change_box_allowed().contains(&"bill_20".into()));
    }

    #[test]
    fn test_derived_priorities_without_explicit_lists() {
        let json = r#"{
            "denominations": [
                { "id": "c1", "label": "1c", "face_value": 1, "group": "coin" },
                { "id": "b5", "label": "5", "face_value": 500, "group": "small_bill" },
                { "id": "c10", "label": "10c", "face_value": 10, "group": "coin" },
                { "id": "b50", "label": "50", "face_value": 5000, "group": "large_bill" },
                { "id": "b100", "label": "100", "face_value": 10000, "group": "large_bill" }
            ]
        }"#;
        let catalog = DenominationCatalog::from_json(json).unwrap();

        let till: Vec<&str> = catalog.till_priority().iter().map(|id| id.as_str()).collect();
        assert_eq!(till, vec!["b100", "b50", "b5", "c10", "c1"]);

        let change: Vec<&str> = catalog.change_box_priority().iter().map(|id| id.as_str()).collect();
        assert_eq!(change, vec!["b5", "c10", "c1", "b50", "b100"]);
    }

    #[test]
    fn test_invalid_catalogs_rejected() {
        let duplicate = r#"{ "denominations": [
            { "id": "a", "label": "A", "face_value": 5, "group": "coin" },
            { "id": "a", "label": "B", "face_value": 10, "group": "coin" }
        ] }"#;
        assert!(matches!(
            DenominationCatalog::from_json(duplicate),
            Err(Error::InvalidCatalog(_))
        ));

        let zero_value = r#"{ "denominations": [
            { "id": "a", "label": "A", "face_value": 0, "group": "coin" }
        ] }"#;
        assert!(DenominationCatalog::from_json(zero_value).is_err());

        let unknown_in_priority = r#"{
            "denominations": [ { "id": "a", "label": "A", "face_value": 5, "group": "coin" } ],
            "priorities": { "till": ["a", "zz"] }
        }"#;
        assert!(matches!(
            DenominationCatalog::from_json(unknown_in_priority),
            Err(Error::UnknownDenomination(_))
        ));
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(33000), "330.00 $");
        assert_eq!(format_cents(5), "0.05 $");
        assert_eq!(format_cents(-1250), "-12.50 $");
        assert_eq!(format_dollars(0), "0.00");
    }
}
