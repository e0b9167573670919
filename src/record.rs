// 🧾 Reconciliation Records - One persisted unit per register per day
//
// Identity vs. content:
//   id           = UUID, stable across overwrites of the same day
//   content_hash = SHA-256 of the canonical JSON minus volatile fields,
//                  used to skip writes when nothing changed

use crate::catalog::{DenominationCatalog, DenominationId};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::pins::PinSet;
use chrono::{DateTime, Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// RECORD KIND & METADATA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Till reconciliation (caisse)
    Till,

    /// Change-box exchange (boîte)
    ChangeBox,
}

impl RecordKind {
    /// Folder under the data directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            RecordKind::Till => "records_caisse",
            RecordKind::ChangeBox => "records_boite",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Till => "CAISSE",
            RecordKind::ChangeBox => "BOÎTE (ÉCHANGE)",
        }
    }
}

/// How the day was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningMode {
    /// OPEN counted in the morning
    #[default]
    Normal,

    /// Yesterday's closing was never done: count it now, OPEN = its RESTANT
    MissedClose,
}

impl OpeningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpeningMode::Normal => "Ouverture normale",
            OpeningMode::MissedClose => "Ouverture non effectuée",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub kind: RecordKind,
    pub date: NaiveDate,
    pub register: u8,

    /// "—" when the cashier left the name blank
    pub cashier: String,

    /// Volatile: excluded from the content hash
    pub generated_at: DateTime<Local>,
}

impl RecordMeta {
    pub fn new(kind: RecordKind, date: NaiveDate, register: u8, cashier: &str) -> Self {
        let cashier = cashier.trim();
        RecordMeta {
            kind,
            date,
            register,
            cashier: if cashier.is_empty() {
                "—".to_string()
            } else {
                cashier.to_string()
            },
            generated_at: Local::now(),
        }
    }

    /// Cashier name as typed ("" for the blank placeholder)
    pub fn cashier_name(&self) -> &str {
        if self.cashier == "—" {
            ""
        } else {
            &self.cashier
        }
    }
}

pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// DAILY RECORD TRAIT
// ============================================================================

/// Anything the store persists as one file per (kind, date, register)
pub trait DailyRecord: Serialize + DeserializeOwned {
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn meta(&self) -> &RecordMeta;

    /// Re-key every ledger against the catalog; returns dropped unknown ids
    fn normalize(&mut self, catalog: &DenominationCatalog) -> Vec<DenominationId>;

    /// SHA-256 over sorted-key JSON without `id` and `meta.generated_at`
    fn content_hash(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("id");
            if let Some(meta) = obj.get_mut("meta").and_then(|m| m.as_object_mut()) {
                meta.remove("generated_at");
            }
        }

        let raw = serde_json::to_string(&value)?;
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

fn normalize_into(ledger: &mut Ledger, catalog: &DenominationCatalog, dropped: &mut Vec<DenominationId>) {
    let (normalized, unknown) = ledger.normalized(catalog);
    *ledger = normalized;
    for id in unknown {
        if !dropped.contains(&id) {
            dropped.push(id);
        }
    }
}

fn normalize_pins(pins: &mut PinSet, catalog: &DenominationCatalog, dropped: &mut Vec<DenominationId>) {
    let (known, unknown): (Vec<_>, Vec<_>) = pins
        .iter()
        .map(|(id, count)| (id.clone(), count))
        .partition(|(id, _)| catalog.contains(id));
    *pins = PinSet::from_pins(known);
    for (id, _) in unknown {
        if !dropped.contains(&id) {
            dropped.push(id);
        }
    }
}

// ============================================================================
// TILL RECORD
// ============================================================================

/// OPEN / CLOSE / RETRAIT / RESTANT of one sheet
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TillDayRecord {
    #[serde(default)]
    pub open: Ledger,

    #[serde(default)]
    pub close: Ledger,

    #[serde(default)]
    pub withdrawal: Ledger,

    #[serde(default)]
    pub restant: Ledger,

    #[serde(default)]
    pub pins: PinSet,

    #[serde(default)]
    pub remainder_cents: i64,
}

impl TillDayRecord {
    fn normalize(&mut self, catalog: &DenominationCatalog, dropped: &mut Vec<DenominationId>) {
        normalize_into(&mut self.open, catalog, dropped);
        normalize_into(&mut self.close, catalog, dropped);
        normalize_into(&mut self.withdrawal, catalog, dropped);
        normalize_into(&mut self.restant, catalog, dropped);
        normalize_pins(&mut self.pins, catalog, dropped);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TillRecord {
    #[serde(default = "new_record_id")]
    pub id: String,

    pub meta: RecordMeta,

    /// Float to leave in the till, whole dollars
    pub target_dollars: i64,

    #[serde(default)]
    pub mode: OpeningMode,

    pub today: TillDayRecord,

    /// Only for [`OpeningMode::MissedClose`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yesterday: Option<TillDayRecord>,
}

impl TillRecord {
    pub fn new(meta: RecordMeta, target_dollars: i64, mode: OpeningMode, today: TillDayRecord) -> Self {
        TillRecord {
            id: new_record_id(),
            meta,
            target_dollars,
            mode,
            today,
            yesterday: None,
        }
    }
}

impl DailyRecord for TillRecord {
    const KIND: RecordKind = RecordKind::Till;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn normalize(&mut self, catalog: &DenominationCatalog) -> Vec<DenominationId> {
        let mut dropped = Vec::new();
        self.today.normalize(catalog, &mut dropped);
        if let Some(yesterday) = self.yesterday.as_mut() {
            yesterday.normalize(catalog, &mut dropped);
        }
        dropped
    }
}

// ============================================================================
// CHANGE-BOX RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBoxRecord {
    #[serde(default = "new_record_id")]
    pub id: String,

    pub meta: RecordMeta,

    /// Box content before the deposit
    #[serde(default)]
    pub before: Ledger,

    #[serde(default)]
    pub deposit: Ledger,

    /// Change handed out for the deposit
    #[serde(default)]
    pub withdrawn: Ledger,

    /// before + deposit − withdrawn
    #[serde(default)]
    pub after: Ledger,

    #[serde(default)]
    pub pins: PinSet,

    /// Sorted list of denominations allowed as change
    #[serde(default)]
    pub allowed: Vec<DenominationId>,

    #[serde(default)]
    pub remainder_cents: i64,
}

impl DailyRecord for ChangeBoxRecord {
    const KIND: RecordKind = RecordKind::ChangeBox;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn normalize(&mut self, catalog: &DenominationCatalog) -> Vec<DenominationId> {
        let mut dropped = Vec::new();
        normalize_into(&mut self.before, catalog, &mut dropped);
        normalize_into(&mut self.deposit, catalog, &mut dropped);
        normalize_into(&mut self.withdrawn, catalog, &mut dropped);
        normalize_into(&mut self.after, catalog, &mut dropped);
        normalize_pins(&mut self.pins, catalog, &mut dropped);

        let before = self.allowed.len();
        self.allowed.retain(|id| catalog.contains(id));
        if self.allowed.len() != before {
            tracing::debug!(
                removed = before - self.allowed.len(),
                "dropped unknown ids from change-box allowed list"
            );
        }
        dropped
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> TillRecord {
        let meta = RecordMeta::new(
            RecordKind::Till,
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            2,
            "  Julie ",
        );
        let today = TillDayRecord {
            close: Ledger::from_counts([("bill_100", 5), ("bill_20", 1)]),
            ..Default::default()
        };
        TillRecord::new(meta, 200, OpeningMode::Normal, today)
    }

    #[test]
    fn test_blank_cashier_placeholder() {
        let meta = RecordMeta::new(RecordKind::Till, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), 1, "   ");
        assert_eq!(meta.cashier, "—");
        assert_eq!(meta.cashier_name(), "");

        assert_eq!(sample_record().meta.cashier, "Julie");
    }

    #[test]
    fn test_content_hash_ignores_id_and_timestamp() {
        let a = sample_record();
        let mut b = a.clone();
        b.id = "another-id".to_string();
        b.meta.generated_at = b.meta.generated_at + chrono::Duration::hours(3);

        let hash_a = a.content_hash().unwrap();
        assert_eq!(hash_a.len(), 64);
        assert_eq!(hash_a, b.content_hash().unwrap());
    }

    #[test]
    fn test_content_hash_changes_with_counts() {
        let a = sample_record();
        let mut b = a.clone();
        b.today.close.set("bill_20".into(), 2);

        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());

        let mut c = a.clone();
        c.today.pins = PinSet::from_pins([("bill_20", 0)]);
        assert_ne!(a.content_hash().unwrap(), c.content_hash().unwrap());
    }

    #[test]
    fn test_old_schema_degrades_gracefully() {
        // no id, no mode, no pins, missing denominations, one retired id
        let json = r#"{
            "meta": {
                "kind": "till",
                "date": "2024-12-31",
                "register": 1,
                "cashier": "Marc",
                "generated_at": "2024-12-31T18:02:11-05:00"
            },
            "target_dollars": 200,
            "today": {
                "close": { "bill_100": 3, "bill_2": 1 }
            }
        }"#;

        let mut record: TillRecord = serde_json::from_str(json).unwrap();
        assert!(!record.id.is_empty());
        assert_eq!(record.mode, OpeningMode::Normal);
        assert!(record.yesterday.is_none());

        let catalog = DenominationCatalog::canadian();
        let dropped = record.normalize(&catalog);

        assert_eq!(dropped, vec![DenominationId::new("bill_2")]);
        assert_eq!(record.today.close.iter().count(), catalog.len());
        assert_eq!(record.today.close.get(&"bill_100".into()), 3);
        assert_eq!(record.today.open.total(&catalog), 0);
    }

    #[test]
    fn test_change_box_normalize_filters_allowed() {
        let mut record = ChangeBoxRecord {
            id: "x".to_string(),
            meta: RecordMeta::new(RecordKind::ChangeBox, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), 1, ""),
            before: Ledger::new(),
            deposit: Ledger::from_counts([("bill_20", 2)]),
            withdrawn: Ledger::new(),
            after: Ledger::new(),
            pins: PinSet::from_pins([("coin_3", 1), ("coin_2", 4)]),
            allowed: vec!["coin_2".into(), "coin_3".into()],
            remainder_cents: 0,
        };

        let dropped = record.normalize(&DenominationCatalog::canadian());

        assert_eq!(dropped, vec![DenominationId::new("coin_3")]);
        assert_eq!(record.allowed, vec![DenominationId::new("coin_2")]);
        assert_eq!(record.pins.get(&"coin_2".into()), Some(4));
        assert!(!record.pins.contains(&"coin_3".into()));
    }
}
