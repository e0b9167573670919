// 💾 Record Store - One JSON state file + one HTML receipt per register per day
//
// Layout:
//   <data_dir>/records_caisse/2025-03-14_r1_state.json
//   <data_dir>/records_caisse/2025-03-14_r1_receipt.html
//   <data_dir>/records_boite/...
//
// Writes are whole-file and atomic (write .tmp, then rename). A write only
// happens when the record's content hash differs from what was last written,
// so re-deriving the same view on every edit does not touch the disk.

use crate::catalog::DenominationCatalog;
use crate::error::{Error, Result};
use crate::record::{DailyRecord, RecordKind};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const STATE_SUFFIX: &str = "_state.json";
const RECEIPT_SUFFIX: &str = "_receipt.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { hash: String },
    Unchanged { hash: String },
}

impl SaveOutcome {
    pub fn was_written(&self) -> bool {
        matches!(self, SaveOutcome::Written { .. })
    }

    pub fn hash(&self) -> &str {
        match self {
            SaveOutcome::Written { hash } | SaveOutcome::Unchanged { hash } => hash,
        }
    }
}

/// One entry of the history index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedEntry {
    pub kind: RecordKind,
    pub date: NaiveDate,
    pub register: u8,
    pub state_path: PathBuf,
    pub receipt_path: PathBuf,
}

type RecordKey = (RecordKind, NaiveDate, u8);

pub struct RecordStore {
    base_dir: PathBuf,
    last_hashes: HashMap<RecordKey, String>,
}

impl RecordStore {
    /// Open (and create) the record folders under `base_dir`
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        for kind in [RecordKind::Till, RecordKind::ChangeBox] {
            let dir = base_dir.join(kind.dir_name());
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }

        Ok(RecordStore {
            base_dir,
            last_hashes: HashMap::new(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_stem(date: NaiveDate, register: u8) -> String {
        format!("{}_r{}", date, register)
    }

    pub fn state_path(&self, kind: RecordKind, date: NaiveDate, register: u8) -> PathBuf {
        self.base_dir
            .join(kind.dir_name())
            .join(format!("{}{}", Self::file_stem(date, register), STATE_SUFFIX))
    }

    pub fn receipt_path(&self, kind: RecordKind, date: NaiveDate, register: u8) -> PathBuf {
        self.base_dir
            .join(kind.dir_name())
            .join(format!("{}{}", Self::file_stem(date, register), RECEIPT_SUFFIX))
    }

    // ========================================================================
    // LOAD
    // ========================================================================

    /// Load a day's record, re-keyed against the catalog.
    ///
    /// Missing denominations load as zero; ids the catalog does not know are
    /// dropped with a warning.
    pub fn load<R: DailyRecord>(
        &self,
        date: NaiveDate,
        register: u8,
        catalog: &DenominationCatalog,
    ) -> Result<Option<R>> {
        let path = self.state_path(R::KIND, date, register);
        let mut record: R = match read_json(&path)? {
            Some(record) => record,
            None => return Ok(None),
        };

        let dropped = record.normalize(catalog);
        if !dropped.is_empty() {
            warn!(
                path = %path.display(),
                dropped = ?dropped,
                "record contains denominations unknown to the catalog"
            );
        }

        Ok(Some(record))
    }

    pub fn load_receipt(&self, kind: RecordKind, date: NaiveDate, register: u8) -> Result<Option<String>> {
        let path = self.receipt_path(kind, date, register);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| Error::io(&path, e))
    }

    // ========================================================================
    // SAVE
    // ========================================================================

    /// Persist `record` and its receipt unless the content is unchanged.
    ///
    /// An existing file for the same day keeps its record id.
    pub fn save_if_changed<R: DailyRecord>(&mut self, record: &mut R, receipt_html: &str) -> Result<SaveOutcome> {
        let meta = record.meta();
        let key = (R::KIND, meta.date, meta.register);
        let hash = record.content_hash()?;

        if self.last_hashes.get(&key) == Some(&hash) {
            debug!(date = %key.1, register = key.2, "record unchanged, skipping write");
            return Ok(SaveOutcome::Unchanged { hash });
        }

        let state_path = self.state_path(key.0, key.1, key.2);
        if let Some(existing) = read_json::<R>(&state_path)? {
            if existing.content_hash()? == hash {
                debug!(path = %state_path.display(), "on-disk record already current");
                self.last_hashes.insert(key, hash.clone());
                return Ok(SaveOutcome::Unchanged { hash });
            }
            if existing.id() != record.id() {
                record.set_id(existing.id().to_string());
            }
        }

        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&state_path, json.as_bytes())?;
        write_atomic(&self.receipt_path(key.0, key.1, key.2), receipt_html.as_bytes())?;

        info!(
            kind = ?key.0,
            date = %key.1,
            register = key.2,
            hash = %hash,
            "record saved"
        );
        self.last_hashes.insert(key, hash.clone());
        Ok(SaveOutcome::Written { hash })
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Saved days for one kind, newest first
    pub fn list_saved(&self, kind: RecordKind) -> Result<Vec<SavedEntry>> {
        let dir = self.base_dir.join(kind.dir_name());
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(STATE_SUFFIX) {
                continue;
            }
            match parse_state_name(&name) {
                Ok((date, register)) => entries.push(SavedEntry {
                    kind,
                    date,
                    register,
                    state_path: self.state_path(kind, date, register),
                    receipt_path: self.receipt_path(kind, date, register),
                }),
                Err(e) => warn!(file = %name, error = %e, "ignoring unrecognized record file"),
            }
        }

        entries.sort_by(|a, b| b.date.cmp(&a.date).then(a.register.cmp(&b.register)));
        Ok(entries)
    }
}

/// "2025-03-14_r2_state.json" → (2025-03-14, 2)
pub fn parse_state_name(name: &str) -> Result<(NaiveDate, u8)> {
    let invalid = || Error::InvalidRecordName(name.to_string());

    let stem = name.strip_suffix(STATE_SUFFIX).ok_or_else(invalid)?;
    let (date_part, register_part) = stem.split_once("_r").ok_or_else(invalid)?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| invalid())?;
    let register = register_part.parse::<u8>().map_err(|_| invalid())?;

    Ok((date, register))
}

fn read_json<R: DailyRecord>(path: &Path) -> Result<Option<R>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Whole-file overwrite: write a sibling .tmp, then rename over the target
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).map_err(|e| Error::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::record::{OpeningMode, RecordMeta, TillDayRecord, TillRecord};

    fn record(date: NaiveDate, register: u8, close_100: i64) -> TillRecord {
        let meta = RecordMeta::new(RecordKind::Till, date, register, "Sam");
        let today = TillDayRecord {
            close: Ledger::from_counts([("bill_100", close_100)]),
            ..Default::default()
        };
        TillRecord::new(meta, 200, OpeningMode::Normal, today)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path()).unwrap();
        let catalog = DenominationCatalog::canadian();

        let mut rec = record(day(1), 1, 4);
        let outcome = store.save_if_changed(&mut rec, "<html></html>").unwrap();
        assert!(outcome.was_written());

        let loaded: TillRecord = store.load(day(1), 1, &catalog).unwrap().unwrap();
        assert_eq!(loaded.id, rec.id);
        assert_eq!(loaded.today.close.get(&"bill_100".into()), 4);
        assert_eq!(loaded.today.close.iter().count(), catalog.len());

        assert_eq!(
            store.load_receipt(RecordKind::Till, day(1), 1).unwrap().as_deref(),
            Some("<html></html>")
        );
        assert!(store.load::<TillRecord>(day(2), 1, &catalog).unwrap().is_none());
    }

    #[test]
    fn test_unchanged_content_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path()).unwrap();

        let mut rec = record(day(1), 1, 4);
        assert!(store.save_if_changed(&mut rec, "r").unwrap().was_written());

        // same content, new timestamp → no write
        let mut again = rec.clone();
        again.meta.generated_at = again.meta.generated_at + chrono::Duration::minutes(5);
        assert!(!store.save_if_changed(&mut again, "r").unwrap().was_written());

        // a fresh store still sees the on-disk file as current
        let mut fresh = RecordStore::open(dir.path()).unwrap();
        assert!(!fresh.save_if_changed(&mut again, "r").unwrap().was_written());

        let mut changed = record(day(1), 1, 5);
        assert!(store.save_if_changed(&mut changed, "r").unwrap().was_written());
        // identity kept across overwrites of the same day
        assert_eq!(changed.id, rec.id);
    }

    #[test]
    fn test_list_saved_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path()).unwrap();

        for (d, reg) in [(3, 1), (1, 1), (3, 2), (2, 1)] {
            store.save_if_changed(&mut record(day(d), reg, 1), "r").unwrap();
        }
        fs::write(dir.path().join("records_caisse").join("notes_state.json"), "{}").unwrap();

        let entries = store.list_saved(RecordKind::Till).unwrap();
        let keys: Vec<(u32, u8)> = entries
            .iter()
            .map(|e| (chrono::Datelike::day(&e.date), e.register))
            .collect();

        assert_eq!(keys, vec![(3, 1), (3, 2), (2, 1), (1, 1)]);
        assert!(store.list_saved(RecordKind::ChangeBox).unwrap().is_empty());
    }

    #[test]
    fn test_parse_state_name() {
        assert_eq!(
            parse_state_name("2025-03-14_r2_state.json").unwrap(),
            (NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(), 2)
        );
        assert!(parse_state_name("2025-03-14_state.json").is_err());
        assert!(parse_state_name("garbage_rx_state.json").is_err());
        assert!(parse_state_name("2025-03-14_r1_receipt.html").is_err());
    }
}
