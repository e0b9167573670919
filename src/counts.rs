// 🔢 Count Sheets - Cashier input into ledgers
//
// CSV with a header row:
//   denomination,count
//   Billet 100 $,5
//   bill_20,1
//
// Denominations resolve by id or label. Raw edits follow "parse or keep
// previous": a blank or unparseable cell never resets a count to zero.

use crate::catalog::{DenominationCatalog, DenominationId};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct CountRow {
    pub denomination: String,

    /// Raw cell text; may be blank
    #[serde(default)]
    pub count: String,
}

/// Largest count accepted for a single denomination
pub const MAX_COUNT: i64 = 1_000_000;

/// Parse a typed count. `None` for blank, non-numeric, negative or
/// oversized (> [`MAX_COUNT`]) input.
pub fn parse_count(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // grids sometimes hand back "3.0"
    let value = match trimmed.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f = trimmed.parse::<f64>().ok()?;
            if !f.is_finite() || f.fract() != 0.0 || f.abs() > MAX_COUNT as f64 {
                return None;
            }
            f as i64
        }
    };
    (0..=MAX_COUNT).contains(&value).then_some(value)
}

/// Apply raw edits on top of `previous`, keeping the previous count for any
/// cell that does not parse.
pub fn apply_edits(
    previous: &Ledger,
    rows: &[CountRow],
    catalog: &DenominationCatalog,
) -> Result<Ledger> {
    let mut ledger = previous.normalized(catalog).0;
    for row in rows {
        let id = catalog.resolve(&row.denomination)?;
        if let Some(count) = parse_count(&row.count) {
            ledger.set(id, count);
        }
    }
    Ok(ledger)
}

/// Read a count sheet from any reader
pub fn read_count_sheet<R: Read>(reader: R, catalog: &DenominationCatalog) -> Result<Ledger> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: CountRow = result?;
        if parse_count(&row.count).is_none() && !row.count.trim().is_empty() {
            return Err(Error::InvalidCount {
                denomination: row.denomination,
                value: row.count,
            });
        }
        rows.push(row);
    }

    apply_edits(&Ledger::zero(catalog), &rows, catalog)
}

/// Load a count sheet file
pub fn load_count_sheet<P: AsRef<Path>>(path: P, catalog: &DenominationCatalog) -> Result<Ledger> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    read_count_sheet(file, catalog)
}

/// "bill_20=3" or "Billet 20 $=3" → (bill_20, 3)
pub fn parse_pin_spec(spec: &str, catalog: &DenominationCatalog) -> Result<(DenominationId, i64)> {
    let (key, value) = spec
        .rsplit_once('=')
        .ok_or_else(|| Error::InvalidPinSpec(spec.to_string()))?;
    let id = catalog.resolve(key)?;
    let count = parse_count(value).ok_or_else(|| Error::InvalidPinSpec(spec.to_string()))?;
    Ok((id, count))
}

// ============================================================================
// TESTS
// ============================================================================
