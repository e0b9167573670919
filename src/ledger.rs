// 📒 Ledger - Count of physical units per denomination
//
// Total over the catalog: a denomination missing from the map counts as zero.
// All money is integer cents.
//
//   total(L) = Σ count(d) × face_value(d)

use crate::catalog::{DenominationCatalog, DenominationId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    counts: BTreeMap<DenominationId, i64>,
}

impl Ledger {
    /// Empty ledger (every denomination implicitly zero)
    pub fn new() -> Self {
        Ledger {
            counts: BTreeMap::new(),
        }
    }

    /// Ledger with an explicit zero for every catalog denomination
    pub fn zero(catalog: &DenominationCatalog) -> Self {
        Ledger {
            counts: catalog.ids().map(|id| (id.clone(), 0)).collect(),
        }
    }

    /// Build from (id, count) pairs
    pub fn from_counts<I, K>(counts: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<DenominationId>,
    {
        Ledger {
            counts: counts.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, id: &DenominationId) -> i64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, id: DenominationId, count: i64) {
        self.counts.insert(id, count);
    }

    /// Add `delta` units to one denomination
    pub fn adjust(&mut self, id: &DenominationId, delta: i64) {
        *self.counts.entry(id.clone()).or_insert(0) += delta;
    }

    /// Entries actually stored, keyed by id
    pub fn iter(&self) -> impl Iterator<Item = (&DenominationId, i64)> {
        self.counts.iter().map(|(id, count)| (id, *count))
    }

    /// True when every count is zero
    pub fn is_zero(&self) -> bool {
        self.counts.values().all(|c| *c == 0)
    }

    // ========================================================================
    // ARITHMETIC
    // ========================================================================

    /// Monetary value in cents. Only catalog denominations are counted.
    /// Saturates at the i64 bounds instead of overflowing.
    pub fn total(&self, catalog: &DenominationCatalog) -> i64 {
        catalog
            .iter()
            .map(|d| self.get(&d.id).saturating_mul(d.face_value))
            .fold(0i64, |acc, value| acc.saturating_add(value))
    }

    /// Component-wise sum over the full catalog
    pub fn add(&self, other: &Ledger, catalog: &DenominationCatalog) -> Ledger {
        Ledger {
            counts: catalog
                .ids()
                .map(|id| (id.clone(), self.get(id) + other.get(id)))
                .collect(),
        }
    }

    /// Component-wise difference over the full catalog.
    ///
    /// Counts may go negative. Anything displayed or persisted as an
    /// availability must go through [`Ledger::clamp_non_negative`] first.
    pub fn subtract(&self, other: &Ledger, catalog: &DenominationCatalog) -> Ledger {
        Ledger {
            counts: catalog
                .ids()
                .map(|id| (id.clone(), self.get(id) - other.get(id)))
                .collect(),
        }
    }

    pub fn clamp_non_negative(&self) -> Ledger {
        Ledger {
            counts: self
                .counts
                .iter()
                .map(|(id, count)| (id.clone(), (*count).max(0)))
                .collect(),
        }
    }

    pub fn has_negative(&self) -> bool {
        self.counts.values().any(|c| *c < 0)
    }

    /// Re-key against the catalog: missing denominations become explicit
    /// zeros, ids the catalog does not know are dropped and returned.
    pub fn normalized(&self, catalog: &DenominationCatalog) -> (Ledger, Vec<DenominationId>) {
        let unknown = self
            .counts
            .keys()
            .filter(|id| !catalog.contains(id))
            .cloned()
            .collect();

        let ledger = Ledger {
            counts: catalog.ids().map(|id| (id.clone(), self.get(id))).collect(),
        };

        (ledger, unknown)
    }
}

// ============================================================================
// TESTS
// ============================================================================
