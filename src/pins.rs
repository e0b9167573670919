// 📌 Pin Set - Cashier-forced withdrawal counts
//
// A denomination enters the set the first time the cashier nudges it (+/-).
// From then on the solver takes the pinned count as ground truth until the
// set is reset. Pins are re-clamped (never removed) when availability shrinks.

use crate::catalog::DenominationId;
use crate::ledger::Ledger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinSet {
    pins: BTreeMap<DenominationId, i64>,
}

impl PinSet {
    pub fn new() -> Self {
        PinSet {
            pins: BTreeMap::new(),
        }
    }

    pub fn from_pins<I, K>(pins: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<DenominationId>,
    {
        PinSet {
            pins: pins.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, id: &DenominationId) -> Option<i64> {
        self.pins.get(id).copied()
    }

    pub fn contains(&self, id: &DenominationId) -> bool {
        self.pins.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DenominationId, i64)> {
        self.pins.iter().map(|(id, count)| (id, *count))
    }

    /// Force a denomination to `count`, clamped to `[0, available]`
    pub fn pin(&mut self, id: DenominationId, count: i64, available: i64) -> i64 {
        let value = count.clamp(0, available.max(0));
        self.pins.insert(id, value);
        value
    }

    /// Manual +/- on a denomination.
    ///
    /// The first nudge starts from `current` (what the solver last proposed);
    /// later nudges move the existing pin. Returns the new pinned value.
    pub fn nudge(&mut self, id: &DenominationId, delta: i64, current: i64, available: i64) -> i64 {
        let base = self.get(id).unwrap_or(current);
        self.pin(id.clone(), base + delta, available)
    }

    /// "Reset adjustments": back to a purely solver-driven withdrawal
    pub fn reset(&mut self) {
        self.pins.clear();
    }
}

/// Clamp each pinned value into `[0, availability[d]]`.
///
/// Applied every time availability changes so a pin from a previous count
/// never exceeds what is physically in the drawer now.
pub fn clamp_pins(pins: &PinSet, availability: &Ledger) -> PinSet {
    PinSet {
        pins: pins
            .pins
            .iter()
            .map(|(id, count)| (id.clone(), (*count).clamp(0, availability.get(id).max(0))))
            .collect(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
