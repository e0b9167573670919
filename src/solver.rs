// ⚖️ Constrained Withdrawal Solver
//
// Greedy, non-backtracking, order-deterministic:
//   1. seed the result with every pin (pins are never reduced)
//   2. remainder = target - total(result); stop if negative (over-pinned)
//   3. walk the priority order (allowed, unpinned only) taking
//      min(remainder / face_value, available - already_taken) units
//
// The solver never errors. The sign of the remainder is the outcome.

use crate::catalog::{format_cents, DenominationCatalog, DenominationId, PriorityOrder};
use crate::ledger::Ledger;
use crate::pins::PinSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// RESULT
// ============================================================================

/// What the remainder means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveOutcome {
    /// Result sums exactly to the target
    Exact,

    /// Target could not be met; this many cents remain uncovered
    Shortfall { cents: i64 },

    /// Pins alone exceed the target by this many cents
    OverPinned { cents: i64 },
}

impl SolveOutcome {
    pub fn from_remainder(remainder_cents: i64) -> Self {
        match remainder_cents {
            0 => SolveOutcome::Exact,
            r if r > 0 => SolveOutcome::Shortfall { cents: r },
            r => SolveOutcome::OverPinned { cents: -r },
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, SolveOutcome::Exact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub ledger: Ledger,

    /// `> 0` short, `0` exact, `< 0` over-pinned
    pub remainder_cents: i64,
}

impl Withdrawal {
    /// Zero withdrawal with nothing left to cover
    pub fn none(catalog: &DenominationCatalog) -> Self {
        Withdrawal {
            ledger: Ledger::zero(catalog),
            remainder_cents: 0,
        }
    }

    pub fn outcome(&self) -> SolveOutcome {
        SolveOutcome::from_remainder(self.remainder_cents)
    }

    /// The ledger may be trusted as-is only when exact
    pub fn is_validated(&self) -> bool {
        self.remainder_cents == 0
    }
}

impl fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveOutcome::Exact => write!(f, "exact"),
            SolveOutcome::Shortfall { cents } => {
                write!(f, "Impossible exact. Reste: {}", format_cents(*cents))
            }
            SolveOutcome::OverPinned { cents } => {
                write!(f, "Verrouillage trop haut. Dépasse de {}", format_cents(*cents))
            }
        }
    }
}

// ============================================================================
// SOLVER
// ============================================================================

pub struct WithdrawalSolver<'a> {
    catalog: &'a DenominationCatalog,
}

impl<'a> WithdrawalSolver<'a> {
    pub fn new(catalog: &'a DenominationCatalog) -> Self {
        WithdrawalSolver { catalog }
    }

    /// Choose units from `availability` summing to `target_cents`.
    ///
    /// Preconditions: availability counts ≥ 0 and pins already clamped to
    /// `[0, availability[d]]` (see [`crate::pins::clamp_pins`]).
    ///
    /// Example:
    /// ```
    /// use till_reconcile::{DenominationCatalog, Ledger, PinSet, WithdrawalSolver};
    ///
    /// let catalog = DenominationCatalog::canadian();
    /// let close = Ledger::from_counts([("bill_100", 5), ("bill_20", 1), ("bill_10", 1)]);
    ///
    /// let withdrawal = WithdrawalSolver::new(&catalog).solve(
    ///     33000,
    ///     &catalog.all_allowed(),
    ///     &close,
    ///     &PinSet::new(),
    ///     catalog.till_priority(),
    /// );
    ///
    /// assert_eq!(withdrawal.remainder_cents, 0);
    /// assert_eq!(withdrawal.ledger.get(&"bill_100".into()), 3);
    /// ```
    pub fn solve(
        &self,
        target_cents: i64,
        allowed: &BTreeSet<DenominationId>,
        availability: &Ledger,
        pins: &PinSet,
        priority: &PriorityOrder,
    ) -> Withdrawal {
        let mut result = Ledger::zero(self.catalog);
        for (id, count) in pins.iter() {
            result.set(id.clone(), count);
        }

        let mut remainder = target_cents.saturating_sub(result.total(self.catalog));
        if remainder < 0 {
            return Withdrawal {
                ledger: result,
                remainder_cents: remainder,
            };
        }

        for id in priority.iter().filter(|id| allowed.contains(*id)) {
            if remainder <= 0 {
                break;
            }
            if pins.contains(id) {
                continue;
            }
            let face_value = match self.catalog.face_value(id) {
                Some(v) => v,
                None => continue,
            };

            let can_take = (availability.get(id) - result.get(id)).max(0);
            let take = (remainder / face_value).min(can_take);
            if take > 0 {
                result.adjust(id, take);
                remainder -= take * face_value;
            }
        }

        Withdrawal {
            ledger: result,
            remainder_cents: remainder,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
