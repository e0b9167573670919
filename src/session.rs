// 🗓️ Reconciliation Sessions - One register, one day
//
// Recompute-on-change: every mutation leaves the stored inputs (counts, pins,
// target) consistent, and `recompute()` derives the whole view from scratch.
// Nothing derived is cached.
//
// Till:        CLOSE − target = to withdraw → solve against CLOSE → RESTANT
// Change box:  deposit total = to hand out  → solve against before+deposit

use crate::catalog::{format_cents, DenominationCatalog, DenominationId};
use crate::ledger::Ledger;
use crate::pins::{clamp_pins, PinSet};
use crate::record::{
    new_record_id, ChangeBoxRecord, OpeningMode, RecordKind, RecordMeta, TillDayRecord, TillRecord,
};
use crate::solver::{SolveOutcome, Withdrawal, WithdrawalSolver};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Default float left in the till
pub const DEFAULT_TARGET_DOLLARS: i64 = 200;

// ============================================================================
// TILL SHEET
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TillStatus {
    /// CLOSE not counted yet (all zero)
    Collecting,

    /// CLOSE ≤ target: nothing to withdraw
    BelowTarget,

    /// CLOSE > target: solver proposes a withdrawal
    Reconciling,
}

/// Editable inputs of one OPEN/CLOSE sheet
#[derive(Debug, Clone, PartialEq)]
pub struct TillSheet {
    open: Ledger,
    close: Ledger,
    pins: PinSet,
}

impl TillSheet {
    pub fn new(catalog: &DenominationCatalog) -> Self {
        TillSheet {
            open: Ledger::zero(catalog),
            close: Ledger::zero(catalog),
            pins: PinSet::new(),
        }
    }

    pub fn open(&self) -> &Ledger {
        &self.open
    }

    pub fn close(&self) -> &Ledger {
        &self.close
    }

    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    fn set_close(&mut self, close: Ledger) {
        self.close = close;
        self.pins = clamp_pins(&self.pins, &self.close);
    }
}

/// Everything the grid and the receipt show for one sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TillView {
    pub status: TillStatus,
    pub open: Ledger,
    pub close: Ledger,
    pub withdrawal: Ledger,
    pub restant: Ledger,

    /// Pins actually applied (clamped to CLOSE)
    pub pins: PinSet,

    pub open_total: i64,
    pub close_total: i64,

    /// CLOSE total − target ("À retirer"); ≤ 0 below target
    pub to_withdraw_cents: i64,

    pub remainder_cents: i64,
}

impl TillView {
    pub fn withdrawal_total(&self, catalog: &DenominationCatalog) -> i64 {
        self.withdrawal.total(catalog)
    }

    pub fn restant_total(&self, catalog: &DenominationCatalog) -> i64 {
        self.restant.total(catalog)
    }

    /// Solver outcome, only while reconciling
    pub fn outcome(&self) -> Option<SolveOutcome> {
        match self.status {
            TillStatus::Reconciling => Some(SolveOutcome::from_remainder(self.remainder_cents)),
            _ => None,
        }
    }

    /// Status line for the cashier
    pub fn message(&self, catalog: &DenominationCatalog) -> String {
        match self.status {
            TillStatus::Collecting => "Entre le comptage CLOSE.".to_string(),
            TillStatus::BelowTarget => "Sous la cible (ou égal). Aucun retrait nécessaire.".to_string(),
            TillStatus::Reconciling => match self.outcome() {
                Some(SolveOutcome::Exact) => {
                    format!("Retrait proposé: {}", format_cents(self.withdrawal_total(catalog)))
                }
                Some(other) => other.to_string(),
                None => String::new(),
            },
        }
    }

    fn to_day_record(&self) -> TillDayRecord {
        TillDayRecord {
            open: self.open.clone(),
            close: self.close.clone(),
            withdrawal: self.withdrawal.clone(),
            restant: self.restant.clone(),
            pins: self.pins.clone(),
            remainder_cents: self.remainder_cents,
        }
    }
}

/// Pure derivation of a till sheet
pub fn derive_till_view(
    catalog: &DenominationCatalog,
    target_cents: i64,
    open: &Ledger,
    close: &Ledger,
    pins: &PinSet,
) -> TillView {
    let open_total = open.total(catalog);
    let close_total = close.total(catalog);
    let to_withdraw = close_total - target_cents;
    let pins = clamp_pins(pins, close);

    let status = if close.is_zero() {
        TillStatus::Collecting
    } else if to_withdraw <= 0 {
        TillStatus::BelowTarget
    } else {
        TillStatus::Reconciling
    };

    let withdrawal = match status {
        TillStatus::Reconciling => WithdrawalSolver::new(catalog).solve(
            to_withdraw,
            &catalog.all_allowed(),
            close,
            &pins,
            catalog.till_priority(),
        ),
        // stale pins are ignored outside the withdrawal flow
        _ => Withdrawal::none(catalog),
    };
    let restant = close.subtract(&withdrawal.ledger, catalog);

    debug!(
        ?status,
        close_total,
        to_withdraw,
        remainder = withdrawal.remainder_cents,
        "till recomputed"
    );

    TillView {
        status,
        open: open.normalized(catalog).0,
        close: close.normalized(catalog).0,
        withdrawal: withdrawal.ledger,
        restant,
        pins,
        open_total,
        close_total,
        to_withdraw_cents: to_withdraw,
        remainder_cents: withdrawal.remainder_cents,
    }
}

// ============================================================================
// RECONCILIATION SESSION (till)
// ============================================================================

/// Which sheet an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    Today,

    /// Yesterday's missed closing (MissedClose mode only)
    Yesterday,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub yesterday: Option<TillView>,
    pub today: TillView,
}

/// Editing state of one register for one calendar day
#[derive(Debug, Clone)]
pub struct ReconciliationSession {
    catalog: Arc<DenominationCatalog>,
    date: NaiveDate,
    register: u8,
    cashier: String,
    target_cents: i64,
    mode: OpeningMode,
    today: TillSheet,
    yesterday: Option<TillSheet>,
    record_id: Option<String>,
}

impl ReconciliationSession {
    /// Fresh session: all ledgers zero, no pins
    pub fn new(catalog: Arc<DenominationCatalog>, date: NaiveDate, register: u8, mode: OpeningMode) -> Self {
        let today = TillSheet::new(&catalog);
        let yesterday = match mode {
            OpeningMode::MissedClose => Some(TillSheet::new(&catalog)),
            OpeningMode::Normal => None,
        };

        ReconciliationSession {
            catalog,
            date,
            register,
            cashier: String::new(),
            target_cents: DEFAULT_TARGET_DOLLARS * 100,
            mode,
            today,
            yesterday,
            record_id: None,
        }
    }

    /// Continue a day from its saved record
    pub fn restore(catalog: Arc<DenominationCatalog>, record: &TillRecord) -> Self {
        let mut session = Self::new(catalog, record.meta.date, record.meta.register, record.mode);
        session.cashier = record.meta.cashier_name().to_string();
        session.target_cents = record.target_dollars * 100;
        session.record_id = Some(record.id.clone());

        session.today.open = record.today.open.clamp_non_negative();
        session.today.pins = record.today.pins.clone();
        session.today.set_close(record.today.close.clamp_non_negative());

        if let (Some(sheet), Some(saved)) = (session.yesterday.as_mut(), record.yesterday.as_ref()) {
            sheet.open = saved.open.clamp_non_negative();
            sheet.pins = saved.pins.clone();
            sheet.set_close(saved.close.clamp_non_negative());
        }

        info!(
            date = %session.date,
            register = session.register,
            mode = ?session.mode,
            "till session restored"
        );
        session
    }

    pub fn catalog(&self) -> &DenominationCatalog {
        &self.catalog
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn register(&self) -> u8 {
        self.register
    }

    pub fn mode(&self) -> OpeningMode {
        self.mode
    }

    pub fn cashier(&self) -> &str {
        &self.cashier
    }

    pub fn set_cashier(&mut self, cashier: impl Into<String>) {
        self.cashier = cashier.into();
    }

    pub fn target_cents(&self) -> i64 {
        self.target_cents
    }

    pub fn set_target_dollars(&mut self, dollars: i64) {
        self.target_cents = dollars.max(0) * 100;
    }

    pub fn sheet(&self, which: Sheet) -> Option<&TillSheet> {
        match which {
            Sheet::Today => Some(&self.today),
            Sheet::Yesterday => self.yesterday.as_ref(),
        }
    }

    fn sheet_mut(&mut self, which: Sheet) -> Option<&mut TillSheet> {
        match which {
            Sheet::Today => Some(&mut self.today),
            Sheet::Yesterday => self.yesterday.as_mut(),
        }
    }

    // ========================================================================
    // EDITS
    // ========================================================================

    /// Today's OPEN count. In MissedClose mode OPEN is derived from
    /// yesterday's RESTANT and this value is not used.
    pub fn set_open_count(&mut self, id: DenominationId, count: i64) {
        self.today.open.set(id, count.max(0));
    }

    pub fn set_open(&mut self, open: Ledger) {
        self.today.open = open.clamp_non_negative();
    }

    /// Yesterday's OPEN, as counted the morning before the missed closing
    pub fn set_yesterday_open(&mut self, open: Ledger) -> bool {
        match self.yesterday.as_mut() {
            Some(sheet) => {
                sheet.open = open.clamp_non_negative();
                true
            }
            None => false,
        }
    }

    /// Edit one CLOSE count; pins are re-clamped to the new availability
    pub fn set_close_count(&mut self, which: Sheet, id: DenominationId, count: i64) -> bool {
        match self.sheet_mut(which) {
            Some(sheet) => {
                let mut close = sheet.close.clone();
                close.set(id, count.max(0));
                sheet.set_close(close);
                true
            }
            None => false,
        }
    }

    pub fn set_close(&mut self, which: Sheet, close: Ledger) -> bool {
        match self.sheet_mut(which) {
            Some(sheet) => {
                sheet.set_close(close.clamp_non_negative());
                true
            }
            None => false,
        }
    }

    /// Manual +/- on a withdrawal count. Only while reconciling; returns the
    /// new pinned value.
    pub fn nudge(&mut self, which: Sheet, id: &DenominationId, delta: i64) -> Option<i64> {
        let view = self.view_of(which)?;
        if view.status != TillStatus::Reconciling {
            return None;
        }

        let current = view.withdrawal.get(id);
        let available = view.close.get(id);
        let sheet = self.sheet_mut(which)?;
        let value = sheet.pins.nudge(id, delta, current, available);

        debug!(denomination = %id, delta, value, "withdrawal pin nudged");
        Some(value)
    }

    pub fn increment(&mut self, which: Sheet, id: &DenominationId) -> Option<i64> {
        self.nudge(which, id, 1)
    }

    pub fn decrement(&mut self, which: Sheet, id: &DenominationId) -> Option<i64> {
        self.nudge(which, id, -1)
    }

    /// Pin a withdrawal count directly (clamped to CLOSE)
    pub fn pin(&mut self, which: Sheet, id: DenominationId, count: i64) -> Option<i64> {
        let sheet = self.sheet_mut(which)?;
        let available = sheet.close.get(&id);
        Some(sheet.pins.pin(id, count, available))
    }

    /// "Reset ajustements retrait"
    pub fn reset_pins(&mut self, which: Sheet) {
        if let Some(sheet) = self.sheet_mut(which) {
            sheet.pins.reset();
            info!(?which, "withdrawal adjustments reset");
        }
    }

    // ========================================================================
    // DERIVATION
    // ========================================================================

    fn view_of(&self, which: Sheet) -> Option<TillView> {
        let view = self.recompute();
        match which {
            Sheet::Today => Some(view.today),
            Sheet::Yesterday => view.yesterday,
        }
    }

    /// Derive both sheets from the current inputs
    pub fn recompute(&self) -> SessionView {
        let yesterday = self.yesterday.as_ref().map(|sheet| {
            derive_till_view(&self.catalog, self.target_cents, &sheet.open, &sheet.close, &sheet.pins)
        });

        let open = match &yesterday {
            Some(view) => view.restant.clamp_non_negative(),
            None => self.today.open.clone(),
        };

        let today = derive_till_view(
            &self.catalog,
            self.target_cents,
            &open,
            &self.today.close,
            &self.today.pins,
        );

        SessionView { yesterday, today }
    }

    /// Snapshot for the storage collaborator
    pub fn to_record(&self, view: &SessionView) -> TillRecord {
        let meta = RecordMeta::new(RecordKind::Till, self.date, self.register, &self.cashier);
        let mut record = TillRecord::new(meta, self.target_cents / 100, self.mode, view.today.to_day_record());
        record.yesterday = view.yesterday.as_ref().map(|v| v.to_day_record());
        if let Some(id) = &self.record_id {
            record.id = id.clone();
        }
        record
    }
}

// ============================================================================
// CHANGE-BOX SESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeBoxStatus {
    /// Deposit total is zero: nothing to hand out
    NoDeposit,

    /// Cashier unticked every denomination
    NothingAllowed,

    Exchanging,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeBoxView {
    pub status: ChangeBoxStatus,
    pub before: Ledger,
    pub deposit: Ledger,

    /// before + deposit: what the change is taken from
    pub available: Ledger,

    pub withdrawn: Ledger,
    pub after: Ledger,
    pub pins: PinSet,
    pub before_total: i64,
    pub deposit_total: i64,
    pub remainder_cents: i64,
}

impl ChangeBoxView {
    pub fn outcome(&self) -> Option<SolveOutcome> {
        match self.status {
            ChangeBoxStatus::Exchanging => Some(SolveOutcome::from_remainder(self.remainder_cents)),
            _ => None,
        }
    }

    pub fn message(&self, catalog: &DenominationCatalog) -> String {
        match self.status {
            ChangeBoxStatus::NoDeposit => "Dépôt = 0. Rien à calculer.".to_string(),
            ChangeBoxStatus::NothingAllowed => "Aucun type autorisé.".to_string(),
            ChangeBoxStatus::Exchanging => match self.outcome() {
                Some(SolveOutcome::Exact) => {
                    format!("Change retiré: {}", format_cents(self.withdrawn.total(catalog)))
                }
                Some(other) => other.to_string(),
                None => String::new(),
            },
        }
    }
}

/// Exchange of a bill deposit for the same value in change
#[derive(Debug, Clone)]
pub struct ChangeBoxSession {
    catalog: Arc<DenominationCatalog>,
    date: NaiveDate,
    register: u8,
    cashier: String,
    before: Ledger,
    deposit: Ledger,
    allowed: BTreeSet<DenominationId>,
    pins: PinSet,
    record_id: Option<String>,
}

impl ChangeBoxSession {
    pub fn new(catalog: Arc<DenominationCatalog>, date: NaiveDate, register: u8) -> Self {
        let allowed = catalog.default_change_box_allowed().clone();
        ChangeBoxSession {
            before: Ledger::zero(&catalog),
            deposit: Ledger::zero(&catalog),
            catalog,
            date,
            register,
            cashier: String::new(),
            allowed,
            pins: PinSet::new(),
            record_id: None,
        }
    }

    pub fn restore(catalog: Arc<DenominationCatalog>, record: &ChangeBoxRecord) -> Self {
        let mut session = Self::new(catalog, record.meta.date, record.meta.register);
        session.cashier = record.meta.cashier_name().to_string();
        session.before = record.before.clamp_non_negative();
        session.deposit = record.deposit.clamp_non_negative();
        if !record.allowed.is_empty() {
            session.allowed = record.allowed.iter().cloned().collect();
        }
        session.pins = clamp_pins(&record.pins, &session.available());
        session.record_id = Some(record.id.clone());

        info!(date = %session.date, register = session.register, "change-box session restored");
        session
    }

    pub fn catalog(&self) -> &DenominationCatalog {
        &self.catalog
    }

    pub fn set_cashier(&mut self, cashier: impl Into<String>) {
        self.cashier = cashier.into();
    }

    pub fn allowed(&self) -> &BTreeSet<DenominationId> {
        &self.allowed
    }

    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    fn available(&self) -> Ledger {
        self.before.add(&self.deposit, &self.catalog)
    }

    fn reclamp(&mut self) {
        self.pins = clamp_pins(&self.pins, &self.available());
    }

    pub fn set_before_count(&mut self, id: DenominationId, count: i64) {
        self.before.set(id, count.max(0));
        self.reclamp();
    }

    pub fn set_before(&mut self, before: Ledger) {
        self.before = before.clamp_non_negative();
        self.reclamp();
    }

    pub fn set_deposit_count(&mut self, id: DenominationId, count: i64) {
        self.deposit.set(id, count.max(0));
        self.reclamp();
    }

    pub fn set_deposit(&mut self, deposit: Ledger) {
        self.deposit = deposit.clamp_non_negative();
        self.reclamp();
    }

    pub fn allow(&mut self, id: DenominationId) {
        self.allowed.insert(id);
    }

    pub fn disallow(&mut self, id: &DenominationId) {
        self.allowed.remove(id);
    }

    pub fn set_allowed(&mut self, allowed: BTreeSet<DenominationId>) {
        self.allowed = allowed;
    }

    /// Manual +/- on an allowed denomination while exchanging
    pub fn nudge(&mut self, id: &DenominationId, delta: i64) -> Option<i64> {
        let view = self.recompute();
        if view.status != ChangeBoxStatus::Exchanging || !self.allowed.contains(id) {
            return None;
        }

        let value = self
            .pins
            .nudge(id, delta, view.withdrawn.get(id), view.available.get(id));
        debug!(denomination = %id, delta, value, "change pin nudged");
        Some(value)
    }

    pub fn pin(&mut self, id: DenominationId, count: i64) -> i64 {
        let available = self.available().get(&id);
        self.pins.pin(id, count, available)
    }

    pub fn reset_pins(&mut self) {
        self.pins.reset();
        info!("change-box adjustments reset");
    }

    pub fn recompute(&self) -> ChangeBoxView {
        let catalog = &self.catalog;
        let available = self.available();
        let deposit_total = self.deposit.total(catalog);
        let pins = clamp_pins(&self.pins, &available);

        let status = if deposit_total == 0 {
            ChangeBoxStatus::NoDeposit
        } else if self.allowed.is_empty() {
            ChangeBoxStatus::NothingAllowed
        } else {
            ChangeBoxStatus::Exchanging
        };

        let withdrawal = match status {
            ChangeBoxStatus::Exchanging => WithdrawalSolver::new(catalog).solve(
                deposit_total,
                &self.allowed,
                &available,
                &pins,
                catalog.change_box_priority(),
            ),
            _ => Withdrawal::none(catalog),
        };
        let after = available.subtract(&withdrawal.ledger, catalog);

        debug!(
            ?status,
            deposit_total,
            remainder = withdrawal.remainder_cents,
            "change box recomputed"
        );

        ChangeBoxView {
            status,
            before: self.before.normalized(catalog).0,
            deposit: self.deposit.normalized(catalog).0,
            available,
            withdrawn: withdrawal.ledger,
            after,
            pins,
            before_total: self.before.total(catalog),
            deposit_total,
            remainder_cents: withdrawal.remainder_cents,
        }
    }

    pub fn to_record(&self, view: &ChangeBoxView) -> ChangeBoxRecord {
        ChangeBoxRecord {
            id: self.record_id.clone().unwrap_or_else(new_record_id),
            meta: RecordMeta::new(RecordKind::ChangeBox, self.date, self.register, &self.cashier),
            before: view.before.clone(),
            deposit: view.deposit.clone(),
            withdrawn: view.withdrawn.clone(),
            after: view.after.clone(),
            pins: self.pins.clone(),
            allowed: self.allowed.iter().cloned().collect(),
            remainder_cents: view.remainder_cents,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
