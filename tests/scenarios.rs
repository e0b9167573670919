// End-to-end days: count → recompute → save → reopen

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;
use till_reconcile::{
    change_box_receipt, read_count_sheet, till_receipt, ChangeBoxRecord, ChangeBoxSession,
    ChangeBoxStatus, DenominationCatalog, DenominationGroup, DenominationId, Ledger, OpeningMode,
    ReconciliationSession, RecordKind, RecordStore, Sheet, SolveOutcome, TillRecord, TillStatus,
};

fn catalog() -> Arc<DenominationCatalog> {
    Arc::new(DenominationCatalog::canadian())
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

fn id(s: &str) -> DenominationId {
    DenominationId::new(s)
}

fn close_530() -> Ledger {
    Ledger::from_counts([("bill_100", 5), ("bill_20", 1), ("bill_10", 1)])
}

#[test]
fn test_withdraw_down_to_target() {
    let mut session = ReconciliationSession::new(catalog(), date(), 1, OpeningMode::Normal);
    session.set_close(Sheet::Today, close_530());

    let view = session.recompute().today;
    let catalog = session.catalog();

    assert_eq!(view.status, TillStatus::Reconciling);
    assert_eq!(view.withdrawal_total(catalog), 33000);
    assert_eq!(view.withdrawal.get(&id("bill_100")), 3);
    assert_eq!(view.withdrawal.get(&id("bill_20")), 1);
    assert_eq!(view.withdrawal.get(&id("bill_10")), 1);
    assert_eq!(view.outcome(), Some(SolveOutcome::Exact));
    assert_eq!(view.restant_total(catalog), 20000);

    println!("✅ 530 $ close → 330 $ withdrawal, 200 $ left");
}

#[test]
fn test_pinned_twenty_leaves_shortfall() {
    let mut session = ReconciliationSession::new(catalog(), date(), 1, OpeningMode::Normal);
    session.set_close(Sheet::Today, close_530());
    assert_eq!(session.pin(Sheet::Today, id("bill_20"), 0), Some(0));

    let view = session.recompute().today;

    assert_eq!(view.withdrawal.get(&id("bill_20")), 0);
    assert_eq!(view.withdrawal.get(&id("bill_100")), 3);
    assert_eq!(view.withdrawal.get(&id("bill_10")), 1);
    assert_eq!(view.outcome(), Some(SolveOutcome::Shortfall { cents: 2000 }));
    assert_eq!(view.message(session.catalog()), "Impossible exact. Reste: 20.00 $");
}

#[test]
fn test_below_target_withdraws_nothing() {
    let mut session = ReconciliationSession::new(catalog(), date(), 1, OpeningMode::Normal);
    session.set_close(Sheet::Today, Ledger::from_counts([("bill_100", 1), ("bill_50", 1)]));

    let view = session.recompute().today;

    assert_eq!(view.status, TillStatus::BelowTarget);
    assert!(view.withdrawal.is_zero());
    assert_eq!(view.restant, view.close);
    assert!(view.outcome().is_none());
}

#[test]
fn test_change_box_pays_in_coins() {
    let catalog = catalog();
    let allowed: BTreeSet<DenominationId> = catalog
        .by_group(DenominationGroup::Coin)
        .chain(catalog.by_group(DenominationGroup::Roll))
        .map(|d| d.id.clone())
        .collect();

    let mut session = ChangeBoxSession::new(catalog.clone(), date(), 1);
    session.set_allowed(allowed);
    session.set_before(Ledger::from_counts([("coin_2", 30), ("coin_1", 10)]));
    session.set_deposit(Ledger::from_counts([("bill_20", 2), ("bill_5", 1), ("coin_2", 1)]));

    let view = session.recompute();

    assert_eq!(view.status, ChangeBoxStatus::Exchanging);
    assert_eq!(view.deposit_total, 4700);
    assert_eq!(view.withdrawn.get(&id("coin_2")), 23);
    assert_eq!(view.withdrawn.get(&id("coin_1")), 1);
    assert_eq!(view.remainder_cents, 0);
    assert_eq!(view.withdrawn.total(&catalog), 4700);

    // the deposited bills stay in the box
    assert_eq!(view.after.get(&id("bill_20")), 2);
    assert_eq!(view.after.get(&id("coin_2")), 8);
}

#[test]
fn test_recount_down_shrinks_pin() {
    let mut session = ReconciliationSession::new(catalog(), date(), 1, OpeningMode::Normal);
    session.set_close(Sheet::Today, close_530());
    assert_eq!(session.pin(Sheet::Today, id("bill_100"), 5), Some(5));

    // only 2 × 100 $ were actually there
    session.set_close_count(Sheet::Today, id("bill_100"), 2);

    assert_eq!(
        session.sheet(Sheet::Today).unwrap().pins().get(&id("bill_100")),
        Some(2)
    );
    let view = session.recompute().today;
    assert_eq!(view.withdrawal.get(&id("bill_100")), 2);
    assert_eq!(view.to_withdraw_cents, 3000);
    assert_eq!(view.outcome(), Some(SolveOutcome::OverPinned { cents: 17000 }));
}

#[test]
fn test_day_saved_and_reopened() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RecordStore::open(dir.path()).unwrap();
    let catalog = catalog();

    let sheet = "denomination,count\nBillet 100 $,5\nBillet 20 $,1\nBillet 10 $,1\n";
    let close = read_count_sheet(sheet.as_bytes(), &catalog).unwrap();

    let mut session = ReconciliationSession::new(catalog.clone(), date(), 2, OpeningMode::Normal);
    session.set_cashier("Marc");
    session.set_close(Sheet::Today, close);
    session.pin(Sheet::Today, id("bill_10"), 0);

    let view = session.recompute();
    let mut record = session.to_record(&view);
    let html = till_receipt(&record, &catalog);
    assert!(store.save_if_changed(&mut record, &html).unwrap().was_written());

    // re-render without edits: nothing to write
    let mut again = session.to_record(&session.recompute());
    assert!(!store.save_if_changed(&mut again, &html).unwrap().was_written());

    let loaded: TillRecord = store.load(date(), 2, &catalog).unwrap().unwrap();
    let reopened = ReconciliationSession::restore(catalog.clone(), &loaded);
    assert_eq!(reopened.cashier(), "Marc");
    assert_eq!(reopened.recompute(), view);

    let history = store.list_saved(RecordKind::Till).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].register, 2);
    assert!(history[0].receipt_path.exists());
}

#[test]
fn test_missed_close_day_saved_with_both_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RecordStore::open(dir.path()).unwrap();
    let catalog = catalog();

    let mut session = ReconciliationSession::new(catalog.clone(), date(), 1, OpeningMode::MissedClose);
    session.set_close(Sheet::Yesterday, Ledger::from_counts([("bill_100", 4)]));
    session.set_close(Sheet::Today, Ledger::from_counts([("bill_100", 2), ("bill_50", 2)]));

    let view = session.recompute();
    assert_eq!(view.today.open_total, 20000);

    let mut record = session.to_record(&view);
    let html = till_receipt(&record, &catalog);
    store.save_if_changed(&mut record, &html).unwrap();

    let loaded: TillRecord = store.load(date(), 1, &catalog).unwrap().unwrap();
    assert_eq!(loaded.mode, OpeningMode::MissedClose);
    let yesterday = loaded.yesterday.as_ref().unwrap();
    assert_eq!(yesterday.withdrawal.get(&id("bill_100")), 2);
    assert_eq!(loaded.today.open, yesterday.restant);

    let receipt = store.load_receipt(RecordKind::Till, date(), 1).unwrap().unwrap();
    assert_eq!(receipt.matches("<table>").count(), 2);
}

#[test]
fn test_change_box_day_saved() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = RecordStore::open(dir.path()).unwrap();
    let catalog = catalog();

    let mut session = ChangeBoxSession::new(catalog.clone(), date(), 1);
    session.set_before(Ledger::from_counts([("roll_2", 2), ("bill_5", 10)]));
    session.set_deposit(Ledger::from_counts([("bill_100", 1)]));

    let view = session.recompute();
    assert_eq!(view.remainder_cents, 0);
    assert_eq!(view.withdrawn.get(&id("bill_5")), 10);
    assert_eq!(view.withdrawn.get(&id("roll_2")), 1);

    let mut record = session.to_record(&view);
    let html = change_box_receipt(&record, &catalog);
    store.save_if_changed(&mut record, &html).unwrap();

    let loaded: ChangeBoxRecord = store.load(date(), 1, &catalog).unwrap().unwrap();
    assert_eq!(loaded.after.get(&id("bill_100")), 1);
    assert_eq!(loaded.after.get(&id("roll_2")), 1);
    assert!(store.list_saved(RecordKind::Till).unwrap().is_empty());
}
