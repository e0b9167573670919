use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use till_reconcile::receipt::{ReceiptTable, CHANGE_BOX_HEADERS, TILL_HEADERS};
use till_reconcile::{
    change_box_receipt, format_cents, load_count_sheet, parse_pin_spec, till_receipt, AppConfig,
    Authenticator, ChangeBoxRecord, ChangeBoxSession, DenominationCatalog, DenominationId, Ledger, OpeningMode,
    PasswordGate, ReconciliationSession, RecordKind, RecordStore, Sheet, TillRecord, TillView,
};

/// End-of-day till and change-box reconciliation
#[derive(Parser)]
#[command(name = "till")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TILL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// App password
    #[arg(long, env = "TILL_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a till: CLOSE count → proposed withdrawal → RESTANT
    Caisse(CaisseArgs),

    /// Exchange a bill deposit for change from the change box
    Boite(BoiteArgs),

    /// List saved days, newest first
    History {
        #[arg(value_enum)]
        kind: Option<KindArg>,
    },

    /// Print a saved day
    Show {
        #[arg(value_enum)]
        kind: KindArg,
        date: NaiveDate,
        #[arg(short, long, default_value_t = 1)]
        register: u8,
    },

    /// Print the denomination table
    Catalog,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Caisse,
    Boite,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Caisse => RecordKind::Till,
            KindArg::Boite => RecordKind::ChangeBox,
        }
    }
}

#[derive(clap::Args)]
struct DayArgs {
    #[arg(short, long, default_value_t = 1)]
    register: u8,

    #[arg(long)]
    cashier: Option<String>,

    /// Defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Compute only, do not write the record
    #[arg(long)]
    no_save: bool,
}

#[derive(clap::Args)]
struct CaisseArgs {
    /// CLOSE count sheet (CSV: denomination,count)
    #[arg(long)]
    close: Option<PathBuf>,

    /// OPEN count sheet
    #[arg(long)]
    open: Option<PathBuf>,

    /// Yesterday's CLOSE; switches to missed-close mode
    #[arg(long)]
    yesterday_close: Option<PathBuf>,

    /// Yesterday's OPEN (missed-close mode)
    #[arg(long, requires = "yesterday_close")]
    yesterday_open: Option<PathBuf>,

    /// Float to leave in the till, in dollars
    #[arg(long)]
    target: Option<i64>,

    /// Lock a withdrawal count, e.g. bill_20=0
    #[arg(long = "pin")]
    pins: Vec<String>,

    /// Lock a withdrawal count on yesterday's sheet
    #[arg(long = "yesterday-pin", requires = "yesterday_close")]
    yesterday_pins: Vec<String>,

    #[command(flatten)]
    day: DayArgs,
}

#[derive(clap::Args)]
struct BoiteArgs {
    /// Deposited bills (CSV: denomination,count)
    #[arg(long)]
    deposit: Option<PathBuf>,

    /// Change-box content before the exchange
    #[arg(long)]
    before: Option<PathBuf>,

    /// Denominations allowed as change; repeat. Defaults to the catalog's set
    #[arg(long = "allow")]
    allowed: Vec<String>,

    #[arg(long = "pin")]
    pins: Vec<String>,

    #[command(flatten)]
    day: DayArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let catalog = Arc::new(config.load_catalog().context("Failed to load denomination table")?);

    if let Commands::Catalog = cli.command {
        print_catalog(&catalog);
        return Ok(());
    }

    let mut gate = PasswordGate::from_env(&config.password_env);
    gate.login(cli.password.as_deref().unwrap_or_default());
    gate.require().context("Mot de passe invalide (--password ou TILL_PASSWORD)")?;

    let mut store = RecordStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open data directory {}", config.data_dir.display()))?;

    match cli.command {
        Commands::Caisse(args) => run_caisse(&config, catalog, &mut store, args),
        Commands::Boite(args) => run_boite(&config, catalog, &mut store, args),
        Commands::History { kind } => run_history(&store, kind),
        Commands::Show { kind, date, register } => run_show(&catalog, &store, kind.into(), date, register),
        Commands::Catalog => Ok(()),
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_caisse(
    config: &AppConfig,
    catalog: Arc<DenominationCatalog>,
    store: &mut RecordStore,
    args: CaisseArgs,
) -> Result<()> {
    let (date, register) = resolve_day(config, &args.day)?;
    let mode = if args.yesterday_close.is_some() {
        OpeningMode::MissedClose
    } else {
        OpeningMode::Normal
    };

    let saved: Option<TillRecord> = store.load(date, register, &catalog)?;
    let mut session = match saved {
        Some(record) if record.mode == mode => ReconciliationSession::restore(catalog.clone(), &record),
        Some(record) => {
            warn!(saved = ?record.mode, requested = ?mode, "opening mode changed, starting over");
            new_till_session(config, catalog.clone(), date, register, mode)
        }
        None => new_till_session(config, catalog.clone(), date, register, mode),
    };

    if let Some(target) = args.target {
        if target < 0 {
            bail!("La cible doit être positive: {}", target);
        }
        session.set_target_dollars(target);
    }
    if let Some(cashier) = &args.day.cashier {
        session.set_cashier(cashier.as_str());
    }

    if let Some(path) = &args.open {
        session.set_open(read_sheet(path, &catalog)?);
    }
    if let Some(path) = &args.yesterday_open {
        session.set_yesterday_open(read_sheet(path, &catalog)?);
    }
    if let Some(path) = &args.yesterday_close {
        session.set_close(Sheet::Yesterday, read_sheet(path, &catalog)?);
    }
    if let Some(path) = &args.close {
        session.set_close(Sheet::Today, read_sheet(path, &catalog)?);
    }

    for spec in &args.yesterday_pins {
        let (id, count) = parse_pin_spec(spec, &catalog)?;
        session.pin(Sheet::Yesterday, id, count);
    }
    for spec in &args.pins {
        let (id, count) = parse_pin_spec(spec, &catalog)?;
        session.pin(Sheet::Today, id, count);
    }

    let view = session.recompute();

    println!("🧾 CAISSE #{} — {} — {}", register, date, session.mode().as_str());
    println!("   Cible: {}", format_cents(session.target_cents()));
    if let Some(yesterday) = &view.yesterday {
        println!("\n📅 Hier (fermeture manquée)");
        print_till_view(&catalog, yesterday);
    }
    if view.yesterday.is_some() {
        println!("\n📅 Aujourd'hui");
    }
    print_till_view(&catalog, &view.today);

    if args.day.no_save {
        return Ok(());
    }

    let mut record = session.to_record(&view);
    let html = till_receipt(&record, &catalog);
    let outcome = store.save_if_changed(&mut record, &html)?;
    report_save(store, RecordKind::Till, date, register, outcome.was_written());
    Ok(())
}

fn new_till_session(
    config: &AppConfig,
    catalog: Arc<DenominationCatalog>,
    date: NaiveDate,
    register: u8,
    mode: OpeningMode,
) -> ReconciliationSession {
    let mut session = ReconciliationSession::new(catalog, date, register, mode);
    session.set_target_dollars(config.default_target_dollars);
    session
}

fn run_boite(
    config: &AppConfig,
    catalog: Arc<DenominationCatalog>,
    store: &mut RecordStore,
    args: BoiteArgs,
) -> Result<()> {
    let (date, register) = resolve_day(config, &args.day)?;

    let saved: Option<ChangeBoxRecord> = store.load(date, register, &catalog)?;
    let mut session = match &saved {
        Some(record) => ChangeBoxSession::restore(catalog.clone(), record),
        None => {
            let mut session = ChangeBoxSession::new(catalog.clone(), date, register);
            if let Some(allowed) = config.change_box_allowed(&catalog)? {
                session.set_allowed(allowed);
            }
            session
        }
    };

    if let Some(cashier) = &args.day.cashier {
        session.set_cashier(cashier.as_str());
    }
    if let Some(path) = &args.before {
        session.set_before(read_sheet(path, &catalog)?);
    }
    if let Some(path) = &args.deposit {
        session.set_deposit(read_sheet(path, &catalog)?);
    }
    if !args.allowed.is_empty() {
        let allowed: BTreeSet<DenominationId> = args
            .allowed
            .iter()
            .map(|key| catalog.resolve(key))
            .collect::<till_reconcile::Result<_>>()?;
        session.set_allowed(allowed);
    }
    for spec in &args.pins {
        let (id, count) = parse_pin_spec(spec, &catalog)?;
        session.pin(id, count);
    }

    let view = session.recompute();

    println!("🪙 BOÎTE (ÉCHANGE) #{} — {}", register, date);
    println!(
        "   Boîte avant: {}   Dépôt: {}",
        format_cents(view.before_total),
        format_cents(view.deposit_total)
    );
    print_ledgers(
        &catalog,
        &CHANGE_BOX_HEADERS,
        &[&view.before, &view.deposit, &view.withdrawn, &view.after],
    );
    println!("\n{}", status_line(view.outcome().map(|o| o.is_exact()), &view.message(&catalog)));

    if args.day.no_save {
        return Ok(());
    }

    let mut record = session.to_record(&view);
    let html = change_box_receipt(&record, &catalog);
    let outcome = store.save_if_changed(&mut record, &html)?;
    report_save(store, RecordKind::ChangeBox, date, register, outcome.was_written());
    Ok(())
}

fn run_history(store: &RecordStore, kind: Option<KindArg>) -> Result<()> {
    let kinds = match kind {
        Some(kind) => vec![kind.into()],
        None => vec![RecordKind::Till, RecordKind::ChangeBox],
    };

    for kind in kinds {
        let entries = store.list_saved(kind)?;
        println!("📚 {} ({} jour(s))", kind.as_str(), entries.len());
        for entry in entries {
            println!("   {}  caisse #{}  {}", entry.date, entry.register, entry.receipt_path.display());
        }
    }
    Ok(())
}

fn run_show(
    catalog: &DenominationCatalog,
    store: &RecordStore,
    kind: RecordKind,
    date: NaiveDate,
    register: u8,
) -> Result<()> {
    match kind {
        RecordKind::Till => {
            let Some(record) = store.load::<TillRecord>(date, register, catalog)? else {
                bail!("Aucun enregistrement caisse #{} pour {}", register, date);
            };
            println!(
                "🧾 CAISSE #{} — {} — {} — {}",
                register,
                date,
                record.mode.as_str(),
                record.meta.cashier
            );
            if let Some(yesterday) = &record.yesterday {
                println!("\n📅 Hier (fermeture manquée)");
                print_ledgers(
                    catalog,
                    &TILL_HEADERS,
                    &[&yesterday.open, &yesterday.close, &yesterday.withdrawal, &yesterday.restant],
                );
                println!("\n📅 Aujourd'hui");
            }
            let today = &record.today;
            print_ledgers(
                catalog,
                &TILL_HEADERS,
                &[&today.open, &today.close, &today.withdrawal, &today.restant],
            );
        }
        RecordKind::ChangeBox => {
            let Some(record) = store.load::<ChangeBoxRecord>(date, register, catalog)? else {
                bail!("Aucun enregistrement boîte #{} pour {}", register, date);
            };
            println!("🪙 BOÎTE (ÉCHANGE) #{} — {} — {}", register, date, record.meta.cashier);
            print_ledgers(
                catalog,
                &CHANGE_BOX_HEADERS,
                &[&record.before, &record.deposit, &record.withdrawn, &record.after],
            );
        }
    }

    println!("\n🖨️  {}", store.receipt_path(kind, date, register).display());
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

fn resolve_day(config: &AppConfig, day: &DayArgs) -> Result<(NaiveDate, u8)> {
    if !config.has_register(day.register) {
        bail!(
            "Caisse #{} inconnue (configurées: {:?})",
            day.register,
            config.registers
        );
    }
    Ok((day.date.unwrap_or_else(|| Local::now().date_naive()), day.register))
}

fn read_sheet(path: &Path, catalog: &DenominationCatalog) -> Result<Ledger> {
    load_count_sheet(path, catalog).with_context(|| format!("Failed to read count sheet {}", path.display()))
}

fn status_line(exact: Option<bool>, message: &str) -> String {
    match exact {
        Some(true) => format!("✅ {}", message),
        Some(false) => format!("⚠️  {}", message),
        None => format!("ℹ️  {}", message),
    }
}

fn print_till_view(catalog: &DenominationCatalog, view: &TillView) {
    print_ledgers(
        catalog,
        &TILL_HEADERS,
        &[&view.open, &view.close, &view.withdrawal, &view.restant],
    );
    println!(
        "   OPEN: {}   CLOSE: {}   À retirer: {}",
        format_cents(view.open_total),
        format_cents(view.close_total),
        format_cents(view.to_withdraw_cents.max(0))
    );
    println!("{}", status_line(view.outcome().map(|o| o.is_exact()), &view.message(catalog)));
}

fn ledger_table(catalog: &DenominationCatalog, headers: &[&str], columns: &[&Ledger]) -> Table {
    let receipt = ReceiptTable::from_columns(None, headers, columns, catalog);

    let mut builder = Builder::default();
    builder.set_header(receipt.headers);
    for row in receipt.rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    table
        .with(Style::psql())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()));
    table
}

fn print_ledgers(catalog: &DenominationCatalog, headers: &[&str], columns: &[&Ledger]) {
    println!("{}", ledger_table(catalog, headers, columns));
}

fn report_save(store: &RecordStore, kind: RecordKind, date: NaiveDate, register: u8, written: bool) {
    if written {
        println!("\n💾 Enregistré: {}", store.state_path(kind, date, register).display());
        println!("🖨️  Reçu: {}", store.receipt_path(kind, date, register).display());
    } else {
        info!("nothing changed since last save");
        println!("\n💾 Déjà à jour");
    }
}

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "Libellé")]
    label: String,
    #[tabled(rename = "Valeur")]
    value: String,
    #[tabled(rename = "Groupe")]
    group: String,
}

fn catalog_table(catalog: &DenominationCatalog) -> Table {
    let rows: Vec<CatalogRow> = catalog
        .iter()
        .map(|d| CatalogRow {
            id: d.id.as_str().to_string(),
            label: d.label.clone(),
            value: format_cents(d.face_value),
            group: d.group.as_str().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::psql())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()));
    table
}

fn print_catalog(catalog: &DenominationCatalog) {
    println!("💵 Dénominations ({})", catalog.currency());
    println!("{}", catalog_table(catalog));
}
