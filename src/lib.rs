// Till Reconcile - Core Library
// Cash-register end-of-day reconciliation: denomination ledgers, the greedy
// withdrawal solver, till and change-box sessions, and daily record storage.

pub mod auth;       // Password gate
pub mod catalog;    // Denomination table (rules as data)
pub mod config;     // TOML + env configuration
pub mod counts;     // Count sheets (CSV) and raw input coercion
pub mod error;
pub mod ledger;     // Count per denomination
pub mod pins;       // Cashier-locked withdrawal counts
pub mod receipt;    // Printable HTML receipts
pub mod record;     // Persisted daily records + content hash
pub mod session;    // Till and change-box sessions
pub mod solver;     // Greedy constrained withdrawal
pub mod store;      // JSON/HTML files per register per day

// Re-export commonly used types
pub use auth::{Authenticator, PasswordGate};
pub use catalog::{
    format_cents, format_dollars, Denomination, DenominationCatalog, DenominationGroup,
    DenominationId, PriorityOrder,
};
pub use config::AppConfig;
pub use counts::{load_count_sheet, parse_count, parse_pin_spec, read_count_sheet};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use pins::{clamp_pins, PinSet};
pub use receipt::{change_box_receipt, till_receipt};
pub use record::{
    ChangeBoxRecord, DailyRecord, OpeningMode, RecordKind, RecordMeta, TillDayRecord, TillRecord,
};
pub use session::{
    derive_till_view, ChangeBoxSession, ChangeBoxStatus, ChangeBoxView, ReconciliationSession,
    SessionView, Sheet, TillStatus, TillView, DEFAULT_TARGET_DOLLARS,
};
pub use solver::{SolveOutcome, Withdrawal, WithdrawalSolver};
pub use store::{RecordStore, SaveOutcome, SavedEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
