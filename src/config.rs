// ⚙️ App configuration
//
// Optional TOML file, then environment overrides:
//   TILL_DATA_DIR        → data_dir
//   TILL_TARGET_DOLLARS  → default_target_dollars

use crate::auth::DEFAULT_PASSWORD_ENV;
use crate::catalog::{DenominationCatalog, DenominationId};
use crate::error::{Error, Result};
use crate::session::DEFAULT_TARGET_DOLLARS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "TILL_DATA_DIR";
pub const TARGET_DOLLARS_ENV: &str = "TILL_TARGET_DOLLARS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of records_caisse/ and records_boite/
    pub data_dir: PathBuf,

    pub default_target_dollars: i64,

    /// Register numbers offered to the cashier
    pub registers: Vec<u8>,

    /// Alternative denomination table (JSON); built-in Canadian table if unset
    pub catalog_path: Option<PathBuf>,

    /// Denominations (id or label) the change box hands out by default;
    /// the catalog's own set when empty
    pub change_box_allowed: Vec<String>,

    /// Environment variable holding the shared app password
    pub password_env: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_dir: PathBuf::from("data"),
            default_target_dollars: DEFAULT_TARGET_DOLLARS,
            registers: vec![1, 2, 3],
            catalog_path: None,
            change_box_allowed: Vec::new(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (defaults when absent), then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let contents = std::fs::read_to_string(p).map_err(|e| Error::io(p, e))?;
                Self::from_toml(&contents)?
            }
            Some(p) => {
                return Err(Error::Config(format!("config file not found: {}", p.display())));
            }
            None => AppConfig::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from any key lookup (the process environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(TARGET_DOLLARS_ENV) {
            self.default_target_dollars = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a whole number of dollars, got {:?}", TARGET_DOLLARS_ENV, raw))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.default_target_dollars < 0 {
            return Err(Error::Config("default_target_dollars cannot be negative".into()));
        }
        if self.registers.is_empty() {
            return Err(Error::Config("at least one register is required".into()));
        }
        Ok(())
    }

    pub fn has_register(&self, register: u8) -> bool {
        self.registers.contains(&register)
    }

    pub fn load_catalog(&self) -> Result<DenominationCatalog> {
        match &self.catalog_path {
            Some(path) => DenominationCatalog::from_file(path),
            None => Ok(DenominationCatalog::canadian()),
        }
    }

    /// Configured default allowed set, resolved against `catalog`
    pub fn change_box_allowed(&self, catalog: &DenominationCatalog) -> Result<Option<BTreeSet<DenominationId>>> {
        if self.change_box_allowed.is_empty() {
            return Ok(None);
        }
        self.change_box_allowed
            .iter()
            .map(|key| catalog.resolve(key))
            .collect::<Result<BTreeSet<_>>>()
            .map(Some)
    }
}
