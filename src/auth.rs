// 🔐 Password Gate - Shared app password in front of every operation
//
// The expected password comes from the environment (TILL_APP_PASSWORD by
// default). Only its SHA-256 digest is kept in memory. With no password
// configured, nobody can log in.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

pub const DEFAULT_PASSWORD_ENV: &str = "TILL_APP_PASSWORD";

/// Anything that can say whether the current caller is allowed through
pub trait Authenticator {
    fn is_authenticated(&self) -> bool;

    /// `Err(Error::Unauthenticated)` unless logged in
    fn require(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(Error::Unauthenticated)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordGate {
    expected_digest: Option<[u8; 32]>,
    authenticated: bool,
}

fn digest(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

impl PasswordGate {
    /// Gate expecting `password`; blank means "no password configured"
    pub fn new(password: Option<&str>) -> Self {
        PasswordGate {
            expected_digest: password
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(digest),
            authenticated: false,
        }
    }

    /// Read the expected password from `var`
    pub fn from_env(var: &str) -> Self {
        let password = std::env::var(var).ok();
        let gate = Self::new(password.as_deref());
        if !gate.is_configured() {
            warn!(env = var, "no app password configured, login disabled");
        }
        gate
    }

    pub fn is_configured(&self) -> bool {
        self.expected_digest.is_some()
    }

    pub fn login(&mut self, attempt: &str) -> bool {
        let ok = match &self.expected_digest {
            Some(expected) => digest(attempt.trim()) == *expected,
            None => false,
        };
        self.authenticated = ok;
        if ok {
            info!("login accepted");
        } else {
            warn!("login rejected");
        }
        ok
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }
}

impl Authenticator for PasswordGate {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
