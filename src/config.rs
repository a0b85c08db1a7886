//! Connection settings
//!
//! Defaults mirror a fresh install: a database file in the working directory,
//! foreign keys declared but not enforced, and a bootstrap admin account.

use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "Smartphone screen defect inspection";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_DB_PATH: &str = "smartphone_defects.db";

/// Bootstrap credential seeded into an empty store. Meant to be changed.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_ADMIN_FULL_NAME: &str = "Administrator";

/// Settings used when opening a [`crate::Database`]
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    /// Turn on `PRAGMA foreign_keys` for the connection
    pub enforce_foreign_keys: bool,
    /// Seed the bootstrap admin when the store has none
    pub seed_admin: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            enforce_foreign_keys: false,
            seed_admin: true,
        }
    }
}

impl Config {
    pub fn at<P: AsRef<Path>>(path: P) -> Self {
        Self {
            db_path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_foreign_keys(mut self, enforce: bool) -> Self {
        self.enforce_foreign_keys = enforce;
        self
    }

    pub fn with_seed_admin(mut self, seed: bool) -> Self {
        self.seed_admin = seed;
        self
    }

    /// SQLite in-memory store, used by tests
    pub fn in_memory() -> Self {
        Self::at(":memory:")
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == ":memory:"
    }
}
