//! Engine configuration loading: process environment over project `.env`
//! over the user's XDG config file.
//!
//! `load_and_apply` fills the process environment once; after that the
//! engine reads its tunables through the typed `WEFT_*` readers
//! ([`env_u64`] and friends). Nothing here overwrites a variable the
//! operator already set, so `WEFT_NODE_TIMEOUT_MS=5000 cargo run` always
//! wins over both files.
//!
//! The XDG file supports an `[env]` passthrough table and an `[engine]`
//! table of lower-case tunables that map onto their `WEFT_*` variables
//! (`max_nodes = 200` becomes `WEFT_MAX_NODES=200`).

mod dotenv;
mod env_read;
mod xdg_toml;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use env_read::{env_bool, env_f64, env_u32, env_u64};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no config directory on this platform")]
    NoConfigDir,
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    Dotenv(std::io::Error),
}

/// Applies configuration to the process environment with priority:
/// **existing env > project `.env` > XDG `config.toml`**.
///
/// Sources are applied highest-priority first and a key is only ever set
/// when it is still absent, so earlier sources win without any merge
/// bookkeeping.
///
/// * `app_name`: e.g. `"weft"`; selects `~/.config/<app_name>/config.toml`.
/// * `override_dir`: when `Some`, look for `.env` there instead of the
///   current directory.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    for (key, value) in dotenv::read(override_dir).map_err(LoadError::Dotenv)? {
        set_if_absent(&key, value);
    }
    for (key, value) in xdg_toml::read(app_name)? {
        set_if_absent(&key, value);
    }
    Ok(())
}

fn set_if_absent(key: &str, value: String) {
    if std::env::var_os(key).is_none() {
        std::env::set_var(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: A variable already in the process environment is never
    /// clobbered by `.env`.
    #[test]
    fn existing_env_wins_over_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "WEFT_TEST_PRESET=from_dotenv\n").unwrap();
        std::env::set_var("WEFT_TEST_PRESET", "from_env");
        load_and_apply("weft-test-nonexistent", Some(dir.path())).unwrap();
        assert_eq!(std::env::var("WEFT_TEST_PRESET").unwrap(), "from_env");
        std::env::remove_var("WEFT_TEST_PRESET");
    }

    /// **Scenario**: A key absent from the environment is filled from `.env`.
    #[test]
    fn dotenv_fills_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "WEFT_TEST_FILLED=yes\n").unwrap();
        std::env::remove_var("WEFT_TEST_FILLED");
        load_and_apply("weft-test-nonexistent", Some(dir.path())).unwrap();
        assert_eq!(std::env::var("WEFT_TEST_FILLED").unwrap(), "yes");
        std::env::remove_var("WEFT_TEST_FILLED");
    }

    /// **Scenario**: `.env` outranks the XDG `[engine]` table for the same
    /// tunable.
    #[test]
    fn dotenv_beats_xdg_engine_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "WEFT_MAX_NODES_TEST=7\n").unwrap();
        let app_dir = dir.path().join("weft-prec-test");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("config.toml"), "[engine]\nmax_nodes_test = 9\n").unwrap();

        std::env::remove_var("WEFT_MAX_NODES_TEST");
        let prev = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());
        let result = load_and_apply("weft-prec-test", Some(dir.path()));
        match prev {
            Some(p) => std::env::set_var("XDG_CONFIG_HOME", p),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
        result.unwrap();

        assert_eq!(std::env::var("WEFT_MAX_NODES_TEST").unwrap(), "7");
        std::env::remove_var("WEFT_MAX_NODES_TEST");
    }
}
