//! User-level settings from `$XDG_CONFIG_HOME/<app>/config.toml`.
//!
//! Two tables feed the environment:
//!
//! ```toml
//! [engine]                 # lower-case tunables, mapped to WEFT_* vars
//! max_nodes = 200          # -> WEFT_MAX_NODES=200
//! execution_timeout_ms = 60000
//!
//! [env]                    # passthrough for anything else
//! OPENAI_API_KEY = "sk-..."
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::LoadError;

#[derive(serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    engine: BTreeMap<String, toml::Value>,
}

fn config_path(app_name: &str) -> Result<Option<PathBuf>, LoadError> {
    // An explicit XDG_CONFIG_HOME wins (and makes the lookup testable);
    // otherwise fall back to the platform config dir.
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir().ok_or(LoadError::NoConfigDir)?,
    };
    let path = base.join(app_name).join("config.toml");
    Ok(path.is_file().then_some(path))
}

/// Reads both tables into one env-shaped map. Missing file reads as no
/// overrides; `[engine]` keys are upper-cased and prefixed with `WEFT_`.
pub fn read(app_name: &str) -> Result<BTreeMap<String, String>, LoadError> {
    let Some(path) = config_path(app_name)? else {
        return Ok(BTreeMap::new());
    };
    let content = std::fs::read_to_string(&path).map_err(|source| LoadError::Read {
        path: path.clone(),
        source,
    })?;
    let parsed: ConfigFile = toml::from_str(&content)?;

    let mut out = parsed.env;
    for (key, value) in parsed.engine {
        let value = match value {
            toml::Value::String(s) => s,
            other => other.to_string(),
        };
        out.insert(format!("WEFT_{}", key.to_ascii_uppercase()), value);
    }
    Ok(out)
}
