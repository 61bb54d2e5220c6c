//! Typed environment readers for engine tunables.
//!
//! Each reader returns the default when the variable is unset or does not
//! parse; a malformed value is not an error at this layer.

/// Reads a `u64` from the environment, falling back to `default`.
pub fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads a `u32` from the environment, falling back to `default`.
pub fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads an `f64` from the environment, falling back to `default`.
pub fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads a boolean from the environment. Accepts `1/0`, `true/false`,
/// `yes/no`, `on/off` (case-insensitive); anything else yields the default.
pub fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_parses_and_defaults() {
        std::env::set_var("WEFT_ENV_READ_U64", "120000");
        assert_eq!(env_u64("WEFT_ENV_READ_U64", 7), 120_000);
        std::env::set_var("WEFT_ENV_READ_U64", "not-a-number");
        assert_eq!(env_u64("WEFT_ENV_READ_U64", 7), 7);
        std::env::remove_var("WEFT_ENV_READ_U64");
        assert_eq!(env_u64("WEFT_ENV_READ_U64", 7), 7);
    }

    #[test]
    fn bool_accepts_common_spellings() {
        std::env::set_var("WEFT_ENV_READ_BOOL", "on");
        assert!(env_bool("WEFT_ENV_READ_BOOL", false));
        std::env::set_var("WEFT_ENV_READ_BOOL", "No");
        assert!(!env_bool("WEFT_ENV_READ_BOOL", true));
        std::env::set_var("WEFT_ENV_READ_BOOL", "maybe");
        assert!(env_bool("WEFT_ENV_READ_BOOL", true));
        std::env::remove_var("WEFT_ENV_READ_BOOL");
    }
}
