//! Environment variable parsing utilities.
//!
//! # Example
//!
//! ```
//! use lambda_types::env_utils::{env_bool_or, env_path};
//!
//! let stable = env_bool_or("MY_STABLE_NAMES", false);
//! let dump_dir = env_path("MY_DUMP_DIR");
//! # let _ = (stable, dump_dir);
//! ```

use std::path::PathBuf;

/// Interpret an environment value as a boolean flag.
///
/// A set variable is true unless it is `0`, `false`, `no` or `off`
/// (case-insensitive); an empty value counts as true, like a bare
/// `-Dflag` system property.
pub fn parse_flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    !matches!(normalized.as_str(), "0" | "false" | "no" | "off")
}

/// Read a boolean flag with a default for the unset case.
pub fn env_bool_or(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => parse_flag(&value),
        Err(_) => default,
    }
}

/// Read a non-empty path from the environment.
pub fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag(""));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" Off "));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn test_env_bool_or() {
        std::env::set_var("LAMBDA_TYPES_TEST_FLAG", "no");
        assert!(!env_bool_or("LAMBDA_TYPES_TEST_FLAG", true));
        std::env::remove_var("LAMBDA_TYPES_TEST_FLAG");
        assert!(env_bool_or("LAMBDA_TYPES_TEST_FLAG", true));
        assert!(!env_bool_or("LAMBDA_TYPES_TEST_FLAG", false));
    }

    #[test]
    fn test_env_path() {
        std::env::set_var("LAMBDA_TYPES_TEST_PATH", "/tmp/dumps");
        assert_eq!(
            env_path("LAMBDA_TYPES_TEST_PATH"),
            Some(PathBuf::from("/tmp/dumps"))
        );
        std::env::set_var("LAMBDA_TYPES_TEST_PATH", "");
        assert_eq!(env_path("LAMBDA_TYPES_TEST_PATH"), None);
        std::env::remove_var("LAMBDA_TYPES_TEST_PATH");
    }
}
