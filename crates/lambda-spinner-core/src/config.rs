//! Spinner configuration.
//!
//! Read once per process (or built explicitly) and shared behind an `Arc`.
//! Nothing consults the environment after construction.

use lambda_types::env_utils::{env_bool_or, env_path};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that disables eager singleton creation.
pub const ENV_DISABLE_EAGER_INIT: &str = "LAMBDA_SPINNER_DISABLE_EAGER_INIT";
/// Environment variable that switches to fingerprinted unit names.
pub const ENV_STABLE_NAMES: &str = "LAMBDA_SPINNER_STABLE_NAMES";
/// Environment variable naming the class-file dump directory.
pub const ENV_DUMP_DIR: &str = "LAMBDA_SPINNER_DUMP_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinnerConfig {
    /// Do not instantiate non-capturing lambdas at link time (default: false).
    ///
    /// When true, such units carry a `LAMBDA_INSTANCE$` static field that is
    /// filled by the class initializer on first access, and call sites bind
    /// to its getter.
    pub disable_eager_initialization: bool,

    /// Append a 64-bit fingerprint of the call-site inputs to unit names
    /// (default: false).
    ///
    /// Stable names make generated classes reproducible across runs, which
    /// archiving relies on.
    pub generate_stable_names: bool,

    /// Write every emitted class file below this directory.
    pub dump_dir: Option<PathBuf>,
}

impl SpinnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `LAMBDA_SPINNER_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            disable_eager_initialization: env_bool_or(ENV_DISABLE_EAGER_INIT, false),
            generate_stable_names: env_bool_or(ENV_STABLE_NAMES, false),
            dump_dir: env_path(ENV_DUMP_DIR),
        }
    }

    pub fn with_eager_initialization_disabled(mut self, disabled: bool) -> Self {
        self.disable_eager_initialization = disabled;
        self
    }

    pub fn with_stable_names(mut self, enabled: bool) -> Self {
        self.generate_stable_names = enabled;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }
}
