//! CLI subcommand implementations for lambda-spinner

pub mod check;
pub mod inspect;
pub mod name;
pub mod output;
pub mod spin;

use lambda_spinner::spinner::SpinnerConfig;

/// Environment defaults with command-line overrides applied on top.
pub fn config_with_overrides(stable_names: bool, disable_eager_init: bool) -> SpinnerConfig {
    let config = SpinnerConfig::from_env();
    let stable = config.generate_stable_names || stable_names;
    let lazy = config.disable_eager_initialization || disable_eager_init;
    config
        .with_stable_names(stable)
        .with_eager_initialization_disabled(lazy)
}
