use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lambda_spinner::spinner::{fingerprint, unit_name};
use lambda_spinner::request::load_request;

use super::config_with_overrides;

#[derive(Parser, Debug)]
#[command(about = "Show the unit name a request would be given")]
pub struct NameCmd {
    /// Request file (JSON)
    request: PathBuf,

    /// Append the call-site fingerprint to the name
    #[arg(long)]
    stable_names: bool,
}

impl NameCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let site = load_request(&self.request)?;
        let config = config_with_overrides(self.stable_names, false);
        let name = unit_name(&site, &config);
        let fingerprint = format!("{:x}", fingerprint(&site));

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "name": name,
                    "fingerprint": fingerprint,
                    "stable": config.generate_stable_names,
                }))
                .context("serialize name report")?
            );
        } else {
            println!("{}", name);
            println!("  fingerprint: {}", fingerprint);
        }
        Ok(())
    }
}
