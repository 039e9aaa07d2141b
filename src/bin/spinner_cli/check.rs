use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lambda_spinner::spinner::validate;
use lambda_spinner::request::load_request;

#[derive(Parser, Debug)]
#[command(about = "Validate a creation-call request")]
pub struct CheckCmd {
    /// Request file (JSON)
    request: PathBuf,
}

impl CheckCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let site = load_request(&self.request)?;
        let outcome = validate(&site);

        if json_output {
            let report = match &outcome {
                Ok(()) => serde_json::json!({
                    "valid": true,
                    "interface_method": format!("{}.{}", site.interface.name, site.interface_method_name),
                }),
                Err(e) => serde_json::json!({
                    "valid": false,
                    "interface_method": format!("{}.{}", site.interface.name, site.interface_method_name),
                    "error": e.to_string(),
                }),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize check report")?
            );
        } else if outcome.is_ok() {
            println!(
                "\x1b[32m✓\x1b[0m {}.{} is a valid creation call",
                site.interface.name, site.interface_method_name
            );
        }

        outcome.map_err(|e| anyhow!(e))
    }
}
