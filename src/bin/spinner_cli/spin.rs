use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use lambda_spinner::types::fs_utils::atomic_write;
use lambda_spinner::spinner::{spin_class_bytes, ClassDumper};
use lambda_spinner::request::load_request;

use super::config_with_overrides;
use super::output::{format_unit, UnitSummary};

#[derive(Parser, Debug)]
#[command(about = "Emit the proxy class for a request")]
pub struct SpinCmd {
    /// Request file (JSON)
    request: PathBuf,

    /// Directory to write `<unit name>.class` into; nothing is written without it
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Append the call-site fingerprint to the unit name
    #[arg(long)]
    stable_names: bool,

    /// Emit a lazily initialized singleton field instead of linking eagerly
    #[arg(long)]
    disable_eager_init: bool,
}

impl SpinCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let site = load_request(&self.request)?;
        let config = config_with_overrides(self.stable_names, self.disable_eager_init);
        let unit = spin_class_bytes(&site, &config).map_err(|e| anyhow!(e))?;
        let mut summary = UnitSummary::new(&unit);
        ClassDumper::new(config.dump_dir.clone()).dump(&unit.name, &unit.bytes);

        if let Some(out) = &self.out {
            let mut path = out.clone();
            for segment in unit.name.split('/') {
                path.push(segment);
            }
            path.set_extension("class");
            atomic_write(&path, &unit.bytes)?;
            debug!(unit = %unit.name, path = %path.display(), "wrote class file");
            summary.path = Some(path.display().to_string());
        }

        if json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("serialize unit summary")?
            );
        } else {
            print!("{}", format_unit(&summary));
        }
        Ok(())
    }
}
