use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use lambda_spinner::classfile::{decode_class, disassemble};

#[derive(Parser, Debug)]
#[command(about = "Disassemble a class file")]
pub struct InspectCmd {
    /// Class file to read
    class_file: PathBuf,
}

impl InspectCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let bytes = std::fs::read(&self.class_file)
            .with_context(|| format!("Failed to read {}", self.class_file.display()))?;
        let class = decode_class(&bytes)
            .with_context(|| format!("Failed to decode {}", self.class_file.display()))?;

        if json_output {
            let methods: Vec<_> = class
                .methods
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "name": m.name,
                        "descriptor": m.ty.descriptor(),
                        "instructions": m.code.as_ref().map(|c| c.len()).unwrap_or(0),
                    })
                })
                .collect();
            let fields: Vec<_> = class
                .fields
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "name": f.name,
                        "descriptor": f.ty.descriptor(),
                        "static": f.is_static(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "name": class.name,
                    "super": class.super_class,
                    "interfaces": class.interfaces,
                    "version": class.version,
                    "fields": fields,
                    "methods": methods,
                }))
                .context("serialize class listing")?
            );
        } else {
            print!("{}", disassemble(&class));
        }
        Ok(())
    }
}
