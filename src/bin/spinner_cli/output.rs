//! Output formatting for the lambda-spinner CLI

use serde::Serialize;

use lambda_spinner::spinner::{Dispatch, EmittedUnit};

/// Summary of one emitted unit.
#[derive(Debug, Serialize)]
pub struct UnitSummary {
    pub name: String,
    pub size: usize,
    pub dispatch: String,
    pub indirect: bool,
    pub interfaces: Vec<String>,
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl UnitSummary {
    pub fn new(unit: &EmittedUnit) -> Self {
        Self {
            name: unit.name.clone(),
            size: unit.bytes.len(),
            dispatch: dispatch_label(&unit.dispatch),
            indirect: unit.dispatch.indirect,
            interfaces: unit.model.interfaces.clone(),
            methods: unit
                .model
                .methods
                .iter()
                .map(|m| format!("{}{}", m.name, m.ty.descriptor()))
                .collect(),
            path: None,
        }
    }
}

pub fn dispatch_label(dispatch: &Dispatch) -> String {
    format!("{:?}", dispatch.kind).to_lowercase()
}

/// Human-readable unit summary
pub fn format_unit(summary: &UnitSummary) -> String {
    let mut out = format!("\x1b[32m✓\x1b[0m {} ({} bytes)\n", summary.name, summary.size);
    out.push_str(&format!(
        "  dispatch: {}{}\n",
        summary.dispatch,
        if summary.indirect { " via class data" } else { "" }
    ));
    if !summary.interfaces.is_empty() {
        out.push_str(&format!("  implements: {}\n", summary.interfaces.join(", ")));
    }
    for method in &summary.methods {
        out.push_str(&format!("  method: {}\n", method));
    }
    if let Some(path) = &summary.path {
        out.push_str(&format!("  written to: {}\n", path));
    }
    out
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            cause: Option<String>,
        }

        let err = ErrorJson {
            error: error.to_string(),
            cause: error.source().map(|e| e.to_string()),
        };
        let mut out = serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string());
        out.push('\n');
        out
    } else {
        let mut out = format!("\x1b[31mError:\x1b[0m {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        out
    }
}
