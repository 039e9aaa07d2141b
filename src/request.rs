//! Creation-call request files.
//!
//! A request is the JSON form of [`CallSiteSpec`]; types are written as JVM
//! descriptors:
//!
//! ```json
//! {
//!   "caller": { "name": "com.acme.Main" },
//!   "interface_method_name": "apply",
//!   "factory_type": "()Ljava/util/function/IntFunction;",
//!   "interface": { "name": "java/util/function/IntFunction" },
//!   "interface_method_type": "(I)Ljava/lang/Object;",
//!   "implementation": {
//!     "declaring_class": "java/lang/String",
//!     "name": "valueOf",
//!     "method_type": "(I)Ljava/lang/String;",
//!     "kind": "static"
//!   },
//!   "dynamic_method_type": "(I)Ljava/lang/String;"
//! }
//! ```

use anyhow::{Context, Result};
use std::path::Path;

use lambda_types::CallSiteSpec;

/// Parse a request from JSON text.
pub fn parse_request(json: &str) -> Result<CallSiteSpec> {
    serde_json::from_str(json).context("Failed to parse call-site request")
}

/// Read and parse a request file.
pub fn load_request(path: &Path) -> Result<CallSiteSpec> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    parse_request(&json).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_defaults() -> Result<()> {
        let site = parse_request(
            r#"{
                "caller": { "name": "com.acme.Main" },
                "interface_method_name": "run",
                "factory_type": "()Ljava/lang/Runnable;",
                "interface": { "name": "java/lang/Runnable" },
                "interface_method_type": "()V",
                "implementation": {
                    "declaring_class": "com/acme/Main",
                    "name": "lambda$main$0",
                    "method_type": "()V",
                    "kind": "static",
                    "access": "private"
                },
                "dynamic_method_type": "()V"
            }"#,
        )?;
        assert_eq!(site.interface_method_name, "run");
        assert!(site.alt_interfaces.is_empty());
        assert!(!site.caller.hidden);
        Ok(())
    }

    #[test]
    fn test_bad_descriptor_is_reported() {
        let err = parse_request(
            r#"{
                "caller": { "name": "com.acme.Main" },
                "interface_method_name": "run",
                "factory_type": "not a descriptor",
                "interface": { "name": "java/lang/Runnable" },
                "interface_method_type": "()V",
                "implementation": {
                    "declaring_class": "com/acme/Main",
                    "name": "run",
                    "method_type": "()V",
                    "kind": "static"
                },
                "dynamic_method_type": "()V"
            }"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse call-site request"));
    }
}
