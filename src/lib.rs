//! Lambda proxy-class spinner
//!
//! Synthesizes the classes behind JVM lambda expressions and method
//! references:
//!
//! - **Validation**: shape checks on a creation call ([`spinner::validate`])
//! - **Synthesis**: proxy class emission and naming ([`spinner::spin_class_bytes`])
//! - **Linkage**: call sites backed by a loader ([`spinner::LambdaMetafactory`])
//! - **Runtime**: an in-process loader and interpreter ([`runtime`])
//! - **Archive**: reuse of spun classes across runs ([`archive`])
//!
//! See [`request`] for the JSON form of a creation call used by the CLI.

pub mod request;

pub use lambda_archive as archive;
pub use lambda_classfile as classfile;
pub use lambda_runtime as runtime;
pub use lambda_spinner_core as spinner;
pub use lambda_types as types;

use std::sync::Arc;

use lambda_runtime::{InProcessLoader, Runtime};
use lambda_spinner_core::{LambdaMetafactory, SpinnerConfig};

/// A metafactory that defines units in this process.
pub type InProcessMetafactory = LambdaMetafactory<InProcessLoader>;

/// Build an [`InProcessMetafactory`] over `runtime`.
pub fn in_process_metafactory(config: SpinnerConfig, runtime: Arc<Runtime>) -> InProcessMetafactory {
    LambdaMetafactory::new(Arc::new(config), Arc::new(InProcessLoader::new(runtime)))
}
