//! Lambda proxy-class synthesis.
//!
//! Given the inputs of one lambda creation call ([`lambda_types::CallSiteSpec`]),
//! this crate validates them, spins a class implementing the functional
//! interface, hands the bytes to a [`ProxyLoader`] and links a [`CallSite`].
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Spinner flags, read once from the environment |
//! | [`validation`] | Contract checks run before anything is emitted |
//! | [`conversion`] | Argument/return adaptation plans |
//! | [`naming`] | Unit names and call-site fingerprints |
//! | [`emitter`] | Class model construction and encoding |
//! | [`loader`] | Traits a runtime implements to define and link units |
//! | [`registry`] | In-process sharing of cache-eligible units |
//! | [`archive`] | Cross-run reuse protocol |
//! | [`dump`] | Debug dump of emitted class files |
//! | [`metafactory`] | The creation call itself |

pub mod archive;
pub mod config;
pub mod conversion;
pub mod dump;
pub mod emitter;
pub mod error;
pub mod loader;
pub mod metafactory;
pub mod naming;
pub mod registry;
pub mod validation;

pub use archive::{ArchiveMode, NoArchive, ProxyArchive, UnitKey};
pub use config::SpinnerConfig;
pub use conversion::{plan_conversion, Conversion, ConversionPlan};
pub use dump::ClassDumper;
pub use emitter::{emit_unit, Dispatch, EmittedUnit, LAMBDA_INSTANCE_FIELD};
pub use error::LambdaConversionError;
pub use loader::{DefineRequest, LoadedUnit, ProxyLoader, UnitHandle, UnitValue};
pub use metafactory::{spin_class_bytes, CallSite, LambdaMetafactory};
pub use naming::{fingerprint, simple_name, stable_name, unit_name};
pub use registry::{ProxyRegistry, RegisteredUnit};
pub use validation::validate;
