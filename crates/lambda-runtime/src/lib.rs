//! In-process loader and interpreter for synthesized lambda proxy classes.
//!
//! The spinner produces class bytes; this crate gives them somewhere to run:
//!
//! ```text
//! InProcessLoader::define_hidden ── decode_class ──► HiddenUnit (name/0x<seq>)
//!        │                                              │
//!        └── <clinit> now or on first static access     ├─ RuntimeHandle (ctor / getter)
//!                                                       └─ interp::execute ──► Runtime natives
//! ```
//!
//! Library calls made by proxy classes (boxing, `Object.<init>`,
//! `SerializedLambda`, exceptions) are host natives installed by
//! [`Runtime::new`]. Implementation methods are registered by the embedder
//! with [`Runtime::register_native`].

mod interp;
pub mod natives;
pub mod runtime;
pub mod trap;
pub mod unit;
pub mod value;

pub use natives::{display_string, SerializedLambda};
pub use runtime::{ClassDecl, NativeFn, NativeKey, Runtime};
pub use trap::Trap;
pub use unit::{HiddenUnit, InProcessLoader, RuntimeHandle};
pub use value::{Instance, Object, ObjectRef, Value};
