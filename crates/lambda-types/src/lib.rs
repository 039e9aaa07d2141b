//! Shared types for the lambda-spinner workspace.
//!
//! This crate holds the JVM type model every other crate speaks:
//! - [`JavaType`] / [`PrimitiveKind`] / [`ValueKind`] - field types and their descriptor forms
//! - [`MethodType`] - method descriptors and qualified signatures
//! - [`ImplMethod`] / [`InvocationKind`] - the resolved implementation a lambda forwards to
//! - [`CallSiteSpec`] - the full set of inputs of one lambda creation call

pub mod call_site;
pub mod env_utils;
pub mod fs_utils;
pub mod java_type;
pub mod member;
pub mod method_type;

pub use call_site::CallSiteSpec;
pub use java_type::{
    JavaType, PrimitiveKind, TypeParseError, ValueKind, NUMBER_CLASS, OBJECT_CLASS, STRING_CLASS,
};
pub use member::{
    package_of, CallerClass, FunctionalInterface, ImplMethod, InvocationKind, MemberAccess,
};
pub use method_type::MethodType;
