//! Loader protocol: defining a spun unit in a live process and linking to it.
//!
//! The spinner never executes code itself. A [`ProxyLoader`] turns class
//! bytes into a [`LoadedUnit`], which hands out [`UnitHandle`]s for its
//! constructor and its singleton getter.

use anyhow::Result;
use lambda_types::{ImplMethod, JavaType, MethodType};
use std::fmt::Display;
use std::sync::Arc;

/// Everything needed to define one hidden unit.
#[derive(Debug, Clone, Copy)]
pub struct DefineRequest<'a> {
    /// Requested name; the loader may append a suffix to keep it unique.
    pub name: &'a str,
    pub bytes: &'a [u8],
    /// Implementation reachable through `MethodHandles.classData`, for units
    /// that dispatch indirectly.
    pub class_data: Option<&'a ImplMethod>,
    /// Run the static initializer at definition time rather than on first use.
    pub initialize: bool,
}

pub trait ProxyLoader: Send + Sync {
    type Unit: LoadedUnit;

    fn define_hidden(&self, request: DefineRequest<'_>) -> Result<Arc<Self::Unit>>;
}

/// A defined unit.
pub trait LoadedUnit: Send + Sync + 'static {
    type Handle: UnitHandle;

    /// Name as defined, including any loader suffix.
    fn name(&self) -> &str;

    /// The bytes the unit was defined from.
    fn class_bytes(&self) -> &[u8];

    /// Handle that allocates an instance through the constructor of type `ty`.
    fn find_constructor(&self, ty: &MethodType) -> Result<Self::Handle>;

    /// Handle that reads the static field `name` of type `ty`.
    fn find_static_getter(&self, name: &str, ty: &JavaType) -> Result<Self::Handle>;
}

/// Something callable produced by a loaded unit.
pub trait UnitHandle: Clone + Send + Sync {
    type Value: Clone + Send + Sync;
    type Error: Display;

    fn invoke(&self, args: &[Self::Value]) -> Result<Self::Value, Self::Error>;
}

/// Value type produced by a unit's handles.
pub type UnitValue<U> = <<U as LoadedUnit>::Handle as UnitHandle>::Value;
