//! Archive protocol for reusing spun units across runs.
//!
//! An archive is an optimization only: a miss, or an archive that fails,
//! falls back to emitting the unit.

use anyhow::Result;
use lambda_types::CallSiteSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::loader::LoadedUnit;
use crate::naming::fingerprint;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveMode {
    #[default]
    Disabled,
    /// Look units up before emitting.
    Share,
    /// Record every emitted unit.
    Dump,
}

/// Full identity of a call site: every input that affects the emitted unit.
///
/// Equality compares the canonical rendering, never just the fingerprint,
/// so colliding fingerprints cannot alias two sites.
#[derive(Debug, Clone)]
pub struct UnitKey {
    pub site: CallSiteSpec,
    pub fingerprint: u64,
    canonical: String,
}

impl UnitKey {
    pub fn new(site: &CallSiteSpec) -> Self {
        Self {
            fingerprint: fingerprint(site),
            canonical: canonical_form(site),
            site: site.clone(),
        }
    }

    /// One line per input, in a fixed order.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for UnitKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for UnitKey {}

impl Hash for UnitKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}{} -> {} [{:016x}]",
            self.site.caller.name,
            self.site.interface_method_name,
            self.site.interface_method_type,
            self.site.implementation,
            self.fingerprint
        )
    }
}

fn canonical_form(site: &CallSiteSpec) -> String {
    let implementation = &site.implementation;
    let mut lines = vec![
        format!("caller {} hidden={}", site.caller.name, site.caller.hidden),
        format!("method {}", site.interface_method_name),
        format!("factory {}", site.factory_type),
        format!(
            "interface {} serializable={}",
            site.interface.name, site.interface.serializable
        ),
        format!("erased {}", site.interface_method_type),
        format!(
            "impl {:?} {:?} {}.{}{} interface={}",
            implementation.kind,
            implementation.access,
            implementation.declaring_class,
            implementation.name,
            implementation.method_type,
            implementation.declaring_is_interface
        ),
        format!("dynamic {}", site.dynamic_method_type),
        format!("serializable {}", site.serializable),
    ];
    for alt in &site.alt_interfaces {
        lines.push(format!("alt-interface {} serializable={}", alt.name, alt.serializable));
    }
    for alt in &site.alt_methods {
        lines.push(format!("alt-method {}", alt));
    }
    lines.join("\n")
}

/// Persistent store of spun units.
pub trait ProxyArchive<U: LoadedUnit>: Send + Sync {
    fn mode(&self) -> ArchiveMode;

    /// Define and return the archived unit for `key`, if there is one.
    fn find(&self, key: &UnitKey) -> Result<Option<Arc<U>>>;

    /// Record a freshly defined unit under `key`.
    fn register(&self, key: &UnitKey, unit: &Arc<U>) -> Result<()>;
}

/// Archive that never hits and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArchive;

impl<U: LoadedUnit> ProxyArchive<U> for NoArchive {
    fn mode(&self) -> ArchiveMode {
        ArchiveMode::Disabled
    }

    fn find(&self, _key: &UnitKey) -> Result<Option<Arc<U>>> {
        Ok(None)
    }

    fn register(&self, _key: &UnitKey, _unit: &Arc<U>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_types::{
        CallerClass, FunctionalInterface, ImplMethod, InvocationKind, MemberAccess, MethodType,
    };

    fn site() -> CallSiteSpec {
        CallSiteSpec::new(
            CallerClass::new("com.acme.Main"),
            FunctionalInterface::new("java/lang/Runnable"),
            "run",
            MethodType::void(),
            vec![],
            ImplMethod::new("com/acme/Main", "lambda$main$0", MethodType::void(), InvocationKind::Static),
        )
    }

    #[test]
    fn test_key_equality_uses_all_inputs() {
        let a = UnitKey::new(&site());
        let b = UnitKey::new(&site());
        assert_eq!(a, b);
        assert_eq!(a.fingerprint, b.fingerprint);

        // Access does not enter the fingerprint but does change the unit.
        let mut other = site();
        other.implementation = other.implementation.with_access(MemberAccess::Protected);
        let c = UnitKey::new(&other);
        assert_eq!(a.fingerprint, c.fingerprint);
        assert_ne!(a, c);
    }

    #[test]
    fn test_canonical_form_lines() {
        let key = UnitKey::new(&site().with_alt_method(MethodType::void()));
        let lines: Vec<&str> = key.canonical().lines().collect();
        assert_eq!(lines[0], "caller com.acme.Main hidden=false");
        assert_eq!(lines[2], "factory ()Ljava/lang/Runnable;");
        assert_eq!(lines.last(), Some(&"alt-method ()V"));
    }
}
