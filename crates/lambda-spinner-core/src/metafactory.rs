//! The lambda creation call: validate, spin (or reuse), define, link.
//!
//! ```text
//! metafactory(site)
//!   ├─ validate                       ContractViolation on bad shapes
//!   ├─ cache-eligible?  ── registry ── archive (share) ── hit ─┐
//!   ├─ emit_unit  ─ dump  ─ define_hidden  ─ register (dump) ─┤
//!   └─ link  ◄────────────────────────────────────────────────┘
//!        zero captures, eager   → Constant(singleton)
//!        zero captures, lazy    → LazySingleton(getter of LAMBDA_INSTANCE$)
//!        captures               → Factory(constructor)
//! ```
//!
//! Only sites with eager initialization and direct dispatch are cached: the
//! registry shares their unit and singleton, and the archive sees them.

use std::sync::Arc;
use tracing::{debug, warn};

use lambda_types::{CallSiteSpec, JavaType};

use crate::archive::{ArchiveMode, NoArchive, ProxyArchive, UnitKey};
use crate::config::SpinnerConfig;
use crate::dump::ClassDumper;
use crate::emitter::{emit_unit, Dispatch, EmittedUnit, LAMBDA_INSTANCE_FIELD};
use crate::error::LambdaConversionError;
use crate::loader::{DefineRequest, LoadedUnit, ProxyLoader, UnitHandle};
use crate::naming::unit_name;
use crate::registry::{ProxyRegistry, RegisteredUnit};
use crate::validation::validate;

/// A linked creation site.
#[derive(Clone)]
pub enum CallSite<H: UnitHandle> {
    /// One instance shared by every evaluation.
    Constant(H::Value),
    /// Getter of the lazily created singleton.
    LazySingleton(H),
    /// Constructor taking the captured values; a new instance per evaluation.
    Factory(H),
}

impl<H: UnitHandle> CallSite<H> {
    /// Evaluate the site, producing a functional-interface instance.
    pub fn instance(&self, captures: &[H::Value]) -> Result<H::Value, H::Error> {
        match self {
            CallSite::Constant(value) => Ok(value.clone()),
            CallSite::LazySingleton(getter) => getter.invoke(&[]),
            CallSite::Factory(constructor) => constructor.invoke(captures),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, CallSite::Constant(_))
    }
}

/// Validate and emit without defining anything.
pub fn spin_class_bytes(
    site: &CallSiteSpec,
    config: &SpinnerConfig,
) -> Result<EmittedUnit, LambdaConversionError> {
    validate(site)?;
    let name = unit_name(site, config);
    emit_unit(site, &name, config.disable_eager_initialization)
}

type Handle<L> = <<L as ProxyLoader>::Unit as LoadedUnit>::Handle;

pub struct LambdaMetafactory<L: ProxyLoader> {
    config: Arc<SpinnerConfig>,
    loader: Arc<L>,
    archive: Arc<dyn ProxyArchive<L::Unit>>,
    registry: ProxyRegistry<L::Unit>,
    dumper: ClassDumper,
}

impl<L: ProxyLoader> LambdaMetafactory<L> {
    pub fn new(config: Arc<SpinnerConfig>, loader: Arc<L>) -> Self {
        let dumper = ClassDumper::new(config.dump_dir.clone());
        Self {
            config,
            loader,
            archive: Arc::new(NoArchive),
            registry: ProxyRegistry::new(),
            dumper,
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn ProxyArchive<L::Unit>>) -> Self {
        self.archive = archive;
        self
    }

    pub fn config(&self) -> &SpinnerConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<L> {
        &self.loader
    }

    pub fn registry(&self) -> &ProxyRegistry<L::Unit> {
        &self.registry
    }

    /// Link a lambda creation site.
    pub fn metafactory(
        &self,
        site: &CallSiteSpec,
    ) -> Result<CallSite<Handle<L>>, LambdaConversionError> {
        validate(site)?;
        let dispatch = Dispatch::resolve(site);
        let cache_eligible = !self.config.disable_eager_initialization && !dispatch.indirect;

        if !cache_eligible {
            let unit = self.generate(site, dispatch)?;
            return self.link_fresh(site, &unit);
        }

        let key = UnitKey::new(site);
        if let Some(registered) = self.registry.get(&key) {
            debug!(unit = %registered.unit.name(), "reusing registered proxy class");
            return self.link_shared(site, &registered);
        }

        if self.archive.mode() == ArchiveMode::Share {
            match self.archive.find(&key) {
                Ok(Some(unit)) => {
                    debug!(unit = %unit.name(), key = %key, "proxy class found in archive");
                    let registered = self.registry.insert_if_absent(key, unit);
                    return self.link_shared(site, &registered);
                }
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "archive lookup failed"),
            }
        }

        let unit = self.generate(site, dispatch)?;
        let registered = self.registry.insert_if_absent(key.clone(), unit);
        if self.archive.mode() == ArchiveMode::Dump {
            if let Err(e) = self.archive.register(&key, &registered.unit) {
                warn!(key = %key, error = %e, "failed to archive proxy class");
            }
        }
        self.link_shared(site, &registered)
    }

    fn generate(
        &self,
        site: &CallSiteSpec,
        dispatch: Dispatch,
    ) -> Result<Arc<L::Unit>, LambdaConversionError> {
        let name = unit_name(site, &self.config);
        debug!(unit = %name, implementation = %site.implementation, "spinning proxy class");
        let emitted = emit_unit(site, &name, self.config.disable_eager_initialization)?;
        self.dumper.dump(&emitted.name, &emitted.bytes);

        let request = DefineRequest {
            name: &emitted.name,
            bytes: &emitted.bytes,
            class_data: dispatch.indirect.then_some(&site.implementation),
            initialize: !self.config.disable_eager_initialization,
        };
        self.loader
            .define_hidden(request)
            .map_err(|e| LambdaConversionError::internal(&emitted.name, format!("{:#}", e)))
    }

    fn link_fresh(
        &self,
        site: &CallSiteSpec,
        unit: &Arc<L::Unit>,
    ) -> Result<CallSite<Handle<L>>, LambdaConversionError> {
        if site.capture_arity() == 0 && self.config.disable_eager_initialization {
            let getter = unit
                .find_static_getter(LAMBDA_INSTANCE_FIELD, &site.interface.as_type())
                .map_err(|e| {
                    LambdaConversionError::linkage(
                        unit.name(),
                        format!("Exception finding {} static field: {:#}", LAMBDA_INSTANCE_FIELD, e),
                    )
                })?;
            return Ok(CallSite::LazySingleton(getter));
        }
        let constructor = self.constructor(site, unit)?;
        if site.capture_arity() == 0 {
            let instance = self.instantiate(unit, &constructor)?;
            Ok(CallSite::Constant(instance))
        } else {
            Ok(CallSite::Factory(constructor))
        }
    }

    fn link_shared(
        &self,
        site: &CallSiteSpec,
        registered: &RegisteredUnit<L::Unit>,
    ) -> Result<CallSite<Handle<L>>, LambdaConversionError> {
        let unit = &registered.unit;
        let constructor = self.constructor(site, unit)?;
        if site.capture_arity() > 0 {
            return Ok(CallSite::Factory(constructor));
        }
        if let Some(existing) = registered.singleton.get() {
            return Ok(CallSite::Constant(existing.clone()));
        }
        let instance = self.instantiate(unit, &constructor)?;
        Ok(CallSite::Constant(
            registered.singleton.get_or_init(|| instance).clone(),
        ))
    }

    fn constructor(
        &self,
        site: &CallSiteSpec,
        unit: &Arc<L::Unit>,
    ) -> Result<Handle<L>, LambdaConversionError> {
        unit.find_constructor(&site.factory_type.with_return(JavaType::Void))
            .map_err(|e| {
                LambdaConversionError::linkage(
                    unit.name(),
                    format!("Exception finding constructor: {:#}", e),
                )
            })
    }

    fn instantiate(
        &self,
        unit: &Arc<L::Unit>,
        constructor: &Handle<L>,
    ) -> Result<<Handle<L> as UnitHandle>::Value, LambdaConversionError> {
        constructor.invoke(&[]).map_err(|e| {
            LambdaConversionError::linkage(
                unit.name(),
                format!("Exception instantiating lambda object: {}", e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use lambda_types::{
        CallerClass, FunctionalInterface, ImplMethod, InvocationKind, MethodType,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[derive(Clone)]
    enum FakeHandle {
        Constructor(Arc<AtomicU64>),
        Getter,
        Failing,
    }

    impl UnitHandle for FakeHandle {
        type Value = u64;
        type Error = String;

        fn invoke(&self, _args: &[u64]) -> Result<u64, String> {
            match self {
                FakeHandle::Constructor(next) => Ok(next.fetch_add(1, Ordering::SeqCst)),
                FakeHandle::Getter => Ok(u64::MAX),
                FakeHandle::Failing => Err("java/lang/ExceptionInInitializerError".into()),
            }
        }
    }

    struct FakeUnit {
        name: String,
        bytes: Vec<u8>,
        next_instance: Arc<AtomicU64>,
        failing_constructor: bool,
    }

    impl LoadedUnit for FakeUnit {
        type Handle = FakeHandle;

        fn name(&self) -> &str {
            &self.name
        }

        fn class_bytes(&self) -> &[u8] {
            &self.bytes
        }

        fn find_constructor(&self, _ty: &MethodType) -> Result<FakeHandle> {
            if self.failing_constructor {
                Ok(FakeHandle::Failing)
            } else {
                Ok(FakeHandle::Constructor(Arc::clone(&self.next_instance)))
            }
        }

        fn find_static_getter(&self, name: &str, _ty: &JavaType) -> Result<FakeHandle> {
            if name == LAMBDA_INSTANCE_FIELD {
                Ok(FakeHandle::Getter)
            } else {
                bail!("no static field {}", name)
            }
        }
    }

    #[derive(Default)]
    struct FakeLoader {
        defined: AtomicUsize,
        saw_class_data: AtomicUsize,
        failing_constructor: bool,
    }

    impl ProxyLoader for FakeLoader {
        type Unit = FakeUnit;

        fn define_hidden(&self, request: DefineRequest<'_>) -> Result<Arc<FakeUnit>> {
            let seq = self.defined.fetch_add(1, Ordering::SeqCst);
            if request.class_data.is_some() {
                self.saw_class_data.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Arc::new(FakeUnit {
                name: format!("{}/0x{:x}", request.name, seq),
                bytes: request.bytes.to_vec(),
                next_instance: Arc::new(AtomicU64::new(1)),
                failing_constructor: self.failing_constructor,
            }))
        }
    }

    struct MapArchive {
        mode: ArchiveMode,
        units: Mutex<HashMap<UnitKey, Arc<FakeUnit>>>,
    }

    impl MapArchive {
        fn new(mode: ArchiveMode) -> Self {
            Self {
                mode,
                units: Mutex::new(HashMap::new()),
            }
        }
    }

    impl ProxyArchive<FakeUnit> for MapArchive {
        fn mode(&self) -> ArchiveMode {
            self.mode
        }

        fn find(&self, key: &UnitKey) -> Result<Option<Arc<FakeUnit>>> {
            Ok(self.units.lock().get(key).cloned())
        }

        fn register(&self, key: &UnitKey, unit: &Arc<FakeUnit>) -> Result<()> {
            self.units.lock().insert(key.clone(), Arc::clone(unit));
            Ok(())
        }
    }

    fn mt(descriptor: &str) -> MethodType {
        MethodType::parse_descriptor(descriptor).unwrap()
    }

    fn supplier_site(captures: Vec<JavaType>) -> CallSiteSpec {
        let impl_params = captures.clone();
        CallSiteSpec::new(
            CallerClass::new("com.acme.Main"),
            FunctionalInterface::new("java/util/function/Supplier"),
            "get",
            mt("()Ljava/lang/Object;"),
            captures,
            ImplMethod::new(
                "com/acme/Main",
                "lambda$main$0",
                MethodType::new(impl_params, JavaType::string()),
                InvocationKind::Static,
            ),
        )
    }

    fn factory(config: SpinnerConfig) -> LambdaMetafactory<FakeLoader> {
        LambdaMetafactory::new(Arc::new(config), Arc::new(FakeLoader::default()))
    }

    #[test]
    fn test_non_capturing_eager_site_shares_singleton() {
        let mf = factory(SpinnerConfig::default());
        let site = supplier_site(vec![]);
        let first = mf.metafactory(&site).unwrap();
        let second = mf.metafactory(&site).unwrap();
        assert!(first.is_constant());
        assert_eq!(first.instance(&[]).unwrap(), second.instance(&[]).unwrap());
        assert_eq!(mf.loader().defined.load(Ordering::SeqCst), 1);
        assert_eq!(mf.registry().len(), 1);
    }

    #[test]
    fn test_capturing_site_is_a_factory() {
        let mf = factory(SpinnerConfig::default());
        let site = supplier_site(vec![JavaType::INT]);
        let call_site = mf.metafactory(&site).unwrap();
        assert!(matches!(call_site, CallSite::Factory(_)));
        let a = call_site.instance(&[7]).unwrap();
        let b = call_site.instance(&[7]).unwrap();
        assert_ne!(a, b);
        // The unit is still shared between evaluations of the same site.
        mf.metafactory(&site).unwrap();
        assert_eq!(mf.loader().defined.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_site_binds_getter_and_skips_cache() {
        let mf = factory(SpinnerConfig::default().with_eager_initialization_disabled(true));
        let site = supplier_site(vec![]);
        let call_site = mf.metafactory(&site).unwrap();
        assert!(matches!(call_site, CallSite::LazySingleton(_)));
        assert_eq!(call_site.instance(&[]).unwrap(), u64::MAX);
        mf.metafactory(&site).unwrap();
        assert_eq!(mf.loader().defined.load(Ordering::SeqCst), 2);
        assert!(mf.registry().is_empty());
    }

    #[test]
    fn test_indirect_site_passes_class_data_and_skips_cache() {
        let mf = factory(SpinnerConfig::default());
        let site = CallSiteSpec::new(
            CallerClass::new("com.acme.Child"),
            FunctionalInterface::new("java/util/function/Supplier"),
            "get",
            mt("()Ljava/lang/Object;"),
            vec![JavaType::class("com/acme/Child")],
            ImplMethod::new("com/acme/Base", "describe", mt("()Ljava/lang/String;"), InvocationKind::Special),
        );
        mf.metafactory(&site).unwrap();
        mf.metafactory(&site).unwrap();
        assert_eq!(mf.loader().saw_class_data.load(Ordering::SeqCst), 2);
        assert!(mf.registry().is_empty());
    }

    #[test]
    fn test_contract_violation_is_reported_before_emission() {
        let mf = factory(SpinnerConfig::default());
        let mut site = supplier_site(vec![]);
        site.implementation.method_type = mt("(I)Ljava/lang/String;");
        let err = mf.metafactory(&site).err().unwrap();
        assert!(matches!(err, LambdaConversionError::ContractViolation { .. }));
        assert_eq!(mf.loader().defined.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_instantiation_is_linkage_error() {
        let loader = FakeLoader {
            failing_constructor: true,
            ..FakeLoader::default()
        };
        let mf = LambdaMetafactory::new(Arc::new(SpinnerConfig::default()), Arc::new(loader));
        let err = mf.metafactory(&supplier_site(vec![])).err().unwrap();
        match err {
            LambdaConversionError::Linkage { reason, .. } => {
                assert!(reason.contains("Exception instantiating lambda object"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dump_mode_registers_and_share_mode_reuses() {
        let site = supplier_site(vec![]);
        let archive = Arc::new(MapArchive::new(ArchiveMode::Dump));
        let dumping = factory(SpinnerConfig::default()).with_archive(archive.clone());
        dumping.metafactory(&site).unwrap();
        assert_eq!(archive.units.lock().len(), 1);

        let sharing_archive = Arc::new(MapArchive::new(ArchiveMode::Share));
        *sharing_archive.units.lock() = archive.units.lock().clone();
        let sharing = factory(SpinnerConfig::default()).with_archive(sharing_archive);
        let call_site = sharing.metafactory(&site).unwrap();
        assert!(call_site.is_constant());
        assert_eq!(sharing.loader().defined.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_oversized_constant_is_internal_error() {
        let mut site = supplier_site(vec![]);
        site.implementation.name = "x".repeat(70_000);
        let err = spin_class_bytes(&site, &SpinnerConfig::default()).unwrap_err();
        assert!(matches!(err, LambdaConversionError::InternalEmission { .. }));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("exceeds"), "{}", err);
    }

    #[test]
    fn test_spin_class_bytes_uses_configured_name() {
        let site = supplier_site(vec![]);
        let unit = spin_class_bytes(&site, &SpinnerConfig::default().with_stable_names(true)).unwrap();
        assert!(unit.name.starts_with("com/acme/Main$$Lambda"));
        assert!(unit.name.len() > "com/acme/Main$$Lambda".len());
        assert_eq!(&unit.bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    }
}
