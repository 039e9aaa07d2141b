//! Hidden units and the in-process loader that defines them.

use anyhow::{anyhow, bail, Context, Result};
use lambda_classfile::{decode_class, ClassModel};
use lambda_spinner_core::loader::{DefineRequest, LoadedUnit, ProxyLoader, UnitHandle};
use lambda_types::{ImplMethod, JavaType, MethodType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

use crate::interp;
use crate::runtime::Runtime;
use crate::trap::Trap;
use crate::value::{Instance, Object, Value};

/// A defined proxy class: its decoded model, static state and class data.
pub struct HiddenUnit {
    name: String,
    bytes: Vec<u8>,
    model: ClassModel,
    class_data: Option<ImplMethod>,
    runtime: Arc<Runtime>,
    statics: RwLock<HashMap<String, Value>>,
    initialized: OnceLock<Result<(), Trap>>,
    this: Weak<HiddenUnit>,
}

impl HiddenUnit {
    /// Name as defined, `<requested name>/0x<seq>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &ClassModel {
        &self.model
    }

    pub fn class_data(&self) -> Option<&ImplMethod> {
        self.class_data.as_ref()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Run `<clinit>` once. Later calls return the first outcome.
    pub fn ensure_initialized(self: &Arc<Self>) -> Result<(), Trap> {
        self.initialized
            .get_or_init(|| {
                let Some(clinit) = self.model.method("<clinit>") else {
                    return Ok(());
                };
                debug!(unit = %self.name, "running static initializer");
                interp::execute(&self.runtime, self, clinit, Vec::new()).map(|_| ())
            })
            .clone()
    }

    /// A fresh instance with unset fields.
    pub fn allocate(self: &Arc<Self>) -> Value {
        Value::Ref(Arc::new(Object::Instance(Instance::new(
            self.name.clone(),
            Some(Arc::clone(self)),
        ))))
    }

    pub(crate) fn static_field(&self, name: &str, ty: &JavaType) -> Value {
        self.statics
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::zero(ty))
    }

    pub(crate) fn set_static_field(&self, name: &str, value: Value) {
        self.statics.write().insert(name.to_string(), value);
    }

    /// Handles hold an owning reference back to the unit.
    fn self_ref(&self) -> Result<Arc<HiddenUnit>> {
        self.this
            .upgrade()
            .ok_or_else(|| anyhow!("{} has been unloaded", self.name))
    }
}

impl LoadedUnit for HiddenUnit {
    type Handle = RuntimeHandle;

    fn name(&self) -> &str {
        &self.name
    }

    fn class_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn find_constructor(&self, ty: &MethodType) -> Result<RuntimeHandle> {
        if !ty.ret.is_void() {
            bail!("constructor type {} does not return void", ty);
        }
        let unit = self.self_ref()?;
        self.model
            .method_with_type("<init>", ty)
            .ok_or_else(|| anyhow!("{} has no constructor {}", self.name, ty))?;
        Ok(RuntimeHandle {
            unit,
            target: HandleTarget::Constructor(ty.clone()),
        })
    }

    fn find_static_getter(&self, name: &str, ty: &JavaType) -> Result<RuntimeHandle> {
        let unit = self.self_ref()?;
        let field = self
            .model
            .field(name)
            .ok_or_else(|| anyhow!("{} has no field {}", self.name, name))?;
        if !field.is_static() {
            bail!("{}.{} is not static", self.name, name);
        }
        if &field.ty != ty {
            bail!(
                "{}.{} has type {}, not {}",
                self.name,
                name,
                field.ty.descriptor(),
                ty.descriptor()
            );
        }
        Ok(RuntimeHandle {
            unit,
            target: HandleTarget::StaticGetter(name.to_string()),
        })
    }
}

#[derive(Clone)]
enum HandleTarget {
    Constructor(MethodType),
    StaticGetter(String),
}

/// A constructor or static getter of a [`HiddenUnit`].
#[derive(Clone)]
pub struct RuntimeHandle {
    unit: Arc<HiddenUnit>,
    target: HandleTarget,
}

impl UnitHandle for RuntimeHandle {
    type Value = Value;
    type Error = Trap;

    fn invoke(&self, args: &[Value]) -> Result<Value, Trap> {
        self.unit.ensure_initialized()?;
        match &self.target {
            HandleTarget::Constructor(ty) => {
                let method = self
                    .unit
                    .model
                    .method_with_type("<init>", ty)
                    .ok_or_else(|| Trap::internal(format!("no constructor {}", ty)))?;
                let instance = self.unit.allocate();
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(instance.clone());
                full.extend_from_slice(args);
                interp::execute(&self.unit.runtime, &self.unit, method, full)?;
                Ok(instance)
            }
            HandleTarget::StaticGetter(name) => {
                let ty = self
                    .unit
                    .model
                    .field(name)
                    .map(|f| f.ty.clone())
                    .unwrap_or_else(JavaType::object);
                Ok(self.unit.static_field(name, &ty))
            }
        }
    }
}

/// Defines units in this process and runs them on a shared [`Runtime`].
pub struct InProcessLoader {
    runtime: Arc<Runtime>,
    next_id: AtomicU64,
}

impl InProcessLoader {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }
}

impl ProxyLoader for InProcessLoader {
    type Unit = HiddenUnit;

    fn define_hidden(&self, request: DefineRequest<'_>) -> Result<Arc<HiddenUnit>> {
        let model = decode_class(request.bytes)
            .with_context(|| format!("Failed to decode class bytes for {}", request.name))?;
        if model.name != request.name {
            bail!(
                "class bytes declare {} but {} was requested",
                model.name,
                request.name
            );
        }
        if model.uses_class_data() && request.class_data.is_none() {
            bail!("{} loads class data but none was supplied", request.name);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}/0x{:x}", request.name, id);
        let unit = Arc::new_cyclic(|this| HiddenUnit {
            name: name.clone(),
            bytes: request.bytes.to_vec(),
            model,
            class_data: request.class_data.cloned(),
            runtime: Arc::clone(&self.runtime),
            statics: RwLock::new(HashMap::new()),
            initialized: OnceLock::new(),
            this: this.clone(),
        });
        debug!(unit = %name, bytes = request.bytes.len(), "defined hidden unit");

        if request.initialize {
            unit.ensure_initialized()
                .map_err(|trap| anyhow!("static initializer of {} failed: {}", name, trap))?;
        }
        Ok(unit)
    }
}
