//! Host environment shared by every loaded unit: native methods and the
//! declared class hierarchy.
//!
//! Proxy classes only ever call out to a handful of library methods (boxing,
//! `Object.<init>`, exception and `SerializedLambda` constructors) plus the
//! implementation method. All of these are host functions registered here;
//! [`Runtime::new`] installs the library ones.

use lambda_types::{ImplMethod, InvocationKind, MethodType, OBJECT_CLASS};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::interp;
use crate::natives;
use crate::trap::Trap;
use crate::value::{Instance, Object, ObjectRef, Value};

/// A host implementation of a method. Instance methods get the receiver as
/// the first argument. Returns `None` for `void` methods.
pub type NativeFn = Arc<dyn Fn(&Runtime, &[Value]) -> Result<Option<Value>, Trap> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeKey {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl NativeKey {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl fmt::Display for NativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Supertypes of a host class.
#[derive(Debug, Clone, Default)]
pub struct ClassDecl {
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
}

pub struct Runtime {
    natives: RwLock<HashMap<NativeKey, NativeFn>>,
    classes: RwLock<HashMap<String, ClassDecl>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A runtime with the library natives and class declarations installed.
    pub fn new() -> Self {
        let runtime = Self::empty();
        natives::install(&runtime);
        runtime
    }

    /// A runtime with nothing registered.
    pub fn empty() -> Self {
        Self {
            natives: RwLock::new(HashMap::new()),
            classes: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_native<F>(&self, owner: &str, name: &str, descriptor: &str, f: F)
    where
        F: Fn(&Runtime, &[Value]) -> Result<Option<Value>, Trap> + Send + Sync + 'static,
    {
        self.natives
            .write()
            .insert(NativeKey::new(owner, name, descriptor), Arc::new(f));
    }

    /// Declare the supertypes of `name` for `checkcast` and virtual dispatch.
    pub fn declare_class(&self, name: &str, super_class: Option<&str>, interfaces: &[&str]) {
        self.classes.write().insert(
            name.to_string(),
            ClassDecl {
                super_class: super_class.map(str::to_string),
                interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
            },
        );
    }

    pub fn native(&self, owner: &str, name: &str, descriptor: &str) -> Option<NativeFn> {
        self.natives
            .read()
            .get(&NativeKey::new(owner, name, descriptor))
            .cloned()
    }

    pub fn native_count(&self) -> usize {
        self.natives.read().len()
    }

    /// `class` and all its declared supertypes, nearest first, ending with
    /// `java/lang/Object`.
    fn supertypes(&self, class: &str, direct: Option<ClassDecl>) -> Vec<String> {
        let classes = self.classes.read();
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back((class.to_string(), direct));
        while let Some((name, decl)) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let decl = decl.or_else(|| classes.get(&name).cloned());
            if let Some(decl) = decl {
                if let Some(super_class) = decl.super_class {
                    queue.push_back((super_class, None));
                }
                for iface in decl.interfaces {
                    queue.push_back((iface, None));
                }
            }
            order.push(name);
        }
        if !seen.contains(OBJECT_CLASS) {
            order.push(OBJECT_CLASS.to_string());
        }
        order
    }

    fn object_supertypes(&self, obj: &Object) -> Vec<String> {
        let direct = obj.as_instance().and_then(|i| i.unit.as_ref()).map(|unit| ClassDecl {
            super_class: Some(unit.model().super_class.clone()),
            interfaces: unit.model().interfaces.clone(),
        });
        self.supertypes(&obj.class_name(), direct)
    }

    pub fn is_subclass(&self, class: &str, target: &str) -> bool {
        self.supertypes(class, None).iter().any(|c| c == target)
    }

    /// Whether `checkcast target` succeeds on `obj`.
    pub fn is_instance(&self, obj: &Object, target: &str) -> bool {
        if let Object::Array { component, .. } = obj {
            return match target.strip_prefix('[') {
                Some(target_component) => {
                    let target_component = target_component
                        .strip_prefix('L')
                        .and_then(|c| c.strip_suffix(';'))
                        .unwrap_or(target_component);
                    target_component == component || self.is_subclass(component, target_component)
                }
                None => matches!(
                    target,
                    OBJECT_CLASS | "java/lang/Cloneable" | "java/io/Serializable"
                ),
            };
        }
        self.object_supertypes(obj).iter().any(|c| c == target)
    }

    /// Call `name` on `receiver` with virtual dispatch.
    pub fn invoke_virtual(
        &self,
        receiver: &Value,
        name: &str,
        descriptor: &str,
        args: &[Value],
    ) -> Result<Option<Value>, Trap> {
        let ty = MethodType::parse_descriptor(descriptor)
            .map_err(|e| Trap::internal(format!("bad descriptor {}: {}", descriptor, e)))?;
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(receiver.clone());
        full.extend_from_slice(args);
        self.dispatch_virtual(OBJECT_CLASS, name, &ty, full)
    }

    /// Call a static host method.
    pub fn invoke_static(
        &self,
        owner: &str,
        name: &str,
        descriptor: &str,
        args: &[Value],
    ) -> Result<Option<Value>, Trap> {
        let native = self
            .native(owner, name, descriptor)
            .ok_or_else(|| Trap::internal(format!("no native {}.{}{}", owner, name, descriptor)))?;
        native(self, args)
    }

    /// Virtual dispatch: a proxy unit's own method first, then natives along
    /// the receiver's supertypes, then the statically named owner.
    pub(crate) fn dispatch_virtual(
        &self,
        owner: &str,
        name: &str,
        ty: &MethodType,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Trap> {
        let receiver = match args.first() {
            Some(Value::Ref(obj)) => Arc::clone(obj),
            Some(Value::Null) => {
                return Err(Trap::null_pointer(format!(
                    "Cannot invoke \"{}.{}()\" because receiver is null",
                    owner.replace('/', "."),
                    name
                )))
            }
            _ => return Err(Trap::internal(format!("{}.{}: missing receiver", owner, name))),
        };

        if let Some(unit) = receiver.as_instance().and_then(|i| i.unit.as_ref()) {
            if let Some(method) = unit.model().method_with_type(name, ty) {
                return interp::execute(self, unit, method, args);
            }
        }

        let descriptor = ty.descriptor();
        let mut candidates = self.object_supertypes(&receiver);
        candidates.push(owner.to_string());
        for class in &candidates {
            if let Some(native) = self.native(class, name, &descriptor) {
                return native(self, &args);
            }
        }
        Err(Trap::throw(
            "java/lang/AbstractMethodError",
            format!("{}.{}{}", receiver.class_name(), name, descriptor),
        ))
    }

    /// Non-virtual call: `invokestatic`, or `invokespecial` on a host class.
    pub(crate) fn dispatch_exact(
        &self,
        owner: &str,
        name: &str,
        ty: &MethodType,
        args: &[Value],
    ) -> Result<Option<Value>, Trap> {
        let descriptor = ty.descriptor();
        let native = self.native(owner, name, &descriptor).ok_or_else(|| {
            Trap::throw(
                "java/lang/NoSuchMethodError",
                format!("{}.{}{}", owner, name, descriptor),
            )
        })?;
        native(self, args)
    }

    /// `MethodHandle.invokeExact` on a direct handle to `target`.
    pub(crate) fn invoke_handle(
        &self,
        target: &ImplMethod,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Trap> {
        let owner = &target.declaring_class;
        let ty = &target.method_type;
        match target.kind {
            InvocationKind::Static | InvocationKind::Special => {
                if target.kind == InvocationKind::Special && matches!(args.first(), Some(Value::Null)) {
                    return Err(Trap::null_pointer(format!("{}: null receiver", target)));
                }
                self.dispatch_exact(owner, &target.name, ty, &args)
            }
            InvocationKind::Virtual | InvocationKind::Interface => {
                self.dispatch_virtual(owner, &target.name, ty, args)
            }
            InvocationKind::NewInvokeSpecial => {
                let instance = self.allocate(owner);
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(instance.clone());
                full.extend(args);
                self.dispatch_exact(owner, "<init>", ty, &full)?;
                Ok(Some(instance))
            }
        }
    }

    /// A fresh, uninitialized instance of a host class.
    pub(crate) fn allocate(&self, class: &str) -> Value {
        Value::Ref(ObjectRef::new(Object::Instance(Instance::new(class, None))))
    }
}
