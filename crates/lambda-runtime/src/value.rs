//! Runtime values and heap objects.

use lambda_types::{ImplMethod, JavaType, PrimitiveKind, STRING_CLASS};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::unit::HiddenUnit;

pub const CLASS_CLASS: &str = "java/lang/Class";
pub const METHOD_HANDLE_CLASS: &str = "java/lang/invoke/MethodHandle";
/// Field holding a throwable's message.
pub const DETAIL_MESSAGE: &str = "detailMessage";

pub type ObjectRef = Arc<Object>;

/// A value on the operand stack or in a local, field or array slot.
///
/// Sub-int primitives (`boolean`, `byte`, `char`, `short`) are held as `Int`,
/// as the JVM does.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(ObjectRef),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Ref(Arc::new(Object::Str(s.into())))
    }

    pub fn boxed(kind: PrimitiveKind, value: Value) -> Self {
        Value::Ref(Arc::new(Object::Boxed(kind, value)))
    }

    /// Default value of a field of type `ty`.
    pub fn zero(ty: &JavaType) -> Self {
        match ty.primitive() {
            Some(PrimitiveKind::Long) => Value::Long(0),
            Some(PrimitiveKind::Float) => Value::Float(0.0),
            Some(PrimitiveKind::Double) => Value::Double(0.0),
            Some(_) => Value::Int(0),
            None => Value::Null,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.as_object()?.as_ref() {
            Object::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Primitive conversion with JVM semantics: truncating integer narrowing,
    /// saturating float-to-integer, `NaN` to zero. `None` for references and
    /// for `boolean` on either side.
    pub fn cast_primitive(&self, to: PrimitiveKind) -> Option<Value> {
        enum Num {
            Integral(i64),
            Floating(f64),
        }
        let num = match self {
            Value::Int(v) => Num::Integral(i64::from(*v)),
            Value::Long(v) => Num::Integral(*v),
            Value::Float(v) => Num::Floating(f64::from(*v)),
            Value::Double(v) => Num::Floating(*v),
            Value::Null | Value::Ref(_) => return None,
        };
        let as_int = |num: &Num| match num {
            Num::Integral(v) => *v as i32,
            Num::Floating(v) => *v as i32,
        };
        let value = match to {
            PrimitiveKind::Boolean => return None,
            PrimitiveKind::Int => Value::Int(as_int(&num)),
            PrimitiveKind::Byte => Value::Int(i32::from(as_int(&num) as i8)),
            PrimitiveKind::Short => Value::Int(i32::from(as_int(&num) as i16)),
            PrimitiveKind::Char => Value::Int(i32::from(as_int(&num) as u16)),
            PrimitiveKind::Long => Value::Long(match num {
                Num::Integral(v) => v,
                Num::Floating(v) => v as i64,
            }),
            PrimitiveKind::Float => Value::Float(match num {
                Num::Integral(v) => v as f32,
                Num::Floating(v) => v as f32,
            }),
            PrimitiveKind::Double => Value::Double(match num {
                Num::Integral(v) => v as f64,
                Num::Floating(v) => v,
            }),
        };
        Some(value)
    }

    /// Reference identity; primitives compare by value.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Ref(a), Value::Ref(b)) => Arc::ptr_eq(a, b),
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Float(v) => write!(f, "{}f", v),
            Value::Double(v) => write!(f, "{}d", v),
            Value::Null => f.write_str("null"),
            Value::Ref(obj) => write!(f, "{}", obj),
        }
    }
}

/// A heap object.
#[derive(Debug)]
pub enum Object {
    /// A wrapper instance such as `java/lang/Integer`.
    Boxed(PrimitiveKind, Value),
    Str(String),
    /// A class literal.
    Class(String),
    Array {
        component: String,
        elements: RwLock<Vec<Value>>,
    },
    Instance(Instance),
    /// A direct method handle, as delivered through class data.
    MethodHandle(ImplMethod),
}

impl Object {
    /// Runtime class name.
    pub fn class_name(&self) -> String {
        match self {
            Object::Boxed(kind, _) => kind.wrapper_class().to_string(),
            Object::Str(_) => STRING_CLASS.to_string(),
            Object::Class(_) => CLASS_CLASS.to_string(),
            Object::Array { component, .. } => array_class_name(component),
            Object::Instance(instance) => instance.class.clone(),
            Object::MethodHandle(_) => METHOD_HANDLE_CLASS.to_string(),
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Object::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// A throwable of class `class` carrying `message`.
    pub fn throwable(class: impl Into<String>, message: Option<String>) -> ObjectRef {
        let instance = Instance::new(class, None);
        if let Some(message) = message {
            instance.set_field(DETAIL_MESSAGE, Value::string(message));
        }
        Arc::new(Object::Instance(instance))
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Boxed(_, value) => write!(f, "{}", value),
            Object::Str(s) => write!(f, "{:?}", s),
            Object::Class(name) => write!(f, "class {}", name),
            Object::Array { component, elements } => {
                write!(f, "{}[{}]", component, elements.read().len())
            }
            Object::Instance(instance) => write!(f, "{}@{:p}", instance.class, instance),
            Object::MethodHandle(target) => write!(f, "MethodHandle({})", target),
        }
    }
}

/// Internal name of the array class with the given component.
pub fn array_class_name(component: &str) -> String {
    if component.starts_with('[') {
        format!("[{}", component)
    } else {
        format!("[L{};", component)
    }
}

/// An instance of a host class or of a loaded proxy unit.
pub struct Instance {
    pub class: String,
    /// The unit this is an instance of, for proxy classes.
    pub unit: Option<Arc<HiddenUnit>>,
    fields: RwLock<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: impl Into<String>, unit: Option<Arc<HiddenUnit>>) -> Self {
        Self {
            class: class.into(),
            unit,
            fields: RwLock::new(HashMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields.write().insert(name.into(), value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class)
            .field("fields", &*self.fields.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let a = Value::string("x");
        let b = a.clone();
        let c = Value::string("x");
        assert!(a.same(&b));
        assert!(!a.same(&c));
        assert!(Value::Int(3).same(&Value::Int(3)));
        assert!(!Value::Int(3).same(&Value::Long(3)));
    }

    #[test]
    fn test_primitive_casts() {
        assert_eq!(Value::Int(7).cast_primitive(PrimitiveKind::Long).unwrap().as_long(), Some(7));
        assert_eq!(Value::Long(1 << 32 | 5).cast_primitive(PrimitiveKind::Int).unwrap().as_int(), Some(5));
        assert_eq!(Value::Int(300).cast_primitive(PrimitiveKind::Byte).unwrap().as_int(), Some(44));
        assert_eq!(Value::Int(-1).cast_primitive(PrimitiveKind::Char).unwrap().as_int(), Some(0xFFFF));
        assert_eq!(Value::Double(f64::NAN).cast_primitive(PrimitiveKind::Int).unwrap().as_int(), Some(0));
        assert_eq!(
            Value::Double(1e20).cast_primitive(PrimitiveKind::Int).unwrap().as_int(),
            Some(i32::MAX)
        );
        assert_eq!(Value::Float(2.5).cast_primitive(PrimitiveKind::Double).unwrap().as_double(), Some(2.5));
        assert!(Value::Int(1).cast_primitive(PrimitiveKind::Boolean).is_none());
        assert!(Value::Null.cast_primitive(PrimitiveKind::Int).is_none());
    }

    #[test]
    fn test_class_names() {
        let boxed = Object::Boxed(PrimitiveKind::Int, Value::Int(1));
        assert_eq!(boxed.class_name(), "java/lang/Integer");
        assert_eq!(array_class_name("java/lang/Object"), "[Ljava/lang/Object;");
        assert_eq!(array_class_name("[I"), "[[I");
    }

    #[test]
    fn test_throwable_message() {
        let thrown = Object::throwable("java/lang/IllegalStateException", Some("boom".into()));
        let instance = thrown.as_instance().unwrap();
        assert_eq!(instance.field(DETAIL_MESSAGE).unwrap().as_str(), Some("boom"));
    }
}
