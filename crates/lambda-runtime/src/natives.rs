//! Library natives: the host side of every call a proxy class makes besides
//! the implementation method.

use lambda_types::{PrimitiveKind, NUMBER_CLASS, OBJECT_CLASS, STRING_CLASS};
use std::sync::Arc;

use lambda_spinner_core::emitter::{SERIALIZED_LAMBDA_CLASS, SERIALIZED_LAMBDA_CTOR};

use crate::runtime::Runtime;
use crate::trap::Trap;
use crate::value::{Object, Value, CLASS_CLASS, DETAIL_MESSAGE};

const SERIALIZABLE: &str = "java/io/Serializable";
const COMPARABLE: &str = "java/lang/Comparable";

const SERIALIZED_LAMBDA_FIELDS: [&str; 10] = [
    "capturingClass",
    "functionalInterfaceClass",
    "functionalInterfaceMethodName",
    "functionalInterfaceMethodSignature",
    "implMethodKind",
    "implClass",
    "implMethodName",
    "implMethodSignature",
    "instantiatedMethodType",
    "capturedArgs",
];

/// Throwable classes and their superclasses.
const THROWABLES: [(&str, &str); 13] = [
    ("java/lang/Throwable", OBJECT_CLASS),
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/ArrayIndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/io/IOException", "java/lang/Exception"),
    ("java/io/ObjectStreamException", "java/io/IOException"),
    ("java/io/NotSerializableException", "java/io/ObjectStreamException"),
    ("java/lang/AbstractMethodError", "java/lang/Error"),
];

const NUMERIC: [PrimitiveKind; 6] = [
    PrimitiveKind::Byte,
    PrimitiveKind::Short,
    PrimitiveKind::Int,
    PrimitiveKind::Long,
    PrimitiveKind::Float,
    PrimitiveKind::Double,
];

pub(crate) fn install(runtime: &Runtime) {
    declare_library_classes(runtime);

    runtime.register_native(OBJECT_CLASS, "<init>", "()V", |_, _| Ok(None));

    for kind in PrimitiveKind::ALL {
        let wrapper = kind.wrapper_class();
        let value_of = format!("({}){}", kind.descriptor_char(), class_descriptor(wrapper));
        runtime.register_native(wrapper, "valueOf", &value_of, move |_, args| {
            let value = arg(args, 0)?;
            let value = value.cast_primitive(kind).unwrap_or_else(|| value.clone());
            Ok(Some(Value::boxed(kind, value)))
        });
    }

    // Every numeric wrapper answers every numeric xValue, and so does Number.
    for target in NUMERIC {
        let name = format!("{}Value", target.java_name());
        let descriptor = format!("(){}", target.descriptor_char());
        for owner in NUMERIC
            .iter()
            .map(|k| k.wrapper_class())
            .chain(std::iter::once(NUMBER_CLASS))
        {
            runtime.register_native(owner, &name, &descriptor, move |_, args| {
                unbox(args, target, true)
            });
        }
    }
    for kind in [PrimitiveKind::Boolean, PrimitiveKind::Char] {
        let name = format!("{}Value", kind.java_name());
        let descriptor = format!("(){}", kind.descriptor_char());
        runtime.register_native(kind.wrapper_class(), &name, &descriptor, move |_, args| {
            unbox(args, kind, false)
        });
    }

    for (class, _) in THROWABLES {
        runtime.register_native(class, "<init>", "()V", |_, _| Ok(None));
        runtime.register_native(class, "<init>", "(Ljava/lang/String;)V", |_, args| {
            let instance = receiver(args)?;
            instance.set_field(DETAIL_MESSAGE, arg(args, 1)?.clone());
            Ok(None)
        });
    }
    runtime.register_native(
        "java/lang/Throwable",
        "getMessage",
        "()Ljava/lang/String;",
        |_, args| Ok(Some(receiver(args)?.field(DETAIL_MESSAGE).unwrap_or(Value::Null))),
    );

    runtime.register_native(
        SERIALIZED_LAMBDA_CLASS,
        "<init>",
        SERIALIZED_LAMBDA_CTOR,
        |_, args| {
            let instance = receiver(args)?;
            for (i, field) in SERIALIZED_LAMBDA_FIELDS.iter().enumerate() {
                instance.set_field(*field, arg(args, i + 1)?.clone());
            }
            Ok(None)
        },
    );

    install_string_natives(runtime);
}

fn declare_library_classes(runtime: &Runtime) {
    runtime.declare_class(STRING_CLASS, Some(OBJECT_CLASS), &[SERIALIZABLE, COMPARABLE, "java/lang/CharSequence"]);
    runtime.declare_class(NUMBER_CLASS, Some(OBJECT_CLASS), &[SERIALIZABLE]);
    for kind in PrimitiveKind::ALL {
        let super_class = if NUMERIC.contains(&kind) {
            NUMBER_CLASS
        } else {
            OBJECT_CLASS
        };
        runtime.declare_class(kind.wrapper_class(), Some(super_class), &[SERIALIZABLE, COMPARABLE]);
    }
    for (class, super_class) in THROWABLES {
        let interfaces: &[&str] = if class == "java/lang/Throwable" {
            &[SERIALIZABLE]
        } else {
            &[]
        };
        runtime.declare_class(class, Some(super_class), interfaces);
    }
    runtime.declare_class(SERIALIZED_LAMBDA_CLASS, Some(OBJECT_CLASS), &[SERIALIZABLE]);
    runtime.declare_class(CLASS_CLASS, Some(OBJECT_CLASS), &[SERIALIZABLE]);
}

fn install_string_natives(runtime: &Runtime) {
    let string_return = class_descriptor(STRING_CLASS);
    for kind in [
        PrimitiveKind::Boolean,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ] {
        let descriptor = format!("({}){}", kind.descriptor_char(), string_return);
        runtime.register_native(STRING_CLASS, "valueOf", &descriptor, move |_, args| {
            Ok(Some(Value::string(primitive_to_string(kind, arg(args, 0)?))))
        });
    }
    let object_descriptor = format!("(Ljava/lang/Object;){}", string_return);
    runtime.register_native(STRING_CLASS, "valueOf", &object_descriptor, |runtime, args| {
        Ok(Some(Value::string(display_string(runtime, arg(args, 0)?)?)))
    });
}

/// `String.valueOf(Object)`: `"null"`, the contents of strings and boxes, or
/// the receiver's own `toString`.
pub fn display_string(runtime: &Runtime, value: &Value) -> Result<String, Trap> {
    let obj = match value {
        Value::Ref(obj) => obj,
        Value::Null => return Ok("null".to_string()),
        other => return Ok(other.to_string()),
    };
    match obj.as_ref() {
        Object::Str(s) => Ok(s.clone()),
        Object::Boxed(kind, value) => Ok(primitive_to_string(*kind, value)),
        _ => {
            let descriptor = format!("(){}", class_descriptor(STRING_CLASS));
            match runtime.invoke_virtual(value, "toString", &descriptor, &[]) {
                Ok(Some(s)) => Ok(s.as_str().map(str::to_string).unwrap_or_else(|| s.to_string())),
                Ok(None) => Err(Trap::internal("toString returned nothing")),
                Err(Trap::Thrown(e)) if e.class_name() == "java/lang/AbstractMethodError" => {
                    Ok(format!("{}@{:x}", obj.class_name().replace('/', "."), Arc::as_ptr(obj) as usize))
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// Java's rendering of a primitive value.
pub fn primitive_to_string(kind: PrimitiveKind, value: &Value) -> String {
    match (kind, value) {
        (PrimitiveKind::Boolean, Value::Int(v)) => (*v != 0).to_string(),
        (PrimitiveKind::Char, Value::Int(v)) => {
            char::decode_utf16([*v as u16]).map(|c| c.unwrap_or('\u{FFFD}')).collect()
        }
        (_, Value::Float(v)) => floating_to_string(f64::from(*v), v.to_string()),
        (_, Value::Double(v)) => floating_to_string(*v, v.to_string()),
        (_, Value::Int(v)) => v.to_string(),
        (_, Value::Long(v)) => v.to_string(),
        (_, other) => other.to_string(),
    }
}

fn floating_to_string(value: f64, shortest: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e7 {
        format!("{:.1}", value)
    } else {
        shortest
    }
}

fn class_descriptor(internal_name: &str) -> String {
    format!("L{};", internal_name)
}

fn arg(args: &[Value], index: usize) -> Result<&Value, Trap> {
    args.get(index)
        .ok_or_else(|| Trap::internal(format!("missing argument {}", index)))
}

fn receiver(args: &[Value]) -> Result<&crate::value::Instance, Trap> {
    match arg(args, 0)? {
        Value::Ref(obj) => obj
            .as_instance()
            .ok_or_else(|| Trap::internal(format!("receiver {} is not an instance", obj))),
        Value::Null => Err(Trap::null_pointer("null receiver")),
        other => Err(Trap::internal(format!("receiver {} is not a reference", other))),
    }
}

fn unbox(args: &[Value], target: PrimitiveKind, numeric: bool) -> Result<Option<Value>, Trap> {
    let (kind, value) = match arg(args, 0)? {
        Value::Ref(obj) => match obj.as_ref() {
            Object::Boxed(kind, value) => (*kind, value),
            other => {
                return Err(Trap::internal(format!(
                    "{}Value on {}",
                    target.java_name(),
                    other.class_name()
                )))
            }
        },
        Value::Null => return Err(Trap::null_pointer("unboxing null")),
        other => return Err(Trap::internal(format!("unboxing primitive {}", other))),
    };
    if !numeric {
        return if kind == target {
            Ok(Some(value.clone()))
        } else {
            Err(Trap::internal(format!("{}Value on {}", target.java_name(), kind.wrapper_class())))
        };
    }
    if !NUMERIC.contains(&kind) {
        return Err(Trap::internal(format!("{}Value on {}", target.java_name(), kind.wrapper_class())));
    }
    value
        .cast_primitive(target)
        .map(Some)
        .ok_or_else(|| Trap::internal(format!("cannot convert {} to {}", value, target.java_name())))
}

/// The recorded form of a serializable lambda, read back from a
/// `java/lang/invoke/SerializedLambda` instance.
#[derive(Debug, Clone)]
pub struct SerializedLambda {
    pub capturing_class: String,
    pub functional_interface_class: String,
    pub functional_interface_method_name: String,
    pub functional_interface_method_signature: String,
    pub impl_method_kind: i32,
    pub impl_class: String,
    pub impl_method_name: String,
    pub impl_method_signature: String,
    pub instantiated_method_type: String,
    pub captured_args: Vec<Value>,
}

impl SerializedLambda {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let instance = obj.as_instance()?;
        if instance.class != SERIALIZED_LAMBDA_CLASS {
            return None;
        }
        let string = |name: &str| instance.field(name)?.as_str().map(str::to_string);
        let capturing_class = match instance.field("capturingClass")?.as_object()?.as_ref() {
            Object::Class(name) => name.clone(),
            _ => return None,
        };
        let captured_args = match instance.field("capturedArgs")?.as_object()?.as_ref() {
            Object::Array { elements, .. } => elements.read().clone(),
            _ => return None,
        };
        Some(Self {
            capturing_class,
            functional_interface_class: string("functionalInterfaceClass")?,
            functional_interface_method_name: string("functionalInterfaceMethodName")?,
            functional_interface_method_signature: string("functionalInterfaceMethodSignature")?,
            impl_method_kind: instance.field("implMethodKind")?.as_int()?,
            impl_class: string("implClass")?,
            impl_method_name: string("implMethodName")?,
            impl_method_signature: string("implMethodSignature")?,
            instantiated_method_type: string("instantiatedMethodType")?,
            captured_args,
        })
    }
}
