//! Abrupt completion of interpreted code.

use std::fmt;

use crate::value::{Object, ObjectRef, DETAIL_MESSAGE};

pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
pub const CLASS_CAST_EXCEPTION: &str = "java/lang/ClassCastException";
pub const ARRAY_INDEX_OUT_OF_BOUNDS: &str = "java/lang/ArrayIndexOutOfBoundsException";
pub const NEGATIVE_ARRAY_SIZE: &str = "java/lang/NegativeArraySizeException";

#[derive(Debug, Clone)]
pub enum Trap {
    /// A Java exception propagating out of the call.
    Thrown(ObjectRef),
    /// The runtime could not execute the code at all.
    Internal(String),
}

impl Trap {
    /// Throw a new exception of `class` with `message`.
    pub fn throw(class: &str, message: impl Into<String>) -> Self {
        Trap::Thrown(Object::throwable(class, Some(message.into())))
    }

    pub fn null_pointer(message: impl Into<String>) -> Self {
        Self::throw(NULL_POINTER_EXCEPTION, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Trap::Internal(message.into())
    }

    /// Class of the thrown exception, if any.
    pub fn exception_class(&self) -> Option<String> {
        match self {
            Trap::Thrown(obj) => Some(obj.class_name()),
            Trap::Internal(_) => None,
        }
    }

    /// Message of the thrown exception, if it has one.
    pub fn message(&self) -> Option<String> {
        match self {
            Trap::Thrown(obj) => obj
                .as_instance()
                .and_then(|i| i.field(DETAIL_MESSAGE))
                .and_then(|v| v.as_str().map(str::to_string)),
            Trap::Internal(message) => Some(message.clone()),
        }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::Thrown(obj) => {
                let class = obj.class_name().replace('/', ".");
                match self.message() {
                    Some(message) => write!(f, "{}: {}", class, message),
                    None => f.write_str(&class),
                }
            }
            Trap::Internal(message) => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for Trap {}
