//! JVM field types and their textual forms.
//!
//! A [`JavaType`] can be rendered three ways, each used by a different part of
//! the workspace:
//!
//! | Form | Example | Used by |
//! |------|---------|---------|
//! | descriptor | `Ljava/lang/String;`, `[I`, `J` | class-file encoding |
//! | binary name | `java.lang.String`, `[I`, `long` | stable lambda names |
//! | simple name | `String`, `int[]`, `long` | member-name identity strings |

use serde::{Deserialize, Serialize};
use std::fmt;

pub const OBJECT_CLASS: &str = "java/lang/Object";
pub const STRING_CLASS: &str = "java/lang/String";
pub const NUMBER_CLASS: &str = "java/lang/Number";

// =============================================================================
// Primitive kinds
// =============================================================================

/// The eight JVM primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
        }
    }

    pub fn from_descriptor_char(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.descriptor_char() == c)
    }

    /// Source-level keyword (`int`, `boolean`, ...).
    pub fn java_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Internal name of the box class (`java/lang/Integer` for `int`).
    pub fn wrapper_class(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "java/lang/Boolean",
            PrimitiveKind::Byte => "java/lang/Byte",
            PrimitiveKind::Char => "java/lang/Character",
            PrimitiveKind::Short => "java/lang/Short",
            PrimitiveKind::Int => "java/lang/Integer",
            PrimitiveKind::Long => "java/lang/Long",
            PrimitiveKind::Float => "java/lang/Float",
            PrimitiveKind::Double => "java/lang/Double",
        }
    }

    pub fn from_wrapper_class(internal_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.wrapper_class() == internal_name)
    }

    /// Number of local-variable / operand-stack slots a value occupies.
    pub fn slot_size(self) -> u16 {
        match self {
            PrimitiveKind::Long | PrimitiveKind::Double => 2,
            _ => 1,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Int | PrimitiveKind::Long
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }

    /// The computational kind the JVM uses for this type on the stack.
    pub fn value_kind(self) -> ValueKind {
        match self {
            PrimitiveKind::Long => ValueKind::Long,
            PrimitiveKind::Float => ValueKind::Float,
            PrimitiveKind::Double => ValueKind::Double,
            _ => ValueKind::Int,
        }
    }
}

/// Computational kind of a value: selects the `xload` / `xreturn` opcode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    pub fn slot_size(self) -> u16 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }

    /// Offset from `iload`/`ireturn` within each opcode family.
    pub fn opcode_offset(self) -> u8 {
        match self {
            ValueKind::Int => 0,
            ValueKind::Long => 1,
            ValueKind::Float => 2,
            ValueKind::Double => 3,
            ValueKind::Reference => 4,
        }
    }
}

// =============================================================================
// JavaType
// =============================================================================

/// A JVM type as it appears in field and method descriptors.
///
/// Class names are kept in internal form (`java/lang/String`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JavaType {
    Void,
    Primitive(PrimitiveKind),
    Class(String),
    Array(Box<JavaType>),
}

impl JavaType {
    pub fn object() -> Self {
        JavaType::Class(OBJECT_CLASS.to_string())
    }

    pub fn string() -> Self {
        JavaType::Class(STRING_CLASS.to_string())
    }

    pub fn class(internal_name: impl Into<String>) -> Self {
        JavaType::Class(internal_name.into())
    }

    pub fn array_of(component: JavaType) -> Self {
        JavaType::Array(Box::new(component))
    }

    pub const INT: JavaType = JavaType::Primitive(PrimitiveKind::Int);
    pub const LONG: JavaType = JavaType::Primitive(PrimitiveKind::Long);
    pub const BOOLEAN: JavaType = JavaType::Primitive(PrimitiveKind::Boolean);
    pub const DOUBLE: JavaType = JavaType::Primitive(PrimitiveKind::Double);

    pub fn is_void(&self) -> bool {
        matches!(self, JavaType::Void)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, JavaType::Primitive(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Class(_) | JavaType::Array(_))
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            JavaType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// If this is a box class (`java/lang/Integer`, ...), its primitive.
    pub fn wrapped_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            JavaType::Class(name) => PrimitiveKind::from_wrapper_class(name),
            _ => None,
        }
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            JavaType::Void => None,
            JavaType::Primitive(kind) => Some(kind.value_kind()),
            JavaType::Class(_) | JavaType::Array(_) => Some(ValueKind::Reference),
        }
    }

    pub fn slot_size(&self) -> u16 {
        match self {
            JavaType::Void => 0,
            JavaType::Primitive(kind) => kind.slot_size(),
            _ => 1,
        }
    }

    /// Name usable as a `CONSTANT_Class` operand: the internal name for
    /// classes and the descriptor for arrays.
    pub fn internal_name(&self) -> Option<String> {
        match self {
            JavaType::Class(name) => Some(name.clone()),
            JavaType::Array(_) => Some(self.descriptor()),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            JavaType::Void => out.push('V'),
            JavaType::Primitive(kind) => out.push(kind.descriptor_char()),
            JavaType::Class(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            JavaType::Array(component) => {
                out.push('[');
                component.write_descriptor(out);
            }
        }
    }

    /// `Class.getName()` rendering: `java.lang.String`, `int`, `[Ljava.lang.String;`.
    pub fn binary_name(&self) -> String {
        match self {
            JavaType::Void => "void".to_string(),
            JavaType::Primitive(kind) => kind.java_name().to_string(),
            JavaType::Class(name) => name.replace('/', "."),
            JavaType::Array(_) => self.descriptor().replace('/', "."),
        }
    }

    /// `Class.getSimpleName()` rendering, approximated from the name alone:
    /// nested classes are recognised by `$`.
    pub fn simple_name(&self) -> String {
        match self {
            JavaType::Void | JavaType::Primitive(_) => self.binary_name(),
            JavaType::Class(name) => {
                let base = name.rsplit('/').next().unwrap_or(name);
                match base.rsplit_once('$') {
                    Some((_, nested)) if nested.chars().all(|c| c.is_ascii_digit()) => {
                        String::new()
                    }
                    Some((_, nested)) => nested.to_string(),
                    None => base.to_string(),
                }
            }
            JavaType::Array(component) => format!("{}[]", component.simple_name()),
        }
    }

    /// Parse a complete field descriptor (or `V`).
    pub fn parse_descriptor(input: &str) -> Result<Self, TypeParseError> {
        let (ty, rest) = Self::parse_prefix(input, input)?;
        if !rest.is_empty() {
            return Err(TypeParseError::new(input, "trailing characters after type"));
        }
        Ok(ty)
    }

    /// Parse one type from the front of `s`, returning the remainder.
    pub(crate) fn parse_prefix<'a>(
        s: &'a str,
        whole: &str,
    ) -> Result<(JavaType, &'a str), TypeParseError> {
        let mut chars = s.chars();
        let first = chars
            .next()
            .ok_or_else(|| TypeParseError::new(whole, "unexpected end of descriptor"))?;
        match first {
            'V' => Ok((JavaType::Void, chars.as_str())),
            'L' => {
                let body = chars.as_str();
                let end = body
                    .find(';')
                    .ok_or_else(|| TypeParseError::new(whole, "unterminated class type"))?;
                let name = &body[..end];
                if name.is_empty() || name.contains(['.', '[', ';']) {
                    return Err(TypeParseError::new(whole, "malformed class name"));
                }
                Ok((JavaType::Class(name.to_string()), &body[end + 1..]))
            }
            '[' => {
                let (component, rest) = Self::parse_prefix(chars.as_str(), whole)?;
                if component.is_void() {
                    return Err(TypeParseError::new(whole, "array of void"));
                }
                Ok((JavaType::array_of(component), rest))
            }
            c => match PrimitiveKind::from_descriptor_char(c) {
                Some(kind) => Ok((JavaType::Primitive(kind), chars.as_str())),
                None => Err(TypeParseError::new(
                    whole,
                    format!("unknown descriptor character '{}'", c),
                )),
            },
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.binary_name())
    }
}

impl TryFrom<String> for JavaType {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        JavaType::parse_descriptor(&value)
    }
}

impl From<JavaType> for String {
    fn from(value: JavaType) -> Self {
        value.descriptor()
    }
}

/// A descriptor string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParseError {
    pub input: String,
    pub reason: String,
}

impl TypeParseError {
    pub fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid descriptor '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for TypeParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_forms() {
        assert_eq!(JavaType::INT.descriptor(), "I");
        assert_eq!(JavaType::string().descriptor(), "Ljava/lang/String;");
        assert_eq!(
            JavaType::array_of(JavaType::array_of(JavaType::string())).descriptor(),
            "[[Ljava/lang/String;"
        );
    }

    #[test]
    fn test_binary_and_simple_names() {
        let entry = JavaType::class("java/util/Map$Entry");
        assert_eq!(entry.binary_name(), "java.util.Map$Entry");
        assert_eq!(entry.simple_name(), "Entry");
        assert_eq!(JavaType::array_of(JavaType::INT).binary_name(), "[I");
        assert_eq!(JavaType::array_of(JavaType::INT).simple_name(), "int[]");
        assert_eq!(
            JavaType::array_of(JavaType::string()).binary_name(),
            "[Ljava.lang.String;"
        );
        assert_eq!(JavaType::class("com/acme/Outer$1").simple_name(), "");
    }

    #[test]
    fn test_parse_descriptor() {
        assert_eq!(JavaType::parse_descriptor("J").unwrap(), JavaType::LONG);
        assert_eq!(
            JavaType::parse_descriptor("[Ljava/lang/Object;").unwrap(),
            JavaType::array_of(JavaType::object())
        );
        assert!(JavaType::parse_descriptor("Ljava/lang/Object").is_err());
        assert!(JavaType::parse_descriptor("II").is_err());
        assert!(JavaType::parse_descriptor("[V").is_err());
        assert!(JavaType::parse_descriptor("Q").is_err());
    }

    #[test]
    fn test_wrapper_mapping() {
        for kind in PrimitiveKind::ALL {
            let boxed = JavaType::class(kind.wrapper_class());
            assert_eq!(boxed.wrapped_primitive(), Some(kind));
        }
        assert_eq!(JavaType::string().wrapped_primitive(), None);
    }

    #[test]
    fn test_serde_uses_descriptors() {
        let json = serde_json::to_string(&JavaType::array_of(JavaType::INT)).unwrap();
        assert_eq!(json, "\"[I\"");
        let back: JavaType = serde_json::from_str("\"Ljava/lang/Runnable;\"").unwrap();
        assert_eq!(back, JavaType::class("java/lang/Runnable"));
        assert!(serde_json::from_str::<JavaType>("\"bogus\"").is_err());
    }
}
