//! Resolved implementation methods and the classes around a call site.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::java_type::JavaType;
use crate::method_type::MethodType;

/// How a resolved implementation is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationKind {
    Static,
    Virtual,
    Interface,
    /// Non-virtual instance call (`super.m()` or a private method).
    Special,
    /// Allocate the declaring class and run its constructor.
    NewInvokeSpecial,
}

impl InvocationKind {
    /// `REF_*` constant from the JVM method-handle reference kinds.
    pub fn reference_kind(self) -> u8 {
        match self {
            InvocationKind::Virtual => 5,
            InvocationKind::Static => 6,
            InvocationKind::Special => 7,
            InvocationKind::NewInvokeSpecial => 8,
            InvocationKind::Interface => 9,
        }
    }

    pub fn from_reference_kind(kind: u8) -> Option<Self> {
        match kind {
            5 => Some(InvocationKind::Virtual),
            6 => Some(InvocationKind::Static),
            7 => Some(InvocationKind::Special),
            8 => Some(InvocationKind::NewInvokeSpecial),
            9 => Some(InvocationKind::Interface),
            _ => None,
        }
    }

    pub fn ref_kind_name(self) -> &'static str {
        match self {
            InvocationKind::Virtual => "invokeVirtual",
            InvocationKind::Static => "invokeStatic",
            InvocationKind::Special => "invokeSpecial",
            InvocationKind::NewInvokeSpecial => "newInvokeSpecial",
            InvocationKind::Interface => "invokeInterface",
        }
    }

    /// Whether the call consumes a receiver before the declared parameters.
    pub fn has_receiver(self) -> bool {
        matches!(
            self,
            InvocationKind::Virtual | InvocationKind::Interface | InvocationKind::Special
        )
    }
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ref_kind_name())
    }
}

/// Declared access of the implementation member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberAccess {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

/// Package part of an internal class name (`java/lang` for `java/lang/String`).
pub fn package_of(internal_name: &str) -> &str {
    internal_name
        .rsplit_once('/')
        .map(|(pkg, _)| pkg)
        .unwrap_or("")
}

/// The method a lambda forwards to, as produced by method-reference resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImplMethod {
    /// Internal name of the declaring class.
    pub declaring_class: String,
    pub name: String,
    /// Declared type; constructors return `void`, receivers are not included.
    pub method_type: MethodType,
    pub kind: InvocationKind,
    #[serde(default)]
    pub access: MemberAccess,
    #[serde(default)]
    pub declaring_is_interface: bool,
}

impl ImplMethod {
    pub fn new(
        declaring_class: impl Into<String>,
        name: impl Into<String>,
        method_type: MethodType,
        kind: InvocationKind,
    ) -> Self {
        Self {
            declaring_class: declaring_class.into(),
            name: name.into(),
            method_type,
            kind,
            access: MemberAccess::Public,
            declaring_is_interface: false,
        }
    }

    pub fn with_access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    pub fn on_interface(mut self) -> Self {
        self.declaring_is_interface = true;
        self
    }

    pub fn declaring_type(&self) -> JavaType {
        JavaType::class(self.declaring_class.clone())
    }

    /// Type of a direct method handle to this member: receiver first for
    /// instance methods, the new instance as result for constructors.
    pub fn handle_type(&self) -> MethodType {
        match self.kind {
            InvocationKind::Static => self.method_type.clone(),
            InvocationKind::Virtual | InvocationKind::Interface | InvocationKind::Special => {
                self.method_type.insert_parameter(0, self.declaring_type())
            }
            InvocationKind::NewInvokeSpecial => self.method_type.with_return(self.declaring_type()),
        }
    }

    /// Identity string of the member: `java.lang.String.valueOf(int)String/invokeStatic`.
    pub fn member_name(&self) -> String {
        format!(
            "{}.{}{}/{}",
            self.declaring_type().binary_name(),
            self.name,
            self.method_type.simple_signature(),
            self.kind.ref_kind_name()
        )
    }
}

impl fmt::Display for ImplMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.member_name())
    }
}

/// The class whose code contains the lambda expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallerClass {
    /// Binary name (`com.acme.Widget`, or `com.acme.Widget/0x1f` for hidden classes).
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
}

impl CallerClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hidden: false,
        }
    }

    pub fn hidden(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hidden: true,
        }
    }

    pub fn internal_name(&self) -> String {
        self.name.replace('.', "/")
    }

    pub fn package(&self) -> String {
        let name = self.name.split('/').next().unwrap_or(&self.name);
        name.rsplit_once('.')
            .map(|(pkg, _)| pkg.replace('.', "/"))
            .unwrap_or_default()
    }
}

/// A functional interface the synthesized class implements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionalInterface {
    /// Internal name.
    pub name: String,
    /// Whether the interface is assignable to `java.io.Serializable`.
    #[serde(default)]
    pub serializable: bool,
}

impl FunctionalInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serializable: false,
        }
    }

    pub fn serializable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serializable: true,
        }
    }

    pub fn as_type(&self) -> JavaType {
        JavaType::class(self.name.clone())
    }

    pub fn binary_name(&self) -> String {
        self.name.replace('/', ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_name_static() {
        let m = ImplMethod::new(
            "java/lang/String",
            "valueOf",
            MethodType::parse_descriptor("(I)Ljava/lang/String;").unwrap(),
            InvocationKind::Static,
        );
        assert_eq!(m.member_name(), "java.lang.String.valueOf(int)String/invokeStatic");
        assert_eq!(m.handle_type(), m.method_type);
    }

    #[test]
    fn test_handle_type_shapes() {
        let virt = ImplMethod::new(
            "java/lang/String",
            "length",
            MethodType::parse_descriptor("()I").unwrap(),
            InvocationKind::Virtual,
        );
        assert_eq!(virt.handle_type().descriptor(), "(Ljava/lang/String;)I");

        let ctor = ImplMethod::new(
            "java/lang/StringBuilder",
            "<init>",
            MethodType::parse_descriptor("(Ljava/lang/String;)V").unwrap(),
            InvocationKind::NewInvokeSpecial,
        );
        assert_eq!(
            ctor.handle_type().descriptor(),
            "(Ljava/lang/String;)Ljava/lang/StringBuilder;"
        );
        assert_eq!(
            ctor.member_name(),
            "java.lang.StringBuilder.<init>(String)void/newInvokeSpecial"
        );
    }

    #[test]
    fn test_reference_kinds_round_trip() {
        for kind in [
            InvocationKind::Static,
            InvocationKind::Virtual,
            InvocationKind::Interface,
            InvocationKind::Special,
            InvocationKind::NewInvokeSpecial,
        ] {
            assert_eq!(InvocationKind::from_reference_kind(kind.reference_kind()), Some(kind));
        }
        assert_eq!(InvocationKind::from_reference_kind(1), None);
    }

    #[test]
    fn test_packages() {
        assert_eq!(package_of("java/lang/String"), "java/lang");
        assert_eq!(package_of("Toplevel"), "");
        assert_eq!(CallerClass::new("com.acme.Widget").package(), "com/acme");
        assert_eq!(CallerClass::hidden("com.acme.Widget/0x1f").package(), "com/acme");
        assert_eq!(CallerClass::new("Main").package(), "");
    }
}
