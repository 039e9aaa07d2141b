//! In-memory class model shared by the writer and the reader.

use lambda_types::{JavaType, MethodType, OBJECT_CLASS};

use crate::insn::Insn;

/// Class-file major version written by [`crate::writer::encode_class`] (Java 21).
pub const CLASSFILE_VERSION: u16 = 65;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;

/// Render access flags the way `javap` does (`private final`).
pub fn access_to_string(flags: u16, is_class: bool) -> String {
    let mut words = Vec::new();
    if flags & ACC_PUBLIC != 0 {
        words.push("public");
    }
    if flags & ACC_PRIVATE != 0 {
        words.push("private");
    }
    if flags & ACC_PROTECTED != 0 {
        words.push("protected");
    }
    if flags & ACC_STATIC != 0 {
        words.push("static");
    }
    if flags & ACC_FINAL != 0 {
        words.push("final");
    }
    if is_class && flags & ACC_SUPER != 0 {
        words.push("super");
    }
    if flags & ACC_ABSTRACT != 0 {
        words.push("abstract");
    }
    if flags & ACC_SYNTHETIC != 0 {
        words.push("synthetic");
    }
    words.join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    pub access: u16,
    pub name: String,
    pub ty: JavaType,
}

impl FieldModel {
    pub fn new(access: u16, name: impl Into<String>, ty: JavaType) -> Self {
        Self {
            access,
            name: name.into(),
            ty,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodModel {
    pub access: u16,
    pub name: String,
    pub ty: MethodType,
    /// Internal names listed in the `Exceptions` attribute.
    pub exceptions: Vec<String>,
    /// `None` for abstract methods.
    pub code: Option<Vec<Insn>>,
}

impl MethodModel {
    pub fn new(access: u16, name: impl Into<String>, ty: MethodType, code: Vec<Insn>) -> Self {
        Self {
            access,
            name: name.into(),
            ty,
            exceptions: Vec::new(),
            code: Some(code),
        }
    }

    pub fn with_exception(mut self, class: impl Into<String>) -> Self {
        self.exceptions.push(class.into());
        self
    }

    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }

    /// Locals needed for the receiver and the parameters.
    pub fn max_locals(&self) -> u16 {
        u16::from(!self.is_static()) + self.ty.parameter_slots()
    }

    /// Deepest operand stack reached by the straight-line body.
    pub fn max_stack(&self) -> u16 {
        let mut depth: i32 = 0;
        let mut max: i32 = 0;
        for insn in self.code.iter().flatten() {
            let (pops, pushes) = insn.stack_effect();
            depth = (depth - i32::from(pops)).max(0) + i32::from(pushes);
            max = max.max(depth);
        }
        max as u16
    }
}

/// A class as a list of members, with symbolic operands throughout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassModel {
    pub version: u16,
    pub access: u16,
    /// Internal name.
    pub name: String,
    pub super_class: String,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
}

impl ClassModel {
    pub fn new(access: u16, name: impl Into<String>) -> Self {
        Self {
            version: CLASSFILE_VERSION,
            access,
            name: name.into(),
            super_class: OBJECT_CLASS.to_string(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// First method with the given name.
    pub fn method(&self, name: &str) -> Option<&MethodModel> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_with_type(&self, name: &str, ty: &MethodType) -> Option<&MethodModel> {
        self.methods.iter().find(|m| m.name == name && &m.ty == ty)
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodModel> {
        self.methods.iter().filter(move |m| m.name == name)
    }

    /// Whether any method loads class data, which needs a `BootstrapMethods` attribute.
    pub fn uses_class_data(&self) -> bool {
        self.methods.iter().flat_map(|m| m.code.iter().flatten()).any(|insn| {
            matches!(
                insn,
                Insn::Ldc(crate::insn::LoadableConstant::ClassData { .. })
            )
        })
    }
}
