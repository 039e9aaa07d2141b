//! Symbolic instructions.
//!
//! Operands refer to classes and members by name; the writer interns them into
//! the constant pool and the reader resolves them back. Only the straight-line
//! subset needed by proxy classes is modelled, so no branch or local store
//! instructions exist.

use lambda_types::{JavaType, MethodType, PrimitiveKind, ValueKind};
use std::fmt;

use crate::opcodes;

/// A field reference: owner class, field name, field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub ty: JavaType,
}

impl FieldRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, ty: JavaType) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ty,
        }
    }
}

/// A method reference; `is_interface` selects `InterfaceMethodref` in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub ty: MethodType,
    pub is_interface: bool,
}

impl MethodRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, ty: MethodType) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ty,
            is_interface: false,
        }
    }

    pub fn interface(owner: impl Into<String>, name: impl Into<String>, ty: MethodType) -> Self {
        Self {
            is_interface: true,
            ..Self::new(owner, name, ty)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeOp {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvokeOp {
    pub fn opcode(self) -> u8 {
        match self {
            InvokeOp::Virtual => opcodes::INVOKEVIRTUAL,
            InvokeOp::Special => opcodes::INVOKESPECIAL,
            InvokeOp::Static => opcodes::INVOKESTATIC,
            InvokeOp::Interface => opcodes::INVOKEINTERFACE,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            InvokeOp::Virtual => "invokevirtual",
            InvokeOp::Special => "invokespecial",
            InvokeOp::Static => "invokestatic",
            InvokeOp::Interface => "invokeinterface",
        }
    }
}

/// Operand of `ldc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadableConstant {
    Int(i32),
    String(String),
    /// A class literal; internal name or array descriptor.
    Class(String),
    /// A dynamically-computed constant bootstrapped by
    /// `MethodHandles.classData`, i.e. the class data attached when the
    /// class was defined.
    ClassData { name: String, ty: JavaType },
}

/// Primitive-to-primitive conversion opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveOp {
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl PrimitiveOp {
    const ALL: [PrimitiveOp; 15] = [
        PrimitiveOp::I2L,
        PrimitiveOp::I2F,
        PrimitiveOp::I2D,
        PrimitiveOp::L2I,
        PrimitiveOp::L2F,
        PrimitiveOp::L2D,
        PrimitiveOp::F2I,
        PrimitiveOp::F2L,
        PrimitiveOp::F2D,
        PrimitiveOp::D2I,
        PrimitiveOp::D2L,
        PrimitiveOp::D2F,
        PrimitiveOp::I2B,
        PrimitiveOp::I2C,
        PrimitiveOp::I2S,
    ];

    /// Opcodes are contiguous from `i2l` to `i2s` in declaration order.
    pub fn opcode(self) -> u8 {
        opcodes::I2L + self as u8
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        if (opcodes::I2L..=opcodes::I2S).contains(&opcode) {
            Some(Self::ALL[(opcode - opcodes::I2L) as usize])
        } else {
            None
        }
    }

    pub fn source_kind(self) -> ValueKind {
        use PrimitiveOp::*;
        match self {
            I2L | I2F | I2D | I2B | I2C | I2S => ValueKind::Int,
            L2I | L2F | L2D => ValueKind::Long,
            F2I | F2L | F2D => ValueKind::Float,
            D2I | D2L | D2F => ValueKind::Double,
        }
    }

    pub fn target_kind(self) -> ValueKind {
        use PrimitiveOp::*;
        match self {
            L2I | F2I | D2I | I2B | I2C | I2S => ValueKind::Int,
            I2L | F2L | D2L => ValueKind::Long,
            I2F | L2F | D2F => ValueKind::Float,
            I2D | L2D | F2D => ValueKind::Double,
        }
    }

    /// The opcode converting a value of computational kind `from` into the
    /// primitive `to`, if the JVM has one. Sub-int targets use the truncating
    /// `i2b`/`i2c`/`i2s` forms; from a two-slot or float source only the
    /// first step (`l2i`, `f2i`, `d2i`) is returned.
    pub fn between(from: PrimitiveKind, to: PrimitiveKind) -> Option<Self> {
        use PrimitiveOp::*;
        let op = match (from.value_kind(), to) {
            (ValueKind::Int, PrimitiveKind::Long) => I2L,
            (ValueKind::Int, PrimitiveKind::Float) => I2F,
            (ValueKind::Int, PrimitiveKind::Double) => I2D,
            (ValueKind::Int, PrimitiveKind::Byte) => I2B,
            (ValueKind::Int, PrimitiveKind::Char) => I2C,
            (ValueKind::Int, PrimitiveKind::Short) => I2S,
            (ValueKind::Long, PrimitiveKind::Float) => L2F,
            (ValueKind::Long, PrimitiveKind::Double) => L2D,
            (ValueKind::Long, _) if to.value_kind() == ValueKind::Int => L2I,
            (ValueKind::Float, PrimitiveKind::Long) => F2L,
            (ValueKind::Float, PrimitiveKind::Double) => F2D,
            (ValueKind::Float, _) if to.value_kind() == ValueKind::Int => F2I,
            (ValueKind::Double, PrimitiveKind::Long) => D2L,
            (ValueKind::Double, PrimitiveKind::Float) => D2F,
            (ValueKind::Double, _) if to.value_kind() == ValueKind::Int => D2I,
            _ => return None,
        };
        Some(op)
    }

    pub fn mnemonic(self) -> &'static str {
        use PrimitiveOp::*;
        match self {
            I2L => "i2l",
            I2F => "i2f",
            I2D => "i2d",
            L2I => "l2i",
            L2F => "l2f",
            L2D => "l2d",
            F2I => "f2i",
            F2L => "f2l",
            F2D => "f2d",
            D2I => "d2i",
            D2L => "d2l",
            D2F => "d2f",
            I2B => "i2b",
            I2C => "i2c",
            I2S => "i2s",
        }
    }
}

/// One instruction of a method body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Insn {
    /// `xload` of a local slot (short forms chosen by the writer).
    Load { kind: ValueKind, slot: u16 },
    New(String),
    Dup,
    CheckCast(String),
    ANewArray(String),
    AAStore,
    AThrow,
    GetField(FieldRef),
    PutField(FieldRef),
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    Invoke { op: InvokeOp, method: MethodRef },
    Ldc(LoadableConstant),
    /// Integer constant; encoded as `iconst`, `bipush`, `sipush` or `ldc`.
    PushInt(i32),
    Convert(PrimitiveOp),
    /// `return` for `None`, otherwise the kind-specific `xreturn`.
    Return(Option<ValueKind>),
}

impl Insn {
    pub fn aload(slot: u16) -> Self {
        Insn::Load {
            kind: ValueKind::Reference,
            slot,
        }
    }

    /// Operand-stack slots consumed and produced.
    pub fn stack_effect(&self) -> (u16, u16) {
        match self {
            Insn::Load { kind, .. } => (0, kind.slot_size()),
            Insn::New(_) => (0, 1),
            Insn::Dup => (1, 2),
            Insn::CheckCast(_) => (1, 1),
            Insn::ANewArray(_) => (1, 1),
            Insn::AAStore => (3, 0),
            Insn::AThrow => (1, 0),
            Insn::GetField(f) => (1, f.ty.slot_size()),
            Insn::PutField(f) => (1 + f.ty.slot_size(), 0),
            Insn::GetStatic(f) => (0, f.ty.slot_size()),
            Insn::PutStatic(f) => (f.ty.slot_size(), 0),
            Insn::Invoke { op, method } => {
                let receiver = u16::from(*op != InvokeOp::Static);
                (
                    receiver + method.ty.parameter_slots(),
                    method.ty.ret.slot_size(),
                )
            }
            Insn::Ldc(_) | Insn::PushInt(_) => (0, 1),
            Insn::Convert(op) => (op.source_kind().slot_size(), op.target_kind().slot_size()),
            Insn::Return(kind) => (kind.map(ValueKind::slot_size).unwrap_or(0), 0),
        }
    }

    /// Whether control does not fall through to the next instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Insn::Return(_) | Insn::AThrow)
    }
}

fn load_mnemonic(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Int => "iload",
        ValueKind::Long => "lload",
        ValueKind::Float => "fload",
        ValueKind::Double => "dload",
        ValueKind::Reference => "aload",
    }
}

fn return_mnemonic(kind: Option<ValueKind>) -> &'static str {
    match kind {
        None => "return",
        Some(ValueKind::Int) => "ireturn",
        Some(ValueKind::Long) => "lreturn",
        Some(ValueKind::Float) => "freturn",
        Some(ValueKind::Double) => "dreturn",
        Some(ValueKind::Reference) => "areturn",
    }
}

impl fmt::Display for LoadableConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadableConstant::Int(v) => write!(f, "{}", v),
            LoadableConstant::String(s) => write!(f, "{:?}", s),
            LoadableConstant::Class(name) => write!(f, "class {}", name),
            LoadableConstant::ClassData { name, ty } => {
                write!(f, "dynamic {}:{} [MethodHandles.classData]", name, ty.descriptor())
            }
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Load { kind, slot } => write!(f, "{} {}", load_mnemonic(*kind), slot),
            Insn::New(class) => write!(f, "new {}", class),
            Insn::Dup => f.write_str("dup"),
            Insn::CheckCast(class) => write!(f, "checkcast {}", class),
            Insn::ANewArray(class) => write!(f, "anewarray {}", class),
            Insn::AAStore => f.write_str("aastore"),
            Insn::AThrow => f.write_str("athrow"),
            Insn::GetField(r) => write!(f, "getfield {}.{}:{}", r.owner, r.name, r.ty.descriptor()),
            Insn::PutField(r) => write!(f, "putfield {}.{}:{}", r.owner, r.name, r.ty.descriptor()),
            Insn::GetStatic(r) => {
                write!(f, "getstatic {}.{}:{}", r.owner, r.name, r.ty.descriptor())
            }
            Insn::PutStatic(r) => {
                write!(f, "putstatic {}.{}:{}", r.owner, r.name, r.ty.descriptor())
            }
            Insn::Invoke { op, method } => write!(
                f,
                "{} {}.{}:{}",
                op.mnemonic(),
                method.owner,
                method.name,
                method.ty.descriptor()
            ),
            Insn::Ldc(c) => write!(f, "ldc {}", c),
            Insn::PushInt(v) => write!(f, "push {}", v),
            Insn::Convert(op) => f.write_str(op.mnemonic()),
            Insn::Return(kind) => f.write_str(return_mnemonic(*kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_op_opcodes_are_contiguous() {
        assert_eq!(PrimitiveOp::I2L.opcode(), 0x85);
        assert_eq!(PrimitiveOp::D2F.opcode(), 0x90);
        assert_eq!(PrimitiveOp::I2S.opcode(), 0x93);
        for op in PrimitiveOp::ALL {
            assert_eq!(PrimitiveOp::from_opcode(op.opcode()), Some(op));
        }
        assert_eq!(PrimitiveOp::from_opcode(0x94), None);
    }

    #[test]
    fn test_between() {
        use PrimitiveKind::*;
        assert_eq!(PrimitiveOp::between(Int, Long), Some(PrimitiveOp::I2L));
        assert_eq!(PrimitiveOp::between(Char, Double), Some(PrimitiveOp::I2D));
        assert_eq!(PrimitiveOp::between(Long, Short), Some(PrimitiveOp::L2I));
        assert_eq!(PrimitiveOp::between(Double, Float), Some(PrimitiveOp::D2F));
        assert_eq!(PrimitiveOp::between(Int, Int), None);
    }

    #[test]
    fn test_invoke_stack_effect_counts_wide_slots() {
        let insn = Insn::Invoke {
            op: InvokeOp::Virtual,
            method: MethodRef::new(
                "com/acme/Calc",
                "mix",
                MethodType::parse_descriptor("(JI)D").unwrap(),
            ),
        };
        assert_eq!(insn.stack_effect(), (4, 2));
    }
}
