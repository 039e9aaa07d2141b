//! Class-file encoder.
//!
//! ```text
//! ClassModel ──► method bodies encoded first (interning operands)
//!            ──► header + constant pool + members + attributes
//! ```
//!
//! The pool is only complete once every body has been encoded, so code is
//! assembled into side buffers before the final byte layout is written.

use anyhow::{anyhow, bail, Context, Result};
use lambda_types::ValueKind;
use tracing::trace;

use crate::insn::{Insn, LoadableConstant};
use crate::model::{ClassModel, MethodModel};
use crate::opcodes::*;
use crate::pool::{ConstantPool, REF_INVOKE_STATIC};

pub const MAGIC: u32 = 0xCAFE_BABE;

/// Owner, name and descriptor of the `MethodHandles.classData` bootstrap.
pub const CLASS_DATA_BOOTSTRAP: (&str, &str, &str) = (
    "java/lang/invoke/MethodHandles",
    "classData",
    "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/Object;",
);

/// Encode a class model into class-file bytes.
pub fn encode_class(class: &ClassModel) -> Result<Vec<u8>> {
    let mut writer = ClassWriter::new();
    let bytes = writer.encode(class)?;
    trace!(
        class = %class.name,
        bytes = bytes.len(),
        pool_entries = writer.pool.count(),
        "encoded class"
    );
    Ok(bytes)
}

struct ClassWriter {
    pool: ConstantPool,
    /// Bootstrap method table: (method handle index, static argument indices).
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

impl ClassWriter {
    fn new() -> Self {
        Self {
            pool: ConstantPool::new(),
            bootstrap_methods: Vec::new(),
        }
    }

    fn encode(&mut self, class: &ClassModel) -> Result<Vec<u8>> {
        let this_class = self.pool.class(&class.name)?;
        let super_class = self.pool.class(&class.super_class)?;
        let interfaces = class
            .interfaces
            .iter()
            .map(|name| self.pool.class(name))
            .collect::<Result<Vec<_>>>()?;

        let mut fields = Vec::new();
        put_u16(&mut fields, class.fields.len() as u16);
        for field in &class.fields {
            put_u16(&mut fields, field.access);
            put_u16(&mut fields, self.pool.utf8(&field.name)?);
            put_u16(&mut fields, self.pool.utf8(&field.ty.descriptor())?);
            put_u16(&mut fields, 0);
        }

        let mut methods = Vec::new();
        put_u16(&mut methods, class.methods.len() as u16);
        for method in &class.methods {
            self.encode_method(method, &mut methods)
                .with_context(|| format!("encoding {}.{}{}", class.name, method.name, method.ty))?;
        }

        let mut attributes = Vec::new();
        if self.bootstrap_methods.is_empty() {
            put_u16(&mut attributes, 0);
        } else {
            put_u16(&mut attributes, 1);
            let name = self.pool.utf8("BootstrapMethods")?;
            let mut body = Vec::new();
            put_u16(&mut body, self.bootstrap_methods.len() as u16);
            for (handle, args) in &self.bootstrap_methods {
                put_u16(&mut body, *handle);
                put_u16(&mut body, args.len() as u16);
                for arg in args {
                    put_u16(&mut body, *arg);
                }
            }
            put_u16(&mut attributes, name);
            put_u32(&mut attributes, body.len() as u32);
            attributes.extend_from_slice(&body);
        }

        let mut out = Vec::with_capacity(256 + fields.len() + methods.len());
        put_u32(&mut out, MAGIC);
        put_u16(&mut out, 0);
        put_u16(&mut out, class.version);
        self.pool.encode(&mut out);
        put_u16(&mut out, class.access);
        put_u16(&mut out, this_class);
        put_u16(&mut out, super_class);
        put_u16(&mut out, interfaces.len() as u16);
        for idx in interfaces {
            put_u16(&mut out, idx);
        }
        out.extend_from_slice(&fields);
        out.extend_from_slice(&methods);
        out.extend_from_slice(&attributes);
        Ok(out)
    }

    fn encode_method(&mut self, method: &MethodModel, out: &mut Vec<u8>) -> Result<()> {
        put_u16(out, method.access);
        put_u16(out, self.pool.utf8(&method.name)?);
        put_u16(out, self.pool.utf8(&method.ty.descriptor())?);

        let attr_count = u16::from(method.code.is_some()) + u16::from(!method.exceptions.is_empty());
        put_u16(out, attr_count);

        if let Some(code) = &method.code {
            let mut bytecode = Vec::new();
            for insn in code {
                self.encode_insn(insn, &mut bytecode)
                    .with_context(|| format!("encoding `{}`", insn))?;
            }
            if bytecode.len() > u16::MAX as usize {
                bail!("method body too large ({} bytes)", bytecode.len());
            }
            let name = self.pool.utf8("Code")?;
            put_u16(out, name);
            // max_stack, max_locals, code_length, code, exception table, attributes
            put_u32(out, (2 + 2 + 4 + bytecode.len() + 2 + 2) as u32);
            put_u16(out, method.max_stack());
            put_u16(out, method.max_locals());
            put_u32(out, bytecode.len() as u32);
            out.extend_from_slice(&bytecode);
            put_u16(out, 0);
            put_u16(out, 0);
        }

        if !method.exceptions.is_empty() {
            let name = self.pool.utf8("Exceptions")?;
            put_u16(out, name);
            put_u32(out, (2 + 2 * method.exceptions.len()) as u32);
            put_u16(out, method.exceptions.len() as u16);
            for exception in &method.exceptions {
                let idx = self.pool.class(exception)?;
                put_u16(out, idx);
            }
        }
        Ok(())
    }

    fn encode_insn(&mut self, insn: &Insn, code: &mut Vec<u8>) -> Result<()> {
        match insn {
            Insn::Load { kind, slot } => encode_load(*kind, *slot, code),
            Insn::New(class) => self.class_op(NEW, class, code)?,
            Insn::CheckCast(class) => self.class_op(CHECKCAST, class, code)?,
            Insn::ANewArray(class) => self.class_op(ANEWARRAY, class, code)?,
            Insn::Dup => code.push(DUP),
            Insn::AAStore => code.push(AASTORE),
            Insn::AThrow => code.push(ATHROW),
            Insn::GetField(f) | Insn::PutField(f) | Insn::GetStatic(f) | Insn::PutStatic(f) => {
                let opcode = match insn {
                    Insn::GetStatic(_) => GETSTATIC,
                    Insn::PutStatic(_) => PUTSTATIC,
                    Insn::GetField(_) => GETFIELD,
                    _ => PUTFIELD,
                };
                let idx = self.pool.field_ref(&f.owner, &f.name, &f.ty.descriptor())?;
                code.push(opcode);
                put_u16(code, idx);
            }
            Insn::Invoke { op, method } => {
                let idx = self.pool.method_ref(
                    &method.owner,
                    &method.name,
                    &method.ty.descriptor(),
                    method.is_interface,
                )?;
                code.push(op.opcode());
                put_u16(code, idx);
                if op.opcode() == INVOKEINTERFACE {
                    let count = 1 + method.ty.parameter_slots();
                    code.push(u8::try_from(count).map_err(|_| anyhow!("too many arguments"))?);
                    code.push(0);
                }
            }
            Insn::Ldc(constant) => {
                let idx = self.loadable(constant)?;
                encode_ldc(idx, code);
            }
            Insn::PushInt(value) => match *value {
                -1..=5 => code.push((i32::from(ICONST_M1) + value + 1) as u8),
                v if i8::try_from(v).is_ok() => {
                    code.push(BIPUSH);
                    code.push(v as i8 as u8);
                }
                v if i16::try_from(v).is_ok() => {
                    code.push(SIPUSH);
                    code.extend_from_slice(&(v as i16).to_be_bytes());
                }
                v => {
                    let idx = self.pool.integer(v)?;
                    encode_ldc(idx, code);
                }
            },
            Insn::Convert(op) => code.push(op.opcode()),
            Insn::Return(None) => code.push(RETURN),
            Insn::Return(Some(kind)) => code.push(IRETURN + kind.opcode_offset()),
        }
        Ok(())
    }

    fn class_op(&mut self, opcode: u8, class: &str, code: &mut Vec<u8>) -> Result<()> {
        let idx = self.pool.class(class)?;
        code.push(opcode);
        put_u16(code, idx);
        Ok(())
    }

    fn loadable(&mut self, constant: &LoadableConstant) -> Result<u16> {
        match constant {
            LoadableConstant::Int(v) => self.pool.integer(*v),
            LoadableConstant::String(s) => self.pool.string(s),
            LoadableConstant::Class(name) => self.pool.class(name),
            LoadableConstant::ClassData { name, ty } => {
                let bootstrap = self.class_data_bootstrap()?;
                self.pool.dynamic(bootstrap, name, &ty.descriptor())
            }
        }
    }

    /// Index into the bootstrap table of the `classData` bootstrap, added on first use.
    fn class_data_bootstrap(&mut self) -> Result<u16> {
        let (owner, name, descriptor) = CLASS_DATA_BOOTSTRAP;
        let reference = self.pool.method_ref(owner, name, descriptor, false)?;
        let handle = self.pool.method_handle(REF_INVOKE_STATIC, reference)?;
        if let Some(pos) = self
            .bootstrap_methods
            .iter()
            .position(|(h, args)| *h == handle && args.is_empty())
        {
            return Ok(pos as u16);
        }
        self.bootstrap_methods.push((handle, Vec::new()));
        Ok((self.bootstrap_methods.len() - 1) as u16)
    }
}

fn encode_load(kind: ValueKind, slot: u16, code: &mut Vec<u8>) {
    let offset = kind.opcode_offset();
    if slot <= 3 {
        code.push(ILOAD_0 + offset * 4 + slot as u8);
    } else if slot <= u8::MAX as u16 {
        code.push(ILOAD + offset);
        code.push(slot as u8);
    } else {
        code.push(WIDE);
        code.push(ILOAD + offset);
        put_u16(code, slot);
    }
}

fn encode_ldc(idx: u16, code: &mut Vec<u8>) {
    if idx <= u8::MAX as u16 {
        code.push(LDC);
        code.push(idx as u8);
    } else {
        code.push(LDC_W);
        put_u16(code, idx);
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}
