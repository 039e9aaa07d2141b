//! Class-file decoder.
//!
//! Parses any well-formed constant pool but lifts only the instruction
//! subset of [`Insn`] out of method bodies; other opcodes are rejected.
//! An `ldc` of an Integer constant decodes as [`LoadableConstant::Int`].

use anyhow::{anyhow, bail, Context, Result};
use lambda_types::{JavaType, MethodType, ValueKind};

use crate::insn::{FieldRef, Insn, InvokeOp, LoadableConstant, MethodRef, PrimitiveOp};
use crate::model::{ClassModel, FieldModel, MethodModel};
use crate::opcodes::*;
use crate::pool::{
    decode_modified_utf8, Constant, ConstantPool, TAG_CLASS, TAG_DOUBLE, TAG_DYNAMIC,
    TAG_FIELDREF, TAG_FLOAT, TAG_INTEGER, TAG_INTERFACE_METHODREF, TAG_INVOKE_DYNAMIC, TAG_LONG,
    TAG_METHODREF, TAG_METHOD_HANDLE, TAG_METHOD_TYPE, TAG_MODULE, TAG_NAME_AND_TYPE,
    TAG_PACKAGE, TAG_STRING, TAG_UTF8,
};
use crate::writer::{CLASS_DATA_BOOTSTRAP, MAGIC};

/// Decode class-file bytes into a [`ClassModel`].
pub fn decode_class(bytes: &[u8]) -> Result<ClassModel> {
    let mut r = ByteReader::new(bytes);
    let magic = r.u32()?;
    if magic != MAGIC {
        bail!("bad magic 0x{:08X}", magic);
    }
    let _minor = r.u16()?;
    let version = r.u16()?;
    let pool = read_pool(&mut r).context("reading constant pool")?;

    let access = r.u16()?;
    let name = pool.get_class_name(r.u16()?)?.to_string();
    let super_idx = r.u16()?;
    let super_class = if super_idx == 0 {
        String::new()
    } else {
        pool.get_class_name(super_idx)?.to_string()
    };
    let interface_count = r.u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(pool.get_class_name(r.u16()?)?.to_string());
    }

    let field_count = r.u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let access = r.u16()?;
        let name = pool.get_utf8(r.u16()?)?.to_string();
        let ty = JavaType::parse_descriptor(pool.get_utf8(r.u16()?)?)?;
        skip_attributes(&mut r)?;
        fields.push(FieldModel { access, name, ty });
    }

    // Bodies are decoded after the class attributes, which hold the bootstrap table.
    let method_count = r.u16()?;
    let mut raw_methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        raw_methods.push(read_method(&mut r, &pool)?);
    }

    let mut bootstrap_methods = Vec::new();
    let attr_count = r.u16()?;
    for _ in 0..attr_count {
        let attr_name = pool.get_utf8(r.u16()?)?;
        let len = r.u32()? as usize;
        let body = r.bytes(len)?;
        if attr_name == "BootstrapMethods" {
            bootstrap_methods = read_bootstrap_methods(body)?;
        }
    }
    if r.remaining() != 0 {
        bail!("{} trailing bytes after class file", r.remaining());
    }

    let context = CodeContext {
        pool: &pool,
        bootstrap_methods: &bootstrap_methods,
    };
    let methods = raw_methods
        .into_iter()
        .map(|raw| {
            let code = match &raw.code {
                Some(bytes) => Some(
                    context
                        .decode(bytes)
                        .with_context(|| format!("decoding {}{}", raw.name, raw.ty))?,
                ),
                None => None,
            };
            Ok(MethodModel {
                access: raw.access,
                name: raw.name,
                ty: raw.ty,
                exceptions: raw.exceptions,
                code,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ClassModel {
        version,
        access,
        name,
        super_class,
        interfaces,
        fields,
        methods,
    })
}

struct RawMethod {
    access: u16,
    name: String,
    ty: MethodType,
    exceptions: Vec<String>,
    code: Option<Vec<u8>>,
}

fn read_method(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<RawMethod> {
    let access = r.u16()?;
    let name = pool.get_utf8(r.u16()?)?.to_string();
    let ty = MethodType::parse_descriptor(pool.get_utf8(r.u16()?)?)?;
    let mut exceptions = Vec::new();
    let mut code = None;
    let attr_count = r.u16()?;
    for _ in 0..attr_count {
        let attr_name = pool.get_utf8(r.u16()?)?;
        let len = r.u32()? as usize;
        let body = r.bytes(len)?;
        match attr_name {
            "Code" => {
                let mut c = ByteReader::new(body);
                let _max_stack = c.u16()?;
                let _max_locals = c.u16()?;
                let code_len = c.u32()? as usize;
                code = Some(c.bytes(code_len)?.to_vec());
                let handlers = c.u16()?;
                if handlers != 0 {
                    bail!("{}: exception handlers are not supported", name);
                }
            }
            "Exceptions" => {
                let mut e = ByteReader::new(body);
                let count = e.u16()?;
                for _ in 0..count {
                    exceptions.push(pool.get_class_name(e.u16()?)?.to_string());
                }
            }
            _ => {}
        }
    }
    Ok(RawMethod {
        access,
        name,
        ty,
        exceptions,
        code,
    })
}

fn read_pool(r: &mut ByteReader<'_>) -> Result<ConstantPool> {
    let count = r.u16()?;
    let mut pool = ConstantPool::new();
    while (pool.count() as u16) < count {
        let tag = r.u8()?;
        let constant = match tag {
            TAG_UTF8 => {
                let len = r.u16()? as usize;
                Constant::Utf8(decode_modified_utf8(r.bytes(len)?)?)
            }
            TAG_INTEGER => Constant::Integer(r.u32()? as i32),
            TAG_FLOAT => Constant::Float(r.u32()?),
            TAG_LONG => Constant::Long(r.u64()? as i64),
            TAG_DOUBLE => Constant::Double(r.u64()?),
            TAG_CLASS => Constant::Class(r.u16()?),
            TAG_STRING => Constant::String(r.u16()?),
            TAG_METHOD_TYPE => Constant::MethodType(r.u16()?),
            TAG_MODULE => Constant::Module(r.u16()?),
            TAG_PACKAGE => Constant::Package(r.u16()?),
            TAG_FIELDREF => Constant::FieldRef {
                class: r.u16()?,
                name_and_type: r.u16()?,
            },
            TAG_METHODREF => Constant::MethodRef {
                class: r.u16()?,
                name_and_type: r.u16()?,
            },
            TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                class: r.u16()?,
                name_and_type: r.u16()?,
            },
            TAG_NAME_AND_TYPE => Constant::NameAndType {
                name: r.u16()?,
                descriptor: r.u16()?,
            },
            TAG_METHOD_HANDLE => Constant::MethodHandle {
                kind: r.u8()?,
                reference: r.u16()?,
            },
            TAG_DYNAMIC => Constant::Dynamic {
                bootstrap: r.u16()?,
                name_and_type: r.u16()?,
            },
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap: r.u16()?,
                name_and_type: r.u16()?,
            },
            other => bail!("unknown constant tag {} at entry {}", other, pool.count()),
        };
        pool.push(constant)?;
    }
    Ok(pool)
}

fn read_bootstrap_methods(body: &[u8]) -> Result<Vec<(u16, Vec<u16>)>> {
    let mut r = ByteReader::new(body);
    let count = r.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let handle = r.u16()?;
        let argc = r.u16()?;
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(r.u16()?);
        }
        out.push((handle, args));
    }
    Ok(out)
}

fn skip_attributes(r: &mut ByteReader<'_>) -> Result<()> {
    let count = r.u16()?;
    for _ in 0..count {
        let _name = r.u16()?;
        let len = r.u32()? as usize;
        r.bytes(len)?;
    }
    Ok(())
}

struct CodeContext<'a> {
    pool: &'a ConstantPool,
    bootstrap_methods: &'a [(u16, Vec<u16>)],
}

impl CodeContext<'_> {
    fn decode(&self, code: &[u8]) -> Result<Vec<Insn>> {
        let mut r = ByteReader::new(code);
        let mut insns = Vec::new();
        while r.remaining() > 0 {
            let at = r.pos;
            let opcode = r.u8()?;
            let insn = self
                .decode_one(opcode, &mut r)
                .with_context(|| format!("at bytecode offset {}", at))?;
            insns.push(insn);
        }
        Ok(insns)
    }

    fn decode_one(&self, opcode: u8, r: &mut ByteReader<'_>) -> Result<Insn> {
        let insn = match opcode {
            ICONST_M1..=ICONST_5 => Insn::PushInt(i32::from(opcode) - i32::from(ICONST_M1) - 1),
            BIPUSH => Insn::PushInt(i32::from(r.u8()? as i8)),
            SIPUSH => Insn::PushInt(i32::from(r.u16()? as i16)),
            LDC => self.ldc(u16::from(r.u8()?))?,
            LDC_W => self.ldc(r.u16()?)?,
            ILOAD..=ALOAD => Insn::Load {
                kind: kind_from_offset(opcode - ILOAD)?,
                slot: u16::from(r.u8()?),
            },
            ILOAD_0..=ALOAD_3 => {
                let n = opcode - ILOAD_0;
                Insn::Load {
                    kind: kind_from_offset(n / 4)?,
                    slot: u16::from(n % 4),
                }
            }
            WIDE => {
                let inner = r.u8()?;
                if !(ILOAD..=ALOAD).contains(&inner) {
                    bail!("unsupported wide opcode 0x{:02x}", inner);
                }
                Insn::Load {
                    kind: kind_from_offset(inner - ILOAD)?,
                    slot: r.u16()?,
                }
            }
            AASTORE => Insn::AAStore,
            DUP => Insn::Dup,
            I2L..=I2S => Insn::Convert(
                PrimitiveOp::from_opcode(opcode)
                    .ok_or_else(|| anyhow!("bad conversion opcode 0x{:02x}", opcode))?,
            ),
            IRETURN..=ARETURN => Insn::Return(Some(kind_from_offset(opcode - IRETURN)?)),
            RETURN => Insn::Return(None),
            GETSTATIC => Insn::GetStatic(self.field(r.u16()?)?),
            PUTSTATIC => Insn::PutStatic(self.field(r.u16()?)?),
            GETFIELD => Insn::GetField(self.field(r.u16()?)?),
            PUTFIELD => Insn::PutField(self.field(r.u16()?)?),
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
                let op = match opcode {
                    INVOKEVIRTUAL => InvokeOp::Virtual,
                    INVOKESPECIAL => InvokeOp::Special,
                    INVOKESTATIC => InvokeOp::Static,
                    _ => InvokeOp::Interface,
                };
                let method = self.method(r.u16()?)?;
                if op == InvokeOp::Interface {
                    let _count = r.u8()?;
                    let _zero = r.u8()?;
                }
                Insn::Invoke { op, method }
            }
            NEW => Insn::New(self.pool.get_class_name(r.u16()?)?.to_string()),
            ANEWARRAY => Insn::ANewArray(self.pool.get_class_name(r.u16()?)?.to_string()),
            CHECKCAST => Insn::CheckCast(self.pool.get_class_name(r.u16()?)?.to_string()),
            ATHROW => Insn::AThrow,
            other => bail!("unsupported opcode 0x{:02x}", other),
        };
        Ok(insn)
    }

    fn field(&self, idx: u16) -> Result<FieldRef> {
        let (owner, name, descriptor, _) = self.pool.get_member_ref(idx)?;
        Ok(FieldRef::new(owner, name, JavaType::parse_descriptor(descriptor)?))
    }

    fn method(&self, idx: u16) -> Result<MethodRef> {
        let (owner, name, descriptor, is_interface) = self.pool.get_member_ref(idx)?;
        Ok(MethodRef {
            owner: owner.to_string(),
            name: name.to_string(),
            ty: MethodType::parse_descriptor(descriptor)?,
            is_interface,
        })
    }

    fn ldc(&self, idx: u16) -> Result<Insn> {
        let constant = match self.pool.get(idx)? {
            Constant::Integer(v) => LoadableConstant::Int(*v),
            Constant::String(utf8) => LoadableConstant::String(self.pool.get_utf8(*utf8)?.to_string()),
            Constant::Class(name) => LoadableConstant::Class(self.pool.get_utf8(*name)?.to_string()),
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            } => {
                self.check_class_data_bootstrap(*bootstrap)?;
                let (name, descriptor) = self.pool.get_name_and_type(*name_and_type)?;
                LoadableConstant::ClassData {
                    name: name.to_string(),
                    ty: JavaType::parse_descriptor(descriptor)?,
                }
            }
            other => bail!("unsupported ldc operand {:?}", other),
        };
        Ok(Insn::Ldc(constant))
    }

    fn check_class_data_bootstrap(&self, bootstrap: u16) -> Result<()> {
        let (handle, args) = self
            .bootstrap_methods
            .get(bootstrap as usize)
            .ok_or_else(|| anyhow!("missing bootstrap method {}", bootstrap))?;
        let reference = match self.pool.get(*handle)? {
            Constant::MethodHandle { reference, .. } => *reference,
            other => bail!("bootstrap entry is not a method handle: {:?}", other),
        };
        let (owner, name, descriptor, _) = self.pool.get_member_ref(reference)?;
        if (owner, name, descriptor) != CLASS_DATA_BOOTSTRAP || !args.is_empty() {
            bail!(
                "unsupported dynamic constant bootstrap {}.{}{}",
                owner,
                name,
                descriptor
            );
        }
        Ok(())
    }
}

fn kind_from_offset(offset: u8) -> Result<ValueKind> {
    Ok(match offset {
        0 => ValueKind::Int,
        1 => ValueKind::Long,
        2 => ValueKind::Float,
        3 => ValueKind::Double,
        4 => ValueKind::Reference,
        _ => bail!("bad value kind offset {}", offset),
    })
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            bail!(
                "unexpected end of data: wanted {} bytes at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            );
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let hi = u64::from(self.u32()?);
        let lo = u64::from(self.u32()?);
        Ok(hi << 32 | lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_SUPER, ACC_SYNTHETIC};
    use crate::writer::encode_class;

    fn sample_class() -> ClassModel {
        let owner = "com/acme/Main$$Lambda";
        let mut class = ClassModel::new(ACC_SUPER | ACC_FINAL | ACC_SYNTHETIC, owner);
        class.interfaces.push("java/util/function/IntSupplier".into());
        class.fields.push(FieldModel::new(
            ACC_PRIVATE | ACC_FINAL,
            "arg$1",
            JavaType::INT,
        ));
        class.methods.push(MethodModel::new(
            ACC_PUBLIC,
            "getAsInt",
            MethodType::parse_descriptor("()I").unwrap(),
            vec![
                Insn::Ldc(LoadableConstant::ClassData {
                    name: "_".into(),
                    ty: JavaType::class("java/lang/invoke/MethodHandle"),
                }),
                Insn::aload(0),
                Insn::GetField(FieldRef::new(owner, "arg$1", JavaType::INT)),
                Insn::Invoke {
                    op: InvokeOp::Virtual,
                    method: MethodRef::new(
                        "java/lang/invoke/MethodHandle",
                        "invokeExact",
                        MethodType::parse_descriptor("(I)I").unwrap(),
                    ),
                },
                Insn::Return(Some(ValueKind::Int)),
            ],
        ));
        class.methods.push(
            MethodModel::new(
                ACC_PRIVATE | ACC_FINAL,
                "readObject",
                MethodType::parse_descriptor("(Ljava/io/ObjectInputStream;)V").unwrap(),
                vec![
                    Insn::New("java/io/NotSerializableException".into()),
                    Insn::Dup,
                    Insn::Ldc(LoadableConstant::String("Non-serializable lambda".into())),
                    Insn::Invoke {
                        op: InvokeOp::Special,
                        method: MethodRef::new(
                            "java/io/NotSerializableException",
                            "<init>",
                            MethodType::parse_descriptor("(Ljava/lang/String;)V").unwrap(),
                        ),
                    },
                    Insn::AThrow,
                ],
            )
            .with_exception("java/io/NotSerializableException"),
        );
        class
    }

    #[test]
    fn test_decode_matches_model() {
        let class = sample_class();
        let bytes = encode_class(&class).unwrap();
        let decoded = decode_class(&bytes).unwrap();
        assert_eq!(decoded, class);
        assert!(decoded.uses_class_data());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode_class(&sample_class()).unwrap();
        bytes[0] = 0;
        let err = decode_class(&bytes).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_rejects_truncated_input() {
        let bytes = encode_class(&sample_class()).unwrap();
        assert!(decode_class(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_rejects_unsupported_opcode() {
        let ctx = CodeContext {
            pool: &ConstantPool::new(),
            bootstrap_methods: &[],
        };
        // iadd
        let err = ctx.decode(&[0x60]).unwrap_err();
        assert!(format!("{:#}", err).contains("unsupported opcode 0x60"));
    }
}
