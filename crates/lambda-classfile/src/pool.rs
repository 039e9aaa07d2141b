//! Constant pool: entries, deduplicating builder, and lookups used by the reader.

use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;

/// Longest encoded Utf8 constant a class file can hold.
pub const MAX_UTF8_LEN: usize = u16::MAX as usize;

pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELDREF: u8 = 9;
pub const TAG_METHODREF: u8 = 10;
pub const TAG_INTERFACE_METHODREF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

/// `REF_invokeStatic` as used in `CONSTANT_MethodHandle`.
pub const REF_INVOKE_STATIC: u8 = 6;

/// One constant pool entry. Float and double payloads are kept as raw bits
/// so entries can be hashed for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

impl Constant {
    /// Long and double entries occupy two pool indices.
    pub fn width(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => TAG_UTF8,
            Constant::Integer(_) => TAG_INTEGER,
            Constant::Float(_) => TAG_FLOAT,
            Constant::Long(_) => TAG_LONG,
            Constant::Double(_) => TAG_DOUBLE,
            Constant::Class(_) => TAG_CLASS,
            Constant::String(_) => TAG_STRING,
            Constant::FieldRef { .. } => TAG_FIELDREF,
            Constant::MethodRef { .. } => TAG_METHODREF,
            Constant::InterfaceMethodRef { .. } => TAG_INTERFACE_METHODREF,
            Constant::NameAndType { .. } => TAG_NAME_AND_TYPE,
            Constant::MethodHandle { .. } => TAG_METHOD_HANDLE,
            Constant::MethodType(_) => TAG_METHOD_TYPE,
            Constant::Dynamic { .. } => TAG_DYNAMIC,
            Constant::InvokeDynamic { .. } => TAG_INVOKE_DYNAMIC,
            Constant::Module(_) => TAG_MODULE,
            Constant::Package(_) => TAG_PACKAGE,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        match self {
            Constant::Utf8(s) => {
                let bytes = encode_modified_utf8(s);
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(&bytes);
            }
            Constant::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
            Constant::Float(bits) => out.extend_from_slice(&bits.to_be_bytes()),
            Constant::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            Constant::Double(bits) => out.extend_from_slice(&bits.to_be_bytes()),
            Constant::Class(i)
            | Constant::String(i)
            | Constant::MethodType(i)
            | Constant::Module(i)
            | Constant::Package(i) => out.extend_from_slice(&i.to_be_bytes()),
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                out.extend_from_slice(&class.to_be_bytes());
                out.extend_from_slice(&name_and_type.to_be_bytes());
            }
            Constant::NameAndType { name, descriptor } => {
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&descriptor.to_be_bytes());
            }
            Constant::MethodHandle { kind, reference } => {
                out.push(*kind);
                out.extend_from_slice(&reference.to_be_bytes());
            }
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                out.extend_from_slice(&bootstrap.to_be_bytes());
                out.extend_from_slice(&name_and_type.to_be_bytes());
            }
        }
    }
}

/// Constant pool with 1-based indices. Entries added through [`ConstantPool::add`]
/// are deduplicated.
#[derive(Debug, Default, Clone)]
pub struct ConstantPool {
    /// Slot 0 and the upper half of wide entries are `None`.
    entries: Vec<Option<Constant>>,
    index: HashMap<Constant, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![None],
            index: HashMap::new(),
        }
    }

    /// Number written as `constant_pool_count`.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        if let Some(&idx) = self.index.get(&constant) {
            return Ok(idx);
        }
        let idx = self.push(constant.clone())?;
        self.index.insert(constant, idx);
        Ok(idx)
    }

    /// Append without deduplication; used when decoding.
    pub(crate) fn push(&mut self, constant: Constant) -> Result<u16> {
        let idx = self.entries.len();
        let width = constant.width() as usize;
        if idx + width > u16::MAX as usize {
            bail!("constant pool overflow ({} entries)", idx + width);
        }
        self.entries.push(Some(constant));
        if width == 2 {
            self.entries.push(None);
        }
        Ok(idx as u16)
    }

    /// Fails when the modified UTF-8 form exceeds the u2 length field.
    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        let encoded_len = encode_modified_utf8(value).len();
        if encoded_len > MAX_UTF8_LEN {
            bail!(
                "string constant of {} bytes exceeds the {} byte limit",
                encoded_len,
                MAX_UTF8_LEN
            );
        }
        self.add(Constant::Utf8(value.to_string()))
    }

    pub fn class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.utf8(internal_name)?;
        self.add(Constant::Class(name))
    }

    pub fn string(&mut self, value: &str) -> Result<u16> {
        let utf8 = self.utf8(value)?;
        self.add(Constant::String(utf8))
    }

    pub fn integer(&mut self, value: i32) -> Result<u16> {
        self.add(Constant::Integer(value))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.add(Constant::NameAndType { name, descriptor })
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef {
            class,
            name_and_type,
        })
    }

    pub fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        if is_interface {
            self.add(Constant::InterfaceMethodRef {
                class,
                name_and_type,
            })
        } else {
            self.add(Constant::MethodRef {
                class,
                name_and_type,
            })
        }
    }

    pub fn method_handle(&mut self, kind: u8, reference: u16) -> Result<u16> {
        self.add(Constant::MethodHandle { kind, reference })
    }

    pub fn dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> Result<u16> {
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(Constant::Dynamic {
            bootstrap,
            name_and_type,
        })
    }

    pub fn get(&self, idx: u16) -> Result<&Constant> {
        self.entries
            .get(idx as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| anyhow!("invalid constant pool index {}", idx))
    }

    pub fn get_utf8(&self, idx: u16) -> Result<&str> {
        match self.get(idx)? {
            Constant::Utf8(s) => Ok(s),
            other => bail!("constant #{} is not Utf8: {:?}", idx, other),
        }
    }

    pub fn get_class_name(&self, idx: u16) -> Result<&str> {
        match self.get(idx)? {
            Constant::Class(name) => self.get_utf8(*name),
            other => bail!("constant #{} is not a Class: {:?}", idx, other),
        }
    }

    pub fn get_name_and_type(&self, idx: u16) -> Result<(&str, &str)> {
        match self.get(idx)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.get_utf8(*name)?, self.get_utf8(*descriptor)?))
            }
            other => bail!("constant #{} is not a NameAndType: {:?}", idx, other),
        }
    }

    /// Resolve a field or method reference to `(owner, name, descriptor, is_interface)`.
    pub fn get_member_ref(&self, idx: u16) -> Result<(&str, &str, &str, bool)> {
        let (class, nat, is_interface) = match self.get(idx)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            other => bail!("constant #{} is not a member reference: {:?}", idx, other),
        };
        let owner = self.get_class_name(class)?;
        let (name, descriptor) = self.get_name_and_type(nat)?;
        Ok((owner, name, descriptor, is_interface))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for constant in self.entries.iter().flatten() {
            constant.encode(out);
        }
    }
}

/// Encode a string as the JVM's modified UTF-8: NUL as two bytes and
/// supplementary characters as surrogate pairs.
pub fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let cont = |off: usize| -> Result<u16> {
            match bytes.get(i + off) {
                Some(&c) if c & 0xc0 == 0x80 => Ok(u16::from(c & 0x3f)),
                _ => bail!("malformed modified UTF-8 at byte {}", i),
            }
        };
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xe0 == 0xc0 {
            units.push((u16::from(b & 0x1f) << 6) | cont(1)?);
            i += 2;
        } else if b & 0xf0 == 0xe0 {
            units.push((u16::from(b & 0x0f) << 12) | (cont(1)? << 6) | cont(2)?);
            i += 3;
        } else {
            bail!("malformed modified UTF-8 at byte {}", i);
        }
    }
    String::from_utf16(&units).map_err(|e| anyhow!("invalid UTF-16 in Utf8 constant: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_indices() {
        let mut pool = ConstantPool::new();
        let a = pool.class("java/lang/Object").unwrap();
        let b = pool.class("java/lang/Object").unwrap();
        assert_eq!(a, b);
        // Utf8 at 1, Class at 2.
        assert_eq!(a, 2);
        assert_eq!(pool.get_class_name(a).unwrap(), "java/lang/Object");
    }

    #[test]
    fn test_wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.add(Constant::Long(7)).unwrap();
        let next = pool.integer(1).unwrap();
        assert_eq!(next, long + 2);
        assert!(pool.get(long + 1).is_err());
    }

    #[test]
    fn test_oversized_utf8_rejected() {
        let mut pool = ConstantPool::new();
        assert!(pool.utf8(&"a".repeat(MAX_UTF8_LEN)).is_ok());
        let err = pool.utf8(&"b".repeat(MAX_UTF8_LEN + 1)).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        // NUL takes two bytes in modified UTF-8.
        assert!(pool.utf8(&"\0".repeat(MAX_UTF8_LEN / 2 + 1)).is_err());
    }

    #[test]
    fn test_modified_utf8() {
        for s in ["plain", "a\0b", "caf\u{e9}", "\u{1F600}"] {
            let encoded = encode_modified_utf8(s);
            assert!(!encoded.contains(&0), "{:?}", s);
            assert_eq!(decode_modified_utf8(&encoded).unwrap(), s);
        }
        // Supplementary characters become two 3-byte surrogates.
        assert_eq!(encode_modified_utf8("\u{1F600}").len(), 6);
    }

    #[test]
    fn test_member_ref_lookup() {
        let mut pool = ConstantPool::new();
        let idx = pool
            .method_ref("java/util/List", "size", "()I", true)
            .unwrap();
        let (owner, name, desc, is_interface) = pool.get_member_ref(idx).unwrap();
        assert_eq!((owner, name, desc, is_interface), ("java/util/List", "size", "()I", true));
    }
}
