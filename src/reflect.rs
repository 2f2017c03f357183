//! Reflective bridge: compiled classfile bytes back into a [`ClassInfo`]
//!
//! Given an already-existing compiled class, produce the same structural
//! description a generator produces, so generated and pre-existing classes
//! can be compared and validated through one contract. Only the structural
//! surface is read: constant pool, flags, supertypes, field and method
//! tables, and the `Exceptions` attribute; code and other attributes are
//! skipped.

use thiserror::Error;

use crate::types::{
    parse_field_descriptor, parse_method_descriptor, ClassInfo, FieldInfo, MethodInfo, Type,
};

#[derive(Error, Debug)]
pub enum ReflectError {
    #[error("unexpected end of classfile")]
    UnexpectedEof,
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("unknown constant tag {0}")]
    UnknownConstantTag(u8),
    #[error("constant pool index {0} is not a {1}")]
    BadPoolIndex(u16, &'static str),
    #[error("malformed descriptor '{0}'")]
    BadDescriptor(String),
    #[error("malformed utf8 in constant pool")]
    BadUtf8,
}

/// Parsed constant-pool surface; only the entry kinds the bridge reads.
enum PoolEntry {
    Utf8(String),
    Class(u16),
    Other,
    /// Second slot of a long/double entry.
    Hole,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, ReflectError> {
        let value = *self.bytes.get(self.pos).ok_or(ReflectError::UnexpectedEof)?;
        self.pos += 1;
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16, ReflectError> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn u32(&mut self) -> Result<u32, ReflectError> {
        Ok(u32::from_be_bytes([self.u8()?, self.u8()?, self.u8()?, self.u8()?]))
    }

    fn skip(&mut self, n: usize) -> Result<(), ReflectError> {
        if self.pos + n > self.bytes.len() {
            return Err(ReflectError::UnexpectedEof);
        }
        self.pos += n;
        Ok(())
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], ReflectError> {
        if self.pos + n > self.bytes.len() {
            return Err(ReflectError::UnexpectedEof);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

/// Introspect compiled classfile bytes into a `ClassInfo`.
pub fn class_info_from_bytes(bytes: &[u8]) -> Result<ClassInfo, ReflectError> {
    let mut reader = Reader::new(bytes);
    let magic = reader.u32()?;
    if magic != 0xCAFEBABE {
        return Err(ReflectError::BadMagic(magic));
    }
    let _minor = reader.u16()?;
    let _major = reader.u16()?;

    let pool = read_pool(&mut reader)?;

    let access = reader.u16()?;
    let this_class = reader.u16()?;
    let name = class_name(&pool, this_class)?;
    let super_index = reader.u16()?;
    let super_class = if super_index == 0 {
        None
    } else {
        Some(Type::class(&class_name(&pool, super_index)?))
    };

    let interface_count = reader.u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        let index = reader.u16()?;
        interfaces.push(Type::class(&class_name(&pool, index)?));
    }

    let field_count = reader.u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let field_access = reader.u16()?;
        let field_name = utf8(&pool, reader.u16()?)?;
        let descriptor = utf8(&pool, reader.u16()?)?;
        let field_type = parse_field_descriptor(&descriptor)
            .map_err(|_| ReflectError::BadDescriptor(descriptor.clone()))?;
        skip_attributes(&mut reader)?;
        fields.push(FieldInfo { access: field_access, name: field_name, field_type });
    }

    let method_count = reader.u16()?;
    let mut methods = Vec::new();
    let mut constructors = Vec::new();
    for _ in 0..method_count {
        let method_access = reader.u16()?;
        let method_name = utf8(&pool, reader.u16()?)?;
        let descriptor = utf8(&pool, reader.u16()?)?;
        let signature = parse_method_descriptor(&descriptor)
            .map_err(|_| ReflectError::BadDescriptor(descriptor.clone()))?;
        let exceptions = read_method_attributes(&mut reader, &pool)?;
        let info = MethodInfo { access: method_access, name: method_name, signature, exceptions };
        match info.name.as_str() {
            "<init>" => constructors.push(info),
            // Class initialization is not part of the structural surface.
            "<clinit>" => {}
            _ => methods.push(info),
        }
    }

    Ok(ClassInfo { access, name, super_class, interfaces, fields, methods, constructors })
}

fn read_pool(reader: &mut Reader<'_>) -> Result<Vec<PoolEntry>, ReflectError> {
    let count = reader.u16()?;
    let mut pool: Vec<PoolEntry> = Vec::with_capacity(count as usize);
    // Index 0 is unused; entries are 1-based.
    pool.push(PoolEntry::Hole);
    while pool.len() < count as usize {
        let tag = reader.u8()?;
        match tag {
            // Utf8
            1 => {
                let length = reader.u16()? as usize;
                let raw = reader.bytes(length)?;
                let text = std::str::from_utf8(raw).map_err(|_| ReflectError::BadUtf8)?;
                pool.push(PoolEntry::Utf8(text.to_string()));
            }
            // Integer, Float
            3 | 4 => {
                reader.skip(4)?;
                pool.push(PoolEntry::Other);
            }
            // Long, Double take two slots
            5 | 6 => {
                reader.skip(8)?;
                pool.push(PoolEntry::Other);
                pool.push(PoolEntry::Hole);
            }
            // Class
            7 => {
                let name_index = reader.u16()?;
                pool.push(PoolEntry::Class(name_index));
            }
            // String, MethodType, Module, Package
            8 | 16 | 19 | 20 => {
                reader.skip(2)?;
                pool.push(PoolEntry::Other);
            }
            // FieldRef, MethodRef, InterfaceMethodRef, NameAndType,
            // Dynamic, InvokeDynamic
            9 | 10 | 11 | 12 | 17 | 18 => {
                reader.skip(4)?;
                pool.push(PoolEntry::Other);
            }
            // MethodHandle
            15 => {
                reader.skip(3)?;
                pool.push(PoolEntry::Other);
            }
            other => return Err(ReflectError::UnknownConstantTag(other)),
        }
    }
    Ok(pool)
}

fn utf8(pool: &[PoolEntry], index: u16) -> Result<String, ReflectError> {
    match pool.get(index as usize) {
        Some(PoolEntry::Utf8(text)) => Ok(text.clone()),
        _ => Err(ReflectError::BadPoolIndex(index, "Utf8")),
    }
}

fn class_name(pool: &[PoolEntry], index: u16) -> Result<String, ReflectError> {
    match pool.get(index as usize) {
        Some(PoolEntry::Class(name_index)) => Ok(utf8(pool, *name_index)?.replace('/', ".")),
        _ => Err(ReflectError::BadPoolIndex(index, "Class")),
    }
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<(), ReflectError> {
    let count = reader.u16()?;
    for _ in 0..count {
        let _name_index = reader.u16()?;
        let length = reader.u32()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}

/// Skip method attributes, extracting declared exception types from the
/// `Exceptions` attribute on the way through.
fn read_method_attributes(
    reader: &mut Reader<'_>,
    pool: &[PoolEntry],
) -> Result<Vec<Type>, ReflectError> {
    let mut exceptions = Vec::new();
    let count = reader.u16()?;
    for _ in 0..count {
        let name_index = reader.u16()?;
        let length = reader.u32()? as usize;
        let is_exceptions = matches!(pool.get(name_index as usize),
            Some(PoolEntry::Utf8(text)) if text == "Exceptions");
        if is_exceptions {
            let entry_count = reader.u16()?;
            for _ in 0..entry_count {
                let class_index = reader.u16()?;
                exceptions.push(Type::class(&class_name(pool, class_index)?));
            }
        } else {
            reader.skip(length)?;
        }
    }
    Ok(exceptions)
}
