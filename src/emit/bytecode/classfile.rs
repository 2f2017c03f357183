//! Classfile structures

use super::constpool::ConstantPool;
use crate::emit::EmitError;

/// Classfile magic number.
pub const MAGIC: u32 = 0xCAFEBABE;

/// Emitted major version. The Java 5 format carries no StackMapTable
/// requirement, so branchy methods stay loadable without a frame-computation
/// pass.
pub const MAJOR_VERSION: u16 = 49;

pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

#[derive(Debug)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            minor_version: 0,
            major_version: MAJOR_VERSION,
            constant_pool: ConstantPool::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self { access_flags, name_index, descriptor_index, attributes: Vec::new() }
    }
}

#[derive(Debug)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self { access_flags, name_index, descriptor_index, attributes: Vec::new() }
    }
}

#[derive(Debug)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Constant-pool Class index, 0 for catch-all.
    pub catch_type: u16,
}

#[derive(Debug)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
}

impl CodeAttribute {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.code);
        bytes.extend_from_slice(&(self.exception_table.len() as u16).to_be_bytes());
        for entry in &self.exception_table {
            bytes.extend_from_slice(&entry.start_pc.to_be_bytes());
            bytes.extend_from_slice(&entry.end_pc.to_be_bytes());
            bytes.extend_from_slice(&entry.handler_pc.to_be_bytes());
            bytes.extend_from_slice(&entry.catch_type.to_be_bytes());
        }
        // No nested attributes.
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes
    }

    pub fn into_attribute(self, pool: &mut ConstantPool) -> Result<AttributeInfo, EmitError> {
        let name_index = pool.utf8("Code")?;
        Ok(AttributeInfo::new(name_index, self.to_bytes()))
    }
}

/// Build an `Exceptions` attribute from declared exception class indices.
pub fn make_exceptions_attribute(
    pool: &mut ConstantPool,
    exception_class_indices: &[u16],
) -> Result<AttributeInfo, EmitError> {
    let name_index = pool.utf8("Exceptions")?;
    let mut info = Vec::new();
    info.extend_from_slice(&(exception_class_indices.len() as u16).to_be_bytes());
    for index in exception_class_indices {
        info.extend_from_slice(&index.to_be_bytes());
    }
    Ok(AttributeInfo::new(name_index, info))
}
