//! Trait-based serialization for classfile structures

use std::io::Write;

use super::classfile::{AttributeInfo, ClassFile, FieldInfo, MethodInfo};
use super::constpool::{Constant, ConstantPool};

/// An object which can be written into a classfile byte stream.
pub trait ClassfileWritable {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()>;
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.count().to_be_bytes())?;
        for constant in self.entries() {
            if matches!(constant, Constant::Placeholder) {
                continue;
            }
            buffer.write_all(&constant.to_bytes())?;
        }
        Ok(())
    }
}

impl ClassfileWritable for AttributeInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.name_index.to_be_bytes())?;
        buffer.write_all(&(self.info.len() as u32).to_be_bytes())?;
        buffer.write_all(&self.info)?;
        Ok(())
    }
}

impl ClassfileWritable for FieldInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.name_index.to_be_bytes())?;
        buffer.write_all(&self.descriptor_index.to_be_bytes())?;
        buffer.write_all(&(self.attributes.len() as u16).to_be_bytes())?;
        for attribute in &self.attributes {
            attribute.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for MethodInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.name_index.to_be_bytes())?;
        buffer.write_all(&self.descriptor_index.to_be_bytes())?;
        buffer.write_all(&(self.attributes.len() as u16).to_be_bytes())?;
        for attribute in &self.attributes {
            attribute.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        buffer.write_all(&self.minor_version.to_be_bytes())?;
        buffer.write_all(&self.major_version.to_be_bytes())?;
        self.constant_pool.write_to_classfile(buffer)?;
        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.this_class.to_be_bytes())?;
        buffer.write_all(&self.super_class.to_be_bytes())?;
        buffer.write_all(&(self.interfaces.len() as u16).to_be_bytes())?;
        for interface in &self.interfaces {
            buffer.write_all(&interface.to_be_bytes())?;
        }
        buffer.write_all(&(self.fields.len() as u16).to_be_bytes())?;
        for field in &self.fields {
            field.write_to_classfile(buffer)?;
        }
        buffer.write_all(&(self.methods.len() as u16).to_be_bytes())?;
        for method in &self.methods {
            method.write_to_classfile(buffer)?;
        }
        buffer.write_all(&(self.attributes.len() as u16).to_be_bytes())?;
        for attribute in &self.attributes {
            attribute.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

/// Serialize a complete classfile into a byte vector.
pub fn class_file_to_bytes(class_file: &ClassFile) -> Vec<u8> {
    let mut buffer = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = class_file.write_to_classfile(&mut buffer);
    buffer
}
