//! Structural verification of emitted classfiles
//!
//! Checks a built [`ClassFile`] before it is handed out: version bounds,
//! constant-pool index kinds for the class references, flag consistency,
//! and member name sanity. Enabled through the `verify_bytecode` config
//! flag, or callable directly.

use thiserror::Error;

use crate::emit::bytecode::classfile::MAJOR_VERSION;
use crate::emit::bytecode::ClassFile;
use crate::types::access_flags::{ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE};

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("unsupported class file version {0} (emitter targets {MAJOR_VERSION})")]
    UnsupportedVersion(u16),
    #[error("constant pool index {0} is not a Class entry")]
    NotAClassEntry(u16),
    #[error("constant pool index {0} is not a Utf8 entry")]
    NotAUtf8Entry(u16),
    #[error("empty {0} name")]
    EmptyName(&'static str),
    #[error("interface is not marked abstract")]
    InterfaceNotAbstract,
    #[error("interface is marked final")]
    InterfaceFinal,
    #[error("class is both abstract and final")]
    AbstractAndFinal,
    #[error("interface has a superclass other than java/lang/Object")]
    InterfaceBadSuper,
}

pub type VerifyResult<T> = Result<T, VerifyError>;

/// Verify the classfile by orchestrating the sub-checks.
pub fn verify(class_file: &ClassFile) -> VerifyResult<()> {
    if class_file.major_version > MAJOR_VERSION {
        return Err(VerifyError::UnsupportedVersion(class_file.major_version));
    }
    verify_flags(class_file)?;
    verify_this_and_super(class_file)?;
    verify_members(class_file)?;
    Ok(())
}

fn verify_flags(class_file: &ClassFile) -> VerifyResult<()> {
    let access = class_file.access_flags;
    if access & ACC_INTERFACE != 0 {
        if access & ACC_ABSTRACT == 0 {
            return Err(VerifyError::InterfaceNotAbstract);
        }
        if access & ACC_FINAL != 0 {
            return Err(VerifyError::InterfaceFinal);
        }
    } else if access & ACC_ABSTRACT != 0 && access & ACC_FINAL != 0 {
        return Err(VerifyError::AbstractAndFinal);
    }
    Ok(())
}

fn verify_this_and_super(class_file: &ClassFile) -> VerifyResult<()> {
    let pool = &class_file.constant_pool;
    let this_name = pool
        .class_name_at(class_file.this_class)
        .ok_or(VerifyError::NotAClassEntry(class_file.this_class))?;
    if this_name.is_empty() {
        return Err(VerifyError::EmptyName("class"));
    }
    if class_file.super_class != 0 {
        let super_name = pool
            .class_name_at(class_file.super_class)
            .ok_or(VerifyError::NotAClassEntry(class_file.super_class))?;
        if class_file.access_flags & ACC_INTERFACE != 0 && super_name != "java/lang/Object" {
            return Err(VerifyError::InterfaceBadSuper);
        }
    }
    for &interface in &class_file.interfaces {
        pool.class_name_at(interface).ok_or(VerifyError::NotAClassEntry(interface))?;
    }
    Ok(())
}

fn verify_members(class_file: &ClassFile) -> VerifyResult<()> {
    let pool = &class_file.constant_pool;
    for field in &class_file.fields {
        let name = pool
            .utf8_at(field.name_index)
            .ok_or(VerifyError::NotAUtf8Entry(field.name_index))?;
        if name.is_empty() {
            return Err(VerifyError::EmptyName("field"));
        }
        pool.utf8_at(field.descriptor_index)
            .ok_or(VerifyError::NotAUtf8Entry(field.descriptor_index))?;
    }
    for method in &class_file.methods {
        let name = pool
            .utf8_at(method.name_index)
            .ok_or(VerifyError::NotAUtf8Entry(method.name_index))?;
        if name.is_empty() {
            return Err(VerifyError::EmptyName("method"));
        }
        pool.utf8_at(method.descriptor_index)
            .ok_or(VerifyError::NotAUtf8Entry(method.descriptor_index))?;
    }
    Ok(())
}
