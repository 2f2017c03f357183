//! Structural description of a class or interface

use super::{MethodSignature, Type};

/// JVM access and property flags, shared between the builder surface and
/// the classfile backends.
pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_VOLATILE: u16 = 0x0040;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    pub access: u16,
    pub name: String,
    pub field_type: Type,
}

/// A method or constructor entry. Uniquely identified within its class by
/// (name, ordered parameter-type list); two infos are equal iff name,
/// modifiers, signature and declared exception types all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    pub access: u16,
    pub name: String,
    pub signature: MethodSignature,
    pub exceptions: Vec<Type>,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access & access_flags::ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & access_flags::ACC_ABSTRACT != 0
    }
}

/// A class or interface: modifiers, qualified name, supertype (absent for
/// interfaces and the root class), implemented/extended types, field table
/// and method/constructor tables.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub access: u16,
    pub name: String,
    pub super_class: Option<Type>,
    pub interfaces: Vec<Type>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub constructors: Vec<MethodInfo>,
}

impl ClassInfo {
    pub fn is_interface(&self) -> bool {
        self.access & access_flags::ACC_INTERFACE != 0
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Exact lookup by (name, ordered parameter-type list).
    pub fn method(&self, name: &str, parameter_types: &[Type]) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.signature.parameter_types == parameter_types)
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn constructor(&self, parameter_types: &[Type]) -> Option<&MethodInfo> {
        self.constructors
            .iter()
            .find(|c| c.signature.parameter_types == parameter_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, access: u16, exceptions: Vec<Type>) -> MethodInfo {
        MethodInfo {
            access,
            name: name.to_string(),
            signature: MethodSignature::new(Type::Int, vec![Type::Int]),
            exceptions,
        }
    }

    #[test]
    fn method_equality_covers_all_four_parts() {
        let base = info("m", access_flags::ACC_PUBLIC, vec![]);
        assert_eq!(base, info("m", access_flags::ACC_PUBLIC, vec![]));
        assert_ne!(base, info("n", access_flags::ACC_PUBLIC, vec![]));
        assert_ne!(base, info("m", access_flags::ACC_PRIVATE, vec![]));
        assert_ne!(
            base,
            info("m", access_flags::ACC_PUBLIC, vec![Type::class("java.lang.Exception")])
        );
    }
}
