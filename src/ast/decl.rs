//! Class, method and field declaration payloads

use crate::tree::NodeId;
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub access: u16,
    /// Dot-qualified name.
    pub name: String,
    pub super_class: Option<Type>,
    pub interfaces: Vec<Type>,
    pub is_interface: bool,
    pub fields: Vec<NodeId>,
    pub methods: Vec<NodeId>,
    pub constructors: Vec<NodeId>,
    /// Static initializer block; only a non-interface class may own one.
    pub initializer: Option<NodeId>,
}

impl ClassDecl {
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn package_name(&self) -> Option<&str> {
        self.name.rfind('.').map(|dot| &self.name[..dot])
    }

    pub(crate) fn child_ids(&self) -> Vec<NodeId> {
        self.fields
            .iter()
            .chain(self.methods.iter())
            .chain(self.constructors.iter())
            .chain(self.initializer.iter())
            .copied()
            .collect()
    }

    pub(crate) fn remap_children(&mut self, remap: &impl Fn(&mut NodeId)) {
        for id in self
            .fields
            .iter_mut()
            .chain(self.methods.iter_mut())
            .chain(self.constructors.iter_mut())
            .chain(self.initializer.iter_mut())
        {
            remap(id);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub access: u16,
    pub name: String,
    pub field_type: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub arg_type: Type,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub access: u16,
    /// `<init>` for constructors, `<clinit>` for the static initializer
    /// wrapper emitted by the bytecode backend.
    pub name: String,
    pub return_type: Type,
    pub args: Vec<Argument>,
    pub exceptions: Vec<Type>,
    /// Absent for abstract methods.
    pub body: Option<NodeId>,
    pub is_constructor: bool,
    /// The "arguments complete" gate: set by `method_complete`, after which
    /// the argument list is locked and the signature becomes observable.
    pub args_complete: bool,
}

impl MethodDecl {
    pub fn is_abstract(&self) -> bool {
        self.access & crate::types::access_flags::ACC_ABSTRACT != 0
    }

    pub fn is_static(&self) -> bool {
        self.access & crate::types::access_flags::ACC_STATIC != 0
    }
}
