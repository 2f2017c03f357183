//! Class/method/field generator
//!
//! The builder surface callers drive: define a class or interface, add
//! fields, start methods and constructors, finalize them, and build method
//! bodies out of statements and expressions. Each builder call validates the
//! operation against the current build state and fails synchronously,
//! leaving the tree in the state reached by the last successful call.

mod body;
mod exprs;

use thiserror::Error;

use crate::ast::{Argument, Block, ClassDecl, FieldDecl, MethodDecl, NodeKind, Stmt};
use crate::tree::{NodeId, Tree};
use crate::types::access_flags::{ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE};
use crate::types::{ClassInfo, FieldInfo, MethodInfo, MethodSignature, Type};

/// Structural builder errors: an illegal operation given the current build
/// state. These are distinct from the type-consistency diagnostics the
/// validation pass collects over a finished tree.
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("an interface cannot declare fields")]
    InterfaceField,
    #[error("an interface cannot declare constructors")]
    InterfaceConstructor,
    #[error("an interface cannot own a static initializer")]
    InterfaceInitializer,
    #[error("interface method '{0}' must be abstract")]
    InterfaceConcreteMethod(String),
    #[error("method '{0}' has no body")]
    NoBody(String),
    #[error("class '{0}' cannot be both abstract and final")]
    AbstractAndFinal(String),
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("duplicate method '{name}' with signature {descriptor}")]
    DuplicateMethod { name: String, descriptor: String },
    #[error("duplicate identifier '{0}' in the same scope")]
    DuplicateIdentifier(String),
    #[error("duplicate argument '{0}'")]
    DuplicateArgument(String),
    #[error("variable '{0}' is not defined in any enclosing scope")]
    UnknownVariable(String),
    #[error("field '{0}' is not declared on the generated class")]
    UnknownField(String),
    #[error("argument list of '{0}' is already complete")]
    ArgumentsComplete(String),
    #[error("argument list of '{0}' is not complete yet")]
    ArgumentsNotComplete(String),
    #[error("method '{0}' is already finalized")]
    MethodFinalized(String),
    #[error("switch selector must be a one-slot integral type, got {0}")]
    SwitchSelector(Type),
    #[error("duplicate case value {0}")]
    DuplicateCase(i32),
    #[error("switch already owns a default block")]
    DuplicateDefault,
    #[error("if statement already owns an else block")]
    DuplicateElse,
    #[error("catch type must be a class type, got {0}")]
    CatchNotClass(Type),
    #[error("catch type {0} is already registered on this try")]
    DuplicateCatch(Type),
    #[error("expression is not a legal assignment target")]
    NotAssignable,
    #[error("condition must be boolean, got {0}")]
    ConditionNotBoolean(Type),
    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    BadOperandTypes { op: &'static str, left: Type, right: Type },
    #[error("operator '{op}' cannot be applied to {operand}")]
    BadUnaryOperand { op: &'static str, operand: Type },
    #[error("cannot cast {from} to {to}")]
    BadCast { from: Type, to: Type },
    #[error("instanceof requires reference types, got {0}")]
    BadInstanceOf(Type),
    #[error("target must be a reference type, got {0}")]
    TargetNotReference(Type),
    #[error("owner must be a class type, got {0}")]
    OwnerNotClass(Type),
    #[error("array access requires an array, got {0}")]
    NotAnArray(Type),
    #[error("array index must be int-compatible, got {0}")]
    BadIndex(Type),
    #[error("array length must be int-compatible, got {0}")]
    BadArrayLength(Type),
    #[error("{0} is not a legal array element type")]
    BadArrayElement(Type),
    #[error("thrown value must be a reference type, got {0}")]
    BadThrowType(Type),
    #[error("declared exception must be a class type, got {0}")]
    BadExceptionType(Type),
    #[error("object construction requires a class type, got {0}")]
    NewNotClass(Type),
    #[error("call to '{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch { name: String, expected: usize, found: usize },
    #[error("node is not a {0}")]
    WrongNodeKind(&'static str),
}

pub type BuildResult<T> = std::result::Result<T, BuilderError>;

/// Handle to a method or constructor under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub(crate) NodeId);

impl MethodId {
    pub fn node(self) -> NodeId {
        self.0
    }
}

/// Builder for one class or interface; owns the tree every node of the
/// generated structure lives in.
#[derive(Debug)]
pub struct ClassGenerator {
    tree: Tree,
    root: NodeId,
}

impl ClassGenerator {
    /// Start a class. `super_class` defaults to `java.lang.Object`.
    pub fn define_class(
        access: u16,
        name: &str,
        super_class: Option<Type>,
        interfaces: Vec<Type>,
    ) -> BuildResult<Self> {
        if access & ACC_ABSTRACT != 0 && access & ACC_FINAL != 0 {
            return Err(BuilderError::AbstractAndFinal(name.to_string()));
        }
        let decl = ClassDecl {
            access: access & !ACC_INTERFACE,
            name: name.to_string(),
            super_class: Some(super_class.unwrap_or_else(Type::object)),
            interfaces,
            is_interface: false,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            initializer: None,
        };
        let mut tree = Tree::new();
        let root = tree.alloc(NodeKind::Class(decl), None);
        log::debug!("defined class '{}'", name);
        Ok(Self { tree, root })
    }

    /// Start an interface. Interface flags are implied.
    pub fn define_interface(access: u16, name: &str, interfaces: Vec<Type>) -> BuildResult<Self> {
        if access & ACC_FINAL != 0 {
            return Err(BuilderError::AbstractAndFinal(name.to_string()));
        }
        let decl = ClassDecl {
            access: access | ACC_INTERFACE | ACC_ABSTRACT,
            name: name.to_string(),
            super_class: None,
            interfaces,
            is_interface: true,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            initializer: None,
        };
        let mut tree = Tree::new();
        let root = tree.alloc(NodeKind::Class(decl), None);
        log::debug!("defined interface '{}'", name);
        Ok(Self { tree, root })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Deep-copy a node per the copy protocol: the copy is independent, its
    /// parent reference is shared with the original, and intra-subtree
    /// aliasing is preserved.
    pub fn copy_node(&mut self, node: NodeId) -> NodeId {
        self.tree.copy(node)
    }

    /// As [`ClassGenerator::copy_node`], rebinding the copy's parent.
    pub fn copy_node_under(&mut self, node: NodeId, new_parent: NodeId) -> NodeId {
        self.tree.copy_under(node, new_parent)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn class(&self) -> &ClassDecl {
        match self.tree.kind(self.root) {
            NodeKind::Class(decl) => decl,
            _ => unreachable!("root is always a class node"),
        }
    }

    fn class_mut(&mut self) -> &mut ClassDecl {
        match self.tree.kind_mut(self.root) {
            NodeKind::Class(decl) => decl,
            _ => unreachable!("root is always a class node"),
        }
    }

    pub fn name(&self) -> &str {
        &self.class().name
    }

    pub fn is_interface(&self) -> bool {
        self.class().is_interface
    }

    /// Add a field. Interfaces reject fields; duplicate names within the
    /// class are rejected.
    pub fn add_field(&mut self, access: u16, field_type: Type, name: &str) -> BuildResult<NodeId> {
        if self.is_interface() {
            return Err(BuilderError::InterfaceField);
        }
        if self.field_decl(name).is_some() {
            return Err(BuilderError::DuplicateField(name.to_string()));
        }
        let field = FieldDecl { access, name: name.to_string(), field_type };
        let id = self.tree.alloc(NodeKind::Field(field), Some(self.root));
        self.class_mut().fields.push(id);
        Ok(id)
    }

    pub(crate) fn field_decl(&self, name: &str) -> Option<&FieldDecl> {
        self.class().fields.iter().find_map(|&id| match self.tree.kind(id) {
            NodeKind::Field(field) if field.name == name => Some(field),
            _ => None,
        })
    }

    /// Start a method. Abstract methods own no body; interface methods must
    /// be abstract. The returned handle stays open until `method_complete`.
    pub fn start_method(&mut self, access: u16, return_type: Type, name: &str) -> BuildResult<MethodId> {
        if self.is_interface() && access & ACC_ABSTRACT == 0 {
            return Err(BuilderError::InterfaceConcreteMethod(name.to_string()));
        }
        let is_abstract = access & ACC_ABSTRACT != 0;
        let decl = MethodDecl {
            access,
            name: name.to_string(),
            return_type,
            args: Vec::new(),
            exceptions: Vec::new(),
            body: None,
            is_constructor: false,
            args_complete: false,
        };
        let method = self.tree.alloc(NodeKind::Method(decl), Some(self.root));
        if !is_abstract {
            let body = self.tree.alloc(NodeKind::Stmt(Stmt::Block(Block::new())), Some(method));
            if let NodeKind::Method(decl) = self.tree.kind_mut(method) {
                decl.body = Some(body);
            }
        }
        self.class_mut().methods.push(method);
        Ok(MethodId(method))
    }

    /// Start a constructor. Interfaces reject constructors.
    pub fn start_constructor(&mut self, access: u16) -> BuildResult<MethodId> {
        if self.is_interface() {
            return Err(BuilderError::InterfaceConstructor);
        }
        let decl = MethodDecl {
            access,
            name: "<init>".to_string(),
            return_type: Type::Void,
            args: Vec::new(),
            exceptions: Vec::new(),
            body: None,
            is_constructor: true,
            args_complete: false,
        };
        let method = self.tree.alloc(NodeKind::Method(decl), Some(self.root));
        let body = self.tree.alloc(NodeKind::Stmt(Stmt::Block(Block::new())), Some(method));
        if let NodeKind::Method(decl) = self.tree.kind_mut(method) {
            decl.body = Some(body);
        }
        self.class_mut().constructors.push(method);
        Ok(MethodId(method))
    }

    pub(crate) fn method_decl(&self, method: MethodId) -> BuildResult<&MethodDecl> {
        match self.tree.kind(method.0) {
            NodeKind::Method(decl) => Ok(decl),
            _ => Err(BuilderError::WrongNodeKind("method")),
        }
    }

    fn method_decl_mut(&mut self, method: MethodId) -> BuildResult<&mut MethodDecl> {
        match self.tree.kind_mut(method.0) {
            NodeKind::Method(decl) => Ok(decl),
            _ => Err(BuilderError::WrongNodeKind("method")),
        }
    }

    /// Append an argument variable. Rejected once the argument list is
    /// locked by `method_complete`.
    pub fn add_argument(&mut self, method: MethodId, arg_type: Type, name: &str) -> BuildResult<()> {
        let decl = self.method_decl_mut(method)?;
        if decl.args_complete {
            return Err(BuilderError::ArgumentsComplete(decl.name.clone()));
        }
        if decl.args.iter().any(|a| a.name == name) {
            return Err(BuilderError::DuplicateArgument(name.to_string()));
        }
        decl.args.push(Argument { name: name.to_string(), arg_type });
        Ok(())
    }

    /// Declare a thrown exception type; part of the method's identity.
    pub fn add_exception(&mut self, method: MethodId, exception_type: Type) -> BuildResult<()> {
        if !matches!(exception_type, Type::Class(_)) {
            return Err(BuilderError::BadExceptionType(exception_type));
        }
        let decl = self.method_decl_mut(method)?;
        if decl.args_complete {
            return Err(BuilderError::ArgumentsComplete(decl.name.clone()));
        }
        if decl.exceptions.contains(&exception_type) {
            return Err(BuilderError::BadExceptionType(exception_type));
        }
        decl.exceptions.push(exception_type);
        Ok(())
    }

    /// Finalize the method: lock the argument list (making the signature
    /// observable) and register it into the class table, rejecting a
    /// duplicate (name, signature, exceptions) combination.
    pub fn method_complete(&mut self, method: MethodId) -> BuildResult<()> {
        let decl = self.method_decl(method)?;
        if decl.args_complete {
            return Err(BuilderError::MethodFinalized(decl.name.clone()));
        }
        let candidate = raw_info(decl);
        let table: Vec<NodeId> = if decl.is_constructor {
            self.class().constructors.clone()
        } else {
            self.class().methods.clone()
        };
        for other in table {
            if other == method.0 {
                continue;
            }
            if let NodeKind::Method(other_decl) = self.tree.kind(other) {
                if other_decl.args_complete {
                    let existing = raw_info(other_decl);
                    if existing.name == candidate.name
                        && existing.signature == candidate.signature
                        && existing.exceptions == candidate.exceptions
                    {
                        return Err(BuilderError::DuplicateMethod {
                            name: candidate.name,
                            descriptor: candidate.signature.descriptor(),
                        });
                    }
                }
            }
        }
        let decl = self.method_decl_mut(method)?;
        decl.args_complete = true;
        log::debug!("completed method '{}'", decl.name);
        Ok(())
    }

    /// The method's identity. Computing it before the argument list is
    /// complete is an error: the signature is meaningless while the list is
    /// still mutable.
    pub fn method_info(&self, method: MethodId) -> BuildResult<MethodInfo> {
        let decl = self.method_decl(method)?;
        if !decl.args_complete {
            return Err(BuilderError::ArgumentsNotComplete(decl.name.clone()));
        }
        Ok(raw_info(decl))
    }

    /// The method's signature, gated the same way as `method_info`.
    pub fn signature(&self, method: MethodId) -> BuildResult<MethodSignature> {
        Ok(self.method_info(method)?.signature)
    }

    /// The method's body block. Abstract methods own no body.
    pub fn body(&self, method: MethodId) -> BuildResult<NodeId> {
        let decl = self.method_decl(method)?;
        decl.body.ok_or_else(|| BuilderError::NoBody(decl.name.clone()))
    }

    /// The class's static-initializer block, created on first request.
    /// Interfaces reject initializers.
    pub fn static_initializer(&mut self) -> BuildResult<NodeId> {
        if self.is_interface() {
            return Err(BuilderError::InterfaceInitializer);
        }
        if let Some(existing) = self.class().initializer {
            return Ok(existing);
        }
        let block = self.tree.alloc(NodeKind::Stmt(Stmt::Block(Block::new())), Some(self.root));
        self.class_mut().initializer = Some(block);
        Ok(block)
    }

    /// Snapshot the generated class as a `ClassInfo`, the same contract a
    /// pre-existing compiled class presents. Only finalized methods and
    /// constructors appear.
    pub fn class_info(&self) -> ClassInfo {
        let class = self.class();
        let fields = class
            .fields
            .iter()
            .filter_map(|&id| match self.tree.kind(id) {
                NodeKind::Field(field) => Some(FieldInfo {
                    access: field.access,
                    name: field.name.clone(),
                    field_type: field.field_type.clone(),
                }),
                _ => None,
            })
            .collect();
        let completed = |ids: &[NodeId]| -> Vec<MethodInfo> {
            ids.iter()
                .filter_map(|&id| match self.tree.kind(id) {
                    NodeKind::Method(decl) if decl.args_complete => Some(raw_info(decl)),
                    _ => None,
                })
                .collect()
        };
        ClassInfo {
            access: class.access,
            name: class.name.clone(),
            super_class: class.super_class.clone(),
            interfaces: class.interfaces.clone(),
            fields,
            methods: completed(&class.methods),
            constructors: completed(&class.constructors),
        }
    }

    /// All method handles, finalized or not, constructors included.
    pub fn methods(&self) -> Vec<MethodId> {
        let class = self.class();
        class
            .methods
            .iter()
            .chain(class.constructors.iter())
            .map(|&id| MethodId(id))
            .collect()
    }
}

/// Build the info without the completion gate; callers own the gating.
fn raw_info(decl: &MethodDecl) -> MethodInfo {
    MethodInfo {
        access: decl.access,
        name: decl.name.clone(),
        signature: MethodSignature::new(
            decl.return_type.clone(),
            decl.args.iter().map(|a| a.arg_type.clone()).collect(),
        ),
        exceptions: decl.exceptions.clone(),
    }
}
