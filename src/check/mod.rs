//! Shared validation/setup pass
//!
//! Both emission backends run this pass before rendering. Validation walks
//! the tree with the visitor machinery, collecting every diagnostic instead
//! of stopping at the first: unresolved identifiers, assignment/return/
//! argument type mismatches, misplaced breaks, unknown call targets. Setup
//! then assigns JVM local slots and per-method frame sizes as attributes;
//! storage sizing is a byproduct of traversal, not an input.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Block, ClassDecl, Expr, ExprKind, MethodDecl, NodeKind, Stmt};
use crate::attr::{FRAME_SIZE, LOCAL_SLOT, SOURCE_LINE};
use crate::config::Config;
use crate::error::Result;
use crate::gen::ClassGenerator;
use crate::tree::{walk, NodeId, Tree, Visitor};
use crate::types::{ClassInfo, MethodInfo, ResolutionContext, ResolveError, Type, THROWABLE_CLASS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The tree is malformed or type-inconsistent.
    Type,
    /// The environment lacks the named class.
    Resolution(String),
}

/// One finding, reported per offending node with whatever position
/// metadata the node carries.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub node_uid: u64,
    pub line: Option<u32>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "node #{} (line {}): {}", self.node_uid, line, self.message),
            None => write!(f, "node #{}: {}", self.node_uid, self.message),
        }
    }
}

/// Validation failed; all collected diagnostics are attached.
#[derive(Debug)]
pub struct CheckFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} diagnostic(s)", self.diagnostics.len())?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n  {}", diagnostic)?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckFailure {}

/// Run validation, then setup. On failure: `Error::Resolve` when every
/// finding is a missing class, `Error::Check` otherwise (resolution
/// findings stay distinguishable through their kind).
pub fn run(
    gen: &mut ClassGenerator,
    context: &ResolutionContext,
    imports: &[String],
    config: &Config,
) -> Result<()> {
    let diagnostics = {
        let mut visitor = CheckVisitor::new(gen, context, imports);
        walk(gen.tree(), gen.root(), &mut visitor)?;
        visitor.diagnostics
    };
    if !diagnostics.is_empty() {
        log::debug!("validation of '{}' produced {} diagnostic(s)", gen.name(), diagnostics.len());
        let all_resolution = diagnostics
            .iter()
            .all(|d| matches!(d.kind, DiagnosticKind::Resolution(_)));
        if all_resolution {
            if let DiagnosticKind::Resolution(name) = &diagnostics[0].kind {
                return Err(ResolveError::UnknownClass(name.clone()).into());
            }
        }
        return Err(CheckFailure { diagnostics }.into());
    }
    assign_slots(gen);
    if config.dump_after_setup {
        log::debug!("tree after setup:\n{}", gen.tree().dump(gen.root()));
    }
    Ok(())
}

struct CheckVisitor<'a> {
    gen: &'a ClassGenerator,
    context: &'a ResolutionContext,
    imports: &'a [String],
    diagnostics: Vec<Diagnostic>,
    /// Lexical scope stack; the bottom frame of a method holds its
    /// arguments. Frames record declarations seen so far, so a reference
    /// ahead of its definition statement is reported.
    scopes: Vec<HashMap<String, Type>>,
    method_return: Option<Type>,
    method_static: bool,
    breakable_depth: usize,
}

impl<'a> CheckVisitor<'a> {
    fn new(gen: &'a ClassGenerator, context: &'a ResolutionContext, imports: &'a [String]) -> Self {
        Self {
            gen,
            context,
            imports,
            diagnostics: Vec::new(),
            scopes: Vec::new(),
            method_return: None,
            method_static: false,
            breakable_depth: 0,
        }
    }

    fn report(&mut self, tree: &Tree, id: NodeId, kind: DiagnosticKind, message: String) {
        self.diagnostics.push(Diagnostic {
            kind,
            node_uid: tree.uid(id),
            line: SOURCE_LINE.get_if_set(tree, id),
            message,
        });
    }

    fn type_error(&mut self, tree: &Tree, id: NodeId, message: String) {
        self.report(tree, id, DiagnosticKind::Type, message);
    }

    fn unresolved(&mut self, tree: &Tree, id: NodeId, name: &str) {
        self.report(
            tree,
            id,
            DiagnosticKind::Resolution(name.to_string()),
            format!("class '{}' cannot be resolved", name),
        );
    }

    fn lookup_scope(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    fn declare(&mut self, name: &str, ty: Type) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.insert(name.to_string(), ty);
        }
    }

    fn find_class(&self, name: &str) -> Option<Rc<ClassInfo>> {
        resolve_class(self.gen, self.context, self.imports, name)
    }

    fn expr_type_of(&self, tree: &Tree, id: NodeId) -> Option<Type> {
        match tree.kind(id) {
            NodeKind::Expr(expr) => Some(expr.expr_type.clone()),
            _ => None,
        }
    }

    fn assignable(&self, to: &Type, from: &Type) -> bool {
        to.is_assignable_from(from, self.context)
    }

    fn find_method(&self, owner: &str, name: &str, args: &[Type]) -> Option<MethodInfo> {
        resolve_method(self.gen, self.context, self.imports, owner, name, args)
    }

    fn check_call(&mut self, tree: &Tree, id: NodeId, expr: &Expr) {
        let ExprKind::Call { target, owner, name, args } = &expr.kind else { return };
        let arg_types: Vec<Type> = args
            .iter()
            .filter_map(|&arg| self.expr_type_of(tree, arg))
            .collect();
        if arg_types.len() != args.len() {
            self.type_error(tree, id, format!("call to '{}' has a non-expression argument", name));
            return;
        }
        let (owner_name, want_static) = match (target, owner) {
            (Some(t), _) => match self.expr_type_of(tree, *t) {
                // Array targets only expose the Object surface.
                Some(Type::Array(_)) => (crate::types::OBJECT_CLASS.to_string(), false),
                Some(Type::Class(class_name)) => (class_name, false),
                _ => {
                    self.type_error(tree, id, format!("call target of '{}' is not a reference", name));
                    return;
                }
            },
            (None, Some(Type::Class(class_name))) => (class_name.clone(), true),
            (None, _) => (self.gen.name().to_string(), false),
        };
        if self.find_class(&owner_name).is_none() {
            self.unresolved(tree, id, &owner_name);
            return;
        }
        match self.find_method(&owner_name, name, &arg_types) {
            None => {
                self.type_error(
                    tree,
                    id,
                    format!("no method '{}({})' on '{}'", name, describe_types(&arg_types), owner_name),
                );
            }
            Some(method) => {
                if method.signature.return_type != expr.expr_type {
                    self.type_error(
                        tree,
                        id,
                        format!(
                            "call to '{}' was built with return type {} but '{}' declares {}",
                            name, expr.expr_type, name, method.signature.return_type
                        ),
                    );
                }
                if want_static && !method.is_static() {
                    self.type_error(tree, id, format!("method '{}' is not static", name));
                }
            }
        }
    }

    fn check_field_access(&mut self, tree: &Tree, id: NodeId, expr: &Expr) {
        let ExprKind::FieldAccess { target, owner, name } = &expr.kind else { return };
        let (owner_name, is_static_access) = match (target, owner) {
            (Some(t), _) => match self.expr_type_of(tree, *t) {
                Some(Type::Class(class_name)) => (class_name, false),
                Some(other) => {
                    self.type_error(tree, id, format!("field target has non-class type {}", other));
                    return;
                }
                None => return,
            },
            (None, Some(Type::Class(class_name))) => (class_name.clone(), true),
            (None, _) => (self.gen.name().to_string(), false),
        };
        let Some(info) = self.find_class(&owner_name) else {
            self.unresolved(tree, id, &owner_name);
            return;
        };
        match info.field(name) {
            None => self.type_error(tree, id, format!("no field '{}' on '{}'", name, owner_name)),
            Some(field) => {
                if field.field_type != expr.expr_type {
                    self.type_error(
                        tree,
                        id,
                        format!(
                            "field '{}' was built with type {} but is declared {}",
                            name, expr.expr_type, field.field_type
                        ),
                    );
                }
                let field_static = field.access & crate::types::access_flags::ACC_STATIC != 0;
                if is_static_access && !field_static {
                    self.type_error(tree, id, format!("field '{}' is not static", name));
                }
                // Implicit-this access to an instance field from a static
                // method has no receiver.
                if target.is_none() && owner.is_none() && self.method_static && !field_static {
                    self.type_error(
                        tree,
                        id,
                        format!("instance field '{}' referenced from a static context", name),
                    );
                }
            }
        }
    }

    fn check_new(&mut self, tree: &Tree, id: NodeId, expr: &Expr) {
        let ExprKind::New { class_type, args } = &expr.kind else { return };
        let Some(class_name) = class_type.class_name() else { return };
        let Some(info) = self.find_class(class_name) else {
            self.unresolved(tree, id, class_name);
            return;
        };
        let arg_types: Vec<Type> = args
            .iter()
            .filter_map(|&arg| self.expr_type_of(tree, arg))
            .collect();
        let found = constructor_matching(&info, &arg_types, self.context).is_some();
        if !found {
            self.type_error(
                tree,
                id,
                format!("no constructor '{}({})'", class_name, describe_types(&arg_types)),
            );
        }
    }

    fn check_named_type(&mut self, tree: &Tree, id: NodeId, ty: &Type) {
        let mut current = ty;
        while let Type::Array(element) = current {
            current = &**element;
        }
        if let Some(name) = current.class_name() {
            if self.find_class(name).is_none() {
                self.unresolved(tree, id, name);
            }
        }
    }
}

impl Visitor for CheckVisitor<'_> {
    fn pre_class(&mut self, tree: &Tree, id: NodeId, class: &ClassDecl) -> Result<()> {
        if let Some(super_type) = &class.super_class {
            self.check_named_type(tree, id, super_type);
        }
        for interface in &class.interfaces {
            self.check_named_type(tree, id, interface);
        }
        Ok(())
    }

    fn pre_method(&mut self, tree: &Tree, id: NodeId, method: &MethodDecl) -> Result<()> {
        self.method_return = Some(method.return_type.clone());
        self.method_static = method.is_static();
        self.breakable_depth = 0;
        let mut frame = HashMap::new();
        for arg in &method.args {
            frame.insert(arg.name.clone(), arg.arg_type.clone());
        }
        self.scopes.push(frame);
        for exception in &method.exceptions {
            self.check_named_type(tree, id, exception);
        }
        Ok(())
    }

    fn post_method(&mut self, _tree: &Tree, _id: NodeId, _method: &MethodDecl) -> Result<()> {
        self.scopes.pop();
        self.method_return = None;
        Ok(())
    }

    fn pre_block(&mut self, tree: &Tree, id: NodeId, _block: &Block) -> Result<()> {
        let mut frame = HashMap::new();
        // A catch body opens with its exception variable in scope.
        if let Some(parent) = tree.parent(id) {
            if let NodeKind::Stmt(Stmt::Try { catches, .. }) = tree.kind(parent) {
                for catch in catches {
                    if catch.body == id {
                        frame.insert(catch.var_name.clone(), catch.exception_type.clone());
                    }
                }
            }
        }
        // The class-owned initializer block runs in a static context.
        if matches!(tree.parent(id).map(|p| tree.kind(p)), Some(NodeKind::Class(_))) {
            self.method_return = Some(Type::Void);
            self.method_static = true;
        }
        self.scopes.push(frame);
        Ok(())
    }

    fn post_block(&mut self, _tree: &Tree, _id: NodeId, _block: &Block) -> Result<()> {
        self.scopes.pop();
        Ok(())
    }

    fn pre_stmt(&mut self, tree: &Tree, id: NodeId, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::While { .. } | Stmt::Switch { .. } => self.breakable_depth += 1,
            Stmt::Break => {
                if self.breakable_depth == 0 {
                    self.type_error(tree, id, "break outside of loop or switch".to_string());
                }
            }
            Stmt::Try { catches, .. } => {
                for catch in catches {
                    self.check_named_type(tree, id, &catch.exception_type);
                    if let Some(name) = catch.exception_type.class_name() {
                        let is_throwable = name == THROWABLE_CLASS
                            || self.context.is_subtype_of(name, THROWABLE_CLASS);
                        if self.find_class(name).is_some() && !is_throwable {
                            self.type_error(
                                tree,
                                id,
                                format!("catch type '{}' is not a throwable", name),
                            );
                        }
                    }
                }
            }
            Stmt::Return { value } => {
                let expected = self.method_return.clone().unwrap_or(Type::Void);
                match (value, expected.clone()) {
                    (None, Type::Void) => {}
                    (None, other) => {
                        self.type_error(tree, id, format!("return without value in a {} method", other));
                    }
                    (Some(v), expected) => match self.expr_type_of(tree, *v) {
                        Some(found) if expected == Type::Void => {
                            self.type_error(
                                tree,
                                id,
                                format!("void method returns a value of type {}", found),
                            );
                        }
                        Some(found) => {
                            if !self.assignable(&expected, &found) {
                                self.type_error(
                                    tree,
                                    id,
                                    format!("cannot return {} from a {} method", found, expected),
                                );
                            }
                        }
                        None => {}
                    },
                }
            }
            Stmt::Throw { value } => {
                if let Some(Type::Class(name)) = self.expr_type_of(tree, *value) {
                    let is_throwable = name == THROWABLE_CLASS
                        || self.context.is_subtype_of(&name, THROWABLE_CLASS);
                    if self.find_class(&name).is_none() {
                        self.unresolved(tree, id, &name);
                    } else if !is_throwable {
                        self.type_error(tree, id, format!("thrown type '{}' is not a throwable", name));
                    }
                }
            }
            Stmt::Assign { target, value } => {
                if let (Some(to), Some(from)) =
                    (self.expr_type_of(tree, *target), self.expr_type_of(tree, *value))
                {
                    if !self.assignable(&to, &from) {
                        self.type_error(tree, id, format!("cannot assign {} to {}", from, to));
                    }
                }
            }
            Stmt::Definition { var_type, init, name } => {
                self.check_named_type(tree, id, var_type);
                if let Some(init) = init {
                    if let Some(from) = self.expr_type_of(tree, *init) {
                        if !self.assignable(var_type, &from) {
                            self.type_error(
                                tree,
                                id,
                                format!("cannot initialize {} '{}' with {}", var_type, name, from),
                            );
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn post_stmt(&mut self, _tree: &Tree, _id: NodeId, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::While { .. } | Stmt::Switch { .. } => {
                self.breakable_depth = self.breakable_depth.saturating_sub(1);
            }
            // The declared name enters scope after its own initializer.
            Stmt::Definition { name, var_type, .. } => {
                self.declare(name, var_type.clone());
            }
            _ => {}
        }
        Ok(())
    }

    fn pre_expr(&mut self, tree: &Tree, id: NodeId, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Local { name } => match self.lookup_scope(name) {
                None => {
                    self.type_error(tree, id, format!("variable '{}' is not in scope", name));
                }
                Some(declared) => {
                    if *declared != expr.expr_type {
                        self.type_error(
                            tree,
                            id,
                            format!(
                                "variable '{}' was built as {} but is declared {}",
                                name, expr.expr_type, declared
                            ),
                        );
                    }
                }
            },
            ExprKind::This => {
                if self.method_static {
                    self.type_error(tree, id, "'this' referenced from a static context".to_string());
                }
            }
            ExprKind::Call { .. } => self.check_call(tree, id, expr),
            ExprKind::FieldAccess { .. } => self.check_field_access(tree, id, expr),
            ExprKind::New { .. } => self.check_new(tree, id, expr),
            ExprKind::Cast { target_type, .. } => self.check_named_type(tree, id, target_type),
            ExprKind::InstanceOf { checked_type, .. } => {
                self.check_named_type(tree, id, checked_type)
            }
            ExprKind::NewArray { element_type, .. } => {
                self.check_named_type(tree, id, element_type)
            }
            _ => {}
        }
        Ok(())
    }
}

fn describe_types(types: &[Type]) -> String {
    types.iter().map(Type::to_string).collect::<Vec<_>>().join(", ")
}

/// The generated class itself, or a class known to the context.
pub(crate) fn resolve_class(
    gen: &ClassGenerator,
    context: &ResolutionContext,
    imports: &[String],
    name: &str,
) -> Option<Rc<ClassInfo>> {
    if name == gen.name() {
        return Some(Rc::new(gen.class_info()));
    }
    context.resolve_imported(name, imports).ok()
}

/// Find a method up the declared hierarchy whose parameters accept the
/// given argument types.
pub(crate) fn resolve_method(
    gen: &ClassGenerator,
    context: &ResolutionContext,
    imports: &[String],
    owner: &str,
    name: &str,
    args: &[Type],
) -> Option<MethodInfo> {
    let mut current = Some(owner.to_string());
    while let Some(class_name) = current {
        let info = resolve_class(gen, context, imports, &class_name)?;
        for method in info.methods_named(name) {
            if parameters_accept(&method.signature.parameter_types, args, context) {
                return Some(method.clone());
            }
        }
        current = info.super_class.as_ref().and_then(|t| t.class_name()).map(String::from);
    }
    None
}

pub(crate) fn constructor_matching(
    info: &ClassInfo,
    args: &[Type],
    context: &ResolutionContext,
) -> Option<MethodInfo> {
    info.constructors
        .iter()
        .find(|ctor| parameters_accept(&ctor.signature.parameter_types, args, context))
        .cloned()
}

fn parameters_accept(parameters: &[Type], args: &[Type], context: &ResolutionContext) -> bool {
    parameters.len() == args.len()
        && parameters
            .iter()
            .zip(args.iter())
            .all(|(param, arg)| param.is_assignable_from(arg, context))
}

/// Setup: assign local-variable slots and frame sizes. Slot 0 is `this` for
/// instance methods; arguments follow, then block locals in declaration
/// order (double-width types take two slots, no reuse across siblings).
fn assign_slots(gen: &mut ClassGenerator) {
    let class = gen.class();
    let method_nodes: Vec<NodeId> = class
        .methods
        .iter()
        .chain(class.constructors.iter())
        .copied()
        .collect();
    let initializer = class.initializer;

    for method in method_nodes {
        let (body, mut next) = {
            let NodeKind::Method(decl) = gen.tree().kind(method) else { continue };
            let mut next: u16 = if decl.is_static() { 0 } else { 1 };
            for arg in &decl.args {
                next += arg.arg_type.size();
            }
            (decl.body, next)
        };
        let mut max = next;
        if let Some(body) = body {
            assign_block_slots(gen.tree_mut(), body, &mut next, &mut max);
        }
        FRAME_SIZE.set(gen.tree_mut(), method, max as u32);
    }
    if let Some(block) = initializer {
        let mut next: u16 = 0;
        let mut max = 0;
        assign_block_slots(gen.tree_mut(), block, &mut next, &mut max);
        FRAME_SIZE.set(gen.tree_mut(), block, max as u32);
    }
}

fn assign_block_slots(tree: &mut Tree, block: NodeId, next: &mut u16, max: &mut u16) {
    let stmts = match tree.kind(block) {
        NodeKind::Stmt(Stmt::Block(b)) => b.stmts.clone(),
        _ => return,
    };
    for stmt in stmts {
        let kind = match tree.kind(stmt) {
            NodeKind::Stmt(s) => s.clone(),
            _ => continue,
        };
        match kind {
            Stmt::Definition { var_type, .. } => {
                LOCAL_SLOT.set(tree, stmt, *next as u32);
                *next += var_type.size();
                *max = (*max).max(*next);
            }
            Stmt::Block(_) => assign_block_slots(tree, stmt, next, max),
            Stmt::If { then_block, else_block, .. } => {
                assign_block_slots(tree, then_block, next, max);
                if let Some(else_block) = else_block {
                    assign_block_slots(tree, else_block, next, max);
                }
            }
            Stmt::While { body, .. } => assign_block_slots(tree, body, next, max),
            Stmt::Switch { cases, default, .. } => {
                for case in &cases {
                    assign_block_slots(tree, case.body, next, max);
                }
                if let Some(default) = default {
                    assign_block_slots(tree, default, next, max);
                }
            }
            Stmt::Try { body, catches } => {
                assign_block_slots(tree, body, next, max);
                for catch in &catches {
                    // One slot for the exception variable, stored on the
                    // catch body block.
                    LOCAL_SLOT.set(tree, catch.body, *next as u32);
                    *next += 1;
                    *max = (*max).max(*next);
                    assign_block_slots(tree, catch.body, next, max);
                }
            }
            _ => {}
        }
    }
}
