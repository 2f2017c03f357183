//! Statement builders
//!
//! Statements may only be added to blocks owned by a method or constructor
//! that has not yet been finalized; building is strictly top-down. Every
//! expression handed to a statement builder is attached via the
//! copy-on-attach discipline: an already-parented expression is deep-copied
//! first, so a live node is never shared under two parents.

use super::{BuildResult, BuilderError, ClassGenerator};
use crate::ast::{Block, CatchClause, Expr, NodeKind, Stmt, SwitchCase};
use crate::tree::NodeId;
use crate::types::Type;

impl ClassGenerator {
    pub(crate) fn expect_expr(&self, id: NodeId) -> BuildResult<&Expr> {
        match self.tree().kind(id) {
            NodeKind::Expr(expr) => Ok(expr),
            _ => Err(BuilderError::WrongNodeKind("expression")),
        }
    }

    pub(crate) fn expr_type(&self, id: NodeId) -> BuildResult<Type> {
        Ok(self.expect_expr(id)?.expr_type.clone())
    }

    fn block(&self, id: NodeId) -> BuildResult<&Block> {
        match self.tree().kind(id) {
            NodeKind::Stmt(Stmt::Block(block)) => Ok(block),
            _ => Err(BuilderError::WrongNodeKind("block")),
        }
    }

    fn block_mut(&mut self, id: NodeId) -> BuildResult<&mut Block> {
        match self.tree_mut().kind_mut(id) {
            NodeKind::Stmt(Stmt::Block(block)) => Ok(block),
            _ => Err(BuilderError::WrongNodeKind("block")),
        }
    }

    /// The owning method/constructor must not be finalized yet. Blocks owned
    /// directly by the class (the static initializer) stay open until
    /// emission.
    fn ensure_open(&self, at: NodeId) -> BuildResult<()> {
        let owner = self
            .tree()
            .ancestor_where(at, |kind| matches!(kind, NodeKind::Method(_)));
        if let Some(method) = owner {
            if let NodeKind::Method(decl) = self.tree().kind(method) {
                if decl.args_complete {
                    return Err(BuilderError::MethodFinalized(decl.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Attach `expr` under `parent`, deep-copying when it is already owned
    /// elsewhere. Returns the id actually attached.
    pub(crate) fn attach_expr(&mut self, expr: NodeId, parent: NodeId) -> BuildResult<NodeId> {
        self.expect_expr(expr)?;
        if self.tree().parent(expr).is_some() {
            Ok(self.tree_mut().copy_under(expr, parent))
        } else {
            self.tree_mut().set_parent(expr, Some(parent));
            Ok(expr)
        }
    }

    fn push_stmt(&mut self, block: NodeId, stmt: Stmt) -> BuildResult<NodeId> {
        self.block(block)?;
        let id = self.tree_mut().alloc(NodeKind::Stmt(stmt), Some(block));
        self.block_mut(block)?.stmts.push(id);
        Ok(id)
    }

    fn new_child_block(&mut self, parent: NodeId) -> NodeId {
        self.tree_mut().alloc(NodeKind::Stmt(Stmt::Block(Block::new())), Some(parent))
    }

    /// Add a plain nested block, opening a fresh lexical scope that may
    /// shadow names from enclosing blocks.
    pub fn add_block(&mut self, block: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        self.push_stmt(block, Stmt::Block(Block::new()))
    }

    /// Declare a local variable, registering it in the block's name table.
    /// Duplicate names within the same block are rejected; a nested block
    /// may shadow.
    pub fn add_definition(
        &mut self,
        block: NodeId,
        var_type: Type,
        name: &str,
        init: Option<NodeId>,
    ) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        if self.block(block)?.names.contains_key(name) {
            return Err(BuilderError::DuplicateIdentifier(name.to_string()));
        }
        let stmt = self.push_stmt(
            block,
            Stmt::Definition { name: name.to_string(), var_type, init: None },
        )?;
        if let Some(value) = init {
            let attached = self.attach_expr(value, stmt)?;
            if let NodeKind::Stmt(Stmt::Definition { init, .. }) = self.tree_mut().kind_mut(stmt) {
                *init = Some(attached);
            }
        }
        self.block_mut(block)?.names.insert(name.to_string(), stmt);
        Ok(stmt)
    }

    /// Assign `value` to `target`. The target must be a plain variable, a
    /// field access or an array-element expression.
    pub fn add_assign(&mut self, block: NodeId, target: NodeId, value: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        if !self.expect_expr(target)?.is_assignable() {
            return Err(BuilderError::NotAssignable);
        }
        self.expect_expr(value)?;
        let stmt = self.push_stmt(block, Stmt::Assign { target, value })?;
        let target = self.attach_expr(target, stmt)?;
        let value = self.attach_expr(value, stmt)?;
        if let NodeKind::Stmt(Stmt::Assign { target: t, value: v }) = self.tree_mut().kind_mut(stmt) {
            *t = target;
            *v = value;
        }
        Ok(stmt)
    }

    /// Add an if statement; returns `(statement, then_block)`.
    pub fn add_if(&mut self, block: NodeId, condition: NodeId) -> BuildResult<(NodeId, NodeId)> {
        self.ensure_open(block)?;
        let cond_type = self.expr_type(condition)?;
        if cond_type != Type::Boolean {
            return Err(BuilderError::ConditionNotBoolean(cond_type));
        }
        let stmt = self.push_stmt(block, Stmt::If { condition, then_block: condition, else_block: None })?;
        let condition = self.attach_expr(condition, stmt)?;
        let then_block = self.new_child_block(stmt);
        if let NodeKind::Stmt(Stmt::If { condition: c, then_block: t, .. }) = self.tree_mut().kind_mut(stmt) {
            *c = condition;
            *t = then_block;
        }
        Ok((stmt, then_block))
    }

    /// Create the else arm of an if statement; at most one per statement.
    pub fn add_else(&mut self, if_stmt: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(if_stmt)?;
        match self.tree().kind(if_stmt) {
            NodeKind::Stmt(Stmt::If { else_block: Some(_), .. }) => Err(BuilderError::DuplicateElse),
            NodeKind::Stmt(Stmt::If { .. }) => {
                let else_block = self.new_child_block(if_stmt);
                if let NodeKind::Stmt(Stmt::If { else_block: e, .. }) = self.tree_mut().kind_mut(if_stmt) {
                    *e = Some(else_block);
                }
                Ok(else_block)
            }
            _ => Err(BuilderError::WrongNodeKind("if statement")),
        }
    }

    /// Add a while loop; returns `(statement, body_block)`.
    pub fn add_while(&mut self, block: NodeId, condition: NodeId) -> BuildResult<(NodeId, NodeId)> {
        self.ensure_open(block)?;
        let cond_type = self.expr_type(condition)?;
        if cond_type != Type::Boolean {
            return Err(BuilderError::ConditionNotBoolean(cond_type));
        }
        let stmt = self.push_stmt(block, Stmt::While { condition, body: condition })?;
        let condition = self.attach_expr(condition, stmt)?;
        let body = self.new_child_block(stmt);
        if let NodeKind::Stmt(Stmt::While { condition: c, body: b }) = self.tree_mut().kind_mut(stmt) {
            *c = condition;
            *b = body;
        }
        Ok((stmt, body))
    }

    /// Add a switch over a one-slot integral selector (byte, char, short or
    /// int; never boolean).
    pub fn add_switch(&mut self, block: NodeId, selector: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        let selector_type = self.expr_type(selector)?;
        if !matches!(selector_type, Type::Byte | Type::Char | Type::Short | Type::Int) {
            return Err(BuilderError::SwitchSelector(selector_type));
        }
        let stmt = self.push_stmt(block, Stmt::Switch { selector, cases: Vec::new(), default: None })?;
        let selector = self.attach_expr(selector, stmt)?;
        if let NodeKind::Stmt(Stmt::Switch { selector: s, .. }) = self.tree_mut().kind_mut(stmt) {
            *s = selector;
        }
        Ok(stmt)
    }

    /// Add a case arm. Case order is insertion order: it is the
    /// fall-through order of the emitted labels. Duplicate values are
    /// rejected.
    pub fn add_case(&mut self, switch: NodeId, value: i32) -> BuildResult<NodeId> {
        self.ensure_open(switch)?;
        match self.tree().kind(switch) {
            NodeKind::Stmt(Stmt::Switch { cases, .. }) => {
                if cases.iter().any(|case| case.value == value) {
                    return Err(BuilderError::DuplicateCase(value));
                }
            }
            _ => return Err(BuilderError::WrongNodeKind("switch statement")),
        }
        let body = self.new_child_block(switch);
        if let NodeKind::Stmt(Stmt::Switch { cases, .. }) = self.tree_mut().kind_mut(switch) {
            cases.push(SwitchCase { value, body });
        }
        Ok(body)
    }

    /// Add the default arm; at most one per switch.
    pub fn add_default(&mut self, switch: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(switch)?;
        match self.tree().kind(switch) {
            NodeKind::Stmt(Stmt::Switch { default: Some(_), .. }) => Err(BuilderError::DuplicateDefault),
            NodeKind::Stmt(Stmt::Switch { .. }) => {
                let body = self.new_child_block(switch);
                if let NodeKind::Stmt(Stmt::Switch { default, .. }) = self.tree_mut().kind_mut(switch) {
                    *default = Some(body);
                }
                Ok(body)
            }
            _ => Err(BuilderError::WrongNodeKind("switch statement")),
        }
    }

    /// Add a try statement; returns `(statement, body_block)`.
    pub fn add_try(&mut self, block: NodeId) -> BuildResult<(NodeId, NodeId)> {
        self.ensure_open(block)?;
        let stmt = self.push_stmt(block, Stmt::Try { body: block, catches: Vec::new() })?;
        let body = self.new_child_block(stmt);
        if let NodeKind::Stmt(Stmt::Try { body: b, .. }) = self.tree_mut().kind_mut(stmt) {
            *b = body;
        }
        Ok((stmt, body))
    }

    /// Add a catch clause. Primitive and array exception types are
    /// rejected, as is registering the same type twice on one try.
    /// Subtype-shadowing order between clauses is deliberately not checked.
    pub fn add_catch(
        &mut self,
        try_stmt: NodeId,
        exception_type: Type,
        var_name: &str,
    ) -> BuildResult<NodeId> {
        self.ensure_open(try_stmt)?;
        if !matches!(exception_type, Type::Class(_)) {
            return Err(BuilderError::CatchNotClass(exception_type));
        }
        match self.tree().kind(try_stmt) {
            NodeKind::Stmt(Stmt::Try { catches, .. }) => {
                if catches.iter().any(|c| c.exception_type == exception_type) {
                    return Err(BuilderError::DuplicateCatch(exception_type));
                }
            }
            _ => return Err(BuilderError::WrongNodeKind("try statement")),
        }
        let body = self.new_child_block(try_stmt);
        if let NodeKind::Stmt(Stmt::Try { catches, .. }) = self.tree_mut().kind_mut(try_stmt) {
            catches.push(CatchClause {
                exception_type,
                var_name: var_name.to_string(),
                body,
            });
        }
        Ok(body)
    }

    /// Break out of the nearest enclosing loop or switch. Placement is
    /// checked by the validation pass.
    pub fn add_break(&mut self, block: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        self.push_stmt(block, Stmt::Break)
    }

    pub fn add_return(&mut self, block: NodeId, value: Option<NodeId>) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        if let Some(v) = value {
            self.expect_expr(v)?;
        }
        let stmt = self.push_stmt(block, Stmt::Return { value: None })?;
        if let Some(v) = value {
            let attached = self.attach_expr(v, stmt)?;
            if let NodeKind::Stmt(Stmt::Return { value }) = self.tree_mut().kind_mut(stmt) {
                *value = Some(attached);
            }
        }
        Ok(stmt)
    }

    pub fn add_throw(&mut self, block: NodeId, value: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        let thrown = self.expr_type(value)?;
        if !thrown.is_reference() {
            return Err(BuilderError::BadThrowType(thrown));
        }
        let stmt = self.push_stmt(block, Stmt::Throw { value })?;
        let value = self.attach_expr(value, stmt)?;
        if let NodeKind::Stmt(Stmt::Throw { value: v }) = self.tree_mut().kind_mut(stmt) {
            *v = value;
        }
        Ok(stmt)
    }

    /// Add an expression statement.
    pub fn add_expression(&mut self, block: NodeId, expr: NodeId) -> BuildResult<NodeId> {
        self.ensure_open(block)?;
        self.expect_expr(expr)?;
        let stmt = self.push_stmt(block, Stmt::Expression { expr })?;
        let expr = self.attach_expr(expr, stmt)?;
        if let NodeKind::Stmt(Stmt::Expression { expr: e }) = self.tree_mut().kind_mut(stmt) {
            *e = expr;
        }
        Ok(stmt)
    }

    /// Resolve `name` through the lexical scope chain starting at `from`:
    /// enclosing blocks (including catch variables), then the owning
    /// method's arguments.
    pub(crate) fn resolve_variable(&self, from: NodeId, name: &str) -> Option<Type> {
        let mut previous: Option<NodeId> = None;
        let mut current = Some(from);
        while let Some(id) = current {
            match self.tree().kind(id) {
                NodeKind::Stmt(Stmt::Block(block)) => {
                    if let Some(&definition) = block.names.get(name) {
                        if let NodeKind::Stmt(Stmt::Definition { var_type, .. }) =
                            self.tree().kind(definition)
                        {
                            return Some(var_type.clone());
                        }
                    }
                }
                NodeKind::Stmt(Stmt::Try { catches, .. }) => {
                    if let Some(came_from) = previous {
                        for catch in catches {
                            if catch.body == came_from && catch.var_name == name {
                                return Some(catch.exception_type.clone());
                            }
                        }
                    }
                }
                NodeKind::Method(decl) => {
                    return decl
                        .args
                        .iter()
                        .find(|a| a.name == name)
                        .map(|a| a.arg_type.clone());
                }
                _ => {}
            }
            previous = Some(id);
            current = self.tree().parent(id);
        }
        None
    }
}
