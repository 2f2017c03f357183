//! Statement/expression AST and declaration payloads
//!
//! Node payloads carried by the tree arena. Children are referenced by
//! [`NodeId`]; the payload enums know how to enumerate and remap those
//! references so the copy protocol can stay generic.

mod decl;
mod expr;
mod stmt;

pub use decl::{Argument, ClassDecl, FieldDecl, MethodDecl};
pub use expr::{BinaryOp, Constant, Expr, ExprKind, UnaryOp};
pub use stmt::{Block, CatchClause, Stmt, SwitchCase};

use std::collections::HashMap;

use crate::tree::NodeId;

#[derive(Debug, Clone)]
pub enum NodeKind {
    Class(ClassDecl),
    Field(FieldDecl),
    Method(MethodDecl),
    Stmt(Stmt),
    Expr(Expr),
}

impl NodeKind {
    /// Direct children in declared order.
    pub fn child_ids(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Class(class) => class.child_ids(),
            NodeKind::Field(_) => Vec::new(),
            NodeKind::Method(method) => method.body.into_iter().collect(),
            NodeKind::Stmt(stmt) => stmt.child_ids(),
            NodeKind::Expr(expr) => expr.kind.child_ids(),
        }
    }

    /// Rewrite every child reference through the old-to-new identity map
    /// built by the copy protocol. References outside the map (never
    /// produced by a downward copy) keep their identity.
    pub(crate) fn remap_children(&mut self, map: &HashMap<NodeId, NodeId>) {
        let remap = |id: &mut NodeId| {
            if let Some(&new_id) = map.get(id) {
                *id = new_id;
            }
        };
        match self {
            NodeKind::Class(class) => class.remap_children(&remap),
            NodeKind::Field(_) => {}
            NodeKind::Method(method) => {
                if let Some(body) = method.body.as_mut() {
                    remap(body);
                }
            }
            NodeKind::Stmt(stmt) => stmt.remap_children(&remap),
            NodeKind::Expr(expr) => expr.kind.remap_children(&remap),
        }
    }

    /// Short kind label for dumps and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            NodeKind::Class(class) => {
                if class.is_interface {
                    format!("interface {}", class.name)
                } else {
                    format!("class {}", class.name)
                }
            }
            NodeKind::Field(field) => format!("field {} {}", field.field_type, field.name),
            NodeKind::Method(method) => format!("method {}", method.name),
            NodeKind::Stmt(stmt) => stmt.describe().to_string(),
            NodeKind::Expr(expr) => format!("expr {} : {}", expr.kind.describe(), expr.expr_type),
        }
    }
}
