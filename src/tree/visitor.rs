//! Double-dispatch traversal over the tree
//!
//! Concrete passes implement [`Visitor`]; every hook defaults to a no-op
//! pass-through so a pass overrides only the kinds it cares about. The walk
//! driver dispatches on the node's concrete kind, calling the pre hook,
//! descending into children in declared order, then calling the post hook.

use crate::ast::{Block, ClassDecl, Expr, FieldDecl, MethodDecl, NodeKind, Stmt};
use crate::error::Result;
use crate::tree::{NodeId, Tree};

#[allow(unused_variables)]
pub trait Visitor {
    fn pre_class(&mut self, tree: &Tree, id: NodeId, class: &ClassDecl) -> Result<()> {
        Ok(())
    }
    fn post_class(&mut self, tree: &Tree, id: NodeId, class: &ClassDecl) -> Result<()> {
        Ok(())
    }

    fn pre_field(&mut self, tree: &Tree, id: NodeId, field: &FieldDecl) -> Result<()> {
        Ok(())
    }
    fn post_field(&mut self, tree: &Tree, id: NodeId, field: &FieldDecl) -> Result<()> {
        Ok(())
    }

    fn pre_method(&mut self, tree: &Tree, id: NodeId, method: &MethodDecl) -> Result<()> {
        Ok(())
    }
    fn post_method(&mut self, tree: &Tree, id: NodeId, method: &MethodDecl) -> Result<()> {
        Ok(())
    }

    fn pre_block(&mut self, tree: &Tree, id: NodeId, block: &Block) -> Result<()> {
        Ok(())
    }
    fn post_block(&mut self, tree: &Tree, id: NodeId, block: &Block) -> Result<()> {
        Ok(())
    }

    fn pre_stmt(&mut self, tree: &Tree, id: NodeId, stmt: &Stmt) -> Result<()> {
        Ok(())
    }
    fn post_stmt(&mut self, tree: &Tree, id: NodeId, stmt: &Stmt) -> Result<()> {
        Ok(())
    }

    fn pre_expr(&mut self, tree: &Tree, id: NodeId, expr: &Expr) -> Result<()> {
        Ok(())
    }
    fn post_expr(&mut self, tree: &Tree, id: NodeId, expr: &Expr) -> Result<()> {
        Ok(())
    }
}

/// Drive `visitor` over the subtree rooted at `id`.
pub fn walk(tree: &Tree, id: NodeId, visitor: &mut dyn Visitor) -> Result<()> {
    match tree.kind(id) {
        NodeKind::Class(class) => {
            visitor.pre_class(tree, id, class)?;
            for child in tree.kind(id).child_ids() {
                walk(tree, child, visitor)?;
            }
            let NodeKind::Class(class) = tree.kind(id) else { unreachable!() };
            visitor.post_class(tree, id, class)
        }
        NodeKind::Field(field) => {
            visitor.pre_field(tree, id, field)?;
            visitor.post_field(tree, id, field)
        }
        NodeKind::Method(method) => {
            visitor.pre_method(tree, id, method)?;
            for child in tree.kind(id).child_ids() {
                walk(tree, child, visitor)?;
            }
            let NodeKind::Method(method) = tree.kind(id) else { unreachable!() };
            visitor.post_method(tree, id, method)
        }
        NodeKind::Stmt(Stmt::Block(block)) => {
            visitor.pre_block(tree, id, block)?;
            for child in tree.kind(id).child_ids() {
                walk(tree, child, visitor)?;
            }
            let NodeKind::Stmt(Stmt::Block(block)) = tree.kind(id) else { unreachable!() };
            visitor.post_block(tree, id, block)
        }
        NodeKind::Stmt(stmt) => {
            visitor.pre_stmt(tree, id, stmt)?;
            for child in tree.kind(id).child_ids() {
                walk(tree, child, visitor)?;
            }
            let NodeKind::Stmt(stmt) = tree.kind(id) else { unreachable!() };
            visitor.post_stmt(tree, id, stmt)
        }
        NodeKind::Expr(expr) => {
            visitor.pre_expr(tree, id, expr)?;
            for child in tree.kind(id).child_ids() {
                walk(tree, child, visitor)?;
            }
            let NodeKind::Expr(expr) = tree.kind(id) else { unreachable!() };
            visitor.post_expr(tree, id, expr)
        }
    }
}

/// The mark-stack used by the emission backends to compose sub-results.
///
/// A composite renderer brackets a region with [`WalkContext::mark`], renders
/// each sub-expression independently (each pushing its accumulated result),
/// then collects the region in declared order with [`WalkContext::pop_mark`].
/// Sub-results can therefore be computed out of order relative to the final
/// emission order (all call arguments before the operator token, say)
/// without ambient mutable state.
#[derive(Debug)]
pub struct WalkContext<R> {
    stack: Vec<R>,
    marks: Vec<usize>,
}

impl<R> Default for WalkContext<R> {
    fn default() -> Self {
        Self { stack: Vec::new(), marks: Vec::new() }
    }
}

impl<R> WalkContext<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: R) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<R> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bracket the current stack position. Marks nest.
    pub fn mark(&mut self) {
        self.marks.push(self.stack.len());
    }

    /// Remove the most recent mark and drain everything pushed since it,
    /// in push order.
    pub fn pop_mark(&mut self) -> Vec<R> {
        let from = self.marks.pop().unwrap_or(0);
        self.stack.split_off(from.min(self.stack.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::WalkContext;

    #[test]
    fn marks_bracket_stack_regions() {
        let mut context: WalkContext<&str> = WalkContext::new();
        context.push("outer");
        context.mark();
        context.push("a");
        context.push("b");
        context.mark();
        context.push("c");
        assert_eq!(context.pop_mark(), vec!["c"]);
        context.push("d");
        assert_eq!(context.pop_mark(), vec!["a", "b", "d"]);
        assert_eq!(context.pop(), Some("outer"));
        assert_eq!(context.depth(), 0);
    }
}
