//! Expression builders
//!
//! Expressions are built bottom-up and detached; a statement builder (or an
//! enclosing expression builder) attaches them. Result types follow binary
//! numeric promotion; construction fails for operand types the operator
//! cannot accept, so every successfully built expression carries exactly one
//! type.

use super::{BuildResult, BuilderError, ClassGenerator};
use crate::ast::{BinaryOp, Constant, Expr, ExprKind, NodeKind, UnaryOp};
use crate::tree::NodeId;
use crate::types::{binary_promote, unary_promote, MethodSignature, Type};

fn int_compatible(ty: &Type) -> bool {
    matches!(ty, Type::Byte | Type::Char | Type::Short | Type::Int)
}

impl ClassGenerator {
    fn new_expr(&mut self, kind: ExprKind, expr_type: Type) -> NodeId {
        self.tree_mut().alloc(NodeKind::Expr(Expr { kind, expr_type }), None)
    }

    fn rewrite_expr(&mut self, id: NodeId, rewrite: impl FnOnce(&mut ExprKind)) {
        if let NodeKind::Expr(expr) = self.tree_mut().kind_mut(id) {
            rewrite(&mut expr.kind);
        }
    }

    pub fn const_int(&mut self, value: i32) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Int(value)), Type::Int)
    }

    pub fn const_long(&mut self, value: i64) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Long(value)), Type::Long)
    }

    pub fn const_float(&mut self, value: f32) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Float(value)), Type::Float)
    }

    pub fn const_double(&mut self, value: f64) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Double(value)), Type::Double)
    }

    pub fn const_boolean(&mut self, value: bool) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Boolean(value)), Type::Boolean)
    }

    pub fn const_char(&mut self, value: char) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Char(value)), Type::Char)
    }

    pub fn const_string(&mut self, value: &str) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Str(value.to_string())), Type::string())
    }

    pub fn const_null(&mut self) -> NodeId {
        self.new_expr(ExprKind::Const(Constant::Null), Type::Null)
    }

    /// `this`, typed as the class under construction.
    pub fn this_expr(&mut self) -> NodeId {
        let ty = Type::class(self.name());
        self.new_expr(ExprKind::This, ty)
    }

    /// Reference to a variable visible from `block`: a local declared in an
    /// enclosing block, a catch variable, or a method argument.
    pub fn local(&mut self, block: NodeId, name: &str) -> BuildResult<NodeId> {
        let var_type = self
            .resolve_variable(block, name)
            .ok_or_else(|| BuilderError::UnknownVariable(name.to_string()))?;
        Ok(self.new_expr(ExprKind::Local { name: name.to_string() }, var_type))
    }

    /// Access to a field declared on the class under construction, through
    /// the implicit `this` (or the class itself for static fields).
    pub fn own_field(&mut self, name: &str) -> BuildResult<NodeId> {
        let field_type = self
            .field_decl(name)
            .map(|f| f.field_type.clone())
            .ok_or_else(|| BuilderError::UnknownField(name.to_string()))?;
        Ok(self.new_expr(
            ExprKind::FieldAccess { target: None, owner: None, name: name.to_string() },
            field_type,
        ))
    }

    /// Instance field access on an explicit target expression.
    pub fn field_of(&mut self, target: NodeId, name: &str, field_type: Type) -> BuildResult<NodeId> {
        let target_type = self.expr_type(target)?;
        if !target_type.is_reference() {
            return Err(BuilderError::TargetNotReference(target_type));
        }
        let id = self.new_expr(
            ExprKind::FieldAccess { target: Some(target), owner: None, name: name.to_string() },
            field_type,
        );
        let attached = self.attach_expr(target, id)?;
        self.rewrite_expr(id, |kind| {
            if let ExprKind::FieldAccess { target, .. } = kind {
                *target = Some(attached);
            }
        });
        Ok(id)
    }

    /// Static field access on the named owner class.
    pub fn static_field(&mut self, owner: Type, name: &str, field_type: Type) -> BuildResult<NodeId> {
        if !matches!(owner, Type::Class(_)) {
            return Err(BuilderError::OwnerNotClass(owner));
        }
        Ok(self.new_expr(
            ExprKind::FieldAccess { target: None, owner: Some(owner), name: name.to_string() },
            field_type,
        ))
    }

    pub fn array_access(&mut self, array: NodeId, index: NodeId) -> BuildResult<NodeId> {
        let array_type = self.expr_type(array)?;
        let element = match array_type.element_type() {
            Some(element) => element.clone(),
            None => return Err(BuilderError::NotAnArray(array_type)),
        };
        let index_type = self.expr_type(index)?;
        if !int_compatible(&index_type) {
            return Err(BuilderError::BadIndex(index_type));
        }
        let id = self.new_expr(ExprKind::ArrayAccess { array, index }, element);
        let array = self.attach_expr(array, id)?;
        let index = self.attach_expr(index, id)?;
        self.rewrite_expr(id, |kind| {
            if let ExprKind::ArrayAccess { array: a, index: i } = kind {
                *a = array;
                *i = index;
            }
        });
        Ok(id)
    }

    /// Instance call on an explicit target. The caller supplies the callee's
    /// signature (obtained from a `ClassInfo`); the validation pass checks
    /// it against the resolved class.
    pub fn call(
        &mut self,
        target: NodeId,
        name: &str,
        signature: &MethodSignature,
        args: Vec<NodeId>,
    ) -> BuildResult<NodeId> {
        let target_type = self.expr_type(target)?;
        if !target_type.is_reference() {
            return Err(BuilderError::TargetNotReference(target_type));
        }
        self.build_call(Some(target), None, name, signature, args)
    }

    /// Static call on the named owner class.
    pub fn call_static(
        &mut self,
        owner: Type,
        name: &str,
        signature: &MethodSignature,
        args: Vec<NodeId>,
    ) -> BuildResult<NodeId> {
        if !matches!(owner, Type::Class(_)) {
            return Err(BuilderError::OwnerNotClass(owner));
        }
        self.build_call(None, Some(owner), name, signature, args)
    }

    /// Call on the implicit `this`.
    pub fn call_this(
        &mut self,
        name: &str,
        signature: &MethodSignature,
        args: Vec<NodeId>,
    ) -> BuildResult<NodeId> {
        self.build_call(None, None, name, signature, args)
    }

    fn build_call(
        &mut self,
        target: Option<NodeId>,
        owner: Option<Type>,
        name: &str,
        signature: &MethodSignature,
        args: Vec<NodeId>,
    ) -> BuildResult<NodeId> {
        if args.len() != signature.parameter_types.len() {
            return Err(BuilderError::ArityMismatch {
                name: name.to_string(),
                expected: signature.parameter_types.len(),
                found: args.len(),
            });
        }
        for &arg in &args {
            self.expect_expr(arg)?;
        }
        let id = self.new_expr(
            ExprKind::Call { target, owner, name: name.to_string(), args: args.clone() },
            signature.return_type.clone(),
        );
        let attached_target = match target {
            Some(t) => Some(self.attach_expr(t, id)?),
            None => None,
        };
        let mut attached_args = Vec::with_capacity(args.len());
        for arg in args {
            attached_args.push(self.attach_expr(arg, id)?);
        }
        self.rewrite_expr(id, |kind| {
            if let ExprKind::Call { target, args, .. } = kind {
                *target = attached_target;
                *args = attached_args;
            }
        });
        Ok(id)
    }

    /// Object construction; the constructor is matched by the argument
    /// expression types during validation.
    pub fn new_object(&mut self, class_type: Type, args: Vec<NodeId>) -> BuildResult<NodeId> {
        if !matches!(class_type, Type::Class(_)) {
            return Err(BuilderError::NewNotClass(class_type));
        }
        for &arg in &args {
            self.expect_expr(arg)?;
        }
        let id = self.new_expr(
            ExprKind::New { class_type: class_type.clone(), args: args.clone() },
            class_type,
        );
        let mut attached = Vec::with_capacity(args.len());
        for arg in args {
            attached.push(self.attach_expr(arg, id)?);
        }
        self.rewrite_expr(id, |kind| {
            if let ExprKind::New { args, .. } = kind {
                *args = attached;
            }
        });
        Ok(id)
    }

    pub fn new_array(&mut self, element_type: Type, length: NodeId) -> BuildResult<NodeId> {
        if matches!(element_type, Type::Void | Type::Null) {
            return Err(BuilderError::BadArrayElement(element_type));
        }
        let length_type = self.expr_type(length)?;
        if !int_compatible(&length_type) {
            return Err(BuilderError::BadArrayLength(length_type));
        }
        let array_type = Type::array_of(element_type.clone());
        let id = self.new_expr(ExprKind::NewArray { element_type, length }, array_type);
        let length = self.attach_expr(length, id)?;
        self.rewrite_expr(id, |kind| {
            if let ExprKind::NewArray { length: l, .. } = kind {
                *l = length;
            }
        });
        Ok(id)
    }

    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> BuildResult<NodeId> {
        let lt = self.expr_type(left)?;
        let rt = self.expr_type(right)?;
        let mismatch = || BuilderError::BadOperandTypes {
            op: op.symbol(),
            left: lt.clone(),
            right: rt.clone(),
        };
        let result = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                binary_promote(&lt, &rt).ok_or_else(mismatch)?
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                if lt == Type::Boolean && rt == Type::Boolean {
                    Type::Boolean
                } else if lt.is_integral() && rt.is_integral() {
                    binary_promote(&lt, &rt).ok_or_else(mismatch)?
                } else {
                    return Err(mismatch());
                }
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => {
                if lt.is_integral() && rt.is_integral() {
                    unary_promote(&lt)
                } else {
                    return Err(mismatch());
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let comparable = (lt.is_number() && rt.is_number())
                    || (lt == Type::Boolean && rt == Type::Boolean)
                    || (lt.is_reference() && rt.is_reference());
                if !comparable {
                    return Err(mismatch());
                }
                Type::Boolean
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if !(lt.is_number() && rt.is_number()) {
                    return Err(mismatch());
                }
                Type::Boolean
            }
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                if lt != Type::Boolean || rt != Type::Boolean {
                    return Err(mismatch());
                }
                Type::Boolean
            }
        };
        let id = self.new_expr(ExprKind::Binary { op, left, right }, result);
        let left = self.attach_expr(left, id)?;
        let right = self.attach_expr(right, id)?;
        self.rewrite_expr(id, |kind| {
            if let ExprKind::Binary { left: l, right: r, .. } = kind {
                *l = left;
                *r = right;
            }
        });
        Ok(id)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> BuildResult<NodeId> {
        let operand_type = self.expr_type(operand)?;
        let result = match op {
            UnaryOp::Neg => {
                if !operand_type.is_number() {
                    return Err(BuilderError::BadUnaryOperand { op: op.symbol(), operand: operand_type });
                }
                unary_promote(&operand_type)
            }
            UnaryOp::Not => {
                if operand_type != Type::Boolean {
                    return Err(BuilderError::BadUnaryOperand { op: op.symbol(), operand: operand_type });
                }
                Type::Boolean
            }
            UnaryOp::BitNot => {
                if !operand_type.is_integral() {
                    return Err(BuilderError::BadUnaryOperand { op: op.symbol(), operand: operand_type });
                }
                unary_promote(&operand_type)
            }
        };
        let id = self.new_expr(ExprKind::Unary { op, operand }, result);
        let operand = self.attach_expr(operand, id)?;
        self.rewrite_expr(id, |kind| {
            if let ExprKind::Unary { operand: o, .. } = kind {
                *o = operand;
            }
        });
        Ok(id)
    }

    /// Explicit cast. Primitive casts follow the widening/narrowing
    /// lattice; reference-to-reference casts are accepted structurally and
    /// checked against the hierarchy during validation.
    pub fn cast(&mut self, target_type: Type, expr: NodeId) -> BuildResult<NodeId> {
        let from = self.expr_type(expr)?;
        let legal = if target_type == from {
            true
        } else if target_type.is_primitive() && from.is_primitive() {
            target_type.has_primitive_widening_conversion_from(&from)
                || target_type.has_primitive_narrowing_conversion_from(&from)
        } else {
            target_type.is_reference() && from.is_reference()
        };
        if !legal {
            return Err(BuilderError::BadCast { from, to: target_type });
        }
        let id = self.new_expr(ExprKind::Cast { target_type: target_type.clone(), expr }, target_type);
        let expr = self.attach_expr(expr, id)?;
        self.rewrite_expr(id, |kind| {
            if let ExprKind::Cast { expr: e, .. } = kind {
                *e = expr;
            }
        });
        Ok(id)
    }

    pub fn instance_of(&mut self, checked_type: Type, expr: NodeId) -> BuildResult<NodeId> {
        if !matches!(checked_type, Type::Class(_) | Type::Array(_)) {
            return Err(BuilderError::BadInstanceOf(checked_type));
        }
        let expr_type = self.expr_type(expr)?;
        if !expr_type.is_reference() {
            return Err(BuilderError::BadInstanceOf(expr_type));
        }
        let id = self.new_expr(ExprKind::InstanceOf { checked_type, expr }, Type::Boolean);
        let expr = self.attach_expr(expr, id)?;
        self.rewrite_expr(id, |kind| {
            if let ExprKind::InstanceOf { expr: e, .. } = kind {
                *e = expr;
            }
        });
        Ok(id)
    }
}
