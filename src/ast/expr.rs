//! Expression node kinds
//!
//! Every expression records its type when constructed and never mutates it
//! afterwards; the builder computes result types (binary numeric promotion,
//! comparison results, element types) at construction time.

use crate::tree::NodeId;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(char),
    Str(String),
    Null,
}

impl Constant {
    pub fn constant_type(&self) -> Type {
        match self {
            Constant::Int(_) => Type::Int,
            Constant::Long(_) => Type::Long,
            Constant::Float(_) => Type::Float,
            Constant::Double(_) => Type::Double,
            Constant::Boolean(_) => Type::Boolean,
            Constant::Char(_) => Type::Char,
            Constant::Str(_) => Type::string(),
            Constant::Null => Type::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Boolean complement.
    Not,
    /// Bitwise complement of an integral value.
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Const(Constant),
    /// Reference to a local variable or method argument.
    Local { name: String },
    This,
    /// Instance field when `target` is set (or implicit `this` when the
    /// owner is `None`); static field when `owner` names the declaring
    /// class and `target` is absent.
    FieldAccess {
        target: Option<NodeId>,
        owner: Option<Type>,
        name: String,
    },
    ArrayAccess {
        array: NodeId,
        index: NodeId,
    },
    /// Instance call when `target` is set, static call when `owner` is set
    /// without a target, call on `this` when neither is set.
    Call {
        target: Option<NodeId>,
        owner: Option<Type>,
        name: String,
        args: Vec<NodeId>,
    },
    New {
        class_type: Type,
        args: Vec<NodeId>,
    },
    NewArray {
        element_type: Type,
        length: NodeId,
    },
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Cast {
        target_type: Type,
        expr: NodeId,
    },
    InstanceOf {
        checked_type: Type,
        expr: NodeId,
    },
}

impl ExprKind {
    pub(crate) fn child_ids(&self) -> Vec<NodeId> {
        match self {
            ExprKind::Const(_) | ExprKind::Local { .. } | ExprKind::This => Vec::new(),
            ExprKind::FieldAccess { target, .. } => target.iter().copied().collect(),
            ExprKind::ArrayAccess { array, index } => vec![*array, *index],
            ExprKind::Call { target, args, .. } => {
                target.iter().copied().chain(args.iter().copied()).collect()
            }
            ExprKind::New { args, .. } => args.clone(),
            ExprKind::NewArray { length, .. } => vec![*length],
            ExprKind::Binary { left, right, .. } => vec![*left, *right],
            ExprKind::Unary { operand, .. } => vec![*operand],
            ExprKind::Cast { expr, .. } => vec![*expr],
            ExprKind::InstanceOf { expr, .. } => vec![*expr],
        }
    }

    pub(crate) fn remap_children(&mut self, remap: &impl Fn(&mut NodeId)) {
        match self {
            ExprKind::Const(_) | ExprKind::Local { .. } | ExprKind::This => {}
            ExprKind::FieldAccess { target, .. } => {
                if let Some(id) = target.as_mut() {
                    remap(id);
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                remap(array);
                remap(index);
            }
            ExprKind::Call { target, args, .. } => {
                if let Some(id) = target.as_mut() {
                    remap(id);
                }
                for id in args.iter_mut() {
                    remap(id);
                }
            }
            ExprKind::New { args, .. } => {
                for id in args.iter_mut() {
                    remap(id);
                }
            }
            ExprKind::NewArray { length, .. } => remap(length),
            ExprKind::Binary { left, right, .. } => {
                remap(left);
                remap(right);
            }
            ExprKind::Unary { operand, .. } => remap(operand),
            ExprKind::Cast { expr, .. } => remap(expr),
            ExprKind::InstanceOf { expr, .. } => remap(expr),
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            ExprKind::Const(_) => "const",
            ExprKind::Local { .. } => "local",
            ExprKind::This => "this",
            ExprKind::FieldAccess { .. } => "field-access",
            ExprKind::ArrayAccess { .. } => "array-access",
            ExprKind::Call { .. } => "call",
            ExprKind::New { .. } => "new",
            ExprKind::NewArray { .. } => "new-array",
            ExprKind::Binary { .. } => "binary",
            ExprKind::Unary { .. } => "unary",
            ExprKind::Cast { .. } => "cast",
            ExprKind::InstanceOf { .. } => "instanceof",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub expr_type: Type,
}

impl Expr {
    /// Legal assignment targets: plain variables, field accesses and
    /// array-element expressions.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Local { .. } | ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. }
        )
    }
}
