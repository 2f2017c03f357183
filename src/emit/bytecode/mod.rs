//! Classfile bytecode backend
//!
//! Consumes the same tree the source backend renders and produces a
//! [`ClassFile`]. Control flow compiles to structured jumps over symbolic
//! labels; `max_stack` and `max_locals` fall out of the traversal (the
//! setup pass pre-assigned local slots and frame sizes as attributes).

pub mod classfile;
pub mod code;
pub mod constpool;
pub mod opcodes;
pub mod writer;

pub use classfile::ClassFile;

use std::collections::HashMap;

use classfile::{
    make_exceptions_attribute, AttributeInfo, CodeAttribute, CONSTRUCTOR_METHOD_NAME, MAGIC,
    MAJOR_VERSION, STATIC_INITIALIZER_METHOD_NAME,
};
use code::{Code, Label};
use constpool::ConstantPool;
use opcodes as op;

use crate::ast::{BinaryOp, Constant, Expr, ExprKind, MethodDecl, NodeKind, Stmt, UnaryOp};
use crate::attr::{FRAME_SIZE, LOCAL_SLOT};
use crate::check::{constructor_matching, resolve_class, resolve_method};
use crate::config::Config;
use crate::emit::EmitError;
use crate::error::Result;
use crate::gen::ClassGenerator;
use crate::tree::{NodeId, Tree};
use crate::types::access_flags::{ACC_PUBLIC, ACC_STATIC, ACC_SUPER};
use crate::types::{type_descriptor, MethodSignature, ResolutionContext, Type};

fn internal(name: &str) -> String {
    name.replace('.', "/")
}

/// CONSTANT_Class form of a type: internal name for classes, descriptor
/// form for arrays.
fn class_ref(ty: &Type) -> String {
    match ty {
        Type::Class(name) => internal(name),
        other => type_descriptor(other),
    }
}

/// Computational kind of a value on the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Int,
    Long,
    Float,
    Double,
    Ref,
}

fn kind_of(ty: &Type) -> Kind {
    match ty {
        Type::Boolean | Type::Byte | Type::Char | Type::Short | Type::Int => Kind::Int,
        Type::Long => Kind::Long,
        Type::Float => Kind::Float,
        Type::Double => Kind::Double,
        _ => Kind::Ref,
    }
}

fn kind_index(kind: Kind) -> u8 {
    match kind {
        Kind::Int => 0,
        Kind::Long => 1,
        Kind::Float => 2,
        Kind::Double => 3,
        Kind::Ref => 4,
    }
}

fn kind_width(kind: Kind) -> u16 {
    match kind {
        Kind::Long | Kind::Double => 2,
        _ => 1,
    }
}

pub struct ClassFileEmitter<'a> {
    gen: &'a ClassGenerator,
    context: &'a ResolutionContext,
    imports: &'a [String],
    trace: bool,
}

impl<'a> ClassFileEmitter<'a> {
    pub fn new(
        gen: &'a ClassGenerator,
        context: &'a ResolutionContext,
        imports: &'a [String],
        config: &Config,
    ) -> Self {
        Self { gen, context, imports, trace: config.trace_emission }
    }

    pub fn emit(&self) -> Result<ClassFile> {
        let class = self.gen.class();
        let mut pool = ConstantPool::new();

        let this_class = pool.class(&internal(&class.name))?;
        let super_name = class
            .super_class
            .as_ref()
            .and_then(|t| t.class_name())
            .unwrap_or(crate::types::OBJECT_CLASS);
        let super_class = pool.class(&internal(super_name))?;
        let mut interfaces = Vec::new();
        for interface in &class.interfaces {
            if let Some(name) = interface.class_name() {
                interfaces.push(pool.class(&internal(name))?);
            }
        }

        let mut fields = Vec::new();
        for &field_node in &class.fields {
            if let NodeKind::Field(field) = self.gen.tree().kind(field_node) {
                let name_index = pool.utf8(&field.name)?;
                let descriptor_index = pool.utf8(&type_descriptor(&field.field_type))?;
                fields.push(classfile::FieldInfo::new(field.access, name_index, descriptor_index));
            }
        }

        let mut methods = Vec::new();
        if class.constructors.is_empty() && !class.is_interface {
            methods.push(self.synthesize_default_constructor(&mut pool, super_name)?);
        }
        for &ctor in &class.constructors {
            methods.push(self.emit_method(&mut pool, ctor, super_name)?);
        }
        for &method in &class.methods {
            methods.push(self.emit_method(&mut pool, method, super_name)?);
        }
        if let Some(initializer) = class.initializer {
            methods.push(self.emit_static_initializer(&mut pool, initializer)?);
        }

        let access_flags = if class.is_interface { class.access } else { class.access | ACC_SUPER };
        Ok(ClassFile {
            magic: MAGIC,
            minor_version: 0,
            major_version: MAJOR_VERSION,
            constant_pool: pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes: Vec::new(),
        })
    }

    fn synthesize_default_constructor(
        &self,
        pool: &mut ConstantPool,
        super_name: &str,
    ) -> Result<classfile::MethodInfo> {
        let mut code = Code::new(1);
        code.emit(op::ALOAD_0);
        code.push(1);
        let super_init = pool.method_ref(&internal(super_name), CONSTRUCTOR_METHOD_NAME, "()V")?;
        code.emit(op::INVOKESPECIAL);
        code.emit_u16(super_init);
        code.pop(1);
        code.emit(op::RETURN);
        let finished = code.finish()?;
        let name_index = pool.utf8(CONSTRUCTOR_METHOD_NAME)?;
        let descriptor_index = pool.utf8("()V")?;
        let mut info = classfile::MethodInfo::new(ACC_PUBLIC, name_index, descriptor_index);
        info.attributes.push(
            CodeAttribute {
                max_stack: finished.max_stack,
                max_locals: finished.max_locals,
                code: finished.code,
                exception_table: finished.exception_table,
            }
            .into_attribute(pool)?,
        );
        Ok(info)
    }

    fn emit_method(
        &self,
        pool: &mut ConstantPool,
        method: NodeId,
        super_name: &str,
    ) -> Result<classfile::MethodInfo> {
        let decl = match self.gen.tree().kind(method) {
            NodeKind::Method(decl) => decl.clone(),
            _ => return Err(EmitError::Unsupported("non-method node".to_string()).into()),
        };
        let signature = MethodSignature::new(
            decl.return_type.clone(),
            decl.args.iter().map(|a| a.arg_type.clone()).collect(),
        );
        let name_index = pool.utf8(&decl.name)?;
        let descriptor_index = pool.utf8(&signature.descriptor())?;
        let mut info = classfile::MethodInfo::new(decl.access, name_index, descriptor_index);

        if let Some(body) = decl.body {
            let max_locals = FRAME_SIZE
                .get_if_set(self.gen.tree(), method)
                .map(|v| v as u16)
                .unwrap_or_else(|| frame_floor(&decl));
            let mut emitter = BodyEmitter::new(self, pool, &decl, max_locals);
            if decl.is_constructor {
                emitter.emit_super_call(super_name)?;
            }
            let attribute = emitter.emit_body(body, &decl)?;
            info.attributes.push(attribute);
        }

        if !decl.exceptions.is_empty() {
            let mut indices = Vec::new();
            for exception in &decl.exceptions {
                if let Some(name) = exception.class_name() {
                    indices.push(pool.class(&internal(name))?);
                }
            }
            info.attributes.push(make_exceptions_attribute(pool, &indices)?);
        }
        Ok(info)
    }

    fn emit_static_initializer(
        &self,
        pool: &mut ConstantPool,
        block: NodeId,
    ) -> Result<classfile::MethodInfo> {
        let decl = MethodDecl {
            access: ACC_STATIC,
            name: STATIC_INITIALIZER_METHOD_NAME.to_string(),
            return_type: Type::Void,
            args: Vec::new(),
            exceptions: Vec::new(),
            body: Some(block),
            is_constructor: false,
            args_complete: true,
        };
        let max_locals = FRAME_SIZE
            .get_if_set(self.gen.tree(), block)
            .map(|v| v as u16)
            .unwrap_or(0);
        let name_index = pool.utf8(STATIC_INITIALIZER_METHOD_NAME)?;
        let descriptor_index = pool.utf8("()V")?;
        let mut info = classfile::MethodInfo::new(ACC_STATIC, name_index, descriptor_index);
        let emitter = BodyEmitter::new(self, pool, &decl, max_locals);
        info.attributes.push(emitter.emit_body(block, &decl)?);
        Ok(info)
    }
}

fn frame_floor(decl: &MethodDecl) -> u16 {
    let mut slots = if decl.is_static() { 0 } else { 1 };
    for arg in &decl.args {
        slots += arg.arg_type.size();
    }
    slots
}

/// One enclosing breakable construct: its exit label, and whether any
/// break actually targeted it (an exhaustive switch with no breaks is
/// terminal).
struct BreakScope {
    label: Label,
    used: bool,
}

struct BodyEmitter<'e, 'a> {
    owner: &'e ClassFileEmitter<'a>,
    pool: &'e mut ConstantPool,
    code: Code,
    arg_slots: HashMap<String, (u16, Type)>,
    break_targets: Vec<BreakScope>,
    return_type: Type,
}

impl<'e, 'a> BodyEmitter<'e, 'a> {
    fn new(
        owner: &'e ClassFileEmitter<'a>,
        pool: &'e mut ConstantPool,
        decl: &MethodDecl,
        max_locals: u16,
    ) -> Self {
        let mut arg_slots = HashMap::new();
        let mut next: u16 = if decl.is_static() { 0 } else { 1 };
        for arg in &decl.args {
            arg_slots.insert(arg.name.clone(), (next, arg.arg_type.clone()));
            next += arg.arg_type.size();
        }
        Self {
            owner,
            pool,
            code: Code::new(max_locals),
            arg_slots,
            break_targets: Vec::new(),
            return_type: decl.return_type.clone(),
        }
    }

    fn tree(&self) -> &'a Tree {
        self.owner.gen.tree()
    }

    fn emit_super_call(&mut self, super_name: &str) -> Result<()> {
        self.code.emit(op::ALOAD_0);
        self.code.push(1);
        let super_init =
            self.pool.method_ref(&internal(super_name), CONSTRUCTOR_METHOD_NAME, "()V")?;
        self.code.emit(op::INVOKESPECIAL);
        self.code.emit_u16(super_init);
        self.code.pop(1);
        Ok(())
    }

    fn emit_body(mut self, body: NodeId, decl: &MethodDecl) -> Result<AttributeInfo> {
        let terminal = self.emit_block(body)?;
        if !terminal {
            if self.return_type == Type::Void {
                self.code.emit(op::RETURN);
            } else {
                return Err(EmitError::MissingReturn(decl.name.clone()).into());
            }
        }
        let finished = self.code.finish()?;
        let pool = self.pool;
        Ok(CodeAttribute {
            max_stack: finished.max_stack,
            max_locals: finished.max_locals,
            code: finished.code,
            exception_table: finished.exception_table,
        }
        .into_attribute(pool)?)
    }

    /// Emit every statement of a block; true when the block cannot complete
    /// normally (its last statement returns, throws or breaks on all paths).
    fn emit_block(&mut self, block: NodeId) -> Result<bool> {
        let stmts = match self.tree().kind(block) {
            NodeKind::Stmt(Stmt::Block(b)) => b.stmts.clone(),
            _ => return Err(EmitError::Unsupported("non-block node".to_string()).into()),
        };
        let mut terminal = false;
        for stmt in stmts {
            terminal = self.emit_stmt(stmt)?;
        }
        Ok(terminal)
    }

    fn emit_stmt(&mut self, id: NodeId) -> Result<bool> {
        let stmt = match self.tree().kind(id) {
            NodeKind::Stmt(s) => s.clone(),
            _ => return Err(EmitError::Unsupported("non-statement node".to_string()).into()),
        };
        if self.owner.trace {
            log::trace!("emit {} at pc {}", stmt.describe(), self.code.pc());
        }
        match stmt {
            Stmt::Block(_) => self.emit_block(id),
            Stmt::Definition { var_type, init, .. } => {
                if let Some(init) = init {
                    let init_type = self.expr_type(init)?;
                    self.eval(init)?;
                    self.convert(&init_type, &var_type);
                    let slot = LOCAL_SLOT
                        .get_if_set(self.tree(), id)
                        .ok_or_else(|| EmitError::Unsupported("missing local slot".to_string()))?
                        as u16;
                    self.store_local(slot, &var_type)?;
                }
                Ok(false)
            }
            Stmt::Assign { target, value } => {
                self.emit_assign(target, value)?;
                Ok(false)
            }
            Stmt::If { condition, then_block, else_block } => {
                let else_label = self.code.new_label();
                self.eval(condition)?;
                self.code.branch(op::IFEQ, else_label);
                self.code.pop(1);
                let then_terminal = self.emit_block(then_block)?;
                match else_block {
                    Some(else_block) => {
                        let end = self.code.new_label();
                        if !then_terminal {
                            self.code.branch(op::GOTO, end);
                        }
                        self.code.bind(else_label)?;
                        let else_terminal = self.emit_block(else_block)?;
                        self.code.bind(end)?;
                        Ok(then_terminal && else_terminal)
                    }
                    None => {
                        self.code.bind(else_label)?;
                        Ok(false)
                    }
                }
            }
            Stmt::While { condition, body } => {
                let start = self.code.new_label();
                let end = self.code.new_label();
                self.code.bind(start)?;
                self.eval(condition)?;
                self.code.branch(op::IFEQ, end);
                self.code.pop(1);
                self.break_targets.push(BreakScope { label: end, used: false });
                self.emit_block(body)?;
                self.break_targets.pop();
                self.code.branch(op::GOTO, start);
                self.code.bind(end)?;
                Ok(false)
            }
            Stmt::Switch { selector, cases, default } => {
                self.eval(selector)?;
                let end = self.code.new_label();
                let default_label = self.code.new_label();
                let case_labels: Vec<Label> = cases.iter().map(|_| self.code.new_label()).collect();

                let switch_pc = self.code.pc();
                self.code.emit(op::LOOKUPSWITCH);
                self.code.pop(1);
                self.code.align4();
                self.code.wide_offset(switch_pc, default_label);
                // Dispatch pairs must be sorted by key; the case bodies
                // below keep insertion order, which is the fall-through
                // order of the labels.
                let mut pairs: Vec<(i32, Label)> =
                    cases.iter().zip(case_labels.iter()).map(|(c, &l)| (c.value, l)).collect();
                pairs.sort_by_key(|pair| pair.0);
                self.code.emit_u32(pairs.len() as u32);
                for (value, label) in pairs {
                    self.code.emit_u32(value as u32);
                    self.code.wide_offset(switch_pc, label);
                }

                self.break_targets.push(BreakScope { label: end, used: false });
                let mut arms_terminal = true;
                for (case, label) in cases.iter().zip(case_labels.iter()) {
                    self.code.bind(*label)?;
                    let case_terminal = self.emit_block(case.body)?;
                    arms_terminal = arms_terminal && case_terminal;
                }
                self.code.bind(default_label)?;
                let default_terminal = match default {
                    Some(default) => self.emit_block(default)?,
                    None => false,
                };
                let broke_out = self.break_targets.pop().map(|scope| scope.used).unwrap_or(false);
                self.code.bind(end)?;
                Ok(arms_terminal && default_terminal && !broke_out)
            }
            Stmt::Try { body, catches } => {
                let start_pc = self.code.pc();
                let body_terminal = self.emit_block(body)?;
                let end_pc = self.code.pc();
                let end = self.code.new_label();
                if !body_terminal {
                    self.code.branch(op::GOTO, end);
                }
                let mut all_terminal = body_terminal;
                for catch in &catches {
                    let handler_pc = self.code.pc();
                    // The handler entry frame holds exactly the thrown
                    // exception.
                    self.code.set_stack_depth(1);
                    let slot = LOCAL_SLOT
                        .get_if_set(self.tree(), catch.body)
                        .ok_or_else(|| EmitError::Unsupported("missing catch slot".to_string()))?
                        as u16;
                    self.store_local(slot, &catch.exception_type)?;
                    let catch_terminal = self.emit_block(catch.body)?;
                    if !catch_terminal {
                        self.code.branch(op::GOTO, end);
                    }
                    all_terminal = all_terminal && catch_terminal;
                    if end_pc > start_pc {
                        let catch_type = match catch.exception_type.class_name() {
                            Some(name) => self.pool.class(&internal(name))?,
                            None => 0,
                        };
                        self.code.add_exception_entry(start_pc, end_pc, handler_pc, catch_type);
                    }
                }
                self.code.bind(end)?;
                Ok(all_terminal)
            }
            Stmt::Break => {
                let scope = self
                    .break_targets
                    .last_mut()
                    .ok_or_else(|| EmitError::Unsupported("break outside breakable".to_string()))?;
                scope.used = true;
                let target = scope.label;
                self.code.branch(op::GOTO, target);
                Ok(true)
            }
            Stmt::Return { value } => {
                match value {
                    Some(value) => {
                        let value_type = self.expr_type(value)?;
                        self.eval(value)?;
                        let return_type = self.return_type.clone();
                        self.convert(&value_type, &return_type);
                        let kind = kind_of(&return_type);
                        self.code.emit(op::IRETURN + kind_index(kind));
                        self.code.pop(kind_width(kind));
                    }
                    None => self.code.emit(op::RETURN),
                }
                Ok(true)
            }
            Stmt::Throw { value } => {
                self.eval(value)?;
                self.code.emit(op::ATHROW);
                self.code.pop(1);
                Ok(true)
            }
            Stmt::Expression { expr } => {
                let size = self.expr_type(expr)?.size();
                self.eval(expr)?;
                match size {
                    0 => {}
                    1 => {
                        self.code.emit(op::POP);
                        self.code.pop(1);
                    }
                    _ => {
                        self.code.emit(op::POP2);
                        self.code.pop(2);
                    }
                }
                Ok(false)
            }
        }
    }

    fn emit_assign(&mut self, target: NodeId, value: NodeId) -> Result<()> {
        let target_expr = self.expr(target)?.clone();
        let value_type = self.expr_type(value)?;
        match target_expr.kind {
            ExprKind::Local { ref name } => {
                self.eval(value)?;
                self.convert(&value_type, &target_expr.expr_type);
                let (slot, var_type) = self
                    .local_slot(target, name)
                    .ok_or_else(|| EmitError::Unsupported(format!("unresolved local '{}'", name)))?;
                self.store_local(slot, &var_type)?;
            }
            ExprKind::FieldAccess { target: field_target, ref owner, ref name } => {
                let (owner_name, field_static) =
                    self.field_owner(field_target, owner.as_ref(), name)?;
                let descriptor = type_descriptor(&target_expr.expr_type);
                if field_static {
                    self.eval(value)?;
                    self.convert(&value_type, &target_expr.expr_type);
                    let field_ref = self.pool.field_ref(&internal(&owner_name), name, &descriptor)?;
                    self.code.emit(op::PUTSTATIC);
                    self.code.emit_u16(field_ref);
                    self.code.pop(target_expr.expr_type.size());
                } else {
                    match field_target {
                        Some(receiver) => self.eval(receiver)?,
                        None => {
                            self.code.emit(op::ALOAD_0);
                            self.code.push(1);
                        }
                    }
                    self.eval(value)?;
                    self.convert(&value_type, &target_expr.expr_type);
                    let field_ref = self.pool.field_ref(&internal(&owner_name), name, &descriptor)?;
                    self.code.emit(op::PUTFIELD);
                    self.code.emit_u16(field_ref);
                    self.code.pop(1 + target_expr.expr_type.size());
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                self.eval(array)?;
                self.eval(index)?;
                self.eval(value)?;
                self.convert(&value_type, &target_expr.expr_type);
                let store = array_store_op(&target_expr.expr_type);
                self.code.emit(store);
                self.code.pop(2 + target_expr.expr_type.size());
            }
            _ => return Err(EmitError::Unsupported("assignment target".to_string()).into()),
        }
        Ok(())
    }

    fn expr(&self, id: NodeId) -> Result<&Expr> {
        match self.tree().kind(id) {
            NodeKind::Expr(expr) => Ok(expr),
            _ => Err(EmitError::Unsupported("non-expression node".to_string()).into()),
        }
    }

    fn expr_type(&self, id: NodeId) -> Result<Type> {
        Ok(self.expr(id)?.expr_type.clone())
    }

    /// Evaluate an expression, leaving its value (if any) on the stack.
    fn eval(&mut self, id: NodeId) -> Result<()> {
        let expr = self.expr(id)?.clone();
        match expr.kind {
            ExprKind::Const(constant) => self.emit_constant(&constant)?,
            ExprKind::Local { name } => {
                let (slot, var_type) = self
                    .local_slot(id, &name)
                    .ok_or_else(|| EmitError::Unsupported(format!("unresolved local '{}'", name)))?;
                self.load_local(slot, &var_type)?;
            }
            ExprKind::This => {
                self.code.emit(op::ALOAD_0);
                self.code.push(1);
            }
            ExprKind::FieldAccess { target, owner, name } => {
                let (owner_name, field_static) = self.field_owner(target, owner.as_ref(), &name)?;
                let descriptor = type_descriptor(&expr.expr_type);
                if field_static {
                    let field_ref = self.pool.field_ref(&internal(&owner_name), &name, &descriptor)?;
                    self.code.emit(op::GETSTATIC);
                    self.code.emit_u16(field_ref);
                    self.code.push(expr.expr_type.size());
                } else {
                    match target {
                        Some(receiver) => self.eval(receiver)?,
                        None => {
                            self.code.emit(op::ALOAD_0);
                            self.code.push(1);
                        }
                    }
                    let field_ref = self.pool.field_ref(&internal(&owner_name), &name, &descriptor)?;
                    self.code.emit(op::GETFIELD);
                    self.code.emit_u16(field_ref);
                    self.code.pop(1);
                    self.code.push(expr.expr_type.size());
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                self.eval(array)?;
                self.eval(index)?;
                self.code.emit(array_load_op(&expr.expr_type));
                self.code.pop(2);
                self.code.push(expr.expr_type.size());
            }
            ExprKind::Call { target, owner, name, args } => {
                self.emit_call(&expr.expr_type, target, owner, &name, &args)?;
            }
            ExprKind::New { class_type, args } => {
                self.emit_new(&class_type, &args)?;
            }
            ExprKind::NewArray { element_type, length } => {
                self.eval(length)?;
                if element_type.is_primitive() {
                    self.code.emit(op::NEWARRAY);
                    self.code.emit_u8(newarray_code(&element_type)?);
                } else {
                    let element_ref = self.pool.class(&class_ref(&element_type))?;
                    self.code.emit(op::ANEWARRAY);
                    self.code.emit_u16(element_ref);
                }
            }
            ExprKind::Binary { op: bin_op, left, right } => {
                self.emit_binary(bin_op, left, right)?;
            }
            ExprKind::Unary { op: un_op, operand } => {
                self.emit_unary(un_op, operand, &expr.expr_type)?;
            }
            ExprKind::Cast { target_type, expr: operand } => {
                let from = self.expr_type(operand)?;
                self.eval(operand)?;
                if target_type.is_reference() {
                    if from != target_type && from != Type::Null {
                        let class_index = self.pool.class(&class_ref(&target_type))?;
                        self.code.emit(op::CHECKCAST);
                        self.code.emit_u16(class_index);
                    }
                } else {
                    self.convert(&from, &target_type);
                }
            }
            ExprKind::InstanceOf { checked_type, expr: operand } => {
                self.eval(operand)?;
                let class_index = self.pool.class(&class_ref(&checked_type))?;
                self.code.emit(op::INSTANCEOF);
                self.code.emit_u16(class_index);
                // pops the reference, pushes an int
            }
        }
        Ok(())
    }

    fn emit_constant(&mut self, constant: &Constant) -> Result<()> {
        match constant {
            Constant::Int(v) => self.emit_int_constant(*v)?,
            Constant::Char(c) => self.emit_int_constant(*c as i32)?,
            Constant::Boolean(b) => self.emit_int_constant(i32::from(*b))?,
            Constant::Long(v) => {
                match *v {
                    0 => self.code.emit(op::LCONST_0),
                    1 => self.code.emit(op::LCONST_1),
                    _ => {
                        let index = self.pool.long(*v)?;
                        self.code.emit(op::LDC2_W);
                        self.code.emit_u16(index);
                    }
                }
                self.code.push(2);
            }
            Constant::Float(v) => {
                if *v == 0.0 {
                    self.code.emit(op::FCONST_0);
                } else if *v == 1.0 {
                    self.code.emit(op::FCONST_1);
                } else if *v == 2.0 {
                    self.code.emit(op::FCONST_2);
                } else {
                    let index = self.pool.float(*v)?;
                    self.emit_ldc(index);
                }
                self.code.push(1);
            }
            Constant::Double(v) => {
                if *v == 0.0 {
                    self.code.emit(op::DCONST_0);
                } else if *v == 1.0 {
                    self.code.emit(op::DCONST_1);
                } else {
                    let index = self.pool.double(*v)?;
                    self.code.emit(op::LDC2_W);
                    self.code.emit_u16(index);
                }
                self.code.push(2);
            }
            Constant::Str(s) => {
                let index = self.pool.string(s)?;
                self.emit_ldc(index);
                self.code.push(1);
            }
            Constant::Null => {
                self.code.emit(op::ACONST_NULL);
                self.code.push(1);
            }
        }
        Ok(())
    }

    fn emit_int_constant(&mut self, value: i32) -> Result<()> {
        if (-1..=5).contains(&value) {
            self.code.emit((op::ICONST_0 as i32 + value) as u8);
        } else if i8::try_from(value).is_ok() {
            self.code.emit(op::BIPUSH);
            self.code.emit_u8(value as i8 as u8);
        } else if i16::try_from(value).is_ok() {
            self.code.emit(op::SIPUSH);
            self.code.emit_u16(value as i16 as u16);
        } else {
            let index = self.pool.integer(value)?;
            self.emit_ldc(index);
        }
        self.code.push(1);
        Ok(())
    }

    fn emit_ldc(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.code.emit(op::LDC);
            self.code.emit_u8(index as u8);
        } else {
            self.code.emit(op::LDC_W);
            self.code.emit_u16(index);
        }
    }

    fn emit_call(
        &mut self,
        return_type: &Type,
        target: Option<NodeId>,
        owner: Option<Type>,
        name: &str,
        args: &[NodeId],
    ) -> Result<()> {
        let owner_name = match (&target, &owner) {
            (Some(t), _) => match self.expr_type(*t)? {
                Type::Array(_) => crate::types::OBJECT_CLASS.to_string(),
                Type::Class(class_name) => class_name,
                other => {
                    return Err(EmitError::Unsupported(format!("call on {}", other)).into());
                }
            },
            (None, Some(Type::Class(class_name))) => class_name.clone(),
            (None, _) => self.owner.gen.name().to_string(),
        };
        let arg_types = args
            .iter()
            .map(|&a| self.expr_type(a))
            .collect::<Result<Vec<Type>>>()?;
        let method = resolve_method(
            self.owner.gen,
            self.owner.context,
            self.owner.imports,
            &owner_name,
            name,
            &arg_types,
        )
        .ok_or_else(|| {
            EmitError::Unsupported(format!("unresolved method '{}.{}'", owner_name, name))
        })?;
        let owner_is_interface = resolve_class(
            self.owner.gen,
            self.owner.context,
            self.owner.imports,
            &owner_name,
        )
        .map(|info| info.is_interface())
        .unwrap_or(false);

        let is_static = method.is_static();
        if !is_static {
            match target {
                Some(receiver) => self.eval(receiver)?,
                None => {
                    self.code.emit(op::ALOAD_0);
                    self.code.push(1);
                }
            }
        }
        for (&arg, param) in args.iter().zip(method.signature.parameter_types.iter()) {
            let arg_type = self.expr_type(arg)?;
            self.eval(arg)?;
            self.convert(&arg_type, param);
        }

        let descriptor = method.signature.descriptor();
        let internal_owner = internal(&owner_name);
        let arg_slots = method.signature.parameter_slots();
        if is_static {
            let method_ref = self.pool.method_ref(&internal_owner, name, &descriptor)?;
            self.code.emit(op::INVOKESTATIC);
            self.code.emit_u16(method_ref);
            self.code.pop(arg_slots);
        } else if owner_is_interface {
            let method_ref = self.pool.interface_method_ref(&internal_owner, name, &descriptor)?;
            self.code.emit(op::INVOKEINTERFACE);
            self.code.emit_u16(method_ref);
            self.code.emit_u8((1 + arg_slots) as u8);
            self.code.emit_u8(0);
            self.code.pop(1 + arg_slots);
        } else {
            let method_ref = self.pool.method_ref(&internal_owner, name, &descriptor)?;
            self.code.emit(op::INVOKEVIRTUAL);
            self.code.emit_u16(method_ref);
            self.code.pop(1 + arg_slots);
        }
        self.code.push(return_type.size());
        Ok(())
    }

    fn emit_new(&mut self, class_type: &Type, args: &[NodeId]) -> Result<()> {
        let class_name = class_type
            .class_name()
            .ok_or_else(|| EmitError::Unsupported("new on non-class".to_string()))?
            .to_string();
        let info = resolve_class(self.owner.gen, self.owner.context, self.owner.imports, &class_name)
            .ok_or_else(|| EmitError::Unsupported(format!("unresolved class '{}'", class_name)))?;
        let arg_types = args
            .iter()
            .map(|&a| self.expr_type(a))
            .collect::<Result<Vec<Type>>>()?;
        let ctor = constructor_matching(&info, &arg_types, self.owner.context).ok_or_else(|| {
            EmitError::Unsupported(format!("unresolved constructor '{}'", class_name))
        })?;

        let class_index = self.pool.class(&internal(&class_name))?;
        self.code.emit(op::NEW);
        self.code.emit_u16(class_index);
        self.code.push(1);
        self.code.emit(op::DUP);
        self.code.push(1);
        for (&arg, param) in args.iter().zip(ctor.signature.parameter_types.iter()) {
            let arg_type = self.expr_type(arg)?;
            self.eval(arg)?;
            self.convert(&arg_type, param);
        }
        let method_ref = self.pool.method_ref(
            &internal(&class_name),
            CONSTRUCTOR_METHOD_NAME,
            &ctor.signature.descriptor(),
        )?;
        self.code.emit(op::INVOKESPECIAL);
        self.code.emit_u16(method_ref);
        self.code.pop(1 + ctor.signature.parameter_slots());
        Ok(())
    }

    fn emit_binary(&mut self, bin_op: BinaryOp, left: NodeId, right: NodeId) -> Result<()> {
        let lt = self.expr_type(left)?;
        let rt = self.expr_type(right)?;
        match bin_op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let promoted = crate::types::binary_promote(&lt, &rt).ok_or_else(|| {
                    EmitError::Unsupported(format!("arithmetic on {} and {}", lt, rt))
                })?;
                self.eval(left)?;
                self.convert(&lt, &promoted);
                self.eval(right)?;
                self.convert(&rt, &promoted);
                let kind = kind_of(&promoted);
                let base = match bin_op {
                    BinaryOp::Add => op::IADD,
                    BinaryOp::Sub => op::ISUB,
                    BinaryOp::Mul => op::IMUL,
                    BinaryOp::Div => op::IDIV,
                    _ => op::IREM,
                };
                self.code.emit(base + kind_index(kind));
                self.code.pop(2 * kind_width(kind));
                self.code.push(kind_width(kind));
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                // Boolean operands ride the int opcodes.
                let promoted = if lt == Type::Boolean {
                    Type::Boolean
                } else {
                    crate::types::binary_promote(&lt, &rt).ok_or_else(|| {
                        EmitError::Unsupported(format!("bitwise on {} and {}", lt, rt))
                    })?
                };
                self.eval(left)?;
                self.convert(&lt, &promoted);
                self.eval(right)?;
                self.convert(&rt, &promoted);
                let kind = kind_of(&promoted);
                let long_offset = u8::from(kind == Kind::Long);
                let base = match bin_op {
                    BinaryOp::And => op::IAND,
                    BinaryOp::Or => op::IOR,
                    _ => op::IXOR,
                };
                self.code.emit(base + long_offset);
                self.code.pop(2 * kind_width(kind));
                self.code.push(kind_width(kind));
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => {
                let result = crate::types::unary_promote(&lt);
                self.eval(left)?;
                self.convert(&lt, &result);
                self.eval(right)?;
                self.convert(&rt, &Type::Int);
                let long_offset = u8::from(kind_of(&result) == Kind::Long);
                let base = match bin_op {
                    BinaryOp::Shl => op::ISHL,
                    BinaryOp::Shr => op::ISHR,
                    _ => op::IUSHR,
                };
                self.code.emit(base + long_offset);
                self.code.pop(1 + kind_width(kind_of(&result)));
                self.code.push(kind_width(kind_of(&result)));
            }
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                self.emit_comparison(bin_op, left, right, &lt, &rt)?;
            }
            BinaryOp::LogicalAnd => {
                let short_circuit = self.code.new_label();
                let end = self.code.new_label();
                self.eval(left)?;
                self.code.branch(op::IFEQ, short_circuit);
                self.code.pop(1);
                let base = self.code.stack_depth();
                self.eval(right)?;
                self.code.branch(op::GOTO, end);
                self.code.bind(short_circuit)?;
                self.code.set_stack_depth(base);
                self.code.emit(op::ICONST_0);
                self.code.push(1);
                self.code.bind(end)?;
            }
            BinaryOp::LogicalOr => {
                let short_circuit = self.code.new_label();
                let end = self.code.new_label();
                self.eval(left)?;
                self.code.branch(op::IFNE, short_circuit);
                self.code.pop(1);
                let base = self.code.stack_depth();
                self.eval(right)?;
                self.code.branch(op::GOTO, end);
                self.code.bind(short_circuit)?;
                self.code.set_stack_depth(base);
                self.code.emit(op::ICONST_1);
                self.code.push(1);
                self.code.bind(end)?;
            }
        }
        Ok(())
    }

    /// Comparison compiles to the branch idiom: jump on the condition, push
    /// 0 on fall-through and 1 at the target, merging at the end label.
    fn emit_comparison(
        &mut self,
        bin_op: BinaryOp,
        left: NodeId,
        right: NodeId,
        lt: &Type,
        rt: &Type,
    ) -> Result<()> {
        let on_true = self.code.new_label();
        let end = self.code.new_label();
        if lt.is_number() && rt.is_number() {
            let promoted = crate::types::binary_promote(lt, rt).ok_or_else(|| {
                EmitError::Unsupported(format!("comparison of {} and {}", lt, rt))
            })?;
            self.eval(left)?;
            self.convert(lt, &promoted);
            self.eval(right)?;
            self.convert(rt, &promoted);
            match kind_of(&promoted) {
                Kind::Int => {
                    let branch = match bin_op {
                        BinaryOp::Eq => op::IF_ICMPEQ,
                        BinaryOp::Ne => op::IF_ICMPNE,
                        BinaryOp::Lt => op::IF_ICMPLT,
                        BinaryOp::Le => op::IF_ICMPLE,
                        BinaryOp::Gt => op::IF_ICMPGT,
                        _ => op::IF_ICMPGE,
                    };
                    self.code.branch(branch, on_true);
                    self.code.pop(2);
                }
                kind => {
                    let compare = match (kind, bin_op) {
                        (Kind::Long, _) => op::LCMP,
                        // NaN comparisons are false either way the operands
                        // land, picked per javac's cmpl/cmpg convention.
                        (Kind::Float, BinaryOp::Lt | BinaryOp::Le) => op::FCMPG,
                        (Kind::Float, _) => op::FCMPL,
                        (Kind::Double, BinaryOp::Lt | BinaryOp::Le) => op::DCMPG,
                        (Kind::Double, _) => op::DCMPL,
                        _ => op::LCMP,
                    };
                    self.code.emit(compare);
                    self.code.pop(2 * kind_width(kind));
                    self.code.push(1);
                    let branch = match bin_op {
                        BinaryOp::Eq => op::IFEQ,
                        BinaryOp::Ne => op::IFNE,
                        BinaryOp::Lt => op::IFLT,
                        BinaryOp::Le => op::IFLE,
                        BinaryOp::Gt => op::IFGT,
                        _ => op::IFGE,
                    };
                    self.code.branch(branch, on_true);
                    self.code.pop(1);
                }
            }
        } else if lt.is_reference() && rt.is_reference() {
            self.eval(left)?;
            self.eval(right)?;
            let branch = if bin_op == BinaryOp::Eq { op::IF_ACMPEQ } else { op::IF_ACMPNE };
            self.code.branch(branch, on_true);
            self.code.pop(2);
        } else {
            // Boolean equality rides the int comparison.
            self.eval(left)?;
            self.eval(right)?;
            let branch = if bin_op == BinaryOp::Eq { op::IF_ICMPEQ } else { op::IF_ICMPNE };
            self.code.branch(branch, on_true);
            self.code.pop(2);
        }
        let base = self.code.stack_depth();
        self.code.emit(op::ICONST_0);
        self.code.push(1);
        self.code.branch(op::GOTO, end);
        self.code.bind(on_true)?;
        self.code.set_stack_depth(base);
        self.code.emit(op::ICONST_1);
        self.code.push(1);
        self.code.bind(end)?;
        Ok(())
    }

    fn emit_unary(&mut self, un_op: UnaryOp, operand: NodeId, result: &Type) -> Result<()> {
        let operand_type = self.expr_type(operand)?;
        self.eval(operand)?;
        match un_op {
            UnaryOp::Neg => {
                self.convert(&operand_type, result);
                self.code.emit(op::INEG + kind_index(kind_of(result)));
            }
            UnaryOp::Not => {
                self.code.emit(op::ICONST_1);
                self.code.push(1);
                self.code.emit(op::IXOR);
                self.code.pop(2);
                self.code.push(1);
            }
            UnaryOp::BitNot => {
                self.convert(&operand_type, result);
                if kind_of(result) == Kind::Long {
                    let index = self.pool.long(-1)?;
                    self.code.emit(op::LDC2_W);
                    self.code.emit_u16(index);
                    self.code.push(2);
                    self.code.emit(op::LXOR);
                    self.code.pop(4);
                    self.code.push(2);
                } else {
                    self.code.emit(op::ICONST_M1);
                    self.code.push(1);
                    self.code.emit(op::IXOR);
                    self.code.pop(2);
                    self.code.push(1);
                }
            }
        }
        Ok(())
    }

    /// Emit a representation conversion between primitive types; reference
    /// types and identical kinds need nothing.
    fn convert(&mut self, from: &Type, to: &Type) {
        let from_kind = kind_of(from);
        let to_kind = kind_of(to);
        if from_kind == Kind::Ref || to_kind == Kind::Ref {
            return;
        }
        if from_kind != to_kind {
            let conversion = match (from_kind, to_kind) {
                (Kind::Int, Kind::Long) => op::I2L,
                (Kind::Int, Kind::Float) => op::I2F,
                (Kind::Int, Kind::Double) => op::I2D,
                (Kind::Long, Kind::Int) => op::L2I,
                (Kind::Long, Kind::Float) => op::L2F,
                (Kind::Long, Kind::Double) => op::L2D,
                (Kind::Float, Kind::Int) => op::F2I,
                (Kind::Float, Kind::Long) => op::F2L,
                (Kind::Float, Kind::Double) => op::F2D,
                (Kind::Double, Kind::Int) => op::D2I,
                (Kind::Double, Kind::Long) => op::D2L,
                _ => op::D2F,
            };
            self.code.emit(conversion);
            self.code.pop(kind_width(from_kind));
            self.code.push(kind_width(to_kind));
        }
        match to {
            Type::Byte if *from != Type::Byte => self.code.emit(op::I2B),
            Type::Char if *from != Type::Char => self.code.emit(op::I2C),
            Type::Short if *from != Type::Short => self.code.emit(op::I2S),
            _ => {}
        }
    }

    fn load_local(&mut self, slot: u16, ty: &Type) -> Result<()> {
        let kind = kind_of(ty);
        self.emit_local_access(slot, op::ILOAD, short_load_base(kind), kind)?;
        self.code.push(kind_width(kind));
        Ok(())
    }

    fn store_local(&mut self, slot: u16, ty: &Type) -> Result<()> {
        let kind = kind_of(ty);
        self.emit_local_access(slot, op::ISTORE, short_store_base(kind), kind)?;
        self.code.pop(kind_width(kind));
        Ok(())
    }

    fn emit_local_access(&mut self, slot: u16, generic: u8, short_base: u8, kind: Kind) -> Result<()> {
        if slot > u8::MAX as u16 {
            return Err(EmitError::Unsupported("more than 255 local slots".to_string()).into());
        }
        if slot <= 3 {
            self.code.emit(short_base + slot as u8);
        } else {
            self.code.emit(generic + kind_index(kind));
            self.code.emit_u8(slot as u8);
        }
        Ok(())
    }

    /// Resolve the declaring class and static-ness of a field access.
    fn field_owner(
        &self,
        target: Option<NodeId>,
        owner: Option<&Type>,
        name: &str,
    ) -> Result<(String, bool)> {
        match (target, owner) {
            (Some(t), _) => match self.expr_type(t)? {
                Type::Class(class_name) => Ok((class_name, false)),
                other => Err(EmitError::Unsupported(format!("field access on {}", other)).into()),
            },
            (None, Some(Type::Class(class_name))) => Ok((class_name.clone(), true)),
            (None, _) => {
                let field_static = self
                    .owner
                    .gen
                    .field_decl(name)
                    .map(|f| f.access & ACC_STATIC != 0)
                    .unwrap_or(false);
                Ok((self.owner.gen.name().to_string(), field_static))
            }
        }
    }

    fn local_slot(&self, from: NodeId, name: &str) -> Option<(u16, Type)> {
        let tree = self.tree();
        let mut previous: Option<NodeId> = None;
        let mut current = Some(from);
        while let Some(id) = current {
            match tree.kind(id) {
                NodeKind::Stmt(Stmt::Block(block)) => {
                    if let Some(&definition) = block.names.get(name) {
                        if let NodeKind::Stmt(Stmt::Definition { var_type, .. }) = tree.kind(definition)
                        {
                            let slot = LOCAL_SLOT.get_if_set(tree, definition)? as u16;
                            return Some((slot, var_type.clone()));
                        }
                    }
                }
                NodeKind::Stmt(Stmt::Try { catches, .. }) => {
                    if let Some(came_from) = previous {
                        for catch in catches {
                            if catch.body == came_from && catch.var_name == name {
                                let slot = LOCAL_SLOT.get_if_set(tree, catch.body)? as u16;
                                return Some((slot, catch.exception_type.clone()));
                            }
                        }
                    }
                }
                NodeKind::Method(_) => return self.arg_slots.get(name).cloned(),
                _ => {}
            }
            previous = Some(id);
            current = tree.parent(id);
        }
        self.arg_slots.get(name).cloned()
    }
}

fn short_load_base(kind: Kind) -> u8 {
    op::ILOAD_0 + kind_index(kind) * 4
}

fn short_store_base(kind: Kind) -> u8 {
    op::ISTORE_0 + kind_index(kind) * 4
}

fn array_load_op(element: &Type) -> u8 {
    match element {
        Type::Long => op::LALOAD,
        Type::Float => op::FALOAD,
        Type::Double => op::DALOAD,
        Type::Byte | Type::Boolean => op::BALOAD,
        Type::Char => op::CALOAD,
        Type::Short => op::SALOAD,
        Type::Int => op::IALOAD,
        _ => op::AALOAD,
    }
}

fn array_store_op(element: &Type) -> u8 {
    match element {
        Type::Long => op::LASTORE,
        Type::Float => op::FASTORE,
        Type::Double => op::DASTORE,
        Type::Byte | Type::Boolean => op::BASTORE,
        Type::Char => op::CASTORE,
        Type::Short => op::SASTORE,
        Type::Int => op::IASTORE,
        _ => op::AASTORE,
    }
}

fn newarray_code(element: &Type) -> Result<u8> {
    use opcodes::array_type::*;
    Ok(match element {
        Type::Boolean => T_BOOLEAN,
        Type::Char => T_CHAR,
        Type::Float => T_FLOAT,
        Type::Double => T_DOUBLE,
        Type::Byte => T_BYTE,
        Type::Short => T_SHORT,
        Type::Int => T_INT,
        Type::Long => T_LONG,
        other => {
            return Err(EmitError::Unsupported(format!("newarray of {}", other)).into());
        }
    })
}
