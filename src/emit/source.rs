//! Source text backend
//!
//! Renders the class as readable Java source. Expression fragments are
//! composed through the mark-stack: a composite expression marks the stack,
//! renders each sub-expression independently, then collects and combines
//! the fragments in declared order. Every binary, unary, cast and
//! instanceof expression is parenthesized; precedence is never computed.

use crate::ast::{Constant, ExprKind, MethodDecl, NodeKind, Stmt};
use crate::config::Config;
use crate::emit::EmitError;
use crate::gen::ClassGenerator;
use crate::tree::{NodeId, WalkContext};
use crate::types::access_flags::*;
use crate::types::Type;

pub struct SourceEmitter<'a> {
    gen: &'a ClassGenerator,
    imports: &'a [String],
    trace: bool,
    out: String,
    indent_level: usize,
    context: WalkContext<String>,
}

impl<'a> SourceEmitter<'a> {
    pub fn new(gen: &'a ClassGenerator, imports: &'a [String], config: &Config) -> Self {
        Self {
            gen,
            imports,
            trace: config.trace_emission,
            out: String::new(),
            indent_level: 0,
            context: WalkContext::new(),
        }
    }

    pub fn emit(mut self) -> Result<String, EmitError> {
        let class = self.gen.class();
        if let Some(package) = class.package_name() {
            self.writeln(&format!("package {};", package));
            self.out.push('\n');
        }
        if !self.imports.is_empty() {
            for import in self.imports {
                self.writeln(&format!("import {};", import));
            }
            self.out.push('\n');
        }
        self.emit_class_header()?;
        self.indent();

        let field_ids = class.fields.clone();
        for field in field_ids {
            self.emit_field(field)?;
        }
        if let Some(initializer) = class.initializer {
            self.writeln("static {");
            self.indent();
            self.emit_block_contents(initializer)?;
            self.dedent();
            self.writeln("}");
        }
        let ctor_ids = class.constructors.clone();
        for ctor in ctor_ids {
            self.emit_method(ctor)?;
        }
        let method_ids = class.methods.clone();
        for method in method_ids {
            self.emit_method(method)?;
        }

        self.dedent();
        self.writeln("}");
        Ok(self.out)
    }

    fn indent(&mut self) {
        self.indent_level += 4;
    }

    fn dedent(&mut self) {
        if self.indent_level >= 4 {
            self.indent_level -= 4;
        }
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.out.push(' ');
        }
    }

    fn writeln(&mut self, line: &str) {
        if self.trace {
            log::trace!("source: {}", line);
        }
        self.write_indent();
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn emit_class_header(&mut self) -> Result<(), EmitError> {
        let class = self.gen.class();
        let mut header = modifier_string(class.access & !(ACC_INTERFACE | ACC_SUPER));
        if class.is_interface {
            // `abstract` is implied and not printed for interfaces.
            header = modifier_string(class.access & !(ACC_INTERFACE | ACC_ABSTRACT | ACC_SUPER));
            header.push_str("interface ");
        } else {
            header.push_str("class ");
        }
        header.push_str(class.simple_name());
        if let Some(super_class) = &class.super_class {
            if super_class != &Type::object() {
                header.push_str(" extends ");
                header.push_str(&self.type_name(super_class));
            }
        }
        if !class.interfaces.is_empty() {
            header.push_str(if class.is_interface { " extends " } else { " implements " });
            let names: Vec<String> = class.interfaces.iter().map(|t| self.type_name(t)).collect();
            header.push_str(&names.join(", "));
        }
        header.push_str(" {");
        self.writeln(&header);
        Ok(())
    }

    fn emit_field(&mut self, field: NodeId) -> Result<(), EmitError> {
        let (access, field_type, name) = match self.gen.tree().kind(field) {
            NodeKind::Field(decl) => (decl.access, decl.field_type.clone(), decl.name.clone()),
            _ => return Ok(()),
        };
        let line = format!("{}{} {};", modifier_string(access), self.type_name(&field_type), name);
        self.writeln(&line);
        Ok(())
    }

    fn emit_method(&mut self, method: NodeId) -> Result<(), EmitError> {
        let decl = match self.gen.tree().kind(method) {
            NodeKind::Method(decl) => decl.clone(),
            _ => return Ok(()),
        };
        self.out.push('\n');
        let mut header = self.method_header(&decl);
        if decl.body.is_none() {
            header.push(';');
            self.writeln(&header);
            return Ok(());
        }
        header.push_str(" {");
        self.writeln(&header);
        self.indent();
        if let Some(body) = decl.body {
            self.emit_block_contents(body)?;
        }
        self.dedent();
        self.writeln("}");
        Ok(())
    }

    fn method_header(&mut self, decl: &MethodDecl) -> String {
        let mut header = modifier_string(decl.access);
        if decl.is_constructor {
            header.push_str(self.gen.class().simple_name());
        } else {
            header.push_str(&self.type_name(&decl.return_type));
            header.push(' ');
            header.push_str(&decl.name);
        }
        header.push('(');
        let params: Vec<String> = decl
            .args
            .iter()
            .map(|arg| format!("{} {}", self.type_name(&arg.arg_type), arg.name))
            .collect();
        header.push_str(&params.join(", "));
        header.push(')');
        if !decl.exceptions.is_empty() {
            header.push_str(" throws ");
            let names: Vec<String> = decl.exceptions.iter().map(|t| self.type_name(t)).collect();
            header.push_str(&names.join(", "));
        }
        header
    }

    fn emit_block_contents(&mut self, block: NodeId) -> Result<(), EmitError> {
        let stmts = match self.gen.tree().kind(block) {
            NodeKind::Stmt(Stmt::Block(b)) => b.stmts.clone(),
            _ => return Ok(()),
        };
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, id: NodeId) -> Result<(), EmitError> {
        let stmt = match self.gen.tree().kind(id) {
            NodeKind::Stmt(s) => s.clone(),
            _ => return Ok(()),
        };
        match stmt {
            Stmt::Block(_) => {
                self.writeln("{");
                self.indent();
                self.emit_block_contents(id)?;
                self.dedent();
                self.writeln("}");
            }
            Stmt::If { condition, then_block, else_block } => {
                let cond = self.render_expr(condition)?;
                self.writeln(&format!("if ({}) {{", strip_outer_parens(&cond)));
                self.indent();
                self.emit_block_contents(then_block)?;
                self.dedent();
                match else_block {
                    Some(else_block) => {
                        self.writeln("} else {");
                        self.indent();
                        self.emit_block_contents(else_block)?;
                        self.dedent();
                        self.writeln("}");
                    }
                    None => self.writeln("}"),
                }
            }
            Stmt::While { condition, body } => {
                let cond = self.render_expr(condition)?;
                self.writeln(&format!("while ({}) {{", strip_outer_parens(&cond)));
                self.indent();
                self.emit_block_contents(body)?;
                self.dedent();
                self.writeln("}");
            }
            Stmt::Switch { selector, cases, default } => {
                let selector = self.render_expr(selector)?;
                self.writeln(&format!("switch ({}) {{", strip_outer_parens(&selector)));
                for case in cases {
                    self.writeln(&format!("case {}: {{", case.value));
                    self.indent();
                    self.emit_block_contents(case.body)?;
                    self.dedent();
                    self.writeln("}");
                }
                if let Some(default) = default {
                    self.writeln("default: {");
                    self.indent();
                    self.emit_block_contents(default)?;
                    self.dedent();
                    self.writeln("}");
                }
                self.writeln("}");
            }
            Stmt::Try { body, catches } => {
                self.writeln("try {");
                self.indent();
                self.emit_block_contents(body)?;
                self.dedent();
                for catch in catches {
                    self.writeln(&format!(
                        "}} catch ({} {}) {{",
                        self.type_name(&catch.exception_type),
                        catch.var_name
                    ));
                    self.indent();
                    self.emit_block_contents(catch.body)?;
                    self.dedent();
                }
                self.writeln("}");
            }
            Stmt::Break => self.writeln("break;"),
            Stmt::Return { value } => match value {
                Some(value) => {
                    let rendered = self.render_expr(value)?;
                    self.writeln(&format!("return {};", rendered));
                }
                None => self.writeln("return;"),
            },
            Stmt::Throw { value } => {
                let rendered = self.render_expr(value)?;
                self.writeln(&format!("throw {};", rendered));
            }
            Stmt::Definition { name, var_type, init } => match init {
                Some(init) => {
                    let rendered = self.render_expr(init)?;
                    self.writeln(&format!("{} {} = {};", self.type_name(&var_type), name, rendered));
                }
                None => self.writeln(&format!("{} {};", self.type_name(&var_type), name)),
            },
            Stmt::Assign { target, value } => {
                let target = self.render_expr(target)?;
                let value = self.render_expr(value)?;
                self.writeln(&format!("{} = {};", target, value));
            }
            Stmt::Expression { expr } => {
                let rendered = self.render_expr(expr)?;
                self.writeln(&format!("{};", rendered));
            }
        }
        Ok(())
    }

    fn render_expr(&mut self, id: NodeId) -> Result<String, EmitError> {
        self.visit_expr(id)?;
        Ok(self.context.pop().unwrap_or_default())
    }

    /// Render one expression, leaving exactly one fragment on the stack.
    fn visit_expr(&mut self, id: NodeId) -> Result<(), EmitError> {
        let expr = match self.gen.tree().kind(id) {
            NodeKind::Expr(expr) => expr.clone(),
            _ => return Err(EmitError::Unsupported("non-expression node".to_string())),
        };
        let fragment = match expr.kind {
            ExprKind::Const(constant) => constant_source(&constant),
            ExprKind::Local { name } => name,
            ExprKind::This => "this".to_string(),
            ExprKind::FieldAccess { target, owner, name } => match (target, owner) {
                (Some(target), _) => {
                    self.context.mark();
                    self.visit_expr(target)?;
                    let parts = self.context.pop_mark();
                    format!("{}.{}", parts.concat(), name)
                }
                (None, Some(owner)) => format!("{}.{}", self.type_name(&owner), name),
                (None, None) => {
                    let is_static = self
                        .gen
                        .field_decl(&name)
                        .map(|f| f.access & ACC_STATIC != 0)
                        .unwrap_or(false);
                    if is_static {
                        name
                    } else {
                        format!("this.{}", name)
                    }
                }
            },
            ExprKind::ArrayAccess { array, index } => {
                self.context.mark();
                self.visit_expr(array)?;
                self.visit_expr(index)?;
                let parts = self.context.pop_mark();
                format!("{}[{}]", parts[0], parts[1])
            }
            ExprKind::Call { target, owner, name, args } => {
                // The receiver and every argument render independently;
                // the mark brackets them so they recombine in declared
                // order around the call syntax.
                self.context.mark();
                let has_target = target.is_some();
                if let Some(target) = target {
                    self.visit_expr(target)?;
                }
                for arg in &args {
                    self.visit_expr(*arg)?;
                }
                let mut parts = self.context.pop_mark();
                let receiver = if has_target {
                    parts.remove(0)
                } else if let Some(owner) = owner {
                    self.type_name(&owner)
                } else {
                    "this".to_string()
                };
                format!("{}.{}({})", receiver, name, parts.join(", "))
            }
            ExprKind::New { class_type, args } => {
                self.context.mark();
                for arg in &args {
                    self.visit_expr(*arg)?;
                }
                let parts = self.context.pop_mark();
                format!("new {}({})", self.type_name(&class_type), parts.join(", "))
            }
            ExprKind::NewArray { element_type, length } => {
                self.context.mark();
                self.visit_expr(length)?;
                let parts = self.context.pop_mark();
                format!("new {}[{}]", self.type_name(&element_type), parts.concat())
            }
            ExprKind::Binary { op, left, right } => {
                self.context.mark();
                self.visit_expr(left)?;
                self.visit_expr(right)?;
                let parts = self.context.pop_mark();
                format!("({} {} {})", parts[0], op.symbol(), parts[1])
            }
            ExprKind::Unary { op, operand } => {
                self.context.mark();
                self.visit_expr(operand)?;
                let parts = self.context.pop_mark();
                format!("({}{})", op.symbol(), parts.concat())
            }
            ExprKind::Cast { target_type, expr } => {
                self.context.mark();
                self.visit_expr(expr)?;
                let parts = self.context.pop_mark();
                format!("(({}) {})", self.type_name(&target_type), parts.concat())
            }
            ExprKind::InstanceOf { checked_type, expr } => {
                self.context.mark();
                self.visit_expr(expr)?;
                let parts = self.context.pop_mark();
                format!("({} instanceof {})", parts.concat(), self.type_name(&checked_type))
            }
        };
        if self.trace {
            log::trace!("fragment: {}", fragment);
        }
        self.context.push(fragment);
        Ok(())
    }

    /// Shorten a qualified name when an import (or `java.lang`, or the
    /// class's own package) makes the simple name unambiguous.
    fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Array(element) => format!("{}[]", self.type_name(element)),
            Type::Class(name) => {
                let simple = name.rsplit('.').next().unwrap_or(name);
                let package = name.rfind('.').map(|dot| &name[..dot]);
                let own_package = self.gen.class().package_name();
                let importable = package == Some("java.lang")
                    || package == own_package
                    || self.imports.iter().any(|import| {
                        import == name
                            || import
                                .strip_suffix(".*")
                                .map(|p| Some(p) == package)
                                .unwrap_or(false)
                    });
                if importable {
                    simple.to_string()
                } else {
                    name.clone()
                }
            }
            other => other.to_string(),
        }
    }
}

fn modifier_string(access: u16) -> String {
    let mut out = String::new();
    if access & ACC_PUBLIC != 0 {
        out.push_str("public ");
    }
    if access & ACC_PROTECTED != 0 {
        out.push_str("protected ");
    }
    if access & ACC_PRIVATE != 0 {
        out.push_str("private ");
    }
    if access & ACC_ABSTRACT != 0 {
        out.push_str("abstract ");
    }
    if access & ACC_STATIC != 0 {
        out.push_str("static ");
    }
    if access & ACC_FINAL != 0 {
        out.push_str("final ");
    }
    out
}

/// Condition positions already carry their own parentheses. Only strips
/// when the leading paren actually matches the trailing one, so a fragment
/// like `((Object) x).equals(y)` stays intact.
fn strip_outer_parens(rendered: &str) -> &str {
    if !(rendered.starts_with('(') && rendered.ends_with(')')) {
        return rendered;
    }
    let mut depth = 0usize;
    for (i, c) in rendered.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != rendered.len() - 1 {
                    return rendered;
                }
            }
            _ => {}
        }
    }
    &rendered[1..rendered.len() - 1]
}

fn constant_source(constant: &Constant) -> String {
    match constant {
        Constant::Int(v) => v.to_string(),
        Constant::Long(v) => format!("{}L", v),
        Constant::Float(v) => {
            if v.fract() == 0.0 && v.is_finite() {
                format!("{:.1}F", v)
            } else {
                format!("{}F", v)
            }
        }
        Constant::Double(v) => {
            if v.fract() == 0.0 && v.is_finite() {
                format!("{:.1}", v)
            } else {
                v.to_string()
            }
        }
        Constant::Boolean(v) => v.to_string(),
        Constant::Char(v) => format!("'{}'", escape_char(*v)),
        Constant::Str(v) => format!("\"{}\"", escape_string(v)),
        Constant::Null => "null".to_string(),
    }
}

fn escape_char(c: char) -> String {
    match c {
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
