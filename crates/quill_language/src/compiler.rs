//! Compiler for transforming AST into bytecode.
//!
//! The compiler walks a [`Script`] and appends instructions to one
//! [`CodeSection`] per body: section 0 for the top level, one more per
//! function or class method. Problems do not stop the walk; they are
//! collected and reported together as a single compile error.

#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]

use std::collections::HashMap;

use quill_foundation::{Diagnostic, Error, Result, ScriptFunction, Value};
use tracing::debug;

use crate::ast::{
    BinaryOp, CatchClause, ClassDecl, Expr, ExprKind, LogicalOp, Script, Stmt, StmtKind, UnaryOp,
    UpdateOp,
};
use crate::opcode::{CodeSection, INDEXER, LabelId, Opcode};
use crate::program::{Program, SCRIPT_SECTION};
use crate::span::Span;

/// Hidden local a `return` parks its value in while markers are cleaned up.
const RETURN_SLOT: &str = "@return";

/// Name of the method `new` runs.
pub const CONSTRUCTOR: &str = "constructor";

/// Compiler state for transforming AST to bytecode.
pub struct Compiler {
    /// Constants pool (literals referenced by Const opcode).
    constants: Vec<Value>,
    /// Map from constant value to index (for deduplication).
    constant_map: HashMap<ConstKey, u32>,
    /// Code sections; bodies are written back once compiled.
    sections: Vec<CodeSection>,
    /// Function table.
    functions: Vec<ScriptFunction>,
    /// Class name -> function-table indices of its methods.
    classes: HashMap<String, Vec<usize>>,
    /// Next label id. Labels are unique across all sections.
    next_label: LabelId,
    /// Counter for generated function-expression names.
    next_lambda: usize,
    /// Counter for hidden locals that hold an evaluated target operand.
    next_parked: usize,
    /// Everything that went wrong so far.
    diagnostics: Vec<Diagnostic>,
    /// Enclosing loops and try regions of the body being compiled.
    contexts: Vec<Context>,
    /// What kind of body is being compiled.
    body: BodyKind,
    /// Span attached to emitted instructions.
    span: Span,
    /// Set until the current statement emits its first instruction.
    boundary: bool,
}

/// Key for constant deduplication.
/// Numbers are keyed by their bits so `NaN` deduplicates too.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ConstKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(String),
    Regex(String),
}

impl ConstKey {
    fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Undefined => Some(Self::Undefined),
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.to_bits())),
            Value::String(s) => Some(Self::String(s.to_string())),
            Value::Regex(r) => Some(Self::Regex(r.source().to_string())),
            _ => None,
        }
    }
}

/// A construct that leaves a marker on the VM stack.
#[derive(Clone, Debug)]
enum Context {
    /// Inside a loop body.
    Loop {
        continue_to: LabelId,
        break_to: LabelId,
    },
    /// Inside a try body or catch body; a TryRegion is live.
    Try { finally: Option<Vec<Stmt>> },
    /// Inside the finally body that rethrows; the exception sits on the stack.
    PendingThrow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BodyKind {
    Script,
    Function,
    Constructor,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Creates a new compiler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            constant_map: HashMap::new(),
            sections: Vec::new(),
            functions: Vec::new(),
            classes: HashMap::new(),
            next_label: 0,
            next_lambda: 0,
            next_parked: 0,
            diagnostics: Vec::new(),
            contexts: Vec::new(),
            body: BodyKind::Script,
            span: Span::default(),
            boundary: false,
        }
    }

    /// Compiles a script into a program.
    ///
    /// # Errors
    /// Returns a compile error listing every parser and compiler diagnostic.
    pub fn compile(mut self, script: &Script) -> Result<Program> {
        self.diagnostics.extend(script.diagnostics.iter().cloned());

        self.sections.push(CodeSection::new(SCRIPT_SECTION));
        let mut code = CodeSection::new(SCRIPT_SECTION);
        for stmt in &script.body {
            self.compile_stmt(stmt, &mut code);
        }
        self.span = Span::default();
        self.emit(&mut code, Opcode::Eof);
        self.sections[0] = code;

        if !self.diagnostics.is_empty() {
            debug!(count = self.diagnostics.len(), "compilation rejected");
            return Err(Error::compile(self.diagnostics));
        }

        debug!(
            sections = self.sections.len(),
            constants = self.constants.len(),
            functions = self.functions.len(),
            "compiled script"
        );
        Program::new(self.sections, self.constants, self.functions, self.classes)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn compile_stmt(&mut self, stmt: &Stmt, code: &mut CodeSection) {
        let saved_span = std::mem::replace(&mut self.span, stmt.span);
        self.boundary = true;

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.compile_expr(expr, code);
                self.emit(code, Opcode::Pop);
            }
            StmtKind::Var { name, init } => {
                self.emit(code, Opcode::Declare(name.clone()));
                if let Some(init) = init {
                    self.compile_expr(init, code);
                    self.emit(code, store(name));
                }
            }
            StmtKind::Block(body) => self.compile_block(body, code),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.compile_expr(cond, code);
                self.emit(code, Opcode::JmpFalse(else_label));
                self.compile_stmt(then, code);
                self.emit(code, Opcode::Jmp(end_label));
                self.emit(code, Opcode::Label(else_label));
                if let Some(otherwise) = otherwise {
                    self.compile_stmt(otherwise, code);
                }
                self.emit(code, Opcode::Label(end_label));
            }
            StmtKind::While { cond, body } => self.compile_while(cond, body, code),
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => self.compile_for(init.as_deref(), cond.as_ref(), update.as_ref(), body, code),
            StmtKind::Break => self.compile_loop_exit(true, code),
            StmtKind::Continue => self.compile_loop_exit(false, code),
            StmtKind::Return(value) => self.compile_return(value.as_ref(), code),
            StmtKind::Throw(value) => {
                self.compile_expr(value, code);
                self.emit(code, Opcode::Throw);
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => self.compile_try(body, catch.as_ref(), finally.as_ref(), code),
            StmtKind::Function(decl) => {
                self.compile_function(&decl.name, &decl.params, &decl.body, BodyKind::Function);
            }
            StmtKind::Class(decl) => self.compile_class(decl),
            StmtKind::Debugger => self.emit(code, Opcode::Debugger),
            StmtKind::Empty => {}
        }

        self.boundary = false;
        self.span = saved_span;
    }

    fn compile_block(&mut self, body: &[Stmt], code: &mut CodeSection) {
        self.emit(code, Opcode::EnterScope);
        for stmt in body {
            self.compile_stmt(stmt, code);
        }
        self.emit(code, Opcode::LeaveScope);
    }

    fn compile_while(&mut self, cond: &Expr, body: &Stmt, code: &mut CodeSection) {
        let start = self.new_label();
        let end = self.new_label();

        self.emit(code, Opcode::LoopStart);
        self.emit(code, Opcode::Label(start));
        self.compile_expr(cond, code);
        self.emit(code, Opcode::JmpFalse(end));

        self.contexts.push(Context::Loop {
            continue_to: start,
            break_to: end,
        });
        self.compile_stmt(body, code);
        self.contexts.pop();

        self.emit(code, Opcode::Jmp(start));
        self.emit(code, Opcode::Label(end));
        self.emit(code, Opcode::LoopEnd);
    }

    fn compile_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        code: &mut CodeSection,
    ) {
        let start = self.new_label();
        let next = self.new_label();
        let end = self.new_label();

        self.emit(code, Opcode::EnterScope);
        if let Some(init) = init {
            self.compile_stmt(init, code);
        }
        self.emit(code, Opcode::LoopStart);
        self.emit(code, Opcode::Label(start));
        if let Some(cond) = cond {
            self.compile_expr(cond, code);
            self.emit(code, Opcode::JmpFalse(end));
        }

        self.contexts.push(Context::Loop {
            continue_to: next,
            break_to: end,
        });
        self.compile_stmt(body, code);
        self.contexts.pop();

        self.emit(code, Opcode::Label(next));
        if let Some(update) = update {
            self.compile_expr(update, code);
            self.emit(code, Opcode::Pop);
        }
        self.emit(code, Opcode::Jmp(start));
        self.emit(code, Opcode::Label(end));
        self.emit(code, Opcode::LoopEnd);
        self.emit(code, Opcode::LeaveScope);
    }

    fn compile_loop_exit(&mut self, is_break: bool, code: &mut CodeSection) {
        let innermost_loop = self.contexts.iter().enumerate().rev().find_map(|(idx, ctx)| {
            match ctx {
                Context::Loop {
                    continue_to,
                    break_to,
                } => Some((idx, if is_break { *break_to } else { *continue_to })),
                _ => None,
            }
        });
        let Some((loop_idx, target)) = innermost_loop else {
            let keyword = if is_break { "break" } else { "continue" };
            self.error(format!("`{keyword}` outside of a loop"));
            return;
        };

        self.leave_contexts(loop_idx + 1, code);
        self.emit(code, Opcode::LoopExit(target));
    }

    fn compile_return(&mut self, value: Option<&Expr>, code: &mut CodeSection) {
        if self.body == BodyKind::Script {
            self.error("`return` outside of a function");
            return;
        }

        match value {
            Some(value) => self.compile_expr(value, code),
            None if self.body == BodyKind::Constructor => self.emit(code, fetch("this")),
            None => self.emit_undefined(code),
        }

        if self.contexts.is_empty() {
            self.emit(code, Opcode::Return);
            return;
        }

        // RETURN must find its CallFrame on top, so park the value and
        // clean up every marker this body still holds.
        self.emit(code, Opcode::Declare(RETURN_SLOT.to_string()));
        self.emit(code, store(RETURN_SLOT));
        self.leave_contexts(0, code);
        self.emit(code, fetch(RETURN_SLOT));
        self.emit(code, Opcode::Return);
    }

    /// Emits cleanup for every context from `floor` outwards, innermost first.
    ///
    /// Crossed try regions are closed and their finally bodies inlined. Loop
    /// markers below `floor` are left for `LOOP_EXIT` to find.
    fn leave_contexts(&mut self, floor: usize, code: &mut CodeSection) {
        let saved = self.contexts.clone();
        for idx in (floor..saved.len()).rev() {
            match &saved[idx] {
                Context::Loop { .. } => self.emit(code, Opcode::LoopEnd),
                Context::Try { finally } => {
                    self.emit(code, Opcode::EndTry);
                    if let Some(finally) = finally {
                        self.contexts.truncate(idx);
                        self.compile_block(finally, code);
                    }
                }
                Context::PendingThrow => self.emit(code, Opcode::Pop),
            }
        }
        self.contexts = saved;
    }

    fn compile_try(
        &mut self,
        body: &[Stmt],
        catch: Option<&CatchClause>,
        finally: Option<&Vec<Stmt>>,
        code: &mut CodeSection,
    ) {
        let handler = self.new_label();
        let rethrow = self.new_label();
        let done = self.new_label();

        self.emit(
            code,
            Opcode::Try {
                target: handler,
                finally: finally.map(|_| rethrow),
                keep_value: false,
            },
        );
        self.contexts.push(Context::Try {
            finally: finally.cloned(),
        });
        self.compile_block(body, code);
        self.contexts.pop();
        self.emit(code, Opcode::EndTry);
        self.emit(code, Opcode::Jmp(done));

        // Handler entry: the thrown value is on top of the stack.
        self.emit(code, Opcode::Label(handler));
        self.emit(
            code,
            Opcode::Try {
                target: rethrow,
                finally: None,
                keep_value: true,
            },
        );
        self.contexts.push(Context::Try {
            finally: finally.cloned(),
        });
        match catch {
            Some(CatchClause {
                param: Some(param),
                body,
            }) => {
                self.emit(code, Opcode::EnterScope);
                self.emit(code, Opcode::Declare(param.clone()));
                self.emit(code, store(param));
                for stmt in body {
                    self.compile_stmt(stmt, code);
                }
                self.emit(code, Opcode::LeaveScope);
            }
            Some(CatchClause { param: None, body }) => {
                self.emit(code, Opcode::Pop);
                self.compile_block(body, code);
            }
            None => self.emit(code, Opcode::Throw),
        }
        self.contexts.pop();
        self.emit(code, Opcode::EndTry);
        self.emit(code, Opcode::Jmp(done));

        // Exception escaped the handler: run finally, then rethrow.
        self.emit(code, Opcode::Label(rethrow));
        if let Some(finally) = finally {
            self.contexts.push(Context::PendingThrow);
            self.compile_block(finally, code);
            self.contexts.pop();
        }
        self.emit(code, Opcode::Throw);

        self.emit(code, Opcode::Label(done));
        if let Some(finally) = finally {
            self.compile_block(finally, code);
        }
    }

    // =========================================================================
    // Functions and Classes
    // =========================================================================

    /// Compiles a body into its own section and returns its function-table index.
    fn compile_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Stmt],
        kind: BodyKind,
    ) -> usize {
        let section = self.sections.len();
        self.sections.push(CodeSection::new(name));
        let index = self.functions.len();
        self.functions.push(ScriptFunction {
            name: name.to_string(),
            section,
            arity: params.len(),
            params: params.to_vec(),
        });

        let saved_contexts = std::mem::take(&mut self.contexts);
        let saved_kind = std::mem::replace(&mut self.body, kind);
        let saved_boundary = std::mem::take(&mut self.boundary);

        let mut code = CodeSection::new(name);
        for stmt in body {
            self.compile_stmt(stmt, &mut code);
        }
        if code.last_op() != Some(&Opcode::Return) {
            if kind == BodyKind::Constructor {
                self.emit(&mut code, fetch("this"));
            } else {
                self.emit_undefined(&mut code);
            }
            self.emit(&mut code, Opcode::Return);
        }
        self.sections[section] = code;

        self.contexts = saved_contexts;
        self.body = saved_kind;
        self.boundary = saved_boundary;
        index
    }

    fn compile_class(&mut self, decl: &ClassDecl) {
        if self.classes.contains_key(&decl.name) {
            self.error(format!("duplicate class declaration `{}`", decl.name));
            return;
        }

        let methods = decl
            .methods
            .iter()
            .map(|method| {
                let kind = if method.name == CONSTRUCTOR {
                    BodyKind::Constructor
                } else {
                    BodyKind::Function
                };
                let name = format!("@{}.{}", decl.name, method.name);
                self.compile_function(&name, &method.params, &method.body, kind)
            })
            .collect();
        self.classes.insert(decl.name.clone(), methods);
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn compile_expr(&mut self, expr: &Expr, code: &mut CodeSection) {
        let saved_span = self.span;
        if !expr.span.is_unknown() {
            self.span = expr.span;
        }

        match &expr.kind {
            ExprKind::Undefined => self.emit_undefined(code),
            ExprKind::Null => self.emit_constant(Value::Null, code),
            ExprKind::Bool(b) => self.emit_constant(Value::Bool(*b), code),
            ExprKind::Number(n) => self.emit_constant(Value::Number(*n), code),
            ExprKind::String(s) => self.emit_constant(Value::from(s.as_str()), code),
            ExprKind::Regex(pattern) => match Value::regex(pattern) {
                Ok(regex) => self.emit_constant(regex, code),
                Err(err) => {
                    self.error(err.to_string());
                    self.emit_undefined(code);
                }
            },
            ExprKind::Array(items) => {
                for item in items {
                    self.compile_expr(item, code);
                }
                self.emit(code, Opcode::CreateArray(items.len()));
            }
            ExprKind::Record(fields) => {
                for (_, value) in fields {
                    self.compile_expr(value, code);
                }
                let keys = fields.iter().map(|(key, _)| key.clone()).collect();
                self.emit(code, Opcode::CreateRecord(keys));
            }
            ExprKind::Ident(name) => self.emit(code, fetch(name)),
            ExprKind::This => self.emit(code, fetch("this")),
            ExprKind::Member { object, property } => {
                self.compile_expr(object, code);
                self.emit(code, fetch_property(property));
            }
            ExprKind::Index { object, index } => {
                self.compile_expr(object, code);
                self.compile_expr(index, code);
                self.emit(code, fetch_property(INDEXER));
            }
            ExprKind::Unary { op, operand } => self.compile_unary(*op, operand, code),
            ExprKind::Update { op, prefix, target } => {
                self.compile_update(*op, *prefix, target, code);
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_expr(left, code);
                self.compile_expr(right, code);
                self.emit(code, binary_opcode(*op));
            }
            ExprKind::Logical { op, left, right } => {
                let shortcut = self.new_label();
                let complete = self.new_label();
                let (jump, fallback) = match op {
                    LogicalOp::And => (Opcode::JmpFalse(shortcut), false),
                    LogicalOp::Or => (Opcode::JmpTrue(shortcut), true),
                };
                self.compile_expr(left, code);
                self.emit(code, jump);
                self.compile_expr(right, code);
                self.emit(code, Opcode::Jmp(complete));
                self.emit(code, Opcode::Label(shortcut));
                self.emit_constant(Value::Bool(fallback), code);
                self.emit(code, Opcode::Label(complete));
            }
            ExprKind::Assign { op, target, value } => {
                if !target.is_assignable() {
                    self.error("invalid assignment target");
                    self.emit_undefined(code);
                } else {
                    match op {
                        Some(op) => {
                            let parked = self.park_target(target, code);
                            let target = parked.as_ref().unwrap_or(&**target);
                            let combined = Expr {
                                kind: ExprKind::Binary {
                                    op: *op,
                                    left: Box::new(target.clone()),
                                    right: value.clone(),
                                },
                                span: expr.span,
                            };
                            self.compile_expr(&combined, code);
                            self.emit(code, Opcode::Dup);
                            self.compile_store(target, code);
                            if parked.is_some() {
                                self.emit(code, Opcode::LeaveScope);
                            }
                        }
                        None => {
                            self.compile_expr(value, code);
                            self.emit(code, Opcode::Dup);
                            self.compile_store(target, code);
                        }
                    }
                }
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.compile_expr(cond, code);
                self.emit(code, Opcode::JmpFalse(else_label));
                self.compile_expr(then, code);
                self.emit(code, Opcode::Jmp(end_label));
                self.emit(code, Opcode::Label(else_label));
                self.compile_expr(otherwise, code);
                self.emit(code, Opcode::Label(end_label));
            }
            ExprKind::Call { callee, args } => self.compile_call(callee, args, code),
            ExprKind::New { class, args } => {
                for arg in args {
                    self.compile_expr(arg, code);
                }
                self.emit(
                    code,
                    Opcode::CreateObject {
                        class: class.clone(),
                        argc: args.len(),
                    },
                );
            }
            ExprKind::Function { name, params, body } => {
                let generated = match name {
                    Some(name) => format!("@{name}#{}", self.next_lambda),
                    None => format!("@lambda#{}", self.next_lambda),
                };
                self.next_lambda += 1;
                self.compile_function(&generated, params, body, BodyKind::Function);
                self.emit(code, fetch(&generated));
            }
        }

        self.span = saved_span;
    }

    fn compile_unary(&mut self, op: UnaryOp, operand: &Expr, code: &mut CodeSection) {
        match op {
            UnaryOp::Not => {
                let is_true = self.new_label();
                let end = self.new_label();
                self.compile_expr(operand, code);
                self.emit(code, Opcode::JmpTrue(is_true));
                self.emit_constant(Value::Bool(true), code);
                self.emit(code, Opcode::Jmp(end));
                self.emit(code, Opcode::Label(is_true));
                self.emit_constant(Value::Bool(false), code);
                self.emit(code, Opcode::Label(end));
            }
            UnaryOp::Minus => {
                self.emit_constant(Value::Number(0.0), code);
                self.compile_expr(operand, code);
                self.emit(code, Opcode::Sub);
            }
        }
    }

    fn compile_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr, code: &mut CodeSection) {
        if !target.is_assignable() {
            self.error("invalid increment/decrement target");
            self.emit_undefined(code);
            return;
        }
        let arith = match op {
            UpdateOp::Increment => Opcode::Add,
            UpdateOp::Decrement => Opcode::Sub,
        };

        let parked = self.park_target(target, code);
        let target = parked.as_ref().unwrap_or(target);
        self.compile_expr(target, code);
        if !prefix {
            // Old value stays underneath as the result.
            self.compile_expr(target, code);
        }
        self.emit_constant(Value::Number(1.0), code);
        self.emit(code, arith);
        self.compile_store(target, code);
        if prefix {
            self.compile_expr(target, code);
        }
        if parked.is_some() {
            self.emit(code, Opcode::LeaveScope);
        }
    }

    /// Evaluates the object and key of a member or index target once and
    /// parks them in hidden locals of a fresh scope, which the caller must
    /// leave. Returns the target rewritten to read the parked values, or
    /// `None` for a plain name.
    fn park_target(&mut self, target: &Expr, code: &mut CodeSection) -> Option<Expr> {
        if !matches!(target.kind, ExprKind::Member { .. } | ExprKind::Index { .. }) {
            return None;
        }
        self.emit(code, Opcode::EnterScope);
        let kind = match &target.kind {
            ExprKind::Member { object, property } => ExprKind::Member {
                object: Box::new(self.park(object, code)),
                property: property.clone(),
            },
            ExprKind::Index { object, index } => {
                let object = self.park(object, code);
                let index = self.park(index, code);
                ExprKind::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                }
            }
            _ => return None,
        };
        Some(Expr {
            kind,
            span: target.span,
        })
    }

    /// Stores the value of `expr` in a new hidden local and returns a read of it.
    fn park(&mut self, expr: &Expr, code: &mut CodeSection) -> Expr {
        let name = format!("@parked#{}", self.next_parked);
        self.next_parked += 1;
        self.compile_expr(expr, code);
        self.emit(code, Opcode::Declare(name.clone()));
        self.emit(code, store(&name));
        Expr {
            kind: ExprKind::Ident(name),
            span: expr.span,
        }
    }

    /// Stores the value on top of the stack into an assignable target.
    fn compile_store(&mut self, target: &Expr, code: &mut CodeSection) {
        match &target.kind {
            ExprKind::Ident(name) => self.emit(code, store(name)),
            ExprKind::Member { object, property } => {
                self.compile_expr(object, code);
                self.emit(code, store_property(property));
            }
            ExprKind::Index { object, index } => {
                self.compile_expr(object, code);
                self.compile_expr(index, code);
                self.emit(code, store_property(INDEXER));
            }
            _ => self.error("invalid assignment target"),
        }
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr], code: &mut CodeSection) {
        for arg in args {
            self.compile_expr(arg, code);
        }
        let argc = args.len();

        match &callee.kind {
            ExprKind::Member { object, property } => {
                self.compile_expr(object, code);
                self.emit(code, Opcode::Dup);
                self.emit(code, fetch_property(property));
                self.emit(
                    code,
                    Opcode::Call {
                        argc,
                        is_method: true,
                    },
                );
            }
            ExprKind::Index { object, index } => {
                self.compile_expr(object, code);
                self.emit(code, Opcode::Dup);
                self.compile_expr(index, code);
                self.emit(code, fetch_property(INDEXER));
                self.emit(
                    code,
                    Opcode::Call {
                        argc,
                        is_method: true,
                    },
                );
            }
            _ => {
                self.compile_expr(callee, code);
                self.emit(
                    code,
                    Opcode::Call {
                        argc,
                        is_method: false,
                    },
                );
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn emit(&mut self, code: &mut CodeSection, op: Opcode) {
        let boundary = std::mem::take(&mut self.boundary);
        code.emit(op, self.span, boundary);
    }

    fn emit_constant(&mut self, value: Value, code: &mut CodeSection) {
        let idx = self.add_constant(value);
        self.emit(code, Opcode::Const(idx));
    }

    fn emit_undefined(&mut self, code: &mut CodeSection) {
        self.emit_constant(Value::Undefined, code);
    }

    fn new_label(&mut self) -> LabelId {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Adds a constant to the pool and returns its index.
    fn add_constant(&mut self, value: Value) -> u32 {
        let key = ConstKey::from_value(&value);
        if let Some(idx) = key.as_ref().and_then(|k| self.constant_map.get(k)) {
            return *idx;
        }
        let Ok(idx) = u32::try_from(self.constants.len()) else {
            self.error("too many constants");
            return 0;
        };
        if let Some(key) = key {
            self.constant_map.insert(key, idx);
        }
        self.constants.push(value);
        idx
    }

    /// Records a compile error at the current position.
    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(message, self.span.line, self.span.column));
    }
}

fn fetch(name: &str) -> Opcode {
    Opcode::Fetch {
        name: name.to_string(),
        via_object: false,
    }
}

fn fetch_property(name: &str) -> Opcode {
    Opcode::Fetch {
        name: name.to_string(),
        via_object: true,
    }
}

fn store(name: &str) -> Opcode {
    Opcode::Store {
        name: name.to_string(),
        via_object: false,
    }
}

fn store_property(name: &str) -> Opcode {
    Opcode::Store {
        name: name.to_string(),
        via_object: true,
    }
}

const fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Rem => Opcode::Rem,
        BinaryOp::Pow => Opcode::Pow,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::BitAnd => Opcode::BitAnd,
        BinaryOp::BitOr => Opcode::BitOr,
    }
}

/// Compiles a script into a program.
///
/// # Errors
/// Returns a compile error listing every parser and compiler diagnostic.
pub fn compile(script: &Script) -> Result<Program> {
    Compiler::new().compile(script)
}
