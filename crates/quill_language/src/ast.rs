//! Abstract Syntax Tree for Quill scripts.
//!
//! The parser lives outside this crate; it produces a [`Script`] made of the
//! sum types below. Every node carries a [`Span`]. The constructor helpers
//! build nodes with an unknown span; chain [`Stmt::at`] or [`Expr::at`] to set
//! a position.

use quill_foundation::Diagnostic;

use crate::span::Span;

/// A parsed script: top-level statements plus any parser diagnostics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Script {
    /// Top-level statements, in source order.
    pub body: Vec<Stmt>,
    /// Problems the parser reported. Any entry makes compilation fail.
    pub diagnostics: Vec<Diagnostic>,
}

impl Script {
    /// Creates a script from statements.
    #[must_use]
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            body,
            diagnostics: Vec::new(),
        }
    }

    /// Attaches parser diagnostics.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

// =============================================================================
// Statements
// =============================================================================

/// A statement node.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    /// What kind of statement this is.
    pub kind: StmtKind,
    /// Source position.
    pub span: Span,
}

/// Statement variants.
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for its effect.
    Expr(Expr),
    /// `var name = init;`
    Var {
        /// Variable name.
        name: String,
        /// Optional initializer.
        init: Option<Expr>,
    },
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `if (cond) then else otherwise`
    If {
        /// Condition.
        cond: Expr,
        /// Taken when the condition is truthy.
        then: Box<Stmt>,
        /// Taken otherwise.
        otherwise: Option<Box<Stmt>>,
    },
    /// `while (cond) body`
    While {
        /// Loop condition.
        cond: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `for (init; cond; update) body`
    For {
        /// Runs once, in the loop's own scope.
        init: Option<Box<Stmt>>,
        /// Loop condition; absent means loop forever.
        cond: Option<Expr>,
        /// Evaluated after each iteration.
        update: Option<Expr>,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// `return value;`
    Return(Option<Expr>),
    /// `throw value;`
    Throw(Expr),
    /// `try { } catch (param) { } finally { }`
    Try {
        /// Protected statements.
        body: Vec<Stmt>,
        /// Optional catch clause.
        catch: Option<CatchClause>,
        /// Optional finally statements.
        finally: Option<Vec<Stmt>>,
    },
    /// `function name(params) { body }`
    Function(FunctionDecl),
    /// `class Name { methods }`
    Class(ClassDecl),
    /// `debugger;`
    Debugger,
    /// `;`
    Empty,
}

/// The `catch` part of a try statement.
#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
    /// Name the caught value is bound to, if any.
    pub param: Option<String>,
    /// Handler statements.
    pub body: Vec<Stmt>,
}

/// A named function or class method.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    /// Function name.
    pub name: String,
    /// Parameter names, in order.
    pub params: Vec<String>,
    /// Body statements.
    pub body: Vec<Stmt>,
}

/// A class declaration. A method named `constructor` runs on `new`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    /// Class name.
    pub name: String,
    /// Methods, in source order.
    pub methods: Vec<FunctionDecl>,
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression node.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// What kind of expression this is.
    pub kind: ExprKind,
    /// Source position.
    pub span: Span,
}

/// Expression variants.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Numeric literal.
    Number(f64),
    /// String literal.
    String(String),
    /// Regex literal `/pattern/`.
    Regex(String),
    /// `[a, b, c]`
    Array(Vec<Expr>),
    /// `{ key: value, ... }`
    Record(Vec<(String, Expr)>),
    /// Variable reference.
    Ident(String),
    /// `this`
    This,
    /// `object.property`
    Member {
        /// Accessed value.
        object: Box<Expr>,
        /// Property name.
        property: String,
    },
    /// `object[index]`
    Index {
        /// Accessed value.
        object: Box<Expr>,
        /// Computed key.
        index: Box<Expr>,
    },
    /// `!x`, `-x`
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `++x`, `x--`, ...
    Update {
        /// Increment or decrement.
        op: UpdateOp,
        /// True for the prefix form.
        prefix: bool,
        /// Assignment target.
        target: Box<Expr>,
    },
    /// Arithmetic, comparison and bitwise operators.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Short-circuit `&&` / `||`.
    Logical {
        /// Operator.
        op: LogicalOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        /// Compound operator, if any.
        op: Option<BinaryOp>,
        /// Assignment target.
        target: Box<Expr>,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Conditional {
        /// Condition.
        cond: Box<Expr>,
        /// Value when truthy.
        then: Box<Expr>,
        /// Value otherwise.
        otherwise: Box<Expr>,
    },
    /// `callee(args)`; a member callee makes this a method call.
    Call {
        /// Called value.
        callee: Box<Expr>,
        /// Arguments, in order.
        args: Vec<Expr>,
    },
    /// `new Class(args)`
    New {
        /// Class name.
        class: String,
        /// Constructor arguments.
        args: Vec<Expr>,
    },
    /// `function (params) { body }`
    Function {
        /// Optional name, for diagnostics only.
        name: Option<String>,
        /// Parameter names.
        params: Vec<String>,
        /// Body statements.
        body: Vec<Stmt>,
    },
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Minus,
}

/// `++` / `--`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `**`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
}

/// Short-circuit operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
}

// =============================================================================
// Constructors
// =============================================================================

impl Stmt {
    /// Creates a statement with an unknown span.
    #[must_use]
    pub const fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::point(0, 0),
        }
    }

    /// Sets the source position.
    #[must_use]
    pub const fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::point(line, column);
        self
    }

    /// Expression statement.
    #[must_use]
    pub const fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    /// `var name = init;`
    #[must_use]
    pub fn var(name: impl Into<String>, init: Option<Expr>) -> Self {
        Self::new(StmtKind::Var {
            name: name.into(),
            init,
        })
    }

    /// `{ body }`
    #[must_use]
    pub const fn block(body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Block(body))
    }

    /// `if (cond) then else otherwise`
    #[must_use]
    pub fn if_else(cond: Expr, then: Stmt, otherwise: Option<Stmt>) -> Self {
        Self::new(StmtKind::If {
            cond,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        })
    }

    /// `while (cond) body`
    #[must_use]
    pub fn while_loop(cond: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::While {
            cond,
            body: Box::new(body),
        })
    }

    /// `for (init; cond; update) body`
    #[must_use]
    pub fn for_loop(init: Option<Stmt>, cond: Option<Expr>, update: Option<Expr>, body: Stmt) -> Self {
        Self::new(StmtKind::For {
            init: init.map(Box::new),
            cond,
            update,
            body: Box::new(body),
        })
    }

    /// `break;`
    #[must_use]
    pub const fn break_loop() -> Self {
        Self::new(StmtKind::Break)
    }

    /// `continue;`
    #[must_use]
    pub const fn continue_loop() -> Self {
        Self::new(StmtKind::Continue)
    }

    /// `return value;`
    #[must_use]
    pub const fn returns(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value))
    }

    /// `throw value;`
    #[must_use]
    pub const fn throw(value: Expr) -> Self {
        Self::new(StmtKind::Throw(value))
    }

    /// `try { body } catch (param) { handler } finally { finally }`
    #[must_use]
    pub fn try_catch(
        body: Vec<Stmt>,
        catch: Option<(Option<&str>, Vec<Stmt>)>,
        finally: Option<Vec<Stmt>>,
    ) -> Self {
        Self::new(StmtKind::Try {
            body,
            catch: catch.map(|(param, body)| CatchClause {
                param: param.map(str::to_string),
                body,
            }),
            finally,
        })
    }

    /// `function name(params) { body }`
    #[must_use]
    pub fn function(name: impl Into<String>, params: &[&str], body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::Function(FunctionDecl::new(name, params, body)))
    }

    /// `class name { methods }`
    #[must_use]
    pub fn class(name: impl Into<String>, methods: Vec<FunctionDecl>) -> Self {
        Self::new(StmtKind::Class(ClassDecl {
            name: name.into(),
            methods,
        }))
    }

    /// `debugger;`
    #[must_use]
    pub const fn debugger() -> Self {
        Self::new(StmtKind::Debugger)
    }
}

impl FunctionDecl {
    /// Creates a function or method declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, params: &[&str], body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params: params.iter().map(|p| (*p).to_string()).collect(),
            body,
        }
    }
}

impl Expr {
    /// Creates an expression with an unknown span.
    #[must_use]
    pub const fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::point(0, 0),
        }
    }

    /// Sets the source position.
    #[must_use]
    pub const fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::point(line, column);
        self
    }

    /// `undefined`
    #[must_use]
    pub const fn undefined() -> Self {
        Self::new(ExprKind::Undefined)
    }

    /// `null`
    #[must_use]
    pub const fn null() -> Self {
        Self::new(ExprKind::Null)
    }

    /// Boolean literal.
    #[must_use]
    pub const fn bool(b: bool) -> Self {
        Self::new(ExprKind::Bool(b))
    }

    /// Number literal.
    #[must_use]
    pub const fn number(n: f64) -> Self {
        Self::new(ExprKind::Number(n))
    }

    /// String literal.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::new(ExprKind::String(s.into()))
    }

    /// Regex literal.
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(ExprKind::Regex(pattern.into()))
    }

    /// Array literal.
    #[must_use]
    pub const fn array(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::Array(items))
    }

    /// Record literal.
    #[must_use]
    pub fn record(fields: Vec<(&str, Expr)>) -> Self {
        Self::new(ExprKind::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ))
    }

    /// Variable reference.
    #[must_use]
    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Ident(name.into()))
    }

    /// `this`
    #[must_use]
    pub const fn this() -> Self {
        Self::new(ExprKind::This)
    }

    /// `object.property`
    #[must_use]
    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Self::new(ExprKind::Member {
            object: Box::new(object),
            property: property.into(),
        })
    }

    /// `object[index]`
    #[must_use]
    pub fn index(object: Expr, index: Expr) -> Self {
        Self::new(ExprKind::Index {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    /// `!operand`
    #[must_use]
    pub fn not(operand: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    /// `-operand`
    #[must_use]
    pub fn neg(operand: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(operand),
        })
    }

    /// `++target`, `target--`, ...
    #[must_use]
    pub fn update(op: UpdateOp, prefix: bool, target: Expr) -> Self {
        Self::new(ExprKind::Update {
            op,
            prefix,
            target: Box::new(target),
        })
    }

    /// `left op right`
    #[must_use]
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `left && right` / `left || right`
    #[must_use]
    pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// `target = value`
    #[must_use]
    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::new(ExprKind::Assign {
            op: None,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// `target op= value`
    #[must_use]
    pub fn compound_assign(op: BinaryOp, target: Expr, value: Expr) -> Self {
        Self::new(ExprKind::Assign {
            op: Some(op),
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// `cond ? then : otherwise`
    #[must_use]
    pub fn conditional(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::new(ExprKind::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// `callee(args)`
    #[must_use]
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    /// `object.method(args)`
    #[must_use]
    pub fn method_call(object: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::call(Self::member(object, method), args)
    }

    /// `new class(args)`
    #[must_use]
    pub fn new_object(class: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::New {
            class: class.into(),
            args,
        })
    }

    /// `function (params) { body }`
    #[must_use]
    pub fn function(params: &[&str], body: Vec<Stmt>) -> Self {
        Self::new(ExprKind::Function {
            name: None,
            params: params.iter().map(|p| (*p).to_string()).collect(),
            body,
        })
    }

    /// Returns true if this expression may appear on the left of `=`.
    #[must_use]
    pub const fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Self::number(n)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}
