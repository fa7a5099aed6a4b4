//! Error types for the Quill system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//!
//! Errors fall into four groups:
//! - compile errors, aggregated before anything runs;
//! - runtime errors, which scripts can catch with `try`/`catch`;
//! - resource limit errors, which end the run;
//! - invariant violations, which indicate a compiler or VM bug.

use std::fmt;

use thiserror::Error;

use crate::types::{Arity, Type};
use crate::value::Value;

/// Result type alias using Quill's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Quill operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an operator type mismatch error naming both operand types.
    #[must_use]
    pub fn type_mismatch(operation: &'static str, left: Type, right: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            operation,
            left,
            right,
        })
    }

    /// Creates an undefined variable error.
    #[must_use]
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedVariable(name.into()))
    }

    /// Creates an invalid property target error.
    #[must_use]
    pub fn invalid_property(property: impl Into<String>, target: Type) -> Self {
        Self::new(ErrorKind::InvalidPropertyTarget {
            property: property.into(),
            target,
        })
    }

    /// Creates a not-callable error.
    #[must_use]
    pub fn not_callable(target: Type) -> Self {
        Self::new(ErrorKind::NotCallable(target))
    }

    /// Creates an arity mismatch error.
    #[must_use]
    pub fn arity_mismatch(name: impl Into<String>, expected: Arity, actual: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch {
            name: name.into(),
            expected,
            actual,
        })
    }

    /// Creates an error for an array write past [`MAX_ARRAY_INDEX`](crate::value::MAX_ARRAY_INDEX).
    #[must_use]
    pub fn index_out_of_range(index: usize) -> Self {
        Self::new(ErrorKind::IndexOutOfRange {
            index,
            max: crate::value::MAX_ARRAY_INDEX,
        })
    }

    /// Creates an error raised by host code.
    #[must_use]
    pub fn native(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Native(message.into()))
    }

    /// Wraps a script-thrown value in the unwind signal.
    #[must_use]
    pub fn thrown(value: Value) -> Self {
        Self::new(ErrorKind::Thrown(value))
    }

    /// Creates an uncaught exception error.
    #[must_use]
    pub fn uncaught(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UncaughtException {
            message: message.into(),
        })
    }

    /// Creates a resource limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: ResourceLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Creates an internal invariant violation.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation(message.into()))
    }

    /// Creates the error returned by a VM that must be reset.
    #[must_use]
    pub fn halted() -> Self {
        Self::new(ErrorKind::Halted)
    }

    /// Creates an aggregated compile error.
    #[must_use]
    pub fn compile(diagnostics: Vec<Diagnostic>) -> Self {
        Self::new(ErrorKind::Compile(diagnostics))
    }

    /// Returns true if a script-level `try`/`catch` may handle this error.
    #[must_use]
    pub const fn is_catchable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::TypeMismatch { .. }
                | ErrorKind::UndefinedVariable(_)
                | ErrorKind::InvalidPropertyTarget { .. }
                | ErrorKind::NotCallable(_)
                | ErrorKind::UndefinedClass(_)
                | ErrorKind::ArityMismatch { .. }
                | ErrorKind::IndexOutOfRange { .. }
                | ErrorKind::Native(_)
                | ErrorKind::Thrown(_)
        )
    }

    /// Returns true if this error ended a run because a resource limit was hit.
    #[must_use]
    pub const fn is_limit_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::LimitExceeded(_))
    }

    /// Returns true if this error is an uncaught script exception.
    #[must_use]
    pub const fn is_uncaught(&self) -> bool {
        matches!(self.kind, ErrorKind::UncaughtException { .. })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Compilation was rejected; holds every diagnostic collected.
    #[error("compilation failed: {}", join_diagnostics(.0))]
    Compile(Vec<Diagnostic>),

    /// An operator was applied to operand types it does not support.
    #[error("cannot apply `{operation}` to {left} and {right}")]
    TypeMismatch {
        /// The operator symbol.
        operation: &'static str,
        /// Type of the left operand.
        left: Type,
        /// Type of the right operand.
        right: Type,
    },

    /// Variable was never declared in any enclosing scope.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// Property access on a value that has no properties.
    #[error("cannot access property `{property}` of {target}")]
    InvalidPropertyTarget {
        /// The property name.
        property: String,
        /// Type of the value that was accessed.
        target: Type,
    },

    /// Call target is not a function.
    #[error("{0} is not callable")]
    NotCallable(Type),

    /// `new` referenced a class that was never declared.
    #[error("undefined class: {0}")]
    UndefinedClass(String),

    /// Array write past the largest supported index.
    #[error("array index {index} exceeds the maximum of {max}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The largest writable index.
        max: usize,
    },

    /// Wrong number of arguments to a native function.
    #[error("{name} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// Name of the function.
        name: String,
        /// Accepted arity.
        expected: Arity,
        /// Actual number of arguments.
        actual: usize,
    },

    /// Failure reported by host code.
    #[error("{0}")]
    Native(String),

    /// A script `throw` in flight; caught by the nearest try region.
    #[error("thrown: {0}")]
    Thrown(Value),

    /// A thrown value reached the embedder without being caught.
    #[error("uncaught exception: {message}")]
    UncaughtException {
        /// Message of the final thrown value.
        message: String,
    },

    /// Resource limit exceeded (not catchable by scripts).
    #[error("limit exceeded: {0}")]
    LimitExceeded(ResourceLimit),

    /// Compiler or VM bug.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// The VM stopped on an earlier error and must be reset.
    #[error("vm halted after an error; reset before running again")]
    Halted,
}

/// Resource limits guarded on every VM cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimit {
    /// Evaluation stack grew past the configured size.
    StackOverflow {
        /// The configured limit.
        limit: usize,
    },
    /// Instruction budget exhausted.
    CycleBudget {
        /// The configured limit.
        limit: u64,
    },
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackOverflow { limit } => write!(f, "max stack size ({limit}) exceeded"),
            Self::CycleBudget { limit } => write!(f, "max cycle count ({limit}) exceeded"),
        }
    }
}

/// A single problem reported by the parser or compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Description of the problem.
    pub message: String,
    /// Line number (1-indexed, 0 if unknown).
    pub line: u32,
    /// Column number (1-indexed, 0 if unknown).
    pub column: u32,
}

impl Diagnostic {
    /// Creates a diagnostic at the given position.
    #[must_use]
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}:{}: {}", self.line, self.column, self.message)
        }
    }
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Name of the code section (script or function body).
    pub source: Option<String>,
    /// Line number in source.
    pub line: Option<u32>,
    /// Column number in source.
    pub column: Option<u32>,
    /// Function bodies unwound through, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the line and column.
    #[must_use]
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
            if let (Some(line), Some(col)) = (self.line, self.column) {
                write!(f, ":{line}:{col}")?;
            }
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
