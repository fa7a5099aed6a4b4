//! Entries of the VM stack.
//!
//! Values and control markers share one stack. Markers record what must be
//! restored when control leaves a function, a try region or a loop.

use std::fmt;

use quill_foundation::{Environment, Value};

/// One slot of the VM stack.
#[derive(Clone)]
pub enum StackEntry {
    /// An operand.
    Value(Value),
    /// Saved caller state, pushed by `CALL`.
    Frame(CallFrame),
    /// Active exception handler, pushed by `TRY`.
    Try(TryRegion),
    /// Active loop, pushed by `LOOP_START`.
    Loop(LoopMarker),
}

impl StackEntry {
    /// Returns a short name for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Frame(_) => "call frame",
            Self::Try(_) => "try region",
            Self::Loop(_) => "loop marker",
        }
    }

    /// Returns true if this entry is a marker rather than a value.
    #[must_use]
    pub const fn is_marker(&self) -> bool {
        !matches!(self, Self::Value(_))
    }
}

impl fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:?}"),
            Self::Frame(frame) => write!(
                f,
                "<frame {}:{}{}>",
                frame.return_section,
                frame.return_pc,
                if frame.from_host { " host" } else { "" }
            ),
            Self::Try(region) => {
                write!(f, "<try {}:{}", region.section, region.handler_pc)?;
                if let Some(pc) = region.finally_pc {
                    write!(f, " finally {pc}")?;
                }
                write!(f, ">")
            }
            Self::Loop(_) => write!(f, "<loop>"),
        }
    }
}

/// Caller state saved by a call.
#[derive(Clone)]
pub struct CallFrame {
    /// Section to resume in.
    pub return_section: usize,
    /// Instruction to resume at.
    pub return_pc: usize,
    /// Caller's environment.
    pub env: Environment,
    /// Name of the function body this frame belongs to.
    pub callee: String,
    /// The call came from the embedder; returning hands control back to it.
    pub from_host: bool,
}

/// An active exception handler.
#[derive(Clone)]
pub struct TryRegion {
    /// Section holding the handler.
    pub section: usize,
    /// First instruction of the handler.
    pub handler_pc: usize,
    /// First instruction of the finally body that rethrows, if there is one.
    pub finally_pc: Option<usize>,
    /// Environment current when the region was entered.
    pub env: Environment,
}

/// An active loop.
#[derive(Clone)]
pub struct LoopMarker {
    /// Environment current when the loop started.
    pub env: Environment,
}
