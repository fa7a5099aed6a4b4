//! Bytecode instruction set for the Quill VM.
//!
//! The VM is stack-based. Most operations consume operands from the stack
//! and push results back. Jump operands are label ids, resolved through the
//! program's jump table at run time.

#![allow(clippy::doc_markdown)]

use std::fmt;

use crate::span::Span;

/// Identifier of a `LABEL` instruction.
pub type LabelId = u32;

/// Property name that makes `FETCH`/`STORE` via object take a computed key
/// from the stack.
pub const INDEXER: &str = "[]";

/// A single bytecode instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Opcode {
    // === Stack Operations ===
    /// No operation.
    Nop,
    /// Jump target; no effect when executed.
    Label(LabelId),
    /// Push a constant from the constant pool.
    Const(u32),
    /// Duplicate the top value: `[a] -> [a, a]`
    Dup,
    /// Pop and discard the top value.
    Pop,

    // === Variables and Properties ===
    /// Resolve a name and push its value. With `via_object`, pop a target
    /// (and a key first, for [`INDEXER`]) and push the property value.
    Fetch {
        /// Variable or property name.
        name: String,
        /// Read a property instead of a variable.
        via_object: bool,
    },
    /// Pop a value and assign it. With `via_object`: `[value, target] -> []`,
    /// or `[value, target, key] -> []` for [`INDEXER`].
    Store {
        /// Variable or property name.
        name: String,
        /// Write a property instead of a variable.
        via_object: bool,
    },
    /// Define a name as `undefined` in the current scope.
    Declare(String),

    // === Arithmetic ===
    /// Add: `[a, b] -> [a + b]`
    Add,
    /// Subtract: `[a, b] -> [a - b]`
    Sub,
    /// Multiply: `[a, b] -> [a * b]`
    Mul,
    /// Divide: `[a, b] -> [a / b]`
    Div,
    /// Remainder: `[a, b] -> [a % b]`
    Rem,
    /// Power: `[a, b] -> [a ** b]`
    Pow,

    // === Comparison ===
    /// Equal: `[a, b] -> [a == b]`
    Eq,
    /// Not equal: `[a, b] -> [a != b]`
    Ne,
    /// Less than: `[a, b] -> [a < b]`
    Lt,
    /// Less than or equal: `[a, b] -> [a <= b]`
    Le,
    /// Greater than: `[a, b] -> [a > b]`
    Gt,
    /// Greater than or equal: `[a, b] -> [a >= b]`
    Ge,

    // === Bitwise ===
    /// Bitwise and: `[a, b] -> [a & b]`
    BitAnd,
    /// Bitwise or: `[a, b] -> [a | b]`
    BitOr,

    // === Control Flow ===
    /// Unconditional jump.
    Jmp(LabelId),
    /// Pop; jump if truthy.
    JmpTrue(LabelId),
    /// Pop; jump if falsy.
    JmpFalse(LabelId),
    /// Call: `[args.., callee] -> [result]`, or `[args.., this, callee]`
    /// for method calls.
    Call {
        /// Number of arguments.
        argc: usize,
        /// A receiver sits under the callee.
        is_method: bool,
    },
    /// Pop the return value and the call frame beneath it.
    Return,

    // === Scopes and Markers ===
    /// Enter a child scope.
    EnterScope,
    /// Return to the parent scope.
    LeaveScope,
    /// Push a loop marker.
    LoopStart,
    /// Pop the loop marker.
    LoopEnd,
    /// Unwind to the nearest loop marker and jump.
    LoopExit(LabelId),
    /// Push a try region whose handler is `target`. With `keep_value`, the
    /// top value stays above the region.
    Try {
        /// Handler entry label.
        target: LabelId,
        /// Label of the finally body that rethrows, if there is one.
        finally: Option<LabelId>,
        /// Keep the top value above the new region.
        keep_value: bool,
    },
    /// Pop the try region.
    EndTry,
    /// Pop a value and throw it.
    Throw,

    // === Construction ===
    /// Pop `argc` arguments and instantiate a class.
    CreateObject {
        /// Class name.
        class: String,
        /// Number of constructor arguments.
        argc: usize,
    },
    /// Pop `n` values into a new array.
    CreateArray(usize),
    /// Pop one value per key into a new record.
    CreateRecord(Vec<String>),

    // === Misc ===
    /// Pause execution.
    Debugger,
    /// End of the script.
    Eof,
}

impl Opcode {
    /// Returns the label this instruction jumps to, if it is a jump.
    #[must_use]
    pub const fn jump_target(&self) -> Option<LabelId> {
        match self {
            Self::Jmp(l) | Self::JmpTrue(l) | Self::JmpFalse(l) | Self::LoopExit(l) => Some(*l),
            Self::Try { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Returns the instruction mnemonic.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Label(_) => "LABEL",
            Self::Const(_) => "CONST",
            Self::Dup => "DUPLICATE_VALUE",
            Self::Pop => "POP_AND_DISCARD",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Declare(_) => "DECLARE",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Rem => "REM",
            Self::Pow => "POW",
            Self::Eq => "EQL",
            Self::Ne => "NEQ",
            Self::Lt => "LT",
            Self::Le => "LTE",
            Self::Gt => "GT",
            Self::Ge => "GTE",
            Self::BitAnd => "BITWISE_AND",
            Self::BitOr => "BITWISE_OR",
            Self::Jmp(_) => "JMP",
            Self::JmpTrue(_) => "JMPTRUE",
            Self::JmpFalse(_) => "JMPFALSE",
            Self::Call { .. } => "CALL",
            Self::Return => "RETURN",
            Self::EnterScope => "ENTER_SCOPE",
            Self::LeaveScope => "LEAVE_SCOPE",
            Self::LoopStart => "LOOP_START",
            Self::LoopEnd => "LOOP_END",
            Self::LoopExit(_) => "LOOP_EXIT",
            Self::Try { .. } => "TRY",
            Self::EndTry => "END_TRY",
            Self::Throw => "THROW",
            Self::CreateObject { .. } => "CREATE_OBJECT",
            Self::CreateArray(_) => "CREATE_ARRAY",
            Self::CreateRecord(_) => "CREATE_RECORD",
            Self::Debugger => "DEBUGGER",
            Self::Eof => "EOF",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            Self::Label(l) | Self::Jmp(l) | Self::JmpTrue(l) | Self::JmpFalse(l) | Self::LoopExit(l) => {
                write!(f, " L{l}")
            }
            Self::Const(idx) => write!(f, " #{idx}"),
            Self::Fetch { name, via_object } | Self::Store { name, via_object } => {
                write!(f, " {name}")?;
                if *via_object {
                    write!(f, " via_object")?;
                }
                Ok(())
            }
            Self::Declare(name) => write!(f, " {name}"),
            Self::Call { argc, is_method } => {
                write!(f, " {argc}")?;
                if *is_method {
                    write!(f, " method")?;
                }
                Ok(())
            }
            Self::Try {
                target,
                finally,
                keep_value,
            } => {
                write!(f, " L{target}")?;
                if let Some(finally) = finally {
                    write!(f, " finally=L{finally}")?;
                }
                if *keep_value {
                    write!(f, " keep")?;
                }
                Ok(())
            }
            Self::CreateObject { class, argc } => write!(f, " {class} {argc}"),
            Self::CreateArray(n) => write!(f, " {n}"),
            Self::CreateRecord(keys) => write!(f, " [{}]", keys.join(", ")),
            _ => Ok(()),
        }
    }
}

/// An opcode plus the bookkeeping the VM needs around it.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    /// The operation.
    pub op: Opcode,
    /// Source position of the construct that emitted it.
    pub span: Span,
    /// First instruction of a statement; `step()` pauses before these.
    pub boundary: bool,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.boundary { '*' } else { ' ' };
        write!(f, "{marker} {}", self.op)
    }
}

/// A sequence of instructions holding one body: the script or a function.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeSection {
    /// `<script>` for the top level, the function name otherwise.
    pub name: String,
    /// The instructions.
    pub code: Vec<Instruction>,
}

impl CodeSection {
    /// Creates an empty section.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: Vec::new(),
        }
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, op: Opcode, span: Span, boundary: bool) -> usize {
        let idx = self.code.len();
        self.code.push(Instruction { op, span, boundary });
        idx
    }

    /// Returns the current instruction count (next instruction index).
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Returns true if there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Returns the last opcode emitted.
    #[must_use]
    pub fn last_op(&self) -> Option<&Opcode> {
        self.code.last().map(|i| &i.op)
    }

    /// Returns the opcodes alone, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<&Opcode> {
        self.code.iter().map(|i| &i.op).collect()
    }
}

impl fmt::Display for CodeSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for (idx, instr) in self.code.iter().enumerate() {
            writeln!(f, "{idx:>5} {instr}")?;
        }
        Ok(())
    }
}
