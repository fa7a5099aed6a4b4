//! AST, bytecode compiler, and stack VM for Quill.
//!
//! This crate provides:
//! - [`ast`] - The syntax tree a front end hands to the compiler
//! - [`Compiler`] - Compiling a [`Script`] into a [`Program`]
//! - [`Opcode`] - The instruction set and its listing format
//! - [`Vm`] - Stack-based bytecode interpreter with try/catch unwinding
//! - [`NativeRegistry`] - Host functions and objects reachable from scripts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod compiler;
pub mod opcode;
pub mod program;
pub mod span;
pub mod vm;


pub use ast::{Expr, Script, Stmt};
pub use compiler::{Compiler, compile};
pub use opcode::{CodeSection, Instruction, LabelId, Opcode};
pub use program::Program;
pub use span::Span;
pub use vm::{NativeRegistry, StackEntry, Vm, VmConfig, VmState};
