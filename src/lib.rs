//! Quill - bytecode compiler and stack VM for a small dynamic language
//!
//! This crate re-exports both layers of the Quill system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: quill_language    - AST, compiler, program, VM, builtins, interop
//! Layer 0: quill_foundation  - Core types (Value, Environment, Error)
//! ```

pub use quill_foundation as foundation;
pub use quill_language as language;
