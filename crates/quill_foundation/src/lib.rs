//! Runtime values, scopes and errors for Quill.
//!
//! This crate provides:
//! - [`Value`] - The tagged runtime value shared by compiler and VM
//! - [`Environment`] - The chained lexical scope
//! - [`Type`] and [`Arity`] - Type descriptors used in diagnostics
//! - [`NativeObject`] - The seam host values and functions implement
//! - [`Error`] - Rich error types with context
//! - [`operators`] - Binary operator semantics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod environment;
pub mod error;
pub mod native;
pub mod operators;
pub mod types;
pub mod value;

pub use environment::Environment;
pub use error::{Diagnostic, Error, ErrorContext, ErrorKind, ResourceLimit, Result};
pub use native::{HostContext, NativeFn, NativeFunction, NativeObject};
pub use types::{Arity, Type};
pub use value::{
    ArrayRef, MAX_ARRAY_INDEX, NativeHandle, ObjectRef, RegexValue, ScriptFunction, Value,
    format_number,
};
