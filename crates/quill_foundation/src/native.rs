//! Host interop seam.
//!
//! Host values and host functions enter scripts as [`Value::Native`] handles.
//! The VM never inspects them directly; property access, property writes and
//! calls all go through the [`NativeObject`] trait.

use std::fmt;

use crate::error::{Error, Result};
use crate::types::{Arity, Type};
use crate::value::Value;

// =============================================================================
// HostContext
// =============================================================================

/// What a host call can see of the running VM.
pub struct HostContext<'a> {
    this: Option<&'a Value>,
    log: &'a mut dyn FnMut(&str),
}

impl<'a> HostContext<'a> {
    /// Creates a context for one host call.
    pub fn new(this: Option<&'a Value>, log: &'a mut dyn FnMut(&str)) -> Self {
        Self { this, log }
    }

    /// Returns the receiver of a method call, if any.
    #[must_use]
    pub fn this(&self) -> Option<&Value> {
        self.this
    }

    /// Writes a line to the VM's log sink.
    pub fn log(&mut self, line: &str) {
        (self.log)(line);
    }
}

impl fmt::Debug for HostContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("this", &self.this)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// NativeObject Trait
// =============================================================================

/// A host value reachable from scripts.
///
/// Every method has a default that rejects the operation, so a host type only
/// implements what it supports.
pub trait NativeObject: fmt::Debug {
    /// Name reported by `typeOf` and in diagnostics.
    fn type_name(&self) -> &str;

    /// Reads a property.
    ///
    /// # Errors
    /// Returns an invalid property error by default.
    fn get_property(&self, name: &str) -> Result<Value> {
        Err(Error::invalid_property(name, Type::Native))
    }

    /// Writes a property.
    ///
    /// # Errors
    /// Returns an invalid property error by default.
    fn set_property(&self, name: &str, value: Value) -> Result<()> {
        let _ = value;
        Err(Error::invalid_property(name, Type::Native))
    }

    /// Invokes this object as a function.
    ///
    /// # Errors
    /// Returns a not-callable error by default.
    fn call(&self, ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
        let _ = (ctx, args);
        Err(Error::not_callable(Type::Native))
    }

    /// Returns true if [`call`](Self::call) is supported.
    fn is_callable(&self) -> bool {
        false
    }
}

// =============================================================================
// NativeFunction
// =============================================================================

/// Signature of a host function body.
pub type NativeFn = dyn Fn(&mut HostContext<'_>, &[Value]) -> Result<Value>;

/// A named host function with a checked arity.
pub struct NativeFunction {
    name: String,
    arity: Arity,
    func: Box<NativeFn>,
}

impl NativeFunction {
    /// Wraps a closure as a host function.
    pub fn new(
        name: impl Into<String>,
        arity: Arity,
        func: impl Fn(&mut HostContext<'_>, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Box::new(func),
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the accepted arity.
    #[must_use]
    pub const fn arity(&self) -> Arity {
        self.arity
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}/{}", self.name, self.arity)
    }
}

impl NativeObject for NativeFunction {
    fn type_name(&self) -> &str {
        "function"
    }

    fn get_property(&self, name: &str) -> Result<Value> {
        match name {
            "name" => Ok(Value::from(self.name.as_str())),
            _ => Ok(Value::Undefined),
        }
    }

    fn call(&self, ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
        if !self.arity.accepts(args.len()) {
            return Err(Error::arity_mismatch(&self.name, self.arity, args.len()));
        }
        (self.func)(ctx, args)
    }

    fn is_callable(&self) -> bool {
        true
    }
}
