//! Runtime type descriptors.
//!
//! Used to name operand types in error messages and to describe the arity
//! native functions accept.

use std::fmt;

/// Runtime type of a [`Value`](crate::Value).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// The `undefined` type.
    Undefined,
    /// The `null` type.
    Null,
    /// Boolean type.
    Bool,
    /// 64-bit floating point number.
    Number,
    /// String type.
    String,
    /// Shared, mutable array.
    Array,
    /// Class instance with a field table.
    Object,
    /// Compiled script function.
    Function,
    /// Error value.
    Error,
    /// Compiled regular expression.
    Regex,
    /// Opaque host value.
    Native,
}

/// Function arity specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Exactly N arguments.
    Exact(usize),
    /// Between min and max arguments (inclusive).
    Range(usize, usize),
    /// At least N arguments, then any number more.
    Variadic(usize),
}

impl Type {
    /// Returns the lowercase name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Function => "function",
            Self::Error => "error",
            Self::Regex => "regex",
            Self::Native => "native",
        }
    }

    /// Returns true for `undefined` and `null`.
    #[must_use]
    pub const fn is_nullish(self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Returns true for types whose values carry shared, mutable payloads.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Array | Self::Object | Self::Native)
    }
}

impl Arity {
    /// Checks whether `count` arguments satisfy this arity.
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exact(n) => count == n,
            Self::Range(min, max) => count >= min && count <= max,
            Self::Variadic(min) => count >= min,
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::Range(min, max) => write!(f, "{min} to {max}"),
            Self::Variadic(min) => write!(f, "at least {min}"),
        }
    }
}
