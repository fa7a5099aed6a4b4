//! Core value type for all Quill data.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::native::NativeObject;
use crate::types::Type;

/// Core value type for all Quill data.
///
/// Cloning is O(1) for every variant. `Array` and `Object` share their payload
/// between clones, so mutation through one clone is visible through all of them.
#[derive(Clone)]
pub enum Value {
    /// The `undefined` value.
    Undefined,
    /// The `null` value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit floating point number.
    Number(f64),
    /// Immutable string.
    String(Rc<str>),
    /// Shared, mutable, resizable array.
    Array(ArrayRef),
    /// Class instance.
    Object(ObjectRef),
    /// Compiled script function.
    Function(Rc<ScriptFunction>),
    /// Error value carrying a message.
    Error(Rc<str>),
    /// Compiled regular expression.
    Regex(Rc<RegexValue>),
    /// Opaque host value handled by the interop bridge.
    Native(NativeHandle),
}

/// Shared handle to a host object.
pub type NativeHandle = Rc<dyn NativeObject>;

/// A function body compiled into its own code section.
///
/// Functions are not closures: a call runs in a fresh scope parented on the
/// global scope, or on the receiver's field table for method calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptFunction {
    /// Declared name (`@Class.method` for class methods).
    pub name: String,
    /// Index of the code section holding the body.
    pub section: usize,
    /// Number of declared parameters.
    pub arity: usize,
    /// Parameter names, in order.
    pub params: Vec<String>,
}

impl ScriptFunction {
    /// Returns the method name if this is a class method of `class_name`.
    #[must_use]
    pub fn method_of(&self, class_name: &str) -> Option<&str> {
        self.name
            .strip_prefix('@')
            .and_then(|rest| rest.strip_prefix(class_name))
            .and_then(|rest| rest.strip_prefix('.'))
    }
}

/// Largest index an array write may extend to.
pub const MAX_ARRAY_INDEX: usize = (1 << 20) - 1;

/// Shared, mutable array payload.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    /// Creates an array from the given elements.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Gets an element by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Sets an element, filling any gap with `undefined`.
    ///
    /// # Errors
    /// Returns an index-out-of-range error for indices above [`MAX_ARRAY_INDEX`].
    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        if index > MAX_ARRAY_INDEX {
            return Err(Error::index_out_of_range(index));
        }
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
        Ok(())
    }

    /// Appends an element and returns the new length.
    pub fn push(&self, value: Value) -> usize {
        let mut items = self.0.borrow_mut();
        items.push(value);
        items.len()
    }

    /// Removes and returns the last element.
    pub fn pop(&self) -> Option<Value> {
        self.0.borrow_mut().pop()
    }

    /// Returns a snapshot of the elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Returns true if both handles share the same payload.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Renders the elements joined by `separator`.
    ///
    /// Holes and nulls render as empty slots, and so does an array already
    /// being rendered further up, which keeps self-containing arrays finite.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        let mut out = String::new();
        self.join_into(&mut out, separator, &mut Vec::new());
        out
    }

    fn join_into(&self, out: &mut String, separator: &str, open: &mut Vec<Self>) {
        if open.iter().any(|outer| outer.ptr_eq(self)) {
            return;
        }
        open.push(self.clone());
        for (i, item) in self.to_vec().iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            match item {
                Value::Undefined | Value::Null => {}
                Value::Array(inner) => inner.join_into(out, ",", open),
                other => out.push_str(&other.to_string()),
            }
        }
        open.pop();
    }

    fn debug_into(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<Self>) -> fmt::Result {
        if open.iter().any(|outer| outer.ptr_eq(self)) {
            return write!(f, "[...]");
        }
        open.push(self.clone());
        write!(f, "[")?;
        for (i, item) in self.to_vec().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match item {
                Value::Array(inner) => inner.debug_into(f, open)?,
                other => write!(f, "{other:?}")?,
            }
        }
        open.pop();
        write!(f, "]")
    }
}

/// Payload of a class instance.
pub struct ObjectData {
    class_name: String,
    fields: Environment,
}

/// Shared handle to a class instance.
#[derive(Clone)]
pub struct ObjectRef(pub(crate) Rc<ObjectData>);

impl ObjectRef {
    /// Creates an instance whose field table is a child of `parent`.
    ///
    /// The field table resolves `this` back to the instance. The link is weak,
    /// so dropping the last handle reclaims the instance.
    #[must_use]
    pub fn new(class_name: impl Into<String>, parent: &Environment) -> Self {
        let class_name = class_name.into();
        Self(Rc::new_cyclic(|this: &Weak<ObjectData>| ObjectData {
            class_name,
            fields: parent.bound_child(this.clone()),
        }))
    }

    /// Returns the class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    /// Returns the field/method table.
    #[must_use]
    pub fn fields(&self) -> &Environment {
        &self.0.fields
    }

    /// Returns true if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A regular expression with its source pattern.
#[derive(Debug)]
pub struct RegexValue {
    source: String,
    matcher: regex::Regex,
}

impl RegexValue {
    /// Returns the source pattern.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the compiled matcher.
    #[must_use]
    pub fn matcher(&self) -> &regex::Regex {
        &self.matcher
    }
}

impl Value {
    /// Compiles a regular expression value.
    ///
    /// # Errors
    /// Returns a native error if `pattern` is not a valid expression.
    pub fn regex(pattern: &str) -> Result<Self> {
        let matcher = regex::Regex::new(pattern)
            .map_err(|e| Error::native(format!("invalid regular expression /{pattern}/: {e}")))?;
        Ok(Self::Regex(Rc::new(RegexValue {
            source: pattern.to_string(),
            matcher,
        })))
    }

    /// Creates an error value.
    #[must_use]
    pub fn error(message: impl Into<Rc<str>>) -> Self {
        Self::Error(message.into())
    }

    /// Creates an array value.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(ArrayRef::new(items))
    }

    /// Wraps a host object.
    #[must_use]
    pub fn native(object: impl NativeObject + 'static) -> Self {
        Self::Native(Rc::new(object))
    }

    /// Returns the type of this value.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Self::Undefined => Type::Undefined,
            Self::Null => Type::Null,
            Self::Bool(_) => Type::Bool,
            Self::Number(_) => Type::Number,
            Self::String(_) => Type::String,
            Self::Array(_) => Type::Array,
            Self::Object(_) => Type::Object,
            Self::Function(_) => Type::Function,
            Self::Error(_) => Type::Error,
            Self::Regex(_) => Type::Regex,
            Self::Native(_) => Type::Native,
        }
    }

    /// Returns true if this value is `undefined`.
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns true if this value is truthy.
    ///
    /// Only `undefined`, `null` and `false` are falsy. Zero, `NaN` and the
    /// empty string are truthy.
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            _ => true,
        }
    }

    /// Attempts to extract a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract an array handle.
    #[must_use]
    pub const fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Attempts to extract an object handle.
    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Attempts to extract a script function.
    #[must_use]
    pub fn as_function(&self) -> Option<&ScriptFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the message an embedder sees when this value is thrown.
    ///
    /// Error values yield their bare message; everything else is stringified.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Error(message) => message.to_string(),
            other => other.to_string(),
        }
    }

    /// Interprets this value as an array index.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Number(n) if *n >= 0.0 && n.fract() == 0.0 && n.is_finite() => {
                Some(*n as usize)
            }
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Formats a number the way scripts see it: integral values drop the fraction.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// Script-level `==`: numbers, strings and booleans by value; everything
// else by variant or reference identity.
impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Error(a), Self::Error(b)) => Rc::ptr_eq(a, b),
            (Self::Regex(a), Self::Regex(b)) => Rc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(a) => a.debug_into(f, &mut Vec::new()),
            Self::Object(o) => write!(f, "<{} instance>", o.class_name()),
            Self::Function(func) => write!(f, "<fn {} #{}>", func.name, func.section),
            Self::Error(message) => write!(f, "Error({message:?})"),
            Self::Regex(r) => write!(f, "/{}/", r.source()),
            Self::Native(handle) => write!(f, "<native {handle:?}>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(a) => write!(f, "{}", a.join(",")),
            Self::Object(o) => write!(f, "[object {}]", o.class_name()),
            Self::Function(func) => write!(f, "function {}", func.name),
            Self::Error(message) => write!(f, "Error: {message}"),
            Self::Regex(r) => write!(f, "/{}/", r.source()),
            Self::Native(handle) => write!(f, "[native {}]", handle.type_name()),
        }
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_into(f, &mut Vec::new())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class_name())
    }
}

// Convenience From implementations

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::array(items)
    }
}
