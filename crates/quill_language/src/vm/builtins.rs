//! Builtin natives: global functions and the methods of builtin types.
//!
//! Methods are ordinary [`NativeFunction`] handles that read their receiver
//! from [`HostContext::this`]. They are built once per VM and handed out on
//! property access, so `a.push` evaluated twice yields the same handle.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::unnecessary_wraps)]

use std::collections::HashMap;
use std::rc::Rc;

use quill_foundation::{
    Arity, ArrayRef, Error, HostContext, NativeFunction, NativeHandle, RegexValue, Result, Value,
};

use super::interop::NativeRegistry;

type MethodFn = fn(&mut HostContext<'_>, &[Value]) -> Result<Value>;

/// Method tables for the builtin value types.
pub struct Builtins {
    array: HashMap<&'static str, NativeHandle>,
    string: HashMap<&'static str, NativeHandle>,
    regex: HashMap<&'static str, NativeHandle>,
}

impl Builtins {
    /// Builds the method tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            array: table(&[
                ("push", Arity::Variadic(0), array_push),
                ("pop", Arity::Exact(0), array_pop),
                ("indexOf", Arity::Exact(1), array_index_of),
                ("join", Arity::Range(0, 1), array_join),
            ]),
            string: table(&[
                ("toUpperCase", Arity::Exact(0), string_upper),
                ("toLowerCase", Arity::Exact(0), string_lower),
                ("indexOf", Arity::Exact(1), string_index_of),
                ("substring", Arity::Range(1, 2), string_substring),
                ("split", Arity::Range(0, 1), string_split),
            ]),
            regex: table(&[
                ("test", Arity::Exact(1), regex_test),
                ("match", Arity::Exact(1), regex_match),
            ]),
        }
    }

    /// Resolves a property of an array: an index, `length` or a method.
    #[must_use]
    pub fn array_property(&self, array: &ArrayRef, key: &Value) -> Value {
        if let Some(index) = numeric_key(key) {
            return array.get(index).unwrap_or(Value::Undefined);
        }
        match key.as_str() {
            Some("length") => Value::Number(array.len() as f64),
            Some(name) => method(&self.array, name),
            None => Value::Undefined,
        }
    }

    /// Resolves a property of a string: an index, `length` or a method.
    #[must_use]
    pub fn string_property(&self, text: &str, key: &Value) -> Value {
        if let Some(index) = numeric_key(key) {
            return text
                .chars()
                .nth(index)
                .map_or(Value::Undefined, |c| Value::from(c.to_string()));
        }
        match key.as_str() {
            Some("length") => Value::Number(text.chars().count() as f64),
            Some(name) => method(&self.string, name),
            None => Value::Undefined,
        }
    }

    /// Resolves a property of a regex: `source` or a method.
    #[must_use]
    pub fn regex_property(&self, regex: &RegexValue, name: &str) -> Value {
        match name {
            "source" => Value::from(regex.source()),
            _ => method(&self.regex, name),
        }
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Builtins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtins")
            .field("array", &self.array.len())
            .field("string", &self.string.len())
            .field("regex", &self.regex.len())
            .finish()
    }
}

/// Registers the global natives `print`, `Error`, `RegExp` and `typeOf`.
pub fn install_globals(registry: &mut NativeRegistry) {
    let globals: [(&'static str, Arity, MethodFn); 4] = [
        ("print", Arity::Variadic(0), global_print),
        ("Error", Arity::Range(0, 1), global_error),
        ("RegExp", Arity::Exact(1), global_regexp),
        ("typeOf", Arity::Exact(1), global_type_of),
    ];
    for (name, handle) in table(&globals) {
        registry.insert_builtin(name, handle);
    }
}

fn table(entries: &[(&'static str, Arity, MethodFn)]) -> HashMap<&'static str, NativeHandle> {
    entries
        .iter()
        .map(|&(name, arity, func)| {
            let handle: NativeHandle = Rc::new(NativeFunction::new(name, arity, func));
            (name, handle)
        })
        .collect()
}

fn method(table: &HashMap<&'static str, NativeHandle>, name: &str) -> Value {
    table
        .get(name)
        .map_or(Value::Undefined, |handle| Value::Native(Rc::clone(handle)))
}

fn numeric_key(key: &Value) -> Option<usize> {
    match key {
        Value::Number(_) => key.as_index(),
        Value::String(s) if s.bytes().all(|b| b.is_ascii_digit()) => key.as_index(),
        _ => None,
    }
}

fn receiver_error(method: &str, expected: &str, ctx: &HostContext<'_>) -> Error {
    let actual = ctx.this().map_or("nothing", |v| v.value_type().name());
    Error::native(format!("{method} expects a {expected} receiver, got {actual}"))
}

fn this_array(method: &str, ctx: &HostContext<'_>) -> Result<ArrayRef> {
    match ctx.this() {
        Some(Value::Array(a)) => Ok(a.clone()),
        _ => Err(receiver_error(method, "array", ctx)),
    }
}

fn this_string(method: &str, ctx: &HostContext<'_>) -> Result<Rc<str>> {
    match ctx.this() {
        Some(Value::String(s)) => Ok(Rc::clone(s)),
        _ => Err(receiver_error(method, "string", ctx)),
    }
}

fn this_regex(method: &str, ctx: &HostContext<'_>) -> Result<Rc<RegexValue>> {
    match ctx.this() {
        Some(Value::Regex(r)) => Ok(Rc::clone(r)),
        _ => Err(receiver_error(method, "regex", ctx)),
    }
}

fn string_arg(method: &str, args: &[Value], idx: usize) -> Result<Rc<str>> {
    match args.get(idx) {
        Some(Value::String(s)) => Ok(Rc::clone(s)),
        Some(other) => Err(Error::native(format!(
            "{method} expects a string argument, got {}",
            other.value_type()
        ))),
        None => Err(Error::native(format!("{method} expects a string argument"))),
    }
}

fn position_arg(method: &str, args: &[Value], idx: usize, default: usize) -> Result<usize> {
    match args.get(idx) {
        None | Some(Value::Undefined) => Ok(default),
        Some(Value::Number(n)) if n.is_nan() || *n <= 0.0 => Ok(0),
        Some(value @ Value::Number(n)) => Ok(value.as_index().unwrap_or(n.floor() as usize)),
        Some(other) => Err(Error::native(format!(
            "{method} expects a numeric argument, got {}",
            other.value_type()
        ))),
    }
}

// =============================================================================
// Globals
// =============================================================================

fn global_print(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    ctx.log(&line);
    Ok(Value::Undefined)
}

fn global_error(_ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let message = args.first().map(Value::message).unwrap_or_default();
    Ok(Value::error(message))
}

fn global_regexp(_ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Regex(r) => Ok(Value::Regex(Rc::clone(r))),
        other => Value::regex(&other.to_string()),
    }
}

fn global_type_of(_ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let name = match &args[0] {
        Value::Native(handle) => handle.type_name().to_string(),
        other => other.value_type().name().to_string(),
    };
    Ok(Value::from(name))
}

// =============================================================================
// Array Methods
// =============================================================================

fn array_push(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let array = this_array("push", ctx)?;
    let mut len = array.len();
    for arg in args {
        len = array.push(arg.clone());
    }
    Ok(Value::Number(len as f64))
}

fn array_pop(ctx: &mut HostContext<'_>, _args: &[Value]) -> Result<Value> {
    let array = this_array("pop", ctx)?;
    Ok(array.pop().unwrap_or(Value::Undefined))
}

fn array_index_of(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let array = this_array("indexOf", ctx)?;
    let position = array.to_vec().iter().position(|item| *item == args[0]);
    Ok(Value::Number(position.map_or(-1.0, |p| p as f64)))
}

fn array_join(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let array = this_array("join", ctx)?;
    let separator = match args.first() {
        None | Some(Value::Undefined) => Rc::from(","),
        Some(_) => string_arg("join", args, 0)?,
    };
    Ok(Value::from(array.join(&separator)))
}

// =============================================================================
// String Methods
// =============================================================================

fn string_upper(ctx: &mut HostContext<'_>, _args: &[Value]) -> Result<Value> {
    let text = this_string("toUpperCase", ctx)?;
    Ok(Value::from(text.to_uppercase()))
}

fn string_lower(ctx: &mut HostContext<'_>, _args: &[Value]) -> Result<Value> {
    let text = this_string("toLowerCase", ctx)?;
    Ok(Value::from(text.to_lowercase()))
}

fn string_index_of(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let text = this_string("indexOf", ctx)?;
    let needle = string_arg("indexOf", args, 0)?;
    let position = text
        .find(&*needle)
        .map(|byte| text[..byte].chars().count());
    Ok(Value::Number(position.map_or(-1.0, |p| p as f64)))
}

fn string_substring(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let text = this_string("substring", ctx)?;
    let len = text.chars().count();
    let start = position_arg("substring", args, 0, 0)?.min(len);
    let end = position_arg("substring", args, 1, len)?.min(len);
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    let slice: String = text.chars().skip(from).take(to - from).collect();
    Ok(Value::from(slice))
}

fn string_split(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let text = this_string("split", ctx)?;
    let parts: Vec<Value> = match args.first() {
        None | Some(Value::Undefined) => vec![Value::String(text)],
        Some(Value::Regex(r)) => r.matcher().split(&text).map(Value::from).collect(),
        Some(_) => {
            let separator = string_arg("split", args, 0)?;
            if separator.is_empty() {
                text.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                text.split(&*separator).map(Value::from).collect()
            }
        }
    };
    Ok(Value::array(parts))
}

// =============================================================================
// Regex Methods
// =============================================================================

fn regex_test(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let regex = this_regex("test", ctx)?;
    let text = string_arg("test", args, 0)?;
    Ok(Value::Bool(regex.matcher().is_match(&text)))
}

fn regex_match(ctx: &mut HostContext<'_>, args: &[Value]) -> Result<Value> {
    let regex = this_regex("match", ctx)?;
    let text = string_arg("match", args, 0)?;
    Ok(regex
        .matcher()
        .find(&text)
        .map_or(Value::Null, |m| Value::from(m.as_str())))
}
