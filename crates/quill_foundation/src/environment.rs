//! Lexical scope chain.
//!
//! An [`Environment`] is one scope node: a name → value map plus a link to its
//! parent. Handles are cheap to clone and share the node. Parents are held
//! strongly because a child must keep its enclosing scopes alive; no node ever
//! refers to its children, so the chain cannot form cycles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::value::{ObjectData, ObjectRef, Value};

/// Name bound to the receiver inside an object's field table.
pub const THIS: &str = "this";

/// A scope node.
#[derive(Clone)]
pub struct Environment(Rc<Scope>);

struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Environment>,
    /// Set on an object's field table; resolves `this`.
    this: Option<Weak<ObjectData>>,
}

impl Environment {
    /// Creates a root scope.
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: None,
            this: None,
        }))
    }

    /// Creates a child scope of this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
            this: None,
        }))
    }

    /// Creates a child scope that serves as an object's field table.
    pub(crate) fn bound_child(&self, this: Weak<ObjectData>) -> Self {
        Self(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
            this: Some(this),
        }))
    }

    /// Returns the parent scope.
    #[must_use]
    pub fn parent(&self) -> Option<&Environment> {
        self.0.parent.as_ref()
    }

    /// Returns the object this scope is the field table of, if any.
    #[must_use]
    pub fn bound_object(&self) -> Option<ObjectRef> {
        self.0
            .this
            .as_ref()
            .and_then(Weak::upgrade)
            .map(ObjectRef)
    }

    /// Returns true if this scope is an object's field table.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.0.this.is_some()
    }

    /// Defines or overwrites `name` in this scope.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.vars.borrow_mut().insert(name.into(), value);
    }

    /// Assigns to the nearest scope that already defines `name`.
    ///
    /// # Errors
    /// Returns an undefined variable error if no scope in the chain defines it.
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        let mut value = value;
        let mut scope = Some(self);
        while let Some(env) = scope {
            match env.replace_local(name, value) {
                None => return Ok(()),
                Some(rejected) => value = rejected,
            }
            scope = env.parent();
        }
        Err(Error::undefined_variable(name))
    }

    /// Assigns as a field write: searches up to and including the nearest
    /// field table and defines `name` in this scope when it is not found.
    pub fn assign_field(&self, name: &str, value: Value) {
        let mut value = value;
        let mut scope = Some(self);
        while let Some(env) = scope {
            match env.replace_local(name, value) {
                None => return,
                Some(rejected) => value = rejected,
            }
            if env.is_bound() {
                break;
            }
            scope = env.parent();
        }
        self.define(name, value);
    }

    /// Looks `name` up through the chain.
    ///
    /// # Errors
    /// Returns an undefined variable error if no scope defines it.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.try_get(name)
            .ok_or_else(|| Error::undefined_variable(name))
    }

    /// Looks `name` up through the chain, returning `None` when absent.
    #[must_use]
    pub fn try_get(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(value) = env.get_local(name) {
                return Some(value);
            }
            scope = env.parent();
        }
        None
    }

    /// Looks `name` up in this scope only.
    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.0.vars.borrow().get(name) {
            return Some(value.clone());
        }
        if name == THIS {
            return self.bound_object().map(Value::Object);
        }
        None
    }

    /// Returns true if this scope defines `name`.
    #[must_use]
    pub fn contains_local(&self, name: &str) -> bool {
        self.0.vars.borrow().contains_key(name)
    }

    /// Returns the names defined in this scope, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.0.vars.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of ancestors above this scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.parent();
        while let Some(env) = scope {
            depth += 1;
            scope = env.parent();
        }
        depth
    }

    /// Returns true if both handles refer to the same scope node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Overwrites `name` if defined here; hands the value back otherwise.
    fn replace_local(&self, name: &str, value: Value) -> Option<Value> {
        match self.0.vars.borrow_mut().get_mut(name) {
            Some(slot) => {
                *slot = value;
                None
            }
            None => Some(value),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("depth", &self.depth())
            .field("names", &self.names())
            .field("bound", &self.is_bound())
            .finish()
    }
}
