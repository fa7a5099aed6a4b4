//! Registration table for host functions and host objects.
//!
//! `FETCH` falls back to this table after the scope chain and the function
//! table, so scripts see registered names as read-only globals.

use std::collections::HashMap;
use std::rc::Rc;

use quill_foundation::{Arity, Error, HostContext, NativeFunction, NativeHandle, Result, Value};
use tracing::debug;

/// Name → host handle table.
#[derive(Default)]
pub struct NativeRegistry {
    entries: HashMap<String, NativeHandle>,
}

impl NativeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host object under `name`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns a native error if `name` is empty.
    pub fn register(&mut self, name: impl Into<String>, handle: NativeHandle) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::native("native name must not be empty"));
        }
        debug!(%name, kind = handle.type_name(), "registered native");
        self.entries.insert(name, handle);
        Ok(())
    }

    /// Registers a host function under `name`.
    ///
    /// # Errors
    /// Returns a native error if `name` is empty.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        arity: Arity,
        func: impl Fn(&mut HostContext<'_>, &[Value]) -> Result<Value> + 'static,
    ) -> Result<()> {
        let name = name.into();
        let handle: NativeHandle = Rc::new(NativeFunction::new(name.clone(), arity, func));
        self.register(name, handle)
    }

    /// Installs a builtin under a name known to be valid.
    pub(crate) fn insert_builtin(&mut self, name: &'static str, handle: NativeHandle) {
        self.entries.insert(name.to_string(), handle);
    }

    /// Looks up a registered handle.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NativeHandle> {
        self.entries.get(name)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}
