//! Task execution context: message history plus a shared variable scope.
//!
//! A context tree is built per `TaskManager::execute` call. Forking creates
//! a child with an empty history that writes into the *same* variable scope
//! as its parent, so variables set while a task runs are visible upward
//! without an explicit merge.

use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};
use taskswarm_core::message::{Message, Variables};

/// A cloneable handle to a variable scope.
///
/// Clones share the scope; use [`snapshot`](Self::snapshot) for an owned copy.
#[derive(Clone, Default)]
pub struct VariableBag {
    inner: Arc<RwLock<Variables>>,
}

impl VariableBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(|vars| vars.get(key).cloned())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.write(|vars| {
            vars.insert(key.into(), value.into());
        });
    }

    /// Overwrite keys in place; last writer wins.
    pub fn merge(&self, variables: Variables) {
        if variables.is_empty() {
            return;
        }
        self.write(|vars| vars.extend(variables));
    }

    /// An owned copy of the current contents.
    pub fn snapshot(&self) -> Variables {
        self.read(Clone::clone)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read(|vars| vars.contains_key(key))
    }

    pub fn len(&self) -> usize {
        self.read(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(HashMap::is_empty)
    }

    /// True when both handles point at the same scope.
    pub fn shares_scope_with(&self, other: &VariableBag) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read<T>(&self, f: impl FnOnce(&Variables) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut Variables)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl From<Variables> for VariableBag {
    fn from(variables: Variables) -> Self {
        Self {
            inner: Arc::new(RwLock::new(variables)),
        }
    }
}

impl std::fmt::Debug for VariableBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

/// History and variables threaded through task execution.
#[derive(Debug, Default)]
pub struct TaskExecutionContext {
    /// Append-only conversation history
    pub messages: Vec<Message>,

    variables: VariableBag,

    children: HashMap<String, TaskExecutionContext>,
}

impl TaskExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A root context seeded with `variables`.
    pub fn with_variables(variables: Variables) -> Self {
        Self {
            variables: variables.into(),
            ..Self::default()
        }
    }

    pub fn variables(&self) -> &VariableBag {
        &self.variables
    }

    /// Create a child under `key`, replacing any earlier child with that key.
    ///
    /// The child starts with no messages and shares this context's variables.
    pub fn fork(&mut self, key: impl Into<String>) -> &mut TaskExecutionContext {
        let child = Self {
            messages: Vec::new(),
            variables: self.variables.clone(),
            children: HashMap::new(),
        };

        match self.children.entry(key.into()) {
            Entry::Occupied(mut slot) => {
                slot.insert(child);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(child),
        }
    }

    pub fn child(&self, key: &str) -> Option<&TaskExecutionContext> {
        self.children.get(key)
    }

    pub fn child_keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Write `variables` into the scope (shared with parent and children).
    pub fn merge(&self, variables: Variables) {
        self.variables.merge(variables);
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// At most the last `n` messages.
    pub fn recent_window(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}
