//! Additional context: pre-resolved values supplied by the caller
//!
//! A [`Context`] is an opaque bag of named values. The container matches its
//! entries against constructor parameter names and never looks inside the
//! values. Web integrations forward their live request object under
//! [`REQUEST_KEY`] so that a request-aware [`ContextAdapter`](crate::ContextAdapter)
//! can find it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased, shareable service instance or context value
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Reserved context key carrying the in-flight request object
pub const REQUEST_KEY: &str = "__request__";

/// Named values that take priority over type-based resolution
#[derive(Clone, Default)]
pub struct Context {
    values: HashMap<String, Instance>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Context carrying only a request object under [`REQUEST_KEY`]
    pub fn with_request<R: Send + Sync + 'static>(request: Arc<R>) -> Self {
        let mut context = Self::new();
        context.insert_shared(REQUEST_KEY, request);
        context
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Arc::new(value));
    }

    /// Insert an already shared value without re-wrapping it
    pub fn insert_shared(&mut self, name: impl Into<String>, value: Instance) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.values.get(name)
    }

    /// Typed lookup; `None` when absent or of another type
    pub fn get_as<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.values
            .get(name)
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    /// The request object forwarded under [`REQUEST_KEY`], if any
    pub fn request<R: Send + Sync + 'static>(&self) -> Option<Arc<R>> {
        self.get_as::<R>(REQUEST_KEY)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `other` on top of this context; `other` wins on conflicts
    pub fn extend(&mut self, other: Context) {
        self.values.extend(other.values);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Context").field("names", &names).finish()
    }
}
