//! Constructor signatures and the arguments handed to constructors
//!
//! Rust has no runtime reflection over function signatures, so every
//! constructible type describes its own constructor: an ordered list of
//! [`Parameter`]s and a function that builds the value from the resolved
//! [`Arguments`]. The container treats a [`Descriptor`] as the type's
//! "constructor reference" and never constructs anything another way.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::context::{Context, Instance};
use crate::injectable::Injectable;
use crate::key::TypeKey;
use crate::{DIError, DIResult};

type Constructor = Arc<dyn Fn(&mut Arguments) -> DIResult<Instance> + Send + Sync>;

/// The declared type of a parameter
#[derive(Clone)]
pub struct Dependency {
    key: TypeKey,
    describe: Option<fn() -> Descriptor>,
}

impl Dependency {
    /// A dependency the container can build by resolving `T`
    pub fn injectable<T: Injectable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            describe: Some(Descriptor::of::<T>),
        }
    }

    /// A typed value the container cannot build; it must come from a default or the context
    pub fn value<T: Send + Sync + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            describe: None,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn is_constructible(&self) -> bool {
        self.describe.is_some()
    }

    pub fn describe(&self) -> Option<Descriptor> {
        self.describe.map(|describe| describe())
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("key", &self.key)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// One constructor parameter
#[derive(Clone)]
pub struct Parameter {
    name: String,
    declared: Option<Dependency>,
    default: Option<Instance>,
}

impl Parameter {
    /// Parameter whose value is resolved from the container as `T`
    pub fn inject<T: Injectable>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: Some(Dependency::injectable::<T>()),
            default: None,
        }
    }

    /// Parameter of a plain value type `T`
    pub fn value<T: Send + Sync + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: Some(Dependency::value::<T>()),
            default: None,
        }
    }

    /// Parameter with no declared type
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: None,
            default: None,
        }
    }

    /// Attach a default value, used verbatim when the context has no override
    pub fn with_default<V: Send + Sync + 'static>(mut self, value: V) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared(&self) -> Option<&Dependency> {
        self.declared.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("declared", &self.declared.as_ref().map(Dependency::key))
            .field("has_default", &self.has_default())
            .finish()
    }
}

/// Introspection row: `(name, declared type, default)`
#[derive(Clone)]
pub struct ParameterInfo {
    pub name: String,
    pub declared: Option<TypeKey>,
    pub default: Option<Instance>,
}

impl ParameterInfo {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Neither a declared type nor a default: cannot be auto-resolved
    pub fn is_unresolvable(&self) -> bool {
        self.declared.is_none() && self.default.is_none()
    }
}

impl fmt::Debug for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterInfo")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("has_default", &self.has_default())
            .finish()
    }
}

/// Constructor reference and signature of a constructible target
#[derive(Clone)]
pub struct Descriptor {
    key: TypeKey,
    parameters: Arc<[Parameter]>,
    constructor: Constructor,
}

impl Descriptor {
    /// Describe an [`Injectable`] type
    pub fn of<T: Injectable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            parameters: T::parameters().into(),
            constructor: Arc::new(|args: &mut Arguments| {
                T::construct(args).map(|service| Arc::new(service) as Instance)
            }),
        }
    }

    /// Describe a callable. Its identity is the closure's own type, so every
    /// distinct closure is a distinct registry key.
    pub fn function<R, F>(name: &'static str, parameters: Vec<Parameter>, f: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&mut Arguments) -> DIResult<R> + Send + Sync + 'static,
    {
        Self {
            key: TypeKey::callable::<F>(name),
            parameters: parameters.into(),
            constructor: Arc::new(move |args: &mut Arguments| {
                f(args).map(|value| Arc::new(value) as Instance)
            }),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn introspect(&self) -> Vec<ParameterInfo> {
        self.parameters
            .iter()
            .map(|parameter| ParameterInfo {
                name: parameter.name.clone(),
                declared: parameter.declared.as_ref().map(Dependency::key),
                default: parameter.default.clone(),
            })
            .collect()
    }

    /// Reject parameter lists that repeat a name
    pub(crate) fn validate(&self) -> DIResult<()> {
        let mut seen = HashSet::new();
        for parameter in self.parameters.iter() {
            if !seen.insert(parameter.name.as_str()) {
                return Err(DIError::InvalidRegistration {
                    service_type: self.key.short_name(),
                    message: format!("parameter '{}' is declared twice", parameter.name),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn construct(&self, args: &mut Arguments) -> DIResult<Instance> {
        (self.constructor)(args)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("key", &self.key)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Introspect the constructor of `T`
pub fn introspect<T: Injectable>() -> Vec<ParameterInfo> {
    Descriptor::of::<T>().introspect()
}

/// Typed parameters the container has to resolve: no default and not
/// satisfied by `context`. Declaration order is preserved.
pub(crate) fn dependencies_of(parameters: &[Parameter], context: &Context) -> Vec<(String, TypeKey)> {
    parameters
        .iter()
        .filter(|parameter| !parameter.has_default() && !context.contains(&parameter.name))
        .filter_map(|parameter| {
            parameter
                .declared
                .as_ref()
                .map(|dependency| (parameter.name.clone(), dependency.key()))
        })
        .collect()
}

/// Resolved values handed to a constructor, in parameter order
pub struct Arguments {
    target: TypeKey,
    values: Vec<(String, Instance)>,
}

impl Arguments {
    pub(crate) fn new(target: TypeKey) -> Self {
        Self {
            target,
            values: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: &str, value: Instance) {
        self.values.push((name.to_string(), value));
    }

    /// Remove and downcast the argument named `name`
    pub fn take<T: Send + Sync + 'static>(&mut self, name: &str) -> DIResult<Arc<T>> {
        let position = self
            .values
            .iter()
            .position(|(candidate, _)| candidate == name)
            .ok_or_else(|| self.missing(name))?;
        let (_, value) = self.values.remove(position);
        self.downcast(name, value)
    }

    /// Remove the argument named `name` and clone the value out
    pub fn value<T: Clone + Send + Sync + 'static>(&mut self, name: &str) -> DIResult<T> {
        self.take::<T>(name).map(|value| T::clone(&value))
    }

    /// Downcast the argument named `name` without removing it
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> DIResult<Arc<T>> {
        let value = self
            .values
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| Arc::clone(value))
            .ok_or_else(|| self.missing(name))?;
        self.downcast(name, value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(candidate, _)| candidate == name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn missing(&self, name: &str) -> DIError {
        DIError::Argument {
            parameter: name.to_string(),
            target: self.target.short_name(),
            message: "no such argument".to_string(),
        }
    }

    fn downcast<T: Send + Sync + 'static>(&self, name: &str, value: Instance) -> DIResult<Arc<T>> {
        value.downcast::<T>().map_err(|_| DIError::Argument {
            parameter: name.to_string(),
            target: self.target.short_name(),
            message: format!("expected a value of type {}", TypeKey::of::<T>().short_name()),
        })
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.values.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("Arguments")
            .field("target", &self.target)
            .field("names", &names)
            .finish()
    }
}
