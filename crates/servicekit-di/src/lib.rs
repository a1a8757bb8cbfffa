//! Dependency Injection Container for ServiceKit
//!
//! This crate provides a runtime container that maps service types to their
//! construction metadata and produces instances on demand. It honors singleton
//! and transient lifetimes, auto-resolves types that were never registered, and
//! rejects invalid dependency graphs (circular references and transient
//! dependencies captured by singletons) before anything is constructed.
//!
//! ## Quick Start
//!
//! ```rust
//! use servicekit_di::{Arguments, DIContainer, DIResult, Injectable, Parameter, Scope};
//! use std::sync::Arc;
//!
//! struct Database;
//!
//! impl Injectable for Database {
//!     fn construct(_args: &mut Arguments) -> DIResult<Self> {
//!         Ok(Database)
//!     }
//! }
//!
//! struct Repository {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for Repository {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![Parameter::inject::<Database>("db")]
//!     }
//!
//!     fn construct(args: &mut Arguments) -> DIResult<Self> {
//!         Ok(Repository { db: args.take("db")? })
//!     }
//! }
//!
//! let container = DIContainer::new();
//! container.register::<Database>(Scope::Singleton).unwrap();
//!
//! let first = container.resolve::<Repository>().unwrap();
//! let second = container.resolve::<Repository>().unwrap();
//! assert!(Arc::ptr_eq(&first.db, &second.db));
//! ```
//!
//! See [`usage`] module for detailed usage examples.

pub mod adapter;
pub mod config;
pub mod container;
pub mod context;
pub mod entry;
pub mod injectable;
pub mod key;
pub mod scope;
pub mod signature;
pub mod usage;

pub use adapter::{
    from_fn, ContextAdapter, FnAdapter, NullAdapter, RequestContextAdapter, RequestResolver,
    Target,
};
pub use config::{ContainerOptions, ContextScopePolicy};
pub use container::{DIContainer, DIContainerBuilder};
pub use context::{Context, Instance, REQUEST_KEY};
pub use entry::{EntryOrigin, EntryState, RegistryEntry};
pub use injectable::{declared, DeclaredMetadata, Declaration, Injectable};
pub use key::TypeKey;
pub use scope::Scope;
pub use signature::{introspect, Arguments, Dependency, Descriptor, Parameter, ParameterInfo};

#[doc(hidden)]
pub use inventory;

/// Errors that can occur during dependency injection operations
///
/// Resolution failures nest: a failure deep in the dependency tree is wrapped
/// in [`DIError::Parameter`] once per level, so the rendered message reads as
/// a trail from the requested type down to the failing parameter.
#[derive(Debug, thiserror::Error)]
pub enum DIError {
    #[error("Service already registered: {service_type}")]
    ServiceAlreadyRegistered { service_type: String },

    #[error("Invalid service registration for {service_type}: {message}")]
    InvalidRegistration {
        service_type: String,
        message: String,
    },

    #[error("Cannot resolve dependency for parameter '{parameter}' in {target}: type hint is missing")]
    MissingTypeInformation { parameter: String, target: String },

    #[error("Cannot auto-resolve non-constructible type: {type_name}")]
    NonConstructible { type_name: String },

    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("Cannot inject non-singleton-scoped dependency '{dependency}' into singleton-scoped '{consumer}'")]
    ScopeViolation {
        consumer: String,
        parameter: String,
        dependency: String,
    },

    #[error("Cannot resolve dependency for parameter '{parameter}' in {target}: {source}")]
    Parameter {
        parameter: String,
        target: String,
        #[source]
        source: Box<DIError>,
    },

    #[error("Invalid argument '{parameter}' for {target}: {message}")]
    Argument {
        parameter: String,
        target: String,
        message: String,
    },

    #[error("Failed to construct {target}: {message}")]
    Construction { target: String, message: String },

    #[error("Service type mismatch: expected {expected}")]
    TypeMismatch { expected: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type DIResult<T> = Result<T, DIError>;

impl DIError {
    /// Create a construction failure for `T`, for use inside [`Injectable::construct`]
    pub fn construction<T: 'static>(reason: impl std::fmt::Display) -> Self {
        DIError::Construction {
            target: TypeKey::of::<T>().short_name(),
            message: reason.to_string(),
        }
    }

    pub(crate) fn parameter(parameter: &str, target: &TypeKey, source: DIError) -> Self {
        DIError::Parameter {
            parameter: parameter.to_string(),
            target: target.short_name(),
            source: Box::new(source),
        }
    }

    /// The innermost error, with every [`DIError::Parameter`] layer removed
    pub fn root_cause(&self) -> &DIError {
        let mut current = self;
        while let DIError::Parameter { source, .. } = current {
            current = source;
        }
        current
    }

    /// `Type.parameter` pairs from the requested type down to the failure
    pub fn breadcrumbs(&self) -> Vec<String> {
        let mut trail = Vec::new();
        let mut current = self;
        while let DIError::Parameter {
            parameter,
            target,
            source,
        } = current
        {
            trail.push(format!("{}.{}", target, parameter));
            current = source;
        }
        trail
    }

    pub fn is_circular(&self) -> bool {
        matches!(self.root_cause(), DIError::CircularDependency { .. })
    }

    pub fn is_scope_violation(&self) -> bool {
        matches!(self.root_cause(), DIError::ScopeViolation { .. })
    }
}

/// Mark a type as injectable at declaration time.
///
/// The declaration is collected into a process-wide catalog that every
/// [`DIContainer`] consults for types it has not seen yet. Containers copy the
/// precomputed metadata into their own registry, so singleton instances are
/// never shared between containers.
///
/// ```rust,ignore
/// servicekit_di::injectable!(Database, servicekit_di::Scope::Singleton);
/// servicekit_di::injectable!(RequestLog); // transient
/// ```
#[macro_export]
macro_rules! injectable {
    ($service_type:ty) => {
        $crate::injectable!($service_type, $crate::Scope::Transient);
    };
    ($service_type:ty, $scope:expr) => {
        $crate::inventory::submit! {
            $crate::Declaration::new::<$service_type>($scope)
        }
    };
}

/// Convenience macro for resolving services
#[macro_export]
macro_rules! resolve_service {
    ($container:expr, $service_type:ty) => {
        $container.resolve::<$service_type>()
    };
}
