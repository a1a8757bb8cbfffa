//! # ServiceKit DI Container Usage Guide
//!
//! The container builds object graphs on demand. Types describe their own
//! constructors by implementing [`Injectable`](crate::Injectable); the container
//! resolves each declared parameter, caches singletons and rejects graphs that
//! are circular or that would freeze a transient inside a singleton.
//!
//! ## Describing a Type
//!
//! ```rust,ignore
//! use servicekit_di::{Arguments, DIResult, Injectable, Parameter};
//! use std::sync::Arc;
//!
//! struct Cache {
//!     db: Arc<Database>,
//!     ttl_secs: u64,
//! }
//!
//! impl Injectable for Cache {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![
//!             Parameter::inject::<Database>("db"),
//!             Parameter::value::<u64>("ttl_secs").with_default(60u64),
//!         ]
//!     }
//!
//!     fn construct(args: &mut Arguments) -> DIResult<Self> {
//!         Ok(Cache {
//!             db: args.take("db")?,
//!             ttl_secs: args.value("ttl_secs")?,
//!         })
//!     }
//! }
//! ```
//!
//! Parameter kinds:
//! - `Parameter::inject::<T>` - resolved from the container as `T`
//! - `Parameter::value::<T>` - typed, but must come from a default or the context
//! - `Parameter::untyped` - no type; fails without a default or context value
//!
//! ## Registration
//!
//! ```rust,ignore
//! use servicekit_di::{DIContainer, Scope};
//!
//! let container = DIContainer::new();
//! container.register::<Database>(Scope::Singleton)?;
//! container.register_transient::<Cache>()?;
//!
//! let cache = container.resolve::<Cache>()?;
//! ```
//!
//! Types that were never registered are auto-resolved. An auto-resolved type
//! whose dependencies are all singletons may itself be injected into
//! singletons; it is still constructed on every resolution.
//!
//! ## Declaration-time Marking
//!
//! ```rust,ignore
//! servicekit_di::injectable!(Database, servicekit_di::Scope::Singleton);
//! ```
//!
//! Every container picks up the declaration the first time it meets the type
//! and keeps its own copy, so singletons are never shared across containers.
//!
//! ## Additional Context
//!
//! ```rust,ignore
//! use servicekit_di::Context;
//!
//! let context = Context::new().with("ttl_secs", 5u64);
//! let cache = container.resolve_with::<Cache>(&context)?;
//! assert_eq!(cache.ttl_secs, 5);
//! ```
//!
//! Context values win over defaults and over type-based resolution, for every
//! constructor along the dependency tree.
//!
//! ## Callables
//!
//! ```rust,ignore
//! use servicekit_di::{Context, Descriptor, Parameter};
//!
//! let greet = Descriptor::function(
//!     "greet",
//!     vec![
//!         Parameter::inject::<Database>("db"),
//!         Parameter::untyped("name").with_default(String::from("world")),
//!     ],
//!     |args| Ok(format!("hello {}", args.value::<String>("name")?)),
//! );
//!
//! let message = container.call::<String>(&greet, &Context::new())?;
//! ```
//!
//! ## Web Framework Integration
//!
//! ```rust,ignore
//! use servicekit_di::{DIContainerBuilder, RequestContextAdapter};
//! use std::sync::Arc;
//!
//! let container = Arc::new(
//!     DIContainerBuilder::new()
//!         .adapter(RequestContextAdapter::new(PathParams))
//!         .register::<Database>(Scope::Singleton)?
//!         .build(),
//! );
//!
//! let handler_factory = container.request_factory::<HashHandler, HttpRequest>();
//! let handler = handler_factory(Some(Arc::new(request)))?;
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! # servicekit.toml
//! context_scope_policy = "strict"
//! infer_singleton_eligibility = true
//! use_declarations = true
//! ```
//!
//! ```rust,ignore
//! use servicekit_di::{ContainerOptions, DIContainer};
//!
//! let container = DIContainer::with_options(ContainerOptions::load("servicekit.toml")?);
//! ```
//!
//! ## Errors
//!
//! Failures deep in the graph are wrapped once per level:
//!
//! ```text
//! Cannot resolve dependency for parameter 'b' in ServiceA: Cannot resolve dependency
//! for parameter 'a' in ServiceB: Circular dependency detected: ServiceA -> ServiceB -> ServiceA
//! ```
//!
//! Use [`DIError::root_cause`](crate::DIError::root_cause) and
//! [`DIError::breadcrumbs`](crate::DIError::breadcrumbs) to inspect them.
