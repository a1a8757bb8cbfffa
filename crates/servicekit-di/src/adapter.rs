//! External context adapters
//!
//! An adapter supplies pre-resolved parameter values for a constructor before
//! the container falls back to type-based resolution. The container consults
//! the adapter once per constructor it is about to call. Adapter failures are
//! never fatal: an `Err` is logged and treated as "no context available".
//!
//! ## Request-aware adapters
//!
//! Web integrations forward their live request object under
//! [`REQUEST_KEY`](crate::REQUEST_KEY). A [`RequestContextAdapter`] picks it up
//! and asks a [`RequestResolver`] to turn framework-native parameter
//! declarations (path, query, header, body extractors) into plain values. The
//! resolver is async; the adapter drives it to completion before returning, so
//! resolution stays synchronous end to end.
//!
//! ```rust,ignore
//! struct PathParams;
//!
//! #[async_trait]
//! impl RequestResolver<HttpRequest> for PathParams {
//!     async fn resolve(&self, request: &HttpRequest, target: &Target<'_>) -> anyhow::Result<Context> {
//!         let mut context = Context::new();
//!         for parameter in target.parameters() {
//!             if let Some(value) = request.path_param(parameter.name()) {
//!                 context.insert(parameter.name(), value.to_string());
//!             }
//!         }
//!         Ok(context)
//!     }
//! }
//!
//! let container = DIContainerBuilder::new()
//!     .adapter(RequestContextAdapter::new(PathParams))
//!     .build();
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::context::Context;
use crate::key::TypeKey;
use crate::signature::Parameter;

/// The constructor an adapter is asked about
pub struct Target<'a> {
    key: TypeKey,
    parameters: &'a [Parameter],
    supplied: &'a Context,
}

impl<'a> Target<'a> {
    pub(crate) fn new(key: TypeKey, parameters: &'a [Parameter], supplied: &'a Context) -> Self {
        Self {
            key,
            parameters,
            supplied,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn name(&self) -> String {
        self.key.short_name()
    }

    pub fn parameters(&self) -> &'a [Parameter] {
        self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&'a Parameter> {
        self.parameters.iter().find(|parameter| parameter.name() == name)
    }

    /// The additional-context bag the caller passed to `resolve_with`
    pub fn supplied(&self) -> &'a Context {
        self.supplied
    }

    pub fn request<R: Send + Sync + 'static>(&self) -> Option<Arc<R>> {
        self.supplied.request::<R>()
    }
}

/// Pluggable source of pre-resolved parameter values
pub trait ContextAdapter: Send + Sync {
    /// Values keyed by parameter name for the constructor described by `target`
    fn get_context(&self, target: &Target<'_>) -> anyhow::Result<Context>;
}

/// Adapter that never supplies anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAdapter;

impl ContextAdapter for NullAdapter {
    fn get_context(&self, _target: &Target<'_>) -> anyhow::Result<Context> {
        Ok(Context::new())
    }
}

/// Adapter backed by a closure, see [`from_fn`]
pub struct FnAdapter<F> {
    f: F,
}

impl<F> ContextAdapter for FnAdapter<F>
where
    F: Fn(&Target<'_>) -> anyhow::Result<Context> + Send + Sync,
{
    fn get_context(&self, target: &Target<'_>) -> anyhow::Result<Context> {
        (self.f)(target)
    }
}

/// Build an adapter from a closure
pub fn from_fn<F>(f: F) -> FnAdapter<F>
where
    F: Fn(&Target<'_>) -> anyhow::Result<Context> + Send + Sync,
{
    FnAdapter { f }
}

/// Framework hook that extracts parameter values from a request of type `R`
#[async_trait]
pub trait RequestResolver<R>: Send + Sync
where
    R: Send + Sync + 'static,
{
    async fn resolve(&self, request: &R, target: &Target<'_>) -> anyhow::Result<Context>;
}

/// Adapter that consults a [`RequestResolver`] when the caller forwarded a
/// request of type `R` under [`REQUEST_KEY`](crate::REQUEST_KEY).
///
/// Without a request it supplies nothing. Resolver errors and panics are
/// reported as errors, which the container treats as an empty context.
pub struct RequestContextAdapter<R, S> {
    resolver: S,
    _request: PhantomData<fn() -> R>,
}

impl<R, S> RequestContextAdapter<R, S>
where
    R: Send + Sync + 'static,
    S: RequestResolver<R>,
{
    pub fn new(resolver: S) -> Self {
        Self {
            resolver,
            _request: PhantomData,
        }
    }
}

impl<R, S> ContextAdapter for RequestContextAdapter<R, S>
where
    R: Send + Sync + 'static,
    S: RequestResolver<R>,
{
    fn get_context(&self, target: &Target<'_>) -> anyhow::Result<Context> {
        let Some(request) = target.request::<R>() else {
            return Ok(Context::new());
        };
        run_to_completion(self.resolver.resolve(&request, target))
    }
}

/// Drive `future` on a dedicated thread with its own runtime.
///
/// Works whether or not the caller is already inside a tokio runtime.
fn run_to_completion<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>> + Send,
    T: Send,
{
    std::thread::scope(|scope| {
        scope
            .spawn(move || -> anyhow::Result<T> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(future)
            })
            .join()
            .map_err(|_| anyhow!("request resolver panicked"))?
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter;

    fn target_for<'a>(parameters: &'a [Parameter], supplied: &'a Context) -> Target<'a> {
        Target::new(TypeKey::of::<Greeter>(), parameters, supplied)
    }

    #[test]
    fn test_null_adapter_is_empty() {
        let supplied = Context::new();
        let target = target_for(&[], &supplied);
        assert!(NullAdapter.get_context(&target).unwrap().is_empty());
    }

    #[test]
    fn test_fn_adapter() {
        let adapter = from_fn(|target: &Target<'_>| {
            let mut context = Context::new();
            for parameter in target.parameters() {
                context.insert(parameter.name(), target.name());
            }
            Ok(context)
        });

        let parameters = vec![Parameter::untyped("who")];
        let supplied = Context::new();
        let context = adapter.get_context(&target_for(&parameters, &supplied)).unwrap();
        assert_eq!(context.get_as::<String>("who").as_deref().map(String::as_str), Some("Greeter"));
    }

    #[test]
    fn test_run_to_completion_reports_panics() {
        let result: anyhow::Result<()> = run_to_completion(async { panic!("boom") });
        assert!(result.is_err());

        let value = run_to_completion(async { Ok(7u8) }).unwrap();
        assert_eq!(value, 7);
    }
}
