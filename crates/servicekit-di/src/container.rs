//! The dependency injection container
//!
//! All container state lives behind a single reentrant lock. A top-level call
//! takes the lock once; the recursion re-enters it on the same thread, so
//! constructors and adapters may call back into the container.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, info, trace};

use crate::adapter::{ContextAdapter, NullAdapter, Target};
use crate::config::{ContainerOptions, ContextScopePolicy};
use crate::context::{Context, Instance};
use crate::entry::{EntryOrigin, EntryState, RegistryEntry};
use crate::injectable::{declared, DeclaredMetadata, Injectable};
use crate::key::TypeKey;
use crate::scope::Scope;
use crate::signature::{dependencies_of, Arguments, Descriptor, Parameter};
use crate::{DIError, DIResult};

#[derive(Default)]
struct ResolverState {
    registry: HashMap<TypeKey, Arc<RegistryEntry>>,
    /// Types under construction on the current call stack, outermost first
    in_flight: Vec<TypeKey>,
    /// Entries added by resolution since the outermost call began
    added: Vec<TypeKey>,
}

/// Marks a type as in flight until dropped
struct InFlightGuard<'a> {
    state: &'a RefCell<ResolverState>,
    key: TypeKey,
}

impl<'a> InFlightGuard<'a> {
    fn enter(state: &'a RefCell<ResolverState>, key: TypeKey) -> DIResult<Self> {
        let mut inner = state.borrow_mut();
        if inner.in_flight.contains(&key) {
            let mut chain: Vec<String> = inner.in_flight.iter().map(TypeKey::short_name).collect();
            chain.push(key.short_name());
            return Err(DIError::CircularDependency { chain });
        }
        inner.in_flight.push(key);
        Ok(Self { state, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.state.try_borrow_mut() {
            if let Some(position) = inner.in_flight.iter().rposition(|key| *key == self.key) {
                inner.in_flight.remove(position);
            }
        }
    }
}

/// Dependency injection container
pub struct DIContainer {
    state: ReentrantMutex<RefCell<ResolverState>>,
    adapter: Arc<dyn ContextAdapter>,
    options: ContainerOptions,
}

impl DIContainer {
    /// Create a new empty DI container
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(ResolverState::default())),
            adapter: Arc::new(NullAdapter),
            options,
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    /// Register `T` with an explicit scope
    pub fn register<T: Injectable>(&self, scope: Scope) -> DIResult<()> {
        self.insert_registered(Descriptor::of::<T>(), scope)
    }

    /// Register a singleton service
    pub fn register_singleton<T: Injectable>(&self) -> DIResult<()> {
        self.register::<T>(Scope::Singleton)
    }

    /// Register a transient service (new instance each time)
    pub fn register_transient<T: Injectable>(&self) -> DIResult<()> {
        self.register::<T>(Scope::Transient)
    }

    /// Register a callable; resolve it with [`DIContainer::call`]
    pub fn register_factory(&self, descriptor: Descriptor, scope: Scope) -> DIResult<()> {
        self.insert_registered(descriptor, scope)
    }

    fn insert_registered(&self, descriptor: Descriptor, scope: Scope) -> DIResult<()> {
        descriptor.validate()?;
        let key = descriptor.key();

        let guard = self.state.lock();
        let mut inner = guard.borrow_mut();
        if let Some(existing) = inner.registry.get(&key) {
            // An auto-resolved entry is derived state and gives way to an explicit registration
            if existing.origin() != EntryOrigin::Inferred {
                return Err(DIError::ServiceAlreadyRegistered {
                    service_type: key.short_name(),
                });
            }
        }
        inner
            .registry
            .insert(key, Arc::new(RegistryEntry::registered(descriptor, scope)));
        inner.added.retain(|added| *added != key);

        debug!("Registered {} service: {}", scope, key.type_name());
        Ok(())
    }

    /// Resolve a service
    pub fn resolve<T: Injectable>(&self) -> DIResult<Arc<T>> {
        self.resolve_with::<T>(&Context::new())
    }

    /// Resolve a service, preferring values from `context` for any constructor
    /// parameter of the same name along the whole dependency tree
    pub fn resolve_with<T: Injectable>(&self, context: &Context) -> DIResult<Arc<T>> {
        let guard = self.state.lock();
        let instance = self.resolve_root(
            &guard,
            TypeKey::of::<T>(),
            || Some(Descriptor::of::<T>()),
            context,
        )?;
        downcast::<T>(instance)
    }

    /// Resolve whatever is known under `key`: a registration or a declaration.
    ///
    /// Without either, the key has no constructor to auto-resolve with.
    pub fn resolve_by_key(&self, key: TypeKey, context: &Context) -> DIResult<Instance> {
        let guard = self.state.lock();
        self.resolve_root(&guard, key, || None, context)
    }

    /// Invoke a callable with its parameters resolved by the container
    pub fn call<R: Send + Sync + 'static>(
        &self,
        descriptor: &Descriptor,
        context: &Context,
    ) -> DIResult<Arc<R>> {
        let guard = self.state.lock();
        let instance = self.resolve_root(
            &guard,
            descriptor.key(),
            || Some(descriptor.clone()),
            context,
        )?;
        downcast::<R>(instance)
    }

    /// Validate the graph below `key`, resolve it, and drop the entries this
    /// call added if it failed
    fn resolve_root(
        &self,
        state: &RefCell<ResolverState>,
        key: TypeKey,
        describe: impl Fn() -> Option<Descriptor>,
        supplied: &Context,
    ) -> DIResult<Instance> {
        let mark = state.borrow().added.len();
        let mut visited = HashSet::new();
        let result = self
            .validate_graph(state, key, &describe, supplied, false, &mut visited)
            .and_then(|()| self.resolve_key(state, key, describe, supplied));

        let mut inner = state.borrow_mut();
        if result.is_err() {
            let start = mark.min(inner.added.len());
            let added: Vec<TypeKey> = inner.added.drain(start..).collect();
            for key in &added {
                inner.registry.remove(key);
            }
            if !added.is_empty() {
                debug!("Dropped {} entries left by a failed resolution", added.len());
            }
        } else if inner.in_flight.is_empty() {
            inner.added.clear();
        }
        result
    }

    fn resolve_key(
        &self,
        state: &RefCell<ResolverState>,
        key: TypeKey,
        describe: impl FnOnce() -> Option<Descriptor>,
        supplied: &Context,
    ) -> DIResult<Instance> {
        let _guard = InFlightGuard::enter(state, key)?;

        let existing = state.borrow().registry.get(&key).cloned();
        if let Some(entry) = existing {
            return self.instantiate(state, &entry, supplied);
        }

        if let Some(entry) = self.promote(state, key) {
            return self.instantiate(state, &entry, supplied);
        }

        let descriptor = describe().ok_or_else(|| DIError::NonConstructible {
            type_name: key.short_name(),
        })?;
        self.auto_resolve(state, descriptor, supplied)
    }

    /// The declaration owned by exactly `key`, if declarations are in use
    fn declaration(&self, key: &TypeKey) -> Option<&'static DeclaredMetadata> {
        if !self.options.use_declarations {
            return None;
        }
        declared(key).filter(|metadata| metadata.owned_by() == *key)
    }

    /// Copy a declaration into this container's registry
    fn promote(&self, state: &RefCell<ResolverState>, key: TypeKey) -> Option<Arc<RegistryEntry>> {
        let metadata = self.declaration(&key)?;
        let entry = Arc::new(RegistryEntry::declared(metadata));
        debug!("Promoted declared {} service: {}", metadata.scope(), key.type_name());
        Some(self.add_entry(state, key, entry))
    }

    /// Insert an entry unless one already exists, and remember it was added
    fn add_entry(
        &self,
        state: &RefCell<ResolverState>,
        key: TypeKey,
        entry: Arc<RegistryEntry>,
    ) -> Arc<RegistryEntry> {
        let mut inner = state.borrow_mut();
        if let Some(existing) = inner.registry.get(&key) {
            return Arc::clone(existing);
        }
        inner.registry.insert(key, Arc::clone(&entry));
        inner.added.push(key);
        entry
    }

    fn instantiate(
        &self,
        state: &RefCell<ResolverState>,
        entry: &Arc<RegistryEntry>,
        supplied: &Context,
    ) -> DIResult<Instance> {
        if let Some(instance) = entry.cached_instance() {
            trace!("Reusing cached instance of {}", entry.key());
            return Ok(Arc::clone(instance));
        }

        let descriptor = entry.descriptor();
        let context = self.context_for(entry.key(), descriptor.parameters(), supplied);
        if entry.caches_instance() {
            self.check_singleton_parameters(state, entry.key(), descriptor, &context)?;
        }

        let mut args = self.collect_arguments(state, descriptor, &context, supplied)?;
        let instance = descriptor.construct(&mut args)?;
        entry.record_instantiation();

        if entry.caches_instance() {
            Ok(entry.store(instance))
        } else {
            Ok(instance)
        }
    }

    /// Build an entry for a type nobody registered or declared
    fn auto_resolve(
        &self,
        state: &RefCell<ResolverState>,
        descriptor: Descriptor,
        supplied: &Context,
    ) -> DIResult<Instance> {
        let key = descriptor.key();
        let context = self.context_for(key, descriptor.parameters(), supplied);
        let mut args = self.collect_arguments(state, &descriptor, &context, supplied)?;

        let scope = self.inferred_scope(state, &descriptor, &mut HashSet::new());
        let dependencies = dependencies_of(descriptor.parameters(), &context);

        let instance = descriptor.construct(&mut args)?;

        let entry = Arc::new(RegistryEntry::inferred(descriptor, scope, dependencies));
        let entry = self.add_entry(state, key, entry);
        entry.record_instantiation();

        debug!("Auto-resolved {} as {}", key.type_name(), scope);
        Ok(instance)
    }

    /// The caller's bag overlaid by whatever the adapter supplies for this constructor
    fn context_for(&self, key: TypeKey, parameters: &[Parameter], supplied: &Context) -> Context {
        let mut context = supplied.clone();
        let target = Target::new(key, parameters, supplied);
        match self.adapter.get_context(&target) {
            Ok(extra) => context.extend(extra),
            Err(e) => debug!("Context adapter gave no context for {}: {:#}", key, e),
        }
        context
    }

    /// Produce one argument per parameter
    fn collect_arguments(
        &self,
        state: &RefCell<ResolverState>,
        descriptor: &Descriptor,
        context: &Context,
        supplied: &Context,
    ) -> DIResult<Arguments> {
        let key = descriptor.key();
        let mut args = Arguments::new(key);

        for parameter in descriptor.parameters() {
            let name = parameter.name();
            if let Some(value) = context.get(name) {
                args.push(name, Arc::clone(value));
                continue;
            }
            if let Some(default) = parameter.default_value() {
                args.push(name, Arc::clone(default));
                continue;
            }
            let Some(dependency) = parameter.declared() else {
                return Err(DIError::MissingTypeInformation {
                    parameter: name.to_string(),
                    target: key.short_name(),
                });
            };

            let instance = self
                .resolve_key(state, dependency.key(), || dependency.describe(), supplied)
                .map_err(|e| DIError::parameter(name, &key, e))?;
            args.push(name, instance);
        }

        Ok(args)
    }

    /// Walk everything below `key` that a resolution would construct, and
    /// reject any unbuilt caching singleton that depends on a non-singleton.
    ///
    /// Nodes are checked against the caller's bag only; `key` itself is
    /// checked again with the adapter's output when it is instantiated.
    fn validate_graph(
        &self,
        state: &RefCell<ResolverState>,
        key: TypeKey,
        describe: &dyn Fn() -> Option<Descriptor>,
        supplied: &Context,
        check_self: bool,
        visited: &mut HashSet<TypeKey>,
    ) -> DIResult<()> {
        // Cycles are reported by the resolution itself
        if !visited.insert(key) || state.borrow().in_flight.contains(&key) {
            return Ok(());
        }

        let existing = state.borrow().registry.get(&key).cloned();
        let (descriptor, caches) = match existing {
            Some(entry) if entry.cached_instance().is_some() => return Ok(()),
            Some(entry) => (entry.descriptor().clone(), entry.caches_instance()),
            None => match self.declaration(&key) {
                Some(metadata) => (metadata.descriptor().clone(), metadata.scope().is_singleton()),
                None => match describe() {
                    Some(descriptor) => (descriptor, false),
                    None => return Ok(()),
                },
            },
        };

        if caches && check_self {
            self.check_singleton_parameters(state, key, &descriptor, supplied)?;
        }

        for parameter in descriptor.parameters() {
            if parameter.has_default() || supplied.contains(parameter.name()) {
                continue;
            }
            let Some(dependency) = parameter.declared() else {
                continue;
            };
            self.validate_graph(
                state,
                dependency.key(),
                &|| dependency.describe(),
                supplied,
                true,
                visited,
            )
            .map_err(|e| DIError::parameter(parameter.name(), &key, e))?;
        }
        Ok(())
    }

    /// Reject a singleton consumer whose dependencies are not singletons
    fn check_singleton_parameters(
        &self,
        state: &RefCell<ResolverState>,
        consumer: TypeKey,
        descriptor: &Descriptor,
        context: &Context,
    ) -> DIResult<()> {
        for parameter in descriptor.parameters() {
            let Some(dependency) = parameter.declared() else {
                continue;
            };
            let violation = || DIError::ScopeViolation {
                consumer: consumer.short_name(),
                parameter: parameter.name().to_string(),
                dependency: dependency.key().short_name(),
            };

            if context.contains(parameter.name()) {
                if self.options.context_scope_policy == ContextScopePolicy::Strict {
                    return Err(violation());
                }
                continue;
            }
            if parameter.has_default() {
                continue;
            }

            let scope = self.scope_of(
                state,
                dependency.key(),
                dependency.describe(),
                &mut HashSet::new(),
            );
            if !Scope::Singleton.admits(scope) {
                return Err(violation());
            }
        }
        Ok(())
    }

    /// The scope `key` resolves to, determined without constructing anything.
    ///
    /// Auto-resolved entries are walked again every time, since a later
    /// registration can change what their dependencies resolve to.
    fn scope_of(
        &self,
        state: &RefCell<ResolverState>,
        key: TypeKey,
        describe: Option<Descriptor>,
        visiting: &mut HashSet<TypeKey>,
    ) -> Scope {
        let existing = state.borrow().registry.get(&key).cloned();
        let descriptor = match existing {
            Some(entry) if entry.origin() != EntryOrigin::Inferred => return entry.scope(),
            Some(entry) => entry.descriptor().clone(),
            None => {
                if let Some(metadata) = self.declaration(&key) {
                    return metadata.scope();
                }
                match describe {
                    Some(descriptor) => descriptor,
                    // Only a caller can supply it
                    None => return Scope::Singleton,
                }
            }
        };
        self.inferred_scope(state, &descriptor, visiting)
    }

    /// Singleton when every dependency the constructor declares, whether or
    /// not a context supplies it, resolves to a singleton
    fn inferred_scope(
        &self,
        state: &RefCell<ResolverState>,
        descriptor: &Descriptor,
        visiting: &mut HashSet<TypeKey>,
    ) -> Scope {
        if !self.options.infer_singleton_eligibility {
            return Scope::Transient;
        }
        if !visiting.insert(descriptor.key()) {
            return Scope::Singleton;
        }

        let mut scope = Scope::Singleton;
        for parameter in descriptor.parameters() {
            if parameter.has_default() {
                continue;
            }
            let Some(dependency) = parameter.declared() else {
                continue;
            };
            scope = scope.widen(self.scope_of(state, dependency.key(), dependency.describe(), visiting));
            if !scope.is_singleton() {
                break;
            }
        }
        scope
    }

    /// Registry entry for `T`, or the unpromoted declaration
    pub fn get_metadata<T: 'static>(&self) -> Option<Arc<RegistryEntry>> {
        self.get_metadata_by_key(&TypeKey::of::<T>())
    }

    pub fn get_metadata_by_key(&self, key: &TypeKey) -> Option<Arc<RegistryEntry>> {
        let guard = self.state.lock();
        let existing = guard.borrow().registry.get(key).cloned();
        existing.or_else(|| {
            self.declaration(key)
                .map(|metadata| Arc::new(RegistryEntry::declared(metadata)))
        })
    }

    /// Check if a service is registered
    pub fn is_registered<T: 'static>(&self) -> bool {
        let guard = self.state.lock();
        let registered = guard.borrow().registry.contains_key(&TypeKey::of::<T>());
        registered
    }

    /// Get the number of registered services
    pub fn service_count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard.borrow().registry.len();
        count
    }

    /// Number of singleton instances currently cached
    pub fn singleton_count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard
            .borrow()
            .registry
            .values()
            .filter(|entry| entry.cached_instance().is_some())
            .count();
        count
    }

    pub fn state_of<T: 'static>(&self) -> EntryState {
        let guard = self.state.lock();
        let state = guard
            .borrow()
            .registry
            .get(&TypeKey::of::<T>())
            .map(|entry| entry.state())
            .unwrap_or(EntryState::Unseen);
        state
    }

    /// Types under construction on the calling thread's resolution stack
    pub fn in_flight(&self) -> Vec<TypeKey> {
        let guard = self.state.lock();
        let in_flight = guard.borrow().in_flight.clone();
        in_flight
    }

    /// Clear all services, cached instances and in-flight state
    pub fn clear(&self) {
        let guard = self.state.lock();
        let mut inner = guard.borrow_mut();
        let services = inner.registry.len();
        inner.registry.clear();
        inner.in_flight.clear();
        inner.added.clear();
        info!("Cleared {} services from DI container", services);
    }

    /// Factory for a web framework's dependency hook.
    ///
    /// Each call forwards the live request (if any) under
    /// [`REQUEST_KEY`](crate::REQUEST_KEY) and resolves `T`.
    pub fn request_factory<T, R>(
        self: &Arc<Self>,
    ) -> impl Fn(Option<Arc<R>>) -> DIResult<Arc<T>> + Send + Sync + 'static
    where
        T: Injectable,
        R: Send + Sync + 'static,
    {
        let container = Arc::clone(self);
        move |request| {
            let context = match request {
                Some(request) => Context::with_request(request),
                None => Context::new(),
            };
            container.resolve_with::<T>(&context)
        }
    }
}

fn downcast<T: Send + Sync + 'static>(instance: Instance) -> DIResult<Arc<T>> {
    instance.downcast::<T>().map_err(|_| DIError::TypeMismatch {
        expected: TypeKey::of::<T>().short_name(),
    })
}

impl Default for DIContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DIContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DIContainer")
            .field("services", &self.service_count())
            .field("options", &self.options)
            .finish()
    }
}

/// Builder pattern for configuring the DI container
pub struct DIContainerBuilder {
    container: DIContainer,
}

impl DIContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            container: DIContainer::new(),
        }
    }

    pub fn options(mut self, options: ContainerOptions) -> Self {
        self.container.options = options;
        self
    }

    /// Install the external context adapter
    pub fn adapter<A: ContextAdapter + 'static>(mut self, adapter: A) -> Self {
        self.container.adapter = Arc::new(adapter);
        self
    }

    /// Register a service
    pub fn register<T: Injectable>(self, scope: Scope) -> DIResult<Self> {
        self.container.register::<T>(scope)?;
        Ok(self)
    }

    pub fn register_factory(self, descriptor: Descriptor, scope: Scope) -> DIResult<Self> {
        self.container.register_factory(descriptor, scope)?;
        Ok(self)
    }

    /// Build the container
    pub fn build(self) -> DIContainer {
        self.container
    }
}

impl Default for DIContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
