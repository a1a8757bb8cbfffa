//! Registry entries: per-type resolution metadata owned by one container

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::context::{Context, Instance};
use crate::injectable::DeclaredMetadata;
use crate::key::TypeKey;
use crate::scope::Scope;
use crate::signature::{dependencies_of, Descriptor};

/// How an entry came into the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// `DIContainer::register` and friends
    Registered,
    /// Promoted from an `injectable!` declaration
    Declared,
    /// Built by auto-resolution; the scope is inferred from the dependencies
    Inferred,
}

/// Lifecycle state of a type within one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Unseen,
    Registered,
    /// At least one instance has been produced
    Instantiated,
}

/// Resolution metadata for one type
pub struct RegistryEntry {
    key: TypeKey,
    scope: Scope,
    origin: EntryOrigin,
    dependencies: Vec<(String, TypeKey)>,
    descriptor: Descriptor,
    instance: OnceLock<Instance>,
    instantiations: AtomicUsize,
}

impl RegistryEntry {
    pub(crate) fn registered(descriptor: Descriptor, scope: Scope) -> Self {
        let dependencies = dependencies_of(descriptor.parameters(), &Context::new());
        Self::build(descriptor, scope, EntryOrigin::Registered, dependencies)
    }

    pub(crate) fn declared(metadata: &DeclaredMetadata) -> Self {
        Self::build(
            metadata.descriptor().clone(),
            metadata.scope(),
            EntryOrigin::Declared,
            metadata.dependencies().to_vec(),
        )
    }

    pub(crate) fn inferred(
        descriptor: Descriptor,
        scope: Scope,
        dependencies: Vec<(String, TypeKey)>,
    ) -> Self {
        Self::build(descriptor, scope, EntryOrigin::Inferred, dependencies)
    }

    fn build(
        descriptor: Descriptor,
        scope: Scope,
        origin: EntryOrigin,
        dependencies: Vec<(String, TypeKey)>,
    ) -> Self {
        Self {
            key: descriptor.key(),
            scope,
            origin,
            dependencies,
            descriptor,
            instance: OnceLock::new(),
            instantiations: AtomicUsize::new(0),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Scope used for the singleton-injection check
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn origin(&self) -> EntryOrigin {
        self.origin
    }

    /// Parameters resolved through the container, by name, in declaration order
    pub fn dependencies(&self) -> &[(String, TypeKey)] {
        &self.dependencies
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Whether resolutions share one instance.
    ///
    /// Auto-resolved entries are singleton-*eligible* when every dependency is
    /// a singleton, but they are still built fresh on each resolution.
    pub fn caches_instance(&self) -> bool {
        self.scope.is_singleton() && self.origin != EntryOrigin::Inferred
    }

    pub fn cached_instance(&self) -> Option<&Instance> {
        self.instance.get()
    }

    pub fn instantiation_count(&self) -> usize {
        self.instantiations.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> EntryState {
        if self.instantiation_count() > 0 {
            EntryState::Instantiated
        } else {
            EntryState::Registered
        }
    }

    pub(crate) fn record_instantiation(&self) {
        self.instantiations.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache `instance`; an already cached instance is never replaced
    pub(crate) fn store(&self, instance: Instance) -> Instance {
        let cached = self.instance.get_or_init(|| instance);
        Arc::clone(cached)
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("origin", &self.origin)
            .field("dependencies", &self.dependencies)
            .field("cached", &self.instance.get().is_some())
            .field("instantiations", &self.instantiation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Arguments, Parameter};
    use crate::{DIResult, Injectable};

    struct Pool;

    impl Injectable for Pool {
        fn construct(_args: &mut Arguments) -> DIResult<Self> {
            Ok(Pool)
        }
    }

    struct Handler;

    impl Injectable for Handler {
        fn parameters() -> Vec<Parameter> {
            vec![
                Parameter::inject::<Pool>("pool"),
                Parameter::untyped("retries").with_default(3u8),
            ]
        }

        fn construct(_args: &mut Arguments) -> DIResult<Self> {
            Ok(Handler)
        }
    }

    #[test]
    fn test_registered_entry_precomputes_dependencies() {
        let entry = RegistryEntry::registered(Descriptor::of::<Handler>(), Scope::Transient);
        assert_eq!(entry.key(), TypeKey::of::<Handler>());
        assert_eq!(entry.origin(), EntryOrigin::Registered);
        assert_eq!(entry.dependencies(), &[("pool".to_string(), TypeKey::of::<Pool>())]);
        assert_eq!(entry.state(), EntryState::Registered);
    }

    #[test]
    fn test_store_never_replaces() {
        let entry = RegistryEntry::registered(Descriptor::of::<Pool>(), Scope::Singleton);
        let first: Instance = Arc::new(1u8);
        let second: Instance = Arc::new(2u8);

        let kept = entry.store(Arc::clone(&first));
        assert!(Arc::ptr_eq(&kept, &first));
        let kept = entry.store(second);
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[test]
    fn test_inferred_singleton_does_not_cache() {
        let entry = RegistryEntry::inferred(Descriptor::of::<Pool>(), Scope::Singleton, Vec::new());
        assert!(!entry.caches_instance());

        let declared = RegistryEntry::registered(Descriptor::of::<Pool>(), Scope::Singleton);
        assert!(declared.caches_instance());
    }
}
