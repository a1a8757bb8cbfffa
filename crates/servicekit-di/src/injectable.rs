//! Injectable types and declaration-time marking
//!
//! A type becomes constructible by the container by implementing
//! [`Injectable`]. It can additionally be *declared* with a scope through the
//! [`injectable!`](crate::injectable) macro, which submits a [`Declaration`]
//! via `inventory`. Declarations live in an out-of-band catalog keyed by type
//! identity; the type itself is never modified and ordinary construction
//! (`Database::new()`) stays ordinary.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use servicekit_di::{injectable, Arguments, DIResult, Injectable, Scope};
//!
//! struct Database;
//!
//! impl Injectable for Database {
//!     fn construct(_args: &mut Arguments) -> DIResult<Self> {
//!         Ok(Database)
//!     }
//! }
//!
//! injectable!(Database, Scope::Singleton);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::context::Context;
use crate::key::TypeKey;
use crate::scope::Scope;
use crate::signature::{dependencies_of, Arguments, Descriptor, Parameter};
use crate::DIResult;

/// A type the container knows how to construct.
///
/// `parameters` describes the constructor signature; `construct` receives one
/// resolved argument per parameter, keyed by parameter name.
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Constructor parameters, in declaration order
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    /// Build the value from resolved arguments
    fn construct(args: &mut Arguments) -> DIResult<Self>;
}

/// Declaration-time marking of an injectable type.
///
/// Submitted with `inventory::submit!`, usually through the
/// [`injectable!`](crate::injectable) macro.
pub struct Declaration {
    scope: Scope,
    owner: fn() -> TypeKey,
    describe: fn() -> Descriptor,
}

impl Declaration {
    pub const fn new<T: Injectable>(scope: Scope) -> Self {
        Self {
            scope,
            owner: TypeKey::of::<T>,
            describe: Descriptor::of::<T>,
        }
    }

    pub const fn singleton<T: Injectable>() -> Self {
        Self::new::<T>(Scope::Singleton)
    }

    pub const fn transient<T: Injectable>() -> Self {
        Self::new::<T>(Scope::Transient)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn owner(&self) -> TypeKey {
        (self.owner)()
    }
}

inventory::collect!(Declaration);

/// Metadata precomputed once from a [`Declaration`]
#[derive(Debug, Clone)]
pub struct DeclaredMetadata {
    owner: TypeKey,
    scope: Scope,
    descriptor: Descriptor,
    dependencies: Vec<(String, TypeKey)>,
}

impl DeclaredMetadata {
    fn from_declaration(declaration: &Declaration) -> Self {
        let descriptor = (declaration.describe)();
        let dependencies = dependencies_of(descriptor.parameters(), &Context::new());
        Self {
            owner: declaration.owner(),
            scope: declaration.scope,
            descriptor,
            dependencies,
        }
    }

    /// The exact type this metadata was declared for
    pub fn owned_by(&self) -> TypeKey {
        self.owner
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn dependencies(&self) -> &[(String, TypeKey)] {
        &self.dependencies
    }
}

static CATALOG: OnceLock<HashMap<TypeId, DeclaredMetadata>> = OnceLock::new();

fn catalog() -> &'static HashMap<TypeId, DeclaredMetadata> {
    CATALOG.get_or_init(|| {
        let mut catalog = HashMap::new();
        for declaration in inventory::iter::<Declaration> {
            let metadata = DeclaredMetadata::from_declaration(declaration);
            let owner = metadata.owned_by();
            if catalog.contains_key(&owner.id()) {
                warn!("Duplicate injectable declaration for {}, keeping the first", owner);
                continue;
            }
            catalog.insert(owner.id(), metadata);
        }
        debug!("Collected {} injectable declarations", catalog.len());
        catalog
    })
}

/// Declaration-time metadata for `key`, if the type was declared
pub fn declared(key: &TypeKey) -> Option<&'static DeclaredMetadata> {
    catalog().get(&key.id())
}
