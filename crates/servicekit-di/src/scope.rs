//! Service lifetime policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service lifetime management
///
/// Ordered by restrictiveness: `Singleton < Transient`. A consumer may only
/// hold dependencies whose scope is at most as permissive as its own, so a
/// singleton never captures a transient that was meant to be fresh per use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Created once and reused for the lifetime of the container
    Singleton,
    /// Created each time it's requested
    #[default]
    Transient,
}

impl Scope {
    pub fn is_singleton(self) -> bool {
        matches!(self, Scope::Singleton)
    }

    /// Whether a consumer with this scope may be injected with `dependency`
    pub fn admits(self, dependency: Scope) -> bool {
        dependency <= self
    }

    /// The least restrictive of two scopes
    pub fn widen(self, other: Scope) -> Scope {
        self.max(other)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Transient => f.write_str("transient"),
        }
    }
}
