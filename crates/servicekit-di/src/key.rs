//! Type identity used as the registry key

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identity of a constructible target.
///
/// Equality and hashing use only the [`TypeId`]; the type name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Identity of a callable: keyed by the callable's own type, named by the caller
    pub(crate) fn callable<F: 'static>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<F>(),
            name,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths stripped, as used in error messages
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Strip module paths from every path inside a type name.
///
/// `alloc::sync::Arc<app::db::Database>` becomes `Arc<Database>`.
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut path = String::new();

    for ch in full.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            path.push(ch);
        } else {
            flush_path(&mut out, &mut path);
            out.push(ch);
        }
    }
    flush_path(&mut out, &mut path);
    out
}

fn flush_path(out: &mut String, path: &mut String) {
    if let Some(last) = path.rsplit("::").next() {
        out.push_str(last);
    }
    path.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    mod nested {
        pub struct Database;
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("app::db::Database"), "Database");
        assert_eq!(short_type_name("u32"), "u32");
        assert_eq!(
            short_type_name("alloc::sync::Arc<app::db::Database>"),
            "Arc<Database>"
        );
        assert_eq!(
            short_type_name("std::collections::HashMap<alloc::string::String, u8>"),
            "HashMap<String, u8>"
        );
    }

    #[test]
    fn test_key_identity_ignores_name() {
        let a = TypeKey::of::<nested::Database>();
        let b = TypeKey::of::<nested::Database>();
        assert_eq!(a, b);
        assert_ne!(a, TypeKey::of::<u32>());
        assert_eq!(a.to_string(), "Database");
        assert!(a.type_name().ends_with("nested::Database"));
    }
}
