//! Container configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DIError, DIResult};

/// How the singleton scope check treats dependencies supplied through the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextScopePolicy {
    /// Caller-supplied values bypass the registry and therefore the check
    #[default]
    Exempt,
    /// A singleton may not receive any of its dependencies from the context
    Strict,
}

/// Options controlling resolution behavior
///
/// ```toml
/// context_scope_policy = "strict"
/// infer_singleton_eligibility = true
/// use_declarations = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    pub context_scope_policy: ContextScopePolicy,
    /// Treat auto-resolved types whose dependencies are all singletons as
    /// singleton-eligible. When off, auto-resolved types are always transient.
    pub infer_singleton_eligibility: bool,
    /// Consult declarations submitted with `injectable!`
    pub use_declarations: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            context_scope_policy: ContextScopePolicy::Exempt,
            infer_singleton_eligibility: true,
            use_declarations: true,
        }
    }
}

impl ContainerOptions {
    pub fn from_toml_str(source: &str) -> DIResult<Self> {
        toml::from_str(source).map_err(|e| DIError::Configuration {
            message: format!("Failed to parse container options: {}", e),
        })
    }

    /// Load options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> DIResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| DIError::Configuration {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }

    pub fn strict() -> Self {
        Self {
            context_scope_policy: ContextScopePolicy::Strict,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = ContainerOptions::default();
        assert_eq!(options.context_scope_policy, ContextScopePolicy::Exempt);
        assert!(options.infer_singleton_eligibility);
        assert!(options.use_declarations);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options = ContainerOptions::from_toml_str("context_scope_policy = \"strict\"").unwrap();
        assert_eq!(options, ContainerOptions::strict());

        let options = ContainerOptions::from_toml_str("").unwrap();
        assert_eq!(options, ContainerOptions::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = ContainerOptions::from_toml_str("context_scope_policy = \"sometimes\"").unwrap_err();
        assert!(matches!(err, DIError::Configuration { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "infer_singleton_eligibility = false").unwrap();

        let options = ContainerOptions::load(file.path()).unwrap();
        assert!(!options.infer_singleton_eligibility);
        assert_eq!(options.context_scope_policy, ContextScopePolicy::Exempt);

        let err = ContainerOptions::load("/nonexistent/servicekit.toml").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: Failed to read"));
    }
}
