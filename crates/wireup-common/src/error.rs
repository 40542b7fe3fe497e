//! Unified error types for the wireup workspace.
//!
//! Structural problems (cycles, abstract leaks, unrepresentable values) are
//! fatal and surface here. Per-reference policy outcomes are not errors; the
//! passes handle them as ordinary control flow.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum WireupError {
    /// A service lookup failed where existence was required.
    #[error("service not found: {id}")]
    UnknownService {
        /// Identifier that was looked up.
        id: String,
    },

    /// A child definition names a parent that has no definition.
    #[error("parent definition \"{parent}\" of service \"{id}\" does not exist")]
    MissingParent {
        /// Child service identifier.
        id: String,
        /// Missing parent identifier.
        parent: String,
    },

    /// A parent-definition chain references itself.
    #[error("circular template chain: {}", chain.join(" -> "))]
    CircularTemplate {
        /// Identifiers along the cycle, first repeated at the end.
        chain: Vec<String>,
    },

    /// An alias chain loops back on itself.
    #[error("circular alias chain: {}", chain.join(" -> "))]
    CircularAlias {
        /// Identifiers along the cycle, first repeated at the end.
        chain: Vec<String>,
    },

    /// Services reference each other in a loop.
    #[error("circular reference between services: {}", chain.join(" -> "))]
    CircularReference {
        /// Identifiers along the cycle, first repeated at the end.
        chain: Vec<String>,
    },

    /// A reference under the exception policy still points nowhere when the
    /// runtime tries to materialise it.
    #[error("service \"{referenced_by}\" depends on missing service \"{id}\"")]
    InvalidReference {
        /// Missing target identifier.
        id: String,
        /// Service whose construction needed the target.
        referenced_by: String,
    },

    /// An exporter met a value it cannot represent.
    #[error("unsupported {kind} value at {location}")]
    UnsupportedValue {
        /// Kind of the offending value.
        kind: &'static str,
        /// Trail leading to the value, e.g. `service "foo" argument 2`.
        location: String,
    },

    /// An abstract definition was about to be instantiated or referenced.
    #[error("service \"{id}\" is abstract and cannot be instantiated{}", referenced_by.as_ref().map_or_else(String::new, |by| format!(" (referenced by \"{by}\")")))]
    AbstractServiceInstantiation {
        /// Abstract service identifier.
        id: String,
        /// Referencing service, when the attempt came through a reference.
        referenced_by: Option<String>,
    },

    /// A definition still carries a parent pointer where none is allowed.
    #[error("service \"{id}\" still extends \"{parent}\"; templates were not resolved")]
    UnresolvedTemplate {
        /// Child service identifier.
        id: String,
        /// Unresolved parent identifier.
        parent: String,
    },

    /// A definition is structurally invalid.
    #[error("invalid definition for service \"{id}\": {reason}")]
    InvalidDefinition {
        /// Service identifier.
        id: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A synthetic service was requested before being injected.
    #[error("synthetic service \"{id}\" has not been set")]
    SyntheticNotSet {
        /// Service identifier.
        id: String,
    },

    /// A parameter placeholder names an unknown parameter.
    #[error("parameter not found: {name}")]
    ParameterNotFound {
        /// Parameter name.
        name: String,
    },

    /// Parameters reference each other in a loop.
    #[error("circular parameter reference: {}", chain.join(" -> "))]
    CircularParameter {
        /// Parameter names along the cycle, first repeated at the end.
        chain: Vec<String>,
    },

    /// A non-scalar parameter was embedded inside a longer string.
    #[error("parameter \"{name}\" is not a scalar and cannot be embedded in \"{template}\"")]
    NonScalarParameter {
        /// Parameter name.
        name: String,
        /// String the placeholder appeared in.
        template: String,
    },

    /// A frozen parameter bag was mutated.
    #[error("parameter bag is frozen; cannot set \"{name}\"")]
    FrozenParameterBag {
        /// Parameter name.
        name: String,
    },

    /// An artifact could not be read back.
    #[error("failed to parse {format} artifact: {message}")]
    Parse {
        /// Artifact format being read.
        format: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// YAML serialization or deserialization failed.
    #[error("YAML error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, WireupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_template_lists_chain() {
        let err = WireupError::CircularTemplate {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular template chain: a -> b -> a");
    }

    #[test]
    fn abstract_instantiation_mentions_referrer() {
        let err = WireupError::AbstractServiceInstantiation {
            id: "base".into(),
            referenced_by: Some("child".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"base\" is abstract"), "got: {msg}");
        assert!(msg.contains("referenced by \"child\""), "got: {msg}");
    }

    #[test]
    fn abstract_instantiation_without_referrer() {
        let err = WireupError::AbstractServiceInstantiation {
            id: "base".into(),
            referenced_by: None,
        };
        assert!(!err.to_string().contains("referenced by"));
    }
}
