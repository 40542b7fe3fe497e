//! Structural validation of individual definitions.

use wireup_common::error::{Result, WireupError};

use super::{CompilerPass, PassOutcome};
use crate::store::DefinitionStore;

/// Rejects definitions that can never be built or looked up.
///
/// # Checks performed
///
/// 1. A synthetic service is public, since it must be injected from outside.
/// 2. A synthetic service is not abstract.
/// 3. A concrete, non-synthetic service has a class.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckDefinitionValidity;

impl CompilerPass for CheckDefinitionValidity {
    fn name(&self) -> &'static str {
        "check_definitions"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        tracing::info!("validating service definitions");
        for (id, definition) in store.all() {
            let reason = if definition.is_synthetic() && !definition.is_public() {
                Some("a synthetic service must be public")
            } else if definition.is_synthetic() && definition.is_abstract() {
                Some("a synthetic service cannot be abstract")
            } else if !definition.is_abstract()
                && !definition.is_synthetic()
                && definition.class().is_none()
            {
                Some("a concrete service must have a class")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(WireupError::InvalidDefinition {
                    id: id.to_string(),
                    reason: reason.to_owned(),
                });
            }
        }
        Ok(PassOutcome::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;

    fn check(definition: Definition) -> Result<PassOutcome> {
        let mut store = DefinitionStore::new();
        store.register("svc", definition);
        CheckDefinitionValidity.process(&mut store)
    }

    #[test]
    fn valid_definitions_pass() {
        assert!(check(Definition::new("Foo")).is_ok());
        assert!(check(Definition::default().with_abstract(true)).is_ok());
        assert!(check(Definition::default().with_synthetic(true)).is_ok());
    }

    #[test]
    fn private_synthetic_is_rejected() {
        let err = check(Definition::default().with_synthetic(true).with_public(false)).unwrap_err();
        assert!(err.to_string().contains("must be public"), "got: {err}");
    }

    #[test]
    fn abstract_synthetic_is_rejected() {
        let err = check(Definition::default().with_synthetic(true).with_abstract(true)).unwrap_err();
        assert!(err.to_string().contains("cannot be abstract"), "got: {err}");
    }

    #[test]
    fn classless_concrete_service_is_rejected() {
        let err = check(Definition::default()).unwrap_err();
        assert!(
            matches!(err, WireupError::InvalidDefinition { ref id, .. } if id == "svc"),
            "got: {err}"
        );
    }
}
