//! Removal of template-only definitions.

use wireup_common::error::Result;
use wireup_common::types::ServiceId;

use super::{CompilerPass, PassOutcome};
use crate::store::DefinitionStore;

/// Drops every abstract definition; templates are never built.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveAbstractDefinitions;

impl CompilerPass for RemoveAbstractDefinitions {
    fn name(&self) -> &'static str {
        "remove_abstract"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        let abstracts: Vec<ServiceId> = store
            .all()
            .iter()
            .filter(|(_, def)| def.is_abstract())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &abstracts {
            tracing::debug!(id = %id, "removing abstract definition");
            let _ = store.remove(id.as_str());
        }
        Ok(PassOutcome::from_changed(!abstracts.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;

    #[test]
    fn abstract_definitions_are_removed() {
        let mut store = DefinitionStore::new();
        store.register("base", Definition::new("Base").with_abstract(true));
        store.register("foo", Definition::new("Foo"));
        let outcome = RemoveAbstractDefinitions.process(&mut store).expect("process");
        assert_eq!(outcome, PassOutcome::Changed);
        assert!(!store.has("base"));
        assert!(store.has("foo"));
    }
}
