//! Removal of private services nothing refers to.

use std::collections::BTreeSet;

use wireup_common::error::Result;
use wireup_common::types::ServiceId;

use super::{CompilerPass, PassOutcome};
use crate::graph::ServiceReferenceGraph;
use crate::store::DefinitionStore;

/// Drops private definitions that have no incoming reference and no alias.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveUnusedDefinitions;

impl CompilerPass for RemoveUnusedDefinitions {
    fn name(&self) -> &'static str {
        "remove_unused"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        let graph = ServiceReferenceGraph::build(store)?;
        let alias_targets = store
            .aliases()
            .keys()
            .map(|name| store.resolve_alias(name.as_str()))
            .collect::<Result<BTreeSet<ServiceId>>>()?;

        let unused: Vec<ServiceId> = store
            .all()
            .iter()
            .filter(|(id, def)| {
                !def.is_public()
                    && !alias_targets.contains(*id)
                    && graph.incoming(id.as_str()).is_empty()
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &unused {
            tracing::debug!(id = %id, "removing unused private service");
            let _ = store.remove(id.as_str());
        }
        Ok(PassOutcome::from_changed(!unused.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;
    use crate::value::Value;

    #[test]
    fn unreferenced_private_service_is_removed() {
        let mut store = DefinitionStore::new();
        store.register("orphan", Definition::new("Orphan").with_public(false));
        store.register("kept", Definition::new("Kept").with_public(false));
        store.register("user", Definition::new("User").with_argument(Value::service("kept")));

        let outcome = RemoveUnusedDefinitions.process(&mut store).expect("process");
        assert_eq!(outcome, PassOutcome::Changed);
        assert!(!store.has("orphan"));
        assert!(store.has("kept"));
    }

    #[test]
    fn public_and_aliased_services_stay() {
        let mut store = DefinitionStore::new();
        store.register("public", Definition::new("Public"));
        store.register("aliased", Definition::new("Aliased").with_public(false));
        store.set_alias("entry", "aliased").expect("alias");

        let outcome = RemoveUnusedDefinitions.process(&mut store).expect("process");
        assert_eq!(outcome, PassOutcome::Unchanged);
        assert_eq!(store.all().len(), 2);
    }
}
