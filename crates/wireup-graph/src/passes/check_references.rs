//! Reference checks that run once invalid references have been handled.

use wireup_common::error::{Result, WireupError};

use super::{CompilerPass, PassOutcome};
use crate::graph::ServiceReferenceGraph;
use crate::store::DefinitionStore;

/// Rejects references to abstract definitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckReferenceValidity;

impl CompilerPass for CheckReferenceValidity {
    fn name(&self) -> &'static str {
        "check_reference_validity"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        tracing::info!("checking reference targets");
        for (id, definition) in store.all() {
            if definition.is_abstract() {
                continue;
            }
            for target in definition.referenced_ids() {
                let resolved = store.resolve_alias(target.as_str())?;
                if store.all().get(&resolved).is_some_and(|def| def.is_abstract()) {
                    return Err(WireupError::AbstractServiceInstantiation {
                        id: resolved.to_string(),
                        referenced_by: Some(id.to_string()),
                    });
                }
            }
        }
        for (name, alias) in store.aliases() {
            let resolved = store.resolve_alias(alias.target.as_str())?;
            if store.all().get(&resolved).is_some_and(|def| def.is_abstract()) {
                return Err(WireupError::AbstractServiceInstantiation {
                    id: resolved.to_string(),
                    referenced_by: Some(name.to_string()),
                });
            }
        }
        Ok(PassOutcome::Unchanged)
    }
}

/// Rejects services that reference each other in a loop, through
/// constructor arguments, properties, or method calls.
///
/// Setter-injection cycles are rejected as well, unlike containers that only
/// follow constructor edges: method-call arguments are built before the
/// instance is returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckCircularReferences;

impl CompilerPass for CheckCircularReferences {
    fn name(&self) -> &'static str {
        "check_circular_references"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        tracing::info!("checking for circular references");
        let graph = ServiceReferenceGraph::build(store)?;
        let order = graph.resolve_order()?;
        tracing::debug!(services = order.len(), "reference graph is acyclic");
        Ok(PassOutcome::Unchanged)
    }
}
