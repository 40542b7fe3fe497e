//! Inlining of private single-use and non-shared services.

use std::collections::BTreeSet;

use wireup_common::error::Result;
use wireup_common::types::ServiceId;

use super::{CompilerPass, PassOutcome};
use crate::definition::Definition;
use crate::graph::ServiceReferenceGraph;
use crate::store::DefinitionStore;
use crate::value::{Reference, Value};

/// Replaces references with embedded copies of their target definitions.
///
/// A reference from `S` to `T` (after following aliases) is inlined when
/// `T` is neither synthetic nor abstract, `T != S`, and either `T` is not
/// shared, or `T` is private, unaliased, referenced exactly once in the whole
/// graph (by `S`), lives in the same scope as `S`, and `S` is itself shared.
/// A shared target embedded in a non-shared owner would be rebuilt with every
/// owner instance. Public shared services are never inlined. Aliases are left
/// in place.
///
/// Copies embedded during one run are not visited again until the next run,
/// so the pass is meant to be repeated until it reports no change.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineServiceDefinitions;

impl CompilerPass for InlineServiceDefinitions {
    fn name(&self) -> &'static str {
        "inline_services"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        let graph = ServiceReferenceGraph::build(store)?;
        let alias_targets = store
            .aliases()
            .keys()
            .map(|name| store.resolve_alias(name.as_str()))
            .collect::<Result<BTreeSet<ServiceId>>>()?;

        let mut rewritten = Vec::new();
        for (id, definition) in store.all() {
            let mut copy = definition.clone();
            let mut inliner = Inliner {
                store,
                graph: &graph,
                alias_targets: &alias_targets,
                source: id,
                scope: definition.scope(),
                owner_shared: definition.is_shared(),
                changed: false,
            };
            inliner.visit_definition(&mut copy)?;
            if inliner.changed {
                rewritten.push((id.clone(), copy));
            }
        }

        let changed = !rewritten.is_empty();
        for (id, definition) in rewritten {
            *store.get_mut(id.as_str())? = definition;
        }
        Ok(PassOutcome::from_changed(changed))
    }
}

struct Inliner<'a> {
    store: &'a DefinitionStore,
    graph: &'a ServiceReferenceGraph,
    alias_targets: &'a BTreeSet<ServiceId>,
    source: &'a ServiceId,
    scope: &'a str,
    owner_shared: bool,
    changed: bool,
}

impl Inliner<'_> {
    fn visit_definition(&mut self, definition: &mut Definition) -> Result<()> {
        for value in definition.values_mut() {
            self.visit_value(value)?;
        }
        Ok(())
    }

    fn visit_value(&mut self, value: &mut Value) -> Result<()> {
        match value {
            Value::Reference(reference) => {
                if let Some(copy) = self.candidate(reference)? {
                    *value = Value::Inline(Box::new(copy));
                    self.changed = true;
                }
            }
            Value::List(items) => {
                for item in items {
                    self.visit_value(item)?;
                }
            }
            Value::Map(entries) => {
                for item in entries.values_mut() {
                    self.visit_value(item)?;
                }
            }
            Value::Inline(inner) => self.visit_definition(inner)?,
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Native(_) => {}
        }
        Ok(())
    }

    fn candidate(&self, reference: &Reference) -> Result<Option<Definition>> {
        let target_id = self.store.resolve_alias(reference.id.as_str())?;
        if target_id == *self.source {
            return Ok(None);
        }
        let Some(target) = self.store.all().get(&target_id) else {
            return Ok(None);
        };
        if target.is_synthetic() || target.is_abstract() {
            return Ok(None);
        }

        let eligible = !target.is_shared()
            || (self.owner_shared
                && !target.is_public()
                && !self.alias_targets.contains(&target_id)
                && self.is_single_use(&target_id)
                && target.scope() == self.scope);
        if !eligible {
            return Ok(None);
        }

        tracing::debug!(
            source = %self.source,
            target = %target_id,
            via = %reference.id,
            "inlining service definition"
        );
        Ok(Some(target.clone()))
    }

    fn is_single_use(&self, target: &ServiceId) -> bool {
        match self.graph.incoming(target.as_str()).as_slice() {
            [(source, _)] => *source == self.source,
            _ => false,
        }
    }
}
