//! Invalid reference handling according to each reference's policy.

use std::collections::BTreeSet;

use wireup_common::error::Result;
use wireup_common::types::{ReferencePolicy, ServiceId};

use super::{CompilerPass, PassOutcome};
use crate::definition::{Definition, MethodCall};
use crate::store::DefinitionStore;
use crate::value::Value;

/// What happened to one value during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceOutcome {
    /// Left as is.
    Kept,
    /// Replaced with the null sentinel.
    Nulled,
    /// The enclosing method call must go.
    DropCall,
}

/// Rewrites references whose target does not exist.
///
/// `Exception` references are left for the runtime to report, `Null`
/// references become [`Value::Null`], and `Ignore` references remove the
/// method call they appear in (or become null outside method calls).
/// Identifiers in the exclusion set count as existing.
#[derive(Debug, Default, Clone)]
pub struct ResolveInvalidReferences {
    exclusions: BTreeSet<ServiceId>,
}

impl ResolveInvalidReferences {
    /// Creates the pass with identifiers that a later compilation phase will
    /// supply.
    #[must_use]
    pub fn new<I, S>(exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceId>,
    {
        Self {
            exclusions: exclusions.into_iter().map(Into::into).collect(),
        }
    }
}

impl CompilerPass for ResolveInvalidReferences {
    fn name(&self) -> &'static str {
        "resolve_invalid_references"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        let known: BTreeSet<ServiceId> = store
            .all()
            .keys()
            .chain(store.aliases().keys())
            .chain(self.exclusions.iter())
            .cloned()
            .collect();
        tracing::info!(known = known.len(), "resolving invalid references");

        let mut walker = Walker {
            known: &known,
            changed: false,
        };
        for (id, definition) in store.all_mut() {
            walker.visit_definition(id, definition);
        }
        Ok(PassOutcome::from_changed(walker.changed))
    }
}

struct Walker<'a> {
    known: &'a BTreeSet<ServiceId>,
    changed: bool,
}

impl Walker<'_> {
    fn visit_definition(&mut self, owner: &ServiceId, definition: &mut Definition) {
        for value in definition.arguments_mut() {
            let _ = self.visit_value(owner, value, false);
        }
        for value in definition.properties_mut().values_mut() {
            let _ = self.visit_value(owner, value, false);
        }

        let calls = std::mem::take(definition.calls_mut());
        let mut kept: Vec<MethodCall> = Vec::with_capacity(calls.len());
        for mut call in calls {
            let dropped = call
                .arguments
                .iter_mut()
                .any(|arg| self.visit_value(owner, arg, true) == ReferenceOutcome::DropCall);
            if dropped {
                tracing::debug!(service = %owner, method = %call.method, "removed method call with invalid reference");
                self.changed = true;
            } else {
                kept.push(call);
            }
        }
        *definition.calls_mut() = kept;
    }

    fn visit_value(&mut self, owner: &ServiceId, value: &mut Value, in_call: bool) -> ReferenceOutcome {
        match value {
            Value::Reference(reference) => {
                if self.known.contains(&reference.id) {
                    return ReferenceOutcome::Kept;
                }
                match reference.policy {
                    ReferencePolicy::Exception => ReferenceOutcome::Kept,
                    ReferencePolicy::Ignore if in_call => ReferenceOutcome::DropCall,
                    ReferencePolicy::Null | ReferencePolicy::Ignore => {
                        tracing::debug!(service = %owner, target = %reference.id, "nulled invalid reference");
                        *value = Value::Null;
                        self.changed = true;
                        ReferenceOutcome::Nulled
                    }
                }
            }
            Value::List(items) => self.visit_all(owner, items.iter_mut(), in_call),
            Value::Map(entries) => self.visit_all(owner, entries.values_mut(), in_call),
            Value::Inline(inner) => {
                self.visit_definition(owner, inner);
                ReferenceOutcome::Kept
            }
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Native(_) => ReferenceOutcome::Kept,
        }
    }

    fn visit_all<'v>(
        &mut self,
        owner: &ServiceId,
        values: impl Iterator<Item = &'v mut Value>,
        in_call: bool,
    ) -> ReferenceOutcome {
        let mut outcome = ReferenceOutcome::Kept;
        for value in values {
            match self.visit_value(owner, value, in_call) {
                ReferenceOutcome::DropCall => return ReferenceOutcome::DropCall,
                ReferenceOutcome::Nulled => outcome = ReferenceOutcome::Nulled,
                ReferenceOutcome::Kept => {}
            }
        }
        outcome
    }
}
