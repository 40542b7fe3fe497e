//! Immutable snapshot handed from the compiler to exporters and runtimes.

use std::collections::BTreeMap;

use wireup_common::error::{Result, WireupError};
use wireup_common::types::ServiceId;

use crate::definition::{self, Alias, Definition, TagAttributes};
use crate::parameter::ParameterBag;

/// The compiled service graph.
///
/// Every definition is concrete and has no parent; every alias resolves
/// without looping; the parameter bag is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGraph {
    definitions: BTreeMap<ServiceId, Definition>,
    aliases: BTreeMap<ServiceId, Alias>,
    parameters: ParameterBag,
}

impl ResolvedGraph {
    /// Builds a snapshot from its parts, freezing the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::AbstractServiceInstantiation`] for an abstract
    /// definition, [`WireupError::UnresolvedTemplate`] for a definition that
    /// still has a parent, [`WireupError::CircularAlias`] for a looping
    /// alias, or a parameter error if the bag cannot be frozen.
    pub fn from_parts(
        definitions: BTreeMap<ServiceId, Definition>,
        aliases: BTreeMap<ServiceId, Alias>,
        mut parameters: ParameterBag,
    ) -> Result<Self> {
        for (id, def) in &definitions {
            if def.is_abstract() {
                return Err(WireupError::AbstractServiceInstantiation {
                    id: id.to_string(),
                    referenced_by: None,
                });
            }
            if let Some(parent) = def.parent() {
                return Err(WireupError::UnresolvedTemplate {
                    id: id.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        for name in aliases.keys() {
            let _ = definition::resolve_alias(&aliases, name.as_str())?;
        }
        parameters.freeze()?;
        Ok(Self {
            definitions,
            aliases,
            parameters,
        })
    }

    /// Returns every definition keyed by identifier.
    #[must_use]
    pub const fn definitions(&self) -> &BTreeMap<ServiceId, Definition> {
        &self.definitions
    }

    /// Returns the definition registered under `id`, without following
    /// aliases.
    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(&ServiceId::new(id))
    }

    /// Returns every alias keyed by name.
    #[must_use]
    pub const fn aliases(&self) -> &BTreeMap<ServiceId, Alias> {
        &self.aliases
    }

    /// Returns the alias registered under `id`.
    #[must_use]
    pub fn alias(&self, id: &str) -> Option<&Alias> {
        self.aliases.get(&ServiceId::new(id))
    }

    /// Returns the frozen parameters.
    #[must_use]
    pub const fn parameters(&self) -> &ParameterBag {
        &self.parameters
    }

    /// Follows aliases from `id`. Cycles were rejected on construction.
    #[must_use]
    pub fn resolve_alias(&self, id: &str) -> ServiceId {
        definition::resolve_alias(&self.aliases, id).unwrap_or_else(|_| ServiceId::new(id))
    }

    /// Returns whether `id` names a definition or an alias of one.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.definitions.contains_key(&self.resolve_alias(id))
    }

    /// Returns the identifiers of every service tagged `tag`, with the
    /// attribute maps of each occurrence.
    #[must_use]
    pub fn find_tagged_service_ids(&self, tag: &str) -> BTreeMap<&ServiceId, &[TagAttributes]> {
        self.definitions
            .iter()
            .filter(|(_, def)| def.has_tag(tag))
            .map(|(id, def)| (id, def.tag(tag)))
            .collect()
    }
}
