//! The Definition Store: raw service definitions, aliases, and parameters
//! as submitted by configuration loaders.
//!
//! No validation happens here beyond identifier uniqueness; the compiler
//! passes are responsible for everything else.

use std::collections::BTreeMap;

use wireup_common::error::{Result, WireupError};
use wireup_common::types::ServiceId;

use crate::definition::{self, Alias, Definition};
use crate::parameter::ParameterBag;

/// Mutable store of one compilation's service graph.
#[derive(Debug, Clone, Default)]
pub struct DefinitionStore {
    definitions: BTreeMap<ServiceId, Definition>,
    aliases: BTreeMap<ServiceId, Alias>,
    parameters: ParameterBag,
}

impl DefinitionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any definition or alias with the
    /// same identifier.
    pub fn register(&mut self, id: impl Into<ServiceId>, definition: Definition) {
        let id = id.into();
        tracing::trace!(id = %id, "registering definition");
        let _ = self.aliases.remove(&id);
        let _ = self.definitions.insert(id, definition);
    }

    /// Returns the definition registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::UnknownService`] if there is none.
    pub fn get(&self, id: &str) -> Result<&Definition> {
        self.definitions
            .get(&ServiceId::new(id))
            .ok_or_else(|| WireupError::UnknownService { id: id.to_owned() })
    }

    /// Mutable counterpart of [`Self::get`].
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::UnknownService`] if there is none.
    pub fn get_mut(&mut self, id: &str) -> Result<&mut Definition> {
        self.definitions
            .get_mut(&ServiceId::new(id))
            .ok_or_else(|| WireupError::UnknownService { id: id.to_owned() })
    }

    /// Returns whether `id` names a definition or an alias.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        let id = ServiceId::new(id);
        self.definitions.contains_key(&id) || self.aliases.contains_key(&id)
    }

    /// Returns whether `id` names a definition.
    #[must_use]
    pub fn has_definition(&self, id: &str) -> bool {
        self.definitions.contains_key(&ServiceId::new(id))
    }

    /// Removes a definition, returning it.
    pub fn remove(&mut self, id: &str) -> Option<Definition> {
        self.definitions.remove(&ServiceId::new(id))
    }

    /// Returns every definition keyed by identifier.
    #[must_use]
    pub const fn all(&self) -> &BTreeMap<ServiceId, Definition> {
        &self.definitions
    }

    /// Returns every definition for in-place rewriting.
    pub const fn all_mut(&mut self) -> &mut BTreeMap<ServiceId, Definition> {
        &mut self.definitions
    }

    /// Registers an alias, replacing any definition with the same identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::CircularAlias`] if the alias names itself.
    pub fn set_alias(&mut self, name: impl Into<ServiceId>, alias: impl Into<Alias>) -> Result<()> {
        let name = name.into();
        let alias = alias.into();
        if name == alias.target {
            return Err(WireupError::CircularAlias {
                chain: vec![name.to_string(), alias.target.to_string()],
            });
        }
        let _ = self.definitions.remove(&name);
        let _ = self.aliases.insert(name, alias);
        Ok(())
    }

    /// Returns the alias registered under `id`, if any.
    #[must_use]
    pub fn alias(&self, id: &str) -> Option<&Alias> {
        self.aliases.get(&ServiceId::new(id))
    }

    /// Returns every alias keyed by name.
    #[must_use]
    pub const fn aliases(&self) -> &BTreeMap<ServiceId, Alias> {
        &self.aliases
    }

    /// Replaces every alias at once.
    pub fn set_aliases(&mut self, aliases: BTreeMap<ServiceId, Alias>) {
        self.aliases = aliases;
    }

    /// Follows aliases from `id` to a non-alias identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::CircularAlias`] if the chain loops.
    pub fn resolve_alias(&self, id: &str) -> Result<ServiceId> {
        definition::resolve_alias(&self.aliases, id)
    }

    /// Returns the definition `id` resolves to, following aliases.
    ///
    /// # Errors
    ///
    /// Returns an error on alias cycles or when the target has no definition.
    pub fn find_definition(&self, id: &str) -> Result<&Definition> {
        let target = self.resolve_alias(id)?;
        self.get(target.as_str())
    }

    /// Returns the identifiers of every definition tagged `tag`, with the
    /// attribute maps of each occurrence.
    #[must_use]
    pub fn find_tagged_service_ids(
        &self,
        tag: &str,
    ) -> BTreeMap<&ServiceId, &[definition::TagAttributes]> {
        self.definitions
            .iter()
            .filter(|(_, def)| def.has_tag(tag))
            .map(|(id, def)| (id, def.tag(tag)))
            .collect()
    }

    /// Returns the parameter bag.
    #[must_use]
    pub const fn parameters(&self) -> &ParameterBag {
        &self.parameters
    }

    /// Returns the parameter bag for mutation.
    pub const fn parameters_mut(&mut self) -> &mut ParameterBag {
        &mut self.parameters
    }

    /// Splits the store into its parts.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<ServiceId, Definition>,
        BTreeMap<ServiceId, Alias>,
        ParameterBag,
    ) {
        (self.definitions, self.aliases, self.parameters)
    }
}
