//! The runtime container core shared by generated and interpreted containers.
//!
//! [`Container`] owns parameters, aliases, and the memoised instances. It
//! does not know how to build anything: callers pass a builder closure to
//! [`Container::shared`] or [`Container::fresh`]. A loading stack turns
//! re-entrant construction of the same service into a
//! [`WireupError::CircularReference`] instead of unbounded recursion.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use wireup_common::error::{Result, WireupError};
use wireup_graph::parameter::{Segment, segments, unescape};

use crate::instance::Instance;
use crate::value::Value;

#[derive(Debug, Clone)]
struct AliasEntry {
    target: String,
    public: bool,
}

/// Parameters, aliases, and memoised instances.
#[derive(Debug, Default)]
pub struct Container {
    parameters: BTreeMap<String, Value>,
    dynamic: BTreeSet<String>,
    aliases: BTreeMap<String, AliasEntry>,
    services: RefCell<BTreeMap<String, Rc<Instance>>>,
    loading: RefCell<Vec<String>>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any previous value.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) {
        let _ = self.parameters.insert(name.to_lowercase(), value.into());
    }

    /// Declares a dynamic parameter with its default value. A later
    /// [`Self::set_parameter`] supplies the runtime value.
    pub fn set_dynamic_parameter(&mut self, name: &str, default: impl Into<Value>) {
        self.set_parameter(name, default);
        let _ = self.dynamic.insert(name.to_lowercase());
    }

    /// Returns whether `name` is a dynamic parameter.
    #[must_use]
    pub fn is_dynamic(&self, name: &str) -> bool {
        self.dynamic.contains(&name.to_lowercase())
    }

    /// Returns a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::ParameterNotFound`] if the name is unknown.
    pub fn parameter(&self, name: &str) -> Result<Value> {
        self.parameters
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| WireupError::ParameterNotFound {
                name: name.to_owned(),
            })
    }

    /// Substitutes parameter placeholders left in `template` and removes
    /// `%%` escapes. A template that is exactly one placeholder yields the
    /// parameter's value unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown parameters or non-scalar values embedded
    /// in a longer string.
    pub fn expand(&self, template: &str) -> Result<Value> {
        let parts = segments(template);
        if let [Segment::Placeholder(name)] = parts.as_slice() {
            return self.parameter(name);
        }
        let mut out = String::with_capacity(template.len());
        for part in parts {
            match part {
                Segment::Text(text) => out.push_str(&unescape(text)),
                Segment::Placeholder(name) => match self.parameter(name)? {
                    Value::Str(s) => out.push_str(&s),
                    Value::Int(n) => out.push_str(&n.to_string()),
                    Value::Float(n) => out.push_str(&n.to_string()),
                    _ => {
                        return Err(WireupError::NonScalarParameter {
                            name: name.to_owned(),
                            template: template.to_owned(),
                        });
                    }
                },
            }
        }
        Ok(Value::Str(out))
    }

    /// Registers an alias.
    pub fn set_alias(&mut self, alias: &str, target: &str, public: bool) {
        let _ = self.aliases.insert(
            alias.to_lowercase(),
            AliasEntry {
                target: target.to_lowercase(),
                public,
            },
        );
    }

    /// Follows aliases from `id`, returning the lowercased final identifier.
    #[must_use]
    pub fn resolve_alias(&self, id: &str) -> String {
        let mut current = id.to_lowercase();
        let mut hops = 0;
        while let Some(entry) = self.aliases.get(&current) {
            if hops > self.aliases.len() {
                break;
            }
            tracing::trace!(alias = %current, target = %entry.target, public = entry.public, "following alias");
            current.clone_from(&entry.target);
            hops += 1;
        }
        current
    }

    /// Injects the instance of a synthetic service.
    pub fn set(&self, id: &str, instance: Rc<Instance>) {
        let id = self.resolve_alias(id);
        tracing::debug!(id = %id, "injecting service instance");
        let _ = self.services.borrow_mut().insert(id, instance);
    }

    /// Returns whether an instance of `id` exists already.
    #[must_use]
    pub fn initialized(&self, id: &str) -> bool {
        self.services.borrow().contains_key(&self.resolve_alias(id))
    }

    /// Returns the memoised instance of `id`, building it with `build` on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::CircularReference`] if `id` is already being
    /// built, or whatever `build` fails with.
    pub fn shared<F>(&self, id: &str, build: F) -> Result<Rc<Instance>>
    where
        F: FnOnce() -> Result<Rc<Instance>>,
    {
        if let Some(existing) = self.services.borrow().get(id) {
            return Ok(Rc::clone(existing));
        }
        let instance = self.guarded(id, build)?;
        let _ = self
            .services
            .borrow_mut()
            .insert(id.to_owned(), Rc::clone(&instance));
        Ok(instance)
    }

    /// Builds a fresh instance of `id` with `build`.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::CircularReference`] if `id` is already being
    /// built, or whatever `build` fails with.
    pub fn fresh<F>(&self, id: &str, build: F) -> Result<Rc<Instance>>
    where
        F: FnOnce() -> Result<Rc<Instance>>,
    {
        self.guarded(id, build)
    }

    /// Returns the injected instance of synthetic service `id`.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::SyntheticNotSet`] if nothing was injected.
    pub fn synthetic(&self, id: &str) -> Result<Rc<Instance>> {
        self.services
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| WireupError::SyntheticNotSet { id: id.to_owned() })
    }

    /// Returns the service currently being built, if any.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.loading.borrow().last().cloned()
    }

    /// Error for a lookup of an unknown service.
    #[must_use]
    pub fn unknown(&self, id: &str) -> WireupError {
        WireupError::UnknownService { id: id.to_owned() }
    }

    fn guarded<F>(&self, id: &str, build: F) -> Result<Rc<Instance>>
    where
        F: FnOnce() -> Result<Rc<Instance>>,
    {
        {
            let mut loading = self.loading.borrow_mut();
            if let Some(start) = loading.iter().position(|entry| entry == id) {
                let mut chain: Vec<String> = loading[start..].to_vec();
                chain.push(id.to_owned());
                return Err(WireupError::CircularReference { chain });
            }
            loading.push(id.to_owned());
        }
        tracing::trace!(id = %id, "building service");
        let result = build();
        let _ = self.loading.borrow_mut().pop();
        result
    }
}
