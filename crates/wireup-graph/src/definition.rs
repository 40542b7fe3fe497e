//! Service definitions, method calls, and aliases.

use std::collections::{BTreeMap, BTreeSet};

use wireup_common::constants::DEFAULT_SCOPE;
use wireup_common::error::{Result, WireupError};
use wireup_common::types::ServiceId;

use crate::value::Value;

/// Attribute map attached to one occurrence of a tag.
pub type TagAttributes = BTreeMap<String, String>;

/// A method invoked on a freshly built service.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// Method name.
    pub method: String,
    /// Ordered call arguments.
    pub arguments: Vec<Value>,
}

impl MethodCall {
    /// Creates a method call.
    #[must_use]
    pub fn new(method: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// A named indirection to another service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Aliased service identifier.
    pub target: ServiceId,
    /// Whether the alias may be looked up from outside the graph.
    pub public: bool,
}

impl Alias {
    /// Creates a public alias.
    #[must_use]
    pub fn new(target: impl Into<ServiceId>) -> Self {
        Self {
            target: target.into(),
            public: true,
        }
    }

    /// Sets the alias visibility.
    #[must_use]
    pub const fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

impl From<&str> for Alias {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

impl From<ServiceId> for Alias {
    fn from(target: ServiceId) -> Self {
        Self::new(target)
    }
}

/// Follows `id` through `aliases` until it reaches a non-alias identifier.
///
/// The returned identifier is not guaranteed to have a definition.
///
/// # Errors
///
/// Returns [`WireupError::CircularAlias`] if the chain loops.
pub fn resolve_alias(aliases: &BTreeMap<ServiceId, Alias>, id: &str) -> Result<ServiceId> {
    let mut current = ServiceId::new(id);
    let mut seen: Vec<String> = Vec::new();
    while let Some(alias) = aliases.get(&current) {
        if seen.iter().any(|s| s == current.as_str()) {
            seen.push(current.to_string());
            return Err(WireupError::CircularAlias { chain: seen });
        }
        seen.push(current.to_string());
        current = alias.target.clone();
    }
    Ok(current)
}

/// Declarative description of how to build one service.
///
/// A definition with a parent is a child template: its class, indexed
/// argument overrides, and explicit visibility are merged onto the parent's
/// by the template resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    class: Option<String>,
    arguments: Vec<Value>,
    argument_overrides: BTreeMap<usize, Value>,
    calls: Vec<MethodCall>,
    properties: BTreeMap<String, Value>,
    tags: BTreeMap<String, Vec<TagAttributes>>,
    public: bool,
    public_explicit: bool,
    shared: bool,
    synthetic: bool,
    is_abstract: bool,
    scope: String,
    parent: Option<ServiceId>,
}

impl Default for Definition {
    fn default() -> Self {
        Self {
            class: None,
            arguments: Vec::new(),
            argument_overrides: BTreeMap::new(),
            calls: Vec::new(),
            properties: BTreeMap::new(),
            tags: BTreeMap::new(),
            public: true,
            public_explicit: false,
            shared: true,
            synthetic: false,
            is_abstract: false,
            scope: DEFAULT_SCOPE.to_owned(),
            parent: None,
        }
    }
}

impl Definition {
    /// Creates a definition for the given class.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::default()
        }
    }

    /// Creates a child definition that extends `parent`.
    #[must_use]
    pub fn child_of(parent: impl Into<ServiceId>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    // ── Builders ────────────────────────────────────────────────────

    /// Sets the class.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Appends a constructor argument.
    #[must_use]
    pub fn with_argument(mut self, value: impl Into<Value>) -> Self {
        self.arguments.push(value.into());
        self
    }

    /// Replaces the constructor arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Overrides the argument at `index`; see [`Self::replace_argument`].
    #[must_use]
    pub fn with_replaced_argument(mut self, index: usize, value: impl Into<Value>) -> Self {
        self.replace_argument(index, value);
        self
    }

    /// Appends a method call.
    #[must_use]
    pub fn with_call(mut self, method: impl Into<String>, arguments: Vec<Value>) -> Self {
        self.calls.push(MethodCall::new(method, arguments));
        self
    }

    /// Sets a property injected after construction.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.properties.insert(name.into(), value.into());
        self
    }

    /// Adds one occurrence of a tag.
    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>, attributes: TagAttributes) -> Self {
        self.add_tag(name, attributes);
        self
    }

    /// Sets visibility; see [`Self::set_public`].
    #[must_use]
    pub fn with_public(mut self, public: bool) -> Self {
        self.set_public(public);
        self
    }

    /// Sets whether the instance is memoised.
    #[must_use]
    pub const fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Marks the service as injected at runtime.
    #[must_use]
    pub const fn with_synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Marks the definition as a template that is never built.
    #[must_use]
    pub const fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Returns the class, if set.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Sets or clears the class.
    pub fn set_class(&mut self, class: Option<String>) {
        self.class = class;
    }

    /// Returns the constructor arguments.
    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Returns the constructor arguments for in-place rewriting.
    pub const fn arguments_mut(&mut self) -> &mut Vec<Value> {
        &mut self.arguments
    }

    /// Appends a constructor argument.
    pub fn add_argument(&mut self, value: impl Into<Value>) {
        self.arguments.push(value.into());
    }

    /// Overrides the argument at `index`.
    ///
    /// On a child definition the override is recorded and applied on top of
    /// the parent's arguments during template resolution. Otherwise the
    /// argument is replaced in place; an index at or past the end appends.
    pub fn replace_argument(&mut self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        if self.parent.is_some() {
            let _ = self.argument_overrides.insert(index, value);
        } else if let Some(slot) = self.arguments.get_mut(index) {
            *slot = value;
        } else {
            self.arguments.push(value);
        }
    }

    /// Returns the indexed argument overrides of a child definition.
    #[must_use]
    pub const fn argument_overrides(&self) -> &BTreeMap<usize, Value> {
        &self.argument_overrides
    }

    /// Returns the method calls in invocation order.
    #[must_use]
    pub fn calls(&self) -> &[MethodCall] {
        &self.calls
    }

    /// Returns the method calls for in-place rewriting.
    pub const fn calls_mut(&mut self) -> &mut Vec<MethodCall> {
        &mut self.calls
    }

    /// Appends a method call.
    pub fn add_call(&mut self, method: impl Into<String>, arguments: Vec<Value>) {
        self.calls.push(MethodCall::new(method, arguments));
    }

    /// Returns the injected properties.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Returns the injected properties for in-place rewriting.
    pub const fn properties_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.properties
    }

    /// Sets a property.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let _ = self.properties.insert(name.into(), value.into());
    }

    /// Returns all tags with their attribute maps.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, Vec<TagAttributes>> {
        &self.tags
    }

    /// Returns the attribute maps of every occurrence of `name`.
    #[must_use]
    pub fn tag(&self, name: &str) -> &[TagAttributes] {
        self.tags.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns whether the definition carries `name`.
    #[must_use]
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Adds one occurrence of a tag.
    pub fn add_tag(&mut self, name: impl Into<String>, attributes: TagAttributes) {
        self.tags.entry(name.into()).or_default().push(attributes);
    }

    /// Removes every tag.
    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    /// Returns whether the service may be looked up directly.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.public
    }

    /// Sets visibility. On a child definition this also marks visibility as
    /// explicitly chosen, so it wins over the parent's.
    pub fn set_public(&mut self, public: bool) {
        self.public = public;
        if self.parent.is_some() {
            self.public_explicit = true;
        }
    }

    /// Returns whether a child definition chose its visibility explicitly.
    #[must_use]
    pub const fn is_public_explicit(&self) -> bool {
        self.public_explicit
    }

    /// Returns whether the instance is memoised.
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        self.shared
    }

    /// Sets whether the instance is memoised.
    pub const fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
    }

    /// Returns whether the instance is injected at runtime.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Sets whether the instance is injected at runtime.
    pub const fn set_synthetic(&mut self, synthetic: bool) {
        self.synthetic = synthetic;
    }

    /// Returns whether the definition is a template.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Sets whether the definition is a template.
    pub const fn set_abstract(&mut self, is_abstract: bool) {
        self.is_abstract = is_abstract;
    }

    /// Returns the scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Sets the scope.
    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    /// Returns the parent template, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<&ServiceId> {
        self.parent.as_ref()
    }

    /// Sets or clears the parent template.
    pub fn set_parent(&mut self, parent: Option<ServiceId>) {
        self.parent = parent;
    }

    /// Drops the parent pointer together with the child-only state that
    /// only has meaning relative to it.
    pub(crate) fn detach(&mut self) {
        self.parent = None;
        self.argument_overrides.clear();
        self.public_explicit = false;
    }

    // ── Traversal ───────────────────────────────────────────────────

    /// Iterates over every top-level value: constructor arguments, argument
    /// overrides, properties, then method-call arguments.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.arguments
            .iter()
            .chain(self.argument_overrides.values())
            .chain(self.properties.values())
            .chain(self.calls.iter().flat_map(|c| c.arguments.iter()))
    }

    /// Mutable counterpart of [`Self::values`].
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.arguments
            .iter_mut()
            .chain(self.argument_overrides.values_mut())
            .chain(self.properties.values_mut())
            .chain(self.calls.iter_mut().flat_map(|c| c.arguments.iter_mut()))
    }

    /// Returns the identifiers of every service this definition references,
    /// directly or through nested values.
    #[must_use]
    pub fn referenced_ids(&self) -> BTreeSet<&ServiceId> {
        self.values()
            .flat_map(Value::references)
            .map(|r| &r.id)
            .collect()
    }
}
