//! Argument values carried by service definitions.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use wireup_common::types::{ReferencePolicy, ServiceId};

use crate::definition::Definition;

/// A typed edge to another service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Target service or alias.
    pub id: ServiceId,
    /// Behaviour when the target does not exist.
    pub policy: ReferencePolicy,
}

impl Reference {
    /// Creates a reference that fails at runtime when the target is missing.
    #[must_use]
    pub fn new(id: impl Into<ServiceId>) -> Self {
        Self {
            id: id.into(),
            policy: ReferencePolicy::Exception,
        }
    }

    /// Creates a reference with an explicit invalid-reference policy.
    #[must_use]
    pub fn with_policy(id: impl Into<ServiceId>, policy: ReferencePolicy) -> Self {
        Self {
            id: id.into(),
            policy,
        }
    }
}

/// An opaque host object or resource handle.
///
/// Stores accept these so loaders can pass live objects through, but no
/// exporter can represent them.
#[derive(Clone)]
pub struct NativeValue {
    type_name: &'static str,
    handle: Rc<dyn Any>,
}

impl NativeValue {
    /// Wraps a host value.
    #[must_use]
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            handle: Rc::new(value),
        }
    }

    /// Returns the Rust type name of the wrapped value.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the wrapped value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref::<T>()
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeValue({})", self.type_name)
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.handle, &other.handle)
    }
}

/// A constructor argument, property, method-call argument, or parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null sentinel.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal; may contain `%name%` parameter placeholders.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Value>),
    /// Edge to another service.
    Reference(Reference),
    /// Embedded definition built in place.
    Inline(Box<Definition>),
    /// Host object that cannot be exported.
    Native(NativeValue),
}

impl Value {
    /// Shorthand for a reference with the default policy.
    #[must_use]
    pub fn service(id: impl Into<ServiceId>) -> Self {
        Self::Reference(Reference::new(id))
    }

    /// Shorthand for a reference with an explicit policy.
    #[must_use]
    pub fn service_with_policy(id: impl Into<ServiceId>, policy: ReferencePolicy) -> Self {
        Self::Reference(Reference::with_policy(id, policy))
    }

    /// Returns a short name for the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Reference(_) => "reference",
            Self::Inline(_) => "inline definition",
            Self::Native(_) => "native",
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the reference payload, if any.
    #[must_use]
    pub const fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the inline definition payload, if any.
    #[must_use]
    pub fn as_inline(&self) -> Option<&Definition> {
        match self {
            Self::Inline(d) => Some(d),
            _ => None,
        }
    }

    /// Collects every reference reachable from this value, including those
    /// nested in lists, maps, and inline definitions.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        collect_references(self, &mut found);
        found
    }
}

fn collect_references<'a>(value: &'a Value, found: &mut Vec<&'a Reference>) {
    match value {
        Value::Reference(r) => found.push(r),
        Value::List(items) => items.iter().for_each(|v| collect_references(v, found)),
        Value::Map(entries) => entries.values().for_each(|v| collect_references(v, found)),
        Value::Inline(def) => def.values().for_each(|v| collect_references(v, found)),
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::String(_)
        | Value::Native(_) => {}
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Reference(r)
    }
}

impl From<Definition> for Value {
    fn from(d: Definition) -> Self {
        Self::Inline(Box::new(d))
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_values_compare_by_identity() {
        let a = NativeValue::new(String::from("socket"));
        let b = NativeValue::new(String::from("socket"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("socket"));
    }

    #[test]
    fn references_are_collected_through_nesting() {
        let inline = Definition::new("Inner").with_argument(Value::service("deep"));
        let value = Value::List(vec![
            Value::service("a"),
            Value::Map(BTreeMap::from([("k".to_owned(), Value::service("b"))])),
            Value::from(inline),
            Value::from("plain"),
        ]);
        let ids: Vec<&str> = value.references().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "deep"]);
    }

    #[test]
    fn reference_defaults_to_exception_policy() {
        let r = Reference::new("Mailer");
        assert_eq!(r.id.as_str(), "mailer");
        assert_eq!(r.policy, ReferencePolicy::Exception);
    }
}
