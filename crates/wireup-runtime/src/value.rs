//! Runtime values handed to constructors, properties, and method calls.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::instance::Instance;

/// A materialised argument.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null sentinel.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Value>),
    /// A built service.
    Service(Rc<Instance>),
}

impl Value {
    /// Builds a map from literal entries.
    #[must_use]
    pub fn map<const N: usize>(entries: [(&str, Self); N]) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value))
                .collect(),
        )
    }

    /// Returns whether this is the null sentinel.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the service payload, if any.
    #[must_use]
    pub const fn as_service(&self) -> Option<&Rc<Instance>> {
        match self {
            Self::Service(instance) => Some(instance),
            _ => None,
        }
    }
}

/// Services compare by identity, everything else structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Service(a), Self::Service(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
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

impl From<Rc<Instance>> for Value {
    fn from(instance: Rc<Instance>) -> Self {
        Self::Service(instance)
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
    fn services_compare_by_identity() {
        let a = Instance::builder("Foo").build();
        let b = Instance::builder("Foo").build();
        assert_eq!(Value::from(Rc::clone(&a)), Value::from(Rc::clone(&a)));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn map_helper_builds_owned_keys() {
        let value = Value::map([("host", Value::from("db")), ("port", Value::Int(5432))]);
        let Value::Map(entries) = value else {
            panic!("expected a map");
        };
        assert_eq!(entries.get("port"), Some(&Value::Int(5432)));
    }
}
