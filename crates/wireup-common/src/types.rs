//! Domain primitive types used across the wireup workspace.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a service, alias, or parent template.
///
/// Identifiers are case-insensitive: they are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ServiceId(String);

impl ServiceId {
    /// Creates a service ID, normalising it to lowercase.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().to_lowercase())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> Self {
        id.0
    }
}

impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What happens when a reference points at a service that does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Leave the reference alone; fail when the runtime materialises it.
    #[default]
    Exception,
    /// Replace the reference with null.
    Null,
    /// Drop the enclosing method call, or null it in constructor position.
    Ignore,
}

impl ReferencePolicy {
    /// Returns the lowercase keyword used by the exporters.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Exception => "exception",
            Self::Null => "null",
            Self::Ignore => "ignore",
        }
    }
}

impl fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn service_id_is_lowercased() {
        assert_eq!(ServiceId::new("Foo.Bar").as_str(), "foo.bar");
        assert_eq!(ServiceId::from("FOO"), ServiceId::from("foo"));
    }

    #[test]
    fn service_id_map_lookup_by_str() {
        let mut map = BTreeMap::new();
        let _ = map.insert(ServiceId::new("mailer"), 1);
        assert_eq!(map.get("mailer"), Some(&1));
    }

    #[test]
    fn reference_policy_defaults_to_exception() {
        assert_eq!(ReferencePolicy::default(), ReferencePolicy::Exception);
        assert_eq!(ReferencePolicy::Ignore.to_string(), "ignore");
    }
}
