//! Service lookup abstraction implemented by every container.

use std::rc::Rc;

use wireup_common::error::{Result, WireupError};
use wireup_common::types::ReferencePolicy;

use crate::instance::Instance;
use crate::value::Value;

/// Lookup of services and parameters by identifier.
///
/// Implemented by [`crate::GraphContainer`] and by generated containers.
pub trait ServiceLocator {
    /// Returns the service `id`, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::UnknownService`] if `id` is not defined, or any
    /// error raised while building it.
    fn get(&self, id: &str) -> Result<Rc<Instance>>;

    /// Returns whether `id` is defined or has been injected.
    fn has(&self, id: &str) -> bool;

    /// Returns a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::ParameterNotFound`] if the name is unknown.
    fn parameter(&self, name: &str) -> Result<Value>;

    /// Returns the service currently under construction, if any.
    fn current(&self) -> Option<String>;

    /// Materialises a reference according to its policy.
    ///
    /// A missing target under [`ReferencePolicy::Exception`] fails with
    /// [`WireupError::InvalidReference`]; the other policies yield
    /// [`Value::Null`], as does a synthetic service nobody injected.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is missing under the exception policy
    /// or fails to build.
    fn reference(&self, id: &str, policy: ReferencePolicy) -> Result<Value> {
        if self.has(id) {
            return match (self.get(id), policy) {
                (Ok(instance), _) => Ok(Value::Service(instance)),
                (Err(WireupError::SyntheticNotSet { .. }), ReferencePolicy::Null | ReferencePolicy::Ignore) => {
                    Ok(Value::Null)
                }
                (Err(err), _) => Err(err),
            };
        }
        match policy {
            ReferencePolicy::Exception => Err(WireupError::InvalidReference {
                id: id.to_owned(),
                referenced_by: self.current().unwrap_or_default(),
            }),
            ReferencePolicy::Null | ReferencePolicy::Ignore => Ok(Value::Null),
        }
    }
}
