//! Built service instances.
//!
//! An [`Instance`] records how a service was assembled: its class, the
//! constructor arguments it received, its injected properties, and the
//! method calls applied to it, in order.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::value::Value;

/// One method call applied after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Method name.
    pub method: String,
    /// Arguments passed.
    pub arguments: Vec<Value>,
}

/// A built service.
#[derive(Debug)]
pub struct Instance {
    class: String,
    arguments: Vec<Value>,
    properties: BTreeMap<String, Value>,
    calls: Vec<Invocation>,
}

impl Instance {
    /// Starts building an instance of `class`.
    #[must_use]
    pub fn builder(class: impl Into<String>) -> InstanceBuilder {
        InstanceBuilder {
            instance: Self {
                class: class.into(),
                arguments: Vec::new(),
                properties: BTreeMap::new(),
                calls: Vec::new(),
            },
        }
    }

    /// Returns the class.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns the constructor arguments.
    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Returns the constructor argument at `index`.
    #[must_use]
    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    /// Returns the injected properties.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Returns one injected property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Returns the applied method calls in order.
    #[must_use]
    pub fn calls(&self) -> &[Invocation] {
        &self.calls
    }
}

/// Incremental construction of an [`Instance`].
#[derive(Debug)]
pub struct InstanceBuilder {
    instance: Instance,
}

impl InstanceBuilder {
    /// Appends a constructor argument.
    #[must_use]
    pub fn argument(mut self, value: impl Into<Value>) -> Self {
        self.instance.arguments.push(value.into());
        self
    }

    /// Injects a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.instance.properties.insert(name.into(), value.into());
        self
    }

    /// Applies a method call.
    #[must_use]
    pub fn call(mut self, method: impl Into<String>, arguments: Vec<Value>) -> Self {
        self.instance.calls.push(Invocation {
            method: method.into(),
            arguments,
        });
        self
    }

    /// Applies a method call only when `condition` holds.
    #[must_use]
    pub fn call_when(self, condition: bool, method: impl Into<String>, arguments: Vec<Value>) -> Self {
        if condition {
            self.call(method, arguments)
        } else {
            self
        }
    }

    /// Finishes the instance.
    #[must_use]
    pub fn build(self) -> Rc<Instance> {
        Rc::new(self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_records_everything_in_order() {
        let instance = Instance::builder("Mailer")
            .argument("smtp")
            .argument(25_i64)
            .property("debug", true)
            .call("setFrom", vec![Value::from("noreply@example.com")])
            .call_when(false, "skipped", Vec::new())
            .call_when(true, "setRetries", vec![Value::Int(3)])
            .build();

        assert_eq!(instance.class(), "Mailer");
        assert_eq!(instance.argument(1), Some(&Value::Int(25)));
        assert_eq!(instance.property("debug"), Some(&Value::Bool(true)));
        let methods: Vec<&str> = instance.calls().iter().map(|c| c.method.as_str()).collect();
        assert_eq!(methods, vec!["setFrom", "setRetries"]);
    }
}
