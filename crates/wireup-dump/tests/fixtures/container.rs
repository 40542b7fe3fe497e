// @generated by wireup. Do not edit.

use std::rc::Rc;

use wireup_runtime::{Container, Instance, ReferencePolicy, Result, ServiceInfo, ServiceLocator, TagInfo, Value};

/// Service container compiled from a resolved service graph.
pub struct ProjectServiceContainer {
    base: Container,
}

impl ProjectServiceContainer {
    /// Every service of this container.
    pub const SERVICES: &'static [ServiceInfo] = &[
        ServiceInfo {
            id: "a",
            method: "get_a_service",
            class: Some("A"),
            public: true,
            shared: true,
            synthetic: false,
            scope: "container",
            tags: &[],
        },
        ServiceInfo {
            id: "b",
            method: "get_b_service",
            class: Some("B"),
            public: true,
            shared: true,
            synthetic: false,
            scope: "container",
            tags: &[],
        },
    ];

    /// Definitions embedded into other services.
    pub const INLINED: &'static [ServiceInfo] = &[
    ];

    /// Creates the container with its parameters and aliases.
    pub fn new() -> Self {
        let mut base = Container::new();
        base.set_parameter("greeting", Value::from("hello"));
        base.set_alias("b.alias", "b", true);
        Self { base }
    }

    /// Injects the instance of a synthetic service.
    pub fn set(&self, id: &str, instance: Rc<Instance>) {
        self.base.set(id, instance);
    }

    /// Builds service "a".
    pub fn get_a_service(&self) -> Result<Rc<Instance>> {
        self.base.shared("a", || {
            Ok(Instance::builder("A")
                .argument(self.reference("b", ReferencePolicy::Exception)?)
                .argument(self.reference("b", ReferencePolicy::Exception)?)
                .build())
        })
    }

    /// Builds service "b".
    pub fn get_b_service(&self) -> Result<Rc<Instance>> {
        self.base.shared("b", || {
            Ok(Instance::builder("B")
                .argument(Value::from("hello"))
                .build())
        })
    }
}

impl ServiceLocator for ProjectServiceContainer {
    fn get(&self, id: &str) -> Result<Rc<Instance>> {
        match self.base.resolve_alias(id).as_str() {
            "a" => self.get_a_service(),
            "b" => self.get_b_service(),
            other if self.base.initialized(other) => self.base.synthetic(other),
            _ => Err(self.base.unknown(id)),
        }
    }

    fn has(&self, id: &str) -> bool {
        let id = self.base.resolve_alias(id);
        ServiceInfo::find(Self::SERVICES, &id).is_some() || self.base.initialized(&id)
    }

    fn parameter(&self, name: &str) -> Result<Value> {
        self.base.parameter(name)
    }

    fn current(&self) -> Option<String> {
        self.base.current()
    }
}

impl Default for ProjectServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}
