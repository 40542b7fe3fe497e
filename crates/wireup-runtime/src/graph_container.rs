//! A container that builds services straight from a [`ResolvedGraph`].

use std::collections::BTreeMap;
use std::rc::Rc;

use wireup_common::error::{Result, WireupError};
use wireup_common::types::ReferencePolicy;
use wireup_graph::{Definition, ResolvedGraph};

use crate::container::Container;
use crate::instance::Instance;
use crate::locator::ServiceLocator;
use crate::value::Value;

type GraphValue = wireup_graph::Value;

/// Interprets a resolved graph: services are built lazily on first lookup,
/// shared ones are memoised.
#[derive(Debug)]
pub struct GraphContainer {
    graph: ResolvedGraph,
    base: Container,
}

impl GraphContainer {
    /// Creates a container for `graph`, registering its parameters and
    /// aliases.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::UnsupportedValue`] if a parameter holds a
    /// value that has no runtime form.
    pub fn new(graph: ResolvedGraph) -> Result<Self> {
        let mut base = Container::new();
        for (name, value) in graph.parameters().all() {
            let value = literal(value, &format!("parameter \"{name}\""))?;
            if graph.parameters().is_dynamic(name) {
                base.set_dynamic_parameter(name, value);
            } else {
                base.set_parameter(name, value);
            }
        }
        for (name, alias) in graph.aliases() {
            base.set_alias(name.as_str(), alias.target.as_str(), alias.public);
        }
        tracing::debug!(services = graph.definitions().len(), "graph container ready");
        Ok(Self { graph, base })
    }

    /// Returns the graph being interpreted.
    #[must_use]
    pub const fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    /// Injects the instance of a synthetic service.
    pub fn set(&self, id: &str, instance: Rc<Instance>) {
        self.base.set(id, instance);
    }

    /// Supplies the runtime value of a dynamic parameter.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) {
        self.base.set_parameter(name, value);
    }

    fn instantiate(&self, id: &str, definition: &Definition) -> Result<Rc<Instance>> {
        if definition.is_synthetic() {
            return self.base.synthetic(id);
        }
        let build = || self.build(id, definition);
        if definition.is_shared() {
            self.base.shared(id, build)
        } else {
            self.base.fresh(id, build)
        }
    }

    fn build(&self, owner: &str, definition: &Definition) -> Result<Rc<Instance>> {
        let class = definition
            .class()
            .ok_or_else(|| WireupError::InvalidDefinition {
                id: owner.to_owned(),
                reason: "a concrete service must have a class".to_owned(),
            })?;
        let mut builder = Instance::builder(class);
        for (index, value) in definition.arguments().iter().enumerate() {
            let location = format!("service \"{owner}\" argument {index}");
            builder = builder.argument(self.materialise(owner, value, &location)?);
        }
        for (name, value) in definition.properties() {
            let location = format!("service \"{owner}\" property \"{name}\"");
            builder = builder.property(name.clone(), self.materialise(owner, value, &location)?);
        }
        for call in definition.calls() {
            if call.arguments.iter().any(|value| self.has_missing_optional(value)) {
                tracing::debug!(service = owner, method = %call.method, "skipping call with absent optional service");
                continue;
            }
            let location = format!("service \"{owner}\" call \"{}\"", call.method);
            let arguments = call
                .arguments
                .iter()
                .map(|value| self.materialise(owner, value, &location))
                .collect::<Result<Vec<_>>>()?;
            builder = builder.call(call.method.clone(), arguments);
        }
        Ok(builder.build())
    }

    fn materialise(&self, owner: &str, value: &GraphValue, location: &str) -> Result<Value> {
        match value {
            GraphValue::String(s) if self.graph.parameters().contains_dynamic(s) => self.base.expand(s),
            GraphValue::List(items) => items
                .iter()
                .map(|item| self.materialise(owner, item, location))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            GraphValue::Map(entries) => entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.materialise(owner, item, location)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Map),
            GraphValue::Reference(reference) => self.reference(reference.id.as_str(), reference.policy),
            GraphValue::Inline(inner) => self.build(owner, inner).map(Value::Service),
            other => literal(other, location),
        }
    }

    fn has_missing_optional(&self, value: &GraphValue) -> bool {
        match value {
            GraphValue::Reference(reference) => {
                reference.policy == ReferencePolicy::Ignore && !self.has(reference.id.as_str())
            }
            GraphValue::List(items) => items.iter().any(|item| self.has_missing_optional(item)),
            GraphValue::Map(entries) => entries.values().any(|item| self.has_missing_optional(item)),
            _ => false,
        }
    }
}

impl ServiceLocator for GraphContainer {
    fn get(&self, id: &str) -> Result<Rc<Instance>> {
        let resolved = self.base.resolve_alias(id);
        match self.graph.definition(&resolved) {
            Some(definition) => self.instantiate(&resolved, definition),
            None if self.base.initialized(&resolved) => self.base.synthetic(&resolved),
            None => Err(self.base.unknown(id)),
        }
    }

    fn has(&self, id: &str) -> bool {
        let resolved = self.base.resolve_alias(id);
        self.graph.definition(&resolved).is_some() || self.base.initialized(&resolved)
    }

    fn parameter(&self, name: &str) -> Result<Value> {
        self.base.parameter(name)
    }

    fn current(&self) -> Option<String> {
        self.base.current()
    }
}

/// Converts a literal graph value into its runtime form.
fn literal(value: &GraphValue, location: &str) -> Result<Value> {
    match value {
        GraphValue::Null => Ok(Value::Null),
        GraphValue::Bool(b) => Ok(Value::Bool(*b)),
        GraphValue::Int(n) => Ok(Value::Int(*n)),
        GraphValue::Float(n) => Ok(Value::Float(*n)),
        GraphValue::String(s) => Ok(Value::Str(s.clone())),
        GraphValue::List(items) => items
            .iter()
            .map(|item| literal(item, location))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        GraphValue::Map(entries) => entries
            .iter()
            .map(|(key, item)| Ok((key.clone(), literal(item, location)?)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Value::Map),
        GraphValue::Reference(_) | GraphValue::Inline(_) | GraphValue::Native(_) => {
            Err(WireupError::UnsupportedValue {
                kind: value.kind(),
                location: location.to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireup_graph::{Compiler, DefinitionStore, NativeValue};

    fn container(store: DefinitionStore) -> GraphContainer {
        let graph = Compiler::default().compile(store).expect("compile");
        GraphContainer::new(graph).expect("container")
    }

    #[test]
    fn shared_dependency_is_built_once() {
        let mut store = DefinitionStore::new();
        store.register("b", wireup_graph::Definition::new("B"));
        store.register(
            "a",
            wireup_graph::Definition::new("A")
                .with_argument(GraphValue::service("b"))
                .with_argument(GraphValue::service("b")),
        );
        let container = container(store);
        let a = container.get("a").expect("a");
        let first = a.argument(0).and_then(Value::as_service).expect("first");
        let second = a.argument(1).and_then(Value::as_service).expect("second");
        assert!(Rc::ptr_eq(first, second));
        assert!(Rc::ptr_eq(first, &container.get("b").expect("b")));
    }

    #[test]
    fn non_shared_services_are_rebuilt() {
        let mut store = DefinitionStore::new();
        store.register("w", wireup_graph::Definition::new("Widget").with_shared(false));
        let container = container(store);
        let one = container.get("w").expect("one");
        let two = container.get("w").expect("two");
        assert!(!Rc::ptr_eq(&one, &two));
    }

    #[test]
    fn missing_exception_reference_fails_on_access() {
        let mut store = DefinitionStore::new();
        store.register(
            "foo",
            wireup_graph::Definition::new("Foo").with_argument(GraphValue::service("ghost")),
        );
        let container = container(store);
        let err = container.get("foo").unwrap_err();
        assert!(
            matches!(
                err,
                WireupError::InvalidReference { ref id, ref referenced_by }
                    if id == "ghost" && referenced_by == "foo"
            ),
            "got: {err}"
        );
    }

    #[test]
    fn unknown_service_lookup_fails() {
        let container = container(DefinitionStore::new());
        let err = container.get("nope").unwrap_err();
        assert!(matches!(err, WireupError::UnknownService { .. }), "got: {err}");
    }

    #[test]
    fn synthetic_service_must_be_set() {
        let mut store = DefinitionStore::new();
        store.register("request", wireup_graph::Definition::default().with_synthetic(true));
        store.register(
            "handler",
            wireup_graph::Definition::new("Handler").with_argument(GraphValue::service("request")),
        );
        let container = container(store);
        assert!(matches!(
            container.get("handler").unwrap_err(),
            WireupError::SyntheticNotSet { .. }
        ));

        let request = Instance::builder("Request").build();
        container.set("request", Rc::clone(&request));
        let handler = container.get("handler").expect("handler");
        let injected = handler.argument(0).and_then(Value::as_service).expect("request");
        assert!(Rc::ptr_eq(injected, &request));
    }

    #[test]
    fn optional_call_is_skipped_when_target_is_absent() {
        let mut store = DefinitionStore::new();
        store.register(
            "foo",
            wireup_graph::Definition::new("Foo").with_call(
                "setRequest",
                vec![GraphValue::service_with_policy("request", ReferencePolicy::Ignore)],
            ),
        );
        let config = wireup_common::config::CompilerConfig {
            exclusions: ["request".to_owned()].into(),
            ..Default::default()
        };
        let graph = Compiler::new(&config).compile(store).expect("compile");
        let container = GraphContainer::new(graph).expect("container");
        assert!(container.get("foo").expect("foo").calls().is_empty());

        container.set("request", Instance::builder("Request").build());
        assert!(container.get("foo").expect("foo").calls().is_empty());
    }

    #[test]
    fn dynamic_parameters_are_expanded_at_runtime() {
        let mut store = DefinitionStore::new();
        store.parameters_mut().set_dynamic("env", "dev").expect("set");
        store.register(
            "logger",
            wireup_graph::Definition::new("Logger").with_argument("/var/log/%env%.log"),
        );
        let graph = Compiler::default().compile(store).expect("compile");
        let mut container = GraphContainer::new(graph).expect("container");
        container.set_parameter("env", "prod");
        let logger = container.get("logger").expect("logger");
        assert_eq!(logger.argument(0), Some(&Value::from("/var/log/prod.log")));
    }

    #[test]
    fn native_arguments_cannot_be_built() {
        let mut store = DefinitionStore::new();
        store.register(
            "socket",
            wireup_graph::Definition::new("Socket")
                .with_argument(GraphValue::Native(NativeValue::new(7_u8))),
        );
        let err = container(store).get("socket").unwrap_err();
        assert!(matches!(err, WireupError::UnsupportedValue { .. }), "got: {err}");
    }
}
