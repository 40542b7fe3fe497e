//! Parent/child template resolution.

use std::collections::BTreeMap;

use wireup_common::error::{Result, WireupError};
use wireup_common::types::ServiceId;

use super::{CompilerPass, PassOutcome};
use crate::definition::Definition;
use crate::store::DefinitionStore;

/// Replaces every child definition with its merge onto its parent chain.
///
/// Ancestors are resolved first, so a grandparent's arguments reach the
/// child unless an intermediate level overrides them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolveDefinitionTemplates;

impl CompilerPass for ResolveDefinitionTemplates {
    fn name(&self) -> &'static str {
        "resolve_templates"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        let children: Vec<ServiceId> = store
            .all()
            .iter()
            .filter(|(_, def)| def.parent().is_some())
            .map(|(id, _)| id.clone())
            .collect();
        if children.is_empty() {
            return Ok(PassOutcome::Unchanged);
        }
        tracing::info!(count = children.len(), "resolving definition templates");

        let mut resolved: BTreeMap<ServiceId, Definition> = BTreeMap::new();
        for id in &children {
            let mut stack = Vec::new();
            let _ = resolve(store, id, &mut resolved, &mut stack)?;
        }
        for (id, definition) in resolved {
            store.register(id, definition);
        }
        Ok(PassOutcome::Changed)
    }
}

fn resolve(
    store: &DefinitionStore,
    id: &ServiceId,
    resolved: &mut BTreeMap<ServiceId, Definition>,
    stack: &mut Vec<ServiceId>,
) -> Result<Definition> {
    if let Some(done) = resolved.get(id) {
        return Ok(done.clone());
    }
    if stack.contains(id) {
        let mut chain: Vec<String> = stack
            .iter()
            .skip_while(|entry| *entry != id)
            .map(ToString::to_string)
            .collect();
        chain.push(id.to_string());
        return Err(WireupError::CircularTemplate { chain });
    }

    let definition = store.get(id.as_str())?;
    let Some(parent_id) = definition.parent() else {
        return Ok(definition.clone());
    };
    let parent_target = store.resolve_alias(parent_id.as_str())?;
    if !store.has_definition(parent_target.as_str()) {
        return Err(WireupError::MissingParent {
            id: id.to_string(),
            parent: parent_id.to_string(),
        });
    }

    stack.push(id.clone());
    let parent = resolve(store, &parent_target, resolved, stack)?;
    let _ = stack.pop();

    tracing::debug!(id = %id, parent = %parent_target, "merged child definition");
    let merged = merge(&parent, definition);
    let _ = resolved.insert(id.clone(), merged.clone());
    Ok(merged)
}

/// Merges `child` onto an already resolved `parent`.
///
/// The class and an explicitly chosen visibility come from the child when
/// set. Arguments start from the parent's list, then the child's indexed
/// overrides are applied in index order (an index at or past the end
/// appends), then the child's own arguments follow. Properties are the
/// parent's with the child's keys winning. Method calls are the parent's
/// followed by the child's. Abstract, scope, tags, shared, and synthetic are
/// the child's own. The result has no parent.
#[must_use]
pub fn merge(parent: &Definition, child: &Definition) -> Definition {
    let mut merged = child.clone();
    merged.detach();

    if child.class().is_none() {
        merged.set_class(parent.class().map(ToOwned::to_owned));
    }
    if !child.is_public_explicit() {
        merged.set_public(parent.is_public());
    }

    let mut arguments = parent.arguments().to_vec();
    for (&index, value) in child.argument_overrides() {
        if let Some(slot) = arguments.get_mut(index) {
            *slot = value.clone();
        } else {
            arguments.push(value.clone());
        }
    }
    arguments.extend(child.arguments().iter().cloned());
    *merged.arguments_mut() = arguments;

    let mut properties = parent.properties().clone();
    properties.extend(
        child
            .properties()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    *merged.properties_mut() = properties;

    let mut calls = parent.calls().to_vec();
    calls.extend(child.calls().iter().cloned());
    *merged.calls_mut() = calls;

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TagAttributes;
    use crate::value::Value;

    fn run(store: &mut DefinitionStore) -> Result<PassOutcome> {
        ResolveDefinitionTemplates.process(store)
    }

    #[test]
    fn child_overrides_indexed_argument_and_class() {
        let mut store = DefinitionStore::new();
        store.register(
            "parent",
            Definition::new("foo").with_argument("moo").with_argument("b"),
        );
        store.register(
            "child",
            Definition::child_of("parent")
                .with_replaced_argument(0, "a")
                .with_class("bar"),
        );

        assert_eq!(run(&mut store).expect("run"), PassOutcome::Changed);
        let child = store.get("child").expect("child");
        assert_eq!(child.class(), Some("bar"));
        assert_eq!(child.arguments(), &[Value::from("a"), Value::from("b")]);
        assert!(child.parent().is_none());
        assert!(child.argument_overrides().is_empty());
    }

    #[test]
    fn override_past_the_end_extends_without_gaps() {
        let mut store = DefinitionStore::new();
        store.register("parent", Definition::new("Foo").with_argument("x"));
        store.register(
            "child",
            Definition::child_of("parent")
                .with_replaced_argument(5, "y")
                .with_argument("z"),
        );
        run(&mut store).expect("run");
        assert_eq!(
            store.get("child").expect("child").arguments(),
            &[Value::from("x"), Value::from("y"), Value::from("z")]
        );
    }

    #[test]
    fn grandparent_arguments_reach_the_child() {
        let mut store = DefinitionStore::new();
        store.register(
            "grand",
            Definition::new("Base")
                .with_argument("g0")
                .with_argument("g1")
                .with_argument("g2"),
        );
        store.register(
            "parent",
            Definition::child_of("grand").with_replaced_argument(1, "p1"),
        );
        store.register(
            "child",
            Definition::child_of("parent").with_replaced_argument(2, "c2"),
        );
        run(&mut store).expect("run");
        let child = store.get("child").expect("child");
        assert_eq!(child.class(), Some("Base"));
        assert_eq!(
            child.arguments(),
            &[Value::from("g0"), Value::from("p1"), Value::from("c2")]
        );
    }

    #[test]
    fn method_calls_always_append_across_levels() {
        let mut store = DefinitionStore::new();
        store.register("grand", Definition::new("Base").with_call("setUp", vec![]));
        store.register(
            "parent",
            Definition::child_of("grand").with_call("setUp", vec![Value::from(1_i64)]),
        );
        store.register(
            "child",
            Definition::child_of("parent").with_call("configure", vec![]),
        );
        run(&mut store).expect("run");
        let methods: Vec<&str> = store
            .get("child")
            .expect("child")
            .calls()
            .iter()
            .map(|c| c.method.as_str())
            .collect();
        assert_eq!(methods, vec!["setUp", "setUp", "configure"]);
    }

    #[test]
    fn abstract_scope_and_tags_are_not_inherited() {
        let mut store = DefinitionStore::new();
        store.register(
            "parent",
            Definition::new("Base")
                .with_abstract(true)
                .with_scope("request")
                .with_tag("kernel.listener", TagAttributes::new())
                .with_shared(false),
        );
        store.register("child", Definition::child_of("parent"));
        run(&mut store).expect("run");
        let child = store.get("child").expect("child");
        assert!(!child.is_abstract());
        assert_eq!(child.scope(), "container");
        assert!(child.tags().is_empty());
        assert!(child.is_shared());
        assert!(store.get("parent").expect("parent").is_abstract());
    }

    #[test]
    fn visibility_is_inherited_unless_explicit() {
        let mut store = DefinitionStore::new();
        store.register("parent", Definition::new("Base").with_public(false));
        store.register("implicit", Definition::child_of("parent"));
        store.register("explicit", Definition::child_of("parent").with_public(true));
        run(&mut store).expect("run");
        assert!(!store.get("implicit").expect("implicit").is_public());
        assert!(store.get("explicit").expect("explicit").is_public());
    }

    #[test]
    fn properties_merge_with_child_winning() {
        let mut store = DefinitionStore::new();
        store.register(
            "parent",
            Definition::new("Base")
                .with_property("a", "parent")
                .with_property("b", "parent"),
        );
        store.register("child", Definition::child_of("parent").with_property("b", "child"));
        run(&mut store).expect("run");
        let props = store.get("child").expect("child").properties().clone();
        assert_eq!(props.get("a"), Some(&Value::from("parent")));
        assert_eq!(props.get("b"), Some(&Value::from("child")));
    }

    #[test]
    fn missing_parent_fails() {
        let mut store = DefinitionStore::new();
        store.register("child", Definition::child_of("ghost"));
        let err = run(&mut store).unwrap_err();
        assert!(matches!(err, WireupError::MissingParent { .. }), "got: {err}");
    }

    #[test]
    fn circular_parent_chain_fails() {
        let mut store = DefinitionStore::new();
        store.register("a", Definition::child_of("b"));
        store.register("b", Definition::child_of("a"));
        let err = run(&mut store).unwrap_err();
        let WireupError::CircularTemplate { chain } = err else {
            panic!("expected circular template, got {err}");
        };
        assert_eq!(chain, vec!["a", "b", "a"]);
    }

    #[test]
    fn parent_may_be_an_alias() {
        let mut store = DefinitionStore::new();
        store.register("base", Definition::new("Base").with_argument("x"));
        store.set_alias("base_alias", "base").expect("alias");
        store.register("child", Definition::child_of("base_alias"));
        run(&mut store).expect("run");
        assert_eq!(store.get("child").expect("child").class(), Some("Base"));
    }

    #[test]
    fn store_without_children_is_unchanged() {
        let mut store = DefinitionStore::new();
        store.register("foo", Definition::new("Foo"));
        assert_eq!(run(&mut store).expect("run"), PassOutcome::Unchanged);
    }
}
