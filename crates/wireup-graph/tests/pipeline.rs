//! End-to-end tests for the compilation pipeline.
//!
//! Each test registers definitions the way a configuration loader would,
//! runs the default [`Compiler`], and inspects the resolved graph.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use wireup_common::config::CompilerConfig;
use wireup_common::error::WireupError;
use wireup_common::types::ReferencePolicy;
use wireup_graph::{Compiler, Definition, DefinitionStore, NativeValue, ResolvedGraph, Value};

fn compile(store: DefinitionStore) -> ResolvedGraph {
    Compiler::default().compile(store).expect("should compile")
}

// ── Template resolution ──────────────────────────────────────────────

#[test]
fn child_overrides_first_argument_and_class() {
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

    let graph = compile(store);
    let child = graph.definition("child").expect("child");
    assert_eq!(child.class(), Some("bar"));
    assert_eq!(child.arguments(), &[Value::from("a"), Value::from("b")]);
    assert!(child.parent().is_none());
}

#[test]
fn concrete_child_of_abstract_parent_survives_alone() {
    let mut store = DefinitionStore::new();
    store.register(
        "base",
        Definition::new("Repository")
            .with_abstract(true)
            .with_scope("request")
            .with_call("setLogger", vec![Value::from("stdout")]),
    );
    store.register(
        "users",
        Definition::child_of("base").with_call("setTable", vec![Value::from("users")]),
    );

    let graph = compile(store);
    assert!(graph.definition("base").is_none());
    let users = graph.definition("users").expect("users");
    assert!(!users.is_abstract());
    assert_eq!(users.scope(), "container");
    let methods: Vec<&str> = users.calls().iter().map(|c| c.method.as_str()).collect();
    assert_eq!(methods, vec!["setLogger", "setTable"]);
}

#[test]
fn circular_templates_abort_compilation() {
    let mut store = DefinitionStore::new();
    store.register("a", Definition::child_of("c"));
    store.register("b", Definition::child_of("a"));
    store.register("c", Definition::child_of("b"));
    let err = Compiler::default().compile(store).unwrap_err();
    assert!(matches!(err, WireupError::CircularTemplate { .. }), "got: {err}");
}

// ── Invalid references ───────────────────────────────────────────────

#[test]
fn null_argument_and_ignored_method_call() {
    let mut store = DefinitionStore::new();
    store.register(
        "foo",
        Definition::new("Foo")
            .with_argument(Value::service_with_policy("bar", ReferencePolicy::Null))
            .with_call(
                "foo",
                vec![Value::service_with_policy("moo", ReferencePolicy::Ignore)],
            ),
    );

    let graph = compile(store);
    let foo = graph.definition("foo").expect("foo");
    assert_eq!(foo.arguments(), &[Value::Null]);
    assert!(foo.calls().is_empty());
}

#[test]
fn exception_reference_to_missing_service_is_kept() {
    let mut store = DefinitionStore::new();
    store.register("foo", Definition::new("Foo").with_argument(Value::service("ghost")));
    let graph = compile(store);
    let foo = graph.definition("foo").expect("foo");
    assert_eq!(
        foo.arguments()[0].as_reference().map(|r| r.id.as_str()),
        Some("ghost")
    );
}

// ── Inlining ─────────────────────────────────────────────────────────

#[test]
fn shared_public_target_is_not_inlined() {
    let mut store = DefinitionStore::new();
    store.register("b", Definition::new("B"));
    store.register(
        "a",
        Definition::new("A")
            .with_argument(Value::service("b"))
            .with_argument(Value::service("b")),
    );

    let graph = compile(store);
    let a = graph.definition("a").expect("a");
    assert!(a.arguments().iter().all(|v| v.as_reference().is_some()));
    assert!(graph.definition("b").is_some());
}

#[test]
fn alias_to_non_shared_target_is_inlined() {
    let mut store = DefinitionStore::new();
    store.register("factory", Definition::new("Widget").with_shared(false));
    store.set_alias("widget", "factory").expect("alias");
    store.register(
        "consumer",
        Definition::new("Consumer").with_argument(Value::service("widget")),
    );
    store.register(
        "other",
        Definition::new("Other").with_argument(Value::service("widget")),
    );

    let graph = compile(store);
    let embedded = graph.definition("consumer").expect("consumer").arguments()[0]
        .as_inline()
        .expect("inlined");
    assert_eq!(embedded.class(), Some("Widget"));
    assert!(!embedded.is_shared());
    assert!(graph.definition("other").expect("other").arguments()[0].as_inline().is_some());
    assert_eq!(graph.resolve_alias("widget").as_str(), "factory");
}

#[test]
fn private_helpers_are_inlined_then_removed() {
    let mut store = DefinitionStore::new();
    store.register("formatter", Definition::new("Formatter").with_public(false));
    store.register(
        "handler",
        Definition::new("Handler")
            .with_public(false)
            .with_argument(Value::service("formatter")),
    );
    store.register("logger", Definition::new("Logger").with_argument(Value::service("handler")));

    let graph = compile(store);
    assert_eq!(graph.definitions().len(), 1);
    let handler = graph.definition("logger").expect("logger").arguments()[0]
        .as_inline()
        .expect("handler inlined");
    let formatter = handler.arguments()[0].as_inline().expect("formatter inlined");
    assert_eq!(formatter.class(), Some("Formatter"));
}

#[test]
fn private_service_shared_by_two_consumers_is_kept() {
    let mut store = DefinitionStore::new();
    store.register("pool", Definition::new("Pool").with_public(false));
    store.register("repo_a", Definition::new("Repo").with_argument(Value::service("pool")));
    store.register("repo_b", Definition::new("Repo").with_argument(Value::service("pool")));

    let graph = compile(store);
    assert!(graph.definition("pool").is_some());
}

#[test]
fn shared_dependency_of_non_shared_service_stays_a_reference() {
    let mut store = DefinitionStore::new();
    store.register("pool", Definition::new("Pool").with_public(false));
    store.register(
        "session",
        Definition::new("Session")
            .with_shared(false)
            .with_argument(Value::service("pool")),
    );
    store.register("app", Definition::new("App").with_argument(Value::service("session")));

    let graph = compile(store);
    assert!(graph.definition("pool").is_some(), "pool must stay a single instance");

    let direct = graph.definition("session").expect("session").arguments()[0]
        .as_reference()
        .expect("session keeps a reference");
    assert_eq!(direct.id.as_str(), "pool");

    let embedded = graph.definition("app").expect("app").arguments()[0]
        .as_inline()
        .expect("non-shared session inlined into app");
    let nested = embedded.arguments()[0]
        .as_reference()
        .expect("embedded session keeps a reference");
    assert_eq!(nested.id.as_str(), "pool");
}

// ── Checks ───────────────────────────────────────────────────────────

#[test]
fn circular_references_abort_compilation() {
    let mut store = DefinitionStore::new();
    store.register("a", Definition::new("A").with_argument(Value::service("b")));
    store.register("b", Definition::new("B").with_property("a", Value::service("a")));
    let err = Compiler::default().compile(store).unwrap_err();
    let WireupError::CircularReference { chain } = err else {
        panic!("expected circular reference, got {err}");
    };
    assert_eq!(chain.first(), chain.last());
}

#[test]
fn parameters_are_substituted_and_frozen() {
    let mut store = DefinitionStore::new();
    store.parameters_mut().set("db.host", "localhost").expect("set");
    store.parameters_mut().set("db.dsn", "pg://%db.host%/app").expect("set");
    store.parameters_mut().set("discount", "15%%").expect("set");
    store.register(
        "db",
        Definition::new("Connection")
            .with_argument("%db.dsn%")
            .with_argument("rate: %discount%"),
    );

    let graph = compile(store);
    assert!(graph.parameters().is_frozen());
    assert_eq!(
        graph.definition("db").expect("db").arguments(),
        &[Value::from("pg://localhost/app"), Value::from("rate: 15%")]
    );
    assert_eq!(graph.parameters().get("discount").expect("discount"), &Value::from("15%"));
}

#[test]
fn native_values_survive_compilation() {
    let mut store = DefinitionStore::new();
    store.register(
        "socket",
        Definition::new("Socket").with_argument(Value::Native(NativeValue::new(42_u16))),
    );
    let graph = compile(store);
    assert!(matches!(
        graph.definition("socket").expect("socket").arguments()[0],
        Value::Native(_)
    ));
}

#[test]
fn tagged_services_can_be_found_after_compilation() {
    let mut store = DefinitionStore::new();
    store.register(
        "listener",
        Definition::new("Listener").with_tag(
            "kernel.event_listener",
            [("event".to_owned(), "kernel.request".to_owned())].into(),
        ),
    );
    let graph = Compiler::new(&CompilerConfig::default())
        .compile(store)
        .expect("compile");
    let tagged = graph.find_tagged_service_ids("kernel.event_listener");
    assert_eq!(tagged.len(), 1);
}
