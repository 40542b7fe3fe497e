//! Declarative YAML exporter and reader.
//!
//! ```yaml
//! parameters:
//!   mailer.transport: smtp
//!   env: !dynamic dev
//! services:
//!   mailer:
//!     class: Mailer
//!     arguments: ['%mailer.transport%', !service logger]
//!     calls:
//!       - [setCache, [!service_ignore cache]]
//!   mail: '@mailer'
//!   internal.mail: { alias: mailer, public: false }
//! ```
//!
//! Only attributes that differ from their defaults are written. References
//! carry their policy in the tag; inline definitions are tagged `!inline`.

use std::collections::{BTreeMap, BTreeSet};

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Number, Value as Yaml};
use wireup_common::config::DumpOptions;
use wireup_common::constants::DEFAULT_SCOPE;
use wireup_common::error::{Result, WireupError};
use wireup_common::types::{ReferencePolicy, ServiceId};
use wireup_graph::{Alias, Definition, ParameterBag, ResolvedGraph, TagAttributes, Value};

use crate::validate::check_exportable;
use crate::{Dumper, ExporterFormat};

const REFERENCE_TAGS: [(&str, ReferencePolicy); 3] = [
    ("service", ReferencePolicy::Exception),
    ("service_null", ReferencePolicy::Null),
    ("service_ignore", ReferencePolicy::Ignore),
];
const INLINE_TAG: &str = "inline";
const DYNAMIC_TAG: &str = "dynamic";
const ALIAS_PREFIX: char = '@';

/// Exporter producing a YAML document.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDumper;

impl Dumper for YamlDumper {
    fn format(&self) -> ExporterFormat {
        ExporterFormat::Yaml
    }

    fn dump(&self, graph: &ResolvedGraph, _options: &DumpOptions) -> Result<String> {
        check_exportable(graph)?;

        let mut parameters = Mapping::new();
        for (name, value) in graph.parameters().all() {
            let mut rendered = to_yaml(value, &format!("parameter \"{name}\""))?;
            if graph.parameters().is_dynamic(name) {
                rendered = tagged(DYNAMIC_TAG, rendered);
            }
            let _ = parameters.insert(Yaml::from(name.as_str()), rendered);
        }

        let mut services = Mapping::new();
        for (id, definition) in graph.definitions() {
            let rendered = definition_to_yaml(definition, &format!("service \"{id}\""))?;
            let _ = services.insert(Yaml::from(id.as_str()), rendered);
        }
        for (name, alias) in graph.aliases() {
            let _ = services.insert(Yaml::from(name.as_str()), alias_to_yaml(alias));
        }

        let mut root = Mapping::new();
        if !parameters.is_empty() {
            let _ = root.insert(Yaml::from("parameters"), Yaml::Mapping(parameters));
        }
        if !services.is_empty() {
            let _ = root.insert(Yaml::from("services"), Yaml::Mapping(services));
        }
        if root.is_empty() {
            return Ok("{}\n".to_owned());
        }
        let rendered = serde_yaml::to_string(&Yaml::Mapping(root))?;
        tracing::debug!(services = graph.definitions().len(), "rendered container yaml");
        Ok(rendered)
    }
}

fn tagged(tag: &str, value: Yaml) -> Yaml {
    Yaml::Tagged(Box::new(TaggedValue {
        tag: Tag::new(tag),
        value,
    }))
}

fn alias_to_yaml(alias: &Alias) -> Yaml {
    if alias.public {
        return Yaml::String(format!("{ALIAS_PREFIX}{}", alias.target));
    }
    let mut mapping = Mapping::new();
    let _ = mapping.insert(Yaml::from("alias"), Yaml::from(alias.target.as_str()));
    let _ = mapping.insert(Yaml::from("public"), Yaml::Bool(false));
    Yaml::Mapping(mapping)
}

fn definition_to_yaml(definition: &Definition, location: &str) -> Result<Yaml> {
    let mut mapping = Mapping::new();
    if let Some(class) = definition.class() {
        let _ = mapping.insert(Yaml::from("class"), Yaml::from(class));
    }
    if !definition.arguments().is_empty() {
        let arguments = definition
            .arguments()
            .iter()
            .enumerate()
            .map(|(index, value)| to_yaml(value, &format!("{location} argument {index}")))
            .collect::<Result<Vec<_>>>()?;
        let _ = mapping.insert(Yaml::from("arguments"), Yaml::Sequence(arguments));
    }
    if !definition.properties().is_empty() {
        let mut properties = Mapping::new();
        for (name, value) in definition.properties() {
            let rendered = to_yaml(value, &format!("{location} property \"{name}\""))?;
            let _ = properties.insert(Yaml::from(name.as_str()), rendered);
        }
        let _ = mapping.insert(Yaml::from("properties"), Yaml::Mapping(properties));
    }
    if !definition.calls().is_empty() {
        let mut calls = Vec::with_capacity(definition.calls().len());
        for call in definition.calls() {
            let call_location = format!("{location} call \"{}\"", call.method);
            let arguments = call
                .arguments
                .iter()
                .map(|value| to_yaml(value, &call_location))
                .collect::<Result<Vec<_>>>()?;
            calls.push(Yaml::Sequence(vec![
                Yaml::from(call.method.as_str()),
                Yaml::Sequence(arguments),
            ]));
        }
        let _ = mapping.insert(Yaml::from("calls"), Yaml::Sequence(calls));
    }
    if !definition.tags().is_empty() {
        let mut tags = Vec::new();
        for (name, occurrences) in definition.tags() {
            for attributes in occurrences {
                let mut tag = Mapping::new();
                let _ = tag.insert(Yaml::from("name"), Yaml::from(name.as_str()));
                if !attributes.is_empty() {
                    let attributes: Mapping = attributes
                        .iter()
                        .map(|(key, value)| (Yaml::from(key.as_str()), Yaml::from(value.as_str())))
                        .collect();
                    let _ = tag.insert(Yaml::from("attributes"), Yaml::Mapping(attributes));
                }
                tags.push(Yaml::Mapping(tag));
            }
        }
        let _ = mapping.insert(Yaml::from("tags"), Yaml::Sequence(tags));
    }
    if !definition.is_public() {
        let _ = mapping.insert(Yaml::from("public"), Yaml::Bool(false));
    }
    if !definition.is_shared() {
        let _ = mapping.insert(Yaml::from("shared"), Yaml::Bool(false));
    }
    if definition.is_synthetic() {
        let _ = mapping.insert(Yaml::from("synthetic"), Yaml::Bool(true));
    }
    if definition.scope() != DEFAULT_SCOPE {
        let _ = mapping.insert(Yaml::from("scope"), Yaml::from(definition.scope()));
    }
    Ok(Yaml::Mapping(mapping))
}

fn to_yaml(value: &Value, location: &str) -> Result<Yaml> {
    match value {
        Value::Null => Ok(Yaml::Null),
        Value::Bool(b) => Ok(Yaml::Bool(*b)),
        Value::Int(n) => Ok(Yaml::Number(Number::from(*n))),
        Value::Float(n) => Ok(Yaml::Number(Number::from(*n))),
        Value::String(s) => Ok(Yaml::String(s.clone())),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| to_yaml(item, &format!("{location}[{index}]")))
            .collect::<Result<Vec<_>>>()
            .map(Yaml::Sequence),
        Value::Map(entries) => entries
            .iter()
            .map(|(key, item)| {
                Ok((
                    Yaml::from(key.as_str()),
                    to_yaml(item, &format!("{location}[\"{key}\"]"))?,
                ))
            })
            .collect::<Result<Mapping>>()
            .map(Yaml::Mapping),
        Value::Reference(reference) => {
            let tag = REFERENCE_TAGS
                .iter()
                .find(|(_, policy)| *policy == reference.policy)
                .map_or("service", |(tag, _)| *tag);
            Ok(tagged(tag, Yaml::from(reference.id.as_str())))
        }
        Value::Inline(definition) => Ok(tagged(
            INLINE_TAG,
            definition_to_yaml(definition, &format!("{location} inline"))?,
        )),
        Value::Native(_) => Err(WireupError::UnsupportedValue {
            kind: value.kind(),
            location: location.to_owned(),
        }),
    }
}

fn parse_err(message: impl Into<String>) -> WireupError {
    WireupError::Parse {
        format: "yaml",
        message: message.into(),
    }
}

fn key_str<'y>(key: &'y Yaml, context: &str) -> Result<&'y str> {
    key.as_str()
        .ok_or_else(|| parse_err(format!("{context}: keys must be strings, found {key:?}")))
}

fn expect_str<'y>(value: &'y Yaml, context: &str) -> Result<&'y str> {
    value
        .as_str()
        .ok_or_else(|| parse_err(format!("{context}: expected a string, found {value:?}")))
}

fn expect_bool(value: &Yaml, context: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| parse_err(format!("{context}: expected a boolean, found {value:?}")))
}

fn expect_mapping<'y>(value: &'y Yaml, context: &str) -> Result<&'y Mapping> {
    value
        .as_mapping()
        .ok_or_else(|| parse_err(format!("{context}: expected a mapping, found {value:?}")))
}

fn expect_sequence<'y>(value: &'y Yaml, context: &str) -> Result<&'y Vec<Yaml>> {
    value
        .as_sequence()
        .ok_or_else(|| parse_err(format!("{context}: expected a sequence, found {value:?}")))
}

fn from_yaml(value: &Yaml, context: &str) -> Result<Value> {
    match value {
        Yaml::Null => Ok(Value::Null),
        Yaml::Bool(b) => Ok(Value::Bool(*b)),
        Yaml::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.is_f64().then(|| n.as_f64().map(Value::Float)).flatten())
            .ok_or_else(|| parse_err(format!("{context}: number {n} is out of range"))),
        Yaml::String(s) => Ok(Value::String(s.clone())),
        Yaml::Sequence(items) => items
            .iter()
            .map(|item| from_yaml(item, context))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Yaml::Mapping(entries) => entries
            .iter()
            .map(|(key, item)| Ok((key_str(key, context)?.to_owned(), from_yaml(item, context)?)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Value::Map),
        Yaml::Tagged(tagged) => {
            if let Some((_, policy)) = REFERENCE_TAGS
                .iter()
                .find(|(name, _)| tagged.tag == Tag::new(*name))
            {
                let id = expect_str(&tagged.value, context)?;
                return Ok(Value::service_with_policy(id, *policy));
            }
            if tagged.tag == Tag::new(INLINE_TAG) {
                let mapping = expect_mapping(&tagged.value, context)?;
                return Ok(Value::from(definition_from_yaml(mapping, context)?));
            }
            Err(parse_err(format!("{context}: unknown tag {}", tagged.tag)))
        }
    }
}

fn definition_from_yaml(mapping: &Mapping, context: &str) -> Result<Definition> {
    let mut definition = Definition::default();
    for (key, value) in mapping {
        let key = key_str(key, context)?;
        let field = format!("{context} {key}");
        match key {
            "class" => definition.set_class(Some(expect_str(value, &field)?.to_owned())),
            "arguments" => {
                for item in expect_sequence(value, &field)? {
                    definition.add_argument(from_yaml(item, &field)?);
                }
            }
            "properties" => {
                for (name, item) in expect_mapping(value, &field)? {
                    let name = key_str(name, &field)?;
                    definition.set_property(name, from_yaml(item, &field)?);
                }
            }
            "calls" => {
                for call in expect_sequence(value, &field)? {
                    let parts = expect_sequence(call, &field)?;
                    let (method, arguments) = match parts.as_slice() {
                        [method] => (expect_str(method, &field)?, Vec::new()),
                        [method, arguments] => (
                            expect_str(method, &field)?,
                            expect_sequence(arguments, &field)?
                                .iter()
                                .map(|item| from_yaml(item, &field))
                                .collect::<Result<Vec<_>>>()?,
                        ),
                        _ => return Err(parse_err(format!("{field}: expected [method, [arguments]]"))),
                    };
                    definition.add_call(method, arguments);
                }
            }
            "tags" => {
                for tag in expect_sequence(value, &field)? {
                    let (name, attributes) = tag_from_yaml(expect_mapping(tag, &field)?, &field)?;
                    definition.add_tag(name, attributes);
                }
            }
            "public" => definition.set_public(expect_bool(value, &field)?),
            "shared" => definition.set_shared(expect_bool(value, &field)?),
            "synthetic" => definition.set_synthetic(expect_bool(value, &field)?),
            "scope" => definition.set_scope(expect_str(value, &field)?),
            other => return Err(parse_err(format!("{context}: unknown key `{other}`"))),
        }
    }
    Ok(definition)
}

fn tag_from_yaml(mapping: &Mapping, context: &str) -> Result<(String, TagAttributes)> {
    let mut name = None;
    let mut attributes = TagAttributes::new();
    for (key, value) in mapping {
        match key_str(key, context)? {
            "name" => name = Some(expect_str(value, context)?.to_owned()),
            "attributes" => {
                for (attribute, item) in expect_mapping(value, context)? {
                    let attribute = key_str(attribute, context)?.to_owned();
                    let _ = attributes.insert(attribute, expect_str(item, context)?.to_owned());
                }
            }
            other => return Err(parse_err(format!("{context}: unknown tag key `{other}`"))),
        }
    }
    let name = name.ok_or_else(|| parse_err(format!("{context}: tag without a name")))?;
    Ok((name, attributes))
}

fn alias_from_yaml(value: &Yaml, context: &str) -> Result<Option<Alias>> {
    match value {
        Yaml::String(s) => s
            .strip_prefix(ALIAS_PREFIX)
            .map(|target| Some(Alias::new(target)))
            .ok_or_else(|| parse_err(format!("{context}: a string entry must be `@target`"))),
        Yaml::Mapping(mapping) if mapping.contains_key("alias") => {
            let mut alias = Alias::new(ServiceId::new(""));
            for (key, item) in mapping {
                match key_str(key, context)? {
                    "alias" => alias.target = ServiceId::new(expect_str(item, context)?),
                    "public" => alias.public = expect_bool(item, context)?,
                    other => return Err(parse_err(format!("{context}: unknown alias key `{other}`"))),
                }
            }
            Ok(Some(alias))
        }
        _ => Ok(None),
    }
}

/// Reads a YAML document back into a resolved graph.
///
/// # Errors
///
/// Returns [`WireupError::Yaml`] if the document is not valid YAML,
/// [`WireupError::Parse`] if it does not have the exporter's layout, or a
/// graph invariant error.
pub fn read_yaml(input: &str) -> Result<ResolvedGraph> {
    let document: Yaml = serde_yaml::from_str(input)?;
    let root = match &document {
        Yaml::Null => Mapping::new(),
        Yaml::Mapping(mapping) => mapping.clone(),
        other => return Err(parse_err(format!("document root must be a mapping, found {other:?}"))),
    };

    let mut values = BTreeMap::new();
    let mut dynamic = BTreeSet::new();
    let mut definitions = BTreeMap::new();
    let mut aliases = BTreeMap::new();
    for (section, content) in &root {
        match key_str(section, "document")? {
            "parameters" => {
                for (name, value) in expect_mapping(content, "parameters")? {
                    let name = key_str(name, "parameters")?.to_owned();
                    let context = format!("parameter \"{name}\"");
                    let value = match value {
                        Yaml::Tagged(tagged) if tagged.tag == Tag::new(DYNAMIC_TAG) => {
                            let _ = dynamic.insert(name.clone());
                            from_yaml(&tagged.value, &context)?
                        }
                        other => from_yaml(other, &context)?,
                    };
                    let _ = values.insert(name, value);
                }
            }
            "services" => {
                for (id, entry) in expect_mapping(content, "services")? {
                    let id = ServiceId::new(key_str(id, "services")?);
                    let context = format!("service \"{id}\"");
                    if let Some(alias) = alias_from_yaml(entry, &context)? {
                        let _ = aliases.insert(id, alias);
                        continue;
                    }
                    let definition = match entry {
                        Yaml::Null => Definition::default(),
                        other => definition_from_yaml(expect_mapping(other, &context)?, &context)?,
                    };
                    let _ = definitions.insert(id, definition);
                }
            }
            other => return Err(parse_err(format!("unknown top-level key `{other}`"))),
        }
    }
    tracing::debug!(services = definitions.len(), "read container yaml");
    ResolvedGraph::from_parts(definitions, aliases, ParameterBag::frozen(values, dynamic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireup_graph::{Compiler, DefinitionStore};

    fn dump(store: DefinitionStore) -> String {
        let graph = Compiler::default().compile(store).expect("compile");
        YamlDumper.dump(&graph, &DumpOptions::default()).expect("dump")
    }

    #[test]
    fn references_are_tagged_with_their_policy() {
        let mut store = DefinitionStore::new();
        store.register("logger", Definition::new("Logger"));
        store.register(
            "mailer",
            Definition::new("Mailer")
                .with_argument(Value::service("logger"))
                .with_argument(Value::service_with_policy("cache", ReferencePolicy::Null)),
        );
        let yaml = dump(store);
        assert!(yaml.contains("!service logger"), "got:\n{yaml}");
        assert!(yaml.contains("class: Mailer"), "got:\n{yaml}");
        assert!(yaml.contains("- null"), "got:\n{yaml}");
    }

    #[test]
    fn aliases_use_the_at_prefix_when_public() {
        let mut store = DefinitionStore::new();
        store.register("mailer", Definition::new("Mailer"));
        store.set_alias("mail", "mailer").expect("alias");
        store
            .set_alias("internal.mail", Alias::new("mailer").with_public(false))
            .expect("alias");
        let yaml = dump(store);
        assert!(yaml.contains("mail: '@mailer'"), "got:\n{yaml}");
        assert!(yaml.contains("alias: mailer"), "got:\n{yaml}");
    }

    #[test]
    fn dynamic_parameters_are_tagged() {
        let mut store = DefinitionStore::new();
        store.parameters_mut().set_dynamic("env", "dev").expect("set");
        let yaml = dump(store);
        assert!(yaml.contains("env: !dynamic dev"), "got:\n{yaml}");
        let graph = read_yaml(&yaml).expect("read");
        assert!(graph.parameters().is_dynamic("env"));
    }

    #[test]
    fn reads_hand_written_document() {
        let graph = read_yaml(
            r"
parameters:
  retries: 3
services:
  Mailer:
    class: Mailer
    arguments: [!service_ignore logger, !inline { class: Transport, shared: false }]
    calls:
      - [setDebug]
    tags:
      - { name: mailer.plugin, attributes: { priority: '10' } }
    scope: request
  mail: '@mailer'
",
        )
        .expect("read");
        let mailer = graph.definition("mailer").expect("mailer");
        assert_eq!(mailer.scope(), "request");
        assert_eq!(mailer.calls()[0].method, "setDebug");
        assert_eq!(mailer.tag("mailer.plugin")[0]["priority"], "10");
        assert_eq!(
            mailer.arguments()[0],
            Value::service_with_policy("logger", ReferencePolicy::Ignore)
        );
        assert!(!mailer.arguments()[1].as_inline().expect("inline").is_shared());
        assert_eq!(graph.resolve_alias("mail").as_str(), "mailer");
        assert_eq!(graph.parameters().get("retries").expect("retries"), &Value::Int(3));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = read_yaml("services:\n  foo:\n    klass: Foo\n").unwrap_err();
        assert!(
            matches!(err, WireupError::Parse { ref message, .. } if message.contains("klass")),
            "got: {err}"
        );
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let err = read_yaml("services:\n  foo:\n    class: Foo\n    arguments: [!weird x]\n")
            .unwrap_err();
        assert!(matches!(err, WireupError::Parse { .. }), "got: {err}");
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = read_yaml("services: [").unwrap_err();
        assert!(matches!(err, WireupError::Yaml { .. }), "got: {err}");
    }
}
