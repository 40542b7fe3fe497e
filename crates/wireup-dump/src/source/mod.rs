//! Rust source exporter.
//!
//! The generated container keeps all bookkeeping in a `wireup_runtime`
//! base container and adds one lazy accessor per service. Shared services
//! go through `Container::shared` so identity is preserved; non-shared ones
//! through `Container::fresh`. Inlined definitions get private builders
//! that are not registered anywhere.
//!
//! [`read_source`] loads the output back into an equal [`ResolvedGraph`].

use std::collections::{BTreeMap, BTreeSet};

use wireup_common::config::DumpOptions;
use wireup_common::constants::{ACCESSOR_PREFIX, ACCESSOR_SUFFIX, APP_NAME, INLINE_PREFIX};
use wireup_common::error::{Result, WireupError};
use wireup_common::types::{ReferencePolicy, ServiceId};
use wireup_graph::{Definition, ResolvedGraph, Value};

use crate::validate::check_exportable;
use crate::{Dumper, ExporterFormat};

pub mod lexer;
mod reader;

pub use reader::read_source;

/// Exporter producing a Rust container type.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustSourceDumper;

impl Dumper for RustSourceDumper {
    fn format(&self) -> ExporterFormat {
        ExporterFormat::RustSource
    }

    fn dump(&self, graph: &ResolvedGraph, options: &DumpOptions) -> Result<String> {
        check_exportable(graph)?;
        let rendered = SourceEmitter::new(graph, options).render()?;
        tracing::debug!(
            services = graph.definitions().len(),
            class = %options.class,
            "rendered container source"
        );
        Ok(rendered)
    }
}

/// Returns a Rust identifier fragment for a service id: lowercase ASCII
/// alphanumerics, everything else replaced by `_`.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Assigns a distinct accessor name to every service.
fn accessor_names<'a>(ids: impl IntoIterator<Item = &'a ServiceId>) -> BTreeMap<ServiceId, String> {
    let mut taken = BTreeSet::new();
    let mut names = BTreeMap::new();
    for id in ids {
        let stem = format!("{ACCESSOR_PREFIX}{}{ACCESSOR_SUFFIX}", sanitize(id.as_str()));
        let mut candidate = stem.clone();
        let mut counter = 2;
        while taken.contains(&candidate) {
            candidate = format!("{stem}_{counter}");
            counter += 1;
        }
        let _ = taken.insert(candidate.clone());
        let _ = names.insert(id.clone(), candidate);
    }
    names
}

const fn policy_path(policy: ReferencePolicy) -> &'static str {
    match policy {
        ReferencePolicy::Exception => "ReferencePolicy::Exception",
        ReferencePolicy::Null => "ReferencePolicy::Null",
        ReferencePolicy::Ignore => "ReferencePolicy::Ignore",
    }
}

/// Renders a parameter value. Parameters never hold services.
fn literal(value: &Value, location: &str) -> Result<String> {
    match value {
        Value::Null => Ok("Value::Null".to_owned()),
        Value::Bool(b) => Ok(format!("Value::Bool({b})")),
        Value::Int(n) => Ok(format!("Value::Int({n})")),
        Value::Float(n) => Ok(format!("Value::Float({n:?})")),
        Value::String(s) => Ok(format!("Value::from({s:?})")),
        Value::List(items) => {
            let items = items
                .iter()
                .map(|item| literal(item, location))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("Value::List(vec![{}])", items.join(", ")))
        }
        Value::Map(entries) => {
            let entries = entries
                .iter()
                .map(|(key, item)| Ok(format!("({key:?}, {})", literal(item, location)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("Value::map([{}])", entries.join(", ")))
        }
        Value::Reference(_) | Value::Inline(_) | Value::Native(_) => {
            Err(WireupError::UnsupportedValue {
                kind: value.kind(),
                location: location.to_owned(),
            })
        }
    }
}

/// Collects ids of ignore-on-invalid references directly inside a call
/// argument, looking through lists and maps but not inline definitions.
fn optional_targets<'a>(value: &'a Value, found: &mut Vec<&'a str>) {
    match value {
        Value::Reference(reference) if reference.policy == ReferencePolicy::Ignore => {
            if !found.contains(&reference.id.as_str()) {
                found.push(reference.id.as_str());
            }
        }
        Value::List(items) => items.iter().for_each(|item| optional_targets(item, found)),
        Value::Map(entries) => entries.values().for_each(|item| optional_targets(item, found)),
        _ => {}
    }
}

/// Indented line buffer.
#[derive(Debug, Default)]
struct Lines {
    out: String,
}

impl Lines {
    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

struct SourceEmitter<'a> {
    graph: &'a ResolvedGraph,
    options: &'a DumpOptions,
    accessors: BTreeMap<ServiceId, String>,
    inlined: Vec<(String, &'a Definition)>,
}

impl<'a> SourceEmitter<'a> {
    fn new(graph: &'a ResolvedGraph, options: &'a DumpOptions) -> Self {
        Self {
            graph,
            options,
            accessors: accessor_names(graph.definitions().keys()),
            inlined: Vec::new(),
        }
    }

    fn render(mut self) -> Result<String> {
        let graph = self.graph;
        let mut methods = Lines::default();
        for (id, definition) in graph.definitions() {
            self.accessor(&mut methods, id, definition)?;
        }
        let mut next = 0;
        while next < self.inlined.len() {
            let (name, definition) = self.inlined[next].clone();
            self.inline_builder(&mut methods, &name, definition)?;
            next += 1;
        }

        let class = &self.options.class;
        let base = &self.options.base_class;
        let mut out = Lines::default();
        out.line(0, format!("// @generated by {APP_NAME}. Do not edit."));
        out.blank();
        out.line(0, "use std::rc::Rc;");
        out.blank();
        out.line(
            0,
            "use wireup_runtime::{Container, Instance, ReferencePolicy, Result, ServiceInfo, ServiceLocator, TagInfo, Value};",
        );
        out.blank();
        out.line(0, "/// Service container compiled from a resolved service graph.");
        out.line(0, format!("pub struct {class} {{"));
        out.line(1, format!("base: {base},"));
        out.line(0, "}");
        out.blank();
        out.line(0, format!("impl {class} {{"));
        out.line(1, "/// Every service of this container.");
        Self::table(&mut out, "SERVICES", self.services_meta());
        out.blank();
        out.line(1, "/// Definitions embedded into other services.");
        let inlined_meta: Vec<(&str, &str, &Definition)> = self
            .inlined
            .iter()
            .map(|(name, definition)| (name.as_str(), name.as_str(), *definition))
            .collect();
        Self::table(&mut out, "INLINED", inlined_meta);
        out.blank();
        self.constructor(&mut out)?;
        out.blank();
        out.line(1, "/// Injects the instance of a synthetic service.");
        out.line(1, "pub fn set(&self, id: &str, instance: Rc<Instance>) {");
        out.line(2, "self.base.set(id, instance);");
        out.line(1, "}");
        out.out.push_str(&methods.out);
        out.line(0, "}");
        out.blank();
        self.locator(&mut out, class);
        out.blank();
        out.line(0, format!("impl Default for {class} {{"));
        out.line(1, "fn default() -> Self {");
        out.line(2, "Self::new()");
        out.line(1, "}");
        out.line(0, "}");
        Ok(out.out)
    }

    fn services_meta(&self) -> Vec<(&'a str, &str, &'a Definition)> {
        self.graph
            .definitions()
            .iter()
            .filter_map(|(id, definition)| {
                self.accessors
                    .get(id)
                    .map(|method| (id.as_str(), method.as_str(), definition))
            })
            .collect()
    }

    fn table(out: &mut Lines, name: &str, rows: Vec<(&str, &str, &Definition)>) {
        out.line(1, format!("pub const {name}: &'static [ServiceInfo] = &["));
        for (id, method, definition) in rows {
            out.line(2, "ServiceInfo {");
            out.line(3, format!("id: {id:?},"));
            out.line(3, format!("method: {method:?},"));
            match definition.class() {
                Some(class) => out.line(3, format!("class: Some({class:?}),")),
                None => out.line(3, "class: None,"),
            }
            out.line(3, format!("public: {},", definition.is_public()));
            out.line(3, format!("shared: {},", definition.is_shared()));
            out.line(3, format!("synthetic: {},", definition.is_synthetic()));
            out.line(3, format!("scope: {:?},", definition.scope()));
            if definition.tags().is_empty() {
                out.line(3, "tags: &[],");
            } else {
                out.line(3, "tags: &[");
                for (tag, occurrences) in definition.tags() {
                    for attributes in occurrences {
                        let pairs: Vec<String> = attributes
                            .iter()
                            .map(|(key, value)| format!("({key:?}, {value:?})"))
                            .collect();
                        out.line(
                            4,
                            format!(
                                "TagInfo {{ name: {tag:?}, attributes: &[{}] }},",
                                pairs.join(", ")
                            ),
                        );
                    }
                }
                out.line(3, "],");
            }
            out.line(2, "},");
        }
        out.line(1, "];");
    }

    fn constructor(&self, out: &mut Lines) -> Result<()> {
        let parameters = self.graph.parameters();
        out.line(1, "/// Creates the container with its parameters and aliases.");
        out.line(1, "pub fn new() -> Self {");
        let binding = if parameters.all().is_empty() && self.graph.aliases().is_empty() {
            "let base"
        } else {
            "let mut base"
        };
        out.line(2, format!("{binding} = {}::new();", self.options.base_class));
        for (name, value) in parameters.all() {
            let rendered = literal(value, &format!("parameter \"{name}\""))?;
            let setter = if parameters.is_dynamic(name) {
                "set_dynamic_parameter"
            } else {
                "set_parameter"
            };
            out.line(2, format!("base.{setter}({name:?}, {rendered});"));
        }
        for (name, alias) in self.graph.aliases() {
            out.line(
                2,
                format!(
                    "base.set_alias({:?}, {:?}, {});",
                    name.as_str(),
                    alias.target.as_str(),
                    alias.public
                ),
            );
        }
        out.line(2, "Self { base }");
        out.line(1, "}");
        Ok(())
    }

    fn accessor(&mut self, out: &mut Lines, id: &ServiceId, definition: &'a Definition) -> Result<()> {
        let method = self.accessors.get(id).cloned().unwrap_or_default();
        let visibility = if definition.is_public() { "pub " } else { "" };
        out.blank();
        out.line(1, format!("/// Builds service {:?}.", id.as_str()));
        out.line(1, format!("{visibility}fn {method}(&self) -> Result<Rc<Instance>> {{"));
        if definition.is_synthetic() {
            out.line(2, format!("self.base.synthetic({:?})", id.as_str()));
        } else {
            let strategy = if definition.is_shared() { "shared" } else { "fresh" };
            out.line(2, format!("self.base.{strategy}({:?}, || {{", id.as_str()));
            self.builder(out, 3, definition, &format!("service \"{id}\""))?;
            out.line(2, "})");
        }
        out.line(1, "}");
        Ok(())
    }

    fn inline_builder(&mut self, out: &mut Lines, name: &str, definition: &'a Definition) -> Result<()> {
        out.blank();
        out.line(1, format!("fn {name}(&self) -> Result<Rc<Instance>> {{"));
        self.builder(out, 2, definition, name)?;
        out.line(1, "}");
        Ok(())
    }

    fn builder(&mut self, out: &mut Lines, depth: usize, definition: &'a Definition, location: &str) -> Result<()> {
        let class = definition
            .class()
            .ok_or_else(|| WireupError::InvalidDefinition {
                id: location.to_owned(),
                reason: "a concrete service must have a class".to_owned(),
            })?;
        out.line(depth, format!("Ok(Instance::builder({class:?})"));
        for (index, value) in definition.arguments().iter().enumerate() {
            let rendered = self.expr(value, &format!("{location} argument {index}"))?;
            out.line(depth + 1, format!(".argument({rendered})"));
        }
        for (name, value) in definition.properties() {
            let rendered = self.expr(value, &format!("{location} property \"{name}\""))?;
            out.line(depth + 1, format!(".property({name:?}, {rendered})"));
        }
        for call in definition.calls() {
            let location = format!("{location} call \"{}\"", call.method);
            let arguments = call
                .arguments
                .iter()
                .map(|value| self.expr(value, &location))
                .collect::<Result<Vec<_>>>()?;
            let mut optional = Vec::new();
            call.arguments
                .iter()
                .for_each(|value| optional_targets(value, &mut optional));
            let arguments = arguments.join(", ");
            if optional.is_empty() {
                out.line(depth + 1, format!(".call({:?}, vec![{arguments}])", call.method));
            } else {
                let condition: Vec<String> =
                    optional.iter().map(|id| format!("self.has({id:?})")).collect();
                out.line(
                    depth + 1,
                    format!(
                        ".call_when({}, {:?}, vec![{arguments}])",
                        condition.join(" && "),
                        call.method
                    ),
                );
            }
        }
        out.line(depth + 1, ".build())");
        Ok(())
    }

    fn expr(&mut self, value: &'a Value, location: &str) -> Result<String> {
        match value {
            Value::String(s) if self.graph.parameters().contains_dynamic(s) => {
                Ok(format!("self.base.expand({s:?})?"))
            }
            Value::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.expr(item, location))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("Value::List(vec![{}])", items.join(", ")))
            }
            Value::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(key, item)| Ok(format!("({key:?}, {})", self.expr(item, location)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("Value::map([{}])", entries.join(", ")))
            }
            Value::Reference(reference) => Ok(format!(
                "self.reference({:?}, {})?",
                reference.id.as_str(),
                policy_path(reference.policy)
            )),
            Value::Inline(definition) => {
                let name = format!("{INLINE_PREFIX}{}", self.inlined.len() + 1);
                self.inlined.push((name.clone(), &**definition));
                Ok(format!("Value::from(self.{name}()?)"))
            }
            other => literal(other, location),
        }
    }

    fn locator(&self, out: &mut Lines, class: &str) {
        out.line(0, format!("impl ServiceLocator for {class} {{"));
        out.line(1, "fn get(&self, id: &str) -> Result<Rc<Instance>> {");
        out.line(2, "match self.base.resolve_alias(id).as_str() {");
        for (id, method) in &self.accessors {
            out.line(3, format!("{:?} => self.{method}(),", id.as_str()));
        }
        out.line(3, "other if self.base.initialized(other) => self.base.synthetic(other),");
        out.line(3, "_ => Err(self.base.unknown(id)),");
        out.line(2, "}");
        out.line(1, "}");
        out.blank();
        out.line(1, "fn has(&self, id: &str) -> bool {");
        out.line(2, "let id = self.base.resolve_alias(id);");
        out.line(
            2,
            "ServiceInfo::find(Self::SERVICES, &id).is_some() || self.base.initialized(&id)",
        );
        out.line(1, "}");
        out.blank();
        out.line(1, "fn parameter(&self, name: &str) -> Result<Value> {");
        out.line(2, "self.base.parameter(name)");
        out.line(1, "}");
        out.blank();
        out.line(1, "fn current(&self) -> Option<String> {");
        out.line(2, "self.base.current()");
        out.line(1, "}");
        out.line(0, "}");
    }
}
