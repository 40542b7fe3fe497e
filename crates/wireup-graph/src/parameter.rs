//! Parameter storage and `%name%` placeholder resolution.
//!
//! Strings are kept in their escaped form (`%%` for a literal percent sign)
//! while the bag is being resolved. Escapes are removed exactly once: by
//! [`ParameterBag::resolve_value`] for definition values and by
//! [`ParameterBag::freeze`] for the bag's own values. A string that still
//! contains a dynamic placeholder is never unescaped; the runtime container
//! expands it instead.

use std::collections::{BTreeMap, BTreeSet};

use wireup_common::error::{Result, WireupError};

use crate::definition::Definition;
use crate::value::Value;

/// One piece of a string split on placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text, still escaped.
    Text(&'a str),
    /// A `%name%` placeholder; the name is lowercased on lookup.
    Placeholder(&'a str),
}

/// Splits a string into literal text and placeholders.
///
/// `%%` is kept as literal text. An unterminated `%` is literal text.
#[must_use]
pub fn segments(input: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find('%') {
        if start > 0 {
            out.push(Segment::Text(&rest[..start]));
        }
        let after = &rest[start + 1..];
        if after.starts_with('%') {
            out.push(Segment::Text("%%"));
            rest = &after[1..];
            continue;
        }
        match after.find('%') {
            Some(end) => {
                out.push(Segment::Placeholder(&after[..end]));
                rest = &after[end + 1..];
            }
            None => {
                out.push(Segment::Text(&rest[start..]));
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Replaces every `%%` escape with a single `%`.
#[must_use]
pub fn unescape(input: &str) -> String {
    input.replace("%%", "%")
}

/// Mapping from parameter name to value.
///
/// Names are case-insensitive and stored lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBag {
    values: BTreeMap<String, Value>,
    dynamic: BTreeSet<String>,
    resolved: bool,
    frozen: bool,
}

impl ParameterBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frozen bag from final, unescaped values, as read back from a
    /// compiled artifact. No resolution takes place.
    #[must_use]
    pub fn frozen(values: BTreeMap<String, Value>, dynamic: BTreeSet<String>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(name, value)| (name.to_lowercase(), value))
                .collect(),
            dynamic: dynamic.iter().map(|name| name.to_lowercase()).collect(),
            resolved: true,
            frozen: true,
        }
    }

    /// Sets a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::FrozenParameterBag`] once the bag is frozen.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.frozen {
            return Err(WireupError::FrozenParameterBag {
                name: name.to_owned(),
            });
        }
        let _ = self.values.insert(name.to_lowercase(), value.into());
        self.resolved = false;
        Ok(())
    }

    /// Sets a parameter whose placeholders are left for the runtime to
    /// substitute; `default` is the value used when the runtime supplies none.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::FrozenParameterBag`] once the bag is frozen.
    pub fn set_dynamic(&mut self, name: &str, default: impl Into<Value>) -> Result<()> {
        self.set(name, default)?;
        let _ = self.dynamic.insert(name.to_lowercase());
        Ok(())
    }

    /// Returns a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::ParameterNotFound`] if the name is unknown.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .get(&name.to_lowercase())
            .ok_or_else(|| WireupError::ParameterNotFound {
                name: name.to_owned(),
            })
    }

    /// Returns whether a parameter exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    /// Returns every parameter.
    #[must_use]
    pub const fn all(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Returns whether `name` is substituted at runtime.
    #[must_use]
    pub fn is_dynamic(&self, name: &str) -> bool {
        self.dynamic.contains(&name.to_lowercase())
    }

    /// Returns the names of every dynamic parameter.
    #[must_use]
    pub const fn dynamic_names(&self) -> &BTreeSet<String> {
        &self.dynamic
    }

    /// Returns whether `input` still contains a dynamic placeholder.
    #[must_use]
    pub fn contains_dynamic(&self, input: &str) -> bool {
        !self.dynamic.is_empty()
            && segments(input).iter().any(|segment| match segment {
                Segment::Placeholder(name) => self.is_dynamic(name),
                Segment::Text(_) => false,
            })
    }

    /// Returns whether the bag is frozen.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Resolves placeholders inside the bag's own values.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown or circular parameters.
    pub fn resolve(&mut self) -> Result<()> {
        if self.resolved || self.frozen {
            return Ok(());
        }
        tracing::debug!(count = self.values.len(), "resolving parameter bag");
        let mut resolved = BTreeMap::new();
        for (name, value) in &self.values {
            let mut stack = Vec::new();
            let _ = resolved.insert(name.clone(), self.resolve_inner(value, &mut stack)?);
        }
        self.values = resolved;
        self.resolved = true;
        Ok(())
    }

    /// Resolves the bag, removes escapes from its values, and rejects any
    /// further mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution fails.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Ok(());
        }
        self.resolve()?;
        let values = std::mem::take(&mut self.values);
        self.values = values
            .into_iter()
            .map(|(name, value)| {
                let value = self.finish(value);
                (name, value)
            })
            .collect();
        self.frozen = true;
        Ok(())
    }

    /// Resolves every placeholder inside `value` and removes escapes.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown, circular, or non-scalar embedded
    /// parameters.
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        let mut stack = Vec::new();
        let resolved = self.resolve_inner(value, &mut stack)?;
        Ok(self.finish(resolved))
    }

    /// Resolves placeholders inside every value of `definition`, its class,
    /// and its method names.
    ///
    /// # Errors
    ///
    /// Returns an error if any value fails to resolve, or if the class or a
    /// method name does not resolve to a string.
    pub fn resolve_definition(&self, definition: &mut Definition) -> Result<()> {
        if let Some(class) = definition.class() {
            let class = self.resolve_text(class)?;
            definition.set_class(Some(class));
        }
        for value in definition.values_mut() {
            *value = self.resolve_value(value)?;
        }
        for call in definition.calls_mut() {
            call.method = self.resolve_text(&call.method)?;
        }
        Ok(())
    }

    /// Resolves `input` and requires the result to be a string.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution fails or yields a non-scalar value.
    pub fn resolve_text(&self, input: &str) -> Result<String> {
        match self.resolve_value(&Value::String(input.to_owned()))? {
            Value::String(s) => Ok(s),
            Value::Int(n) => Ok(n.to_string()),
            other => Err(WireupError::NonScalarParameter {
                name: other.kind().to_owned(),
                template: input.to_owned(),
            }),
        }
    }

    fn resolve_inner(&self, value: &Value, stack: &mut Vec<String>) -> Result<Value> {
        match value {
            Value::String(s) => self.resolve_string(s, stack),
            Value::List(items) => items
                .iter()
                .map(|v| self.resolve_inner(v, stack))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve_inner(v, stack)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Map),
            Value::Inline(def) => {
                let mut def = def.clone();
                self.resolve_definition(&mut def)?;
                Ok(Value::Inline(def))
            }
            Value::Null
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Reference(_)
            | Value::Native(_) => Ok(value.clone()),
        }
    }

    fn lookup(&self, name: &str, stack: &mut Vec<String>) -> Result<Value> {
        let key = name.to_lowercase();
        if stack.contains(&key) {
            stack.push(key);
            return Err(WireupError::CircularParameter {
                chain: std::mem::take(stack),
            });
        }
        let raw = self.get(&key)?;
        if self.resolved {
            return Ok(raw.clone());
        }
        stack.push(key);
        let resolved = self.resolve_inner(raw, stack)?;
        let _ = stack.pop();
        Ok(resolved)
    }

    fn resolve_string(&self, input: &str, stack: &mut Vec<String>) -> Result<Value> {
        let parts = segments(input);

        if let [Segment::Placeholder(name)] = parts.as_slice() {
            if self.is_dynamic(name) {
                return Ok(Value::String(input.to_owned()));
            }
            return self.lookup(name, stack);
        }

        let mut out = String::with_capacity(input.len());
        for part in parts {
            match part {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) if self.is_dynamic(name) => {
                    out.push('%');
                    out.push_str(name);
                    out.push('%');
                }
                Segment::Placeholder(name) => match self.lookup(name, stack)? {
                    Value::String(s) => out.push_str(&s),
                    Value::Int(n) => out.push_str(&n.to_string()),
                    Value::Float(n) => out.push_str(&n.to_string()),
                    _ => {
                        return Err(WireupError::NonScalarParameter {
                            name: name.to_owned(),
                            template: input.to_owned(),
                        });
                    }
                },
            }
        }
        Ok(Value::String(out))
    }

    /// Removes escapes from every string without a dynamic placeholder.
    fn finish(&self, value: Value) -> Value {
        match value {
            Value::String(s) if self.contains_dynamic(&s) => Value::String(s),
            Value::String(s) => Value::String(unescape(&s)),
            Value::List(items) => Value::List(items.into_iter().map(|v| self.finish(v)).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, self.finish(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}
