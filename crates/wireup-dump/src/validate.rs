//! Pre-dump walk rejecting values no artifact can represent.

use wireup_common::error::{Result, WireupError};
use wireup_graph::{Definition, ResolvedGraph, Value};

/// Walks every parameter and definition value of `graph`.
///
/// Fails on the first native value or non-finite float anywhere, and on any
/// reference or inline definition inside a parameter.
///
/// # Errors
///
/// Returns [`WireupError::UnsupportedValue`] with the trail leading to the
/// offending value.
pub fn check_exportable(graph: &ResolvedGraph) -> Result<()> {
    for (name, value) in graph.parameters().all() {
        check_value(value, &format!("parameter \"{name}\""), false)?;
    }
    for (id, definition) in graph.definitions() {
        check_definition(definition, &format!("service \"{id}\""))?;
    }
    Ok(())
}

fn check_definition(definition: &Definition, location: &str) -> Result<()> {
    for (index, value) in definition.arguments().iter().enumerate() {
        check_value(value, &format!("{location} argument {index}"), true)?;
    }
    for (name, value) in definition.properties() {
        check_value(value, &format!("{location} property \"{name}\""), true)?;
    }
    for call in definition.calls() {
        for (index, value) in call.arguments.iter().enumerate() {
            check_value(
                value,
                &format!("{location} call \"{}\" argument {index}", call.method),
                true,
            )?;
        }
    }
    Ok(())
}

fn check_value(value: &Value, location: &str, services_allowed: bool) -> Result<()> {
    let unsupported = || WireupError::UnsupportedValue {
        kind: value.kind(),
        location: location.to_owned(),
    };
    match value {
        Value::Native(_) => Err(unsupported()),
        Value::Float(n) if !n.is_finite() => Err(unsupported()),
        Value::Reference(_) | Value::Inline(_) if !services_allowed => Err(unsupported()),
        Value::Inline(inner) => check_definition(inner, &format!("{location} inline")),
        Value::List(items) => items.iter().enumerate().try_for_each(|(index, item)| {
            check_value(item, &format!("{location}[{index}]"), services_allowed)
        }),
        Value::Map(entries) => entries.iter().try_for_each(|(key, item)| {
            check_value(item, &format!("{location}[\"{key}\"]"), services_allowed)
        }),
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::String(_)
        | Value::Reference(_) => Ok(()),
    }
}
