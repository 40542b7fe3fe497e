//! Parameter placeholder substitution.

use std::collections::BTreeMap;

use wireup_common::error::Result;
use wireup_common::types::ServiceId;

use super::{CompilerPass, PassOutcome};
use crate::definition::Alias;
use crate::store::DefinitionStore;

/// Resolves the parameter bag, then substitutes `%name%` placeholders in
/// every definition's class, values, and method names, and in alias names
/// and targets.
///
/// Dynamic placeholders are left in place for the runtime container.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolveParameterPlaceholders;

impl CompilerPass for ResolveParameterPlaceholders {
    fn name(&self) -> &'static str {
        "resolve_parameters"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        store.parameters_mut().resolve()?;
        let bag = store.parameters().clone();
        tracing::info!(parameters = bag.all().len(), "resolving parameter placeholders");

        let mut changed = false;
        for definition in store.all_mut().values_mut() {
            let before = definition.clone();
            bag.resolve_definition(definition)?;
            changed |= *definition != before;
        }

        let mut aliases = BTreeMap::new();
        for (name, alias) in store.aliases() {
            let resolved_name = ServiceId::new(bag.resolve_text(name.as_str())?);
            let target = ServiceId::new(bag.resolve_text(alias.target.as_str())?);
            changed |= resolved_name != *name || target != alias.target;
            let _ = aliases.insert(resolved_name, Alias::new(target).with_public(alias.public));
        }
        store.set_aliases(aliases);

        Ok(PassOutcome::from_changed(changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;
    use crate::value::Value;

    #[test]
    fn placeholders_in_definitions_are_substituted() {
        let mut store = DefinitionStore::new();
        store.parameters_mut().set("mailer.class", "SmtpMailer").expect("set");
        store.parameters_mut().set("host", "mail.local").expect("set");
        store.parameters_mut().set("retries", 3_i64).expect("set");
        store.register(
            "mailer",
            Definition::new("%mailer.class%")
                .with_argument("smtp://%host%:25")
                .with_argument("%retries%")
                .with_call("set%retries%", vec![Value::from("100%%")]),
        );

        let outcome = ResolveParameterPlaceholders.process(&mut store).expect("process");
        assert_eq!(outcome, PassOutcome::Changed);
        let mailer = store.get("mailer").expect("mailer");
        assert_eq!(mailer.class(), Some("SmtpMailer"));
        assert_eq!(
            mailer.arguments(),
            &[Value::from("smtp://mail.local:25"), Value::Int(3)]
        );
        assert_eq!(mailer.calls()[0].method, "set3");
        assert_eq!(mailer.calls()[0].arguments, vec![Value::from("100%")]);
    }

    #[test]
    fn alias_targets_are_substituted() {
        let mut store = DefinitionStore::new();
        store.parameters_mut().set("driver", "redis").expect("set");
        store.register("cache.redis", Definition::new("RedisCache"));
        store.set_alias("cache", "cache.%driver%").expect("alias");

        ResolveParameterPlaceholders.process(&mut store).expect("process");
        assert_eq!(
            store.resolve_alias("cache").expect("resolve").as_str(),
            "cache.redis"
        );
    }

    #[test]
    fn dynamic_placeholders_survive() {
        let mut store = DefinitionStore::new();
        store.parameters_mut().set_dynamic("env", "dev").expect("set");
        store.register("logger", Definition::new("Logger").with_argument("/var/log/%env%.log"));
        ResolveParameterPlaceholders.process(&mut store).expect("process");
        assert_eq!(
            store.get("logger").expect("logger").arguments(),
            &[Value::from("/var/log/%env%.log")]
        );
    }

    #[test]
    fn unknown_parameter_is_fatal() {
        let mut store = DefinitionStore::new();
        store.register("foo", Definition::new("Foo").with_argument("%nope%"));
        assert!(ResolveParameterPlaceholders.process(&mut store).is_err());
    }
}
