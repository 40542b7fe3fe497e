//! Configuration model for the compiler and its exporters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Root configuration of one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Identifiers treated as existing by the invalid-reference pass,
    /// for services a later compilation phase will supply.
    pub exclusions: BTreeSet<String>,
    /// Whether private and non-shared services are inlined.
    pub inline_services: bool,
    /// Whether unreferenced private services are removed.
    pub remove_unused: bool,
    /// Options handed to the exporters.
    pub dump: DumpOptions,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            exclusions: BTreeSet::new(),
            inline_services: true,
            remove_unused: true,
            dump: DumpOptions::default(),
        }
    }
}

/// Options recognised by every exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// Name of the generated container type.
    pub class: String,
    /// Name of the type the generated container builds on.
    pub base_class: String,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            class: crate::constants::DEFAULT_CONTAINER_CLASS.to_owned(),
            base_class: crate::constants::DEFAULT_BASE_CLASS.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_optimisation() {
        let config = CompilerConfig::default();
        assert!(config.inline_services);
        assert!(config.remove_unused);
        assert!(config.exclusions.is_empty());
        assert_eq!(config.dump.class, "ProjectServiceContainer");
        assert_eq!(config.dump.base_class, "Container");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: CompilerConfig = serde_json::from_str(
            r#"{ "exclusions": ["request"], "dump": { "class": "AppContainer" } }"#,
        )
        .expect("deserialize");
        assert!(config.exclusions.contains("request"));
        assert!(config.inline_services);
        assert_eq!(config.dump.class, "AppContainer");
        assert_eq!(config.dump.base_class, "Container");
    }
}
