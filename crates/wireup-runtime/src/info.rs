//! Static service metadata embedded in generated containers.

/// One occurrence of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagInfo {
    /// Tag name.
    pub name: &'static str,
    /// Attribute pairs.
    pub attributes: &'static [(&'static str, &'static str)],
}

/// Description of one service of a generated container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Service identifier.
    pub id: &'static str,
    /// Name of the accessor that builds it.
    pub method: &'static str,
    /// Class, absent for synthetic services.
    pub class: Option<&'static str>,
    /// Whether the service may be looked up directly.
    pub public: bool,
    /// Whether the instance is memoised.
    pub shared: bool,
    /// Whether the instance is injected at runtime.
    pub synthetic: bool,
    /// Scope.
    pub scope: &'static str,
    /// Tags with their attributes.
    pub tags: &'static [TagInfo],
}

impl ServiceInfo {
    /// Finds the entry for `id` in `table`.
    #[must_use]
    pub fn find<'a>(table: &'a [Self], id: &str) -> Option<&'a Self> {
        table.iter().find(|info| info.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[ServiceInfo] = &[ServiceInfo {
        id: "mailer",
        method: "get_mailer_service",
        class: Some("Mailer"),
        public: true,
        shared: true,
        synthetic: false,
        scope: "container",
        tags: &[TagInfo {
            name: "monolog.logger",
            attributes: &[("channel", "mail")],
        }],
    }];

    #[test]
    fn find_by_id() {
        let info = ServiceInfo::find(TABLE, "mailer").expect("mailer");
        assert_eq!(info.method, "get_mailer_service");
        assert_eq!(info.tags[0].attributes, &[("channel", "mail")]);
        assert!(ServiceInfo::find(TABLE, "ghost").is_none());
    }
}
