//! System-wide constants and defaults.

/// Scope of services that live as long as their container.
pub const DEFAULT_SCOPE: &str = "container";

/// Default type name of the generated container.
pub const DEFAULT_CONTAINER_CLASS: &str = "ProjectServiceContainer";

/// Default type name the generated container delegates to.
pub const DEFAULT_BASE_CLASS: &str = "Container";

/// Prefix of generated service accessors.
pub const ACCESSOR_PREFIX: &str = "get_";

/// Suffix of generated service accessors.
pub const ACCESSOR_SUFFIX: &str = "_service";

/// Prefix of generated builders for inlined definitions.
pub const INLINE_PREFIX: &str = "inline_";

/// Upper bound on inline/remove repetitions before the compiler gives up
/// looking for a fixed point.
pub const MAX_PASS_REPETITIONS: usize = 64;

/// Application name used in generated headers.
pub const APP_NAME: &str = "wireup";
