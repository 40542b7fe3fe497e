//! # wireup-dump
//!
//! Exporters for a [`ResolvedGraph`] and the readers that load their output
//! back.
//!
//! Handles:
//! - **Rust source**: a container type with one lazy accessor per service,
//!   built on `wireup-runtime`.
//! - **YAML**: a declarative document with tagged references.
//! - **Validation**: values no artifact can represent are rejected before
//!   anything is emitted.

use std::path::Path;

use wireup_common::config::DumpOptions;
use wireup_common::error::{Result, WireupError};
use wireup_graph::ResolvedGraph;

pub mod source;
pub mod validate;
pub mod yaml;

pub use source::{RustSourceDumper, read_source};
pub use yaml::{YamlDumper, read_yaml};

/// Serialises a resolved graph into one artifact format.
///
/// Implementations must call [`validate::check_exportable`] before emitting
/// anything so a failed dump never produces partial output.
pub trait Dumper {
    /// Returns the format this dumper writes.
    fn format(&self) -> ExporterFormat;

    /// Renders `graph` as text.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::UnsupportedValue`] if the graph holds a value
    /// the format cannot represent.
    fn dump(&self, graph: &ResolvedGraph, options: &DumpOptions) -> Result<String>;

    /// Renders `graph` and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Dumper::dump`], or [`WireupError::Io`] if the
    /// file cannot be written.
    fn write_to(&self, graph: &ResolvedGraph, options: &DumpOptions, path: &Path) -> Result<()> {
        let rendered = self.dump(graph, options)?;
        std::fs::write(path, rendered).map_err(|source| WireupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), format = ?self.format(), "container dumped");
        Ok(())
    }
}

/// Artifact formats a graph can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExporterFormat {
    /// Rust source for a generated container type.
    RustSource,
    /// Declarative YAML document.
    Yaml,
}

impl ExporterFormat {
    /// Every supported format.
    pub const ALL: [Self; 2] = [Self::RustSource, Self::Yaml];

    /// Returns the dumper for this format.
    #[must_use]
    pub fn dumper(self) -> Box<dyn Dumper> {
        match self {
            Self::RustSource => Box::new(RustSourceDumper),
            Self::Yaml => Box::new(YamlDumper),
        }
    }

    /// Loads an artifact of this format back into a resolved graph.
    ///
    /// # Errors
    ///
    /// Returns [`WireupError::Parse`] or [`WireupError::Yaml`] for malformed
    /// input, or a graph invariant error.
    pub fn read(self, artifact: &str) -> Result<ResolvedGraph> {
        match self {
            Self::RustSource => read_source(artifact),
            Self::Yaml => read_yaml(artifact),
        }
    }

    /// Conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::RustSource => "rs",
            Self::Yaml => "yaml",
        }
    }
}
