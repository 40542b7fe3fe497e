//! The compilation pipeline.

use wireup_common::config::CompilerConfig;
use wireup_common::error::Result;

use crate::passes::{
    CheckCircularReferences, CheckDefinitionValidity, CheckReferenceValidity, CompilerPass,
    InlineServiceDefinitions, PassConfig, PassStage, RemoveAbstractDefinitions,
    RemoveUnusedDefinitions, RepeatedPass, ResolveDefinitionTemplates,
    ResolveInvalidReferences, ResolveParameterPlaceholders,
};
use crate::resolved::ResolvedGraph;
use crate::store::DefinitionStore;

/// Runs the pass pipeline over a store and freezes the result.
///
/// The default pipeline, in order:
///
/// 1. template resolution, parameter substitution, definition checks;
/// 2. invalid reference handling, then reference and cycle checks;
/// 3. abstract removal, then inlining and unused removal repeated until
///    stable.
#[derive(Debug)]
pub struct Compiler {
    passes: PassConfig,
}

impl Compiler {
    /// Creates a compiler with the default pipeline for `config`.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        let mut passes = PassConfig::new();
        passes.add(
            PassStage::BeforeOptimization,
            Box::new(ResolveDefinitionTemplates),
        );
        passes.add(
            PassStage::BeforeOptimization,
            Box::new(ResolveParameterPlaceholders),
        );
        passes.add(PassStage::BeforeOptimization, Box::new(CheckDefinitionValidity));
        passes.add(
            PassStage::Optimization,
            Box::new(ResolveInvalidReferences::new(config.exclusions.iter().map(String::as_str))),
        );
        passes.add(PassStage::Optimization, Box::new(CheckReferenceValidity));
        passes.add(PassStage::Optimization, Box::new(CheckCircularReferences));
        passes.add(PassStage::Removing, Box::new(RemoveAbstractDefinitions));

        let mut repeated: Vec<Box<dyn CompilerPass>> = Vec::new();
        if config.inline_services {
            repeated.push(Box::new(InlineServiceDefinitions));
        }
        if config.remove_unused {
            repeated.push(Box::new(RemoveUnusedDefinitions));
        }
        if !repeated.is_empty() {
            passes.add(PassStage::Removing, Box::new(RepeatedPass::new(repeated)));
        }

        Self { passes }
    }

    /// Appends a custom pass to `stage`.
    pub fn add_pass(&mut self, stage: PassStage, pass: Box<dyn CompilerPass>) {
        self.passes.add(stage, pass);
    }

    /// Returns the configured passes.
    #[must_use]
    pub const fn passes(&self) -> &PassConfig {
        &self.passes
    }

    /// Runs every pass over `store` and freezes it into a [`ResolvedGraph`].
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by a pass or by the final
    /// snapshot validation.
    pub fn compile(&mut self, mut store: DefinitionStore) -> Result<ResolvedGraph> {
        tracing::info!(
            services = store.all().len(),
            aliases = store.aliases().len(),
            "compiling service graph"
        );
        for stage in PassStage::ALL {
            for pass in self.passes.stage_mut(stage) {
                let outcome = pass.process(&mut store)?;
                tracing::debug!(pass = pass.name(), ?stage, ?outcome, "pass finished");
            }
        }
        let (definitions, aliases, parameters) = store.into_parts();
        let graph = ResolvedGraph::from_parts(definitions, aliases, parameters)?;
        tracing::info!(services = graph.definitions().len(), "service graph compiled");
        Ok(graph)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(&CompilerConfig::default())
    }
}
