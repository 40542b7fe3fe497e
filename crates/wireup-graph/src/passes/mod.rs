//! Compiler passes over a mutable [`DefinitionStore`].
//!
//! Each pass is a self-contained transformation. The [`crate::compiler::Compiler`]
//! runs them in a fixed order; custom passes join at a [`PassStage`].

mod check_definitions;
mod check_references;
mod inline_services;
mod remove_abstract;
mod remove_unused;
mod resolve_invalid_references;
mod resolve_parameters;
mod resolve_templates;

use std::fmt;

use wireup_common::constants::MAX_PASS_REPETITIONS;
use wireup_common::error::Result;

use crate::store::DefinitionStore;

pub use check_definitions::CheckDefinitionValidity;
pub use check_references::{CheckCircularReferences, CheckReferenceValidity};
pub use inline_services::InlineServiceDefinitions;
pub use remove_abstract::RemoveAbstractDefinitions;
pub use remove_unused::RemoveUnusedDefinitions;
pub use resolve_invalid_references::ResolveInvalidReferences;
pub use resolve_parameters::ResolveParameterPlaceholders;
pub use resolve_templates::{ResolveDefinitionTemplates, merge};

/// Whether a pass modified the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing changed.
    Unchanged,
    /// At least one definition or alias changed.
    Changed,
}

impl PassOutcome {
    /// Returns `Changed` when `changed` is true.
    #[must_use]
    pub const fn from_changed(changed: bool) -> Self {
        if changed { Self::Changed } else { Self::Unchanged }
    }

    /// Returns whether the store changed.
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// A transformation of the definition store.
pub trait CompilerPass: fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs the pass.
    ///
    /// # Errors
    ///
    /// Returns an error on fatal structural problems.
    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome>;
}

/// Point in the pipeline where a pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassStage {
    /// Template, parameter, and validity passes.
    BeforeOptimization,
    /// Reference resolution and checks.
    Optimization,
    /// Right before abstract definitions are dropped.
    BeforeRemoving,
    /// Removal, inlining, and unused-definition cleanup.
    Removing,
    /// After the store has reached its final shape.
    AfterRemoving,
}

impl PassStage {
    /// Every stage in execution order.
    pub const ALL: [Self; 5] = [
        Self::BeforeOptimization,
        Self::Optimization,
        Self::BeforeRemoving,
        Self::Removing,
        Self::AfterRemoving,
    ];
}

/// Ordered pass lists, one per stage.
#[derive(Debug, Default)]
pub struct PassConfig {
    before_optimization: Vec<Box<dyn CompilerPass>>,
    optimization: Vec<Box<dyn CompilerPass>>,
    before_removing: Vec<Box<dyn CompilerPass>>,
    removing: Vec<Box<dyn CompilerPass>>,
    after_removing: Vec<Box<dyn CompilerPass>>,
}

impl PassConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pass to `stage`.
    pub fn add(&mut self, stage: PassStage, pass: Box<dyn CompilerPass>) {
        self.stage_mut(stage).push(pass);
    }

    /// Returns the passes of `stage`.
    #[must_use]
    pub fn stage(&self, stage: PassStage) -> &[Box<dyn CompilerPass>] {
        match stage {
            PassStage::BeforeOptimization => &self.before_optimization,
            PassStage::Optimization => &self.optimization,
            PassStage::BeforeRemoving => &self.before_removing,
            PassStage::Removing => &self.removing,
            PassStage::AfterRemoving => &self.after_removing,
        }
    }

    /// Mutable counterpart of [`Self::stage`].
    pub const fn stage_mut(&mut self, stage: PassStage) -> &mut Vec<Box<dyn CompilerPass>> {
        match stage {
            PassStage::BeforeOptimization => &mut self.before_optimization,
            PassStage::Optimization => &mut self.optimization,
            PassStage::BeforeRemoving => &mut self.before_removing,
            PassStage::Removing => &mut self.removing,
            PassStage::AfterRemoving => &mut self.after_removing,
        }
    }

    /// Returns the names of every pass in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        PassStage::ALL
            .iter()
            .flat_map(|&stage| self.stage(stage).iter().map(|pass| pass.name()))
            .collect()
    }
}

/// Runs a group of passes until none of them reports a change.
#[derive(Debug)]
pub struct RepeatedPass {
    passes: Vec<Box<dyn CompilerPass>>,
}

impl RepeatedPass {
    /// Creates a repeated group.
    #[must_use]
    pub fn new(passes: Vec<Box<dyn CompilerPass>>) -> Self {
        Self { passes }
    }
}

impl CompilerPass for RepeatedPass {
    fn name(&self) -> &'static str {
        "repeated"
    }

    fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
        let mut any_change = false;
        for iteration in 1..=MAX_PASS_REPETITIONS {
            let mut changed = false;
            for pass in &mut self.passes {
                let outcome = pass.process(store)?;
                tracing::debug!(pass = pass.name(), iteration, ?outcome, "repeated pass ran");
                changed |= outcome.is_changed();
            }
            if !changed {
                return Ok(PassOutcome::from_changed(any_change));
            }
            any_change = true;
        }
        tracing::warn!(
            limit = MAX_PASS_REPETITIONS,
            "repeated passes did not settle; stopping"
        );
        Ok(PassOutcome::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;

    #[derive(Debug)]
    struct Countdown {
        remaining: usize,
    }

    impl CompilerPass for Countdown {
        fn name(&self) -> &'static str {
            "countdown"
        }

        fn process(&mut self, store: &mut DefinitionStore) -> Result<PassOutcome> {
            if self.remaining == 0 {
                return Ok(PassOutcome::Unchanged);
            }
            self.remaining -= 1;
            store.register(format!("s{}", self.remaining), Definition::new("Step"));
            Ok(PassOutcome::Changed)
        }
    }

    #[test]
    fn repeated_pass_runs_until_stable() {
        let mut store = DefinitionStore::new();
        let mut pass = RepeatedPass::new(vec![Box::new(Countdown { remaining: 3 })]);
        let outcome = pass.process(&mut store).expect("process");
        assert_eq!(outcome, PassOutcome::Changed);
        assert_eq!(store.all().len(), 3);
    }

    #[test]
    fn repeated_pass_reports_unchanged_when_idle() {
        let mut store = DefinitionStore::new();
        let mut pass = RepeatedPass::new(vec![Box::new(Countdown { remaining: 0 })]);
        assert_eq!(pass.process(&mut store).expect("process"), PassOutcome::Unchanged);
    }

    #[test]
    fn repeated_pass_is_bounded() {
        let mut store = DefinitionStore::new();
        let mut pass = RepeatedPass::new(vec![Box::new(Countdown {
            remaining: usize::MAX,
        })]);
        assert!(pass.process(&mut store).is_ok());
        assert_eq!(store.all().len(), MAX_PASS_REPETITIONS);
    }

    #[test]
    fn pass_config_orders_by_stage() {
        let mut config = PassConfig::new();
        config.add(PassStage::Removing, Box::new(RemoveUnusedDefinitions));
        config.add(
            PassStage::BeforeOptimization,
            Box::new(ResolveDefinitionTemplates),
        );
        assert_eq!(config.names(), vec!["resolve_templates", "remove_unused"]);
    }
}
