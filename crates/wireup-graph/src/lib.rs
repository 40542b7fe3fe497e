//! # wireup-graph
//!
//! Service definitions and the compiler that turns them into a resolved
//! service graph.
//!
//! Handles:
//! - **Store**: registration of definitions, aliases, and parameters.
//! - **Parameters**: `%name%` placeholder resolution and freezing.
//! - **Graph**: the `petgraph`-backed reference graph with cycle detection.
//! - **Passes**: template resolution, invalid reference handling, inlining,
//!   and cleanup.
//! - **Compiler**: the ordered pass pipeline producing a [`ResolvedGraph`].

pub mod compiler;
pub mod definition;
pub mod graph;
pub mod parameter;
pub mod passes;
pub mod resolved;
pub mod store;
pub mod value;

pub use compiler::Compiler;
pub use definition::{Alias, Definition, MethodCall, TagAttributes};
pub use parameter::ParameterBag;
pub use resolved::ResolvedGraph;
pub use store::DefinitionStore;
pub use value::{NativeValue, Reference, Value};
