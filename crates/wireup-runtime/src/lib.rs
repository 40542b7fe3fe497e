//! # wireup-runtime
//!
//! Runtime side of the service container.
//!
//! Handles:
//! - **Container**: parameters, aliases, memoised instances, and runtime
//!   cycle detection shared by every container.
//! - **Locator**: the [`ServiceLocator`] trait and reference policies at
//!   lookup time.
//! - **Graph container**: lazy instantiation straight from a resolved graph.
//! - **Info**: static metadata tables embedded in generated containers.
//!
//! The runtime is single-threaded: instances are `Rc`-shared and the
//! container uses interior mutability.

pub mod container;
pub mod graph_container;
pub mod info;
pub mod instance;
pub mod locator;
pub mod value;

pub use container::Container;
pub use graph_container::GraphContainer;
pub use info::{ServiceInfo, TagInfo};
pub use instance::{Instance, InstanceBuilder, Invocation};
pub use locator::ServiceLocator;
pub use value::Value;
pub use wireup_common::error::{Result, WireupError};
pub use wireup_common::types::ReferencePolicy;
