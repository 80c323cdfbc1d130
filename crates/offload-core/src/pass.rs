//! Partitioning pass trait and stage definitions.

use crate::Result;
use crate::ir::IrGraph;
use crate::registry::CapabilityRegistry;

/// Partitioning stage for organizing passes.
///
/// Passes are grouped into stages and run in a fixed order. Within each stage,
/// passes run in the order they were registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Tag every node with the target it may run on (earliest stage).
    Annotation,

    /// Group adjacent same-target nodes into regions.
    Merging,

    /// Replace each region with an opaque call to an extracted subgraph.
    Partitioning,
}

/// Trait for implementing partitioning passes.
///
/// A pass is a graph transformation that runs during a specific stage.
///
/// # Return Value
///
/// The `run()` method returns `Ok(true)` if the pass made changes to the
/// graph, or `Ok(false)` if no changes were made.
///
/// # Example
///
/// ```ignore
/// struct ClearTagsPass;
///
/// impl Pass for ClearTagsPass {
///     fn name(&self) -> &str {
///         "clear_tags"
///     }
///
///     fn stage(&self) -> Stage {
///         Stage::Annotation
///     }
///
///     fn run(&self, graph: &mut IrGraph, registry: &CapabilityRegistry) -> Result<bool> {
///         let mut changed = false;
///         // Reset target tags...
///         Ok(changed)
///     }
/// }
/// ```
pub trait Pass: Send + Sync {
    /// Get the pass name (used for logging and debugging).
    fn name(&self) -> &str;

    /// Get the stage this pass belongs to.
    fn stage(&self) -> Stage;

    /// Run the pass on the given graph.
    ///
    /// # Arguments
    ///
    /// * `graph` - The IR graph to transform (mutable).
    /// * `registry` - The capability registry (for target support queries).
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if the pass made changes to the graph.
    /// * `Ok(false)` if no changes were made.
    /// * `Err(_)` if the pass encountered an error.
    fn run(&self, graph: &mut IrGraph, registry: &CapabilityRegistry) -> Result<bool>;
}
