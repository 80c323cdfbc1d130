//! Operator offload partitioner.
//!
//! This crate takes an `IrGraph` and carves out the regions a target
//! accelerator can execute, replacing each with an opaque call node whose
//! payload is the extracted subgraph.
//!
//! The partitioner is organized as a pipeline of passes that run in stages:
//! 1. **Annotation** - Tag every operator the target supports
//! 2. **Merging** - Group directly connected same-target operators into regions
//! 3. **Partitioning** - Replace each region with an opaque call
//!
//! # Example
//!
//! ```
//! use offload_compiler::partition_for_target;
//! use offload_core::{CapabilityRegistry, DataType, GraphBuilder, IrEdge, IrNode, TensorShape};
//! use offload_core::always_supported;
//!
//! # fn main() -> offload_core::Result<()> {
//! let mut builder = GraphBuilder::new();
//! let x = builder.input("x", DataType::F32, &[1, 8, 8, 3])?;
//! let w = builder.weight("w", DataType::F32, &[3, 3, 3, 16])?;
//! let y = builder.op(
//!     IrNode::new("nn.conv2d").with_name("conv").with_inputs(&[x, w]),
//!     IrEdge::new("y", DataType::F32, TensorShape::Static(vec![1, 8, 8, 16])),
//! )?;
//! builder.output(y);
//! let graph = builder.build()?;
//!
//! let mut registry = CapabilityRegistry::new();
//! registry.register("nn.conv2d", "acc1", always_supported)?;
//!
//! let partitioned = partition_for_target(&graph, &registry, "acc1")?;
//! assert_eq!(partitioned.opaque_calls().count(), 1);
//! # Ok(())
//! # }
//! ```

pub mod passes;
pub mod targets;

pub use passes::{
    AnnotateTargetPass, MergeRegionsPass, PartitionGraphPass, Region, RegionBoundary,
    collect_regions,
};

// Re-export commonly used types from offload-core
pub use offload_core::{CapabilityRegistry, Error, IrGraph, Pass, Result, Stage};

/// Partitioning pipeline with pluggable passes.
///
/// The pipeline runs in fixed stages: Annotation → Merging → Partitioning.
/// Built-in passes are registered in their respective stages, and custom
/// passes can be added via `add_pass()`.
pub struct PartitionPipeline {
    /// Target the built-in annotation pass tags for.
    target: String,

    /// All passes to run, ordered by (stage, registration order).
    passes: Vec<Box<dyn Pass>>,
}

impl PartitionPipeline {
    /// Create a pipeline with built-in passes for `target`.
    ///
    /// The built-in passes are:
    /// - `AnnotateTargetPass` (Annotation stage)
    /// - `MergeRegionsPass` (Merging stage)
    /// - `PartitionGraphPass` (Partitioning stage)
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        let mut pipeline = Self {
            target: target.clone(),
            passes: Vec::new(),
        };

        pipeline.add_pass(AnnotateTargetPass::new(target));
        pipeline.add_pass(MergeRegionsPass::new());
        pipeline.add_pass(PartitionGraphPass::new());

        pipeline
    }

    /// The target this pipeline partitions for.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Add a custom pass to the pipeline.
    ///
    /// The pass will be inserted into the appropriate stage (determined by
    /// `pass.stage()`). Within a stage, passes run in the order they were
    /// registered.
    ///
    /// # Returns
    ///
    /// Returns a mutable reference to self for method chaining.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Run every pass on a copy of `graph` and return the rewritten copy.
    ///
    /// # Errors
    ///
    /// Returns the first error any pass reports, unchanged. The caller's
    /// graph is never modified, so on error it is still the original.
    #[tracing::instrument(skip_all, fields(target_name = %self.target, num_nodes = graph.node_count()))]
    pub fn run(&mut self, graph: &IrGraph, registry: &CapabilityRegistry) -> Result<IrGraph> {
        let mut working = graph.clone();

        // Stable sort keeps registration order within a stage
        self.passes.sort_by_key(|p| p.stage());

        for pass in &self.passes {
            let _span =
                tracing::debug_span!("pass", name = pass.name(), stage = ?pass.stage()).entered();
            let changed = pass.run(&mut working, registry)?;
            tracing::debug!(changed, "pass finished");
        }

        tracing::debug!(
            num_nodes = working.node_count(),
            num_calls = working.opaque_calls().count(),
            "partitioning complete"
        );

        Ok(working)
    }
}

/// Tag the operators of a copy of `graph` that `target` supports.
pub fn annotate(graph: &IrGraph, registry: &CapabilityRegistry, target: &str) -> Result<IrGraph> {
    let mut working = graph.clone();
    AnnotateTargetPass::new(target).annotate(&mut working, registry)?;
    Ok(working)
}

/// Assign regions on a copy of an annotated graph.
///
/// # Errors
///
/// Returns `Error::CyclicRegion` if a region would depend on itself through
/// a host node.
pub fn merge(graph: &IrGraph) -> Result<IrGraph> {
    let mut working = graph.clone();
    MergeRegionsPass::new().merge(&mut working)?;
    Ok(working)
}

/// Outline the regions of a copy of a merged graph into opaque calls.
pub fn partition(graph: &IrGraph) -> Result<IrGraph> {
    let mut working = graph.clone();
    PartitionGraphPass::new().partition(&mut working)?;
    Ok(working)
}

/// Convenience function: creates a default pipeline for `target` and runs it.
///
/// # Errors
///
/// Returns an error if any stage fails; see `PartitionPipeline::run`.
#[tracing::instrument(skip_all, fields(target_name = %target))]
pub fn partition_for_target(
    graph: &IrGraph,
    registry: &CapabilityRegistry,
    target: &str,
) -> Result<IrGraph> {
    let mut pipeline = PartitionPipeline::new(target);
    pipeline.run(graph, registry)
}
