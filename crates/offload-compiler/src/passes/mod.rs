//! Passes that annotate, merge, and partition the graph for a target.

mod annotate_target;
mod merge_regions;
mod partition_graph;

pub use annotate_target::AnnotateTargetPass;
pub use merge_regions::{MergeRegionsPass, Region, collect_regions};
pub use partition_graph::{PartitionGraphPass, RegionBoundary};
