//! Core intermediate representation, capability registry, and pass traits for
//! the offload partitioner.
//!
//! This crate provides the foundational abstractions the other crates depend on:
//! - Graph-based IR (`IrGraph`, `IrNode`, `IrEdge`) with opaque call nodes
//! - Capability registry deciding which operators a target can execute
//! - Pass trait and stages for the partitioning pipeline
//! - DOT rendering of (partitioned) graphs

pub mod dot;
pub mod ir;
pub mod ir_builder;
pub mod pass;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use dot::to_dot;
pub use ir::{
    IrEdge, IrEdgeId, IrGraph, IrNode, IrNodeId, NodeKind, OPAQUE_CALL_OP, OpaqueCall, RegionId,
};
pub use ir_builder::GraphBuilder;
pub use pass::{Pass, Stage};
pub use registry::{
    Attributes, CapabilityRegistry, RegistryConfig, SupportPredicate, always_supported,
};
pub use types::{AttributeValue, DataType, TensorShape};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for offload-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Operator '{op_kind}' is already registered for target '{target}'")]
    DuplicateRegistration { op_kind: String, target: String },

    #[error("Merging regions {regions:?} would create a dependency cycle")]
    CyclicRegion { regions: Vec<RegionId> },

    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Attribute error: {0}")]
    Attribute(String),
}
