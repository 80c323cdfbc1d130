//! Graph partitioning pass.
//!
//! Replaces every merged region with a single opaque call node whose payload
//! is the region extracted into its own graph.

use super::merge_regions::{Region, collect_regions};
use offload_core::{
    CapabilityRegistry, Error, IrEdgeId, IrGraph, IrNode, IrNodeId, OpaqueCall, Pass, Result,
    Stage,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Edges crossing a region's boundary, in call argument order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionBoundary {
    /// Edges consumed inside the region but produced outside it, in order of
    /// first use (members in topological order, inputs in slot order).
    pub inputs: Vec<IrEdgeId>,

    /// Edges produced inside the region that are graph outputs or have a
    /// consumer outside it, in member topological order then output slot.
    pub outputs: Vec<IrEdgeId>,
}

impl RegionBoundary {
    /// Compute the boundary of a region.
    pub fn compute(graph: &IrGraph, region: &Region) -> Result<Self> {
        let members: HashSet<IrNodeId> = region.nodes.iter().copied().collect();
        let mut boundary = Self::default();
        let mut seen_inputs: HashSet<IrEdgeId> = HashSet::new();

        for &node_id in &region.nodes {
            let node = graph.node(node_id)?;

            for &input_id in node.inputs() {
                let internal = graph
                    .tensor_producer(input_id)
                    .is_some_and(|p| members.contains(&p));
                if !internal && seen_inputs.insert(input_id) {
                    boundary.inputs.push(input_id);
                }
            }

            for &output_id in node.outputs() {
                let escapes = graph.is_graph_output(output_id)
                    || graph
                        .tensor_consumers(output_id)
                        .iter()
                        .any(|c| !members.contains(c));
                if escapes {
                    boundary.outputs.push(output_id);
                }
            }
        }

        Ok(boundary)
    }
}

/// Pass that outlines each region into an opaque call.
///
/// For each region, in region ID order:
/// 1. Computes the region boundary (`RegionBoundary`)
/// 2. Copies the members and every edge they touch into a fresh body graph
/// 3. Removes the members from the parent graph
/// 4. Adds an opaque call node consuming the boundary inputs and producing
///    the boundary outputs, so external consumers are rewired for free
///
/// Calls are named `<target>_<n>`, numbering on from calls already present
/// for that target. Edges internal to a region stay in the parent's edge
/// table, unreferenced.
pub struct PartitionGraphPass;

impl PartitionGraphPass {
    /// Create a new partitioning pass.
    pub fn new() -> Self {
        Self
    }

    /// Outline every region recorded on the graph.
    pub fn partition(&self, graph: &mut IrGraph) -> Result<bool> {
        let regions = collect_regions(graph)?;
        if regions.is_empty() {
            return Ok(false);
        }

        let mut next_index: HashMap<String, usize> = HashMap::new();
        for (_, call) in graph.opaque_calls() {
            *next_index.entry(call.target.clone()).or_default() += 1;
        }

        for region in &regions {
            let boundary = RegionBoundary::compute(graph, region)?;
            let body = extract_body(graph, region, &boundary)?;

            let index = next_index.entry(region.target.clone()).or_default();
            let symbol = format!("{}_{}", region.target, index);
            *index += 1;

            debug!(
                %symbol,
                region = %region.id,
                num_nodes = region.nodes.len(),
                num_inputs = boundary.inputs.len(),
                num_outputs = boundary.outputs.len(),
                "outlined region"
            );

            for &node_id in &region.nodes {
                graph.remove_node(node_id)?;
            }

            let call = OpaqueCall {
                symbol,
                target: region.target.clone(),
                body,
            };
            graph.add_node(IrNode::opaque_call(
                call,
                boundary.inputs,
                boundary.outputs,
            ));
        }

        Ok(true)
    }
}

impl Default for PartitionGraphPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for PartitionGraphPass {
    fn name(&self) -> &str {
        "partition_graph"
    }

    fn stage(&self) -> Stage {
        Stage::Partitioning
    }

    fn run(&self, graph: &mut IrGraph, _registry: &CapabilityRegistry) -> Result<bool> {
        self.partition(graph)
    }
}

/// Copy a region into a standalone graph whose inputs and outputs mirror the
/// boundary.
fn extract_body(graph: &IrGraph, region: &Region, boundary: &RegionBoundary) -> Result<IrGraph> {
    let mut body = IrGraph::new();
    let mut remap: HashMap<IrEdgeId, IrEdgeId> = HashMap::new();

    for &edge_id in &boundary.inputs {
        let new_id = body.add_edge(graph.edge(edge_id)?.clone())?;
        remap.insert(edge_id, new_id);
        body.inputs.push(new_id);
    }

    for &node_id in &region.nodes {
        let node = graph.node(node_id)?;
        let mut copy = node.clone();
        copy.target = None;
        copy.region = None;

        copy.inputs = node
            .inputs()
            .iter()
            .map(|edge_id| {
                remap.get(edge_id).copied().ok_or_else(|| {
                    Error::InvalidGraph(format!(
                        "Node '{}' in {} reads edge {:?} before it is produced",
                        node.name, region.id, edge_id
                    ))
                })
            })
            .collect::<Result<_>>()?;

        copy.outputs.clear();
        for &edge_id in node.outputs() {
            let new_id = body.add_edge(graph.edge(edge_id)?.clone())?;
            remap.insert(edge_id, new_id);
            copy.outputs.push(new_id);
        }

        body.add_node(copy);
    }

    for edge_id in &boundary.outputs {
        let new_id = remap.get(edge_id).copied().ok_or_else(|| {
            Error::InvalidGraph(format!(
                "Boundary output {:?} of {} is not produced by a member",
                edge_id, region.id
            ))
        })?;
        body.outputs.push(new_id);
    }

    Ok(body)
}
