//! Region merging pass.
//!
//! Groups directly connected operators that carry the same target tag into
//! regions, and rejects groupings whose contraction would not be a DAG.

use offload_core::{
    CapabilityRegistry, Error, IrGraph, IrNode, IrNodeId, Pass, RegionId, Result, Stage,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;
use tracing::debug;

/// A maximal connected group of operators sharing one target tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Region identifier.
    pub id: RegionId,

    /// Target every member is tagged with.
    pub target: String,

    /// Member nodes in topological order.
    pub nodes: Vec<IrNodeId>,
}

/// Pass that assigns every tagged operator to a region.
///
/// Two tagged operators end up in the same region iff they are linked by a
/// chain of direct edges whose endpoints all carry the same tag. Region IDs
/// are dense and numbered in topological order of each region's first node.
///
/// If collapsing each region into a single node would create a cycle (a
/// region feeding a host node that feeds back into the same region), the pass
/// fails with `Error::CyclicRegion`.
pub struct MergeRegionsPass;

impl MergeRegionsPass {
    /// Create a new region merging pass.
    pub fn new() -> Self {
        Self
    }

    /// Compute regions and store them on the graph's nodes.
    ///
    /// The graph is only written once the grouping is known to be acyclic.
    pub fn merge(&self, graph: &mut IrGraph) -> Result<bool> {
        let order = graph.topological_order();
        let position: HashMap<IrNodeId, usize> =
            order.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();

        let mut sets = UnionFind::<usize>::new(order.len());
        for (pos, &node_id) in order.iter().enumerate() {
            let node = graph.node(node_id)?;
            let Some(target) = mergeable_target(node) else {
                continue;
            };

            for &input_id in node.inputs() {
                let Some(producer_id) = graph.tensor_producer(input_id) else {
                    continue;
                };
                if mergeable_target(graph.node(producer_id)?) == Some(target) {
                    sets.union(position[&producer_id], pos);
                }
            }
        }

        let mut region_of_root: HashMap<usize, RegionId> = HashMap::new();
        let mut assignments = Vec::with_capacity(order.len());
        for (pos, &node_id) in order.iter().enumerate() {
            let region = if mergeable_target(graph.node(node_id)?).is_some() {
                let next = RegionId(region_of_root.len());
                Some(*region_of_root.entry(sets.find(pos)).or_insert(next))
            } else {
                None
            };
            assignments.push((node_id, region));
        }

        check_contraction_acyclic(graph, &assignments)?;

        let mut changed = false;
        for (node_id, region) in assignments {
            let node = graph.node_mut(node_id)?;
            if node.region != region {
                node.region = region;
                changed = true;
            }
        }

        debug!(num_regions = region_of_root.len(), "merged regions");

        Ok(changed)
    }
}

impl Default for MergeRegionsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for MergeRegionsPass {
    fn name(&self) -> &str {
        "merge_regions"
    }

    fn stage(&self) -> Stage {
        Stage::Merging
    }

    fn run(&self, graph: &mut IrGraph, _registry: &CapabilityRegistry) -> Result<bool> {
        self.merge(graph)
    }
}

/// Collect the regions recorded on the graph's nodes, ordered by ID.
///
/// # Errors
///
/// Returns an error if a region mixes targets, which means the graph was
/// re-tagged after merging without merging again.
pub fn collect_regions(graph: &IrGraph) -> Result<Vec<Region>> {
    let mut regions: Vec<Region> = Vec::new();
    let mut index: HashMap<RegionId, usize> = HashMap::new();

    for node_id in graph.topological_order() {
        let node = graph.node(node_id)?;
        let (Some(region_id), Some(target)) = (node.region, mergeable_target(node)) else {
            continue;
        };

        match index.get(&region_id) {
            Some(&i) => {
                if regions[i].target != target {
                    return Err(Error::InvalidGraph(format!(
                        "{} mixes targets '{}' and '{}'",
                        region_id, regions[i].target, target
                    )));
                }
                regions[i].nodes.push(node_id);
            }
            None => {
                index.insert(region_id, regions.len());
                regions.push(Region {
                    id: region_id,
                    target: target.to_string(),
                    nodes: vec![node_id],
                });
            }
        }
    }

    regions.sort_by_key(|r| r.id);
    Ok(regions)
}

/// Target of an operator that may join a region. Opaque calls never do.
fn mergeable_target(node: &IrNode) -> Option<&str> {
    if node.is_opaque_call() {
        None
    } else {
        node.target()
    }
}

/// Build the graph with every region collapsed to one vertex and fail if it
/// has a cycle.
fn check_contraction_acyclic(
    graph: &IrGraph,
    assignments: &[(IrNodeId, Option<RegionId>)],
) -> Result<()> {
    #[derive(Clone, Copy)]
    enum Unit {
        Region(RegionId),
        Node,
    }

    let mut contracted: DiGraph<Unit, ()> = DiGraph::new();
    let mut region_vertex: HashMap<RegionId, NodeIndex> = HashMap::new();
    let mut vertex_of: HashMap<IrNodeId, NodeIndex> = HashMap::new();

    for &(node_id, region) in assignments {
        let vertex = match region {
            Some(region_id) => *region_vertex
                .entry(region_id)
                .or_insert_with(|| contracted.add_node(Unit::Region(region_id))),
            None => contracted.add_node(Unit::Node),
        };
        vertex_of.insert(node_id, vertex);
    }

    for &(node_id, _) in assignments {
        let to = vertex_of[&node_id];
        for &input_id in graph.node(node_id)?.inputs() {
            let Some(producer_id) = graph.tensor_producer(input_id) else {
                continue;
            };
            let from = vertex_of[&producer_id];
            if from != to {
                contracted.update_edge(from, to, ());
            }
        }
    }

    for component in tarjan_scc(&contracted) {
        if component.len() < 2 {
            continue;
        }

        let mut regions: Vec<RegionId> = component
            .iter()
            .filter_map(|&v| match contracted[v] {
                Unit::Region(id) => Some(id),
                Unit::Node => None,
            })
            .collect();
        regions.sort();

        debug!(?regions, "region contraction is cyclic");
        return Err(Error::CyclicRegion { regions });
    }

    Ok(())
}
