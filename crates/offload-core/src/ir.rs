//! Intermediate representation for the partitioner graph.
//!
//! The IR is a directed graph where:
//! - **Nodes** (`IrNode`) are operators (e.g., `nn.conv2d`, `nn.relu`) or
//!   opaque calls standing in for an extracted region
//! - **Edges** (`IrEdge`) are tensor value flows between nodes
//!
//! Partitioning removes the operators of a region and inserts a single
//! opaque call node that produces the region's boundary edges. Downstream
//! consumers keep referencing the same edge IDs.

use crate::types::{AttributeValue, DataType, TensorShape};
use crate::{Error, Result};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::Topo;

use std::collections::HashMap;
use std::fmt;

/// Operator kind given to opaque call nodes.
pub const OPAQUE_CALL_OP: &str = "offload.call";

/// Type alias for IR node identifiers (backed by petgraph NodeIndex).
pub type IrNodeId = NodeIndex;

/// Unique identifier for an edge (tensor flow) in the IR graph.
///
/// This is an index into `IrGraph::edges`. Edge IDs stay valid when nodes
/// are removed, which is what lets the partitioner rewire consumers by
/// simply changing an edge's producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrEdgeId(pub usize);

impl IrEdgeId {
    /// Create a new edge ID.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Identifier of a merged region, dense and assigned in topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub usize);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region_{}", self.0)
    }
}

// ──────────────────────────────── IrGraph ────────────────────────────────

/// Intermediate representation graph.
///
/// Nodes are operators; edges are tensor value flows stored in a side-table.
/// petgraph edges exist solely for topological ordering.
#[derive(Debug, Clone)]
pub struct IrGraph {
    /// The graph structure (nodes only, no edge data).
    graph: StableGraph<IrNode, ()>,

    /// Edge metadata side-table.
    edges: Vec<IrEdge>,

    /// Lookup table: edge name -> edge ID.
    edge_by_name: HashMap<String, IrEdgeId>,

    /// Lookup table: edge ID -> producing node ID.
    edge_producer: HashMap<IrEdgeId, IrNodeId>,

    /// Lookup table: edge ID -> consuming node IDs.
    edge_consumers: HashMap<IrEdgeId, Vec<IrNodeId>>,

    /// Graph input edge IDs.
    pub inputs: Vec<IrEdgeId>,

    /// Graph output edge IDs.
    pub outputs: Vec<IrEdgeId>,
}

impl IrGraph {
    /// Create a new empty IR graph.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            edges: Vec::new(),
            edge_by_name: HashMap::new(),
            edge_producer: HashMap::new(),
            edge_consumers: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    // ── Node access ──

    /// Get an immutable reference to a node.
    pub fn node(&self, id: IrNodeId) -> Result<&IrNode> {
        self.graph
            .node_weight(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: IrNodeId) -> Result<&mut IrNode> {
        self.graph
            .node_weight_mut(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    /// Iterate over all nodes in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = (IrNodeId, &IrNode)> {
        self.graph
            .node_indices()
            .filter_map(|id| self.graph.node_weight(id).map(|node| (id, node)))
    }

    /// Iterate over the opaque call nodes in the graph.
    pub fn opaque_calls(&self) -> impl Iterator<Item = (IrNodeId, &OpaqueCall)> {
        self.nodes()
            .filter_map(|(id, node)| node.as_opaque_call().map(|call| (id, call)))
    }

    /// Get the argument descriptors of a node, in input slot order.
    pub fn node_args(&self, id: IrNodeId) -> Result<Vec<&IrEdge>> {
        self.node(id)?
            .inputs
            .iter()
            .map(|&edge_id| self.edge(edge_id))
            .collect()
    }

    // ── Edge (tensor) access ──

    /// Get the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get an immutable reference to an edge.
    pub fn edge(&self, id: IrEdgeId) -> Result<&IrEdge> {
        self.edges
            .get(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Edge {:?} not found", id)))
    }

    /// Get a mutable reference to an edge.
    pub fn edge_mut(&mut self, id: IrEdgeId) -> Result<&mut IrEdge> {
        self.edges
            .get_mut(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Edge {:?} not found", id)))
    }

    /// Look up an edge by name.
    pub fn edge_by_name(&self, name: &str) -> Option<IrEdgeId> {
        self.edge_by_name.get(name).copied()
    }

    /// Get the node that produces an edge, if any.
    pub fn tensor_producer(&self, id: IrEdgeId) -> Option<IrNodeId> {
        self.edge_producer.get(&id).copied()
    }

    /// Get the nodes that consume an edge.
    pub fn tensor_consumers(&self, id: IrEdgeId) -> Vec<IrNodeId> {
        self.edge_consumers.get(&id).cloned().unwrap_or_default()
    }

    /// Check whether an edge is one of the graph outputs.
    pub fn is_graph_output(&self, id: IrEdgeId) -> bool {
        self.outputs.contains(&id)
    }

    // ── Graph mutation ──

    /// Add a new node to the graph and return its ID.
    ///
    /// This updates the producer/consumer lookup tables and adds petgraph
    /// edges for topological ordering, both from the producers of the node's
    /// inputs and to any already-present consumers of its outputs.
    pub fn add_node(&mut self, node: IrNode) -> IrNodeId {
        let inputs = node.inputs.clone();
        let outputs = node.outputs.clone();

        let node_id = self.graph.add_node(node);
        self.graph[node_id].node_index = node_id;

        for &output_id in &outputs {
            self.edge_producer.insert(output_id, node_id);

            if let Some(consumers) = self.edge_consumers.get(&output_id) {
                for &consumer_id in consumers {
                    self.graph.add_edge(node_id, consumer_id, ());
                }
            }
        }

        for &input_id in &inputs {
            self.edge_consumers
                .entry(input_id)
                .or_default()
                .push(node_id);

            if let Some(&producer_id) = self.edge_producer.get(&input_id) {
                self.graph.add_edge(producer_id, node_id, ());
            }
        }

        node_id
    }

    /// Remove a node from the graph and return it.
    ///
    /// This also removes the node from producer/consumer lookup tables. With
    /// `StableGraph`, other node indices remain valid.
    pub fn remove_node(&mut self, id: IrNodeId) -> Result<IrNode> {
        let node = self
            .graph
            .remove_node(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))?;

        for output_id in &node.outputs {
            if self.edge_producer.get(output_id) == Some(&id) {
                self.edge_producer.remove(output_id);
            }
        }

        for input_id in &node.inputs {
            if let Some(consumers) = self.edge_consumers.get_mut(input_id) {
                consumers.retain(|&c| c != id);
            }
        }

        Ok(node)
    }

    /// Add an edge (tensor) to the graph and return its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if an edge with the same name already exists.
    pub fn add_edge(&mut self, edge: IrEdge) -> Result<IrEdgeId> {
        if self.edge_by_name.contains_key(&edge.name) {
            return Err(Error::InvalidGraph(format!(
                "Edge '{}' already exists",
                edge.name
            )));
        }

        let id = IrEdgeId::new(self.edges.len());
        self.edge_by_name.insert(edge.name.clone(), id);
        self.edges.push(edge);
        Ok(id)
    }

    // ── Graph queries ──

    /// Get the topological order of nodes in the graph.
    ///
    /// Returns nodes in an order such that all inputs to a node are produced
    /// before the node itself. The order is a pure function of the graph's
    /// construction history, so two clones yield the same order.
    pub fn topological_order(&self) -> Vec<IrNodeId> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some(id) = topo.next(&self.graph) {
            order.push(id);
        }

        order
    }

    /// Check whether the node dependencies contain a cycle.
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Get the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Find a node by its name.
    ///
    /// # Errors
    ///
    /// Returns an error if no node with the given name exists.
    pub fn find_node_by_name(&self, name: &str) -> Result<IrNodeId> {
        self.nodes()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node '{}' not found", name)))
    }
}

impl Default for IrGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────── IrNode ─────────────────────────────────

/// What a node computes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A primitive operator identified by `IrNode::op_type`.
    Operator,

    /// A call into a region extracted for an external target.
    OpaqueCall(Box<OpaqueCall>),
}

/// Payload of an opaque call node: the extracted region as its own graph.
///
/// `body.inputs` and `body.outputs` correspond positionally to the call
/// node's `inputs` and `outputs` in the parent graph.
#[derive(Debug, Clone)]
pub struct OpaqueCall {
    /// Global symbol of the extracted function (e.g., `gigo_0`).
    pub symbol: String,

    /// Target that will compile the body.
    pub target: String,

    /// The extracted subgraph.
    pub body: IrGraph,
}

/// A node in the IR graph.
#[derive(Debug, Clone)]
pub struct IrNode {
    /// Node name (may be empty).
    pub name: String,

    /// Operator kind (e.g., "nn.conv2d", "qnn.conv2d").
    pub op_type: String,

    /// Operator attributes (e.g., layouts, strides, padding).
    pub attributes: HashMap<String, AttributeValue>,

    /// Input edge IDs.
    pub inputs: Vec<IrEdgeId>,

    /// Output edge IDs.
    pub outputs: Vec<IrEdgeId>,

    /// Target this node is eligible to run on; `None` means the host.
    pub target: Option<String>,

    /// Region assigned by the merger.
    pub region: Option<RegionId>,

    /// Operator or opaque call.
    pub kind: NodeKind,

    /// The graph node index (for efficient graph traversal).
    pub node_index: IrNodeId,
}

impl IrNode {
    /// Create a new operator node.
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            op_type: op_type.into(),
            attributes: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            target: None,
            region: None,
            kind: NodeKind::Operator,
            node_index: NodeIndex::default(),
        }
    }

    /// Create an opaque call node for an extracted region.
    ///
    /// The node is named after the call symbol and tagged with its target.
    pub fn opaque_call(call: OpaqueCall, inputs: Vec<IrEdgeId>, outputs: Vec<IrEdgeId>) -> Self {
        let mut node = Self::new(OPAQUE_CALL_OP);
        node.name = call.symbol.clone();
        node.target = Some(call.target.clone());
        node.inputs = inputs;
        node.outputs = outputs;
        node.kind = NodeKind::OpaqueCall(Box::new(call));
        node
    }

    /// Set the node name (builder style).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append input edges (builder style).
    pub fn with_inputs(mut self, inputs: &[IrEdgeId]) -> Self {
        self.inputs.extend_from_slice(inputs);
        self
    }

    /// Set an attribute (builder style).
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Get the operator type.
    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Get input edge IDs.
    pub fn inputs(&self) -> &[IrEdgeId] {
        &self.inputs
    }

    /// Get output edge IDs.
    pub fn outputs(&self) -> &[IrEdgeId] {
        &self.outputs
    }

    /// Get the target tag, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Check if this node is an opaque call.
    pub fn is_opaque_call(&self) -> bool {
        matches!(self.kind, NodeKind::OpaqueCall(_))
    }

    /// Get the opaque call payload, if this node is one.
    pub fn as_opaque_call(&self) -> Option<&OpaqueCall> {
        match &self.kind {
            NodeKind::OpaqueCall(call) => Some(call),
            NodeKind::Operator => None,
        }
    }

    /// Add an input edge.
    pub fn add_input(&mut self, edge_id: IrEdgeId) {
        self.inputs.push(edge_id);
    }

    /// Add an output edge.
    pub fn add_output(&mut self, edge_id: IrEdgeId) {
        self.outputs.push(edge_id);
    }

    /// Set an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get an attribute.
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Check if an attribute exists.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Get a typed attribute value.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute is missing or has a different type.
    pub fn attr<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<AttributeValue, Error = String>,
    {
        let value = self.attributes.get(name).ok_or_else(|| {
            Error::Attribute(format!(
                "Node '{}' ({}) has no attribute '{}'",
                self.name, self.op_type, name
            ))
        })?;

        T::try_from(value.clone()).map_err(|e| {
            Error::Attribute(format!(
                "Attribute '{}' on node '{}': {}",
                name, self.name, e
            ))
        })
    }

    /// Get a typed attribute value, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute is present with a different type.
    pub fn attr_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: TryFrom<AttributeValue, Error = String>,
    {
        if self.has_attr(name) {
            self.attr(name)
        } else {
            Ok(default)
        }
    }
}

// ──────────────────────────────── IrEdge ─────────────────────────────────

/// An edge (tensor value flow) in the IR graph.
#[derive(Debug, Clone, PartialEq)]
pub struct IrEdge {
    /// Tensor name (must be unique within the graph).
    pub name: String,

    /// Data type.
    pub dtype: DataType,

    /// Shape (static or not yet inferred).
    pub shape: TensorShape,
}

impl IrEdge {
    /// Create a new edge.
    pub fn new(name: impl Into<String>, dtype: DataType, shape: TensorShape) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(graph: &mut IrGraph, name: &str) -> IrEdgeId {
        graph
            .add_edge(IrEdge::new(name, DataType::F32, TensorShape::Static(vec![2])))
            .unwrap()
    }

    #[test]
    fn test_create_empty_graph() {
        let graph = IrGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn test_add_edge() {
        let mut graph = IrGraph::new();
        let edge_id = edge(&mut graph, "x");

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge(edge_id).unwrap().name, "x");
        assert_eq!(graph.edge_by_name("x"), Some(edge_id));
    }

    #[test]
    fn test_duplicate_edge_name_rejected() {
        let mut graph = IrGraph::new();
        edge(&mut graph, "x");

        let result = graph.add_edge(IrEdge::new("x", DataType::F32, TensorShape::Unknown));
        assert!(matches!(result, Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_add_node() {
        let mut graph = IrGraph::new();
        let input_id = edge(&mut graph, "input");
        let output_id = edge(&mut graph, "output");

        let mut node = IrNode::new("nn.relu");
        node.add_input(input_id);
        node.add_output(output_id);
        let node_id = graph.add_node(node);

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(node_id).unwrap().op_type(), "nn.relu");
        assert_eq!(graph.node(node_id).unwrap().node_index, node_id);
        assert_eq!(graph.tensor_producer(output_id), Some(node_id));
        assert_eq!(graph.tensor_consumers(input_id), vec![node_id]);
    }

    #[test]
    fn test_remove_node() {
        let mut graph = IrGraph::new();
        let input_id = edge(&mut graph, "input");
        let output_id = edge(&mut graph, "output");

        let mut node = IrNode::new("add");
        node.add_input(input_id);
        node.add_output(output_id);
        let node_id = graph.add_node(node);

        let removed = graph.remove_node(node_id).unwrap();

        assert_eq!(removed.op_type(), "add");
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.tensor_producer(output_id), None);
        assert!(graph.tensor_consumers(input_id).is_empty());
        assert!(graph.remove_node(node_id).is_err());
    }

    #[test]
    fn test_topological_order() {
        let mut graph = IrGraph::new();
        let t0 = edge(&mut graph, "t0");
        let t1 = edge(&mut graph, "t1");
        let t2 = edge(&mut graph, "t2");
        let t3 = edge(&mut graph, "t3");

        let mut node_a = IrNode::new("A");
        node_a.add_input(t0);
        node_a.add_output(t1);
        let id_a = graph.add_node(node_a);

        let mut node_b = IrNode::new("B");
        node_b.add_input(t1);
        node_b.add_output(t2);
        let id_b = graph.add_node(node_b);

        let mut node_c = IrNode::new("C");
        node_c.add_input(t2);
        node_c.add_output(t3);
        let id_c = graph.add_node(node_c);

        assert_eq!(graph.topological_order(), vec![id_a, id_b, id_c]);
        assert!(!graph.is_cyclic());
    }

    #[test]
    fn test_replacement_node_keeps_consumers_ordered() {
        let mut graph = IrGraph::new();
        let t0 = edge(&mut graph, "t0");
        let t1 = edge(&mut graph, "t1");
        let t2 = edge(&mut graph, "t2");

        let mut producer = IrNode::new("A");
        producer.add_input(t0);
        producer.add_output(t1);
        let id_a = graph.add_node(producer);

        let mut consumer = IrNode::new("B");
        consumer.add_input(t1);
        consumer.add_output(t2);
        let id_b = graph.add_node(consumer);

        // Swap the producer for a new node; the existing consumer must still
        // come after it in topological order.
        graph.remove_node(id_a).unwrap();
        let mut replacement = IrNode::new("A2");
        replacement.add_input(t0);
        replacement.add_output(t1);
        let id_a2 = graph.add_node(replacement);

        assert_eq!(graph.tensor_producer(t1), Some(id_a2));
        assert_eq!(graph.topological_order(), vec![id_a2, id_b]);
    }

    #[test]
    fn test_typed_attributes() {
        let mut node = IrNode::new("nn.conv2d");
        node.name = "conv".to_string();
        node.set_attribute("strides", vec![2i64, 2]);
        node.set_attribute("data_layout", "NHWC");

        let strides: Vec<i64> = node.attr("strides").unwrap();
        assert_eq!(strides, vec![2, 2]);

        let groups: i64 = node.attr_or("groups", 1).unwrap();
        assert_eq!(groups, 1);

        assert!(matches!(node.attr::<i64>("data_layout"), Err(Error::Attribute(_))));
        assert!(matches!(node.attr::<i64>("missing"), Err(Error::Attribute(_))));
    }

    #[test]
    fn test_opaque_call_node() {
        let call = OpaqueCall {
            symbol: "gigo_0".to_string(),
            target: "gigo".to_string(),
            body: IrGraph::new(),
        };
        let node = IrNode::opaque_call(call, vec![IrEdgeId::new(0)], vec![IrEdgeId::new(1)]);

        assert!(node.is_opaque_call());
        assert_eq!(node.op_type(), OPAQUE_CALL_OP);
        assert_eq!(node.name, "gigo_0");
        assert_eq!(node.target(), Some("gigo"));
        assert_eq!(node.as_opaque_call().unwrap().symbol, "gigo_0");
    }
}
