//! Incremental construction of IR graphs.

use crate::ir::{IrEdge, IrEdgeId, IrGraph, IrNode, IrNodeId};
use crate::types::{DataType, TensorShape};
use crate::{Error, Result};

/// Builds an `IrGraph` one edge and node at a time.
///
/// Nodes must be added after the nodes producing their inputs, so a graph
/// built this way is acyclic by construction; `build()` still checks.
///
/// # Example
///
/// ```
/// use offload_core::{DataType, GraphBuilder, IrEdge, IrNode, TensorShape};
///
/// # fn main() -> offload_core::Result<()> {
/// let mut builder = GraphBuilder::new();
/// let x = builder.input("x", DataType::F32, &[1, 8, 8, 3])?;
/// let w = builder.weight("w", DataType::F32, &[3, 3, 3, 16])?;
/// let y = builder.op(
///     IrNode::new("nn.conv2d").with_name("conv").with_inputs(&[x, w]),
///     IrEdge::new("y", DataType::F32, TensorShape::Static(vec![1, 8, 8, 16])),
/// )?;
/// builder.output(y);
/// let graph = builder.build()?;
/// assert_eq!(graph.node_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: IrGraph,
}

impl GraphBuilder {
    /// Create a builder for an empty graph.
    pub fn new() -> Self {
        Self {
            graph: IrGraph::new(),
        }
    }

    /// Add a graph input with a static shape.
    pub fn input(&mut self, name: &str, dtype: DataType, dims: &[usize]) -> Result<IrEdgeId> {
        let id = self
            .graph
            .add_edge(IrEdge::new(name, dtype, TensorShape::Static(dims.to_vec())))?;
        self.graph.inputs.push(id);
        Ok(id)
    }

    /// Add a parameter edge (weights, biases) with no producer.
    ///
    /// Unlike `input()`, parameters are not listed among the graph inputs.
    pub fn weight(&mut self, name: &str, dtype: DataType, dims: &[usize]) -> Result<IrEdgeId> {
        self.graph
            .add_edge(IrEdge::new(name, dtype, TensorShape::Static(dims.to_vec())))
    }

    /// Add a single-output node and return its output edge.
    pub fn op(&mut self, node: IrNode, output: IrEdge) -> Result<IrEdgeId> {
        let (_, outputs) = self.op_multi(node, vec![output])?;
        Ok(outputs[0])
    }

    /// Add a node with any number of outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the node references an edge that does not exist,
    /// or an output name collides with an existing edge.
    pub fn op_multi(
        &mut self,
        mut node: IrNode,
        outputs: Vec<IrEdge>,
    ) -> Result<(IrNodeId, Vec<IrEdgeId>)> {
        for &input_id in &node.inputs {
            if input_id.index() >= self.graph.edge_count() {
                return Err(Error::InvalidGraph(format!(
                    "Node '{}' references unknown input edge {:?}",
                    node.name, input_id
                )));
            }
        }

        let mut output_ids = Vec::with_capacity(outputs.len());
        for edge in outputs {
            output_ids.push(self.graph.add_edge(edge)?);
        }
        node.outputs.extend_from_slice(&output_ids);

        let node_id = self.graph.add_node(node);
        Ok((node_id, output_ids))
    }

    /// Mark an edge as a graph output.
    pub fn output(&mut self, id: IrEdgeId) -> &mut Self {
        self.graph.outputs.push(id);
        self
    }

    /// Finish building.
    ///
    /// # Errors
    ///
    /// Returns an error if a graph output is unknown or the graph is cyclic.
    pub fn build(self) -> Result<IrGraph> {
        for &output_id in &self.graph.outputs {
            self.graph.edge(output_id)?;
        }

        if self.graph.is_cyclic() {
            return Err(Error::InvalidGraph("Graph contains cycles".to_string()));
        }

        Ok(self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chain() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, &[4]).unwrap();
        let y = builder
            .op(
                IrNode::new("nn.relu").with_name("relu").with_inputs(&[x]),
                IrEdge::new("y", DataType::F32, TensorShape::Static(vec![4])),
            )
            .unwrap();
        let z = builder
            .op(
                IrNode::new("tanh").with_name("tanh").with_inputs(&[y]),
                IrEdge::new("z", DataType::F32, TensorShape::Static(vec![4])),
            )
            .unwrap();
        builder.output(z);

        let graph = builder.build().unwrap();

        assert_eq!(graph.inputs, vec![x]);
        assert_eq!(graph.outputs, vec![z]);
        assert_eq!(graph.node_count(), 2);

        let order = graph.topological_order();
        assert_eq!(graph.node(order[0]).unwrap().name, "relu");
        assert_eq!(graph.node(order[1]).unwrap().name, "tanh");
    }

    #[test]
    fn test_weight_is_not_graph_input() {
        let mut builder = GraphBuilder::new();
        let w = builder.weight("w", DataType::F32, &[3, 3]).unwrap();
        let graph = builder.build().unwrap();

        assert!(graph.inputs.is_empty());
        assert_eq!(graph.edge(w).unwrap().name, "w");
    }

    #[test]
    fn test_unknown_input_edge_rejected() {
        let mut builder = GraphBuilder::new();
        let result = builder.op(
            IrNode::new("nn.relu").with_inputs(&[IrEdgeId::new(7)]),
            IrEdge::new("y", DataType::F32, TensorShape::Unknown),
        );

        assert!(matches!(result, Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_multi_output_node() {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, &[4]).unwrap();
        let (node_id, outputs) = builder
            .op_multi(
                IrNode::new("split").with_inputs(&[x]),
                vec![
                    IrEdge::new("lo", DataType::F32, TensorShape::Static(vec![2])),
                    IrEdge::new("hi", DataType::F32, TensorShape::Static(vec![2])),
                ],
            )
            .unwrap();
        let graph = builder.build().unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(graph.tensor_producer(outputs[0]), Some(node_id));
        assert_eq!(graph.tensor_producer(outputs[1]), Some(node_id));
    }
}
