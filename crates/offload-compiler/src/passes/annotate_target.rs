//! Target annotation pass.
//!
//! Forward pass in topological order that tags every operator the target can
//! execute. Untagged operators stay on the host.

use offload_core::{CapabilityRegistry, IrGraph, Pass, Result, Stage};
use tracing::{trace, warn};

/// Pass that tags supported operators with a target name.
///
/// For each operator node:
/// 1. Resolves the node's argument descriptors
/// 2. Asks the registry whether the target supports it
/// 3. Sets `node.target` to the target name, or clears it
///
/// Stale region assignments are cleared so the merger always starts fresh.
/// Opaque call nodes from an earlier partitioning are left untouched.
///
/// If the registry has no entries at all for the target, every operator ends
/// up untagged. This is not an error: unregistered means unsupported.
pub struct AnnotateTargetPass {
    target: String,
}

impl AnnotateTargetPass {
    /// Create an annotation pass for `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// The target this pass annotates for.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Tag every operator in `graph`.
    pub fn annotate(&self, graph: &mut IrGraph, registry: &CapabilityRegistry) -> Result<bool> {
        if !registry.has_target(&self.target) {
            warn!(
                target_name = %self.target,
                "no operators registered for target, nothing will be offloaded"
            );
        }

        let mut changed = false;

        for node_id in graph.topological_order() {
            let tag = {
                let node = graph.node(node_id)?;
                if node.is_opaque_call() {
                    continue;
                }

                let args = graph.node_args(node_id)?;
                let supported = registry.is_supported(node, &args, &self.target);
                trace!(
                    node = %node.name,
                    op_type = %node.op_type,
                    supported,
                    "annotated node"
                );
                supported.then(|| self.target.clone())
            };

            let node = graph.node_mut(node_id)?;
            if node.target != tag {
                node.target = tag;
                changed = true;
            }
            if node.region.take().is_some() {
                changed = true;
            }
        }

        Ok(changed)
    }
}

impl Pass for AnnotateTargetPass {
    fn name(&self) -> &str {
        "annotate_target"
    }

    fn stage(&self) -> Stage {
        Stage::Annotation
    }

    fn run(&self, graph: &mut IrGraph, registry: &CapabilityRegistry) -> Result<bool> {
        self.annotate(graph, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_core::{
        DataType, GraphBuilder, IrEdge, IrNode, RegionId, TensorShape, always_supported,
    };

    fn conv_relu_graph() -> IrGraph {
        let mut builder = GraphBuilder::new();
        let x = builder.input("x", DataType::F32, &[1, 4, 4, 3]).unwrap();
        let w = builder.weight("w", DataType::F32, &[3, 3, 3, 8]).unwrap();
        let y = builder
            .op(
                IrNode::new("nn.conv2d").with_name("conv").with_inputs(&[x, w]),
                IrEdge::new("y", DataType::F32, TensorShape::Static(vec![1, 4, 4, 8])),
            )
            .unwrap();
        let z = builder
            .op(
                IrNode::new("nn.relu").with_name("relu").with_inputs(&[y]),
                IrEdge::new("z", DataType::F32, TensorShape::Static(vec![1, 4, 4, 8])),
            )
            .unwrap();
        builder.output(z);
        builder.build().unwrap()
    }

    fn acc1_registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry
            .register("nn.conv2d", "acc1", always_supported)
            .unwrap();
        registry
    }

    fn tag_of(graph: &IrGraph, name: &str) -> Option<String> {
        let id = graph.find_node_by_name(name).unwrap();
        graph.node(id).unwrap().target.clone()
    }

    #[test]
    fn test_tags_supported_nodes_only() {
        let mut graph = conv_relu_graph();
        let pass = AnnotateTargetPass::new("acc1");

        let changed = pass.run(&mut graph, &acc1_registry()).unwrap();

        assert!(changed);
        assert_eq!(tag_of(&graph, "conv").as_deref(), Some("acc1"));
        assert_eq!(tag_of(&graph, "relu"), None);
    }

    #[test]
    fn test_annotation_is_idempotent() {
        let mut graph = conv_relu_graph();
        let registry = acc1_registry();
        let pass = AnnotateTargetPass::new("acc1");

        assert!(pass.run(&mut graph, &registry).unwrap());
        let first: Vec<_> = ["conv", "relu"].iter().map(|n| tag_of(&graph, n)).collect();

        assert!(!pass.run(&mut graph, &registry).unwrap());
        let second: Vec<_> = ["conv", "relu"].iter().map(|n| tag_of(&graph, n)).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_target_is_noop() {
        let mut graph = conv_relu_graph();
        let pass = AnnotateTargetPass::new("nonexistent");

        let changed = pass.run(&mut graph, &acc1_registry()).unwrap();

        assert!(!changed);
        assert!(graph.nodes().all(|(_, node)| node.target.is_none()));
    }

    #[test]
    fn test_clears_stale_tags_and_regions() {
        let mut graph = conv_relu_graph();
        let relu = graph.find_node_by_name("relu").unwrap();
        {
            let node = graph.node_mut(relu).unwrap();
            node.target = Some("acc1".to_string());
            node.region = Some(RegionId(3));
        }

        let pass = AnnotateTargetPass::new("acc1");
        pass.run(&mut graph, &acc1_registry()).unwrap();

        let node = graph.node(relu).unwrap();
        assert_eq!(node.target, None);
        assert_eq!(node.region, None);
    }
}
