//! Shared graph builders and helpers for partitioner integration tests.

#![allow(dead_code)]

use anyhow::Result;
use offload_core::{
    CapabilityRegistry, DataType, GraphBuilder, IrEdge, IrEdgeId, IrGraph, IrNode, TensorShape,
    always_supported,
};

/// Install a test subscriber; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// Registry with `conv2d` and `qnn_conv2d` supported on `acc1`.
pub fn acc1_registry() -> Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();
    registry
        .register("conv2d", "acc1", always_supported)?
        .register("qnn_conv2d", "acc1", always_supported)?;
    Ok(registry)
}

/// Add a single-output node named `name` whose output edge is `<name>_out`.
pub fn add_op(
    builder: &mut GraphBuilder,
    op: &str,
    name: &str,
    inputs: &[IrEdgeId],
) -> Result<IrEdgeId> {
    let edge = IrEdge::new(
        format!("{}_out", name),
        DataType::F32,
        TensorShape::Static(vec![1, 8, 8, 4]),
    );
    Ok(builder.op(IrNode::new(op).with_name(name).with_inputs(inputs), edge)?)
}

/// `x -> (name, op) -> ... -> out`, each node consuming the previous one.
pub fn chain(ops: &[(&str, &str)]) -> Result<IrGraph> {
    let mut builder = GraphBuilder::new();
    let mut last = builder.input("x", DataType::F32, &[1, 8, 8, 4])?;
    for (name, op) in ops {
        last = add_op(&mut builder, op, name, &[last])?;
    }
    builder.output(last);
    Ok(builder.build()?)
}

/// conv `a` feeds both a host `relu` and conv `b`, and `relu` feeds `b`.
/// Merging `a` and `b` would make the region depend on itself.
pub fn cyclic_merge_graph() -> Result<IrGraph> {
    let mut builder = GraphBuilder::new();
    let x = builder.input("x", DataType::F32, &[1, 8, 8, 4])?;
    let a = add_op(&mut builder, "conv2d", "a", &[x])?;
    let r = add_op(&mut builder, "relu", "relu", &[a])?;
    let b = add_op(&mut builder, "conv2d", "b", &[a, r])?;
    builder.output(b);
    Ok(builder.build()?)
}

/// Two independent conv branches joined by a host add:
/// `x -> c1 -> c2 -> add`, `x -> relu -> c3 -> add`.
pub fn two_branch_graph() -> Result<IrGraph> {
    let mut builder = GraphBuilder::new();
    let x = builder.input("x", DataType::F32, &[1, 8, 8, 4])?;
    let c1 = add_op(&mut builder, "conv2d", "c1", &[x])?;
    let c2 = add_op(&mut builder, "qnn_conv2d", "c2", &[c1])?;
    let r = add_op(&mut builder, "relu", "relu", &[x])?;
    let c3 = add_op(&mut builder, "conv2d", "c3", &[r])?;
    let sum = add_op(&mut builder, "add", "add", &[c2, c3])?;
    builder.output(sum);
    Ok(builder.build()?)
}

/// Structural summary of a graph in topological order.
///
/// Two graphs are isomorphic for our purposes iff their summaries match.
/// Opaque calls are summarized together with their bodies.
pub fn canonical(graph: &IrGraph) -> Vec<String> {
    let edge_names = |ids: &[IrEdgeId]| -> Vec<String> {
        ids.iter()
            .map(|&id| {
                graph
                    .edge(id)
                    .map(|e| e.name.clone())
                    .unwrap_or_else(|_| format!("<missing {}>", id.index()))
            })
            .collect()
    };

    let mut lines = vec![format!(
        "graph in={:?} out={:?}",
        edge_names(&graph.inputs),
        edge_names(&graph.outputs)
    )];

    for node_id in graph.topological_order() {
        let Ok(node) = graph.node(node_id) else {
            continue;
        };
        lines.push(format!(
            "{} {} {:?} -> {:?} @{:?}",
            node.name,
            node.op_type,
            edge_names(node.inputs()),
            edge_names(node.outputs()),
            node.target
        ));
        if let Some(call) = node.as_opaque_call() {
            lines.push(format!("call {} for {} {{", call.symbol, call.target));
            lines.extend(canonical(&call.body).into_iter().map(|l| format!("  {}", l)));
            lines.push("}".to_string());
        }
    }

    lines
}

/// Names of all operators, including those inside call bodies, sorted.
pub fn operator_names(graph: &IrGraph) -> Vec<String> {
    let mut names = Vec::new();
    for (_, node) in graph.nodes() {
        match node.as_opaque_call() {
            Some(call) => names.extend(operator_names(&call.body)),
            None => names.push(node.name.clone()),
        }
    }
    names.sort();
    names
}
