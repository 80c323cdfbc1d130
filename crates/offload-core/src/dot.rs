//! DOT graph visualization for partitioned graphs.
//!
//! Generates Graphviz DOT format showing operators, tensor flows, target
//! tags, and the bodies of opaque calls as clusters.

use crate::ir::{IrEdgeId, IrGraph, IrNodeId};

/// Generate a DOT graph from an IR graph.
///
/// The graph shows:
/// - Host operators as plain boxes, tagged operators filled and labeled
///   with their target and region
/// - Opaque calls as boxes, with their extracted body drawn in a cluster
/// - Graph inputs, parameters, and outputs as ellipses
///
/// # Example
///
/// ```ignore
/// let dot = to_dot(&partitioned);
/// std::fs::write("partitioned.dot", dot)?;
/// // Render with: dot -Tpng partitioned.dot -o partitioned.png
/// ```
pub fn to_dot(graph: &IrGraph) -> String {
    let mut dot = String::new();
    dot.push_str("digraph partitioned_graph {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");

    write_graph(&mut dot, graph, "", 1);

    dot.push_str("}\n");
    dot
}

/// Append the nodes and edges of `graph`, prefixing every DOT identifier
/// with `prefix` so nested bodies do not collide with the parent.
fn write_graph(dot: &mut String, graph: &IrGraph, prefix: &str, depth: usize) {
    let indent = "  ".repeat(depth);

    // Boundary tensors: graph inputs, parameters, outputs
    for idx in 0..graph.edge_count() {
        let edge_id = IrEdgeId::new(idx);
        let Ok(edge) = graph.edge(edge_id) else {
            continue;
        };
        let has_producer = graph.tensor_producer(edge_id).is_some();
        let is_input = graph.inputs.contains(&edge_id);
        let is_output = graph.is_graph_output(edge_id);

        let style = if is_input {
            "style=filled, fillcolor=lightblue"
        } else if is_output {
            "style=filled, fillcolor=lightgreen"
        } else if !has_producer {
            "style=dashed"
        } else {
            continue;
        };

        dot.push_str(&format!(
            "{}\"{}{}\" [shape=ellipse, {}, label=\"{}\\n{} {}\"];\n",
            indent,
            prefix,
            tensor_id(edge_id),
            style,
            escape_dot_string(&edge.name),
            edge.dtype,
            edge.shape
        ));
    }

    // Nodes
    for node_id in graph.topological_order() {
        let Ok(node) = graph.node(node_id) else {
            continue;
        };
        let id = format!("{}{}", prefix, op_id(node_id));

        if let Some(call) = node.as_opaque_call() {
            dot.push_str(&format!(
                "{}\"{}\" [label=\"{}\\n[{}]\", style=\"rounded,filled\", fillcolor=orange];\n",
                indent,
                id,
                escape_dot_string(&call.symbol),
                escape_dot_string(&call.target)
            ));

            dot.push_str(&format!(
                "{}subgraph \"cluster_{}\" {{\n",
                indent,
                escape_dot_string(&id)
            ));
            dot.push_str(&format!(
                "{}  label=\"{}\";\n{}  style=dashed;\n",
                indent,
                escape_dot_string(&call.symbol),
                indent
            ));
            write_graph(dot, &call.body, &format!("{}_", id), depth + 1);
            dot.push_str(&format!("{}}}\n", indent));
            continue;
        }

        let mut label = if node.name.is_empty() {
            escape_dot_string(&node.op_type)
        } else {
            format!(
                "{}\\n({})",
                escape_dot_string(&node.name),
                escape_dot_string(&node.op_type)
            )
        };
        let style = match (&node.target, node.region) {
            (Some(target), Some(region)) => {
                label.push_str(&format!("\\n{} / {}", escape_dot_string(target), region));
                ", style=\"rounded,filled\", fillcolor=lightsalmon"
            }
            (Some(target), None) => {
                label.push_str(&format!("\\n{}", escape_dot_string(target)));
                ", style=\"rounded,filled\", fillcolor=lightsalmon"
            }
            (None, _) => "",
        };
        dot.push_str(&format!("{}\"{}\" [label=\"{}\"{}];\n", indent, id, label, style));
    }

    // Tensor flows
    for node_id in graph.topological_order() {
        let Ok(node) = graph.node(node_id) else {
            continue;
        };
        let consumer = format!("{}{}", prefix, op_id(node_id));

        for &input_id in node.inputs() {
            let source = match graph.tensor_producer(input_id) {
                Some(producer) => format!("{}{}", prefix, op_id(producer)),
                None => format!("{}{}", prefix, tensor_id(input_id)),
            };
            let name = graph
                .edge(input_id)
                .map(|e| escape_dot_string(&e.name))
                .unwrap_or_default();
            dot.push_str(&format!(
                "{}\"{}\" -> \"{}\" [label=\"{}\"];\n",
                indent, source, consumer, name
            ));
        }
    }

    for &output_id in &graph.outputs {
        if let Some(producer) = graph.tensor_producer(output_id) {
            dot.push_str(&format!(
                "{}\"{}{}\" -> \"{}{}\";\n",
                indent,
                prefix,
                op_id(producer),
                prefix,
                tensor_id(output_id)
            ));
        }
    }
}

fn op_id(node_id: IrNodeId) -> String {
    format!("op_{}", node_id.index())
}

fn tensor_id(edge_id: IrEdgeId) -> String {
    format!("t_{}", edge_id.index())
}

/// Escape special characters in DOT strings.
fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
