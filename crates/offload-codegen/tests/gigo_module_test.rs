//! Partition graphs for gigo and generate C sources for the result.

use anyhow::Result;
use offload_codegen::{CodegenError, generate_module};
use offload_compiler::targets::gigo;
use offload_core::{DataType, GraphBuilder, IrEdge, IrEdgeId, IrGraph, IrNode, TensorShape};

fn conv(
    builder: &mut GraphBuilder,
    name: &str,
    input: IrEdgeId,
    in_channels: usize,
    out_channels: usize,
) -> Result<IrEdgeId> {
    let w = builder.weight(
        &format!("{}_w", name),
        DataType::F32,
        &[3, 3, in_channels, out_channels],
    )?;
    let node = IrNode::new("nn.conv2d")
        .with_name(name)
        .with_attribute("data_layout", "NHWC")
        .with_attribute("kernel_layout", "HWIO")
        .with_attribute("padding", vec![1i64])
        .with_inputs(&[input, w]);
    let out = IrEdge::new(
        format!("{}_out", name),
        DataType::F32,
        TensorShape::Static(vec![1, 8, 8, out_channels]),
    );
    Ok(builder.op(node, out)?)
}

fn relu(
    builder: &mut GraphBuilder,
    name: &str,
    input: IrEdgeId,
    channels: usize,
) -> Result<IrEdgeId> {
    Ok(builder.op(
        IrNode::new("nn.relu").with_name(name).with_inputs(&[input]),
        IrEdge::new(
            format!("{}_out", name),
            DataType::F32,
            TensorShape::Static(vec![1, 8, 8, channels]),
        ),
    )?)
}

/// x -> conv1 -> conv2 -> relu -> conv3
fn network() -> Result<IrGraph> {
    let mut builder = GraphBuilder::new();
    let x = builder.input("x", DataType::F32, &[1, 8, 8, 3])?;
    let c1 = conv(&mut builder, "conv1", x, 3, 8)?;
    let c2 = conv(&mut builder, "conv2", c1, 8, 8)?;
    let r = relu(&mut builder, "relu", c2, 8)?;
    let c3 = conv(&mut builder, "conv3", r, 8, 4)?;
    builder.output(c3);
    Ok(builder.build()?)
}

#[test]
fn test_module_has_one_source_per_call() -> Result<()> {
    let partitioned = gigo::partition_for_gigo(&network()?)?;

    let sources = generate_module(&partitioned)?;

    let symbols: Vec<_> = sources.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["gigo_0", "gigo_1"]);
    Ok(())
}

#[test]
fn test_merged_region_chains_buffers() -> Result<()> {
    let partitioned = gigo::partition_for_gigo(&network()?)?;
    let sources = generate_module(&partitioned)?;
    let first = &sources[0].code;

    // x, conv1_w, conv2_w in first-use order
    assert!(first.contains(
        "extern \"C\" void gigo_0(float* in0, float* in1, float* in2, float* out0) {"
    ));
    assert!(first.contains(
        "gigo_conv2d(in0, in1, buf_0, \"HWIO\", 1, 8, 8, 3, 8, 3, 3, 3, 1, 1, 1, 1, 1, 1, 1);"
    ));
    assert!(first.contains(
        "gigo_conv2d(buf_0, in2, buf_1, \"HWIO\", 1, 8, 8, 8, 8, 3, 3, 8, 1, 1, 1, 1, 1, 1, 1);"
    ));
    assert!(first.contains("std::memcpy(out0, buf_1, 4 * 512);"));
    assert!(first.contains("std::free(buf_0);"));
    assert!(first.contains("std::free(buf_1);"));
    Ok(())
}

#[test]
fn test_calls_for_other_targets_are_skipped() -> Result<()> {
    let graph = network()?;
    let mut registry = offload_core::CapabilityRegistry::new();
    registry.register("nn.conv2d", "acc1", offload_core::always_supported)?;
    let partitioned = offload_compiler::partition_for_target(&graph, &registry, "acc1")?;

    assert_eq!(partitioned.opaque_calls().count(), 2);
    assert!(generate_module(&partitioned)?.is_empty());
    Ok(())
}

#[test]
fn test_unlowerable_body_is_reported() -> Result<()> {
    // Register relu for gigo even though the kernel library has no relu
    let graph = network()?;
    let mut registry = gigo::registry()?;
    registry.register("nn.relu", gigo::TARGET, offload_core::always_supported)?;
    let partitioned = offload_compiler::partition_for_target(&graph, &registry, gigo::TARGET)?;

    let err = generate_module(&partitioned).unwrap_err();

    assert!(matches!(err, CodegenError::UnsupportedOp(ref op) if op == "nn.relu"));
    Ok(())
}
