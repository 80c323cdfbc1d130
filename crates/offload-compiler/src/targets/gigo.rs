//! The gigo convolution accelerator.
//!
//! gigo executes 2-D convolutions (float and quantized) on NHWC activations
//! with HWIO or HWOI kernels. Everything else stays on the host.

use crate::PartitionPipeline;
use offload_core::{AttributeValue, Attributes, CapabilityRegistry, IrEdge, IrGraph, Result};

/// Target name used in tags and call symbols.
pub const TARGET: &str = "gigo";

/// Operator kinds gigo can execute.
pub const SUPPORTED_OPS: [&str; 2] = ["nn.conv2d", "qnn.conv2d"];

/// Activation layouts the device kernels accept.
const DATA_LAYOUTS: [&str; 1] = ["NHWC"];

/// Kernel layouts the device kernels accept.
const KERNEL_LAYOUTS: [&str; 2] = ["HWIO", "HWOI"];

/// Register gigo's operators in `registry`.
///
/// # Errors
///
/// Returns `Error::DuplicateRegistration` if gigo entries are already present
/// and the registry does not allow overwriting.
pub fn register(registry: &mut CapabilityRegistry) -> Result<()> {
    for op_kind in SUPPORTED_OPS {
        registry.register(op_kind, TARGET, conv2d_supported)?;
    }
    Ok(())
}

/// Build a fresh registry holding only the gigo entries.
pub fn registry() -> Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();
    register(&mut registry)?;
    Ok(registry)
}

/// Annotate, merge, and partition `graph` for gigo.
///
/// Returns a rewritten copy; `graph` itself is never modified.
#[tracing::instrument(skip_all)]
pub fn partition_for_gigo(graph: &IrGraph) -> Result<IrGraph> {
    let registry = registry()?;
    PartitionPipeline::new(TARGET).run(graph, &registry)
}

/// Accept a convolution whose layouts the device can lower. Absent layout
/// attributes mean the defaults, which the device supports.
fn conv2d_supported(attributes: &Attributes, _args: &[&IrEdge]) -> bool {
    layout_in(attributes, "data_layout", &DATA_LAYOUTS)
        && layout_in(attributes, "kernel_layout", &KERNEL_LAYOUTS)
}

fn layout_in(attributes: &Attributes, key: &str, allowed: &[&str]) -> bool {
    match attributes.get(key) {
        None => true,
        Some(AttributeValue::String(layout)) => allowed.contains(&layout.as_str()),
        Some(_) => false,
    }
}
