//! C source generation for regions offloaded to the gigo accelerator.
//!
//! This crate takes the opaque calls produced by `offload-compiler` and emits,
//! for each one, a C++ translation unit defining an `extern "C"` function
//! named after the call symbol. The function calls into the gigo kernel
//! library once per operator in the extracted body.
//!
//! # Example
//!
//! ```no_run
//! use offload_codegen::generate_module;
//! use offload_compiler::targets::gigo;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let graph = offload_core::IrGraph::new();
//! let partitioned = gigo::partition_for_gigo(&graph)?;
//!
//! for source in generate_module(&partitioned)? {
//!     std::fs::write(format!("{}.cc", source.symbol), &source.code)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod conv2d;
pub mod error;
pub mod kernel;

pub use conv2d::Conv2dKernel;
pub use error::{CodegenError, Result};
pub use kernel::{Kernel, KernelTable};

use offload_core::{DataType, IrEdgeId, IrGraph, OpaqueCall};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Target whose calls this crate can lower.
pub const TARGET: &str = "gigo";

/// Element type of every buffer the kernel library reads or writes.
const ELEMENT: DataType = DataType::F32;

/// Lines emitted at the top of every translation unit.
const PRELUDE: &str = "\
#include <cstdint>
#include <cstdlib>
#include <cstring>
#include <gigo/gigo_kernel.h>
";

/// Generated source for one opaque call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSource {
    /// Exported function name (the call symbol).
    pub symbol: String,

    /// Complete translation unit.
    pub code: String,
}

/// Lowers opaque call bodies to C using a table of kernels.
pub struct CodeGenerator {
    kernels: KernelTable,
}

impl CodeGenerator {
    /// Create a generator with the default gigo kernels.
    pub fn new() -> Self {
        Self::with_kernels(KernelTable::with_defaults())
    }

    /// Create a generator with a custom kernel table.
    pub fn with_kernels(kernels: KernelTable) -> Self {
        Self { kernels }
    }

    /// Generate the translation unit for one call.
    ///
    /// The function takes one `float*` per body input (`in0`, `in1`, ...)
    /// followed by one per body output (`out0`, ...). Every operator output
    /// gets a heap buffer `buf_<k>`; body outputs are copied out before the
    /// buffers are freed.
    ///
    /// # Errors
    ///
    /// Returns an error if the body contains an operator without a kernel,
    /// an operator the kernel cannot lower, or an output without a static
    /// shape.
    pub fn generate_source(&self, call: &OpaqueCall) -> Result<CSource> {
        let body = &call.body;
        let mut names: HashMap<IrEdgeId, String> = HashMap::new();
        let mut params = Vec::new();

        for (i, &edge_id) in body.inputs.iter().enumerate() {
            let name = format!("in{}", i);
            params.push(format!("{}* {}", ELEMENT.c_name(), name));
            names.insert(edge_id, name);
        }
        for i in 0..body.outputs.len() {
            params.push(format!("{}* out{}", ELEMENT.c_name(), i));
        }

        // Operator output edge -> (buffer name, element count)
        let mut buffers: HashMap<IrEdgeId, (String, usize)> = HashMap::new();
        let mut declarations = Vec::new();
        let mut statements = Vec::new();

        for node_id in body.topological_order() {
            let node = body.node(node_id)?;
            let kernel = self.kernels.get(&node.op_type)?;
            let args = body.node_args(node_id)?;
            let attribute_args = kernel.attribute_args(node, &args)?;

            let mut call_args = Vec::new();
            for edge_id in node.inputs() {
                let name = names.get(edge_id).ok_or_else(|| {
                    offload_core::Error::InvalidGraph(format!(
                        "input {:?} of '{}' is neither a body input nor produced earlier",
                        edge_id, node.name
                    ))
                })?;
                call_args.push(name.clone());
            }

            for &edge_id in node.outputs() {
                let edge = body.edge(edge_id)?;
                let elements = edge.shape.num_elements().ok_or_else(|| {
                    CodegenError::InvalidShape(format!(
                        "output '{}' of '{}' has no static shape",
                        edge.name, node.name
                    ))
                })?;
                let buffer = format!("buf_{}", declarations.len());
                declarations.push(format!(
                    "{ty}* {buffer} = ({ty}*)std::malloc({size} * {elements});",
                    ty = ELEMENT.c_name(),
                    size = ELEMENT.size(),
                ));
                names.insert(edge_id, buffer.clone());
                buffers.insert(edge_id, (buffer.clone(), elements));
                call_args.push(buffer);
            }

            call_args.extend(attribute_args);

            statements.push(format!("{}({});", kernel.function(), call_args.join(", ")));
        }

        for (i, edge_id) in body.outputs.iter().enumerate() {
            let (buffer, elements) = buffers.get(edge_id).ok_or_else(|| {
                offload_core::Error::InvalidGraph(format!(
                    "output {:?} of '{}' is not produced by any operator",
                    edge_id, call.symbol
                ))
            })?;
            statements.push(format!(
                "std::memcpy(out{}, {}, {} * {});",
                i,
                buffer,
                ELEMENT.size(),
                elements
            ));
        }
        for i in 0..declarations.len() {
            statements.push(format!("std::free(buf_{});", i));
        }

        let mut code = String::from(PRELUDE);
        code.push('\n');
        code.push_str(&format!(
            "extern \"C\" void {}({}) {{\n",
            call.symbol,
            params.join(", ")
        ));
        for line in declarations.iter().chain(&statements) {
            code.push_str(&format!("  {}\n", line));
        }
        code.push_str("}\n");

        tracing::debug!(
            symbol = %call.symbol,
            num_buffers = declarations.len(),
            "generated source"
        );

        Ok(CSource {
            symbol: call.symbol.clone(),
            code,
        })
    }

    /// Generate sources for every gigo call in `graph`, ordered by call
    /// number (`gigo_2` before `gigo_10`).
    #[tracing::instrument(skip_all, fields(num_nodes = graph.node_count()))]
    pub fn generate_module(&self, graph: &IrGraph) -> Result<Vec<CSource>> {
        let mut calls: Vec<&OpaqueCall> = graph
            .opaque_calls()
            .map(|(_, call)| call)
            .filter(|call| call.target == TARGET)
            .collect();
        calls.sort_by(|a, b| compare_symbols(&a.symbol, &b.symbol));

        calls
            .into_iter()
            .map(|call| self.generate_source(call))
            .collect()
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Order `<prefix>_<n>` symbols by prefix, then numerically by `n`.
fn compare_symbols(a: &str, b: &str) -> Ordering {
    fn split(symbol: &str) -> (&str, Option<usize>) {
        symbol
            .rsplit_once('_')
            .and_then(|(prefix, n)| Some((prefix, Some(n.parse().ok()?))))
            .unwrap_or((symbol, None))
    }

    split(a).cmp(&split(b)).then_with(|| a.cmp(b))
}

/// Generate the translation unit for one call with the default kernels.
pub fn generate_source(call: &OpaqueCall) -> Result<CSource> {
    CodeGenerator::new().generate_source(call)
}

/// Generate sources for every gigo call in `graph` with the default kernels.
pub fn generate_module(graph: &IrGraph) -> Result<Vec<CSource>> {
    CodeGenerator::new().generate_module(graph)
}
