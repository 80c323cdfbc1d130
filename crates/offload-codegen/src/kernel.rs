//! Kernel trait and table mapping operators to device library calls.
//!
//! This module defines the extensibility point of the code generator: a
//! `Kernel` trait that lowers one operator to a call into the gigo kernel
//! library, and a `KernelTable` that maps op_type strings to kernels.

use crate::conv2d::Conv2dKernel;
use crate::error::{CodegenError, Result};
use offload_core::{IrEdge, IrNode};
use std::collections::HashMap;

/// Trait for lowering one operator to a device kernel call.
///
/// The generated call passes the operator's input buffers, then its output
/// buffers, then the attribute arguments returned by `attribute_args()`.
pub trait Kernel: Send + Sync {
    /// Name of the C function in the kernel library.
    fn function(&self) -> &str;

    /// Scalar arguments that follow the buffers in the call.
    ///
    /// Each string is emitted verbatim as a C expression, so string
    /// arguments must carry their own quotes.
    ///
    /// # Arguments
    ///
    /// * `node` - The operator being lowered
    /// * `args` - Descriptors of the operator's inputs, in slot order
    fn attribute_args(&self, node: &IrNode, args: &[&IrEdge]) -> Result<Vec<String>>;
}

/// Registry of kernels keyed by operator kind.
pub struct KernelTable {
    kernels: HashMap<String, Box<dyn Kernel>>,
}

impl KernelTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            kernels: HashMap::new(),
        }
    }

    /// Create a table with the kernels the gigo library provides.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register("nn.conv2d", Conv2dKernel::new("gigo_conv2d"));
        // The quantized kernel takes the same arguments
        table.register("qnn.conv2d", Conv2dKernel::new("gigo_quant_conv2d"));
        table
    }

    /// Register (or replace) the kernel for `op_type`.
    pub fn register(&mut self, op_type: &str, kernel: impl Kernel + 'static) -> &mut Self {
        self.kernels.insert(op_type.to_string(), Box::new(kernel));
        self
    }

    /// Look up the kernel for an operator.
    pub fn get(&self, op_type: &str) -> Result<&dyn Kernel> {
        self.kernels
            .get(op_type)
            .map(|kernel| &**kernel)
            .ok_or_else(|| CodegenError::UnsupportedOp(op_type.to_string()))
    }

    /// Check whether an operator has a kernel.
    pub fn contains(&self, op_type: &str) -> bool {
        self.kernels.contains_key(op_type)
    }
}

impl Default for KernelTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReluKernel;

    impl Kernel for ReluKernel {
        fn function(&self) -> &str {
            "gigo_relu"
        }

        fn attribute_args(&self, _node: &IrNode, _args: &[&IrEdge]) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_default_table() {
        let table = KernelTable::with_defaults();

        assert_eq!(table.get("nn.conv2d").unwrap().function(), "gigo_conv2d");
        assert_eq!(
            table.get("qnn.conv2d").unwrap().function(),
            "gigo_quant_conv2d"
        );
        assert!(matches!(
            table.get("nn.dense"),
            Err(CodegenError::UnsupportedOp(ref op)) if op == "nn.dense"
        ));
    }

    #[test]
    fn test_register_custom_kernel() {
        let mut table = KernelTable::new();
        assert!(!table.contains("nn.relu"));

        table.register("nn.relu", ReluKernel);

        assert_eq!(table.get("nn.relu").unwrap().function(), "gigo_relu");
    }
}
