//! Conv2d lowering for the gigo kernel library.
//!
//! Both `gigo_conv2d` and `gigo_quant_conv2d` take:
//!
//! ```text
//! (data, weights, out, kernel_layout,
//!  N, H, W, C, O, Kh, Kw, I, groups,
//!  pad_t, pad_l, pad_b, pad_r, stride_h, stride_w)
//! ```

use crate::error::{CodegenError, Result};
use crate::kernel::Kernel;
use offload_core::{IrEdge, IrNode};

/// Lowers `nn.conv2d` and `qnn.conv2d` to one of the conv kernels.
pub struct Conv2dKernel {
    function: String,
}

impl Conv2dKernel {
    /// Create a lowering that calls `function`.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
        }
    }
}

impl Kernel for Conv2dKernel {
    fn function(&self) -> &str {
        &self.function
    }

    fn attribute_args(&self, node: &IrNode, args: &[&IrEdge]) -> Result<Vec<String>> {
        let data_layout: String = node.attr_or("data_layout", "NHWC".to_string())?;
        if data_layout != "NHWC" {
            return Err(CodegenError::UnsupportedLayout {
                node: node.name.clone(),
                kind: "data",
                layout: data_layout,
            });
        }

        let kernel_layout: String = node.attr_or("kernel_layout", "HWIO".to_string())?;
        let data = static_4d(node, args, 0)?;
        let weights = static_4d(node, args, 1)?;

        let (kernel_h, kernel_w) = (weights[0], weights[1]);
        let (out_channels, in_channels) = match kernel_layout.as_str() {
            "HWIO" => (weights[3], weights[2]),
            "HWOI" => (weights[2], weights[3]),
            _ => {
                return Err(CodegenError::UnsupportedLayout {
                    node: node.name.clone(),
                    kind: "kernel",
                    layout: kernel_layout,
                });
            }
        };

        let groups: i64 = node.attr_or("groups", 1)?;
        let padding: Vec<i64> = node.attr_or("padding", Vec::new())?;
        let padding = Padding::from_attr(&padding).ok_or_else(|| {
            CodegenError::InvalidShape(format!(
                "padding of '{}' must have 1, 2, or 4 values",
                node.name
            ))
        })?;
        let strides: Vec<i64> = node.attr_or("strides", vec![1, 1])?;
        let [stride_h, stride_w] = strides[..] else {
            return Err(CodegenError::InvalidShape(format!(
                "strides of '{}' must have 2 values, got {:?}",
                node.name, strides
            )));
        };

        // The layout is passed to the library as a string literal
        let mut out = vec![format!("\"{}\"", kernel_layout)];
        out.extend(data.iter().map(|d| d.to_string()));
        out.extend(
            [out_channels, kernel_h, kernel_w, in_channels]
                .iter()
                .map(|d| d.to_string()),
        );
        out.extend(
            [
                groups,
                padding.top,
                padding.left,
                padding.bottom,
                padding.right,
                stride_h,
                stride_w,
            ]
            .iter()
            .map(|v| v.to_string()),
        );
        Ok(out)
    }
}

/// Explicit padding on each side of the spatial dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Padding {
    top: i64,
    left: i64,
    bottom: i64,
    right: i64,
}

impl Padding {
    /// Expand a `padding` attribute: none, one value for all sides,
    /// `[vertical, horizontal]`, or `[top, left, bottom, right]`.
    fn from_attr(values: &[i64]) -> Option<Self> {
        match *values {
            [] => Some(Self::default()),
            [all] => Some(Self {
                top: all,
                left: all,
                bottom: all,
                right: all,
            }),
            [vertical, horizontal] => Some(Self {
                top: vertical,
                left: horizontal,
                bottom: vertical,
                right: horizontal,
            }),
            [top, left, bottom, right] => Some(Self {
                top,
                left,
                bottom,
                right,
            }),
            _ => None,
        }
    }
}

/// Dimensions of argument `index`, which must be a static 4-D tensor.
fn static_4d<'a>(node: &IrNode, args: &[&'a IrEdge], index: usize) -> Result<&'a [usize]> {
    let edge: &'a IrEdge = *args.get(index).ok_or_else(|| CodegenError::MissingArgument {
        node: node.name.clone(),
        op_type: node.op_type.clone(),
        index,
    })?;

    match edge.shape.as_static() {
        Some(dims) if dims.len() == 4 => Ok(dims),
        _ => Err(CodegenError::InvalidShape(format!(
            "argument '{}' of '{}' must be a static 4-D tensor, got {}",
            edge.name, node.name, edge.shape
        ))),
    }
}
