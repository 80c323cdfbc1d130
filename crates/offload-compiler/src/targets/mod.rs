//! Built-in offload targets.
//!
//! Each target module exposes its `TARGET` name, a `register()` function
//! that adds its capability entries to a registry, and a one-call
//! partitioning entry point.

pub mod gigo;
