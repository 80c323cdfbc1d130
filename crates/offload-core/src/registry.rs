//! Capability registry: which operators each target can execute.

use crate::ir::{IrEdge, IrGraph, IrNode, IrNodeId};
use crate::types::AttributeValue;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};

/// Operator attributes as seen by a support predicate.
pub type Attributes = HashMap<String, AttributeValue>;

/// Decides whether a target can execute one particular operator instance.
///
/// Predicates receive the node's attributes and the descriptors of its
/// arguments (dtype and shape of each input edge) and must be pure: the same
/// inputs always give the same answer.
///
/// Any `Fn(&Attributes, &[&IrEdge]) -> bool` closure is a predicate.
pub trait SupportPredicate: Send + Sync {
    /// Return `true` if the target supports this operator instance.
    fn is_supported(&self, attributes: &Attributes, args: &[&IrEdge]) -> bool;
}

impl<F> SupportPredicate for F
where
    F: Fn(&Attributes, &[&IrEdge]) -> bool + Send + Sync,
{
    fn is_supported(&self, attributes: &Attributes, args: &[&IrEdge]) -> bool {
        self(attributes, args)
    }
}

/// Predicate that accepts every instance of the operator.
pub fn always_supported(_attributes: &Attributes, _args: &[&IrEdge]) -> bool {
    true
}

/// Registry configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Allow `register()` to replace an existing entry instead of failing.
    pub allow_overwrite: bool,
}

/// Registry of target capabilities.
///
/// Maps `(operator kind, target name)` to a support predicate. Lookups are
/// closed-world: an operator never registered for a target is unsupported.
///
/// # Example
///
/// ```
/// use offload_core::registry::{CapabilityRegistry, always_supported};
///
/// # fn main() -> offload_core::Result<()> {
/// let mut registry = CapabilityRegistry::new();
/// registry
///     .register("nn.conv2d", "acc1", always_supported)?
///     .register("qnn.conv2d", "acc1", always_supported)?;
///
/// assert!(registry.contains("nn.conv2d", "acc1"));
/// assert!(!registry.contains("nn.dense", "acc1"));
/// # Ok(())
/// # }
/// ```
pub struct CapabilityRegistry {
    /// Map from (op_type, target) to support predicate.
    entries: HashMap<(String, String), Box<dyn SupportPredicate>>,

    config: RegistryConfig,
}

impl CapabilityRegistry {
    /// Create a new empty registry that rejects duplicate registrations.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new empty registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Get the registry configuration.
    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// Register a support predicate for an operator on a target.
    ///
    /// Returns `self` for method chaining.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateRegistration` if the pair is already
    /// registered and the registry does not allow overwriting. The existing
    /// entry is left in place.
    pub fn register<P>(&mut self, op_kind: &str, target: &str, predicate: P) -> Result<&mut Self>
    where
        P: SupportPredicate + 'static,
    {
        let key = (op_kind.to_string(), target.to_string());

        if self.entries.contains_key(&key) {
            if !self.config.allow_overwrite {
                return Err(Error::DuplicateRegistration {
                    op_kind: key.0,
                    target: key.1,
                });
            }
            tracing::debug!(op_kind, target, "overwriting capability entry");
        }

        self.entries.insert(key, Box::new(predicate));
        Ok(self)
    }

    /// Check whether `target` supports this node.
    ///
    /// `args` are the node's argument descriptors in input slot order. Opaque
    /// call nodes are never supported; they are already partitioned.
    pub fn is_supported(&self, node: &IrNode, args: &[&IrEdge], target: &str) -> bool {
        if node.is_opaque_call() {
            return false;
        }

        self.entries
            .get(&(node.op_type.clone(), target.to_string()))
            .is_some_and(|predicate| predicate.is_supported(&node.attributes, args))
    }

    /// Check whether `target` supports a node of `graph`.
    ///
    /// Returns `false` if the node does not exist.
    pub fn supports_node(&self, graph: &IrGraph, node_id: IrNodeId, target: &str) -> bool {
        let (Ok(node), Ok(args)) = (graph.node(node_id), graph.node_args(node_id)) else {
            return false;
        };
        self.is_supported(node, &args, target)
    }

    /// Check if an entry exists for the pair.
    pub fn contains(&self, op_kind: &str, target: &str) -> bool {
        self.entries
            .contains_key(&(op_kind.to_string(), target.to_string()))
    }

    /// Check if any operator is registered for `target`.
    pub fn has_target(&self, target: &str) -> bool {
        self.entries.keys().any(|(_, t)| t == target)
    }

    /// Operator kinds registered for `target`, sorted.
    pub fn op_kinds(&self, target: &str) -> Vec<&str> {
        let kinds: BTreeSet<&str> = self
            .entries
            .keys()
            .filter(|(_, t)| t == target)
            .map(|(op, _)| op.as_str())
            .collect();
        kinds.into_iter().collect()
    }

    /// All targets with at least one entry, sorted.
    pub fn targets(&self) -> Vec<&str> {
        let targets: BTreeSet<&str> = self.entries.keys().map(|(_, t)| t.as_str()).collect();
        targets.into_iter().collect()
    }

    /// Get the number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("CapabilityRegistry")
            .field("entries", &keys)
            .field("config", &self.config)
            .finish()
    }
}
