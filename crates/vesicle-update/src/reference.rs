//! Variable references as declared by the user.
//!
//! A [`VarRef`] names its target by entity and variable name; nothing is
//! looked up until the owning custom update is finalized.

use std::fmt;

use vesicle_core::Namespace;

/// A named variable in a named entity's namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarTarget {
    /// Owning entity name.
    pub entity: String,
    /// Namespace within the entity.
    pub namespace: Namespace,
    /// Variable name.
    pub var: String,
}

impl VarTarget {
    /// Create a target.
    pub fn new(entity: impl Into<String>, namespace: Namespace, var: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            namespace,
            var: var.into(),
        }
    }
}

impl fmt::Display for VarTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.entity, self.var, self.namespace)
    }
}

/// A variable reference parameter value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// One variable.
    Simple(VarTarget),
    /// A weight variable whose values are copied, transposed, into a
    /// weight variable of the mirror-image synapse population.
    Transpose {
        /// Weights read in `(pre, post)` order.
        source: VarTarget,
        /// Weights written at `(post, pre)`.
        target: VarTarget,
    },
}

impl VarRef {
    /// Reference a neuron population variable.
    pub fn neuron(pop: impl Into<String>, var: impl Into<String>) -> Self {
        Self::Simple(VarTarget::new(pop, Namespace::Neuron, var))
    }

    /// Reference a current source variable.
    pub fn current_source(cs: impl Into<String>, var: impl Into<String>) -> Self {
        Self::Simple(VarTarget::new(cs, Namespace::CurrentSource, var))
    }

    /// Reference a variable owned by another custom update.
    pub fn custom_update(cu: impl Into<String>, var: impl Into<String>) -> Self {
        Self::Simple(VarTarget::new(cu, Namespace::CustomUpdate, var))
    }

    /// Reference a synapse weight variable.
    pub fn wu(sg: impl Into<String>, var: impl Into<String>) -> Self {
        Self::Simple(VarTarget::new(sg, Namespace::SynapseWeight, var))
    }

    /// Reference a presynaptic weight-update variable.
    pub fn wu_pre(sg: impl Into<String>, var: impl Into<String>) -> Self {
        Self::Simple(VarTarget::new(sg, Namespace::Presynaptic, var))
    }

    /// Reference a postsynaptic weight-update variable.
    pub fn wu_post(sg: impl Into<String>, var: impl Into<String>) -> Self {
        Self::Simple(VarTarget::new(sg, Namespace::Postsynaptic, var))
    }

    /// Reference a postsynaptic-model variable.
    pub fn psm(sg: impl Into<String>, var: impl Into<String>) -> Self {
        Self::Simple(VarTarget::new(sg, Namespace::PostsynapticModel, var))
    }

    /// Reference a synapse weight variable together with the weight
    /// variable of the transposed population.
    pub fn wu_transpose(
        sg: impl Into<String>,
        var: impl Into<String>,
        transpose_sg: impl Into<String>,
        transpose_var: impl Into<String>,
    ) -> Self {
        Self::Transpose {
            source: VarTarget::new(sg, Namespace::SynapseWeight, var),
            target: VarTarget::new(transpose_sg, Namespace::SynapseWeight, transpose_var),
        }
    }

    /// Every target the reference names.
    pub fn targets(&self) -> impl Iterator<Item = &VarTarget> {
        let (first, second) = match self {
            Self::Simple(t) => (t, None),
            Self::Transpose { source, target } => (source, Some(target)),
        };
        std::iter::once(first).chain(second)
    }
}
