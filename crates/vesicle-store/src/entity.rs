//! Entity registry records.

use vesicle_core::{EntityId, EntityKind, Namespace};

use crate::connectivity::Connectivity;

/// Iteration domain of a finalized custom update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateDomain {
    /// Iterates `size` neuron-like elements.
    Neuron {
        /// Element count.
        size: usize,
    },
    /// Iterates the synapse-weight elements of a synapse population.
    Synapse {
        /// Population whose connectivity is iterated.
        synapse: EntityId,
        /// Weight elements per lane.
        size: usize,
    },
}

impl UpdateDomain {
    /// Elements per lane.
    pub fn size(&self) -> usize {
        match self {
            Self::Neuron { size } | Self::Synapse { size, .. } => *size,
        }
    }
}

/// Kind-specific data of an entity.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityDetail {
    /// A neuron population.
    NeuronPopulation {
        /// Number of neurons.
        size: usize,
    },
    /// A current source attached to a neuron population.
    CurrentSource {
        /// Population it injects into.
        target: EntityId,
        /// Size of that population.
        size: usize,
    },
    /// Synapses from `source` to `target`.
    SynapsePopulation {
        /// Presynaptic population.
        source: EntityId,
        /// Postsynaptic population.
        target: EntityId,
        /// Presynaptic population size.
        num_pre: usize,
        /// Postsynaptic population size.
        num_post: usize,
        /// Weight storage layout.
        connectivity: Connectivity,
    },
    /// A custom update instance.
    CustomUpdate {
        /// Group it is invoked with.
        group: String,
        /// Iteration domain, known once the update is finalized.
        domain: Option<UpdateDomain>,
    },
}

/// A registered entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityMeta {
    /// Registry id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
    /// Kind-specific data.
    pub detail: EntityDetail,
}

impl EntityMeta {
    /// The entity's kind.
    pub fn kind(&self) -> EntityKind {
        match self.detail {
            EntityDetail::NeuronPopulation { .. } => EntityKind::NeuronPopulation,
            EntityDetail::CurrentSource { .. } => EntityKind::CurrentSource,
            EntityDetail::SynapsePopulation { .. } => EntityKind::SynapsePopulation,
            EntityDetail::CustomUpdate { .. } => EntityKind::CustomUpdate,
        }
    }

    /// Elements per lane of variables in `ns`, if the namespace exists and
    /// its size is known.
    pub fn element_count(&self, ns: Namespace) -> Option<usize> {
        if !self.kind().admits(ns) {
            return None;
        }
        match &self.detail {
            EntityDetail::NeuronPopulation { size } | EntityDetail::CurrentSource { size, .. } => {
                Some(*size)
            }
            EntityDetail::SynapsePopulation {
                num_pre,
                num_post,
                connectivity,
                ..
            } => Some(match ns {
                Namespace::Presynaptic => *num_pre,
                Namespace::Postsynaptic | Namespace::PostsynapticModel => *num_post,
                _ => connectivity.element_count(*num_pre, *num_post),
            }),
            EntityDetail::CustomUpdate { domain, .. } => domain.map(|d| d.size()),
        }
    }
}
