//! Variable store for the Vesicle custom-update core.
//!
//! Holds every registered entity (neuron populations, synapse
//! populations, current sources, custom updates) and every variable they
//! own, as flat lane-major `f64` buffers:
//!
//! ```text
//! VariableStore
//! ├── EntityMeta[]            (name → EntityId, kind-specific detail)
//! │   └── Connectivity        (dense / sparse / kernel, synapses only)
//! ├── VarSlot[]               (VarKey → meta, shape, data)
//! └── (entity, namespace, name) → VarKey index
//! ```
//!
//! Values are quantized to each variable's resolved type whenever they
//! are initialised or pushed from the host.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod connectivity;
pub mod entity;
pub mod error;
pub mod init;
pub mod store;

pub use connectivity::{Connectivity, ElementIter, ElementSet, SparseConnectivity};
pub use entity::{EntityDetail, EntityMeta, UpdateDomain};
pub use error::StoreError;
pub use init::VarInit;
pub use store::{VarMeta, VariableStore};
