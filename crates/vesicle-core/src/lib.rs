//! Core types for the Vesicle custom-update core.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! atoms shared by every other crate: entity and variable identifiers,
//! scalar types, namespaces, access and duplication modes, storage
//! shapes, and the error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod access;
pub mod error;
pub mod id;
pub mod types;

pub use access::{
    Duplication, ReduceScope, ReductionOp, VarAccess, VarAccessMode, VarRefAccess,
};
pub use error::{BackendError, FinalizeError, InvokeError, ModelError, UpdateError};
pub use id::{EntityId, KernelShape, VarKey};
pub use types::{ConnectivityKind, EntityKind, Namespace, Precision, ScalarType, VarShape};
