//! Vesicle: batched custom updates over spiking network model state.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Vesicle sub-crates. Most users only need this one dependency.
//!
//! # Quick start
//!
//! ```rust
//! use vesicle::prelude::*;
//!
//! // One population of four neurons, duplicated over two batch lanes.
//! let config = ModelConfig::default().with_batch_size(2);
//! let mut builder = ModelBuilder::new(config).unwrap();
//! builder.add_neuron_population("Pop", 4).unwrap();
//! builder
//!     .declare_variable(
//!         "Pop",
//!         Namespace::Neuron,
//!         "V",
//!         ScalarType::Scalar,
//!         VarAccess::READ_WRITE,
//!         1.0,
//!     )
//!     .unwrap();
//!
//! // A model that scales whatever it references by `k`.
//! let scale = CustomUpdateModel::builder("Scale")
//!     .param("k")
//!     .var_ref("R", ScalarType::Scalar, VarRefAccess::ReadWrite)
//!     .code(|env| {
//!         let r = env.get("R")?;
//!         let k = env.param("k")?;
//!         env.set("R", r * k)
//!     })
//!     .build()
//!     .unwrap();
//! builder.add_custom_update_model(scale).unwrap();
//! builder
//!     .declare_custom_update(
//!         CustomUpdate::new("Double", "Scale", "Scale")
//!             .param("k", 2.0)
//!             .var_ref("R", VarRef::neuron("Pop", "V")),
//!     )
//!     .unwrap();
//!
//! let mut model = builder.finalize().unwrap();
//! model.invoke_group("Scale").unwrap();
//! assert_eq!(model.pull_var("Pop", Namespace::Neuron, "V").unwrap(), vec![2.0; 8]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `vesicle-core` | IDs, scalar types, access modes, errors |
//! | [`store`] | `vesicle-store` | Entities, connectivity, variable storage |
//! | [`update`] | `vesicle-update` | Models, references, planning, `Backend` |
//! | [`engine`] | `vesicle-engine` | Builder, finalize, CPU backend, `Model` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and errors (`vesicle-core`).
pub use vesicle_core as types;

/// Entities, connectivity and variable storage (`vesicle-store`).
pub use vesicle_store as store;

/// Custom update models, reference resolution and group planning
/// (`vesicle-update`).
///
/// Implement [`update::Backend`] to run updates somewhere other than the
/// reference [`engine::CpuBackend`].
pub use vesicle_update as update;

/// Model building and execution (`vesicle-engine`).
pub use vesicle_engine as engine;

/// Common imports for typical Vesicle usage.
///
/// ```rust
/// use vesicle::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use vesicle_core::{
        Namespace, Precision, ReductionOp, ScalarType, VarAccess, VarRefAccess, VarShape,
    };

    // Errors
    pub use vesicle_core::{BackendError, FinalizeError, InvokeError, ModelError, UpdateError};

    // Storage
    pub use vesicle_store::{Connectivity, StoreError, VarInit};

    // Models and references
    pub use vesicle_update::{
        Backend, BuildWarning, CustomUpdateModel, UpdateEnv, VarRef, TRANSPOSE_MODEL,
    };

    // Engine
    pub use vesicle_engine::{
        CpuBackend, CustomUpdate, InvokeMetrics, Model, ModelBuilder, ModelConfig,
    };
}
