//! Model building and custom update execution.
//!
//! [`ModelBuilder`] registers populations, variables and custom updates,
//! then [`finalize`](ModelBuilder::finalize) resolves every reference and
//! plans every group into a [`Model`]. [`Model::invoke_group`] runs a
//! group atomically through a [`Backend`](vesicle_update::Backend);
//! [`CpuBackend`] is the reference implementation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod config;
pub mod cpu;
mod elementwise;
mod exec;
mod kernel;
pub mod metrics;
pub mod model;
pub mod reduction;
mod scratch;
mod transpose;

pub use builder::{CustomUpdate, ModelBuilder};
pub use config::{ConfigError, ModelConfig};
pub use cpu::CpuBackend;
pub use metrics::InvokeMetrics;
pub use model::Model;
pub use reduction::tree_reduce;
