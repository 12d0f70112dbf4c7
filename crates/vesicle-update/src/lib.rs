//! Custom update models, reference resolution and group planning.
//!
//! Everything here runs at model build time, except the [`Backend`]
//! trait that the runtime drives:
//!
//! ```text
//! CustomUpdateModel + VarRef[]
//!        │ resolve_reference        (types, transpose shapes)
//!        │ reference_role           (access policy)
//!        │ plan_domain              (size, lanes, elements)
//!        ▼
//! ResolvedUpdate ──► plan_group ──► GroupPlan (read routes, warnings)
//!        │
//!        ▼
//! Backend::launch(update, MemberFrame)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod access;
pub mod backend;
pub mod env;
pub mod model;
pub mod plan;
pub mod reference;
pub mod resolve;
pub mod schedule;

pub use access::{owned_role, reference_role, SymbolRole};
pub use backend::{Backend, MemberFrame};
pub use env::{EnvSymbol, UpdateEnv};
pub use model::{
    CustomUpdateModel, CustomUpdateModelBuilder, UpdateCode, VarDecl, VarRefDecl,
    TRANSPOSE_MODEL,
};
pub use plan::{
    plan_domain, plan_update, DomainPlan, PendingUpdate, ResolvedUpdate, SymbolBinding,
    TransposeBinding, UpdateKind,
};
pub use reference::{VarRef, VarTarget};
pub use resolve::{resolve_reference, resolve_target, ResolvedRef, VarLocator};
pub use schedule::{plan_group, update_warnings, BuildWarning, GroupPlan, ReadSource};
