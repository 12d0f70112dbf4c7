//! Strongly-typed identifiers and the [`KernelShape`] type alias.

use smallvec::SmallVec;
use std::fmt;

/// Identifies an entity (population, current source or custom update)
/// within a model.
///
/// Entities are registered during model construction and assigned
/// sequential IDs. `EntityId(n)` is the n-th registered entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies one variable slot in the variable store.
///
/// Keys are assigned in declaration order and never reused for the
/// lifetime of a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarKey(pub u32);

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VarKey {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Shape of a convolution-style kernel connectivity.
///
/// Uses `SmallVec<[usize; 4]>` so kernels of up to four dimensions stay
/// on the stack.
pub type KernelShape = SmallVec<[usize; 4]>;
