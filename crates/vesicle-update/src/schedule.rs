//! Group schedule planning and build warnings.
//!
//! [`plan_group`] runs once per group at finalize and builds a
//! [`GroupPlan`]: a precomputed routing table telling the executor, for
//! every member and every variable it touches, whether to read the store
//! or the staged output of an earlier member.

use std::fmt;

use indexmap::IndexMap;
use vesicle_core::VarKey;

use crate::access::SymbolRole;
use crate::plan::ResolvedUpdate;

// ── Read routing ───────────────────────────────────────────────────

/// Where a member reads a variable from during group execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// The store as it was when the invocation started.
    Store,
    /// The staged output of an earlier member.
    Staged {
        /// Position of the writing member within the group.
        writer_index: usize,
    },
}

/// Routing plan for one group.
#[derive(Debug, Clone)]
#[must_use]
pub struct GroupPlan {
    name: String,
    /// Update indices, in declaration order.
    members: Vec<usize>,
    /// `routes[position]` maps every touched `VarKey` to its source.
    routes: Vec<IndexMap<VarKey, ReadSource>>,
    /// `writes[position]` lists the variables the member changes.
    writes: Vec<Vec<VarKey>>,
}

impl GroupPlan {
    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Update indices of the members, in execution order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Read source of `key` for the member at `position`.
    pub fn source(&self, position: usize, key: VarKey) -> Option<ReadSource> {
        self.routes.get(position)?.get(&key).copied()
    }

    /// All `(key, source)` pairs of the member at `position`.
    pub fn routes_for(&self, position: usize) -> Option<&IndexMap<VarKey, ReadSource>> {
        self.routes.get(position)
    }

    /// Variables changed by the member at `position`.
    pub fn writes_for(&self, position: usize) -> &[VarKey] {
        self.writes.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every variable a successful invocation commits, in first-write order.
    pub fn committed(&self) -> Vec<VarKey> {
        let mut keys: Vec<VarKey> = Vec::new();
        for key in self.writes.iter().flatten() {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
        keys
    }
}

// ── Warnings ───────────────────────────────────────────────────────

/// Suspicious but legal constructs found at finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// Two members of one group change the same variable; the later write
    /// wins.
    OverlappingWrites {
        /// Group containing both members.
        group: String,
        /// `Entity.var` label of the variable.
        var: String,
        /// Earlier writer.
        first: String,
        /// Later writer.
        second: String,
    },
    /// A batched update assigns storage shared by every lane. The result is
    /// only well defined if every lane writes the same value.
    SharedWriteAcrossBatch {
        /// Update holding the symbol.
        update: String,
        /// Symbol name.
        symbol: String,
        /// `Entity.var` label of the shared variable.
        var: String,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverlappingWrites {
                group,
                var,
                first,
                second,
            } => write!(
                f,
                "'{var}' is written by '{first}' and then '{second}' in group '{group}'"
            ),
            Self::SharedWriteAcrossBatch {
                update,
                symbol,
                var,
            } => write!(
                f,
                "batched update '{update}' writes batch-shared '{var}' through '{symbol}'"
            ),
        }
    }
}

/// Warnings concerning a single update.
pub fn update_warnings(update: &ResolvedUpdate) -> Vec<BuildWarning> {
    if !update.is_batched() {
        return Vec::new();
    }
    update
        .symbols
        .iter()
        .filter(|s| s.role == SymbolRole::ReadWrite && s.locator.shape.lanes == 1)
        .map(|s| BuildWarning::SharedWriteAcrossBatch {
            update: update.name.clone(),
            symbol: s.name.clone(),
            var: s.locator.label.clone(),
        })
        .collect()
}

fn label_of(update: &ResolvedUpdate, key: VarKey) -> String {
    update
        .symbols
        .iter()
        .map(|s| &s.locator)
        .chain(update.transpose.as_ref().map(|t| &t.target))
        .find(|loc| loc.key == key)
        .map_or_else(|| format!("var#{key}"), |loc| loc.label.clone())
}

// ── Planning ───────────────────────────────────────────────────────

/// Build the routing plan of one group.
///
/// `members` pairs each member's update index with its resolved update,
/// in declaration order. Every variable a member touches is routed to the
/// staged output of the last earlier member that writes it, or to the
/// store if there is none.
pub fn plan_group(
    name: &str,
    members: &[(usize, &ResolvedUpdate)],
) -> (GroupPlan, Vec<BuildWarning>) {
    let mut last_writer: IndexMap<VarKey, usize> = IndexMap::new();
    let mut routes = Vec::with_capacity(members.len());
    let mut writes = Vec::with_capacity(members.len());
    let mut warnings = Vec::new();

    for (position, (_, update)) in members.iter().enumerate() {
        let mut member_routes = IndexMap::new();
        for key in update.accessed() {
            let source = match last_writer.get(&key) {
                Some(&writer_index) => ReadSource::Staged { writer_index },
                None => ReadSource::Store,
            };
            member_routes.insert(key, source);
        }
        routes.push(member_routes);

        let member_writes = update.writes();
        for &key in &member_writes {
            if let Some(&earlier) = last_writer.get(&key) {
                warnings.push(BuildWarning::OverlappingWrites {
                    group: name.to_string(),
                    var: label_of(update, key),
                    first: members[earlier].1.name.clone(),
                    second: update.name.clone(),
                });
            }
            last_writer.insert(key, position);
        }
        writes.push(member_writes);
    }

    let plan = GroupPlan {
        name: name.to_string(),
        members: members.iter().map(|(i, _)| *i).collect(),
        routes,
        writes,
    };
    (plan, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{SymbolBinding, UpdateKind};
    use crate::resolve::VarLocator;
    use vesicle_core::{EntityId, Namespace, ScalarType, VarAccess, VarShape};
    use vesicle_store::{ElementSet, UpdateDomain};

    fn binding(name: &str, key: u32, role: SymbolRole, lanes: usize) -> SymbolBinding {
        SymbolBinding {
            name: name.into(),
            locator: VarLocator {
                key: VarKey(key),
                entity: EntityId(0),
                namespace: Namespace::Neuron,
                label: format!("Pop.{name}"),
                ty: ScalarType::Float,
                access: VarAccess::READ_WRITE,
                shape: VarShape::new(4, lanes),
            },
            role,
        }
    }

    fn update(name: &str, lanes: usize, symbols: Vec<SymbolBinding>) -> ResolvedUpdate {
        ResolvedUpdate {
            entity: EntityId(9),
            name: name.into(),
            group: "G".into(),
            kind: UpdateKind::Plain,
            domain: UpdateDomain::Neuron { size: 4 },
            lanes,
            elements: ElementSet::All(4),
            symbols,
            transpose: None,
            params: Vec::new(),
            code: None,
        }
    }

    #[test]
    fn later_member_reads_earlier_staged_output() {
        let first = update("First", 1, vec![binding("X", 0, SymbolRole::ReadWrite, 1)]);
        let second = update(
            "Second",
            1,
            vec![
                binding("X", 0, SymbolRole::Read, 1),
                binding("Y", 1, SymbolRole::ReadWrite, 1),
            ],
        );
        let (plan, warnings) = plan_group("G", &[(3, &first), (5, &second)]);
        assert!(warnings.is_empty());
        assert_eq!(plan.members(), &[3, 5]);
        assert_eq!(plan.source(0, VarKey(0)), Some(ReadSource::Store));
        assert_eq!(
            plan.source(1, VarKey(0)),
            Some(ReadSource::Staged { writer_index: 0 })
        );
        assert_eq!(plan.source(1, VarKey(1)), Some(ReadSource::Store));
        assert_eq!(plan.committed(), vec![VarKey(0), VarKey(1)]);
    }

    #[test]
    fn overlapping_writers_warned_not_rejected() {
        let a = update("A", 1, vec![binding("X", 0, SymbolRole::ReadWrite, 1)]);
        let b = update("B", 1, vec![binding("X", 0, SymbolRole::ReadWrite, 1)]);
        let (plan, warnings) = plan_group("G", &[(0, &a), (1, &b)]);
        assert_eq!(plan.len(), 2);
        assert_eq!(
            warnings,
            vec![BuildWarning::OverlappingWrites {
                group: "G".into(),
                var: "Pop.X".into(),
                first: "A".into(),
                second: "B".into(),
            }]
        );
    }

    #[test]
    fn batched_write_to_shared_storage_warned() {
        let u = update(
            "Set",
            3,
            vec![
                binding("S", 0, SymbolRole::ReadWrite, 1),
                binding("D", 1, SymbolRole::ReadWrite, 3),
            ],
        );
        let warnings = update_warnings(&u);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("Pop.S"));
        assert!(update_warnings(&update("Unbatched", 1, u.symbols.clone())).is_empty());
    }
}
