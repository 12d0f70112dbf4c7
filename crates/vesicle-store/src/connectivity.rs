//! Connectivity descriptors for synapse populations.
//!
//! A [`Connectivity`] tells the store how many synapse-weight elements a
//! population has and which of them are valid. Dense matrices store every
//! `(pre, post)` pair row-major; sparse matrices store `num_pre` rows of
//! `max_row_length` slots of which only the first `row_length[i]` are
//! valid; kernels store one shared weight per kernel element.

use std::ops::Range;

use rand::Rng;
use vesicle_core::{ConnectivityKind, KernelShape};

use crate::error::StoreError;

// ── SparseConnectivity ─────────────────────────────────────────────

/// Row-compressed connectivity with a fixed maximum row length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseConnectivity {
    max_row_length: usize,
    row_length: Vec<usize>,
    ind: Vec<u32>,
}

impl SparseConnectivity {
    /// Build from explicit per-row postsynaptic indices.
    ///
    /// `max_row_length` is the longest row. Every index must be below
    /// `num_post`.
    pub fn from_rows(num_post: usize, rows: &[Vec<u32>]) -> Result<Self, StoreError> {
        let max_row_length = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut row_length = Vec::with_capacity(rows.len());
        let mut ind = vec![0u32; rows.len() * max_row_length];
        for (i, row) in rows.iter().enumerate() {
            for (k, &post) in row.iter().enumerate() {
                if post as usize >= num_post {
                    return Err(StoreError::InvalidConnectivity {
                        reason: format!(
                            "row {i} targets postsynaptic neuron {post}, population has {num_post}"
                        ),
                    });
                }
                ind[i * max_row_length + k] = post;
            }
            row_length.push(row.len());
        }
        Ok(Self {
            max_row_length,
            row_length,
            ind,
        })
    }

    /// Connect every presynaptic neuron to `row_length` postsynaptic
    /// neurons drawn uniformly with replacement. Rows are sorted.
    pub fn fixed_number_post_with_replacement<R: Rng>(
        num_pre: usize,
        num_post: usize,
        row_length: usize,
        rng: &mut R,
    ) -> Result<Self, StoreError> {
        if num_post == 0 && row_length > 0 {
            return Err(StoreError::InvalidConnectivity {
                reason: "cannot draw targets from an empty postsynaptic population".to_string(),
            });
        }
        let rows: Vec<Vec<u32>> = (0..num_pre)
            .map(|_| {
                let mut row: Vec<u32> = (0..row_length)
                    .map(|_| rng.random_range(0..num_post) as u32)
                    .collect();
                row.sort_unstable();
                row
            })
            .collect();
        let mut sparse = Self::from_rows(num_post, &rows)?;
        sparse.max_row_length = row_length;
        if sparse.ind.len() != num_pre * row_length {
            sparse.ind.resize(num_pre * row_length, 0);
        }
        Ok(sparse)
    }

    /// Number of slots per row.
    pub fn max_row_length(&self) -> usize {
        self.max_row_length
    }

    /// Valid slots in each row.
    pub fn row_lengths(&self) -> &[usize] {
        &self.row_length
    }

    /// Postsynaptic index of slot `k` in row `i`, if the slot is valid.
    pub fn target(&self, i: usize, k: usize) -> Option<usize> {
        if k < *self.row_length.get(i)? {
            Some(self.ind[i * self.max_row_length + k] as usize)
        } else {
            None
        }
    }
}

// ── Connectivity ───────────────────────────────────────────────────

/// Storage layout of a synapse population.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Connectivity {
    /// Every `(pre, post)` pair, row-major.
    Dense,
    /// Row-compressed sparse matrix.
    Sparse(SparseConnectivity),
    /// One shared weight per kernel element.
    Kernel {
        /// Kernel extents.
        shape: KernelShape,
    },
}

impl Connectivity {
    /// Layout kind.
    pub fn kind(&self) -> ConnectivityKind {
        match self {
            Self::Dense => ConnectivityKind::Dense,
            Self::Sparse(_) => ConnectivityKind::Sparse,
            Self::Kernel { .. } => ConnectivityKind::Kernel,
        }
    }

    /// Number of synapse-weight elements stored per lane.
    pub fn element_count(&self, num_pre: usize, num_post: usize) -> usize {
        match self {
            Self::Dense => num_pre * num_post,
            Self::Sparse(s) => num_pre * s.max_row_length,
            Self::Kernel { shape } => shape.iter().product(),
        }
    }

    /// Elements that hold a real synapse.
    pub fn elements(&self, num_pre: usize, num_post: usize) -> ElementSet {
        match self {
            Self::Sparse(s) => {
                let mut indices = Vec::with_capacity(s.row_length.iter().sum());
                for (i, &len) in s.row_length.iter().enumerate() {
                    let row = i * s.max_row_length;
                    indices.extend(row..row + len);
                }
                ElementSet::Indices(indices)
            }
            _ => ElementSet::All(self.element_count(num_pre, num_post)),
        }
    }

    /// Check the descriptor against the populations it connects.
    pub fn validate(&self, num_pre: usize, num_post: usize) -> Result<(), StoreError> {
        match self {
            Self::Dense => Ok(()),
            Self::Sparse(s) => {
                if s.row_length.len() != num_pre {
                    return Err(StoreError::InvalidConnectivity {
                        reason: format!(
                            "{} sparse rows for a presynaptic population of {num_pre}",
                            s.row_length.len()
                        ),
                    });
                }
                if let Some(&bad) = s.ind.iter().find(|&&p| p as usize >= num_post) {
                    return Err(StoreError::InvalidConnectivity {
                        reason: format!(
                            "postsynaptic index {bad} out of range for population of {num_post}"
                        ),
                    });
                }
                Ok(())
            }
            Self::Kernel { shape } => {
                if shape.is_empty() || shape.contains(&0) {
                    return Err(StoreError::InvalidConnectivity {
                        reason: format!("degenerate kernel shape {shape:?}"),
                    });
                }
                Ok(())
            }
        }
    }
}

// ── ElementSet ─────────────────────────────────────────────────────

/// The elements an update iterates over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementSet {
    /// Every element in `0..n`.
    All(usize),
    /// Only these element indices, ascending.
    Indices(Vec<usize>),
}

impl ElementSet {
    /// Number of elements visited.
    pub fn len(&self) -> usize {
        match self {
            Self::All(n) => *n,
            Self::Indices(v) => v.len(),
        }
    }

    /// Whether no element is visited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit elements in ascending order.
    pub fn iter(&self) -> ElementIter<'_> {
        match self {
            Self::All(n) => ElementIter::Range(0..*n),
            Self::Indices(v) => ElementIter::Indices(v.iter()),
        }
    }
}

/// Iterator over an [`ElementSet`].
pub enum ElementIter<'a> {
    /// Contiguous range.
    Range(Range<usize>),
    /// Explicit indices.
    Indices(std::slice::Iter<'a, usize>),
}

impl Iterator for ElementIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Self::Range(r) => r.next(),
            Self::Indices(it) => it.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Range(r) => r.size_hint(),
            Self::Indices(it) => it.size_hint(),
        }
    }
}

impl ExactSizeIterator for ElementIter<'_> {}
