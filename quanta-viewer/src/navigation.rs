//! Cluster selection and stepping
//!
//! The selection is plain data owned by the caller (the browser sends it
//! back with every request); transitions are pure and clamp at the bounds.

use serde::Serialize;

/// Step back one cluster, stopping at 0
pub fn previous(index: usize) -> usize {
    index.saturating_sub(1)
}

/// Step forward one cluster, stopping at the last of `len` clusters
pub fn next(index: usize, len: usize) -> usize {
    let last = len.saturating_sub(1);
    index.min(last).saturating_add(1).min(last)
}

/// Starting cluster for a cluster count: one eighth of the way in
pub fn default_index(n_clusters: usize, len: usize) -> usize {
    (n_clusters / 8).min(len.saturating_sub(1))
}

/// Current position within the ranked clusters of one cluster count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub n_clusters: usize,
    pub index: usize,
    /// Number of selectable ranks
    pub len: usize,
}

impl Selection {
    /// Selection at `index`, clamped into range
    pub fn new(n_clusters: usize, index: usize, len: usize) -> Self {
        Self {
            n_clusters,
            index: index.min(len.saturating_sub(1)),
            len,
        }
    }

    /// Selection at the default starting cluster
    pub fn initial(n_clusters: usize, len: usize) -> Self {
        Self::new(n_clusters, default_index(n_clusters, len), len)
    }

    pub fn previous(self) -> Self {
        Self {
            index: previous(self.index),
            ..self
        }
    }

    pub fn next(self) -> Self {
        Self {
            index: next(self.index, self.len),
            ..self
        }
    }

    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index < self.len.saturating_sub(1)
    }
}
