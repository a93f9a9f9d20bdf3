//! Cluster ranking
//!
//! Groups sample indices by cluster label and orders the labels by group
//! size (largest first), so a cluster can be addressed by a dense rank
//! instead of its opaque label.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;
use tracing::debug;

/// Errors from cluster ranking
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A cluster label as stored in the cluster document.
///
/// Labels are opaque: integer ids and string names are both accepted and
/// only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterLabel {
    Id(i64),
    Name(String),
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterLabel::Id(id) => write!(f, "{}", id),
            ClusterLabel::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for ClusterLabel {
    fn from(id: i64) -> Self {
        ClusterLabel::Id(id)
    }
}

impl From<&str> for ClusterLabel {
    fn from(name: &str) -> Self {
        ClusterLabel::Name(name.to_string())
    }
}

impl From<String> for ClusterLabel {
    fn from(name: String) -> Self {
        ClusterLabel::Name(name)
    }
}

/// Sample index -> label, stored as a label list aligned to indices 0..N
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment<L = ClusterLabel> {
    labels: Vec<L>,
}

impl<L> ClusterAssignment<L> {
    pub fn from_labels(labels: Vec<L>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// (sample index, label) pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &L)> {
        self.labels.iter().enumerate()
    }
}

impl<L> FromIterator<L> for ClusterAssignment<L> {
    fn from_iter<I: IntoIterator<Item = L>>(iter: I) -> Self {
        Self::from_labels(iter.into_iter().collect())
    }
}

/// Label -> member sample indices.
///
/// Groups are kept in the order their label was first seen; members are in
/// ascending index order.
#[derive(Debug, Clone)]
pub struct ClusterGroups<L = ClusterLabel> {
    groups: Vec<(L, Vec<usize>)>,
    positions: HashMap<L, usize>,
}

impl<L: Clone + Eq + Hash> ClusterGroups<L> {
    fn build(assignment: &ClusterAssignment<L>) -> Self {
        let mut groups: Vec<(L, Vec<usize>)> = Vec::new();
        let mut positions: HashMap<L, usize> = HashMap::new();

        for (index, label) in assignment.iter() {
            match positions.get(label) {
                Some(&pos) => groups[pos].1.push(index),
                None => {
                    positions.insert(label.clone(), groups.len());
                    groups.push((label.clone(), vec![index]));
                }
            }
        }

        Self { groups, positions }
    }

    /// Members of the group with this label
    pub fn members(&self, label: &L) -> Option<&[usize]> {
        self.positions
            .get(label)
            .map(|&pos| self.groups[pos].1.as_slice())
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of grouped samples
    pub fn sample_count(&self) -> usize {
        self.groups.iter().map(|(_, members)| members.len()).sum()
    }

    /// Groups in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&L, &[usize])> {
        self.groups
            .iter()
            .map(|(label, members)| (label, members.as_slice()))
    }
}

/// Dense rank (0..K) <-> label, largest group first
#[derive(Debug, Clone)]
pub struct RankTable<L = ClusterLabel> {
    labels: Vec<L>,
    ranks: HashMap<L, usize>,
}

impl<L: Clone + Eq + Hash> RankTable<L> {
    /// Label holding the given rank
    pub fn label(&self, rank: usize) -> Option<&L> {
        self.labels.get(rank)
    }

    /// Rank of the given label
    pub fn rank_of(&self, label: &L) -> Option<usize> {
        self.ranks.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// (rank, label) pairs in rank order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &L)> {
        self.labels.iter().enumerate()
    }
}

/// Group an assignment by label and rank the labels by descending group size.
///
/// Equal-size groups keep the order in which their labels were first seen,
/// so the result is identical across runs for the same assignment.
pub fn rank<L: Clone + Eq + Hash>(
    assignment: &ClusterAssignment<L>,
) -> Result<(RankTable<L>, ClusterGroups<L>), ClusterError> {
    if assignment.is_empty() {
        return Err(ClusterError::InvalidInput(
            "cluster assignment is empty".to_string(),
        ));
    }

    let groups = ClusterGroups::build(assignment);
    if groups.iter().any(|(_, members)| members.is_empty()) {
        return Err(ClusterError::InvalidInput(
            "cluster group has no members".to_string(),
        ));
    }

    // sort_by_key is stable: ties stay in first-seen order
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&pos| Reverse(groups.groups[pos].1.len()));

    let labels: Vec<L> = order
        .into_iter()
        .map(|pos| groups.groups[pos].0.clone())
        .collect();
    let ranks = labels
        .iter()
        .enumerate()
        .map(|(rank, label)| (label.clone(), rank))
        .collect();

    debug!(
        samples = assignment.len(),
        clusters = labels.len(),
        "Ranked cluster assignment"
    );

    Ok((RankTable { labels, ranks }, groups))
}

/// A ranked assignment: the rank table together with its groups
#[derive(Debug, Clone)]
pub struct RankedClusters<L = ClusterLabel> {
    table: RankTable<L>,
    groups: ClusterGroups<L>,
}

impl<L: Clone + Eq + Hash> RankedClusters<L> {
    pub fn from_assignment(assignment: &ClusterAssignment<L>) -> Result<Self, ClusterError> {
        let (table, groups) = rank(assignment)?;
        Ok(Self { table, groups })
    }

    pub fn table(&self) -> &RankTable<L> {
        &self.table
    }

    /// Number of ranks (distinct labels)
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Label and members of the cluster at the given rank
    pub fn cluster_at(&self, rank: usize) -> Option<(&L, &[usize])> {
        let label = self.table.label(rank)?;
        let members = self.groups.members(label)?;
        Some((label, members))
    }

    pub fn members_at_rank(&self, rank: usize) -> Option<&[usize]> {
        self.cluster_at(rank).map(|(_, members)| members)
    }

    /// (rank, label, group size) in rank order
    pub fn sizes(&self) -> impl Iterator<Item = (usize, &L, usize)> {
        self.table.iter().map(|(rank, label)| {
            let size = self.groups.members(label).map_or(0, <[usize]>::len);
            (rank, label, size)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(labels: &[&str]) -> ClusterAssignment<ClusterLabel> {
        labels.iter().map(|&l| ClusterLabel::from(l)).collect()
    }

    #[test]
    fn test_groups_and_ranks_small_assignment() {
        let (table, groups) = rank(&assignment(&["a", "b", "a"])).unwrap();

        assert_eq!(groups.members(&"a".into()), Some(&[0, 2][..]));
        assert_eq!(groups.members(&"b".into()), Some(&[1][..]));
        assert_eq!(table.label(0), Some(&ClusterLabel::from("a")));
        assert_eq!(table.label(1), Some(&ClusterLabel::from("b")));
        assert_eq!(table.label(2), None);
    }

    #[test]
    fn test_rank_table_is_bijection() {
        let input = assignment(&["x", "y", "z", "y", "x", "y", "w"]);
        let (table, groups) = rank(&input).unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(groups.len(), 4);
        for (rank, label) in table.iter() {
            assert_eq!(table.rank_of(label), Some(rank));
            assert!(groups.members(label).is_some());
        }
        assert_eq!(groups.sample_count(), input.len());
    }

    #[test]
    fn test_rank_zero_is_largest_group() {
        let input = assignment(&["small", "big", "big", "mid", "big", "mid"]);
        let (table, groups) = rank(&input).unwrap();

        let top = groups.members(table.label(0).unwrap()).unwrap().len();
        assert!(groups.iter().all(|(_, members)| members.len() <= top));
        assert_eq!(table.label(0), Some(&ClusterLabel::from("big")));
        assert_eq!(table.label(1), Some(&ClusterLabel::from("mid")));
        assert_eq!(table.label(2), Some(&ClusterLabel::from("small")));
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let input = assignment(&["c", "a", "b", "b", "a", "c"]);
        let (table, _) = rank(&input).unwrap();

        let order: Vec<String> = table.iter().map(|(_, l)| l.to_string()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let input: ClusterAssignment<i64> = (0..500).map(|i| (i * 7919) % 37).collect();
        let (first, _) = rank(&input).unwrap();

        for _ in 0..5 {
            let (again, _) = rank(&input).unwrap();
            let a: Vec<_> = first.iter().collect();
            let b: Vec<_> = again.iter().collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_empty_assignment_is_invalid() {
        let empty: ClusterAssignment<ClusterLabel> = ClusterAssignment::from_labels(vec![]);
        let err = rank(&empty).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }

    #[test]
    fn test_ranked_clusters_lookup() {
        let input: ClusterAssignment<ClusterLabel> =
            vec![5i64, 3, 5, 9, 3, 5].into_iter().map(ClusterLabel::from).collect();
        let ranked = RankedClusters::from_assignment(&input).unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked.members_at_rank(0), Some(&[0, 2, 5][..]));
        assert_eq!(ranked.members_at_rank(1), Some(&[1, 4][..]));
        assert_eq!(ranked.members_at_rank(2), Some(&[3][..]));
        assert_eq!(ranked.members_at_rank(3), None);

        let sizes: Vec<(usize, String, usize)> = ranked
            .sizes()
            .map(|(rank, label, size)| (rank, label.to_string(), size))
            .collect();
        assert_eq!(
            sizes,
            vec![(0, "5".into(), 3), (1, "3".into(), 2), (2, "9".into(), 1)]
        );
    }

    #[test]
    fn test_label_deserializes_from_int_or_string() {
        let labels: Vec<ClusterLabel> = serde_json::from_str(r#"[3, "misc", -1]"#).unwrap();
        assert_eq!(
            labels,
            vec![
                ClusterLabel::Id(3),
                ClusterLabel::Name("misc".to_string()),
                ClusterLabel::Id(-1)
            ]
        );
        assert_eq!(labels[1].to_string(), "misc");
    }
}
