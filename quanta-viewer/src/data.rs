//! Cluster and context documents
//!
//! The cluster document maps a cluster count (as a decimal string) to a
//! `[labels, auxiliary]` pair; the context document maps sample keys to
//! `{context, answer}` records. Sample keys are numbered in document order,
//! which is the indexing the label lists are aligned to.

use crate::cluster::{ClusterAssignment, ClusterError, ClusterLabel, RankedClusters};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from loading the documents
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cluster count {0:?} is not an unsigned integer")]
    InvalidClusterCount(String),

    #[error("Cluster count {0} appears more than once")]
    DuplicateClusterCount(usize),

    #[error("Cluster document contains no cluster counts")]
    NoClusterCounts,

    #[error("Labels for n_clusters={n_clusters} cover {labels} samples but only {samples} contexts are loaded")]
    Misaligned {
        n_clusters: usize,
        labels: usize,
        samples: usize,
    },

    #[error("Cannot rank n_clusters={n_clusters}: {source}")]
    Ranking {
        n_clusters: usize,
        #[source]
        source: ClusterError,
    },
}

/// One prediction example: the context tokens and the token that followed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub context: Vec<String>,
    pub answer: String,
}

impl Sample {
    /// Context followed by the answer, the sequence shown for this sample
    pub fn tokens(&self) -> Vec<&str> {
        self.context
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.answer.as_str()))
            .collect()
    }
}

fn read_file(path: &Path) -> Result<String, DataError> {
    std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Label lists keyed by cluster count
#[derive(Debug, Clone)]
pub struct ClusterDocument {
    assignments: BTreeMap<usize, ClusterAssignment>,
}

impl ClusterDocument {
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        // Second element of each pair is auxiliary data we never read
        let raw: BTreeMap<String, (Vec<ClusterLabel>, IgnoredAny)> = serde_json::from_str(json)?;

        let mut assignments = BTreeMap::new();
        for (key, (labels, _)) in raw {
            let n_clusters: usize = key
                .trim()
                .parse()
                .map_err(|_| DataError::InvalidClusterCount(key.clone()))?;
            if assignments
                .insert(n_clusters, ClusterAssignment::from_labels(labels))
                .is_some()
            {
                return Err(DataError::DuplicateClusterCount(n_clusters));
            }
        }

        if assignments.is_empty() {
            return Err(DataError::NoClusterCounts);
        }

        Ok(Self { assignments })
    }

    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        Self::from_json_str(&read_file(path)?)
    }

    /// Cluster counts in ascending numeric order
    pub fn cluster_counts(&self) -> Vec<usize> {
        self.assignments.keys().copied().collect()
    }

    pub fn assignment(&self, n_clusters: usize) -> Option<&ClusterAssignment> {
        self.assignments.get(&n_clusters)
    }
}

/// Samples in document order
#[derive(Debug, Clone, Default)]
pub struct ContextDocument {
    samples: Vec<(String, Sample)>,
}

impl ContextDocument {
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        // serde_json's preserve_order keeps keys in file order
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

        let samples = raw
            .into_iter()
            .map(|(key, value)| serde_json::from_value::<Sample>(value).map(|sample| (key, sample)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { samples })
    }

    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        Self::from_json_str(&read_file(path)?)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Key and sample at the given index
    pub fn get(&self, index: usize) -> Option<(&str, &Sample)> {
        self.samples
            .get(index)
            .map(|(key, sample)| (key.as_str(), sample))
    }
}

/// Both documents, with every cluster count ranked up front
#[derive(Debug, Clone)]
pub struct Dataset {
    ranked: BTreeMap<usize, RankedClusters>,
    contexts: ContextDocument,
}

impl Dataset {
    pub fn new(clusters: ClusterDocument, contexts: ContextDocument) -> Result<Self, DataError> {
        let mut ranked = BTreeMap::new();

        for (n_clusters, assignment) in clusters.assignments {
            if assignment.len() > contexts.len() {
                return Err(DataError::Misaligned {
                    n_clusters,
                    labels: assignment.len(),
                    samples: contexts.len(),
                });
            }
            if assignment.len() < contexts.len() {
                warn!(
                    n_clusters,
                    labels = assignment.len(),
                    samples = contexts.len(),
                    "Label list shorter than context document; trailing samples are unclustered"
                );
            }

            let clusters = RankedClusters::from_assignment(&assignment)
                .map_err(|source| DataError::Ranking { n_clusters, source })?;
            debug!(n_clusters, ranks = clusters.len(), "Ranked clusters");
            ranked.insert(n_clusters, clusters);
        }

        Ok(Self { ranked, contexts })
    }

    /// Load and validate both documents from disk
    pub fn load(cluster_path: &Path, context_path: &Path) -> Result<Self, DataError> {
        let clusters = ClusterDocument::from_path(cluster_path)?;
        let contexts = ContextDocument::from_path(context_path)?;

        info!(
            cluster_file = %cluster_path.display(),
            context_file = %context_path.display(),
            cluster_counts = clusters.assignments.len(),
            samples = contexts.len(),
            "Loaded documents"
        );

        Self::new(clusters, contexts)
    }

    /// Cluster counts in ascending numeric order
    pub fn cluster_counts(&self) -> Vec<usize> {
        self.ranked.keys().copied().collect()
    }

    pub fn ranked(&self, n_clusters: usize) -> Option<&RankedClusters> {
        self.ranked.get(&n_clusters)
    }

    /// `preferred` if present, otherwise the smallest cluster count
    pub fn default_n_clusters(&self, preferred: usize) -> usize {
        if self.ranked.contains_key(&preferred) {
            preferred
        } else {
            // ClusterDocument never parses to zero counts
            self.ranked.keys().next().copied().unwrap_or(preferred)
        }
    }

    pub fn sample(&self, index: usize) -> Option<(&str, &Sample)> {
        self.contexts.get(index)
    }

    pub fn sample_count(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contexts_json() -> String {
        json!({
            "z-first": {"context": ["The", " cat"], "answer": " sat"},
            "a-second": {"context": ["1", ","], "answer": " 2"},
            "m-third": {"context": [], "answer": "\n"}
        })
        .to_string()
    }

    #[test]
    fn test_context_keys_keep_document_order() {
        let doc = ContextDocument::from_json_str(&contexts_json()).unwrap();

        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get(0).unwrap().0, "z-first");
        assert_eq!(doc.get(1).unwrap().0, "a-second");
        assert_eq!(doc.get(2).unwrap().0, "m-third");
        assert!(doc.get(3).is_none());
    }

    #[test]
    fn test_sample_tokens_end_with_answer() {
        let doc = ContextDocument::from_json_str(&contexts_json()).unwrap();
        let (_, sample) = doc.get(0).unwrap();
        assert_eq!(sample.tokens(), vec!["The", " cat", " sat"]);

        let (_, sample) = doc.get(2).unwrap();
        assert_eq!(sample.tokens(), vec!["\n"]);
    }

    #[test]
    fn test_cluster_counts_sorted_numerically() {
        let json = json!({
            "400": [[0, 1, 0], {"centroids": []}],
            "50": [[1, 1, 0], null],
            "1000": [[2, 1, 0], 0]
        })
        .to_string();
        let doc = ClusterDocument::from_json_str(&json).unwrap();

        assert_eq!(doc.cluster_counts(), vec![50, 400, 1000]);
        assert_eq!(doc.assignment(50).unwrap().len(), 3);
        assert!(doc.assignment(7).is_none());
    }

    #[test]
    fn test_non_numeric_cluster_count_rejected() {
        let json = json!({"many": [[0], null]}).to_string();
        let err = ClusterDocument::from_json_str(&json).unwrap_err();
        assert!(matches!(err, DataError::InvalidClusterCount(key) if key == "many"));
    }

    #[test]
    fn test_duplicate_cluster_count_rejected() {
        let json = r#"{"50": [[0], null], " 50": [[1], null]}"#;
        let err = ClusterDocument::from_json_str(json).unwrap_err();
        assert!(matches!(err, DataError::DuplicateClusterCount(50)));

        let json = r#"{"050": [[0], null], "50": [[1], null]}"#;
        assert!(ClusterDocument::from_json_str(json).is_err());
    }

    #[test]
    fn test_empty_cluster_document_rejected() {
        let err = ClusterDocument::from_json_str("{}").unwrap_err();
        assert!(matches!(err, DataError::NoClusterCounts));
    }

    #[test]
    fn test_malformed_pair_rejected() {
        let err = ClusterDocument::from_json_str(r#"{"2": [0, 1, 0]}"#).unwrap_err();
        assert!(matches!(err, DataError::Json(_)));
    }

    #[test]
    fn test_dataset_ranks_every_count() {
        let clusters = ClusterDocument::from_json_str(
            &json!({"2": [[7, 8, 7], null], "3": [["x", "y", "z"], null]}).to_string(),
        )
        .unwrap();
        let contexts = ContextDocument::from_json_str(&contexts_json()).unwrap();
        let dataset = Dataset::new(clusters, contexts).unwrap();

        assert_eq!(dataset.cluster_counts(), vec![2, 3]);
        let ranked = dataset.ranked(2).unwrap();
        assert_eq!(ranked.table().label(0), Some(&ClusterLabel::Id(7)));
        assert_eq!(ranked.members_at_rank(0), Some(&[0, 2][..]));
        assert_eq!(dataset.ranked(3).unwrap().len(), 3);
        assert_eq!(dataset.sample_count(), 3);
    }

    #[test]
    fn test_dataset_rejects_labels_beyond_contexts() {
        let clusters =
            ClusterDocument::from_json_str(&json!({"2": [[0, 1, 0, 1], null]}).to_string())
                .unwrap();
        let contexts = ContextDocument::from_json_str(&contexts_json()).unwrap();

        let err = Dataset::new(clusters, contexts).unwrap_err();
        assert!(matches!(
            err,
            DataError::Misaligned {
                n_clusters: 2,
                labels: 4,
                samples: 3
            }
        ));
    }

    #[test]
    fn test_dataset_accepts_short_label_list() {
        let clusters =
            ClusterDocument::from_json_str(&json!({"2": [[4, 9], null]}).to_string()).unwrap();
        let contexts = ContextDocument::from_json_str(&contexts_json()).unwrap();
        let dataset = Dataset::new(clusters, contexts).unwrap();

        assert_eq!(dataset.sample_count(), 3);
        let ranked = dataset.ranked(2).unwrap();
        assert_eq!(ranked.len(), 2);
        let members: Vec<usize> = (0..ranked.len())
            .flat_map(|rank| ranked.members_at_rank(rank).unwrap().to_vec())
            .collect();
        assert_eq!(members, vec![0, 1]);
        assert!(!members.contains(&2));
        assert_eq!(dataset.sample(2).unwrap().0, "m-third");
    }

    #[test]
    fn test_dataset_rejects_empty_label_list() {
        let clusters = ClusterDocument::from_json_str(&json!({"5": [[], null]}).to_string()).unwrap();
        let contexts = ContextDocument::from_json_str(&contexts_json()).unwrap();

        let err = Dataset::new(clusters, contexts).unwrap_err();
        assert!(matches!(
            err,
            DataError::Ranking {
                n_clusters: 5,
                source: ClusterError::InvalidInput(_)
            }
        ));
    }

    #[test]
    fn test_default_n_clusters_falls_back_to_smallest() {
        let clusters = ClusterDocument::from_json_str(
            &json!({"20": [[0, 0, 1], null], "10": [[0, 1, 1], null]}).to_string(),
        )
        .unwrap();
        let contexts = ContextDocument::from_json_str(&contexts_json()).unwrap();
        let dataset = Dataset::new(clusters, contexts).unwrap();

        assert_eq!(dataset.default_n_clusters(20), 20);
        assert_eq!(dataset.default_n_clusters(400), 10);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ClusterDocument::from_path(Path::new("/nonexistent/clusters.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/clusters.json"));
    }
}
