//! Page model for one selected cluster

use crate::cluster::ClusterLabel;
use crate::data::Dataset;
use crate::navigation::Selection;
use crate::render::render_sequence;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors from resolving a selection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("Unknown cluster count: {0}")]
    UnknownClusterCount(usize),

    #[error("Cluster index {index} out of range (n_clusters={n_clusters} has {len} clusters)")]
    IndexOutOfRange {
        n_clusters: usize,
        index: usize,
        len: usize,
    },
}

/// One rendered example of a cluster
#[derive(Debug, Clone, Serialize)]
pub struct RenderedSample {
    /// Key of the sample in the context document
    pub key: String,
    /// Position of the sample in the context document
    pub index: usize,
    pub answer: String,
    pub token_count: usize,
    pub html: String,
    pub withheld: bool,
}

/// Everything needed to display one cluster
#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub n_clusters: usize,
    /// Rank of the cluster (largest = 0)
    pub index: usize,
    /// Label in the cluster document
    pub label: ClusterLabel,
    /// Number of ranks available for this cluster count
    pub total: usize,
    pub previous: usize,
    pub next: usize,
    pub samples: Vec<RenderedSample>,
}

impl ClusterView {
    pub fn build(
        dataset: &Dataset,
        n_clusters: usize,
        index: usize,
        max_len: usize,
    ) -> Result<Self, ViewError> {
        let ranked = dataset
            .ranked(n_clusters)
            .ok_or(ViewError::UnknownClusterCount(n_clusters))?;

        let (label, members) = ranked.cluster_at(index).ok_or(ViewError::IndexOutOfRange {
            n_clusters,
            index,
            len: ranked.len(),
        })?;

        let selection = Selection::new(n_clusters, index, ranked.len());

        let samples: Vec<RenderedSample> = members
            .iter()
            .filter_map(|&i| dataset.sample(i).map(|(key, sample)| (i, key, sample)))
            .map(|(i, key, sample)| {
                let tokens = sample.tokens();
                let rendering = render_sequence(&tokens, max_len);
                RenderedSample {
                    key: key.to_string(),
                    index: i,
                    answer: sample.answer.clone(),
                    token_count: tokens.len(),
                    withheld: rendering.is_withheld(),
                    html: rendering.into_html(),
                }
            })
            .collect();

        debug!(
            n_clusters,
            index,
            label = %label,
            samples = samples.len(),
            "Built cluster view"
        );

        Ok(Self {
            n_clusters,
            index,
            label: label.clone(),
            total: ranked.len(),
            previous: selection.previous().index,
            next: selection.next().index,
            samples,
        })
    }

    /// Number of samples whose context was withheld
    pub fn withheld_count(&self) -> usize {
        self.samples.iter().filter(|s| s.withheld).count()
    }

    /// Standalone HTML page with every sample, separated by rules
    pub fn to_html_document(&self, title: &str) -> String {
        let mut body = String::new();
        for sample in &self.samples {
            body.push_str("<hr>\n<div class=\"sample\">");
            body.push_str(&sample.html);
            body.push_str("</div>\n");
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 32px 48px; }}
.sample {{ padding: 12px 0; line-height: 1.9; font-family: monospace; }}
hr {{ border: none; border-top: 1px solid #d6d8de; }}
</style>
</head>
<body>
<h2>Cluster {index}</h2>
<p>label {label} &middot; {count} samples</p>
{body}</body>
</html>
"#,
            title = escape_text(title),
            index = self.index,
            label = escape_text(&self.label.to_string()),
            count = self.samples.len(),
            body = body,
        )
    }
}

/// Escape text for use in element content or attribute values
pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
