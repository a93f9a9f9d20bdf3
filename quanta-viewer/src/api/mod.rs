//! HTTP API and dashboard for browsing clusters

use crate::data::Dataset;
use crate::navigation::default_index;
use crate::view::{escape_text, ClusterView, ViewError};
use crate::ViewerConfig;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// API state
pub struct ApiState {
    pub dataset: Dataset,
    /// Trailing tokens shown per sample
    pub max_len: usize,
    /// Cluster count shown when the request names none
    pub default_n_clusters: usize,
    page: String,
}

impl ApiState {
    pub fn new(dataset: Dataset, config: &ViewerConfig) -> Self {
        let default_n_clusters = dataset.default_n_clusters(config.default_n_clusters);
        let page = DASHBOARD_HTML
            .replace("{{TITLE}}", &escape_text(&config.title))
            .replace("{{DESCRIPTION}}", &config.description);
        Self {
            dataset,
            max_len: config.max_len,
            default_n_clusters,
            page,
        }
    }
}

/// Selection sent by the dashboard
#[derive(Debug, Default, Deserialize)]
pub struct ClusterQuery {
    /// Cluster count (default: configured count)
    #[serde(default)]
    pub n_clusters: Option<usize>,
    /// Rank of the cluster (default: n_clusters / 8)
    #[serde(default)]
    pub index: Option<usize>,
}

/// Selectable cluster counts
#[derive(Debug, Serialize)]
pub struct ClusterCountsResponse {
    pub default_n_clusters: usize,
    pub counts: Vec<ClusterCountInfo>,
}

#[derive(Debug, Serialize)]
pub struct ClusterCountInfo {
    pub n_clusters: usize,
    /// Number of non-empty clusters (ranks)
    pub clusters: usize,
    pub default_index: usize,
}

/// Rank table of one cluster count
#[derive(Debug, Serialize)]
pub struct RankTableResponse {
    pub n_clusters: usize,
    pub clusters: Vec<RankEntry>,
}

#[derive(Debug, Serialize)]
pub struct RankEntry {
    pub rank: usize,
    pub label: String,
    pub size: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub samples: usize,
    pub cluster_counts: Vec<usize>,
}

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/health", get(health_check))
        .route("/api/cluster-counts", get(cluster_counts))
        .route("/api/clusters", get(rank_table))
        .route("/api/cluster", get(cluster))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn not_found(err: ViewError) -> (StatusCode, String) {
    warn!(error = %err, "Rejected cluster selection");
    (StatusCode::NOT_FOUND, err.to_string())
}

/// Dashboard page
async fn dashboard_page(State(state): State<Arc<ApiState>>) -> Html<String> {
    Html(state.page.clone())
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        samples: state.dataset.sample_count(),
        cluster_counts: state.dataset.cluster_counts(),
    })
}

/// Cluster counts with their rank counts and starting index
async fn cluster_counts(State(state): State<Arc<ApiState>>) -> Json<ClusterCountsResponse> {
    let counts = state
        .dataset
        .cluster_counts()
        .into_iter()
        .filter_map(|n| {
            let ranked = state.dataset.ranked(n)?;
            Some(ClusterCountInfo {
                n_clusters: n,
                clusters: ranked.len(),
                default_index: default_index(n, ranked.len()),
            })
        })
        .collect();

    Json(ClusterCountsResponse {
        default_n_clusters: state.default_n_clusters,
        counts,
    })
}

/// Rank table for a cluster count
async fn rank_table(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<RankTableResponse>, (StatusCode, String)> {
    let n_clusters = query.n_clusters.unwrap_or(state.default_n_clusters);
    let ranked = state
        .dataset
        .ranked(n_clusters)
        .ok_or_else(|| not_found(ViewError::UnknownClusterCount(n_clusters)))?;

    let clusters = ranked
        .sizes()
        .map(|(rank, label, size)| RankEntry {
            rank,
            label: label.to_string(),
            size,
        })
        .collect();

    Ok(Json(RankTableResponse {
        n_clusters,
        clusters,
    }))
}

/// Rendered samples of the selected cluster
async fn cluster(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<ClusterView>, (StatusCode, String)> {
    let n_clusters = query.n_clusters.unwrap_or(state.default_n_clusters);
    let index = match query.index {
        Some(index) => index,
        None => {
            let len = state.dataset.ranked(n_clusters).map_or(0, |r| r.len());
            default_index(n_clusters, len)
        }
    };

    ClusterView::build(&state.dataset, n_clusters, index, state.max_len)
        .map(Json)
        .map_err(not_found)
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{TITLE}}</title>
    <style>
        :root {
            --sidebar: #f0f2f6;
            --text: #262730;
            --muted: #6b6f7b;
            --accent: #ff4b4b;
            --border: #d6d8de;
        }

        * { box-sizing: border-box; margin: 0; padding: 0; }

        body {
            font-family: 'Source Sans Pro', -apple-system, 'Segoe UI', sans-serif;
            color: var(--text);
            display: flex;
            min-height: 100vh;
        }

        .sidebar {
            width: 320px;
            flex-shrink: 0;
            background: var(--sidebar);
            padding: 24px 20px;
            position: sticky;
            top: 0;
            height: 100vh;
            overflow-y: auto;
        }

        .sidebar h1 { font-size: 1.4rem; margin-bottom: 16px; }
        .sidebar .about { font-size: 0.9rem; line-height: 1.5; margin-bottom: 20px; }
        .sidebar .about a { color: var(--accent); }

        label {
            display: block;
            font-size: 0.85rem;
            color: var(--muted);
            margin: 12px 0 4px;
        }

        select {
            width: 100%;
            padding: 8px;
            border: 1px solid var(--border);
            border-radius: 6px;
            font-size: 0.95rem;
            background: white;
        }

        .nav-buttons { display: flex; gap: 8px; margin: 16px 0 8px; }

        button {
            flex: 1;
            padding: 8px 12px;
            border: 1px solid var(--border);
            border-radius: 6px;
            background: white;
            cursor: pointer;
            font-size: 0.9rem;
        }

        button:hover { border-color: var(--accent); color: var(--accent); }
        button:disabled { opacity: 0.4; cursor: not-allowed; }

        .hint { font-size: 0.8rem; color: var(--muted); }

        .main { flex: 1; padding: 32px 48px; max-width: 1100px; }
        .main h2 { font-size: 1.8rem; margin-bottom: 4px; }
        .meta { color: var(--muted); font-size: 0.85rem; margin-bottom: 12px; }

        .sample { padding: 12px 0; line-height: 1.9; font-family: 'SF Mono', 'Consolas', monospace; font-size: 0.85rem; }
        hr { border: none; border-top: 1px solid var(--border); }
        .error { color: var(--accent); padding: 12px 0; }
    </style>
</head>
<body>
    <div class="sidebar">
        <h1>{{TITLE}}</h1>
        <div class="about">{{DESCRIPTION}}</div>

        <label for="nClusters">Select number of clusters</label>
        <select id="nClusters" onchange="changeClusterCount()"></select>

        <label for="clusterIndex">Select cluster index</label>
        <select id="clusterIndex" onchange="selectCluster(+this.value)"></select>

        <div class="nav-buttons">
            <button id="prevBtn" onclick="step('previous')">Previous cluster</button>
            <button id="nextBtn" onclick="step('next')">Next cluster</button>
        </div>
        <p class="hint">You can use the left and right arrow keys to move quickly between clusters.</p>
    </div>

    <div class="main">
        <h2 id="heading">Loading...</h2>
        <div class="meta" id="meta"></div>
        <div id="samples"></div>
    </div>

    <script>
        let counts = [];
        let current = null;

        async function init() {
            const response = await fetch('/api/cluster-counts');
            const data = await response.json();
            counts = data.counts;

            const select = document.getElementById('nClusters');
            select.innerHTML = counts.map(c =>
                `<option value="${c.n_clusters}">${c.n_clusters}</option>`).join('');

            const hash = new URLSearchParams(location.hash.slice(1));
            const n = hash.has('n') ? +hash.get('n') : data.default_n_clusters;
            select.value = n;
            fillIndexOptions(n);

            const entry = countInfo(n);
            const index = hash.has('i') ? +hash.get('i') : (entry ? entry.default_index : 0);
            selectCluster(index);
        }

        function countInfo(n) {
            return counts.find(c => c.n_clusters === n);
        }

        function fillIndexOptions(n) {
            const entry = countInfo(n);
            const total = entry ? entry.clusters : 0;
            const options = [];
            for (let i = 0; i < total; i++) {
                options.push(`<option value="${i}">${i}</option>`);
            }
            document.getElementById('clusterIndex').innerHTML = options.join('');
        }

        function changeClusterCount() {
            const n = +document.getElementById('nClusters').value;
            fillIndexOptions(n);
            const entry = countInfo(n);
            selectCluster(entry ? entry.default_index : 0);
        }

        async function selectCluster(index) {
            const n = +document.getElementById('nClusters').value;
            const response = await fetch(`/api/cluster?n_clusters=${n}&index=${index}`);

            if (!response.ok) {
                document.getElementById('samples').innerHTML =
                    `<p class="error">${escapeHtml(await response.text())}</p>`;
                return;
            }

            current = await response.json();
            location.hash = `n=${current.n_clusters}&i=${current.index}`;
            renderCluster(current);
        }

        function step(direction) {
            if (!current) return;
            const target = current[direction];
            if (target !== current.index) {
                selectCluster(target);
            }
        }

        function renderCluster(view) {
            document.getElementById('clusterIndex').value = view.index;
            document.getElementById('heading').textContent = `Cluster ${view.index}`;

            let meta = `${view.samples.length} samples · label ${escapeHtml(String(view.label))} · ${view.index + 1} of ${view.total}`;
            const withheld = view.samples.filter(s => s.withheld).length;
            if (withheld > 0) {
                meta += ` · ${withheld} withheld`;
            }
            document.getElementById('meta').textContent = meta;

            // Sample markup is escaped server-side; tag-like samples arrive as a notice
            document.getElementById('samples').innerHTML = view.samples.map(s =>
                `<hr><div class="sample">${s.html}</div>`).join('');

            document.getElementById('prevBtn').disabled = view.previous === view.index;
            document.getElementById('nextBtn').disabled = view.next === view.index;
        }

        function escapeHtml(str) {
            return str.replace(/&/g, '&amp;')
                      .replace(/</g, '&lt;')
                      .replace(/>/g, '&gt;')
                      .replace(/"/g, '&quot;');
        }

        document.addEventListener('keydown', (event) => {
            if (event.target.tagName === 'SELECT') return;
            if (event.key === 'ArrowLeft') step('previous');
            if (event.key === 'ArrowRight') step('next');
        });

        init();
    </script>
</body>
</html>
"##;
