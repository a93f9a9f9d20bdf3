//! Quanta CLI - inspect skill clusters from the terminal
//!
//! Usage:
//!   quanta <CLUSTERS> <CONTEXTS> [--n-clusters <N>] [--cluster <I>] [--output <FILE>]
//!
//! Example:
//!   quanta clusters.json contexts.json -n 400 -c 50
//!   quanta clusters.json contexts.json -n 400 -c 100 -o cluster-100.html

use anyhow::{Context, Result};
use colored::Colorize;
use quanta_viewer::navigation::default_index;
use quanta_viewer::render::DEFAULT_MAX_LEN;
use quanta_viewer::{ClusterView, Dataset};
use std::path::PathBuf;

const DEFAULT_N_CLUSTERS: usize = 400;
const DEFAULT_TOP: usize = 10;

fn print_usage() {
    eprintln!(
        r#"
{} - Explore clusters of LLM next-token predictions

{}
    quanta <CLUSTERS> <CONTEXTS> [OPTIONS]

{}
    <CLUSTERS>   Cluster document (cluster count -> [labels, auxiliary])
    <CONTEXTS>   Context document (sample key -> {{context, answer}})

{}
    -n, --n-clusters <N>    Cluster count to use (default: 400, else the smallest)
    -c, --cluster <I>       Cluster rank to show (default: N / 8)
    --max-len <L>           Trailing tokens kept per sample (default: 150)
    --top <K>               Rows of the rank table to print (default: 10)
    -o, --output <FILE>     Write the cluster as a standalone HTML page
    -h, --help              Print this help message

{}
    quanta clusters.json contexts.json
    quanta clusters.json contexts.json -n 400 -c 50
    quanta clusters.json contexts.json -c 100 -o cluster-100.html
"#,
        "Quanta CLI".bold(),
        "USAGE:".bold(),
        "ARGS:".bold(),
        "OPTIONS:".bold(),
        "EXAMPLES:".bold(),
    );
}

struct CliArgs {
    clusters: PathBuf,
    contexts: PathBuf,
    n_clusters: Option<usize>,
    cluster: Option<usize>,
    max_len: usize,
    top: usize,
    output: Option<PathBuf>,
}

fn parse_number(flag: &str, value: Option<&String>) -> Result<usize> {
    let value = value.with_context(|| format!("{} requires a value", flag))?;
    value
        .parse()
        .with_context(|| format!("{} expects a non-negative integer, got {:?}", flag, value))
}

fn parse_args() -> Result<CliArgs> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(if args.iter().any(|a| a == "--help" || a == "-h") {
            0
        } else {
            1
        });
    }

    let mut parsed = CliArgs {
        clusters: PathBuf::from(&args[1]),
        contexts: PathBuf::from(&args[2]),
        n_clusters: None,
        cluster: None,
        max_len: DEFAULT_MAX_LEN,
        top: DEFAULT_TOP,
        output: None,
    };

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--n-clusters" | "-n" => {
                i += 1;
                parsed.n_clusters = Some(parse_number("--n-clusters", args.get(i))?);
            }
            "--cluster" | "-c" => {
                i += 1;
                parsed.cluster = Some(parse_number("--cluster", args.get(i))?);
            }
            "--max-len" => {
                i += 1;
                parsed.max_len = parse_number("--max-len", args.get(i))?.max(1);
            }
            "--top" => {
                i += 1;
                parsed.top = parse_number("--top", args.get(i))?;
            }
            "--output" | "-o" => {
                i += 1;
                let path = args.get(i).context("--output requires a file path")?;
                parsed.output = Some(PathBuf::from(path));
            }
            other => {
                eprintln!("{} ignoring unknown argument {}", "warning:".yellow(), other);
            }
        }
        i += 1;
    }

    Ok(parsed)
}

fn print_rank_table(dataset: &Dataset, n_clusters: usize, top: usize) {
    let Some(ranked) = dataset.ranked(n_clusters) else {
        return;
    };

    eprintln!(
        "{}",
        format!("┌─ n_clusters = {} ({} non-empty) ─────────────────────", n_clusters, ranked.len()).cyan()
    );
    eprintln!("{}  {:>6}  {:>10}  {:>6}", "│".cyan(), "rank".dimmed(), "label".dimmed(), "size".dimmed());
    for (rank, label, size) in ranked.sizes().take(top) {
        eprintln!("{}  {:>6}  {:>10}  {:>6}", "│".cyan(), rank, label.to_string(), size);
    }
    if ranked.len() > top {
        eprintln!("{}  {}", "│".cyan(), format!("... {} more", ranked.len() - top).dimmed());
    }
    eprintln!("{}", "└──────────────────────────────────────────────────".cyan());
    eprintln!();
}

/// Token as shown in the terminal: line breaks become visible glyphs
fn terminal_token(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\u{0B}' | '\u{0C}' => '⏎',
            c => c,
        })
        .collect()
}

fn print_cluster(dataset: &Dataset, view: &ClusterView, max_len: usize) {
    println!(
        "{} {}  {}",
        "Cluster".bold(),
        view.index.to_string().bold(),
        format!(
            "(label {}, {} samples, {} of {})",
            view.label,
            view.samples.len(),
            view.index + 1,
            view.total
        )
        .dimmed()
    );

    for sample in &view.samples {
        println!("{}", "-".repeat(60).dimmed());
        if sample.withheld {
            println!("{}", sample.html.red());
            continue;
        }
        let Some((_, record)) = dataset.sample(sample.index) else {
            continue;
        };

        let tokens = record.tokens();
        let start = tokens.len().saturating_sub(max_len);
        let (context, answer) = tokens[start..].split_at(tokens.len() - start - 1);

        let mut line = String::new();
        if start > 0 {
            line.push_str(&"...".dimmed().to_string());
        }
        for token in context {
            line.push_str(&terminal_token(token));
        }
        line.push_str(&terminal_token(answer[0]).on_red().to_string());
        println!("{}", line);
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let dataset = Dataset::load(&args.clusters, &args.contexts)
        .context("Failed to load cluster data")?;

    let n_clusters = args
        .n_clusters
        .unwrap_or_else(|| dataset.default_n_clusters(DEFAULT_N_CLUSTERS));
    let len = dataset.ranked(n_clusters).map_or(0, |r| r.len());
    let index = args.cluster.unwrap_or_else(|| default_index(n_clusters, len));

    let view = ClusterView::build(&dataset, n_clusters, index, args.max_len).with_context(|| {
        format!(
            "Available cluster counts: {:?}",
            dataset.cluster_counts()
        )
    })?;

    eprintln!();
    eprintln!(
        "{}  {} samples, cluster counts {:?}",
        "Loaded".green().bold(),
        dataset.sample_count(),
        dataset.cluster_counts()
    );
    eprintln!();
    print_rank_table(&dataset, n_clusters, args.top);

    match &args.output {
        Some(path) => {
            let title = format!("Cluster {} (n_clusters={})", view.index, view.n_clusters);
            std::fs::write(path, view.to_html_document(&title))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} ({} samples, {} withheld)",
                "Wrote".green().bold(),
                path.display(),
                view.samples.len(),
                view.withheld_count()
            );
        }
        None => print_cluster(&dataset, &view, args.max_len),
    }

    Ok(())
}
