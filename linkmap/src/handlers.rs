use anyhow::{Context, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use linkmap_core::{AnalysisBudget, ExportOptions, GraphConfig, LinkGraph, LinkMetadata, SharedLinkGraph};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_url_line(line.trim()))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    // Try to parse as-is
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

// Helper functions for analyze handler

/// One line of an edge list file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub anchor_text: Option<String>,
}

/// Parse `source<sep>target[<sep>anchor]`, where the separator is a tab when
/// the line has one and a comma otherwise. Comments and blank lines yield `None`.
pub fn parse_edge_line(line: &str) -> Option<EdgeRecord> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let separator = if line.contains('\t') { '\t' } else { ',' };
    let mut fields = line.splitn(3, separator).map(str::trim);
    let source = fields.next().filter(|s| !s.is_empty())?;
    let target = fields.next().filter(|s| !s.is_empty())?;
    let anchor_text = fields
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(EdgeRecord {
        source: source.to_string(),
        target: target.to_string(),
        anchor_text,
    })
}

/// Load every link of an edge list file
pub fn load_edges_from_file(path: &Path) -> Result<Vec<EdgeRecord>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read edge file {}: {}", path.display(), e))?;

    let edges: Vec<EdgeRecord> = content.lines().filter_map(parse_edge_line).collect();
    if edges.is_empty() {
        return Err(format!("No links found in {}", path.display()));
    }

    Ok(edges)
}

/// Build a graph from loaded links. Returns the graph and the number of
/// links it refused (unparseable URLs and self-links).
pub fn build_graph(config: GraphConfig, edges: &[EdgeRecord]) -> (LinkGraph, usize) {
    let mut graph = LinkGraph::with_config(config);
    let mut rejected = 0;
    for edge in edges {
        let metadata = LinkMetadata {
            anchor_text: edge.anchor_text.clone(),
            context: None,
        };
        if !graph.add_link(&edge.source, &edge.target, metadata) {
            debug!("Rejected link {} -> {}", edge.source, edge.target);
            rejected += 1;
        }
    }
    (graph, rejected)
}

/// Engine settings from `--config`, or the defaults
pub fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GraphConfig> {
    let Some(path) = path else {
        return Ok(GraphConfig::default());
    };
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let config = GraphConfig::from_file(Path::new(&expanded))
        .with_context(|| format!("Failed to load config {}", expanded))?;
    info!("Loaded config from {}", expanded);
    Ok(config)
}

/// What the user asked to see once the graph is built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisRequest {
    pub top: usize,
    pub max_iterations: Option<usize>,
    pub time_limit: Option<Duration>,
    pub cycles: bool,
    pub max_cycle_length: Option<usize>,
    pub path: Option<(String, String)>,
    pub stats: bool,
    pub export: Option<String>,
    pub min_importance: Option<f64>,
    pub include_metadata: bool,
    pub output: Option<PathBuf>,
}

impl AnalysisRequest {
    pub fn from_args(args: &ArgMatches) -> Self {
        let path = args
            .get_many::<String>("path")
            .map(|values| values.cloned().collect::<Vec<_>>())
            .and_then(|values| match values.as_slice() {
                [from, to] => Some((from.clone(), to.clone())),
                _ => None,
            });

        Self {
            top: args.get_one::<usize>("top").copied().unwrap_or(10),
            max_iterations: args.get_one::<usize>("max-iterations").copied(),
            time_limit: args
                .get_one::<u64>("time-limit")
                .map(|ms| Duration::from_millis(*ms)),
            cycles: args.get_flag("cycles"),
            max_cycle_length: args.get_one::<usize>("max-cycle-length").copied(),
            path,
            stats: args.get_flag("stats"),
            export: args.get_one::<String>("export").cloned(),
            min_importance: args.get_one::<f64>("min-importance").copied(),
            include_metadata: args.get_flag("include-metadata"),
            output: args.get_one::<PathBuf>("output").cloned(),
        }
    }

    fn budget(&self) -> AnalysisBudget {
        self.time_limit
            .map(AnalysisBudget::with_timeout)
            .unwrap_or_default()
    }
}

/// Text report of the requested analyses. Ranking always runs so the stored
/// importance values are current for the export.
pub fn render_analysis(graph: &SharedLinkGraph, request: &AnalysisRequest) -> String {
    let mut params = graph.read().config().rank_params();
    if let Some(max_iterations) = request.max_iterations {
        params = params.with_max_iterations(max_iterations);
    }
    let budget = request.budget();
    let ranking = graph.calculate_importance_with_budget(&params, &budget);

    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("# Top {} pages by importance:\n", request.top));
    if ranking.truncated {
        report.push_str(&format!(
            "  (ranking cut short by the time limit after {} iterations)\n",
            ranking.iterations
        ));
    } else if !ranking.converged {
        report.push_str(&format!(
            "  (ranking stopped after {} iterations without converging)\n",
            ranking.iterations
        ));
    }
    for (rank, (url, score)) in ranking.top(request.top).into_iter().enumerate() {
        report.push_str(&format!("  {:>3}. {:.6}  {}\n", rank + 1, score, url));
    }

    if request.cycles {
        let found = graph.read().detect_cycles_with_budget(
            request.max_cycle_length,
            request.include_metadata,
            &budget,
        );
        report.push_str(&format!("\n# Cycles: {}\n", found.cycles.len()));
        if found.truncated {
            report.push_str("  (cycle search cut short by the time limit)\n");
        }
        for cycle in &found.cycles {
            report.push_str(&format!(
                "  [{}] {} -> {} (strength {:.2})\n",
                cycle.length,
                cycle.nodes.join(" -> "),
                cycle.nodes.first().map(String::as_str).unwrap_or_default(),
                cycle.strength
            ));
        }
    }

    if let Some((from, to)) = &request.path {
        report.push_str(&format!("\n# Path from {} to {}:\n", from, to));
        match graph.get_relationship_path(from, to, None, true, request.include_metadata) {
            Some(path) => {
                report.push_str(&format!(
                    "  {} ({} pages, {:?})\n",
                    path.nodes.join(" -> "),
                    path.length,
                    path.direction
                ));
                for edge in path.edges.iter().flatten() {
                    if let Some(anchor) = &edge.anchor_text {
                        report.push_str(&format!("    {} -> {}: \"{}\"\n", edge.from, edge.to, anchor));
                    }
                }
            }
            None => report.push_str("  no path found\n"),
        }
    }

    if request.stats {
        let stats = graph.get_statistics();
        report.push_str("\n# Statistics:\n");
        report.push_str(&format!("  Pages: {}\n", stats.node_count));
        report.push_str(&format!("  Distinct links: {}\n", stats.link_count));
        report.push_str(&format!("  Density: {:.4}\n", stats.density));
        report.push_str(&format!(
            "  Degree: avg in {:.2}, avg out {:.2}, max in {}, max out {}\n",
            stats.avg_in_degree, stats.avg_out_degree, stats.max_in_degree, stats.max_out_degree
        ));
        report.push_str(&format!("  Cycles: {}\n", stats.cycle_count));
        report.push_str(&format!(
            "  Strongly connected components: {}\n",
            stats.scc_count
        ));
        let dist = &stats.importance_distribution;
        report.push_str(&format!(
            "  Importance: min {:.6}, median {:.6}, max {:.6}, stddev {:.6}\n",
            dist.min, dist.median, dist.max, dist.stddev
        ));
        for (domain, pages) in &stats.domain_distribution {
            report.push_str(&format!("  {}: {} pages\n", domain, pages));
        }
        for (length, pairs) in &stats.path_length_distribution {
            report.push_str(&format!("  Paths of {} links: {}\n", length, pairs));
        }
    }

    report.push('\n');
    report
}

/// Run the requested export, writing it to `--output` or returning it for display
pub fn run_export(graph: &SharedLinkGraph, request: &AnalysisRequest) -> anyhow::Result<Option<String>> {
    let Some(format) = &request.export else {
        return Ok(None);
    };

    let options = ExportOptions {
        min_importance: request.min_importance,
        include_metadata: request.include_metadata,
    };
    let rendered = graph.export_graph(format, &options)?.render()?;

    match &request.output {
        Some(path) => {
            let written = write_output(path, &rendered)?;
            println!(
                "{} Exported {} to {}",
                "✓".green().bold(),
                format,
                written.display().to_string().bright_white()
            );
            Ok(None)
        }
        None => Ok(Some(rendered)),
    }
}

/// Write `content` to `path`, expanding `~` and creating parent directories
pub fn write_output(path: &Path, content: &str) -> anyhow::Result<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
    if let Some(parent) = expanded.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&expanded, content)
        .with_context(|| format!("Failed to write {}", expanded.display()))?;
    Ok(expanded)
}

// Re-export crawl types and functions from linkmap-core
pub use linkmap_core::crawl::{
    CrawlOptions, CrawlProgressCallback, FollowMode, execute_crawl, generate_crawl_report,
};
pub use linkmap_core::url_norm::extract_url_path;

fn print_analysis(graph: &SharedLinkGraph, request: &AnalysisRequest) -> anyhow::Result<()> {
    print!("{}", render_analysis(graph, request));
    if let Some(export) = run_export(graph, request)? {
        println!("{}", export);
    }
    Ok(())
}

pub async fn handle_crawl(sub_matches: &ArgMatches) -> anyhow::Result<()> {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let threads = *sub_matches.get_one::<usize>("threads").unwrap_or(&10);
    let max_depth = *sub_matches.get_one::<usize>("depth").unwrap_or(&3);
    let max_pages = sub_matches.get_one::<usize>("max-pages").copied();
    let auto_follow = sub_matches.get_flag("auto-follow");
    let request = AnalysisRequest::from_args(sub_matches);
    let config = load_config(sub_matches.get_one::<PathBuf>("config"))?;

    let urls = load_urls_from_source(url, hosts_file).map_err(|e| anyhow!(e))?;

    let follow_mode = if auto_follow {
        FollowMode::Auto
    } else {
        FollowMode::Disabled
    };

    println!("\n🕷️  Crawling {} host(s)", urls.len());
    println!("Workers: {}", threads);
    println!("Max depth: {}", max_depth);
    if let Some(max_pages) = max_pages {
        println!("Max pages: {}", max_pages);
    }
    let follow_mode_str = match follow_mode {
        FollowMode::Auto => "auto (follow all)",
        FollowMode::Disabled => "disabled (record only)",
    };
    println!("Cross-domain: {}\n", follow_mode_str);

    let options = CrawlOptions {
        urls,
        threads,
        max_depth,
        max_pages,
        follow_mode,
        show_progress_bars: true,
    };

    let progress_callback: CrawlProgressCallback = Arc::new(|msg: String| {
        println!("{}", msg);
    });

    let graph = SharedLinkGraph::with_config(config);
    let all_results = execute_crawl(options, graph.clone(), Some(progress_callback))
        .await
        .context("Crawl failed")?;

    println!("\n✓ Crawl complete!\n");

    let report = generate_crawl_report(&all_results, &graph.get_statistics());
    print!("{}", report);

    print_analysis(&graph, &request)
}

pub fn handle_analyze(sub_matches: &ArgMatches) -> anyhow::Result<()> {
    let edges_path = sub_matches
        .get_one::<PathBuf>("edges")
        .ok_or_else(|| anyhow!("--edges is required"))?;
    let request = AnalysisRequest::from_args(sub_matches);
    let config = load_config(sub_matches.get_one::<PathBuf>("config"))?;

    let edges = load_edges_from_file(edges_path).map_err(|e| anyhow!(e))?;
    let (graph, rejected) = build_graph(config, &edges);

    println!(
        "{} Loaded {} pages and {} distinct links from {}",
        "✓".green().bold(),
        graph.node_count(),
        graph.link_count(),
        edges_path.display().to_string().bright_white()
    );
    if rejected > 0 {
        println!("{} Skipped {} invalid or self-referencing links", "⚠".yellow().bold(), rejected);
    }
    println!();

    print_analysis(&SharedLinkGraph::new(graph), &request)
}
