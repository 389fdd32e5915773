use crate::error::Result;
use crate::graph::SharedLinkGraph;
use crate::model::{LinkMetadata, MetaValue};
use crate::stats::GraphStatistics;
use crate::url_norm::extract_url_path;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use linkmap_scanner::{Crawler, CrawlResult, DiscoveredLink};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub threads: usize,
    pub max_depth: usize,
    pub max_pages: Option<usize>,
    pub follow_mode: FollowMode,
    pub show_progress_bars: bool,
}

/// Cross-domain following behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// Record cross-domain links but never fetch them
    Disabled,
    /// Fetch cross-domain pages as well
    Auto,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Crawl every seed URL and feed each discovered link into `graph`.
///
/// Links land in the graph as they are found, so readers holding another
/// handle to the same graph see it grow during the crawl. A seed that fails
/// to crawl is reported through `progress_callback` and skipped.
pub async fn execute_crawl(
    options: CrawlOptions,
    graph: SharedLinkGraph,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<Vec<CrawlResult>> {
    let CrawlOptions {
        urls,
        threads,
        max_depth,
        max_pages,
        follow_mode,
        show_progress_bars,
    } = options;

    let progress_bar = show_progress_bars.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Starting crawl...");
        Arc::new(pb)
    });

    let processed_count = Arc::new(AtomicUsize::new(0));

    let internal_progress_callback: linkmap_scanner::ProgressCallback = {
        let pb = progress_bar.clone();
        let count = processed_count.clone();
        Arc::new(move |_worker_id: usize, url: String| {
            let processed = count.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref pb) = pb {
                pb.set_message(format!("Crawling... {} URLs processed ({})", processed, url));
                pb.tick();
            }
        })
    };

    let link_callback: linkmap_scanner::LinkCallback = {
        let graph = graph.clone();
        Arc::new(move |source: &str, link: &DiscoveredLink| {
            let metadata = LinkMetadata {
                anchor_text: link.anchor_text.clone(),
                context: link.context.clone(),
            };
            if !graph.add_link(source, &link.url, metadata) {
                debug!("Link {} -> {} not recorded", source, link.url);
            }
        })
    };

    let result_callback: linkmap_scanner::ResultCallback = {
        let graph = graph.clone();
        Arc::new(move |result: CrawlResult| record_page(&graph, &result))
    };

    let mut crawler = Crawler::new()?
        .with_max_depth(max_depth)
        .with_follow_external(follow_mode == FollowMode::Auto)
        .with_progress_callback(internal_progress_callback)
        .with_link_callback(link_callback)
        .with_result_callback(result_callback);
    if let Some(max_pages) = max_pages {
        crawler = crawler.with_max_pages(max_pages);
    }

    let mut all_results = Vec::new();
    for (idx, url_str) in urls.iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!(
                "Crawling host {}/{}: {}",
                idx + 1,
                urls.len(),
                url_str
            ));
        }

        match crawler.crawl(url_str, threads).await {
            Ok(results) => all_results.extend(results),
            Err(e) => {
                warn!("Failed to crawl {}: {}", url_str, e);
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", url_str, e));
                }
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} URLs processed", total));
    }

    Ok(all_results)
}

/// Make sure a fetched page is a node even without links, and annotate it
fn record_page(graph: &SharedLinkGraph, result: &CrawlResult) {
    let mut graph = graph.write();
    if !graph.ensure_node(&result.url) {
        return;
    }
    graph.set_depth(&result.url, u32::try_from(result.depth).unwrap_or(u32::MAX));
    if result.status_code != 0 {
        graph.set_node_metadata(
            &result.url,
            "status_code",
            MetaValue::Number(f64::from(result.status_code)),
        );
    }
    if let Some(ref content_type) = result.content_type {
        graph.set_node_metadata(&result.url, "content_type", MetaValue::from(content_type.as_str()));
    }
    if let Some(ref error) = result.error {
        graph.set_node_metadata(&result.url, "error", MetaValue::from(error.as_str()));
    }
}

fn colored_status(status_code: u16) -> String {
    let status = status_code.to_string();
    match status_code {
        100..=199 => status.white().to_string(),
        200..=299 => status.green().to_string(),
        300..=399 => status.cyan().to_string(),
        400..=499 => status.yellow().to_string(),
        500..=599 => status.red().to_string(),
        _ => status,
    }
}

/// Generate a crawl report from results and the statistics of the graph they built
pub fn generate_crawl_report(results: &[CrawlResult], statistics: &GraphStatistics) -> String {
    // Filter out 404s
    let filtered_results: Vec<&CrawlResult> =
        results.iter().filter(|r| r.status_code != 404).collect();

    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages crawled: {}\n", filtered_results.len()));

    let total_links: usize = filtered_results.iter().map(|r| r.links_found.len()).sum();
    report.push_str(&format!("  Total links found: {}\n", total_links));

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        report.push_str(&format!("  Failed fetches: {}\n", failed));
    }

    report.push_str("\n# Link graph:\n");
    report.push_str(&format!("  Pages: {}\n", statistics.node_count));
    report.push_str(&format!("  Distinct links: {}\n", statistics.link_count));
    report.push_str(&format!("  Density: {:.4}\n", statistics.density));
    report.push_str(&format!("  Cycles: {}\n", statistics.cycle_count));
    report.push_str(&format!(
        "  Strongly connected components: {}\n",
        statistics.scc_count
    ));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    let mut by_host: BTreeMap<String, Vec<&CrawlResult>> = BTreeMap::new();
    for result in filtered_results {
        if let Ok(url) = Url::parse(&result.url)
            && let Some(host) = url.host_str()
        {
            by_host.entry(host.to_string()).or_default().push(result);
        }
    }

    for (host, host_results) in by_host.iter() {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages found\n\n", host_results.len()));

        for result in host_results {
            let path = extract_url_path(&result.url);
            let mut line = format!(
                "  {} {} ({} links)",
                colored_status(result.status_code),
                path,
                result.links_found.len()
            );

            // Only show MIME type if it's not text/html
            if let Some(ref content_type) = result.content_type
                && !content_type.starts_with("text/html")
            {
                line.push_str(&format!(" {}", content_type.bright_black()));
            }

            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_page_saturates_depth() {
        let graph = SharedLinkGraph::default();
        let deep = usize::try_from(u64::from(u32::MAX) + 1).unwrap_or(usize::MAX);
        record_page(&graph, &CrawlResult::new("https://deep.test/".to_string(), deep));
        record_page(&graph, &CrawlResult::with_error("https://near.test/".to_string(), 2, "timeout".to_string()));

        let reader = graph.read();
        let far = reader.store().node("https://deep.test/").unwrap();
        let near = reader.store().node("https://near.test/").unwrap();
        if usize::BITS > 32 {
            assert_eq!(far.depth, u32::MAX);
        }
        assert_eq!(near.depth, 2);
        assert_eq!(near.metadata.get("error"), Some(&MetaValue::from("timeout")));
    }
}
