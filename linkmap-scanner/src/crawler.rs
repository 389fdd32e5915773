use crate::error::{Result, ScanError};
use crate::result::{CrawlResult, DiscoveredLink};
use futures::future::join_all;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
/// Called with the source page URL for every link found on it
pub type LinkCallback = Arc<dyn Fn(&str, &DiscoveredLink) + Send + Sync>;
pub type ResultCallback = Arc<dyn Fn(CrawlResult) + Send + Sync>;

const CONTEXT_CHARS: usize = 160;

/// Work shared by every worker of one crawl
struct CrawlState {
    queue: Mutex<VecDeque<(String, usize)>>,
    visited: Mutex<HashSet<String>>,
    results: Mutex<Vec<CrawlResult>>,
    /// Items popped from the queue but not finished yet
    in_flight: AtomicUsize,
    fetched: AtomicUsize,
}

#[derive(Clone)]
struct WorkerContext {
    client: Client,
    base_domain: String,
    max_depth: usize,
    max_pages: Option<usize>,
    follow_external: bool,
    progress_callback: Option<ProgressCallback>,
    link_callback: Option<LinkCallback>,
    result_callback: Option<ResultCallback>,
    state: Arc<CrawlState>,
}

impl WorkerContext {
    fn reserve_page(&self) -> bool {
        match self.max_pages {
            Some(max) => self.state.fetched.fetch_add(1, Ordering::SeqCst) < max,
            None => true,
        }
    }
}

pub struct Crawler {
    client: Client,
    max_depth: usize,
    max_pages: Option<usize>,
    follow_external: bool,
    progress_callback: Option<ProgressCallback>,
    link_callback: Option<LinkCallback>,
    result_callback: Option<ResultCallback>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent("linkmap/0.1 (https://github.com/trapdoorsec/linkmap)")
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            max_depth: 3,
            max_pages: None,
            follow_external: false,
            progress_callback: None,
            link_callback: None,
            result_callback: None,
        })
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Queue links to other hosts as well. Cross-domain links are always
    /// reported to the link callback; this only controls whether they are fetched.
    pub fn with_follow_external(mut self, follow_external: bool) -> Self {
        self.follow_external = follow_external;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_link_callback(mut self, callback: LinkCallback) -> Self {
        self.link_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    pub async fn crawl(&self, start_url: &str, workers: usize) -> Result<Vec<CrawlResult>> {
        info!("Starting crawl of {} with {} workers", start_url, workers);

        let mut parsed_url = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let base_domain = parsed_url
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: missing host", start_url)))?
            .to_string();
        parsed_url.set_fragment(None);
        let start = parsed_url.to_string();

        let state = Arc::new(CrawlState {
            queue: Mutex::new(VecDeque::from([(start.clone(), 0)])),
            visited: Mutex::new(HashSet::from([start])),
            results: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            fetched: AtomicUsize::new(0),
        });

        let context = WorkerContext {
            client: self.client.clone(),
            base_domain,
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            follow_external: self.follow_external,
            progress_callback: self.progress_callback.clone(),
            link_callback: self.link_callback.clone(),
            result_callback: self.result_callback.clone(),
            state: state.clone(),
        };

        let mut worker_handles = Vec::new();
        for worker_id in 0..workers.max(1) {
            let context = context.clone();
            worker_handles.push(tokio::spawn(Self::run_worker(worker_id, context)));
        }

        for outcome in join_all(worker_handles).await {
            outcome?;
        }

        let results = state.results.lock().await;
        info!("Crawl complete. Visited {} pages", results.len());
        Ok(results.clone())
    }

    async fn run_worker(worker_id: usize, ctx: WorkerContext) {
        debug!("Worker {} started", worker_id);

        loop {
            // Emptiness and the in-flight count are read under the queue lock;
            // workers push new links before they decrement, so both at zero
            // means the crawl is done.
            let work_item = {
                let mut queue = ctx.state.queue.lock().await;
                match queue.pop_front() {
                    Some(item) => {
                        ctx.state.in_flight.fetch_add(1, Ordering::SeqCst);
                        Some(item)
                    }
                    None if ctx.state.in_flight.load(Ordering::SeqCst) == 0 => break,
                    None => None,
                }
            };

            let Some((url, depth)) = work_item else {
                tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                continue;
            };

            if depth >= ctx.max_depth || !ctx.reserve_page() {
                ctx.state.in_flight.fetch_sub(1, Ordering::SeqCst);
                continue;
            }

            if let Some(ref callback) = ctx.progress_callback {
                callback(worker_id, url.clone());
            }

            let result = match Self::fetch_and_parse(&ctx.client, &url, depth).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    CrawlResult::with_error(url.clone(), depth, e.to_string())
                }
            };

            let mut queued = 0;
            for link in &result.links_found {
                if let Some(ref callback) = ctx.link_callback {
                    callback(&url, link);
                }

                if depth + 1 >= ctx.max_depth {
                    continue;
                }
                if !ctx.follow_external && !Self::is_same_domain(&link.url, &ctx.base_domain) {
                    continue;
                }

                let should_queue = ctx.state.visited.lock().await.insert(link.url.clone());
                if should_queue {
                    ctx.state
                        .queue
                        .lock()
                        .await
                        .push_back((link.url.clone(), depth + 1));
                    queued += 1;
                }
            }
            debug!("[Worker {}] {} queued {} new URLs", worker_id, url, queued);

            if let Some(ref callback) = ctx.result_callback {
                callback(result.clone());
            }
            ctx.state.results.lock().await.push(result);
            ctx.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        debug!("Worker {} finished", worker_id);
    }

    async fn fetch_and_parse(client: &Client, url: &str, depth: usize) -> Result<CrawlResult> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = client.get(url).send().await?;
        let response_time = start.elapsed();

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = response.content_length();

        let body = response.text().await?;

        let mut result = CrawlResult::new(url.to_string(), depth);
        result.status_code = status_code;
        result.content_type = content_type.clone();
        result.content_length = content_length;
        result.response_time = response_time;

        let is_html = content_type
            .as_ref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        if is_html {
            let (links, forms, scripts) = Self::extract_elements(&body, url)?;
            result.links_found = links;
            result.forms_found = forms;
            result.scripts_found = scripts;
        }

        Ok(result)
    }

    fn extract_elements(html: &str, current_url: &str) -> Result<(Vec<DiscoveredLink>, usize, usize)> {
        let document = Html::parse_document(html);
        let selector =
            |css: &str| Selector::parse(css).map_err(|e| ScanError::ParseError(format!("{:?}", e)));

        let mut links = Vec::new();
        for element in document.select(&selector("a[href]")?) {
            let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| Self::resolve_url(current_url, href))
            else {
                continue;
            };

            let anchor_text = Some(Self::collapse_text(element)).filter(|text| !text.is_empty());
            let context = element
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| {
                    Self::collapse_text(parent)
                        .chars()
                        .take(CONTEXT_CHARS)
                        .collect::<String>()
                })
                .filter(|text| !text.is_empty());

            debug!("Found link: {} ({:?})", absolute_url, anchor_text);
            links.push(DiscoveredLink {
                url: absolute_url,
                anchor_text,
                context,
            });
        }

        let forms_count = document.select(&selector("form")?).count();
        let scripts_count = document.select(&selector("script[src]")?).count();

        Ok((links, forms_count, scripts_count))
    }

    fn collapse_text(element: ElementRef<'_>) -> String {
        element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn resolve_url(base: &str, href: &str) -> Option<String> {
        // Skip empty, javascript:, mailto:, tel:, etc.
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with('#')
        {
            return None;
        }

        let base_url = Url::parse(base).ok()?;
        let mut url = base_url.join(href).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }
        url.set_fragment(None);

        Some(url.to_string())
    }

    fn is_same_domain(url: &str, base_domain: &str) -> bool {
        if let Ok(parsed) = Url::parse(url)
            && let Some(host) = parsed.host_str()
        {
            return host == base_domain || host.ends_with(&format!(".{}", base_domain));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn mount_html(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(body.into_bytes()),
            )
            .mount(server)
            .await;
    }

    /// Test basic link discovery
    #[tokio::test]
    async fn test_link_discovery() {
        let mock_server = MockServer::start().await;

        mount_html(
            &mock_server,
            "/",
            r#"<html><body>
                <a href="/page1">Page 1</a>
                <a href="/page2">Page 2</a>
            </body></html>"#
                .to_string(),
        )
        .await;
        mount_html(&mock_server, "/page1", "<html><body>P1</body></html>".to_string()).await;
        mount_html(&mock_server, "/page2", "<html><body>P2</body></html>".to_string()).await;

        let crawler = Crawler::new().unwrap().with_max_depth(2);
        let results = crawler.crawl(&mock_server.uri(), 2).await.unwrap();

        assert_eq!(results.len(), 3, "root + 2 linked pages");
        let page1 = results
            .iter()
            .find(|r| r.url.ends_with("/page1"))
            .expect("page1 crawled");
        assert_eq!(page1.depth, 1);
        assert_eq!(page1.status_code, 200);
    }

    /// Test that anchor text and surrounding text reach the link callback
    #[tokio::test]
    async fn test_link_callback_reports_anchor_text() {
        let mock_server = MockServer::start().await;

        mount_html(
            &mock_server,
            "/",
            r#"<html><body><p>See the <a href="/docs#intro">Docs   page</a> for more.</p></body></html>"#
                .to_string(),
        )
        .await;
        mount_html(&mock_server, "/docs", "<html><body>Docs</body></html>".to_string()).await;

        let seen: Arc<StdMutex<Vec<(String, DiscoveredLink)>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let crawler = Crawler::new()
            .unwrap()
            .with_max_depth(1)
            .with_link_callback(Arc::new(move |source: &str, link: &DiscoveredLink| {
                seen_clone
                    .lock()
                    .unwrap()
                    .push((source.to_string(), link.clone()));
            }));

        crawler.crawl(&mock_server.uri(), 1).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (source, link) = &seen[0];
        assert_eq!(source, &format!("{}/", mock_server.uri()));
        assert_eq!(link.url, format!("{}/docs", mock_server.uri()));
        assert_eq!(link.anchor_text.as_deref(), Some("Docs page"));
        assert_eq!(link.context.as_deref(), Some("See the Docs page for more."));
    }

    /// Cross-domain links are reported but not fetched unless following is enabled
    #[tokio::test]
    async fn test_external_links_reported_not_followed() {
        let mock_server = MockServer::start().await;

        mount_html(
            &mock_server,
            "/",
            r#"<html><body><a href="https://external.invalid/elsewhere">Away</a></body></html>"#
                .to_string(),
        )
        .await;

        let reported = Arc::new(AtomicUsize::new(0));
        let reported_clone = reported.clone();
        let crawler = Crawler::new()
            .unwrap()
            .with_max_depth(3)
            .with_link_callback(Arc::new(move |_source: &str, _link: &DiscoveredLink| {
                reported_clone.fetch_add(1, Ordering::SeqCst);
            }));

        let results = crawler.crawl(&mock_server.uri(), 2).await.unwrap();

        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| !r.url.contains("external.invalid")));
    }

    /// Test that the page limit caps the number of fetches
    #[tokio::test]
    async fn test_max_pages_limits_fetches() {
        let mock_server = MockServer::start().await;

        let mut root_html = String::from("<html><body>");
        for i in 1..=10 {
            root_html.push_str(&format!(r#"<a href="/page{}">Page {}</a>"#, i, i));
        }
        root_html.push_str("</body></html>");
        mount_html(&mock_server, "/", root_html).await;
        for i in 1..=10 {
            mount_html(
                &mock_server,
                &format!("/page{}", i),
                "<html><body>Page</body></html>".to_string(),
            )
            .await;
        }

        let crawler = Crawler::new().unwrap().with_max_depth(3).with_max_pages(4);
        let results = crawler.crawl(&mock_server.uri(), 3).await.unwrap();

        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_resolve_url_skips_non_http() {
        assert_eq!(Crawler::resolve_url("https://example.com/", "mailto:a@b.c"), None);
        assert_eq!(Crawler::resolve_url("https://example.com/", "#top"), None);
        assert_eq!(Crawler::resolve_url("https://example.com/", "ftp://example.com/f"), None);
        assert_eq!(
            Crawler::resolve_url("https://example.com/a/", "b#frag"),
            Some("https://example.com/a/b".to_string())
        );
    }

    #[test]
    fn test_is_same_domain_includes_subdomains() {
        assert!(Crawler::is_same_domain("https://docs.example.com/x", "example.com"));
        assert!(Crawler::is_same_domain("https://example.com/x", "example.com"));
        assert!(!Crawler::is_same_domain("https://example.org/x", "example.com"));
    }
}
