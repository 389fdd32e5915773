// Tests for crawl functionality and URL handling

use linkmap_core::crawl::{CrawlOptions, FollowMode, execute_crawl, generate_crawl_report};
use linkmap_core::url_norm::{extract_domain, extract_url_path, normalize_url};
use linkmap_core::{MetaValue, SharedLinkGraph};
use std::sync::{Arc, Mutex};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

// ============================================================================
// URL Path Extraction Tests
// ============================================================================

#[test]
fn test_extract_url_path_root() {
    assert_eq!(extract_url_path("http://example.com/"), "/");
    assert_eq!(extract_url_path("http://example.com"), "/");
}

#[test]
fn test_extract_url_path_nested() {
    let path = extract_url_path("http://example.com/api/v1/users");
    assert_eq!(path, "/api/v1/users");
}

#[test]
fn test_extract_url_path_with_query_and_fragment() {
    let path = extract_url_path("http://example.com/api?key=value#top");
    assert_eq!(path, "/api");
}

#[test]
fn test_extract_url_path_invalid_url() {
    let url = "not a valid url";
    // Should return original string for invalid URLs
    assert_eq!(extract_url_path(url), url);
}

#[test]
fn test_extract_domain() {
    assert_eq!(extract_domain("http://api.example.com:8080/v1"), "api.example.com");
    assert_eq!(extract_domain("not a valid url"), "");
}

// ============================================================================
// Normalization Tests
// ============================================================================

#[test]
fn test_normalize_lowercases_scheme_and_host() {
    assert_eq!(
        normalize_url("HTTPS://Example.COM/Path").as_deref(),
        Some("https://example.com/Path")
    );
}

#[test]
fn test_normalize_drops_default_port_and_fragment() {
    assert_eq!(
        normalize_url("http://example.com:80/page#section").as_deref(),
        Some("http://example.com/page")
    );
}

#[test]
fn test_normalize_sorts_query() {
    assert_eq!(
        normalize_url("http://example.com/search?q=rust&page=2").as_deref(),
        Some("http://example.com/search?page=2&q=rust")
    );
    assert_eq!(
        normalize_url("http://example.com/search?").as_deref(),
        Some("http://example.com/search")
    );
}

#[test]
fn test_normalize_trailing_slash() {
    assert_eq!(
        normalize_url("http://example.com/docs/").as_deref(),
        Some("http://example.com/docs")
    );
    assert_eq!(
        normalize_url("http://example.com").as_deref(),
        Some("http://example.com/")
    );
}

#[test]
fn test_normalize_rejects_hostless_urls() {
    assert_eq!(normalize_url("not a valid url"), None);
    assert_eq!(normalize_url("mailto:someone@example.com"), None);
    assert_eq!(normalize_url("data:text/plain,hello"), None);
}

// ============================================================================
// FollowMode Tests
// ============================================================================

#[test]
fn test_follow_mode_variants() {
    assert_ne!(FollowMode::Disabled, FollowMode::Auto);
    assert!(matches!(FollowMode::Auto, FollowMode::Auto));
}

// ============================================================================
// Crawl Into Graph Tests
// ============================================================================

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_bytes(body.as_bytes().to_vec()),
        )
        .mount(server)
        .await;
}

async fn small_site() -> MockServer {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><body>
            <nav><a href="/about">About us</a></nav>
            <a href="/blog/">Blog</a>
            <a href="https://external.invalid/x">Elsewhere</a>
        </body></html>"#,
    )
    .await;
    mount_html(&server, "/about", r#"<html><body><a href="/">Home</a></body></html>"#).await;
    mount_html(&server, "/blog/", "<html><body>No links here</body></html>").await;
    server
}

fn options(root: &str) -> CrawlOptions {
    CrawlOptions {
        urls: vec![root.to_string()],
        threads: 2,
        max_depth: 3,
        max_pages: None,
        follow_mode: FollowMode::Disabled,
        show_progress_bars: false,
    }
}

#[tokio::test]
async fn test_crawl_feeds_graph() {
    let server = small_site().await;
    let root = format!("{}/", server.uri());
    let about = format!("{}/about", server.uri());
    let graph = SharedLinkGraph::default();

    let results = execute_crawl(options(&server.uri()), graph.clone(), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);

    let reader = graph.read();
    // root, about, blog and the unfetched external page
    assert_eq!(reader.node_count(), 4);
    assert_eq!(reader.link_count(), 4);

    let edge = reader.store().edge(&root, &about).unwrap();
    assert_eq!(edge.anchor_text.as_deref(), Some("About us"));
    assert_eq!(edge.context.as_deref(), Some("About us"));

    let about_node = reader.store().node(&about).unwrap();
    assert_eq!(about_node.depth, 1);
    assert_eq!(
        about_node.metadata.get("status_code"),
        Some(&MetaValue::Number(200.0))
    );

    let external = reader.store().node("https://external.invalid/x").unwrap();
    assert!(external.metadata.is_empty());
}

#[tokio::test]
async fn test_crawled_graph_analysis() {
    let server = small_site().await;
    let graph = SharedLinkGraph::default();

    execute_crawl(options(&server.uri()), graph.clone(), None)
        .await
        .unwrap();

    let cycles = graph.detect_cycles(None, false);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].length, 2);

    let path = graph
        .get_relationship_path(
            &format!("{}/about", server.uri()),
            &format!("{}/blog", server.uri()),
            None,
            false,
            false,
        )
        .unwrap();
    assert_eq!(path.length, 3);
}

#[tokio::test]
async fn test_failed_seed_is_reported_and_skipped() {
    let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let messages_clone = messages.clone();
    let graph = SharedLinkGraph::default();

    let results = execute_crawl(
        CrawlOptions {
            urls: vec!["not a url".to_string(), "also not a url".to_string()],
            ..options("")
        },
        graph.clone(),
        Some(Arc::new(move |msg: String| {
            messages_clone.lock().unwrap().push(msg);
        })),
    )
    .await
    .unwrap();

    assert!(results.is_empty());
    assert_eq!(graph.read().node_count(), 0);
    let messages = messages.lock().unwrap();
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.contains("Failed to crawl"))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_crawl_report_summarizes_graph() {
    let server = small_site().await;
    let graph = SharedLinkGraph::default();

    let results = execute_crawl(options(&server.uri()), graph.clone(), None)
        .await
        .unwrap();
    let report = generate_crawl_report(&results, &graph.get_statistics());

    assert!(report.contains("Pages crawled: 3"));
    assert!(report.contains("Total links found: 4"));
    assert!(report.contains("Distinct links: 4"));
    assert!(report.contains("Cycles: 1"));
    assert!(report.contains("## 127.0.0.1"));
}
