//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! fetch, classify, extract and write cycle end-to-end.

use std::path::Path;
use std::time::Duration;
use sumi_sieve::config::{parse_config, Config};
use sumi_sieve::crawler::Coordinator;
use sumi_sieve::RunSummary;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RULES: &str = r#"
[[rules]]
pattern = '/private/'
follow = false

[[rules]]
pattern = '/list/'

[[rules]]
pattern = '/item/\d+$'
follow = false
extractor = "item"

[extractors.item]
[[extractors.item.fields]]
name = "title"
locator = "h1"
processors = ["trim"]
output = "first"

[[extractors.item.fields]]
name = "price"
locator = "p.price"
processors = ["parse-int"]
output = "first"
"#;

/// Builds a config crawling `server` and writing JSON lines to `output`
///
/// `crawler_extra` is appended to the `[crawler]` table, `tables` after it.
fn create_test_config(server: &MockServer, output: &Path, crawler_extra: &str, tables: &str) -> Config {
    let toml = format!(
        r#"
[crawler]
name = "test"
seeds = ["{uri}/"]
allowed-domains = ["127.0.0.1"]
concurrent-requests = 4
{crawler_extra}

[output]
path = '{output}'
format = "jsonl"

{tables}
"#,
        uri = server.uri(),
        output = output.display(),
        crawler_extra = crawler_extra,
        tables = tables,
    );
    parse_config(&toml).expect("Failed to parse test config")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

fn item_page(title: &str, price: &str) -> ResponseTemplate {
    html(&format!(
        r#"<h1> {} </h1><p class="price">£{}</p>"#,
        title, price
    ))
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn run(config: Config) -> RunSummary {
    let mut coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    coordinator.run().await.expect("Crawl failed")
}

fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .expect("Failed to read output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("Invalid JSON line"))
        .collect()
}

#[tokio::test]
async fn test_full_crawl_extracts_items() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    mount_page(
        &server,
        "/",
        html(r#"<a href="/item/1">One</a><a href="/item/2">Two</a><a href="/about">About</a>"#),
    )
    .await;
    mount_page(&server, "/item/1", item_page("Widget", "1,299")).await;
    mount_page(&server, "/item/2", item_page("Gadget", "15")).await;

    // Unmatched links are never requested
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("about"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.records_emitted, 2);
    assert!(!summary.truncated);

    let mut records = read_lines(&output);
    records.sort_by_key(|r| r["price"].as_i64());
    assert_eq!(records[0], serde_json::json!({"title": "Gadget", "price": 15}));
    assert_eq!(records[1], serde_json::json!({"title": "Widget", "price": 1299}));
}

#[tokio::test]
async fn test_same_link_on_two_pages_is_fetched_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    mount_page(
        &server,
        "/",
        html(r#"<a href="/list/a">A</a><a href="/list/b">B</a>"#),
    )
    .await;
    mount_page(&server, "/list/a", html(r#"<a href="/item/1">1</a>"#)).await;
    mount_page(&server, "/list/b", html(r#"<a href="/item/1#reviews">1</a>"#)).await;

    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(item_page("Widget", "10"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.records_emitted, 1);
    assert_eq!(read_lines(&output).len(), 1);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    mount_page(&server, "/", html(r#"<a href="/item/1">1</a>"#)).await;

    // First three attempts fail, the fourth succeeds
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    mount_page(&server, "/item/1", item_page("Widget", "10")).await;

    let tables = format!(
        "[retry]\nmax-retries = 5\nbackoff-base-ms = 10\nbackoff-max-ms = 40\n{}",
        RULES
    );
    let config = create_test_config(&server, &output, "", &tables);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.fetch_attempts, 5);
    assert_eq!(summary.records_emitted, 1);
}

#[tokio::test]
async fn test_retries_exhausted_marks_page_failed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    mount_page(&server, "/", html(r#"<a href="/item/1">1</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let tables = format!(
        "[retry]\nmax-retries = 2\nbackoff-base-ms = 10\nbackoff-max-ms = 20\n{}",
        RULES
    );
    let config = create_test_config(&server, &output, "", &tables);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.records_emitted, 0);
}

#[tokio::test]
async fn test_permanent_errors_are_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    mount_page(&server, "/", html(r#"<a href="/item/404">gone</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/item/404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.fetch_attempts, 2);
}

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    mount_page(&server, "/", html(r#"<a href="/item/1">slow</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(item_page("Slow", "10").set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "request-timeout-secs = 1", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.fetch_attempts, 2);
    assert_eq!(summary.records_emitted, 0);
}

#[tokio::test]
async fn test_robots_txt_is_obeyed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "User-agent: sumi-sieve\nDisallow: /item/\n\nUser-agent: *\nAllow: /\n",
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        html(r#"<a href="/list/a">A</a><a href="/item/1">1</a>"#),
    )
    .await;
    mount_page(&server, "/list/a", html(r#"<a href="/item/2">2</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(item_page("One", "1"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/2"))
        .respond_with(item_page("Two", "2"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "obey-robots-txt = true", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.pages_failed, 2);
    assert_eq!(summary.fetch_attempts, 2);
    assert_eq!(summary.records_emitted, 0);
}

#[tokio::test]
async fn test_missing_robots_txt_allows_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", html(r#"<a href="/item/1">1</a>"#)).await;
    mount_page(&server, "/item/1", item_page("Widget", "10")).await;

    let config = create_test_config(&server, &output, "obey-robots-txt = true", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.records_emitted, 1);
}

#[tokio::test]
async fn test_offsite_links_are_never_fetched() {
    let server = MockServer::start().await;
    let offsite = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    // Same listener, but reached through a host outside the allow-list
    let offsite_port = offsite.address().port();
    mount_page(
        &server,
        "/",
        html(&format!(
            r#"<a href="http://localhost:{}/item/9">elsewhere</a><a href="/item/1">here</a>"#,
            offsite_port
        )),
    )
    .await;
    mount_page(&server, "/item/1", item_page("Widget", "10")).await;

    Mock::given(method("GET"))
        .respond_with(item_page("Offsite", "1"))
        .expect(0)
        .mount(&offsite)
        .await;

    let config = create_test_config(&server, &output, "", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.records_emitted, 1);
}

#[tokio::test]
async fn test_ignore_rule_blocks_links() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    // Matches both the ignore rule and the item rule; the first one wins
    mount_page(&server, "/", html(r#"<a href="/private/item/1">secret</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/private/item/1"))
        .respond_with(item_page("Secret", "1"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.records_emitted, 0);
}

#[tokio::test]
async fn test_max_depth_limits_discovery() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    mount_page(&server, "/", html(r#"<a href="/list/1">1</a>"#)).await;
    mount_page(&server, "/list/1", html(r#"<a href="/list/2">2</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/list/2"))
        .respond_with(html("deep"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "max-depth = 1", RULES);
    let summary = run(config).await;

    assert_eq!(summary.pages_fetched, 2);
}

#[tokio::test]
async fn test_item_cutoff_truncates_output() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("rows.jsonl");

    mount_page(&server, "/", html(r#"<a href="/table">table</a>"#)).await;
    let rows: String = (1..=5)
        .map(|n| format!(r#"<tr><td class="name">row {}</td><td class="n">{}</td></tr>"#, n, n))
        .collect();
    mount_page(&server, "/table", html(&format!("<table>{}</table>", rows))).await;

    let tables = r#"
[[rules]]
pattern = '/table$'
follow = false
extractor = "row"

[extractors.row]
scope = "tr"

[[extractors.row.fields]]
name = "name"
locator = "td.name"
output = "first"

[[extractors.row.fields]]
name = "n"
locator = "td.n"
processors = ["parse-int"]
output = "first"
"#;
    let config = create_test_config(&server, &output, "item-cutoff = 3", tables);
    let summary = run(config).await;

    assert!(summary.truncated);
    assert_eq!(summary.records_emitted, 3);
    assert_eq!(summary.records_truncated, 2);

    let records = read_lines(&output);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0], serde_json::json!({"name": "row 1", "n": 1}));
    assert_eq!(records[2]["n"], 3);
}

#[tokio::test]
async fn test_json_array_output_with_selected_fields() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.json");

    mount_page(&server, "/", html(r#"<a href="/item/1">1</a>"#)).await;
    mount_page(&server, "/item/1", item_page("Widget", "10")).await;

    let mut config = create_test_config(&server, &output, "", RULES);
    config.output.format = sumi_sieve::config::OutputFormat::Json;
    config.output.fields = vec!["price".to_string(), "missing".to_string()];
    run(config).await;

    let content = std::fs::read_to_string(&output).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed, serde_json::json!([{"price": 10, "missing": null}]));
}

#[tokio::test]
async fn test_invalid_rule_fails_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    Mock::given(method("GET"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let tables = "[[rules]]\npattern = '/item/(\\d+'\n";
    let config = create_test_config(&server, &output, "", tables);
    assert!(Coordinator::new(config).is_err());
}

#[tokio::test]
async fn test_cancelled_crawl_stops_dispatching() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("items.jsonl");

    Mock::given(method("GET"))
        .respond_with(html(r#"<a href="/item/1">1</a>"#))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, "", RULES);
    let mut coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    coordinator.cancellation_token().cancel();
    let summary = coordinator.run().await.expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 0);
    assert_eq!(summary.records_emitted, 0);
}
