use crate::feed::parser::parse_feed;
use crate::feed::raw::{RawFeed, RawFeedItem};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_CONCURRENT_FETCHES: usize = 10;

/// Errors that can occur while fetching a single source feed.
///
/// None of these reach the HTTP response: a failing source is logged and
/// contributes zero items to the merged document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured fetch timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as RSS, RDF, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Items fetched from one configured source.
#[derive(Debug, Clone)]
pub struct SourceFeed {
    /// The configured source URL.
    pub url: String,
    /// Base for resolving relative image URLs: the feed's declared link,
    /// or the source URL when the feed declares none.
    pub base: String,
    /// Empty when the fetch or parse failed.
    pub items: Vec<RawFeedItem>,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub timeout: Duration,
}

/// Fetches all sources concurrently with one attempt each.
///
/// The result has one entry per source, in source order, regardless of
/// completion order. Failures are logged and yield an empty item list.
pub async fn fetch_all(
    client: &reqwest::Client,
    sources: &[String],
    settings: &FetchSettings,
) -> Vec<SourceFeed> {
    stream::iter(sources.iter().cloned())
        .map(|url| async move {
            match fetch_one(client, &url, settings).await {
                Ok(feed) => {
                    tracing::debug!(source = %url, items = feed.items.len(), "Source fetched");
                    let base = feed
                        .link
                        .filter(|link| !link.trim().is_empty())
                        .unwrap_or_else(|| url.clone());
                    SourceFeed {
                        url: url.clone(),
                        base,
                        items: feed.items,
                    }
                }
                Err(e) => {
                    tracing::warn!(source = %url, error = %e, "Source fetch failed, skipping");
                    SourceFeed {
                        url: url.clone(),
                        base: url.clone(),
                        items: Vec::new(),
                    }
                }
            }
        })
        .buffered(MAX_CONCURRENT_FETCHES)
        .collect()
        .await
}

/// Fetches and parses one source feed.
///
/// `settings.timeout` bounds the whole exchange: connect, headers and body.
pub async fn fetch_one(
    client: &reqwest::Client,
    url: &str,
    settings: &FetchSettings,
) -> Result<RawFeed, FetchError> {
    let bytes = tokio::time::timeout(settings.timeout, download(client, url))
        .await
        .map_err(|_| FetchError::Timeout)??;

    parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Test</title>
    <link>https://site.example.com/</link>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    fn settings() -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let feed = fetch_one(&client, &format!("{}/feed", mock_server.uri()), &settings())
            .await
            .unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.link.as_deref(), Some("https://site.example.com/"));
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_one(&client, &format!("{}/feed", mock_server.uri()), &settings()).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_one(&client, &format!("{}/feed", mock_server.uri()), &settings()).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(500) => {}
            e => panic!("Expected HttpStatus(500), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let fast = FetchSettings {
            timeout: Duration::from_millis(100),
        };
        let result = fetch_one(&client, &format!("{}/feed", mock_server.uri()), &fast).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_timeout_is_one_budget_per_source() {
        // A timed-out source gives up within a single budget, never two
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(700)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let budget = FetchSettings {
            timeout: Duration::from_millis(500),
        };
        let started = std::time::Instant::now();
        let result = fetch_one(&client, &format!("{}/feed", mock_server.uri()), &budget).await;

        assert!(matches!(result, Err(FetchError::Timeout)));
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_one(&client, &format!("{}/feed", mock_server.uri()), &settings()).await;
        match result.unwrap_err() {
            FetchError::Parse(_) => {}
            e => panic!("Expected Parse error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_empty_feed_success() {
        let empty_rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel></channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(empty_rss))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let feed = fetch_one(&client, &format!("{}/feed", mock_server.uri()), &settings())
            .await
            .unwrap();
        assert!(feed.items.is_empty());
        assert_eq!(feed.link, None);
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_source_order_and_isolates_failures() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/no-link"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0"><channel><item><title>x</title></item></channel></rss>"#,
            ))
            .mount(&mock_server)
            .await;

        let sources: Vec<String> = ["/slow", "/broken", "/no-link"]
            .iter()
            .map(|p| format!("{}{}", mock_server.uri(), p))
            .collect();

        let client = reqwest::Client::new();
        let fetched = fetch_all(&client, &sources, &settings()).await;

        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].url, sources[0]);
        assert_eq!(fetched[0].base, "https://site.example.com/");
        assert_eq!(fetched[0].items.len(), 1);

        assert_eq!(fetched[1].url, sources[1]);
        assert!(fetched[1].items.is_empty());

        // No declared channel link: the source URL is the base
        assert_eq!(fetched[2].base, sources[2]);
        assert_eq!(fetched[2].items.len(), 1);
    }
}
