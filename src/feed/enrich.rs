use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_LENGTH;
use std::time::Duration;

use crate::feed::normalize::NormalizedItem;
use crate::util::validate_url;

/// A merged item plus what the image probe learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedItem {
    pub item: NormalizedItem,
    /// Image size in bytes from the probe's `Content-Length`, if any.
    pub image_length: Option<u64>,
}

/// How image probes are issued.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub timeout: Duration,
    /// Allow probing localhost and private address ranges.
    pub allow_private_hosts: bool,
}

/// Probes every item image concurrently and attaches its byte length.
///
/// Every probe is in flight at once, so the wave takes at most one probe
/// timeout; the list is already capped by the merge step. Items keep their
/// order. An item without an image is passed through without a request.
/// Probe failures only ever produce `image_length: None`.
pub async fn enrich(
    client: &reqwest::Client,
    items: Vec<NormalizedItem>,
    settings: &ProbeSettings,
) -> Vec<EnrichedItem> {
    let in_flight = items.len().max(1);

    stream::iter(items)
        .map(|item| async move {
            let image_length = match item.image.as_deref() {
                Some(url) => probe_image_length(client, url, settings).await,
                None => None,
            };
            EnrichedItem { item, image_length }
        })
        .buffered(in_flight)
        .collect()
        .await
}

/// Issues a time-bounded HEAD request and reads `Content-Length`.
///
/// Returns `None` on SSRF rejection, network error, timeout, non-2xx
/// status, or a missing or non-numeric header. The header is read directly
/// rather than through the body size hint, which is meaningless for HEAD.
pub async fn probe_image_length(
    client: &reqwest::Client,
    url: &str,
    settings: &ProbeSettings,
) -> Option<u64> {
    if !settings.allow_private_hosts {
        if let Err(e) = validate_url(url) {
            tracing::debug!(url = %url, error = %e, "Image probe target rejected");
            return None;
        }
    }

    let response = match tokio::time::timeout(settings.timeout, client.head(url).send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::debug!(url = %url, error = %e, "Image probe failed");
            return None;
        }
        Err(_) => {
            tracing::debug!(url = %url, timeout_ms = settings.timeout.as_millis() as u64, "Image probe timed out");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!(url = %url, status = %response.status(), "Image probe returned non-success status");
        return None;
    }

    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> ProbeSettings {
        ProbeSettings {
            timeout: Duration::from_millis(500),
            allow_private_hosts: true,
        }
    }

    fn item(link: &str, image: Option<String>) -> NormalizedItem {
        NormalizedItem {
            title: link.to_string(),
            link: link.to_string(),
            description: String::new(),
            published_at: Utc::now(),
            image,
        }
    }

    #[tokio::test]
    async fn test_probe_reads_content_length() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/a.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .insert_header("Content-Length", "2048")
                    .set_body_bytes(vec![0u8; 2048]),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let length =
            probe_image_length(&client, &format!("{}/a.jpg", server.uri()), &settings()).await;
        assert_eq!(length, Some(2048));
    }

    #[tokio::test]
    async fn test_probe_not_found_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let length =
            probe_image_length(&client, &format!("{}/missing.jpg", server.uri()), &settings())
                .await;
        assert_eq!(length, None);
    }

    #[tokio::test]
    async fn test_probe_timeout_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Length", "10")
                    .set_body_bytes(vec![0u8; 10])
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let fast = ProbeSettings {
            timeout: Duration::from_millis(100),
            ..settings()
        };
        let length = probe_image_length(&client, &format!("{}/slow.jpg", server.uri()), &fast).await;
        assert_eq!(length, None);
    }

    #[tokio::test]
    async fn test_probe_connection_refused_yields_none() {
        let client = reqwest::Client::new();
        // Port 9 (discard) is essentially never listening on test hosts
        let length = probe_image_length(&client, "http://127.0.0.1:9/a.jpg", &settings()).await;
        assert_eq!(length, None);
    }

    #[tokio::test]
    async fn test_private_targets_skipped_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Length", "5"))
            .expect(0)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let strict = ProbeSettings {
            allow_private_hosts: false,
            ..settings()
        };
        let length = probe_image_length(&client, &format!("{}/a.jpg", server.uri()), &strict).await;
        assert_eq!(length, None);
    }

    #[tokio::test]
    async fn test_slow_hosts_cost_one_timeout_not_batches() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let items: Vec<NormalizedItem> = (0..50)
            .map(|i| item(&format!("item-{i}"), Some(format!("{}/img/{i}.jpg", server.uri()))))
            .collect();
        let fast = ProbeSettings {
            timeout: Duration::from_millis(400),
            ..settings()
        };

        let client = reqwest::Client::new();
        let started = std::time::Instant::now();
        let enriched = enrich(&client, items, &fast).await;
        let elapsed = started.elapsed();

        assert_eq!(enriched.len(), 50);
        assert!(enriched.iter().all(|e| e.image_length.is_none()));
        assert!(
            elapsed < Duration::from_millis(1200),
            "enrichment took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_enrich_preserves_order_and_skips_imageless_items() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/one.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Length", "100")
                    .set_body_bytes(vec![0u8; 100])
                    .set_delay(Duration::from_millis(150)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/two.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Length", "200")
                    .set_body_bytes(vec![0u8; 200]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let items = vec![
            item("first", Some(format!("{}/one.png", server.uri()))),
            item("no-image", None),
            item("second", Some(format!("{}/two.png", server.uri()))),
        ];

        let client = reqwest::Client::new();
        let enriched = enrich(&client, items, &settings()).await;

        let summary: Vec<(&str, Option<u64>)> = enriched
            .iter()
            .map(|e| (e.item.link.as_str(), e.image_length))
            .collect();
        assert_eq!(
            summary,
            vec![("first", Some(100)), ("no-image", None), ("second", Some(200))]
        );
    }
}
