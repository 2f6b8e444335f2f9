//! One full pipeline run, from configured sources to the merged document.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::feed::{
    enrich, fetch_all, merge, normalize_items, render_rss, FetchSettings, ProbeSettings,
    RenderError, RenderOptions,
};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Owns the shared HTTP client and the immutable configuration.
///
/// Cheap to clone; every clone shares the same connection pool.
#[derive(Clone)]
pub struct Aggregator {
    client: reqwest::Client,
    config: Arc<Config>,
}

impl Aggregator {
    pub fn new(config: Config) -> Result<Self, AggregateError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs fetch, normalize, merge, enrich and render once.
    ///
    /// Individual source and probe failures never surface here; the only
    /// error is a failure to serialize the document.
    pub async fn build_document(&self, pretty: bool) -> Result<String, AggregateError> {
        let config = &self.config;
        let now = Utc::now();

        let fetch_settings = FetchSettings {
            timeout: config.fetch_timeout(),
        };
        let sources = fetch_all(&self.client, &config.sources, &fetch_settings).await;

        let lists = sources
            .iter()
            .map(|source| normalize_items(&source.items, &source.base, now))
            .collect();
        let merged = merge(lists, config.max_items);

        let probe_settings = ProbeSettings {
            timeout: config.probe_timeout(),
            allow_private_hosts: config.probe_private_hosts,
        };
        let items = enrich(&self.client, merged, &probe_settings).await;

        tracing::info!(
            sources = sources.len(),
            empty_sources = sources.iter().filter(|s| s.items.is_empty()).count(),
            items = items.len(),
            "Merged feed built"
        );

        let options = RenderOptions {
            pretty,
            render: config.render,
        };
        Ok(render_rss(&config.channel, &items, &options, now)?)
    }
}
