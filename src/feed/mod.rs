//! Feed pipeline: fetch, normalize, merge, enrich, render.
//!
//! Each stage is a plain function over owned data so the stages compose
//! without shared state:
//!
//! - [`fetcher`] - concurrent retrieval of every source, failures isolated per source
//! - [`parser`] - RSS/RDF via `quick-xml`, Atom and JSON Feed via `feed-rs`
//! - [`normalize`] - canonical item shape, including [`image`] resolution
//! - [`merge`] - newest-first ordering with a fixed cap
//! - [`enrich`] - HEAD probes for image byte lengths
//! - [`render`] - RSS 2.0 serialization
//!
//! # Example
//!
//! ```ignore
//! let sources = fetch_all(&client, &config.sources, &fetch_settings).await;
//! let lists = sources
//!     .iter()
//!     .map(|source| normalize_items(&source.items, &source.base, now))
//!     .collect();
//! let items = enrich(&client, merge(lists, 50), &probe_settings).await;
//! let xml = render_rss(&config.channel, &items, &options, now)?;
//! ```

pub mod dates;
pub mod enrich;
pub mod fetcher;
pub mod image;
pub mod merge;
pub mod normalize;
pub mod parser;
pub mod raw;
pub mod render;

pub use enrich::{enrich, EnrichedItem, ProbeSettings};
pub use fetcher::{fetch_all, fetch_one, FetchError, FetchSettings, SourceFeed};
pub use merge::merge;
pub use normalize::{normalize_items, NormalizedItem};
pub use parser::{parse_feed, ParseError};
pub use raw::{RawFeed, RawFeedItem};
pub use render::{render_rss, RenderError, RenderOptions};
