use chrono::{DateTime, Utc};
use url::Url;

use crate::feed::dates::parse_timestamp;
use crate::feed::image::resolve_image;
use crate::feed::raw::RawFeedItem;

/// Canonical item shape shared by every source.
///
/// Only `image` may be absent; text fields fall back to the empty string and
/// `published_at` falls back to the moment the request was processed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub title: String,
    /// Doubles as the item guid.
    pub link: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    /// Absolute image URL.
    pub image: Option<String>,
}

fn first_non_empty<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

/// Normalizes one upstream item.
///
/// - `title`: as given, or empty
/// - `link`: link, else guid, else empty
/// - `description`: first non-empty of snippet, summary, HTML description,
///   `content:encoded`
/// - `published_at`: first non-empty of ISO date, `pubDate`, `dc:date`;
///   `now` when none is present or the chosen one does not parse
/// - `image`: see [`resolve_image`]
///
/// `base` is the source feed's link (or the source URL when the feed
/// declares none), used to make relative image URLs absolute.
pub fn normalize_item(raw: &RawFeedItem, base: Option<&Url>, now: DateTime<Utc>) -> NormalizedItem {
    let title = first_non_empty([raw.title.as_deref()]).unwrap_or_default();
    let link = first_non_empty([raw.link.as_deref(), raw.guid.as_deref()]).unwrap_or_default();
    let description = first_non_empty([
        raw.content_snippet.as_deref(),
        raw.summary.as_deref(),
        raw.content.as_deref(),
        raw.content_encoded.as_deref(),
    ])
    .unwrap_or_default();

    let published_at = first_non_empty([
        raw.iso_date.as_deref(),
        raw.pub_date.as_deref(),
        raw.dc_date.as_deref(),
    ])
    .and_then(parse_timestamp)
    .unwrap_or(now);

    NormalizedItem {
        title: title.to_string(),
        link: link.to_string(),
        description: description.to_string(),
        published_at,
        image: resolve_image(raw, base),
    }
}

/// Normalizes every item of one source against that source's base link.
pub fn normalize_items(items: &[RawFeedItem], base: &str, now: DateTime<Utc>) -> Vec<NormalizedItem> {
    let base_url = match Url::parse(base) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!(base = %base, error = %e, "Unparsable base link, relative images will be dropped");
            None
        }
    };

    items
        .iter()
        .map(|raw| normalize_item(raw, base_url.as_ref(), now))
        .collect()
}
