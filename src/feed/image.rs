//! Picks the single best image for an item and makes it absolute.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::feed::raw::RawFeedItem;

static IMG_SRC_PATTERN: OnceLock<Regex> = OnceLock::new();

fn img_src_pattern() -> &'static Regex {
    IMG_SRC_PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("img pattern compiles")
    })
}

/// `src` of the first `<img>` tag in an HTML fragment.
pub fn first_img_src(html: &str) -> Option<&str> {
    img_src_pattern()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Image candidates of an item, in precedence order:
///
/// 1. enclosure URL
/// 2. `media:thumbnail` (bare text or `url` attribute)
/// 3. `media:content` (first element when there are several)
/// 4. custom fields: cover, featured, item-level image
/// 5. first `<img src>` in `content:encoded`, then in the HTML description
///
/// Empty values are never candidates.
pub fn image_candidates(item: &RawFeedItem) -> impl Iterator<Item = &str> {
    let enclosure = item.enclosure.as_ref().map(|e| e.url.as_str());
    let thumbnail = item.media_thumbnail.as_ref().map(|t| t.url());
    let media = item.media_content.as_ref().and_then(|m| m.url());
    let custom = [
        item.cover_image.as_deref(),
        item.featured_image.as_deref(),
        item.item_image.as_deref(),
    ];
    let inline = [
        item.content_encoded.as_deref().and_then(first_img_src),
        item.content.as_deref().and_then(first_img_src),
    ];

    [enclosure, thumbnail, media]
        .into_iter()
        .chain(custom)
        .chain(inline)
        .flatten()
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
}

/// Resolves a possibly relative URL against the feed's base link.
///
/// With no usable base only already-absolute URLs resolve.
pub fn to_absolute(candidate: &str, base: Option<&Url>) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(candidate),
        None => Url::parse(candidate),
    };
    resolved.ok().map(String::from)
}

/// Chooses the item image and returns it as an absolute URL.
///
/// The first candidate that resolves wins. A candidate that cannot be made
/// absolute is skipped and the next tier is tried, so a malformed enclosure
/// URL does not hide a perfectly good thumbnail.
pub fn resolve_image(item: &RawFeedItem, base: Option<&Url>) -> Option<String> {
    image_candidates(item).find_map(|candidate| {
        let resolved = to_absolute(candidate, base);
        if resolved.is_none() {
            tracing::debug!(candidate = %candidate, "Skipping unresolvable image URL");
        }
        resolved
    })
}
