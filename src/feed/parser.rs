use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::feed::dates::{parse_timestamp, to_iso_date};
use crate::feed::raw::{
    Enclosure, MediaAttrs, MediaContentRef, RawFeed, RawFeedItem, ThumbnailRef,
};
use crate::util::{decode_entities, strip_html};

/// SEC-003: Maximum element nesting depth accepted in a feed document.
const MAX_FEED_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Not RSS, and `feed-rs` could not read it as Atom or JSON Feed either.
    #[error("Unrecognized feed format: {0}")]
    Unrecognized(String),

    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// Parses feed bytes into a [`RawFeed`].
///
/// RSS 2.0 and RSS 1.0 (RDF) documents are read directly with `quick-xml`
/// so that namespaced extension fields (`media:*`, `content:encoded`,
/// `dc:date`, enclosures, custom image fields) keep their declared shape.
/// Any other document is handed to `feed-rs` (Atom, JSON Feed) and mapped
/// onto the same item shape.
///
/// # Errors
///
/// - [`ParseError::Xml`] - malformed XML in an RSS document
/// - [`ParseError::MaxDepthExceeded`] - pathologically nested markup
/// - [`ParseError::Unrecognized`] - neither RSS nor anything `feed-rs` reads
pub fn parse_feed(bytes: &[u8]) -> Result<RawFeed, ParseError> {
    match parse_rss(bytes)? {
        Some(feed) => Ok(feed),
        None => parse_with_feed_rs(bytes),
    }
}

fn is_rss_root(name: &[u8]) -> bool {
    matches!(name, b"rss" | b"rdf:RDF")
}

/// Streams an RSS document. Returns `Ok(None)` when the root element is not
/// an RSS root, leaving the bytes to the fallback parser.
fn parse_rss(bytes: &[u8]) -> Result<Option<RawFeed>, ParseError> {
    // SEC-002: XXE protection. quick-xml (0.37) never parses <!ENTITY> declarations.
    // Text is decoded by `decode_entities`, which only knows a fixed entity table.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut text = String::new();
    let mut feed = RawFeed::default();
    let mut current: Option<ItemState> = None;
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::Xml(e.to_string()))?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if !saw_root {
                    if !is_rss_root(&name) {
                        return Ok(None);
                    }
                    saw_root = true;
                }
                if stack.len() >= MAX_FEED_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_FEED_DEPTH));
                }

                match current.as_mut() {
                    Some(state) => state.read_attributes(&e),
                    None if name == b"item" => current = Some(ItemState::new(stack.len() + 1)),
                    None => {}
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                if !saw_root {
                    return Ok(is_rss_root(e.name().as_ref()).then_some(feed));
                }
                if let Some(state) = current.as_mut() {
                    state.read_attributes(&e);
                }
            }
            Event::Text(e) => {
                let raw = String::from_utf8_lossy(&e);
                text.push_str(&decode_entities(&raw));
            }
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                let value = std::mem::take(&mut text);
                let value = value.trim();

                match current.as_ref().map(|state| state.depth) {
                    // </item>
                    Some(depth) if stack.len() < depth => {
                        if let Some(state) = current.take() {
                            feed.items.push(state.finish());
                        }
                    }
                    Some(depth) => {
                        if let Some(state) = current.as_mut() {
                            state.read_text(&name, value, stack.len() == depth);
                        }
                    }
                    None => {
                        let in_channel = stack.last().map(Vec::as_slice) == Some(b"channel".as_slice());
                        if name == b"link" && in_channel {
                            set_once(&mut feed.link, value);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(saw_root.then_some(feed))
}

/// Accumulates one `<item>` while its children stream past.
struct ItemState {
    /// Stack depth of the `<item>` element itself.
    depth: usize,
    item: RawFeedItem,
    media: Vec<MediaAttrs>,
}

impl ItemState {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            item: RawFeedItem::default(),
            media: Vec::new(),
        }
    }

    /// Media elements are honored at any depth inside the item so that
    /// `media:group` wrappers are transparent.
    fn read_attributes(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"enclosure" => {
                if self.item.enclosure.is_none() {
                    if let Some(url) = attribute(e, b"url") {
                        self.item.enclosure = Some(Enclosure {
                            url,
                            mime_type: attribute(e, b"type"),
                            length: attribute(e, b"length").and_then(|l| l.parse().ok()),
                        });
                    }
                }
            }
            b"media:content" => self.media.push(MediaAttrs {
                url: attribute(e, b"url"),
                medium: attribute(e, b"medium"),
                mime_type: attribute(e, b"type"),
            }),
            b"media:thumbnail" => {
                if self.item.media_thumbnail.is_none() {
                    if let Some(url) = attribute(e, b"url") {
                        self.item.media_thumbnail = Some(ThumbnailRef::Structured { url });
                    }
                }
            }
            _ => {}
        }
    }

    fn read_text(&mut self, name: &[u8], value: &str, direct_child: bool) {
        if value.is_empty() {
            return;
        }
        let item = &mut self.item;

        if name == b"media:thumbnail" {
            if item.media_thumbnail.is_none() {
                item.media_thumbnail = Some(ThumbnailRef::Scalar(value.to_string()));
            }
            return;
        }
        if !direct_child {
            return;
        }

        let slot = match name {
            b"title" => &mut item.title,
            b"link" => &mut item.link,
            b"guid" => &mut item.guid,
            b"description" => &mut item.content,
            b"content:encoded" => &mut item.content_encoded,
            b"summary" | b"itunes:summary" => &mut item.summary,
            b"pubDate" => &mut item.pub_date,
            b"dc:date" => &mut item.dc_date,
            b"cover" | b"coverImage" | b"cover_image" => &mut item.cover_image,
            b"featuredImage" | b"featured_image" => &mut item.featured_image,
            b"image" => &mut item.item_image,
            _ => return,
        };
        set_once(slot, value);
    }

    fn finish(self) -> RawFeedItem {
        let mut item = self.item;

        item.content_snippet = item
            .content
            .as_deref()
            .or(item.content_encoded.as_deref())
            .map(strip_html)
            .filter(|s| !s.is_empty());

        item.iso_date = item
            .pub_date
            .as_deref()
            .or(item.dc_date.as_deref())
            .and_then(parse_timestamp)
            .map(|dt| to_iso_date(&dt));

        item.media_content = MediaContentRef::from_elements(self.media);
        item
    }
}

/// First occurrence wins; empty values never fill a slot.
fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

/// Reads a trimmed, entity-decoded attribute value. Empty values count as absent.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| {
            let raw = String::from_utf8_lossy(&attr.value);
            decode_entities(&raw).trim().to_string()
        })
        .filter(|v| !v.is_empty())
}

fn parse_with_feed_rs(bytes: &[u8]) -> Result<RawFeed, ParseError> {
    let feed =
        feed_rs::parser::parse(bytes).map_err(|e| ParseError::Unrecognized(e.to_string()))?;

    Ok(RawFeed {
        link: alternate_link(&feed.links),
        items: feed.entries.into_iter().map(entry_to_raw).collect(),
    })
}

fn alternate_link(links: &[feed_rs::model::Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

fn entry_to_raw(entry: feed_rs::model::Entry) -> RawFeedItem {
    let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);

    let summary = entry.summary.map(|t| t.content).and_then(non_empty);
    let content = entry.content.and_then(|c| c.body).and_then(non_empty);
    let content_snippet = content
        .as_deref()
        .or(summary.as_deref())
        .map(strip_html)
        .filter(|s| !s.is_empty());

    let media_thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.trim())
        .find(|uri| !uri.is_empty())
        .map(|uri| ThumbnailRef::Structured {
            url: uri.to_string(),
        });

    let media_elements: Vec<MediaAttrs> = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .map(|c| MediaAttrs {
            url: c.url.as_ref().map(|u| u.to_string()),
            medium: None,
            mime_type: c.content_type.as_ref().map(|m| m.to_string()),
        })
        .collect();

    RawFeedItem {
        title: entry.title.map(|t| t.content).and_then(non_empty),
        link: alternate_link(&entry.links),
        guid: non_empty(entry.id),
        content_snippet,
        summary,
        content,
        iso_date: entry.published.or(entry.updated).map(|dt| to_iso_date(&dt)),
        media_thumbnail,
        media_content: MediaContentRef::from_elements(media_elements),
        ..Default::default()
    }
}
