//! Library-shaped representation of a parsed upstream feed.
//!
//! Fields mirror what upstream markup actually carries: everything is
//! optional, and media references keep the shape they were declared in so
//! the image resolver can branch on it explicitly.

/// A parsed source feed: its declared website link plus items in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeed {
    /// The feed's own link (RSS `channel/link`, Atom alternate link).
    pub link: Option<String>,
    pub items: Vec<RawFeedItem>,
}

/// One upstream item, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    /// Plain-text rendering of the HTML description.
    pub content_snippet: Option<String>,
    pub summary: Option<String>,
    /// HTML description (Atom: content body).
    pub content: Option<String>,
    /// `content:encoded`
    pub content_encoded: Option<String>,
    /// ISO-8601 form of the publish date, when the source date parsed.
    pub iso_date: Option<String>,
    /// Raw `pubDate` text.
    pub pub_date: Option<String>,
    /// Raw `dc:date` text.
    pub dc_date: Option<String>,
    pub enclosure: Option<Enclosure>,
    pub media_thumbnail: Option<ThumbnailRef>,
    pub media_content: Option<MediaContentRef>,
    pub cover_image: Option<String>,
    pub featured_image: Option<String>,
    /// Item-level `<image>` text.
    pub item_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: Option<String>,
    pub length: Option<u64>,
}

/// `media:thumbnail` as declared upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailRef {
    /// Bare URL as element text.
    Scalar(String),
    /// URL carried in the `url` attribute.
    Structured { url: String },
}

impl ThumbnailRef {
    pub fn url(&self) -> &str {
        match self {
            ThumbnailRef::Scalar(url) => url,
            ThumbnailRef::Structured { url } => url,
        }
    }
}

/// Attribute bag of one `media:content` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaAttrs {
    pub url: Option<String>,
    pub medium: Option<String>,
    pub mime_type: Option<String>,
}

/// `media:content` as declared upstream: one element, or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaContentRef {
    Single(MediaAttrs),
    ArrayOf(Vec<MediaAttrs>),
}

impl MediaContentRef {
    /// Builds the reference from every `media:content` element of an item.
    pub fn from_elements(mut elements: Vec<MediaAttrs>) -> Option<Self> {
        match elements.len() {
            0 => None,
            1 => elements.pop().map(MediaContentRef::Single),
            _ => Some(MediaContentRef::ArrayOf(elements)),
        }
    }

    /// URL of the referenced media.
    ///
    /// For several elements only the first one is consulted; a first element
    /// without a `url` attribute yields `None`.
    pub fn url(&self) -> Option<&str> {
        match self {
            MediaContentRef::Single(attrs) => attrs.url.as_deref(),
            MediaContentRef::ArrayOf(elements) => elements.first()?.url.as_deref(),
        }
    }
}
