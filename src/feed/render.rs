//! Single-pass RSS 2.0 serialization of the merged item list.

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;
use url::Url;

use crate::config::{ChannelConfig, RenderConfig};
use crate::feed::dates::{to_iso_date, to_wire_date};
use crate::feed::enrich::EnrichedItem;
use crate::util::sanitize_xml_text;

const NS_MEDIA: &str = "http://search.yahoo.com/mrss/";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_CONTENT: &str = "http://purl.org/rss/1.0/modules/content/";
const NS_ATOM: &str = "http://www.w3.org/2005/Atom";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write XML: {0}")]
    Xml(String),

    #[error("Generated document contains invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Indented output when set, a single line otherwise.
    pub pretty: bool,
    pub render: RenderConfig,
}

/// MIME type for an image URL, inferred from its path extension.
///
/// Unknown or missing extensions map to `image/jpeg`.
pub fn mime_for(url: &str) -> &'static str {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase(),
    };

    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.contains('/'));

    match extension {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        _ => "image/jpeg",
    }
}

/// Wraps text in CDATA, splitting the section wherever the text itself
/// contains `]]>`.
fn cdata_section(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

struct RssWriter {
    writer: Writer<Vec<u8>>,
}

impl RssWriter {
    fn new(pretty: bool) -> Self {
        let writer = if pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        Self { writer }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        self.writer
            .write_event(event)
            .map_err(|e| RenderError::Xml(e.to_string()))
    }

    fn start(&mut self, element: BytesStart<'_>) -> Result<(), RenderError> {
        self.event(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> Result<(), RenderError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), RenderError> {
        let mut element = BytesStart::new(name);
        for &(key, value) in attributes {
            element.push_attribute((key, sanitize_xml_text(value).as_ref()));
        }
        self.event(Event::Empty(element))
    }

    /// `<name>text</name>` with the five XML specials escaped.
    fn text_element(&mut self, name: &str, text: &str) -> Result<(), RenderError> {
        self.text_element_with(BytesStart::new(name), text)
    }

    fn text_element_with(&mut self, element: BytesStart<'_>, text: &str) -> Result<(), RenderError> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        self.start(element)?;
        let clean = sanitize_xml_text(text);
        self.event(Event::Text(BytesText::from_escaped(escape(clean.as_ref()))))?;
        self.end(&name)
    }

    /// `<name><![CDATA[text]]></name>`; the body is not escaped.
    fn cdata_element(&mut self, name: &str, text: &str) -> Result<(), RenderError> {
        self.start(BytesStart::new(name))?;
        let section = cdata_section(&sanitize_xml_text(text));
        self.event(Event::Text(BytesText::from_escaped(section)))?;
        self.end(name)
    }

    fn finish(self) -> Result<String, RenderError> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}

/// Serializes the channel and its items into an RSS 2.0 document.
///
/// `now` is used as `lastBuildDate` when there are no items.
pub fn render_rss(
    channel: &ChannelConfig,
    items: &[EnrichedItem],
    options: &RenderOptions,
    now: DateTime<Utc>,
) -> Result<String, RenderError> {
    let render = options.render;
    let uses_atom = channel.self_url.is_some() || channel.favicon.is_some();

    let mut w = RssWriter::new(options.pretty);
    w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    if render.media {
        rss.push_attribute(("xmlns:media", NS_MEDIA));
    }
    if render.dublin_core {
        rss.push_attribute(("xmlns:dc", NS_DC));
    }
    if render.content_encoded {
        rss.push_attribute(("xmlns:content", NS_CONTENT));
    }
    if uses_atom {
        rss.push_attribute(("xmlns:atom", NS_ATOM));
    }
    w.start(rss)?;
    w.start(BytesStart::new("channel"))?;

    w.text_element("title", &channel.title)?;
    w.text_element("link", &channel.link)?;
    w.text_element("description", &channel.description)?;
    w.text_element("language", "en")?;
    let last_build = items.first().map(|e| e.item.published_at).unwrap_or(now);
    w.text_element("lastBuildDate", &to_wire_date(&last_build))?;
    w.text_element("generator", &channel.generator)?;

    if let Some(self_url) = &channel.self_url {
        w.empty(
            "atom:link",
            &[
                ("href", self_url),
                ("rel", "self"),
                ("type", "application/rss+xml"),
            ],
        )?;
    }
    if let Some(image) = &channel.image {
        w.start(BytesStart::new("image"))?;
        w.text_element("url", image)?;
        w.text_element("title", &channel.title)?;
        w.text_element("link", &channel.link)?;
        w.end("image")?;
    }
    if let Some(favicon) = &channel.favicon {
        w.text_element("atom:icon", favicon)?;
    }

    for enriched in items {
        write_item(&mut w, enriched, &render)?;
    }

    w.end("channel")?;
    w.end("rss")?;
    w.finish()
}

fn write_item(w: &mut RssWriter, enriched: &EnrichedItem, render: &RenderConfig) -> Result<(), RenderError> {
    let item = &enriched.item;

    w.start(BytesStart::new("item"))?;
    w.text_element("title", &item.title)?;
    w.text_element("link", &item.link)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "true"));
    w.text_element_with(guid, &item.link)?;

    w.text_element("description", &item.description)?;
    w.text_element("pubDate", &to_wire_date(&item.published_at))?;

    if render.dublin_core {
        w.text_element("dc:date", &to_iso_date(&item.published_at))?;
    }

    if let Some(image) = item.image.as_deref() {
        let mime = mime_for(image);

        if render.enclosure {
            let length = enriched
                .image_length
                .filter(|&len| len > 0)
                .map(|len| len.to_string());
            let mut attributes = vec![("url", image), ("type", mime)];
            if let Some(length) = length.as_deref() {
                attributes.push(("length", length));
            }
            w.empty("enclosure", &attributes)?;
        }

        if render.media {
            w.empty(
                "media:content",
                &[("url", image), ("medium", "image"), ("type", mime)],
            )?;
            w.empty("media:thumbnail", &[("url", image)])?;
        }
    }

    if render.content_encoded {
        let body = match item.image.as_deref() {
            Some(image) if render.inline_image => format!(
                r#"<img src="{}" alt="{}"/>{}"#,
                escape(image),
                escape(item.title.as_str()),
                item.description
            ),
            _ => item.description.clone(),
        };
        w.cdata_element("content:encoded", &body)?;
    }

    w.end("item")
}
