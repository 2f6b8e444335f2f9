use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn tag_pattern() -> &'static Regex {
    TAG_PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern compiles"))
}

/// Decodes character and entity references in feed text.
///
/// SEC-002: only named HTML entities and numeric references are resolved;
/// no DTD-declared entity is ever expanded. Each reference is decoded on its
/// own, so an unknown one is kept verbatim without blocking the rest.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(s)
}

/// Renders an HTML fragment as a plain-text snippet.
///
/// Tags are removed, entities decoded, and runs of whitespace collapsed to a
/// single space. Used to derive the snippet form of an item's description.
///
/// # Examples
///
/// ```
/// use unifeed::util::strip_html;
///
/// assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_html("Fish &amp; chips"), "Fish & chips");
/// ```
pub fn strip_html(html: &str) -> String {
    let without_tags = tag_pattern().replace_all(html, " ");
    let decoded = decode_entities(&without_tags);
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strips characters that are not allowed anywhere in an XML 1.0 document.
///
/// Removes C0 control characters other than tab, newline and carriage
/// return, plus the noncharacters U+FFFE and U+FFFF. Feed text is
/// attacker-controlled; a single stray control byte would otherwise make the
/// whole merged document unparseable for every subscriber.
///
/// Returns `Cow::Borrowed` when the input is already clean (common case).
pub fn sanitize_xml_text(s: &str) -> Cow<'_, str> {
    let is_invalid = |c: char| {
        matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
    };

    if !s.chars().any(is_invalid) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(s.chars().filter(|&c| !is_invalid(c)).collect())
}
