//! Utility functions shared by the parser, resolver and serializer.
//!
//! - **URL validation**: SSRF guard applied before probing image URLs taken
//!   from untrusted feed content
//! - **Text processing**: HTML-to-snippet conversion, entity decoding, and
//!   stripping of characters XML 1.0 cannot carry
//!
//! # Examples
//!
//! ```
//! use unifeed::util::{strip_html, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(strip_html("<p>Hi</p>"), "Hi");
//! ```

mod text;
mod url_validator;

pub use text::{decode_entities, sanitize_xml_text, strip_html};
pub use url_validator::{validate_url, UrlValidationError};
