use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Reasons a URL is refused as an outbound request target.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(IpAddr),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL before the server issues a request to it.
///
/// Image URLs are lifted from third-party feed markup, so probing them
/// blindly would let any upstream feed make this server call into its own
/// network. Rejects:
/// - schemes other than `http` and `https`
/// - `localhost` and loopback addresses
/// - private, link-local, unique-local and unspecified addresses
///
/// Hostnames are not resolved; only literal IP hosts are range-checked.
///
/// # Examples
///
/// ```
/// use unifeed::util::validate_url;
///
/// assert!(validate_url("https://cdn.example.com/a.jpg").is_ok());
/// assert!(validate_url("http://localhost/a.jpg").is_err());
/// assert!(validate_url("http://10.1.2.3/a.jpg").is_err());
/// assert!(validate_url("data:image/png;base64,AAAA").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    match url.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            return Err(UrlValidationError::Localhost);
        }
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
        _ => {}
    }

    Ok(url)
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    if is_private_ip(&ip) {
        return Err(UrlValidationError::PrivateIp(ip));
    }
    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
