use crate::UrlError;
use url::Url;

/// Extracts the domain (lowercase host) from a parsed URL.
///
/// Returns `None` if the URL has no host, which cannot happen for URLs that
/// passed normalization.
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the domain from a URL string.
///
/// This is the aggregation key for `DomainStats`: every normalized URL maps
/// to exactly one domain.
///
/// # Examples
///
/// ```
/// use linkdex::url::domain_of;
///
/// assert_eq!(domain_of("https://blog.example.com/post").unwrap(), "blog.example.com");
/// ```
pub fn domain_of(url_str: &str) -> Result<String, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    extract_domain(&url).ok_or(UrlError::MissingDomain)
}
