use crate::UrlError;
use url::Url;

/// Query parameters that carry tracking state rather than page identity.
/// They are stripped so the same logical page maps to one index row.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Normalizes a URL string into the canonical identity used by the index.
///
/// Rules, applied in order:
///
/// 1. Parse; reject anything that is not http or https.
/// 2. Upgrade http to https.
/// 3. Lowercase the host and strip a leading `www.`.
/// 4. Collapse the path: drop `.` segments and duplicate slashes, resolve
///    `..`, and remove the trailing slash everywhere except the root.
/// 5. Drop the fragment.
/// 6. Drop tracking query parameters and sort the survivors by key; an empty
///    query is removed entirely.
///
/// The result is idempotent: `normalize_url(normalize_url(s)?)` returns the
/// same string.
///
/// # Examples
///
/// ```
/// use linkdex::url::normalize_url;
///
/// let url = normalize_url("http://WWW.Example.COM/a/../b/?fbclid=x#top").unwrap();
/// assert_eq!(url, "https://example.com/b");
/// ```
pub fn normalize_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "https" => {}
        "http" => {
            // Cannot fail for http/https URLs
            url.set_scheme("https")
                .map_err(|_| UrlError::Malformed(url_str.to_string()))?;
        }
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("{}: {}", url_str, e)))?;

    let path = collapse_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = surviving_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
    }

    Ok(String::from(url))
}

/// Collapses a URL path: no dot segments, no duplicate slashes, no trailing
/// slash except at the root.
fn collapse_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Returns the non-tracking query parameters of a URL, sorted by key.
fn surviving_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_upgraded_to_https() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result, "https://example.com/page");
    }

    #[test]
    fn test_host_lowercased_and_www_stripped() {
        let result = normalize_url("https://WWW.Example.COM/page").unwrap();
        assert_eq!(result, "https://example.com/page");
    }

    #[test]
    fn test_trailing_slash_removed_except_root() {
        assert_eq!(
            normalize_url("https://example.com/page/").unwrap(),
            "https://example.com/page"
        );
        assert_eq!(
            normalize_url("https://example.com/").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("https://example.com").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_dot_segments_and_duplicate_slashes() {
        assert_eq!(
            normalize_url("https://example.com/a/../b/./c").unwrap(),
            "https://example.com/b/c"
        );
        assert_eq!(
            normalize_url("https://example.com///x//y/").unwrap(),
            "https://example.com/x/y"
        );
        assert_eq!(
            normalize_url("https://example.com/../page").unwrap(),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_fragment_removed() {
        assert_eq!(
            normalize_url("https://example.com/page#section").unwrap(),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_tracking_params_removed_and_rest_sorted() {
        assert_eq!(
            normalize_url("https://example.com/p?b=2&utm_source=x&a=1&fbclid=y").unwrap(),
            "https://example.com/p?a=1&b=2"
        );
        assert_eq!(
            normalize_url("https://example.com/p?utm_anything=v&gclid=z").unwrap(),
            "https://example.com/p"
        );
    }

    #[test]
    fn test_path_case_preserved() {
        assert_eq!(
            normalize_url("https://example.com/Page").unwrap(),
            "https://example.com/Page"
        );
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        let result = normalize_url("ftp://example.com/file");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(normalize_url("not a url").is_err());
        assert!(normalize_url("").is_err());
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "http://WWW.EXAMPLE.COM/a/../b/?utm_source=t&z=1&a=2#frag",
            "https://example.com/",
            "https://sub.example.com/deep/path?q=1",
            "https://example.com///x//",
        ];
        for input in inputs {
            let once = normalize_url(input).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "normalization of {} is not idempotent", input);
        }
    }
}
