//! Method inference and URL normalisation for `[METHOD] URL [ITEM ...]`

use url::Url;

use crate::constants::LOCALHOST;
use crate::error::{Error, Result};
use crate::models::HttpMethod;
use crate::request::items::carries_payload;

/// Positional arguments split into method, URL and items
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub method: HttpMethod,
    pub url: Url,
    pub items: Vec<String>,
}

/// Resolve the method and URL from positional arguments.
///
/// An explicit verb always wins. Without one the method is GET, or POST as
/// soon as any item carries data.
pub fn infer(args: &[String]) -> Result<Invocation> {
    let (explicit, rest) = match args.split_first() {
        Some((first, rest)) => match HttpMethod::parse(first) {
            Some(method) => (Some(method), rest),
            None => (None, args),
        },
        None => (None, args),
    };

    let (url, items) = rest
        .split_first()
        .ok_or_else(|| Error::usage("Miss the URL"))?;

    let method = explicit.unwrap_or_else(|| {
        if items.iter().any(|item| carries_payload(item)) {
            HttpMethod::POST
        } else {
            HttpMethod::GET
        }
    });

    Ok(Invocation {
        method,
        url: normalize_url(url)?,
        items: items.to_vec(),
    })
}

/// Expand `:` shorthands to localhost and default the scheme to http.
///
/// `:` → `http://localhost/`, `:3000/api` → `http://localhost:3000/api`,
/// `:/api` → `http://localhost/api`, `example.org` → `http://example.org`.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let mut url = match raw.strip_prefix(':') {
        Some("") => format!("{}/", LOCALHOST),
        Some(rest) if rest.starts_with('/') => format!("{}{}", LOCALHOST, rest),
        Some(_) => format!("{}{}", LOCALHOST, raw),
        None => raw.to_string(),
    };
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{}", url);
    }
    Url::parse(&url).map_err(|e| Error::usage(format!("malformed URL {}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_to_get() {
        let inv = infer(&args(&["example.com"])).unwrap();
        assert_eq!(inv.method, HttpMethod::GET);
        assert_eq!(inv.url.as_str(), "http://example.com/");
        assert!(inv.items.is_empty());
    }

    #[test]
    fn test_payload_promotes_to_post() {
        let inv = infer(&args(&["example.com", "a=1"])).unwrap();
        assert_eq!(inv.method, HttpMethod::POST);
        assert_eq!(inv.items, vec!["a=1"]);
    }

    #[test]
    fn test_headers_alone_stay_get() {
        let inv = infer(&args(&["example.com", "Accept:text/plain"])).unwrap();
        assert_eq!(inv.method, HttpMethod::GET);
    }

    #[test]
    fn test_explicit_verb_wins() {
        let inv = infer(&args(&["PUT", "example.com", "a=1"])).unwrap();
        assert_eq!(inv.method, HttpMethod::PUT);

        let inv = infer(&args(&["get", "example.com", "a=1"])).unwrap();
        assert_eq!(inv.method, HttpMethod::GET);
        assert_eq!(inv.items, vec!["a=1"]);
    }

    #[test]
    fn test_missing_url_is_usage_error() {
        assert!(matches!(infer(&[]), Err(Error::Usage(_))));
        assert!(matches!(infer(&args(&["DELETE"])), Err(Error::Usage(_))));
    }

    #[test]
    fn test_localhost_shorthand() {
        assert_eq!(normalize_url(":").unwrap().as_str(), "http://localhost/");
        assert_eq!(
            normalize_url(":3000/api").unwrap().as_str(),
            "http://localhost:3000/api"
        );
        assert_eq!(normalize_url(":/api").unwrap().as_str(), "http://localhost/api");
    }

    #[test]
    fn test_scheme_is_kept() {
        assert_eq!(
            normalize_url("https://example.com/x?y=1").unwrap().as_str(),
            "https://example.com/x?y=1"
        );
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(normalize_url("http://[::1"), Err(Error::Usage(_))));
    }
}
