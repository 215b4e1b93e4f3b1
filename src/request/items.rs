//! Classification of request items
//!
//! Every positional token after the URL is one of:
//! - `key:=json`   raw JSON field (`key:=@file.json` loads a document)
//! - `Name:value`  header (`Host` overrides the target host)
//! - `field@path`  file upload, form mode only
//! - `key=value`   query/form param or typed JSON field (`key=@file` reads the value)
//!
//! Precedence is fixed and the first match wins, so `a=http://host` is a
//! header named `a=http` and `a:b:=1` is a raw field named `a:b`. An upload
//! key never holds an unescaped `=`, which keeps `email=a@b.com` a param.
//! Prefix a delimiter with `\` to make it literal.

use serde_json::value::RawValue;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::models::{BodyMode, HttpMethod, JsonField};
use crate::request::coerce::coerce;

#[derive(Clone, Debug)]
pub enum ItemKind {
    Header { name: String, value: String },
    JsonRawField { key: String, value: JsonField },
    TypedField { key: String, value: Value },
    FileUpload { field: String, path: PathBuf },
    Param { key: String, value: String },
}

/// Decides the kind of each item for one request
#[derive(Clone, Copy, Debug)]
pub struct ItemClassifier {
    mode: BodyMode,
    method: HttpMethod,
}

impl ItemClassifier {
    pub fn new(mode: BodyMode, method: HttpMethod) -> Self {
        ItemClassifier { mode, method }
    }

    pub fn classify(&self, token: &str) -> Result<ItemKind> {
        if let Some((key, rhs)) = split_item(token, ":=", &[]) {
            let value = match rhs.strip_prefix('@') {
                Some(path) => {
                    let content = read_file(path)?;
                    let doc: Value = serde_json::from_slice(&content)
                        .map_err(|e| Error::decode(format!("invalid JSON in {}", path), e))?;
                    JsonField::Value(doc)
                }
                None => {
                    let raw = RawValue::from_string(rhs.to_string()).map_err(|e| {
                        Error::decode(format!("invalid JSON value for field '{}'", key), e)
                    })?;
                    JsonField::Raw(raw)
                }
            };
            return Ok(ItemKind::JsonRawField { key, value });
        }

        if let Some((name, value)) = split_item(token, ":", &[]) {
            return Ok(ItemKind::Header {
                name,
                value: value.trim_start().to_string(),
            });
        }

        if let Some((field, path)) = split_item(token, "@", &['=']) {
            if self.mode != BodyMode::Form {
                return Err(Error::usage(format!(
                    "file upload only supported in form style, use --form: {}",
                    token
                )));
            }
            if path.is_empty() {
                return Err(Error::usage(format!("missing file path in item: {}", token)));
            }
            return Ok(ItemKind::FileUpload {
                field,
                path: PathBuf::from(path),
            });
        }

        if let Some((key, value)) = split_item(token, "=", &[]) {
            let value = match value.strip_prefix('@') {
                Some(path) => {
                    fs::read_to_string(path).map_err(|e| Error::io(path, e))?
                }
                None => unescape(value),
            };
            if self.routes_to_params() {
                return Ok(ItemKind::Param { key, value });
            }
            return Ok(ItemKind::TypedField {
                key,
                value: coerce(&value),
            });
        }

        Err(Error::usage(format!("malformed item: {}", token)))
    }

    fn routes_to_params(&self) -> bool {
        self.mode == BodyMode::Form || self.method == HttpMethod::GET
    }
}

/// True when `token` carries request data: an unescaped `=` or `@`
pub fn carries_payload(token: &str) -> bool {
    find_unescaped(token, "=").is_some() || find_unescaped(token, "@").is_some()
}

/// Split on the first unescaped `sep`. The key must be non-empty and free
/// of the `forbidden` delimiters.
fn split_item<'a>(token: &'a str, sep: &str, forbidden: &[char]) -> Option<(String, &'a str)> {
    let at = find_unescaped(token, sep)?;
    let key = &token[..at];
    if key.is_empty()
        || forbidden
            .iter()
            .any(|c| find_unescaped(key, c.encode_utf8(&mut [0; 4])).is_some())
    {
        return None;
    }
    Some((unescape(key), &token[at + sep.len()..]))
}

fn find_unescaped(s: &str, pat: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if s[i..].starts_with(pat) {
            return Some(i);
        }
    }
    None
}

fn unescape(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ':' | '=' | '@' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn json_mode() -> ItemClassifier {
        ItemClassifier::new(BodyMode::Json, HttpMethod::POST)
    }

    fn form_mode() -> ItemClassifier {
        ItemClassifier::new(BodyMode::Form, HttpMethod::POST)
    }

    fn temp_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_raw_json_field_keeps_literal() {
        let item = json_mode().classify("age:=30").unwrap();
        match item {
            ItemKind::JsonRawField { key, value } => {
                assert_eq!(key, "age");
                assert_eq!(serde_json::to_string(&value).unwrap(), "30");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_raw_json_field_from_file() {
        let file = temp_file(r#"{"tags": ["a", "b"]}"#);
        let token = format!("meta:=@{}", file.path().display());
        match json_mode().classify(&token).unwrap() {
            ItemKind::JsonRawField { key, value } => {
                assert_eq!(key, "meta");
                let parsed: Value = serde_json::to_value(&value).unwrap();
                assert_eq!(parsed, json!({"tags": ["a", "b"]}));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_raw_json_file_with_bad_json_is_fatal() {
        let file = temp_file("{not json");
        let token = format!("meta:=@{}", file.path().display());
        assert!(matches!(json_mode().classify(&token), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_invalid_raw_literal_is_fatal() {
        assert!(matches!(json_mode().classify("a:=[1,"), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_header_value_rejoins_colons() {
        match json_mode().classify("X-Time:12:30:00").unwrap() {
            ItemKind::Header { name, value } => {
                assert_eq!(name, "X-Time");
                assert_eq!(value, "12:30:00");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_file_upload_requires_form_mode() {
        let err = json_mode().classify("avatar@/tmp/me.png").unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("form style"));

        match form_mode().classify("avatar@/tmp/me.png").unwrap() {
            ItemKind::FileUpload { field, path } => {
                assert_eq!(field, "avatar");
                assert_eq!(path, PathBuf::from("/tmp/me.png"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_param_is_typed_in_json_mode() {
        match json_mode().classify("count=42").unwrap() {
            ItemKind::TypedField { key, value } => {
                assert_eq!(key, "count");
                assert_eq!(value, json!(42));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_param_stays_string_for_get_and_form() {
        let get = ItemClassifier::new(BodyMode::Json, HttpMethod::GET);
        for classifier in [get, form_mode()] {
            match classifier.classify("count=42").unwrap() {
                ItemKind::Param { key, value } => {
                    assert_eq!(key, "count");
                    assert_eq!(value, "42");
                }
                other => panic!("unexpected kind: {:?}", other),
            }
        }
    }

    #[test]
    fn test_param_value_from_file() {
        let file = temp_file("hello from disk");
        let token = format!("note=@{}", file.path().display());
        match json_mode().classify(&token).unwrap() {
            ItemKind::TypedField { value, .. } => assert_eq!(value, json!("hello from disk")),
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_missing_param_file_is_io_error() {
        let err = json_mode().classify("note=@/definitely/not/here").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_malformed_item_is_rejected() {
        assert!(matches!(json_mode().classify("justaword"), Err(Error::Usage(_))));
        assert!(matches!(json_mode().classify("=value"), Err(Error::Usage(_))));
    }

    fn header(token: &str) -> (String, String) {
        match form_mode().classify(token).unwrap() {
            ItemKind::Header { name, value } => (name, value),
            other => panic!("{} is not a header: {:?}", token, other),
        }
    }

    #[test]
    fn test_tokens_with_several_delimiters() {
        // ':=' is checked before ':'
        match json_mode().classify("a:b:=1").unwrap() {
            ItemKind::JsonRawField { key, value } => {
                assert_eq!(key, "a:b");
                assert_eq!(serde_json::to_string(&value).unwrap(), "1");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
        match json_mode().classify("a=b:=1").unwrap() {
            ItemKind::JsonRawField { key, .. } => assert_eq!(key, "a=b"),
            other => panic!("unexpected kind: {:?}", other),
        }

        // any unescaped ':' makes a header, the rest is rejoined
        assert_eq!(header("k:v1:v2"), ("k".into(), "v1:v2".into()));
        assert_eq!(
            header("key@path:notaheader"),
            ("key@path".into(), "notaheader".into())
        );
        assert_eq!(
            header("site=http://example.com"),
            ("site=http".into(), "//example.com".into())
        );
        assert_eq!(
            header("Authorization:Bearer a=b@c"),
            ("Authorization".into(), "Bearer a=b@c".into())
        );

        // an upload key never holds '='
        match json_mode().classify("email=bob@example.com").unwrap() {
            ItemKind::TypedField { key, value } => {
                assert_eq!(key, "email");
                assert_eq!(value, json!("bob@example.com"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_escaped_colon_keeps_param() {
        match form_mode().classify(r"site=http\://example.com").unwrap() {
            ItemKind::Param { key, value } => {
                assert_eq!(key, "site");
                assert_eq!(value, "http://example.com");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_escaped_delimiter_in_key() {
        match json_mode().classify(r"a\:b=c").unwrap() {
            ItemKind::TypedField { key, value } => {
                assert_eq!(key, "a:b");
                assert_eq!(value, json!("c"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_carries_payload() {
        assert!(carries_payload("a=1"));
        assert!(carries_payload("age:=30"));
        assert!(carries_payload("f@/tmp/x"));
        assert!(!carries_payload("Accept:text/plain"));
        assert!(!carries_payload(r"weird\=header:x"));
    }
}
