//! Response formatting - selects sections by print mask, re-indents JSON

use regex::Regex;
use std::io::Write;
use std::sync::OnceLock;

use crate::config::PrintMask;
use crate::constants::JSON_CONTENT_PATTERN;
use crate::error::{Error, Result};
use crate::models::{RequestBody, RequestSpec, ResponseHead};
use crate::output::color::Colorizer;

/// True for `application/json`, `application/problem+json` and friends
pub fn is_json_content_type(content_type: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(JSON_CONTENT_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(content_type))
}

/// Request line, Host and headers as they go on the wire
pub fn request_head(spec: &RequestSpec) -> String {
    let mut lines = vec![
        format!("{} {} HTTP/1.1", spec.method, spec.request_target()),
        format!("Host: {}", spec.host_header()),
    ];
    lines.extend(
        spec.headers
            .iter()
            .map(|h| format!("{}: {}", h.name, h.value)),
    );
    lines.join("\n")
}

/// Printable form of the request body, `None` when there is none
pub fn request_body(spec: &RequestSpec) -> Option<String> {
    match &spec.body {
        RequestBody::Empty => None,
        RequestBody::Json(bytes) | RequestBody::Raw(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        RequestBody::Form(fields) => Some(
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish(),
        ),
        RequestBody::Multipart { fields, files } => {
            let mut lines: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("[multipart] {}={}", k, v))
                .collect();
            lines.extend(files.iter().map(|f| {
                format!(
                    "[multipart] {}=@{} ({} bytes)",
                    f.field,
                    f.file_name,
                    f.content.len()
                )
            }));
            Some(lines.join("\n"))
        }
    }
}

/// Renders requests and responses for the terminal or a pipe
#[derive(Clone, Copy, Debug)]
pub struct ResponseFormatter {
    colorizer: Colorizer,
    mask: PrintMask,
    pretty: bool,
    interactive: bool,
}

impl ResponseFormatter {
    /// Colors are used only for interactive output
    pub fn new(mask: PrintMask, pretty: bool, interactive: bool) -> Self {
        ResponseFormatter {
            colorizer: Colorizer::new(interactive),
            mask,
            pretty,
            interactive,
        }
    }

    /// Re-indented JSON body, or `None` when the body is shown as received.
    /// A JSON response that doesn't parse is an error once pretty printing
    /// is on.
    pub fn indent_json(&self, head: &ResponseHead, body: &[u8]) -> Result<Option<String>> {
        if !self.pretty
            || !is_json_content_type(head.content_type())
            || body.iter().all(u8::is_ascii_whitespace)
        {
            return Ok(None);
        }
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| Error::decode("Response JSON indent", e))?;
        serde_json::to_string_pretty(&value)
            .map(Some)
            .map_err(|e| Error::decode("Response JSON indent", e))
    }

    /// Write the sections selected by the mask. Piped output gets the
    /// response body only, undecorated.
    pub fn write_exchange(
        &self,
        out: &mut dyn Write,
        spec: &RequestSpec,
        head: &ResponseHead,
        body: &[u8],
    ) -> Result<()> {
        if !self.interactive {
            match self.indent_json(head, body)? {
                Some(text) => out.write_all(text.as_bytes())?,
                None => out.write_all(body)?,
            }
            return Ok(());
        }

        self.write_request(out, spec)?;
        if self.mask.contains(PrintMask::RESPONSE_HEADERS) {
            self.write_response_head(out, head)?;
            writeln!(out)?;
        }
        if self.mask.contains(PrintMask::RESPONSE_BODY) {
            self.write_response_body(out, head, body)?;
        }
        Ok(())
    }

    pub fn write_request(&self, out: &mut dyn Write, spec: &RequestSpec) -> Result<()> {
        if self.mask.contains(PrintMask::REQUEST_HEADERS) {
            writeln!(out, "{}", self.colorizer.request_head(&request_head(spec)))?;
            writeln!(out)?;
        }
        if self.mask.contains(PrintMask::REQUEST_BODY) {
            if let Some(body) = request_body(spec) {
                writeln!(out, "{}", body)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    pub fn write_response_head(&self, out: &mut dyn Write, head: &ResponseHead) -> Result<()> {
        writeln!(out, "{}", self.colorizer.status_line(head))?;
        for header in head.headers.iter() {
            writeln!(out, "{}", self.colorizer.header(&header.name, &header.value))?;
        }
        Ok(())
    }

    pub fn write_response_body(
        &self,
        out: &mut dyn Write,
        head: &ResponseHead,
        body: &[u8],
    ) -> Result<()> {
        let text = match self.indent_json(head, body)? {
            Some(text) => self.colorizer.json(&text),
            None if is_json_content_type(head.content_type()) => {
                self.colorizer.json(&String::from_utf8_lossy(body))
            }
            None => self.colorizer.text(&String::from_utf8_lossy(body)),
        };
        writeln!(out, "{}", text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyMode, HttpMethod};
    use crate::request::RequestBuilder;
    use crossterm::style::Stylize;
    use url::Url;

    fn json_head() -> ResponseHead {
        ResponseHead {
            version: "HTTP/1.1".into(),
            status: 200,
            reason: "OK".into(),
            headers: [("Content-Type", "application/json; charset=utf-8")]
                .into_iter()
                .collect(),
        }
    }

    fn spec() -> RequestSpec {
        let url = Url::parse("http://example.com/users?x=1").unwrap();
        RequestBuilder::new(HttpMethod::POST, url, BodyMode::Json)
            .tokens(&["name=bob", "X-Trace:abc"])
            .unwrap()
            .build()
            .unwrap()
    }

    fn render(formatter: &ResponseFormatter, body: &[u8]) -> Result<String> {
        let mut out = Vec::new();
        formatter.write_exchange(&mut out, &spec(), &json_head(), body)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_json_content_type_pattern() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/vnd.api+json; charset=utf-8"));
        assert!(!is_json_content_type("text/html"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn test_pretty_body_uses_two_spaces_and_keeps_order() {
        let formatter = ResponseFormatter::new(PrintMask::all(), true, false);
        let text = formatter
            .indent_json(&json_head(), br#"{"z":1,"a":[true]}"#)
            .unwrap();
        assert_eq!(
            text.as_deref(),
            Some("{\n  \"z\": 1,\n  \"a\": [\n    true\n  ]\n}")
        );
    }

    #[test]
    fn test_malformed_json_response_is_fatal_when_pretty() {
        let formatter = ResponseFormatter::new(PrintMask::all(), true, false);
        let err = formatter.indent_json(&json_head(), b"{oops").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));

        let formatter = ResponseFormatter::new(PrintMask::all(), false, false);
        assert_eq!(formatter.indent_json(&json_head(), b"{oops").unwrap(), None);
        assert_eq!(render(&formatter, b"{oops").unwrap(), "{oops");
    }

    fn png_head() -> ResponseHead {
        ResponseHead {
            version: "HTTP/1.1".into(),
            status: 200,
            reason: "OK".into(),
            headers: [("Content-Type", "image/png")].into_iter().collect(),
        }
    }

    #[test]
    fn test_piped_binary_body_is_written_byte_for_byte() {
        let body = [137u8, 80, 78, 71, 255, 0];
        let formatter = ResponseFormatter::new(PrintMask::all(), true, false);
        let mut out = Vec::new();
        formatter
            .write_exchange(&mut out, &spec(), &png_head(), &body)
            .unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_interactive_text_body_is_green() {
        let formatter = ResponseFormatter::new(PrintMask::parse("b"), true, true);
        let head = ResponseHead {
            headers: [("Content-Type", "text/html")].into_iter().collect(),
            ..png_head()
        };
        let mut out = Vec::new();
        formatter
            .write_exchange(&mut out, &spec(), &head, b"<p>hi</p>")
            .unwrap();
        let expected = format!("{}\n", "<p>hi</p>".green());
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_piped_output_is_body_only_without_escapes() {
        let formatter = ResponseFormatter::new(PrintMask::all(), true, false);
        let out = render(&formatter, br#"{"id":7}"#).unwrap();
        assert_eq!(out, "{\n  \"id\": 7\n}");
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn test_interactive_output_follows_mask() {
        let formatter = ResponseFormatter::new(PrintMask::parse("hb"), true, true);
        let out = render(&formatter, br#"{"id":7}"#).unwrap();
        assert!(!out.contains("X-Trace"));
        assert!(out.contains("HTTP/1.1"));
        assert!(out.contains("Content-Type"));
        assert!(out.contains("\"id\""));

        let formatter = ResponseFormatter::new(PrintMask::parse("HB"), true, true);
        let out = render(&formatter, br#"{"id":7}"#).unwrap();
        assert!(out.contains("X-Trace"));
        assert!(out.contains("/users?x=1"));
        assert!(out.contains(r#"{"name":"bob"}"#));
        assert!(!out.contains("\"id\""));
    }

    #[test]
    fn test_request_head_dump() {
        let head = request_head(&spec());
        let mut lines = head.lines();
        assert_eq!(lines.next(), Some("POST /users?x=1 HTTP/1.1"));
        assert_eq!(lines.next(), Some("Host: example.com"));
        assert!(head.contains("X-Trace: abc"));
        assert!(head.contains("Content-Type: application/json"));
    }

    #[test]
    fn test_form_body_dump_is_urlencoded() {
        let url = Url::parse("http://example.com/").unwrap();
        let spec = RequestBuilder::new(HttpMethod::POST, url, BodyMode::Form)
            .tokens(&["q=a b", "n=1"])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request_body(&spec).as_deref(), Some("q=a+b&n=1"));
    }
}
