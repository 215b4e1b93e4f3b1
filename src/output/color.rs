//! ANSI colorization of request dumps, response heads and JSON bodies

use crossterm::style::{Color, Stylize};

use crate::models::ResponseHead;

const KEY_COLOR: Color = Color::Magenta;
const LITERAL_COLOR: Color = Color::Cyan;
const HEADER_NAME_COLOR: Color = Color::DarkGrey;
const HEADER_VALUE_COLOR: Color = Color::Cyan;
const PROTOCOL_COLOR: Color = Color::Magenta;
const PATH_COLOR: Color = Color::Cyan;
const TEXT_COLOR: Color = Color::Green;

/// Status code color
pub fn status_color(code: u16) -> Color {
    match code {
        200..=299 => Color::Green,
        300..=399 => Color::Cyan,
        400..=499 => Color::Red,
        500..=599 => Color::Magenta,
        _ => Color::Yellow,
    }
}

/// Method color
pub fn method_color(method: &str) -> Color {
    match method {
        "GET" => Color::Green,
        "POST" => Color::Yellow,
        "PUT" => Color::Blue,
        "PATCH" => Color::Cyan,
        "DELETE" => Color::Red,
        _ => Color::White,
    }
}

/// Wraps tokens in color escapes, or passes text through untouched when
/// disabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Colorizer {
    enabled: bool,
}

impl Colorizer {
    pub fn new(enabled: bool) -> Self {
        Colorizer { enabled }
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled && !text.is_empty() {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Color the request line token by token and every `Name: value` line
    pub fn request_head(&self, dump: &str) -> String {
        let mut lines = dump.lines();
        let mut out = Vec::new();

        if let Some(request_line) = lines.next() {
            let mut parts = request_line.splitn(3, ' ');
            let method = parts.next().unwrap_or_default();
            let mut painted = vec![self.paint(method, method_color(method))];
            if let Some(path) = parts.next() {
                painted.push(self.paint(path, PATH_COLOR));
            }
            if let Some(protocol) = parts.next() {
                painted.push(self.paint(protocol, PROTOCOL_COLOR));
            }
            out.push(painted.join(" "));
        }

        for line in lines {
            match line.split_once(':') {
                Some((name, value)) => out.push(format!(
                    "{}:{}",
                    self.paint(name, HEADER_NAME_COLOR),
                    self.paint(value, HEADER_VALUE_COLOR)
                )),
                None => out.push(line.to_string()),
            }
        }
        out.join("\n")
    }

    pub fn status_line(&self, head: &ResponseHead) -> String {
        format!(
            "{} {}",
            self.paint(&head.version, PROTOCOL_COLOR),
            self.paint(&head.status_text(), status_color(head.status))
        )
    }

    pub fn header(&self, name: &str, value: &str) -> String {
        format!(
            "{}: {}",
            self.paint(name, HEADER_NAME_COLOR),
            self.paint(value, HEADER_VALUE_COLOR)
        )
    }

    /// Non-JSON body text
    pub fn text(&self, text: &str) -> String {
        self.paint(text, TEXT_COLOR)
    }

    /// Color object keys and literals of a JSON text, leaving punctuation
    /// and whitespace plain. Works on any layout, pretty or compact.
    pub fn json(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len() * 2);
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            let len = match c {
                '"' => {
                    let len = string_len(rest);
                    let after = rest[len..].trim_start();
                    let color = if after.starts_with(':') {
                        KEY_COLOR
                    } else {
                        LITERAL_COLOR
                    };
                    out.push_str(&self.paint(&rest[..len], color));
                    len
                }
                c if c == '-' || c.is_ascii_alphanumeric() => {
                    let len = rest
                        .find(|ch: char| !(ch.is_ascii_alphanumeric() || "+-.".contains(ch)))
                        .unwrap_or(rest.len());
                    out.push_str(&self.paint(&rest[..len], LITERAL_COLOR));
                    len
                }
                other => {
                    out.push(other);
                    other.len_utf8()
                }
            };
            rest = &rest[len..];
        }
        out
    }
}

/// Byte length of the string literal at the start of `s`, quotes included
fn string_len(s: &str) -> usize {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return i + 1;
        }
    }
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn strip(s: &str) -> String {
        Regex::new(r"\x1b\[[0-9;]*m").unwrap().replace_all(s, "").into_owned()
    }

    #[test]
    fn test_disabled_is_identity() {
        let c = Colorizer::new(false);
        let dump = "GET / HTTP/1.1\nHost: example.com";
        assert_eq!(c.request_head(dump), dump);
        assert_eq!(c.json(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(c.header("Server", "nginx"), "Server: nginx");
    }

    #[test]
    fn test_request_head_tokens() {
        let c = Colorizer::new(true);
        let dump = "POST /users?id=1 HTTP/1.1\nHost: example.com\nX-Time: 12:30";
        let colored = c.request_head(dump);
        assert_eq!(strip(&colored), dump);
        assert!(colored.contains(&c.paint("POST", method_color("POST"))));
        assert!(colored.contains(&c.paint("/users?id=1", PATH_COLOR)));
        assert!(colored.contains(&c.paint("HTTP/1.1", PROTOCOL_COLOR)));
        assert!(colored.contains(&c.paint("X-Time", HEADER_NAME_COLOR)));
        assert!(colored.contains(&c.paint(" 12:30", HEADER_VALUE_COLOR)));
    }

    #[test]
    fn test_json_keys_and_literals() {
        let c = Colorizer::new(true);
        let text = "{\n  \"name\": \"bo\\\"b\",\n  \"age\": -3.5e2,\n  \"ok\": [true, null]\n}";
        let colored = c.json(text);
        assert_eq!(strip(&colored), text);
        assert!(colored.contains(&c.paint("\"name\"", KEY_COLOR)));
        assert!(colored.contains(&c.paint("\"bo\\\"b\"", LITERAL_COLOR)));
        assert!(colored.contains(&c.paint("-3.5e2", LITERAL_COLOR)));
        assert!(colored.contains(&c.paint("true", LITERAL_COLOR)));
        assert!(colored.contains(&c.paint("null", LITERAL_COLOR)));
        // punctuation stays plain
        assert!(colored.starts_with("{\n  "));
    }

    #[test]
    fn test_status_colors() {
        assert_eq!(status_color(204), Color::Green);
        assert_eq!(status_color(301), Color::Cyan);
        assert_eq!(status_color(404), Color::Red);
        assert_eq!(status_color(503), Color::Magenta);
    }
}
