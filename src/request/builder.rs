//! Request assembly
//!
//! Collects classified items and resolves the one body the request carries.
//! Body precedence: raw (`--body` or stdin) > multipart > url-encoded form > JSON fields.

use base64::Engine;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use url::Url;

use crate::constants::{user_agent, DEFAULT_ACCEPT_ENCODING, FORM_MEDIA_TYPE, JSON_MEDIA_TYPE};
use crate::error::{Error, Result};
use crate::models::{
    BodyMode, Credentials, FilePart, HeaderList, HttpMethod, JsonField, RequestBody, RequestSpec,
    TransportOptions,
};
use crate::request::items::{ItemClassifier, ItemKind};
use crate::request::method::Invocation;

#[derive(Debug)]
struct RawBody {
    bytes: Vec<u8>,
    json: bool,
}

/// Accumulates items into a [`RequestSpec`]
#[derive(Debug)]
pub struct RequestBuilder {
    method: HttpMethod,
    url: Url,
    mode: BodyMode,
    headers: HeaderList,
    host: Option<String>,
    params: Vec<(String, String)>,
    json: BTreeMap<String, JsonField>,
    files: Vec<FilePart>,
    raw: Option<RawBody>,
    auth: Option<Credentials>,
    options: TransportOptions,
}

impl RequestBuilder {
    pub fn new(method: HttpMethod, url: Url, mode: BodyMode) -> Self {
        RequestBuilder {
            method,
            url,
            mode,
            headers: HeaderList::new(),
            host: None,
            params: Vec::new(),
            json: BTreeMap::new(),
            files: Vec::new(),
            raw: None,
            auth: None,
            options: TransportOptions::default(),
        }
    }

    pub fn from_invocation(invocation: &Invocation, mode: BodyMode) -> Self {
        Self::new(invocation.method, invocation.url.clone(), mode)
    }

    pub fn classifier(&self) -> ItemClassifier {
        ItemClassifier::new(self.mode, self.method)
    }

    /// Classify and add every token
    pub fn tokens<S: AsRef<str>>(mut self, tokens: &[S]) -> Result<Self> {
        let classifier = self.classifier();
        for token in tokens {
            let item = classifier.classify(token.as_ref())?;
            self.add(item)?;
        }
        Ok(self)
    }

    pub fn add(&mut self, item: ItemKind) -> Result<()> {
        match item {
            ItemKind::Header { name, value } => {
                if name.eq_ignore_ascii_case("Host") {
                    self.host = Some(value);
                } else {
                    self.headers.append(name, value);
                }
            }
            ItemKind::JsonRawField { key, value } => {
                self.json.insert(key, value);
            }
            ItemKind::TypedField { key, value } => {
                self.json.insert(key, JsonField::Value(value));
            }
            ItemKind::FileUpload { field, path } => {
                self.files.push(read_file_part(field, &path)?);
            }
            ItemKind::Param { key, value } => {
                self.params.push((key, value));
            }
        }
        Ok(())
    }

    /// Body given verbatim with `--body`
    pub fn raw_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.raw = Some(RawBody {
            bytes: body.into(),
            json: false,
        });
        self
    }

    /// Body piped on stdin. In JSON mode it has to be a JSON document.
    pub fn stdin_body(mut self, body: Vec<u8>) -> Result<Self> {
        let json = self.mode == BodyMode::Json;
        if json {
            serde_json::from_slice::<serde_json::Value>(&body)
                .map_err(|e| Error::decode("fail to read body from stdin", e))?;
        }
        self.raw = Some(RawBody { bytes: body, json });
        Ok(self)
    }

    pub fn auth(mut self, credentials: Option<Credentials>) -> Self {
        self.auth = credentials;
        self
    }

    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<RequestSpec> {
        let RequestBuilder {
            method,
            mut url,
            mode,
            headers: user_headers,
            host,
            params,
            json,
            files,
            raw,
            auth,
            options,
        } = self;

        let accept = match mode {
            BodyMode::Json => JSON_MEDIA_TYPE,
            BodyMode::Form => "*/*",
        };

        let mut headers = HeaderList::new();
        for (name, value) in [
            ("User-Agent", user_agent()),
            ("Accept-Encoding", DEFAULT_ACCEPT_ENCODING.to_string()),
            ("Accept", accept.to_string()),
        ] {
            if !user_headers.contains(name) {
                headers.append(name, value);
            }
        }
        if let Some(creds) = auth {
            if !user_headers.contains("Authorization") {
                headers.append("Authorization", basic_auth(&creds));
            }
        }
        for header in user_headers.iter() {
            headers.append(header.name.clone(), header.value.clone());
        }

        let params_in_query = method == HttpMethod::GET;
        if params_in_query && !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }

        let body = if let Some(raw) = raw {
            if !json.is_empty() || !files.is_empty() {
                tracing::warn!("raw body given, ignoring item fields");
            }
            if raw.json {
                default_header(&mut headers, "Content-Type", JSON_MEDIA_TYPE);
            }
            RequestBody::Raw(raw.bytes)
        } else if mode == BodyMode::Form {
            if !json.is_empty() {
                tracing::warn!(fields = json.len(), "form mode, ignoring JSON fields");
            }
            let fields = if params_in_query { Vec::new() } else { params };
            if !files.is_empty() {
                RequestBody::Multipart { fields, files }
            } else if !fields.is_empty() {
                default_header(&mut headers, "Content-Type", FORM_MEDIA_TYPE);
                RequestBody::Form(fields)
            } else {
                RequestBody::Empty
            }
        } else if !json.is_empty() {
            let bytes = serde_json::to_vec(&json)
                .map_err(|e| Error::decode("fail to marshal json", e))?;
            default_header(&mut headers, "Content-Type", JSON_MEDIA_TYPE);
            RequestBody::Json(bytes)
        } else {
            RequestBody::Empty
        };

        tracing::debug!(%method, %url, headers = headers.len(), "request assembled");

        Ok(RequestSpec {
            method,
            url,
            headers,
            host,
            body,
            options,
        })
    }
}

fn default_header(headers: &mut HeaderList, name: &str, value: &str) {
    if !headers.contains(name) {
        headers.append(name, value);
    }
}

fn basic_auth(creds: &Credentials) -> String {
    let credentials = format!(
        "{}:{}",
        creds.username,
        creds.password.as_deref().unwrap_or_default()
    );
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}

fn read_file_part(field: String, path: &Path) -> Result<FilePart> {
    let content = fs::read(path).map_err(|e| Error::io(path, e))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| field.clone());
    Ok(FilePart {
        field,
        file_name,
        content,
    })
}
