//! HTTP client wrapper - executes request specs and streams responses

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use std::future::Future;
use std::time::Instant;

use crate::constants::DEFAULT_ACCEPT_ENCODING;
use crate::error::{Error, Result};
use crate::models::{HeaderList, HttpMethod, RequestBody, RequestSpec, ResponseHead, TransportOptions};

pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// A response whose body has not been read yet
pub struct HttpResponse {
    pub head: ResponseHead,
    pub body: BodyStream,
}

impl HttpResponse {
    pub fn new(head: ResponseHead, body: BodyStream) -> Self {
        HttpResponse { head, body }
    }

    /// Response with an in-memory body, delivered as one chunk
    pub fn from_bytes(head: ResponseHead, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        HttpResponse {
            head,
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    /// Read the whole body into memory
    pub async fn collect(self) -> Result<Vec<u8>> {
        let mut stream = self.body;
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }
}

/// Executes requests. The production implementation is
/// [`ReqwestTransport`]; tests substitute an in-memory one.
pub trait Transport: Send + Sync {
    fn execute(&self, spec: &RequestSpec) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// Transport backed by a reqwest client configured from the request's
/// transport options
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(options.timeout)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure);
        if let Some(proxy) = &options.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.clone())?);
        }
        Ok(ReqwestTransport {
            client: builder.build()?,
        })
    }

    fn build_request(&self, spec: &RequestSpec) -> reqwest::RequestBuilder {
        let mut req = self.client.request(to_method(spec.method), spec.url.clone());

        for header in spec.headers.iter() {
            // reqwest adds and decodes these itself; sending them by hand
            // would turn off transparent decompression
            if header.name.eq_ignore_ascii_case("Accept-Encoding")
                && header.value == DEFAULT_ACCEPT_ENCODING
            {
                continue;
            }
            req = req.header(header.name.as_str(), header.value.as_str());
        }
        if let Some(host) = &spec.host {
            req = req.header(reqwest::header::HOST, host.as_str());
        }

        match &spec.body {
            RequestBody::Empty => req,
            RequestBody::Json(bytes) | RequestBody::Raw(bytes) => req.body(bytes.clone()),
            RequestBody::Form(fields) => req.body(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields)
                    .finish(),
            ),
            RequestBody::Multipart { fields, files } => {
                let mut form = reqwest::multipart::Form::new();
                for (key, value) in fields {
                    form = form.text(key.clone(), value.clone());
                }
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.content.clone())
                        .file_name(file.file_name.clone());
                    form = form.part(file.field.clone(), part);
                }
                req.multipart(form)
            }
        }
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, spec: &RequestSpec) -> Result<HttpResponse> {
        let start = Instant::now();
        tracing::info!(method = %spec.method, url = %spec.url, "Executing request");

        let resp = self.build_request(spec).send().await?;
        let status = resp.status();
        tracing::info!(
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Response received"
        );

        let head = ResponseHead {
            version: format!("{:?}", resp.version()),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers: to_header_list(resp.headers()),
        };
        let body = resp.bytes_stream().map_err(Error::from).boxed();
        Ok(HttpResponse::new(head, body))
    }
}

fn to_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::HEAD => reqwest::Method::HEAD,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
    }
}

fn to_header_list(headers: &reqwest::header::HeaderMap) -> HeaderList {
    headers
        .iter()
        .map(|(name, value)| {
            (
                canonical_header_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// `content-type` → `Content-Type`
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
