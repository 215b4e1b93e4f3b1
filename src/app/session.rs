//! One run of the client

use std::io::Write;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::models::RequestSpec;
use crate::network::bench::{self, BenchOptions};
use crate::network::client::{HttpResponse, ReqwestTransport, Transport};
use crate::network::download::{save_to_file, target_file_name};
use crate::output::ResponseFormatter;
use crate::progress::{ProgressBar, Unit};
use crate::request::{infer, RequestBuilder};

/// Where a run reads from and writes to
pub struct Streams<'a> {
    /// Piped request body, already read
    pub stdin: Option<Vec<u8>>,
    /// Rendered exchange, download notice and bench report
    pub out: &'a mut (dyn Write + Send),
    /// Progress bar output
    pub progress: Box<dyn Write + Send>,
    /// Whether `out` is a terminal
    pub interactive: bool,
}

pub struct App<T> {
    config: Config,
    transport: Arc<T>,
}

impl App<ReqwestTransport> {
    /// App backed by a reqwest client built from the config
    pub fn connect(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.transport)?;
        Ok(App::new(config, transport))
    }
}

impl<T: Transport + 'static> App<T> {
    pub fn new(config: Config, transport: T) -> Self {
        App {
            config,
            transport: Arc::new(transport),
        }
    }

    /// Assemble the request. Settings items go first, then the command
    /// line items. `--body` wins over piped stdin; empty stdin is ignored.
    pub fn build_request(&self, stdin: Option<Vec<u8>>) -> Result<RequestSpec> {
        let config = &self.config;
        let invocation = infer(&config.args)?;

        let mut builder = RequestBuilder::from_invocation(&invocation, config.mode)
            .tokens(&config.default_items)?
            .tokens(&invocation.items)?
            .auth(config.auth.clone())
            .options(config.transport.clone());

        if let Some(body) = &config.body {
            builder = builder.raw_body(body.as_bytes());
        } else if let Some(bytes) = stdin.filter(|b| !b.is_empty()) {
            builder = builder.stdin_body(bytes)?;
        }

        let spec = builder.build()?;
        tracing::debug!(method = %spec.method, url = %spec.url, "Request built");
        Ok(spec)
    }

    pub async fn run(&self, streams: Streams<'_>) -> Result<()> {
        let Streams {
            stdin,
            out,
            progress,
            interactive,
        } = streams;

        let spec = self.build_request(stdin)?;

        if let Some(options) = self.config.bench {
            return self.bench(spec, options, out, progress).await;
        }

        let formatter = ResponseFormatter::new(self.config.print, self.config.pretty, interactive);
        let response = self.transport.execute(&spec).await?;

        if self.config.download {
            return self
                .download(&spec, response, &formatter, interactive, out, progress)
                .await;
        }

        let head = response.head.clone();
        let body = response.collect().await?;
        formatter.write_exchange(out, &spec, &head, &body)?;
        out.flush()?;
        Ok(())
    }

    async fn download(
        &self,
        spec: &RequestSpec,
        response: HttpResponse,
        formatter: &ResponseFormatter,
        interactive: bool,
        out: &mut (dyn Write + Send),
        progress: Box<dyn Write + Send>,
    ) -> Result<()> {
        let HttpResponse { head, body } = response;
        let dest = self
            .config
            .output
            .clone()
            .unwrap_or_else(|| target_file_name(&head, &spec.url));

        if interactive {
            formatter.write_request(out, spec)?;
            formatter.write_response_head(out, &head)?;
            writeln!(out)?;
        }
        writeln!(out, "Downloading to \"{}\"", dest.display())?;
        out.flush()?;

        let reporter = ProgressBar::new(head.content_length()).start(progress);
        let saved = save_to_file(body, &dest, reporter.counter()).await;
        reporter.finish().await?;
        let written = saved?;
        tracing::info!(path = %dest.display(), bytes = written, "Saved response body");
        Ok(())
    }

    async fn bench(
        &self,
        spec: RequestSpec,
        options: BenchOptions,
        out: &mut (dyn Write + Send),
        progress: Box<dyn Write + Send>,
    ) -> Result<()> {
        let reporter = ProgressBar::new(options.requests as u64)
            .unit(Unit::Requests)
            .start(progress);
        let report = bench::run(
            Arc::clone(&self.transport),
            Arc::new(spec),
            options,
            Some(reporter.counter()),
        )
        .await;
        reporter.finish().await?;

        write!(out, "{}", report?.render())?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{BodyMode, HttpMethod, RequestBody};

    struct Unreachable;

    impl Transport for Unreachable {
        async fn execute(&self, _spec: &RequestSpec) -> Result<HttpResponse> {
            Err(Error::usage("no network in tests"))
        }
    }

    fn app(args: &[&str], tweak: impl FnOnce(&mut Config)) -> App<Unreachable> {
        let mut config = Config {
            args: args.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        };
        tweak(&mut config);
        App::new(config, Unreachable)
    }

    #[test]
    fn test_settings_items_come_first() {
        let app = app(&["example.com", "X-Env:cli"], |c| {
            c.default_items = vec!["X-Env:settings".into()];
        });
        let spec = app.build_request(None).unwrap();
        let values: Vec<_> = spec.headers.get_all("X-Env").collect();
        assert_eq!(values, ["settings", "cli"]);
    }

    #[test]
    fn test_body_flag_beats_stdin() {
        let app = app(&["POST", "example.com"], |c| c.body = Some("raw".into()));
        let spec = app.build_request(Some(b"{\"a\":1}".to_vec())).unwrap();
        assert_eq!(spec.method, HttpMethod::POST);
        assert!(matches!(spec.body, RequestBody::Raw(ref b) if b == b"raw"));
    }

    #[test]
    fn test_empty_stdin_is_ignored() {
        let app = app(&["example.com"], |_| {});
        let spec = app.build_request(Some(Vec::new())).unwrap();
        assert!(spec.body.is_empty());
    }

    #[test]
    fn test_invalid_json_stdin_is_decode_error() {
        let app = app(&["POST", "example.com"], |c| c.mode = BodyMode::Json);
        let err = app.build_request(Some(b"not json".to_vec())).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_missing_url_is_usage_error() {
        let err = app(&[], |_| {}).build_request(None).unwrap_err();
        assert_eq!(err.to_string(), "Miss the URL");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let app = app(&["example.com"], |_| {});
        let mut out = Vec::new();
        let err = app
            .run(Streams {
                stdin: None,
                out: &mut out,
                progress: Box::new(std::io::sink()),
                interactive: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(out.is_empty());
    }
}
