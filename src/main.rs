//! courier - cURL-like HTTP client for humans
//!
//! Parses flags, loads settings, reads piped stdin and hands everything to
//! the app. Logs go to stderr so they never mix with the response.

use std::io::{self, BufWriter, IsTerminal, Read};
use std::process::ExitCode;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use courier::constants::{APP_NAME, APP_VERSION};
use courier::{App, Cli, Config, Error, Settings, Streams};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    if cli.version {
        println!("Version: {}", APP_VERSION);
        return ExitCode::from(2);
    }

    let guard = init_logging(cli.verbose);
    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "run failed");
            eprintln!("{}: {}", APP_NAME, e);
            ExitCode::from(e.exit_code() as u8)
        }
    };

    // Flush pending log lines before exiting
    drop(guard);
    code
}

fn init_logging(verbose: bool) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
    guard
}

async fn run(cli: Cli) -> courier::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let config = cli.into_config(settings)?;
    let stdin = read_stdin(&config)?;

    let stdout = io::stdout();
    let interactive = stdout.is_terminal();
    let mut out = BufWriter::new(stdout);

    let app = App::connect(config)?;
    app.run(Streams {
        stdin,
        out: &mut out,
        progress: Box::new(io::stderr()),
        interactive,
    })
    .await
}

/// Read the request body from stdin when it is piped
fn read_stdin(config: &Config) -> courier::Result<Option<Vec<u8>>> {
    let stdin = io::stdin();
    if config.ignore_stdin || stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = Vec::new();
    stdin
        .lock()
        .read_to_end(&mut buf)
        .map_err(|e| Error::io("<stdin>", e))?;
    Ok(Some(buf).filter(|b| !b.is_empty()))
}
