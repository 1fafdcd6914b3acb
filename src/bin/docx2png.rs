//! CLI binary for edgequake-docx2png.
//!
//! A thin shim over the library crate that maps CLI flags to `ClientConfig`,
//! drives one `Session` and writes the archive.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docx2png::config::{DEFAULT_BASE_URL, DEFAULT_ENDPOINT_PATH, DEFAULT_FIELD_NAME};
use edgequake_docx2png::{
    ClientConfig, InputFile, Session, SessionObserver, SessionSnapshot, SessionState,
    TempFileArtifactStore,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Busy spinner driven by session transitions ───────────────────────────────

/// Shows a spinner while the session is converting. There is no progress to
/// report beyond "busy", so a spinner is all the feedback there is.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        Arc::new(Self { bar })
    }
}

impl SessionObserver for SpinnerObserver {
    fn on_transition(&self, snapshot: &SessionSnapshot) {
        match snapshot.state {
            SessionState::Converting => {
                self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                let name = snapshot.file.as_ref().map(|f| f.name.as_str()).unwrap_or("");
                self.bar.set_message(name.to_string());
                self.bar.enable_steady_tick(Duration::from_millis(80));
            }
            SessionState::Succeeded | SessionState::Failed => self.bar.finish_and_clear(),
            _ => {}
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert and save report_images.zip in the current directory
  docx2png report.docx

  # Choose where the archive goes
  docx2png report.docx -o pages.zip
  docx2png report.docx -o out/

  # Talk to a remote converter, give up after 5 minutes
  docx2png --server https://convert.example.com --timeout 300 report.docx

  # Machine-readable result
  docx2png --json report.docx > result.json

SERVICE CONTRACT:
  POST {server}{endpoint}   multipart/form-data, one part named "file"
  2xx                       body is the ZIP archive of page PNGs
  other                     body may be {"detail": "..."} or {"error": "..."}

ENVIRONMENT VARIABLES:
  DOCX2PNG_SERVER     Base URL of the conversion service
  DOCX2PNG_ENDPOINT   Endpoint path
  DOCX2PNG_TIMEOUT    Request timeout in seconds
  DOCX2PNG_OUTPUT     Output file or directory
  RUST_LOG            Log filter (overrides -v / -q)
"#;

/// Convert a DOCX document to PNG page images via a conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "docx2png",
    version,
    about = "Convert a DOCX document to a ZIP of PNG page images via a conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to convert (normally .docx).
    input: PathBuf,

    /// Output file, or directory to place the suggested file name in.
    #[arg(short, long, env = "DOCX2PNG_OUTPUT")]
    output: Option<PathBuf>,

    /// Base URL of the conversion service.
    #[arg(long, env = "DOCX2PNG_SERVER", default_value = DEFAULT_BASE_URL)]
    server: String,

    /// Endpoint path on the service.
    #[arg(long, env = "DOCX2PNG_ENDPOINT", default_value = DEFAULT_ENDPOINT_PATH)]
    endpoint: String,

    /// Multipart field name carrying the file.
    #[arg(long, env = "DOCX2PNG_FIELD", default_value = DEFAULT_FIELD_NAME)]
    field: String,

    /// Request timeout in seconds (default: wait for the service).
    #[arg(long, env = "DOCX2PNG_TIMEOUT")]
    timeout: Option<u64>,

    /// Print the final session snapshot as JSON on stdout.
    #[arg(long, env = "DOCX2PNG_JSON")]
    json: bool,

    /// Disable the busy spinner.
    #[arg(long, env = "DOCX2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCX2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCX2PNG_QUIET")]
    quiet: bool,
}

/// JSON shape printed with `--json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    snapshot: &'a SessionSnapshot,
    output: Option<&'a PathBuf>,
    duration_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner is the user's feedback; keep library logs quiet under it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build session ────────────────────────────────────────────────────
    let store = TempFileArtifactStore::new().context("Failed to create artifact directory")?;
    let mut builder = ClientConfig::builder()
        .base_url(&cli.server)
        .endpoint_path(&cli.endpoint)
        .field_name(&cli.field)
        .artifact_store(Arc::new(store));
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if show_progress {
        builder = builder.observer(SpinnerObserver::new());
    }
    let config = builder.build().context("Invalid configuration")?;
    let session = Session::new(config).context("Failed to start session")?;

    // ── Select ───────────────────────────────────────────────────────────
    let file = InputFile::from_path(&cli.input)
        .await
        .context("Failed to read input")?;
    if !file.has_extension("docx") && !cli.quiet {
        eprintln!(
            "{} {} is not a .docx file; sending it anyway",
            yellow("⚠"),
            bold(file.name())
        );
    }
    session.select_file(Some(file))?;

    // ── Convert ──────────────────────────────────────────────────────────
    let start = Instant::now();
    let snapshot = session.submit().await.context("Conversion could not start")?;

    let output = if snapshot.state == SessionState::Succeeded {
        let dest = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
        Some(
            session
                .download_to(&dest)
                .await
                .context("Failed to save archive")?,
        )
    } else {
        None
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    if cli.json {
        let report = JsonReport {
            snapshot: &snapshot,
            output: output.as_ref(),
            duration_ms,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    }

    session.clear_selection()?;

    match output {
        Some(path) => {
            if !cli.quiet && !cli.json {
                let size = snapshot.artifact.as_ref().map(|a| a.size).unwrap_or(0);
                eprintln!(
                    "{}  {}  {}  →  {}",
                    green("✔"),
                    dim(&format!("{size} bytes")),
                    dim(&format!("{duration_ms}ms")),
                    bold(&path.display().to_string()),
                );
            }
            Ok(())
        }
        // Reported once, by anyhow's `Error:` line on exit.
        None => Err(conversion_error(snapshot)),
    }
}

/// Error for a session that ended without an archive.
fn conversion_error(snapshot: SessionSnapshot) -> anyhow::Error {
    let message = snapshot
        .error
        .unwrap_or_else(|| format!("session ended in state '{}'", snapshot.state));
    let name = snapshot.file.map(|f| f.name).unwrap_or_default();
    anyhow::anyhow!("Conversion of {name} failed: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_docx2png::SelectedFile;
    use std::time::SystemTime;

    fn failed(error: Option<&str>) -> SessionSnapshot {
        SessionSnapshot {
            revision: 3,
            state: SessionState::Failed,
            file: Some(SelectedFile {
                name: "x.docx".into(),
                size: 4,
                selected_at: SystemTime::now(),
            }),
            error: error.map(str::to_string),
            artifact: None,
        }
    }

    #[test]
    fn failure_message_appears_once() {
        let text = format!("{:#}", conversion_error(failed(Some("bad format"))));
        assert_eq!(text, "Conversion of x.docx failed: bad format");
        assert_eq!(text.matches("bad format").count(), 1);
    }

    #[test]
    fn failure_without_message_names_the_state() {
        let text = conversion_error(failed(None)).to_string();
        assert_eq!(text, "Conversion of x.docx failed: session ended in state 'failed'");
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from(["docx2png", "a.docx", "--timeout", "30", "-q"]).unwrap();
        assert_eq!(cli.timeout, Some(30));
        assert!(cli.quiet);
        assert_eq!(cli.server, DEFAULT_BASE_URL);
    }
}
