//! Sandbox Console - Terminal Front End
//!
//! Submits code to a sandbox server and streams its output to stdout, using
//! the same orchestration core as the browser console. Logs go to stderr so
//! stdout carries only what the sandboxed program printed.
//!
//! # Usage
//!
//! ```bash
//! # Run a file in a fresh sandbox
//! sandbox-console run hello.r2py
//!
//! # Reuse a session, pass call arguments, prepend a helper library
//! sandbox-console --session 1073741 run main.r2py --args "a b" --include lib.r2py
//!
//! # Show the session's execution history
//! sandbox-console --session 1073741 log
//!
//! # Ask for a new sandbox
//! sandbox-console session
//!
//! # Verbose logging
//! RUST_LOG=debug sandbox-console run hello.r2py
//! ```

mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use console_core::{
    acquire_session, load_config, load_config_from_path, ConfigOverrides, Console, ConsoleConfig,
    ConsoleEvent, ConsoleMessage, DelimiterMode, HttpTransport, InsertPosition, MemoryControl,
    MemoryEditor, OutputOrdering, ReqwestTransport, SessionCollaborators, SessionToken,
    SUBMIT_COMMAND,
};

use terminal::TerminalDisplay;

/// Sandbox Console - submit code to a remote sandbox and stream its output
#[derive(Parser, Debug)]
#[command(name = "sandbox-console")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sandbox server base URL
    #[arg(short = 's', long, value_name = "URL", global = true)]
    server: Option<String>,

    /// Existing session token (a new session is acquired when absent)
    #[arg(long, value_name = "TOKEN", global = true)]
    session: Option<String>,

    /// Configuration file path
    #[arg(
        short = 'c',
        long,
        env = "SANDBOX_CONSOLE_CONFIG",
        value_name = "FILE",
        global = true
    )]
    config: Option<PathBuf>,

    /// Where the evaluation result goes relative to streamed output
    #[arg(long, value_name = "result-last|arrival", global = true)]
    ordering: Option<OutputOrdering>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short = 'l',
        long,
        env = "SANDBOX_CONSOLE_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a file and stream its output
    Run {
        /// File whose content is submitted
        file: PathBuf,

        /// Call arguments passed to the program
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        args: String,

        /// Files inserted into the submission before it is sent
        #[arg(long = "include", value_name = "PATH")]
        include: Vec<PathBuf>,

        /// Include markers (lines, line, none)
        #[arg(long, default_value = "lines")]
        delimiter: DelimiterMode,

        /// Where includes go (begin, cursor)
        #[arg(long, default_value = "begin")]
        position: InsertPosition,
    },

    /// Print the session's execution history
    Log,

    /// Acquire a new session and print its token
    Session,
}

/// Initialize logging on stderr with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "sandbox_console={level},console_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn resolve_config(args: &Args) -> Result<ConsoleConfig> {
    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.server {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(ref token) = args.session {
        overrides = overrides.with_session_token(token.clone());
    }
    if let Some(ordering) = args.ordering {
        overrides = overrides.with_ordering(ordering);
    }

    let config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                bail!("Config file {} does not exist", path.display());
            }
            load_config_from_path(Some(path.clone()), &overrides)
        }
        None => load_config(&overrides),
    }
    .context("Failed to load configuration")?;

    debug!(
        base_url = %config.server.base_url,
        source = %config.base_url_source,
        "Using sandbox server"
    );
    Ok(config)
}

async fn resolve_token(
    config: &ConsoleConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<SessionToken> {
    if let Some(ref token) = config.session_token {
        debug!(source = %config.session_source, "Using configured session");
        return Ok(SessionToken::new(token.clone())?);
    }

    let token = acquire_session(transport)
        .await
        .context("Failed to acquire a session")?;
    eprintln!("Acquired session {token} (reuse it with --session {token})");
    Ok(token)
}

/// Wait for the next console message, or fail on Ctrl-C
async fn next_message(messages: &mut mpsc::Receiver<ConsoleMessage>) -> Result<ConsoleMessage> {
    tokio::select! {
        message = messages.recv() => message.context("Console stopped unexpectedly"),
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            bail!("Interrupted")
        }
    }
}

fn terminal_collaborators(editor: Arc<MemoryEditor>, call_args: String) -> SessionCollaborators {
    SessionCollaborators {
        editor,
        control: Arc::new(MemoryControl::new(call_args)),
        output: Arc::new(TerminalDisplay::stream(Box::new(std::io::stdout()))),
        log: Arc::new(TerminalDisplay::lines(
            Box::new(std::io::stdout()),
            "session log",
        )),
    }
}

async fn run_file(
    config: &ConsoleConfig,
    transport: Arc<dyn HttpTransport>,
    file: PathBuf,
    call_args: String,
    include: Vec<PathBuf>,
    delimiter: DelimiterMode,
    position: InsertPosition,
) -> Result<()> {
    let code = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let token = resolve_token(config, Arc::clone(&transport)).await?;

    let editor = Arc::new(MemoryEditor::new(code));
    let (console, mut messages) = Console::new(
        token,
        transport,
        terminal_collaborators(Arc::clone(&editor), call_args),
        config,
    );

    if !include.is_empty() {
        let report = console
            .session()
            .insert_files(&include, position, delimiter)
            .await;
        info!(
            inserted = report.inserted.len(),
            skipped = report.skipped.len(),
            "Included files"
        );
    }

    let events = console.events();
    let console_task = tokio::spawn(console.run());

    if !editor.trigger(SUBMIT_COMMAND) {
        bail!("Submit shortcut is not bound");
    }

    let outcome = loop {
        match next_message(&mut messages).await? {
            ConsoleMessage::SubmissionFinished(outcome) => break outcome,
            ConsoleMessage::SubmissionRejected => bail!("Submission was rejected"),
            ConsoleMessage::OperationFailed { operation, error } => {
                bail!("{operation} failed: {error}")
            }
            ConsoleMessage::LogRendered { .. } => {}
        }
    };

    if events.send(ConsoleEvent::Shutdown).await.is_ok() {
        console_task.await.context("Console task failed")?;
    }

    if outcome.poll.stopped_early {
        warn!(
            failures = outcome.poll.failures,
            "Output streaming stopped early; the result may be missing output"
        );
    }
    if !outcome.is_success() {
        bail!("Evaluation failed");
    }
    Ok(())
}

async fn show_log(config: &ConsoleConfig, transport: Arc<dyn HttpTransport>) -> Result<()> {
    let Some(ref token) = config.session_token else {
        bail!("No session configured; pass --session or set SANDBOX_CONSOLE_SESSION");
    };
    let token = SessionToken::new(token.clone())?;

    let (console, mut messages) = Console::new(
        token,
        transport,
        terminal_collaborators(Arc::new(MemoryEditor::default()), String::new()),
        config,
    );
    let events = console.events();
    let console_task = tokio::spawn(console.run());

    events
        .send(ConsoleEvent::FetchLogRequested)
        .await
        .context("Console stopped unexpectedly")?;

    let result = loop {
        match next_message(&mut messages).await? {
            ConsoleMessage::LogRendered { entries } => {
                debug!(entries, "Log printed");
                break Ok(());
            }
            ConsoleMessage::OperationFailed { operation, error } => {
                break Err(anyhow::anyhow!("{operation} failed: {error}"));
            }
            ConsoleMessage::SubmissionFinished(_) | ConsoleMessage::SubmissionRejected => {}
        }
    };

    if events.send(ConsoleEvent::Shutdown).await.is_ok() {
        console_task.await.context("Console task failed")?;
    }
    result
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);
    debug!(version = env!("CARGO_PKG_VERSION"), "Sandbox console starting");

    let config = resolve_config(&args)?;
    let transport: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(&config.server).context("Failed to set up HTTP client")?,
    );

    match args.command {
        Command::Run {
            file,
            args: call_args,
            include,
            delimiter,
            position,
        } => {
            run_file(
                &config, transport, file, call_args, include, delimiter, position,
            )
            .await
        }
        Command::Log => show_log(&config, transport).await,
        Command::Session => {
            let token = acquire_session(transport)
                .await
                .context("Failed to acquire a session")?;
            println!("{token}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let args = Args::parse_from([
            "sandbox-console",
            "--server",
            "http://localhost:1",
            "run",
            "main.r2py",
            "--args",
            "-v x",
            "--include",
            "a.r2py",
            "--include",
            "b.r2py",
            "--delimiter",
            "none",
            "--session",
            "42",
        ]);

        assert_eq!(args.server.as_deref(), Some("http://localhost:1"));
        assert_eq!(args.session.as_deref(), Some("42"));
        match args.command {
            Command::Run {
                file,
                args,
                include,
                delimiter,
                position,
            } => {
                assert_eq!(file, PathBuf::from("main.r2py"));
                assert_eq!(args, "-v x");
                assert_eq!(include.len(), 2);
                assert_eq!(delimiter, DelimiterMode::None);
                assert_eq!(position, InsertPosition::Begin);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_delimiter() {
        let result =
            Args::try_parse_from(["sandbox-console", "run", "f", "--delimiter", "banner"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ordering_flag() {
        let args = Args::parse_from(["sandbox-console", "--ordering", "arrival", "log"]);
        assert_eq!(args.ordering, Some(OutputOrdering::Arrival));
        assert!(matches!(args.command, Command::Log));
    }
}
