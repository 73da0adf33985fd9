use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::actions::{Action, Cli};
use crate::tmux::{CompletionPoller, PollConfig, PollOutcome, PromptPatterns, TmuxClient, TmuxError};

/// Time a new session gets before we check it didn't crash on startup
const STARTUP_GRACE: Duration = Duration::from_millis(100);

/// Wrap a command so a failure drops into a shell instead of closing the pane
pub fn with_fallback_shell(command: &str) -> String {
    format!(
        "{command} || (echo \"ERROR: Command failed. Opening shell for debugging.\" && exec bash)"
    )
}

/// Exit code plus the bracketed status line for stderr
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub code: u8,
    pub status: Option<String>,
}

impl Verdict {
    fn new(code: u8, status: impl Into<String>) -> Self {
        Self {
            code,
            status: Some(status.into()),
        }
    }

    fn success() -> Self {
        Self {
            code: 0,
            status: None,
        }
    }
}

fn timeout_status(max_wait: Duration) -> String {
    format!("[Timeout after {}s - session still running]", max_wait.as_secs())
}

/// A session running its startup command exiting is the normal way to finish
pub fn new_session_verdict(outcome: &PollOutcome, max_wait: Duration) -> Verdict {
    match outcome {
        PollOutcome::Completed(_) => Verdict::success(),
        PollOutcome::SessionExited(_) => Verdict::new(0, "[Session exited - command completed]"),
        PollOutcome::TimedOut(_) => Verdict::new(2, timeout_status(max_wait)),
    }
}

/// Keys sent to a session should leave it alive, so an exit is a failure
pub fn send_keys_verdict(outcome: &PollOutcome, max_wait: Duration) -> Verdict {
    match outcome {
        PollOutcome::Completed(_) => Verdict::success(),
        PollOutcome::SessionExited(_) => Verdict::new(1, "[Session exited]"),
        PollOutcome::TimedOut(_) => Verdict::new(2, timeout_status(max_wait)),
    }
}

/// Machine-readable summary printed with `--json`
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub session: &'a str,
    pub outcome: &'static str,
    pub elapsed_ms: u64,
    pub output: &'a str,
}

/// Main application state
pub struct App {
    client: TmuxClient,
    poll: PollConfig,
    json: bool,
}

impl App {
    pub fn new(client: TmuxClient, poll: PollConfig, json: bool) -> Self {
        Self { client, poll, json }
    }

    /// Build the client and poll settings from parsed flags
    pub fn from_cli(cli: &Cli) -> Self {
        let client = TmuxClient::new()
            .with_tmux_path(cli.tmux_bin.clone())
            .with_call_timeout(Duration::from_secs(cli.call_timeout));
        let poll = PollConfig {
            max_wait: Duration::from_secs(cli.max_wait),
            scrollback_lines: cli.scrollback,
            patterns: PromptPatterns::with_priority(&cli.prompts),
            ..PollConfig::default()
        };
        Self::new(client, poll, cli.json)
    }

    /// Run an action and return the process exit code
    pub async fn handle_action(&self, action: Action) -> Result<u8> {
        info!(session = action.session(), "dispatching action");
        match action {
            Action::NewSession {
                session_name,
                start_directory,
                command,
            } => {
                self.new_session(&session_name, start_directory.as_deref(), &command)
                    .await
            }
            Action::SendKeys {
                target_session,
                no_enter,
                keys,
            } => self.send_keys(&target_session, &keys, !no_enter).await,
        }
    }

    async fn new_session(
        &self,
        name: &str,
        start_directory: Option<&Path>,
        command: &str,
    ) -> Result<u8> {
        if self.client.has_session(name).await {
            return Err(TmuxError::SessionExists(name.to_string()).into());
        }

        self.client
            .new_session(name, start_directory, &with_fallback_shell(command))
            .await
            .inspect_err(|e| warn!(session = name, error = %e, "failed to create session"))?;

        tokio::time::sleep(STARTUP_GRACE).await;
        if !self.client.has_session(name).await {
            return Err(TmuxError::SessionVanished(name.to_string()).into());
        }

        let started = Instant::now();
        let outcome = CompletionPoller::new(&self.client)
            .with_config(self.poll.clone())
            .poll(name, Some(command), None)
            .await;

        let verdict = new_session_verdict(&outcome, self.poll.max_wait);
        self.emit(name, &outcome, started.elapsed(), &verdict)?;
        Ok(verdict.code)
    }

    async fn send_keys(&self, name: &str, keys: &str, enter: bool) -> Result<u8> {
        if !self.client.has_session(name).await {
            return Err(TmuxError::SessionMissing(name.to_string()).into());
        }

        let baseline = self
            .client
            .capture_pane(name, self.poll.scrollback_lines)
            .await;

        self.client
            .send_keys(name, keys, enter)
            .await
            .inspect_err(|e| warn!(session = name, error = %e, "failed to send keys"))?;

        let started = Instant::now();
        let outcome = CompletionPoller::new(&self.client)
            .with_config(self.poll.clone())
            .poll(name, Some(keys), Some(baseline))
            .await;

        let verdict = send_keys_verdict(&outcome, self.poll.max_wait);
        self.emit(name, &outcome, started.elapsed(), &verdict)?;
        Ok(verdict.code)
    }

    /// Print the pane output (or JSON report) and the status line
    fn emit(
        &self,
        session: &str,
        outcome: &PollOutcome,
        elapsed: Duration,
        verdict: &Verdict,
    ) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        let mut stderr = std::io::stderr().lock();
        self.write_result(&mut stdout, &mut stderr, session, outcome, elapsed, verdict)
    }

    fn write_result(
        &self,
        out: &mut impl Write,
        err: &mut impl Write,
        session: &str,
        outcome: &PollOutcome,
        elapsed: Duration,
        verdict: &Verdict,
    ) -> Result<()> {
        if self.json {
            let report = Report {
                session,
                outcome: outcome.label(),
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                output: outcome.output(),
            };
            serde_json::to_writer(&mut *out, &report).context("Failed to encode report")?;
            writeln!(out).context("Failed to write report")?;
            return Ok(());
        }

        write!(out, "{}", outcome.output()).context("Failed to write output")?;
        out.flush().context("Failed to flush output")?;

        if let Some(status) = &verdict.status {
            writeln!(err, "\n{status}").context("Failed to write status")?;
        }
        Ok(())
    }
}
