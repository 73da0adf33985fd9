//! Completion detection for commands running inside a tmux pane.
//!
//! tmux has no "command finished" notification, so the poller samples the
//! pane on a fixed interval and decides from the shape of the last line
//! whether a prompt is back. Two one-way latches guard against declaring
//! victory on a prompt that was already on screen before the command ran.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::heuristics::{prompt_line, trim_to_command, PromptPatterns};

/// Read-only view of a tmux session used while polling.
///
/// Lets the poller run against a scripted pane in tests.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    /// Pane text plus `scrollback_lines` of history; empty on any failure
    async fn capture(&self, session: &str, scrollback_lines: u32) -> String;

    /// Whether the session is still in tmux's session table
    async fn exists(&self, session: &str) -> bool;
}

/// How a poll ended. Each variant carries the trimmed pane text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A prompt reappeared after the command
    Completed(String),
    /// `max_wait` elapsed with the session still running
    TimedOut(String),
    /// The session disappeared while polling
    SessionExited(String),
}

impl PollOutcome {
    pub fn output(&self) -> &str {
        match self {
            Self::Completed(text) | Self::TimedOut(text) | Self::SessionExited(text) => text,
        }
    }

    /// Stable name used in logs and JSON reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::TimedOut(_) => "timed_out",
            Self::SessionExited(_) => "session_exited",
        }
    }
}

/// Tunables for a poll
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub scrollback_lines: u32,
    pub patterns: PromptPatterns,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_wait: Duration::from_secs(20),
            scrollback_lines: 100,
            patterns: PromptPatterns::default(),
        }
    }
}

/// Per-call loop state. `output_changed` and `command_seen` only ever go
/// from false to true.
#[derive(Debug)]
struct PollState {
    last_output: String,
    output_changed: bool,
    command_seen: bool,
    started_at: Instant,
    ticks: u64,
}

impl PollState {
    /// Seeded from pane content captured before the keys were sent; a
    /// change has to be observed before prompts count.
    fn from_baseline(baseline: String, started_at: Instant) -> Self {
        Self {
            last_output: baseline,
            output_changed: false,
            command_seen: false,
            started_at,
            ticks: 0,
        }
    }

    /// Seeded from the first capture of a fresh session, which counts as changed.
    fn from_first_capture(capture: String, sent: Option<&str>, started_at: Instant) -> Self {
        let command_seen = sent.is_some_and(|sent| capture.contains(sent));
        Self {
            last_output: capture,
            output_changed: true,
            command_seen,
            started_at,
            ticks: 0,
        }
    }

    fn observe(&mut self, capture: &str, sent: Option<&str>) {
        if !self.command_seen && sent.is_some_and(|sent| capture.contains(sent)) {
            self.command_seen = true;
        }
        if capture != self.last_output {
            self.output_changed = true;
            self.last_output = capture.to_string();
        }
    }

    fn prompt_check_armed(&self) -> bool {
        self.output_changed || self.command_seen
    }

    fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Polls a session until its prompt returns, it exits, or `max_wait` passes.
pub struct CompletionPoller<'a, P: SessionProbe + ?Sized> {
    probe: &'a P,
    config: PollConfig,
}

impl<'a, P: SessionProbe + ?Sized> CompletionPoller<'a, P> {
    #[must_use]
    pub fn new(probe: &'a P) -> Self {
        Self {
            probe,
            config: PollConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    async fn capture(&self, session: &str) -> String {
        self.probe
            .capture(session, self.config.scrollback_lines)
            .await
    }

    /// Wait for the command that sent `sent` to finish.
    ///
    /// `pre_action_output` is the pane as captured before the keys went out,
    /// when the caller has it; without it a fresh capture is the baseline.
    /// Timeout is checked before liveness on every tick, and both are
    /// followed by one last capture so the returned text is current.
    pub async fn poll(
        &self,
        session: &str,
        sent: Option<&str>,
        pre_action_output: Option<String>,
    ) -> PollOutcome {
        let sent = sent.filter(|sent| !sent.is_empty());
        let started_at = Instant::now();
        let mut state = match pre_action_output {
            Some(baseline) => PollState::from_baseline(baseline, started_at),
            None => {
                let first = self.capture(session).await;
                PollState::from_first_capture(first, sent, started_at)
            }
        };
        debug!(
            session,
            output_changed = state.output_changed,
            command_seen = state.command_seen,
            "poll start"
        );

        loop {
            state.ticks += 1;

            if state.elapsed() > self.config.max_wait {
                let current = self.capture(session).await;
                info!(
                    session,
                    ticks = state.ticks,
                    elapsed_ms = elapsed_ms(state.elapsed()),
                    "poll timed out"
                );
                return PollOutcome::TimedOut(trim_to_command(&current, sent).into_owned());
            }

            if !self.probe.exists(session).await {
                let current = self.capture(session).await;
                info!(
                    session,
                    ticks = state.ticks,
                    elapsed_ms = elapsed_ms(state.elapsed()),
                    "session exited while polling"
                );
                return PollOutcome::SessionExited(trim_to_command(&current, sent).into_owned());
            }

            let current = self.capture(session).await;
            state.observe(&current, sent);

            let trimmed = trim_to_command(&current, sent);
            if state.prompt_check_armed() && !trimmed.is_empty() {
                let line = prompt_line(&trimmed);
                if let Some(pattern) = self.config.patterns.matching(&line) {
                    info!(
                        session,
                        pattern,
                        ticks = state.ticks,
                        elapsed_ms = elapsed_ms(state.elapsed()),
                        "prompt detected"
                    );
                    return PollOutcome::Completed(trimmed.into_owned());
                }
            }

            debug!(
                session,
                tick = state.ticks,
                output_changed = state.output_changed,
                command_seen = state.command_seen,
                "no prompt yet"
            );
            sleep(self.config.poll_interval).await;
        }
    }
}
