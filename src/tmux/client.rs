use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::TmuxError;
use super::poller::SessionProbe;

/// Default bound on a single tmux invocation
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Exact-match target for a session's active pane.
///
/// The `=` prefix turns off tmux's prefix and pattern matching, and the
/// trailing colon keeps the name from being read as a window or pane.
fn session_target(name: &str) -> String {
    format!("={name}:")
}

/// Client for interacting with tmux via CLI
#[derive(Debug, Clone)]
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
    /// Upper bound for each tmux invocation
    call_timeout: Duration,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self {
            tmux_path: "tmux".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_tmux_path(mut self, path: impl Into<String>) -> Self {
        self.tmux_path = path.into();
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run one tmux subcommand, killing it if it outlives `call_timeout`
    async fn run(&self, command: &'static str, args: &[&str]) -> Result<Output, TmuxError> {
        let mut cmd = Command::new(&self.tmux_path);
        cmd.arg(command)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.call_timeout, cmd.output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(TmuxError::TimedOut { command }),
        }
    }

    /// Like `run`, but a non-zero exit becomes `CommandFailed`
    async fn run_checked(&self, command: &'static str, args: &[&str]) -> Result<String, TmuxError> {
        let output = self.run(command, args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::CommandFailed {
                command,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Check whether a session with exactly this name is live
    pub async fn has_session(&self, name: &str) -> bool {
        let target = session_target(name);
        match self.run("has-session", &["-t", &target]).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(session = name, error = %e, "has-session probe failed");
                false
            }
        }
    }

    /// Capture the pane as plain text, including `scrollback` lines of history.
    ///
    /// Failures are transient while polling, so they come back as an empty string.
    pub async fn capture_pane(&self, name: &str, scrollback: u32) -> String {
        let target = session_target(name);
        let start = format!("-{scrollback}");
        match self
            .run_checked("capture-pane", &["-p", "-t", &target, "-S", &start])
            .await
        {
            Ok(content) => content,
            Err(e) => {
                debug!(session = name, error = %e, "capture-pane failed");
                String::new()
            }
        }
    }

    /// Create a detached session running `shell_command`
    pub async fn new_session(
        &self,
        name: &str,
        start_directory: Option<&Path>,
        shell_command: &str,
    ) -> Result<(), TmuxError> {
        let directory = start_directory.map(|dir| dir.to_string_lossy().into_owned());
        let mut args = vec!["-d", "-s", name];
        if let Some(dir) = directory.as_deref() {
            args.extend(["-c", dir]);
        }
        args.extend(["--", shell_command]);

        self.run_checked("new-session", &args).await?;
        debug!(session = name, "session created");
        Ok(())
    }

    /// Type `keys` into the session, optionally followed by Enter
    pub async fn send_keys(&self, name: &str, keys: &str, enter: bool) -> Result<(), TmuxError> {
        let target = session_target(name);
        let mut args = vec!["-t", target.as_str(), "--", keys];
        if enter {
            args.push("C-m");
        }

        self.run_checked("send-keys", &args).await?;
        debug!(session = name, enter, "keys sent");
        Ok(())
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProbe for TmuxClient {
    async fn capture(&self, session: &str, scrollback_lines: u32) -> String {
        self.capture_pane(session, scrollback_lines).await
    }

    async fn exists(&self, session: &str) -> bool {
        self.has_session(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use crate::tmux::fake::{FakeTmux, STRICT_FLAGS};

    #[test]
    fn test_default_client() {
        let client = TmuxClient::default();
        assert_eq!(client.tmux_path, "tmux");
        assert_eq!(client.call_timeout, DEFAULT_CALL_TIMEOUT);
    }

    #[test]
    fn test_builder_overrides() {
        let client = TmuxClient::new()
            .with_tmux_path("/opt/bin/tmux")
            .with_call_timeout(Duration::from_millis(250));
        assert_eq!(client.tmux_path, "/opt/bin/tmux");
        assert_eq!(client.call_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_missing_binary_degrades_probes() {
        let client = TmuxClient::new().with_tmux_path("/nonexistent/tmux-driver-test-bin");
        assert!(!client.has_session("anything").await);
        assert_eq!(client.capture_pane("anything", 10).await, "");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_control_calls() {
        let client = TmuxClient::new().with_tmux_path("/nonexistent/tmux-driver-test-bin");
        let err = client.send_keys("anything", "ls", true).await.unwrap_err();
        assert!(matches!(err, TmuxError::Io(_)));

        let err = client.new_session("anything", None, "true").await.unwrap_err();
        assert!(matches!(err, TmuxError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        // `false` ignores its arguments and exits 1
        let client = TmuxClient::new().with_tmux_path("false");
        let err = client.send_keys("anything", "ls", false).await.unwrap_err();
        assert!(matches!(err, TmuxError::CommandFailed { command: "send-keys", .. }));
        assert!(!client.has_session("anything").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_call_times_out() {
        // `tail -f /dev/null` never exits
        let client = TmuxClient::new()
            .with_tmux_path("tail")
            .with_call_timeout(Duration::from_millis(100));
        let err = client.run("-f", &["/dev/null"]).await.unwrap_err();
        assert!(matches!(err, TmuxError::TimedOut { command: "-f" }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hyphen_leading_keys_are_not_flags() {
        let tmux = FakeTmux::new(STRICT_FLAGS);
        let client = TmuxClient::new().with_tmux_path(tmux.path());

        client.send_keys("work", "-1", true).await.unwrap();
        client.send_keys("work", "--version", false).await.unwrap();
        assert_eq!(
            tmux.calls(),
            vec![
                "send-keys -t =work: -- -1 C-m".to_string(),
                "send-keys -t =work: -- --version".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hyphen_leading_command_is_not_a_flag() {
        let tmux = FakeTmux::new(STRICT_FLAGS);
        let client = TmuxClient::new().with_tmux_path(tmux.path());

        client
            .new_session("fresh", Some(Path::new("/tmp")), "-x")
            .await
            .unwrap();
        assert_eq!(tmux.calls(), vec!["new-session -d -s fresh -c /tmp -- -x".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_every_call_targets_the_exact_session() {
        let tmux = FakeTmux::new("capture-pane) printf 'pane' ;;");
        let client = TmuxClient::new().with_tmux_path(tmux.path());

        assert!(client.has_session("api.v2").await);
        assert_eq!(client.capture_pane("api.v2", 50).await, "pane");
        client.send_keys("api.v2", "ls", true).await.unwrap();
        assert_eq!(
            tmux.calls(),
            vec![
                "has-session -t =api.v2:".to_string(),
                "capture-pane -p -t =api.v2: -S -50".to_string(),
                "send-keys -t =api.v2: -- ls C-m".to_string(),
            ]
        );
    }
}
