//! Error types for the tmux control plane.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("Session '{0}' already exists")]
    SessionExists(String),

    #[error("Session '{0}' does not exist")]
    SessionMissing(String),

    #[error("Session '{0}' exited immediately")]
    SessionVanished(String),

    #[error("tmux {command} failed: {stderr}")]
    CommandFailed {
        command: &'static str,
        stderr: String,
    },

    #[error("tmux {command} command timed out")]
    TimedOut { command: &'static str },

    #[error("tmux io error: {0}")]
    Io(#[from] std::io::Error),
}
