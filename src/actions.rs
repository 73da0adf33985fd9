use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line surface of the binary
#[derive(Debug, Parser)]
#[command(
    name = "tmux-driver",
    version,
    about = "Drive tmux sessions and wait until command output is complete"
)]
pub struct Cli {
    /// tmux binary to invoke
    #[arg(long, global = true, env = "TMUX_DRIVER_BIN", default_value = "tmux")]
    pub tmux_bin: String,

    /// Seconds to wait for a prompt before giving up
    #[arg(long, global = true, env = "TMUX_DRIVER_MAX_WAIT", default_value_t = 20)]
    pub max_wait: u64,

    /// Scrollback lines included in each pane capture
    #[arg(long, global = true, default_value_t = 100)]
    pub scrollback: u32,

    /// Seconds allowed for each individual tmux call
    #[arg(long, global = true, default_value_t = 5)]
    pub call_timeout: u64,

    /// Extra prompt ending, checked before the built-in ones (repeatable)
    #[arg(long = "prompt", global = true, value_name = "PATTERN")]
    pub prompts: Vec<String>,

    /// Print a JSON report instead of raw pane output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub action: Action,
}

/// Actions that can be dispatched against tmux
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Action {
    /// Create a detached session running COMMAND and wait for its output
    NewSession {
        /// Session name
        #[arg(short = 's', long)]
        session_name: String,

        /// Working directory
        #[arg(short = 'c', long)]
        start_directory: Option<PathBuf>,

        /// Shell command to run; a debugging shell takes over if it fails
        #[arg(allow_hyphen_values = true)]
        command: String,
    },

    /// Send keys to an existing session and wait for its output
    SendKeys {
        /// Target session name
        #[arg(short = 't', long)]
        target_session: String,

        /// Don't send Enter after the keys
        #[arg(long)]
        no_enter: bool,

        #[arg(allow_hyphen_values = true)]
        keys: String,
    },
}

impl Action {
    /// Session the action operates on
    pub fn session(&self) -> &str {
        match self {
            Self::NewSession { session_name, .. } => session_name,
            Self::SendKeys { target_session, .. } => target_session,
        }
    }
}
