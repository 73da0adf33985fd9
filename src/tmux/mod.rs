mod client;
mod error;
#[cfg(all(test, unix))]
pub(crate) mod fake;
mod heuristics;
mod poller;

pub use client::{TmuxClient, DEFAULT_CALL_TIMEOUT};
pub use error::TmuxError;
pub use heuristics::{
    prompt_line, sanitize, trim_to_command, PromptPatterns, DEFAULT_PROMPT_PATTERNS,
};
pub use poller::{CompletionPoller, PollConfig, PollOutcome, SessionProbe};
