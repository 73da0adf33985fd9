use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Line endings that mean a shell or REPL is idle again, highest priority first
pub const DEFAULT_PROMPT_PATTERNS: &[&str] = &[
    "pry(main)>", // Rails console
    "]#",         // [root@host dir]#
    "]$",         // [user@host dir]$
    "#",
    "$",
];

/// Escape introducer followed by parameter, intermediate and final bytes
static RE_ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B[@-_][0-?]*[ -/]*[@-~]").unwrap());

const ESC: char = '\x1B';

/// Strip terminal control sequences (colors, cursor movement, titles) from a line.
///
/// A dangling escape byte that does not start a complete sequence is dropped
/// as well, so the result never contains `ESC`.
pub fn sanitize(line: &str) -> String {
    let stripped = RE_ANSI_ESCAPE.replace_all(line, "");
    if stripped.contains(ESC) {
        stripped.chars().filter(|&c| c != ESC).collect()
    } else {
        stripped.into_owned()
    }
}

/// Narrow a pane capture to the most recent line that echoes `sent`.
///
/// Everything from that line to the end of the buffer is kept. When `sent` is
/// empty or never shows up, the capture is returned as-is.
pub fn trim_to_command<'a>(output: &'a str, sent: Option<&str>) -> Cow<'a, str> {
    let sent = match sent {
        Some(sent) if !sent.is_empty() && !output.is_empty() => sent,
        _ => return Cow::Borrowed(output),
    };

    let lines: Vec<&str> = output.split('\n').collect();
    match lines.iter().rposition(|line| line.contains(sent)) {
        Some(0) => Cow::Borrowed(output),
        Some(idx) => Cow::Owned(lines[idx..].join("\n")),
        None => Cow::Borrowed(output),
    }
}

/// Last non-blank line of `text`, whitespace-trimmed and sanitized.
///
/// Trailing whitespace is stripped a second time after sanitizing. This is a
/// deliberate relaxation: a prompt followed by a reset code, such as
/// `"$ \x1b[0m"`, would otherwise keep its space and never match `$`.
pub fn prompt_line(text: &str) -> String {
    let last = text.trim_end().rsplit('\n').next().unwrap_or_default().trim();
    sanitize(last).trim_end().to_string()
}

/// Ordered set of line endings recognized as an idle prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPatterns {
    patterns: Vec<String>,
}

impl PromptPatterns {
    /// Build a pattern set in the given priority order.
    ///
    /// Lines are compared after trailing whitespace is stripped, so patterns
    /// lose theirs too; empty patterns would match every line and are dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim_end().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Custom patterns checked ahead of the default set.
    pub fn with_priority<I, S>(custom: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let custom: Vec<String> = custom.into_iter().map(|p| p.as_ref().to_string()).collect();
        Self::new(
            custom
                .iter()
                .map(String::as_str)
                .chain(DEFAULT_PROMPT_PATTERNS.iter().copied()),
        )
    }

    /// First pattern, in priority order, that `line` ends with
    pub fn matching(&self, line: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| line.ends_with(pattern.as_str()))
            .map(String::as_str)
    }
}

impl Default for PromptPatterns {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_PATTERNS)
    }
}
