//! Stand-in tmux binary for tests: a shell script that logs every argv and
//! answers each subcommand from a `case` table.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Rejects flags that appear before `--` the way tmux's getopt does
pub(crate) const STRICT_FLAGS: &str = r#"
send-keys|new-session)
    shift
    while [ $# -gt 0 ]; do
        case "$1" in
            --) break ;;
            -t|-s|-c) shift 2 ;;
            -d) shift ;;
            -*) echo "unknown flag $1" >&2; exit 1 ;;
            *) break ;;
        esac
    done
    ;;
"#;

pub(crate) struct FakeTmux {
    dir: PathBuf,
}

impl FakeTmux {
    /// `arms` are `pattern) commands ;;` entries matched against the
    /// subcommand; anything unmatched exits 0. `$dir` names a scratch
    /// directory the script may use for state.
    pub(crate) fn new(arms: &str) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "tmux-driver-fake-{}-{id}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut script = String::from("#!/bin/sh\n");
        script.push_str("dir=\"$(dirname \"$0\")\"\n");
        script.push_str("printf '%s\\n' \"$*\" >> \"$dir/calls.log\"\n");
        script.push_str("case \"$1\" in\n");
        script.push_str(arms);
        script.push_str("\nesac\nexit 0\n");

        let path = dir.join("tmux");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir }
    }

    pub(crate) fn path(&self) -> String {
        self.dir.join("tmux").to_string_lossy().into_owned()
    }

    /// One space-joined argv per invocation, oldest first
    pub(crate) fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Drop for FakeTmux {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}
