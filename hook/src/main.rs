//! shelltrace hook - one-shot command append
//!
//! Invoked by the installed shell trap once per entered command, with the
//! command text as arguments. This is the only writer of the command log.
//! It must never break the user's shell, so every failure path is silent:
//! a hook that cannot log simply does nothing.

use shelltrace_core::{Config, LogStore};

fn main() {
    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    // The bash DEBUG trap also reports our own plumbing; keep it out of
    // the log.
    if text.contains("shelltrace-hook") || text.contains("_shelltrace_record") {
        return;
    }

    let Ok(config) = Config::load() else {
        return;
    };

    let _ = LogStore::new(&config).append(text);
}
