//! Shell rc-file hook adapter
//!
//! Installs and removes the shell-side mechanism that reports each entered
//! command: a DEBUG trap for bash, a `preexec` function for zsh, both
//! invoking the `shelltrace-hook` binary. Every inserted line carries a
//! sentinel comment, which makes both operations idempotent: install skips
//! files that already contain the sentinel, uninstall keeps every line
//! without it. Only shell startup files are ever touched, never the log.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;

/// Marker appended to every line this adapter writes.
const SENTINEL: &str = "# shelltrace hook";

/// Editor for the configured shell startup files.
pub struct ShellHookAdapter {
    bash_rc: PathBuf,
    zsh_rc: PathBuf,
    /// Command the snippets invoke per entered command
    hook_command: String,
}

impl ShellHookAdapter {
    pub fn new(config: &Config, hook_command: impl Into<String>) -> Self {
        Self {
            bash_rc: config.bash_rc.clone(),
            zsh_rc: config.zsh_rc.clone(),
            hook_command: hook_command.into(),
        }
    }

    fn bash_snippet(&self) -> String {
        format!(
            "\n_shelltrace_record() {{ {cmd} \"$BASH_COMMAND\"; }} {s}\ntrap '_shelltrace_record' DEBUG {s}\n",
            cmd = self.hook_command,
            s = SENTINEL,
        )
    }

    fn zsh_snippet(&self) -> String {
        format!(
            "\npreexec() {{ {cmd} \"$1\"; }} {s}\n",
            cmd = self.hook_command,
            s = SENTINEL,
        )
    }

    /// Install the hook into every rc file that exists.
    ///
    /// A file already containing the sentinel is left alone, so installing
    /// twice never duplicates the hook.
    pub fn install(&self) -> Result<()> {
        install_into(&self.bash_rc, &self.bash_snippet())?;
        install_into(&self.zsh_rc, &self.zsh_snippet())?;
        Ok(())
    }

    /// Remove every sentinel-tagged line from the rc files.
    ///
    /// Missing files and files with no hook are fine; removing twice never
    /// errors.
    pub fn uninstall(&self) -> Result<()> {
        uninstall_from(&self.bash_rc)?;
        uninstall_from(&self.zsh_rc)?;
        Ok(())
    }
}

fn install_into(rc_path: &Path, snippet: &str) -> Result<()> {
    if !rc_path.exists() {
        debug!("{:?} does not exist, skipping hook install", rc_path);
        return Ok(());
    }

    let content = std::fs::read_to_string(rc_path)?;
    if content.contains(SENTINEL) {
        debug!("hook already present in {:?}", rc_path);
        return Ok(());
    }

    let mut updated = content;
    updated.push_str(snippet);
    std::fs::write(rc_path, updated)?;
    info!("installed command hook into {:?}", rc_path);
    Ok(())
}

fn uninstall_from(rc_path: &Path) -> Result<()> {
    if !rc_path.exists() {
        return Ok(());
    }

    let content = std::fs::read_to_string(rc_path)?;
    if !content.contains(SENTINEL) {
        return Ok(());
    }

    let kept: Vec<&str> = content
        .lines()
        .filter(|line| !line.contains(SENTINEL))
        .collect();
    let mut updated = kept.join("\n");
    if content.ends_with('\n') && !updated.is_empty() {
        updated.push('\n');
    }

    std::fs::write(rc_path, updated)?;
    info!("removed command hook from {:?}", rc_path);
    Ok(())
}
