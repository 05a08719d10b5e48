//! Configuration for the shelltrace state directory and shell rc files
//!
//! Every component takes an explicit [`Config`] at construction so tests can
//! point the whole system at a temporary directory. The state directory is
//! `$SHELLTRACE_HOME` when set, otherwise `~/.shelltrace`; an optional
//! `config.toml` inside it can override the log file name and the shell rc
//! paths the hook adapter edits.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_LOG_FILE: &str = "commands.log";
const MARKER_FILE: &str = "shelltrace.pid";

/// Paths the components operate on.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the log, the pid marker, and daemon logs
    pub state_dir: PathBuf,

    /// Log file name inside the state directory
    pub log_file: String,

    /// Bash startup file the hook adapter edits
    pub bash_rc: PathBuf,

    /// Zsh startup file the hook adapter edits
    pub zsh_rc: PathBuf,
}

/// Optional `config.toml` overlay inside the state directory.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    log_file: Option<String>,
    bash_rc: Option<PathBuf>,
    zsh_rc: Option<PathBuf>,
}

impl Config {
    /// Resolve the configuration from the environment plus the optional
    /// `config.toml` overlay.
    pub fn load() -> Result<Self> {
        let state_dir = match std::env::var_os("SHELLTRACE_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .map(|h| h.join(".shelltrace"))
                .unwrap_or_else(|| PathBuf::from("/tmp/.shelltrace")),
        };

        let mut config = Self::for_state_dir(state_dir);

        let overlay_path = config.state_dir.join("config.toml");
        if overlay_path.exists() {
            let raw = std::fs::read_to_string(&overlay_path)?;
            let overlay: ConfigFile =
                toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?;
            if let Some(log_file) = overlay.log_file {
                config.log_file = log_file;
            }
            if let Some(bash_rc) = overlay.bash_rc {
                config.bash_rc = bash_rc;
            }
            if let Some(zsh_rc) = overlay.zsh_rc {
                config.zsh_rc = zsh_rc;
            }
        }

        Ok(config)
    }

    /// Build a configuration rooted at an explicit state directory, with
    /// default file names. Used directly by tests.
    pub fn for_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self {
            state_dir: state_dir.into(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            bash_rc: home.join(".bashrc"),
            zsh_rc: home.join(".zshrc"),
        }
    }

    /// Path to the command log.
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join(&self.log_file)
    }

    /// Path to the pid marker file.
    pub fn marker_path(&self) -> PathBuf {
        self.state_dir.join(MARKER_FILE)
    }

    /// Directory the detached daemon writes its own diagnostics to.
    pub fn daemon_log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Create the state directory if it does not exist yet.
    pub fn ensure_state_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        Ok(())
    }
}
