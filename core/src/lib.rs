//! shelltrace core - components for recording and searching shell commands
//!
//! This crate provides:
//! - Configuration for the shared state directory
//! - The append-only command log (`LogStore`)
//! - The pid-marker singleton guard (`SingletonGuard`)
//! - Process detachment for `start --daemon` (`daemonize`)
//! - The search engine behind `blast` (`search`)
//! - The shell rc-file hook adapter (`ShellHookAdapter`)

pub mod config;
pub mod daemonize;
pub mod error;
pub mod guard;
pub mod hook;
pub mod log;
pub mod search;

pub use config::Config;
pub use error::{Error, Result};
pub use guard::{DaemonHandle, GuardStatus, ProcessProbe, SingletonGuard, StopOutcome};
pub use hook::ShellHookAdapter;
pub use log::{LogStore, Record};
pub use search::{MatchWindow, SearchEngine, SearchQuery, WindowLine};

/// Re-export commonly used items
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::guard::{GuardStatus, SingletonGuard};
    pub use crate::log::{LogStore, Record};
    pub use crate::search::{SearchEngine, SearchQuery};
}
