//! shelltrace CLI
//!
//! Records every command typed into an interactive shell and searches the
//! recorded history.
//!
//! Commands:
//! - shelltrace start [--daemon]
//! - shelltrace stop
//! - shelltrace status
//! - shelltrace blast <term> [-i] [-n] [-l N] [-r] [-B N] [-A N] [-C N]

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use shelltrace_core::daemonize::{self, Detach};
use shelltrace_core::{Config, Error, GuardStatus, LogStore, SearchEngine, SearchQuery, SingletonGuard, StopOutcome};

mod daemon;

#[derive(Parser)]
#[command(name = "shelltrace")]
#[command(about = "Record and search interactive shell commands")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the command recorder
    Start {
        /// Detach and run in the background
        #[arg(long)]
        daemon: bool,
    },

    /// Stop the recorder and remove the shell hooks
    Stop,

    /// Check recorder status
    Status,

    /// Search recorded commands
    Blast {
        /// Term to search for
        term: Option<String>,

        /// Case insensitive search
        #[arg(short = 'i', long)]
        case_insensitive: bool,

        /// Hide timestamps in results
        #[arg(short = 'n', long = "no-time")]
        no_time: bool,

        /// Keep only the N most recent matches
        #[arg(short = 'l', long)]
        limit: Option<usize>,

        /// Treat the term as a regular expression
        #[arg(short = 'r', long)]
        regex: bool,

        /// Show N commands before each match
        #[arg(short = 'B', long, default_value_t = 0)]
        before: usize,

        /// Show N commands after each match
        #[arg(short = 'A', long, default_value_t = 0)]
        after: usize,

        /// Show N commands before and after each match
        #[arg(short = 'C', long)]
        context: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return;
    };

    if let Err(e) = run(command) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let config = Config::load()?;

    match command {
        Commands::Start { daemon: true } => start_background(&config),
        Commands::Start { daemon: false } => {
            init_logging()?;
            start_foreground(&config)
        }
        Commands::Stop => {
            init_logging()?;
            stop(&config)
        }
        Commands::Status => status(&config),
        Commands::Blast {
            term,
            case_insensitive,
            no_time,
            limit,
            regex,
            before,
            after,
            context,
        } => {
            let Some(term) = term else {
                let mut cmd = Cli::command();
                if let Some(blast) = cmd.find_subcommand_mut("blast") {
                    let _ = blast.print_help();
                }
                return Ok(());
            };
            let (before, after) = match context {
                Some(n) => (n, n),
                None => (before, after),
            };
            blast(
                &config,
                SearchQuery {
                    pattern: term,
                    is_regex: regex,
                    case_sensitive: !case_insensitive,
                    before,
                    after,
                    limit,
                },
                !no_time,
            )
        }
    }
}

/// Stderr logging for foreground invocations. The detached daemon sets up
/// its own file-backed subscriber instead.
fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelltrace=info".parse()?),
        )
        .init();
    Ok(())
}

fn start_foreground(config: &Config) -> Result<()> {
    println!("Starting shell command recorder...");
    println!("Commands will be logged to: {}", config.log_path().display());
    println!("Process ID: {}", std::process::id());
    daemon::run(config, false)
}

fn start_background(config: &Config) -> Result<()> {
    // Report a live recorder before forking; the detached child re-checks
    // when it acquires the guard, but by then stdio is gone.
    if let GuardStatus::Running(pid) = SingletonGuard::new(config).status() {
        return Err(Error::AlreadyRunning { pid }.into());
    }

    match daemonize::detach()? {
        Detach::Parent { pid } => {
            println!("Recorder running in background with PID: {}", pid);
            println!("Commands will be logged to: {}", config.log_path().display());
            Ok(())
        }
        Detach::Child => daemon::run(config, true),
    }
}

fn stop(config: &Config) -> Result<()> {
    let guard = SingletonGuard::new(config);

    match guard.signal_stop()? {
        StopOutcome::Signalled(pid) => {
            println!("Sent termination signal to recorder (PID: {})", pid);
        }
        StopOutcome::StaleCleared(pid) => {
            println!("Recorder (PID: {}) was already gone; cleaned up stale marker", pid);
        }
        StopOutcome::NotRunning => {
            println!("Recorder is not running.");
        }
    }

    // The daemon removes its hooks on SIGTERM, but cover the crashed case.
    // Cleanup failure is reported, never compounded into the stop itself.
    if let Err(e) = daemon::hook_adapter(config).uninstall() {
        tracing::warn!("failed to remove shell hooks: {}", e);
    } else {
        println!("Shell hooks removed.");
    }

    Ok(())
}

fn status(config: &Config) -> Result<()> {
    match SingletonGuard::new(config).status() {
        GuardStatus::Absent => {
            println!("Recorder is not running.");
        }
        GuardStatus::Stale(pid) => {
            println!("Recorder process (PID: {}) appears to have died.", pid);
            println!("Run 'shelltrace stop' to clean up the marker and hooks.");
        }
        GuardStatus::Running(pid) => {
            println!("Recorder is running with PID: {}", pid);
            let store = LogStore::new(config);
            println!("Log file: {}", store.path().display());
            match store.load_all() {
                Ok(records) => {
                    println!("Log size: {}", human_size(store.size_bytes()));
                    println!("Commands logged: {}", records.len());
                }
                Err(Error::LogMissing { .. }) => {
                    println!("No commands logged yet.");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn blast(config: &Config, query: SearchQuery, show_time: bool) -> Result<()> {
    if SingletonGuard::new(config).status() == GuardStatus::Absent {
        eprintln!("Error: recorder does not appear to be running.");
        eprintln!("Start it first with: shelltrace start");
        std::process::exit(1);
    }

    let records = LogStore::new(config).load_all()?;
    let matches = SearchEngine::match_indices(&records, &query)?;

    if matches.is_empty() {
        println!("No commands matching '{}' found in the log.", query.pattern);
        return Ok(());
    }

    let windows = SearchEngine::context_windows(&matches, records.len(), &query);

    println!("Found {} matching commands:", matches.len());
    let rule = "-".repeat(60);
    println!("{}", rule);
    for window in &windows {
        for line in &window.lines {
            let record = &records[line.index];
            let ts = record.timestamp_display();
            if show_time && !ts.is_empty() {
                println!("[{}] {}", ts, record.text);
            } else {
                println!("{}", record.text);
            }
        }
        println!("{}", rule);
    }

    Ok(())
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}
