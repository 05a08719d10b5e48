//! Recorder daemon loop
//!
//! The daemon itself does no log writing: appends arrive from hook
//! invocations in their own short-lived processes. Its whole job is to hold
//! the singleton marker, keep the shell hooks installed, and idle until a
//! termination signal, at which point it removes the hooks and releases the
//! guard before exiting.

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use shelltrace_core::{Config, ShellHookAdapter, SingletonGuard};

/// Run the recorder until SIGTERM or Ctrl+C.
///
/// `detached` switches logging to a file appender because the daemon's
/// stdio points at /dev/null after the double fork.
pub fn run(config: &Config, detached: bool) -> Result<()> {
    let _appender_guard = if detached {
        Some(init_file_logging(config)?)
    } else {
        None
    };

    config.ensure_state_dir()?;

    let guard = SingletonGuard::new(config);
    let handle = guard.acquire()?;
    info!(
        "recorder started (pid {}), logging commands to {:?}",
        handle.pid, handle.log_path
    );

    let hooks = hook_adapter(config);
    if let Err(e) = hooks.install() {
        // No half-started daemon: give the marker back before failing.
        let _ = guard.release();
        return Err(e.into());
    }

    idle_until_signal()?;

    info!("termination signal received, cleaning up");
    if let Err(e) = hooks.uninstall() {
        warn!("failed to remove shell hooks: {}", e);
    }
    if let Err(e) = guard.release() {
        warn!("failed to remove pid marker: {}", e);
    }
    info!("recorder stopped");

    Ok(())
}

/// Block until SIGTERM or Ctrl+C arrives. The only cancellation path.
fn idle_until_signal() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = tokio::signal::ctrl_c() => info!("received Ctrl+C"),
        }
        Ok::<(), std::io::Error>(())
    })?;

    Ok(())
}

/// The hook adapter wired to invoke our sibling `shelltrace-hook` binary,
/// falling back to PATH lookup when it is not next to this executable.
pub fn hook_adapter(config: &Config) -> ShellHookAdapter {
    let hook_command = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("shelltrace-hook")))
        .filter(|path| path.exists())
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "shelltrace-hook".to_string());

    ShellHookAdapter::new(config, hook_command)
}

fn init_file_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(config.daemon_log_dir())?;
    let appender = tracing_appender::rolling::never(config.daemon_log_dir(), "daemon.log");
    let (writer, appender_guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelltrace=info".parse()?),
        )
        .init();

    Ok(appender_guard)
}
