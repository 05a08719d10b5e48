//! Singleton guard over the recorder daemon
//!
//! At most one daemon may run at a time. The guarantee rests on a pid
//! marker file plus a signal-zero liveness probe, not on any file locking:
//! two processes starting inside the same probe window can both win the
//! race. That check-then-write gap (and pathological pid reuse right after
//! a stop) is an accepted limitation of the design.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Liveness and termination capability over an OS process id.
///
/// Kept behind a trait so guard tests can inject a fake instead of probing
/// real pids.
pub trait ProcessProbe {
    /// Whether `pid` refers to a live process. Must not disturb it.
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask `pid` to terminate gracefully.
    fn terminate(&self, pid: u32) -> std::io::Result<()>;
}

/// Signal-based probe: `kill(pid, 0)` for liveness, SIGTERM to stop.
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    fn terminate(&self, pid: u32) -> std::io::Result<()> {
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// Observed state of the marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStatus {
    /// No marker file
    Absent,
    /// Marker present and the recorded process is alive
    Running(u32),
    /// Marker present but the recorded process is gone (or unreadable)
    Stale(u32),
}

/// What `signal_stop` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// SIGTERM delivered to the recorded pid
    Signalled(u32),
    /// Marker referenced a dead process; cleaned up only
    StaleCleared(u32),
    /// Nothing to stop
    NotRunning,
}

/// Handle for a running daemon, backed by the marker file.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    pub pid: u32,
    pub log_path: PathBuf,
}

/// Tracks the single live daemon through the pid marker file.
pub struct SingletonGuard<P = SignalProbe> {
    marker_path: PathBuf,
    log_path: PathBuf,
    probe: P,
}

impl SingletonGuard<SignalProbe> {
    pub fn new(config: &Config) -> Self {
        Self::with_probe(config, SignalProbe)
    }
}

impl<P: ProcessProbe> SingletonGuard<P> {
    pub fn with_probe(config: &Config, probe: P) -> Self {
        Self {
            marker_path: config.marker_path(),
            log_path: config.log_path(),
            probe,
        }
    }

    /// Read the marker and probe the recorded process, without mutating
    /// anything. Used by `status`.
    pub fn status(&self) -> GuardStatus {
        let raw = match std::fs::read_to_string(&self.marker_path) {
            Ok(raw) => raw,
            Err(_) => return GuardStatus::Absent,
        };

        match raw.trim().parse::<u32>() {
            Ok(pid) if self.probe.is_alive(pid) => GuardStatus::Running(pid),
            Ok(pid) => GuardStatus::Stale(pid),
            Err(_) => {
                warn!("marker file {:?} holds no pid", self.marker_path);
                GuardStatus::Stale(0)
            }
        }
    }

    /// Claim the singleton slot for the calling process.
    ///
    /// A live marker is `AlreadyRunning`; a stale one is reclaimed. On
    /// success the marker holds this process's pid.
    pub fn acquire(&self) -> Result<DaemonHandle> {
        match self.status() {
            GuardStatus::Running(pid) => return Err(Error::AlreadyRunning { pid }),
            GuardStatus::Stale(pid) => {
                info!("reclaiming stale marker for dead pid {}", pid);
                self.release()?;
            }
            GuardStatus::Absent => {}
        }

        let pid = std::process::id();
        if let Some(parent) = self.marker_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.marker_path, pid.to_string())?;
        debug!("wrote marker {:?} (pid {})", self.marker_path, pid);

        Ok(DaemonHandle {
            pid,
            log_path: self.log_path.clone(),
        })
    }

    /// Remove the marker file. Idempotent: an absent marker is fine.
    pub fn release(&self) -> Result<()> {
        match std::fs::remove_file(&self.marker_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Signal the recorded daemon to stop, then release the marker.
    ///
    /// Always leaves the guard in `Absent`: a dead or vanished process is
    /// treated as already stopped, logged rather than raised.
    pub fn signal_stop(&self) -> Result<StopOutcome> {
        let outcome = match self.status() {
            GuardStatus::Absent => StopOutcome::NotRunning,
            GuardStatus::Stale(pid) => {
                info!("marker references dead pid {}, clearing", pid);
                StopOutcome::StaleCleared(pid)
            }
            GuardStatus::Running(pid) => {
                match self.probe.terminate(pid) {
                    Ok(()) => {}
                    Err(e) => {
                        // ESRCH: it exited between the probe and the signal
                        warn!("failed to signal pid {}: {}", pid, e);
                    }
                }
                StopOutcome::Signalled(pid)
            }
        };

        self.release()?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeProbe {
        alive: Mutex<HashSet<u32>>,
        signalled: Mutex<Vec<u32>>,
    }

    impl FakeProbe {
        fn with_alive(pids: &[u32]) -> Self {
            Self {
                alive: Mutex::new(pids.iter().copied().collect()),
                signalled: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProcessProbe for &FakeProbe {
        fn is_alive(&self, pid: u32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }

        fn terminate(&self, pid: u32) -> std::io::Result<()> {
            self.signalled.lock().unwrap().push(pid);
            self.alive.lock().unwrap().remove(&pid);
            Ok(())
        }
    }

    fn guard_in<'a>(
        dir: &tempfile::TempDir,
        probe: &'a FakeProbe,
    ) -> SingletonGuard<&'a FakeProbe> {
        SingletonGuard::with_probe(&Config::for_state_dir(dir.path()), probe)
    }

    #[test]
    fn test_acquire_then_status_running() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::with_alive(&[std::process::id()]);
        let guard = guard_in(&dir, &probe);

        assert_eq!(guard.status(), GuardStatus::Absent);
        let handle = guard.acquire().unwrap();
        assert_eq!(handle.pid, std::process::id());
        assert_eq!(guard.status(), GuardStatus::Running(handle.pid));
    }

    #[test]
    fn test_second_acquire_is_already_running() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::with_alive(&[std::process::id()]);
        let guard = guard_in(&dir, &probe);

        guard.acquire().unwrap();
        match guard.acquire() {
            Err(Error::AlreadyRunning { pid }) => assert_eq!(pid, std::process::id()),
            other => panic!("expected AlreadyRunning, got {:?}", other.map(|h| h.pid)),
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::with_alive(&[std::process::id()]);
        let guard = guard_in(&dir, &probe);

        guard.acquire().unwrap();
        guard.release().unwrap();
        assert_eq!(guard.status(), GuardStatus::Absent);
        guard.release().unwrap();
        assert_eq!(guard.status(), GuardStatus::Absent);
    }

    #[test]
    fn test_stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::with_alive(&[std::process::id()]);
        let guard = guard_in(&dir, &probe);

        // Marker referencing a pid the probe considers dead
        std::fs::write(dir.path().join("shelltrace.pid"), "999999").unwrap();
        assert_eq!(guard.status(), GuardStatus::Stale(999999));

        let handle = guard.acquire().unwrap();
        assert_eq!(handle.pid, std::process::id());
    }

    #[test]
    fn test_signal_stop_terminates_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::with_alive(&[4242]);
        let guard = guard_in(&dir, &probe);

        std::fs::write(dir.path().join("shelltrace.pid"), "4242").unwrap();
        assert_eq!(guard.signal_stop().unwrap(), StopOutcome::Signalled(4242));
        assert_eq!(*probe.signalled.lock().unwrap(), vec![4242]);
        assert_eq!(guard.status(), GuardStatus::Absent);
    }

    #[test]
    fn test_signal_stop_on_dead_process_still_releases() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::with_alive(&[]);
        let guard = guard_in(&dir, &probe);

        std::fs::write(dir.path().join("shelltrace.pid"), "555").unwrap();
        assert_eq!(guard.signal_stop().unwrap(), StopOutcome::StaleCleared(555));
        assert!(probe.signalled.lock().unwrap().is_empty());
        assert_eq!(guard.status(), GuardStatus::Absent);
    }

    #[test]
    fn test_signal_stop_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::with_alive(&[]);
        let guard = guard_in(&dir, &probe);
        assert_eq!(guard.signal_stop().unwrap(), StopOutcome::NotRunning);
    }
}
