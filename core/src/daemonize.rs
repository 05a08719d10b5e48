//! Process detachment for `start --daemon`
//!
//! Classic double fork: fork, `setsid` so the daemon survives terminal
//! closure, fork again so it can never reacquire a controlling terminal,
//! then `umask(0)`, `chdir("/")`, and stdio redirected to `/dev/null`. The
//! final daemon pid travels back to the original invocation over a pipe so
//! it can be printed before the foreground process exits. One-way: there is
//! no rollback, and the caller must not have written the pid marker before
//! detaching.

#![cfg(unix)]

use crate::error::{Error, Result};

/// Which side of the detach the caller is on after `detach()` returns.
pub enum Detach {
    /// Original foreground process; print `pid` and exit 0.
    Parent { pid: u32 },
    /// The detached daemon; carry on with daemon work.
    Child,
}

/// Detach the calling process into a background session leader.
///
/// Returns `Detach::Parent` exactly once, in the original process, after
/// the daemon has reported its pid; returns `Detach::Child` in the daemon.
/// The intermediate fork exits internally and never returns.
pub fn detach() -> Result<Detach> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(Error::Detach("pipe creation failed".into()));
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    match unsafe { libc::fork() } {
        -1 => {
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            Err(Error::Detach("first fork failed".into()))
        }
        0 => {
            // First child: become session leader, then fork the daemon.
            unsafe { libc::close(read_fd) };

            if unsafe { libc::setsid() } == -1 {
                // Parent sees EOF on the pipe and reports the failure.
                unsafe { libc::close(write_fd) };
                std::process::exit(1);
            }

            match unsafe { libc::fork() } {
                -1 => {
                    unsafe { libc::close(write_fd) };
                    std::process::exit(1);
                }
                0 => {
                    // The daemon.
                    unsafe { libc::umask(0) };
                    let _ = std::env::set_current_dir("/");
                    redirect_stdio_to_null();

                    let pid = std::process::id().to_string();
                    unsafe {
                        libc::write(write_fd, pid.as_ptr() as *const libc::c_void, pid.len());
                        libc::close(write_fd);
                    }
                    Ok(Detach::Child)
                }
                _ => {
                    // Intermediate child exits so the daemon is reparented.
                    std::process::exit(0);
                }
            }
        }
        first_child => {
            // Original process: reap the intermediate child, then wait for
            // the daemon to report its pid.
            unsafe { libc::close(write_fd) };

            let mut status: libc::c_int = 0;
            unsafe { libc::waitpid(first_child, &mut status, 0) };

            let mut buf = [0u8; 16];
            let n = unsafe {
                libc::read(read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
            };
            unsafe { libc::close(read_fd) };

            if n <= 0 {
                return Err(Error::Detach("daemon did not report its pid".into()));
            }
            let pid = std::str::from_utf8(&buf[..n as usize])
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .ok_or_else(|| Error::Detach("daemon reported a garbled pid".into()))?;

            Ok(Detach::Parent { pid })
        }
    }
}

fn redirect_stdio_to_null() {
    unsafe {
        let null = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
        if null != -1 {
            libc::dup2(null, 0);
            libc::dup2(null, 1);
            libc::dup2(null, 2);
            if null > 2 {
                libc::close(null);
            }
        }
    }
}
