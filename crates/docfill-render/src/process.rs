//! Supervised execution of external processes
//!
//! The child runs in its own process group with piped output. A polling
//! loop waits for it against a deadline and a [`CancelFlag`]; when either
//! fires, the whole group is killed so helper processes the engine spawned
//! do not outlive it. The group is also killed once the child exits on its
//! own, so a leftover background process cannot keep the pipes open. Output
//! is drained on helper threads so a chatty child cannot block on a full
//! pipe, and collecting it is bounded by [`DRAIN_GRACE`].

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the supervisor checks the child, the deadline and the flag
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to wait for the output pipes to close after the child is gone
///
/// A process that left the group (e.g. via `setsid`) may hold a pipe
/// forever; its output is then cut off.
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Shared flag used to cancel running conversions from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every job polling this flag stops
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Output of a process that exited on its own
#[derive(Debug, Clone)]
pub struct Finished {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// How a supervised run ended
#[derive(Debug)]
pub enum Outcome {
    /// The process exited before the deadline
    Exited(Finished),
    /// The deadline passed and the process group was killed
    TimedOut { stderr: String },
    /// The cancel flag was raised and the process group was killed
    Cancelled,
}

/// Run `command` to completion, within `timeout`, unless `cancel` is raised
///
/// Stdin is closed and both output streams are captured. Errors are only
/// returned when the process cannot be started.
pub fn run(mut command: Command, timeout: Duration, cancel: &CancelFlag) -> io::Result<Outcome> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let started = Instant::now();
    let mut child = command.spawn()?;
    log::debug!("Spawned process {} ({:?})", child.id(), command.get_program());

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    loop {
        if let Some(status) = child.try_wait()? {
            // The leader is reaped but its group may live on
            kill_group(child.id());
            return Ok(Outcome::Exited(Finished {
                status,
                stdout: collect(stdout),
                stderr: collect(stderr),
                elapsed: started.elapsed(),
            }));
        }

        if cancel.is_cancelled() {
            log::debug!("Cancelling process {}", child.id());
            terminate(&mut child);
            return Ok(Outcome::Cancelled);
        }

        if started.elapsed() >= timeout {
            log::warn!(
                "Process {} exceeded {:?}, killing its process group",
                child.id(),
                timeout
            );
            terminate(&mut child);
            return Ok(Outcome::TimedOut {
                stderr: collect(stderr),
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            // A read error just truncates the captured output
            let _ = pipe.read_to_end(&mut buffer);
            // The receiver is gone when collection gave up waiting
            let _ = tx.send(buffer);
        });
        rx
    })
}

fn collect(output: Option<Receiver<Vec<u8>>>) -> String {
    output
        .and_then(|rx| rx.recv_timeout(DRAIN_GRACE).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Send SIGKILL to the process group led by `leader`
///
/// An empty group fails with ESRCH, which is only logged.
fn kill_group(leader: u32) {
    #[cfg(unix)]
    {
        // The child leads its own group, so its pid is the group id
        if let Ok(pgid) = libc::pid_t::try_from(leader) {
            // SAFETY: killpg only sends a signal; a stale group id fails with ESRCH
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc != 0 {
                log::debug!(
                    "killpg({}) failed: {}",
                    pgid,
                    io::Error::last_os_error()
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = leader;
}

/// Kill the child and everything in its process group, then reap it
fn terminate(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}
