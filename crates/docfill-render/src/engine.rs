//! Rendering engine trait and the two LibreOffice-compatible backends
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     RenderingEngine                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  DaemonEngine  - unoconvert against a running listener       │
//! │                  (fast path, probed by TCP connect)          │
//! │  DirectEngine  - one-shot soffice with an isolated profile   │
//! │                  (probed with --version)                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{RenderError, Result};
use crate::job::ConversionJob;
use crate::process::{self, CancelFlag, Outcome};
use crate::types::RenderFormat;

/// How long the one-shot binary gets to answer `--version`
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest stderr excerpt kept in error messages
const STDERR_LIMIT: usize = 4096;

/// A backend able to convert documents between formats
///
/// Implementors only build and run their command; job bookkeeping and
/// fallback between engines are handled by
/// [`RenderOrchestrator`](crate::RenderOrchestrator).
pub trait RenderingEngine: Send + Sync {
    /// Human-readable name of this engine
    fn name(&self) -> &'static str;

    /// Whether the engine serves conversions from a long-running process
    fn is_persistent(&self) -> bool {
        false
    }

    /// Check if this engine supports the given output format
    fn supports_format(&self, _format: RenderFormat) -> bool {
        true
    }

    /// Check if the engine is currently reachable
    fn is_available(&self) -> bool {
        true
    }

    /// Convert `job.input()` so that the result lands at `job.output_path()`
    fn convert(&self, job: &ConversionJob, cancel: &CancelFlag) -> Result<()>;
}

/// Run an engine command under supervision and map the outcome to errors
pub(crate) fn execute(
    engine: &str,
    command: Command,
    timeout: Duration,
    cancel: &CancelFlag,
) -> Result<()> {
    let outcome = process::run(command, timeout, cancel).map_err(|e| {
        RenderError::EngineUnavailable(format!("{} could not be started: {}", engine, e))
    })?;

    match outcome {
        Outcome::Exited(finished) if finished.status.success() => {
            log::debug!("{} finished in {:?}", engine, finished.elapsed);
            Ok(())
        }
        Outcome::Exited(finished) => Err(RenderError::ConversionFailed {
            engine: engine.to_string(),
            message: format!("exited with {}", finished.status),
            stderr: excerpt(&finished.stderr),
        }),
        Outcome::TimedOut { stderr } => {
            if !stderr.trim().is_empty() {
                log::debug!("{} stderr before timeout: {}", engine, excerpt(&stderr));
            }
            Err(RenderError::ConversionTimeout {
                engine: engine.to_string(),
                timeout,
            })
        }
        Outcome::Cancelled => Err(RenderError::Cancelled),
    }
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_LIMIT {
        return trimmed.to_string();
    }
    let mut end = STDERR_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// `file://` URL for a local directory, as expected by `-env:UserInstallation`
pub fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}

/// Converts through `unoconvert` talking to an already running listener
#[derive(Debug, Clone)]
pub struct DaemonEngine {
    client: PathBuf,
    host: String,
    port: u16,
    probe_timeout: Duration,
}

impl DaemonEngine {
    pub fn new(client: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        Self {
            client: client.into(),
            host: host.into(),
            port,
            probe_timeout: Duration::from_millis(500),
        }
    }

    /// Set how long the TCP probe waits for the listener
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn socket_addrs(&self) -> Vec<SocketAddr> {
        match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                log::debug!("Cannot resolve {}: {}", self.address(), e);
                Vec::new()
            }
        }
    }

    fn command(&self, job: &ConversionJob) -> Command {
        let format = job.format();
        let mut command = Command::new(&self.client);
        command
            .arg("--host")
            .arg(&self.host)
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--convert-to")
            .arg(format.extension());
        if let Some(filter) = format.filter_name() {
            command.arg("--filter").arg(filter);
        }
        if let Some(options) = format.filter_options() {
            command.arg("--filter-options").arg(options);
        }
        command.arg(job.input()).arg(job.output_path());
        command
    }
}

impl RenderingEngine for DaemonEngine {
    fn name(&self) -> &'static str {
        "daemon"
    }

    fn is_persistent(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        self.socket_addrs()
            .iter()
            .any(|addr| TcpStream::connect_timeout(addr, self.probe_timeout).is_ok())
    }

    fn convert(&self, job: &ConversionJob, cancel: &CancelFlag) -> Result<()> {
        log::debug!(
            "Converting {} to {} via listener at {}",
            job.input().display(),
            job.format(),
            self.address()
        );
        execute(self.name(), self.command(job), job.timeout(), cancel)
    }
}

/// Converts by launching a fresh headless `soffice` per job
///
/// The `--version` probe runs once per engine; its answer is reused for
/// later conversions.
#[derive(Debug, Clone)]
pub struct DirectEngine {
    program: PathBuf,
    probed: OnceLock<bool>,
}

impl DirectEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            probed: OnceLock::new(),
        }
    }

    fn probe(&self) -> bool {
        let mut command = Command::new(&self.program);
        command.arg("--version");
        match process::run(command, VERSION_PROBE_TIMEOUT, &CancelFlag::new()) {
            Ok(Outcome::Exited(finished)) => {
                log::debug!("{} reports {}", self.program.display(), finished.stdout.trim());
                finished.status.success()
            }
            Ok(_) => false,
            Err(e) => {
                log::debug!("{} is not runnable: {}", self.program.display(), e);
                false
            }
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, job: &ConversionJob) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--headless")
            .arg("--norestore")
            .arg("--nologo")
            .arg("--nolockcheck")
            .arg(format!(
                "-env:UserInstallation={}",
                file_url(&job.profile_dir())
            ))
            .arg("--convert-to")
            .arg(job.format().convert_to_arg())
            .arg("--outdir")
            .arg(job.output_dir())
            .arg(job.input());
        command
    }
}

impl RenderingEngine for DirectEngine {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn is_available(&self) -> bool {
        *self.probed.get_or_init(|| self.probe())
    }

    fn convert(&self, job: &ConversionJob, cancel: &CancelFlag) -> Result<()> {
        log::debug!(
            "Converting {} to {} with {}",
            job.input().display(),
            job.format(),
            self.program.display()
        );
        execute(self.name(), self.command(job), job.timeout(), cancel)
    }
}
