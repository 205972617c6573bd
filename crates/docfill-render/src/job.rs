//! One external conversion and its scratch directories

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use crate::engine::RenderingEngine;
use crate::error::{RenderError, Result};
use crate::process::CancelFlag;
use crate::types::{JobState, RenderFormat};

const JOB_PREFIX: &str = "docfill-job-";

/// A single engine invocation: input, output location, profile directory and
/// deadline
///
/// The job owns a scratch workspace holding `profile/` and `out/`. It is
/// removed when the job is dropped, whatever state the job ended in.
#[derive(Debug)]
pub struct ConversionJob {
    id: Uuid,
    input: PathBuf,
    format: RenderFormat,
    timeout: Duration,
    workspace: TempDir,
    state: JobState,
}

impl ConversionJob {
    /// Create a job, placing its workspace under `scratch_root` or the
    /// system temp dir
    pub fn new(
        input: &Path,
        format: RenderFormat,
        timeout: Duration,
        scratch_root: Option<&Path>,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let prefix = format!("{}{}-", JOB_PREFIX, id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let workspace = match scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        fs::create_dir(workspace.path().join("profile"))?;
        fs::create_dir(workspace.path().join("out"))?;

        Ok(Self {
            id,
            input: input.to_path_buf(),
            format,
            timeout,
            workspace,
            state: JobState::Created,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn format(&self) -> RenderFormat {
        self.format
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Scratch directory of this job
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Isolated engine profile, so concurrent one-shot runs never share a
    /// user installation
    pub fn profile_dir(&self) -> PathBuf {
        self.workspace.path().join("profile")
    }

    /// Directory the engine writes into
    pub fn output_dir(&self) -> PathBuf {
        self.workspace.path().join("out")
    }

    /// Where the converted file is expected: the input's file stem with the
    /// target extension, inside [`output_dir`](Self::output_dir)
    pub fn output_path(&self) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.output_dir()
            .join(format!("{}.{}", stem, self.format.extension()))
    }

    fn transition(&mut self, next: JobState) {
        if self.state.can_transition_to(next) {
            log::debug!("Job {}: {} -> {}", self.id, self.state, next);
            self.state = next;
        } else {
            log::warn!(
                "Job {}: ignoring illegal transition {} -> {}",
                self.id,
                self.state,
                next
            );
        }
    }

    /// Run the job once on `engine` and return the path of the produced file
    ///
    /// The returned path lives inside the job workspace and is only valid
    /// while the job is alive.
    pub fn run(&mut self, engine: &dyn RenderingEngine, cancel: &CancelFlag) -> Result<PathBuf> {
        self.transition(JobState::Running);
        let result = engine.convert(self, cancel).and_then(|()| {
            let output = self.output_path();
            if output.is_file() {
                Ok(output)
            } else {
                Err(RenderError::ConversionFailed {
                    engine: engine.name().to_string(),
                    message: format!("no output produced at {}", output.display()),
                    stderr: String::new(),
                })
            }
        });

        let terminal = match &result {
            Ok(_) => JobState::Succeeded,
            Err(RenderError::ConversionTimeout { .. }) => JobState::TimedOut,
            Err(RenderError::Cancelled) => JobState::Cancelled,
            Err(_) => JobState::Failed,
        };
        self.transition(terminal);
        result
    }

    /// Remove the workspace now, reporting any failure
    pub fn close(self) -> Result<()> {
        self.workspace.close()?;
        Ok(())
    }
}
