//! Conversion orchestration with engine fallback
//!
//! [`RenderOrchestrator`] holds engines in priority order (listener first,
//! one-shot second) and tries each available one until a conversion
//! succeeds. Every attempt is its own [`ConversionJob`] with a fresh profile
//! and output directory, removed when the attempt is over.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use crate::engine::{DaemonEngine, DirectEngine, RenderingEngine};
use crate::error::{RenderError, Result};
use crate::job::ConversionJob;
use crate::process::CancelFlag;
use crate::settings::RenderSettings;
use crate::types::RenderFormat;

/// Runs conversions on the best available engine
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use docfill_render::{RenderOrchestrator, RenderSettings};
///
/// let orchestrator = RenderOrchestrator::new(&RenderSettings::default());
/// let pdf = orchestrator.render_pdf(Path::new("filled.docx"))?;
/// std::fs::write("filled.pdf", pdf)?;
/// # Ok::<(), docfill_render::RenderError>(())
/// ```
pub struct RenderOrchestrator {
    /// Registered engines in priority order
    engines: Vec<Box<dyn RenderingEngine>>,
    timeout: Duration,
    normalize_timeout: Duration,
    scratch_root: Option<PathBuf>,
    cancel: CancelFlag,
}

impl Default for RenderOrchestrator {
    fn default() -> Self {
        Self::new(&RenderSettings::default())
    }
}

impl RenderOrchestrator {
    /// Create an orchestrator with the engines described by `settings`
    pub fn new(settings: &RenderSettings) -> Self {
        let mut orchestrator = Self::empty()
            .with_timeouts(settings.timeout(), settings.normalize_timeout());

        if settings.use_daemon {
            orchestrator.add_engine(Box::new(
                DaemonEngine::new(
                    &settings.unoconvert,
                    settings.daemon_host.clone(),
                    settings.daemon_port,
                )
                .with_probe_timeout(settings.probe_timeout()),
            ));
        }
        orchestrator.add_engine(Box::new(DirectEngine::new(&settings.soffice)));
        orchestrator
    }

    /// Create an orchestrator with no engines (for testing)
    pub fn empty() -> Self {
        let defaults = RenderSettings::default();
        Self {
            engines: Vec::new(),
            timeout: defaults.timeout(),
            normalize_timeout: defaults.normalize_timeout(),
            scratch_root: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Add an engine; engines are tried in the order they were added
    pub fn add_engine(&mut self, engine: Box<dyn RenderingEngine>) {
        log::debug!("Added engine: {}", engine.name());
        self.engines.push(engine);
    }

    pub fn with_timeouts(mut self, timeout: Duration, normalize_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.normalize_timeout = normalize_timeout;
        self
    }

    /// Place job workspaces under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that cancels conversions started by this orchestrator
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Get the names of all registered engines
    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Names of the engines that answer their availability probe right now
    pub fn available_engines(&self) -> Vec<&'static str> {
        self.engines
            .iter()
            .filter(|e| e.is_available())
            .map(|e| e.name())
            .collect()
    }

    /// Convert `input` on the first engine that succeeds and hand the
    /// produced file to `accept` while its job workspace still exists
    fn convert<T>(
        &self,
        input: &Path,
        format: RenderFormat,
        timeout: Duration,
        one_shot_only: bool,
        accept: impl Fn(&Path) -> Result<T>,
    ) -> Result<T> {
        if !input.is_file() {
            return Err(RenderError::InvalidInput(input.to_path_buf()));
        }

        let mut last_error = None;
        let mut attempted = false;

        for engine in &self.engines {
            if one_shot_only && engine.is_persistent() {
                continue;
            }

            if !engine.supports_format(format) {
                continue;
            }

            if self.cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }

            if !engine.is_available() {
                log::debug!("Engine {} is not available, skipping", engine.name());
                continue;
            }
            attempted = true;

            let mut job =
                ConversionJob::new(input, format, timeout, self.scratch_root.as_deref())?;
            let result = job
                .run(engine.as_ref(), &self.cancel)
                .and_then(|output| accept(&output));

            match result {
                Ok(value) => {
                    log::debug!(
                        "Converted {} to {} with {} (job {})",
                        input.display(),
                        format,
                        engine.name(),
                        job.id()
                    );
                    job.close()?;
                    return Ok(value);
                }
                Err(RenderError::Cancelled) => return Err(RenderError::Cancelled),
                Err(e) => {
                    log::warn!("Engine {} failed (job {}): {}", engine.name(), job.id(), e);
                    last_error = Some(e);
                    // Continue to next engine
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None if attempted => Err(RenderError::EngineUnavailable(
                "no engine produced output".to_string(),
            )),
            None => Err(RenderError::EngineUnavailable(format!(
                "no reachable engine among [{}]",
                self.engine_names().join(", ")
            ))),
        }
    }

    /// Convert `input` to PDF and return the document bytes
    pub fn render_pdf(&self, input: &Path) -> Result<Vec<u8>> {
        self.convert(input, RenderFormat::Pdf, self.timeout, false, |output| {
            Ok(fs::read(output)?)
        })
    }

    /// Convert `input` to a self-contained HTML file inside `output_dir`
    /// and return its path
    pub fn render_html(&self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        self.convert(input, RenderFormat::Html, self.timeout, false, |output| {
            let name = output
                .file_name()
                .ok_or_else(|| RenderError::InvalidInput(input.to_path_buf()))?;
            let dest = output_dir.join(name);
            fs::copy(output, &dest)?;
            Ok(dest)
        })
    }

    /// Convert `input` to `format` and write the result to `dest`
    pub fn render_to(&self, input: &Path, format: RenderFormat, dest: &Path) -> Result<()> {
        self.convert(input, format, self.timeout, false, |output| {
            fs::copy(output, dest)?;
            Ok(())
        })
    }

    /// Re-save `input` through a one-shot engine to even out markup quirks
    /// left by other editors
    ///
    /// Never fails: when no engine can do it, the original input is returned
    /// unchanged and a warning is logged.
    pub fn normalize(&self, input: &Path) -> NormalizedDocument {
        match self.try_normalize(input) {
            Ok(normalized) => normalized,
            Err(e) => {
                log::warn!(
                    "Normalization of {} failed, using the original: {}",
                    input.display(),
                    e
                );
                NormalizedDocument {
                    path: input.to_path_buf(),
                    holder: None,
                }
            }
        }
    }

    fn try_normalize(&self, input: &Path) -> Result<NormalizedDocument> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docfill-normalized-");
        let holder = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let dest = holder.path().join(
            input
                .file_name()
                .ok_or_else(|| RenderError::InvalidInput(input.to_path_buf()))?,
        );
        self.convert(
            input,
            RenderFormat::Docx,
            self.normalize_timeout,
            true,
            |output| {
                fs::copy(output, &dest)?;
                Ok(())
            },
        )?;

        Ok(NormalizedDocument {
            path: dest,
            holder: Some(holder),
        })
    }
}

/// Result of [`RenderOrchestrator::normalize`]
///
/// When normalization succeeded the file lives in a temporary directory that
/// is removed when this value is dropped.
#[derive(Debug)]
pub struct NormalizedDocument {
    path: PathBuf,
    holder: Option<TempDir>,
}

impl NormalizedDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False when the original input was returned unchanged
    pub fn is_normalized(&self) -> bool {
        self.holder.is_some()
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }
}
