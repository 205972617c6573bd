//! # docfill-render
//!
//! Drives a LibreOffice-compatible engine to normalize DOCX files and to
//! render them as PDF or self-contained HTML.
//!
//! Two engines are supported: a running `unoserver`-style listener reached
//! through `unoconvert` (fast, no start-up cost) and a one-shot headless
//! `soffice` with an isolated profile per job. Every invocation runs under a
//! hard timeout in its own process group.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use docfill_render::{RenderOrchestrator, RenderSettings};
//!
//! let orchestrator = RenderOrchestrator::new(&RenderSettings::default());
//! println!("reachable engines: {:?}", orchestrator.available_engines());
//!
//! let preview = orchestrator.render_html(Path::new("filled.docx"), Path::new("preview"))?;
//! println!("preview written to {}", preview.display());
//! # Ok::<(), docfill_render::RenderError>(())
//! ```

pub mod engine;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod process;
pub mod settings;
pub mod types;

pub use engine::{DaemonEngine, DirectEngine, RenderingEngine};
pub use error::{RenderError, Result};
pub use job::ConversionJob;
pub use orchestrator::{NormalizedDocument, RenderOrchestrator};
pub use process::CancelFlag;
pub use settings::RenderSettings;
pub use types::{JobState, RenderFormat};
