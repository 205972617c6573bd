//! # docfill-ooxml
//!
//! Placeholder filling for OOXML (DOCX) templates.
//!
//! This crate provides functionality to:
//! - Unpack a DOCX into a scratch directory, safely
//! - List `{{placeholder}}` tokens, including ones split across runs
//! - Substitute values while keeping the surrounding run formatting
//! - Detect page orientation
//! - Repackage the result into a valid archive
//!
//! ## Example: Filling a Template
//!
//! ```no_run
//! use docfill_ooxml::{ReplacementMap, Template};
//!
//! let values = ReplacementMap::from_json_str(r#"{"{{name}}": "Alice"}"#)?;
//! let filled = Template::load("template.docx")?.fill(&values)?;
//!
//! for token in &filled.report.unmatched {
//!     eprintln!("not found: {}", token);
//! }
//! filled.save("filled.docx")?;
//! # Ok::<(), docfill_ooxml::FillError>(())
//! ```

pub mod error;
pub mod events;
pub mod orientation;
pub mod package;
pub mod replacements;
pub mod scanner;
pub mod substitute;
pub mod template;

#[cfg(test)]
mod test_utils;

pub use error::{FillError, Result};
pub use events::{EventSink, FillEvent, LogSink, NullSink, RecordingSink};
pub use orientation::{Orientation, PageSize};
pub use package::{write_atomic, Package, PackageStore, DOCUMENT_PART};
pub use replacements::ReplacementMap;
pub use scanner::{find_placeholders, placeholders_in_markup, strip_markup, Delimiters};
pub use substitute::{ReplacedToken, Substitution, SubstitutionReport, Substitutor};
pub use template::{fill_file, FilledDocument, Template};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
