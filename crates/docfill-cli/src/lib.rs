//! docfill CLI - Command-line interface library
//!
//! This library provides the CLI functionality for docfill:
//! - Placeholders: list the tokens a template expects
//! - Fill: substitute values and write the finished document
//! - Orientation: report portrait or landscape
//! - Convert: render to PDF or HTML through LibreOffice
//! - Probe: check which rendering engines are reachable
//!
//! # Binary Usage
//!
//! ```bash
//! # List placeholders
//! docfill placeholders offer.docx --format json
//!
//! # Fill from a JSON file plus one override
//! docfill fill offer.docx -o offer-alice.docx --values alice.json --set name=Alice
//!
//! # Render a PDF
//! docfill convert offer-alice.docx --to pdf -o offer-alice.pdf
//! ```

pub mod app;
pub mod config;

// Re-export main entry point and types
pub use app::{
    collect_values, convert_command, fill_command, orientation_command, placeholders_command,
    probe_command,
};
pub use app::{run_cli, FillOptions, OutputFormat};
pub use config::Settings;
