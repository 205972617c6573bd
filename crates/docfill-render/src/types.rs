//! Type definitions for rendering jobs
//!
//! This module defines the supported output formats and the job lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Output format of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// Re-saved DOCX, used to normalize templates
    Docx,
    /// PDF document
    #[default]
    Pdf,
    /// Self-contained HTML preview with embedded images
    Html,
}

impl RenderFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }

    /// Get the MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Pdf => "application/pdf",
            Self::Html => "text/html",
        }
    }

    /// Export filter the engine should use, if not the default for the extension
    pub fn filter_name(&self) -> Option<&'static str> {
        match self {
            Self::Docx => Some("MS Word 2007 XML"),
            Self::Pdf => None,
            Self::Html => Some("HTML (StarWriter)"),
        }
    }

    /// Options passed to the export filter
    pub fn filter_options(&self) -> Option<&'static str> {
        match self {
            Self::Html => Some("EmbedImages"),
            _ => None,
        }
    }

    /// Argument for `--convert-to` in the one-shot engine syntax
    /// (`ext[:filter[:options]]`)
    pub fn convert_to_arg(&self) -> String {
        let mut arg = self.extension().to_string();
        if let Some(filter) = self.filter_name() {
            arg.push(':');
            arg.push_str(filter);
            if let Some(options) = self.filter_options() {
                arg.push(':');
                arg.push_str(options);
            }
        }
        arg
    }

    /// Get all formats
    pub fn all() -> &'static [RenderFormat] {
        &[Self::Docx, Self::Pdf, Self::Html]
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for RenderFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            "html" | "htm" => Ok(Self::Html),
            _ => Err(RenderError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Lifecycle of a single external conversion
///
/// `Created -> Running -> {Succeeded, TimedOut, Failed, Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Created,
    Running,
    Succeeded,
    TimedOut,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Created | Self::Running)
    }

    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match self {
            Self::Created => next == Self::Running,
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
