//! Structured progress events
//!
//! The fill pipeline reports what it does through an [`EventSink`] instead of
//! printing. [`NullSink`] (the default) drops everything, [`LogSink`] forwards
//! to the `log` facade and [`RecordingSink`] keeps events for inspection.

use std::path::PathBuf;
use std::sync::Mutex;

/// Something observable that happened during a fill
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillEvent {
    /// A package was unpacked into its scratch directory
    PackageExtracted { root: PathBuf, parts: usize },
    /// A token was found contiguously and replaced in place
    TokenReplaced { token: String, occurrences: usize },
    /// A fragmented token was spliced across `runs` text runs
    TokenSpliced { token: String, runs: usize },
    /// A token from the replacement map occurs nowhere in the document
    TokenUnmatched { token: String },
    /// A part was rewritten on disk
    PartRewritten { part: String },
    /// The package was zipped back up
    PackageRepackaged { bytes: usize },
}

/// Receiver for [`FillEvent`]s
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &FillEvent);
}

/// Discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &FillEvent) {}
}

pub(crate) static NULL_SINK: NullSink = NullSink;

/// Forwards events to the `log` facade
///
/// Unmatched tokens are logged at warn level, everything else at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &FillEvent) {
        match event {
            FillEvent::TokenUnmatched { token } => {
                log::warn!("Placeholder {} not found in document", token)
            }
            FillEvent::PackageExtracted { root, parts } => {
                log::debug!("Extracted {} parts into {}", parts, root.display())
            }
            FillEvent::TokenReplaced { token, occurrences } => {
                log::debug!("Replaced {} ({} contiguous occurrences)", token, occurrences)
            }
            FillEvent::TokenSpliced { token, runs } => {
                log::debug!("Spliced {} across {} runs", token, runs)
            }
            FillEvent::PartRewritten { part } => log::debug!("Rewrote {}", part),
            FillEvent::PackageRepackaged { bytes } => {
                log::debug!("Repackaged document ({} bytes)", bytes)
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FillEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<FillEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Tokens reported as unmatched, in emission order
    pub fn unmatched(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FillEvent::TokenUnmatched { token } => Some(token),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &FillEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
