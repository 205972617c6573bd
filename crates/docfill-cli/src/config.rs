//! `docfill.toml` settings
//!
//! ```toml
//! [placeholders]
//! open = "[["
//! close = "]]"
//!
//! [render]
//! soffice = "/opt/libreoffice/program/soffice"
//! use_daemon = false
//! timeout_secs = 120
//!
//! [scratch]
//! root = "/var/tmp/docfill"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use docfill_ooxml::{Delimiters, PackageStore};
use docfill_render::{RenderOrchestrator, RenderSettings};

/// File looked up in the working directory when no `--config` is given
pub const CONFIG_FILE: &str = "docfill.toml";

/// Overrides the one-shot engine binary
pub const ENV_SOFFICE: &str = "DOCFILL_SOFFICE";

/// Overrides the conversion timeout, in seconds
pub const ENV_TIMEOUT_SECS: &str = "DOCFILL_TIMEOUT_SECS";

/// Root settings structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub placeholders: PlaceholderSettings,
    pub render: RenderSettings,
    pub scratch: ScratchSettings,
}

/// Placeholder delimiters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderSettings {
    pub open: String,
    pub close: String,
}

impl Default for PlaceholderSettings {
    fn default() -> Self {
        let delimiters = Delimiters::default();
        Self {
            open: delimiters.open,
            close: delimiters.close,
        }
    }
}

/// Where packages and conversion jobs put their temporary files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchSettings {
    /// Defaults to the system temp dir
    pub root: Option<PathBuf>,
}

impl Settings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load settings from `path`, or from `./docfill.toml` when present, or
    /// fall back to defaults; then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::read(path)?
            }
            None if Path::new(CONFIG_FILE).exists() => Self::read(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };

        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Apply `DOCFILL_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(soffice) = lookup(ENV_SOFFICE).filter(|v| !v.is_empty()) {
            self.render.soffice = PathBuf::from(soffice);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            self.render.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
        }
        Ok(())
    }

    /// Validated placeholder delimiters
    pub fn delimiters(&self) -> Result<Delimiters> {
        Delimiters::new(
            self.placeholders.open.clone(),
            self.placeholders.close.clone(),
        )
        .context("Invalid [placeholders] settings")
    }

    pub fn package_store(&self) -> PackageStore {
        match &self.scratch.root {
            Some(root) => PackageStore::with_scratch_root(root),
            None => PackageStore::new(),
        }
    }

    pub fn orchestrator(&self) -> RenderOrchestrator {
        let orchestrator = RenderOrchestrator::new(&self.render);
        match &self.scratch.root {
            Some(root) => orchestrator.with_scratch_root(root),
            None => orchestrator,
        }
    }
}
