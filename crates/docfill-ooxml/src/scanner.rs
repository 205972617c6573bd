//! Placeholder discovery
//!
//! Word splits visible text into many runs, so placeholders are looked for in
//! the tag-stripped text of a part rather than in the raw markup.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{FillError, Result};

/// Open/close delimiter pair wrapping a placeholder identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: "{{".to_string(),
            close: "}}".to_string(),
        }
    }
}

impl Delimiters {
    /// Create a delimiter pair; both sides must be non-empty
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self> {
        let delimiters = Self {
            open: open.into(),
            close: close.into(),
        };
        delimiters.validate()?;
        Ok(delimiters)
    }

    /// Reject empty delimiters (they would match everywhere)
    pub fn validate(&self) -> Result<()> {
        if self.open.is_empty() || self.close.is_empty() {
            return Err(FillError::InvalidDelimiters(format!(
                "open {:?} / close {:?}",
                self.open, self.close
            )));
        }
        Ok(())
    }

    /// Wrap an identifier, e.g. `name` -> `{{name}}`
    pub fn wrap(&self, identifier: &str) -> String {
        format!("{}{}{}", self.open, identifier, self.close)
    }

    /// Strip the delimiters from a token, if it carries them
    pub fn identifier<'a>(&self, token: &'a str) -> Option<&'a str> {
        token
            .strip_prefix(self.open.as_str())
            .and_then(|rest| rest.strip_suffix(self.close.as_str()))
    }
}

/// Drop every `<...>` tag, keeping all other characters as they are
///
/// No well-formedness checking: an unterminated `<` swallows the rest.
pub fn strip_markup(xml: &str) -> String {
    let mut plain = String::with_capacity(xml.len());
    let mut in_tag = false;
    for ch in xml.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }
    plain
}

/// Find placeholder tokens in plain text, first-seen order, no duplicates
///
/// Each token runs from an open delimiter to the nearest following close
/// delimiter, inclusive. An open delimiter without a close ends the scan.
pub fn find_placeholders(plain: &str, delimiters: &Delimiters) -> Vec<String> {
    let mut tokens: IndexSet<String> = IndexSet::new();
    if delimiters.validate().is_err() {
        return Vec::new();
    }
    let mut pos = 0;

    while let Some(open_at) = plain[pos..].find(delimiters.open.as_str()) {
        let start = pos + open_at;
        let after_open = start + delimiters.open.len();
        let Some(close_at) = plain[after_open..].find(delimiters.close.as_str()) else {
            break;
        };
        let end = after_open + close_at + delimiters.close.len();

        tokens.insert(plain[start..end].to_string());
        pos = end;
    }

    tokens.into_iter().collect()
}

/// Strip a part's markup and list the placeholders in it
pub fn placeholders_in_markup(xml: &str, delimiters: &Delimiters) -> Vec<String> {
    find_placeholders(&strip_markup(xml), delimiters)
}
