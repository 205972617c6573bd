//! Run-aware placeholder substitution
//!
//! Word processors routinely split what the author typed as `{{name}}` into
//! several `<w:r>` runs (spell-check marks, revision ids, formatting changes):
//!
//! ```text
//! <w:r><w:t>{{na</w:t></w:r><w:proofErr w:type="spellStart"/><w:r><w:t>me}}</w:t></w:r>
//! ```
//!
//! [`Substitutor`] first replaces every contiguous occurrence of a token,
//! then looks for the token in the concatenated text of all `<w:t>` runs and
//! splices the value over the runs it spans:
//!
//! - the run holding the first character keeps its prefix and gets the value,
//! - runs fully inside the match are emptied,
//! - the run holding the last character keeps only its suffix.
//!
//! Formatting of the first run therefore applies to the whole value.

use std::ops::Range;

use indexmap::IndexSet;
use serde::Serialize;

use crate::error::{FillError, Result};
use crate::events::{EventSink, FillEvent, NULL_SINK};
use crate::replacements::ReplacementMap;

const RUN_OPEN: &str = "<w:t";
const RUN_CLOSE: &str = "</w:t>";
const PRESERVE_SPACE: &str = " xml:space=\"preserve\"";

/// Escape text for use as XML character data or attribute value
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Literal text of one `<w:t>` element, with its position in the markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun<'a> {
    /// Byte range of the opening tag, `<` through `>`
    pub open_tag: Range<usize>,
    /// Byte range of the text between the tags
    pub content: Range<usize>,
    /// The text itself (still entity-escaped)
    pub text: &'a str,
}

impl TextRun<'_> {
    fn preserves_space(&self, xml: &str) -> bool {
        xml[self.open_tag.clone()].contains("xml:space")
    }
}

/// Find every `<w:t>` / `<w:t attr="...">` run in document order
///
/// Elements that merely share the prefix (`<w:tab/>`, `<w:tbl>`, ...),
/// self-closing `<w:t/>` and runs without a proper `</w:t>` are skipped.
pub fn text_runs(xml: &str) -> Vec<TextRun<'_>> {
    let mut runs = Vec::new();
    let mut pos = 0;

    while let Some(found) = xml[pos..].find(RUN_OPEN) {
        let tag_start = pos + found;
        let name_end = tag_start + RUN_OPEN.len();

        let boundary = xml[name_end..].chars().next();
        if !matches!(boundary, Some(c) if c == '>' || c == '/' || c.is_whitespace()) {
            pos = name_end;
            continue;
        }

        let Some(gt) = xml[name_end..].find('>') else {
            break;
        };
        let tag_end = name_end + gt + 1;
        if xml[..tag_end - 1].ends_with('/') {
            pos = tag_end;
            continue;
        }

        // Character data never contains '<', so the next tag must be the close
        let content_start = tag_end;
        let content_end = match xml[content_start..].find('<') {
            Some(lt) => content_start + lt,
            None => break,
        };
        if !xml[content_end..].starts_with(RUN_CLOSE) {
            pos = content_end;
            continue;
        }

        runs.push(TextRun {
            open_tag: tag_start..tag_end,
            content: content_start..content_end,
            text: &xml[content_start..content_end],
        });
        pos = content_end + RUN_CLOSE.len();
    }

    runs
}

/// Concatenated text of all runs
pub fn run_text(xml: &str) -> String {
    text_runs(xml).iter().map(|r| r.text).collect()
}

/// How one token fared in a substitution pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacedToken {
    pub token: String,
    /// Contiguous occurrences replaced by plain substring replacement
    pub contiguous: usize,
    /// Fragmented occurrences spliced across runs
    pub spliced: usize,
}

impl ReplacedToken {
    pub fn occurrences(&self) -> usize {
        self.contiguous + self.spliced
    }
}

/// Outcome of substituting a [`ReplacementMap`] into markup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionReport {
    /// Tokens that were found at least once, in map order
    pub replaced: Vec<ReplacedToken>,
    /// Tokens that were found nowhere, in map order
    pub unmatched: Vec<String>,
}

impl SubstitutionReport {
    /// True when every token in the map was found
    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }

    /// Total number of replaced occurrences
    pub fn total_occurrences(&self) -> usize {
        self.replaced.iter().map(|r| r.occurrences()).sum()
    }

    /// Fold in the report of another part of the same document
    ///
    /// Counts add up; a token stays unmatched only if no part matched it.
    pub fn merge(&mut self, other: SubstitutionReport) {
        for incoming in other.replaced {
            match self.replaced.iter_mut().find(|r| r.token == incoming.token) {
                Some(existing) => {
                    existing.contiguous += incoming.contiguous;
                    existing.spliced += incoming.spliced;
                }
                None => self.replaced.push(incoming),
            }
        }
        let mut unmatched: IndexSet<String> = self.unmatched.drain(..).collect();
        unmatched.extend(other.unmatched);
        for replaced in &self.replaced {
            unmatched.shift_remove(&replaced.token);
        }
        self.unmatched = unmatched.into_iter().collect();
    }
}

/// Rewritten markup plus what happened to each token
#[derive(Debug, Clone)]
pub struct Substitution {
    pub markup: String,
    pub report: SubstitutionReport,
}

/// Replaces placeholder tokens, tolerating run fragmentation
pub struct Substitutor<'s> {
    sink: &'s dyn EventSink,
}

impl Default for Substitutor<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Substitutor<'static> {
    /// A substitutor that reports nothing
    pub fn new() -> Self {
        Self { sink: &NULL_SINK }
    }
}

impl<'s> Substitutor<'s> {
    /// A substitutor reporting to `sink`
    pub fn with_sink(sink: &'s dyn EventSink) -> Self {
        Self { sink }
    }

    /// Substitute every token and emit an unmatched event for each token
    /// that was not found
    pub fn substitute(&self, xml: &str, replacements: &ReplacementMap) -> Result<Substitution> {
        let substitution = self.apply(xml, replacements)?;
        for token in &substitution.report.unmatched {
            self.sink.emit(&FillEvent::TokenUnmatched {
                token: token.clone(),
            });
        }
        Ok(substitution)
    }

    /// Substitute every token without reporting unmatched ones
    ///
    /// Used when several parts are filled and "unmatched" is only known after
    /// all of them were processed.
    pub fn apply(&self, xml: &str, replacements: &ReplacementMap) -> Result<Substitution> {
        let mut markup = xml.to_string();
        let mut report = SubstitutionReport::default();

        for (token, value) in replacements.iter() {
            if token.is_empty() {
                continue;
            }
            let escaped = escape_xml(value);
            let (rewritten, outcome) = self.replace_token(markup, token, &escaped)?;
            markup = rewritten;

            if outcome.occurrences() > 0 {
                report.replaced.push(outcome);
            } else {
                report.unmatched.push(token.to_string());
            }
        }

        Ok(Substitution { markup, report })
    }

    fn replace_token(
        &self,
        xml: String,
        token: &str,
        escaped: &str,
    ) -> Result<(String, ReplacedToken)> {
        let mut outcome = ReplacedToken {
            token: token.to_string(),
            contiguous: 0,
            spliced: 0,
        };

        let mut markup = xml;
        let contiguous = markup.matches(token).count();
        if contiguous > 0 {
            markup = markup.replace(token, escaped);
            outcome.contiguous = contiguous;
            self.sink.emit(&FillEvent::TokenReplaced {
                token: token.to_string(),
                occurrences: contiguous,
            });
        }

        // Every remaining occurrence spans at least two runs and splices
        // never add runs, so more iterations than runs means no progress.
        let limit = text_runs(&markup).len() + 1;
        // Offset in the joined run text where the next search starts; it
        // moves past each inserted value so a value containing the token
        // cannot be matched again.
        let mut cursor = 0;

        loop {
            let runs = text_runs(&markup);
            let joined: String = runs.iter().map(|r| r.text).collect();
            let Some(found) = joined.get(cursor..).and_then(|rest| rest.find(token)) else {
                break;
            };

            if outcome.spliced >= limit {
                return Err(FillError::UnresolvableFragmentedPlaceholder {
                    token: token.to_string(),
                    iterations: outcome.spliced,
                });
            }

            let start = cursor + found;
            let end = start + token.len();

            // After the fast path a match inside one run can only come from
            // an inserted value
            if within_one_run(&runs, start..end) {
                cursor = end;
                continue;
            }

            let (rewritten, spanned) = splice(&markup, &runs, start..end, escaped);
            markup = rewritten;
            outcome.spliced += 1;
            cursor = start + escaped.len();

            self.sink.emit(&FillEvent::TokenSpliced {
                token: token.to_string(),
                runs: spanned,
            });
        }

        Ok((markup, outcome))
    }
}

fn within_one_run(runs: &[TextRun<'_>], matched: Range<usize>) -> bool {
    let mut offset = 0;
    for run in runs {
        let run_end = offset + run.text.len();
        if matched.start < run_end {
            return matched.end <= run_end;
        }
        offset = run_end;
    }
    false
}

/// Replace `matched` (a range in the joined run text) with `escaped`
///
/// Returns the new markup and how many runs were touched.
fn splice(xml: &str, runs: &[TextRun<'_>], matched: Range<usize>, escaped: &str) -> (String, usize) {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut touched = 0;
    let mut offset = 0;

    for run in runs {
        let run_start = offset;
        let run_end = offset + run.text.len();
        offset = run_end;

        if run_end <= matched.start || run_start >= matched.end {
            continue;
        }
        touched += 1;

        let holds_start = matched.start >= run_start && matched.start < run_end;
        let holds_end = matched.end > run_start && matched.end <= run_end;

        let new_text = match (holds_start, holds_end) {
            (true, true) => format!(
                "{}{}{}",
                &run.text[..matched.start - run_start],
                escaped,
                &run.text[matched.end - run_start..]
            ),
            (true, false) => format!("{}{}", &run.text[..matched.start - run_start], escaped),
            (false, true) => run.text[matched.end - run_start..].to_string(),
            (false, false) => String::new(),
        };

        let edge_space = new_text.starts_with(char::is_whitespace)
            || new_text.ends_with(char::is_whitespace);
        if edge_space && !run.preserves_space(xml) {
            let at = run.open_tag.start + RUN_OPEN.len();
            edits.push((at..at, PRESERVE_SPACE.to_string()));
        }
        edits.push((run.content.clone(), new_text));
    }

    let mut out = xml.to_string();
    for (range, text) in edits.into_iter().rev() {
        out.replace_range(range, &text);
    }
    (out, touched)
}
