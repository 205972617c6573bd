//! Page orientation detection from section properties

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// Page geometry class of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => f.write_str("portrait"),
            Orientation::Landscape => f.write_str("landscape"),
        }
    }
}

/// Attributes of a `<w:pgSz>` element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSize {
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub orient: Option<String>,
}

impl PageSize {
    /// Classify the page: an explicit `w:orient` wins, otherwise
    /// width > height means landscape
    pub fn orientation(&self) -> Orientation {
        if let Some(orient) = &self.orient {
            return if orient.trim().eq_ignore_ascii_case("landscape") {
                Orientation::Landscape
            } else {
                Orientation::Portrait
            };
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > h => Orientation::Landscape,
            _ => Orientation::Portrait,
        }
    }

    fn from_element(e: &BytesStart) -> Self {
        Self {
            width: get_attr(e, b"w").as_deref().and_then(parse_dimension),
            height: get_attr(e, b"h").as_deref().and_then(parse_dimension),
            orient: get_attr(e, b"orient"),
        }
    }
}

/// Parse a dimension keeping only its ASCII digits (`"297mm"` -> 297)
pub fn parse_dimension(value: &str) -> Option<u64> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Page size of the last section in the markup
///
/// The body-level `<w:sectPr>` comes last in a document, so with several
/// sections it is the one describing the final page layout. Returns `None`
/// when there is no section or the section has no `<w:pgSz>`. Malformed XML
/// ends the scan early with whatever was found so far.
pub fn page_size(xml: &str) -> Option<PageSize> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_section = false;
    let mut current: Option<PageSize> = None;
    let mut last_section: Option<Option<PageSize>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"sectPr" => {
                    in_section = true;
                    current = None;
                }
                b"pgSz" if in_section => current = Some(PageSize::from_element(e)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"sectPr" => last_section = Some(None),
                b"pgSz" if in_section => current = Some(PageSize::from_element(e)),
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"sectPr" && in_section {
                    in_section = false;
                    last_section = Some(current.take());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::debug!(
                    "Stopped section scan at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
            _ => {}
        }
    }

    if in_section {
        last_section = Some(current);
    }
    last_section.flatten()
}

/// Classify a document's page geometry; defaults to portrait
pub fn detect(xml: &str) -> Orientation {
    page_size(xml)
        .map(|size| size.orientation())
        .unwrap_or_default()
}

fn get_attr(e: &BytesStart, local: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
}
