//! Template loading and filling
//!
//! [`Template`] ties the pieces together: it unpacks a DOCX into a scratch
//! [`Package`], lists or substitutes placeholders in the document body and
//! in header/footer parts, and zips the result back up.
//!
//! # Example
//!
//! ```no_run
//! use docfill_ooxml::{ReplacementMap, Template};
//!
//! let template = Template::load("letter.docx")?;
//! println!("tokens: {:?}", template.placeholders()?);
//!
//! let mut values = ReplacementMap::new();
//! values.insert("{{name}}", "Alice");
//! let filled = template.fill(&values)?;
//! filled.save("letter-alice.docx")?;
//! # Ok::<(), docfill_ooxml::FillError>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::Result;
use crate::events::{EventSink, FillEvent, NullSink};
use crate::orientation::{self, Orientation};
use crate::package::{write_atomic, Package, PackageStore, DOCUMENT_PART};
use crate::replacements::ReplacementMap;
use crate::scanner::{placeholders_in_markup, Delimiters};
use crate::substitute::{Substitutor, SubstitutionReport};

/// An unpacked DOCX template ready for inspection or filling
pub struct Template {
    package: Package,
    delimiters: Delimiters,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("package", &self.package)
            .field("delimiters", &self.delimiters)
            .finish_non_exhaustive()
    }
}

impl Template {
    /// Load a template from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(&PackageStore::new(), path)
    }

    /// Load a template, placing its scratch directory through `store`
    pub fn load_with<P: AsRef<Path>>(store: &PackageStore, path: P) -> Result<Self> {
        Ok(Self::from_package(store.extract(path)?))
    }

    /// Load a template from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(&PackageStore::new(), bytes)
    }

    /// Load a template from bytes, placing its scratch directory through `store`
    pub fn from_bytes_with(store: &PackageStore, bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_package(store.extract_bytes(bytes)?))
    }

    /// Wrap an already extracted package
    pub fn from_package(package: Package) -> Self {
        Self {
            package,
            delimiters: Delimiters::default(),
            sink: Arc::new(NullSink),
        }
    }

    /// Use a different placeholder delimiter pair
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Result<Self> {
        delimiters.validate()?;
        self.delimiters = delimiters;
        Ok(self)
    }

    /// Report progress to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The delimiter pair in use
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Get a reference to the underlying package
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Consume the template and return the underlying package
    pub fn into_package(self) -> Package {
        self.package
    }

    /// Parts that may carry placeholders: the document body first, then
    /// headers and footers
    pub fn content_parts(&self) -> Result<Vec<String>> {
        // Fails early with MissingPart when the body is absent
        self.package.read_part_bytes(DOCUMENT_PART)?;

        let mut parts = vec![DOCUMENT_PART.to_string()];
        parts.extend(self.package.header_footer_parts()?);
        Ok(parts)
    }

    /// Placeholder tokens in the template, in order of first appearance
    pub fn placeholders(&self) -> Result<Vec<String>> {
        let mut tokens: IndexSet<String> = IndexSet::new();
        for part in self.content_parts()? {
            let xml = self.package.read_part(&part)?;
            tokens.extend(placeholders_in_markup(&xml, &self.delimiters));
        }
        Ok(tokens.into_iter().collect())
    }

    /// Page orientation of the document body
    pub fn orientation(&self) -> Result<Orientation> {
        let xml = self.package.document_xml()?;
        Ok(orientation::detect(&xml))
    }

    /// Substitute `replacements` into every content part without
    /// repackaging; the parts are rewritten in the scratch directory
    pub fn substitute(&self, replacements: &ReplacementMap) -> Result<SubstitutionReport> {
        let sink = self.sink.as_ref();
        let parts = self.content_parts()?;
        sink.emit(&FillEvent::PackageExtracted {
            root: self.package.root().to_path_buf(),
            parts: self.package.parts()?.len(),
        });

        let substitutor = Substitutor::with_sink(sink);
        let mut report = SubstitutionReport::default();

        for part in parts {
            let xml = self.package.read_part(&part)?;
            let substitution = substitutor.apply(&xml, replacements)?;
            if substitution.markup != xml {
                self.package.write_part(&part, &substitution.markup)?;
                sink.emit(&FillEvent::PartRewritten { part });
            }
            report.merge(substitution.report);
        }

        for token in &report.unmatched {
            sink.emit(&FillEvent::TokenUnmatched {
                token: token.clone(),
            });
        }

        Ok(report)
    }

    /// Fill the template and produce the finished document
    ///
    /// The scratch directory is removed before returning, on success and on
    /// every error path.
    pub fn fill(self, replacements: &ReplacementMap) -> Result<FilledDocument> {
        let report = self.substitute(replacements)?;
        let bytes = self.package.repackage()?;
        self.sink.emit(&FillEvent::PackageRepackaged { bytes: bytes.len() });
        self.package.dispose()?;

        Ok(FilledDocument { bytes, report })
    }
}

/// A filled DOCX and the substitution report that produced it
#[derive(Debug, Clone)]
pub struct FilledDocument {
    /// The repackaged archive
    pub bytes: Vec<u8>,
    pub report: SubstitutionReport,
}

impl FilledDocument {
    /// Write the document to `path`, replacing it atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_atomic(path.as_ref(), &self.bytes)
    }
}

/// Fill the template at `input` and write the result to `output`
pub fn fill_file<P: AsRef<Path>, Q: AsRef<Path>>(
    store: &PackageStore,
    input: P,
    output: Q,
    replacements: &ReplacementMap,
    sink: Arc<dyn EventSink>,
) -> Result<SubstitutionReport> {
    let filled = Template::load_with(store, input)?
        .with_sink(sink)
        .fill(replacements)?;
    filled.save(output)?;
    Ok(filled.report)
}
