//! Scratch-directory handling for DOCX packages
//!
//! A DOCX file is a ZIP archive of XML parts. [`PackageStore::extract`]
//! unpacks one into a freshly created scratch directory, refusing entries
//! whose paths would land outside it ("zip-slip"). The returned [`Package`]
//! owns that directory: dropping it (or calling [`Package::dispose`])
//! removes everything, so every exit path of a request cleans up.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

use crate::error::{FillError, Result};

/// Path of the primary content part inside a word-processing package
pub const DOCUMENT_PART: &str = "word/document.xml";

const SCRATCH_PREFIX: &str = "docfill-pkg-";

/// Creates [`Package`] scratch directories from archives
#[derive(Debug, Clone, Default)]
pub struct PackageStore {
    /// Directory under which scratch directories are created
    /// (system temp dir when unset)
    scratch_root: Option<PathBuf>,
}

impl PackageStore {
    /// Create a store that uses the system temp directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create scratch directories under `root` instead of the system temp dir
    pub fn with_scratch_root(root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: Some(root.into()),
        }
    }

    /// The configured scratch root, if any
    pub fn scratch_root(&self) -> Option<&Path> {
        self.scratch_root.as_deref()
    }

    /// Open a DOCX file and unpack it into a new scratch directory
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<Package> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FillError::CorruptArchive {
            path: path.display().to_string(),
            source: zip::result::ZipError::Io(e),
        })?;
        self.extract_from(file, &path.display().to_string())
    }

    /// Unpack an in-memory archive into a new scratch directory
    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<Package> {
        self.extract_from(Cursor::new(bytes), "<memory>")
    }

    fn extract_from<R: Read + Seek>(&self, reader: R, label: &str) -> Result<Package> {
        let mut archive = ZipArchive::new(reader).map_err(|e| FillError::CorruptArchive {
            path: label.to_string(),
            source: e,
        })?;

        let dir = self.create_scratch_dir()?;
        let root = dir.path().canonicalize()?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| FillError::CorruptArchive {
                path: label.to_string(),
                source: e,
            })?;
            let name = entry.name().to_string();

            let relative = normalize_entry_path(&name)?;
            if relative.as_os_str().is_empty() {
                continue;
            }
            let target = root.join(&relative);
            if !target.starts_with(&root) {
                return Err(FillError::PathTraversal(name));
            }

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| extraction_failed(&name, e))?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| extraction_failed(&name, e))?;
                // Catches directories that resolve elsewhere through links
                let resolved = parent
                    .canonicalize()
                    .map_err(|e| extraction_failed(&name, e))?;
                if !resolved.starts_with(&root) {
                    return Err(FillError::PathTraversal(name));
                }
            }

            let mut out = File::create(&target).map_err(|e| extraction_failed(&name, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| extraction_failed(&name, e))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                // Owner must keep read/write so the part can be rewritten
                let mode = (mode & 0o7777) | 0o600;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                    .map_err(|e| extraction_failed(&name, e))?;
            }
        }

        log::debug!("Extracted {} entries from {} into {}", archive.len(), label, root.display());

        Ok(Package { dir, root })
    }

    fn create_scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match &self.scratch_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

fn extraction_failed(entry: &str, source: io::Error) -> FillError {
    FillError::ExtractionFailed {
        entry: entry.to_string(),
        source,
    }
}

/// Normalize a stored entry name into a relative path
///
/// Backslashes are treated as separators and `.` segments are dropped.
/// Absolute paths and any `..` segment are rejected outright, even when the
/// `..` would stay inside the root after resolution.
pub fn normalize_entry_path(name: &str) -> Result<PathBuf> {
    let unified = name.replace('\\', "/");
    let has_drive = unified.len() >= 2 && unified.as_bytes()[1] == b':';
    if unified.starts_with('/') || has_drive {
        return Err(FillError::PathTraversal(name.to_string()));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FillError::PathTraversal(name.to_string()));
            }
        }
    }
    Ok(normalized)
}

/// An unpacked package living in its own scratch directory
///
/// The directory is removed when the value is dropped.
#[derive(Debug)]
pub struct Package {
    dir: TempDir,
    /// Canonical form of `dir`, used for containment checks
    root: PathBuf,
}

impl Package {
    /// Root of the scratch directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a part name (e.g. `word/document.xml`) inside the package
    pub fn part_path(&self, part: &str) -> Result<PathBuf> {
        let relative = normalize_entry_path(part)?;
        if relative.as_os_str().is_empty() {
            return Err(FillError::MissingPart(part.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Check if a part exists
    pub fn has_part(&self, part: &str) -> bool {
        self.part_path(part).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Read a part as bytes
    pub fn read_part_bytes(&self, part: &str) -> Result<Vec<u8>> {
        let path = self.part_path(part)?;
        if !path.is_file() {
            return Err(FillError::MissingPart(part.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Read a part as UTF-8 text
    ///
    /// Invalid UTF-8 is an error; the bytes are never patched up, so a
    /// rewrite cannot corrupt a part it failed to decode.
    pub fn read_part(&self, part: &str) -> Result<String> {
        let bytes = self.read_part_bytes(part)?;
        String::from_utf8(bytes).map_err(|source| FillError::InvalidEncoding {
            part: part.to_string(),
            source,
        })
    }

    /// Overwrite (or create) a part
    pub fn write_part(&self, part: &str, contents: impl AsRef<[u8]>) -> Result<()> {
        let path = self.part_path(part)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Read the primary content part
    pub fn document_xml(&self) -> Result<String> {
        self.read_part(DOCUMENT_PART)
    }

    /// All regular files in the package, as forward-slash relative paths in
    /// lexical order
    pub fn parts(&self) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        collect_files(&self.root, &self.root, &mut parts)?;
        let mut names: Vec<String> = parts.into_iter().map(|(name, _)| name).collect();
        names.sort();
        Ok(names)
    }

    /// Header and footer parts (`word/header*.xml`, `word/footer*.xml`)
    pub fn header_footer_parts(&self) -> Result<Vec<String>> {
        Ok(self
            .parts()?
            .into_iter()
            .filter(|p| is_header_or_footer(p))
            .collect())
    }

    /// Zip the scratch directory back into an archive
    ///
    /// Entries are written in lexical path order so identical directories
    /// produce identical archives. Nothing is returned on failure.
    pub fn repackage(&self) -> Result<Vec<u8>> {
        let repackage_failed = |message: String| FillError::RepackageFailed {
            path: self.root.clone(),
            message,
        };

        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files)
            .map_err(|e| repackage_failed(e.to_string()))?;
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        // Fixed timestamps keep the output byte-for-byte reproducible
        let base_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for (name, path) in &files {
            let options = match file_mode(path) {
                Some(mode) => base_options.unix_permissions(mode),
                None => base_options,
            };
            zip.start_file(name.as_str(), options)
                .map_err(|e| repackage_failed(format!("{}: {}", name, e)))?;
            let mut input =
                File::open(path).map_err(|e| repackage_failed(format!("{}: {}", name, e)))?;
            io::copy(&mut input, &mut zip)
                .map_err(|e| repackage_failed(format!("{}: {}", name, e)))?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| repackage_failed(e.to_string()))?;

        log::debug!("Repackaged {} parts from {}", files.len(), self.root.display());

        Ok(cursor.into_inner())
    }

    /// Repackage into `dest`, replacing it atomically
    pub fn repackage_to<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let bytes = self.repackage()?;
        write_atomic(dest.as_ref(), &bytes)
    }

    /// Remove the scratch directory now, reporting any failure
    pub fn dispose(self) -> Result<()> {
        let root = self.root.clone();
        self.dir.close()?;
        log::debug!("Disposed package {}", root.display());
        Ok(())
    }
}

/// Write `bytes` to `dest` through a sibling temporary file
///
/// A failure never leaves a truncated file at `dest`.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let failed = |message: String| FillError::RepackageFailed {
        path: dest.to_path_buf(),
        message,
    };

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(&parent).map_err(|e| failed(e.to_string()))?;
    staged.write_all(bytes).map_err(|e| failed(e.to_string()))?;
    staged.flush().map_err(|e| failed(e.to_string()))?;
    staged
        .persist(dest)
        .map_err(|e| failed(e.error.to_string()))?;
    Ok(())
}

fn is_header_or_footer(part: &str) -> bool {
    part.strip_prefix("word/")
        .filter(|rest| !rest.contains('/') && rest.ends_with(".xml"))
        .map(|rest| rest.starts_with("header") || rest.starts_with("footer"))
        .unwrap_or(false)
}

/// Recursively collect regular files below `dir` as (relative name, path)
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path.strip_prefix(root).map_err(io::Error::other)?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((name, path));
        }
    }
    Ok(())
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Option<u32> {
    None
}
