//! Serializes a run's documents into a single deliverable file.
//!
//! One requested type yields a standalone XML file; otherwise every produced
//! document goes into a ZIP archive with one `<TYPE>.xml` entry per type.
//! The scratch directory is shared across concurrent runs, so file names are
//! qualified with a timestamp and a unique token.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::core::{ExportError, SequenceType};

/// Scratch directory permission mode on Unix.
#[cfg(unix)]
const SCRATCH_DIR_MODE: u32 = 0o775;

/// What the caller asked to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// Exactly one document, as raw XML.
    Single(SequenceType),
    /// Everything produced, as a ZIP archive.
    Bundle,
}

/// Result of the packaging step.
#[derive(Debug)]
pub enum PackageOutcome {
    /// A file was written and is ready to stream.
    Delivered(Deliverable),
    /// No document was produced at all; nothing to export.
    Empty,
    /// A single type was requested but this run produced no document for it.
    TypeNotProduced(SequenceType),
}

/// A written export file, ready to be streamed to the caller.
///
/// Cleanup is deferred: the file is removed by [`Deliverable::remove_file`]
/// once the transfer has fully completed. A dropped `Deliverable` (aborted
/// transfer) leaves the scratch file in place on purpose — the commit phase
/// must not run for a download that never finished.
#[derive(Debug)]
pub struct Deliverable {
    path: PathBuf,
    file_name: String,
    content_type: &'static str,
}

impl Deliverable {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// MIME type for the download response.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Open the file for streaming.
    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.path)
    }

    /// Delete the scratch file after the stream has been fully delivered.
    pub fn remove_file(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }
}

/// Writes deliverables into a scratch directory.
#[derive(Debug, Clone)]
pub struct Packager {
    directory: PathBuf,
}

impl Packager {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Package the serialized documents according to the delivery target.
    pub fn package(
        &self,
        documents: &BTreeMap<SequenceType, String>,
        target: DeliveryTarget,
    ) -> Result<PackageOutcome, ExportError> {
        if documents.is_empty() {
            return Ok(PackageOutcome::Empty);
        }

        match target {
            DeliveryTarget::Single(sequence_type) => {
                let Some(xml) = documents.get(&sequence_type) else {
                    return Ok(PackageOutcome::TypeNotProduced(sequence_type));
                };
                let file_name = format!(
                    "sepa-exports-{}-{}-{}.xml",
                    sequence_type.code(),
                    timestamp(),
                    unique_token()
                );
                let path = self.prepare_path(&file_name)?;
                fs::write(&path, xml)?;
                Ok(PackageOutcome::Delivered(Deliverable {
                    path,
                    file_name,
                    content_type: "text/xml",
                }))
            }
            DeliveryTarget::Bundle => {
                let file_name = format!("sepa-exports-{}-{}.zip", timestamp(), unique_token());
                let path = self.prepare_path(&file_name)?;

                let file = File::create(&path)?;
                let mut zip = ZipWriter::new(file);
                let options = SimpleFileOptions::default();
                for (sequence_type, xml) in documents {
                    zip.start_file(format!("{}.xml", sequence_type.code()), options)
                        .map_err(|e| ExportError::Archive(e.to_string()))?;
                    zip.write_all(xml.as_bytes())?;
                }
                zip.finish()
                    .map_err(|e| ExportError::Archive(e.to_string()))?;

                Ok(PackageOutcome::Delivered(Deliverable {
                    path,
                    file_name,
                    content_type: "application/zip",
                }))
            }
        }
    }

    fn prepare_path(&self, file_name: &str) -> Result<PathBuf, ExportError> {
        if !self.directory.is_dir() {
            fs::create_dir_all(&self.directory)?;
            log::debug!("created scratch directory {}", self.directory.display());
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&self.directory, fs::Permissions::from_mode(SCRATCH_DIR_MODE))?;
            }
        }
        Ok(self.directory.join(file_name))
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d-%Hh").to_string()
}

/// Unique per file: wall-clock nanos, process id and a process-local counter.
fn unique_token() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!(
        "{:x}{:x}{:x}",
        nanos,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        let a = unique_token();
        let b = unique_token();
        assert_ne!(a, b);
    }
}
