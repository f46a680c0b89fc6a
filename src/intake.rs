//! Client-side validation of the document the user hands us.
//!
//! A file can arrive two ways: dropped onto the terminal (most terminals paste
//! the path, quoted or escaped) or picked explicitly as a path argument. Both
//! go through [`Intake::accept`], so the rules are identical for each.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::IntakeError;
use crate::model::PendingFile;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// A file the user offered, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub name: String,
    /// Empty when the type cannot be determined.
    pub media_type: String,
    pub size: u64,
}

impl Candidate {
    /// Describe a file on disk. The media type comes from the file name, the
    /// same way a browser fills in a picked file's type.
    pub fn from_path(path: &Path) -> Result<Self, IntakeError> {
        let metadata = std::fs::metadata(path).map_err(|e| IntakeError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(IntakeError::Unreadable {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            media_type,
            size: metadata.len(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Intake {
    selected: Option<String>,
    error: Option<IntakeError>,
}

impl Intake {
    /// Entry point for text pasted by a terminal drag-and-drop.
    pub fn drop_path(&mut self, raw: &str) -> Result<PendingFile, IntakeError> {
        let path = normalize_dropped_path(raw);
        self.pick_path(&path)
    }

    /// Entry point for an explicitly chosen path.
    pub fn pick_path(&mut self, path: &Path) -> Result<PendingFile, IntakeError> {
        match Candidate::from_path(path) {
            Ok(candidate) => self.accept(candidate),
            Err(e) => self.reject(e),
        }
    }

    /// Run the checks shared by every entry point.
    pub fn accept(&mut self, candidate: Candidate) -> Result<PendingFile, IntakeError> {
        if candidate.media_type != PDF_MEDIA_TYPE {
            return self.reject(IntakeError::InvalidType {
                media_type: candidate.media_type,
            });
        }
        if candidate.size > MAX_UPLOAD_BYTES {
            return self.reject(IntakeError::TooLarge {
                size: candidate.size,
            });
        }

        debug!(name = %candidate.name, size = candidate.size, "accepted file");
        self.selected = Some(candidate.name.clone());
        self.error = None;
        Ok(PendingFile {
            path: candidate.path,
            name: candidate.name,
            media_type: candidate.media_type,
            size: candidate.size,
        })
    }

    fn reject(&mut self, error: IntakeError) -> Result<PendingFile, IntakeError> {
        debug!(%error, "rejected file");
        self.error = Some(error.clone());
        Err(error)
    }

    /// Name of the last accepted file.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The validation error to show inline, if the last attempt failed.
    pub fn error(&self) -> Option<&IntakeError> {
        self.error.as_ref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.error = None;
    }
}

/// Turn what a terminal pastes for a dropped file back into a path.
///
/// Handles `'quoted paths'`, `"double quoted"`, backslash-escaped spaces and
/// `file://` URIs.
pub fn normalize_dropped_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();

    if trimmed.starts_with("file://")
        && let Some(path) = Url::parse(trimmed).ok().and_then(|u| u.to_file_path().ok())
    {
        return path;
    }

    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return PathBuf::from(&trimmed[1..trimmed.len() - 1]);
        }
    }

    let mut unescaped = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => unescaped.push(next),
                None => unescaped.push(c),
            }
        } else {
            unescaped.push(c);
        }
    }
    PathBuf::from(unescaped)
}
