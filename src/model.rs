use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Opaque token naming a document the service has stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    /// Quick overview (~200 words)
    Short,
    /// Key points & concepts
    #[default]
    Medium,
    /// In-depth analysis
    Detailed,
}

impl SummaryMode {
    pub const ALL: [SummaryMode; 3] = [Self::Short, Self::Medium, Self::Detailed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Detailed => "detailed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Short => "TL;DR",
            Self::Medium => "Study Notes",
            Self::Detailed => "Detailed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Short => "Quick overview (~200 words)",
            Self::Medium => "Key points & concepts",
            Self::Detailed => "In-depth analysis",
        }
    }

    /// Accepts a mode name, a label or a 1-based position in [`SummaryMode::ALL`].
    pub fn from_choice(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(index) = input.parse::<usize>() {
            return index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        Self::ALL.into_iter().find(|mode| {
            mode.as_str().eq_ignore_ascii_case(input) || mode.label().eq_ignore_ascii_case(input)
        })
    }
}

impl Display for SummaryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file the intake accepted and that has not been uploaded yet.
///
/// Only [`crate::intake::Intake`] constructs these, so holding one means the
/// media type and size checks passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) media_type: String,
    pub(crate) size: u64,
}

impl PendingFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// What the service reported back for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub file_id: FileId,
    pub file_name: Option<String>,
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub mode: SummaryMode,
    pub text: String,
}
