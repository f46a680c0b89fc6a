use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use autumnus::{FormatterOption, Options, highlight, themes};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::PresentError;
use crate::model::Summary;

pub const EXPORT_FILE_NAME: &str = "summary.md";
pub const EXPORT_CONTENT_TYPE: &str = "text/markdown";
pub const COPIED_INDICATOR_DURATION: Duration = Duration::from_secs(2);
/// How long an exiting process keeps serving copied text when nothing else
/// takes over the selection.
pub const CLIPBOARD_HAND_OFF: Duration = Duration::from_secs(30);

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), PresentError>;

    /// Set `text` and keep it available after this process lets go of the
    /// clipboard, waiting at most `linger`.
    fn hand_off(&mut self, text: &str, linger: Duration) -> Result<(), PresentError> {
        let _ = linger;
        self.set_text(text)
    }
}

/// The OS clipboard. The handle is kept for the whole session because X11 and
/// Wayland drop the contents together with the owning handle.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    fn handle(&mut self) -> Result<&mut arboard::Clipboard, PresentError> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new()?,
        };
        Ok(self.inner.insert(clipboard))
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), PresentError> {
        self.handle()?.set_text(text.to_string())?;
        Ok(())
    }

    /// Blocks until a clipboard manager or another application takes the
    /// selection, or until `linger` runs out.
    #[cfg(target_os = "linux")]
    fn hand_off(&mut self, text: &str, linger: Duration) -> Result<(), PresentError> {
        use arboard::SetExtLinux;

        let deadline = std::time::Instant::now() + linger;
        self.handle()?
            .set()
            .wait_until(deadline)
            .text(text.to_string())?;
        Ok(())
    }
}

/// Local actions on a finished summary. Nothing here touches the workflow.
#[derive(Debug, Default)]
pub struct Presenter {
    copied_at: Option<Instant>,
    last_copied: Option<String>,
}

impl Presenter {
    pub fn copy(
        &mut self,
        summary: &Summary,
        clipboard: &mut impl Clipboard,
    ) -> Result<(), PresentError> {
        clipboard.set_text(&summary.text)?;
        self.copied_at = Some(Instant::now());
        self.last_copied = Some(summary.text.clone());
        debug!(chars = summary.text.len(), "summary copied");
        Ok(())
    }

    /// True for two seconds after a successful copy.
    pub fn copied(&self) -> bool {
        self.copied_at
            .is_some_and(|at| at.elapsed() < COPIED_INDICATOR_DURATION)
    }

    /// Whether a copy is waiting for [`Presenter::release`].
    pub fn holds_clipboard(&self) -> bool {
        self.last_copied.is_some()
    }

    /// Hand the last copied summary over before the process exits. Does
    /// nothing when nothing was copied.
    pub fn release(&mut self, clipboard: &mut impl Clipboard) -> Result<(), PresentError> {
        let Some(text) = self.last_copied.take() else {
            return Ok(());
        };
        debug!(chars = text.len(), "handing off clipboard");
        clipboard.hand_off(&text, CLIPBOARD_HAND_OFF)
    }

    /// Write the raw summary.
    ///
    /// A directory target gets `summary.md` inside it, or `summary (1).md` and
    /// so on when that name is taken. An explicit file path is overwritten.
    pub fn export(&self, summary: &Summary, target: &Path) -> Result<PathBuf, PresentError> {
        let path = if target.is_dir() {
            write_new_in(target, &summary.text)?
        } else {
            if target.exists() {
                info!(path = %target.display(), "overwriting existing file");
            }
            std::fs::write(target, &summary.text).map_err(|source| PresentError::Export {
                path: target.to_path_buf(),
                source,
            })?;
            target.to_path_buf()
        };
        info!(path = %path.display(), content_type = EXPORT_CONTENT_TYPE, "summary exported");
        Ok(path)
    }
}

fn export_file_name(attempt: u32) -> String {
    match attempt {
        0 => EXPORT_FILE_NAME.to_string(),
        n => {
            let (stem, extension) = EXPORT_FILE_NAME
                .rsplit_once('.')
                .unwrap_or((EXPORT_FILE_NAME, ""));
            format!("{} ({}).{}", stem, n, extension)
        }
    }
}

fn write_new_in(dir: &Path, contents: &str) -> Result<PathBuf, PresentError> {
    let mut attempt = 0;
    loop {
        let path = dir.join(export_file_name(attempt));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())
                    .map_err(|source| PresentError::Export {
                        path: path.clone(),
                        source,
                    })?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(PresentError::Export { path, source }),
        }
    }
}

/// Markdown with terminal colours.
pub fn render_markdown(markdown: &str) -> String {
    highlight(
        markdown,
        Options {
            formatter: FormatterOption::Terminal {
                theme: Some(themes::get("ayu_light").expect("Syntax highlighting theme not found")),
            },
            lang_or_file: Some("markdown"),
        },
    )
}
