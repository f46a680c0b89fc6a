//! The upload-then-summarize state machine.
//!
//! ```text
//! Idle ──submit_upload──▶ Uploading ──ok──▶ Ready ──request_summary──▶ Summarizing ──ok──▶ Done
//!  ▲                          │ err            ▲  ▲                          │ err           │
//!  │                          ▼                │  └──────────────────────────┘               │
//!  ├────────────────────── Idle + error        └──────────────── set_mode ───────────────────┤
//!  └──────────────────────────────────────────── reset ─────────────────────────────────────┘
//! ```
//!
//! Every operation takes `&mut self`, so one controller can never have two
//! calls outstanding. A call whose future is dropped before it resolves
//! leaves the workflow in `Uploading` or `Summarizing`; only `reset` leaves
//! those phases afterwards. Observers get snapshots through a [`watch`] channel.

use std::fmt::Display;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::SummaryService;
use crate::error::WorkflowError;
use crate::model::{FileId, PendingFile, Summary, SummaryMode, UploadedDocument};

pub const UPLOAD_FAILED: &str = "Upload failed";
pub const SUMMARIZE_FAILED: &str = "Summarization failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Ready,
    Summarizing,
    Done,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Uploading => write!(f, "uploading"),
            Phase::Ready => write!(f, "ready"),
            Phase::Summarizing => write!(f, "summarizing"),
            Phase::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Uploading {
        file: PendingFile,
    },
    Ready {
        document: UploadedDocument,
    },
    Summarizing {
        document: UploadedDocument,
    },
    Done {
        document: UploadedDocument,
        summary: Summary,
    },
}

impl WorkflowState {
    pub fn phase(&self) -> Phase {
        match self {
            WorkflowState::Idle => Phase::Idle,
            WorkflowState::Uploading { .. } => Phase::Uploading,
            WorkflowState::Ready { .. } => Phase::Ready,
            WorkflowState::Summarizing { .. } => Phase::Summarizing,
            WorkflowState::Done { .. } => Phase::Done,
        }
    }
}

/// Everything a view needs to draw the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub mode: SummaryMode,
    pub error: Option<String>,
}

impl WorkflowSnapshot {
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    #[cfg(test)]
    pub fn file(&self) -> Option<&PendingFile> {
        match &self.state {
            WorkflowState::Uploading { file } => Some(file),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        match &self.state {
            WorkflowState::Ready { document }
            | WorkflowState::Summarizing { document }
            | WorkflowState::Done { document, .. } => Some(document),
            _ => None,
        }
    }

    pub fn file_id(&self) -> Option<&FileId> {
        self.document().map(|d| &d.file_id)
    }

    pub fn summary(&self) -> Option<&Summary> {
        match &self.state {
            WorkflowState::Done { summary, .. } => Some(summary),
            _ => None,
        }
    }

    /// Whether the user may trigger a remote call right now.
    pub fn in_flight(&self) -> bool {
        matches!(self.phase(), Phase::Uploading | Phase::Summarizing)
    }
}

pub struct WorkflowController<S> {
    service: S,
    tx: watch::Sender<WorkflowSnapshot>,
}

impl<S: SummaryService> WorkflowController<S> {
    pub fn new(service: S, mode: SummaryMode) -> Self {
        let (tx, _) = watch::channel(WorkflowSnapshot {
            state: WorkflowState::Idle,
            mode,
            error: None,
        });
        Self { service, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.tx.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.tx.borrow().phase()
    }

    pub fn mode(&self) -> SummaryMode {
        self.tx.borrow().mode
    }

    #[cfg(test)]
    pub fn service(&self) -> &S {
        &self.service
    }

    fn update(&self, f: impl FnOnce(&mut WorkflowSnapshot)) {
        self.tx.send_modify(|snapshot| {
            let before = snapshot.phase();
            f(snapshot);
            debug!(from = %before, to = %snapshot.phase(), "workflow transition");
        });
    }

    /// Upload a validated file and keep the identifier the service hands back.
    ///
    /// Allowed from `Idle`, or from `Ready` to replace a document that was not
    /// summarized yet. On failure the file is dropped and the workflow goes
    /// back to `Idle`, so the user picks a file again.
    pub async fn submit_upload(&mut self, file: PendingFile) -> Result<FileId, WorkflowError> {
        let phase = self.phase();
        if !matches!(phase, Phase::Idle | Phase::Ready) {
            return Err(WorkflowError::InvalidState {
                operation: "upload",
                phase,
            });
        }

        self.update(|s| {
            s.state = WorkflowState::Uploading { file: file.clone() };
            s.error = None;
        });

        match self.service.upload(&file).await {
            Ok(document) => {
                info!(file_id = %document.file_id, name = %file.name(), "document uploaded");
                let file_id = document.file_id.clone();
                self.update(|s| s.state = WorkflowState::Ready { document });
                Ok(file_id)
            }
            Err(source) => {
                let message = source.user_message(UPLOAD_FAILED);
                warn!(error = %source, "upload failed");
                self.update(|s| {
                    s.state = WorkflowState::Idle;
                    s.error = Some(message.clone());
                });
                Err(WorkflowError::Upload { message, source })
            }
        }
    }

    /// Choose the summary mode for the next request.
    ///
    /// A summary already on display is discarded; summaries are never cached
    /// per mode. Refused in `Summarizing`, which is only observable here after
    /// a [`request_summary`](Self::request_summary) future was dropped early.
    pub fn set_mode(&mut self, mode: SummaryMode) -> Result<(), WorkflowError> {
        let phase = self.phase();
        if phase == Phase::Summarizing {
            return Err(WorkflowError::InvalidState {
                operation: "change mode",
                phase,
            });
        }

        self.update(|s| {
            if let WorkflowState::Done { document, .. } = &s.state {
                s.state = WorkflowState::Ready {
                    document: document.clone(),
                };
            }
            s.mode = mode;
        });
        Ok(())
    }

    /// Request a summary of the uploaded document in the current mode.
    ///
    /// Without an uploaded document this returns [`WorkflowError::NoFileId`]
    /// and makes no call. A failed request keeps the document so the user
    /// can retry.
    pub async fn request_summary(&mut self) -> Result<Summary, WorkflowError> {
        let snapshot = self.snapshot();
        let document = match snapshot.state {
            WorkflowState::Ready { document } => document,
            WorkflowState::Idle | WorkflowState::Uploading { .. } => {
                return Err(WorkflowError::NoFileId);
            }
            other => {
                return Err(WorkflowError::InvalidState {
                    operation: "summarize",
                    phase: other.phase(),
                });
            }
        };
        let mode = snapshot.mode;

        self.update(|s| {
            s.state = WorkflowState::Summarizing {
                document: document.clone(),
            };
            s.error = None;
        });

        match self.service.summarize(&document.file_id, mode).await {
            Ok(text) => {
                info!(file_id = %document.file_id, %mode, chars = text.len(), "summary ready");
                let summary = Summary { mode, text };
                self.update(|s| {
                    s.state = WorkflowState::Done {
                        document,
                        summary: summary.clone(),
                    }
                });
                Ok(summary)
            }
            Err(source) => {
                let message = source.user_message(SUMMARIZE_FAILED);
                warn!(error = %source, "summarization failed");
                self.update(|s| {
                    s.state = WorkflowState::Ready { document };
                    s.error = Some(message.clone());
                });
                Err(WorkflowError::Summarize { message, source })
            }
        }
    }

    /// Forget the file, identifier, summary and error and start over.
    pub fn reset(&mut self) {
        self.update(|s| {
            s.state = WorkflowState::Idle;
            s.error = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::time::Duration;

    use reqwest::StatusCode;

    use crate::error::ApiError;
    use crate::intake::{Candidate, Intake, MAX_UPLOAD_BYTES, PDF_MEDIA_TYPE};

    /// Service double that replays scripted outcomes and remembers what the
    /// workflow looked like while each call was outstanding.
    #[derive(Default)]
    struct ScriptedService {
        uploads: RefCell<VecDeque<Result<&'static str, Option<&'static str>>>>,
        summaries: RefCell<VecDeque<Result<&'static str, Option<&'static str>>>>,
        upload_calls: Cell<usize>,
        summarize_calls: RefCell<Vec<(FileId, SummaryMode)>>,
        observer: RefCell<Option<watch::Receiver<WorkflowSnapshot>>>,
        seen_during_call: RefCell<Vec<Phase>>,
        stall_summaries: Cell<bool>,
    }

    impl ScriptedService {
        fn upload_ok(self, id: &'static str) -> Self {
            self.uploads.borrow_mut().push_back(Ok(id));
            self
        }

        fn upload_err(self, detail: Option<&'static str>) -> Self {
            self.uploads.borrow_mut().push_back(Err(detail));
            self
        }

        fn summary_ok(self, text: &'static str) -> Self {
            self.summaries.borrow_mut().push_back(Ok(text));
            self
        }

        fn summary_err(self, detail: Option<&'static str>) -> Self {
            self.summaries.borrow_mut().push_back(Err(detail));
            self
        }

        fn summary_never_answers(self) -> Self {
            self.stall_summaries.set(true);
            self
        }

        fn record_phase(&self) {
            if let Some(rx) = self.observer.borrow().as_ref() {
                self.seen_during_call.borrow_mut().push(rx.borrow().phase());
            }
        }
    }

    fn failure(detail: Option<&'static str>) -> ApiError {
        ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.map(str::to_string),
        }
    }

    impl SummaryService for ScriptedService {
        async fn upload(&self, _file: &PendingFile) -> Result<UploadedDocument, ApiError> {
            self.upload_calls.set(self.upload_calls.get() + 1);
            self.record_phase();
            match self.uploads.borrow_mut().pop_front().expect("unscripted upload") {
                Ok(id) => Ok(UploadedDocument {
                    file_id: FileId::new(id),
                    file_name: None,
                    page_count: None,
                }),
                Err(detail) => Err(failure(detail)),
            }
        }

        async fn summarize(&self, file_id: &FileId, mode: SummaryMode) -> Result<String, ApiError> {
            self.summarize_calls.borrow_mut().push((file_id.clone(), mode));
            self.record_phase();
            if self.stall_summaries.get() {
                std::future::pending::<()>().await;
            }
            match self.summaries.borrow_mut().pop_front().expect("unscripted summarize") {
                Ok(text) => Ok(text.to_string()),
                Err(detail) => Err(failure(detail)),
            }
        }
    }

    fn controller(service: ScriptedService) -> WorkflowController<ScriptedService> {
        let controller = WorkflowController::new(service, SummaryMode::Medium);
        *controller.service().observer.borrow_mut() = Some(controller.subscribe());
        controller
    }

    fn pdf(size: u64) -> Candidate {
        Candidate {
            path: PathBuf::from("/docs/thesis.pdf"),
            name: "thesis.pdf".to_string(),
            media_type: PDF_MEDIA_TYPE.to_string(),
            size,
        }
    }

    fn accepted(size: u64) -> PendingFile {
        Intake::default().accept(pdf(size)).unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_summarize_scenario() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("abc123")
                .summary_ok("# TL;DR\n..."),
        );

        let file_id = controller.submit_upload(accepted(10_000_000)).await.unwrap();
        assert_eq!(file_id, FileId::new("abc123"));
        assert_eq!(controller.phase(), Phase::Ready);
        assert_eq!(controller.snapshot().file_id(), Some(&FileId::new("abc123")));

        controller.set_mode(SummaryMode::Short).unwrap();
        let summary = controller.request_summary().await.unwrap();
        assert_eq!(summary.text, "# TL;DR\n...");
        assert_eq!(summary.mode, SummaryMode::Short);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase(), Phase::Done);
        assert_eq!(snapshot.summary(), Some(&summary));
        assert_eq!(snapshot.error, None);
        assert_eq!(
            *controller.service().summarize_calls.borrow(),
            vec![(FileId::new("abc123"), SummaryMode::Short)]
        );
        assert_eq!(
            *controller.service().seen_during_call.borrow(),
            vec![Phase::Uploading, Phase::Summarizing]
        );
    }

    #[tokio::test]
    async fn test_rejected_files_never_reach_the_service() {
        let controller = controller(ScriptedService::default());
        let mut intake = Intake::default();

        let mut not_pdf = pdf(1024);
        not_pdf.media_type = "application/msword".to_string();
        let err = intake.accept(not_pdf).unwrap_err();
        assert_eq!(err.to_string(), "Please upload a valid PDF file.");

        let err = intake.accept(pdf(MAX_UPLOAD_BYTES + 1)).unwrap_err();
        assert_eq!(err.to_string(), "File size exceeds 50MB limit.");

        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.snapshot().error, None);
        assert_eq!(controller.service().upload_calls.get(), 0);
    }

    #[tokio::test]
    async fn test_summary_without_file_id_is_a_no_op() {
        let mut controller = controller(ScriptedService::default());

        let err = controller.request_summary().await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoFileId));
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.service().summarize_calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_returns_to_idle() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("first")
                .upload_err(Some("Error processing PDF: encrypted")),
        );
        controller.submit_upload(accepted(100)).await.unwrap();

        let err = controller.submit_upload(accepted(100)).await.unwrap_err();
        assert_eq!(err.to_string(), "Error processing PDF: encrypted");

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase(), Phase::Idle);
        assert_eq!(snapshot.file(), None);
        assert_eq!(snapshot.file_id(), None);
        assert_eq!(snapshot.error.as_deref(), Some("Error processing PDF: encrypted"));
    }

    #[tokio::test]
    async fn test_upload_failure_without_detail_uses_generic_message() {
        let mut controller = controller(ScriptedService::default().upload_err(None));

        controller.submit_upload(accepted(100)).await.unwrap_err();
        assert_eq!(controller.snapshot().error.as_deref(), Some(UPLOAD_FAILED));
    }

    #[tokio::test]
    async fn test_summarize_failure_keeps_file_id_for_retry() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("abc123")
                .summary_err(None)
                .summary_ok("## Notes"),
        );
        controller.submit_upload(accepted(100)).await.unwrap();

        let err = controller.request_summary().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Summarize { .. }));
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase(), Phase::Ready);
        assert_eq!(snapshot.file_id(), Some(&FileId::new("abc123")));
        assert_eq!(snapshot.error.as_deref(), Some(SUMMARIZE_FAILED));

        controller.set_mode(SummaryMode::Detailed).unwrap();
        let summary = controller.request_summary().await.unwrap();
        assert_eq!(summary.text, "## Notes");
        assert_eq!(controller.snapshot().error, None);
        assert_eq!(controller.service().upload_calls.get(), 1);
    }

    #[tokio::test]
    async fn test_summarize_failure_prefers_server_detail() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("abc123")
                .summary_err(Some("Summarization failed: model overloaded")),
        );
        controller.submit_upload(accepted(100)).await.unwrap();
        controller.request_summary().await.unwrap_err();

        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("Summarization failed: model overloaded")
        );
    }

    #[tokio::test]
    async fn test_changing_mode_discards_summary() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("abc123")
                .summary_ok("medium text")
                .summary_ok("short text"),
        );
        controller.submit_upload(accepted(100)).await.unwrap();
        controller.request_summary().await.unwrap();

        controller.set_mode(SummaryMode::Short).unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase(), Phase::Ready);
        assert_eq!(snapshot.summary(), None);
        assert_eq!(snapshot.file_id(), Some(&FileId::new("abc123")));

        let summary = controller.request_summary().await.unwrap();
        assert_eq!(summary.text, "short text");
        assert_eq!(controller.service().summarize_calls.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_after_done_clears_everything() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("abc123")
                .summary_ok("text"),
        );
        controller.submit_upload(accepted(100)).await.unwrap();
        controller.request_summary().await.unwrap();
        let mut rx = controller.subscribe();
        let _ = rx.borrow_and_update();

        controller.reset();

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.state, WorkflowState::Idle);
        assert_eq!(snapshot.file(), None);
        assert_eq!(snapshot.file_id(), None);
        assert_eq!(snapshot.summary(), None);
        assert_eq!(snapshot.error, None);
    }

    #[tokio::test]
    async fn test_reset_clears_error() {
        let mut controller = controller(ScriptedService::default().upload_err(Some("nope")));
        controller.submit_upload(accepted(100)).await.unwrap_err();
        assert!(controller.snapshot().error.is_some());

        controller.reset();
        assert_eq!(controller.snapshot().error, None);
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_upload_not_allowed_after_done() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("abc123")
                .summary_ok("text"),
        );
        controller.submit_upload(accepted(100)).await.unwrap();
        controller.request_summary().await.unwrap();

        let err = controller.submit_upload(accepted(100)).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidState { phase: Phase::Done, .. }
        ));
        assert_eq!(controller.service().upload_calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_summary_blocks_mode_change_until_reset() {
        let mut controller = controller(
            ScriptedService::default()
                .upload_ok("abc123")
                .summary_never_answers(),
        );
        controller.submit_upload(accepted(100)).await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_secs(5), controller.request_summary()).await;
        assert!(abandoned.is_err());
        assert_eq!(controller.phase(), Phase::Summarizing);
        assert!(controller.snapshot().in_flight());

        let err = controller.set_mode(SummaryMode::Short).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidState {
                operation: "change mode",
                phase: Phase::Summarizing
            }
        ));
        assert_eq!(controller.mode(), SummaryMode::Medium);

        controller.reset();
        assert_eq!(controller.phase(), Phase::Idle);
        controller.set_mode(SummaryMode::Short).unwrap();
        assert_eq!(controller.mode(), SummaryMode::Short);
    }

    #[test]
    fn test_in_flight_phases() {
        let snapshot = WorkflowSnapshot {
            state: WorkflowState::Uploading { file: accepted(1) },
            mode: SummaryMode::Medium,
            error: None,
        };
        assert!(snapshot.in_flight());
        assert_eq!(snapshot.file().map(|f| f.name()), Some("thesis.pdf"));

        let idle = WorkflowSnapshot {
            state: WorkflowState::Idle,
            ..snapshot
        };
        assert!(!idle.in_flight());
    }
}
