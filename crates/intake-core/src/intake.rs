use crate::config::Settings;
use crate::dialog::{ConfirmAction, ConfirmDialog};
use crate::notify::{NoticeLevel, Notifier};
use crate::select::{self, Rejection};
use crate::submit::{Ack, BatchSubmitter, SubmitError, Transport};
use intake_model::{
    AddOutcome, FileHandle, FileRecord, FileStore, Incoming, ProjectionCache, RecordId,
    SortDirection, SortKey, ViewQuery,
};
use pdf_engine::PdfEngine;
use preview_core::{BlobUrlRegistry, CloseTrigger, PreviewDriver, PreviewError, PreviewState};

/// The staging screen: the file store, its current view, the pending
/// confirmation and the single open preview.
pub struct Intake<E: PdfEngine, N: Notifier> {
    store: FileStore,
    query: ViewQuery,
    projection: ProjectionCache,
    pending: Option<ConfirmDialog>,
    preview: PreviewDriver<E, BlobUrlRegistry>,
    notifier: N,
}

impl<E: PdfEngine, N: Notifier> Intake<E, N> {
    pub fn new(engine: E, notifier: N) -> Self {
        Self {
            store: FileStore::new(),
            query: ViewQuery::default(),
            projection: ProjectionCache::new(),
            pending: None,
            preview: PreviewDriver::new(engine, BlobUrlRegistry::new()),
            notifier,
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn add(&mut self, incoming: impl IntoIterator<Item = Incoming>) -> AddOutcome {
        let outcome = self.store.add(incoming);
        if let Some(notice) = outcome.duplicate_notice() {
            self.notifier.notify(NoticeLevel::Warning, &notice.to_string());
        }
        outcome
    }

    /// Screens raw selections and stages what passes.
    pub fn add_files(
        &mut self,
        files: impl IntoIterator<Item = FileHandle>,
        settings: &Settings,
    ) -> (AddOutcome, Vec<Rejection>) {
        let screened = select::screen(files, settings);
        for rejection in &screened.rejected {
            self.notifier.notify(
                NoticeLevel::Warning,
                &format!("\"{}\" was not added: {}", rejection.name, rejection.reason),
            );
        }

        (self.add(screened.incoming), screened.rejected)
    }

    pub fn set_password(&mut self, id: RecordId, password: impl Into<String>) -> bool {
        self.store.set_password(id, password)
    }

    /// Asks for confirmation before clearing; `false` when nothing is staged.
    pub fn request_clear_all(&mut self) -> bool {
        if self.store.is_empty() {
            return false;
        }
        self.pending = Some(ConfirmDialog::clear_all());
        true
    }

    pub fn request_remove(&mut self, id: RecordId) -> bool {
        match ConfirmDialog::remove(&self.store, id) {
            Some(dialog) => {
                self.pending = Some(dialog);
                true
            }
            None => false,
        }
    }

    pub fn pending_confirmation(&self) -> Option<&ConfirmDialog> {
        self.pending.as_ref()
    }

    /// Applies the pending action, closing the preview if it shows a removed file.
    pub fn confirm(&mut self) -> Option<ConfirmAction> {
        let action = self.pending.take()?.confirm();

        match action {
            ConfirmAction::ClearAll => {
                self.preview.close();
                let removed = self.store.clear();
                tracing::debug!(removed, "cleared staged files");
            }
            ConfirmAction::Remove(id) => {
                let previewing = self
                    .preview
                    .controller()
                    .session()
                    .is_some_and(|session| session.target() == id);
                if previewing {
                    self.preview.close();
                }
                self.store.remove(id);
            }
        }

        Some(action)
    }

    pub fn cancel_confirmation(&mut self) -> bool {
        match self.pending.take() {
            Some(dialog) => {
                dialog.cancel();
                true
            }
            None => false,
        }
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.query.query = query.into();
    }

    pub fn set_sort(&mut self, sort_by: SortKey) {
        self.query.sort_by = sort_by;
    }

    pub fn toggle_direction(&mut self) -> SortDirection {
        self.query.direction = self.query.direction.toggled();
        self.query.direction
    }

    pub fn visible(&mut self) -> Vec<&FileRecord> {
        let ids = self.projection.ids(&self.store, &self.query);
        ids.iter().filter_map(|id| self.store.get(*id)).collect()
    }

    pub fn preview(&self) -> &PreviewDriver<E, BlobUrlRegistry> {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut PreviewDriver<E, BlobUrlRegistry> {
        &mut self.preview
    }

    pub fn open_preview(&mut self, id: RecordId) -> Result<PreviewState, PreviewError> {
        self.preview.open(&mut self.store, id)
    }

    pub fn submit_password(&mut self, password: impl Into<String>) -> PreviewState {
        self.preview.submit_password(&mut self.store, password)
    }

    pub fn cancel_password(&mut self) -> bool {
        self.preview.cancel_password()
    }

    pub fn close_preview(&mut self, trigger: CloseTrigger) -> bool {
        self.preview.dismiss(trigger)
    }

    pub async fn submit<T: Transport + ?Sized>(
        &self,
        submitter: &BatchSubmitter,
        transport: &T,
    ) -> Result<Ack, SubmitError> {
        submitter.submit(&self.store, transport, &self.notifier).await
    }
}
