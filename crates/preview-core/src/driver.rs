use crate::controller::PreviewController;
use crate::session::{CloseTrigger, LoadOutcome, LoadRequest, PreviewState};
use crate::url::ObjectUrlRegistry;
use crate::PreviewError;
use intake_model::{FileSource, FileStore, RecordId};
use pdf_engine::{
    DocumentHandle, LoadOptions, OpenSource, PdfEngine, PdfEngineError, RenderRequest, RgbaImage,
};

/// Runs preview loads synchronously against a rendering engine.
///
/// Keeps the engine handle of the unlocked document and closes it whenever
/// the session ends, whichever way it ends.
pub struct PreviewDriver<E: PdfEngine, R: ObjectUrlRegistry> {
    engine: E,
    controller: PreviewController<R>,
    loaded: Option<DocumentHandle>,
}

impl<E: PdfEngine, R: ObjectUrlRegistry> PreviewDriver<E, R> {
    pub fn new(engine: E, urls: R) -> Self {
        if !engine.suppresses_native_prompt() {
            tracing::warn!(
                "rendering engine cannot suppress its own password prompt; \
                 users may be asked twice"
            );
        }

        Self { engine, controller: PreviewController::new(urls), loaded: None }
    }

    pub fn controller(&self) -> &PreviewController<R> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PreviewController<R> {
        &mut self.controller
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> PreviewState {
        self.controller.state()
    }

    pub fn open(
        &mut self,
        store: &mut FileStore,
        id: RecordId,
    ) -> Result<PreviewState, PreviewError> {
        // A rejected target leaves the current preview untouched.
        let request = self.controller.open(store, id)?;
        self.release_document();

        if let Some(request) = request {
            self.run(store, request);
        }

        Ok(self.state())
    }

    pub fn submit_password(
        &mut self,
        store: &mut FileStore,
        password: impl Into<String>,
    ) -> PreviewState {
        if let Some(request) = self.controller.submit_password(password) {
            self.run(store, request);
        }

        self.state()
    }

    pub fn cancel_password(&mut self) -> bool {
        self.controller.cancel_password()
    }

    pub fn close(&mut self) -> bool {
        self.release_document();
        self.controller.close()
    }

    pub fn dismiss(&mut self, trigger: CloseTrigger) -> bool {
        self.release_document();
        self.controller.dismiss(trigger)
    }

    /// Executes one load and reports the result to the controller.
    pub fn run(&mut self, store: &mut FileStore, request: LoadRequest) -> LoadOutcome {
        let LoadRequest { token, source, password } = request;
        if token.is_cancelled() {
            return LoadOutcome::Ignored;
        }

        let options = LoadOptions { password };
        match self.engine.load(open_source(&source), &options) {
            Ok(loaded) => {
                let outcome = self.controller.on_load_success(store, &token, loaded.page_count);
                if outcome == LoadOutcome::Unlocked {
                    self.release_document();
                    self.loaded = Some(loaded.handle);
                } else if let Err(err) = self.engine.close(loaded.handle) {
                    tracing::debug!(error = %err, "failed to close stale document");
                }
                outcome
            }
            Err(err) => self.controller.on_load_error(store, &token, &err),
        }
    }

    /// Renders the current page at the current zoom; `None` unless unlocked.
    pub fn render_current_page(&self) -> Result<Option<RgbaImage>, PdfEngineError> {
        let Some(handle) = self.loaded else {
            return Ok(None);
        };
        let Some(session) = self.controller.session() else {
            return Ok(None);
        };
        if session.state() != PreviewState::Unlocked {
            return Ok(None);
        }

        let view = session.page_view();
        let request = RenderRequest { page_index: view.page_index(), scale: view.zoom() };
        self.engine.render_page(handle, request).map(Some)
    }

    fn release_document(&mut self) {
        if let Some(handle) = self.loaded.take() {
            if let Err(err) = self.engine.close(handle) {
                tracing::debug!(error = %err, "failed to close preview document");
            }
        }
    }
}

fn open_source(source: &FileSource) -> OpenSource {
    match source {
        FileSource::Path(path) => OpenSource::Path(path.clone()),
        FileSource::Bytes(bytes) => OpenSource::Bytes(bytes.to_vec()),
    }
}
