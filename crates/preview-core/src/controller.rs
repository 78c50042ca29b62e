//! PDF unlock state machine
//!
//! The controller owns at most one [`PreviewSession`]. Opening a preview
//! replaces any live session wholesale; closing (by any trigger) discards it
//! and revokes its object URL.
//!
//! Transitions:
//!
//! ```text
//! Idle ──open(protected, no saved pw)──▶ AwaitingPassword
//! Idle ──open(otherwise)───────────────▶ Validating
//! AwaitingPassword ──submit──▶ Validating      (attempt_count += 1)
//! AwaitingPassword ──cancel──▶ Cancelled
//! Validating ──success──────────▶ Unlocked     (password written to the record)
//! Validating ──password error───▶ AwaitingPassword
//! Validating ──other error──────▶ Failed
//! any ──close──▶ Idle
//! ```

use crate::cancel::{LoadToken, SessionId};
use crate::page_view::PageView;
use crate::session::{
    CloseTrigger, DownloadRequest, LoadOutcome, LoadRequest, Phase, PreviewSession, PreviewState,
};
use crate::url::ObjectUrlRegistry;
use crate::PreviewError;
use intake_model::{FileStore, RecordId};
use pdf_engine::PdfEngineError;

pub const INCORRECT_PASSWORD_MESSAGE: &str = "Incorrect password. Please try again.";
pub const PASSWORD_REQUIRED_MESSAGE: &str = "This PDF is password protected. Enter the password to view it.";
pub const CANCELLED_MESSAGE: &str =
    "Password entry was canceled. This PDF requires a password to view.";

pub struct PreviewController<R: ObjectUrlRegistry> {
    urls: R,
    session: Option<PreviewSession>,
    next_session: u64,
}

impl<R: ObjectUrlRegistry> PreviewController<R> {
    pub fn new(urls: R) -> Self {
        Self { urls, session: None, next_session: 0 }
    }

    pub fn urls(&self) -> &R {
        &self.urls
    }

    pub fn session(&self) -> Option<&PreviewSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> PreviewState {
        self.session.as_ref().map_or(PreviewState::Idle, PreviewSession::state)
    }

    /// Opens a preview of `id`, discarding any session that is already open.
    ///
    /// Returns the load the host must run, or `None` when the session waits
    /// for a password first.
    pub fn open(
        &mut self,
        store: &FileStore,
        id: RecordId,
    ) -> Result<Option<LoadRequest>, PreviewError> {
        let record = store.get(id).ok_or(PreviewError::UnknownRecord(id))?;
        if !record.handle.can_preview() {
            return Err(PreviewError::NotPreviewable(record.handle.name().to_owned()));
        }

        self.close();

        self.next_session += 1;
        let session_id = SessionId(self.next_session);
        let awaiting = record.is_password_protected && record.saved_password.is_none();

        let session = PreviewSession {
            id: session_id,
            target: id,
            file_name: record.handle.name().to_owned(),
            source: record.handle.source().clone(),
            attempted_password: record.saved_password.clone(),
            attempt_count: 0,
            phase: if awaiting { Phase::AwaitingPassword } else { Phase::Validating },
            password_error: None,
            page_view: PageView::default(),
            url: self.urls.create(record),
            token: LoadToken::new(session_id, 0),
            password_saved: false,
        };

        tracing::debug!(
            session = session_id.0,
            record = id.0,
            state = %session.state(),
            "opened preview"
        );

        let request = (!awaiting).then(|| session.request());
        self.session = Some(session);
        Ok(request)
    }

    pub fn submit_password(&mut self, password: impl Into<String>) -> Option<LoadRequest> {
        let session = self.session.as_mut()?;
        if session.phase != Phase::AwaitingPassword {
            return None;
        }

        session.token.cancel();
        session.attempt_count += 1;
        session.token = LoadToken::new(session.id, session.attempt_count);
        session.attempted_password = Some(password.into());
        session.password_error = None;
        session.phase = Phase::Validating;

        tracing::debug!(
            session = session.id.0,
            attempt = session.attempt_count,
            "validating submitted password"
        );

        Some(session.request())
    }

    pub fn cancel_password(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.phase != Phase::AwaitingPassword {
            return false;
        }

        session.attempted_password = None;
        session.password_error = None;
        session.phase = Phase::Cancelled(CANCELLED_MESSAGE.to_owned());

        tracing::debug!(session = session.id.0, "password entry cancelled");
        true
    }

    pub fn on_load_success(
        &mut self,
        store: &mut FileStore,
        token: &LoadToken,
        page_count: u32,
    ) -> LoadOutcome {
        let Some(session) = self.validating_session(token) else {
            return LoadOutcome::Ignored;
        };

        session.phase = Phase::Unlocked;
        session.password_error = None;
        session.page_view = PageView::with_page_count(page_count);

        if let Some(password) = session.attempted_password.as_deref() {
            if !session.password_saved {
                if store.password(session.target) != Some(password) {
                    store.set_password(session.target, password);
                }
                session.password_saved = true;
            }
        }

        tracing::debug!(session = session.id.0, page_count, "preview unlocked");
        LoadOutcome::Unlocked
    }

    pub fn on_load_error(
        &mut self,
        store: &mut FileStore,
        token: &LoadToken,
        error: &PdfEngineError,
    ) -> LoadOutcome {
        let Some(session) = self.validating_session(token) else {
            return LoadOutcome::Ignored;
        };

        if error.is_password_failure() {
            store.mark_protected(session.target);

            let message = if session.attempted_password.is_some() {
                INCORRECT_PASSWORD_MESSAGE
            } else {
                PASSWORD_REQUIRED_MESSAGE
            };
            session.password_error = Some(message.to_owned());
            session.attempted_password = None;
            session.phase = Phase::AwaitingPassword;

            tracing::debug!(
                session = session.id.0,
                attempt = session.attempt_count,
                "password rejected"
            );
            return LoadOutcome::PasswordPrompt;
        }

        tracing::warn!(session = session.id.0, error = %error, "preview failed to render");
        session.phase = Phase::Failed(error.to_string());
        LoadOutcome::Failed
    }

    /// Discards the live session from any state. Returns whether one was open.
    pub fn close(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };

        session.token.cancel();
        tracing::debug!(session = session.id.0, state = %session.state(), "closed preview");
        self.urls.revoke(session.url);
        true
    }

    pub fn dismiss(&mut self, trigger: CloseTrigger) -> bool {
        tracing::trace!(?trigger, "preview dismissed");
        self.close()
    }

    pub fn next_page(&mut self) -> bool {
        self.unlocked_view().is_some_and(PageView::next_page)
    }

    pub fn previous_page(&mut self) -> bool {
        self.unlocked_view().is_some_and(PageView::previous_page)
    }

    pub fn go_to_page(&mut self, page: u32) -> bool {
        self.unlocked_view().is_some_and(|view| view.go_to_page(page))
    }

    pub fn zoom_in(&mut self) -> bool {
        self.unlocked_view().is_some_and(PageView::zoom_in)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.unlocked_view().is_some_and(PageView::zoom_out)
    }

    pub fn reset_zoom(&mut self) -> bool {
        self.unlocked_view().is_some_and(PageView::reset_zoom)
    }

    pub fn toggle_fullscreen(&mut self) -> Option<bool> {
        self.unlocked_view().map(PageView::toggle_fullscreen)
    }

    pub fn download(&self) -> Option<DownloadRequest<'_>> {
        let session = self.session.as_ref()?;
        if session.phase != Phase::Unlocked {
            return None;
        }

        Some(DownloadRequest { file_name: &session.file_name, url: session.url.as_str() })
    }

    fn validating_session(&mut self, token: &LoadToken) -> Option<&mut PreviewSession> {
        let session = self.session.as_mut();

        let live = session.filter(|session| {
            session.phase == Phase::Validating
                && session.token.matches(token)
                && !token.is_cancelled()
        });

        if live.is_none() {
            tracing::trace!(
                session = token.session.0,
                attempt = token.attempt,
                "ignoring stale load completion"
            );
        }

        live
    }

    fn unlocked_view(&mut self) -> Option<&mut PageView> {
        self.session
            .as_mut()
            .filter(|session| session.phase == Phase::Unlocked)
            .map(|session| &mut session.page_view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::BlobUrlRegistry;
    use intake_model::{FileHandle, Incoming};

    fn stage(store: &mut FileStore, name: &str, size: usize, protected: bool) -> RecordId {
        store.add([Incoming::new(FileHandle::from_bytes(name, vec![0_u8; size], 0), protected)])
            .accepted[0]
    }

    fn controller() -> PreviewController<BlobUrlRegistry> {
        PreviewController::new(BlobUrlRegistry::new())
    }

    #[test]
    fn unprotected_file_goes_straight_to_unlocked() {
        let mut store = FileStore::new();
        let outcome = store.add([Incoming::new(FileHandle::from_bytes("a.pdf", vec![0_u8; 100], 0), false)]);
        let again = store.add([Incoming::new(FileHandle::from_bytes("a.pdf", vec![0_u8; 100], 0), false)]);
        assert_eq!(store.len(), 1);
        assert!(again.duplicate_notice().is_some());

        let id = outcome.accepted[0];
        let mut preview = controller();
        let mut visited = vec![preview.state()];

        let request = preview.open(&store, id).expect("open should succeed").expect("load expected");
        visited.push(preview.state());

        let result = preview.on_load_success(&mut store, &request.token, 4);
        visited.push(preview.state());

        assert_eq!(result, LoadOutcome::Unlocked);
        assert_eq!(
            visited,
            vec![PreviewState::Idle, PreviewState::Validating, PreviewState::Unlocked]
        );
        assert_eq!(request.password, None);
        assert_eq!(store.password(id), None);

        let mut steps = 0;
        while preview.zoom_in() {
            steps += 1;
        }
        assert_eq!(steps, 9);
        assert_eq!(preview.session().map(|s| s.page_view().zoom()), Some(3.0));
    }

    #[test]
    fn wrong_then_right_password_unlocks_and_saves() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "b.pdf", 200, true);
        let mut preview = controller();

        let initial = preview.open(&store, id).expect("open should succeed");
        assert!(initial.is_none());
        assert_eq!(preview.state(), PreviewState::AwaitingPassword);

        let wrong = preview.submit_password("wrong").expect("submission expected");
        assert_eq!(preview.state(), PreviewState::Validating);
        assert_eq!(wrong.password.as_deref(), Some("wrong"));

        let result =
            preview.on_load_error(&mut store, &wrong.token, &PdfEngineError::IncorrectPassword);
        assert_eq!(result, LoadOutcome::PasswordPrompt);

        let session = preview.session().expect("session expected");
        assert_eq!(session.state(), PreviewState::AwaitingPassword);
        assert_eq!(session.attempt_count(), 1);
        assert_eq!(session.password_error(), Some(INCORRECT_PASSWORD_MESSAGE));
        assert_eq!(store.password(id), None);

        let right = preview.submit_password("right").expect("submission expected");
        assert!(right.token.attempt > wrong.token.attempt);
        assert_eq!(preview.on_load_success(&mut store, &right.token, 2), LoadOutcome::Unlocked);
        assert_eq!(store.password(id), Some("right"));

        assert!(preview.close());
        assert_eq!(preview.state(), PreviewState::Idle);

        let reopened = preview
            .open(&store, id)
            .expect("open should succeed")
            .expect("saved password should skip the prompt");
        assert_eq!(preview.state(), PreviewState::Validating);
        assert_eq!(reopened.password.as_deref(), Some("right"));
        assert_eq!(preview.session().map(PreviewSession::attempt_count), Some(0));

        assert_eq!(preview.on_load_success(&mut store, &reopened.token, 2), LoadOutcome::Unlocked);
    }

    #[test]
    fn each_wrong_password_increments_attempts_by_one() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "c.pdf", 10, true);
        let mut preview = controller();
        preview.open(&store, id).expect("open should succeed");

        for expected in 1..=4 {
            let request = preview.submit_password(format!("guess-{expected}")).expect("submission");
            preview.on_load_error(&mut store, &request.token, &PdfEngineError::IncorrectPassword);
            assert_eq!(preview.session().map(PreviewSession::attempt_count), Some(expected));
            assert_eq!(preview.state(), PreviewState::AwaitingPassword);
        }
    }

    #[test]
    fn fatal_error_fails_the_session() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "broken.pdf", 10, false);
        let mut preview = controller();

        let request = preview.open(&store, id).expect("open").expect("load expected");
        let error = PdfEngineError::Backend("corrupt xref table".to_owned());

        assert_eq!(preview.on_load_error(&mut store, &request.token, &error), LoadOutcome::Failed);
        assert_eq!(preview.state(), PreviewState::Failed);
        assert_eq!(
            preview.session().and_then(PreviewSession::error_message),
            Some("backend error: corrupt xref table")
        );
        assert!(!preview.zoom_in());
        assert!(preview.download().is_none());
    }

    #[test]
    fn unflagged_file_that_needs_a_password_prompts_and_is_marked() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "surprise.pdf", 10, false);
        let mut preview = controller();

        let request = preview.open(&store, id).expect("open").expect("load expected");
        let result =
            preview.on_load_error(&mut store, &request.token, &PdfEngineError::PasswordRequired);

        assert_eq!(result, LoadOutcome::PasswordPrompt);
        assert!(store.is_protected(id));
        assert_eq!(
            preview.session().and_then(PreviewSession::password_error),
            Some(PASSWORD_REQUIRED_MESSAGE)
        );
    }

    #[test]
    fn cancelling_leaves_saved_password_untouched_and_reopen_prompts_again() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "d.pdf", 10, true);
        let mut preview = controller();

        preview.open(&store, id).expect("open should succeed");
        assert!(preview.cancel_password());
        assert_eq!(preview.state(), PreviewState::Cancelled);
        assert_eq!(
            preview.session().and_then(PreviewSession::error_message),
            Some(CANCELLED_MESSAGE)
        );
        assert!(preview.submit_password("late").is_none());
        assert_eq!(store.password(id), None);

        assert!(preview.dismiss(CloseTrigger::CloseButton));
        assert!(preview.open(&store, id).expect("open should succeed").is_none());
        assert_eq!(preview.state(), PreviewState::AwaitingPassword);
    }

    #[test]
    fn stale_completion_from_superseded_attempt_is_ignored() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "e.pdf", 10, true);
        let mut preview = controller();
        preview.open(&store, id).expect("open should succeed");

        let first = preview.submit_password("one").expect("submission");
        preview.on_load_error(&mut store, &first.token, &PdfEngineError::IncorrectPassword);
        let second = preview.submit_password("two").expect("submission");

        assert!(first.token.is_cancelled());
        assert_eq!(preview.on_load_success(&mut store, &first.token, 3), LoadOutcome::Ignored);
        assert_eq!(preview.state(), PreviewState::Validating);
        assert_eq!(store.password(id), None);

        assert_eq!(preview.on_load_success(&mut store, &second.token, 3), LoadOutcome::Unlocked);
        assert_eq!(store.password(id), Some("two"));
    }

    #[test]
    fn opening_new_preview_discards_old_session_and_its_callbacks() {
        let mut store = FileStore::new();
        let first_id = stage(&mut store, "first.pdf", 10, false);
        let second_id = stage(&mut store, "second.pdf", 20, false);
        let mut preview = controller();

        let first = preview.open(&store, first_id).expect("open").expect("load expected");
        let second = preview.open(&store, second_id).expect("open").expect("load expected");

        assert_eq!(preview.urls().live_count(), 1);
        assert_eq!(preview.urls().revoked_count(), 1);
        assert_eq!(preview.on_load_success(&mut store, &first.token, 1), LoadOutcome::Ignored);
        assert_eq!(preview.session().map(PreviewSession::target), Some(second_id));

        assert_eq!(preview.on_load_success(&mut store, &second.token, 1), LoadOutcome::Unlocked);
    }

    #[test]
    fn completion_after_close_is_ignored() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "f.pdf", 10, false);
        let mut preview = controller();

        let request = preview.open(&store, id).expect("open").expect("load expected");
        preview.dismiss(CloseTrigger::Backdrop);

        assert_eq!(preview.on_load_success(&mut store, &request.token, 1), LoadOutcome::Ignored);
        assert_eq!(preview.state(), PreviewState::Idle);
    }

    #[test]
    fn closing_from_every_state_releases_url_exactly_once() {
        let triggers = [CloseTrigger::Backdrop, CloseTrigger::CloseButton, CloseTrigger::EscapeKey];

        for (index, reach) in ["awaiting", "validating", "unlocked", "failed", "cancelled"].iter().enumerate() {
            let mut store = FileStore::new();
            let protected = matches!(*reach, "awaiting" | "cancelled");
            let id = stage(&mut store, "g.pdf", 10, protected);
            let mut preview = controller();

            let request = preview.open(&store, id).expect("open should succeed");
            match *reach {
                "unlocked" => {
                    let token = request.expect("load expected").token;
                    preview.on_load_success(&mut store, &token, 1);
                }
                "failed" => {
                    let token = request.expect("load expected").token;
                    let error = PdfEngineError::Backend("bad".to_owned());
                    preview.on_load_error(&mut store, &token, &error);
                }
                "cancelled" => {
                    preview.cancel_password();
                }
                _ => {}
            }
            assert_ne!(preview.state(), PreviewState::Idle, "{reach}");

            assert!(preview.dismiss(triggers[index % triggers.len()]));
            assert_eq!(preview.state(), PreviewState::Idle, "{reach}");
            assert_eq!(preview.urls().revoked_count(), 1, "{reach}");
            assert_eq!(preview.urls().live_count(), 0, "{reach}");

            assert!(!preview.close());
            assert_eq!(preview.urls().revoked_count(), 1, "{reach}");
        }
    }

    #[test]
    fn controls_are_noops_until_unlocked() {
        let mut store = FileStore::new();
        let id = stage(&mut store, "h.pdf", 10, true);
        let mut preview = controller();
        preview.open(&store, id).expect("open should succeed");

        assert!(!preview.next_page());
        assert!(!preview.zoom_in());
        assert_eq!(preview.toggle_fullscreen(), None);
        assert!(preview.download().is_none());

        let request = preview.submit_password("pw").expect("submission");
        preview.on_load_success(&mut store, &request.token, 3);

        assert!(preview.next_page());
        assert!(preview.go_to_page(10));
        assert_eq!(preview.session().map(|s| s.page_view().page()), Some(3));
        assert_eq!(preview.toggle_fullscreen(), Some(true));

        let download = preview.download().expect("download available");
        assert_eq!(download.file_name, "h.pdf");
        assert!(download.url.starts_with("blob:intake/"));
    }

    #[test]
    fn open_rejects_unknown_and_non_pdf_records() {
        let mut store = FileStore::new();
        let image = stage(&mut store, "photo.jpg", 10, false);
        let mut preview = controller();

        assert!(matches!(
            preview.open(&store, RecordId(999)),
            Err(PreviewError::UnknownRecord(RecordId(999)))
        ));
        assert!(matches!(preview.open(&store, image), Err(PreviewError::NotPreviewable(_))));
        assert_eq!(preview.state(), PreviewState::Idle);
    }
}
