use crate::cancel::{LoadToken, SessionId};
use crate::page_view::PageView;
use crate::url::ObjectUrl;
use intake_model::{FileSource, RecordId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewState {
    Idle,
    AwaitingPassword,
    Validating,
    Unlocked,
    Failed,
    Cancelled,
}

impl PreviewState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingPassword => "awaiting_password",
            Self::Validating => "validating",
            Self::Unlocked => "unlocked",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PreviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    AwaitingPassword,
    Validating,
    Unlocked,
    Failed(String),
    Cancelled(String),
}

impl Phase {
    fn state(&self) -> PreviewState {
        match self {
            Self::AwaitingPassword => PreviewState::AwaitingPassword,
            Self::Validating => PreviewState::Validating,
            Self::Unlocked => PreviewState::Unlocked,
            Self::Failed(_) => PreviewState::Failed,
            Self::Cancelled(_) => PreviewState::Cancelled,
        }
    }
}

/// Ephemeral state of the single open preview.
#[derive(Debug)]
pub struct PreviewSession {
    pub(crate) id: SessionId,
    pub(crate) target: RecordId,
    pub(crate) file_name: String,
    pub(crate) source: FileSource,
    pub(crate) attempted_password: Option<String>,
    pub(crate) attempt_count: u32,
    pub(crate) phase: Phase,
    pub(crate) password_error: Option<String>,
    pub(crate) page_view: PageView,
    pub(crate) url: ObjectUrl,
    pub(crate) token: LoadToken,
    pub(crate) password_saved: bool,
}

impl PreviewSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> RecordId {
        self.target
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn state(&self) -> PreviewState {
        self.phase.state()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn attempted_password(&self) -> Option<&str> {
        self.attempted_password.as_deref()
    }

    /// Inline message shown next to the password prompt.
    pub fn password_error(&self) -> Option<&str> {
        self.password_error.as_deref()
    }

    /// Message of a terminal `Failed` or `Cancelled` session.
    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) | Phase::Cancelled(message) => Some(message),
            _ => None,
        }
    }

    pub fn page_view(&self) -> &PageView {
        &self.page_view
    }

    pub fn url(&self) -> &ObjectUrl {
        &self.url
    }

    pub fn token(&self) -> &LoadToken {
        &self.token
    }

    pub(crate) fn request(&self) -> LoadRequest {
        LoadRequest {
            token: self.token.clone(),
            source: self.source.clone(),
            password: self.attempted_password.clone(),
        }
    }
}

/// A render request the host must run against the engine and report back.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub token: LoadToken,
    pub source: FileSource,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Completion for a superseded attempt or a closed session.
    Ignored,
    Unlocked,
    PasswordPrompt,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    Backdrop,
    CloseButton,
    EscapeKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest<'a> {
    pub file_name: &'a str,
    pub url: &'a str,
}
