use intake_model::{FileStore, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    ClearAll,
    Remove(RecordId),
}

/// A pending yes/no prompt. Resolving it consumes the dialog, so exactly one
/// of `confirm` or `cancel` ever runs.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dialog does nothing until it is confirmed or cancelled"]
pub struct ConfirmDialog {
    action: ConfirmAction,
    title: String,
    message: String,
}

impl ConfirmDialog {
    pub fn clear_all() -> Self {
        Self {
            action: ConfirmAction::ClearAll,
            title: "Clear All Files".to_owned(),
            message: "Are you sure you want to clear all files?".to_owned(),
        }
    }

    /// `None` when `id` is not staged.
    pub fn remove(store: &FileStore, id: RecordId) -> Option<Self> {
        let record = store.get(id)?;
        Some(Self {
            action: ConfirmAction::Remove(id),
            title: "Remove File".to_owned(),
            message: format!("Are you sure you want to remove {}?", record.handle.name()),
        })
    }

    pub fn action(&self) -> ConfirmAction {
        self.action
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn confirm(self) -> ConfirmAction {
        self.action
    }

    pub fn cancel(self) {
        tracing::debug!(action = ?self.action, "confirmation cancelled");
    }
}
