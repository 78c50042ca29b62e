//! Dark/light theme state
//!
//! An explicit choice (made with [`ThemeStore::toggle`]) is persisted and wins
//! over the system preference. Until one exists the store follows system
//! theme changes.

use crate::{Storage, StorageError};
use intake_model::{Preferences, ThemeChoice};

pub type ThemeListener = Box<dyn FnMut(bool) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct ThemeStore {
    storage: Storage,
    preferences: Preferences,
    is_dark: bool,
    listeners: Vec<(SubscriptionId, ThemeListener)>,
    next_subscription: u64,
    following_system: bool,
}

impl ThemeStore {
    /// Loads the saved choice, falling back to `system_prefers_dark`.
    ///
    /// Unreadable preferences are logged and treated as absent.
    pub fn init(storage: Storage, system_prefers_dark: bool) -> Self {
        let preferences = storage.load_preferences().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring unreadable preferences");
            Preferences::default()
        });
        let is_dark = preferences.theme.map_or(system_prefers_dark, ThemeChoice::is_dark);

        tracing::debug!(is_dark, saved = preferences.theme.is_some(), "theme initialized");
        Self {
            storage,
            preferences,
            is_dark,
            listeners: Vec::new(),
            next_subscription: 0,
            following_system: true,
        }
    }

    pub fn is_dark(&self) -> bool {
        self.is_dark
    }

    pub fn saved_choice(&self) -> Option<ThemeChoice> {
        self.preferences.theme
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Flips the theme and persists it as an explicit choice.
    pub fn toggle(&mut self) -> Result<bool, StorageError> {
        let is_dark = !self.is_dark;
        let mut preferences = self.preferences.clone();
        preferences.theme = Some(ThemeChoice::from_dark(is_dark));
        self.storage.save_preferences(&preferences)?;

        self.preferences = preferences;
        self.set(is_dark);
        Ok(is_dark)
    }

    /// Applies a system theme change unless an explicit choice is saved.
    pub fn on_system_theme_changed(&mut self, prefers_dark: bool) -> bool {
        if !self.following_system || self.preferences.theme.is_some() {
            return false;
        }

        self.set(prefers_dark);
        true
    }

    pub fn subscribe(&mut self, listener: ThemeListener) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Drops every listener and stops following the system theme.
    pub fn teardown(&mut self) {
        self.listeners.clear();
        self.following_system = false;
    }

    fn set(&mut self, is_dark: bool) {
        if self.is_dark == is_dark {
            return;
        }

        self.is_dark = is_dark;
        tracing::debug!(is_dark, "theme changed");
        for (_, listener) in &mut self.listeners {
            listener(is_dark);
        }
    }
}
