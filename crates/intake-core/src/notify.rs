use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Fire-and-forget toast sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Routes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!(%level, "{message}"),
            NoticeLevel::Warning => tracing::warn!(%level, "{message}"),
            NoticeLevel::Error => tracing::error!(%level, "{message}"),
        }
    }
}

/// Keeps every notice in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|notices| notices.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices().into_iter().map(|notice| notice.message).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice { level, message: message.to_owned() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(NoticeLevel::Warning, "first");
        notifier.notify(NoticeLevel::Success, "second");

        assert_eq!(
            notifier.notices(),
            vec![
                Notice { level: NoticeLevel::Warning, message: "first".to_owned() },
                Notice { level: NoticeLevel::Success, message: "second".to_owned() },
            ]
        );
    }

    #[test]
    fn notifiers_work_behind_trait_objects() {
        let sinks: [Box<dyn Notifier>; 2] =
            [Box::new(TracingNotifier), Box::new(RecordingNotifier::new())];

        for sink in &sinks {
            sink.notify(NoticeLevel::Info, "staged 2 files");
        }
    }
}
