pub mod config;
mod dialog;
mod intake;
mod notify;
pub mod select;
pub mod submit;

pub use config::{ConfigError, ConfigFile, Settings};
pub use dialog::{ConfirmAction, ConfirmDialog};
pub use intake::Intake;
pub use notify::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use submit::{
    build_payload, Ack, BatchSubmitter, Payload, PayloadPart, Receipt, StubTransport, SubmitError,
    SubmitStatus, Transport,
};
