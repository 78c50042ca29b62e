//! Drag/select screening
//!
//! Turns raw file selections into [`Incoming`] items for the store, dropping
//! files the upload widget would refuse and pre-flagging encrypted PDFs.

use crate::config::Settings;
use intake_model::{FileHandle, Incoming};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    UnsupportedType,
    TooLarge { limit_mb: u64 },
    Unreadable(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType => f.write_str("file type is not accepted"),
            Self::TooLarge { limit_mb } => write!(f, "file exceeds the {limit_mb} MB limit"),
            Self::Unreadable(reason) => write!(f, "file could not be read: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: RejectReason,
}

#[derive(Debug, Default)]
pub struct Screened {
    pub incoming: Vec<Incoming>,
    pub rejected: Vec<Rejection>,
}

pub fn screen(files: impl IntoIterator<Item = FileHandle>, settings: &Settings) -> Screened {
    let mut screened = Screened::default();

    for handle in files {
        match check(&handle, settings) {
            Ok(is_password_protected) => {
                screened.incoming.push(Incoming::new(handle, is_password_protected));
            }
            Err(reason) => {
                tracing::debug!(name = handle.name(), %reason, "selection rejected");
                screened.rejected.push(Rejection { name: handle.name().to_owned(), reason });
            }
        }
    }

    screened
}

fn check(handle: &FileHandle, settings: &Settings) -> Result<bool, RejectReason> {
    let extension = handle.extension().unwrap_or_default();
    if !settings.accepts(&extension) {
        return Err(RejectReason::UnsupportedType);
    }
    if handle.size() > settings.max_file_size_bytes() {
        return Err(RejectReason::TooLarge { limit_mb: settings.max_file_size_mb });
    }
    if extension != "pdf" {
        return Ok(false);
    }

    let bytes =
        handle.source().read().map_err(|err| RejectReason::Unreadable(err.to_string()))?;
    Ok(pdf_engine::is_password_protected(&bytes))
}
