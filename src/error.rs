use std::io;

use thiserror::Error;

use crate::guest_data::GuestDataError;
use crate::ndef::NdefError;

/// NFC 操作失败原因。每种错误都在操作边界转换为 `NfcStatus::Error`。
#[derive(Debug, Error)]
pub enum NfcError {
    #[error("NFC is not available on this device")]
    AdapterUnavailable,
    #[error("NFC is disabled")]
    AdapterDisabled,
    #[error("no NFC tag detected")]
    NoTag,
    #[error("tag not compatible")]
    TagIncompatible,
    #[error("tag is not writable")]
    TagNotWritable,
    #[error("tag capacity exceeded: message needs {needed} bytes, tag holds {capacity}")]
    TagCapacityExceeded { needed: usize, capacity: usize },
    #[error("tag empty")]
    TagEmpty,
    #[error("I/O error accessing tag: {0}")]
    Io(#[from] io::Error),
    #[error("could not process tag: {0}")]
    MalformedNdef(#[from] NdefError),
    #[error("could not read guest data")]
    PayloadParse,
    #[error("could not prepare NFC data: {0}")]
    Encode(#[source] GuestDataError),
    #[error("could not register for tag discovery: {0}")]
    Dispatch(#[source] io::Error),
    #[error("could not save tag data: {0}")]
    Persistence(String),
}
