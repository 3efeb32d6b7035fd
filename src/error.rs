use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed hex input, either typed by the user or read back from a line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("hex token `{token}` has an odd number of digits")]
    OddLength { token: String },
    #[error("hex token `{token}` contains a non-hex character")]
    InvalidDigit { token: String },
    #[error("expected a single hex byte, got `{0}`")]
    NotAByte(String),
}

/// Received bytes are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("received data is not valid UTF-8: {0}")]
pub struct DecodeError(#[from] pub std::str::Utf8Error);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("serial port {0} not found")]
    NotFound(String),
    #[error("serial port {0} is busy or access was denied")]
    Busy(String),
    #[error("invalid serial parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to open serial port: {0}")]
    Io(String),
}

impl ConnectionError {
    pub(crate) fn from_serialport(port: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => ConnectionError::NotFound(port.to_string()),
            serialport::ErrorKind::InvalidInput => ConnectionError::InvalidParameter(err.description),
            serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
                ConnectionError::NotFound(port.to_string())
            }
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                ConnectionError::Busy(port.to_string())
            }
            _ => ConnectionError::Io(err.description),
        }
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("serial port is not open")]
    NotOpen,
    #[error(transparent)]
    Parse(#[from] HexError),
    #[error("write to serial port failed: {0}")]
    WriteFailed(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file {0} does not exist")]
    NotFound(PathBuf),
    #[error("settings file is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings file I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ShortcutError {
    #[error("line {line}: `{index}` is not a shortcut slot")]
    UnknownSlot { line: usize, index: String },
    #[error("shortcut slot {0} does not exist")]
    OutOfRange(usize),
    #[error("shortcut file I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Everything the controller can report back to the user.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Parse(#[from] HexError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Shortcut(#[from] ShortcutError),
    #[error("read from serial port failed: {0}")]
    Read(String),
    #[error("no serial port selected")]
    NoPort,
    #[error("serial port is already open")]
    AlreadyOpen,
    #[error("serial port is not open")]
    NotOpen,
    #[error("`{0}` is not a valid period")]
    InvalidInterval(String),
    #[error("period {value} is too short, minimum is {min}")]
    IntervalTooShort { value: u64, min: u64 },
    #[error("no auto-save directory configured")]
    NoAutosaveDir,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
