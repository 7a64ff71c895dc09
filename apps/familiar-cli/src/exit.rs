//! Process exit codes.

use familiar_core::Error;

pub const FAILURE: u8 = 1;
pub const USAGE: u8 = 2;
pub const INDEX_NOT_FOUND: u8 = 3;
pub const INDEX_CORRUPT: u8 = 4;
pub const MODEL_MISMATCH: u8 = 5;
pub const MODEL_UNAVAILABLE: u8 = 6;
pub const UNSUPPORTED_FORMAT: u8 = 7;
/// What the shell reports after SIGINT's default action.
pub const INTERRUPTED: u8 = 130;

pub fn code_for(err: &Error) -> u8 {
    match err {
        Error::EmptyQuery | Error::InvalidConfig(_) => USAGE,
        Error::IndexNotFound(_) => INDEX_NOT_FOUND,
        Error::IndexCorrupt { .. } => INDEX_CORRUPT,
        Error::ModelMismatch { .. } => MODEL_MISMATCH,
        Error::ModelUnavailable { .. } => MODEL_UNAVAILABLE,
        Error::UnsupportedFormat { .. } => UNSUPPORTED_FORMAT,
        Error::Io(e) if e.kind() == std::io::ErrorKind::Interrupted => INTERRUPTED,
        _ => FAILURE,
    }
}

/// Exit code for an error surfaced through `anyhow`.
pub fn code_for_any(err: &anyhow::Error) -> u8 {
    err.chain().find_map(|e| e.downcast_ref::<Error>()).map_or(FAILURE, code_for)
}
