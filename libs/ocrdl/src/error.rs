use thiserror::Error;

use crate::loader::ApiVersion;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR library not found ({candidates} candidates tried)")]
    LibraryNotFound { candidates: usize },

    #[error("failed to load OCR library {path}: {reason}")]
    LibraryLoad { path: String, reason: String },

    #[error("required symbol missing: {0}")]
    RequiredSymbolMissing(&'static str),

    #[error("incompatible OCR API version {found}, need at least {required}")]
    IncompatibleVersion {
        found: ApiVersion,
        required: ApiVersion,
    },

    #[error("failed to create OCR instance")]
    InstanceCreationFailed,

    #[error("failed to load default plugin, error code: {0}")]
    PluginLoadFailed(i32),

    #[error("{operation} failed, error code: {code}")]
    OperationFailed { operation: &'static str, code: i32 },

    #[error("{0} returned no data")]
    NullResult(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} is not available")]
    Unavailable(&'static str),
}
