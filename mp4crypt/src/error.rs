//! Error types for track encryption and decryption passes.

use crate::Scheme;
use thiserror::Error;

/// Errors that can terminate an encryption or decryption pass.
#[derive(Debug, Error)]
pub enum CryptError {
    /// Missing or inconsistent keys, bad IV size or illegal pattern parameters.
    #[error("invalid crypt config: {0}")]
    InvalidConfig(String),

    /// Scheme is not implemented or its family is disabled in this build.
    #[error("unsupported protection scheme: {0}")]
    UnsupportedScheme(String),

    /// Codec parsing failed and strict parsing was requested.
    #[error("cannot locate clear bytes of sample {sample} ({scheme}): {warning}")]
    CodecParseFailure {
        sample: usize,
        scheme: Scheme,
        warning: ParseWarning,
    },

    /// The cipher primitive rejected its input.
    #[error("cipher failure on sample {sample} ({scheme}): {reason}")]
    CipherFailure {
        sample: usize,
        scheme: Scheme,
        reason: String,
    },

    /// Persisted auxiliary information does not describe the samples.
    #[error("corrupt sample auxiliary info at sample {sample} ({scheme}): {reason}")]
    CorruptAuxInfo {
        sample: usize,
        scheme: Scheme,
        reason: String,
    },

    /// Encryption requested on a track which is already protected.
    #[error("track {track_id} is already protected with {scheme}")]
    AlreadyProtected { track_id: u32, scheme: Scheme },

    /// Decryption requested on a track which is not protected.
    #[error("track {0} is not protected")]
    NotProtected(u32),

    /// A pass was stopped through its abort signal.
    #[error("pass aborted before sample {sample} ({scheme})")]
    Aborted { sample: usize, scheme: Scheme },

    /// No key was supplied for the KID a sample is protected with.
    #[error("key not found for KID {kid} (sample {sample})")]
    KeyNotFound { kid: String, sample: usize },

    /// Invalid hex string.
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Hex string has wrong length.
    #[error("hex string has wrong length: expected {expected} bytes, got {actual} bytes")]
    HexWrongLength { expected: usize, actual: usize },

    /// The container collaborator failed to read or store track data.
    #[error("container error: {0}")]
    Container(String),

    /// The DRM descriptor file is malformed.
    #[error("invalid DRM descriptor: {0}")]
    Descriptor(String),

    /// I/O error (for file operations).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptError {
    /// Returns true if the pass ended through its abort signal rather than a failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Non-fatal problem met while locating the clear bytes of a sample.
///
/// The sample is then encrypted with no clear prefix unless strict parsing
/// turns the warning into [`CryptError::CodecParseFailure`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseWarning {
    /// A NAL unit or OBU claims more bytes than the sample holds.
    #[error("{unit} at offset {offset} overruns the sample")]
    Truncated { unit: &'static str, offset: usize },

    /// The slice or frame header length could not be determined.
    #[error("slice header length unavailable at offset {offset}")]
    SliceHeader { offset: usize },

    /// A length field could not be decoded.
    #[error("malformed {unit} length at offset {offset}")]
    BadLength { unit: &'static str, offset: usize },
}

/// Result type for crypt operations.
pub type Result<T> = std::result::Result<T, CryptError>;
