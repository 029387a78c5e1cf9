//! Error types for key handling, license storage and license files.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Key material is not url-safe base64 or has the wrong length.
    #[error("invalid key material: {0}")]
    KeyDecode(String),

    /// Signing or key export was requested before a key was generated or loaded.
    #[error("no active signing key")]
    NoActiveKey,

    /// The backing database file cannot be reached.
    #[error("license store unavailable: {0}")]
    StoreUnavailable(String),

    /// The backing file opened but does not hold a readable license database.
    #[error("license store corrupt: {0}")]
    StoreCorrupt(String),

    /// An exported license file is missing fields or is not valid JSON.
    #[error("malformed license file: {0}")]
    MalformedLicenseFile(String),

    /// Claim values rejected before signing.
    #[error("invalid license claims: {0}")]
    InvalidClaims(String),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
