//! Error types surfaced by zone management operations

use std::error::Error;
use std::fmt;
use std::io;

use crate::dns::buffer::BufferError;

/// The error kinds a zone operation can surface to its caller.
#[derive(Debug)]
pub enum ZoneError {
    /// Sign-zone called on a zone that is already signed
    AlreadySigned(String),
    /// A signed-only operation was attempted on an unsigned zone
    NotSigned(String),
    /// Unknown signing algorithm, curve or digest
    UnsupportedAlgorithm(String),
    /// A parameter fell outside its permitted range
    OutOfRange {
        parameter: &'static str,
        detail: String,
    },
    /// Record kinds that cannot exist under DNSSEC (ANAME/APP/disabled)
    UnsupportedInSignedZone(String),
    /// SOA/CNAME/DS misuse at or away from the apex
    InvalidApexOperation(String),
    /// The signer found no eligible key for an RRset
    NoSigningKey(String),
    /// Retiring the key would leave the zone without coverage
    NoSuccessorKey(String),
    /// Key generation exhausted its key tag collision retries
    KeyTagCollision,
    /// The key tag is not present in the key store
    KeyNotFound(u16),
    /// The DNSKEY is already published
    DuplicatePublish(u16),
    /// Malformed names, excessive lengths, unsupported record types
    InvalidInput(String),
    /// Unknown persisted zone format version
    UnsupportedFormat(u8),
    /// Persistence or serialization I/O failure
    IoFailure(io::Error),
    /// A concurrent update won the race; the caller may retry
    TransientConflict(String),
    /// Failure inside the cryptographic backend
    Crypto(openssl::error::ErrorStack),
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneError::AlreadySigned(zone) => write!(f, "zone {} is already signed", zone),
            ZoneError::NotSigned(zone) => write!(f, "zone {} is not signed", zone),
            ZoneError::UnsupportedAlgorithm(alg) => write!(f, "unsupported algorithm: {}", alg),
            ZoneError::OutOfRange { parameter, detail } => {
                write!(f, "{} out of range: {}", parameter, detail)
            }
            ZoneError::UnsupportedInSignedZone(detail) => {
                write!(f, "not supported in a signed zone: {}", detail)
            }
            ZoneError::InvalidApexOperation(detail) => {
                write!(f, "invalid apex operation: {}", detail)
            }
            ZoneError::NoSigningKey(detail) => write!(f, "no signing key: {}", detail),
            ZoneError::NoSuccessorKey(detail) => write!(f, "no successor key: {}", detail),
            ZoneError::KeyTagCollision => write!(f, "key tag collision persisted after 5 attempts"),
            ZoneError::KeyNotFound(tag) => write!(f, "no key with tag {} in the key store", tag),
            ZoneError::DuplicatePublish(tag) => write!(f, "key {} is already published", tag),
            ZoneError::InvalidInput(detail) => write!(f, "invalid input: {}", detail),
            ZoneError::UnsupportedFormat(version) => {
                write!(f, "unsupported zone file format version {}", version)
            }
            ZoneError::IoFailure(e) => write!(f, "I/O failure: {}", e),
            ZoneError::TransientConflict(detail) => {
                write!(f, "concurrent update conflict: {}", detail)
            }
            ZoneError::Crypto(e) => write!(f, "crypto backend failure: {}", e),
        }
    }
}

impl Error for ZoneError {}

impl From<io::Error> for ZoneError {
    fn from(err: io::Error) -> Self {
        ZoneError::IoFailure(err)
    }
}

impl From<openssl::error::ErrorStack> for ZoneError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        ZoneError::Crypto(err)
    }
}

impl From<BufferError> for ZoneError {
    fn from(err: BufferError) -> Self {
        ZoneError::InvalidInput(format!("record serialization failed: {}", err))
    }
}

/// Result type alias for zone operations
pub type ZoneResult<T> = Result<T, ZoneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ZoneError::OutOfRange {
            parameter: "iterations",
            detail: "51 exceeds the maximum of 50".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "iterations out of range: 51 exceeds the maximum of 50"
        );

        let err = ZoneError::KeyNotFound(34567);
        assert!(format!("{}", err).contains("34567"));
    }

    #[test]
    fn test_from_io() {
        let err: ZoneError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        match err {
            ZoneError::IoFailure(_) => {}
            other => panic!("expected IoFailure, got {:?}", other),
        }
    }
}
