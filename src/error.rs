//! Unified error types for the binding client.
//!
//! All failures flow through [`Error`] so callers can tell malformed input,
//! failed validation, and transport trouble apart without string matching.

use der::asn1::ObjectIdentifier;
use thiserror::Error;

use crate::msg::WireError;

/// Main error type for all binding operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was not valid DER, or encoding produced invalid DER.
    #[error("malformed message: {0}")]
    Malformed(#[from] der::Error),

    /// The encoded message does not fit in a single UDP datagram.
    #[error("message of {0} bytes exceeds the datagram ceiling")]
    Oversize(usize),

    /// A curve identifier outside the built-in registry.
    #[error("unknown curve {0}")]
    UnknownCurve(ObjectIdentifier),

    /// A signature-algorithm identifier outside the supported set.
    #[error("unknown signature algorithm {0}")]
    UnknownAlgorithm(ObjectIdentifier),

    /// A point octet string that does not decode to a point on its curve.
    #[error("invalid point encoding")]
    InvalidPoint,

    /// A scalar multiplication was requested across two different curves.
    #[error("key and point live on different curves")]
    CurveMismatch,

    /// The advertisement carried a signature no advertised key produced.
    #[error("advertisement failed signature validation")]
    BadAdvertisement,

    /// No key in the advertisement (or database) satisfies the request.
    #[error("no suitable key found")]
    NotFound,

    /// The requested minimum key size is below the supported floor.
    #[error("minimum key size of {0} bytes is too small")]
    KeyTooSmall(usize),

    /// The service string is not a numeric UDP port.
    #[error("service `{0}` is not a port number")]
    InvalidService(String),

    /// Name resolution succeeded but produced no usable address.
    #[error("host resolved to no usable address")]
    NoAddresses,

    /// No address produced a decodable reply within the deadline.
    #[error("no reply within the deadline")]
    Timeout,

    /// The peer answered with a message of the wrong kind.
    #[error("unexpected reply type")]
    UnexpectedReply,

    /// The peer reported a protocol error.
    #[error("server reported {0:?}")]
    Server(WireError),

    /// ECDSA signing or verification failed internally.
    #[error("signature operation failed")]
    Signature(#[from] ecdsa::Error),

    /// Reverse-direction transport is not implemented.
    #[error("listening for server-initiated connections is not supported")]
    ListenUnsupported,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The wire-level error code a server would report for this failure.
    pub fn to_wire(&self) -> WireError {
        match self {
            Error::Malformed(_) | Error::Oversize(_) => WireError::Malformed,
            Error::NotFound => WireError::NotFoundKey,
            _ => WireError::Internal,
        }
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, Error>;
