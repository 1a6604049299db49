//! Result envelope shared by every RPC call.
//!
//! The wire shape is a tagged union discriminated by a boolean `ok` field:
//!
//! ```text
//! {"ok":true,"value":<any>,"etag"?:<string>,"notModified"?:<bool>}
//! {"ok":false,"code":<ErrorCode>,"message":<string>}
//! ```
//!
//! Serde cannot tag an enum on a boolean, so both directions go through
//! hand-written impls. Unknown error codes read from the wire collapse to
//! [`ErrorCode::Internal`].

use serde::de::Deserializer;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE
// ============================================================================

/// Closed set of failure codes carried by a failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCode {
    /// Malformed or mismatched input, including brand mismatch.
    BadInput,
    /// Referenced entity absent within the caller's own brand scope.
    NotFound,
    /// Caller is being throttled.
    RateLimited,
    /// Missing or invalid admin credential.
    Unauthorized,
    /// Transport absence, transport failure, unexpected exception or an
    /// unmapped backend error.
    Internal,
}

impl ErrorCode {
    /// Every code, in wire order.
    pub const ALL: [ErrorCode; 5] = [
        ErrorCode::BadInput,
        ErrorCode::NotFound,
        ErrorCode::RateLimited,
        ErrorCode::Unauthorized,
        ErrorCode::Internal,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadInput => "BAD_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Parse a wire code. Anything unrecognized is `Internal`.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "BAD_INPUT" => ErrorCode::BadInput,
            "NOT_FOUND" => ErrorCode::NotFound,
            "RATE_LIMITED" => ErrorCode::RateLimited,
            "UNAUTHORIZED" => ErrorCode::Unauthorized,
            _ => ErrorCode::Internal,
        }
    }

    /// Message used when a failure arrives without one.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::BadInput => "Invalid input",
            ErrorCode::NotFound => "Not found",
            ErrorCode::RateLimited => "Rate limit exceeded",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ErrorCode::from_wire(&raw))
    }
}

// ============================================================================
// FAILURE / SUCCESS
// ============================================================================

/// The failure half of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Failure {
    pub code: ErrorCode,
    pub message: String,
}

impl Failure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Failure carrying the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

/// The success half of an envelope.
///
/// `value` is normally absent only when `not_modified` is set; a backend
/// that answers `{"ok":true}` is passed through as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Success<T> {
    pub value: Option<T>,
    pub etag: Option<String>,
    pub not_modified: bool,
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Uniform result of an RPC call.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T = serde_json::Value> {
    Ok(Success<T>),
    Err(Failure),
}

impl<T> Envelope<T> {
    /// Success carrying a value and no version token.
    pub fn ok(value: T) -> Self {
        Envelope::Ok(Success {
            value: Some(value),
            etag: None,
            not_modified: false,
        })
    }

    /// Success carrying a value and its version token.
    pub fn ok_with_etag(value: T, etag: impl Into<String>) -> Self {
        Envelope::Ok(Success {
            value: Some(value),
            etag: Some(etag.into()),
            not_modified: false,
        })
    }

    /// Success confirming the caller's cached copy is current.
    pub fn not_modified(etag: Option<String>) -> Self {
        Envelope::Ok(Success {
            value: None,
            etag,
            not_modified: true,
        })
    }

    pub fn fail(code: ErrorCode, message: impl Into<String>) -> Self {
        Envelope::Err(Failure::new(code, message))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Envelope::Err(Failure::internal(message))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Envelope::Ok(_))
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, Envelope::Ok(s) if s.not_modified)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Envelope::Ok(s) => s.value.as_ref(),
            Envelope::Err(_) => None,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        match self {
            Envelope::Ok(s) => s.etag.as_deref(),
            Envelope::Err(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Envelope::Ok(_) => None,
            Envelope::Err(f) => Some(f),
        }
    }

    /// Error code of a failure envelope.
    pub fn code(&self) -> Option<ErrorCode> {
        self.failure().map(|f| f.code)
    }

    pub fn into_result(self) -> Result<Success<T>, Failure> {
        match self {
            Envelope::Ok(s) => Ok(s),
            Envelope::Err(f) => Err(f),
        }
    }

    /// Map the success value, leaving failures untouched.
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Envelope::Ok(s) => Envelope::Ok(Success {
                value: s.value.map(f),
                etag: s.etag,
                not_modified: s.not_modified,
            }),
            Envelope::Err(e) => Envelope::Err(e),
        }
    }
}

impl<T> From<Failure> for Envelope<T> {
    fn from(failure: Failure) -> Self {
        Envelope::Err(failure)
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Envelope::Ok(s) => {
                let len = 1
                    + usize::from(s.value.is_some())
                    + usize::from(s.etag.is_some())
                    + usize::from(s.not_modified);
                let mut state = serializer.serialize_struct("Envelope", len)?;
                state.serialize_field("ok", &true)?;
                if let Some(value) = &s.value {
                    state.serialize_field("value", value)?;
                }
                if let Some(etag) = &s.etag {
                    state.serialize_field("etag", etag)?;
                }
                if s.not_modified {
                    state.serialize_field("notModified", &true)?;
                }
                state.end()
            }
            Envelope::Err(f) => {
                let mut state = serializer.serialize_struct("Envelope", 3)?;
                state.serialize_field("ok", &false)?;
                state.serialize_field("code", &f.code)?;
                state.serialize_field("message", &f.message)?;
                state.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope<T> {
    ok: bool,
    value: Option<T>,
    etag: Option<String>,
    not_modified: Option<bool>,
    code: Option<ErrorCode>,
    message: Option<String>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEnvelope::<T>::deserialize(deserializer)?;
        if wire.ok {
            Ok(Envelope::Ok(Success {
                value: wire.value,
                etag: wire.etag,
                not_modified: wire.not_modified.unwrap_or(false),
            }))
        } else {
            let code = wire.code.unwrap_or(ErrorCode::Internal);
            let message = wire
                .message
                .unwrap_or_else(|| code.default_message().to_string());
            Ok(Envelope::Err(Failure { code, message }))
        }
    }
}
