//! Error types for WLD decoding and encoding

use std::io;

use crate::registry::FragmentCode;

/// Failure while reading bytes inside a header, name blob or fragment payload.
///
/// Offsets are absolute positions in the container buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// A declared size or count runs past the end of the available bytes
    #[error("truncated buffer at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A name ref points at an offset with no string in the name table
    #[error("name ref {name_ref} (offset {}) not found in name table", name_offset(.name_ref))]
    NameRefNotFound { name_ref: i32 },

    /// A fixed discriminant field held an unexpected value
    #[error("invariant violation at offset {offset}: {message}")]
    InvariantViolation { offset: usize, message: String },
}

fn name_offset(name_ref: &i32) -> i64 {
    -i64::from(*name_ref)
}

/// Failure while laying out a fragment for writing.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Two lists that share one on-disk count disagree in length
    #[error("{field}: expected {expected} entries, found {actual}")]
    CountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A value does not fit the width it is stored with
    #[error("{field}: value {value} does not fit its on-disk width")]
    ValueOutOfRange { field: &'static str, value: i64 },

    /// IO error from the underlying writer
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error for container operations.
#[derive(Debug, thiserror::Error)]
pub enum WldError {
    /// Bad magic or unknown version
    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    /// Short read outside any fragment payload (header, name blob, directory)
    #[error(transparent)]
    Container(#[from] ReadError),

    /// A fragment payload failed to decode
    #[error("fragment {index} (type {code}) at offset {offset}: {source}")]
    Fragment {
        /// 1-based directory index
        index: usize,
        code: FragmentCode,
        offset: usize,
        #[source]
        source: ReadError,
    },

    /// A fragment could not be encoded
    #[error("fragment {index} (type {code}): {source}")]
    Encode {
        /// 1-based directory index
        index: usize,
        code: FragmentCode,
        #[source]
        source: EncodeError,
    },

    /// Container-level field could not be encoded
    #[error("container: {0}")]
    EncodeContainer(#[from] EncodeError),
}

impl WldError {
    /// True when a fragment failed on a fixed discriminant check.
    ///
    /// Callers may retry such a container under the other dialect.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::Fragment {
                source: ReadError::InvariantViolation { .. },
                ..
            } | Self::Container(ReadError::InvariantViolation { .. })
        )
    }

    /// Directory index of the failing fragment, if any
    pub fn fragment_index(&self) -> Option<usize> {
        match self {
            Self::Fragment { index, .. } | Self::Encode { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T, E = WldError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_error_display_names_type() {
        let err = WldError::Fragment {
            index: 3,
            code: FragmentCode::TRACK_DEF,
            offset: 120,
            source: ReadError::InvariantViolation {
                offset: 128,
                message: "expected 8, got 2".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("fragment 3"));
        assert!(text.contains("0x12"));
        assert!(text.contains("TrackDef"));
        assert!(err.is_invariant_violation());
        assert_eq!(err.fragment_index(), Some(3));
    }

    #[test]
    fn test_name_ref_display_shows_offset() {
        let err = ReadError::NameRefNotFound { name_ref: -42 };
        assert!(err.to_string().contains("offset 42"));
    }
}
