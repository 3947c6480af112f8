/// Error types for the silent threshold encryption library
use thiserror::Error;

/// Coarse classification of a [`SteError`].
///
/// Usage errors are caller mistakes detected before any cryptography runs.
/// Validity errors come out of the threshold algebra itself: either benign
/// under-participation or a sign of tampering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Validity,
    Encoding,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SteError {
    /// Committee size bound is zero or above the supported ceiling
    #[error("invalid committee size {size}: must be between 1 and {max}")]
    InvalidSize { size: usize, max: usize },
    /// Party index is not below the committee bound of the parameters
    #[error("party index {index} out of range (committee bound is {bound})")]
    IndexOutOfRange { index: usize, bound: usize },
    #[error("cannot aggregate an empty committee")]
    EmptyCommittee,
    #[error("party index {0} appears more than once")]
    DuplicateIndex(usize),
    /// Threshold is zero or larger than the aggregated committee
    #[error("invalid threshold {threshold} for a committee of {committee_size} parties")]
    InvalidThreshold {
        threshold: usize,
        committee_size: usize,
    },
    /// Public key hints are inconsistent with its BLS key or slot
    #[error("public key for party {0} failed verification")]
    InvalidPublicKey(usize),
    /// Inputs were produced under different parameters
    #[error("parameter mismatch: {0}")]
    ParamsMismatch(String),
    #[error("selector length {actual} does not match committee size {expected}")]
    SelectorLength { expected: usize, actual: usize },

    /// Ciphertext does not belong to the committee or key it is used with
    #[error("ciphertext mismatch: {0}")]
    CiphertextMismatch(String),
    #[error("insufficient shares: required {required}, selected {provided}")]
    InsufficientShares { required: usize, provided: usize },
    /// Share index is not selected, not in the committee, or a selected party has no share
    #[error("party index {0} does not agree with the selector and committee")]
    IndexMismatch(usize),
    /// Reconstructed key failed to authenticate the payload
    #[error("decapsulation failed: payload did not authenticate")]
    DecapsulationFailure,

    /// Serialization/deserialization error
    #[error("encoding error: {0}")]
    Encoding(String),
    /// KZG commitment or operation failed
    #[error("KZG error: {0}")]
    Kzg(String),
    /// Domain creation failed
    #[error("domain error: {0}")]
    Domain(String),
}

impl SteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SteError::InvalidSize { .. }
            | SteError::IndexOutOfRange { .. }
            | SteError::EmptyCommittee
            | SteError::DuplicateIndex(_)
            | SteError::InvalidThreshold { .. }
            | SteError::ParamsMismatch(_)
            | SteError::SelectorLength { .. } => ErrorKind::Usage,
            SteError::InvalidPublicKey(_)
            | SteError::CiphertextMismatch(_)
            | SteError::InsufficientShares { .. }
            | SteError::IndexMismatch(_)
            | SteError::DecapsulationFailure => ErrorKind::Validity,
            SteError::Encoding(_) => ErrorKind::Encoding,
            SteError::Kzg(_) | SteError::Domain(_) => ErrorKind::Internal,
        }
    }

    /// True when the failure may indicate an active attack rather than
    /// missing participants or caller error.
    pub fn indicates_tampering(&self) -> bool {
        matches!(
            self,
            SteError::DecapsulationFailure | SteError::InvalidPublicKey(_)
        )
    }
}

// Convert from KZG errors
impl From<crate::kzg::Error> for SteError {
    fn from(err: crate::kzg::Error) -> Self {
        SteError::Kzg(err.to_string())
    }
}

impl From<ark_serialize::SerializationError> for SteError {
    fn from(err: ark_serialize::SerializationError) -> Self {
        SteError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(SteError::EmptyCommittee.kind(), ErrorKind::Usage);
        assert_eq!(
            SteError::InsufficientShares {
                required: 3,
                provided: 2
            }
            .kind(),
            ErrorKind::Validity
        );
        assert!(SteError::DecapsulationFailure.indicates_tampering());
        assert!(!SteError::InsufficientShares {
            required: 3,
            provided: 2
        }
        .indicates_tampering());
        assert_eq!(
            SteError::Encoding("x".to_string()).kind(),
            ErrorKind::Encoding
        );
    }

    #[test]
    fn test_error_display() {
        let err = SteError::InvalidThreshold {
            threshold: 4,
            committee_size: 3,
        };
        assert_eq!(
            err.to_string(),
            "invalid threshold 4 for a committee of 3 parties"
        );
    }
}
