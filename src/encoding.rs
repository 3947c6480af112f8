//! Canonical byte encodings for every entity that crosses the caller boundary.
//!
//! Encodings are the compressed arkworks forms with full point validation on
//! the way in. Trailing bytes are rejected so that each logical value has
//! exactly one accepted encoding.
//!
//! Length prefixes are never trusted for allocation. Every `Vec` field of a
//! decoded entity goes through [`read_vec`], which grows the vector only as
//! elements are actually read, so a forged prefix ends in an error instead
//! of an allocation failure.

use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Validate,
};

use crate::error::SteError;

/// Upper bound on the capacity reserved up front from a length prefix.
const MAX_PREALLOCATED: usize = 1 << 12;

/// Reads a `u64` length prefix as written by `Vec::serialize_compressed`.
pub(crate) fn read_len<R: Read>(
    reader: &mut R,
    compress: Compress,
    validate: Validate,
) -> Result<usize, SerializationError> {
    let len = u64::deserialize_with_mode(&mut *reader, compress, validate)?;
    usize::try_from(len).map_err(|_| SerializationError::InvalidData)
}

/// Reads a length-prefixed vector of `T`.
pub(crate) fn read_vec<T: CanonicalDeserialize, R: Read>(
    reader: &mut R,
    compress: Compress,
    validate: Validate,
) -> Result<Vec<T>, SerializationError> {
    let len = read_len(reader, compress, validate)?;
    let mut values = Vec::with_capacity(len.min(MAX_PREALLOCATED));
    for _ in 0..len {
        values.push(T::deserialize_with_mode(&mut *reader, compress, validate)?);
    }
    Ok(values)
}

pub trait Encode: Sized {
    fn to_bytes(&self) -> Result<Vec<u8>, SteError>;
    fn from_bytes(bytes: &[u8]) -> Result<Self, SteError>;
}

impl<T: CanonicalSerialize + CanonicalDeserialize> Encode for T {
    fn to_bytes(&self) -> Result<Vec<u8>, SteError> {
        let mut bytes = Vec::with_capacity(self.compressed_size());
        self.serialize_compressed(&mut bytes)?;
        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, SteError> {
        let mut reader = bytes;
        let value = T::deserialize_compressed(&mut reader)?;
        if !reader.is_empty() {
            return Err(SteError::Encoding(format!(
                "{} trailing bytes after value",
                reader.len()
            )));
        }
        Ok(value)
    }
}
