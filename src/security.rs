//! Secret-scalar handling and share verification.

use ark_ec::pairing::Pairing;
use ark_ec::PrimeGroup;
use ark_ff::Field;
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};
use ark_std::Zero;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A scalar that is wiped on drop and never printed.
///
/// Holds party secret keys and the setup trapdoor.
#[derive(Clone)]
pub struct SensitiveScalar<F: Field> {
    value: F,
}

impl<F: Field> SensitiveScalar<F> {
    pub fn new(value: F) -> Self {
        Self { value }
    }

    pub fn expose_secret(&self) -> &F {
        &self.value
    }
}

impl<F: Field> Zeroize for SensitiveScalar<F> {
    fn zeroize(&mut self) {
        self.value.zeroize();
    }
}

impl<F: Field> ZeroizeOnDrop for SensitiveScalar<F> {}

impl<F: Field> Drop for SensitiveScalar<F> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<F: Field> CanonicalSerialize for SensitiveScalar<F> {
    fn serialize_with_mode<W: Write>(
        &self,
        writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        self.value.serialize_with_mode(writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        self.value.serialized_size(compress)
    }
}

impl<F: Field> Valid for SensitiveScalar<F> {
    fn check(&self) -> Result<(), SerializationError> {
        self.value.check()
    }
}

impl<F: Field> CanonicalDeserialize for SensitiveScalar<F> {
    fn deserialize_with_mode<R: Read>(
        reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        F::deserialize_with_mode(reader, compress, validate).map(SensitiveScalar::new)
    }
}

impl<F: Field> std::fmt::Debug for SensitiveScalar<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SensitiveScalar([REDACTED])")
    }
}

/// Byte comparison whose running time depends only on the lengths.
pub(crate) fn subtle_constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

/// Checks a decryption share as a BLS signature on `message`:
/// `e(G1, signature) == e(public_key, message)`.
pub fn verify_bls_share<E: Pairing>(signature: &E::G2, public_key: &E::G1, message: &E::G2) -> bool {
    E::multi_pairing([E::G1::generator(), -*public_key], [*signature, *message]).is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_381::{Bls12_381, Fr};
    use ark_std::UniformRand;

    type E = Bls12_381;
    type G1 = <E as Pairing>::G1;
    type G2 = <E as Pairing>::G2;

    #[test]
    fn test_sensitive_scalar_zeroization() {
        let mut rng = ark_std::test_rng();
        let secret = Fr::rand(&mut rng);

        let mut sensitive = SensitiveScalar::new(secret);
        assert_eq!(sensitive.expose_secret(), &secret);

        sensitive.zeroize();
        assert_eq!(sensitive.expose_secret(), &Fr::zero());
    }

    #[test]
    fn test_sensitive_scalar_debug() {
        let mut rng = ark_std::test_rng();
        let secret = Fr::rand(&mut rng);
        let sensitive = SensitiveScalar::new(secret);

        let debug_str = format!("{:?}", sensitive);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(&format!("{:?}", secret)));
    }

    #[test]
    fn test_sensitive_scalar_serialization() {
        let mut rng = ark_std::test_rng();
        let sensitive = SensitiveScalar::new(Fr::rand(&mut rng));

        let mut bytes = Vec::new();
        sensitive.serialize_compressed(&mut bytes).unwrap();
        let decoded = SensitiveScalar::<Fr>::deserialize_compressed(&bytes[..]).unwrap();
        assert_eq!(decoded.expose_secret(), sensitive.expose_secret());
    }

    #[test]
    fn test_subtle_constant_time_eq() {
        assert!(subtle_constant_time_eq(&[1, 2, 3, 4], &[1, 2, 3, 4]));
        assert!(!subtle_constant_time_eq(&[1, 2, 3, 4], &[1, 2, 3, 5]));
        assert!(!subtle_constant_time_eq(&[1, 2, 3], &[1, 2, 3, 4]));
    }

    #[test]
    fn test_verify_bls_share() {
        let mut rng = ark_std::test_rng();

        let sk = Fr::rand(&mut rng);
        let pk = G1::generator() * sk;
        let message = G2::rand(&mut rng);

        let valid = message * sk;
        let invalid = message * Fr::rand(&mut rng);

        assert!(verify_bls_share::<E>(&valid, &pk, &message));
        assert!(!verify_bls_share::<E>(&invalid, &pk, &message));
        // a share for another message does not verify either
        assert!(!verify_bls_share::<E>(&valid, &pk, &G2::rand(&mut rng)));
        assert!(!verify_bls_share::<E>(&valid, &(pk + G1::generator()), &message));
    }
}
