use crate::aggregate::AggregateKey;
use crate::encoding::read_vec;
use crate::error::SteError;
use crate::params::Params;
use crate::payload::{derive_key, PayloadCipher, XChaCha20Poly1305};
use ark_ec::{
    pairing::{Pairing, PairingOutput},
    AffineRepr, PrimeGroup,
};
use ark_serialize::*;
use ark_std::{rand::RngCore, UniformRand, Zero};
use tracing::debug;

/// Number of G1 elements in the sa1 proof array.
pub const SA1_SIZE: usize = 2;

/// Number of G2 elements in the sa2 proof array.
pub const SA2_SIZE: usize = 6;

/// Number of random scalar values used during encryption.
pub const ENCRYPTION_RANDOMNESS_SIZE: usize = 5;

/// A ciphertext in the silent threshold encryption scheme.
///
/// The header (everything except `payload`) encapsulates a key for the
/// committee and threshold it names; `payload` is the message sealed under a
/// key derived from that encapsulated key and the header bytes.
#[derive(CanonicalSerialize, Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext<E: Pairing> {
    /// G2 element: gamma * H (where gamma is random)
    pub gamma_g2: E::G2,
    /// G1 elements for proof (size = SA1_SIZE)
    pub sa1: [E::G1; SA1_SIZE],
    /// G2 elements for proof (size = SA2_SIZE)
    pub sa2: [E::G2; SA2_SIZE],
    /// The threshold value
    pub t: usize,
    /// Committee indices in ascending order
    pub committee: Vec<usize>,
    pub domain_size: usize,
    pub payload: Vec<u8>,
}

impl<E: Pairing> Valid for Ciphertext<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.gamma_g2.check()?;
        self.sa1.check()?;
        self.sa2.check()
    }
}

impl<E: Pairing> CanonicalDeserialize for Ciphertext<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(Ciphertext {
            gamma_g2: E::G2::deserialize_with_mode(&mut reader, compress, validate)?,
            sa1: <[E::G1; SA1_SIZE]>::deserialize_with_mode(&mut reader, compress, validate)?,
            sa2: <[E::G2; SA2_SIZE]>::deserialize_with_mode(&mut reader, compress, validate)?,
            t: usize::deserialize_with_mode(&mut reader, compress, validate)?,
            committee: read_vec(&mut reader, compress, validate)?,
            domain_size: usize::deserialize_with_mode(&mut reader, compress, validate)?,
            payload: read_vec(&mut reader, compress, validate)?,
        })
    }
}

impl<E: Pairing> Ciphertext<E> {
    /// Canonical bytes of every field except the payload.
    pub fn header_bytes(&self) -> Result<Vec<u8>, SteError> {
        let mut bytes = Vec::new();
        self.gamma_g2.serialize_compressed(&mut bytes)?;
        self.sa1.serialize_compressed(&mut bytes)?;
        self.sa2.serialize_compressed(&mut bytes)?;
        self.t.serialize_compressed(&mut bytes)?;
        self.committee.serialize_compressed(&mut bytes)?;
        self.domain_size.serialize_compressed(&mut bytes)?;
        Ok(bytes)
    }

    /// Whether `index` belongs to the committee this ciphertext targets.
    pub fn includes(&self, index: usize) -> bool {
        self.committee.binary_search(&index).is_ok()
    }

    /// Degree bound enforced by `sa1[0]`: the threshold plus one per absent slot.
    pub fn degree_threshold(&self) -> Result<usize, SteError> {
        let absent = self
            .domain_size
            .checked_sub(1 + self.committee.len())
            .ok_or_else(|| {
                SteError::CiphertextMismatch("committee larger than its domain".to_string())
            })?;
        Ok(self.t + absent)
    }

    /// Structural check for ciphertexts read from untrusted bytes.
    pub fn validate(&self) -> Result<(), SteError> {
        let malformed = |what: &str| SteError::CiphertextMismatch(format!("malformed ciphertext: {}", what));
        if !self.domain_size.is_power_of_two() || self.domain_size < 2 {
            return Err(malformed("domain size is not a power of two"));
        }
        if self.committee.is_empty() || self.committee.len() >= self.domain_size {
            return Err(malformed("committee size does not fit the domain"));
        }
        if self.committee.windows(2).any(|w| w[0] >= w[1]) {
            return Err(malformed("committee is not strictly ascending"));
        }
        if self.committee.iter().any(|&i| i + 1 >= self.domain_size) {
            return Err(malformed("committee index outside the domain"));
        }
        if self.t == 0 || self.t > self.committee.len() {
            return Err(malformed("threshold out of range"));
        }
        Ok(())
    }
}

/// Encapsulates a fresh key to the committee of `apk` with threshold `t`.
///
/// Returns the ciphertext header (with an empty payload) and the encapsulated
/// key `s4 * e(G, H)`, which is never stored in the ciphertext.
///
/// # Errors
/// - `InvalidThreshold` if `t == 0` or `t` exceeds the committee size
/// - `ParamsMismatch` if `apk` was built under different parameters
pub fn encapsulate<E: Pairing, R: RngCore>(
    apk: &AggregateKey<E>,
    t: usize,
    params: &Params<E>,
    rng: &mut R,
) -> Result<(Ciphertext<E>, PairingOutput<E>), SteError> {
    let n = params.domain_size();
    if apk.domain_size != n {
        return Err(SteError::ParamsMismatch(format!(
            "aggregate key built for domain size {} but parameters use {}",
            apk.domain_size, n
        )));
    }
    let committee_size = apk.committee_size();
    if t == 0 || t > committee_size {
        return Err(SteError::InvalidThreshold {
            threshold: t,
            committee_size,
        });
    }
    // absent slots count as shares nobody can withhold, so raise the bound
    let degree_t = t + apk.absent_slots();
    if degree_t + 1 >= params.powers.powers_of_g.len() {
        return Err(SteError::ParamsMismatch(format!(
            "degree bound {} exceeds parameter powers ({})",
            degree_t + 1,
            params.powers.powers_of_g.len()
        )));
    }

    let powers = &params.powers;
    let gamma = E::ScalarField::rand(rng);
    let gamma_g2 = powers.powers_of_h[0] * gamma;

    let g = powers.powers_of_g[0];
    let h = powers.powers_of_h[0];

    let mut sa1 = [E::G1::generator(); SA1_SIZE];
    let mut sa2 = [E::G2::generator(); SA2_SIZE];

    let mut s: [E::ScalarField; ENCRYPTION_RANDOMNESS_SIZE] =
        [E::ScalarField::zero(); ENCRYPTION_RANDOMNESS_SIZE];

    s.iter_mut()
        .for_each(|s_elem| *s_elem = E::ScalarField::rand(rng));

    // sa1[0] = s0*ask + s3*g^{tau^{t+1}} + s4*g
    sa1[0] = (apk.ask * s[0]) + (powers.powers_of_g[degree_t + 1] * s[3]) + (g * s[4]);

    // sa1[1] = s2*g
    sa1[1] = g * s[2];

    // sa2[0] = s0*h + s2*gamma_g2
    sa2[0] = (h * s[0]) + (gamma_g2 * s[2]);

    // sa2[1] = s0*z_g2
    sa2[1] = apk.z_g2 * s[0];

    // sa2[2] = s0*h^tau + s1*h^tau
    sa2[2] = powers.powers_of_h[1] * (s[0] + s[1]);

    // sa2[3] = s1*h
    sa2[3] = h * s[1];

    // sa2[4] = s3*h
    sa2[4] = h * s[3];

    // sa2[5] = s4*h^{tau - omega^0}
    sa2[5] = (powers.powers_of_h[1].into_group() + apk.h_minus1) * s[4];

    // enc_key = s4*e_gh
    let enc_key = apk.e_gh * s[4];
    s.iter_mut().for_each(|s_elem| *s_elem = E::ScalarField::zero());

    let ct = Ciphertext {
        gamma_g2,
        sa1,
        sa2,
        t,
        committee: apk.committee(),
        domain_size: n,
        payload: Vec::new(),
    };
    debug!(
        threshold = t,
        committee_size,
        degree_bound = degree_t + 1,
        "encapsulated key"
    );
    Ok((ct, enc_key))
}

/// Encrypts `plaintext` to the committee of `apk` with threshold `t`.
pub fn encrypt<E: Pairing, R: RngCore>(
    apk: &AggregateKey<E>,
    t: usize,
    params: &Params<E>,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Ciphertext<E>, SteError> {
    encrypt_with_cipher(&XChaCha20Poly1305, apk, t, params, plaintext, rng)
}

/// [`encrypt`] with a caller-chosen payload cipher.
pub fn encrypt_with_cipher<E: Pairing, R: RngCore, C: PayloadCipher>(
    cipher: &C,
    apk: &AggregateKey<E>,
    t: usize,
    params: &Params<E>,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Ciphertext<E>, SteError> {
    let (mut ct, enc_key) = encapsulate(apk, t, params, rng)?;
    let key = derive_key(&enc_key, &ct.header_bytes()?)?;
    ct.payload = cipher.seal(&key, plaintext)?;
    Ok(ct)
}
