//! Byte-buffer interface on BLS12-381.
//!
//! Every entity crosses this boundary in its canonical compressed encoding
//! (see [`crate::encoding`]). Decoded structures are validated before use, and
//! randomness comes from the operating system.

use ark_std::rand::{CryptoRng, RngCore};
use rand::{rngs::StdRng, SeedableRng};
use zeroize::Zeroizing;

use crate::aggregate::AggregateKey;
use crate::decryption::{self, PartialDecryption, Selector};
use crate::encoding::Encode;
use crate::encryption::{self, Ciphertext};
use crate::error::SteError;
use crate::params::Params;
use crate::setup::{self, PublicKey, SecretKey};

pub type Curve = ark_bls12_381::Bls12_381;

/// OS-seeded `StdRng` exposed through the arkworks RNG traits.
pub struct SecureRng {
    inner: StdRng,
}

impl SecureRng {
    pub fn new() -> Self {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        SecureRng {
            inner: StdRng::from_seed(seed),
        }
    }
}

impl Default for SecureRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngCore for SecureRng {
    fn next_u32(&mut self) -> u32 {
        <StdRng as rand::RngCore>::next_u32(&mut self.inner)
    }

    fn next_u64(&mut self) -> u64 {
        <StdRng as rand::RngCore>::next_u64(&mut self.inner)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        <StdRng as rand::RngCore>::fill_bytes(&mut self.inner, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), ark_std::rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for SecureRng {}

fn decode_params(bytes: &[u8]) -> Result<Params<Curve>, SteError> {
    let params = Params::<Curve>::from_bytes(bytes)?;
    params.validate()?;
    Ok(params)
}

fn decode_agg_key(bytes: &[u8], params: &Params<Curve>) -> Result<AggregateKey<Curve>, SteError> {
    let agg_key = AggregateKey::<Curve>::from_bytes(bytes)?;
    agg_key.validate(params)?;
    Ok(agg_key)
}

fn decode_ciphertext(bytes: &[u8]) -> Result<Ciphertext<Curve>, SteError> {
    let ct = Ciphertext::<Curve>::from_bytes(bytes)?;
    ct.validate()?;
    Ok(ct)
}

/// Generates parameters for committees of up to `max_committee_size` parties.
pub fn setup(max_committee_size: usize) -> Result<Vec<u8>, SteError> {
    Params::<Curve>::new(max_committee_size, &mut SecureRng::new())?.to_bytes()
}

/// Returns `(secret_key, public_key)` for slot `index`. The secret key
/// buffer is wiped when dropped.
pub fn generate_key(
    params: &[u8],
    index: usize,
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>), SteError> {
    let params = decode_params(params)?;
    let (sk, pk) = setup::generate_key(&params, index, &mut SecureRng::new())?;
    Ok((Zeroizing::new(sk.to_bytes()?), pk.to_bytes()?))
}

/// Aggregates encoded public keys. Each key carries its own index.
pub fn aggregate(params: &[u8], public_keys: &[Vec<u8>]) -> Result<Vec<u8>, SteError> {
    let params = decode_params(params)?;
    let pks = public_keys
        .iter()
        .map(|bytes| PublicKey::<Curve>::from_bytes(bytes))
        .collect::<Result<Vec<_>, _>>()?;
    AggregateKey::new(&pks, &params)?.to_bytes()
}

pub fn encrypt(
    params: &[u8],
    aggregate_key: &[u8],
    threshold: usize,
    plaintext: &[u8],
) -> Result<Vec<u8>, SteError> {
    let params = decode_params(params)?;
    let agg_key = decode_agg_key(aggregate_key, &params)?;
    encryption::encrypt(&agg_key, threshold, &params, plaintext, &mut SecureRng::new())?
        .to_bytes()
}

pub fn partial_decrypt(
    secret_key: &[u8],
    index: usize,
    ciphertext: &[u8],
) -> Result<Vec<u8>, SteError> {
    let sk = SecretKey::<Curve>::from_bytes(secret_key)?;
    let ct = decode_ciphertext(ciphertext)?;
    decryption::partial_decrypt(&sk, index, &ct)?.to_bytes()
}

/// Encodes a selector with one entry per committee member in ascending
/// index order.
pub fn selector(bits: &[bool]) -> Result<Vec<u8>, SteError> {
    Selector::new(bits.to_vec()).to_bytes()
}

pub fn decrypt(
    params: &[u8],
    aggregate_key: &[u8],
    ciphertext: &[u8],
    partial_decryptions: &[Vec<u8>],
    selector: &[u8],
) -> Result<Vec<u8>, SteError> {
    let params = decode_params(params)?;
    let agg_key = decode_agg_key(aggregate_key, &params)?;
    let ct = decode_ciphertext(ciphertext)?;
    let partials = partial_decryptions
        .iter()
        .map(|bytes| PartialDecryption::<Curve>::from_bytes(bytes))
        .collect::<Result<Vec<_>, _>>()?;
    let selector = Selector::from_bytes(selector)?;
    decryption::decrypt(&partials, &selector, &ct, &agg_key, &params)
}
