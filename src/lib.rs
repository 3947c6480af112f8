//! Silent Threshold Encryption
//!
//! This library implements the silent threshold encryption scheme described in
//! [ePrint:2024/263](https://eprint.iacr.org/2024/263).
//!
//! ## Overview
//!
//! Every party publishes a single public key, computed offline and without
//! talking to anyone. A sender aggregates whichever keys are available into an
//! aggregate key and encrypts to any threshold `t` of that committee. Any `t`
//! members can later decrypt by each releasing one share.
//!
//! ## Key Components
//!
//! - **Setup** ([`params`], [`trusted_setup`]): KZG powers of tau and
//!   preprocessed Lagrange commitments, bounded by a maximum committee size
//! - **Key Generation** ([`setup`]): secret/public key pairs with aggregation hints
//! - **Aggregation** ([`aggregate`]): public, deterministic, order-independent
//! - **Encryption** ([`encryption`]): threshold KEM plus an authenticated payload
//! - **Decryption** ([`decryption`]): partial decryptions and their combination
//! - **Bytes** ([`api`]): the same operations over canonical encodings
//!
//! ## Example
//!
//! ```rust,no_run
//! use ark_bls12_381::Bls12_381;
//! use silent_threshold::{
//!     aggregate::AggregateKey,
//!     decryption::{decrypt, partial_decrypt, Selector},
//!     encryption::encrypt,
//!     params::Params,
//!     setup::generate_key,
//! };
//!
//! type E = Bls12_381;
//!
//! let mut rng = ark_std::test_rng();
//! let n = 5; // committee size
//! let t = 3; // threshold
//!
//! // Setup
//! let params = Params::<E>::new(n, &mut rng).unwrap();
//!
//! // Key generation, each party on its own
//! let keys: Vec<_> = (0..n)
//!     .map(|i| generate_key(&params, i, &mut rng).unwrap())
//!     .collect();
//! let pks: Vec<_> = keys.iter().map(|(_, pk)| pk.clone()).collect();
//! let agg_key = AggregateKey::new(&pks, &params).unwrap();
//!
//! // Encryption
//! let ct = encrypt(&agg_key, t, &params, b"hello", &mut rng).unwrap();
//!
//! // Decryption with parties 0, 2 and 4
//! let parties = [0, 2, 4];
//! let partials: Vec<_> = parties
//!     .iter()
//!     .map(|&i| partial_decrypt(&keys[i].0, i, &ct).unwrap())
//!     .collect();
//! let selector = Selector::from_indices(&ct.committee, &parties).unwrap();
//! let plaintext = decrypt(&partials, &selector, &ct, &agg_key, &params).unwrap();
//! assert_eq!(plaintext, b"hello");
//! ```

pub mod aggregate;
pub mod api;
pub mod decryption;
pub mod encoding;
pub mod encryption;
pub mod error;
pub mod kzg;
pub mod params;
pub mod payload;
pub mod security;
pub mod setup;
pub mod trusted_setup;
pub mod utils;

pub use aggregate::{aggregate, AggregateKey};
pub use decryption::{agg_dec, decrypt, partial_decrypt, PartialDecryption, Selector};
pub use encoding::Encode;
pub use encryption::{encapsulate, encrypt, Ciphertext};
pub use error::{ErrorKind, SteError};
pub use params::{Params, MAX_COMMITTEE_SIZE};
pub use payload::{PayloadCipher, XChaCha20Poly1305};
pub use setup::{generate_key, PublicKey, SecretKey};
