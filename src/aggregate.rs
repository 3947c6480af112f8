//! Silent aggregation of public keys into an encryption key.
//!
//! Aggregation is a deterministic, public computation over published keys.
//! No party is contacted. Domain slots that belong to no committee member are
//! treated as parties holding the zero key, and encryption raises the degree
//! bound by their number so they never count towards the threshold.

use ark_ec::{pairing::Pairing, pairing::PairingOutput, AffineRepr};
use ark_serialize::*;
use ark_std::{end_timer, start_timer, Zero};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::decryption::PartialDecryption;
use crate::encoding::read_vec;
use crate::encryption::Ciphertext;
use crate::error::SteError;
use crate::params::Params;
use crate::security::verify_bls_share;
use crate::setup::PublicKey;

/// The part of a member's public key that decryption still needs.
#[derive(CanonicalSerialize, CanonicalDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MemberHints<E: Pairing> {
    pub index: usize,
    pub bls_pk: E::G1,
    pub sk_li_minus0: E::G1,
    pub sk_li_x: E::G1,
}

/// Aggregated key for a committee, used for encryption and decryption.
///
/// Members are stored in ascending index order; that order is the order of
/// the bits of a [`crate::decryption::Selector`].
#[derive(CanonicalSerialize, Clone, Debug, PartialEq, Eq)]
pub struct AggregateKey<E: Pairing> {
    pub domain_size: usize,
    pub members: Vec<MemberHints<E>>,
    /// Sum over the anchor and all members of their `sk_li_lj_z` hints, per slot
    pub agg_sk_li_lj_z: Vec<E::G1>,
    pub ask: E::G1,
    pub z_g2: E::G2,

    //preprocessed values
    pub h_minus1: E::G2,
    pub e_gh: PairingOutput<E>,
}

impl<E: Pairing> Valid for AggregateKey<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.members.check()?;
        self.agg_sk_li_lj_z.check()?;
        self.ask.check()?;
        self.z_g2.check()?;
        self.h_minus1.check()?;
        self.e_gh.check()
    }
}

impl<E: Pairing> CanonicalDeserialize for AggregateKey<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(AggregateKey {
            domain_size: usize::deserialize_with_mode(&mut reader, compress, validate)?,
            members: read_vec(&mut reader, compress, validate)?,
            agg_sk_li_lj_z: read_vec(&mut reader, compress, validate)?,
            ask: E::G1::deserialize_with_mode(&mut reader, compress, validate)?,
            z_g2: E::G2::deserialize_with_mode(&mut reader, compress, validate)?,
            h_minus1: E::G2::deserialize_with_mode(&mut reader, compress, validate)?,
            e_gh: PairingOutput::<E>::deserialize_with_mode(&mut reader, compress, validate)?,
        })
    }
}

impl<E: Pairing> AggregateKey<E> {
    /// Aggregates verified public keys into a committee key.
    ///
    /// The result depends only on the set of keys, not on their order.
    ///
    /// # Errors
    /// - `EmptyCommittee` if `pks` is empty
    /// - `DuplicateIndex` if two keys claim the same index
    /// - `IndexOutOfRange` if an index is not below the committee bound
    /// - `InvalidPublicKey` if a key's hints do not match its BLS key
    pub fn new(pks: &[PublicKey<E>], params: &Params<E>) -> Result<Self, SteError> {
        if pks.is_empty() {
            return Err(SteError::EmptyCommittee);
        }

        let mut sorted: Vec<&PublicKey<E>> = pks.iter().collect();
        sorted.sort_by_key(|pk| pk.index);
        for pair in sorted.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(SteError::DuplicateIndex(pair[0].index));
            }
        }
        if let Some(pk) = sorted.iter().find(|pk| pk.index >= params.max_committee_size) {
            return Err(SteError::IndexOutOfRange {
                index: pk.index,
                bound: params.max_committee_size,
            });
        }

        let verify_timer = start_timer!(|| format!("Verify {} public keys", sorted.len()));
        sorted.par_iter().try_for_each(|pk| {
            pk.verify(params).map_err(|e| {
                warn!(index = pk.index, "rejected public key during aggregation");
                e
            })
        })?;
        end_timer!(verify_timer);

        let n = params.domain_size();
        let lagrange = &params.lagrange;
        let h = params.powers.powers_of_h[0].into_group();
        let h_minus1 = -h;
        let z_g2 = params.powers.powers_of_h[n].into_group() + h_minus1;

        // the anchor slot 0 holds the fixed secret 1
        let mut ask: E::G1 = lagrange.li[0].into_group();
        for pk in &sorted {
            ask += pk.sk_li;
        }

        let agg_sk_li_lj_z: Vec<E::G1> = (0..n)
            .into_par_iter()
            .map(|j| {
                sorted
                    .iter()
                    .fold(lagrange.li_lj_z[0][j].into_group(), |acc, pk| {
                        acc + pk.sk_li_lj_z[j]
                    })
            })
            .collect();

        let members = sorted
            .iter()
            .map(|pk| MemberHints {
                index: pk.index,
                bls_pk: pk.bls_pk,
                sk_li_minus0: pk.sk_li_minus0,
                sk_li_x: pk.sk_li_x,
            })
            .collect();

        let agg_key = AggregateKey {
            domain_size: n,
            members,
            agg_sk_li_lj_z,
            ask,
            z_g2,
            h_minus1,
            e_gh: E::pairing(params.powers.powers_of_g[0], params.powers.powers_of_h[0]),
        };
        info!(
            committee_size = agg_key.committee_size(),
            absent_slots = agg_key.absent_slots(),
            "aggregated committee key"
        );
        Ok(agg_key)
    }

    /// Committee indices in ascending order.
    pub fn committee(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.index).collect()
    }

    pub fn committee_size(&self) -> usize {
        self.members.len()
    }

    /// Slots other than the anchor that hold no committee member.
    pub fn absent_slots(&self) -> usize {
        self.domain_size - 1 - self.members.len()
    }

    /// Position of `index` in the committee, which is also its selector bit.
    pub fn position(&self, index: usize) -> Option<usize> {
        self.members.binary_search_by_key(&index, |m| m.index).ok()
    }

    pub fn member(&self, index: usize) -> Option<&MemberHints<E>> {
        self.position(index).map(|pos| &self.members[pos])
    }

    /// Checks a partial decryption against the BLS key of the claimed member.
    pub fn verify_share(&self, share: &PartialDecryption<E>, ct: &Ciphertext<E>) -> bool {
        match self.member(share.index) {
            Some(member) => verify_bls_share::<E>(&share.share, &member.bls_pk, &ct.gamma_g2),
            None => false,
        }
    }

    /// Structural check for keys read from untrusted bytes.
    pub fn validate(&self, params: &Params<E>) -> Result<(), SteError> {
        let n = params.domain_size();
        if self.domain_size != n {
            return Err(SteError::ParamsMismatch(format!(
                "aggregate key built for domain size {} but parameters use {}",
                self.domain_size, n
            )));
        }
        if self.members.is_empty() {
            return Err(SteError::EmptyCommittee);
        }
        if self.agg_sk_li_lj_z.len() != n {
            return Err(SteError::Encoding(
                "aggregate key has the wrong number of cross terms".to_string(),
            ));
        }
        for pair in self.members.windows(2) {
            if pair[0].index >= pair[1].index {
                return Err(SteError::DuplicateIndex(pair[1].index));
            }
        }
        if let Some(m) = self
            .members
            .iter()
            .find(|m| m.index >= params.max_committee_size)
        {
            return Err(SteError::IndexOutOfRange {
                index: m.index,
                bound: params.max_committee_size,
            });
        }

        let h = params.powers.powers_of_h[0].into_group();
        let expected_z_g2 = params.powers.powers_of_h[n].into_group() - h;
        let expected_e_gh = E::pairing(params.powers.powers_of_g[0], params.powers.powers_of_h[0]);
        if self.h_minus1 != -h || self.z_g2 != expected_z_g2 || self.e_gh != expected_e_gh {
            return Err(SteError::ParamsMismatch(
                "aggregate key constants do not match parameters".to_string(),
            ));
        }
        if self.ask.is_zero() {
            return Err(SteError::Encoding("aggregate key is the identity".to_string()));
        }
        debug!(committee_size = self.members.len(), "aggregate key validated");
        Ok(())
    }
}

/// Functional form of [`AggregateKey::new`].
pub fn aggregate<E: Pairing>(
    params: &Params<E>,
    pks: &[PublicKey<E>],
) -> Result<AggregateKey<E>, SteError> {
    AggregateKey::new(pks, params)
}
