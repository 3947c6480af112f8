//! Multi-party powers-of-tau ceremony
//!
//! Produces [`PowersOfTau`] whose trapdoor is known to nobody as long as one
//! participant discards their share of it.
//!
//! # Ceremony Protocol
//!
//! 1. The first participant samples `tau_1` and publishes `{tau_1^i G}`, `{tau_1^i H}`
//! 2. Each subsequent participant k:
//!    - Takes the accumulated powers `{tau^i G}`, `{tau^i H}`
//!    - Samples `tau_k` and raises the i-th power by `tau_k^i`
//!    - Publishes the new powers together with `tau_k H`
//!    - Discards `tau_k`
//! 3. The final powers use `tau = tau_1 * ... * tau_k`
//!
//! Every contribution can be checked with pairings against its predecessor,
//! see [`Ceremony::verify_contribution`].

use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, PrimeGroup, ScalarMul};
use ark_ff::{One, PrimeField, UniformRand, Zero};
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
};
use ark_std::rand::RngCore;
use ark_std::vec::Vec;
use blake2::{Blake2b512, Digest};
use tracing::{debug, warn};

use crate::encoding::read_vec;
use crate::kzg::{Error as KzgError, PowersOfTau};
use crate::security::SensitiveScalar;
use crate::utils::{compute_msm_g1, compute_msm_g2};

const CONTRIBUTION_CHALLENGE_DOMAIN: &[u8] = b"silent-threshold/ceremony/v1";

/// A contribution to the powers-of-tau ceremony
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize)]
pub struct Contribution<E: Pairing> {
    /// The updated powers of G after this contribution
    pub powers_of_g: Vec<E::G1Affine>,
    /// The updated powers of H after this contribution
    pub powers_of_h: Vec<E::G2Affine>,
    /// `tau_k * H` for this participant's secret, linking it to the previous powers
    pub update_h: E::G2Affine,
}

/// Ceremony state tracking all contributions
#[derive(Clone, Debug, CanonicalSerialize)]
pub struct Ceremony<E: Pairing> {
    pub max_degree: usize,
    pub contributions: Vec<Contribution<E>>,
}

impl<E: Pairing> Valid for Contribution<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.powers_of_g.check()?;
        self.powers_of_h.check()?;
        self.update_h.check()
    }
}

impl<E: Pairing> CanonicalDeserialize for Contribution<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(Contribution {
            powers_of_g: read_vec(&mut reader, compress, validate)?,
            powers_of_h: read_vec(&mut reader, compress, validate)?,
            update_h: E::G2Affine::deserialize_with_mode(&mut reader, compress, validate)?,
        })
    }
}

impl<E: Pairing> Valid for Ceremony<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.contributions.check()
    }
}

impl<E: Pairing> CanonicalDeserialize for Ceremony<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(Ceremony {
            max_degree: usize::deserialize_with_mode(&mut reader, compress, validate)?,
            contributions: read_vec(&mut reader, compress, validate)?,
        })
    }
}

fn sample_tau<F: PrimeField, R: RngCore>(rng: &mut R) -> SensitiveScalar<F> {
    loop {
        let tau = F::rand(rng);
        if !tau.is_zero() {
            return SensitiveScalar::new(tau);
        }
    }
}

fn powers_of<F: PrimeField>(tau: &F, max_degree: usize) -> Vec<F> {
    let mut powers = Vec::with_capacity(max_degree + 1);
    let mut cur = F::one();
    for _ in 0..=max_degree {
        powers.push(cur);
        cur *= tau;
    }
    powers
}

impl<E: Pairing> Ceremony<E> {
    /// Initialize a new ceremony with the given maximum degree
    ///
    /// The first contribution is made with randomness from `rng`.
    pub fn new<R: RngCore>(max_degree: usize, rng: &mut R) -> Result<Self, KzgError> {
        if max_degree < 1 {
            return Err(KzgError::DegreeIsZero);
        }

        let tau = sample_tau::<E::ScalarField, R>(rng);
        let mut powers_of_tau = powers_of(tau.expose_secret(), max_degree);

        let initial_contribution = Contribution {
            powers_of_g: E::G1::generator().batch_mul(&powers_of_tau),
            powers_of_h: E::G2::generator().batch_mul(&powers_of_tau),
            update_h: (E::G2::generator() * *tau.expose_secret()).into_affine(),
        };
        powers_of_tau.iter_mut().for_each(|p| *p = E::ScalarField::zero());

        Ok(Ceremony {
            max_degree,
            contributions: vec![initial_contribution],
        })
    }

    /// Add a new contribution to the ceremony
    ///
    /// This participant's secret never leaves this call.
    pub fn contribute<R: RngCore>(&mut self, rng: &mut R) -> Result<(), KzgError> {
        let previous = self.contributions.last().ok_or(KzgError::EmptyCeremony)?;

        let tau = sample_tau::<E::ScalarField, R>(rng);
        let mut powers_of_tau = powers_of(tau.expose_secret(), self.max_degree);

        // {tau_k^i * (tau^i G)} = {(tau * tau_k)^i G}
        let new_powers_of_g: Vec<E::G1> = previous
            .powers_of_g
            .iter()
            .zip(powers_of_tau.iter())
            .map(|(prev_g, tau_power)| *prev_g * *tau_power)
            .collect();
        let new_powers_of_h: Vec<E::G2> = previous
            .powers_of_h
            .iter()
            .zip(powers_of_tau.iter())
            .map(|(prev_h, tau_power)| *prev_h * *tau_power)
            .collect();

        let new_contribution = Contribution {
            powers_of_g: E::G1::normalize_batch(&new_powers_of_g),
            powers_of_h: E::G2::normalize_batch(&new_powers_of_h),
            update_h: (E::G2::generator() * *tau.expose_secret()).into_affine(),
        };
        powers_of_tau.iter_mut().for_each(|p| *p = E::ScalarField::zero());

        self.contributions.push(new_contribution);
        debug!(
            participants = self.contributions.len(),
            "accepted ceremony contribution"
        );
        Ok(())
    }

    /// Verify that a contribution was computed correctly
    ///
    /// Checks, for contribution `k` on top of accumulated powers `prev`:
    /// 1. Both sequences have `max_degree + 1` entries starting at the generators
    /// 2. `e(g[1], H) == e(prev_g[1], update_h)`, so the new trapdoor extends the old one
    /// 3. `g[i+1] = tau * g[i]` for all i, batched with a random linear combination
    /// 4. `h[i]` and `g[i]` carry the same powers, batched the same way
    pub fn verify_contribution(&self, index: usize) -> bool {
        let Some(curr) = self.contributions.get(index) else {
            return false;
        };
        let prev_g1 = if index == 0 {
            E::G1Affine::generator()
        } else {
            match self.contributions[index - 1].powers_of_g.get(1) {
                Some(point) => *point,
                None => return false,
            }
        };

        let len = self.max_degree + 1;
        if self.max_degree < 1 || curr.powers_of_g.len() != len || curr.powers_of_h.len() != len {
            return false;
        }
        let g = E::G1::generator();
        let h = E::G2::generator();
        if curr.powers_of_g[0] != E::G1Affine::generator()
            || curr.powers_of_h[0] != E::G2Affine::generator()
            || curr.update_h.is_zero()
        {
            return false;
        }

        // new tau is old tau times the contributor's secret
        let link = E::multi_pairing(
            [curr.powers_of_g[1].into_group(), -prev_g1.into_group()],
            [h, curr.update_h.into_group()],
        );
        if !link.is_zero() {
            warn!(index, "ceremony contribution does not extend its predecessor");
            return false;
        }

        let r = match Self::challenge(curr) {
            Some(r) => r,
            None => return false,
        };
        let weights = powers_of(&r, self.max_degree);

        let shifted = compute_msm_g1::<E>(
            &curr.powers_of_g[1..],
            &weights[..self.max_degree],
            "ceremony shifted powers",
        );
        let unshifted = compute_msm_g1::<E>(
            &curr.powers_of_g[..self.max_degree],
            &weights[..self.max_degree],
            "ceremony powers",
        );
        let all_g = compute_msm_g1::<E>(&curr.powers_of_g, &weights, "ceremony powers of g");
        let all_h = compute_msm_g2::<E>(&curr.powers_of_h, &weights, "ceremony powers of h");
        let (shifted, unshifted, all_g, all_h) = match (shifted, unshifted, all_g, all_h) {
            (Ok(a), Ok(b), Ok(c), Ok(d)) => (a, b, c, d),
            _ => return false,
        };

        let chain = E::multi_pairing(
            [shifted, -unshifted],
            [h, curr.powers_of_h[1].into_group()],
        );
        let cross = E::multi_pairing([all_g, -g], [h, all_h]);
        if !chain.is_zero() || !cross.is_zero() {
            warn!(index, "ceremony contribution has inconsistent powers");
            return false;
        }

        true
    }

    /// Verifies every contribution in order.
    pub fn verify_all(&self) -> bool {
        !self.contributions.is_empty()
            && (0..self.contributions.len()).all(|i| self.verify_contribution(i))
    }

    /// Finalize the ceremony and extract the powers of tau parameters
    ///
    /// This should only be called after all contributions have been verified.
    pub fn finalize(mut self) -> Result<PowersOfTau<E>, KzgError> {
        let final_contribution = self.contributions.pop().ok_or(KzgError::EmptyCeremony)?;
        Ok(PowersOfTau {
            powers_of_g: final_contribution.powers_of_g,
            powers_of_h: final_contribution.powers_of_h,
        })
    }

    /// Get the number of participants so far
    pub fn num_participants(&self) -> usize {
        self.contributions.len()
    }

    fn challenge(contribution: &Contribution<E>) -> Option<E::ScalarField> {
        let mut bytes = Vec::new();
        contribution.serialize_compressed(&mut bytes).ok()?;

        let mut hasher = Blake2b512::new();
        hasher.update(CONTRIBUTION_CHALLENGE_DOMAIN);
        hasher.update(&bytes);
        let r = E::ScalarField::from_le_bytes_mod_order(&hasher.finalize());
        if r.is_zero() {
            Some(E::ScalarField::one())
        } else {
            Some(r)
        }
    }
}
