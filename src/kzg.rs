//! KZG10 commitments over a structured reference string.
//!
//! Only the commitment half of KZG is needed here: the threshold is enforced
//! by the fact that a polynomial with more coefficients than available powers
//! cannot be committed to at all.

use ark_ec::{pairing::Pairing, CurveGroup, PrimeGroup, ScalarMul, VariableBaseMSM};
use ark_ff::{One, Zero};
use ark_poly::DenseUVPolynomial;
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
};
use ark_std::marker::PhantomData;
use thiserror::Error;
use zeroize::Zeroize;

use crate::encoding::read_vec;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("maximum degree must be at least 1")]
    DegreeIsZero,
    #[error("tau must be non-zero")]
    TrapdoorIsZero,
    #[error("polynomial has {num_coefficients} coefficients but only {num_powers} powers are available")]
    TooManyCoefficients {
        num_coefficients: usize,
        num_powers: usize,
    },
    #[error("MSM length mismatch ({0})")]
    Msm(usize),
    #[error("ceremony has no contributions")]
    EmptyCeremony,
}

/// Powers of a discarded trapdoor `tau` in both source groups.
///
/// `powers_of_g[k] = tau^k * G` and `powers_of_h[k] = tau^k * H` for
/// `k = 0..=max_degree`.
#[derive(CanonicalSerialize, Clone, Debug, PartialEq, Eq)]
pub struct PowersOfTau<E: Pairing> {
    pub powers_of_g: Vec<E::G1Affine>,
    pub powers_of_h: Vec<E::G2Affine>,
}

impl<E: Pairing> Valid for PowersOfTau<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.powers_of_g.check()?;
        self.powers_of_h.check()
    }
}

impl<E: Pairing> CanonicalDeserialize for PowersOfTau<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(PowersOfTau {
            powers_of_g: read_vec(&mut reader, compress, validate)?,
            powers_of_h: read_vec(&mut reader, compress, validate)?,
        })
    }
}

impl<E: Pairing> PowersOfTau<E> {
    pub fn max_degree(&self) -> usize {
        self.powers_of_g.len().saturating_sub(1)
    }
}

pub struct KZG10<E: Pairing, P: DenseUVPolynomial<E::ScalarField>> {
    _engine: PhantomData<(E, P)>,
}

impl<E, P> KZG10<E, P>
where
    E: Pairing,
    P: DenseUVPolynomial<E::ScalarField>,
{
    /// Computes powers of `tau` up to `max_degree` in G1 and G2.
    ///
    /// The caller owns `tau` and is responsible for discarding it. The
    /// scalar powers computed here are wiped before returning.
    pub fn setup(max_degree: usize, tau: E::ScalarField) -> Result<PowersOfTau<E>, Error> {
        if max_degree < 1 {
            return Err(Error::DegreeIsZero);
        }
        if tau.is_zero() {
            return Err(Error::TrapdoorIsZero);
        }

        let mut powers_of_tau = Vec::with_capacity(max_degree + 1);
        let mut cur = E::ScalarField::one();
        for _ in 0..=max_degree {
            powers_of_tau.push(cur);
            cur *= tau;
        }

        let powers_of_g = E::G1::generator().batch_mul(&powers_of_tau);
        let powers_of_h = E::G2::generator().batch_mul(&powers_of_tau);
        powers_of_tau.zeroize();
        cur.zeroize();

        Ok(PowersOfTau {
            powers_of_g,
            powers_of_h,
        })
    }

    /// Commits to `polynomial` in G1.
    pub fn commit_g1(params: &PowersOfTau<E>, polynomial: &P) -> Result<E::G1Affine, Error> {
        let coeffs = polynomial.coeffs();
        if coeffs.len() > params.powers_of_g.len() {
            return Err(Error::TooManyCoefficients {
                num_coefficients: coeffs.len(),
                num_powers: params.powers_of_g.len(),
            });
        }

        let commitment = E::G1::msm(&params.powers_of_g[..coeffs.len()], coeffs).map_err(Error::Msm)?;
        Ok(commitment.into_affine())
    }

    /// Commits to `polynomial` in G2.
    pub fn commit_g2(params: &PowersOfTau<E>, polynomial: &P) -> Result<E::G2Affine, Error> {
        let coeffs = polynomial.coeffs();
        if coeffs.len() > params.powers_of_h.len() {
            return Err(Error::TooManyCoefficients {
                num_coefficients: coeffs.len(),
                num_powers: params.powers_of_h.len(),
            });
        }

        let commitment = E::G2::msm(&params.powers_of_h[..coeffs.len()], coeffs).map_err(Error::Msm)?;
        Ok(commitment.into_affine())
    }
}
