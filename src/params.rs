//! Public parameters shared by every party.
//!
//! Parameters fix the committee bound `max_committee_size`, the evaluation
//! domain (one anchor slot plus one slot per party, rounded up to a power of
//! two) and the KZG powers that bound the degree of any committed polynomial.

use ark_ec::{pairing::Pairing, AffineRepr, PrimeGroup};
use ark_ff::Zero;
use ark_poly::univariate::DensePolynomial;
use ark_serialize::*;
use ark_std::{end_timer, rand::RngCore, start_timer, UniformRand};
use tracing::{debug, info};

use crate::error::SteError;
use crate::kzg::{PowersOfTau, KZG10};
use crate::security::SensitiveScalar;
use crate::setup::LagrangePowers;
use crate::trusted_setup::Ceremony;
use crate::utils::domain_size_for;

/// Largest committee bound supported by [`Params::new`].
pub const MAX_COMMITTEE_SIZE: usize = (1 << 10) - 1;

type UniPoly<E> = DensePolynomial<<E as Pairing>::ScalarField>;

#[derive(CanonicalSerialize, CanonicalDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Params<E: Pairing> {
    pub max_committee_size: usize,
    pub powers: PowersOfTau<E>,
    pub lagrange: LagrangePowers<E>,
}

fn check_size(max_committee_size: usize) -> Result<usize, SteError> {
    if max_committee_size == 0 || max_committee_size > MAX_COMMITTEE_SIZE {
        return Err(SteError::InvalidSize {
            size: max_committee_size,
            max: MAX_COMMITTEE_SIZE,
        });
    }
    Ok(domain_size_for(max_committee_size))
}

impl<E: Pairing> Params<E> {
    /// Samples a fresh trapdoor and derives parameters from it.
    ///
    /// The trapdoor lives only inside this call and is zeroized on return.
    /// Use [`Params::from_ceremony`] when no single party may learn it.
    pub fn new<R: RngCore>(max_committee_size: usize, rng: &mut R) -> Result<Self, SteError> {
        check_size(max_committee_size)?;

        let mut tau = SensitiveScalar::new(E::ScalarField::rand(rng));
        while tau.expose_secret().is_zero() {
            tau = SensitiveScalar::new(E::ScalarField::rand(rng));
        }

        Self::from_tau(max_committee_size, &tau)
    }

    /// Deterministic parameters for a known trapdoor. Anyone holding `tau`
    /// can decrypt without the committee, so this is for tests and benches.
    pub fn from_tau(
        max_committee_size: usize,
        tau: &SensitiveScalar<E::ScalarField>,
    ) -> Result<Self, SteError> {
        let n = check_size(max_committee_size)?;

        let setup_timer = start_timer!(|| format!("Params::new (n = {})", n));
        let powers = KZG10::<E, UniPoly<E>>::setup(n, *tau.expose_secret())?;
        let lagrange = LagrangePowers::new(*tau.expose_secret(), n)?;
        end_timer!(setup_timer);

        info!(max_committee_size, domain_size = n, "generated parameters");
        Ok(Params {
            max_committee_size,
            powers,
            lagrange,
        })
    }

    /// Builds parameters from powers of tau whose trapdoor nobody knows.
    ///
    /// Powers beyond degree `n` are discarded: keeping them would let a
    /// decryptor commit to polynomials past the threshold bound.
    pub fn from_powers_of_tau(
        max_committee_size: usize,
        powers: &PowersOfTau<E>,
    ) -> Result<Self, SteError> {
        let n = check_size(max_committee_size)?;
        if powers.max_degree() < n || powers.powers_of_h.len() != powers.powers_of_g.len() {
            return Err(SteError::ParamsMismatch(format!(
                "powers of tau of degree {} cannot serve a domain of size {}",
                powers.max_degree(),
                n
            )));
        }
        let powers = PowersOfTau {
            powers_of_g: powers.powers_of_g[..=n].to_vec(),
            powers_of_h: powers.powers_of_h[..=n].to_vec(),
        };

        let timer = start_timer!(|| format!("Lagrange powers from powers of tau (n = {})", n));
        let lagrange = LagrangePowers::from_powers_of_tau(&powers, n)?;
        end_timer!(timer);

        info!(
            max_committee_size,
            domain_size = n,
            "derived parameters from powers of tau"
        );
        Ok(Params {
            max_committee_size,
            powers,
            lagrange,
        })
    }

    /// Verifies every contribution of a finished ceremony and derives
    /// parameters from its output.
    pub fn from_ceremony(max_committee_size: usize, ceremony: Ceremony<E>) -> Result<Self, SteError> {
        check_size(max_committee_size)?;
        if !ceremony.verify_all() {
            return Err(SteError::ParamsMismatch(
                "ceremony transcript failed verification".to_string(),
            ));
        }
        debug!(
            participants = ceremony.num_participants(),
            "ceremony transcript verified"
        );
        let powers = ceremony.finalize()?;
        Self::from_powers_of_tau(max_committee_size, &powers)
    }

    /// Size of the evaluation domain (`N`).
    pub fn domain_size(&self) -> usize {
        self.lagrange.domain_size()
    }

    /// Structural check for parameters read from untrusted bytes.
    ///
    /// Point encodings are validated on decode. This checks the shapes and
    /// that both power sequences start at the generators and share a trapdoor.
    pub fn validate(&self) -> Result<(), SteError> {
        let n = check_size(self.max_committee_size)?;
        let mismatch = |what: &str| SteError::ParamsMismatch(format!("malformed parameters: {}", what));

        if self.powers.powers_of_g.len() != n + 1 || self.powers.powers_of_h.len() != n + 1 {
            return Err(mismatch("wrong number of powers"));
        }
        let lagrange = &self.lagrange;
        if lagrange.li.len() != n
            || lagrange.li_minus0.len() != n
            || lagrange.li_x.len() != n
            || lagrange.li_g2.len() != n
            || lagrange.li_lj_z.len() != n
            || lagrange.li_lj_z.iter().any(|row| row.len() != n)
        {
            return Err(mismatch("wrong number of lagrange commitments"));
        }
        if self.powers.powers_of_g[0] != E::G1Affine::generator()
            || self.powers.powers_of_h[0] != E::G2Affine::generator()
        {
            return Err(mismatch("powers do not start at the generators"));
        }

        // e([tau]_1, H) == e(G, [tau]_2)
        let check = E::multi_pairing(
            [
                self.powers.powers_of_g[1].into_group(),
                -E::G1::generator(),
            ],
            [
                E::G2::generator(),
                self.powers.powers_of_h[1].into_group(),
            ],
        );
        if !check.is_zero() {
            return Err(mismatch("G1 and G2 powers use different trapdoors"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encode;

    type E = ark_bls12_381::Bls12_381;
    type Fr = <E as Pairing>::ScalarField;

    #[test]
    fn test_params_sizes() {
        let mut rng = ark_std::test_rng();
        let params = Params::<E>::new(5, &mut rng).unwrap();
        assert_eq!(params.max_committee_size, 5);
        assert_eq!(params.domain_size(), 8);
        assert_eq!(params.powers.powers_of_g.len(), 9);
        params.validate().unwrap();

        let params = Params::<E>::new(1, &mut rng).unwrap();
        assert_eq!(params.domain_size(), 2);
    }

    #[test]
    fn test_params_rejects_invalid_size() {
        let mut rng = ark_std::test_rng();
        assert!(matches!(
            Params::<E>::new(0, &mut rng),
            Err(SteError::InvalidSize { size: 0, .. })
        ));
        assert!(matches!(
            Params::<E>::new(MAX_COMMITTEE_SIZE + 1, &mut rng),
            Err(SteError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_from_tau_is_deterministic() {
        let tau = SensitiveScalar::new(Fr::from(1234567u64));
        let a = Params::<E>::from_tau(3, &tau).unwrap();
        let b = Params::<E>::from_tau(3, &tau).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_powers_of_tau_matches_trapdoor_path() {
        let tau = SensitiveScalar::new(Fr::from(987654321u64));
        let direct = Params::<E>::from_tau(3, &tau).unwrap();

        // extra powers are truncated away
        let powers = KZG10::<E, UniPoly<E>>::setup(6, *tau.expose_secret()).unwrap();
        let derived = Params::<E>::from_powers_of_tau(3, &powers).unwrap();
        assert_eq!(direct, derived);

        let short = KZG10::<E, UniPoly<E>>::setup(3, *tau.expose_secret()).unwrap();
        assert!(matches!(
            Params::<E>::from_powers_of_tau(3, &short),
            Err(SteError::ParamsMismatch(_))
        ));
    }

    #[test]
    fn test_validate_after_decode() {
        let mut rng = ark_std::test_rng();
        let params = Params::<E>::new(3, &mut rng).unwrap();
        let decoded = Params::<E>::from_bytes(&params.to_bytes().unwrap()).unwrap();
        decoded.validate().unwrap();
        assert_eq!(decoded, params);

        let mut bad = params.clone();
        bad.powers.powers_of_h.swap(1, 2);
        assert!(bad.validate().is_err());

        let mut bad = params;
        bad.lagrange.li_lj_z[1].pop();
        assert!(bad.validate().is_err());
    }
}
