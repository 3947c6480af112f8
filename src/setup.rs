use crate::encoding::{read_len, read_vec};
use crate::encryption::Ciphertext;
use crate::error::SteError;
use crate::kzg::{PowersOfTau, KZG10};
use crate::params::Params;
use crate::security::SensitiveScalar;
use crate::utils::{compute_msm_g1, compute_msm_g2, evaluation_domain, lagrange_poly, slot_of};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, PrimeGroup, ScalarMul};
use ark_ff::{Field, PrimeField};
use ark_poly::{univariate::DensePolynomial, DenseUVPolynomial, EvaluationDomain};
use ark_serialize::*;
use ark_std::{rand::RngCore, One, UniformRand, Zero};
use blake2::{Blake2b512, Digest};
use rayon::prelude::*;
use zeroize::Zeroize;

/// Domain separation tag for the batched public key check
const PK_CHALLENGE_DOMAIN: &[u8] = b"silent-threshold/pk-check/v1";

type Poly<E> = DensePolynomial<<E as Pairing>::ScalarField>;

/// Commitments to the Lagrange basis of the evaluation domain, preprocessed
/// so that key generation is linear in the domain size.
///
/// For slot `i`: `li = [L_i(tau)]_1`, `li_minus0 = [L_i(tau) - L_i(0)]_1`,
/// `li_x = [(L_i(tau) - L_i(0)) / tau]_1`, `li_g2 = [L_i(tau)]_2` and
/// `li_lj_z[i][j] = [(L_i L_j - delta_ij L_i)(tau) / Z(tau)]_1`.
#[derive(CanonicalSerialize, Clone, Debug, PartialEq, Eq)]
pub struct LagrangePowers<E: Pairing> {
    pub li: Vec<E::G1Affine>,
    pub li_minus0: Vec<E::G1Affine>,
    pub li_x: Vec<E::G1Affine>,
    pub li_g2: Vec<E::G2Affine>,
    pub li_lj_z: Vec<Vec<E::G1Affine>>,
}

impl<E: Pairing> Valid for LagrangePowers<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.li.check()?;
        self.li_minus0.check()?;
        self.li_x.check()?;
        self.li_g2.check()?;
        self.li_lj_z.check()
    }
}

impl<E: Pairing> CanonicalDeserialize for LagrangePowers<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let li = read_vec(&mut reader, compress, validate)?;
        let li_minus0 = read_vec(&mut reader, compress, validate)?;
        let li_x = read_vec(&mut reader, compress, validate)?;
        let li_g2 = read_vec(&mut reader, compress, validate)?;

        let rows = read_len(&mut reader, compress, validate)?;
        let mut li_lj_z = Vec::new();
        for _ in 0..rows {
            li_lj_z.push(read_vec(&mut reader, compress, validate)?);
        }

        Ok(LagrangePowers {
            li,
            li_minus0,
            li_x,
            li_g2,
            li_lj_z,
        })
    }
}

impl<E: Pairing> LagrangePowers<E> {
    /// Creates new Lagrange powers by evaluating the basis at `tau`.
    ///
    /// Intermediate evaluations are wiped before returning.
    ///
    /// # Errors
    /// Returns an error if tau is zero, lies in the domain, or n is not a power of 2
    pub fn new(tau: E::ScalarField, n: usize) -> Result<Self, SteError> {
        if tau.is_zero() {
            return Err(SteError::Kzg("tau cannot be zero".to_string()));
        }
        let domain = evaluation_domain::<E::ScalarField>(n)?;

        let mut li_evals = domain.evaluate_all_lagrange_coefficients(tau);
        // L_i(0) = 1/n for every i
        let l_at_zero = domain.size_inv();
        let mut tau_inv = tau
            .inverse()
            .ok_or_else(|| SteError::Kzg("tau inverse computation failed".to_string()))?;
        let mut li_evals_minus0: Vec<_> = li_evals.iter().map(|l| *l - l_at_zero).collect();
        let mut li_evals_x: Vec<_> = li_evals_minus0.iter().map(|l| *l * tau_inv).collect();

        let mut z_eval = tau.pow([n as u64]) - E::ScalarField::one();
        let mut z_eval_inv = z_eval
            .inverse()
            .ok_or_else(|| SteError::Kzg("tau lies in the evaluation domain".to_string()))?;

        let g = E::G1::generator();
        let h = E::G2::generator();

        let li_lj_z = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut row: Vec<E::ScalarField> = (0..n)
                    .map(|j| {
                        if i == j {
                            (li_evals[i] * li_evals[i] - li_evals[i]) * z_eval_inv
                        } else {
                            li_evals[i] * li_evals[j] * z_eval_inv
                        }
                    })
                    .collect();
                let commitments = g.batch_mul(&row);
                row.zeroize();
                commitments
            })
            .collect();

        let powers = LagrangePowers {
            li: g.batch_mul(&li_evals),
            li_minus0: g.batch_mul(&li_evals_minus0),
            li_x: g.batch_mul(&li_evals_x),
            li_g2: h.batch_mul(&li_evals),
            li_lj_z,
        };

        // each of these determines tau
        li_evals.zeroize();
        li_evals_minus0.zeroize();
        li_evals_x.zeroize();
        tau_inv.zeroize();
        z_eval.zeroize();
        z_eval_inv.zeroize();

        Ok(powers)
    }

    /// Derives the same commitments from powers of tau alone, for parameters
    /// produced by a ceremony where nobody knows tau. Cubic in `n`.
    pub fn from_powers_of_tau(params: &PowersOfTau<E>, n: usize) -> Result<Self, SteError> {
        let domain = evaluation_domain::<E::ScalarField>(n)?;
        if params.max_degree() < n {
            return Err(SteError::ParamsMismatch(format!(
                "powers of tau have degree {} but a domain of size {} needs degree {}",
                params.max_degree(),
                n,
                n
            )));
        }

        let lagranges: Vec<Poly<E>> = (0..n).map(|i| lagrange_poly(n, i)).collect();

        let columns = lagranges
            .par_iter()
            .enumerate()
            .map(|(i, li)| {
                let li_com = KZG10::<E, Poly<E>>::commit_g1(params, li)?;
                let li_g2 = KZG10::<E, Poly<E>>::commit_g2(params, li)?;

                let mut f = li.clone();
                f.coeffs[0] = E::ScalarField::zero();
                let li_minus0 = KZG10::<E, Poly<E>>::commit_g1(params, &f)?;

                // (L_i(x) - L_i(0)) / x has coefficients L_i.coeffs[1..]
                let li_x_poly = Poly::<E>::from_coefficients_vec(li.coeffs[1..].to_vec());
                let li_x = KZG10::<E, Poly<E>>::commit_g1(params, &li_x_poly)?;

                let mut row = Vec::with_capacity(n);
                for (j, lj) in lagranges.iter().enumerate() {
                    let num = if i == j {
                        &(li * li) - li
                    } else {
                        //cross-terms
                        li * lj
                    };
                    let q = num.divide_by_vanishing_poly(domain).0;
                    row.push(KZG10::<E, Poly<E>>::commit_g1(params, &q)?);
                }

                Ok::<_, SteError>((li_com, li_minus0, li_x, li_g2, row))
            })
            .collect::<Result<Vec<_>, SteError>>()?;

        let mut powers = LagrangePowers {
            li: Vec::with_capacity(n),
            li_minus0: Vec::with_capacity(n),
            li_x: Vec::with_capacity(n),
            li_g2: Vec::with_capacity(n),
            li_lj_z: Vec::with_capacity(n),
        };
        for (li, li_minus0, li_x, li_g2, row) in columns {
            powers.li.push(li);
            powers.li_minus0.push(li_minus0);
            powers.li_x.push(li_x);
            powers.li_g2.push(li_g2);
            powers.li_lj_z.push(row);
        }
        Ok(powers)
    }

    pub fn domain_size(&self) -> usize {
        self.li.len()
    }
}

/// Secret key for a party in the threshold encryption scheme.
///
/// The scalar is zeroized on drop and redacted from `Debug` output.
#[derive(CanonicalSerialize, CanonicalDeserialize, Clone, Debug)]
pub struct SecretKey<E: Pairing> {
    sk: SensitiveScalar<E::ScalarField>,
}

/// Public key for a party in the threshold encryption scheme.
///
/// Contains the BLS public key and precomputed hint values that let anyone
/// fold this key into an aggregate key without contacting its owner.
#[derive(CanonicalSerialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKey<E: Pairing> {
    /// Committee index of the owner
    pub index: usize,
    /// BLS public key: sk * G1_generator
    pub bls_pk: E::G1,
    /// Commitment to sk * L_i(x)
    pub sk_li: E::G1,
    /// Commitment to sk * (L_i(x) - L_i(0))
    pub sk_li_minus0: E::G1,
    /// Commitments to sk * (L_i(x) * L_j(x) - delta_ij L_i(x)) / Z(x) for every slot j
    pub sk_li_lj_z: Vec<E::G1>,
    /// Commitment to sk * (L_i(x) - L_i(0)) / x
    pub sk_li_x: E::G1,
}

impl<E: Pairing> Valid for PublicKey<E> {
    fn check(&self) -> Result<(), SerializationError> {
        self.bls_pk.check()?;
        self.sk_li.check()?;
        self.sk_li_minus0.check()?;
        self.sk_li_lj_z.check()?;
        self.sk_li_x.check()
    }
}

impl<E: Pairing> CanonicalDeserialize for PublicKey<E> {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(PublicKey {
            index: usize::deserialize_with_mode(&mut reader, compress, validate)?,
            bls_pk: E::G1::deserialize_with_mode(&mut reader, compress, validate)?,
            sk_li: E::G1::deserialize_with_mode(&mut reader, compress, validate)?,
            sk_li_minus0: E::G1::deserialize_with_mode(&mut reader, compress, validate)?,
            sk_li_lj_z: read_vec(&mut reader, compress, validate)?,
            sk_li_x: E::G1::deserialize_with_mode(&mut reader, compress, validate)?,
        })
    }
}

impl<E: Pairing> SecretKey<E> {
    /// Creates a new secret key with a random scalar.
    pub fn new<R: RngCore>(rng: &mut R) -> Self {
        SecretKey {
            sk: SensitiveScalar::new(E::ScalarField::rand(rng)),
        }
    }

    /// Computes the public key for committee slot `index` from the
    /// preprocessed Lagrange powers (linear time).
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if `index` is not below the committee bound
    pub fn public_key(&self, index: usize, params: &Params<E>) -> Result<PublicKey<E>, SteError> {
        if index >= params.max_committee_size {
            return Err(SteError::IndexOutOfRange {
                index,
                bound: params.max_committee_size,
            });
        }
        let slot = slot_of(index);
        let lagrange = &params.lagrange;
        let sk = *self.sk.expose_secret();

        let sk_li_lj_z = lagrange.li_lj_z[slot]
            .par_iter()
            .map(|com| *com * sk)
            .collect();

        Ok(PublicKey {
            index,
            bls_pk: E::G1::generator() * sk,
            sk_li: lagrange.li[slot] * sk,
            sk_li_minus0: lagrange.li_minus0[slot] * sk,
            sk_li_lj_z,
            sk_li_x: lagrange.li_x[slot] * sk,
        })
    }

    /// Computes a partial decryption of the ciphertext.
    ///
    /// This is essentially a BLS signature on `gamma_g2`.
    pub fn partial_decryption(&self, ct: &Ciphertext<E>) -> E::G2 {
        ct.gamma_g2 * *self.sk.expose_secret()
    }
}

impl<E: Pairing> Zeroize for SecretKey<E> {
    fn zeroize(&mut self) {
        self.sk.zeroize();
    }
}

impl<E: Pairing> PublicKey<E> {
    /// Checks every hint against the BLS key and the slot of `self.index`.
    ///
    /// The `n` cross terms are verified together with a random linear
    /// combination whose challenge is derived from the key itself.
    pub fn verify(&self, params: &Params<E>) -> Result<(), SteError> {
        if self.index >= params.max_committee_size {
            return Err(SteError::IndexOutOfRange {
                index: self.index,
                bound: params.max_committee_size,
            });
        }
        let n = params.domain_size();
        let invalid = || SteError::InvalidPublicKey(self.index);
        if self.sk_li_lj_z.len() != n || self.bls_pk.is_zero() {
            return Err(invalid());
        }

        let slot = slot_of(self.index);
        let lagrange = &params.lagrange;
        let h = E::G2::generator();
        let tau_h = params.powers.powers_of_h[1].into_group();
        let z_g2 = params.powers.powers_of_h[n].into_group() - h;

        // e(sk_li, h) == e(bls_pk, [L_i(tau)]_2)
        let check = E::multi_pairing(
            [self.sk_li, -self.bls_pk],
            [h, lagrange.li_g2[slot].into_group()],
        );
        if !check.is_zero() {
            return Err(invalid());
        }

        // L_i(0) = 1/n, so sk_li_minus0 = sk_li - bls_pk / n
        let n_inv = E::ScalarField::from(n as u64)
            .inverse()
            .ok_or_else(|| SteError::Domain("domain size is not invertible".to_string()))?;
        if self.sk_li_minus0 != self.sk_li - self.bls_pk * n_inv {
            return Err(invalid());
        }

        // e(sk_li_x, [tau]_2) == e(sk_li_minus0, h)
        let check = E::multi_pairing([self.sk_li_x, -self.sk_li_minus0], [tau_h, h]);
        if !check.is_zero() {
            return Err(invalid());
        }

        // sum_j r^j e(sk_li_lj_z[j], [Z(tau)]_2) == e(sk_li, sum_j r^j [L_j(tau)]_2 - r^i h)
        let r = self.challenge()?;
        let mut weights = Vec::with_capacity(n);
        let mut cur = E::ScalarField::one();
        for _ in 0..n {
            weights.push(cur);
            cur *= r;
        }
        let cross_terms = E::G1::normalize_batch(&self.sk_li_lj_z);
        let lhs = compute_msm_g1::<E>(&cross_terms, &weights, "public key cross terms")?;
        let rhs = compute_msm_g2::<E>(&lagrange.li_g2, &weights, "public key lagrange terms")?
            - h * weights[slot];
        let check = E::multi_pairing([lhs, -self.sk_li], [z_g2, rhs]);
        if !check.is_zero() {
            return Err(invalid());
        }

        Ok(())
    }

    fn challenge(&self) -> Result<E::ScalarField, SteError> {
        let mut bytes = Vec::new();
        self.serialize_compressed(&mut bytes)?;

        let mut hasher = Blake2b512::new();
        hasher.update(PK_CHALLENGE_DOMAIN);
        hasher.update(&bytes);
        Ok(E::ScalarField::from_le_bytes_mod_order(&hasher.finalize()))
    }
}

/// Generates a fresh key pair bound to committee slot `index`.
///
/// # Errors
/// Returns `IndexOutOfRange` if `index >= params.max_committee_size`
pub fn generate_key<E: Pairing, R: RngCore>(
    params: &Params<E>,
    index: usize,
    rng: &mut R,
) -> Result<(SecretKey<E>, PublicKey<E>), SteError> {
    if index >= params.max_committee_size {
        return Err(SteError::IndexOutOfRange {
            index,
            bound: params.max_committee_size,
        });
    }
    let sk = SecretKey::new(rng);
    let pk = sk.public_key(index, params)?;
    Ok((sk, pk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::domain_size_for;

    type E = ark_bls12_381::Bls12_381;
    type G1 = <E as Pairing>::G1;
    type Fr = <E as Pairing>::ScalarField;
    type UniPoly381 = DensePolynomial<<E as Pairing>::ScalarField>;

    #[test]
    fn test_lagrange_powers_from_tau_and_from_powers_agree() {
        let mut rng = ark_std::test_rng();
        let n = 8;
        let tau = Fr::rand(&mut rng);
        let kzg = KZG10::<E, UniPoly381>::setup(n, tau).unwrap();

        let fast = LagrangePowers::<E>::new(tau, n).unwrap();
        let slow = LagrangePowers::<E>::from_powers_of_tau(&kzg, n).unwrap();

        assert_eq!(fast.li, slow.li);
        assert_eq!(fast.li_minus0, slow.li_minus0);
        assert_eq!(fast.li_x, slow.li_x, "li_x mismatch");
        assert_eq!(fast.li_g2, slow.li_g2);
        assert_eq!(fast.li_lj_z, slow.li_lj_z);
    }

    #[test]
    fn test_lagrange_powers_rejects_bad_input() {
        assert!(LagrangePowers::<E>::new(Fr::zero(), 8).is_err());
        assert!(LagrangePowers::<E>::new(Fr::from(5u64), 6).is_err());
        // omega^0 = 1 lies in every domain
        assert!(LagrangePowers::<E>::new(Fr::one(), 8).is_err());
    }

    #[test]
    fn test_public_key_hints() {
        let mut rng = ark_std::test_rng();
        let params = Params::<E>::new(5, &mut rng).unwrap();
        assert_eq!(params.domain_size(), domain_size_for(5));

        for index in 0..5 {
            let (sk, pk) = generate_key(&params, index, &mut rng).unwrap();
            assert_eq!(pk.index, index);
            assert_eq!(pk.sk_li_lj_z.len(), params.domain_size());
            assert_eq!(pk.bls_pk, G1::generator() * *sk.sk.expose_secret());
            pk.verify(&params).unwrap();
        }
    }

    #[test]
    fn test_public_key_is_deterministic() {
        let mut rng = ark_std::test_rng();
        let params = Params::<E>::new(3, &mut rng).unwrap();
        let sk = SecretKey::<E>::new(&mut rng);
        assert_eq!(
            sk.public_key(2, &params).unwrap(),
            sk.public_key(2, &params).unwrap()
        );
        assert_ne!(
            sk.public_key(1, &params).unwrap(),
            sk.public_key(2, &params).unwrap()
        );
    }

    #[test]
    fn test_generate_key_index_out_of_range() {
        let mut rng = ark_std::test_rng();
        let params = Params::<E>::new(4, &mut rng).unwrap();
        assert!(generate_key(&params, 3, &mut rng).is_ok());
        assert!(matches!(
            generate_key(&params, 4, &mut rng),
            Err(SteError::IndexOutOfRange { index: 4, bound: 4 })
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_hints() {
        let mut rng = ark_std::test_rng();
        let params = Params::<E>::new(5, &mut rng).unwrap();
        let (_, pk) = generate_key(&params, 2, &mut rng).unwrap();

        let mut bad = pk.clone();
        bad.sk_li += G1::generator();
        assert_eq!(bad.verify(&params), Err(SteError::InvalidPublicKey(2)));

        let mut bad = pk.clone();
        bad.sk_li_x += G1::generator();
        assert_eq!(bad.verify(&params), Err(SteError::InvalidPublicKey(2)));

        let mut bad = pk.clone();
        bad.sk_li_lj_z[5] += G1::generator();
        assert_eq!(bad.verify(&params), Err(SteError::InvalidPublicKey(2)));

        let mut bad = pk.clone();
        bad.sk_li_lj_z.pop();
        assert_eq!(bad.verify(&params), Err(SteError::InvalidPublicKey(2)));

        // hints computed for another slot
        let mut bad = pk.clone();
        bad.index = 3;
        assert_eq!(bad.verify(&params), Err(SteError::InvalidPublicKey(3)));
    }

    #[test]
    fn test_secret_key_debug_is_redacted() {
        let mut rng = ark_std::test_rng();
        let sk = SecretKey::<E>::new(&mut rng);
        assert!(format!("{:?}", sk).contains("[REDACTED]"));
    }
}
