use ark_ec::{
    pairing::{Pairing, PairingOutput},
    AffineRepr, CurveGroup,
};
use ark_ff::Field;
use ark_poly::{univariate::DensePolynomial, DenseUVPolynomial, EvaluationDomain, Polynomial};
use ark_serialize::*;
use ark_std::{One, Zero};
use tracing::{debug, warn};

use crate::encoding::read_vec;
use crate::error::SteError;
use crate::payload::{derive_key, PayloadCipher, XChaCha20Poly1305};
use crate::security::verify_bls_share;
use crate::{
    aggregate::AggregateKey,
    encryption::Ciphertext,
    kzg::KZG10,
    params::Params,
    setup::{PublicKey, SecretKey},
    utils::{
        compute_msm_g1, compute_msm_g2, divide_by_linear, evaluation_domain, interp_mostly_zero,
        slot_of,
    },
};

type UniPoly<E> = DensePolynomial<<E as Pairing>::ScalarField>;

/// One party's contribution to decrypting a ciphertext: a BLS signature
/// on `gamma_g2` under the party's secret key.
#[derive(CanonicalSerialize, CanonicalDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialDecryption<E: Pairing> {
    pub index: usize,
    pub share: E::G2,
}

impl<E: Pairing> PartialDecryption<E> {
    /// Checks the share against the owner's public key.
    pub fn verify(&self, pk: &PublicKey<E>, ct: &Ciphertext<E>) -> bool {
        self.index == pk.index && verify_bls_share::<E>(&self.share, &pk.bls_pk, &ct.gamma_g2)
    }
}

/// Which committee members take part in a decryption, one bit per member in
/// ascending index order.
#[derive(CanonicalSerialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Selector {
    bits: Vec<bool>,
}

impl Valid for Selector {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalDeserialize for Selector {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(Selector {
            bits: read_vec(&mut reader, compress, validate)?,
        })
    }
}

impl Selector {
    pub fn new(bits: Vec<bool>) -> Self {
        Selector { bits }
    }

    /// Builds the selector for `parties` over a sorted `committee`.
    ///
    /// # Errors
    /// `IndexMismatch` if a party is not in the committee
    pub fn from_indices(committee: &[usize], parties: &[usize]) -> Result<Self, SteError> {
        let mut bits = vec![false; committee.len()];
        for &party in parties {
            let pos = committee
                .binary_search(&party)
                .map_err(|_| SteError::IndexMismatch(party))?;
            bits[pos] = true;
        }
        Ok(Selector { bits })
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of selected members.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&selected| selected).count()
    }
}

impl From<Vec<bool>> for Selector {
    fn from(bits: Vec<bool>) -> Self {
        Selector::new(bits)
    }
}

/// Computes the partial decryption of `ct` by the holder of `sk` at `index`.
///
/// # Errors
/// `CiphertextMismatch` if `index` is not in the ciphertext's committee
pub fn partial_decrypt<E: Pairing>(
    sk: &SecretKey<E>,
    index: usize,
    ct: &Ciphertext<E>,
) -> Result<PartialDecryption<E>, SteError> {
    if !ct.includes(index) {
        return Err(SteError::CiphertextMismatch(format!(
            "party {} is not in the ciphertext committee",
            index
        )));
    }
    Ok(PartialDecryption {
        index,
        share: sk.partial_decryption(ct),
    })
}

/// Matches shares to selected committee positions.
fn collect_shares<E: Pairing>(
    partial_decryptions: &[PartialDecryption<E>],
    selector: &Selector,
    committee: &[usize],
) -> Result<Vec<Option<E::G2>>, SteError> {
    let mut shares = vec![None; committee.len()];
    for pd in partial_decryptions {
        let pos = committee
            .binary_search(&pd.index)
            .map_err(|_| SteError::IndexMismatch(pd.index))?;
        if !selector.bits[pos] {
            return Err(SteError::IndexMismatch(pd.index));
        }
        if shares[pos].is_some() {
            return Err(SteError::DuplicateIndex(pd.index));
        }
        shares[pos] = Some(pd.share);
    }
    if let Some(pos) = (0..committee.len()).find(|&pos| selector.bits[pos] && shares[pos].is_none())
    {
        return Err(SteError::IndexMismatch(committee[pos]));
    }
    Ok(shares)
}

/// Aggregates partial decryptions and recovers the encapsulated key.
///
/// # Arguments
/// * `partial_decryptions` - One share per selected member, in any order
/// * `selector` - One bit per committee member (true = participated)
/// * `ct` - The ciphertext to decrypt
/// * `agg_key` - The aggregate key the ciphertext was created under
/// * `params` - The public parameters
///
/// Wrong but well-formed shares are not detected here; they yield a wrong
/// key, which payload authentication rejects.
pub fn agg_dec<E: Pairing>(
    partial_decryptions: &[PartialDecryption<E>],
    selector: &Selector,
    ct: &Ciphertext<E>,
    agg_key: &AggregateKey<E>,
    params: &Params<E>,
) -> Result<PairingOutput<E>, SteError> {
    let n = params.domain_size();
    if agg_key.domain_size != n {
        return Err(SteError::ParamsMismatch(format!(
            "aggregate key built for domain size {} but parameters use {}",
            agg_key.domain_size, n
        )));
    }
    let committee = agg_key.committee();
    if ct.domain_size != n || ct.committee != committee {
        return Err(SteError::CiphertextMismatch(
            "ciphertext was not created for this committee".to_string(),
        ));
    }

    // Validate inputs
    if selector.len() != committee.len() {
        return Err(SteError::SelectorLength {
            expected: committee.len(),
            actual: selector.len(),
        });
    }
    let num_selected = selector.count();
    if num_selected < ct.t {
        return Err(SteError::InsufficientShares {
            required: ct.t,
            provided: num_selected,
        });
    }
    let shares = collect_shares(partial_decryptions, selector, &committee)?;
    let degree_t = ct.degree_threshold()?;

    let domain = evaluation_domain::<E::ScalarField>(n)?;
    let domain_elements: Vec<E::ScalarField> = domain.elements().collect();

    // the anchor and absent slots always count as signers
    let mut signed = vec![true; n];
    for (pos, &index) in committee.iter().enumerate() {
        signed[slot_of(index)] = selector.bits[pos];
    }

    // points is where B is set to zero
    let mut points = vec![domain_elements[0]];
    for slot in 1..n {
        if !signed[slot] {
            points.push(domain_elements[slot]);
        }
    }

    let b = interp_mostly_zero(E::ScalarField::one(), &points);
    let b_evals = domain.fft(&b.coeffs);

    if b.evaluate(&domain_elements[0]) != E::ScalarField::one() {
        return Err(SteError::Domain(
            "b(omega^0) != 1, polynomial construction failed".to_string(),
        ));
    }

    // commit to b in g2
    let b_g2: E::G2 = KZG10::<E, UniPoly<E>>::commit_g2(&params.powers, &b)?.into();

    // q0 = (b-1)/(x-domain_elements[0])
    let mut bminus1 = b.clone();
    bminus1.coeffs[0] -= E::ScalarField::one();
    let q0 = divide_by_linear(&bminus1, domain_elements[0]);
    let q0_g1: E::G1 = KZG10::<E, UniPoly<E>>::commit_g1(&params.powers, &q0)?.into();

    // bhat = x^{t+1} * b
    // insert t+1 0s at the beginning of bhat.coeffs
    let mut bhat_coeffs = vec![E::ScalarField::zero(); degree_t + 1];
    bhat_coeffs.extend_from_slice(&b.coeffs);
    let bhat = UniPoly::<E>::from_coefficients_vec(bhat_coeffs);
    let bhat_g1: E::G1 = KZG10::<E, UniPoly<E>>::commit_g1(&params.powers, &bhat)?.into();

    let n_inv = E::ScalarField::from(n as u64)
        .inverse()
        .ok_or_else(|| SteError::Domain("domain size is not invertible".to_string()))?;

    // anchor slot with secret 1 first, then the selected members
    let lagrange = &params.lagrange;
    let mut pk_bases: Vec<E::G1> = vec![params.powers.powers_of_g[0].into_group()];
    let mut share_bases: Vec<E::G2> = vec![ct.gamma_g2];
    let mut x_bases: Vec<E::G1> = vec![lagrange.li_x[0].into_group()];
    let mut minus0_bases: Vec<E::G1> = vec![lagrange.li_minus0[0].into_group()];
    let mut scalars: Vec<E::ScalarField> = vec![b_evals[0]];
    for (pos, member) in agg_key.members.iter().enumerate() {
        if let Some(share) = shares[pos] {
            pk_bases.push(member.bls_pk);
            share_bases.push(share);
            x_bases.push(member.sk_li_x);
            minus0_bases.push(member.sk_li_minus0);
            scalars.push(b_evals[slot_of(member.index)]);
        }
    }

    // compute the aggregate public key
    let apk = compute_msm_g1::<E>(&E::G1::normalize_batch(&pk_bases), &scalars, "apk computation")?
        * n_inv;

    // compute sigma = (\sum B(omega^i)partial_decryptions[i])/(n) for i in parties
    let sigma = compute_msm_g2::<E>(
        &E::G2::normalize_batch(&share_bases),
        &scalars,
        "sigma computation",
    )? * n_inv;

    // compute Qx, Qhatx and Qz
    let qx = compute_msm_g1::<E>(&E::G1::normalize_batch(&x_bases), &scalars, "qx computation")?;
    let qhatx = compute_msm_g1::<E>(
        &E::G1::normalize_batch(&minus0_bases),
        &scalars,
        "qhatx computation",
    )?;
    // absent slots hold nonzero cross terms, so Qz runs over every slot
    let qz = compute_msm_g1::<E>(
        &E::G1::normalize_batch(&agg_key.agg_sk_li_lj_z),
        &b_evals,
        "qz computation",
    )?;

    // e(w1||sa1, sa2||w2)
    let w1 = [-apk, -qz, -qx, qhatx, -bhat_g1, -q0_g1];
    let w2 = [b_g2, sigma];

    let mut enc_key_lhs = w1.to_vec();
    enc_key_lhs.extend_from_slice(&ct.sa1);

    let mut enc_key_rhs = ct.sa2.to_vec();
    enc_key_rhs.extend_from_slice(&w2);

    debug!(
        selected = num_selected,
        threshold = ct.t,
        "combined partial decryptions"
    );
    Ok(E::multi_pairing(enc_key_lhs, enc_key_rhs))
}

/// Decrypts `ct` from the shares of the selected members.
///
/// # Errors
/// Usage errors for inconsistent inputs, `InsufficientShares` when fewer than
/// `t` members are selected, and `DecapsulationFailure` when the recovered key
/// does not authenticate the payload.
pub fn decrypt<E: Pairing>(
    partial_decryptions: &[PartialDecryption<E>],
    selector: &Selector,
    ct: &Ciphertext<E>,
    agg_key: &AggregateKey<E>,
    params: &Params<E>,
) -> Result<Vec<u8>, SteError> {
    decrypt_with_cipher(
        &XChaCha20Poly1305,
        partial_decryptions,
        selector,
        ct,
        agg_key,
        params,
    )
}

/// [`decrypt`] with a caller-chosen payload cipher.
pub fn decrypt_with_cipher<E: Pairing, C: PayloadCipher>(
    cipher: &C,
    partial_decryptions: &[PartialDecryption<E>],
    selector: &Selector,
    ct: &Ciphertext<E>,
    agg_key: &AggregateKey<E>,
    params: &Params<E>,
) -> Result<Vec<u8>, SteError> {
    let enc_key = agg_dec(partial_decryptions, selector, ct, agg_key, params)?;
    let key = derive_key(&enc_key, &ct.header_bytes()?)?;
    cipher.open(&key, &ct.payload).map_err(|_| {
        warn!(
            shares = partial_decryptions.len(),
            "payload failed to authenticate"
        );
        SteError::DecapsulationFailure
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encode;
    use crate::encryption::{encapsulate, encrypt};
    use crate::setup::generate_key;
    use ark_ec::PrimeGroup;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use proptest::prelude::*;
    use rayon::prelude::*;

    type E = ark_bls12_381::Bls12_381;
    type G2 = <E as Pairing>::G2;

    struct Committee {
        params: Params<E>,
        sks: Vec<(usize, SecretKey<E>)>,
        agg_key: AggregateKey<E>,
    }

    impl Committee {
        fn new(max_committee_size: usize, indices: &[usize], seed: u64) -> Self {
            let mut rng = StdRng::seed_from_u64(seed);
            let params = Params::<E>::new(max_committee_size, &mut rng).unwrap();
            let mut sks = Vec::new();
            let mut pks = Vec::new();
            for &i in indices {
                let (sk, pk) = generate_key(&params, i, &mut rng).unwrap();
                sks.push((i, sk));
                pks.push(pk);
            }
            let agg_key = AggregateKey::new(&pks, &params).unwrap();
            Committee {
                params,
                sks,
                agg_key,
            }
        }

        fn sk(&self, index: usize) -> &SecretKey<E> {
            &self.sks.iter().find(|(i, _)| *i == index).unwrap().1
        }

        fn shares(&self, ct: &Ciphertext<E>, parties: &[usize]) -> Vec<PartialDecryption<E>> {
            parties
                .iter()
                .map(|&i| partial_decrypt(self.sk(i), i, ct).unwrap())
                .collect()
        }

        fn decrypt(&self, ct: &Ciphertext<E>, parties: &[usize]) -> Result<Vec<u8>, SteError> {
            let selector = Selector::from_indices(&ct.committee, parties)?;
            decrypt(
                &self.shares(ct, parties),
                &selector,
                ct,
                &self.agg_key,
                &self.params,
            )
        }
    }

    #[test]
    fn test_decryption() {
        let mut rng = ark_std::test_rng();
        let committee = Committee::new(5, &[0, 1, 2, 3, 4], 1);
        let ct = encrypt(&committee.agg_key, 3, &committee.params, b"hello", &mut rng).unwrap();

        assert_eq!(committee.decrypt(&ct, &[0, 2, 4]).unwrap(), b"hello");
        assert_eq!(
            committee.decrypt(&ct, &[0, 2]).unwrap_err(),
            SteError::InsufficientShares {
                required: 3,
                provided: 2
            }
        );
    }

    #[test]
    fn test_any_quorum_recovers_the_same_key() {
        let mut rng = ark_std::test_rng();
        let committee = Committee::new(5, &[0, 1, 2, 3, 4], 2);
        let (ct, enc_key) = encapsulate(&committee.agg_key, 2, &committee.params, &mut rng).unwrap();

        for parties in [vec![0, 1], vec![3, 4], vec![1, 2, 3], vec![0, 1, 2, 3, 4]] {
            let selector = Selector::from_indices(&ct.committee, &parties).unwrap();
            let shares = committee.shares(&ct, &parties);
            let key = agg_dec(&shares, &selector, &ct, &committee.agg_key, &committee.params)
                .unwrap();
            assert_eq!(key, enc_key, "quorum {:?}", parties);
        }
    }

    #[test]
    fn test_subset_committee_with_absent_slots() {
        let mut rng = ark_std::test_rng();
        // domain of 8 slots, only 3 members registered
        let committee = Committee::new(7, &[1, 3, 6], 3);
        assert_eq!(committee.agg_key.absent_slots(), 4);

        let ct = encrypt(&committee.agg_key, 2, &committee.params, b"subset", &mut rng).unwrap();
        assert_eq!(committee.decrypt(&ct, &[1, 6]).unwrap(), b"subset");
        assert_eq!(committee.decrypt(&ct, &[1, 3, 6]).unwrap(), b"subset");
        assert!(matches!(
            committee.decrypt(&ct, &[3]),
            Err(SteError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_forged_threshold_is_rejected() {
        let mut rng = ark_std::test_rng();
        let committee = Committee::new(5, &[0, 1, 2, 3, 4], 4);
        let ct = encrypt(&committee.agg_key, 3, &committee.params, b"secret", &mut rng).unwrap();

        // lowering t changes the header and leaves the degree bound in sa1 at three
        let mut forged = ct.clone();
        forged.t = 2;
        let selector = Selector::from_indices(&ct.committee, &[0, 1]).unwrap();
        let shares = committee.shares(&ct, &[0, 1]);
        assert!(decrypt(&shares, &selector, &forged, &committee.agg_key, &committee.params).is_err());
    }

    #[test]
    fn test_tampering_is_detected() {
        let mut rng = ark_std::test_rng();
        let committee = Committee::new(3, &[0, 1, 2], 5);
        let ct = encrypt(&committee.agg_key, 2, &committee.params, b"payload", &mut rng).unwrap();
        let selector = Selector::from_indices(&ct.committee, &[0, 2]).unwrap();
        let shares = committee.shares(&ct, &[0, 2]);

        let mut bad_shares = shares.clone();
        bad_shares[1].share += G2::generator();
        assert!(!bad_shares[1].verify(
            &committee.sk(2).public_key(2, &committee.params).unwrap(),
            &ct
        ));
        assert_eq!(
            decrypt(&bad_shares, &selector, &ct, &committee.agg_key, &committee.params),
            Err(SteError::DecapsulationFailure)
        );

        let mut bad_ct = ct.clone();
        let last = bad_ct.payload.len() - 1;
        bad_ct.payload[last] ^= 0x01;
        assert_eq!(
            decrypt(&shares, &selector, &bad_ct, &committee.agg_key, &committee.params),
            Err(SteError::DecapsulationFailure)
        );

        let mut bad_ct = ct.clone();
        bad_ct.sa1[1] += <E as Pairing>::G1::generator();
        assert_eq!(
            decrypt(&shares, &selector, &bad_ct, &committee.agg_key, &committee.params),
            Err(SteError::DecapsulationFailure)
        );
    }

    #[test]
    fn test_selector_encoding() {
        let selector = Selector::from_indices(&[1, 4, 6, 9], &[9, 1]).unwrap();
        assert_eq!(selector.bits(), &[true, false, false, true]);
        assert_eq!(selector.count(), 2);

        let bytes = selector.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8 + 4);
        assert_eq!(Selector::from_bytes(&bytes).unwrap(), selector);

        // bits other than 0 and 1 are not booleans
        let mut bad = bytes.clone();
        bad[8] = 2;
        assert!(matches!(Selector::from_bytes(&bad), Err(SteError::Encoding(_))));

        let mut oversized = bytes;
        oversized[..8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            Selector::from_bytes(&oversized),
            Err(SteError::Encoding(_))
        ));
    }

    #[test]
    fn test_share_and_selector_mismatches() {
        let mut rng = ark_std::test_rng();
        let committee = Committee::new(5, &[0, 1, 2, 3], 6);
        let ct = encrypt(&committee.agg_key, 2, &committee.params, b"m", &mut rng).unwrap();
        let (agg_key, params) = (&committee.agg_key, &committee.params);

        let selector = Selector::from_indices(&ct.committee, &[0, 1]).unwrap();
        assert_eq!(
            decrypt(&committee.shares(&ct, &[0, 1]), &Selector::new(vec![true; 5]), &ct, agg_key, params),
            Err(SteError::SelectorLength {
                expected: 4,
                actual: 5
            })
        );

        // share from a member outside the selection
        assert_eq!(
            decrypt(&committee.shares(&ct, &[0, 1, 2]), &selector, &ct, agg_key, params),
            Err(SteError::IndexMismatch(2))
        );

        // selected member without a share
        assert_eq!(
            decrypt(&committee.shares(&ct, &[0]), &selector, &ct, agg_key, params),
            Err(SteError::IndexMismatch(1))
        );

        let mut dup = committee.shares(&ct, &[0, 1]);
        dup.push(dup[0]);
        assert_eq!(
            decrypt(&dup, &selector, &ct, agg_key, params),
            Err(SteError::DuplicateIndex(0))
        );

        assert_eq!(
            Selector::from_indices(&ct.committee, &[4]).unwrap_err(),
            SteError::IndexMismatch(4)
        );
        assert!(matches!(
            partial_decrypt(committee.sk(0), 4, &ct),
            Err(SteError::CiphertextMismatch(_))
        ));
    }

    #[test]
    fn test_ciphertext_for_another_committee() {
        let mut rng = ark_std::test_rng();
        let committee = Committee::new(5, &[0, 1, 2, 3, 4], 7);
        let ct = encrypt(&committee.agg_key, 2, &committee.params, b"m", &mut rng).unwrap();

        let pks: Vec<_> = [0, 1, 2]
            .iter()
            .map(|&i| committee.sk(i).public_key(i, &committee.params).unwrap())
            .collect();
        let smaller = AggregateKey::new(&pks, &committee.params).unwrap();
        let selector = Selector::from_indices(&ct.committee, &[0, 1]).unwrap();
        assert!(matches!(
            decrypt(&committee.shares(&ct, &[0, 1]), &selector, &ct, &smaller, &committee.params),
            Err(SteError::CiphertextMismatch(_))
        ));
    }

    #[test]
    fn test_parallel_partial_decryption() {
        let mut rng = ark_std::test_rng();
        let committee = Committee::new(7, &[0, 1, 2, 3, 4, 5, 6], 8);
        let ct = encrypt(&committee.agg_key, 4, &committee.params, b"parallel", &mut rng).unwrap();

        let parties = [1, 2, 4, 5, 6];
        let shares: Vec<PartialDecryption<E>> = parties
            .par_iter()
            .map(|&i| partial_decrypt(committee.sk(i), i, &ct).unwrap())
            .collect();
        for share in &shares {
            assert!(committee.agg_key.verify_share(share, &ct));
        }

        let selector = Selector::from_indices(&ct.committee, &parties).unwrap();
        let plaintext = decrypt(&shares, &selector, &ct, &committee.agg_key, &committee.params);
        assert_eq!(plaintext.unwrap(), b"parallel");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn prop_decrypts_iff_quorum_is_reached(mask in 0u8..16, t in 1usize..=4) {
            let committee = Committee::new(4, &[0, 1, 2, 3], 9);
            let mut rng = StdRng::seed_from_u64(mask as u64);
            let ct = encrypt(&committee.agg_key, t, &committee.params, b"quorum", &mut rng).unwrap();

            let parties: Vec<usize> = (0..4).filter(|i| mask & (1 << i) != 0).collect();
            let result = committee.decrypt(&ct, &parties);
            if parties.len() >= t {
                prop_assert_eq!(result.unwrap(), b"quorum".to_vec());
            } else {
                prop_assert_eq!(
                    result.unwrap_err(),
                    SteError::InsufficientShares { required: t, provided: parties.len() }
                );
            }
        }
    }
}
