use ark_ec::{pairing::Pairing, VariableBaseMSM};
use ark_ff::{FftField, Field};
use ark_poly::{
    univariate::DensePolynomial, DenseUVPolynomial, EvaluationDomain, Evaluations, Polynomial,
    Radix2EvaluationDomain,
};
use ark_std::Zero;

use crate::error::SteError;

/// Number of evaluation slots needed for a committee bound: one anchor slot
/// plus one slot per party, rounded up to a power of two.
pub fn domain_size_for(max_committee_size: usize) -> usize {
    (max_committee_size + 1).next_power_of_two()
}

/// Domain slot occupied by committee index `index`. Slot 0 is the anchor.
pub fn slot_of(index: usize) -> usize {
    index + 1
}

pub fn evaluation_domain<F: FftField>(n: usize) -> Result<Radix2EvaluationDomain<F>, SteError> {
    // Radix2EvaluationDomain::new silently rounds up
    let domain = if n.is_power_of_two() {
        Radix2EvaluationDomain::<F>::new(n)
    } else {
        None
    };
    domain.ok_or_else(|| {
        SteError::Domain(format!(
            "failed to create domain for n = {} (must be a power of 2)",
            n
        ))
    })
}

/// Computes the Lagrange basis polynomial L_i(x) that is 1 at omega^i and 0 elsewhere
/// on the domain {omega^i}_{i \in [n]}.
///
/// # Panics
/// Panics if n is not a power of 2 or if i >= n (in debug mode)
pub fn lagrange_poly<F: FftField>(n: usize, i: usize) -> DensePolynomial<F> {
    debug_assert!(i < n);
    debug_assert!(n.is_power_of_two());

    let mut evals = vec![F::zero(); n];
    evals[i] = F::one();

    //powers of nth root of unity
    let domain = Radix2EvaluationDomain::<F>::new(n)
        .expect("n must be a power of 2 for Radix2EvaluationDomain");
    let eval_form = Evaluations::from_vec_and_domain(evals, domain);
    //interpolated polynomial over the n points
    eval_form.interpolate()
}

/// Interpolates a polynomial that takes value `eval` at `points[0]` and is
/// zero at every other point in `points`.
pub fn interp_mostly_zero<F: Field>(eval: F, points: &[F]) -> DensePolynomial<F> {
    if points.is_empty() {
        return DensePolynomial::from_coefficients_vec(vec![F::one()]);
    }

    let mut interp = DensePolynomial::from_coefficients_vec(vec![F::one()]);
    for &point in &points[1..] {
        interp = interp.naive_mul(&DensePolynomial::from_coefficients_vec(vec![
            -point,
            F::one(),
        ]));
    }

    let scale = interp.evaluate(&points[0]);
    interp = &interp * (eval / scale);

    interp
}

/// Divides `poly` by `(x - root)` with synthetic division, discarding the
/// remainder. Callers check that `root` is actually a root.
pub fn divide_by_linear<F: Field>(poly: &DensePolynomial<F>, root: F) -> DensePolynomial<F> {
    if poly.coeffs.len() < 2 {
        return DensePolynomial::zero();
    }

    let mut quotient = vec![F::zero(); poly.coeffs.len() - 1];
    let mut carry = F::zero();
    for i in (1..poly.coeffs.len()).rev() {
        carry = poly.coeffs[i] + carry * root;
        quotient[i - 1] = carry;
    }
    DensePolynomial::from_coefficients_vec(quotient)
}

/// Helper function to compute MSM over G1 group elements.
pub fn compute_msm_g1<E: Pairing>(
    bases: &[E::G1Affine],
    scalars: &[E::ScalarField],
    operation_name: &str,
) -> Result<E::G1, SteError> {
    E::G1::msm(bases, scalars)
        .map_err(|e| SteError::Kzg(format!("MSM failed in {}: {:?}", operation_name, e)))
}

/// Helper function to compute MSM over G2 group elements.
pub fn compute_msm_g2<E: Pairing>(
    bases: &[E::G2Affine],
    scalars: &[E::ScalarField],
    operation_name: &str,
) -> Result<E::G2, SteError> {
    E::G2::msm(bases, scalars)
        .map_err(|e| SteError::Kzg(format!("MSM failed in {}: {:?}", operation_name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_381::Fr;
    use ark_std::{One, UniformRand};

    #[test]
    fn test_domain_sizing() {
        assert_eq!(domain_size_for(1), 2);
        assert_eq!(domain_size_for(3), 4);
        assert_eq!(domain_size_for(4), 8);
        assert_eq!(domain_size_for(5), 8);
        assert_eq!(domain_size_for(7), 8);
        assert_eq!(domain_size_for(8), 16);
        assert_eq!(slot_of(0), 1);
    }

    #[test]
    fn test_lagrange_poly() {
        let n = 8;
        let domain = evaluation_domain::<Fr>(n).unwrap();
        for i in 0..n {
            let li = lagrange_poly::<Fr>(n, i);
            for (j, omega) in domain.elements().enumerate() {
                let expected = if i == j { Fr::one() } else { Fr::zero() };
                assert_eq!(li.evaluate(&omega), expected);
            }
        }
    }

    #[test]
    fn test_interp_mostly_zero() {
        let mut rng = ark_std::test_rng();
        let points: Vec<Fr> = (0..5).map(|_| Fr::rand(&mut rng)).collect();
        let eval = Fr::rand(&mut rng);
        let poly = interp_mostly_zero(eval, &points);

        assert_eq!(poly.degree(), points.len() - 1);
        assert_eq!(poly.evaluate(&points[0]), eval);
        for p in &points[1..] {
            assert!(poly.evaluate(p).is_zero());
        }
    }

    #[test]
    fn test_divide_by_linear() {
        let mut rng = ark_std::test_rng();
        let root = Fr::rand(&mut rng);
        let q = DensePolynomial::<Fr>::rand(6, &mut rng);
        let linear = DensePolynomial::from_coefficients_vec(vec![-root, Fr::one()]);
        let product = q.naive_mul(&linear);

        assert_eq!(divide_by_linear(&product, root), q);
        assert!(divide_by_linear(&DensePolynomial::<Fr>::zero(), root).is_zero());
    }
}
