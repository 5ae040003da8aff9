//! The secret polynomial behind a guardian's key share
//!
//! A guardian with quorum `k` draws `f(x) = a_0 + a_1 x + ... + a_{k-1} x^{k-1}` over Q-space.
//! `a_0` is its election secret; `f(j)` is the backup it hands to the guardian with sequence
//! order `j`. Each coefficient is committed to as `K_i = G^{a_i}` with a Schnorr proof, which
//! lets the receiver of `f(j)` check it in the exponent without learning any coefficient.
use crate::{
    elgamal::elgamal_keypair_random,
    error::Result,
    group::{
        a_minus_b_q, add_q, div_q, g_pow_p, mult_all_p, mult_q, pow_p, rand_q, ElementModP,
        ElementModQ, ONE_MOD_Q, ZERO_MOD_Q,
    },
    proofs::SchnorrProof,
};
use rand::{CryptoRng, RngCore};
use std::fmt;

#[derive(Clone)]
pub struct ElectionPolynomial {
    /// a_0 .. a_{k-1}; secret
    pub(crate) coefficients: Vec<ElementModQ>,
    /// G^{a_i}
    pub(crate) coefficient_commitments: Vec<ElementModP>,
    /// Proof of knowledge of each a_i
    pub(crate) coefficient_proofs: Vec<SchnorrProof>,
}

impl ElectionPolynomial {
    pub fn get_coefficient_commitments(&self) -> &[ElementModP] {
        return &self.coefficient_commitments;
    }

    pub fn get_coefficient_proofs(&self) -> &[SchnorrProof] {
        return &self.coefficient_proofs;
    }

    /// Number of coefficients, i.e. the quorum the polynomial was drawn for
    pub fn len(&self) -> usize {
        return self.coefficients.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.coefficients.is_empty();
    }
}

impl fmt::Debug for ElectionPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("ElectionPolynomial")
            .field("coefficients", &"<redacted>")
            .field("coefficient_commitments", &self.coefficient_commitments)
            .finish();
    }
}

/// Draw a polynomial with `number_of_coefficients` random coefficients, each in `[2, Q)` so
/// that every coefficient is a usable ElGamal secret.
pub fn generate_polynomial<R: CryptoRng + RngCore>(
    number_of_coefficients: usize,
    rng: &mut R,
) -> ElectionPolynomial {
    let mut coefficients = Vec::with_capacity(number_of_coefficients);
    let mut coefficient_commitments = Vec::with_capacity(number_of_coefficients);
    let mut coefficient_proofs = Vec::with_capacity(number_of_coefficients);
    for _ in 0..number_of_coefficients {
        let keypair = elgamal_keypair_random(rng);
        let nonce = rand_q(rng);
        coefficient_proofs.push(SchnorrProof::make(&keypair, &nonce));
        coefficients.push(*keypair.get_secret_key());
        coefficient_commitments.push(*keypair.get_public_key());
    }
    return ElectionPolynomial {
        coefficients,
        coefficient_commitments,
        coefficient_proofs,
    };
}

/// `f(x)` evaluated with Horner's rule over Q
pub fn compute_polynomial_coordinate(x: u64, polynomial: &ElectionPolynomial) -> ElementModQ {
    let x = ElementModQ::from_u64(x);
    return polynomial
        .coefficients
        .iter()
        .rev()
        .fold(ZERO_MOD_Q, |acc, coefficient| {
            add_q(&mult_q(&acc, &x), coefficient)
        });
}

/// `prod_k K_k ^ (x^k)`, which equals `G^f(x)` when the commitments are honest. For a missing
/// guardian's commitments evaluated at a helper's sequence order, this is the public key the
/// helper's compensated share is checked against.
pub fn compute_commitment_product(x: u64, commitments: &[ElementModP]) -> ElementModP {
    let x = ElementModQ::from_u64(x);
    let mut exponent = ONE_MOD_Q;
    let mut terms = Vec::with_capacity(commitments.len());
    for commitment in commitments {
        terms.push(pow_p(commitment, &exponent));
        exponent = mult_q(&exponent, &x);
    }
    return mult_all_p(&terms);
}

/// Check `G^value == prod_k K_k ^ (x^k)` without knowing the coefficients
pub fn verify_polynomial_coordinate(
    value: &ElementModQ,
    x: u64,
    commitments: &[ElementModP],
) -> bool {
    return g_pow_p(value) == compute_commitment_product(x, commitments);
}

/// Lagrange coefficient at zero for the point `x` among `degrees`:
/// `prod_{j != x} j / (j - x) mod Q`. `degrees` may contain `x` itself.
pub fn compute_lagrange_coefficient(x: u64, degrees: &[u64]) -> Result<ElementModQ> {
    let x_q = ElementModQ::from_u64(x);
    let (numerator, denominator) = degrees.iter().filter(|&&j| j != x).fold(
        (ONE_MOD_Q, ONE_MOD_Q),
        |(numerator, denominator), &j| {
            let j = ElementModQ::from_u64(j);
            return (
                mult_q(&numerator, &j),
                mult_q(&denominator, &a_minus_b_q(&j, &x_q)),
            );
        },
    );
    return div_q(&numerator, &denominator);
}
