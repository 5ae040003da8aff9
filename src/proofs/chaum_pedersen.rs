//! Chaum-Pedersen proofs over ElGamal ciphertexts `(alpha, beta) = (G^R, K^R * G^m)`
//!
//! All three proofs show knowledge of one exponent that links two bases at once:
//! - [`DisjunctiveChaumPedersenProof`]: the ciphertext encrypts 0 or 1, without saying which.
//!   The branch for the true plaintext is proven honestly and the other one is simulated by
//!   choosing its challenge and response first; the two challenges must add up to the single
//!   Fiat-Shamir hash, so only one of them can be simulated.
//! - [`ConstantChaumPedersenProof`]: the ciphertext encrypts a known constant. This is the
//!   single-branch case of the disjunctive proof and is used for contest totals.
//! - [`ChaumPedersenProof`]: a partial decryption `M = alpha^s` uses the same `s` as the
//!   guardian's public key share `G^s`.
//!
//! Challenges are bound to the extended base hash of the election, so a proof cannot be
//! replayed into another election.
use crate::{
    elgamal::ElGamalCiphertext,
    error::{Error, Result},
    group::{
        a_minus_b_q, a_plus_bc_q, add_q, g_pow_p, mult_p, negate_q, pow_p, ElementModP,
        ElementModQ, ONE_MOD_Q, ZERO_MOD_Q,
    },
    hash::{hash_elems, Nonces},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// `beta / G^m`, computed as `beta * G^(Q - m)` since `G` has order `Q`
fn strip_message(data: &ElementModP, message: &ElementModQ) -> ElementModP {
    return mult_p(data, &g_pow_p(&negate_q(message)));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisjunctiveChaumPedersenProof {
    /// a0
    pub proof_zero_pad: ElementModP,
    /// b0
    pub proof_zero_data: ElementModP,
    /// a1
    pub proof_one_pad: ElementModP,
    /// b1
    pub proof_one_data: ElementModP,
    /// c0
    pub proof_zero_challenge: ElementModQ,
    /// c1
    pub proof_one_challenge: ElementModQ,
    /// c = H(Q-bar, alpha, beta, a0, b0, a1, b1)
    pub challenge: ElementModQ,
    /// v0
    pub proof_zero_response: ElementModQ,
    /// v1
    pub proof_one_response: ElementModQ,
}

impl DisjunctiveChaumPedersenProof {
    /// Prove that `message` (encrypted with nonce `r` under `k`) holds `plaintext`, which must
    /// be 0 or 1. All proof randomness is derived from `seed`.
    pub fn make(
        message: &ElGamalCiphertext,
        r: &ElementModQ,
        k: &ElementModP,
        q: &ElementModQ,
        seed: &ElementModQ,
        plaintext: u64,
    ) -> Result<Self> {
        let nonces = Nonces::new(seed, "disjoint-chaum-pedersen-proof");
        let (u, simulated_challenge, simulated_response) =
            (nonces.get(0), nonces.get(1), nonces.get(2));
        let (alpha, beta) = (&message.pad, &message.data);

        // (a, b) for the simulated branch
        let simulate = |branch_message: &ElementModQ| {
            let a = mult_p(
                &g_pow_p(&simulated_response),
                &pow_p(alpha, &negate_q(&simulated_challenge)),
            );
            let b = mult_p(
                &pow_p(k, &simulated_response),
                &pow_p(
                    &strip_message(beta, branch_message),
                    &negate_q(&simulated_challenge),
                ),
            );
            return (a, b);
        };
        let real = (g_pow_p(&u), pow_p(k, &u));

        match plaintext {
            0 => {
                let (a0, b0) = real;
                let (a1, b1) = simulate(&ONE_MOD_Q);
                let c = hash_elems(&[q, alpha, beta, &a0, &b0, &a1, &b1]);
                let c0 = a_minus_b_q(&c, &simulated_challenge);
                let v0 = a_plus_bc_q(&u, &c0, r);
                return Ok(Self {
                    proof_zero_pad: a0,
                    proof_zero_data: b0,
                    proof_one_pad: a1,
                    proof_one_data: b1,
                    proof_zero_challenge: c0,
                    proof_one_challenge: simulated_challenge,
                    challenge: c,
                    proof_zero_response: v0,
                    proof_one_response: simulated_response,
                });
            }
            1 => {
                let (a0, b0) = simulate(&ZERO_MOD_Q);
                let (a1, b1) = real;
                let c = hash_elems(&[q, alpha, beta, &a0, &b0, &a1, &b1]);
                let c1 = a_minus_b_q(&c, &simulated_challenge);
                let v1 = a_plus_bc_q(&u, &c1, r);
                return Ok(Self {
                    proof_zero_pad: a0,
                    proof_zero_data: b0,
                    proof_one_pad: a1,
                    proof_one_data: b1,
                    proof_zero_challenge: simulated_challenge,
                    proof_one_challenge: c1,
                    challenge: c,
                    proof_zero_response: simulated_response,
                    proof_one_response: v1,
                });
            }
            other => {
                return Err(Error::InvalidBallot(format!(
                    "a selection must encrypt 0 or 1, not {other}"
                )));
            }
        }
    }

    /// Check both branches and that their challenges add up to the recomputed hash
    pub fn is_valid(&self, message: &ElGamalCiphertext, k: &ElementModP, q: &ElementModQ) -> bool {
        let (alpha, beta) = (&message.pad, &message.data);
        let (a0, b0) = (&self.proof_zero_pad, &self.proof_zero_data);
        let (a1, b1) = (&self.proof_one_pad, &self.proof_one_data);
        let (c0, c1) = (&self.proof_zero_challenge, &self.proof_one_challenge);
        let (v0, v1) = (&self.proof_zero_response, &self.proof_one_response);

        let in_bounds = [alpha, beta, k, a0, b0, a1, b1]
            .iter()
            .all(|element| element.is_valid_residue());
        let expected_challenge = hash_elems(&[q, alpha, beta, a0, b0, a1, b1]);
        let challenge_matches = self.challenge == expected_challenge;
        let challenges_sum = add_q(c0, c1) == expected_challenge;

        let zero_pad_holds = g_pow_p(v0) == mult_p(a0, &pow_p(alpha, c0));
        let zero_data_holds = pow_p(k, v0) == mult_p(b0, &pow_p(beta, c0));
        let one_pad_holds = g_pow_p(v1) == mult_p(a1, &pow_p(alpha, c1));
        let one_data_holds =
            pow_p(k, v1) == mult_p(b1, &pow_p(&strip_message(beta, &ONE_MOD_Q), c1));

        let success = in_bounds
            && challenge_matches
            && challenges_sum
            && zero_pad_holds
            && zero_data_holds
            && one_pad_holds
            && one_data_holds;
        if !success {
            warn!(
                in_bounds,
                challenge_matches,
                challenges_sum,
                zero_pad_holds,
                zero_data_holds,
                one_pad_holds,
                one_data_holds,
                "invalid disjunctive Chaum-Pedersen proof"
            );
        }
        return success;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantChaumPedersenProof {
    /// a = G^u
    pub pad: ElementModP,
    /// b = K^u
    pub data: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
    /// The plaintext the ciphertext is claimed to hold
    pub constant: u64,
}

impl ConstantChaumPedersenProof {
    /// Prove that `message`, encrypted with aggregate nonce `r`, holds `constant`
    pub fn make(
        message: &ElGamalCiphertext,
        r: &ElementModQ,
        k: &ElementModP,
        seed: &ElementModQ,
        q: &ElementModQ,
        constant: u64,
    ) -> Self {
        let u = Nonces::new(seed, "constant-chaum-pedersen-proof").get(0);
        let (alpha, beta) = (&message.pad, &message.data);
        let a = g_pow_p(&u);
        let b = pow_p(k, &u);
        let c = hash_elems(&[q, alpha, beta, &a, &b]);
        let v = a_plus_bc_q(&u, &c, r);
        return Self {
            pad: a,
            data: b,
            challenge: c,
            response: v,
            constant,
        };
    }

    pub fn is_valid(&self, message: &ElGamalCiphertext, k: &ElementModP, q: &ElementModQ) -> bool {
        let (alpha, beta) = (&message.pad, &message.data);
        let (a, b) = (&self.pad, &self.data);
        let (c, v) = (&self.challenge, &self.response);

        let in_bounds = [alpha, beta, k, a, b]
            .iter()
            .all(|element| element.is_valid_residue());
        let challenge_matches = *c == hash_elems(&[q, alpha, beta, a, b]);
        let pad_holds = g_pow_p(v) == mult_p(a, &pow_p(alpha, c));
        let stripped = strip_message(beta, &ElementModQ::from_u64(self.constant));
        let data_holds = pow_p(k, v) == mult_p(b, &pow_p(&stripped, c));

        let success = in_bounds && challenge_matches && pad_holds && data_holds;
        if !success {
            warn!(
                in_bounds,
                challenge_matches,
                pad_holds,
                data_holds,
                constant = self.constant,
                "invalid constant Chaum-Pedersen proof"
            );
        }
        return success;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    /// a = G^u
    pub pad: ElementModP,
    /// b = alpha^u
    pub data: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
}

impl ChaumPedersenProof {
    /// Prove that `m = alpha^s` for the `s` behind the public key `G^s`
    pub fn make(
        message: &ElGamalCiphertext,
        s: &ElementModQ,
        m: &ElementModP,
        seed: &ElementModQ,
        q: &ElementModQ,
    ) -> Self {
        let u = Nonces::new(seed, "chaum-pedersen-proof").get(0);
        let (alpha, beta) = (&message.pad, &message.data);
        let a = g_pow_p(&u);
        let b = pow_p(alpha, &u);
        let c = hash_elems(&[q, alpha, beta, &a, &b, m]);
        let v = a_plus_bc_q(&u, &c, s);
        return Self {
            pad: a,
            data: b,
            challenge: c,
            response: v,
        };
    }

    /// `k` is the public key `G^s` the share claims to be derived from
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        m: &ElementModP,
        q: &ElementModQ,
    ) -> bool {
        let (alpha, beta) = (&message.pad, &message.data);
        let (a, b) = (&self.pad, &self.data);
        let (c, v) = (&self.challenge, &self.response);

        let in_bounds = [alpha, beta, k, m, a, b]
            .iter()
            .all(|element| element.is_valid_residue());
        let challenge_matches = *c == hash_elems(&[q, alpha, beta, a, b, m]);
        let public_key_holds = g_pow_p(v) == mult_p(a, &pow_p(k, c));
        let share_holds = pow_p(alpha, v) == mult_p(b, &pow_p(m, c));

        let success = in_bounds && challenge_matches && public_key_holds && share_holds;
        if !success {
            warn!(
                in_bounds,
                challenge_matches,
                public_key_holds,
                share_holds,
                "invalid Chaum-Pedersen decryption proof"
            );
        }
        return success;
    }
}
