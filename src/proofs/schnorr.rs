//! Proof of knowledge of `x` for a public key `h = G^x`
//! statement: h = G^x
//! commit: k = G^r
//! challenge: c = H(tag, h, k), where the tag separates these proofs from every other hash
//! response: u = r + cx
//! verify: G^u == k * h^c
use crate::{
    elgamal::ElGamalKeyPair,
    group::{a_plus_bc_q, g_pow_p, mult_p, pow_p, ElementModP, ElementModQ},
    hash::hash_elems,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DOMAIN_TAG: &str = "election-guardian/schnorr";

fn challenge_for(public_key: &ElementModP, commitment: &ElementModP) -> ElementModQ {
    return hash_elems(&[&DOMAIN_TAG, public_key, commitment]);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    /// The public key whose secret is known
    pub public_key: ElementModP,
    pub commitment: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
}

impl SchnorrProof {
    /// Prove knowledge of the key pair's secret using the random nonce `r`
    pub fn make(keypair: &ElGamalKeyPair, r: &ElementModQ) -> Self {
        let public_key = *keypair.get_public_key();
        let commitment = g_pow_p(r);
        let challenge = challenge_for(&public_key, &commitment);
        let response = a_plus_bc_q(r, &challenge, keypair.get_secret_key());
        return Self {
            public_key,
            commitment,
            challenge,
            response,
        };
    }

    /// Check the transcript. The challenge is recomputed rather than trusted.
    pub fn is_valid(&self) -> bool {
        let in_bounds = self.public_key.is_valid_residue() && self.commitment.is_valid_residue();
        let challenge_matches = self.challenge == challenge_for(&self.public_key, &self.commitment);
        let equation_holds = g_pow_p(&self.response)
            == mult_p(&self.commitment, &pow_p(&self.public_key, &self.challenge));

        let success = in_bounds && challenge_matches && equation_holds;
        if !success {
            warn!(in_bounds, challenge_matches, equation_holds, "invalid Schnorr proof");
        }
        return success;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        elgamal::elgamal_keypair_random,
        group::{add_q, rand_q, ONE_MOD_Q},
    };
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_correctness() {
        let mut rng = StdRng::seed_from_u64(5);
        let keypair = elgamal_keypair_random(&mut rng);
        let proof = SchnorrProof::make(&keypair, &rand_q(&mut rng));
        assert!(proof.is_valid());
    }

    #[test]
    fn test_tampered_transcripts_fail() {
        let mut rng = StdRng::seed_from_u64(6);
        let keypair = elgamal_keypair_random(&mut rng);
        let proof = SchnorrProof::make(&keypair, &rand_q(&mut rng));

        let mut bad_response = proof.clone();
        bad_response.response = add_q(&proof.response, &ONE_MOD_Q);
        assert!(!bad_response.is_valid());

        let mut bad_challenge = proof.clone();
        bad_challenge.challenge = add_q(&proof.challenge, &ONE_MOD_Q);
        assert!(!bad_challenge.is_valid());

        let mut other_key = proof.clone();
        other_key.public_key = *elgamal_keypair_random(&mut rng).get_public_key();
        assert!(!other_key.is_valid());
    }

    #[test]
    fn test_untagged_challenge_fails() {
        let mut rng = StdRng::seed_from_u64(7);
        let keypair = elgamal_keypair_random(&mut rng);
        let r = rand_q(&mut rng);
        let public_key = *keypair.get_public_key();
        let commitment = g_pow_p(&r);
        let challenge = hash_elems(&[&public_key, &commitment]);
        let proof = SchnorrProof {
            public_key,
            commitment,
            challenge,
            response: a_plus_bc_q(&r, &challenge, keypair.get_secret_key()),
        };
        assert!(!proof.is_valid());
    }
}
