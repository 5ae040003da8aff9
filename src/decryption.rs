//! Decryption shares and the plaintext tally
//!
//! A guardian's share of a ciphertext `(alpha, beta)` is `M_i = alpha^{s_i}`. The product of
//! every guardian's share is `alpha^{sum s_i} = K^r`, which strips the blinding factor from
//! `beta`. A missing guardian `m`'s share is rebuilt from fragments `M_{m,l} = alpha^{f_m(l)}`
//! contributed by the guardians `l` holding its backups:
//! `M_m = prod_l M_{m,l}^{w_l}`, with `w_l` the Lagrange coefficient of `l` among the helpers.
use crate::{
    elgamal::ElGamalCiphertext,
    error::{Error, Result},
    group::{mult_all_p, pow_p, ElementModP},
    polynomial::compute_lagrange_coefficient,
    proofs::ChaumPedersenProof,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One guardian's share (or fragment) for one selection, with its proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextDecryptionSelection {
    pub object_id: String,
    pub share: ElementModP,
    pub proof: ChaumPedersenProof,
}

/// Shares for every selection of one ciphertext set, keyed by selection id
pub type SelectionShares = BTreeMap<String, CiphertextDecryptionSelection>;

/// A guardian's direct shares for the tally and for every spoiled ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyDecryptionShare {
    pub guardian_id: String,
    pub sequence_order: u64,
    /// `G^{s_i}`: what the proofs are checked against
    pub public_key: ElementModP,
    pub tally: SelectionShares,
    /// Keyed by ballot id
    pub spoiled_ballots: BTreeMap<String, SelectionShares>,
}

/// Fragments contributed by an available guardian on behalf of a missing one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatedTallyDecryptionShare {
    pub guardian_id: String,
    pub sequence_order: u64,
    pub missing_guardian_id: String,
    /// `G^{f_m(l)}`, computable by anyone from the missing guardian's commitments
    pub recovery_public_key: ElementModP,
    pub tally: SelectionShares,
    pub spoiled_ballots: BTreeMap<String, SelectionShares>,
}

/// Why a submitted share was turned away
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedShare {
    pub guardian_id: String,
    /// Set for compensated shares
    pub missing_guardian_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTallySelection {
    pub object_id: String,
    pub tally: u64,
    /// `G^tally`
    pub value: ElementModP,
    pub message: ElGamalCiphertext,
    /// The full share of every guardian, rebuilt ones included, keyed by guardian id
    pub shares: BTreeMap<String, ElementModP>,
    /// Proofs of the direct shares, keyed by guardian id
    pub proofs: BTreeMap<String, ChaumPedersenProof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTallyContest {
    pub object_id: String,
    pub selections: BTreeMap<String, PlaintextTallySelection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTally {
    pub object_id: String,
    pub contests: BTreeMap<String, PlaintextTallyContest>,
    /// Keyed by ballot id, then contest id
    pub spoiled_ballots: BTreeMap<String, BTreeMap<String, PlaintextTallyContest>>,
    /// Guardians that decrypted directly
    pub available_guardians: BTreeSet<String>,
    /// Missing guardians, each with the guardians whose fragments rebuilt its share
    pub compensated_guardians: BTreeMap<String, BTreeSet<String>>,
}

impl PlaintextTally {
    /// True when every guardian took part directly and no backup was used
    pub fn is_direct(&self) -> bool {
        return self.compensated_guardians.is_empty();
    }

    /// The count for a selection of the tally
    pub fn get_count(&self, contest_id: &str, selection_id: &str) -> Option<u64> {
        return self
            .contests
            .get(contest_id)
            .and_then(|contest| contest.selections.get(selection_id))
            .map(|selection| selection.tally);
    }
}

/// Rebuild a missing guardian's share from `(helper sequence order, fragment)` pairs by
/// Lagrange interpolation in the exponent. The pairs must come from distinct helpers.
pub fn reconstruct_missing_share(fragments: &[(u64, ElementModP)]) -> Result<ElementModP> {
    let degrees: Vec<u64> = fragments.iter().map(|(order, _)| *order).collect();
    if degrees.iter().collect::<BTreeSet<_>>().len() != degrees.len() {
        return Err(Error::InvalidConfiguration(
            "fragments must come from distinct guardians".to_string(),
        ));
    }
    let mut weighted = Vec::with_capacity(fragments.len());
    for (order, fragment) in fragments {
        let coefficient = compute_lagrange_coefficient(*order, &degrees)?;
        weighted.push(pow_p(fragment, &coefficient));
    }
    return Ok(mult_all_p(&weighted));
}
