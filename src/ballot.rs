//! Plaintext and encrypted ballots
//!
//! A [`CiphertextBallot`] checks itself: every selection carries a proof that it encrypts 0 or 1
//! and every contest a proof that its selections (placeholders included) add up to exactly
//! `votes_allowed`. [`validate_ballot`] additionally holds the ballot against the election it
//! claims to belong to.
use crate::{
    elgamal::{elgamal_add, ElGamalCiphertext},
    election::{selection_index, CiphertextElectionContext, InternalElectionDescription},
    error::{Error, Result},
    group::{add_q, ElementModP, ElementModQ, ZERO_MOD_Q},
    hash::{hash_elems, CryptoHashable},
    proofs::{ConstantChaumPedersenProof, DisjunctiveChaumPedersenProof},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallotSelection {
    pub object_id: String,
    pub vote: u64,
    pub is_placeholder_selection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallotContest {
    pub object_id: String,
    pub ballot_selections: Vec<PlaintextBallotSelection>,
}

impl PlaintextBallotContest {
    /// Number of affirmative votes in the contest
    pub fn votes(&self) -> u64 {
        return self.ballot_selections.iter().map(|s| s.vote).sum();
    }
}

/// Voter intent for one ballot of one style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallot {
    pub object_id: String,
    pub ballot_style: String,
    pub contests: Vec<PlaintextBallotContest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallotSelection {
    pub object_id: String,
    /// Hash of the selection's description in the manifest
    pub description_hash: ElementModQ,
    pub ciphertext: ElGamalCiphertext,
    pub crypto_hash: ElementModQ,
    pub is_placeholder_selection: bool,
    /// Encryption nonce. Kept by the encrypting device only.
    #[serde(skip)]
    pub nonce: Option<ElementModQ>,
    pub proof: DisjunctiveChaumPedersenProof,
}

impl CiphertextBallotSelection {
    pub fn compute_crypto_hash(
        object_id: &str,
        description_hash: &ElementModQ,
        ciphertext: &ElGamalCiphertext,
    ) -> ElementModQ {
        return hash_elems(&[&object_id, description_hash, &ciphertext.crypto_hash()]);
    }

    /// The selection matches the expected description, its hash is intact and its proof holds
    pub fn is_valid_encryption(
        &self,
        description_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        if self.description_hash != *description_hash {
            warn!(selection = %self.object_id, "selection description hash mismatch");
            return false;
        }
        let expected =
            Self::compute_crypto_hash(&self.object_id, &self.description_hash, &self.ciphertext);
        if self.crypto_hash != expected {
            warn!(selection = %self.object_id, "selection crypto hash mismatch");
            return false;
        }
        return self
            .proof
            .is_valid(&self.ciphertext, elgamal_public_key, extended_base_hash);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallotContest {
    pub object_id: String,
    pub description_hash: ElementModQ,
    /// Real selections followed by placeholders, in sequence order
    pub ballot_selections: Vec<CiphertextBallotSelection>,
    pub crypto_hash: ElementModQ,
    #[serde(skip)]
    pub nonce: Option<ElementModQ>,
    pub proof: ConstantChaumPedersenProof,
}

impl CiphertextBallotContest {
    pub fn compute_crypto_hash(
        object_id: &str,
        description_hash: &ElementModQ,
        selections: &[CiphertextBallotSelection],
    ) -> ElementModQ {
        let header: [&dyn CryptoHashable; 2] = [&object_id, description_hash];
        let mut items = header.to_vec();
        items.extend(
            selections
                .iter()
                .map(|selection| &selection.crypto_hash as &dyn CryptoHashable),
        );
        return hash_elems(&items);
    }

    /// Homomorphic sum of every selection, an encryption of the contest's vote total
    pub fn aggregate_ciphertext(&self) -> ElGamalCiphertext {
        return elgamal_add(self.ballot_selections.iter().map(|s| &s.ciphertext));
    }

    /// Sum of the selection nonces, if they are still known
    pub fn aggregate_nonce(&self) -> Option<ElementModQ> {
        return self
            .ballot_selections
            .iter()
            .try_fold(ZERO_MOD_Q, |acc, selection| {
                selection.nonce.map(|nonce| add_q(&acc, &nonce))
            });
    }

    pub fn is_valid_encryption(
        &self,
        description_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        if self.description_hash != *description_hash {
            warn!(contest = %self.object_id, "contest description hash mismatch");
            return false;
        }
        let expected = Self::compute_crypto_hash(
            &self.object_id,
            &self.description_hash,
            &self.ballot_selections,
        );
        if self.crypto_hash != expected {
            warn!(contest = %self.object_id, "contest crypto hash mismatch");
            return false;
        }
        let selections_valid = self.ballot_selections.iter().all(|selection| {
            selection.is_valid_encryption(
                &selection.description_hash,
                elgamal_public_key,
                extended_base_hash,
            )
        });
        return selections_valid
            && self.proof.is_valid(
                &self.aggregate_ciphertext(),
                elgamal_public_key,
                extended_base_hash,
            );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallot {
    pub object_id: String,
    pub ballot_style: String,
    /// Hash of the election manifest the ballot was encrypted for
    pub description_hash: ElementModQ,
    pub contests: Vec<CiphertextBallotContest>,
    pub crypto_hash: ElementModQ,
    /// The seed every nonce of the ballot was derived from
    #[serde(skip)]
    pub nonce: Option<ElementModQ>,
}

impl CiphertextBallot {
    pub fn compute_crypto_hash(
        object_id: &str,
        description_hash: &ElementModQ,
        contests: &[CiphertextBallotContest],
    ) -> ElementModQ {
        let header: [&dyn CryptoHashable; 2] = [&object_id, description_hash];
        let mut items = header.to_vec();
        items.extend(
            contests
                .iter()
                .map(|contest| &contest.crypto_hash as &dyn CryptoHashable),
        );
        return hash_elems(&items);
    }

    pub fn is_valid_encryption(
        &self,
        description_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        if self.description_hash != *description_hash {
            warn!(ballot = %self.object_id, "ballot was encrypted for another election");
            return false;
        }
        let expected =
            Self::compute_crypto_hash(&self.object_id, &self.description_hash, &self.contests);
        if self.crypto_hash != expected {
            warn!(ballot = %self.object_id, "ballot crypto hash mismatch");
            return false;
        }
        return self.contests.iter().all(|contest| {
            contest.is_valid_encryption(
                &contest.description_hash,
                elgamal_public_key,
                extended_base_hash,
            )
        });
    }

    /// Forget every nonce. Anyone holding a nonce can decrypt the ciphertext it produced.
    pub fn strip_nonces(&mut self) {
        self.nonce = None;
        for contest in self.contests.iter_mut() {
            contest.nonce = None;
            for selection in contest.ballot_selections.iter_mut() {
                selection.nonce = None;
            }
        }
    }

    /// The non-placeholder selections, with the contest they belong to
    pub fn real_selections(
        &self,
    ) -> impl Iterator<Item = (&CiphertextBallotContest, &CiphertextBallotSelection)> {
        return self.contests.iter().flat_map(|contest| {
            contest
                .ballot_selections
                .iter()
                .filter(|selection| !selection.is_placeholder_selection)
                .map(move |selection| (contest, selection))
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotBoxState {
    /// Counted in the tally
    Cast,
    /// Not counted; decrypted individually so the voter can audit the device
    Spoiled,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextAcceptedBallot {
    pub ballot: CiphertextBallot,
    pub state: BallotBoxState,
}

/// Check that a ballot belongs to this election: a known style, exactly the style's contests,
/// each with exactly its described selections and placeholders, the right vote limit, and valid
/// proofs throughout.
pub fn validate_ballot(
    ballot: &CiphertextBallot,
    internal: &InternalElectionDescription,
    context: &CiphertextElectionContext,
) -> Result<()> {
    let contests = internal.get_contests_for(&ballot.ballot_style)?;
    let expected_ids: BTreeSet<&str> = contests.iter().map(|c| c.get_object_id()).collect();
    let actual_ids: BTreeSet<&str> = ballot.contests.iter().map(|c| c.object_id.as_str()).collect();
    if expected_ids != actual_ids || actual_ids.len() != ballot.contests.len() {
        return Err(Error::BallotStyleMismatch(format!(
            "ballot {} does not carry the contests of style {}",
            ballot.object_id, ballot.ballot_style
        )));
    }
    for contest in &ballot.contests {
        let description = internal.get_contest(&contest.object_id).ok_or_else(|| {
            Error::BallotStyleMismatch(format!("unknown contest {}", contest.object_id))
        })?;
        let index = selection_index(description);
        if contest.ballot_selections.len() != index.len() {
            return Err(Error::BallotStyleMismatch(format!(
                "contest {} has {} selections, expected {}",
                contest.object_id,
                contest.ballot_selections.len(),
                index.len()
            )));
        }
        let selection_ids: BTreeSet<&str> = contest
            .ballot_selections
            .iter()
            .map(|s| s.object_id.as_str())
            .collect();
        if selection_ids.len() != contest.ballot_selections.len() {
            return Err(Error::BallotStyleMismatch(format!(
                "contest {} repeats a selection",
                contest.object_id
            )));
        }
        if contest.description_hash != description.crypto_hash() {
            return Err(Error::BallotStyleMismatch(format!(
                "contest {} was encrypted for another description",
                contest.object_id
            )));
        }
        if contest.proof.constant != description.description.votes_allowed {
            return Err(Error::InvalidProof(format!(
                "contest {} proves a total of {}, {} votes are allowed",
                contest.object_id, contest.proof.constant, description.description.votes_allowed
            )));
        }
        for selection in &contest.ballot_selections {
            let (selection_description, is_placeholder) = index
                .get(selection.object_id.as_str())
                .ok_or_else(|| {
                    Error::BallotStyleMismatch(format!(
                        "contest {} has no selection {}",
                        contest.object_id, selection.object_id
                    ))
                })?;
            if selection.is_placeholder_selection != *is_placeholder
                || selection.description_hash != selection_description.crypto_hash()
            {
                return Err(Error::BallotStyleMismatch(format!(
                    "selection {} does not match its description",
                    selection.object_id
                )));
            }
        }
    }
    if !ballot.is_valid_encryption(
        &internal.description_hash,
        &context.elgamal_public_key,
        &context.crypto_extended_base_hash,
    ) {
        return Err(Error::InvalidProof(format!(
            "ballot {} failed verification",
            ballot.object_id
        )));
    }
    return Ok(());
}
