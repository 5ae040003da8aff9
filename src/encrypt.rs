//! Ballot encryption
//!
//! Every nonce on a ballot is derived from a single random seed: the seed gives one nonce seed
//! per contest, and a contest's nonce seed gives one nonce per selection (hashing in the
//! description of the contest or selection). Nonces are therefore never reused across
//! selections, and a ballot can be re-encrypted bit for bit from its seed.
use crate::{
    ballot::{
        CiphertextBallot, CiphertextBallotContest, CiphertextBallotSelection,
        PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection,
    },
    elgamal::{elgamal_add, elgamal_encrypt},
    election::{
        CiphertextElectionContext, ContestDescriptionWithPlaceholders,
        InternalElectionDescription, SelectionDescription,
    },
    error::{Error, Result},
    group::{add_q, rand_q, ElementModP, ElementModQ, ZERO_MOD_Q},
    hash::{hash_elems, Nonces},
    proofs::{ConstantChaumPedersenProof, DisjunctiveChaumPedersenProof},
};
use rand::{CryptoRng, RngCore};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A selection for the given description with a vote of 0 or 1
pub fn selection_from(
    description: &SelectionDescription,
    is_placeholder: bool,
    is_affirmative: bool,
) -> PlaintextBallotSelection {
    return PlaintextBallotSelection {
        object_id: description.object_id.clone(),
        vote: is_affirmative as u64,
        is_placeholder_selection: is_placeholder,
    };
}

/// A blank contest: every selection present with a vote of zero
pub fn contest_from(description: &ContestDescriptionWithPlaceholders) -> PlaintextBallotContest {
    return PlaintextBallotContest {
        object_id: description.description.object_id.clone(),
        ballot_selections: description
            .description
            .ballot_selections
            .iter()
            .map(|selection| selection_from(selection, false, false))
            .collect(),
    };
}

/// Encrypt one selection. The nonce and proof seed come from `nonce_seed` and the selection's
/// description, so they differ for every selection of a contest.
pub fn encrypt_selection(
    selection: &PlaintextBallotSelection,
    description: &SelectionDescription,
    elgamal_public_key: &ElementModP,
    extended_base_hash: &ElementModQ,
    nonce_seed: &ElementModQ,
    is_placeholder: bool,
    should_verify_proofs: bool,
) -> Result<CiphertextBallotSelection> {
    if selection.object_id != description.object_id {
        return Err(Error::BallotStyleMismatch(format!(
            "selection {} encrypted against description {}",
            selection.object_id, description.object_id
        )));
    }
    if selection.vote > 1 {
        return Err(Error::InvalidBallot(format!(
            "selection {} has a vote of {}",
            selection.object_id, selection.vote
        )));
    }

    let description_hash = description.crypto_hash();
    let nonces = Nonces::new(
        &hash_elems(&[&description_hash, nonce_seed]),
        "ballot-selection",
    );
    let (nonce, proof_seed) = (nonces.get(0), nonces.get(1));
    let ciphertext = elgamal_encrypt(selection.vote, &nonce, elgamal_public_key)?;
    let proof = DisjunctiveChaumPedersenProof::make(
        &ciphertext,
        &nonce,
        elgamal_public_key,
        extended_base_hash,
        &proof_seed,
        selection.vote,
    )?;
    let encrypted = CiphertextBallotSelection {
        object_id: selection.object_id.clone(),
        crypto_hash: CiphertextBallotSelection::compute_crypto_hash(
            &selection.object_id,
            &description_hash,
            &ciphertext,
        ),
        description_hash,
        ciphertext,
        is_placeholder_selection: is_placeholder,
        nonce: Some(nonce),
        proof,
    };
    if should_verify_proofs
        && !encrypted.is_valid_encryption(&description_hash, elgamal_public_key, extended_base_hash)
    {
        return Err(Error::InvalidProof(format!(
            "selection {} failed verification after encryption",
            selection.object_id
        )));
    }
    return Ok(encrypted);
}

/// Encrypt one contest. Selections the voter left out count as zero; unused votes go to
/// placeholders. An unknown or repeated selection, a non-0/1 vote or an overvote is rejected.
pub fn encrypt_contest(
    contest: &PlaintextBallotContest,
    description: &ContestDescriptionWithPlaceholders,
    elgamal_public_key: &ElementModP,
    extended_base_hash: &ElementModQ,
    nonce_seed: &ElementModQ,
    should_verify_proofs: bool,
) -> Result<CiphertextBallotContest> {
    let contest_id = description.get_object_id();
    if contest.object_id != contest_id {
        return Err(Error::BallotStyleMismatch(format!(
            "contest {} encrypted against description {contest_id}",
            contest.object_id
        )));
    }
    let mut votes: BTreeMap<&str, &PlaintextBallotSelection> = BTreeMap::new();
    for selection in &contest.ballot_selections {
        if !description
            .description
            .ballot_selections
            .iter()
            .any(|s| s.object_id == selection.object_id)
        {
            return Err(Error::BallotStyleMismatch(format!(
                "contest {contest_id} has no selection {}",
                selection.object_id
            )));
        }
        if votes.insert(&selection.object_id, selection).is_some() {
            return Err(Error::InvalidBallot(format!(
                "selection {} appears twice",
                selection.object_id
            )));
        }
        if selection.vote > 1 {
            return Err(Error::InvalidBallot(format!(
                "selection {} has a vote of {}",
                selection.object_id, selection.vote
            )));
        }
    }
    let votes_allowed = description.description.votes_allowed;
    let selected = contest.votes();
    if selected > votes_allowed {
        return Err(Error::InvalidBallot(format!(
            "contest {contest_id} overvoted: {selected} votes, {votes_allowed} allowed"
        )));
    }

    let description_hash = description.crypto_hash();
    let nonces = Nonces::new(&hash_elems(&[&description_hash, nonce_seed]), "ballot-contest");
    let (contest_nonce, proof_seed) = (nonces.get(0), nonces.get(1));

    let mut ballot_selections = Vec::with_capacity(
        description.description.ballot_selections.len() + description.placeholder_selections.len(),
    );
    for selection_description in &description.description.ballot_selections {
        let plaintext = match votes.get(selection_description.object_id.as_str()) {
            Some(selection) => (*selection).clone(),
            None => selection_from(selection_description, false, false),
        };
        ballot_selections.push(encrypt_selection(
            &plaintext,
            selection_description,
            elgamal_public_key,
            extended_base_hash,
            &contest_nonce,
            false,
            should_verify_proofs,
        )?);
    }
    for (i, placeholder) in description.placeholder_selections.iter().enumerate() {
        let plaintext = selection_from(placeholder, true, (i as u64) < votes_allowed - selected);
        ballot_selections.push(encrypt_selection(
            &plaintext,
            placeholder,
            elgamal_public_key,
            extended_base_hash,
            &contest_nonce,
            true,
            should_verify_proofs,
        )?);
    }

    let aggregate = elgamal_add(ballot_selections.iter().map(|s| &s.ciphertext));
    let aggregate_nonce = ballot_selections
        .iter()
        .filter_map(|s| s.nonce)
        .fold(ZERO_MOD_Q, |acc, nonce| add_q(&acc, &nonce));
    let proof = ConstantChaumPedersenProof::make(
        &aggregate,
        &aggregate_nonce,
        elgamal_public_key,
        &proof_seed,
        extended_base_hash,
        votes_allowed,
    );
    let encrypted = CiphertextBallotContest {
        object_id: contest_id.to_string(),
        crypto_hash: CiphertextBallotContest::compute_crypto_hash(
            contest_id,
            &description_hash,
            &ballot_selections,
        ),
        description_hash,
        ballot_selections,
        nonce: Some(contest_nonce),
        proof,
    };
    if should_verify_proofs
        && !encrypted.is_valid_encryption(&description_hash, elgamal_public_key, extended_base_hash)
    {
        return Err(Error::InvalidProof(format!(
            "contest {contest_id} failed verification after encryption"
        )));
    }
    return Ok(encrypted);
}

/// Encrypt a ballot for its style. Contests of the style the voter skipped are encrypted blank.
/// `nonce_seed` reproduces an earlier encryption; without one a fresh seed is drawn from `rng`.
pub fn encrypt_ballot<R: CryptoRng + RngCore>(
    ballot: &PlaintextBallot,
    internal: &InternalElectionDescription,
    context: &CiphertextElectionContext,
    nonce_seed: Option<ElementModQ>,
    should_verify_proofs: bool,
    rng: &mut R,
) -> Result<CiphertextBallot> {
    let style_contests = internal.get_contests_for(&ballot.ballot_style)?;
    let style_ids: BTreeSet<&str> = style_contests.iter().map(|c| c.get_object_id()).collect();
    let mut plaintext_contests: BTreeMap<&str, &PlaintextBallotContest> = BTreeMap::new();
    for contest in &ballot.contests {
        if !style_ids.contains(contest.object_id.as_str()) {
            return Err(Error::BallotStyleMismatch(format!(
                "ballot style {} has no contest {}",
                ballot.ballot_style, contest.object_id
            )));
        }
        if plaintext_contests
            .insert(&contest.object_id, contest)
            .is_some()
        {
            return Err(Error::InvalidBallot(format!(
                "contest {} appears twice",
                contest.object_id
            )));
        }
    }

    let seed = nonce_seed.unwrap_or_else(|| rand_q(rng));
    let ballot_nonce_seed = hash_elems(&[&internal.description_hash, &ballot.object_id, &seed]);
    let mut contests = Vec::with_capacity(style_contests.len());
    for description in style_contests {
        let blank;
        let plaintext = match plaintext_contests.get(description.get_object_id()) {
            Some(contest) => *contest,
            None => {
                blank = contest_from(description);
                &blank
            }
        };
        contests.push(encrypt_contest(
            plaintext,
            description,
            &context.elgamal_public_key,
            &context.crypto_extended_base_hash,
            &ballot_nonce_seed,
            should_verify_proofs,
        )?);
    }

    let encrypted = CiphertextBallot {
        object_id: ballot.object_id.clone(),
        ballot_style: ballot.ballot_style.clone(),
        description_hash: internal.description_hash,
        crypto_hash: CiphertextBallot::compute_crypto_hash(
            &ballot.object_id,
            &internal.description_hash,
            &contests,
        ),
        contests,
        nonce: Some(seed),
    };
    if should_verify_proofs
        && !encrypted.is_valid_encryption(
            &internal.description_hash,
            &context.elgamal_public_key,
            &context.crypto_extended_base_hash,
        )
    {
        return Err(Error::InvalidProof(format!(
            "ballot {} failed verification after encryption",
            ballot.object_id
        )));
    }
    debug!(ballot = %ballot.object_id, "ballot encrypted");
    return Ok(encrypted);
}

/// Encrypts ballots for one election
#[derive(Debug, Clone, Copy)]
pub struct EncryptionMediator<'a> {
    internal: &'a InternalElectionDescription,
    context: &'a CiphertextElectionContext,
    should_verify_proofs: bool,
}

impl<'a> EncryptionMediator<'a> {
    pub fn new(
        internal: &'a InternalElectionDescription,
        context: &'a CiphertextElectionContext,
    ) -> Self {
        return Self {
            internal,
            context,
            should_verify_proofs: true,
        };
    }

    /// Skip re-verifying each proof right after it is produced
    pub fn without_verification(mut self) -> Self {
        self.should_verify_proofs = false;
        return self;
    }

    pub fn encrypt<R: CryptoRng + RngCore>(
        &self,
        ballot: &PlaintextBallot,
        rng: &mut R,
    ) -> Result<CiphertextBallot> {
        return encrypt_ballot(
            ballot,
            self.internal,
            self.context,
            None,
            self.should_verify_proofs,
            rng,
        );
    }
}
