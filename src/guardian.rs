//! A guardian: one holder of a share of the election secret
//!
//! The guardian owns its polynomial, its auxiliary key pair and the backups other guardians
//! sent it. None of these leave the struct in the clear; the mediators only ever see public
//! keys, commitments, encrypted backups and proven decryption shares.
use crate::{
    ballot::CiphertextBallot,
    decryption::{
        CiphertextDecryptionSelection, CompensatedTallyDecryptionShare, PlaintextTally,
        SelectionShares, TallyDecryptionShare,
    },
    elgamal::ElGamalCiphertext,
    election::CiphertextElectionContext,
    error::{Error, Result},
    group::{rand_q, ElementModP, ElementModQ},
    key_ceremony::{
        decrypt_backup_value, generate_election_key_pair, generate_election_partial_key_backup,
        generate_election_partial_key_challenge, verify_election_partial_key_backup,
        verify_election_partial_key_challenge, AuxiliaryKeyPair, AuxiliaryPublicKey, BackupFailure,
        BackupRetention, CeremonyDetails,
        CoefficientValidationSet, ElectionKeyPair, ElectionPartialKeyBackup,
        ElectionPartialKeyChallenge, ElectionPartialKeyVerification, ElectionPublicKey,
    },
    polynomial::compute_commitment_product,
    proofs::ChaumPedersenProof,
    tally::CiphertextTally,
};
use rand::{CryptoRng, RngCore};
use std::collections::{btree_map::Entry, BTreeMap};
use tracing::{debug, info, warn};

/// Where a guardian is in the protocol. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GuardianState {
    Created,
    /// Registered with the key ceremony mediator
    Announced,
    /// Holds a backup from every other guardian
    BackupsExchanged,
    /// Every backup verified and the joint key is known
    KeyCeremonyComplete,
    PartialDecryptionProvided,
    /// Will not take part in decryption; others compensate for it
    Removed,
}

pub struct Guardian {
    object_id: String,
    sequence_order: u64,
    ceremony_details: CeremonyDetails,
    state: GuardianState,
    auxiliary_keys: AuxiliaryKeyPair,
    election_keys: ElectionKeyPair,
    /// Peer data, keyed by the peer's sequence order; includes this guardian's own
    auxiliary_public_keys: BTreeMap<u64, AuxiliaryPublicKey>,
    election_public_keys: BTreeMap<u64, ElectionPublicKey>,
    /// Backups this guardian made for others, keyed by the recipient
    backups_to_share: BTreeMap<u64, ElectionPartialKeyBackup>,
    /// Backups received from others, keyed by their owner
    received_backups: BTreeMap<u64, ElectionPartialKeyBackup>,
    backup_verifications: BTreeMap<u64, ElectionPartialKeyVerification>,
    /// Coordinates revealed by settled challenges; they take the place of the received backup
    challenged_values: BTreeMap<u64, ElementModQ>,
    joint_public_key: Option<ElementModP>,
}

impl std::fmt::Debug for Guardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("Guardian")
            .field("object_id", &self.object_id)
            .field("sequence_order", &self.sequence_order)
            .field("state", &self.state)
            .finish_non_exhaustive();
    }
}

impl Guardian {
    /// Create a guardian and draw its polynomial. Sequence orders start at one: the polynomial
    /// evaluated at zero is the guardian's secret.
    pub fn new<R: CryptoRng + RngCore>(
        object_id: &str,
        sequence_order: u64,
        ceremony_details: CeremonyDetails,
        auxiliary_keys: AuxiliaryKeyPair,
        rng: &mut R,
    ) -> Result<Self> {
        if sequence_order == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "guardian {object_id}: sequence order must be at least 1"
            )));
        }
        let election_keys = generate_election_key_pair(ceremony_details.get_quorum(), rng)?;
        let mut guardian = Self {
            object_id: object_id.to_string(),
            sequence_order,
            ceremony_details,
            state: GuardianState::Created,
            auxiliary_keys,
            election_keys,
            auxiliary_public_keys: BTreeMap::new(),
            election_public_keys: BTreeMap::new(),
            backups_to_share: BTreeMap::new(),
            received_backups: BTreeMap::new(),
            backup_verifications: BTreeMap::new(),
            challenged_values: BTreeMap::new(),
            joint_public_key: None,
        };
        let auxiliary_public_key = guardian.share_auxiliary_public_key();
        let election_public_key = guardian.share_election_public_key();
        guardian
            .auxiliary_public_keys
            .insert(sequence_order, auxiliary_public_key);
        guardian
            .election_public_keys
            .insert(sequence_order, election_public_key);
        debug!(guardian = object_id, sequence_order, "guardian created");
        return Ok(guardian);
    }

    pub fn get_object_id(&self) -> &str {
        return &self.object_id;
    }

    pub fn get_sequence_order(&self) -> u64 {
        return self.sequence_order;
    }

    pub fn get_state(&self) -> GuardianState {
        return self.state;
    }

    pub fn get_ceremony_details(&self) -> &CeremonyDetails {
        return &self.ceremony_details;
    }

    pub fn get_joint_public_key(&self) -> Option<&ElementModP> {
        return self.joint_public_key.as_ref();
    }

    /// Move forward to `state`; never backwards
    pub(crate) fn advance(&mut self, state: GuardianState) {
        if state > self.state {
            self.state = state;
        }
    }

    /// Draw a fresh polynomial. Only allowed before any backup has been handed out.
    pub fn generate_election_key_pair<R: CryptoRng + RngCore>(
        &mut self,
        rng: &mut R,
    ) -> Result<()> {
        if !self.backups_to_share.is_empty() || self.state > GuardianState::Announced {
            return Err(Error::InvalidConfiguration(format!(
                "guardian {} already shared its polynomial",
                self.object_id
            )));
        }
        self.election_keys = generate_election_key_pair(self.ceremony_details.get_quorum(), rng)?;
        let election_public_key = self.share_election_public_key();
        self.election_public_keys
            .insert(self.sequence_order, election_public_key);
        return Ok(());
    }

    pub fn share_auxiliary_public_key(&self) -> AuxiliaryPublicKey {
        return AuxiliaryPublicKey {
            owner_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            key: self.auxiliary_keys.get_public_key().to_vec(),
        };
    }

    /// The public key share `G^{a_0}` with its proof
    pub fn share_election_public_key(&self) -> ElectionPublicKey {
        return ElectionPublicKey {
            owner_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            proof: self.election_keys.get_proof().clone(),
            key: *self.election_keys.get_public_key(),
        };
    }

    pub fn share_coefficient_validation_set(&self) -> CoefficientValidationSet {
        let polynomial = self.election_keys.get_polynomial();
        return CoefficientValidationSet {
            owner_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            coefficient_commitments: polynomial.get_coefficient_commitments().to_vec(),
            coefficient_proofs: polynomial.get_coefficient_proofs().to_vec(),
        };
    }

    /// Rejects a second, different guardian under an existing sequence order
    fn check_peer(&self, owner_id: &str, sequence_order: u64) -> Result<()> {
        let known = self
            .auxiliary_public_keys
            .get(&sequence_order)
            .map(|key| key.owner_id.as_str())
            .or_else(|| {
                self.election_public_keys
                    .get(&sequence_order)
                    .map(|key| key.owner_id.as_str())
            });
        if let Some(known) = known {
            if known != owner_id {
                return Err(Error::DuplicateGuardian(format!(
                    "sequence order {sequence_order} belongs to {known}, not {owner_id}"
                )));
            }
        }
        return Ok(());
    }

    pub fn save_auxiliary_public_key(&mut self, key: AuxiliaryPublicKey) -> Result<()> {
        self.check_peer(&key.owner_id, key.sequence_order)?;
        self.auxiliary_public_keys.insert(key.sequence_order, key);
        return Ok(());
    }

    /// Store a peer's public key share after checking its proof
    pub fn save_election_public_key(&mut self, key: ElectionPublicKey) -> Result<()> {
        self.check_peer(&key.owner_id, key.sequence_order)?;
        if !key.is_valid() {
            return Err(Error::InvalidProof(format!(
                "election public key of {} has an invalid proof",
                key.owner_id
            )));
        }
        self.election_public_keys.insert(key.sequence_order, key);
        return Ok(());
    }

    pub fn all_auxiliary_public_keys_received(&self) -> bool {
        return self.auxiliary_public_keys.len() == self.ceremony_details.get_number_of_guardians();
    }

    pub fn all_election_public_keys_received(&self) -> bool {
        return self.election_public_keys.len() == self.ceremony_details.get_number_of_guardians();
    }

    /// Make the backup for the guardian with the given sequence order
    pub fn generate_election_partial_key_backup<E>(
        &mut self,
        designated_sequence_order: u64,
        encrypt: E,
    ) -> Result<&ElectionPartialKeyBackup>
    where
        E: Fn(&[u8], &AuxiliaryPublicKey) -> Result<Vec<u8>>,
    {
        let designated = self
            .auxiliary_public_keys
            .get(&designated_sequence_order)
            .ok_or_else(|| {
                Error::UnknownGuardian(format!(
                    "no auxiliary key for sequence order {designated_sequence_order}"
                ))
            })?;
        let backup = generate_election_partial_key_backup(
            &self.object_id,
            self.sequence_order,
            self.election_keys.get_polynomial(),
            designated,
            encrypt,
        )?;
        return Ok(match self.backups_to_share.entry(designated_sequence_order) {
            Entry::Occupied(mut entry) => {
                entry.insert(backup);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(backup),
        });
    }

    /// Make a backup for every other guardian whose auxiliary key is known
    pub fn generate_election_partial_key_backups<E>(&mut self, encrypt: E) -> Result<()>
    where
        E: Fn(&[u8], &AuxiliaryPublicKey) -> Result<Vec<u8>>,
    {
        let others: Vec<u64> = self
            .auxiliary_public_keys
            .keys()
            .copied()
            .filter(|order| *order != self.sequence_order)
            .collect();
        for designated_sequence_order in others {
            self.generate_election_partial_key_backup(designated_sequence_order, &encrypt)?;
        }
        debug!(
            guardian = %self.object_id,
            count = self.backups_to_share.len(),
            "backups generated"
        );
        return Ok(());
    }

    pub fn share_election_partial_key_backup(
        &self,
        designated_sequence_order: u64,
    ) -> Option<&ElectionPartialKeyBackup> {
        return self.backups_to_share.get(&designated_sequence_order);
    }

    /// Store a backup addressed to this guardian
    pub fn save_election_partial_key_backup(
        &mut self,
        backup: ElectionPartialKeyBackup,
    ) -> Result<()> {
        if backup.designated_sequence_order != self.sequence_order
            || backup.designated_id != self.object_id
        {
            return Err(Error::UnknownGuardian(format!(
                "backup from {} is addressed to {}, not {}",
                backup.owner_id, backup.designated_id, self.object_id
            )));
        }
        self.check_peer(&backup.owner_id, backup.owner_sequence_order)?;
        self.received_backups
            .insert(backup.owner_sequence_order, backup);
        if self.all_election_partial_key_backups_received() {
            self.advance(GuardianState::BackupsExchanged);
        }
        return Ok(());
    }

    pub fn all_election_partial_key_backups_received(&self) -> bool {
        return self.received_backups.len() + 1 == self.ceremony_details.get_number_of_guardians();
    }

    /// Check the backup received from `owner_sequence_order` against the commitments it carries
    /// and against the public key its owner announced. The outcome is recorded and returned; a
    /// failed check is not an error. A backup settled by a challenge keeps its settled outcome.
    pub fn verify_election_partial_key_backup<D>(
        &mut self,
        owner_sequence_order: u64,
        decrypt: D,
    ) -> Result<ElectionPartialKeyVerification>
    where
        D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
    {
        let backup = self
            .received_backups
            .get(&owner_sequence_order)
            .ok_or_else(|| {
                Error::UnknownGuardian(format!(
                    "{} holds no backup from sequence order {owner_sequence_order}",
                    self.object_id
                ))
            })?;
        if self.challenged_values.contains_key(&owner_sequence_order) {
            if let Some(settled) = self.backup_verifications.get(&owner_sequence_order) {
                return Ok(settled.clone());
            }
        }
        let mut verification = verify_election_partial_key_backup(
            &self.object_id,
            backup,
            &self.auxiliary_keys,
            decrypt,
        );
        if verification.verified
            && !self.matches_announced_key(owner_sequence_order, &backup.coefficient_commitments)
        {
            warn!(
                owner = %backup.owner_id,
                designated = %self.object_id,
                "backup commitments do not match the announced public key"
            );
            verification = verification.fail(BackupFailure::UnannouncedCommitments);
        }
        self.backup_verifications
            .insert(owner_sequence_order, verification.clone());
        return Ok(verification);
    }

    pub fn all_election_partial_key_backups_verified(&self) -> bool {
        return self.all_election_partial_key_backups_received()
            && self
                .received_backups
                .keys()
                .all(|order| matches!(self.backup_verifications.get(order), Some(v) if v.verified));
    }

    /// Answer a rejected backup by revealing its value
    pub fn publish_election_backup_challenge(
        &self,
        designated_sequence_order: u64,
    ) -> Result<ElectionPartialKeyChallenge> {
        let backup = self
            .backups_to_share
            .get(&designated_sequence_order)
            .ok_or_else(|| {
                Error::UnknownGuardian(format!(
                    "{} made no backup for sequence order {designated_sequence_order}",
                    self.object_id
                ))
            })?;
        return Ok(generate_election_partial_key_challenge(
            backup,
            self.election_keys.get_polynomial(),
        ));
    }

    /// The first commitment is the public key share the owner announced
    fn matches_announced_key(
        &self,
        owner_sequence_order: u64,
        commitments: &[ElementModP],
    ) -> bool {
        return match (
            self.election_public_keys.get(&owner_sequence_order),
            commitments.first(),
        ) {
            (Some(announced), Some(first)) => announced.key == *first,
            _ => false,
        };
    }

    /// Check a challenge answering a backup this guardian rejected. If it holds, the revealed
    /// coordinate replaces the received backup from then on.
    pub fn save_election_backup_challenge(
        &mut self,
        challenge: &ElectionPartialKeyChallenge,
    ) -> Result<ElectionPartialKeyVerification> {
        if challenge.designated_sequence_order != self.sequence_order
            || challenge.designated_id != self.object_id
        {
            return Err(Error::UnknownGuardian(format!(
                "challenge from {} is addressed to {}, not {}",
                challenge.owner_id, challenge.designated_id, self.object_id
            )));
        }
        let owner_sequence_order = challenge.owner_sequence_order;
        match self.received_backups.get(&owner_sequence_order) {
            Some(backup) if backup.owner_id == challenge.owner_id => {}
            _ => {
                return Err(Error::UnknownGuardian(format!(
                    "{} holds no backup from {}",
                    self.object_id, challenge.owner_id
                )))
            }
        }
        let mut verification = verify_election_partial_key_challenge(&self.object_id, challenge);
        if verification.verified
            && !self.matches_announced_key(owner_sequence_order, &challenge.coefficient_commitments)
        {
            verification = verification.fail(BackupFailure::UnannouncedCommitments);
        }
        if verification.verified {
            self.challenged_values
                .insert(owner_sequence_order, challenge.value);
            info!(
                owner = %challenge.owner_id,
                designated = %self.object_id,
                "backup challenge accepted"
            );
        }
        self.backup_verifications
            .insert(owner_sequence_order, verification.clone());
        return Ok(verification);
    }

    /// Record the joint key. The ceremony must have gone through from this guardian's side:
    /// every public key share received and every backup verified.
    pub fn save_joint_key(&mut self, joint_public_key: ElementModP) -> Result<()> {
        if !self.all_election_public_keys_received() {
            return Err(Error::IncompleteCeremony(format!(
                "{} is missing election public keys",
                self.object_id
            )));
        }
        if !self.all_election_partial_key_backups_verified() {
            return Err(Error::IncompleteCeremony(format!(
                "{} has unverified backups",
                self.object_id
            )));
        }
        self.joint_public_key = Some(joint_public_key);
        self.advance(GuardianState::KeyCeremonyComplete);
        info!(guardian = %self.object_id, "key ceremony complete");
        return Ok(());
    }

    /// Mark the guardian as absent from decryption
    pub fn remove(&mut self) {
        self.advance(GuardianState::Removed);
        warn!(guardian = %self.object_id, "guardian removed");
    }

    fn ensure_can_decrypt(&self) -> Result<()> {
        if self.state < GuardianState::KeyCeremonyComplete {
            return Err(Error::IncompleteCeremony(format!(
                "{} has not completed the key ceremony",
                self.object_id
            )));
        }
        if self.state == GuardianState::Removed {
            return Err(Error::UnknownGuardian(format!(
                "{} has been removed",
                self.object_id
            )));
        }
        return Ok(());
    }

    /// `pad ^ a_0` with a proof that it matches the public key share
    pub fn compute_partial_decryption<R: CryptoRng + RngCore>(
        &self,
        ciphertext: &ElGamalCiphertext,
        context: &CiphertextElectionContext,
        rng: &mut R,
    ) -> Result<(ElementModP, ChaumPedersenProof)> {
        self.ensure_can_decrypt()?;
        let secret = self.election_keys.key_pair.get_secret_key();
        return Ok(prove_share(ciphertext, secret, context, rng));
    }

    /// `pad ^ f_m(own sequence order)` on behalf of the missing guardian `m`, using the backup
    /// `m` sent during the ceremony
    pub fn compute_compensated_partial_decryption<D, R>(
        &self,
        missing_guardian_id: &str,
        ciphertext: &ElGamalCiphertext,
        context: &CiphertextElectionContext,
        decrypt: D,
        rng: &mut R,
    ) -> Result<(ElementModP, ChaumPedersenProof)>
    where
        D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
        R: CryptoRng + RngCore,
    {
        self.ensure_can_decrypt()?;
        let value = self.recover_backup_value(missing_guardian_id, decrypt)?;
        return Ok(prove_share(ciphertext, &value, context, rng));
    }

    fn received_backup_from(&self, guardian_id: &str) -> Result<&ElectionPartialKeyBackup> {
        return self
            .received_backups
            .values()
            .find(|backup| backup.owner_id == guardian_id)
            .ok_or_else(|| {
                Error::UnknownGuardian(format!(
                    "{} holds no backup from {guardian_id}",
                    self.object_id
                ))
            });
    }

    fn recover_backup_value<D>(&self, missing_guardian_id: &str, decrypt: D) -> Result<ElementModQ>
    where
        D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
    {
        let backup = self.received_backup_from(missing_guardian_id)?;
        if let Some(value) = self.challenged_values.get(&backup.owner_sequence_order) {
            return Ok(*value);
        }
        return decrypt_backup_value(backup, &self.auxiliary_keys, decrypt)
            .map_err(|failure| Error::Auxiliary(format!("{failure:?}")));
    }

    /// This guardian's share of every tallied selection and of every spoiled ballot
    pub fn compute_decryption_share<R: CryptoRng + RngCore>(
        &mut self,
        tally: &CiphertextTally,
        rng: &mut R,
    ) -> Result<TallyDecryptionShare> {
        self.ensure_can_decrypt()?;
        let context = tally.get_context();
        let secret = *self.election_keys.key_pair.get_secret_key();
        let share = TallyDecryptionShare {
            guardian_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            public_key: *self.election_keys.get_public_key(),
            tally: tally_shares(tally, &secret, context, rng),
            spoiled_ballots: spoiled_ballot_shares(tally, &secret, context, rng),
        };
        self.advance(GuardianState::PartialDecryptionProvided);
        info!(guardian = %self.object_id, "decryption share computed");
        return Ok(share);
    }

    /// Fragments of the missing guardian's share for every tallied selection and spoiled ballot
    pub fn compute_compensated_decryption_share<D, R>(
        &self,
        missing_guardian_id: &str,
        tally: &CiphertextTally,
        decrypt: D,
        rng: &mut R,
    ) -> Result<CompensatedTallyDecryptionShare>
    where
        D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
        R: CryptoRng + RngCore,
    {
        self.ensure_can_decrypt()?;
        let context = tally.get_context();
        let backup = self.received_backup_from(missing_guardian_id)?;
        let value = self.recover_backup_value(missing_guardian_id, decrypt)?;
        let recovery_public_key =
            compute_commitment_product(self.sequence_order, &backup.coefficient_commitments);
        info!(
            guardian = %self.object_id,
            missing = missing_guardian_id,
            "compensated decryption share computed"
        );
        return Ok(CompensatedTallyDecryptionShare {
            guardian_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            missing_guardian_id: missing_guardian_id.to_string(),
            recovery_public_key,
            tally: tally_shares(tally, &value, context, rng),
            spoiled_ballots: spoiled_ballot_shares(tally, &value, context, rng),
        });
    }

    /// Drop received backups when the policy says so and the tally did not need them
    pub fn apply_retention_policy(&mut self, policy: BackupRetention, tally: &PlaintextTally) {
        if policy == BackupRetention::DiscardAfterDirectDecryption && tally.is_direct() {
            self.received_backups.clear();
            self.challenged_values.clear();
            info!(guardian = %self.object_id, "received backups discarded");
        }
    }

    pub fn get_received_backup_count(&self) -> usize {
        return self.received_backups.len();
    }
}

fn prove_share<R: CryptoRng + RngCore>(
    ciphertext: &ElGamalCiphertext,
    secret: &ElementModQ,
    context: &CiphertextElectionContext,
    rng: &mut R,
) -> (ElementModP, ChaumPedersenProof) {
    let share = ciphertext.partial_decrypt(secret);
    let proof = ChaumPedersenProof::make(
        ciphertext,
        secret,
        &share,
        &rand_q(rng),
        &context.crypto_extended_base_hash,
    );
    return (share, proof);
}

fn selection_share<R: CryptoRng + RngCore>(
    object_id: &str,
    ciphertext: &ElGamalCiphertext,
    secret: &ElementModQ,
    context: &CiphertextElectionContext,
    rng: &mut R,
) -> (String, CiphertextDecryptionSelection) {
    let (share, proof) = prove_share(ciphertext, secret, context, rng);
    let selection = CiphertextDecryptionSelection {
        object_id: object_id.to_string(),
        share,
        proof,
    };
    return (object_id.to_string(), selection);
}

fn tally_shares<R: CryptoRng + RngCore>(
    tally: &CiphertextTally,
    secret: &ElementModQ,
    context: &CiphertextElectionContext,
    rng: &mut R,
) -> SelectionShares {
    return tally
        .selections()
        .map(|s| selection_share(&s.object_id, &s.ciphertext, secret, context, rng))
        .collect();
}

fn ballot_shares<R: CryptoRng + RngCore>(
    ballot: &CiphertextBallot,
    secret: &ElementModQ,
    context: &CiphertextElectionContext,
    rng: &mut R,
) -> SelectionShares {
    return ballot
        .real_selections()
        .map(|(_, s)| selection_share(&s.object_id, &s.ciphertext, secret, context, rng))
        .collect();
}

fn spoiled_ballot_shares<R: CryptoRng + RngCore>(
    tally: &CiphertextTally,
    secret: &ElementModQ,
    context: &CiphertextElectionContext,
    rng: &mut R,
) -> BTreeMap<String, SelectionShares> {
    return tally
        .spoiled_ballots
        .iter()
        .map(|(ballot_id, accepted)| {
            (
                ballot_id.clone(),
                ballot_shares(&accepted.ballot, secret, context, rng),
            )
        })
        .collect();
}
