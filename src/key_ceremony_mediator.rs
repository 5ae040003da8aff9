//! Runs the key ceremony between a fixed set of guardians
//!
//! The mediator is a relay and a record keeper. It never holds a secret: it collects public
//! keys, hands out backups to the guardians they are addressed to, and keeps the outcome of
//! every backup check. Pairs are keyed by `(owner sequence order, designated sequence order)`.
use crate::{
    decryption::PlaintextTally,
    error::{Error, Result},
    group::ElementModP,
    guardian::{Guardian, GuardianState},
    key_ceremony::{
        combine_election_public_keys, verify_election_partial_key_challenge, AuxiliaryKeyPair,
        AuxiliaryPublicKey, BackupFailure, BackupRetention, CeremonyDetails,
        CoefficientValidationSet, ElectionPartialKeyBackup, ElectionPartialKeyVerification,
        ElectionPublicKey,
    },
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

type GuardianPair = (u64, u64);

const MEDIATOR_ID: &str = "key-ceremony-mediator";

#[derive(Debug, Clone)]
pub struct KeyCeremonyMediator {
    ceremony_details: CeremonyDetails,
    retention: BackupRetention,
    guardian_ids: BTreeMap<u64, String>,
    auxiliary_public_keys: BTreeMap<u64, AuxiliaryPublicKey>,
    election_public_keys: BTreeMap<u64, ElectionPublicKey>,
    coefficient_validation_sets: BTreeMap<u64, CoefficientValidationSet>,
    backups: BTreeMap<GuardianPair, ElectionPartialKeyBackup>,
    verifications: BTreeMap<GuardianPair, ElectionPartialKeyVerification>,
    joint_public_key: Option<ElementModP>,
}

impl KeyCeremonyMediator {
    pub fn new(ceremony_details: CeremonyDetails) -> Self {
        return Self {
            ceremony_details,
            retention: BackupRetention::default(),
            guardian_ids: BTreeMap::new(),
            auxiliary_public_keys: BTreeMap::new(),
            election_public_keys: BTreeMap::new(),
            coefficient_validation_sets: BTreeMap::new(),
            backups: BTreeMap::new(),
            verifications: BTreeMap::new(),
            joint_public_key: None,
        };
    }

    pub fn with_retention(mut self, retention: BackupRetention) -> Self {
        self.retention = retention;
        return self;
    }

    pub fn get_ceremony_details(&self) -> &CeremonyDetails {
        return &self.ceremony_details;
    }

    pub fn get_retention(&self) -> BackupRetention {
        return self.retention;
    }

    pub fn get_joint_public_key(&self) -> Option<&ElementModP> {
        return self.joint_public_key.as_ref();
    }

    /// Register a guardian and its public keys. Every guardian must be announced before any
    /// backup is exchanged.
    pub fn announce(&mut self, guardian: &mut Guardian) -> Result<()> {
        let sequence_order = guardian.get_sequence_order();
        let object_id = guardian.get_object_id().to_string();
        if *guardian.get_ceremony_details() != self.ceremony_details {
            return Err(Error::InvalidConfiguration(format!(
                "{object_id} was set up for a different ceremony"
            )));
        }
        if self.guardian_ids.contains_key(&sequence_order)
            || self.guardian_ids.values().any(|id| *id == object_id)
        {
            return Err(Error::DuplicateGuardian(format!(
                "{object_id} (sequence order {sequence_order}) clashes with an announced guardian"
            )));
        }
        if self.guardian_ids.len() == self.ceremony_details.get_number_of_guardians() {
            return Err(Error::InvalidConfiguration(format!(
                "{object_id}: all {} guardians are already announced",
                self.ceremony_details.get_number_of_guardians()
            )));
        }
        let election_public_key = guardian.share_election_public_key();
        if !election_public_key.is_valid() {
            return Err(Error::InvalidProof(format!(
                "election public key of {object_id} has an invalid proof"
            )));
        }
        let validation_set = guardian.share_coefficient_validation_set();
        if !validation_set.is_valid() {
            return Err(Error::InvalidProof(format!(
                "coefficient commitments of {object_id} do not check out"
            )));
        }
        self.guardian_ids.insert(sequence_order, object_id.clone());
        self.auxiliary_public_keys
            .insert(sequence_order, guardian.share_auxiliary_public_key());
        self.election_public_keys
            .insert(sequence_order, election_public_key);
        self.coefficient_validation_sets
            .insert(sequence_order, validation_set);
        guardian.advance(GuardianState::Announced);
        info!(guardian = %object_id, sequence_order, "guardian announced");
        return Ok(());
    }

    pub fn all_guardians_announced(&self) -> bool {
        return self.guardian_ids.len() == self.ceremony_details.get_number_of_guardians();
    }

    fn ensure_all_announced(&self) -> Result<()> {
        if !self.all_guardians_announced() {
            return Err(Error::IncompleteCeremony(format!(
                "{} of {} guardians announced",
                self.guardian_ids.len(),
                self.ceremony_details.get_number_of_guardians()
            )));
        }
        return Ok(());
    }

    /// The announced guardian with this sequence order, taken from `guardians`
    fn lookup<'g>(
        &self,
        guardians: &'g mut [Guardian],
        sequence_order: u64,
    ) -> Result<&'g mut Guardian> {
        let expected = self.guardian_ids.get(&sequence_order).ok_or_else(|| {
            Error::UnknownGuardian(format!("sequence order {sequence_order} was not announced"))
        })?;
        return guardians
            .iter_mut()
            .find(|g| g.get_sequence_order() == sequence_order && g.get_object_id() == expected)
            .ok_or_else(|| Error::UnknownGuardian(format!("{expected} is not in the ceremony")));
    }

    /// Hand every guardian the public keys of every other guardian
    pub fn share_public_keys(&self, guardians: &mut [Guardian]) -> Result<()> {
        self.ensure_all_announced()?;
        for sequence_order in self.guardian_ids.keys() {
            let guardian = self.lookup(guardians, *sequence_order)?;
            for (aux, key) in self
                .auxiliary_public_keys
                .values()
                .zip(self.election_public_keys.values())
            {
                guardian.save_auxiliary_public_key(aux.clone())?;
                guardian.save_election_public_key(key.clone())?;
            }
        }
        return Ok(());
    }

    /// Exchange public keys, then have every guardian make a backup for every other guardian and
    /// deliver each backup to its designated guardian
    pub fn orchestrate<E>(&mut self, guardians: &mut [Guardian], encrypt: E) -> Result<()>
    where
        E: Fn(&[u8], &AuxiliaryPublicKey) -> Result<Vec<u8>>,
    {
        self.share_public_keys(guardians)?;
        let orders: Vec<u64> = self.guardian_ids.keys().copied().collect();
        for owner in &orders {
            let guardian = self.lookup(guardians, *owner)?;
            guardian.generate_election_partial_key_backups(&encrypt)?;
            for designated in orders.iter().filter(|order| *order != owner) {
                let backup = guardian
                    .share_election_partial_key_backup(*designated)
                    .ok_or_else(|| {
                        Error::IncompleteCeremony(format!(
                            "{} made no backup for sequence order {designated}",
                            guardian.get_object_id()
                        ))
                    })?;
                self.backups.insert((*owner, *designated), backup.clone());
            }
        }
        for ((_, designated), backup) in &self.backups {
            let guardian = self.lookup(guardians, *designated)?;
            guardian.save_election_partial_key_backup(backup.clone())?;
        }
        info!(backups = self.backups.len(), "partial key backups exchanged");
        return Ok(());
    }

    /// Have every guardian check the backups it received, and check every backup's commitments
    /// against its owner's announced validation set. Returns whether every backup passed.
    pub fn verify<D>(&mut self, guardians: &mut [Guardian], decrypt: D) -> Result<bool>
    where
        D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
    {
        let pairs: Vec<GuardianPair> = self.backups.keys().copied().collect();
        for (owner, designated) in pairs {
            let guardian = self.lookup(guardians, designated)?;
            let mut verification = guardian.verify_election_partial_key_backup(owner, &decrypt)?;
            let announced = self
                .backups
                .get(&(owner, designated))
                .map_or(false, |backup| {
                    self.matches_announced(owner, &backup.coefficient_commitments)
                });
            if verification.verified && !announced {
                warn!(owner, designated, "backup commitments differ from the announced ones");
                verification = verification.fail(BackupFailure::UnannouncedCommitments);
            }
            self.receive_backup_verification(owner, designated, verification);
        }
        let verified = self.all_backups_verified();
        if !verified {
            warn!(failed = self.failed_verifications().len(), "backup verification failed");
        }
        return Ok(verified);
    }

    fn matches_announced(&self, owner: u64, commitments: &[ElementModP]) -> bool {
        return self
            .coefficient_validation_sets
            .get(&owner)
            .map_or(false, |set| set.coefficient_commitments == commitments);
    }

    fn receive_backup_verification(
        &mut self,
        owner: u64,
        designated: u64,
        verification: ElectionPartialKeyVerification,
    ) {
        debug!(owner, designated, verified = verification.verified, "verification received");
        self.verifications.insert((owner, designated), verification);
    }

    /// Every expected backup exists and was verified
    pub fn all_backups_verified(&self) -> bool {
        let n = self.ceremony_details.get_number_of_guardians();
        let expected = n * (n - 1);
        return self.all_guardians_announced()
            && self.verifications.len() == expected
            && self.verifications.values().all(|v| v.verified);
    }

    pub fn failed_verifications(&self) -> Vec<&ElectionPartialKeyVerification> {
        return self.verifications.values().filter(|v| !v.verified).collect();
    }

    /// Resolve a rejected backup: its owner reveals the value, the mediator checks it against the
    /// owner's announced commitments and records the outcome in place of the original
    /// verification. On success the designated guardian takes the revealed value in place of the
    /// backup it could not use.
    pub fn challenge(
        &mut self,
        guardians: &mut [Guardian],
        owner: u64,
        designated: u64,
    ) -> Result<ElectionPartialKeyVerification> {
        let challenge = self
            .lookup(guardians, owner)?
            .publish_election_backup_challenge(designated)?;
        let mut verification = verify_election_partial_key_challenge(MEDIATOR_ID, &challenge);
        if verification.verified
            && !self.matches_announced(owner, &challenge.coefficient_commitments)
        {
            verification = verification.fail(BackupFailure::UnannouncedCommitments);
        }
        if verification.verified {
            let accepted = self
                .lookup(guardians, designated)?
                .save_election_backup_challenge(&challenge)?;
            if !accepted.verified {
                verification = accepted;
            }
        }
        if !verification.verified {
            warn!(owner, designated, "backup challenge failed");
        }
        self.receive_backup_verification(owner, designated, verification.clone());
        return Ok(verification);
    }

    /// Combine the public key shares into the joint key and hand it to every guardian. Requires
    /// every guardian announced and every backup verified.
    pub fn publish_joint_key(&mut self, guardians: &mut [Guardian]) -> Result<ElementModP> {
        self.ensure_all_announced()?;
        if !self.all_backups_verified() {
            return Err(Error::IncompleteCeremony(format!(
                "{} backups failed verification, {} recorded",
                self.failed_verifications().len(),
                self.verifications.len()
            )));
        }
        let joint_public_key = combine_election_public_keys(self.election_public_keys.values());
        for sequence_order in self.guardian_ids.keys() {
            self.lookup(guardians, *sequence_order)?
                .save_joint_key(joint_public_key)?;
        }
        self.joint_public_key = Some(joint_public_key);
        info!("joint public key published");
        return Ok(joint_public_key);
    }

    /// What the decryption mediator needs to check compensated shares
    pub fn share_coefficient_validation_sets(&self) -> Vec<CoefficientValidationSet> {
        return self.coefficient_validation_sets.values().cloned().collect();
    }

    pub fn share_election_public_keys(&self) -> Vec<ElectionPublicKey> {
        return self.election_public_keys.values().cloned().collect();
    }

    /// Apply the configured retention policy after a tally was decrypted, to the mediator's copy
    /// of the backup matrix and to every guardian
    pub fn apply_retention_policy(&mut self, guardians: &mut [Guardian], tally: &PlaintextTally) {
        if self.retention == BackupRetention::DiscardAfterDirectDecryption && tally.is_direct() {
            self.backups.clear();
            info!("backup matrix discarded");
        }
        for guardian in guardians.iter_mut() {
            guardian.apply_retention_policy(self.retention, tally);
        }
    }

    pub fn get_backup_count(&self) -> usize {
        return self.backups.len();
    }
}
