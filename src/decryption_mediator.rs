//! Collects decryption shares and turns the encrypted tally into counts
//!
//! Every share that reaches the mediator is checked before it is stored: direct shares against
//! the guardian's public key share, compensated fragments against the recovery key the mediator
//! computes itself from the missing guardian's coefficient commitments. A share that fails is
//! recorded as rejected and never used.
use crate::{
    ballot::CiphertextBallot,
    decryption::{
        reconstruct_missing_share, CiphertextDecryptionSelection, CompensatedTallyDecryptionShare,
        PlaintextTally, PlaintextTallyContest, PlaintextTallySelection, RejectedShare,
        SelectionShares, TallyDecryptionShare,
    },
    dlog::DiscreteLogTable,
    elgamal::ElGamalCiphertext,
    election::CiphertextElectionContext,
    error::{Error, Result},
    group::{g_pow_p, mult_all_p, ElementModP, ElementModQ},
    guardian::Guardian,
    key_ceremony::{AuxiliaryKeyPair, CoefficientValidationSet},
    polynomial::compute_commitment_product,
    proofs::ChaumPedersenProof,
    tally::CiphertextTally,
};
use rand::{CryptoRng, RngCore};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Ciphertexts that need a share, keyed by selection id
type Targets<'t> = BTreeMap<&'t str, &'t ElGamalCiphertext>;

pub struct DecryptionMediator<'a> {
    context: &'a CiphertextElectionContext,
    tally: &'a CiphertextTally<'a>,
    /// Keyed by guardian id
    validation_sets: BTreeMap<String, CoefficientValidationSet>,
    available: BTreeMap<String, TallyDecryptionShare>,
    /// Missing guardian id, then helper id
    compensated: BTreeMap<String, BTreeMap<String, CompensatedTallyDecryptionShare>>,
    rejected: Vec<RejectedShare>,
    dlog: DiscreteLogTable,
    plaintext_tally: Option<PlaintextTally>,
}

impl<'a> DecryptionMediator<'a> {
    /// Needs the coefficient commitments of every guardian of the ceremony
    pub fn new(
        context: &'a CiphertextElectionContext,
        tally: &'a CiphertextTally<'a>,
        validation_sets: impl IntoIterator<Item = CoefficientValidationSet>,
    ) -> Result<Self> {
        if tally.get_context() != context {
            return Err(Error::InvalidConfiguration(
                "the tally belongs to a different election".to_string(),
            ));
        }
        let mut sets = BTreeMap::new();
        let mut orders = BTreeSet::new();
        for set in validation_sets {
            if !set.is_valid() {
                return Err(Error::InvalidProof(format!(
                    "coefficient commitments of {} do not check out",
                    set.owner_id
                )));
            }
            if set.coefficient_commitments.len() != context.quorum {
                return Err(Error::InvalidConfiguration(format!(
                    "{} committed to {} coefficients, expected {}",
                    set.owner_id,
                    set.coefficient_commitments.len(),
                    context.quorum
                )));
            }
            if !orders.insert(set.sequence_order) || sets.contains_key(&set.owner_id) {
                return Err(Error::DuplicateGuardian(set.owner_id));
            }
            sets.insert(set.owner_id.clone(), set);
        }
        if sets.len() != context.number_of_guardians {
            return Err(Error::InvalidConfiguration(format!(
                "{} coefficient validation sets for {} guardians",
                sets.len(),
                context.number_of_guardians
            )));
        }
        return Ok(Self {
            context,
            tally,
            validation_sets: sets,
            available: BTreeMap::new(),
            compensated: BTreeMap::new(),
            rejected: Vec::new(),
            dlog: DiscreteLogTable::new(tally.count().max(1) as u64),
            plaintext_tally: None,
        });
    }

    /// Raise the largest count the mediator can decrypt. Defaults to the number of cast ballots.
    pub fn ensure_discrete_log_bound(&mut self, bound: u64) {
        self.dlog.ensure_bound(bound);
    }

    /// Have a present guardian compute its share and submit it
    pub fn announce<R: CryptoRng + RngCore>(
        &mut self,
        guardian: &mut Guardian,
        rng: &mut R,
    ) -> Result<()> {
        let share = guardian.compute_decryption_share(self.tally, rng)?;
        return self.submit_decryption_share(share);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.plaintext_tally.is_some() {
            return Err(Error::Decryption(
                "the tally has already been decrypted".to_string(),
            ));
        }
        return Ok(());
    }

    fn validation_set(
        &self,
        guardian_id: &str,
        sequence_order: u64,
    ) -> Result<&CoefficientValidationSet> {
        return self
            .validation_sets
            .get(guardian_id)
            .filter(|set| set.sequence_order == sequence_order)
            .ok_or_else(|| {
                Error::UnknownGuardian(format!(
                    "{guardian_id} (sequence order {sequence_order}) is not in this election"
                ))
            });
    }

    fn reject(
        &mut self,
        guardian_id: &str,
        missing_guardian_id: Option<&str>,
        reason: String,
    ) -> Error {
        warn!(
            guardian = guardian_id,
            missing = ?missing_guardian_id,
            reason = %reason,
            "decryption share rejected"
        );
        self.rejected.push(RejectedShare {
            guardian_id: guardian_id.to_string(),
            missing_guardian_id: missing_guardian_id.map(str::to_string),
            reason: reason.clone(),
        });
        return Error::InvalidProof(reason);
    }

    /// Check and store a guardian's direct share
    pub fn submit_decryption_share(&mut self, share: TallyDecryptionShare) -> Result<()> {
        self.ensure_open()?;
        let set = self.validation_set(&share.guardian_id, share.sequence_order)?;
        if self.available.contains_key(&share.guardian_id) {
            return Err(Error::DuplicateGuardian(format!(
                "{} already submitted a share",
                share.guardian_id
            )));
        }
        let checked = if set.coefficient_commitments.first() != Some(&share.public_key) {
            Err("public key does not match the guardian's commitments".to_string())
        } else {
            self.check_shares(&share.tally, &share.spoiled_ballots, &share.public_key)
        };
        if let Err(reason) = checked {
            return Err(self.reject(&share.guardian_id, None, reason));
        }
        info!(guardian = %share.guardian_id, "decryption share accepted");
        self.available.insert(share.guardian_id.clone(), share);
        return Ok(());
    }

    /// Guardians of the election that have not submitted a direct share
    pub fn missing_guardians(&self) -> Vec<&str> {
        return self
            .validation_sets
            .keys()
            .filter(|id| !self.available.contains_key(*id))
            .map(String::as_str)
            .collect();
    }

    pub fn get_available_guardians(&self) -> Vec<&str> {
        return self.available.keys().map(String::as_str).collect();
    }

    /// Have a present guardian compute fragments for a missing one and submit them
    pub fn compensate<D, R>(
        &mut self,
        missing_guardian_id: &str,
        guardian: &Guardian,
        decrypt: D,
        rng: &mut R,
    ) -> Result<()>
    where
        D: Fn(&[u8], &AuxiliaryKeyPair) -> Result<Vec<u8>>,
        R: CryptoRng + RngCore,
    {
        let share = guardian.compute_compensated_decryption_share(
            missing_guardian_id,
            self.tally,
            decrypt,
            rng,
        )?;
        return self.submit_compensated_decryption_share(share);
    }

    /// Check and store fragments made on behalf of a missing guardian
    pub fn submit_compensated_decryption_share(
        &mut self,
        share: CompensatedTallyDecryptionShare,
    ) -> Result<()> {
        self.ensure_open()?;
        self.validation_set(&share.guardian_id, share.sequence_order)?;
        let missing = self
            .validation_sets
            .get(&share.missing_guardian_id)
            .ok_or_else(|| Error::UnknownGuardian(share.missing_guardian_id.clone()))?;
        if self.available.contains_key(&share.missing_guardian_id) {
            return Err(Error::Decryption(format!(
                "{} is present and needs no compensation",
                share.missing_guardian_id
            )));
        }
        if share.guardian_id == share.missing_guardian_id {
            return Err(Error::Decryption(format!(
                "{} cannot compensate for itself",
                share.guardian_id
            )));
        }
        let already = self
            .compensated
            .get(&share.missing_guardian_id)
            .is_some_and(|helpers| helpers.contains_key(&share.guardian_id));
        if already {
            return Err(Error::DuplicateGuardian(format!(
                "{} already compensated for {}",
                share.guardian_id, share.missing_guardian_id
            )));
        }
        let recovery_public_key =
            compute_commitment_product(share.sequence_order, &missing.coefficient_commitments);
        let checked = if recovery_public_key != share.recovery_public_key {
            Err("recovery key does not match the missing guardian's commitments".to_string())
        } else {
            self.check_shares(&share.tally, &share.spoiled_ballots, &recovery_public_key)
        };
        if let Err(reason) = checked {
            return Err(self.reject(&share.guardian_id, Some(&share.missing_guardian_id), reason));
        }
        info!(
            guardian = %share.guardian_id,
            missing = %share.missing_guardian_id,
            "compensated decryption share accepted"
        );
        self.compensated
            .entry(share.missing_guardian_id.clone())
            .or_default()
            .insert(share.guardian_id.clone(), share);
        return Ok(());
    }

    /// Shares submitted but not accepted, in submission order
    pub fn rejected_shares(&self) -> &[RejectedShare] {
        return &self.rejected;
    }

    fn check_shares(
        &self,
        tally: &SelectionShares,
        spoiled_ballots: &BTreeMap<String, SelectionShares>,
        public_key: &ElementModP,
    ) -> std::result::Result<(), String> {
        let q = &self.context.crypto_extended_base_hash;
        check_selection_shares(&tally_targets(self.tally), tally, public_key, q)?;
        if spoiled_ballots.len() != self.tally.spoiled_ballots.len() {
            return Err("shares do not cover every spoiled ballot".to_string());
        }
        for (ballot_id, accepted) in &self.tally.spoiled_ballots {
            let shares = spoiled_ballots
                .get(ballot_id)
                .ok_or_else(|| format!("no shares for spoiled ballot {ballot_id}"))?;
            check_selection_shares(&ballot_targets(&accepted.ballot), shares, public_key, q)
                .map_err(|reason| format!("spoiled ballot {ballot_id}: {reason}"))?;
        }
        return Ok(());
    }

    /// Decrypt the tally and every spoiled ballot. Requires at least a quorum of direct shares,
    /// and for each missing guardian fragments from at least a quorum of helpers. The result is
    /// computed once; later calls return the same tally.
    pub fn get_plaintext_tally(&mut self) -> Result<&PlaintextTally> {
        if self.plaintext_tally.is_none() {
            let plaintext_tally = self.decrypt_tally()?;
            self.plaintext_tally = Some(plaintext_tally);
        }
        return self
            .plaintext_tally
            .as_ref()
            .ok_or_else(|| Error::Decryption("tally was not decrypted".to_string()));
    }

    fn decrypt_tally(&self) -> Result<PlaintextTally> {
        let quorum = self.context.quorum;
        if self.available.len() < quorum {
            return Err(Error::QuorumNotMet {
                context: "direct decryption shares".to_string(),
                available: self.available.len(),
                quorum,
            });
        }
        let missing = self.missing_guardians();
        for missing_id in &missing {
            let helpers = self.compensated.get(*missing_id).map_or(0, BTreeMap::len);
            if helpers < quorum {
                return Err(Error::QuorumNotMet {
                    context: format!("compensation for {missing_id}"),
                    available: helpers,
                    quorum,
                });
            }
        }

        let dlog = &self.dlog;
        let contests = self
            .tally
            .contests
            .iter()
            .map(|(contest_id, contest)| -> Result<(String, PlaintextTallyContest)> {
                let selections = contest
                    .selections
                    .iter()
                    .map(|(selection_id, selection)| -> Result<(String, _)> {
                        let shares = self.collect_shares(selection_id, Scope::Tally)?;
                        let plaintext =
                            decrypt_selection(selection_id, &selection.ciphertext, shares, dlog)?;
                        return Ok((selection_id.clone(), plaintext));
                    })
                    .collect::<Result<BTreeMap<String, PlaintextTallySelection>>>()?;
                let plaintext_contest = PlaintextTallyContest {
                    object_id: contest_id.clone(),
                    selections,
                };
                return Ok((contest_id.clone(), plaintext_contest));
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let mut spoiled_ballots = BTreeMap::new();
        for (ballot_id, accepted) in &self.tally.spoiled_ballots {
            let mut ballot_contests: BTreeMap<String, PlaintextTallyContest> = BTreeMap::new();
            for (contest, selection) in accepted.ballot.real_selections() {
                let shares =
                    self.collect_shares(&selection.object_id, Scope::SpoiledBallot(ballot_id))?;
                let plaintext =
                    decrypt_selection(&selection.object_id, &selection.ciphertext, shares, dlog)?;
                ballot_contests
                    .entry(contest.object_id.clone())
                    .or_insert_with(|| PlaintextTallyContest {
                        object_id: contest.object_id.clone(),
                        selections: BTreeMap::new(),
                    })
                    .selections
                    .insert(selection.object_id.clone(), plaintext);
            }
            spoiled_ballots.insert(ballot_id.clone(), ballot_contests);
        }

        let compensated_guardians = self
            .compensated
            .iter()
            .filter(|(missing_id, _)| missing.contains(&missing_id.as_str()))
            .map(|(missing_id, helpers)| (missing_id.clone(), helpers.keys().cloned().collect()))
            .collect();
        info!(
            available = self.available.len(),
            compensated = missing.len(),
            "tally decrypted"
        );
        return Ok(PlaintextTally {
            object_id: self.tally.object_id.clone(),
            contests,
            spoiled_ballots,
            available_guardians: self.available.keys().cloned().collect(),
            compensated_guardians,
        });
    }

    /// Every guardian's full share of one selection, rebuilding the missing ones
    fn collect_shares(&self, selection_id: &str, scope: Scope) -> Result<GuardianShares> {
        let mut shares = GuardianShares::default();
        for (guardian_id, share) in &self.available {
            let selection = find_share(share, scope, selection_id).ok_or_else(|| {
                Error::Decryption(format!("{guardian_id} has no share for {selection_id}"))
            })?;
            shares.values.insert(guardian_id.clone(), selection.share);
            shares.proofs.insert(guardian_id.clone(), selection.proof.clone());
        }
        for missing_id in self.missing_guardians() {
            let helpers = self.compensated.get(missing_id).ok_or_else(|| {
                Error::Decryption(format!("no compensation for {missing_id}"))
            })?;
            let mut fragments = Vec::with_capacity(helpers.len());
            for (helper_id, share) in helpers {
                let selection = find_share(share, scope, selection_id).ok_or_else(|| {
                    Error::Decryption(format!("{helper_id} has no fragment for {selection_id}"))
                })?;
                fragments.push((share.sequence_order, selection.share));
            }
            let rebuilt = reconstruct_missing_share(&fragments)?;
            debug!(missing = missing_id, selection = selection_id, "share rebuilt");
            shares.values.insert(missing_id.to_string(), rebuilt);
        }
        return Ok(shares);
    }
}

#[derive(Debug, Default)]
struct GuardianShares {
    values: BTreeMap<String, ElementModP>,
    proofs: BTreeMap<String, ChaumPedersenProof>,
}

/// Which ciphertexts a share set belongs to
#[derive(Debug, Clone, Copy)]
enum Scope<'s> {
    Tally,
    SpoiledBallot(&'s str),
}

/// Direct and compensated submissions both carry shares for the tally and the spoiled ballots
trait ShareSource {
    fn tally_shares(&self) -> &SelectionShares;
    fn spoiled_ballot_shares(&self) -> &BTreeMap<String, SelectionShares>;
}

impl ShareSource for TallyDecryptionShare {
    fn tally_shares(&self) -> &SelectionShares {
        return &self.tally;
    }

    fn spoiled_ballot_shares(&self) -> &BTreeMap<String, SelectionShares> {
        return &self.spoiled_ballots;
    }
}

impl ShareSource for CompensatedTallyDecryptionShare {
    fn tally_shares(&self) -> &SelectionShares {
        return &self.tally;
    }

    fn spoiled_ballot_shares(&self) -> &BTreeMap<String, SelectionShares> {
        return &self.spoiled_ballots;
    }
}

fn find_share<'s>(
    source: &'s dyn ShareSource,
    scope: Scope,
    selection_id: &str,
) -> Option<&'s CiphertextDecryptionSelection> {
    let shares = match scope {
        Scope::Tally => source.tally_shares(),
        Scope::SpoiledBallot(ballot_id) => source.spoiled_ballot_shares().get(ballot_id)?,
    };
    return shares.get(selection_id);
}

fn tally_targets<'t>(tally: &'t CiphertextTally) -> Targets<'t> {
    return tally
        .selections()
        .map(|selection| (selection.object_id.as_str(), &selection.ciphertext))
        .collect();
}

fn ballot_targets(ballot: &CiphertextBallot) -> Targets<'_> {
    return ballot
        .real_selections()
        .map(|(_, selection)| (selection.object_id.as_str(), &selection.ciphertext))
        .collect();
}

/// Exactly one share per target, each with a proof against `public_key`
fn check_selection_shares(
    targets: &Targets,
    shares: &SelectionShares,
    public_key: &ElementModP,
    q: &ElementModQ,
) -> std::result::Result<(), String> {
    if shares.len() != targets.len() {
        return Err(format!(
            "{} shares for {} selections",
            shares.len(),
            targets.len()
        ));
    }
    for (selection_id, ciphertext) in targets {
        let share = shares
            .get(*selection_id)
            .ok_or_else(|| format!("no share for selection {selection_id}"))?;
        if !share.proof.is_valid(ciphertext, public_key, &share.share, q) {
            return Err(format!("invalid proof for selection {selection_id}"));
        }
    }
    return Ok(());
}

fn decrypt_selection(
    selection_id: &str,
    ciphertext: &ElGamalCiphertext,
    shares: GuardianShares,
    dlog: &DiscreteLogTable,
) -> Result<PlaintextTallySelection> {
    let product = mult_all_p(shares.values.values());
    let tally = ciphertext.decrypt_known_product(&product, dlog)?;
    return Ok(PlaintextTallySelection {
        object_id: selection_id.to_string(),
        tally,
        value: g_pow_p(&ElementModQ::from_u64(tally)),
        message: *ciphertext,
        shares: shares.values,
        proofs: shares.proofs,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ballot::{BallotBoxState, CiphertextAcceptedBallot},
        election::{tests::sample_description, ElectionBuilder, InternalElectionDescription},
        encrypt::{tests::sample_ballot, EncryptionMediator},
        key_ceremony::{
            generate_identity_auxiliary_key_pair, identity_auxiliary_decrypt,
            identity_auxiliary_encrypt, CeremonyDetails,
        },
        key_ceremony_mediator::KeyCeremonyMediator,
        tally::tally_ballots,
    };
    use rand::{rngs::StdRng, SeedableRng};

    struct Fixture {
        guardians: Vec<Guardian>,
        validation_sets: Vec<CoefficientValidationSet>,
        internal: InternalElectionDescription,
        context: CiphertextElectionContext,
        ballots: Vec<CiphertextAcceptedBallot>,
    }

    fn fixture(rng: &mut StdRng) -> Fixture {
        let details = CeremonyDetails::new(3, 2).unwrap();
        let mut guardians: Vec<Guardian> = (1..=3)
            .map(|i| {
                let aux = generate_identity_auxiliary_key_pair(rng);
                return Guardian::new(&format!("guardian_{i}"), i, details, aux, rng).unwrap();
            })
            .collect();
        let mut mediator = KeyCeremonyMediator::new(details);
        for guardian in guardians.iter_mut() {
            mediator.announce(guardian).unwrap();
        }
        mediator
            .orchestrate(&mut guardians, identity_auxiliary_encrypt)
            .unwrap();
        assert!(mediator
            .verify(&mut guardians, identity_auxiliary_decrypt)
            .unwrap());
        let joint_key = mediator.publish_joint_key(&mut guardians).unwrap();

        let mut builder = ElectionBuilder::new(3, 2, sample_description()).unwrap();
        let (internal, context) = builder.set_public_key(joint_key).build().unwrap();
        let encrypter = EncryptionMediator::new(&internal, &context).without_verification();
        let votes: [(&str, &[&str], BallotBoxState); 3] = [
            ("b1", &["board-alice"], BallotBoxState::Cast),
            ("b2", &["board-alice", "board-carol"], BallotBoxState::Cast),
            ("b3", &["board-bob"], BallotBoxState::Spoiled),
        ];
        let ballots = votes
            .iter()
            .map(|(id, board, state)| CiphertextAcceptedBallot {
                ballot: encrypter.encrypt(&sample_ballot(id, board), rng).unwrap(),
                state: *state,
            })
            .collect();
        return Fixture {
            guardians,
            validation_sets: mediator.share_coefficient_validation_sets(),
            internal,
            context,
            ballots,
        };
    }

    #[test]
    fn test_quorum_is_enforced() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut f = fixture(&mut rng);
        let tally = tally_ballots(&f.ballots, &f.internal, &f.context).unwrap();
        let mut mediator =
            DecryptionMediator::new(&f.context, &tally, f.validation_sets.clone()).unwrap();
        mediator.announce(&mut f.guardians[0], &mut rng).unwrap();
        assert!(matches!(
            mediator.get_plaintext_tally(),
            Err(Error::QuorumNotMet { available: 1, quorum: 2, .. })
        ));

        mediator.announce(&mut f.guardians[1], &mut rng).unwrap();
        assert_eq!(mediator.missing_guardians(), vec!["guardian_3"]);
        // two direct shares, but guardian_3's share has only one helper so far
        mediator
            .compensate("guardian_3", &f.guardians[0], identity_auxiliary_decrypt, &mut rng)
            .unwrap();
        assert!(matches!(
            mediator.get_plaintext_tally(),
            Err(Error::QuorumNotMet { available: 1, .. })
        ));
        mediator
            .compensate("guardian_3", &f.guardians[1], identity_auxiliary_decrypt, &mut rng)
            .unwrap();

        let plaintext = mediator.get_plaintext_tally().unwrap().clone();
        assert_eq!(plaintext.get_count("mayor", "mayor-alice"), Some(2));
        assert_eq!(plaintext.get_count("board", "board-alice"), Some(2));
        assert_eq!(plaintext.get_count("board", "board-bob"), Some(0));
        assert_eq!(plaintext.get_count("board", "board-carol"), Some(1));
        assert!(!plaintext.is_direct());
        assert_eq!(plaintext.compensated_guardians["guardian_3"].len(), 2);

        let spoiled = &plaintext.spoiled_ballots["b3"];
        assert_eq!(spoiled["board"].selections["board-bob"].tally, 1);
        assert_eq!(spoiled["board"].selections["board-alice"].tally, 0);

        // the result is computed once
        assert_eq!(mediator.get_plaintext_tally().unwrap(), &plaintext);
        assert!(mediator
            .announce(&mut f.guardians[2], &mut rng)
            .is_err());
    }

    #[test]
    fn test_forged_shares_are_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut f = fixture(&mut rng);
        let tally = tally_ballots(&f.ballots, &f.internal, &f.context).unwrap();
        let mut mediator =
            DecryptionMediator::new(&f.context, &tally, f.validation_sets.clone()).unwrap();

        let mut share = f.guardians[0].compute_decryption_share(&tally, &mut rng).unwrap();
        let first = share.tally.values_mut().next().unwrap();
        first.share = mult_all_p([&first.share, &g_pow_p(&ElementModQ::from_u64(1))]);
        assert!(matches!(
            mediator.submit_decryption_share(share),
            Err(Error::InvalidProof(_))
        ));
        assert_eq!(mediator.rejected_shares().len(), 1);
        assert_eq!(mediator.rejected_shares()[0].guardian_id, "guardian_1");
        assert!(mediator.get_available_guardians().is_empty());

        mediator.announce(&mut f.guardians[1], &mut rng).unwrap();
        let mut fragments = f.guardians[1]
            .compute_compensated_decryption_share(
                "guardian_3",
                &tally,
                identity_auxiliary_decrypt,
                &mut rng,
            )
            .unwrap();
        fragments.recovery_public_key = g_pow_p(&ElementModQ::from_u64(5));
        assert!(mediator.submit_compensated_decryption_share(fragments).is_err());
        assert_eq!(
            mediator.rejected_shares()[1].missing_guardian_id.as_deref(),
            Some("guardian_3")
        );
    }

    #[test]
    fn test_validation_sets_must_cover_every_guardian() {
        let mut rng = StdRng::seed_from_u64(3);
        let f = fixture(&mut rng);
        let tally = tally_ballots(&f.ballots, &f.internal, &f.context).unwrap();
        let partial = f.validation_sets[..2].to_vec();
        assert!(matches!(
            DecryptionMediator::new(&f.context, &tally, partial),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
