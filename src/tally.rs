//! Homomorphic accumulation of cast ballots
//!
//! The encrypted tally keeps one running ciphertext per (non-placeholder) selection. Casting a
//! ballot multiplies its selection ciphertexts into the running totals; since the group is
//! commutative the result does not depend on the order ballots arrive in. Spoiled ballots are
//! not added; they are kept whole so that each can be decrypted on its own.
use crate::{
    ballot::{validate_ballot, BallotBoxState, CiphertextAcceptedBallot},
    elgamal::{homomorphic_add, ElGamalCiphertext},
    election::{CiphertextElectionContext, InternalElectionDescription},
    error::{Error, Result},
    group::ElementModQ,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiphertextTallySelection {
    pub object_id: String,
    pub description_hash: ElementModQ,
    /// Encryption of the number of votes for this selection
    pub ciphertext: ElGamalCiphertext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiphertextTallyContest {
    pub object_id: String,
    pub description_hash: ElementModQ,
    pub selections: BTreeMap<String, CiphertextTallySelection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CiphertextTally<'a> {
    pub object_id: String,
    #[serde(skip)]
    internal: &'a InternalElectionDescription,
    #[serde(skip)]
    context: &'a CiphertextElectionContext,
    pub contests: BTreeMap<String, CiphertextTallyContest>,
    pub spoiled_ballots: BTreeMap<String, CiphertextAcceptedBallot>,
    cast_ballot_ids: BTreeSet<String>,
}

impl<'a> CiphertextTally<'a> {
    /// An empty tally: every selection of every contest starts at an encryption of zero
    pub fn new(
        object_id: &str,
        internal: &'a InternalElectionDescription,
        context: &'a CiphertextElectionContext,
    ) -> Self {
        let contests = internal
            .contests
            .iter()
            .map(|contest| {
                let selections = contest
                    .description
                    .ballot_selections
                    .iter()
                    .map(|selection| {
                        let tally_selection = CiphertextTallySelection {
                            object_id: selection.object_id.clone(),
                            description_hash: selection.crypto_hash(),
                            ciphertext: ElGamalCiphertext::identity(),
                        };
                        return (selection.object_id.clone(), tally_selection);
                    })
                    .collect();
                let tally_contest = CiphertextTallyContest {
                    object_id: contest.description.object_id.clone(),
                    description_hash: contest.crypto_hash(),
                    selections,
                };
                return (contest.description.object_id.clone(), tally_contest);
            })
            .collect();
        return Self {
            object_id: object_id.to_string(),
            internal,
            context,
            contests,
            spoiled_ballots: BTreeMap::new(),
            cast_ballot_ids: BTreeSet::new(),
        };
    }

    pub fn get_context(&self) -> &CiphertextElectionContext {
        return self.context;
    }

    /// Validate an accepted ballot and fold it in. Rejects ballots already seen and ballots in
    /// an unknown state; nothing is modified when an error is returned.
    pub fn append(&mut self, ballot: &CiphertextAcceptedBallot) -> Result<()> {
        let ballot_id = &ballot.ballot.object_id;
        if self.cast_ballot_ids.contains(ballot_id) || self.spoiled_ballots.contains_key(ballot_id)
        {
            return Err(Error::InvalidBallot(format!(
                "ballot {ballot_id} is already in the tally"
            )));
        }
        validate_ballot(&ballot.ballot, self.internal, self.context)?;
        match ballot.state {
            BallotBoxState::Cast => {
                // resolve every target first so that a failure leaves the tally untouched
                let mut updates = Vec::new();
                for (contest, selection) in ballot.ballot.real_selections() {
                    let total = self
                        .contests
                        .get(&contest.object_id)
                        .and_then(|c| c.selections.get(&selection.object_id))
                        .ok_or_else(|| {
                            Error::BallotStyleMismatch(format!(
                                "selection {} is not tallied",
                                selection.object_id
                            ))
                        })?;
                    updates.push((
                        contest.object_id.as_str(),
                        selection.object_id.as_str(),
                        homomorphic_add(&total.ciphertext, &selection.ciphertext),
                    ));
                }
                for (contest_id, selection_id, ciphertext) in updates {
                    if let Some(total) = self
                        .contests
                        .get_mut(contest_id)
                        .and_then(|c| c.selections.get_mut(selection_id))
                    {
                        total.ciphertext = ciphertext;
                    }
                }
                self.cast_ballot_ids.insert(ballot_id.clone());
                debug!(ballot = %ballot_id, "ballot added to tally");
            }
            BallotBoxState::Spoiled => {
                self.spoiled_ballots
                    .insert(ballot_id.clone(), ballot.clone());
                debug!(ballot = %ballot_id, "spoiled ballot kept for decryption");
            }
            BallotBoxState::Unknown => {
                return Err(Error::InvalidBallot(format!(
                    "ballot {ballot_id} is neither cast nor spoiled"
                )));
            }
        }
        return Ok(());
    }

    /// Append every ballot, stopping at the first failure
    pub fn batch_append<'b>(
        &mut self,
        ballots: impl IntoIterator<Item = &'b CiphertextAcceptedBallot>,
    ) -> Result<()> {
        for ballot in ballots {
            self.append(ballot)?;
        }
        return Ok(());
    }

    /// Number of cast ballots, which bounds every selection total
    pub fn count(&self) -> usize {
        return self.cast_ballot_ids.len();
    }

    /// Every tallied selection, across contests
    pub fn selections(&self) -> impl Iterator<Item = &CiphertextTallySelection> {
        return self
            .contests
            .values()
            .flat_map(|contest| contest.selections.values());
    }
}

/// Tally a collection of accepted ballots
pub fn tally_ballots<'a, 'b>(
    ballots: impl IntoIterator<Item = &'b CiphertextAcceptedBallot>,
    internal: &'a InternalElectionDescription,
    context: &'a CiphertextElectionContext,
) -> Result<CiphertextTally<'a>> {
    let mut tally = CiphertextTally::new("election-results", internal, context);
    tally.batch_append(ballots)?;
    info!(
        cast = tally.count(),
        spoiled = tally.spoiled_ballots.len(),
        "ballots tallied"
    );
    return Ok(tally);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ballot::CiphertextBallot,
        dlog::DiscreteLogTable,
        encrypt::{
            tests::{sample_ballot, sample_election},
            EncryptionMediator,
        },
    };
    use rand::{rngs::StdRng, SeedableRng};

    fn accepted(ballot: CiphertextBallot, state: BallotBoxState) -> CiphertextAcceptedBallot {
        return CiphertextAcceptedBallot { ballot, state };
    }

    #[test]
    fn test_tally_counts_cast_ballots_only() {
        let mut rng = StdRng::seed_from_u64(1);
        let (keypair, internal, context) = sample_election(&mut rng);
        let mediator = EncryptionMediator::new(&internal, &context).without_verification();
        let ballots = vec![
            accepted(
                mediator.encrypt(&sample_ballot("b1", &["board-alice"]), &mut rng).unwrap(),
                BallotBoxState::Cast,
            ),
            accepted(
                mediator
                    .encrypt(&sample_ballot("b2", &["board-alice", "board-bob"]), &mut rng)
                    .unwrap(),
                BallotBoxState::Cast,
            ),
            accepted(
                mediator.encrypt(&sample_ballot("b3", &["board-carol"]), &mut rng).unwrap(),
                BallotBoxState::Spoiled,
            ),
        ];
        let tally = tally_ballots(&ballots, &internal, &context).unwrap();
        assert_eq!(tally.count(), 2);
        assert!(tally.spoiled_ballots.contains_key("b3"));
        // placeholders are not tallied
        assert_eq!(tally.selections().count(), 5);

        let dlog = DiscreteLogTable::new(2);
        let count = |contest: &str, selection: &str| {
            return tally.contests[contest].selections[selection]
                .ciphertext
                .decrypt_known_secret(keypair.get_secret_key(), &dlog)
                .unwrap();
        };
        assert_eq!(count("mayor", "mayor-alice"), 2);
        assert_eq!(count("mayor", "mayor-bob"), 0);
        assert_eq!(count("board", "board-alice"), 2);
        assert_eq!(count("board", "board-bob"), 1);
        assert_eq!(count("board", "board-carol"), 0);
    }

    #[test]
    fn test_accumulation_order_does_not_matter() {
        let mut rng = StdRng::seed_from_u64(2);
        let (_, internal, context) = sample_election(&mut rng);
        let mediator = EncryptionMediator::new(&internal, &context).without_verification();
        let ballots: Vec<CiphertextAcceptedBallot> = ["b1", "b2", "b3"]
            .iter()
            .map(|id| {
                let ballot = mediator.encrypt(&sample_ballot(id, &["board-bob"]), &mut rng);
                return accepted(ballot.unwrap(), BallotBoxState::Cast);
            })
            .collect();
        let forward = tally_ballots(&ballots, &internal, &context).unwrap();
        let backward = tally_ballots(ballots.iter().rev(), &internal, &context).unwrap();
        assert_eq!(forward.contests, backward.contests);
    }

    #[test]
    fn test_duplicates_and_unknown_state_are_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let (_, internal, context) = sample_election(&mut rng);
        let mediator = EncryptionMediator::new(&internal, &context).without_verification();
        let ballot = mediator.encrypt(&sample_ballot("b1", &[]), &mut rng).unwrap();
        let mut tally = CiphertextTally::new("tally", &internal, &context);

        let unknown = accepted(ballot.clone(), BallotBoxState::Unknown);
        assert!(matches!(tally.append(&unknown), Err(Error::InvalidBallot(_))));

        let cast = accepted(ballot.clone(), BallotBoxState::Cast);
        tally.append(&cast).unwrap();
        let before = tally.contests.clone();
        assert!(tally.append(&cast).is_err());
        assert!(tally
            .append(&accepted(ballot, BallotBoxState::Spoiled))
            .is_err());
        assert_eq!(tally.contests, before);
        assert_eq!(tally.count(), 1);
    }
}
