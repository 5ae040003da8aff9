//! Shared setup for the end-to-end tests: a two-contest election run by guardians with the
//! identity auxiliary scheme
#![allow(dead_code)]
use election_guardian::{
    ballot::{
        BallotBoxState, CiphertextAcceptedBallot, PlaintextBallot, PlaintextBallotContest,
        PlaintextBallotSelection,
    },
    ballot_box::BallotBox,
    decryption::PlaintextTally,
    decryption_mediator::DecryptionMediator,
    election::{
        BallotStyle, Candidate, CiphertextElectionContext, ContestDescription, ElectionBuilder,
        ElectionDescription, ElectionType, GeopoliticalUnit, InternalElectionDescription,
        ReportingUnitType, SelectionDescription, VoteVariationType,
    },
    encrypt::EncryptionMediator,
    guardian::Guardian,
    key_ceremony::{
        generate_identity_auxiliary_key_pair, identity_auxiliary_decrypt,
        identity_auxiliary_encrypt, CeremonyDetails, CoefficientValidationSet,
    },
    key_ceremony_mediator::KeyCeremonyMediator,
    tally::CiphertextTally,
    Result,
};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeMap;

pub const STYLE: &str = "statewide";

/// Seeded randomness; also routes protocol logs to the test harness (`RUST_LOG=debug`)
pub fn rng(seed: u64) -> StdRng {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    return StdRng::seed_from_u64(seed);
}

/// A yes/no question and a council race electing two of three
pub fn description() -> ElectionDescription {
    let question = ContestDescription::new(
        "question",
        "state",
        1,
        VoteVariationType::OneOfM,
        1,
        1,
        "Question 1",
        vec![
            SelectionDescription::new("question-yes", "yes", 1),
            SelectionDescription::new("question-no", "no", 2),
        ],
    )
    .unwrap();
    let council = ContestDescription::new(
        "council",
        "state",
        2,
        VoteVariationType::NOfM,
        2,
        2,
        "State council",
        vec![
            SelectionDescription::new("council-ann", "ann", 1),
            SelectionDescription::new("council-ben", "ben", 2),
            SelectionDescription::new("council-cat", "cat", 3),
        ],
    )
    .unwrap();
    let candidates = ["yes", "no", "ann", "ben", "cat"]
        .iter()
        .map(|id| Candidate {
            object_id: id.to_string(),
            name: id.to_string(),
            party_id: None,
            is_write_in: false,
        })
        .collect();
    return ElectionDescription::new(
        "state-2026",
        ElectionType::Special,
        "2026-10-01T00:00:00Z",
        "2026-10-02T00:00:00Z",
        vec![GeopoliticalUnit {
            object_id: "state".to_string(),
            name: "State".to_string(),
            unit_type: ReportingUnitType::State,
        }],
        vec![],
        candidates,
        vec![question, council],
        vec![BallotStyle {
            object_id: STYLE.to_string(),
            geopolitical_unit_ids: vec!["state".to_string()],
        }],
        None,
    )
    .unwrap();
}

/// A ballot voting for the given selections; the contest is the id's prefix
pub fn plaintext_ballot(object_id: &str, selections: &[&str]) -> PlaintextBallot {
    let mut contests: BTreeMap<&str, Vec<PlaintextBallotSelection>> = BTreeMap::new();
    for selection in selections {
        let contest = selection.split('-').next().unwrap();
        contests
            .entry(contest)
            .or_default()
            .push(PlaintextBallotSelection {
                object_id: selection.to_string(),
                vote: 1,
                is_placeholder_selection: false,
            });
    }
    return PlaintextBallot {
        object_id: object_id.to_string(),
        ballot_style: STYLE.to_string(),
        contests: contests
            .into_iter()
            .map(|(object_id, ballot_selections)| PlaintextBallotContest {
                object_id: object_id.to_string(),
                ballot_selections,
            })
            .collect(),
    };
}

pub fn make_guardians(rng: &mut StdRng, orders: &[u64], quorum: usize) -> Vec<Guardian> {
    let details = CeremonyDetails::new(orders.len(), quorum).unwrap();
    return orders
        .iter()
        .map(|order| {
            let aux = generate_identity_auxiliary_key_pair(rng);
            return Guardian::new(&format!("guardian-{order}"), *order, details, aux, rng).unwrap();
        })
        .collect();
}

/// Announce, exchange backups and verify them, without publishing the joint key
pub fn exchange_backups(guardians: &mut [Guardian], quorum: usize) -> KeyCeremonyMediator {
    let details = CeremonyDetails::new(guardians.len(), quorum).unwrap();
    let mut mediator = KeyCeremonyMediator::new(details);
    for guardian in guardians.iter_mut() {
        mediator.announce(guardian).unwrap();
    }
    mediator
        .orchestrate(guardians, identity_auxiliary_encrypt)
        .unwrap();
    return mediator;
}

pub struct Election {
    pub guardians: Vec<Guardian>,
    pub ceremony: KeyCeremonyMediator,
    pub internal: InternalElectionDescription,
    pub context: CiphertextElectionContext,
}

impl Election {
    /// Run a complete key ceremony and build the election on its joint key
    pub fn new(rng: &mut StdRng, orders: &[u64], quorum: usize) -> Self {
        let mut guardians = make_guardians(rng, orders, quorum);
        let mut ceremony = exchange_backups(&mut guardians, quorum);
        assert!(ceremony
            .verify(&mut guardians, identity_auxiliary_decrypt)
            .unwrap());
        let joint_key = ceremony.publish_joint_key(&mut guardians).unwrap();
        let mut builder = ElectionBuilder::new(orders.len(), quorum, description()).unwrap();
        let (internal, context) = builder.set_public_key(joint_key).build().unwrap();
        return Self {
            guardians,
            ceremony,
            internal,
            context,
        };
    }

    pub fn validation_sets(&self) -> Vec<CoefficientValidationSet> {
        return self.ceremony.share_coefficient_validation_sets();
    }

    /// Encrypt and accept one ballot per entry
    pub fn vote(
        &self,
        rng: &mut StdRng,
        ballots: &[(&str, &[&str], BallotBoxState)],
    ) -> Vec<CiphertextAcceptedBallot> {
        let encrypter = EncryptionMediator::new(&self.internal, &self.context);
        let mut ballot_box = BallotBox::new(&self.internal, &self.context);
        for (object_id, selections, state) in ballots {
            let encrypted = encrypter
                .encrypt(&plaintext_ballot(object_id, selections), rng)
                .unwrap();
            ballot_box.accept_ballot(encrypted, *state).unwrap();
        }
        return ballot_box.get_ballots().cloned().collect();
    }
}

/// Decrypt with the guardians at `present` (indices into `guardians`) sharing directly and
/// compensating for everyone else
pub fn decrypt_with(
    rng: &mut StdRng,
    guardians: &mut [Guardian],
    present: &[usize],
    tally: &CiphertextTally,
    validation_sets: Vec<CoefficientValidationSet>,
) -> Result<PlaintextTally> {
    let mut mediator = DecryptionMediator::new(tally.get_context(), tally, validation_sets)?;
    for index in present {
        mediator.announce(&mut guardians[*index], rng)?;
    }
    let missing: Vec<String> = mediator
        .missing_guardians()
        .into_iter()
        .map(str::to_string)
        .collect();
    for missing_id in &missing {
        for index in present {
            mediator.compensate(missing_id, &guardians[*index], identity_auxiliary_decrypt, rng)?;
        }
    }
    return Ok(mediator.get_plaintext_tally()?.clone());
}

/// Every count, for comparisons that ignore shares and proofs
pub fn counts(tally: &PlaintextTally) -> BTreeMap<String, u64> {
    return tally
        .contests
        .values()
        .flat_map(|contest| contest.selections.values())
        .map(|selection| (selection.object_id.clone(), selection.tally))
        .collect();
}
