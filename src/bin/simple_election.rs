//! A sample election: three guardians, any two of whom can decrypt, one of whom does not show
//! up for the tally. Run with `RUST_LOG=debug` for the full protocol trace.
use election_guardian::{
    ballot::{PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection},
    ballot_box::BallotBox,
    decryption_mediator::DecryptionMediator,
    election::{
        BallotStyle, Candidate, ContestDescription, ElectionBuilder, ElectionDescription,
        ElectionType, GeopoliticalUnit, ReportingUnitType, SelectionDescription,
        VoteVariationType,
    },
    encrypt::EncryptionMediator,
    guardian::Guardian,
    key_ceremony::{
        generate_identity_auxiliary_key_pair, identity_auxiliary_decrypt,
        identity_auxiliary_encrypt, BackupRetention, CeremonyDetails,
    },
    key_ceremony_mediator::KeyCeremonyMediator,
    tally::tally_ballots,
    Error, Result,
};
use rand::{rngs::OsRng, Rng};
use tracing::info;

const GUARDIANS: usize = 3;
const QUORUM: usize = 2;
const VOTERS: usize = 10;
const CANDIDATES: [&str; 3] = ["alice", "bob", "carol"];

fn description() -> Result<ElectionDescription> {
    let selections = CANDIDATES
        .iter()
        .zip(1..)
        .map(|(name, i)| SelectionDescription::new(&format!("chair-{name}"), name, i))
        .collect();
    let contest = ContestDescription::new(
        "chair",
        "county",
        1,
        VoteVariationType::OneOfM,
        1,
        1,
        "Chair of the county board",
        selections,
    )?;
    let candidates = CANDIDATES
        .iter()
        .map(|name| Candidate {
            object_id: name.to_string(),
            name: name.to_string(),
            party_id: None,
            is_write_in: false,
        })
        .collect();
    return ElectionDescription::new(
        "county-2026",
        ElectionType::General,
        "2026-11-03T08:00:00Z",
        "2026-11-03T20:00:00Z",
        vec![GeopoliticalUnit {
            object_id: "county".to_string(),
            name: "The County".to_string(),
            unit_type: ReportingUnitType::County,
        }],
        vec![],
        candidates,
        vec![contest],
        vec![BallotStyle {
            object_id: "county-style".to_string(),
            geopolitical_unit_ids: vec!["county".to_string()],
        }],
        Some("County general election".to_string()),
    );
}

fn ballot(object_id: &str, candidate: &str) -> PlaintextBallot {
    return PlaintextBallot {
        object_id: object_id.to_string(),
        ballot_style: "county-style".to_string(),
        contests: vec![PlaintextBallotContest {
            object_id: "chair".to_string(),
            ballot_selections: vec![PlaintextBallotSelection {
                object_id: format!("chair-{candidate}"),
                vote: 1,
                is_placeholder_selection: false,
            }],
        }],
    };
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "election_guardian=info,simple_election=info".into()),
        )
        .init();

    // key ceremony
    let details = CeremonyDetails::new(GUARDIANS, QUORUM)?;
    let mut guardians = Vec::with_capacity(GUARDIANS);
    for i in 1..=GUARDIANS as u64 {
        let auxiliary_keys = generate_identity_auxiliary_key_pair(&mut OsRng);
        guardians.push(Guardian::new(
            &format!("guardian-{i}"),
            i,
            details,
            auxiliary_keys,
            &mut OsRng,
        )?);
    }
    let mut ceremony = KeyCeremonyMediator::new(details)
        .with_retention(BackupRetention::DiscardAfterDirectDecryption);
    for guardian in guardians.iter_mut() {
        ceremony.announce(guardian)?;
    }
    ceremony.orchestrate(&mut guardians, identity_auxiliary_encrypt)?;
    if !ceremony.verify(&mut guardians, identity_auxiliary_decrypt)? {
        return Err(Error::IncompleteCeremony(
            "some partial key backups did not verify".to_string(),
        ));
    }
    let joint_key = ceremony.publish_joint_key(&mut guardians)?;

    // voting
    let mut builder = ElectionBuilder::new(GUARDIANS, QUORUM, description()?)?;
    let (internal, context) = builder.set_public_key(joint_key).build()?;
    let encrypter = EncryptionMediator::new(&internal, &context);
    let mut ballot_box = BallotBox::new(&internal, &context);
    let mut expected = [0u64; CANDIDATES.len()];
    for voter in 0..VOTERS {
        let choice = OsRng.gen_range(0..CANDIDATES.len());
        let plaintext = ballot(&format!("ballot-{voter}"), CANDIDATES[choice]);
        let encrypted = encrypter.encrypt(&plaintext, &mut OsRng)?;
        if voter == 0 {
            ballot_box.spoil(encrypted)?;
        } else {
            ballot_box.cast(encrypted)?;
            expected[choice] += 1;
        }
    }
    let tally = tally_ballots(ballot_box.get_ballots(), &internal, &context)?;

    // decryption without the last guardian
    let absent = guardians.len() - 1;
    guardians[absent].remove();
    let absent_id = guardians[absent].get_object_id().to_string();
    let mut decryption = DecryptionMediator::new(
        &context,
        &tally,
        ceremony.share_coefficient_validation_sets(),
    )?;
    for guardian in guardians[..absent].iter_mut() {
        decryption.announce(guardian, &mut OsRng)?;
    }
    for guardian in &guardians[..absent] {
        decryption.compensate(&absent_id, guardian, identity_auxiliary_decrypt, &mut OsRng)?;
    }
    let plaintext = decryption.get_plaintext_tally()?.clone();

    for (name, expected) in CANDIDATES.iter().zip(expected) {
        let count = plaintext
            .get_count("chair", &format!("chair-{name}"))
            .ok_or_else(|| Error::Decryption(format!("no count for {name}")))?;
        if count != expected {
            panic!("the final tally is incorrect for {name}: {count} != {expected}");
        }
        info!(candidate = name, votes = count, "result");
    }
    ceremony.apply_retention_policy(&mut guardians, &plaintext);
    return Ok(());
}
