mod common;

use common::{
    counts, decrypt_with, description, exchange_backups, make_guardians, rng, Election,
};
use election_guardian::{
    ballot::BallotBoxState::{Cast, Spoiled},
    election::ElectionBuilder,
    guardian::GuardianState,
    key_ceremony::{identity_auxiliary_decrypt, BackupFailure, BackupRetention},
    key_ceremony_mediator::KeyCeremonyMediator,
    tally::tally_ballots,
    Error,
};

#[test]
fn either_guardian_alone_decrypts_with_quorum_one() {
    let mut rng = rng(1);
    let mut election = Election::new(&mut rng, &[2, 3], 1);
    let ballots = election.vote(&mut rng, &[("b1", &["question-yes"], Cast)]);
    let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();
    let validation_sets = election.validation_sets();

    for present in [0, 1] {
        let result = decrypt_with(
            &mut rng,
            &mut election.guardians,
            &[present],
            &tally,
            validation_sets.clone(),
        )
        .unwrap();
        assert_eq!(result.get_count("question", "question-yes"), Some(1));
        assert_eq!(result.get_count("question", "question-no"), Some(0));
        assert_eq!(result.available_guardians.len(), 1);
        assert_eq!(result.compensated_guardians.len(), 1);
    }
}

#[test]
fn absent_guardian_is_compensated() {
    let mut rng = rng(2);
    let mut election = Election::new(&mut rng, &[1, 2, 3], 2);
    let ballots = election.vote(
        &mut rng,
        &[
            ("b1", &["question-yes", "council-ann", "council-ben"], Cast),
            ("b2", &["question-no", "council-ann"], Cast),
            ("b3", &["question-yes", "council-cat"], Cast),
            ("b4", &["question-no", "council-ben", "council-cat"], Spoiled),
            ("b5", &[], Cast),
        ],
    );
    let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();
    let validation_sets = election.validation_sets();

    let everyone = decrypt_with(
        &mut rng,
        &mut election.guardians,
        &[0, 1, 2],
        &tally,
        validation_sets.clone(),
    )
    .unwrap();
    assert!(everyone.is_direct());

    election.guardians[2].remove();
    let without_third = decrypt_with(
        &mut rng,
        &mut election.guardians,
        &[0, 1],
        &tally,
        validation_sets,
    )
    .unwrap();
    assert_eq!(counts(&everyone), counts(&without_third));
    assert_eq!(
        everyone.spoiled_ballots["b4"]["council"].selections["council-ben"].tally,
        without_third.spoiled_ballots["b4"]["council"].selections["council-ben"].tally
    );

    let expected = [
        ("question-yes", 2),
        ("question-no", 1),
        ("council-ann", 2),
        ("council-ben", 1),
        ("council-cat", 1),
    ];
    let counted = counts(&without_third);
    for (selection, count) in expected {
        assert_eq!(counted[selection], count, "{selection}");
    }
    let spoiled = &without_third.spoiled_ballots["b4"];
    assert_eq!(spoiled["question"].selections["question-no"].tally, 1);
    assert_eq!(spoiled["council"].selections["council-ann"].tally, 0);
    assert_eq!(without_third.compensated_guardians["guardian-3"].len(), 2);
}

#[test]
fn every_quorum_subset_agrees() {
    let mut rng = rng(3);
    let mut election = Election::new(&mut rng, &[1, 2, 3], 2);
    let ballots = election.vote(
        &mut rng,
        &[
            ("b1", &["question-yes", "council-ben"], Cast),
            ("b2", &["question-yes", "council-ann", "council-cat"], Cast),
        ],
    );
    let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();
    let validation_sets = election.validation_sets();

    let results: Vec<_> = [[0, 1], [0, 2], [1, 2]]
        .iter()
        .map(|present| {
            let result = decrypt_with(
                &mut rng,
                &mut election.guardians,
                present,
                &tally,
                validation_sets.clone(),
            );
            return counts(&result.unwrap());
        })
        .collect();
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
    assert_eq!(results[0]["question-yes"], 2);

    let too_few = decrypt_with(
        &mut rng,
        &mut election.guardians,
        &[0],
        &tally,
        validation_sets,
    );
    assert!(matches!(too_few, Err(Error::QuorumNotMet { .. })));
}

#[test]
fn tampered_backup_is_caught_and_challenged() {
    let mut rng = rng(4);
    let mut guardians = make_guardians(&mut rng, &[1, 2, 3], 2);
    let mut ceremony: KeyCeremonyMediator = exchange_backups(&mut guardians, 2);

    // guardian-3 receives a garbled copy of guardian-1's backup
    let mut forged = guardians[0]
        .share_election_partial_key_backup(3)
        .unwrap()
        .clone();
    forged.encrypted_value = b"7".to_vec();
    guardians[2].save_election_partial_key_backup(forged).unwrap();

    assert!(!ceremony
        .verify(&mut guardians, identity_auxiliary_decrypt)
        .unwrap());
    let failed = ceremony.failed_verifications();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].owner_id, "guardian-1");
    assert_eq!(failed[0].designated_id, "guardian-3");
    assert_eq!(failed[0].failure, Some(BackupFailure::CommitmentMismatch));
    assert!(matches!(
        ceremony.publish_joint_key(&mut guardians),
        Err(Error::IncompleteCeremony(_))
    ));

    // the owner's revealed value settles the dispute in its favour
    assert!(ceremony.challenge(&mut guardians, 1, 3).unwrap().verified);
    let joint_key = ceremony.publish_joint_key(&mut guardians).unwrap();
    assert!(guardians
        .iter()
        .all(|g| g.get_state() == GuardianState::KeyCeremonyComplete));

    // guardian-3 can still stand in for guardian-1 with the revealed value
    let mut builder = ElectionBuilder::new(3, 2, description()).unwrap();
    let (internal, context) = builder.set_public_key(joint_key).build().unwrap();
    let mut election = Election {
        guardians,
        ceremony,
        internal,
        context,
    };
    let ballots = election.vote(
        &mut rng,
        &[
            ("b1", &["question-no", "council-ann", "council-cat"], Cast),
            ("b2", &["question-no", "council-ben", "council-cat"], Cast),
        ],
    );
    let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();
    let validation_sets = election.validation_sets();
    election.guardians[0].remove();
    let result = decrypt_with(
        &mut rng,
        &mut election.guardians,
        &[1, 2],
        &tally,
        validation_sets,
    )
    .unwrap();
    assert_eq!(result.compensated_guardians["guardian-1"].len(), 2);
    assert_eq!(result.get_count("question", "question-no"), Some(2));
    assert_eq!(result.get_count("council", "council-ann"), Some(1));
    assert_eq!(result.get_count("council", "council-ben"), Some(1));
    assert_eq!(result.get_count("council", "council-cat"), Some(2));
}

#[test]
fn decryption_is_repeatable_and_backups_can_be_discarded() {
    let mut rng = rng(5);
    let mut election = Election::new(&mut rng, &[1, 2], 2);
    let ballots = election.vote(
        &mut rng,
        &[
            ("b1", &["question-yes", "council-ann"], Cast),
            ("b2", &["question-yes"], Cast),
        ],
    );
    let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();
    let validation_sets = election.validation_sets();

    // verifying the same backups again changes nothing
    assert!(election
        .ceremony
        .verify(&mut election.guardians, identity_auxiliary_decrypt)
        .unwrap());

    let first = decrypt_with(
        &mut rng,
        &mut election.guardians,
        &[0, 1],
        &tally,
        validation_sets.clone(),
    )
    .unwrap();
    let second = decrypt_with(
        &mut rng,
        &mut election.guardians,
        &[0, 1],
        &tally,
        validation_sets,
    )
    .unwrap();
    // fresh proofs each time, same counts
    assert_eq!(counts(&first), counts(&second));
    assert_eq!(first.get_count("question", "question-yes"), Some(2));

    // keeping backups is the default
    election
        .ceremony
        .apply_retention_policy(&mut election.guardians, &first);
    assert!(election
        .guardians
        .iter()
        .all(|g| g.get_received_backup_count() == 1));

    assert_eq!(election.ceremony.get_backup_count(), 2);

    let mut discarding = election
        .ceremony
        .clone()
        .with_retention(BackupRetention::DiscardAfterDirectDecryption);
    discarding.apply_retention_policy(&mut election.guardians, &first);
    assert_eq!(discarding.get_backup_count(), 0);
    assert!(election
        .guardians
        .iter()
        .all(|g| g.get_received_backup_count() == 0));
}

#[test]
fn tally_serializes_to_json() {
    let mut rng = rng(6);
    let mut election = Election::new(&mut rng, &[1], 1);
    let ballots = election.vote(&mut rng, &[("b1", &["council-cat"], Cast)]);
    let tally = tally_ballots(&ballots, &election.internal, &election.context).unwrap();
    let validation_sets = election.validation_sets();
    let result = decrypt_with(&mut rng, &mut election.guardians, &[0], &tally, validation_sets)
        .unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let parsed: election_guardian::decryption::PlaintextTally =
        serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, result);
    assert!(serde_json::to_string(&tally).is_ok());
}
