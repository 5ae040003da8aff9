//! Accepts encrypted ballots as cast or spoiled
use crate::{
    ballot::{validate_ballot, BallotBoxState, CiphertextAcceptedBallot, CiphertextBallot},
    election::{CiphertextElectionContext, InternalElectionDescription},
    error::{Error, Result},
};
use std::collections::BTreeMap;
use tracing::info;

/// Ballots accepted for one election, keyed by ballot id. Every ballot is validated against the
/// election before it is stored, and stored without its nonces.
#[derive(Debug)]
pub struct BallotBox<'a> {
    internal: &'a InternalElectionDescription,
    context: &'a CiphertextElectionContext,
    store: BTreeMap<String, CiphertextAcceptedBallot>,
}

impl<'a> BallotBox<'a> {
    pub fn new(
        internal: &'a InternalElectionDescription,
        context: &'a CiphertextElectionContext,
    ) -> Self {
        return Self {
            internal,
            context,
            store: BTreeMap::new(),
        };
    }

    pub fn cast(&mut self, ballot: CiphertextBallot) -> Result<&CiphertextAcceptedBallot> {
        return self.accept_ballot(ballot, BallotBoxState::Cast);
    }

    pub fn spoil(&mut self, ballot: CiphertextBallot) -> Result<&CiphertextAcceptedBallot> {
        return self.accept_ballot(ballot, BallotBoxState::Spoiled);
    }

    /// Validate and record a ballot. A ballot id can only be used once.
    pub fn accept_ballot(
        &mut self,
        mut ballot: CiphertextBallot,
        state: BallotBoxState,
    ) -> Result<&CiphertextAcceptedBallot> {
        if state == BallotBoxState::Unknown {
            return Err(Error::InvalidBallot(format!(
                "ballot {} must be cast or spoiled",
                ballot.object_id
            )));
        }
        if self.store.contains_key(&ballot.object_id) {
            return Err(Error::InvalidBallot(format!(
                "ballot {} was already accepted",
                ballot.object_id
            )));
        }
        validate_ballot(&ballot, self.internal, self.context)?;
        ballot.strip_nonces();
        info!(ballot = %ballot.object_id, ?state, "ballot accepted");
        let object_id = ballot.object_id.clone();
        return Ok(self
            .store
            .entry(object_id)
            .or_insert(CiphertextAcceptedBallot { ballot, state }));
    }

    pub fn get(&self, ballot_id: &str) -> Option<&CiphertextAcceptedBallot> {
        return self.store.get(ballot_id);
    }

    pub fn len(&self) -> usize {
        return self.store.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.store.is_empty();
    }

    /// Every accepted ballot, in ballot id order
    pub fn get_ballots(&self) -> impl Iterator<Item = &CiphertextAcceptedBallot> {
        return self.store.values();
    }

    pub fn get_ballots_in_state(
        &self,
        state: BallotBoxState,
    ) -> impl Iterator<Item = &CiphertextAcceptedBallot> {
        return self.store.values().filter(move |ballot| ballot.state == state);
    }
}
