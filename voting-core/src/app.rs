//! The invocation boundary: one method per logical transaction.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use voting_state::{Storage, WorkingSet};

use crate::call::CallMessage;
use crate::error::Error;
use crate::{Clock, Voting};

/// Runs voting-ledger operations against a storage backend, one atomic
/// transaction per call.
///
/// Mutating operations open a fresh [`WorkingSet`], dispatch, and commit the
/// recorded read/write set; the backend rejects the commit if any key read by
/// the transaction changed in the meantime, surfacing a retriable
/// [`Error::Conflict`]. On any failure nothing is written. Read-only
/// operations never commit and therefore never conflict.
pub struct App<S: Storage, C: Clock> {
    storage: S,
    clock: C,
    voting: Voting,
}

impl<S: Storage, C: Clock> App<S, C> {
    /// Creates an app over the given storage handle and clock.
    pub fn new(storage: S, clock: C) -> Self {
        Self {
            storage,
            clock,
            voting: Voting::default(),
        }
    }

    /// Enrolls a new voter.
    pub fn register_voter(&self, voter_id: &str, name: &str) -> Result<(), Error> {
        self.execute(CallMessage::RegisterVoter {
            voter_id: voter_id.to_string(),
            name: name.to_string(),
        })
    }

    /// Initiates a new election. `start_time` and `end_time` are RFC 3339
    /// timestamps.
    pub fn create_election(
        &self,
        election_id: &str,
        title: &str,
        candidates: Vec<String>,
        start_time: &str,
        end_time: &str,
    ) -> Result<(), Error> {
        self.execute(CallMessage::CreateElection {
            election_id: election_id.to_string(),
            title: title.to_string(),
            candidates,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        })
    }

    /// Casts one vote. On a retriable [`Error::Conflict`] the caller should
    /// invoke this again: the retry re-reads both records from the first
    /// step, so a vote that already landed fails [`Error::AlreadyVoted`]
    /// instead of double-counting.
    pub fn cast_vote(
        &self,
        voter_id: &str,
        election_id: &str,
        candidate: &str,
    ) -> Result<(), Error> {
        self.execute(CallMessage::CastVote {
            voter_id: voter_id.to_string(),
            election_id: election_id.to_string(),
            candidate: candidate.to_string(),
        })
    }

    /// Returns the per-candidate counts for an ended election.
    pub fn tally_votes(&self, election_id: &str) -> Result<BTreeMap<String, u64>, Error> {
        let mut working_set = WorkingSet::new(self.storage.clone());
        self.voting
            .tally_votes(election_id, &self.clock, &mut working_set)
    }

    /// Returns the final results of an ended election. Same rule and output
    /// as [`App::tally_votes`].
    pub fn get_election_results(&self, election_id: &str) -> Result<BTreeMap<String, u64>, Error> {
        let mut working_set = WorkingSet::new(self.storage.clone());
        self.voting
            .get_election_results(election_id, &self.clock, &mut working_set)
    }

    fn execute(&self, msg: CallMessage) -> Result<(), Error> {
        let mut working_set = WorkingSet::new(self.storage.clone());

        self.voting.call(msg, &self.clock, &mut working_set)?;

        for event in working_set.take_events() {
            debug!(key = %event.key, value = %event.value, "transaction event");
        }

        let state_accesses = working_set.checkpoint().freeze();
        self.storage
            .validate_and_commit(state_accesses)
            .map_err(|commit_err| {
                let err = Error::from(commit_err);
                if err.is_retriable() {
                    warn!(%err, "commit conflict, transaction may be retried");
                }
                err
            })
    }
}
