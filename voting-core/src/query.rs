//! Read-only entry points: finalized vote counts.

use std::collections::BTreeMap;

use voting_state::{Storage, WorkingSet};

use crate::error::Error;
use crate::{Clock, Voting};

impl Voting {
    /// Returns the per-candidate counts for an ended election.
    ///
    /// Fails with [`Error::ElectionOngoing`] while the voting window is
    /// still open: no provisional tally is ever exposed. Activity is derived
    /// from the clock and the stored window on every call; there is no
    /// cached status to go stale.
    pub fn tally_votes<S: Storage, C: Clock>(
        &self,
        election_id: &str,
        clock: &C,
        working_set: &mut WorkingSet<S>,
    ) -> Result<BTreeMap<String, u64>, Error> {
        let election = self
            .elections
            .get(election_id, working_set)
            .ok_or_else(|| Error::ElectionNotFound(election_id.to_string()))?;

        let now = clock.now();
        if !election.has_ended(now) {
            return Err(Error::ElectionOngoing {
                id: election_id.to_string(),
                end: election.end_time,
            });
        }

        Ok(election.votes)
    }

    /// Returns the final results of an ended election.
    ///
    /// A distinct entry point for callers that conceptually want "final
    /// results" rather than "a tally"; the rule and the output are the same.
    pub fn get_election_results<S: Storage, C: Clock>(
        &self,
        election_id: &str,
        clock: &C,
        working_set: &mut WorkingSet<S>,
    ) -> Result<BTreeMap<String, u64>, Error> {
        self.tally_votes(election_id, clock, working_set)
    }
}
