//! State-changing operations: voter registration, election creation, and
//! vote casting.

use chrono::{DateTime, Utc};
use voting_state::{Storage, WorkingSet};

use crate::error::Error;
use crate::types::{Election, Voter};
use crate::{CallResponse, Clock, Voting};

/// This enumeration represents the available call messages for interacting
/// with the voting module. One message is one transaction.
#[derive(
    borsh::BorshDeserialize,
    borsh::BorshSerialize,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    PartialEq,
    Clone,
)]
pub enum CallMessage {
    /// Enrolls a new voter.
    RegisterVoter {
        /// Unique voter id; also the record's key.
        voter_id: String,
        /// Display name.
        name: String,
    },

    /// Initiates a new election.
    CreateElection {
        /// Unique election id; also the record's key.
        election_id: String,
        /// Free-text title.
        title: String,
        /// Ordered, distinct candidate names.
        candidates: Vec<String>,
        /// Window start, RFC 3339 text.
        start_time: String,
        /// Window end, RFC 3339 text.
        end_time: String,
    },

    /// Casts one voter's vote for one candidate in one election.
    CastVote {
        /// The registered voter casting the vote.
        voter_id: String,
        /// The election voted in.
        election_id: String,
        /// The candidate voted for.
        candidate: String,
    },
}

impl Voting {
    /// Registers a voter. Registration is create-once: an id that is already
    /// taken is rejected, since overwriting the record would silently reset
    /// `HasVoted` and reopen double-voting.
    pub(crate) fn register_voter<S: Storage>(
        &self,
        voter_id: String,
        name: String,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, Error> {
        if self.voters.get(&voter_id, working_set).is_some() {
            return Err(Error::VoterAlreadyRegistered(voter_id));
        }

        let voter = Voter::new(voter_id.clone(), name);
        self.voters.set(&voter_id, &voter, working_set);

        working_set.add_event("register_voter", &format!("voter registered: {voter_id}"));

        Ok(CallResponse::default())
    }

    /// Creates an election with all tallies at zero. Nothing is written if
    /// any validation fails.
    pub(crate) fn create_election<S: Storage>(
        &self,
        election_id: String,
        title: String,
        candidates: Vec<String>,
        start_time: &str,
        end_time: &str,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, Error> {
        let start_time = parse_timestamp(start_time, "start_time")?;
        let end_time = parse_timestamp(end_time, "end_time")?;

        if self.elections.get(&election_id, working_set).is_some() {
            return Err(Error::ElectionAlreadyExists(election_id));
        }

        let election = Election::new(election_id.clone(), title, candidates, start_time, end_time)?;
        self.elections.set(&election_id, &election, working_set);

        working_set.add_event(
            "create_election",
            &format!("election created: {election_id}"),
        );

        Ok(CallResponse::default())
    }

    /// Casts a vote. The checks run in a fixed order and the first failure
    /// aborts the operation with nothing written. On success the voter's
    /// `HasVoted` flip and the candidate's tally increment land in the same
    /// working set, so the storage layer commits them as one unit.
    pub(crate) fn cast_vote<S: Storage, C: Clock>(
        &self,
        voter_id: String,
        election_id: String,
        candidate: String,
        clock: &C,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, Error> {
        let mut voter = self
            .voters
            .get(&voter_id, working_set)
            .ok_or_else(|| Error::VoterNotFound(voter_id.clone()))?;

        if !voter.eligible {
            return Err(Error::NotEligible(voter_id));
        }

        if voter.has_voted {
            return Err(Error::AlreadyVoted(voter_id));
        }

        let mut election = self
            .elections
            .get(&election_id, working_set)
            .ok_or_else(|| Error::ElectionNotFound(election_id.clone()))?;

        let now = clock.now();
        if !election.is_active(now) {
            return Err(Error::ElectionNotActive {
                id: election_id,
                now,
            });
        }

        election.record_vote(&candidate)?;
        voter.has_voted = true;

        self.elections.set(&election_id, &election, working_set);
        self.voters.set(&voter_id, &voter, working_set);

        working_set.add_event(
            "cast_vote",
            &format!("vote by {voter_id} in {election_id} accepted"),
        );

        Ok(CallResponse::default())
    }
}

fn parse_timestamp(raw: &str, field: &'static str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| Error::InvalidTimeFormat { field, source })
}
