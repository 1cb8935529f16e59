//! Voter registration, election definition, and vote casting/tallying over a
//! key-value ledger.
//!
//! The [`Voting`] module is a stateless orchestrator: all persistent state
//! lives in two prefix-isolated [`StateMap`]s (voter records and election
//! records) accessed through a [`WorkingSet`]. Each logical operation runs as
//! one transaction; the working set's read/write log is committed atomically
//! by the storage backend, which is what makes the voter-flag flip and the
//! tally increment of a single vote indivisible.

#![deny(missing_docs)]

pub mod call;
pub mod query;

mod app;
mod error;
mod types;


use chrono::{DateTime, Utc};
use voting_state::{Prefix, StateMap, Storage, WorkingSet};

pub use app::App;
pub use call::CallMessage;
pub use error::{Error, ErrorKind};
pub use types::{Election, Voter};

/// Supplies the current instant for time-window checks.
///
/// This is the only notion of time in the system: election activity is always
/// derived by comparing `now()` against the stored window, never cached.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// A [`Clock`] backed by the system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A [`Clock`] pinned to a fixed instant. Used by tests and by hosts that
/// supply a consensus-agreed timestamp per transaction.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// An empty response to a successfully dispatched call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallResponse {}

/// The voting module: voter registry, election registry, vote caster and
/// tally reader over a shared key-value store.
#[derive(Debug, Clone, PartialEq)]
pub struct Voting {
    /// Voter records, keyed by voter id.
    pub(crate) voters: StateMap<String, Voter>,

    /// Election records, keyed by election id.
    pub(crate) elections: StateMap<String, Election>,
}

impl Default for Voting {
    fn default() -> Self {
        Self {
            voters: StateMap::new(Prefix::from("voting/voters/")),
            elections: StateMap::new(Prefix::from("voting/elections/")),
        }
    }
}

impl Voting {
    /// Dispatches a call message against the given working set.
    ///
    /// The clock replaces the framework-supplied transaction context: it is
    /// the capability carrying "now" into time-window checks.
    pub fn call<S: Storage, C: Clock>(
        &self,
        msg: CallMessage,
        clock: &C,
        working_set: &mut WorkingSet<S>,
    ) -> Result<CallResponse, Error> {
        match msg {
            CallMessage::RegisterVoter { voter_id, name } => {
                self.register_voter(voter_id, name, working_set)
            }

            CallMessage::CreateElection {
                election_id,
                title,
                candidates,
                start_time,
                end_time,
            } => self.create_election(
                election_id,
                title,
                candidates,
                &start_time,
                &end_time,
                working_set,
            ),

            CallMessage::CastVote {
                voter_id,
                election_id,
                candidate,
            } => self.cast_vote(voter_id, election_id, candidate, clock, working_set),
        }
    }
}
