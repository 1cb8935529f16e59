//! Error types for the voting ledger.

use chrono::{DateTime, Utc};
use thiserror::Error;
use voting_state::CommitError;

/// The broad categories an [`Error`] can fall into. Useful for callers that
/// decide on retry policy or map errors onto a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: bad timestamp, inverted window, bad candidate list.
    Validation,
    /// A referenced voter or election record does not exist.
    NotFound,
    /// The operation is well-formed but the current state forbids it.
    StateConflict,
    /// The optimistic commit lost a race. Retrying the whole operation from
    /// the first read may succeed.
    PersistenceConflict,
    /// The underlying store failed. Not retriable without operator
    /// intervention.
    Storage,
}

/// Everything that can go wrong while executing a voting-ledger operation.
///
/// The first failing check aborts the whole operation and nothing is
/// persisted; no error here is ever produced alongside a partial write.
#[derive(Debug, Error)]
pub enum Error {
    /// A timestamp string failed to parse as RFC 3339.
    #[error("malformed {field} timestamp: {source}")]
    InvalidTimeFormat {
        /// Which input field was malformed.
        field: &'static str,
        /// The underlying parse failure.
        #[source]
        source: chrono::ParseError,
    },

    /// The election window ends before it starts.
    #[error("election window ends ({end}) before it starts ({start})")]
    InvalidWindow {
        /// Start of the submitted window.
        start: DateTime<Utc>,
        /// End of the submitted window.
        end: DateTime<Utc>,
    },

    /// The candidate list contains the same name twice.
    #[error("duplicate candidate name: {0}")]
    DuplicateCandidate(String),

    /// The candidate is not on the ballot for this election.
    #[error("candidate {candidate} is not on the ballot for election {election}")]
    UnknownCandidate {
        /// The election id.
        election: String,
        /// The unlisted candidate name.
        candidate: String,
    },

    /// No voter record exists under this id.
    #[error("voter not found: {0}")]
    VoterNotFound(String),

    /// No election record exists under this id.
    #[error("election not found: {0}")]
    ElectionNotFound(String),

    /// A voter record already exists under this id. Registration is
    /// create-once: overwriting would discard the voter's voting history.
    #[error("voter already registered: {0}")]
    VoterAlreadyRegistered(String),

    /// An election record already exists under this id.
    #[error("election already exists: {0}")]
    ElectionAlreadyExists(String),

    /// The voter is not eligible to vote.
    #[error("voter {0} is not eligible to vote")]
    NotEligible(String),

    /// The voter has already cast their vote.
    #[error("voter {0} has already voted")]
    AlreadyVoted(String),

    /// The current instant is outside the election's voting window.
    #[error("election {id} is not active at {now}")]
    ElectionNotActive {
        /// The election id.
        id: String,
        /// The instant at which the cast was attempted.
        now: DateTime<Utc>,
    },

    /// The election has not ended yet, so no tally is available.
    #[error("election {id} is still ongoing until {end}")]
    ElectionOngoing {
        /// The election id.
        id: String,
        /// When the voting window closes.
        end: DateTime<Utc>,
    },

    /// A candidate's tally would overflow.
    #[error("vote count overflow for candidate {0}")]
    CountOverflow(String),

    /// The commit lost an optimistic-concurrency race. Retriable.
    #[error("transaction conflict, retry the operation")]
    Conflict(#[source] CommitError),

    /// The underlying store failed.
    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}

impl Error {
    /// Returns the broad category this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidTimeFormat { .. }
            | Error::InvalidWindow { .. }
            | Error::DuplicateCandidate(_)
            | Error::UnknownCandidate { .. } => ErrorKind::Validation,

            Error::VoterNotFound(_) | Error::ElectionNotFound(_) => ErrorKind::NotFound,

            Error::VoterAlreadyRegistered(_)
            | Error::ElectionAlreadyExists(_)
            | Error::NotEligible(_)
            | Error::AlreadyVoted(_)
            | Error::ElectionNotActive { .. }
            | Error::ElectionOngoing { .. }
            | Error::CountOverflow(_) => ErrorKind::StateConflict,

            Error::Conflict(_) => ErrorKind::PersistenceConflict,

            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns `true` if retrying the operation unchanged may succeed.
    /// Only commit conflicts qualify; every other error needs new input or a
    /// changed precondition first.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::PersistenceConflict
    }
}

impl From<CommitError> for Error {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Conflict { .. } => Error::Conflict(err),
            CommitError::Backend(source) => Error::Storage(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_commit_conflicts_are_retriable() {
        let key = voting_state::storage::StorageKey::new(
            &voting_state::Prefix::from("voting/voters/"),
            "v1",
            &voting_state::codec::JsonCodec,
        );
        let conflict: Error = CommitError::Conflict { key }.into();
        assert!(conflict.is_retriable());
        assert_eq!(conflict.kind(), ErrorKind::PersistenceConflict);

        let not_found = Error::VoterNotFound("ghost".to_string());
        assert!(!not_found.is_retriable());
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn backend_failures_are_storage_errors() {
        let err: Error = CommitError::Backend(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(!err.is_retriable());
    }
}
