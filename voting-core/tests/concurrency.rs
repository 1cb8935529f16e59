//! Optimistic-concurrency behavior across interleaved transactions sharing
//! one storage backend.

use chrono::{TimeZone, Utc};
use voting_core::{CallMessage, Error, FixedClock, Voting};
use voting_state::{CommitError, MemStorage, Storage, WorkingSet};

fn during_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

fn after_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap())
}

fn commit(working_set: WorkingSet<MemStorage>, storage: &MemStorage) -> Result<(), CommitError> {
    storage.validate_and_commit(working_set.checkpoint().freeze())
}

/// Registers two voters and one open election, committed to `storage`.
fn seed(storage: &MemStorage) -> Voting {
    let voting = Voting::default();
    let mut working_set = WorkingSet::new(storage.clone());

    for (id, name) in [("v1", "Ada"), ("v2", "Bob")] {
        voting
            .call(
                CallMessage::RegisterVoter {
                    voter_id: id.to_string(),
                    name: name.to_string(),
                },
                &during_clock(),
                &mut working_set,
            )
            .unwrap();
    }

    voting
        .call(
            CallMessage::CreateElection {
                election_id: "e1".to_string(),
                title: "Board election".to_string(),
                candidates: vec!["A".to_string(), "B".to_string()],
                start_time: "2024-06-01T00:00:00Z".to_string(),
                end_time: "2024-06-02T00:00:00Z".to_string(),
            },
            &during_clock(),
            &mut working_set,
        )
        .unwrap();

    commit(working_set, storage).unwrap();
    voting
}

fn cast(voter_id: &str, candidate: &str) -> CallMessage {
    CallMessage::CastVote {
        voter_id: voter_id.to_string(),
        election_id: "e1".to_string(),
        candidate: candidate.to_string(),
    }
}

#[test]
fn racing_casts_by_one_voter_count_once() {
    let storage = MemStorage::new();
    let voting = seed(&storage);

    // Two hosts pick up the same cast concurrently. Both snapshots read the
    // voter before either commits.
    let mut first = WorkingSet::new(storage.clone());
    let mut second = WorkingSet::new(storage.clone());
    voting.call(cast("v1", "A"), &during_clock(), &mut first).unwrap();
    voting.call(cast("v1", "A"), &during_clock(), &mut second).unwrap();

    commit(first, &storage).unwrap();

    // The loser's read set is stale, so its commit is rejected wholesale.
    let commit_err = commit(second, &storage).unwrap_err();
    assert!(commit_err.is_retriable());
    let err = Error::from(commit_err);
    assert!(err.is_retriable());

    // The retry re-reads the committed state and fails the has-voted check
    // instead of double-counting.
    let mut retry = WorkingSet::new(storage.clone());
    let err = voting
        .call(cast("v1", "A"), &during_clock(), &mut retry)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyVoted(id) if id == "v1"));

    let mut reader = WorkingSet::new(storage.clone());
    let tally = voting
        .tally_votes("e1", &after_clock(), &mut reader)
        .unwrap();
    assert_eq!(tally["A"], 1);
    assert_eq!(tally["B"], 0);
}

#[test]
fn racing_casts_by_distinct_voters_all_count_after_retry() {
    let storage = MemStorage::new();
    let voting = seed(&storage);

    // Both transactions read the same election snapshot, so only one commit
    // can win even though the voters differ.
    let mut first = WorkingSet::new(storage.clone());
    let mut second = WorkingSet::new(storage.clone());
    voting.call(cast("v1", "A"), &during_clock(), &mut first).unwrap();
    voting.call(cast("v2", "A"), &during_clock(), &mut second).unwrap();

    commit(first, &storage).unwrap();
    assert!(commit(second, &storage).is_err());

    // Retrying the loser from scratch succeeds and no increment is lost.
    let mut retry = WorkingSet::new(storage.clone());
    voting
        .call(cast("v2", "A"), &during_clock(), &mut retry)
        .unwrap();
    commit(retry, &storage).unwrap();

    let mut reader = WorkingSet::new(storage.clone());
    let tally = voting
        .tally_votes("e1", &after_clock(), &mut reader)
        .unwrap();
    assert_eq!(tally["A"], 2);
}

#[test]
fn reverted_transaction_leaves_no_trace() {
    let storage = MemStorage::new();
    let voting = seed(&storage);

    let mut working_set = WorkingSet::new(storage.clone());
    voting
        .call(cast("v1", "A"), &during_clock(), &mut working_set)
        .unwrap();
    // The reverted read set still validates; there is nothing to write.
    let mut checkpoint = working_set.revert();
    storage.validate_and_commit(checkpoint.freeze()).unwrap();

    let mut reader = WorkingSet::new(storage.clone());
    let tally = voting
        .tally_votes("e1", &after_clock(), &mut reader)
        .unwrap();
    assert!(tally.values().all(|&count| count == 0));
}
