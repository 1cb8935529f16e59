//! Persisted record types.
//!
//! The serde field names on these structs are an external contract: records
//! written by earlier versions of this software must stay readable, so every
//! field carries its stable persisted name explicitly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A registered voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    /// Unique identity; also the record's storage key.
    #[serde(rename = "ID")]
    pub id: String,

    /// Display label, fixed at registration.
    #[serde(rename = "Name")]
    pub name: String,

    /// Set at registration; no operation currently revokes it.
    #[serde(rename = "Eligibility")]
    pub eligible: bool,

    /// Starts `false`, flips to `true` exactly once when a vote is cast.
    #[serde(rename = "HasVoted")]
    pub has_voted: bool,
}

impl Voter {
    /// Creates a fresh, eligible voter that has not voted.
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            eligible: true,
            has_voted: false,
        }
    }
}

/// A time-boxed contest with a fixed candidate set and a running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    /// Unique identity; also the record's storage key.
    #[serde(rename = "ID")]
    pub id: String,

    /// Free-text label.
    #[serde(rename = "Title")]
    pub title: String,

    /// Ordered candidate names, fixed at creation.
    #[serde(rename = "Candidates")]
    pub candidates: Vec<String>,

    /// Per-candidate counts. The key set always equals `candidates`.
    #[serde(rename = "Votes")]
    pub votes: BTreeMap<String, u64>,

    /// Start of the voting window (inclusive).
    #[serde(rename = "StartTime")]
    pub start_time: DateTime<Utc>,

    /// End of the voting window (inclusive).
    #[serde(rename = "EndTime")]
    pub end_time: DateTime<Utc>,
}

impl Election {
    /// Creates a new election with all counts at zero.
    ///
    /// Rejects a window that ends before it starts, and duplicate candidate
    /// names — a duplicate would silently collapse into a single tally slot
    /// and the stored ballot would no longer match what the creator
    /// submitted.
    pub fn new(
        id: String,
        title: String,
        candidates: Vec<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if end_time < start_time {
            return Err(Error::InvalidWindow {
                start: start_time,
                end: end_time,
            });
        }

        let mut votes = BTreeMap::new();
        for candidate in &candidates {
            if votes.insert(candidate.clone(), 0).is_some() {
                return Err(Error::DuplicateCandidate(candidate.clone()));
            }
        }

        Ok(Self {
            id,
            title,
            candidates,
            votes,
            start_time,
            end_time,
        })
    }

    /// Returns `true` if `now` falls inside the voting window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    /// Returns `true` if the voting window is over at `now`.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// Increments the tally for the given candidate.
    pub fn record_vote(&mut self, candidate: &str) -> Result<(), Error> {
        let count = self
            .votes
            .get_mut(candidate)
            .ok_or_else(|| Error::UnknownCandidate {
                election: self.id.clone(),
                candidate: candidate.to_string(),
            })?;

        *count = count
            .checked_add(1)
            .ok_or_else(|| Error::CountOverflow(candidate.to_string()))?;

        Ok(())
    }
}
