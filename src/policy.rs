//! Duplicate key policy
//!
//! Keys are unique across the whole database, not per root. When two files
//! map to the same key the policy decides which value survives:
//!
//! - [`DuplicatePolicy::Reject`]: the first record wins; later ones are dropped
//! - [`DuplicatePolicy::Replace`]: the last record wins
//!
//! A rejected duplicate is not an error. Any other failure reported by the
//! database build is passed through to the caller.

use crate::cdb::{CdbError, CdbMake, PutOutcome};

/// How a record with an already-present key is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Keep the existing record and drop the new one
    #[default]
    Reject,
    /// Replace the existing record with the new one
    Replace,
}

/// What happened to a submitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Stored under a key not seen before
    Added,
    /// Stored, replacing an earlier record
    Replaced,
    /// Dropped because the key already existed
    Rejected,
}

impl DuplicatePolicy {
    /// Submit one record to the build
    pub fn submit(self, cdb: &mut CdbMake, key: &[u8], value: &[u8]) -> Result<Submission, CdbError> {
        match self {
            DuplicatePolicy::Reject => match cdb.add(key, value) {
                Ok(()) => Ok(Submission::Added),
                Err(CdbError::DuplicateKey) => Ok(Submission::Rejected),
                Err(e) => Err(e),
            },
            DuplicatePolicy::Replace => Ok(match cdb.put(key, value)? {
                PutOutcome::Inserted => Submission::Added,
                PutOutcome::Replaced => Submission::Replaced,
            }),
        }
    }
}
