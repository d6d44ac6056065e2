//! Typed lifecycle states for jobs and candidates.
//!
//! The shared store encodes pipeline progress in these columns instead of
//! NULL sentinels. Transitions are terminal: a decided job and a shortlisted
//! or rejected candidate are never revisited by a later run.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid state transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Unprocessed,
    Decided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateState {
    #[default]
    Unset,
    Shortlisted,
    Rejected,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Unprocessed => "unprocessed",
            JobState::Decided => "decided",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unprocessed" => Some(JobState::Unprocessed),
            "decided" => Some(JobState::Decided),
            _ => None,
        }
    }

    /// The only legal job transition. Re-deciding a decided job is an error.
    pub fn decide(self) -> Result<Self, TransitionError> {
        match self {
            JobState::Unprocessed => Ok(JobState::Decided),
            JobState::Decided => Err(TransitionError {
                from: "decided",
                to: "decided",
            }),
        }
    }
}

impl CandidateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateState::Unset => "unset",
            CandidateState::Shortlisted => "shortlisted",
            CandidateState::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unset" => Some(CandidateState::Unset),
            "shortlisted" => Some(CandidateState::Shortlisted),
            "rejected" => Some(CandidateState::Rejected),
            _ => None,
        }
    }

    pub fn shortlist(self) -> Result<Self, TransitionError> {
        match self {
            CandidateState::Unset => Ok(CandidateState::Shortlisted),
            other => Err(TransitionError {
                from: other.as_str(),
                to: "shortlisted",
            }),
        }
    }

    pub fn reject(self) -> Result<Self, TransitionError> {
        match self {
            CandidateState::Unset => Ok(CandidateState::Rejected),
            other => Err(TransitionError {
                from: other.as_str(),
                to: "rejected",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_decides_exactly_once() {
        let decided = JobState::Unprocessed.decide().unwrap();
        assert_eq!(decided, JobState::Decided);
        assert!(decided.decide().is_err());
    }

    #[test]
    fn shortlisted_candidate_stays_shortlisted() {
        let state = CandidateState::Unset.shortlist().unwrap();
        assert_eq!(state, CandidateState::Shortlisted);
        assert!(state.shortlist().is_err());
        assert!(state.reject().is_err());
    }

    #[test]
    fn rejected_is_terminal_too() {
        let state = CandidateState::Unset.reject().unwrap();
        assert_eq!(state, CandidateState::Rejected);
        assert!(state.shortlist().is_err());
    }

    #[test]
    fn round_trips_through_strings() {
        for state in [JobState::Unprocessed, JobState::Decided] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        for state in [
            CandidateState::Unset,
            CandidateState::Shortlisted,
            CandidateState::Rejected,
        ] {
            assert_eq!(CandidateState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("done"), None);
        assert_eq!(CandidateState::parse(""), None);
    }
}
