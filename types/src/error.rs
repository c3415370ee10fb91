//! Errors raised while interpreting caller input.

use thiserror::Error;

/// A vote option outside the two-valued RED/GREEN domain.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid vote option: {0:?} (expected \"red\" or \"green\")")]
pub struct InvalidVote(pub String);
