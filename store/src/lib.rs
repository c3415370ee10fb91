//! Abstract storage contract for voting rounds.
//!
//! Every storage backend (LMDB, in-memory for testing) implements
//! [`RoundStore`]. The rest of the codebase depends only on the trait.

pub mod error;
pub mod round;

pub use error::StoreError;
pub use round::RoundStore;
