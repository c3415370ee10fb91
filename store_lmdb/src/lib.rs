//! LMDB storage backend for ballot rounds.
//!
//! Implements [`ballot_store::RoundStore`] using the `heed` LMDB bindings.
//! LMDB admits a single write transaction at a time, so each conditional
//! update runs its check and its write inside one transaction and is
//! linearizable without any client-side locking.

pub mod environment;
pub mod error;
pub mod meta;
pub mod round;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use round::LmdbRoundStore;
