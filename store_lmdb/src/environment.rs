//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::meta::LmdbMetaStore;
use crate::round::LmdbRoundStore;
use crate::LmdbError;

/// Number of named databases in the environment.
const MAX_DBS: u32 = 4;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    /// Round records keyed by big-endian round id.
    pub(crate) rounds_db: Database<Bytes, Bytes>,
    /// Completed-round log: big-endian round id → empty, in closure order.
    pub(crate) closed_db: Database<Bytes, Bytes>,
    /// Open-round pointer, id allocator and schema version.
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path and check its
    /// schema version.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment directory is owned by this process; no other
        // code maps the same files with different options.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let rounds_db = env.create_database(&mut wtxn, Some("rounds"))?;
        let closed_db = env.create_database(&mut wtxn, Some("closed"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            rounds_db,
            closed_db,
            meta_db,
        };
        environment.meta_store().check_schema()?;
        tracing::info!(path = %path.display(), "LMDB environment opened");
        Ok(environment)
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn round_store(&self) -> LmdbRoundStore {
        LmdbRoundStore {
            env: Arc::clone(&self.env),
            rounds_db: self.rounds_db,
            closed_db: self.closed_db,
            meta_db: self.meta_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}
