//! Metadata kept alongside the rounds: the schema version stamp.
//!
//! There is one record layout so far. A fresh database is stamped with it;
//! any other stored version is refused rather than read with the wrong
//! layout.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use crate::LmdbError;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Record layout written by this build.
pub const SCHEMA_VERSION: u32 = 1;

pub struct LmdbMetaStore {
    pub(crate) env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbMetaStore {
    /// Stamp a fresh database, or confirm an existing one uses our layout.
    pub fn check_schema(&self) -> Result<(), LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        let stored = self.read_version(&wtxn)?;
        match stored {
            0 => {
                self.meta_db
                    .put(&mut wtxn, SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_le_bytes())?;
                wtxn.commit()?;
                tracing::info!(version = SCHEMA_VERSION, "schema version stamped");
                Ok(())
            }
            SCHEMA_VERSION => {
                tracing::debug!(version = stored, "schema version matches");
                Ok(())
            }
            other => Err(LmdbError::Schema(format!(
                "database schema version {} does not match supported version {}",
                other, SCHEMA_VERSION
            ))),
        }
    }

    /// Stored schema version; `0` for a fresh database.
    pub fn get_schema_version(&self) -> Result<u32, LmdbError> {
        let rtxn = self.env.read_txn()?;
        self.read_version(&rtxn)
    }

    fn read_version(&self, txn: &RoTxn) -> Result<u32, LmdbError> {
        match self.meta_db.get(txn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Corruption("schema_version has unexpected byte length".to_string())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn set_schema_version(&self, version: u32) -> Result<(), LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        self.meta_db
            .put(&mut wtxn, SCHEMA_VERSION_KEY, &version.to_le_bytes())?;
        wtxn.commit()?;
        Ok(())
    }
}
