//! LMDB implementation of RoundStore.
//!
//! The open-round pointer in `meta_db` is the uniqueness constraint behind
//! "at most one open round": `create_round` refuses to overwrite it, and
//! `close` clears it in the same transaction that flips the round's status.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use ballot_store::{RoundStore, StoreError};
use ballot_types::{Color, Round, RoundId, Tally, Timestamp, WinnerRule};

use crate::LmdbError;

const OPEN_ROUND_KEY: &[u8] = b"open_round";
const NEXT_ROUND_ID_KEY: &[u8] = b"next_round_id";

pub struct LmdbRoundStore {
    pub(crate) env: Arc<Env>,
    pub(crate) rounds_db: Database<Bytes, Bytes>,
    pub(crate) closed_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

fn decode_id(bytes: &[u8]) -> Result<RoundId, LmdbError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LmdbError::Corruption(format!("round id has {} bytes", bytes.len())))?;
    Ok(RoundId::from_be_bytes(arr))
}

impl LmdbRoundStore {
    fn read_round(&self, txn: &RoTxn, id: RoundId) -> Result<Option<Round>, LmdbError> {
        match self.rounds_db.get(txn, &id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn open_round_id(&self, txn: &RoTxn) -> Result<Option<RoundId>, LmdbError> {
        self.meta_db
            .get(txn, OPEN_ROUND_KEY)?
            .map(decode_id)
            .transpose()
    }

    fn next_round_id(&self, txn: &RoTxn) -> Result<RoundId, LmdbError> {
        match self.meta_db.get(txn, NEXT_ROUND_ID_KEY)? {
            Some(bytes) => decode_id(bytes),
            None => Ok(RoundId::new(1)),
        }
    }
}

impl RoundStore for LmdbRoundStore {
    fn get_open_round(&self) -> Result<Option<Round>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(id) = self.open_round_id(&rtxn)? else {
            return Ok(None);
        };
        let round = self
            .read_round(&rtxn, id)?
            .ok_or_else(|| LmdbError::Corruption(format!("open round {id} has no record")))?;
        Ok(Some(round))
    }

    fn create_round(&self, opened_at: Timestamp) -> Result<Round, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(existing) = self.open_round_id(&wtxn)? {
            return Err(StoreError::OpenRoundExists(existing));
        }

        let id = self.next_round_id(&wtxn)?;
        let round = Round::open(id, opened_at);
        let bytes = bincode::serialize(&round).map_err(LmdbError::from)?;
        let key = id.to_be_bytes();

        self.rounds_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, OPEN_ROUND_KEY, &key)
            .map_err(LmdbError::from)?;
        self.meta_db
            .put(
                &mut wtxn,
                NEXT_ROUND_ID_KEY,
                &RoundId::new(id.get() + 1).to_be_bytes(),
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(round_id = %id, opened_at = %opened_at, "round created");
        Ok(round)
    }

    fn increment(&self, round_id: RoundId, color: Color) -> Result<Tally, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut round = self
            .read_round(&wtxn, round_id)?
            .ok_or(StoreError::RoundNotFound(round_id))?;
        if !round.is_open() {
            return Err(StoreError::RoundClosedConflict(round_id));
        }

        round.record(color);
        let bytes = bincode::serialize(&round).map_err(LmdbError::from)?;
        self.rounds_db
            .put(&mut wtxn, &round_id.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(round.tally())
    }

    fn close(
        &self,
        round_id: RoundId,
        rule: WinnerRule,
        closed_at: Timestamp,
    ) -> Result<Round, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut round = self
            .read_round(&wtxn, round_id)?
            .ok_or(StoreError::RoundNotFound(round_id))?;
        if !round.is_open() {
            // Dropping the transaction aborts it; the stored record is final.
            return Ok(round);
        }

        round.finalize(rule, closed_at);
        let bytes = bincode::serialize(&round).map_err(LmdbError::from)?;
        let key = round_id.to_be_bytes();
        self.rounds_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.closed_db
            .put(&mut wtxn, &key, &[])
            .map_err(LmdbError::from)?;
        if self.open_round_id(&wtxn)? == Some(round_id) {
            self.meta_db
                .delete(&mut wtxn, OPEN_ROUND_KEY)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(round_id = %round_id, winner = ?round.winner, "round closed");
        Ok(round)
    }

    fn list_closed(&self, limit: usize) -> Result<Vec<Round>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.closed_db.rev_iter(&rtxn).map_err(LmdbError::from)?;
        let mut rounds = Vec::with_capacity(limit.min(64));
        for entry in iter.take(limit) {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let id = decode_id(key)?;
            let round = self
                .read_round(&rtxn, id)?
                .ok_or_else(|| LmdbError::Corruption(format!("closed round {id} has no record")))?;
            rounds.push(round);
        }
        Ok(rounds)
    }

    fn get_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_round(&rtxn, round_id)?)
    }
}
