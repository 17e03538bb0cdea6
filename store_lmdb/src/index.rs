//! LMDB implementation of IndexStore.
//!
//! Key formats:
//! - `entries`: `fingerprint digest` -> bincode `IndexEntry`
//! - `order`: `seq (u64 BE)` -> `fingerprint digest`
//! - `by_author` / `by_subject`: `did bytes ++ 0x00 ++ seq (u64 BE)` -> `fingerprint digest`
//! - `successors`: `predecessor digest ++ successor digest` -> empty
//! - `anchors`: `fingerprint digest` -> bincode `AnchorRecord`
//!
//! DIDs never contain a NUL byte, so the separator keeps per-DID prefix scans exact.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use vouch_store::{AnchorRecord, IndexStore, StoreError};
use vouch_types::{Did, Fingerprint, IndexEntry, ListResult, Page};

use crate::LmdbError;

const NEXT_SEQ_KEY: &[u8] = b"index_next_seq";

pub struct LmdbIndexStore {
    pub(crate) env: Arc<Env>,
    pub(crate) entries_db: Database<Bytes, Bytes>,
    pub(crate) by_author_db: Database<Bytes, Bytes>,
    pub(crate) by_subject_db: Database<Bytes, Bytes>,
    pub(crate) order_db: Database<Bytes, Bytes>,
    pub(crate) successors_db: Database<Bytes, Bytes>,
    pub(crate) anchors_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

fn did_prefix(did: &Did) -> Vec<u8> {
    let mut key = Vec::with_capacity(did.as_str().len() + 1);
    key.extend_from_slice(did.as_str().as_bytes());
    key.push(0);
    key
}

fn did_key(did: &Did, seq: u64) -> Vec<u8> {
    let mut key = did_prefix(did);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn successor_key(predecessor: &Fingerprint, successor: &Fingerprint) -> [u8; 64] {
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(predecessor.digest());
    key[32..].copy_from_slice(successor.digest());
    key
}

fn digest_from(bytes: &[u8]) -> Result<Fingerprint, LmdbError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| LmdbError::Serialization("fingerprint digest must be 32 bytes".into()))?;
    Ok(Fingerprint::from_digest(arr))
}

impl LmdbIndexStore {
    fn entry_in(&self, rtxn: &RoTxn, digest: &[u8]) -> Result<IndexEntry, LmdbError> {
        let val = self
            .entries_db
            .get(rtxn, digest)?
            .ok_or_else(|| LmdbError::NotFound("index entry".to_string()))?;
        Ok(bincode::deserialize(val)?)
    }

    /// Walk one DID's secondary keys, decoding only the entries inside `page`.
    fn scan_did(
        &self,
        db: Database<Bytes, Bytes>,
        did: &Did,
        page: &Page,
    ) -> Result<ListResult<IndexEntry>, StoreError> {
        let prefix = did_prefix(did);
        let limit = page.effective_limit();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut rows = Vec::new();
        let mut count = 0;
        for result in db.prefix_iter(&rtxn, &prefix).map_err(LmdbError::from)? {
            let (_key, digest) = result.map_err(LmdbError::from)?;
            if count >= page.offset && rows.len() < limit {
                rows.push(self.entry_in(&rtxn, digest)?);
            }
            count += 1;
        }
        Ok(ListResult { rows, count })
    }
}

impl IndexStore for LmdbIndexStore {
    fn insert_if_absent(&self, entry: &IndexEntry) -> Result<bool, StoreError> {
        let digest = entry.multihash.digest();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .entries_db
            .get(&wtxn, digest)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }

        let seq = match self
            .meta_db
            .get(&wtxn, NEXT_SEQ_KEY)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("index sequence has unexpected byte length".into())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };

        let bytes = bincode::serialize(entry).map_err(LmdbError::from)?;
        self.entries_db
            .put(&mut wtxn, digest, &bytes)
            .map_err(LmdbError::from)?;
        self.order_db
            .put(&mut wtxn, &seq.to_be_bytes(), digest)
            .map_err(LmdbError::from)?;
        self.by_author_db
            .put(&mut wtxn, &did_key(&entry.author, seq), digest)
            .map_err(LmdbError::from)?;
        self.by_subject_db
            .put(&mut wtxn, &did_key(&entry.subject, seq), digest)
            .map_err(LmdbError::from)?;
        if let Some(prev) = &entry.previous_version {
            self.successors_db
                .put(&mut wtxn, &successor_key(prev, &entry.multihash), &[])
                .map_err(LmdbError::from)?;
        }
        self.meta_db
            .put(&mut wtxn, NEXT_SEQ_KEY, &(seq + 1).to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<IndexEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .entries_db
            .get(&rtxn, fingerprint.digest())
            .map_err(LmdbError::from)?
        {
            Some(val) => Ok(Some(bincode::deserialize(val).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn by_author(&self, author: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        self.scan_did(self.by_author_db, author, page)
    }

    fn by_subject(&self, subject: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        self.scan_did(self.by_subject_db, subject, page)
    }

    fn list(&self, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.order_db.len(&rtxn).map_err(LmdbError::from)? as usize;
        let mut rows = Vec::new();
        for result in self
            .order_db
            .iter(&rtxn)
            .map_err(LmdbError::from)?
            .skip(page.offset)
            .take(page.effective_limit())
        {
            let (_seq, digest) = result.map_err(LmdbError::from)?;
            rows.push(self.entry_in(&rtxn, digest)?);
        }
        Ok(ListResult { rows, count })
    }

    fn successors(&self, fingerprint: &Fingerprint) -> Result<Vec<Fingerprint>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in self
            .successors_db
            .prefix_iter(&rtxn, fingerprint.digest())
            .map_err(LmdbError::from)?
        {
            let (key, _) = result.map_err(LmdbError::from)?;
            results.push(digest_from(&key[32..])?);
        }
        Ok(results)
    }

    fn record_anchor(
        &self,
        fingerprint: &Fingerprint,
        anchor: &AnchorRecord,
    ) -> Result<bool, StoreError> {
        let bytes = bincode::serialize(anchor).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .anchors_db
            .get(&wtxn, fingerprint.digest())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }
        self.anchors_db
            .put(&mut wtxn, fingerprint.digest(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn anchor(&self, fingerprint: &Fingerprint) -> Result<Option<AnchorRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .anchors_db
            .get(&rtxn, fingerprint.digest())
            .map_err(LmdbError::from)?
        {
            Some(val) => Ok(Some(bincode::deserialize(val).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for db in [
            self.entries_db,
            self.by_author_db,
            self.by_subject_db,
            self.order_db,
            self.successors_db,
            self.anchors_db,
        ] {
            db.clear(&mut wtxn).map_err(LmdbError::from)?;
        }
        self.meta_db
            .delete(&mut wtxn, NEXT_SEQ_KEY)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::info!("cleared replication index");
        Ok(())
    }

    fn len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.entries_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
