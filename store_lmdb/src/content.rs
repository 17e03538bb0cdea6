//! LMDB implementation of ContentStore.
//!
//! Blobs are keyed by the 32-byte digest of their fingerprint. The pin set is a
//! separate database with the same keys and empty values.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use vouch_store::{ContentStore, StoreError};
use vouch_types::Fingerprint;

use crate::LmdbError;

pub struct LmdbContentStore {
    pub(crate) env: Arc<Env>,
    pub(crate) content_db: Database<Bytes, Bytes>,
    pub(crate) pins_db: Database<Bytes, Bytes>,
}

impl ContentStore for LmdbContentStore {
    fn put(&self, bytes: &[u8]) -> Result<Fingerprint, StoreError> {
        let fingerprint = vouch_crypto::fingerprint_of(bytes);
        let key = fingerprint.digest();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .content_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_none()
        {
            self.content_db
                .put(&mut wtxn, key, bytes)
                .map_err(LmdbError::from)?;
            wtxn.commit().map_err(LmdbError::from)?;
        }
        Ok(fingerprint)
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .content_db
            .get(&rtxn, fingerprint.digest())
            .map_err(LmdbError::from)?;
        Ok(val.map(|v| v.to_vec()))
    }

    fn has(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .content_db
            .get(&rtxn, fingerprint.digest())
            .map_err(LmdbError::from)?;
        Ok(val.is_some())
    }

    fn pin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.pins_db
            .put(&mut wtxn, fingerprint.digest(), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn unpin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.pins_db
            .delete(&mut wtxn, fingerprint.digest())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn is_pinned(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .pins_db
            .get(&rtxn, fingerprint.digest())
            .map_err(LmdbError::from)?;
        Ok(val.is_some())
    }

    fn collect_garbage(&self) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut doomed = Vec::new();
        for result in self.content_db.iter(&wtxn).map_err(LmdbError::from)? {
            let (key, _) = result.map_err(LmdbError::from)?;
            if self
                .pins_db
                .get(&wtxn, key)
                .map_err(LmdbError::from)?
                .is_none()
            {
                doomed.push(key.to_vec());
            }
        }
        for key in &doomed {
            self.content_db
                .delete(&mut wtxn, key)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        if !doomed.is_empty() {
            tracing::debug!(removed = doomed.len(), "collected unpinned content");
        }
        Ok(doomed.len())
    }

    fn len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.content_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
