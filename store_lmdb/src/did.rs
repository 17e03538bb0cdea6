//! LMDB implementation of DidStore.
//!
//! Key format: `did bytes ++ 0x00 ++ version (u64 BE)`, so a prefix scan yields a
//! DID's history in version order.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use vouch_store::{DidStore, StoreError};
use vouch_types::{Did, DidDocument};

use crate::LmdbError;

pub struct LmdbDidStore {
    pub(crate) env: Arc<Env>,
    pub(crate) dids_db: Database<Bytes, Bytes>,
}

fn did_prefix(did: &Did) -> Vec<u8> {
    let mut key = did.as_str().as_bytes().to_vec();
    key.push(0);
    key
}

fn document_key(did: &Did, version: u64) -> Vec<u8> {
    let mut key = did_prefix(did);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

impl DidStore for LmdbDidStore {
    fn append(&self, document: &DidDocument) -> Result<(), StoreError> {
        let key = document_key(&document.id, document.version);
        let bytes = bincode::serialize(document).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .dids_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!(
                "{} version {}",
                document.id, document.version
            )));
        }
        self.dids_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn latest(&self, did: &Did) -> Result<Option<DidDocument>, StoreError> {
        let prefix = did_prefix(did);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut iter = self
            .dids_db
            .rev_prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?;
        match iter.next() {
            Some(result) => {
                let (_key, val) = result.map_err(LmdbError::from)?;
                Ok(Some(bincode::deserialize(val).map_err(LmdbError::from)?))
            }
            None => Ok(None),
        }
    }

    fn version(&self, did: &Did, version: u64) -> Result<Option<DidDocument>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .dids_db
            .get(&rtxn, &document_key(did, version))
            .map_err(LmdbError::from)?
        {
            Some(val) => Ok(Some(bincode::deserialize(val).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn history(&self, did: &Did) -> Result<Vec<DidDocument>, StoreError> {
        let prefix = did_prefix(did);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in self
            .dids_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (_key, val) = result.map_err(LmdbError::from)?;
            results.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(results)
    }

    fn all_documents(&self) -> Result<Vec<DidDocument>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for result in self.dids_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            results.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(results)
    }
}
