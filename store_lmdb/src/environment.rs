//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::{LmdbContentStore, LmdbDidStore, LmdbError, LmdbIndexStore};

/// The schema version written by this code.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Default map size: 4 GiB of address space.
pub const DEFAULT_MAP_SIZE: usize = 4 << 30;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Names of every database this environment creates.
pub(crate) const DATABASES: &[&str] = &[
    "content",
    "pins",
    "entries",
    "by_author",
    "by_subject",
    "order",
    "successors",
    "anchors",
    "dids",
    "meta",
];

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) content_db: Database<Bytes, Bytes>,
    pub(crate) pins_db: Database<Bytes, Bytes>,
    pub(crate) entries_db: Database<Bytes, Bytes>,
    pub(crate) by_author_db: Database<Bytes, Bytes>,
    pub(crate) by_subject_db: Database<Bytes, Bytes>,
    pub(crate) order_db: Database<Bytes, Bytes>,
    pub(crate) successors_db: Database<Bytes, Bytes>,
    pub(crate) anchors_db: Database<Bytes, Bytes>,
    pub(crate) dids_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for a given path and
        // the database files are not modified by anything outside LMDB.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASES.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut create = |name: &str| env.create_database::<Bytes, Bytes>(&mut wtxn, Some(name));
        let content_db = create("content")?;
        let pins_db = create("pins")?;
        let entries_db = create("entries")?;
        let by_author_db = create("by_author")?;
        let by_subject_db = create("by_subject")?;
        let order_db = create("order")?;
        let successors_db = create("successors")?;
        let anchors_db = create("anchors")?;
        let dids_db = create("dids")?;
        let meta_db = create("meta")?;

        let stored = match meta_db.get(&wtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("schema_version has unexpected byte length".into())
                })?;
                u32::from_le_bytes(arr)
            }
            None => 0,
        };
        if stored > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::UnsupportedSchema {
                found: stored,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        if stored < CURRENT_SCHEMA_VERSION {
            meta_db.put(
                &mut wtxn,
                SCHEMA_VERSION_KEY,
                &CURRENT_SCHEMA_VERSION.to_le_bytes(),
            )?;
            tracing::info!(from = stored, to = CURRENT_SCHEMA_VERSION, "initialized database schema");
        }
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            content_db,
            pins_db,
            entries_db,
            by_author_db,
            by_subject_db,
            order_db,
            successors_db,
            anchors_db,
            dids_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn content_store(&self) -> LmdbContentStore {
        LmdbContentStore {
            env: Arc::clone(&self.env),
            content_db: self.content_db,
            pins_db: self.pins_db,
        }
    }

    pub fn index_store(&self) -> LmdbIndexStore {
        LmdbIndexStore {
            env: Arc::clone(&self.env),
            entries_db: self.entries_db,
            by_author_db: self.by_author_db,
            by_subject_db: self.by_subject_db,
            order_db: self.order_db,
            successors_db: self.successors_db,
            anchors_db: self.anchors_db,
            meta_db: self.meta_db,
        }
    }

    pub fn did_store(&self) -> LmdbDidStore {
        LmdbDidStore {
            env: Arc::clone(&self.env),
            dids_db: self.dids_db,
        }
    }

    /// Flush to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
