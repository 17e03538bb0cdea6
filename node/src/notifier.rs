//! Update notifier: one-shot "record superseded" watches and the
//! `reviewrecord/updated` event stream.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, oneshot};
use vouch_store::{ContentStore, StoreError};
use vouch_types::{Fingerprint, ReviewRecord};

use crate::index::ReplicationIndex;
use crate::metrics::NodeMetrics;

/// Name of the event stream carrying [`RecordUpdated`] events.
pub const RECORD_UPDATED_EVENT: &str = "reviewrecord/updated";

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A watched record was superseded by `new`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordUpdated {
    pub original: Fingerprint,
    pub new: Fingerprint,
    pub record: ReviewRecord,
}

type Callback = Box<dyn FnOnce(RecordUpdated) + Send>;

#[derive(Default)]
struct Watches {
    callbacks: HashMap<Fingerprint, Vec<Callback>>,
    /// Fingerprints with a pending watch feeding the event stream.
    streamed: HashSet<Fingerprint>,
}

pub struct UpdateNotifier {
    index: Arc<ReplicationIndex>,
    content: Arc<dyn ContentStore>,
    metrics: Arc<NodeMetrics>,
    watches: Mutex<Watches>,
    events: broadcast::Sender<RecordUpdated>,
}

impl UpdateNotifier {
    pub fn new(
        index: Arc<ReplicationIndex>,
        content: Arc<dyn ContentStore>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            index,
            content,
            metrics,
            watches: Mutex::new(Watches::default()),
            events,
        }
    }

    /// Receiver of `reviewrecord/updated` events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordUpdated> {
        self.events.subscribe()
    }

    /// Register a one-shot watch on `fingerprint`.
    ///
    /// Fires exactly once: immediately if a successor is already indexed,
    /// otherwise when the first successor is admitted.
    pub fn watch<F>(&self, fingerprint: Fingerprint, callback: F) -> Result<(), StoreError>
    where
        F: FnOnce(RecordUpdated) + Send + 'static,
    {
        self.register(fingerprint, Box::new(callback), false).map(|_| ())
    }

    /// Watch `fingerprint` and receive the update on a channel.
    pub fn watch_once(&self, fingerprint: Fingerprint) -> Result<oneshot::Receiver<RecordUpdated>, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.watch(fingerprint, move |update| {
            let _ = tx.send(update);
        })?;
        Ok(rx)
    }

    /// Feed the next update of `fingerprint` into the event stream.
    ///
    /// At most one stream watch is pending per fingerprint; returns `false`
    /// when one already is.
    pub fn watch_stream(&self, fingerprint: Fingerprint) -> Result<bool, StoreError> {
        let events = self.events.clone();
        self.register(
            fingerprint,
            Box::new(move |update| {
                let _ = events.send(update);
            }),
            true,
        )
    }

    fn register(&self, fingerprint: Fingerprint, callback: Callback, streamed: bool) -> Result<bool, StoreError> {
        let update = {
            let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
            if streamed && watches.streamed.contains(&fingerprint) {
                return Ok(false);
            }
            match self.existing_update(&fingerprint)? {
                Some(update) => update,
                None => {
                    if streamed {
                        watches.streamed.insert(fingerprint);
                    }
                    watches.callbacks.entry(fingerprint).or_default().push(callback);
                    return Ok(true);
                }
            }
        };
        tracing::debug!(original = %update.original, new = %update.new, "watched record already superseded");
        self.metrics.update_notifications.inc();
        callback(update);
        Ok(true)
    }

    fn existing_update(&self, fingerprint: &Fingerprint) -> Result<Option<RecordUpdated>, StoreError> {
        let Some(new) = self.index.successors(fingerprint)?.into_iter().next() else {
            return Ok(None);
        };
        let Some(bytes) = self.content.get(&new)? else {
            return Ok(None);
        };
        let record = ReviewRecord::from_canonical_bytes(&bytes)?;
        Ok(Some(RecordUpdated {
            original: *fingerprint,
            new,
            record,
        }))
    }

    /// Fire and drop every watch on `original`. Returns how many fired.
    ///
    /// Called once per newly admitted successor, after its index entry exists.
    pub fn notify_successor(&self, original: &Fingerprint, new: Fingerprint, record: &ReviewRecord) -> usize {
        let callbacks = {
            let mut watches = self.watches.lock().unwrap_or_else(|e| e.into_inner());
            watches.streamed.remove(original);
            watches.callbacks.remove(original).unwrap_or_default()
        };
        let fired = callbacks.len();
        for callback in callbacks {
            callback(RecordUpdated {
                original: *original,
                new,
                record: record.clone(),
            });
        }
        if fired > 0 {
            tracing::debug!(%original, %new, fired, "delivered update notifications");
            self.metrics.update_notifications.inc_by(fired as u64);
        }
        fired
    }

    /// Number of fingerprints with pending watches.
    pub fn watched(&self) -> usize {
        self.watches.lock().unwrap_or_else(|e| e.into_inner()).callbacks.len()
    }
}
