//! Pinning service: keeps admitted content from being garbage collected.

use std::sync::{Arc, RwLock};

use vouch_store::{ContentStore, StoreError};
use vouch_types::Fingerprint;

/// Called with the fingerprint on every pin request.
pub type PinHook = Arc<dyn Fn(&Fingerprint) + Send + Sync>;

pub struct PinningService {
    content: Arc<dyn ContentStore>,
    pins_everything: bool,
    hook: RwLock<Option<PinHook>>,
}

impl PinningService {
    pub fn new(content: Arc<dyn ContentStore>, pins_everything: bool) -> Self {
        Self {
            content,
            pins_everything,
            hook: RwLock::new(None),
        }
    }

    /// Whether this node pins every record it admits.
    pub fn pins_everything(&self) -> bool {
        self.pins_everything
    }

    pub fn set_hook(&self, hook: Option<PinHook>) {
        *self.hook.write().unwrap_or_else(|e| e.into_inner()) = hook;
    }

    /// Pin `fingerprint`. Idempotent; the hook sees every call.
    pub fn pin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.content.pin(fingerprint)?;
        tracing::trace!(%fingerprint, "pinned");
        let hook = self.hook.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(hook) = hook {
            hook(fingerprint);
        }
        Ok(())
    }

    pub fn unpin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.content.unpin(fingerprint)
    }

    pub fn is_pinned(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        self.content.is_pinned(fingerprint)
    }

    /// Delete unpinned content. Nodes that pin everything never collect.
    pub fn collect_garbage(&self) -> Result<usize, StoreError> {
        if self.pins_everything {
            tracing::debug!("garbage collection refused on archival node");
            return Ok(0);
        }
        let removed = self.content.collect_garbage()?;
        tracing::info!(removed, "collected unpinned content");
        Ok(removed)
    }
}
