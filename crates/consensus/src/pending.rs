//! Status of every certificate handed to consensus.

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::trace;
use vireo_core::{ExecutionObserver, PendingStatus};
use vireo_types::{Digest, Effects, LedgerError};

/// Digest -> status channel for consensus-path certificates.
///
/// Written by the adapter (`Pending`), the handler (`Delivered`, failures
/// decided during sequencing) and the execution scheduler through
/// [`ExecutionObserver`] (`Executed`, aborts). Readers subscribe to a
/// `watch` channel per digest.
///
/// Terminal statuses are final, except that a `Failed` entry is reset by a
/// new registration so a transaction can be resubmitted in a later epoch.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: DashMap<Digest, watch::Sender<PendingStatus>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `digest`, returning a receiver for its status.
    ///
    /// Registering a digest that is already tracked subscribes to the existing
    /// entry.
    pub fn register(&self, digest: Digest) -> watch::Receiver<PendingStatus> {
        let entry = self
            .entries
            .entry(digest)
            .or_insert_with(|| watch::Sender::new(PendingStatus::Pending));
        entry.send_if_modified(|status| {
            if matches!(status, PendingStatus::Failed(_)) {
                *status = PendingStatus::Pending;
                return true;
            }
            false
        });
        entry.subscribe()
    }

    pub fn status(&self, digest: &Digest) -> Option<PendingStatus> {
        self.entries.get(digest).map(|entry| entry.borrow().clone())
    }

    pub fn subscribe(&self, digest: &Digest) -> Option<watch::Receiver<PendingStatus>> {
        self.entries.get(digest).map(|entry| entry.subscribe())
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.contains_key(digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered by consensus. Ignored for untracked or finished digests.
    pub fn mark_delivered(&self, digest: &Digest) {
        self.update(digest, PendingStatus::Delivered);
    }

    pub fn complete(&self, effects: &Effects) {
        self.update(
            &effects.transaction_digest,
            PendingStatus::Executed(effects.clone()),
        );
    }

    pub fn fail(&self, digest: &Digest, error: LedgerError) {
        self.update(digest, PendingStatus::Failed(error));
    }

    /// Drop executed entries. Their effects are in the store, which answers
    /// polls from then on. Returns how many were removed.
    pub fn prune_executed(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !matches!(*entry.borrow(), PendingStatus::Executed(_)));
        before - self.entries.len()
    }

    /// Drop every finished entry. Returns how many were removed.
    pub fn prune_terminal(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.borrow().is_terminal());
        before - self.entries.len()
    }

    fn update(&self, digest: &Digest, next: PendingStatus) {
        let Some(entry) = self.entries.get(digest) else {
            return;
        };
        entry.send_if_modified(|status| {
            if status.is_terminal() {
                return false;
            }
            trace!(tx = ?digest, from = status.name(), to = next.name(), "Pending status");
            *status = next;
            true
        });
    }
}

impl ExecutionObserver for PendingTable {
    fn on_executed(&self, effects: &Effects) {
        self.complete(effects);
    }

    fn on_aborted(&self, digest: &Digest, error: &LedgerError) {
        self.fail(digest, error.clone());
    }
}
