//! Submission of certificates to the consensus engine.

use crate::PendingTable;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};
use vireo_core::{ConsensusEngine, PendingStatus};
use vireo_types::{Certificate, Digest, LedgerError};

/// Caller's view of one proposal.
#[derive(Debug, Clone)]
pub struct SubmissionHandle {
    digest: Digest,
    receiver: watch::Receiver<PendingStatus>,
}

impl SubmissionHandle {
    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn status(&self) -> PendingStatus {
        self.receiver.borrow().clone()
    }

    /// Wait until the certificate is executed or has failed.
    ///
    /// A dropped proposal never completes; callers bound this with a timeout
    /// and propose again.
    pub async fn wait(&mut self) -> PendingStatus {
        if let Ok(status) = self.receiver.wait_for(PendingStatus::is_terminal).await {
            return (*status).clone();
        }
        // Table entry gone: report the last value seen.
        self.receiver.borrow().clone()
    }
}

/// Hands consensus-path certificates to the consensus engine and tracks them
/// in the pending table.
pub struct ConsensusAdapter {
    engine: Arc<dyn ConsensusEngine>,
    pending: Arc<PendingTable>,
}

impl std::fmt::Debug for ConsensusAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusAdapter")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ConsensusAdapter {
    pub fn new(engine: Arc<dyn ConsensusEngine>, pending: Arc<PendingTable>) -> Self {
        Self { engine, pending }
    }

    pub fn pending(&self) -> &Arc<PendingTable> {
        &self.pending
    }

    /// Propose `certificate` for ordering.
    ///
    /// Proposing a certificate again is harmless: the handler sequences each
    /// digest once. A certificate that already has a terminal outcome is not
    /// proposed again. Engine errors are reported on the handle as
    /// `ConsensusUnavailable`.
    pub fn propose(&self, certificate: Certificate) -> SubmissionHandle {
        let digest = certificate.digest();
        let receiver = self.pending.register(digest);
        let handle = SubmissionHandle { digest, receiver };
        if handle.status().is_terminal() {
            debug!(tx = ?digest, "Already finished, not proposing");
            return handle;
        }

        match self.engine.submit(certificate) {
            Ok(()) => debug!(tx = ?digest, "Proposed to consensus"),
            Err(e) => {
                warn!(tx = ?digest, error = %e, "Consensus submission failed");
                self.pending
                    .fail(&digest, LedgerError::ConsensusUnavailable(e.to_string()));
            }
        }
        handle
    }
}
