//! Ownership of the current epoch and the transition between epochs.

use crate::{EpochError, EpochInfo, EpochPhase, EpochStore, GovernanceOutcome, PendingStakeChanges};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{error, info, warn};
use vireo_storage::ObjectVersionStore;
use vireo_types::{Certificate, EpochId};

/// Holds the current [`EpochStore`] and drives epoch transitions.
///
/// The epoch store is swapped as a whole through an `ArcSwap`, so every
/// component observes the new committee at the same instant. Staking changes
/// accumulate separately and only reach a committee at the next transition.
///
/// A transition is driven by the consensus handler:
///
/// 1. [`begin_transition`]: phase becomes `Transitioning`, execution stops
/// 2. the handler drains the execution scheduler
/// 3. [`advance`]: the next committee is computed, persisted and swapped in
///
/// If step 3 fails the phase stays `Transitioning` and nothing is applied.
///
/// [`begin_transition`]: EpochManager::begin_transition
/// [`advance`]: EpochManager::advance
pub struct EpochManager {
    current: ArcSwap<EpochStore>,
    phase: RwLock<EpochPhase>,
    pending: Mutex<PendingStakeChanges>,
    store: Arc<ObjectVersionStore>,
}

impl std::fmt::Debug for EpochManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochManager")
            .field("epoch", &self.epoch())
            .field("phase", &self.phase())
            .finish()
    }
}

impl EpochManager {
    /// Start from `genesis`, persisting its snapshot.
    pub fn new(genesis: EpochStore, store: Arc<ObjectVersionStore>) -> Result<Self, EpochError> {
        store.put_epoch_snapshot(genesis.snapshot())?;
        Ok(Self {
            current: ArcSwap::from_pointee(genesis),
            phase: RwLock::new(EpochPhase::Active),
            pending: Mutex::new(PendingStakeChanges::new()),
            store,
        })
    }

    /// Current epoch store. Cheap; callers may hold the `Arc` across awaits.
    pub fn current(&self) -> Arc<EpochStore> {
        self.current.load_full()
    }

    pub fn epoch(&self) -> EpochId {
        self.current.load().epoch()
    }

    pub fn phase(&self) -> EpochPhase {
        *self.phase.read()
    }

    pub fn is_active(&self) -> bool {
        self.phase() == EpochPhase::Active
    }

    pub fn info(&self) -> EpochInfo {
        let current = self.current();
        EpochInfo {
            epoch: current.epoch(),
            phase: self.phase(),
            committee: current.committee().clone(),
            protocol_config: current.protocol_config().clone(),
        }
    }

    /// Apply a governance certificate.
    ///
    /// Staking actions are recorded for the next epoch. `EndOfEpoch` is only
    /// reported; the caller starts the transition. Certificates from senders
    /// outside the epoch's `governance_senders` are rejected.
    pub fn apply_governance(&self, certificate: &Certificate) -> GovernanceOutcome {
        let data = &certificate.transaction.data;
        let Some(action) = data.kind.as_governance() else {
            return GovernanceOutcome::Rejected("not a governance transaction".to_string());
        };
        let current = self.current();
        let outcome = if current.protocol_config().is_governance_sender(&data.sender) {
            self.pending.lock().apply(current.committee(), action)
        } else {
            GovernanceOutcome::Rejected(format!(
                "{} may not send governance transactions",
                data.sender
            ))
        };
        if let GovernanceOutcome::Rejected(reason) = &outcome {
            warn!(tx = ?certificate.digest(), %reason, "Governance action rejected");
        }
        outcome
    }

    /// Stop execution for the current epoch.
    pub fn begin_transition(&self) -> Result<(), EpochError> {
        let mut phase = self.phase.write();
        if *phase == EpochPhase::Transitioning {
            return Err(EpochError::AlreadyTransitioning(self.epoch()));
        }
        *phase = EpochPhase::Transitioning;
        info!(epoch = %self.epoch(), "Epoch transitioning");
        Ok(())
    }

    /// Compute, persist and install the next epoch.
    ///
    /// All-or-nothing: on error the current epoch, its pending stake changes
    /// and the `Transitioning` phase are left untouched.
    pub fn advance(&self, next_protocol_version: Option<u64>) -> Result<Arc<EpochStore>, EpochError> {
        let mut phase = self.phase.write();
        let current = self.current();
        if *phase != EpochPhase::Transitioning {
            return Err(EpochError::NotTransitioning(current.epoch()));
        }

        let mut pending = self.pending.lock();
        let next_epoch = current.epoch().next();
        let protocol_config = current.protocol_config().successor(next_protocol_version);
        let committee = pending
            .next_committee(current.committee(), next_epoch, &protocol_config)
            .inspect_err(|e| {
                error!(epoch = %current.epoch(), error = %e, "Failed to compute next committee");
            })?;

        let next = Arc::new(EpochStore::new(committee, protocol_config));
        self.store
            .put_epoch_snapshot(next.snapshot())
            .inspect_err(|e| {
                error!(epoch = %next.epoch(), error = %e, "Failed to persist epoch snapshot");
            })?;
        self.current.store(next.clone());
        *pending = PendingStakeChanges::new();
        *phase = EpochPhase::Active;

        info!(
            epoch = %next.epoch(),
            validators = next.committee().size(),
            total_stake = next.committee().total_stake(),
            protocol_version = next.protocol_config().protocol_version,
            "Epoch started"
        );
        Ok(next)
    }
}
