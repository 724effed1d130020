//! Seeded in-process total-order broadcast.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};
use vireo_core::{ConsensusEngine, ConsensusError};
use vireo_types::{Certificate, CommitIndex, ConsensusCommit, EpochId};

#[derive(Debug)]
struct EngineState {
    rng: ChaCha8Rng,
    queue: Vec<Certificate>,
    drop_probability: f64,
    epoch: EpochId,
    next_index: CommitIndex,
    timestamp_ms: u64,
    dropped: usize,
    shut_down: bool,
}

/// Consensus engine for simulation.
///
/// Proposals are queued and cut into commits on demand. The queue is shuffled
/// before every cut, and a proposal may be dropped with a configured
/// probability. Both use one seeded RNG, so a seed reproduces a run exactly.
#[derive(Debug)]
pub struct SimulatedConsensus {
    state: Mutex<EngineState>,
}

impl SimulatedConsensus {
    pub fn new(seed: u64, drop_probability: f64) -> Self {
        Self {
            state: Mutex::new(EngineState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                queue: Vec::new(),
                drop_probability: drop_probability.clamp(0.0, 1.0),
                epoch: EpochId::GENESIS,
                next_index: CommitIndex(0),
                timestamp_ms: 0,
                dropped: 0,
                shut_down: false,
            }),
        }
    }

    pub fn set_drop_probability(&self, probability: f64) {
        self.state.lock().drop_probability = probability.clamp(0.0, 1.0);
    }

    /// Proposals waiting for the next commit.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn dropped(&self) -> usize {
        self.state.lock().dropped
    }

    /// Refuse all further proposals.
    pub fn shutdown(&self) {
        self.state.lock().shut_down = true;
    }

    /// Cut up to `max_size` queued proposals into the next commit of `epoch`.
    ///
    /// Indices restart at zero when `epoch` changes. Always returns a commit,
    /// possibly empty; empty commits still let deferred certificates run.
    pub fn next_commit(&self, epoch: EpochId, max_size: usize) -> ConsensusCommit {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            state.epoch = epoch;
            state.next_index = CommitIndex(0);
        }

        let EngineState { rng, queue, .. } = &mut *state;
        queue.shuffle(rng);
        let take = max_size.min(queue.len());
        let certificates: Vec<_> = queue.drain(..take).collect();

        let index = state.next_index;
        state.next_index = index.next();
        state.timestamp_ms += 100;
        debug!(epoch = %epoch, commit = %index, certificates = certificates.len(), "Cut commit");
        ConsensusCommit {
            epoch,
            index,
            timestamp_ms: state.timestamp_ms,
            certificates,
        }
    }
}

impl ConsensusEngine for SimulatedConsensus {
    fn submit(&self, certificate: Certificate) -> Result<(), ConsensusError> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(ConsensusError::Shutdown);
        }
        let probability = state.drop_probability;
        if probability > 0.0 && state.rng.gen_bool(probability) {
            state.dropped += 1;
            debug!(tx = ?certificate.digest(), "Dropped proposal");
            return Ok(());
        }
        trace!(tx = ?certificate.digest(), "Queued proposal");
        state.queue.push(certificate);
        Ok(())
    }
}
