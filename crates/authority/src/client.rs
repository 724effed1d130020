//! In-process peer client.

use crate::Authority;
use async_trait::async_trait;
use std::sync::Arc;
use vireo_core::ValidatorClient;
use vireo_types::{LedgerResult, SignedTransaction, TransactionVote, ValidatorId};

/// Asks an authority running in the same process for its vote.
#[derive(Debug, Clone)]
pub struct LocalValidatorClient {
    authority: Arc<Authority>,
}

impl LocalValidatorClient {
    pub fn new(authority: Arc<Authority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl ValidatorClient for LocalValidatorClient {
    fn validator_id(&self) -> ValidatorId {
        self.authority.validator_id()
    }

    async fn request_vote(&self, transaction: SignedTransaction) -> LedgerResult<TransactionVote> {
        self.authority.handle_vote_request(&transaction)
    }
}
