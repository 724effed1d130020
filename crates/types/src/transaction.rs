//! Transactions and their admission-time classification.

use crate::{
    transaction_message, AccountKeyPair, AccountPublicKey, AccountSignature, Address,
    AuthorityPublicKey, Digest, EpochId, LedgerError, LedgerResult, ObjectId, ProtocolConfig,
    ValidatorId, Version,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A declared input object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputObject {
    /// Owned input pinned to the version the sender observed.
    Owned {
        id: ObjectId,
        expected_version: Version,
    },

    /// Shared input read at whatever version consensus order assigns.
    Shared {
        id: ObjectId,
        initial_version: Version,
        mutable: bool,
    },
}

impl InputObject {
    pub fn id(&self) -> ObjectId {
        match self {
            InputObject::Owned { id, .. } | InputObject::Shared { id, .. } => *id,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, InputObject::Shared { .. })
    }

    /// Owned inputs are always writable.
    pub fn is_mutable(&self) -> bool {
        match self {
            InputObject::Owned { .. } => true,
            InputObject::Shared { mutable, .. } => *mutable,
        }
    }
}

/// Staking and epoch-boundary operations. Always ordered by consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceAction {
    AddStake {
        validator: ValidatorId,
        amount: u64,
    },
    WithdrawStake {
        validator: ValidatorId,
        amount: u64,
    },
    RegisterValidator {
        validator: ValidatorId,
        public_key: AuthorityPublicKey,
        stake: u64,
    },
    /// Closes `epoch` and installs the next committee. Naming the epoch keeps
    /// each epoch's closing transaction distinct.
    EndOfEpoch {
        epoch: EpochId,
        next_protocol_version: Option<u64>,
    },
}

/// What a transaction does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Move `amount` out of `coin` into a new coin owned by `recipient`.
    NativeTransfer {
        coin: ObjectId,
        recipient: Address,
        amount: u64,
    },
    /// Hand an owned object to another address.
    TransferObject { object: ObjectId, recipient: Address },
    IncrementCounter { counter: ObjectId, amount: u64 },
    DeleteObject { object: ObjectId },
    /// Executor-defined program; the core only sees its declared inputs.
    Programmable { payload: Vec<u8> },
    Governance(GovernanceAction),
}

impl TransactionKind {
    pub fn as_governance(&self) -> Option<&GovernanceAction> {
        match self {
            TransactionKind::Governance(action) => Some(action),
            _ => None,
        }
    }

    pub fn is_end_of_epoch(&self) -> bool {
        matches!(
            self,
            TransactionKind::Governance(GovernanceAction::EndOfEpoch { .. })
        )
    }
}

/// Unsigned transaction contents. The digest covers exactly these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub sender: Address,
    pub kind: TransactionKind,
    pub inputs: Vec<InputObject>,
    pub gas_budget: u64,
}

impl TransactionData {
    pub fn new(sender: Address, kind: TransactionKind, inputs: Vec<InputObject>) -> Self {
        Self {
            sender,
            kind,
            inputs,
            gas_budget: 1_000,
        }
    }

    pub fn with_gas_budget(mut self, gas_budget: u64) -> Self {
        self.gas_budget = gas_budget;
        self
    }

    pub fn digest(&self) -> Digest {
        Digest::of_serializable(self)
    }

    pub fn owned_inputs(&self) -> impl Iterator<Item = (ObjectId, Version)> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            InputObject::Owned {
                id,
                expected_version,
            } => Some((*id, *expected_version)),
            InputObject::Shared { .. } => None,
        })
    }

    /// Shared inputs as `(id, initial_version, mutable)`.
    pub fn shared_inputs(&self) -> impl Iterator<Item = (ObjectId, Version, bool)> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            InputObject::Shared {
                id,
                initial_version,
                mutable,
            } => Some((*id, *initial_version, *mutable)),
            InputObject::Owned { .. } => None,
        })
    }

    pub fn has_shared_inputs(&self) -> bool {
        self.inputs.iter().any(InputObject::is_shared)
    }

    fn declares_owned(&self, object: &ObjectId) -> bool {
        self.owned_inputs().any(|(id, _)| id == *object)
    }

    /// Structural checks that need no object state.
    pub fn validity_check(&self, config: &ProtocolConfig) -> LedgerResult<()> {
        let invalid = |msg: &str| Err(LedgerError::InvalidTransaction(msg.to_string()));

        if self.inputs.len() > config.max_input_objects {
            return invalid("too many input objects");
        }
        let unique: BTreeSet<_> = self.inputs.iter().map(InputObject::id).collect();
        if unique.len() != self.inputs.len() {
            return invalid("duplicate input object");
        }

        match &self.kind {
            TransactionKind::Governance(action) => {
                if !self.inputs.is_empty() {
                    return invalid("governance transactions take no input objects");
                }
                match action {
                    GovernanceAction::AddStake { amount, .. }
                    | GovernanceAction::WithdrawStake { amount, .. }
                        if *amount == 0 =>
                    {
                        invalid("stake amount must be positive")
                    }
                    GovernanceAction::RegisterValidator { stake: 0, .. } => {
                        invalid("validator registration requires stake")
                    }
                    _ => Ok(()),
                }
            }
            _ if self.inputs.is_empty() => invalid("transaction declares no input objects"),
            TransactionKind::NativeTransfer { coin, amount, .. } => {
                if *amount == 0 {
                    return invalid("transfer amount must be positive");
                }
                if !self.declares_owned(coin) {
                    return invalid("transferred coin must be an owned input");
                }
                Ok(())
            }
            TransactionKind::TransferObject { object, .. } => {
                if !self.declares_owned(object) {
                    return invalid("transferred object must be an owned input");
                }
                Ok(())
            }
            TransactionKind::IncrementCounter { counter, .. } => {
                let declared_mutable = self
                    .inputs
                    .iter()
                    .any(|input| input.id() == *counter && input.is_mutable());
                if !declared_mutable {
                    return invalid("counter must be a mutable input");
                }
                Ok(())
            }
            TransactionKind::DeleteObject { object } => {
                let declared_mutable = self
                    .inputs
                    .iter()
                    .any(|input| input.id() == *object && input.is_mutable());
                if !declared_mutable {
                    return invalid("deleted object must be a mutable input");
                }
                Ok(())
            }
            TransactionKind::Programmable { .. } => Ok(()),
        }
    }
}

/// Transaction signed by its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub data: TransactionData,
    pub sender_public_key: AccountPublicKey,
    pub signature: AccountSignature,
}

impl SignedTransaction {
    pub fn sign(data: TransactionData, keypair: &AccountKeyPair) -> Self {
        let signature = keypair.sign(&transaction_message(&data.digest()));
        Self {
            data,
            sender_public_key: keypair.public_key(),
            signature,
        }
    }

    pub fn digest(&self) -> Digest {
        self.data.digest()
    }

    /// Check the signature and that the signing key controls `data.sender`.
    pub fn verify_sender(&self) -> LedgerResult<()> {
        if Address::from_public_key(&self.sender_public_key) != self.data.sender {
            return Err(LedgerError::InvalidSignature);
        }
        let message = transaction_message(&self.digest());
        if !self.sender_public_key.verify(&message, &self.signature) {
            return Err(LedgerError::InvalidSignature);
        }
        Ok(())
    }
}

/// Why a transaction needs consensus ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusReason {
    Governance,
    SharedObject,
}

/// Admission-time routing decision, carried unchanged with the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionClass {
    /// Owned inputs only: executes on quorum signatures alone.
    FastPath,
    ConsensusRequired(ConsensusReason),
}

impl TransactionClass {
    pub fn classify(data: &TransactionData) -> Self {
        if data.kind.as_governance().is_some() {
            TransactionClass::ConsensusRequired(ConsensusReason::Governance)
        } else if data.has_shared_inputs() {
            TransactionClass::ConsensusRequired(ConsensusReason::SharedObject)
        } else {
            TransactionClass::FastPath
        }
    }

    pub fn requires_consensus(&self) -> bool {
        matches!(self, TransactionClass::ConsensusRequired(_))
    }

    pub fn is_governance(&self) -> bool {
        matches!(
            self,
            TransactionClass::ConsensusRequired(ConsensusReason::Governance)
        )
    }
}
