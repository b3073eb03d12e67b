//! Host bridge between the interpreter and chain state.

use crate::types::word::Word;
use crate::virtual_machine::errors::VMError;
use std::collections::HashMap;

/// Everything the interpreter may read from or write to its host.
///
/// A VM instance is bound to exactly one context for its lifetime. All
/// operations are pure reads except [`set_contract_variable`], and the host
/// must serialize concurrent mutation of the underlying state itself.
///
/// [`set_contract_variable`]: Context::set_contract_variable
pub trait Context {
    /// The bytecode to execute.
    fn contract(&self) -> Vec<u8>;
    /// Reads persistent storage cell `index`.
    fn contract_variable(&self, index: u8) -> Result<Word, VMError>;
    /// Writes persistent storage cell `index`.
    fn set_contract_variable(&mut self, index: u8, value: Word) -> Result<(), VMError>;
    /// The 64-byte contract account address.
    fn address(&self) -> [u8; 64];
    /// The 32-byte account that deployed the contract.
    fn issuer(&self) -> [u8; 32];
    /// Balance of the contract account.
    fn balance(&self) -> u64;
    /// The 32-byte sender of the running transaction.
    fn sender(&self) -> [u8; 32];
    /// Funds transferred by the running transaction.
    fn amount(&self) -> u64;
    /// Packed `len || bytes` parameter blob of the running transaction.
    fn transaction_data(&self) -> Vec<u8>;
    /// Fee of the running transaction; seeds the gas budget.
    fn fee(&self) -> u64;
    /// Concatenated ECDSA `r || s` signature of the running transaction.
    fn sig1(&self) -> [u8; 64];
}

/// In-memory [`Context`] for unit tests and local contract development.
///
/// Every field is public so tests can stage exactly the chain state they
/// need. The default fee is large enough that programs never starve unless a
/// test lowers it on purpose.
pub struct MockContext {
    pub contract: Vec<u8>,
    pub variables: HashMap<u8, Word>,
    pub address: [u8; 64],
    pub issuer: [u8; 32],
    pub sender: [u8; 32],
    pub balance: u64,
    pub amount: u64,
    pub fee: u64,
    pub transaction_data: Vec<u8>,
    pub sig1: [u8; 64],
}

impl MockContext {
    /// Creates a mock wired to the given bytecode.
    pub fn new(contract: Vec<u8>) -> MockContext {
        MockContext {
            contract,
            variables: HashMap::new(),
            address: [0x41; 64],
            issuer: [0x49; 32],
            sender: [0x53; 32],
            balance: 100,
            amount: 50,
            fee: 1_000_000,
            transaction_data: Vec::new(),
            sig1: [0; 64],
        }
    }
}

impl Context for MockContext {
    fn contract(&self) -> Vec<u8> {
        self.contract.clone()
    }

    fn contract_variable(&self, index: u8) -> Result<Word, VMError> {
        self.variables
            .get(&index)
            .cloned()
            .ok_or(VMError::UnknownContractVariable)
    }

    fn set_contract_variable(&mut self, index: u8, value: Word) -> Result<(), VMError> {
        self.variables.insert(index, value);
        Ok(())
    }

    fn address(&self) -> [u8; 64] {
        self.address
    }

    fn issuer(&self) -> [u8; 32] {
        self.issuer
    }

    fn balance(&self) -> u64 {
        self.balance
    }

    fn sender(&self) -> [u8; 32] {
        self.sender
    }

    fn amount(&self) -> u64 {
        self.amount
    }

    fn transaction_data(&self) -> Vec<u8> {
        self.transaction_data.clone()
    }

    fn fee(&self) -> u64 {
        self.fee
    }

    fn sig1(&self) -> [u8; 64] {
        self.sig1
    }
}
