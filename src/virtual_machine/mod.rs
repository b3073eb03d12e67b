//! Stack-based bytecode virtual machine for smart contract execution.
//!
//! The VM interprets a flat byte stream of one-byte opcodes followed by their
//! immediate operands. All values live on an evaluation stack of
//! arbitrary-precision words; function calls push frames holding local
//! variables onto a separate call stack, and dynamic arrays and maps travel
//! across the stack encoded into single words. Chain state is reached only
//! through the [`context::Context`] host bridge.
//!
//! # Modules
//!
//! - [`vm`]: fetch/decode/dispatch loop and opcode semantics
//! - [`op_codes`]: the instruction table (numbering, mnemonics, gas)
//! - [`stack`]: evaluation stack with a byte quota
//! - [`call_stack`]: activation frames and local variables
//! - [`array`], [`map`]: heap objects and their word encodings
//! - [`context`]: host bridge trait plus a mock for tests

pub mod array;
pub mod call_stack;
pub mod context;
pub mod errors;
pub mod map;
pub mod op_codes;
pub mod stack;
pub mod vm;

/// Contracts above this many bytes are rejected before execution starts.
pub const MAX_CONTRACT_SIZE: usize = 100_000;
