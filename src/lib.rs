//! Smart contract virtual machine library.
//!
//! Provides a stack-based, gas-metered bytecode interpreter together with the
//! word, container, and host-bridge types it executes over.

pub mod types;
pub mod utils;
pub mod virtual_machine;
