use chainvm_derive::Error;

/// Errors that can occur during VM execution.
///
/// The display strings are a compatibility surface: after a failed execution
/// the interpreter deposits them on the evaluation stack, where contracts and
/// hosts observe them byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Read past the end of the bytecode.
    #[error("instructionSet out of bounds")]
    CodeOutOfBounds,
    /// Opcode byte outside the instruction table.
    #[error("Not a valid opCode")]
    InvalidOpCode,
    /// Contract bytecode exceeds the size cap.
    #[error("instruction set too big")]
    ContractTooBig,
    /// Remaining fee cannot cover the next opcode.
    #[error("out of gas")]
    OutOfGas,
    /// Pop from an empty evaluation stack.
    #[error("pop on empty stack")]
    PopOnEmptyStack,
    /// Peek at an empty evaluation stack.
    #[error("peek on empty stack")]
    PeekOnEmptyStack,
    /// Push would exceed the evaluation stack's memory quota.
    #[error("stack overflow")]
    StackOverflow,
    /// Out-of-range access: `roll` depth, array index, or calldata framing.
    #[error("index out of bounds")]
    IndexOutOfBounds,
    /// Division or modulo with a zero divisor.
    #[error("Division by Zero")]
    DivisionByZero,
    /// `call` target of zero or past the end of the bytecode.
    #[error("ReturnAddress out of bounds")]
    ReturnAddressOutOfBounds,
    /// `ret` without a live frame.
    #[error("pop on empty call stack")]
    PopOnEmptyCallStack,
    /// Array element too long for its two-byte length prefix.
    #[error("Invalid argument size of ARRAPPEND")]
    ElementTooLarge,
    /// Array index word wider than two bytes.
    #[error("Wrong index size")]
    WrongIndexSize,
    /// Map lookup for an absent key.
    #[error("key not found")]
    KeyNotFound,
    /// Map append over an existing key.
    #[error("key already exists")]
    DuplicateKey,
    /// Word tag byte is not the array marker.
    #[error("not an array")]
    NotAnArray,
    /// Word tag byte is not the map marker.
    #[error("not a map")]
    NotAMap,
    /// Array encoding with a truncated element.
    #[error("malformed array")]
    MalformedArray,
    /// Map encoding with a truncated entry or wrong entry count.
    #[error("malformed map")]
    MalformedMap,
    /// `checksig` public key is not 64 bytes.
    #[error("Not a valid address")]
    InvalidAddress,
    /// `checksig` hash is not 32 bytes.
    #[error("Not a valid hash")]
    InvalidHash,
    /// Storage read of a contract variable that was never written.
    #[error("contract variable does not exist")]
    UnknownContractVariable,
}
