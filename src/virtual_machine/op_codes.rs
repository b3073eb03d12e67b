//! Instruction table definitions.
//!
//! The [`for_each_op!`](crate::for_each_op) macro holds the canonical
//! instruction list - numbering, mnemonic, immediate-operand byte count, and
//! gas price - and invokes a callback macro for code generation, so other
//! modules can generate instruction-related code without duplicating the
//! table.
//!
//! The single-byte numbering is part of the on-chain contract format and must
//! never be reordered. Gas is priced flat at 1 per opcode.
//!
//! # Bytecode Format
//!
//! Each instruction is the opcode byte followed by exactly `nargs` immediate
//! bytes. `push` is the one variable-length instruction: its declared
//! immediate is a length byte `n`, followed by `n + 1` big-endian value bytes.

use crate::virtual_machine::errors::VMError;

/// Invokes a callback macro with the complete instruction list.
#[macro_export]
macro_rules! for_each_op {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stack manipulation
            // =========================
            /// push n b0..bn ; decode n+1 immediate bytes as an unsigned big-endian word and push it
            Push = 0x00, "push", 1, 1,
            /// dup ; push a copy of the top of the stack
            Dup = 0x01, "dup", 0, 1,
            /// roll k ; move the element at depth k+1 to the top
            Roll = 0x02, "roll", 1, 1,
            /// pop ; discard the top of the stack
            Pop = 0x03, "pop", 0, 1,
            // =========================
            // Arithmetic / logic
            // =========================
            /// add ; pop right, pop left, push left + right
            Add = 0x04, "add", 0, 1,
            /// sub ; pop right, pop left, push left - right
            Sub = 0x05, "sub", 0, 1,
            /// mult ; pop right, pop left, push left * right
            Mult = 0x06, "mult", 0, 1,
            /// div ; pop right, pop left, push left / right (trap on zero divisor)
            Div = 0x07, "div", 0, 1,
            /// mod ; pop right, pop left, push left mod right (trap on zero divisor)
            Mod = 0x08, "mod", 0, 1,
            /// neg ; negate the top of the stack
            Neg = 0x09, "neg", 0, 1,
            /// eq ; pop two, push 1 if equal else 0
            Eq = 0x0A, "eq", 0, 1,
            /// neq ; pop two, push 1 if unequal else 0
            Neq = 0x0B, "neq", 0, 1,
            /// lt ; pop right, pop left, push 1 if left < right else 0
            Lt = 0x0C, "lt", 0, 1,
            /// gt ; pop right, pop left, push 1 if left > right else 0
            Gt = 0x0D, "gt", 0, 1,
            /// lte ; pop right, pop left, push 1 if left <= right else 0
            Lte = 0x0E, "lte", 0, 1,
            /// gte ; pop right, pop left, push 1 if left >= right else 0
            Gte = 0x0F, "gte", 0, 1,
            /// shiftl k ; shift the top of the stack left by k bits
            ShiftL = 0x10, "shiftl", 1, 1,
            /// shiftr k ; shift the top of the stack right by k bits
            ShiftR = 0x11, "shiftr", 1, 1,
            // =========================
            // Control flow
            // =========================
            /// nop b ; consume one immediate byte, no effect
            Nop = 0x12, "nop", 1, 1,
            /// jmp a2 ; set pc to the 2-byte big-endian target
            Jmp = 0x13, "jmp", 2, 1,
            /// jmpif a2 ; pop a word, jump if it equals exactly 1
            JmpIf = 0x14, "jmpif", 2, 1,
            /// call a2 n ; pop n arguments into a new frame and jump
            Call = 0x15, "call", 3, 1,
            /// callif a2 n ; as call, behind a popped ==1 condition
            CallIf = 0x16, "callif", 3, 1,
            /// callext a32 f4 n ; reserved for cross-contract calls, currently a no-op
            CallExt = 0x17, "callext", 37, 1,
            /// ret ; pop the top frame and resume at its return pc
            Ret = 0x18, "ret", 0, 1,
            // =========================
            // Introspection
            // =========================
            /// size ; pop a word, push its quota-rounded byte size
            Size = 0x19, "size", 0, 1,
            // =========================
            // Storage and locals
            // =========================
            /// sstore i ; pop a word into persistent contract variable i
            SStore = 0x1A, "sstore", 1, 1,
            /// store i ; pop a word into local variable i of the top frame
            Store = 0x1B, "store", 1, 1,
            /// sload i ; push persistent contract variable i
            SLoad = 0x1C, "sload", 1, 1,
            /// load i ; push local variable i of the top frame (zero if unset)
            Load = 0x1D, "load", 1, 1,
            // =========================
            // Environment
            // =========================
            /// address ; push the contract address as a big-endian word
            Address = 0x1E, "address", 0, 1,
            /// issuer ; push the contract issuer as a big-endian word
            Issuer = 0x1F, "issuer", 0, 1,
            /// balance ; push the account balance (little-endian 8-byte view)
            Balance = 0x20, "balance", 0, 1,
            /// caller ; push the transaction sender as a big-endian word
            Caller = 0x21, "caller", 0, 1,
            /// callval ; push the transferred amount (little-endian 8-byte view)
            CallVal = 0x22, "callval", 0, 1,
            /// calldata ; push every length-prefixed transaction parameter
            CallData = 0x23, "calldata", 0, 1,
            // =========================
            // Containers
            // =========================
            /// newmap ; push an empty map word
            NewMap = 0x24, "newmap", 0, 1,
            /// mappush ; pop key, value, map; append and push the map back
            MapPush = 0x25, "mappush", 0, 1,
            /// mapgetval ; pop key, map; push the value stored under key
            MapGetVal = 0x26, "mapgetval", 0, 1,
            /// mapsetval ; pop key, value, map; insert or overwrite and push the map back
            MapSetVal = 0x27, "mapsetval", 0, 1,
            /// mapremove ; pop key, map; drop the entry and push the map back
            MapRemove = 0x28, "mapremove", 0, 1,
            /// newarr ; push an empty array word
            NewArr = 0x29, "newarr", 0, 1,
            /// arrappend ; pop value, array; append and push the array back
            ArrAppend = 0x2A, "arrappend", 0, 1,
            /// arrinsert ; pop index, element, array; overwrite at index and push the array back
            ArrInsert = 0x2B, "arrinsert", 0, 1,
            /// arrremove a2 ; pop the array, remove the element at the immediate index
            ArrRemove = 0x2C, "arrremove", 2, 1,
            /// arrat a2 ; peek the array, push the element at the immediate index
            ArrAt = 0x2D, "arrat", 2, 1,
            // =========================
            // Crypto
            // =========================
            /// sha3 ; pop a word, push the NIST SHA3-256 digest of its magnitude (not Keccak-256)
            Sha3 = 0x2E, "sha3", 0, 1,
            /// checksig ; pop pubkey and hash, push 1 on a valid P-256 signature else 0
            CheckSig = 0x2F, "checksig", 0, 1,
            // =========================
            // Termination
            // =========================
            /// errhalt ; stop with failure, top of stack is the error
            ErrHalt = 0x30, "errhalt", 0, 1,
            /// halt ; stop with success
            Halt = 0x31, "halt", 0, 1,
        }
    };
}

#[macro_export]
macro_rules! define_op_codes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $nargs:expr, $gas:expr
        ),* $(,)?
    ) => {
        /// One-byte instruction of the contract bytecode format.
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        #[repr(u8)]
        pub enum OpCode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for OpCode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(OpCode::$name), )*
                    _ => Err(VMError::InvalidOpCode),
                }
            }
        }

        impl OpCode {
            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( OpCode::$name => $mnemonic, )*
                }
            }

            /// Immediate-operand bytes consumed after the opcode byte.
            ///
            /// `push` declares only its length byte; the value bytes that
            /// follow are variable.
            pub const fn nargs(&self) -> usize {
                match self {
                    $( OpCode::$name => $nargs, )*
                }
            }

            /// Gas subtracted from the remaining fee when dispatching.
            pub const fn gas_price(&self) -> u64 {
                match self {
                    $( OpCode::$name => $gas, )*
                }
            }
        }
    };
}

for_each_op!(define_op_codes);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_is_pinned() {
        assert_eq!(OpCode::Push as u8, 0x00);
        assert_eq!(OpCode::Add as u8, 0x04);
        assert_eq!(OpCode::Jmp as u8, 0x13);
        assert_eq!(OpCode::CallData as u8, 0x23);
        assert_eq!(OpCode::NewArr as u8, 0x29);
        assert_eq!(OpCode::CheckSig as u8, 0x2F);
        assert_eq!(OpCode::Halt as u8, 0x31);
    }

    #[test]
    fn try_from_round_trips() {
        for byte in 0x00..=0x31u8 {
            let op = OpCode::try_from(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
    }

    #[test]
    fn try_from_rejects_unknown_bytes() {
        assert_eq!(OpCode::try_from(0x32), Err(VMError::InvalidOpCode));
        assert_eq!(OpCode::try_from(0xFF), Err(VMError::InvalidOpCode));
    }

    #[test]
    fn operand_widths() {
        assert_eq!(OpCode::Push.nargs(), 1);
        assert_eq!(OpCode::Jmp.nargs(), 2);
        assert_eq!(OpCode::Call.nargs(), 3);
        assert_eq!(OpCode::CallExt.nargs(), 37);
        assert_eq!(OpCode::ArrAt.nargs(), 2);
        assert_eq!(OpCode::Halt.nargs(), 0);
    }

    #[test]
    fn gas_is_flat() {
        for byte in 0x00..=0x31u8 {
            assert_eq!(OpCode::try_from(byte).unwrap().gas_price(), 1);
        }
    }

    #[test]
    fn mnemonics() {
        assert_eq!(OpCode::Push.mnemonic(), "push");
        assert_eq!(OpCode::MapGetVal.mnemonic(), "mapgetval");
        assert_eq!(OpCode::ErrHalt.mnemonic(), "errhalt");
    }
}
