//! Core virtual machine implementation.
//!
//! The VM executes contract bytecode with a fetch/decode/dispatch loop over
//! the instruction table in [`op_codes`](super::op_codes). Every operand
//! travels over the evaluation stack as a [`Word`]; gas is charged per opcode
//! from the transaction fee before dispatch.
//!
//! Execution never surfaces a `Result` to the host. The first failure
//! deposits its ASCII message on the evaluation stack and [`VM::exec`]
//! returns `false`; the host reads the message back through
//! [`VM::error_message`]. Contracts rely on that convention (`errhalt`
//! reports whatever they staged on top), so it is part of the execution
//! format rather than an implementation choice.

use crate::types::word::Word;
use crate::virtual_machine::MAX_CONTRACT_SIZE;
use crate::virtual_machine::array::Array;
use crate::virtual_machine::call_stack::{CallStack, Frame};
use crate::virtual_machine::context::{Context, MockContext};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::map::Map;
use crate::virtual_machine::op_codes::OpCode;
use crate::virtual_machine::stack::{Stack, element_size};
use crate::{info, warn};
use p256::EncodedPoint;
use p256::FieldBytes;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use sha3::{Digest, Sha3_256};

/// Outcome of one dispatched instruction.
enum Flow {
    Continue,
    Halt,
    ErrHalt,
}

/// Bytecode virtual machine bound to one host context and one execution.
pub struct VM<C: Context> {
    /// Bytecode to execute, loaded from the context at `exec`.
    code: Vec<u8>,
    /// Program counter (current position in bytecode).
    pc: usize,
    /// Remaining gas, seeded from the transaction fee.
    fee: u64,
    evaluation_stack: Stack,
    call_stack: CallStack,
    context: C,
}

impl VM<MockContext> {
    /// Creates a VM over the given bytecode and a default mock host.
    pub fn new_test(byte_code: Vec<u8>) -> VM<MockContext> {
        VM::new(MockContext::new(byte_code))
    }
}

impl<C: Context> VM<C> {
    /// Creates a VM bound to `context`.
    pub fn new(context: C) -> VM<C> {
        VM {
            code: Vec::new(),
            pc: 0,
            fee: 0,
            evaluation_stack: Stack::new(),
            call_stack: CallStack::new(),
            context,
        }
    }

    /// Returns the host context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Returns the host context mutably, for staging state before `exec`.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Runs the contract to completion.
    ///
    /// Returns `true` when the contract reached `halt`. On any failure -
    /// including a contract-requested `errhalt` - returns `false` with the
    /// error message on top of the evaluation stack. With `trace` set, every
    /// iteration prints `pc: mnemonic operands stack` to stdout.
    pub fn exec(&mut self, trace: bool) -> bool {
        self.code = self.context.contract();
        if self.code.len() > MAX_CONTRACT_SIZE {
            self.push_error(VMError::ContractTooBig);
            return false;
        }
        self.fee = self.context.fee();

        loop {
            if trace {
                self.trace();
            }

            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => return true,
                Ok(Flow::ErrHalt) => return false,
                Err(err) => {
                    self.push_error(err);
                    return false;
                }
            }
        }
    }

    /// Decodes the top of the evaluation stack as text.
    ///
    /// After a failed `exec` this is the error message of the failure.
    pub fn error_message(&self) -> String {
        match self.evaluation_stack.peek() {
            Ok(word) => word.to_text(),
            Err(err) => err.to_string(),
        }
    }

    /// Fetches one instruction, charges its gas, and dispatches it.
    fn step(&mut self) -> Result<Flow, VMError> {
        let op = OpCode::try_from(self.fetch()?)?;

        self.fee = self
            .fee
            .checked_sub(op.gas_price())
            .ok_or(VMError::OutOfGas)?;

        match op {
            OpCode::Push => self.op_push()?,
            OpCode::Dup => self.op_dup()?,
            OpCode::Roll => self.op_roll()?,
            OpCode::Pop => {
                self.evaluation_stack.pop()?;
            }
            OpCode::Add => self.op_binary(|left, right| left + right)?,
            OpCode::Sub => self.op_binary(|left, right| left - right)?,
            OpCode::Mult => self.op_binary(|left, right| left * right)?,
            OpCode::Div => self.op_div()?,
            OpCode::Mod => self.op_mod()?,
            OpCode::Neg => self.op_neg()?,
            OpCode::Eq => self.op_compare(|left, right| left == right)?,
            OpCode::Neq => self.op_compare(|left, right| left != right)?,
            OpCode::Lt => self.op_compare(|left, right| left < right)?,
            OpCode::Gt => self.op_compare(|left, right| left > right)?,
            OpCode::Lte => self.op_compare(|left, right| left <= right)?,
            OpCode::Gte => self.op_compare(|left, right| left >= right)?,
            OpCode::ShiftL => self.op_shift(Word::shl)?,
            OpCode::ShiftR => self.op_shift(Word::shr)?,
            OpCode::Nop => {
                self.fetch()?;
            }
            OpCode::Jmp => self.op_jmp()?,
            OpCode::JmpIf => self.op_jmpif()?,
            OpCode::Call => self.op_call()?,
            OpCode::CallIf => self.op_callif()?,
            OpCode::CallExt => self.op_callext()?,
            OpCode::Ret => self.op_ret()?,
            OpCode::Size => self.op_size()?,
            OpCode::SStore => self.op_sstore()?,
            OpCode::Store => self.op_store()?,
            OpCode::SLoad => self.op_sload()?,
            OpCode::Load => self.op_load()?,
            OpCode::Address => self.op_address()?,
            OpCode::Issuer => self.op_issuer()?,
            OpCode::Balance => self.push_le_u64(self.context.balance())?,
            OpCode::Caller => self.op_caller()?,
            OpCode::CallVal => self.push_le_u64(self.context.amount())?,
            OpCode::CallData => self.op_calldata()?,
            OpCode::NewMap => self.evaluation_stack.push(Map::new().to_word())?,
            OpCode::MapPush => self.op_mappush()?,
            OpCode::MapGetVal => self.op_mapgetval()?,
            OpCode::MapSetVal => self.op_mapsetval()?,
            OpCode::MapRemove => self.op_mapremove()?,
            OpCode::NewArr => self.evaluation_stack.push(Array::new().to_word())?,
            OpCode::ArrAppend => self.op_arrappend()?,
            OpCode::ArrInsert => self.op_arrinsert()?,
            OpCode::ArrRemove => self.op_arrremove()?,
            OpCode::ArrAt => self.op_arrat()?,
            OpCode::Sha3 => self.op_sha3()?,
            OpCode::CheckSig => self.op_checksig()?,
            OpCode::ErrHalt => return Ok(Flow::ErrHalt),
            OpCode::Halt => return Ok(Flow::Halt),
        }

        Ok(Flow::Continue)
    }

    // =========================
    // Code stream
    // =========================

    /// Reads the byte at `pc` and advances past it.
    fn fetch(&mut self) -> Result<u8, VMError> {
        let byte = *self.code.get(self.pc).ok_or(VMError::CodeOutOfBounds)?;
        self.pc += 1;
        Ok(byte)
    }

    /// Reads `count` bytes at `pc` and advances past them.
    ///
    /// Requires at least one byte to remain beyond the operands: a program
    /// whose final operand bytes end flush with the code faults. Contracts
    /// are laid out against this bound, so it must stay strict.
    fn fetch_many(&mut self, count: usize) -> Result<Vec<u8>, VMError> {
        if self.code.len().saturating_sub(self.pc) <= count {
            return Err(VMError::CodeOutOfBounds);
        }
        let bytes = self.code[self.pc..self.pc + count].to_vec();
        self.pc += count;
        Ok(bytes)
    }

    /// Reads a 2-byte big-endian code address.
    fn fetch_target(&mut self) -> Result<usize, VMError> {
        let bytes = self.fetch_many(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]) as usize)
    }

    // =========================
    // Shared helpers
    // =========================

    /// Deposits an error word without charging the stack quota, so the
    /// message lands even when the quota itself failed the execution.
    fn push_error(&mut self, err: VMError) {
        self.evaluation_stack
            .push_unmetered(Word::from_text(&err.to_string()));
    }

    fn push_bool(&mut self, value: bool) -> Result<(), VMError> {
        self.evaluation_stack.push(Word::from(u64::from(value)))
    }

    /// Pushes the little-endian byte view of `value`, the historical wire
    /// form of balances and amounts.
    fn push_le_u64(&mut self, value: u64) -> Result<(), VMError> {
        self.evaluation_stack
            .push(Word::from_be_bytes(&value.to_le_bytes()))
    }

    /// Pops the two operands of a binary operator: right first, then left,
    /// so that the stack order `a b op` computes `a op b`.
    fn pop_operands(&mut self) -> Result<(Word, Word), VMError> {
        let right = self.evaluation_stack.pop()?;
        let left = self.evaluation_stack.pop()?;
        Ok((left, right))
    }

    fn pop_map(&mut self) -> Result<Map, VMError> {
        let word = self.evaluation_stack.pop()?;
        Map::from_word(&word)
    }

    fn pop_array(&mut self) -> Result<Array, VMError> {
        let word = self.evaluation_stack.pop()?;
        Array::from_word(&word)
    }

    // =========================
    // Stack manipulation
    // =========================

    fn op_push(&mut self) -> Result<(), VMError> {
        let count = self.fetch()? as usize + 1;
        let bytes = self.fetch_many(count)?;
        self.evaluation_stack.push(Word::from_be_bytes(&bytes))
    }

    fn op_dup(&mut self) -> Result<(), VMError> {
        let top = self.evaluation_stack.peek()?;
        self.evaluation_stack.push(top)
    }

    fn op_roll(&mut self) -> Result<(), VMError> {
        let depth = self.fetch()? as usize;
        let len = self.evaluation_stack.len();

        // A roll that reaches the bottom element is ignored.
        if depth + 1 == len {
            return Ok(());
        }
        if depth >= len {
            return Err(VMError::IndexOutOfBounds);
        }

        let value = self.evaluation_stack.pop_index_at(len - depth - 2)?;
        self.evaluation_stack.push(value)
    }

    // =========================
    // Arithmetic / logic
    // =========================

    fn op_binary(&mut self, op: impl FnOnce(Word, Word) -> Word) -> Result<(), VMError> {
        let (left, right) = self.pop_operands()?;
        self.evaluation_stack.push(op(left, right))
    }

    fn op_compare(&mut self, op: impl FnOnce(&Word, &Word) -> bool) -> Result<(), VMError> {
        let (left, right) = self.pop_operands()?;
        self.push_bool(op(&left, &right))
    }

    fn op_div(&mut self) -> Result<(), VMError> {
        let (left, right) = self.pop_operands()?;
        let quotient = left.checked_div(&right).ok_or(VMError::DivisionByZero)?;
        self.evaluation_stack.push(quotient)
    }

    fn op_mod(&mut self) -> Result<(), VMError> {
        let (left, right) = self.pop_operands()?;
        let remainder = left.checked_rem(&right).ok_or(VMError::DivisionByZero)?;
        self.evaluation_stack.push(remainder)
    }

    fn op_neg(&mut self) -> Result<(), VMError> {
        let top = self.evaluation_stack.pop()?;
        self.evaluation_stack.push(-top)
    }

    fn op_shift(&mut self, op: impl FnOnce(Word, usize) -> Word) -> Result<(), VMError> {
        let bits = self.fetch()? as usize;
        let top = self.evaluation_stack.pop()?;
        self.evaluation_stack.push(op(top, bits))
    }

    // =========================
    // Control flow
    // =========================

    fn op_jmp(&mut self) -> Result<(), VMError> {
        self.pc = self.fetch_target()?;
        Ok(())
    }

    fn op_jmpif(&mut self) -> Result<(), VMError> {
        let target = self.fetch_target()?;
        let condition = self.evaluation_stack.pop()?;
        if condition.is_one() {
            self.pc = target;
        }
        Ok(())
    }

    fn op_call(&mut self) -> Result<(), VMError> {
        let target = self.fetch_target()?;
        let argc = self.fetch()?;
        self.enter_frame(target, argc)
    }

    fn op_callif(&mut self) -> Result<(), VMError> {
        // Operands are consumed whether or not the call is taken.
        let target = self.fetch_target()?;
        let argc = self.fetch()?;
        let condition = self.evaluation_stack.pop()?;
        if condition.is_one() {
            self.enter_frame(target, argc)?;
        }
        Ok(())
    }

    /// Pops `argc` arguments into a fresh frame and jumps to `target`.
    ///
    /// The top of the stack becomes the highest-numbered variable. The frame
    /// resumes just past the `call` operands.
    fn enter_frame(&mut self, target: usize, argc: u8) -> Result<(), VMError> {
        if target == 0 || target > self.code.len() {
            return Err(VMError::ReturnAddressOutOfBounds);
        }

        let mut frame = Frame::new(self.pc);
        for index in (0..argc).rev() {
            frame.set_variable(index, self.evaluation_stack.pop()?);
        }

        self.call_stack.push(frame);
        self.pc = target;
        Ok(())
    }

    fn op_callext(&mut self) -> Result<(), VMError> {
        // Reserved for cross-contract invocation: the operands are consumed
        // and gas is paid, but no call happens.
        let account = self.fetch_many(32)?;
        let function = self.fetch_many(4)?;
        let argc = self.fetch()?;
        warn!(
            "callext to account {:02x?} function {:02x?} with {} args is not wired up",
            account, function, argc
        );
        Ok(())
    }

    fn op_ret(&mut self) -> Result<(), VMError> {
        self.pc = self.call_stack.pop()?.return_pc;
        Ok(())
    }

    // =========================
    // Introspection
    // =========================

    fn op_size(&mut self) -> Result<(), VMError> {
        let top = self.evaluation_stack.pop()?;
        self.evaluation_stack
            .push(Word::from(element_size(top.bit_len())))
    }

    // =========================
    // Storage and locals
    // =========================

    fn op_sstore(&mut self) -> Result<(), VMError> {
        let index = self.fetch()?;
        let value = self.evaluation_stack.pop()?;
        self.context.set_contract_variable(index, value)
    }

    fn op_sload(&mut self) -> Result<(), VMError> {
        let index = self.fetch()?;
        let value = self.context.contract_variable(index)?;
        self.evaluation_stack.push(value)
    }

    fn op_store(&mut self) -> Result<(), VMError> {
        let index = self.fetch()?;
        let value = self.evaluation_stack.pop()?;
        self.call_stack.peek_mut()?.set_variable(index, value);
        Ok(())
    }

    fn op_load(&mut self) -> Result<(), VMError> {
        let index = self.fetch()?;
        let value = self.call_stack.peek()?.variable(index);
        self.evaluation_stack.push(value)
    }

    // =========================
    // Environment
    // =========================

    fn op_address(&mut self) -> Result<(), VMError> {
        let address = self.context.address();
        self.evaluation_stack.push(Word::from_be_bytes(&address))
    }

    fn op_issuer(&mut self) -> Result<(), VMError> {
        let issuer = self.context.issuer();
        self.evaluation_stack.push(Word::from_be_bytes(&issuer))
    }

    fn op_caller(&mut self) -> Result<(), VMError> {
        let sender = self.context.sender();
        self.evaluation_stack.push(Word::from_be_bytes(&sender))
    }

    /// Pushes every transaction parameter, first to last.
    ///
    /// Each parameter is a length byte followed by `len + 1` payload bytes,
    /// so the cursor advances `len + 2` per record.
    fn op_calldata(&mut self) -> Result<(), VMError> {
        let data = self.context.transaction_data();
        let mut cursor = 0;
        while cursor < data.len() {
            let len = data[cursor] as usize;
            if data.len() - cursor - 1 <= len {
                return Err(VMError::IndexOutOfBounds);
            }
            self.evaluation_stack
                .push(Word::from_be_bytes(&data[cursor + 1..cursor + len + 2]))?;
            cursor += len + 2;
        }
        Ok(())
    }

    // =========================
    // Containers
    // =========================

    fn op_mappush(&mut self) -> Result<(), VMError> {
        let key = self.evaluation_stack.pop()?;
        let value = self.evaluation_stack.pop()?;
        let mut map = self.pop_map()?;

        map.append(key.to_bytes(), value.to_bytes())?;
        self.evaluation_stack.push(map.to_word())
    }

    fn op_mapgetval(&mut self) -> Result<(), VMError> {
        let key = self.evaluation_stack.pop()?;
        let map = self.pop_map()?;

        let value = map.get_val(&key.to_bytes())?;
        self.evaluation_stack.push(Word::from_be_bytes(&value))
    }

    fn op_mapsetval(&mut self) -> Result<(), VMError> {
        let key = self.evaluation_stack.pop()?;
        let value = self.evaluation_stack.pop()?;
        let mut map = self.pop_map()?;

        map.set_val(key.to_bytes(), value.to_bytes())?;
        self.evaluation_stack.push(map.to_word())
    }

    fn op_mapremove(&mut self) -> Result<(), VMError> {
        let key = self.evaluation_stack.pop()?;
        let mut map = self.pop_map()?;

        map.remove(&key.to_bytes());
        self.evaluation_stack.push(map.to_word())
    }

    fn op_arrappend(&mut self) -> Result<(), VMError> {
        let value = self.evaluation_stack.pop()?;
        let mut array = self.pop_array()?;

        array.append(value.to_bytes())?;
        self.evaluation_stack.push(array.to_word())
    }

    fn op_arrinsert(&mut self) -> Result<(), VMError> {
        let index = self.evaluation_stack.pop()?.to_bytes();
        if index.len() > 2 {
            return Err(VMError::WrongIndexSize);
        }

        let element = self.evaluation_stack.pop()?;
        let mut array = self.pop_array()?;

        let index = u16_from_be(&index);
        if index as usize >= array.size() {
            return Err(VMError::IndexOutOfBounds);
        }

        array.insert(index, element.to_bytes())?;
        self.evaluation_stack.push(array.to_word())
    }

    fn op_arrremove(&mut self) -> Result<(), VMError> {
        let word = self.evaluation_stack.pop()?;
        let bytes = self.fetch_many(2)?;
        let index = u16::from_be_bytes([bytes[0], bytes[1]]);

        let mut array = Array::from_word(&word)?;
        array.remove(index)?;
        self.evaluation_stack.push(array.to_word())
    }

    fn op_arrat(&mut self) -> Result<(), VMError> {
        // The array is peeked, not popped: it stays beneath the element so
        // contracts can chain reads without re-pushing it.
        let word = self.evaluation_stack.peek()?;
        let bytes = self.fetch_many(2)?;
        let index = u16::from_be_bytes([bytes[0], bytes[1]]);

        let array = Array::from_word(&word)?;
        let element = array.at(index)?;
        self.evaluation_stack.push(Word::from_be_bytes(&element))
    }

    // =========================
    // Crypto
    // =========================

    fn op_sha3(&mut self) -> Result<(), VMError> {
        let top = self.evaluation_stack.pop()?;
        let digest = Sha3_256::digest(top.to_bytes());
        self.evaluation_stack.push(Word::from_be_bytes(&digest))
    }

    fn op_checksig(&mut self) -> Result<(), VMError> {
        let public_key = self.evaluation_stack.pop()?.to_bytes();
        let hash = self.evaluation_stack.pop()?.to_bytes();

        if public_key.len() != 64 {
            return Err(VMError::InvalidAddress);
        }
        if hash.len() != 32 {
            return Err(VMError::InvalidHash);
        }

        let sig = self.context.sig1();
        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&public_key[..32]),
            FieldBytes::from_slice(&public_key[32..]),
            false,
        );

        // A public key off the curve or a degenerate signature verifies as
        // false rather than faulting.
        let valid = match (
            VerifyingKey::from_encoded_point(&point),
            Signature::from_scalars(
                FieldBytes::clone_from_slice(&sig[..32]),
                FieldBytes::clone_from_slice(&sig[32..]),
            ),
        ) {
            (Ok(key), Ok(signature)) => key.verify_prehash(&hash, &signature).is_ok(),
            _ => false,
        };

        if valid {
            info!("valid signature for digest {:02x?}", hash);
        }
        self.push_bool(valid)
    }

    // =========================
    // Diagnostics
    // =========================

    /// Prints the instruction at `pc` and the current stack to stdout.
    fn trace(&self) {
        let Some(&byte) = self.code.get(self.pc) else {
            return;
        };
        let Ok(op) = OpCode::try_from(byte) else {
            println!("{:04}: 0x{:02x} {}", self.pc, byte, self.evaluation_stack);
            return;
        };

        let nargs = match op {
            // The length byte of push tells how many value bytes follow.
            OpCode::Push => self.code.get(self.pc + 1).map_or(1, |&n| n as usize + 2),
            _ => op.nargs(),
        };
        let end = (self.pc + 1 + nargs).min(self.code.len());
        let start = (self.pc + 1).min(end);

        println!(
            "{:04}: {:<9} {:02x?} {}",
            self.pc,
            op.mnemonic(),
            &self.code[start..end],
            self.evaluation_stack
        );
    }
}

/// Decodes up to two big-endian bytes as a u16; the empty slice is zero.
fn u16_from_be(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u16::from(b))
}
