use bfjit_asm::asm_x86;

use crate::{
    bytecode::{InstructionKind, MAX_SHIFT},
    jit::{
        buffer::CodeBuffer,
        codegen::{relative, JitCodeGen},
        JitError,
    },
};

use super::{
    instruction::{Displacement, Immediate, Instruction, MAX_INSTRUCTION_LENGTH},
    operand_encoding::{MemoryBaseRegister, OperandEncoding},
    ops, registers,
};

/*
    - RSI: Data Pointer, also the buffer argument for read/write
    - RDX: Always 1, the length argument for read/write
    - RAX/RDI: syscall number & file descriptor, AL doubles as scratch for transfers

    The tape arrives in RDI (System V) and the code returns with `ret` so it can be called
    like any `extern "C" fn(*mut u8)`.

    http://ref.x86asm.net/coder64.html most instructions come from this
    https://www.felixcloutier.com/x86/ for some specific commands
    https://wiki.osdev.org/X86-64_Instruction_Encoding for more general stuff
*/

const PROLOGUE_SIZE: usize = 9;
const EPILOGUE_SIZE: usize = 1;

const DEREF_SIZE: usize = 3;
const SHIFT_SIZE: usize = 7;
const WRITE_SIZE: usize = 14;
const READ_SIZE: usize = 6;
/// `cmp byte [rsi], 0` + `jcc rel32`
const JUMP_SIZE: usize = 9;
const CLEAR_SIZE: usize = 3;
const TRANSFER_SIZE: usize = 16;

/// The jumps always use a 4 byte displacement, it's the last thing in the loop templates
const DISPLACEMENT_WIDTH: usize = 4;

/// Skips the `add` & `mov` of a transfer when the cell is already zero
const TRANSFER_SKIP: i8 = 9;

pub fn emit(buffer: &mut CodeBuffer, instruction: Instruction) -> Result<(), JitError> {
    let mut bytes = [0; MAX_INSTRUCTION_LENGTH];
    let len = instruction.encode(&mut bytes);
    buffer.append(&bytes[..len])
}

pub struct X86_64Codegen;

impl JitCodeGen for X86_64Codegen {
    fn overhead(&self) -> usize {
        PROLOGUE_SIZE + EPILOGUE_SIZE
    }

    fn instruction_size(&self, kind: InstructionKind) -> usize {
        match kind {
            InstructionKind::DerefAdd | InstructionKind::DerefSub => DEREF_SIZE,
            InstructionKind::ShiftRight | InstructionKind::ShiftLeft => SHIFT_SIZE,
            InstructionKind::Write => WRITE_SIZE,
            InstructionKind::Read => READ_SIZE,
            InstructionKind::JumpIfZero | InstructionKind::JumpIfNonZero => JUMP_SIZE,
            InstructionKind::Clear => CLEAR_SIZE,
            InstructionKind::Transfer => TRANSFER_SIZE,
        }
    }

    fn prologue(&self, buffer: &mut CodeBuffer) -> Result<(), JitError> {
        asm_x86! {
            mov RSI, RDI;
            mov EDX, 1u32;
        }
        Ok(())
    }

    fn epilogue(&self, buffer: &mut CodeBuffer) -> Result<(), JitError> {
        asm_x86! {
            ret;
        }
        Ok(())
    }

    fn deref_add(&self, buffer: &mut CodeBuffer, by: u8) -> Result<(), JitError> {
        asm_x86! {
            add [RSI], (by);
        }
        Ok(())
    }

    fn deref_sub(&self, buffer: &mut CodeBuffer, by: u8) -> Result<(), JitError> {
        asm_x86! {
            sub [RSI], (by);
        }
        Ok(())
    }

    fn shift_right(&self, buffer: &mut CodeBuffer, by: u32) -> Result<(), JitError> {
        // the immediate is sign extended
        debug_assert!(by <= MAX_SHIFT);
        asm_x86! {
            add RSI, (by);
        }
        Ok(())
    }

    fn shift_left(&self, buffer: &mut CodeBuffer, by: u32) -> Result<(), JitError> {
        debug_assert!(by <= MAX_SHIFT);
        asm_x86! {
            sub RSI, (by);
        }
        Ok(())
    }

    fn write(&self, buffer: &mut CodeBuffer) -> Result<(), JitError> {
        // write(1, rsi, 1)
        asm_x86! {
            mov EAX, 1u32;
            mov EDI, 1u32;
            syscall;
        }
        Ok(())
    }

    fn read(&self, buffer: &mut CodeBuffer) -> Result<(), JitError> {
        // read(0, rsi, 1), both movs become xors
        asm_x86! {
            mov EAX, 0u32;
            mov EDI, 0u32;
            syscall;
        }
        Ok(())
    }

    fn clear(&self, buffer: &mut CodeBuffer) -> Result<(), JitError> {
        asm_x86! {
            mov [RSI], 0u8;
        }
        Ok(())
    }

    fn transfer(&self, buffer: &mut CodeBuffer, offset: i32) -> Result<(), JitError> {
        // a zero cell means the loop never ran, so don't touch the target at all
        asm_x86! {
            mov AL, [RSI];
            cmp AL, 0u8;
            je (TRANSFER_SKIP);
            add [RSI + (offset)], AL;
            mov [RSI], 0u8;
        }
        Ok(())
    }

    fn jump_if_zero(&self, buffer: &mut CodeBuffer) -> Result<usize, JitError> {
        asm_x86! {
            cmp [RSI], 0u8;
            je (0i32);
        }
        Ok(buffer.len() - DISPLACEMENT_WIDTH)
    }

    fn jump_if_nonzero(&self, buffer: &mut CodeBuffer, loop_start: usize) -> Result<(), JitError> {
        let displacement = relative(buffer.len() + JUMP_SIZE, loop_start)?;
        asm_x86! {
            cmp [RSI], 0u8;
            jne (displacement);
        }
        Ok(())
    }

    fn patch_jump(
        &self,
        buffer: &mut CodeBuffer,
        placeholder: usize,
        target: usize,
    ) -> Result<(), JitError> {
        let displacement = relative(placeholder + DISPLACEMENT_WIDTH, target)?;
        buffer.patch(placeholder, &displacement.to_le_bytes())
    }
}
