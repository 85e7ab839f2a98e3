use arbitrary_int::u3;

use super::{
    instruction::{Immediate, Instruction},
    operand_encoding::{InstructionInput, MemoryBaseRegister, OperandEncoding},
};

/// Picks between the byte & the 32/64 bit form of an opcode, they always sit next to each other
fn sized_opcode(op: &OperandEncoding, byte_opcode: u8) -> u8 {
    if op.is_byte_sized() {
        byte_opcode
    } else {
        byte_opcode + 1
    }
}

/// The classic ALU ops all share a layout:
/// `base` r/m8, r8 | `base + 1` r/m, r | `base + 2` r8, r/m8 | `base + 3` r, r/m
/// and the immediate forms live in 0x80/0x81/0x83 keyed by `opcode_extension`
fn math_op(name: &'static str, op: OperandEncoding, base: u8, opcode_extension: u8) -> Instruction {
    match op {
        OperandEncoding::MemoryImmediate(_, imm) => {
            let opcode = match (op.is_byte_sized(), imm) {
                (true, _) => 0x80,
                // sign extended
                (false, Immediate::Imm8(_)) => 0x83,
                (false, Immediate::Imm32(_)) => 0x81,
            };
            Instruction::new(
                InstructionInput::new(opcode).with_extension(u3::new(opcode_extension)),
                op,
            )
        }
        OperandEncoding::MemoryRegister(_, _) => {
            Instruction::new(InstructionInput::new(sized_opcode(&op, base)), op)
        }
        OperandEncoding::RegisterMemory(_, _) => {
            Instruction::new(InstructionInput::new(sized_opcode(&op, base + 2)), op)
        }
        OperandEncoding::Relative(_) | OperandEncoding::ZeroOperands => {
            unreachable!("{:?} is not a valid encoding type for {}", op, name)
        }
    }
}

pub fn add(op: OperandEncoding) -> Instruction {
    math_op("add", op, 0x00, 0x0)
}

pub fn sub(op: OperandEncoding) -> Instruction {
    math_op("sub", op, 0x28, 0x5)
}

pub fn xor(op: OperandEncoding) -> Instruction {
    math_op("xor", op, 0x30, 0x6)
}

pub fn cmp(op: OperandEncoding) -> Instruction {
    math_op("cmp", op, 0x38, 0x7)
}

pub fn mov(op: OperandEncoding) -> Instruction {
    match op {
        /* == Optimizations begin == */
        // XOR(reg, reg) is more optimized than MOV(reg, 0) since it's pipelined
        // this won't work if the register is a memory access (i.e. has a displacement)
        // if we are writing to memory then it's more efficient to just move 0 into that memory location
        OperandEncoding::MemoryImmediate(MemoryBaseRegister::Register(reg), imm)
            if imm.is_zero() =>
        {
            xor(OperandEncoding::MemoryRegister(
                MemoryBaseRegister::Register(reg),
                reg,
            ))
        }
        /* == Optimizations end == */
        OperandEncoding::MemoryImmediate(_, _) => Instruction::new(
            InstructionInput::new(sized_opcode(&op, 0xC6)).with_extension(u3::new(0)),
            op,
        ),
        OperandEncoding::MemoryRegister(_, _) => {
            Instruction::new(InstructionInput::new(sized_opcode(&op, 0x88)), op)
        }
        OperandEncoding::RegisterMemory(_, _) => {
            Instruction::new(InstructionInput::new(sized_opcode(&op, 0x8A)), op)
        }
        OperandEncoding::Relative(_) | OperandEncoding::ZeroOperands => {
            unreachable!("{:?} is not a valid encoding type for mov", op)
        }
    }
}

/// Conditional jumps have a short (rel8) form & a near (0x0F prefixed, rel32) form
fn jump_op(name: &'static str, op: OperandEncoding, condition: u8) -> Instruction {
    match op {
        OperandEncoding::Relative(Immediate::Imm8(_)) => {
            Instruction::new(InstructionInput::new(0x70 | condition), op)
        }
        OperandEncoding::Relative(Immediate::Imm32(_)) => Instruction::new(
            InstructionInput::new(0x80 | condition).with_two_byte_opcode(),
            op,
        ),
        _ => unreachable!("{:?} is not a valid encoding type for {}", op, name),
    }
}

/// Jump if equal (ZF = 1)
pub fn je(op: OperandEncoding) -> Instruction {
    jump_op("je", op, 0x4)
}

/// Jump if not equal (ZF = 0)
pub fn jne(op: OperandEncoding) -> Instruction {
    jump_op("jne", op, 0x5)
}

pub fn syscall() -> Instruction {
    Instruction::new(
        InstructionInput::new(0x05).with_two_byte_opcode(),
        OperandEncoding::ZeroOperands,
    )
}

pub fn ret() -> Instruction {
    Instruction::new(InstructionInput::new(0xC3), OperandEncoding::ZeroOperands)
}
