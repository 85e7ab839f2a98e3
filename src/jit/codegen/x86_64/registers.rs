use arbitrary_int::u3;

/// How much of a register an instruction reads/writes, this also decides the operand size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    /// AL, CL, ..., SIL, DIL, R8B, ...
    LowByte,
    /// EAX, ECX, ..., R8D, ...
    LowFourBytes,
    /// RAX, RCX, ..., R8, ...
    LowEightBytes,
}

pub type Register = (Registers, RegisterAccess);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// only read by `Debug`
    #[allow(dead_code)]
    pub name: &'static str,
    pub index: u8,
}

impl Registers {
    pub const fn new(name: &'static str, index: u8) -> Self {
        Self { name, index }
    }

    /// R8-R15 need REX.R/X/B to be addressed
    pub fn requires_rex_flag(&self) -> bool {
        self.index & 0b1000 != 0
    }

    /// SPL, BPL, SIL & DIL share their encoding with AH..BH unless any REX prefix is present
    pub fn requires_rex_for_byte(&self) -> bool {
        (0b0100..=0b0111).contains(&self.index)
    }

    pub fn as_u3(&self) -> u3 {
        // just the 3 lower parts are relevant here
        u3::new(self.index & 0b0111)
    }
}

// https://wiki.osdev.org/X86-64_Instruction_Encoding#Registers
pub const A: Registers = Registers::new("A", 0b0000);
pub const D: Registers = Registers::new("D", 0b0010);

pub const SP: Registers = Registers::new("SP", 0b0100);
pub const BP: Registers = Registers::new("BP", 0b0101);
pub const SI: Registers = Registers::new("SI", 0b0110);
pub const DI: Registers = Registers::new("DI", 0b0111);

// the templates never touch the upper registers, the encoder tests do
#[allow(dead_code)]
pub const R8: Registers = Registers::new("R8", 0b1000);
#[allow(dead_code)]
pub const R12: Registers = Registers::new("R12", 0b1100);
pub const R13: Registers = Registers::new("R13", 0b1101);

// The names `asm_x86!` resolves operands to
pub const AL: Register = (A, RegisterAccess::LowByte);
pub const EAX: Register = (A, RegisterAccess::LowFourBytes);
pub const EDX: Register = (D, RegisterAccess::LowFourBytes);
pub const RSI: Register = (SI, RegisterAccess::LowEightBytes);
pub const EDI: Register = (DI, RegisterAccess::LowFourBytes);
pub const RDI: Register = (DI, RegisterAccess::LowEightBytes);
