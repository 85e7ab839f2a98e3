pub mod arm32;
pub mod x86_64;

use std::{fmt, str::FromStr};

use clap::ValueEnum;
use log::{debug, info};
use thiserror::Error;

use crate::bytecode::{ByteCode, Program};

use self::{arm32::Arm32Assembler, x86_64::X86_64Assembler};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchitectureError {
    #[error("Unknown architecture '{0}', expected one of x86_64, arm32")]
    Unknown(String),
}

/// Every target we know how to emit assembly for
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    #[value(name = "x86_64", alias = "x86-64", alias = "amd64")]
    X86_64,
    #[value(name = "arm32", alias = "arm", alias = "armv7")]
    Arm32,
}

impl Architecture {
    /// The architecture this binary was built for
    pub fn host() -> Result<Architecture, ArchitectureError> {
        std::env::consts::ARCH.parse()
    }

    pub fn output_extension(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "asm",
            Architecture::Arm32 => "s",
        }
    }
}

impl FromStr for Architecture {
    type Err = ArchitectureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Architecture as ValueEnum>::from_str(s, true)
            .map_err(|_| ArchitectureError::Unknown(s.to_owned()))
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Arm32 => write!(f, "arm32"),
        }
    }
}

/// One assembly fragment per instruction.
///
/// Nothing is linked here: branches name labels built from instruction indices and the
/// assembler resolves them.  Loop labels sit on the first line of each loop instruction so
/// both branches land on a test of the current cell.
pub trait Assembler {
    /// Reserve the tape and point the tape register at it
    fn program_start(&self, tape_size: usize) -> String;

    /// Exit the process with status 0
    fn program_end(&self) -> String;

    fn deref_add(&self, by: u8) -> String;

    fn deref_sub(&self, by: u8) -> String;

    fn shift_right(&self, by: u32) -> String;

    fn shift_left(&self, by: u32) -> String;

    fn write(&self) -> String;

    fn read(&self) -> String;

    fn jump_if_zero(&self, pc: usize, end: usize) -> String;

    fn jump_if_nonzero(&self, pc: usize, start: usize) -> String;

    fn clear(&self) -> String;

    /// `pc` is only used to give the zero check a unique label
    fn transfer(&self, pc: usize, offset: i32) -> String;
}

fn emit<A: Assembler>(assembler: &A, program: &Program, tape_size: usize) -> String {
    let mut text = assembler.program_start(tape_size);

    for (pc, instruction) in program.instructions().iter().enumerate() {
        let fragment = match *instruction {
            ByteCode::DerefAdd(i) => assembler.deref_add(i),
            ByteCode::DerefSub(i) => assembler.deref_sub(i),
            ByteCode::ShiftRight(i) => assembler.shift_right(i),
            ByteCode::ShiftLeft(i) => assembler.shift_left(i),
            ByteCode::Read => assembler.read(),
            ByteCode::Write => assembler.write(),
            ByteCode::JumpIfZero(end) => assembler.jump_if_zero(pc, end),
            ByteCode::JumpIfNonZero(start) => assembler.jump_if_nonzero(pc, start),
            ByteCode::Clear => assembler.clear(),
            ByteCode::Transfer(offset) => assembler.transfer(pc, offset),
        };
        text.push_str(&fragment);
    }

    text.push_str(&assembler.program_end());
    text
}

/// The whole program as assembly text for `architecture`
pub fn assemble(program: &Program, architecture: Architecture, tape_size: usize) -> String {
    info!(
        "assembling {} instructions for {}",
        program.len(),
        architecture
    );

    let text = match architecture {
        Architecture::X86_64 => emit(&X86_64Assembler, program, tape_size),
        Architecture::Arm32 => emit(&Arm32Assembler, program, tape_size),
    };

    debug!("generated {} bytes of assembly", text.len());
    text
}
