pub mod bytecode;

pub use self::bytecode::{Frequencies, Program};

/// Largest pointer move one instruction carries, every backend encodes it as a signed 32 bit
/// immediate
pub const MAX_SHIFT: u32 = i32::MAX as u32;

/// The flat instruction stream every backend consumes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteCode {
    /// `+`: add to the cell under the data pointer (wraps at 256)
    DerefAdd(u8),

    /// `-`: subtract from the cell under the data pointer (wraps at 256)
    DerefSub(u8),

    /// `>`: move the data pointer right
    ShiftRight(u32),

    /// `<`: move the data pointer left
    ShiftLeft(u32),

    /// `,`: read one byte into the current cell
    Read,

    /// `.`: write the current cell as one byte
    Write,

    /// `[`: holds the index of the matching `JumpIfNonZero`
    JumpIfZero(usize),

    /// `]`: holds the index of the matching `JumpIfZero`
    JumpIfNonZero(usize),

    /// Contracted `[-]`, sets the current cell to zero
    Clear,

    /// Contracted `[->+<]`, adds the current cell to the cell at the given offset and zeroes it
    Transfer(i32),
}

/// Fieldless mirror of [`ByteCode`], used to index per-kind tables
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    DerefAdd,
    DerefSub,
    ShiftRight,
    ShiftLeft,
    Read,
    Write,
    JumpIfZero,
    JumpIfNonZero,
    Clear,
    Transfer,
}

impl InstructionKind {
    pub const COUNT: usize = 10;

    pub const ALL: [InstructionKind; InstructionKind::COUNT] = [
        InstructionKind::DerefAdd,
        InstructionKind::DerefSub,
        InstructionKind::ShiftRight,
        InstructionKind::ShiftLeft,
        InstructionKind::Read,
        InstructionKind::Write,
        InstructionKind::JumpIfZero,
        InstructionKind::JumpIfNonZero,
        InstructionKind::Clear,
        InstructionKind::Transfer,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl ByteCode {
    pub fn kind(&self) -> InstructionKind {
        match self {
            ByteCode::DerefAdd(_) => InstructionKind::DerefAdd,
            ByteCode::DerefSub(_) => InstructionKind::DerefSub,
            ByteCode::ShiftRight(_) => InstructionKind::ShiftRight,
            ByteCode::ShiftLeft(_) => InstructionKind::ShiftLeft,
            ByteCode::Read => InstructionKind::Read,
            ByteCode::Write => InstructionKind::Write,
            ByteCode::JumpIfZero(_) => InstructionKind::JumpIfZero,
            ByteCode::JumpIfNonZero(_) => InstructionKind::JumpIfNonZero,
            ByteCode::Clear => InstructionKind::Clear,
            ByteCode::Transfer(_) => InstructionKind::Transfer,
        }
    }
}
