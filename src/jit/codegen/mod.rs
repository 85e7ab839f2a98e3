pub mod x86_64;

use crate::bytecode::{Frequencies, InstructionKind};

use super::{buffer::CodeBuffer, JitError};

/// A native backend, every instruction becomes a fixed size run of bytes.
///
/// Sizes are fixed so the whole buffer can be sized from the instruction counts before
/// anything is emitted.
pub trait JitCodeGen {
    /// Bytes the prologue & epilogue take together
    fn overhead(&self) -> usize;

    /// Bytes one instruction of `kind` always emits
    fn instruction_size(&self, kind: InstructionKind) -> usize;

    fn required_size(&self, frequencies: &Frequencies) -> usize {
        frequencies.iter().fold(self.overhead(), |size, (kind, count)| {
            size.saturating_add(count.saturating_mul(self.instruction_size(kind)))
        })
    }

    /// Binds the tape (first argument) to the data pointer register
    fn prologue(&self, buffer: &mut CodeBuffer) -> Result<(), JitError>;

    /// Returns to the caller
    fn epilogue(&self, buffer: &mut CodeBuffer) -> Result<(), JitError>;

    fn deref_add(&self, buffer: &mut CodeBuffer, by: u8) -> Result<(), JitError>;

    fn deref_sub(&self, buffer: &mut CodeBuffer, by: u8) -> Result<(), JitError>;

    fn shift_right(&self, buffer: &mut CodeBuffer, by: u32) -> Result<(), JitError>;

    fn shift_left(&self, buffer: &mut CodeBuffer, by: u32) -> Result<(), JitError>;

    fn write(&self, buffer: &mut CodeBuffer) -> Result<(), JitError>;

    fn read(&self, buffer: &mut CodeBuffer) -> Result<(), JitError>;

    fn clear(&self, buffer: &mut CodeBuffer) -> Result<(), JitError>;

    fn transfer(&self, buffer: &mut CodeBuffer, offset: i32) -> Result<(), JitError>;

    /// Emits the loop entry with a placeholder target, returns the offset of the placeholder
    fn jump_if_zero(&self, buffer: &mut CodeBuffer) -> Result<usize, JitError>;

    /// Emits the loop exit jumping back to the first byte of the loop entry at `loop_start`
    fn jump_if_nonzero(&self, buffer: &mut CodeBuffer, loop_start: usize) -> Result<(), JitError>;

    /// Points the placeholder left by [`JitCodeGen::jump_if_zero`] at `target`
    fn patch_jump(
        &self,
        buffer: &mut CodeBuffer,
        placeholder: usize,
        target: usize,
    ) -> Result<(), JitError>;
}

/// Displacement from `from` (the end of the jump) to `to`
pub fn relative(from: usize, to: usize) -> Result<i32, JitError> {
    i32::try_from(to as i128 - from as i128).map_err(|_| JitError::BranchOutOfRange { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacements_are_signed() {
        assert_eq!(relative(10, 4).unwrap(), -6);
        assert_eq!(relative(4, 10).unwrap(), 6);
        assert!(matches!(
            relative(0, usize::MAX),
            Err(JitError::BranchOutOfRange { .. })
        ));
    }
}
