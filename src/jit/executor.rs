use std::mem;

use super::{buffer::ExecutableCode, JitError};

/// The zeroed cells generated code works on, allocated apart from the code
pub struct Tape {
    cells: Vec<u8>,
}

impl Tape {
    pub fn new(size: usize) -> Result<Tape, JitError> {
        // generated code touches the first cell unchecked
        if size == 0 {
            return Err(JitError::EmptyTape);
        }

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(size)
            .map_err(|source| JitError::TapeAllocation { size, source })?;
        cells.resize(size, 0);
        Ok(Tape { cells })
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// The entry point of everything a `JitCodeGen` emits
type Entry = extern "C" fn(*mut u8);

/// Calls into generated code with the tape as the only argument.
///
/// There is no way back until the code returns: it can't be interrupted and its pointer
/// moves aren't bounds checked.
///
/// # Safety
/// `code` must be a complete program emitted by the `JitCodeGen` for this host, with a
/// prologue and an epilogue.
pub unsafe fn execute(code: &ExecutableCode, tape: &mut Tape) {
    let entry: Entry = mem::transmute(code.as_ptr());
    entry(tape.cells.as_mut_ptr());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tape_starts_zeroed() {
        let tape = Tape::new(128).unwrap();
        assert_eq!(tape.len(), 128);
        assert!(tape.cells().iter().all(|cell| *cell == 0));
    }

    #[test]
    fn empty_tape_is_refused() {
        assert!(matches!(Tape::new(0), Err(JitError::EmptyTape)));
    }

    #[test]
    fn impossible_tapes_fail_cleanly() {
        assert!(matches!(
            Tape::new(usize::MAX),
            Err(JitError::TapeAllocation { .. })
        ));
    }
}
