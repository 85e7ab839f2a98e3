use std::{fmt, ops::Index};

use super::{ByteCode, InstructionKind};

/// How many instructions of each kind a program holds, used to size the JIT buffer up front
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frequencies {
    counts: [usize; InstructionKind::COUNT],
}

impl Frequencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: InstructionKind) {
        self.counts[kind.index()] += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstructionKind, usize)> + '_ {
        InstructionKind::ALL
            .iter()
            .map(move |kind| (*kind, self.counts[kind.index()]))
    }
}

impl Index<InstructionKind> for Frequencies {
    type Output = usize;

    fn index(&self, kind: InstructionKind) -> &usize {
        &self.counts[kind.index()]
    }
}

impl fmt::Display for Frequencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, count) in self.iter() {
            writeln!(f, "{:?}: {}", kind, count)?;
        }
        Ok(())
    }
}

/// An instruction stream together with its per-kind counts.
///
/// Loop instructions are linked by index: `JumpIfZero(end)` at `start` always has a
/// `JumpIfNonZero(start)` at `end`.  The counts are kept in step with the stream on every push
/// so the table handed to the JIT is never stale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<ByteCode>,
    frequencies: Frequencies,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> &[ByteCode] {
        &self.instructions
    }

    pub fn frequencies(&self) -> &Frequencies {
        &self.frequencies
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn last(&self) -> Option<&ByteCode> {
        self.instructions.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut ByteCode> {
        self.instructions.last_mut()
    }

    /// Appends an instruction and returns its index
    pub fn push(&mut self, instruction: ByteCode) -> usize {
        self.frequencies.record(instruction.kind());
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Points the loop at `start` and the loop end at `end` at each other
    pub fn link(&mut self, start: usize, end: usize) {
        debug_assert!(matches!(self.instructions[start], ByteCode::JumpIfZero(_)));
        debug_assert!(matches!(self.instructions[end], ByteCode::JumpIfNonZero(_)));

        self.instructions[start] = ByteCode::JumpIfZero(end);
        self.instructions[end] = ByteCode::JumpIfNonZero(start);
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pc, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{:>6}: {:?}", pc, instruction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn push_keeps_frequencies_in_step() {
        let mut program = Program::new();
        program.push(ByteCode::DerefAdd(3));
        program.push(ByteCode::JumpIfZero(0));
        program.push(ByteCode::DerefSub(1));
        program.push(ByteCode::JumpIfNonZero(0));
        program.push(ByteCode::DerefAdd(1));

        let frequencies = program.frequencies();
        assert_eq!(frequencies[InstructionKind::DerefAdd], 2);
        assert_eq!(frequencies[InstructionKind::DerefSub], 1);
        assert_eq!(frequencies[InstructionKind::JumpIfZero], 1);
        assert_eq!(frequencies[InstructionKind::JumpIfNonZero], 1);
        assert_eq!(frequencies[InstructionKind::Write], 0);
        assert_eq!(frequencies.total(), program.len());
    }

    #[test]
    fn link_sets_both_directions() {
        let mut program = Program::new();
        let start = program.push(ByteCode::JumpIfZero(0));
        program.push(ByteCode::Write);
        let end = program.push(ByteCode::JumpIfNonZero(0));
        program.link(start, end);

        assert_eq!(
            program.instructions(),
            &[
                ByteCode::JumpIfZero(2),
                ByteCode::Write,
                ByteCode::JumpIfNonZero(0)
            ]
        );
    }
}
