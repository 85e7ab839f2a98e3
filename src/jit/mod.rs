pub mod buffer;
pub mod codegen;
pub mod executor;

use std::{
    collections::TryReserveError,
    io::{self, Write},
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    bytecode::{ByteCode, Program},
    codegen::Architecture,
};

use self::{
    buffer::{CodeBuffer, ExecutableCode},
    codegen::{x86_64::X86_64Codegen, JitCodeGen},
    executor::Tape,
};

#[derive(Error, Debug)]
pub enum JitError {
    #[error("Code buffer overflow: {requested} bytes needed but only {capacity} were mapped")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("Patch of {len} bytes at {offset} is outside the {size} bytes written")]
    PatchOutOfRange {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Jump from {from} to {to} doesn't fit in a 32 bit displacement")]
    BranchOutOfRange { from: usize, to: usize },

    #[error("Loop instructions don't pair up")]
    UnbalancedLoops,

    #[error("Failed to map memory for code")]
    Map(#[source] io::Error),

    #[error("Failed to make the code executable")]
    Protect(#[source] io::Error),

    #[error("The tape needs at least one cell")]
    EmptyTape,

    #[error("Failed to allocate a tape of {size} cells")]
    TapeAllocation {
        size: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("There is no native backend for {0}, only assembly output")]
    UnsupportedArchitecture(Architecture),

    #[error("Native {architecture} code can't run on a {host} host")]
    UnsupportedHost {
        architecture: Architecture,
        host: &'static str,
    },

    #[error("IO Error")]
    Io(#[from] io::Error),
}

/// Where a [`JitCompiler`] is, it only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JitState {
    Prologue,
    Emitting,
    Epilogue,
    Protected,
    Running,
    Done,
}

/// A loop entry whose forward jump hasn't been resolved yet
#[derive(Debug, Clone, Copy)]
struct PendingBranch {
    /// first byte of the loop entry, the loop exit jumps back here
    loop_start: usize,
    /// the displacement to patch once the loop exit is emitted
    placeholder: usize,
}

pub struct JitCompiler<'a, G: JitCodeGen> {
    codegen: G,
    program: &'a Program,
    state: JitState,
}

impl<'a, G: JitCodeGen> JitCompiler<'a, G> {
    pub fn new(codegen: G, program: &'a Program) -> Self {
        Self {
            codegen,
            program,
            state: JitState::Prologue,
        }
    }

    pub fn state(&self) -> JitState {
        self.state
    }

    fn transition(&mut self, next: JitState) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        debug!("jit {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn emit_program(&mut self, buffer: &mut CodeBuffer) -> Result<(), JitError> {
        let mut pending: Vec<PendingBranch> = vec![];

        for instruction in self.program.instructions() {
            match *instruction {
                ByteCode::DerefAdd(i) => self.codegen.deref_add(buffer, i)?,
                ByteCode::DerefSub(i) => self.codegen.deref_sub(buffer, i)?,
                ByteCode::ShiftRight(i) => self.codegen.shift_right(buffer, i)?,
                ByteCode::ShiftLeft(i) => self.codegen.shift_left(buffer, i)?,
                ByteCode::Read => self.codegen.read(buffer)?,
                ByteCode::Write => self.codegen.write(buffer)?,
                ByteCode::Clear => self.codegen.clear(buffer)?,
                ByteCode::Transfer(offset) => self.codegen.transfer(buffer, offset)?,
                ByteCode::JumpIfZero(_) => {
                    let loop_start = buffer.len();
                    let placeholder = self.codegen.jump_if_zero(buffer)?;
                    pending.push(PendingBranch {
                        loop_start,
                        placeholder,
                    });
                }
                ByteCode::JumpIfNonZero(_) => {
                    let branch = pending.pop().ok_or(JitError::UnbalancedLoops)?;
                    let loop_end = buffer.len();
                    self.codegen.jump_if_nonzero(buffer, branch.loop_start)?;
                    self.codegen
                        .patch_jump(buffer, branch.placeholder, loop_end)?;
                }
            }
        }

        if !pending.is_empty() {
            return Err(JitError::UnbalancedLoops);
        }
        Ok(())
    }

    /// Emits the whole program into a writable buffer sized up front
    pub fn assemble(&mut self) -> Result<CodeBuffer, JitError> {
        let capacity = self.codegen.required_size(self.program.frequencies());
        let mut buffer = CodeBuffer::new(capacity)?;

        self.codegen.prologue(&mut buffer)?;
        self.transition(JitState::Emitting);

        self.emit_program(&mut buffer)?;
        self.transition(JitState::Epilogue);

        self.codegen.epilogue(&mut buffer)?;
        debug!("emitted {} of {} bytes", buffer.len(), capacity);
        Ok(buffer)
    }

    pub fn compile(&mut self) -> Result<ExecutableCode, JitError> {
        let buffer = self.assemble()?;
        let code = buffer.finalize()?;
        self.transition(JitState::Protected);
        Ok(code)
    }

    /// Compiles and runs the program on a fresh tape of `memory_size` cells
    pub fn run(&mut self, memory_size: usize) -> Result<Tape, JitError> {
        let mut tape = Tape::new(memory_size)?;
        let code = self.compile()?;

        // generated code writes straight to the file descriptor
        io::stdout().flush()?;

        self.transition(JitState::Running);
        info!("running {} bytes of native code", code.len());
        // Safety: the code came from `self.codegen` which matches the host, checked by `run`
        unsafe { executor::execute(&code, &mut tape) };
        self.transition(JitState::Done);

        Ok(tape)
    }
}

/// Compile & run `program` natively, returning the tape it finished with
pub fn run(
    program: &Program,
    architecture: Architecture,
    memory_size: usize,
) -> Result<Tape, JitError> {
    const NATIVE_X86_64: bool = cfg!(all(target_arch = "x86_64", target_os = "linux"));

    match architecture {
        Architecture::X86_64 if NATIVE_X86_64 => {
            JitCompiler::new(X86_64Codegen, program).run(memory_size)
        }
        Architecture::X86_64 => Err(JitError::UnsupportedHost {
            architecture,
            host: std::env::consts::ARCH,
        }),
        Architecture::Arm32 => Err(JitError::UnsupportedArchitecture(architecture)),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        bytecode::InstructionKind,
        parser::parser::tests::{balanced_source, parse},
    };

    /// Where each instruction's code starts, from the size table alone
    fn offsets(codegen: &X86_64Codegen, program: &Program) -> Vec<usize> {
        let mut prologue = CodeBuffer::new(codegen.overhead()).unwrap();
        codegen.prologue(&mut prologue).unwrap();
        let mut offset = prologue.len();
        program
            .instructions()
            .iter()
            .map(|instruction| {
                let start = offset;
                offset += codegen.instruction_size(instruction.kind());
                start
            })
            .collect()
    }

    fn displacement_at(bytes: &[u8], at: usize) -> i64 {
        let mut raw = [0; 4];
        raw.copy_from_slice(&bytes[at..at + 4]);
        i64::from(i32::from_le_bytes(raw))
    }

    #[test]
    fn moves_through_every_state() {
        let program = parse("+[-]", false).unwrap();
        let mut compiler = JitCompiler::new(X86_64Codegen, &program);
        assert_eq!(compiler.state(), JitState::Prologue);
        let _code = compiler.compile().unwrap();
        assert_eq!(compiler.state(), JitState::Protected);
    }

    #[test]
    fn arm32_has_no_native_backend() {
        let program = parse("+", false).unwrap();
        assert!(matches!(
            run(&program, Architecture::Arm32, 16),
            Err(JitError::UnsupportedArchitecture(Architecture::Arm32))
        ));
    }

    proptest! {
        #[test]
        fn sizing_is_exact(source in balanced_source(), merge_runs in any::<bool>()) {
            let program = parse(&source, merge_runs).unwrap();
            let codegen = X86_64Codegen;
            let required = codegen.required_size(program.frequencies());
            let buffer = JitCompiler::new(X86_64Codegen, &program).assemble().unwrap();
            prop_assert_eq!(buffer.len(), required);
        }

        #[test]
        fn loop_jumps_land_on_their_partner(source in balanced_source()) {
            let program = parse(&source, true).unwrap();
            let codegen = X86_64Codegen;
            let offsets = offsets(&codegen, &program);
            let buffer = JitCompiler::new(X86_64Codegen, &program).assemble().unwrap();
            let bytes = buffer.as_slice();
            let jump = codegen.instruction_size(InstructionKind::JumpIfZero);

            for (pc, instruction) in program.instructions().iter().enumerate() {
                match *instruction {
                    ByteCode::JumpIfZero(end) => {
                        let field_end = offsets[pc] + jump;
                        let forward = displacement_at(bytes, field_end - 4);
                        prop_assert_eq!(field_end as i64 + forward, offsets[end] as i64);
                    }
                    ByteCode::JumpIfNonZero(start) => {
                        let field_end = offsets[pc] + jump;
                        let backward = displacement_at(bytes, field_end - 4);
                        prop_assert_eq!(backward, -((field_end - offsets[start]) as i64));
                    }
                    _ => {}
                }
            }
        }
    }

    #[cfg(all(target_arch = "x86_64", target_os = "linux"))]
    mod native {
        use super::*;
        use crate::optimizer::optimize;
        use crate::Optimizations;
        use std::collections::HashSet;

        fn run_source(source: &str, optimizations: &[Optimizations]) -> Vec<u8> {
            let program = parse(source, true).unwrap();
            let program = optimize(&program, &optimizations.iter().cloned().collect::<HashSet<_>>());
            run(&program, Architecture::X86_64, 64).unwrap().cells().to_vec()
        }

        #[test]
        fn clears_cells() {
            let tape = run_source("+++[-]>++", &[]);
            assert_eq!(&tape[..2], &[0, 2]);
            let tape = run_source("+++[-]>++", &[Optimizations::ClearLoop]);
            assert_eq!(&tape[..2], &[0, 2]);
        }

        #[test]
        fn transfers_values() {
            for optimizations in [vec![], vec![Optimizations::TransferLoop]] {
                let tape = run_source("+++++[->+<]", &optimizations);
                assert_eq!(&tape[..2], &[0, 5]);
                let tape = run_source(">>+++[<<+>>-]", &optimizations);
                assert_eq!(&tape[..3], &[3, 0, 0]);
            }
        }

        #[test]
        fn nested_loops() {
            // 4 * 3 * 2 = 24
            let tape = run_source("++++[>+++[>++<-]<-]", &[]);
            assert_eq!(&tape[..3], &[0, 0, 24]);
        }
    }
}
