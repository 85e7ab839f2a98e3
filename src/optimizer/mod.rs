use std::collections::HashSet;

use log::debug;

use crate::{
    bytecode::{ByteCode, Program},
    Optimizations,
};

use self::{clear_loop::clear_loop, transfer_loop::transfer_loop};

pub mod clear_loop;
pub mod transfer_loop;

fn contract(span: &[ByteCode], options: &HashSet<Optimizations>) -> Option<ByteCode> {
    if options.contains(&Optimizations::ClearLoop) {
        if let Some(instruction) = clear_loop(span) {
            return Some(instruction);
        }
    }

    if options.contains(&Optimizations::TransferLoop) {
        if let Some(instruction) = transfer_loop(span) {
            return Some(instruction);
        }
    }

    None
}

/// Rewrites recognised loop idioms into single instructions.
///
/// Builds a fresh program in one pass rather than deleting in place, loop links are
/// recomputed with a stack as instructions are copied so they always index the new stream.
pub fn optimize(program: &Program, options: &HashSet<Optimizations>) -> Program {
    let source = program.instructions();
    let mut optimized = Program::new();
    let mut open_loops = vec![];

    let mut pc = 0;
    while pc < source.len() {
        match source[pc] {
            ByteCode::JumpIfZero(end) => {
                if let Some(instruction) = contract(&source[pc..=end], options) {
                    optimized.push(instruction);
                    // skip the body & the closing bracket
                    pc = end + 1;
                    continue;
                }

                open_loops.push(optimized.push(ByteCode::JumpIfZero(0)));
            }
            ByteCode::JumpIfNonZero(_) => {
                let start = open_loops
                    .pop()
                    .expect("a linked program always has balanced loops");
                let end = optimized.push(ByteCode::JumpIfNonZero(start));
                optimized.link(start, end);
            }
            instruction => {
                optimized.push(instruction);
            }
        }

        pc += 1;
    }

    debug!(
        "optimized {} instructions down to {}",
        program.len(),
        optimized.len()
    );

    optimized
}
