use thiserror::Error;

use crate::lexer::Position;

pub mod parser;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("Unmatched ']' at program counter {pc} ({position})")]
    UnmatchedEnd { pc: usize, position: Position },

    #[error("Unmatched '[' at program counter {pc} ({position})")]
    UnmatchedStart { pc: usize, position: Position },
}
