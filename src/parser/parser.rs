use std::iter::Peekable;

use log::debug;

use crate::{
    bytecode::{ByteCode, Program, MAX_SHIFT},
    lexer::{LexerTokenKind, Position, Token},
};

use super::ParserError;

/// Turns the token stream into a linked instruction stream.
///
/// With `merge_runs` consecutive `+`/`-`/`>`/`<` collapse into one instruction carrying the
/// run length.  Comments between them don't break a run since they never execute.
pub struct Parser<'a> {
    tokens: Peekable<std::slice::Iter<'a, Token>>,
    merge_runs: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], merge_runs: bool) -> Parser<'a> {
        Parser {
            tokens: tokens.iter().peekable(),
            merge_runs,
        }
    }

    fn push_counted(&mut self, program: &mut Program, instruction: ByteCode) {
        if self.merge_runs {
            let merged = match (program.last_mut(), instruction) {
                (Some(ByteCode::DerefAdd(acc)), ByteCode::DerefAdd(i))
                | (Some(ByteCode::DerefSub(acc)), ByteCode::DerefSub(i)) => {
                    // cells are 8 bit so the run wraps exactly like the cell would
                    *acc = acc.wrapping_add(i);
                    true
                }
                (Some(ByteCode::ShiftRight(acc)), ByteCode::ShiftRight(i))
                | (Some(ByteCode::ShiftLeft(acc)), ByteCode::ShiftLeft(i)) => {
                    match acc.checked_add(i).filter(|sum| *sum <= MAX_SHIFT) {
                        Some(sum) => {
                            *acc = sum;
                            true
                        }
                        // start a fresh run rather than wrap the pointer
                        None => false,
                    }
                }
                _ => false,
            };

            if merged {
                return;
            }
        }

        program.push(instruction);
    }

    pub fn parse_program(&mut self) -> Result<Program, ParserError> {
        let mut program = Program::new();
        let mut open_loops: Vec<(usize, Position)> = vec![];

        while let Some(token) = self.tokens.next() {
            match token.kind {
                LexerTokenKind::Increment => {
                    self.push_counted(&mut program, ByteCode::ShiftRight(1))
                }
                LexerTokenKind::Decrement => self.push_counted(&mut program, ByteCode::ShiftLeft(1)),
                LexerTokenKind::DerefIncrement => {
                    self.push_counted(&mut program, ByteCode::DerefAdd(1))
                }
                LexerTokenKind::DerefDecrement => {
                    self.push_counted(&mut program, ByteCode::DerefSub(1))
                }
                LexerTokenKind::Write => {
                    program.push(ByteCode::Write);
                }
                LexerTokenKind::Read => {
                    program.push(ByteCode::Read);
                }
                LexerTokenKind::JumpStart => {
                    // the real target gets linked once we find the matching `]`
                    let pc = program.push(ByteCode::JumpIfZero(0));
                    open_loops.push((pc, token.position));
                }
                LexerTokenKind::JumpEnd => {
                    let Some((start, _)) = open_loops.pop() else {
                        return Err(ParserError::UnmatchedEnd {
                            pc: program.len(),
                            position: token.position,
                        });
                    };
                    let end = program.push(ByteCode::JumpIfNonZero(start));
                    program.link(start, end);
                }
                LexerTokenKind::EOF => break,
                // comments never make it into the instruction stream
                LexerTokenKind::Comment(_) => continue,
            }
        }

        if let Some((pc, position)) = open_loops.pop() {
            return Err(ParserError::UnmatchedStart { pc, position });
        }

        debug!(
            "parsed {} instructions (merge runs: {})",
            program.len(),
            self.merge_runs
        );

        Ok(program)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::lexer::lexer::Lexer;

    pub(crate) fn parse(source: &str, merge_runs: bool) -> Result<Program, ParserError> {
        let tokens = Lexer::new(source).collect();
        Parser::new(&tokens, merge_runs).parse_program()
    }

    /// Random sources whose brackets always balance
    pub(crate) fn balanced_source() -> impl Strategy<Value = String> {
        let leaf = prop::collection::vec(
            prop_oneof![
                Just('+'),
                Just('-'),
                Just('>'),
                Just('<'),
                Just('.'),
                Just(' ')
            ],
            0..6,
        )
        .prop_map(|chars| chars.into_iter().collect::<String>());

        let nested = leaf.prop_recursive(4, 64, 4, |inner| {
            prop::collection::vec(inner, 1..4).prop_map(|parts| format!("[{}]", parts.concat()))
        });

        prop::collection::vec(nested, 1..4).prop_map(|parts| parts.concat())
    }

    #[test]
    fn merges_runs_only_when_enabled() {
        let merged = parse("+++>>--<.", true).unwrap();
        assert_eq!(
            merged.instructions(),
            &[
                ByteCode::DerefAdd(3),
                ByteCode::ShiftRight(2),
                ByteCode::DerefSub(2),
                ByteCode::ShiftLeft(1),
                ByteCode::Write,
            ]
        );

        let unmerged = parse("++>", false).unwrap();
        assert_eq!(
            unmerged.instructions(),
            &[
                ByteCode::DerefAdd(1),
                ByteCode::DerefAdd(1),
                ByteCode::ShiftRight(1),
            ]
        );
    }

    #[test]
    fn io_is_never_merged() {
        let program = parse("..,,", true).unwrap();
        assert_eq!(program.len(), 4);
    }

    #[test]
    fn comments_take_no_slot() {
        let program = parse("+ this is a comment +", true).unwrap();
        assert_eq!(program.instructions(), &[ByteCode::DerefAdd(2)]);
    }

    #[test]
    fn cell_runs_wrap_like_the_cell() {
        let source = "+".repeat(258);
        let program = parse(&source, true).unwrap();
        assert_eq!(program.instructions(), &[ByteCode::DerefAdd(2)]);
    }

    #[test]
    fn links_nested_loops_both_ways() {
        let program = parse("+[>[-]<-]", true).unwrap();
        assert_eq!(
            program.instructions(),
            &[
                ByteCode::DerefAdd(1),
                ByteCode::JumpIfZero(8),
                ByteCode::ShiftRight(1),
                ByteCode::JumpIfZero(5),
                ByteCode::DerefSub(1),
                ByteCode::JumpIfNonZero(3),
                ByteCode::ShiftLeft(1),
                ByteCode::DerefSub(1),
                ByteCode::JumpIfNonZero(1),
            ]
        );
    }

    #[test]
    fn unmatched_end_reports_position() {
        let error = parse("++\n+]", true).unwrap_err();
        assert_eq!(
            error,
            ParserError::UnmatchedEnd {
                pc: 1,
                position: Position {
                    line: 2,
                    column: 2,
                    offset: 4
                }
            }
        );
    }

    #[test]
    fn unmatched_start_reports_innermost() {
        let error = parse("[[]", false).unwrap_err();
        assert!(matches!(error, ParserError::UnmatchedStart { pc: 0, .. }));

        let error = parse("[ [", false).unwrap_err();
        assert!(matches!(error, ParserError::UnmatchedStart { pc: 1, .. }));
    }

    proptest! {
        #[test]
        fn loops_are_properly_nested(source in balanced_source()) {
            let program = parse(&source, false).unwrap();
            let instructions = program.instructions();

            let starts = program.frequencies()[crate::bytecode::InstructionKind::JumpIfZero];
            let ends = program.frequencies()[crate::bytecode::InstructionKind::JumpIfNonZero];
            prop_assert_eq!(starts, ends);

            for (pc, instruction) in instructions.iter().enumerate() {
                if let ByteCode::JumpIfZero(end) = *instruction {
                    prop_assert!(end > pc);
                    prop_assert_eq!(instructions[end], ByteCode::JumpIfNonZero(pc));
                    for inner in pc + 1..end {
                        match instructions[inner] {
                            ByteCode::JumpIfZero(j) => prop_assert!(j > inner && j < end),
                            ByteCode::JumpIfNonZero(j) => prop_assert!(j > pc && j < inner),
                            _ => {}
                        }
                    }
                }
            }
        }

        #[test]
        fn parsing_is_deterministic(source in balanced_source()) {
            prop_assert_eq!(parse(&source, true).unwrap(), parse(&source, true).unwrap());
        }
    }
}
