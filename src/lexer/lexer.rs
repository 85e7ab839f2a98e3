use super::{LexerTokenKind, Position, Token};

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    /** Human Readable positions in file */
    pub cur_line: usize,
    pub cur_col: usize,

    /** 'raw' format / offset within the file (in terms of 'codepoints') */
    pub codepoint_offset: usize,

    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

fn is_command(c: char) -> bool {
    matches!(c, '>' | '<' | '+' | '-' | '.' | ',' | '[' | ']')
}

impl<'a> Lexer<'a> {
    pub fn new(chars: &'a str) -> Lexer<'a> {
        Lexer {
            cur_col: 1,
            cur_line: 1,

            codepoint_offset: 0,

            chars: chars.chars().peekable(),
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.cur_line,
            column: self.cur_col,
            offset: self.codepoint_offset,
        }
    }

    fn transform_to_type(&mut self, c: char) -> LexerTokenKind {
        match c {
            '>' => LexerTokenKind::Increment,
            '<' => LexerTokenKind::Decrement,
            '+' => LexerTokenKind::DerefIncrement,
            '-' => LexerTokenKind::DerefDecrement,
            '.' => LexerTokenKind::Write,
            ',' => LexerTokenKind::Read,
            '[' => LexerTokenKind::JumpStart,
            ']' => LexerTokenKind::JumpEnd,
            c => {
                // Simplify the comment stream down to strings
                let mut comment = String::from(c);
                while let Some(&next) = self.chars.peek() {
                    if is_command(next) || next.is_whitespace() {
                        break;
                    }
                    self.consume_char();
                    comment.push(next);
                }

                LexerTokenKind::Comment(comment)
            }
        }
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.cur_col += 1;
        if c == '\n' {
            self.cur_line += 1;
            self.cur_col = 1;
        }
        self.codepoint_offset += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.consume_char();
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let position = self.position();
        let kind = match self.consume_char() {
            Some(c) => self.transform_to_type(c),
            None => LexerTokenKind::EOF,
        };

        Token { kind, position }
    }

    /// Every token up to (but not including) `EOF`
    pub fn collect(&mut self) -> Vec<Token> {
        let mut v = vec![];
        loop {
            match self.next_token() {
                Token {
                    kind: LexerTokenKind::EOF,
                    ..
                } => break v,
                token => v.push(token),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(source: &str) -> Vec<LexerTokenKind> {
        Lexer::new(source)
            .collect()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn recognises_every_command() {
        assert_eq!(
            kinds("><+-.,[]"),
            vec![
                LexerTokenKind::Increment,
                LexerTokenKind::Decrement,
                LexerTokenKind::DerefIncrement,
                LexerTokenKind::DerefDecrement,
                LexerTokenKind::Write,
                LexerTokenKind::Read,
                LexerTokenKind::JumpStart,
                LexerTokenKind::JumpEnd,
            ]
        );
    }

    #[test]
    fn collapses_comments_and_skips_whitespace() {
        assert_eq!(
            kinds("add two ++ then print."),
            vec![
                LexerTokenKind::Comment("add".to_string()),
                LexerTokenKind::Comment("two".to_string()),
                LexerTokenKind::DerefIncrement,
                LexerTokenKind::DerefIncrement,
                LexerTokenKind::Comment("then".to_string()),
                LexerTokenKind::Comment("print".to_string()),
                LexerTokenKind::Write,
            ]
        );
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = Lexer::new("+\n  ]").collect();
        assert_eq!(
            tokens[1].position,
            Position {
                line: 2,
                column: 3,
                offset: 4
            }
        );
    }

    #[test]
    fn empty_source_has_no_tokens() {
        assert!(Lexer::new("").collect().is_empty());
        assert_eq!(Lexer::new("   \n").next_token().kind, LexerTokenKind::EOF);
    }
}
