use std::fmt;

pub mod lexer;

#[derive(Debug, Clone, PartialEq)]
pub enum LexerTokenKind {
    // `>`: Increment the `data pointer` by one
    Increment,
    // `<`: Decrement the `data pointer` by one
    Decrement,

    // `+`: Increment the byte at the `data pointer` by one
    DerefIncrement,
    // `-`: Decrement the byte at the `data pointer` by one
    DerefDecrement,

    // `.`: Write the byte at the `data pointer` to the `output device`
    Write,
    // `,`: Read the next byte from the `input device` and write it to the `data pointer`
    Read,

    // `[`: If the byte at the `data pointer` is zero, then jump the `instruction pointer` forward to the instruction after the matching `]`
    JumpStart,
    // `]`: If the byte at the `data pointer` is non-zero then jump the `instruction pointer` back to the instruction after the matching `[`
    JumpEnd,

    // End of file: no more tokens left
    EOF,

    // Comment every other character
    Comment(String),
}

impl LexerTokenKind {
    pub fn symbol(&self) -> &str {
        match self {
            LexerTokenKind::Increment => ">",
            LexerTokenKind::Decrement => "<",
            LexerTokenKind::DerefIncrement => "+",
            LexerTokenKind::DerefDecrement => "-",
            LexerTokenKind::Write => ".",
            LexerTokenKind::Read => ",",
            LexerTokenKind::JumpStart => "[",
            LexerTokenKind::JumpEnd => "]",
            LexerTokenKind::EOF => "",
            LexerTokenKind::Comment(comment) => comment.as_str(),
        }
    }
}

/// Human readable location of a token in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    /// offset in codepoints from the start of the source
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: LexerTokenKind,
    pub position: Position,
}
