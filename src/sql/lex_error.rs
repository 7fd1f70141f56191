use std::fmt::Display;

use crate::sql::SqlLexer;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl LexError {
    pub fn new(message: &str, pivot: usize, lexer: &SqlLexer) -> Self {
        Self {
            message: message.to_string(),
            text: lexer.text_from_range(pivot, lexer.position + 1),
            start: pivot,
            end: lexer.position,
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LexError: {} at [{}:{}] -> '{}'",
            self.message,
            self.start,
            self.end,
            self.text
        )
    }
}

impl std::error::Error for LexError {}
