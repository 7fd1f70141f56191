pub mod lex_error;
pub use lex_error::*;

pub mod sql_lexer;
pub use sql_lexer::*;

pub mod redactor;
pub use redactor::*;

pub mod reserved_words;
pub use reserved_words::*;
