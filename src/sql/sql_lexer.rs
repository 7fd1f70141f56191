use crate::sql::LexError;

/// A single lexical unit of MySQL-flavoured SQL text.
///
/// Tokens keep their original spelling so callers can decide how to render
/// them; the redactor lower-cases words and replaces literals, the keyword
/// classifier upper-cases words and ignores everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlToken {
    /// Bare keyword, identifier, function name or `@variable`.
    Word(String),
    /// Backtick-quoted identifier, quotes included.
    QuotedIdentifier(String),
    StringLiteral(String),
    NumberLiteral(String),
    /// `?` or a `$n` positional parameter.
    Placeholder(String),
    Operator(String),
    Punctuation(char),
    Comment(String),
}

impl SqlToken {
    pub fn is_literal(&self) -> bool {
        matches!(self, SqlToken::StringLiteral(_) | SqlToken::NumberLiteral(_) | SqlToken::Placeholder(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, SqlToken::Comment(_))
    }
}

const THREE_CHAR_OPERATORS: [&str; 2] = ["<=>", "->>"];
const TWO_CHAR_OPERATORS: [&str; 10] = ["<=", ">=", "<>", "!=", "||", "&&", ":=", "<<", ">>", "->"];
const SINGLE_CHAR_OPERATORS: &str = "=<>!+-*/%^&|~:";

#[derive(Debug, Default)]
pub struct SqlLexer {
    pub position: usize,
    pub length: usize,
    pub text_v: Vec<char>,
}

impl SqlLexer {
    pub fn new(text: &str) -> Self {
        let text_v: Vec<char> = text.chars().collect();
        Self {
            position: 0,
            length: text_v.len(),
            text_v,
        }
    }

    pub fn eof(&self) -> bool {
        self.position >= self.length
    }

    pub fn current(&self) -> char {
        self.peek(0)
    }

    pub fn peek(&self, ahead: usize) -> char {
        self.text_v.get(self.position + ahead).copied().unwrap_or('\0')
    }

    pub fn next(&mut self) {
        self.position += 1;
    }

    pub fn text_from_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.length);
        let start = start.min(end);
        self.text_v[start..end].iter().collect()
    }

    pub fn text_from_pivot(&self, pivot: usize) -> String {
        self.text_from_range(pivot, self.position)
    }

    fn starts_with(&self, word: &str) -> bool {
        word.chars().enumerate().all(|(i, ch)| self.peek(i) == ch)
    }

    fn is_word_start(ch: char) -> bool {
        ch.is_alphabetic() || ch == '_' || ch == '@'
    }

    fn is_word_part(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '@'
    }

    /// Splits the whole text into tokens, comments included.
    pub fn tokenize(&mut self) -> Result<Vec<SqlToken>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Option<SqlToken>, LexError> {
        while !self.eof() && self.current().is_whitespace() {
            self.next();
        }
        if self.eof() {
            return Ok(None);
        }

        let current = self.current();
        let token = match current {
            '/' if self.peek(1) == '*' => self.block_comment(),
            '-' if self.peek(1) == '-' && (self.peek(2).is_whitespace() || self.peek(2) == '\0') => self.line_comment(),
            '#' => self.line_comment(),
            '`' => self.quoted_identifier()?,
            '\'' | '"' => self.string_literal(current)?,
            '?' => {
                self.next();
                SqlToken::Placeholder("?".into())
            },
            '$' if self.peek(1).is_ascii_digit() => self.positional_parameter(),
            ch if ch.is_ascii_digit() => self.number_or_word(),
            ch if Self::is_word_start(ch) => self.word(),
            _ => self.operator_or_punctuation(),
        };

        Ok(Some(token))
    }

    fn block_comment(&mut self) -> SqlToken {
        let pivot = self.position;
        self.position += 2;
        while !self.eof() && !self.starts_with("*/") {
            self.next();
        }
        // a comment cut off by statement truncation simply runs to the end
        if !self.eof() {
            self.position += 2;
        }
        SqlToken::Comment(self.text_from_pivot(pivot))
    }

    fn line_comment(&mut self) -> SqlToken {
        let pivot = self.position;
        while !self.eof() && self.current() != '\n' {
            self.next();
        }
        SqlToken::Comment(self.text_from_pivot(pivot))
    }

    fn quoted_identifier(&mut self) -> Result<SqlToken, LexError> {
        let pivot = self.position;
        self.next();
        loop {
            if self.eof() {
                return Err(LexError::new("Unterminated quoted identifier", pivot, self));
            }
            if self.current() == '`' {
                if self.peek(1) == '`' {
                    self.position += 2;
                    continue;
                }
                self.next();
                break;
            }
            self.next();
        }
        Ok(SqlToken::QuotedIdentifier(self.text_from_pivot(pivot)))
    }

    fn string_literal(&mut self, quote: char) -> Result<SqlToken, LexError> {
        let pivot = self.position;
        self.next();
        loop {
            if self.eof() {
                return Err(LexError::new("Unterminated string literal", pivot, self));
            }
            let current = self.current();
            if current == '\\' {
                self.position += 2;
                continue;
            }
            if current == quote {
                if self.peek(1) == quote {
                    self.position += 2;
                    continue;
                }
                self.next();
                break;
            }
            self.next();
        }
        Ok(SqlToken::StringLiteral(self.text_from_pivot(pivot)))
    }

    fn positional_parameter(&mut self) -> SqlToken {
        let pivot = self.position;
        self.next();
        while !self.eof() && self.current().is_ascii_digit() {
            self.next();
        }
        SqlToken::Placeholder(self.text_from_pivot(pivot))
    }

    fn is_exponent_at(&self, offset: usize) -> bool {
        matches!(self.peek(offset), 'e' | 'E')
            && (self.peek(offset + 1).is_ascii_digit()
                || (matches!(self.peek(offset + 1), '+' | '-') && self.peek(offset + 2).is_ascii_digit()))
    }

    fn number_or_word(&mut self) -> SqlToken {
        let pivot = self.position;

        if self.current() == '0' && matches!(self.peek(1), 'x' | 'X' | 'b' | 'B') && self.peek(2).is_ascii_hexdigit() {
            self.position += 2;
            while !self.eof() && self.current().is_ascii_hexdigit() {
                self.next();
            }
        } else {
            while !self.eof() && self.current().is_ascii_digit() {
                self.next();
            }
            if self.current() == '.' && self.peek(1).is_ascii_digit() {
                self.next();
                while !self.eof() && self.current().is_ascii_digit() {
                    self.next();
                }
            } else if self.current() == '.' && self.is_exponent_at(1) {
                // `1.e5`
                self.next();
            } else if self.current() == '.' && !Self::is_word_start(self.peek(1)) && self.peek(1) != '`' {
                // `32.` is still a number
                self.next();
            }
            if self.is_exponent_at(0) {
                self.position += 2;
                while !self.eof() && self.current().is_ascii_digit() {
                    self.next();
                }
            }
        }

        // MySQL accepts identifiers that start with digits, e.g. `1st_quarter`
        if Self::is_word_part(self.current()) {
            while !self.eof() && Self::is_word_part(self.current()) {
                self.next();
            }
            return SqlToken::Word(self.text_from_pivot(pivot));
        }

        SqlToken::NumberLiteral(self.text_from_pivot(pivot))
    }

    fn word(&mut self) -> SqlToken {
        let pivot = self.position;
        while !self.eof() && Self::is_word_part(self.current()) {
            self.next();
        }
        SqlToken::Word(self.text_from_pivot(pivot))
    }

    fn operator_or_punctuation(&mut self) -> SqlToken {
        for operator in THREE_CHAR_OPERATORS.iter().chain(TWO_CHAR_OPERATORS.iter()) {
            if self.starts_with(operator) {
                self.position += operator.chars().count();
                return SqlToken::Operator(operator.to_string());
            }
        }

        let current = self.current();
        self.next();
        if SINGLE_CHAR_OPERATORS.contains(current) {
            SqlToken::Operator(current.to_string())
        } else {
            SqlToken::Punctuation(current)
        }
    }
}
