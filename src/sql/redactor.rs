use crate::sql::{LexError, SqlLexer, SqlToken};

/// Placeholder written in place of every literal value.
pub const REDACTED_LITERAL: &str = "?";

/// Replaces literal values in a SQL fragment with `?`.
///
/// The output is normalized: comments are dropped, bare words are
/// lower-cased, backtick identifiers are kept verbatim and all tokens are
/// separated by a single space, so
/// `` (`t`.`d` = DATE'9999-01-01') `` becomes `` ( `t` . `d` = date ? ) ``.
/// Running the redactor over its own output yields the same text.
pub fn redact_sql(sql: &str) -> Result<String, LexError> {
    let tokens = SqlLexer::new(sql).tokenize()?;

    let rendered = tokens.into_iter()
        .filter_map(|token| match token {
            SqlToken::Comment(_) => None,
            SqlToken::StringLiteral(_) | SqlToken::NumberLiteral(_) | SqlToken::Placeholder(_) => Some(REDACTED_LITERAL.to_string()),
            SqlToken::Word(word) => Some(word.to_lowercase()),
            SqlToken::QuotedIdentifier(identifier) => Some(identifier),
            SqlToken::Operator(operator) => Some(operator),
            SqlToken::Punctuation(ch) => Some(ch.to_string()),
        })
        .collect::<Vec<_>>();

    Ok(rendered.join(" "))
}
