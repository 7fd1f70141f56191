use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::sql::{LexError, SqlLexer, SqlToken};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReservedWordMetadata {
    /// Words that, when found immediately before the reserved word (nearest
    /// first), make the occurrence harmless. `UPDATE` is fine in `FOR UPDATE`.
    pub exemption_prefixes: &'static [&'static str],
}

impl ReservedWordMetadata {
    pub const fn new() -> Self {
        Self { exemption_prefixes: &[] }
    }

    pub const fn with_exemption_prefixes(prefixes: &'static [&'static str]) -> Self {
        Self { exemption_prefixes: prefixes }
    }
}

pub type ReservedWords = HashMap<&'static str, ReservedWordMetadata>;

/// Statements the engine cannot (or must not) EXPLAIN: writes, DDL,
/// transaction and session control, administrative commands.
pub static EXPLAIN_RESERVED_WORD_DENYLIST: Lazy<ReservedWords> = Lazy::new(|| {
    let mut words = ReservedWords::new();

    // data manipulation
    words.insert("INSERT", ReservedWordMetadata::new());
    words.insert("UPDATE", ReservedWordMetadata::with_exemption_prefixes(&["FOR"]));
    for word in ["DELETE", "REPLACE", "MERGE", "UPSERT"] {
        words.insert(word, ReservedWordMetadata::new());
    }

    // schema changes
    for word in ["CREATE", "ALTER", "DROP", "RENAME", "TRUNCATE"] {
        words.insert(word, ReservedWordMetadata::new());
    }

    // transactions
    for word in ["BEGIN", "COMMIT", "ROLLBACK", "SAVEPOINT", "TRANSACTION"] {
        words.insert(word, ReservedWordMetadata::new());
    }

    // database / schema selection, maintenance, permissions
    for word in ["USE", "DATABASE", "SCHEMA", "REINDEX", "ANALYZE", "OPTIMIZE", "GRANT", "REVOKE"] {
        words.insert(word, ReservedWordMetadata::new());
    }

    // MySQL write modifiers
    for word in ["LOAD", "DELAYED", "IGNORE", "LOW_PRIORITY", "HIGH_PRIORITY", "QUICK"] {
        words.insert(word, ReservedWordMetadata::new());
    }

    // session and server commands shared with other engines
    for word in [
        "COPY", "VACUUM", "CLUSTER", "LISTEN", "NOTIFY", "DISCARD", "PREPARE", "EXECUTE",
        "DEALLOCATE", "RESET", "SET", "UNLISTEN", "DECLARE", "CLOSE",
    ] {
        words.insert(word, ReservedWordMetadata::new());
    }

    words.insert("EXPLAIN", ReservedWordMetadata::new());

    words
});

/// Reports whether `query` uses any of `reserved_words` as a bare word.
///
/// String literals, quoted identifiers and comments never match, and words
/// are compared case-insensitively. Fails only when the query cannot be
/// tokenized (unterminated quotes).
pub fn contains_reserved_keywords(query: &str, reserved_words: &ReservedWords) -> Result<bool, LexError> {
    let tokens = SqlLexer::new(query).tokenize()?
        .into_iter()
        .filter(|token| !token.is_comment())
        .collect::<Vec<_>>();

    for (index, token) in tokens.iter().enumerate() {
        let SqlToken::Word(word) = token else {
            continue;
        };

        let Some(metadata) = reserved_words.get(word.to_uppercase().as_str()) else {
            continue;
        };

        if !is_exempt(&tokens[..index], metadata.exemption_prefixes) {
            return Ok(true);
        }
    }

    Ok(false)
}

fn is_exempt(preceding: &[SqlToken], prefixes: &[&str]) -> bool {
    if prefixes.is_empty() || preceding.len() < prefixes.len() {
        return false;
    }

    prefixes.iter()
        .zip(preceding.iter().rev())
        .all(|(prefix, token)| matches!(token, SqlToken::Word(word) if word.eq_ignore_ascii_case(prefix)))
}

#[cfg(test)]
pub mod tests {
    use crate::sql::{contains_reserved_keywords, ReservedWordMetadata, ReservedWords, EXPLAIN_RESERVED_WORD_DENYLIST};

    fn check(query: &str) -> bool {
        contains_reserved_keywords(query, &EXPLAIN_RESERVED_WORD_DENYLIST).unwrap()
    }

    #[test]
    pub fn test_detects_write_statements() {
        assert!(check("INSERT INTO users (name) VALUES ('John')"));
        assert!(check("update some_table set col = 1 where id = 1"));
        assert!(check("delete from some_table"));
        assert!(check("CREATE TABLE users (id INT, name VARCHAR(50))"));
        assert!(check("DROP TABLE users"));
        assert!(check("WITH cte AS (SELECT * FROM users) INSERT into users (name) VALUES ('John')"));
    }

    #[test]
    pub fn test_detects_session_and_admin_statements() {
        assert!(check("EXPLAIN SELECT * FROM users"));
        assert!(check("PREPARE stmt AS SELECT * FROM users WHERE id = $1"));
        assert!(check("SET search_path TO public"));
        assert!(check("START TRANSACTION"));
    }

    #[test]
    pub fn test_ignores_words_inside_literals_identifiers_and_comments() {
        assert!(!check("SELECT 'INSERT INTO table' FROM users"));
        assert!(!check("SELECT insert_date FROM users"));
        assert!(!check("SELECT * FROM users -- INSERT comment"));
        assert!(!check("SELECT * FROM users /* INSERT block comment */"));
        assert!(!check(r#"SELECT "create_date" FROM users"#));
        assert!(!check("SELECT `insert` FROM users"));
        assert!(!check("SELECT * FROM delete_log"));
        assert!(!check("SELECT name AS drop_reason FROM users"));
        assert!(!check("SELECT * FROM users WHERE description LIKE '%CREATE%'"));
    }

    #[test]
    pub fn test_plain_selects_pass() {
        assert!(!check("SELECT u.name, p.title FROM users u JOIN posts p ON u.id = p.user_id"));
        assert!(!check("WITH cte AS (SELECT * FROM users) SELECT * FROM cte"));
        assert!(!check("SELECT name FROM users LOCK IN SHARE MODE"));
    }

    #[test]
    pub fn test_exemption_prefix() {
        assert!(!check("SELECT name FROM users FOR UPDATE"));
        assert!(check("SELECT * FROM users FOR UPDATE UPDATE users SET name = 'John'"));
    }

    #[test]
    pub fn test_multiple_exemption_prefixes() {
        let mut words = ReservedWords::new();
        words.insert("MODE", ReservedWordMetadata::with_exemption_prefixes(&["SHARE", "IN", "LOCK"]));
        assert!(!contains_reserved_keywords("SELECT name FROM users LOCK IN SHARE MODE", &words).unwrap());

        let mut words = ReservedWords::new();
        words.insert("MODE", ReservedWordMetadata::with_exemption_prefixes(&["SHARE", "IN", "LOCK", "EXTRA"]));
        assert!(contains_reserved_keywords("SELECT name FROM users LOCK IN SHARE MODE", &words).unwrap());

        let mut words = ReservedWords::new();
        words.insert("MODE", ReservedWordMetadata::with_exemption_prefixes(&["SHARE"]));
        assert!(!contains_reserved_keywords("SELECT name FROM users LOCK IN SHARE MODE", &words).unwrap());
    }

    #[test]
    pub fn test_lexer_error_is_reported() {
        assert!(contains_reserved_keywords("SELECT `foo", &EXPLAIN_RESERVED_WORD_DENYLIST).is_err());
    }
}
