//! Read-only guard for generated SQL
//!
//! Runs before anything reaches the backend. A statement passes only if it is a single
//! SELECT/WITH/VALUES statement with no mutating keyword outside of string literals,
//! quoted identifiers and comments.

use super::error::ToolError;

/// Keywords that may modify the database or its connection
pub const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "TRUNCATE", "ATTACH", "DETACH",
    "VACUUM", "REINDEX", "PRAGMA", "GRANT", "REVOKE", "MERGE", "UPSERT",
];

/// Keywords a read-only statement may start with
const READ_ONLY_LEADS: &[&str] = &["SELECT", "WITH", "VALUES"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Semicolon,
    OpenParen,
    Other,
}

/// Split SQL into keyword-relevant tokens, dropping literals, quoted names and comments
fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return Err("unterminated comment".to_string());
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                i += 1;
                loop {
                    if i >= chars.len() {
                        return Err("unterminated quoted text".to_string());
                    }
                    if chars[i] == close {
                        // doubled quote is an escaped quote
                        if close != ']' && chars.get(i + 1) == Some(&close) {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                tokens.push(Token::Other);
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '(' => {
                tokens.push(Token::OpenParen);
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Token::Word(word.to_uppercase()));
            }
            _ => {
                tokens.push(Token::Other);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// `replace(x, y, z)` is SQLite's read-only string function
fn is_function_call(word: &str, next: Option<&Token>) -> bool {
    word == "REPLACE" && next == Some(&Token::OpenParen)
}

fn reject(reason: impl Into<String>) -> ToolError {
    ToolError::UnsafeQueryRejected { reason: reason.into() }
}

/// Accept `sql` only if it is a single read-only statement
pub fn check_read_only(sql: &str) -> Result<(), ToolError> {
    let mut tokens = tokenize(sql).map_err(reject)?;

    while tokens.last() == Some(&Token::Semicolon) {
        tokens.pop();
    }

    if tokens.is_empty() {
        return Err(reject("empty statement"));
    }

    if tokens.contains(&Token::Semicolon) {
        return Err(reject("multiple statements"));
    }

    for (pos, token) in tokens.iter().enumerate() {
        if let Token::Word(word) = token {
            if is_function_call(word, tokens.get(pos + 1)) {
                continue;
            }
            if MUTATING_KEYWORDS.contains(&word.as_str()) {
                return Err(reject(format!("mutating keyword {}", word)));
            }
        }
    }

    match &tokens[0] {
        Token::Word(word) if READ_ONLY_LEADS.contains(&word.as_str()) => Ok(()),
        Token::Word(word) => Err(reject(format!("statement starts with {}", word))),
        _ => Err(reject("statement does not start with a keyword")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(sql: &str) -> bool {
        matches!(check_read_only(sql), Err(ToolError::UnsafeQueryRejected { .. }))
    }

    #[test]
    fn test_accepts_plain_select() {
        assert!(check_read_only("SELECT email FROM people WHERE name = 'Paula Walker'").is_ok());
        assert!(check_read_only("select count(*) from people;").is_ok());
        assert!(check_read_only("  SELECT 1 ;  ;").is_ok());
    }

    #[test]
    fn test_accepts_with_and_values() {
        assert!(check_read_only("WITH t AS (SELECT 1 AS x) SELECT x FROM t").is_ok());
        assert!(check_read_only("VALUES (1), (2)").is_ok());
    }

    #[test]
    fn test_ignores_keywords_in_literals_and_comments() {
        assert!(check_read_only("SELECT * FROM notes WHERE body = 'please DELETE me'").is_ok());
        assert!(check_read_only("SELECT \"update\" FROM audit").is_ok());
        assert!(check_read_only("SELECT [drop] FROM t").is_ok());
        assert!(check_read_only("SELECT `insert` FROM t").is_ok());
        assert!(check_read_only("SELECT 1 -- DROP TABLE people").is_ok());
        assert!(check_read_only("SELECT /* ALTER */ 1").is_ok());
        assert!(check_read_only("SELECT 'it''s; DROP TABLE x' FROM t").is_ok());
    }

    #[test]
    fn test_identifiers_containing_keywords_pass() {
        assert!(check_read_only("SELECT updated_at, created_by FROM people").is_ok());
    }

    #[test]
    fn test_rejects_mutations() {
        for sql in [
            "DELETE FROM people",
            "UPDATE people SET email = 'x'",
            "INSERT INTO people VALUES (1)",
            "DROP TABLE people",
            "ALTER TABLE people ADD COLUMN x",
            "CREATE TABLE x (a)",
            "PRAGMA writable_schema = 1",
            "ATTACH DATABASE 'x.db' AS x",
            "VACUUM",
            "REPLACE INTO people VALUES (1)",
        ] {
            assert!(rejected(sql), "expected rejection: {}", sql);
        }
    }

    #[test]
    fn test_accepts_replace_function() {
        assert!(check_read_only("SELECT replace(phone,'-','') FROM people").is_ok());
        assert!(
            check_read_only("SELECT replace (phone, '-', '') FROM people WHERE name = 'Paula Walker'").is_ok()
        );
    }

    #[test]
    fn test_rejects_replace_statement() {
        assert!(rejected("REPLACE INTO people (name) VALUES ('Mallory')"));
        assert!(rejected("INSERT OR REPLACE INTO people VALUES (1)"));
        assert!(rejected("WITH x AS (SELECT 1) REPLACE INTO people SELECT * FROM x"));
    }

    #[test]
    fn test_rejects_mutation_inside_cte() {
        assert!(rejected("WITH x AS (DELETE FROM people RETURNING *) SELECT * FROM x"));
    }

    #[test]
    fn test_rejects_stacked_statements() {
        assert!(rejected("SELECT 1; SELECT 2"));
        assert!(rejected("SELECT 1; DROP TABLE people"));
        assert!(rejected("SELECT 1 /* c */ ; -- x\n DELETE FROM t"));
    }

    #[test]
    fn test_rejects_non_select_lead() {
        assert!(rejected("EXPLAIN SELECT 1"));
        assert!(rejected("(SELECT 1)"));
        assert!(rejected(""));
        assert!(rejected("  ;  "));
        assert!(rejected("-- only a comment"));
    }

    #[test]
    fn test_rejects_unterminated() {
        assert!(rejected("SELECT 'oops"));
        assert!(rejected("SELECT 1 /* never closed"));
    }

    #[test]
    fn test_rejection_reason() {
        let err = check_read_only("DELETE FROM people").unwrap_err();
        assert_eq!(err.to_string(), "Unsafe query rejected: mutating keyword DELETE");
        let err = check_read_only("SELECT 1; SELECT 2").unwrap_err();
        assert_eq!(err.to_string(), "Unsafe query rejected: multiple statements");
    }
}
