//! SQL script splitting and sequential execution
//!
//! Scripts are split on `;` outside string literals, quoted identifiers and
//! comments. Statements run strictly in order and the last one's result is
//! surfaced. A leading `USE <db>` runs on its own first and a failure there
//! is tolerated, since the database may already be selected.

use async_trait::async_trait;
use std::time::Instant;

use crate::{ConduitError, QueryResult, Result};

/// Lexical rules that differ between SQL servers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SqlDialect {
    #[default]
    Standard,
    /// `$$ ... $$` and `$tag$ ... $tag$` bodies
    Postgres,
    /// Backslash escapes inside quoted strings (MySQL, MariaDB, ClickHouse)
    MySql,
}

impl SqlDialect {
    fn dollar_quotes(self) -> bool {
        self == SqlDialect::Postgres
    }

    fn backslash_escapes(self) -> bool {
        self == SqlDialect::MySql
    }
}

/// Something that can run one SQL statement
#[async_trait]
pub trait StatementExecutor: Send {
    async fn execute_statement(&mut self, sql: &str) -> Result<QueryResult>;

    /// Rules used to split scripts for this executor
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Standard
    }
}

/// Dollar-quote opener (`$$` or `$tag$`) starting at `i`, if any
fn dollar_tag(chars: &[char], i: usize) -> Option<String> {
    // `$` inside an identifier (`a$b`) or a positional parameter (`$1`) opens nothing
    if i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '_' || chars[i - 1] == '$') {
        return None;
    }
    let mut j = i + 1;
    while let Some(&c) = chars.get(j) {
        if c == '$' {
            return Some(chars[i..=j].iter().collect());
        }
        let valid = if j == i + 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
        j += 1;
    }
    None
}

fn starts_with_at(chars: &[char], i: usize, needle: &[char]) -> bool {
    chars.len() >= i + needle.len() && chars[i..i + needle.len()] == *needle
}

/// Split a multi-statement SQL string into individual statements
///
/// Splits on semicolons while respecting `'`/`"`/`` ` `` quoting (doubled
/// quote escapes), `--` line comments and `/* */` block comments, plus the
/// dialect's dollar quoting or backslash escapes. Fragments holding nothing
/// but comments are dropped.
pub fn split_sql_statements(sql: &str, dialect: SqlDialect) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut string_char = '"';
    let mut dollar_close: Option<Vec<char>> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let chars: Vec<char> = sql.chars().collect();
    let len = chars.len();
    let mut i = 0;

    let mut flush = |current: &mut String| {
        let trimmed = current.trim();
        if !trimmed.is_empty() && !is_comment_only(trimmed) {
            statements.push(trimmed.to_string());
        }
        current.clear();
    };

    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if in_line_comment {
            current.push(c);
            if c == '\n' {
                in_line_comment = false;
            }
            i += 1;
            continue;
        }

        if in_block_comment {
            current.push(c);
            if c == '*' && next == Some('/') {
                current.push('/');
                in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }

        if let Some(tag) = &dollar_close {
            if starts_with_at(&chars, i, tag) {
                current.extend(tag.iter());
                i += tag.len();
                dollar_close = None;
            } else {
                current.push(c);
                i += 1;
            }
            continue;
        }

        if in_string {
            current.push(c);
            if c == '\\' && dialect.backslash_escapes() && string_char != '`' {
                if let Some(escaped) = next {
                    current.push(escaped);
                    i += 2;
                    continue;
                }
            } else if c == string_char {
                if next == Some(string_char) {
                    current.push(string_char);
                    i += 2;
                    continue;
                }
                in_string = false;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('-', Some('-')) => {
                in_line_comment = true;
                current.push_str("--");
                i += 2;
            }
            ('/', Some('*')) => {
                in_block_comment = true;
                current.push_str("/*");
                i += 2;
            }
            ('\'' | '"' | '`', _) => {
                in_string = true;
                string_char = c;
                current.push(c);
                i += 1;
            }
            ('$', _) if dialect.dollar_quotes() => match dollar_tag(&chars, i) {
                Some(tag) => {
                    current.push_str(&tag);
                    i += tag.chars().count();
                    dollar_close = Some(tag.chars().collect());
                }
                None => {
                    current.push(c);
                    i += 1;
                }
            },
            (';', _) => {
                flush(&mut current);
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }

    flush(&mut current);
    statements
}

/// Text after any leading whitespace, `--` and `/* */` comments
///
/// An unterminated block comment swallows the rest.
pub fn strip_leading_comments(fragment: &str) -> &str {
    let mut rest = fragment.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            match after.find("*/") {
                Some(end) => rest = after[end + 2..].trim_start(),
                None => return "",
            }
        } else {
            return rest;
        }
    }
}

/// Whether a fragment contains only comments and whitespace
fn is_comment_only(fragment: &str) -> bool {
    strip_leading_comments(fragment).is_empty()
}

/// Database named by a `USE` statement, with quoting removed
///
/// Comments before the keyword are ignored.
pub fn use_database_name(statement: &str) -> Option<String> {
    let statement = strip_leading_comments(statement);
    let (keyword, rest) = statement.split_once(char::is_whitespace)?;
    if !keyword.eq_ignore_ascii_case("use") {
        return None;
    }
    let rest = rest.trim_start();
    let name = match rest.chars().next()? {
        open @ ('`' | '"' | '[') => {
            let close = if open == '[' { ']' } else { open };
            rest[1..].split(close).next()?
        }
        _ => rest
            .split(|c: char| c.is_whitespace() || c == ';')
            .next()?,
    };
    (!name.is_empty()).then(|| name.to_string())
}

/// Separate a leading `USE` statement from the rest of the script
pub fn take_use_prefix(mut statements: Vec<String>) -> (Option<String>, Vec<String>) {
    match statements.first() {
        Some(first) if use_database_name(first).is_some() => {
            let use_stmt = statements.remove(0);
            (Some(use_stmt), statements)
        }
        _ => (None, statements),
    }
}

fn preview(sql: &str) -> String {
    let flat: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 80 {
        format!("{}...", flat.chars().take(80).collect::<String>())
    } else {
        flat
    }
}

/// Run a script statement by statement and return the last result
///
/// A failing statement aborts the rest of the script and the error names it
/// by position and text.
pub async fn run_sql_script<E>(executor: &mut E, sql: &str) -> Result<QueryResult>
where
    E: StatementExecutor + ?Sized,
{
    let start = Instant::now();
    let (use_stmt, statements) = take_use_prefix(split_sql_statements(sql, executor.dialect()));

    if let Some(use_stmt) = use_stmt {
        if let Err(e) = executor.execute_statement(&use_stmt).await {
            tracing::warn!(statement = %preview(&use_stmt), error = %e, "USE statement failed, continuing");
        }
    }

    let total = statements.len();
    let mut last = QueryResult::empty();
    for (idx, statement) in statements.iter().enumerate() {
        tracing::debug!(index = idx + 1, total, statement = %preview(statement), "executing statement");
        last = executor.execute_statement(statement).await.map_err(|e| {
            let cause = match e {
                ConduitError::Exec(msg) => msg,
                other => other.to_string(),
            };
            ConduitError::Exec(format!(
                "statement {} of {} failed ({}): {}",
                idx + 1,
                total,
                preview(statement),
                cause
            ))
        })?;
    }

    last.execution_time_ms = start.elapsed().as_millis() as u64;
    Ok(last)
}

#[cfg(test)]
mod tests;
