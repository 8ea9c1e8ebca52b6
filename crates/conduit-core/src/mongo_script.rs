//! Mongo shell script pattern matching
//!
//! Recognizes `db.<collection>.<verb>(<args>)` call shapes, a `use <db>`
//! statement and a `// Database: <name>` comment. Arguments are literal
//! structured data parsed by [`parse_literal`]; nothing is evaluated.

mod literal;

use regex::Regex;
use serde_json::Value as Json;
use std::sync::LazyLock;

use crate::{ConduitError, Result};

pub use literal::parse_literal;

static CALL_HEAD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^db\s*\.\s*(?:getCollection\(\s*["']([^"']+)["']\s*\)|([A-Za-z0-9_$\-]+(?:\.[A-Za-z0-9_$\-]+)*?))\s*\.\s*([A-Za-z]+)\s*\("#,
    )
    .expect("valid regex")
});

static USE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^use\s+([A-Za-z0-9_\-.$]+)\s*;?$").expect("valid regex"));

static DATABASE_COMMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^//\s*Database:\s*([A-Za-z0-9_\-.$]+)\s*$").expect("valid regex")
});

/// Collection operations understood by the script matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MongoVerb {
    Find,
    Aggregate,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    CountDocuments,
}

impl MongoVerb {
    pub const SUPPORTED: &'static [&'static str] = &[
        "find",
        "aggregate",
        "insertOne",
        "insertMany",
        "updateOne",
        "updateMany",
        "deleteOne",
        "deleteMany",
        "countDocuments",
    ];

    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "find" => MongoVerb::Find,
            "aggregate" => MongoVerb::Aggregate,
            "insertOne" => MongoVerb::InsertOne,
            "insertMany" => MongoVerb::InsertMany,
            "updateOne" => MongoVerb::UpdateOne,
            "updateMany" => MongoVerb::UpdateMany,
            "deleteOne" => MongoVerb::DeleteOne,
            "deleteMany" => MongoVerb::DeleteMany,
            "countDocuments" => MongoVerb::CountDocuments,
            other => return Err(ConduitError::unknown_command(other, Self::SUPPORTED)),
        })
    }

    /// Inclusive bounds on positional argument count
    fn arity(&self) -> (usize, usize) {
        match self {
            MongoVerb::Find => (0, 2),
            MongoVerb::Aggregate => (1, 2),
            MongoVerb::InsertOne | MongoVerb::InsertMany => (1, 2),
            MongoVerb::UpdateOne | MongoVerb::UpdateMany => (2, 3),
            MongoVerb::DeleteOne | MongoVerb::DeleteMany => (1, 2),
            MongoVerb::CountDocuments => (0, 2),
        }
    }
}

/// Cursor modifiers chained after `find(...)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindModifiers {
    pub sort: Option<Json>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

/// One recognized collection call
#[derive(Debug, Clone, PartialEq)]
pub struct MongoCall {
    /// Database selected by the last `use` or `// Database:` line before this call
    pub database: Option<String>,
    pub collection: String,
    pub verb: MongoVerb,
    pub args: Vec<Json>,
    pub modifiers: FindModifiers,
}

impl MongoCall {
    /// Argument at `index`, or an empty document
    pub fn arg_or_empty(&self, index: usize) -> Json {
        self.args
            .get(index)
            .cloned()
            .unwrap_or_else(|| Json::Object(Default::default()))
    }
}

/// A parsed script: calls in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MongoScript {
    /// Database selected when the script ends
    pub database: Option<String>,
    pub calls: Vec<MongoCall>,
}

/// Parse a script into collection calls
///
/// A `use <db>` statement or `// Database: <db>` line switches the database
/// for the calls after it only.
pub fn parse_script(text: &str) -> Result<MongoScript> {
    let mut script = MongoScript::default();
    let mut kept = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(caps) = DATABASE_COMMENT_REGEX.captures(trimmed) {
            // kept in place as a statement so ordering survives the split
            kept.push_str("use ");
            kept.push_str(&caps[1]);
            kept.push('\n');
            continue;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }

    for statement in split_statements(&kept) {
        if let Some(caps) = USE_REGEX.captures(&statement) {
            script.database = Some(caps[1].to_string());
            continue;
        }
        let mut call = parse_call(&statement)?;
        call.database = script.database.clone();
        script.calls.push(call);
    }

    Ok(script)
}

/// Split script text into statements on `;` or line ends at depth zero
///
/// A line that ends a complete statement is not a boundary when the next
/// non-blank text starts a chained `.method(...)` call.
fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    current.push(escaped);
                    i += 2;
                    continue;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '{' | '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            '}' | ']' | ')' => {
                depth -= 1;
                current.push(c);
            }
            ';' if depth <= 0 => push_statement(&mut statements, &mut current),
            '\n' if depth <= 0 => {
                let continues = chars[i + 1..]
                    .iter()
                    .find(|ch| !ch.is_whitespace())
                    .is_some_and(|ch| *ch == '.');
                if continues {
                    current.push(c);
                } else {
                    push_statement(&mut statements, &mut current);
                }
            }
            _ => current.push(c),
        }
        i += 1;
    }

    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

/// Index of the bracket closing the one at `open`, honoring quotes
fn find_closing(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut i = open;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '{' | '[' | '(' => depth += 1,
                '}' | ']' | ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn parse_call(statement: &str) -> Result<MongoCall> {
    let caps = CALL_HEAD_REGEX.captures(statement).ok_or_else(|| {
        ConduitError::Exec(format!(
            "unrecognized statement '{}', expected db.<collection>.<method>(...) or use <database>",
            first_line(statement)
        ))
    })?;

    let collection = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let verb = MongoVerb::parse(&caps[3])?;

    let chars: Vec<char> = statement.chars().collect();
    let open = statement[..caps.get(0).map(|m| m.end()).unwrap_or(0)].chars().count() - 1;
    let close = find_closing(&chars, open).ok_or_else(|| {
        ConduitError::Exec(format!("unbalanced parentheses in '{}'", first_line(statement)))
    })?;

    let inner: String = chars[open + 1..close].iter().collect();
    let args = split_top_level_args(&inner)
        .iter()
        .map(|raw| parse_literal(raw))
        .collect::<Result<Vec<_>>>()?;

    let (min, max) = verb.arity();
    if args.len() < min || args.len() > max {
        return Err(ConduitError::Exec(format!(
            "{} expects {} to {} arguments, got {}",
            &caps[3],
            min,
            max,
            args.len()
        )));
    }

    let tail: String = chars[close + 1..].iter().collect();
    let modifiers = parse_modifiers(verb, &tail)?;

    Ok(MongoCall {
        database: None,
        collection,
        verb,
        args,
        modifiers,
    })
}

fn parse_modifiers(verb: MongoVerb, tail: &str) -> Result<FindModifiers> {
    let mut modifiers = FindModifiers::default();
    let chars: Vec<char> = tail.trim().trim_end_matches(';').trim().chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        if chars[i] != '.' {
            return Err(ConduitError::Exec(format!(
                "unexpected text after call: '{}'",
                chars[i..].iter().collect::<String>()
            )));
        }
        let name_start = i + 1;
        let mut j = name_start;
        while j < chars.len() && chars[j].is_ascii_alphabetic() {
            j += 1;
        }
        let name: String = chars[name_start..j].iter().collect();
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        if chars.get(j) != Some(&'(') {
            return Err(ConduitError::Exec(format!("expected '(' after .{}", name)));
        }
        let close = find_closing(&chars, j)
            .ok_or_else(|| ConduitError::Exec(format!("unbalanced parentheses in .{}", name)))?;
        let inner: String = chars[j + 1..close].iter().collect();
        let value = parse_literal(&inner)?;

        if verb != MongoVerb::Find && name != "toArray" {
            return Err(ConduitError::Exec(format!(
                ".{}() can only follow find()",
                name
            )));
        }
        match name.as_str() {
            "sort" => modifiers.sort = Some(value),
            "limit" => {
                modifiers.limit = Some(value.as_i64().ok_or_else(|| {
                    ConduitError::Exec("limit() expects a number".to_string())
                })?)
            }
            "skip" => {
                modifiers.skip = Some(value.as_u64().ok_or_else(|| {
                    ConduitError::Exec("skip() expects a non-negative number".to_string())
                })?)
            }
            "toArray" | "pretty" => {}
            other => {
                return Err(ConduitError::unknown_command(
                    other,
                    &["sort", "limit", "skip", "toArray", "pretty"],
                ));
            }
        }
        i = close + 1;
    }

    Ok(modifiers)
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement).trim()
}

/// Split an argument list on commas at bracket depth zero
///
/// Commas inside `{}`, `[]`, `()` or quoted strings do not split. Empty
/// trailing arguments are dropped.
pub fn split_top_level_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '{' | '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            '}' | ']' | ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                let arg = current.trim();
                if !arg.is_empty() {
                    args.push(arg.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let arg = current.trim();
    if !arg.is_empty() {
        args.push(arg.to_string());
    }
    args
}
