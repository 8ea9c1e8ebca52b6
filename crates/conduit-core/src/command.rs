//! Tokenizer for service-style command providers
//!
//! The first whitespace token names the command and the rest are positional
//! arguments. Quoted arguments keep their spaces.

use crate::{ConduitError, Result};

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
    raw: String,
}

impl Command {
    /// Required positional argument
    pub fn arg(&self, index: usize, what: &str) -> Result<&str> {
        self.args.get(index).map(|s| s.as_str()).ok_or_else(|| {
            ConduitError::Exec(format!("'{}' requires a {} argument", self.name, what))
        })
    }

    pub fn opt_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|s| s.as_str())
    }

    /// Raw text following the first `skip` arguments
    ///
    /// JSON bodies and free-form messages are taken verbatim from here so
    /// quoting inside them survives untouched.
    pub fn rest(&self, skip: usize) -> Option<&str> {
        let mut remaining = self.raw.trim_start();
        // skip the command name plus `skip` arguments
        for _ in 0..=skip {
            let end = remaining
                .find(char::is_whitespace)
                .unwrap_or(remaining.len());
            remaining = remaining[end..].trim_start();
        }
        let remaining = remaining.trim_end();
        (!remaining.is_empty()).then_some(remaining)
    }

    /// Free-form text after `skip` arguments
    ///
    /// A rest that is exactly one quoted token is unquoted; anything else is
    /// returned as `rest` would return it.
    pub fn text(&self, skip: usize) -> Option<String> {
        let rest = self.rest(skip)?;
        if rest.starts_with(['"', '\''])
            && let Some(mut tokens) = shlex::split(rest)
            && tokens.len() == 1
        {
            return tokens.pop();
        }
        Some(rest.to_string())
    }
}

/// Shell-style split; unbalanced quotes fall back to plain whitespace
pub fn tokenize(text: &str) -> Vec<String> {
    shlex::split(text).unwrap_or_else(|| text.split_whitespace().map(str::to_string).collect())
}

/// Parse `text` against a closed vocabulary of command names
pub fn parse_command(text: &str, supported: &[&str]) -> Result<Command> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConduitError::Exec(format!(
            "empty command, supported: {}",
            supported.join(", ")
        )));
    }

    let mut tokens = tokenize(trimmed).into_iter();
    let name = tokens.next().unwrap_or_default().to_lowercase();

    if !supported.contains(&name.as_str()) {
        return Err(ConduitError::unknown_command(&name, supported));
    }

    Ok(Command {
        name,
        args: tokens.collect(),
        raw: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: &[&str] = &["publish", "get", "containers"];

    #[test]
    fn test_parse_positional_args() {
        let cmd = parse_command("publish orders \"hello world\"", VOCAB).unwrap();
        assert_eq!(cmd.name, "publish");
        assert_eq!(cmd.args, vec!["orders", "hello world"]);
        assert_eq!(cmd.rest(1), Some("\"hello world\""));
        assert_eq!(cmd.text(1).as_deref(), Some("hello world"));
    }

    #[test]
    fn test_text_unquotes_single_token_only() {
        let cmd = parse_command("publish q 'it''s'", VOCAB).unwrap();
        assert_eq!(cmd.text(1).as_deref(), Some("its"));

        let cmd = parse_command("publish q hello \"big\" world", VOCAB).unwrap();
        assert_eq!(cmd.text(1).as_deref(), Some("hello \"big\" world"));

        let cmd = parse_command("publish q \"a\" \"b\"", VOCAB).unwrap();
        assert_eq!(cmd.text(1).as_deref(), Some("\"a\" \"b\""));

        let cmd = parse_command("publish q \"unterminated", VOCAB).unwrap();
        assert_eq!(cmd.text(1).as_deref(), Some("\"unterminated"));

        let cmd = parse_command("publish q", VOCAB).unwrap();
        assert_eq!(cmd.text(1), None);
    }

    #[test]
    fn test_unknown_command_lists_vocabulary() {
        let err = parse_command("explode now", VOCAB).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Execution error: unknown command 'explode', supported: publish, get, containers"
        );
    }

    #[test]
    fn test_name_is_case_insensitive() {
        let cmd = parse_command("  CONTAINERS ", VOCAB).unwrap();
        assert_eq!(cmd.name, "containers");
        assert!(cmd.args.is_empty());
        assert_eq!(cmd.rest(0), None);
    }

    #[test]
    fn test_missing_argument_message() {
        let cmd = parse_command("get", VOCAB).unwrap();
        let err = cmd.arg(0, "queue").unwrap_err();
        assert!(err.to_string().contains("'get' requires a queue argument"));
    }

    #[test]
    fn test_rest_keeps_json_verbatim() {
        let cmd = parse_command(r#"get idx {"query": {"match_all": {}}}"#, VOCAB).unwrap();
        assert_eq!(cmd.rest(1), Some(r#"{"query": {"match_all": {}}}"#));
    }

    #[test]
    fn test_tokenize_unbalanced_quote_falls_back() {
        assert_eq!(tokenize("SET k 'v w'"), vec!["SET", "k", "v w"]);
        assert_eq!(tokenize("SET k 'v"), vec!["SET", "k", "'v"]);
    }

    #[test]
    fn test_empty_command() {
        assert!(parse_command("   ", VOCAB).is_err());
    }
}
