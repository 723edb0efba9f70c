use std::collections::HashMap;

/// A command tokenized into its verb, optional subverb, positional
/// arguments, and `key=value` keyword arguments. Purely syntactic — it knows
/// nothing about FSM state and cannot itself fail a state check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub verb: String,
    pub subverb: Option<String>,
    pub args: Vec<String>,
    pub kwargs: HashMap<String, String>,
}

impl ParsedCommand {
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(|s| s.as_str())
    }
}

/// Tokenizes a raw `/verb [subverb] [args...] [key=value...]` line.
///
/// The verb is the leading `/`-prefixed token. A quoted `"..."` span is kept
/// as a single argument regardless of internal whitespace. Any remaining
/// bare token containing `=` is treated as a keyword argument rather than a
/// positional one; known subverbs (the second bare token, when present and
/// not itself a `key=value` pair) are lifted into `subverb`.
pub fn parse_command_line(line: &str) -> Option<ParsedCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.starts_with('/') {
        return None;
    }

    let tokens = tokenize(trimmed);
    let mut iter = tokens.into_iter();
    let verb = iter.next()?.trim_start_matches('/').to_string();
    if verb.is_empty() {
        return None;
    }

    let mut subverb = None;
    let mut args = Vec::new();
    let mut kwargs = HashMap::new();

    for token in iter {
        if let Some((key, value)) = split_kwarg(&token) {
            kwargs.insert(key, value);
        } else if subverb.is_none() && args.is_empty() && !token.starts_with('"') {
            subverb = Some(token);
        } else {
            args.push(unquote(&token));
        }
    }

    Some(ParsedCommand {
        verb,
        subverb,
        args,
        kwargs,
    })
}

/// Splits on whitespace runs, except inside a `"..."` span, which is emitted
/// as a single token including its quotes (stripped later by `unquote`).
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn unquote(token: &str) -> String {
    token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(token)
        .to_string()
}

fn split_kwarg(token: &str) -> Option<(String, String)> {
    if token.starts_with('"') {
        return None;
    }
    let (key, value) = token.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_verb() {
        let parsed = parse_command_line("/state").unwrap();
        assert_eq!(parsed.verb, "state");
        assert!(parsed.subverb.is_none());
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn parses_quoted_description_as_one_argument() {
        let parsed = parse_command_line(r#"/epic "ship the release notes page""#).unwrap();
        assert_eq!(parsed.verb, "epic");
        assert_eq!(parsed.args, vec!["ship the release notes page".to_string()]);
    }

    #[test]
    fn lifts_the_second_bare_token_into_subverb() {
        let parsed = parse_command_line("/sprint plan").unwrap();
        assert_eq!(parsed.verb, "sprint");
        assert_eq!(parsed.subverb, Some("plan".to_string()));
    }

    #[test]
    fn captures_key_value_pairs_as_kwargs_not_positional_args() {
        let parsed =
            parse_command_line(r#"/backlog add_story "fix the footer" epic=E1 priority=top"#)
                .unwrap();
        assert_eq!(parsed.verb, "backlog");
        assert_eq!(parsed.subverb, Some("add_story".to_string()));
        assert_eq!(parsed.args, vec!["fix the footer".to_string()]);
        assert_eq!(parsed.kwargs.get("epic"), Some(&"E1".to_string()));
        assert_eq!(parsed.kwargs.get("priority"), Some(&"top".to_string()));
    }

    #[test]
    fn rejects_text_without_a_leading_slash() {
        assert!(parse_command_line("epic do a thing").is_none());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_command_line("   ").is_none());
        assert!(parse_command_line("/").is_none());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let parsed = parse_command_line("   /state   ").unwrap();
        assert_eq!(parsed.verb, "state");
    }
}
