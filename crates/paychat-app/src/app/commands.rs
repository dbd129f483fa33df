//! REPL command parsing. Message and listing numbers are 1-based.

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Send(String),
    New,
    /// Zero-based message index
    Edit { index: usize, content: String },
    Regenerate(usize),
    History,
    Models(Option<String>),
    Conversations,
    /// Zero-based position in the last conversation listing
    Open(usize),
    Delete(usize),
    Model(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /new                 start a new chat
  /edit <n> <text>     rewrite message n (user messages are resent)
  /regen <n>           regenerate the reply at or after message n
  /history             show the current conversation
  /models [search]     list models
  /model <id>          switch model
  /conversations       list stored conversations
  /open <n>            open conversation n from the last listing
  /delete <n>          delete conversation n from the last listing
  /help                show this help
  /quit                exit
Anything else is sent as a message.";

fn parse_number(arg: &str, usage: &str) -> Result<usize, String> {
    match arg.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("Expected a number starting at 1. Usage: {}", usage)),
    }
}

impl ReplCommand {
    /// `Ok(None)` for blank input
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line == "exit" || line == "quit" {
            return Ok(Some(ReplCommand::Quit));
        }
        if !line.starts_with('/') {
            return Ok(Some(ReplCommand::Send(line.to_string())));
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name {
            "/new" | "/clear" => ReplCommand::New,
            "/edit" => {
                let usage = "/edit <n> <text>";
                let (n, content) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| format!("Usage: {}", usage))?;
                let content = content.trim();
                if content.is_empty() {
                    return Err(format!("Usage: {}", usage));
                }
                ReplCommand::Edit {
                    index: parse_number(n, usage)?,
                    content: content.to_string(),
                }
            }
            "/regen" | "/regenerate" => ReplCommand::Regenerate(parse_number(rest, "/regen <n>")?),
            "/history" => ReplCommand::History,
            "/models" => ReplCommand::Models((!rest.is_empty()).then(|| rest.to_string())),
            "/model" => {
                if rest.is_empty() {
                    return Err("Usage: /model <id>".to_string());
                }
                ReplCommand::Model(rest.to_string())
            }
            "/conversations" => ReplCommand::Conversations,
            "/open" => ReplCommand::Open(parse_number(rest, "/open <n>")?),
            "/delete" => ReplCommand::Delete(parse_number(rest, "/delete <n>")?),
            "/help" => ReplCommand::Help,
            "/quit" | "/exit" => ReplCommand::Quit,
            other => return Err(format!("Unknown command '{}'. Type /help for the list.", other)),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            ReplCommand::parse("  hello there ").unwrap(),
            Some(ReplCommand::Send("hello there".to_string()))
        );
        assert_eq!(ReplCommand::parse("   ").unwrap(), None);
        assert_eq!(ReplCommand::parse("quit").unwrap(), Some(ReplCommand::Quit));
    }

    #[test]
    fn test_edit_keeps_full_text() {
        assert_eq!(
            ReplCommand::parse("/edit 3 what about   rust?").unwrap(),
            Some(ReplCommand::Edit { index: 2, content: "what about   rust?".to_string() })
        );
        assert!(ReplCommand::parse("/edit 3").is_err());
        assert!(ReplCommand::parse("/edit x hi").is_err());
    }

    #[test]
    fn test_numbers_are_one_based() {
        assert_eq!(ReplCommand::parse("/regen 1").unwrap(), Some(ReplCommand::Regenerate(0)));
        assert_eq!(ReplCommand::parse("/open 2").unwrap(), Some(ReplCommand::Open(1)));
        assert!(ReplCommand::parse("/delete 0").is_err());
    }

    #[test]
    fn test_optional_and_required_arguments() {
        assert_eq!(ReplCommand::parse("/models").unwrap(), Some(ReplCommand::Models(None)));
        assert_eq!(
            ReplCommand::parse("/models llama").unwrap(),
            Some(ReplCommand::Models(Some("llama".to_string())))
        );
        assert!(ReplCommand::parse("/model").is_err());
        assert!(ReplCommand::parse("/bogus").is_err());
    }
}
