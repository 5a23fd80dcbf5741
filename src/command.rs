//! Terminal client commands
//!
//! Line input is either a slash command or text to send.

use crate::event::ChatEvent;

/// ANSI sequence that homes the cursor and clears the screen
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

pub const HELP: &str = "Commands: /quit, /users, /clear, /help";

/// Banner printed once after connecting
pub const USAGE: &str = "\
Commands:
  /quit    - Exit the chat
  /users   - Show online users
  /clear   - Clear screen
  /help    - Show commands
  Type your message and press Enter to send";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Users,
    Clear,
    Help,
    /// Anything else is a chat message
    Say(String),
}

impl Command {
    /// Parse one line of input; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let input = line.trim();
        if input.is_empty() {
            return None;
        }
        let command = match input {
            "/quit" => Command::Quit,
            "/users" => Command::Users,
            "/clear" => Command::Clear,
            "/help" => Command::Help,
            text => Command::Say(text.to_string()),
        };
        Some(command)
    }
}

/// Render the history replay shown after joining
pub fn render_history(events: &[ChatEvent]) -> String {
    let mut out = String::from("\n=== Chat History ===\n");
    for event in events {
        out.push_str(&event.notification());
        out.push('\n');
    }
    out.push_str("====================\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/quit"), Some(Command::Quit));
        assert_eq!(Command::parse("  /users "), Some(Command::Users));
        assert_eq!(Command::parse("/clear"), Some(Command::Clear));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(
            Command::parse(" hello there \n"),
            Some(Command::Say("hello there".to_string()))
        );
        assert_eq!(
            Command::parse("/shrug"),
            Some(Command::Say("/shrug".to_string()))
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn test_render_history() {
        let u = UserId::parse("u").unwrap();
        let events = vec![
            ChatEvent::join(&u),
            ChatEvent::message(&u, "hi".to_string()),
            ChatEvent::leave(&u),
        ];

        let rendered = render_history(&events);

        assert!(rendered.contains("--> User u joined\n[u] hi\n<-- User u left\n"));
        assert!(rendered.starts_with("\n=== Chat History ===\n"));
    }
}
