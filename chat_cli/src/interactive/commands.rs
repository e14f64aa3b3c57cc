//! The interactive command surface.
//!
//! A line whose first word is one of the command words below is a command. Any other line is a message for the
//! selected peer.

pub const UPDATE: &str = ":update";
pub const EXIT: &str = ":exit";
pub const USER: &str = ":user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Refresh the peer directory from the registry.
    Update,
    Exit,
    /// Select the peer that subsequent messages go to.
    SelectUser(String),
    Empty,
    Message(String),
}

/// Interprets one line of operator input. Leading whitespace is ignored.
///
/// The name given to `:user` is every word after the command word, joined by single spaces.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim_start();
    let mut words = input.split_whitespace();
    match words.next() {
        None => Command::Empty,
        Some(UPDATE) => Command::Update,
        Some(EXIT) => Command::Exit,
        Some(USER) => Command::SelectUser(words.collect::<Vec<_>>().join(" ")),
        Some(_) => Command::Message(input.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn commands() {
        assert_eq!(parse_command(":update"), Command::Update);
        assert_eq!(parse_command("   :exit"), Command::Exit);
        assert_eq!(parse_command(":user bob"), Command::SelectUser("bob".into()));
    }

    #[test]
    fn user_names_are_rejoined_with_single_spaces() {
        assert_eq!(parse_command(":user  Alice Smith"), Command::SelectUser("Alice Smith".into()));
        assert_eq!(parse_command(":user\tAlice \t  Smith  "), Command::SelectUser("Alice Smith".into()));
        assert_eq!(parse_command(":user"), Command::SelectUser(String::new()));
    }

    #[test]
    fn blank_input_is_never_a_message() {
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("   "), Command::Empty);
        assert_eq!(parse_command(" \t "), Command::Empty);
    }

    #[test]
    fn everything_else_is_a_message() {
        assert_eq!(parse_command("  hello there "), Command::Message("hello there ".into()));
        assert_eq!(parse_command(":updates are fun"), Command::Message(":updates are fun".into()));
        assert_eq!(parse_command(":quit"), Command::Message(":quit".into()));
    }
}
