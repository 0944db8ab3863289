use std::error::Error as StdError;
use std::fmt::{self, Display};

/// Help text listing every command.
pub const HELP: &str = "\
/list              show the conversations
/new [message]     start a conversation, optionally with a first message
/switch <id>       open a conversation
/title <text>      rename the open conversation
/archive <id>      archive a conversation
/unarchive <id>    restore an archived conversation
/delete <id>       delete a conversation
/archived          toggle between active and archived conversations
/help              show this help
/quit              leave

Anything else is sent to the open conversation.";

/// A line of user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sends a message to the open conversation.
    Send(String),
    /// Prints the conversation list.
    List,
    /// Creates a conversation.
    New(Option<String>),
    /// Opens a conversation.
    Switch(String),
    /// Renames the open conversation.
    Title(String),
    /// Archives a conversation.
    Archive(String),
    /// Restores an archived conversation.
    Unarchive(String),
    /// Deletes a conversation.
    Delete(String),
    /// Toggles the archived filter.
    ToggleArchived,
    /// Prints the help text.
    Help,
    /// Leaves the program.
    Quit,
}

/// A line that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The command does not exist.
    Unknown(String),
    /// The command needs an argument that was not given.
    MissingArgument {
        /// How the command is used.
        usage: &'static str,
    },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Unknown(name) => {
                write!(f, "unknown command /{name}, try /help")
            }
            ParseError::MissingArgument { usage } => {
                write!(f, "usage: {usage}")
            }
        }
    }
}

impl StdError for ParseError {}

impl Command {
    /// Parses a line of input. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Send(line.to_owned())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let arg = (!arg.is_empty()).then(|| arg.to_owned());
        let required = |usage: &'static str| {
            arg.clone().ok_or(ParseError::MissingArgument { usage })
        };

        let command = match name {
            "list" | "ls" => Command::List,
            "new" => Command::New(arg.clone()),
            "switch" | "open" => Command::Switch(required("/switch <id>")?),
            "title" => Command::Title(required("/title <text>")?),
            "archive" => Command::Archive(required("/archive <id>")?),
            "unarchive" => Command::Unarchive(required("/unarchive <id>")?),
            "delete" | "rm" => Command::Delete(required("/delete <id>")?),
            "archived" => Command::ToggleArchived,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(ParseError::Unknown(name.to_owned())),
        };
        Ok(Some(command))
    }
}
