//! Slash commands understood by the interactive session.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bye,
    Help,
    Info,
    Context,
    Clear,
    /// `/model` alone shows models; with a name it switches.
    Model(Option<String>),
    Reload,
    Unknown(String),
}

impl Command {
    /// Parse a line of input. Returns `None` when the line is not a command.
    ///
    /// The command word is case-insensitive; arguments keep their case.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }

        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (line, None),
        };

        let cmd = match word.to_lowercase().as_str() {
            "/bye" => Self::Bye,
            "/help" => Self::Help,
            "/info" => Self::Info,
            "/context" => Self::Context,
            "/clear" => Self::Clear,
            "/model" => Self::Model(arg.map(str::to_string)),
            "/reload" => Self::Reload,
            _ => Self::Unknown(word.to_string()),
        };
        Some(cmd)
    }
}
