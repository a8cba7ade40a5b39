use outbreak_infection::admission::ArenaError;

#[derive(Debug)]
pub enum ServerError {
    /// Invalid server configuration or unreadable data file.
    Config(String),
    Io(std::io::Error),
    ArenaNotFound(String),
    /// The arena's task has exited and no longer accepts commands.
    ArenaGone(String),
    Arena(ArenaError),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(m) => write!(f, "configuration error: {m}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ArenaNotFound(name) => write!(f, "no arena named '{name}'"),
            Self::ArenaGone(name) => write!(f, "arena '{name}' has stopped"),
            Self::Arena(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ArenaError> for ServerError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}
