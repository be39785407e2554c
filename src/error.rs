//! Error types produced while navigating, parsing and dispatching shell input.

use std::io;

/// Broad classification of a [`ShellError`].
///
/// The shell loop renders every kind except [`ErrorKind::Fatal`] as a message
/// and keeps reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown path, command, parameter or bookmark.
    NotFound,
    /// Malformed navigation, such as ascending above the root.
    InvalidPath,
    /// Grammar violation on the input line.
    Parse,
    /// A parameter value failed type, range or choice checks.
    Validation,
    /// A command handler reported a failure.
    Command,
    /// Tree construction rejected a node or a signature.
    Registration,
    /// The input or output stream is unusable.
    Fatal,
}

/// Errors produced by the shell engine.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("No such path {path}")]
    PathNotFound { path: String },

    #[error("No command named '{name}'")]
    CommandNotFound {
        name: String,
        /// 0-based character offset of the command token, when known.
        position: Option<usize>,
    },

    #[error("There is no parameter named '{name}' in group '{group}'")]
    ParameterNotFound { group: String, name: String },

    #[error("Unknown configuration group: {0}")]
    GroupNotFound(String),

    #[error("No such bookmark {0}")]
    BookmarkNotFound(String),

    #[error("Cannot find help topic {0}")]
    TopicNotFound(String),

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Syntax error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    Command(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Invalid command signature: {0}")]
    InvalidSignature(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line editor error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("preferences error: {0}")]
    Prefs(String),
}

impl ShellError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShellError::PathNotFound { .. }
            | ShellError::CommandNotFound { .. }
            | ShellError::ParameterNotFound { .. }
            | ShellError::GroupNotFound(_)
            | ShellError::BookmarkNotFound(_)
            | ShellError::TopicNotFound(_) => ErrorKind::NotFound,
            ShellError::InvalidPath { .. } => ErrorKind::InvalidPath,
            ShellError::Parse { .. } => ErrorKind::Parse,
            ShellError::Validation { .. } => ErrorKind::Validation,
            ShellError::Command(_) | ShellError::Prefs(_) => ErrorKind::Command,
            ShellError::InvalidNode(_) | ShellError::InvalidSignature(_) => ErrorKind::Registration,
            ShellError::Io(_) | ShellError::Readline(_) => ErrorKind::Fatal,
        }
    }

    /// 0-based character offset into the input line, for errors tied to a token.
    pub fn position(&self) -> Option<usize> {
        match self {
            ShellError::Parse { position, .. } => Some(*position),
            ShellError::CommandNotFound { position, .. } => *position,
            _ => None,
        }
    }

    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        ShellError::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ShellError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ShellError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Convert a handler failure into a shell error.
    ///
    /// Errors that already are a [`ShellError`] keep their kind.
    pub fn from_handler(err: anyhow::Error) -> Self {
        match err.downcast::<ShellError>() {
            Ok(e) => e,
            Err(e) => ShellError::Command(format!("{e:#}")),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_not_found_display_and_kind() {
        let e = ShellError::CommandNotFound {
            name: "creat".into(),
            position: Some(8),
        };
        assert_eq!(format!("{e}"), "No command named 'creat'");
        assert_eq!(e.kind(), ErrorKind::NotFound);
        assert_eq!(e.position(), Some(8));
    }

    #[test]
    fn parse_error_carries_position() {
        let e = ShellError::parse(4, "unterminated quote");
        assert_eq!(e.kind(), ErrorKind::Parse);
        assert_eq!(e.position(), Some(4));
        assert_eq!(format!("{e}"), "Syntax error at position 4: unterminated quote");
    }

    #[test]
    fn handler_error_keeps_shell_error_kind() {
        let inner = anyhow::Error::new(ShellError::validation("size", "not a number"));
        let e = ShellError::from_handler(inner);
        assert_eq!(e.kind(), ErrorKind::Validation);
    }

    #[test]
    fn handler_error_becomes_command_error() {
        let e = ShellError::from_handler(anyhow::anyhow!("disk is full"));
        assert_eq!(e.kind(), ErrorKind::Command);
        assert_eq!(format!("{e}"), "disk is full");
    }

    #[test]
    fn io_error_is_fatal() {
        let e = ShellError::from(io::Error::other("broken pipe"));
        assert_eq!(e.kind(), ErrorKind::Fatal);
        assert_eq!(e.position(), None);
    }
}
