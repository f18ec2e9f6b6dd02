//! Error types for the interpreter.

use std::io;

/// Result type alias for interpreter operations.
pub type Result<T> = std::result::Result<T, ExviError>;

/// Broad error categories.
///
/// Every error is local to one command invocation; none is fatal to the
/// process. Hosts that only care about the category can match on this
/// instead of the full variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed address or command syntax.
    Parse,
    /// Invalid regular expression.
    Regex,
    /// Address resolution failed (mark unset, pattern not found, offset
    /// out of range).
    Resolution,
    /// Macro playback depth exceeded or re-entrant recording.
    Recursion,
    /// Template file missing or unresolvable variable.
    Template,
    /// I/O error.
    Io,
}

/// All possible interpreter errors.
#[derive(Debug, thiserror::Error)]
pub enum ExviError {
    /// I/O error (template files).
    #[error("{0}")]
    Io(#[from] io::Error),
    /// Empty command input.
    #[error("Empty command")]
    EmptyCommand,
    /// Unknown or malformed command.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    /// Address supplied to a command that takes none.
    #[error("No address allowed on {0}")]
    UnexpectedAddress(String),
    /// Trailing garbage after a command.
    #[error("Trailing characters: {0}")]
    TrailingCharacters(String),
    /// Malformed address syntax.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// Start of range after end.
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    /// Address resolved outside the buffer.
    #[error("Address out of range: {0}")]
    AddressOutOfRange(i64),
    /// Invalid regular expression.
    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),
    /// Pattern length cap exceeded.
    #[error("Pattern too long (max {0} characters)")]
    PatternTooLong(usize),
    /// Search pattern not found.
    #[error("Pattern not found: {0}")]
    PatternNotFound(String),
    /// Empty pattern with no previous one to reuse.
    #[error("No previous pattern")]
    NoPreviousPattern,
    /// No previous substitution for & or a bare :s.
    #[error("No previous substitution")]
    NoPreviousSubstitution,
    /// Mark not set.
    #[error("Mark not set: '{0}'")]
    MarkNotSet(char),
    /// Visual address outside a visual mode and no prior selection.
    #[error("No visual selection")]
    NoSelection,
    /// Sentinel byte collided with literal input.
    #[error("Input contains the escape sentinel byte")]
    SentinelCollision,
    /// Unknown substitute flag.
    #[error("Unknown flag: {0}")]
    UnknownFlag(char),
    /// Register name outside the accepted set.
    #[error("Invalid register: \"{0}\"")]
    InvalidRegister(char),
    /// Playback from an empty register.
    #[error("Register \"{0}\" is empty")]
    RegisterEmpty(char),
    /// Recording started while already recording.
    #[error("Already recording")]
    AlreadyRecording,
    /// Recording stopped while not recording.
    #[error("Not recording")]
    NotRecording,
    /// Playback requested a register already active on the stack.
    #[error("Macro register \"{0}\" is already playing")]
    MacroActive(char),
    /// Macro playback depth limit hit.
    #[error("Macro recursion limit exceeded ({0})")]
    RecursionLimit(usize),
    /// Nested :g inside a :g command list.
    #[error("Global command inside global")]
    NestedGlobal,
    /// Template file missing.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    /// Template variable with no binding.
    #[error("Unresolved template variable: {0}")]
    UnresolvedVariable(String),
    /// Unterminated @name@ reference in a template.
    #[error("Unterminated variable reference in template")]
    UnterminatedVariable,
    /// No template directory configured.
    #[error("No template directory set")]
    NoTemplateDir,
    /// Invalid :set argument.
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

impl ExviError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        use ExviError::*;
        match self {
            Io(_) => ErrorKind::Io,
            EmptyCommand | InvalidCommand(_) | UnexpectedAddress(_) | TrailingCharacters(_)
            | InvalidAddress(_) | SentinelCollision | UnknownFlag(_) | InvalidRegister(_)
            | InvalidOption(_) => ErrorKind::Parse,
            InvalidRegex(_) | PatternTooLong(_) => ErrorKind::Regex,
            InvalidRange(_) | AddressOutOfRange(_) | PatternNotFound(_) | NoPreviousPattern
            | NoPreviousSubstitution | MarkNotSet(_) | NoSelection | RegisterEmpty(_) => {
                ErrorKind::Resolution
            }
            AlreadyRecording | NotRecording | MacroActive(_) | RecursionLimit(_)
            | NestedGlobal => ErrorKind::Recursion,
            TemplateNotFound(_) | UnresolvedVariable(_) | UnterminatedVariable
            | NoTemplateDir => ErrorKind::Template,
        }
    }
}

impl From<regex::Error> for ExviError {
    fn from(e: regex::Error) -> Self {
        ExviError::InvalidRegex(e.to_string())
    }
}
