//! Ex command classification.
//!
//! Command names are matched by longest prefix: the parser consumes the
//! whole alphabetic run and the lookup accepts every unambiguous prefix
//! of a full name down to its shortest abbreviation.

use super::address::AddressRange;

/// How many addresses a command accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No address allowed.
    None,
    /// At most one address.
    One,
    /// Up to a two-address range.
    Two,
}

/// The recognized ex commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Print lines (:p, :print).
    Print,
    /// Print lines with numbers (:nu, :number).
    Number,
    /// Delete lines (:d, :delete).
    Delete,
    /// Yank lines (:y, :yank).
    Yank,
    /// Put register content after a line (:pu, :put).
    Put,
    /// Copy lines after a destination (:co, :copy, :t).
    Copy,
    /// Move lines after a destination (:m, :move).
    Move,
    /// Join lines (:j, :join).
    Join,
    /// Shift lines right (:>).
    ShiftRight,
    /// Shift lines left (:<).
    ShiftLeft,
    /// Substitute (:s, :substitute).
    Substitute,
    /// Repeat the last substitute (:&).
    RepeatSubstitute,
    /// Run a command on matching lines (:g, :global; invert for :v).
    Global {
        /// True for :v / :g!.
        invert: bool,
    },
    /// Set a marker (:k{char}, :ma, :mark).
    Mark,
    /// Set options (:se, :set).
    Set,
    /// Print the resolved line number (:=).
    LineNumber,
    /// Quit (:q, :quit).
    Quit {
        /// True for :q!.
        force: bool,
    },
    /// Bare address: move to that line.
    Goto,
}

impl CommandKind {
    /// Address arity of this command.
    pub fn arity(&self) -> Arity {
        match self {
            CommandKind::Quit { .. } | CommandKind::Set => Arity::None,
            CommandKind::Put | CommandKind::Mark | CommandKind::LineNumber => Arity::One,
            CommandKind::Print
            | CommandKind::Number
            | CommandKind::Delete
            | CommandKind::Yank
            | CommandKind::Copy
            | CommandKind::Move
            | CommandKind::Join
            | CommandKind::ShiftRight
            | CommandKind::ShiftLeft
            | CommandKind::Substitute
            | CommandKind::RepeatSubstitute
            | CommandKind::Global { .. }
            | CommandKind::Goto => Arity::Two,
        }
    }
}

/// True when `name` is a prefix of `full` no shorter than `min`.
fn abbrev(name: &str, full: &str, min: usize) -> bool {
    name.len() >= min && name.len() <= full.len() && full.starts_with(name)
}

/// Look up a command by its written name. `bang` is a trailing `!`.
pub fn lookup(name: &str, bang: bool) -> Option<CommandKind> {
    // Symbol commands first; they are single characters.
    match name {
        ">" => return Some(CommandKind::ShiftRight),
        "<" => return Some(CommandKind::ShiftLeft),
        "&" => return Some(CommandKind::RepeatSubstitute),
        "=" => return Some(CommandKind::LineNumber),
        _ => {}
    }

    if abbrev(name, "print", 1) {
        Some(CommandKind::Print)
    } else if abbrev(name, "number", 2) {
        Some(CommandKind::Number)
    } else if abbrev(name, "delete", 1) {
        Some(CommandKind::Delete)
    } else if abbrev(name, "yank", 1) {
        Some(CommandKind::Yank)
    } else if abbrev(name, "put", 2) {
        Some(CommandKind::Put)
    } else if abbrev(name, "copy", 2) || name == "t" {
        Some(CommandKind::Copy)
    } else if abbrev(name, "move", 1) {
        Some(CommandKind::Move)
    } else if abbrev(name, "join", 1) {
        Some(CommandKind::Join)
    } else if abbrev(name, "substitute", 1) {
        Some(CommandKind::Substitute)
    } else if abbrev(name, "global", 1) {
        Some(CommandKind::Global { invert: bang })
    } else if abbrev(name, "vglobal", 1) {
        Some(CommandKind::Global { invert: true })
    } else if abbrev(name, "mark", 2) || name == "k" {
        Some(CommandKind::Mark)
    } else if abbrev(name, "set", 2) {
        Some(CommandKind::Set)
    } else if abbrev(name, "quit", 1) {
        Some(CommandKind::Quit { force: bang })
    } else {
        None
    }
}

/// One parsed ex invocation.
#[derive(Debug, Clone)]
pub struct Command {
    /// The address range as written.
    pub range: AddressRange,
    /// What the command is.
    pub kind: CommandKind,
    /// The name exactly as written (abbreviations preserved).
    pub name: String,
    /// Everything after the name, verbatim. Handlers tokenize this
    /// themselves.
    pub rest: String,
}

impl Command {
    /// Address arity of the parsed command.
    pub fn arity(&self) -> Arity {
        self.kind.arity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_abbreviations() {
        assert_eq!(lookup("s", false), Some(CommandKind::Substitute));
        assert_eq!(lookup("sub", false), Some(CommandKind::Substitute));
        assert_eq!(lookup("substitute", false), Some(CommandKind::Substitute));
        assert_eq!(lookup("substitutes", false), None);
        assert_eq!(lookup("d", false), Some(CommandKind::Delete));
        assert_eq!(lookup("t", false), Some(CommandKind::Copy));
        assert_eq!(lookup("co", false), Some(CommandKind::Copy));
        // :c alone is not copy; the abbreviation floor is two letters.
        assert_eq!(lookup("c", false), None);
    }

    #[test]
    fn test_lookup_global_variants() {
        assert_eq!(lookup("g", false), Some(CommandKind::Global { invert: false }));
        assert_eq!(lookup("g", true), Some(CommandKind::Global { invert: true }));
        assert_eq!(lookup("v", false), Some(CommandKind::Global { invert: true }));
    }

    #[test]
    fn test_lookup_symbols() {
        assert_eq!(lookup("&", false), Some(CommandKind::RepeatSubstitute));
        assert_eq!(lookup("=", false), Some(CommandKind::LineNumber));
        assert_eq!(lookup(">", false), Some(CommandKind::ShiftRight));
    }

    #[test]
    fn test_arity() {
        assert_eq!(CommandKind::Quit { force: false }.arity(), Arity::None);
        assert_eq!(CommandKind::Put.arity(), Arity::One);
        assert_eq!(CommandKind::Substitute.arity(), Arity::Two);
    }
}
