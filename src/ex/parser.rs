//! Ex command parser.
//!
//! Splits raw ex input (the text after the colon) into an address range,
//! a command name and a verbatim remainder. Parsing never consults the
//! buffer; callers choose whether to resolve addresses afterwards.

use super::address::parse_range;
use super::command::{lookup, Arity, Command, CommandKind};
use crate::error::{ExviError, Result};

/// How far a parse should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseKind {
    /// Parse and resolve addresses eagerly; resolution failures fail the
    /// parse.
    Parse,
    /// Validate syntax only. Must not touch the buffer, so it is safe
    /// for speculative validation with no side effects.
    Check,
}

/// Parse one ex command. Syntax only; address resolution is a separate
/// step.
pub fn parse_ex(input: &str) -> Result<Command> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ExviError::EmptyCommand);
    }

    let (range, rest) = parse_range(trimmed)?;
    let rest = rest.trim_start();

    // A bare address is a goto.
    if rest.is_empty() {
        if !range.is_explicit() {
            return Err(ExviError::EmptyCommand);
        }
        return Ok(Command {
            range,
            kind: CommandKind::Goto,
            name: String::new(),
            rest: String::new(),
        });
    }

    let (name, after_name) = split_name(rest);
    if name.is_empty() {
        return Err(ExviError::InvalidCommand(rest.to_string()));
    }

    // A trailing bang belongs to the command only where the command
    // accepts one; elsewhere it stays in the rest text (it may be a
    // substitute delimiter).
    let (bang, rest) = match after_name.strip_prefix('!') {
        Some(after) if takes_bang(name) => (true, after),
        _ => (false, after_name),
    };

    let kind = match lookup(name, bang) {
        Some(kind) => kind,
        // :k{char} runs the mark name into the command name.
        None if name.len() == 2 && name.starts_with('k') => CommandKind::Mark,
        None => {
            log::debug!("unknown ex command name {:?}", name);
            return Err(ExviError::InvalidCommand(name.to_string()));
        }
    };

    let (name, rest) = if kind == CommandKind::Mark && name.len() == 2 {
        // Re-split so the mark character lands in the rest text.
        (&name[..1], format!("{}{}", &name[1..], rest))
    } else {
        (name, rest.to_string())
    };

    if kind.arity() == Arity::None && range.is_explicit() {
        return Err(ExviError::UnexpectedAddress(name.to_string()));
    }
    if kind.arity() == Arity::One && range.is_pair() {
        return Err(ExviError::InvalidRange(format!(
            "{} takes one address",
            name
        )));
    }

    Ok(Command {
        range,
        kind,
        name: name.to_string(),
        rest,
    })
}

/// Split the command name from the head of `input`. The name is either a
/// single symbol command or the longest alphabetic run.
fn split_name(input: &str) -> (&str, &str) {
    let mut chars = input.chars();
    match chars.next() {
        Some(c) if matches!(c, '&' | '=' | '<' | '>') => {
            let len = c.len_utf8();
            (&input[..len], &input[len..])
        }
        _ => {
            let end = input
                .char_indices()
                .find(|(_, c)| !c.is_ascii_alphabetic())
                .map(|(i, _)| i)
                .unwrap_or(input.len());
            (&input[..end], &input[end..])
        }
    }
}

/// Commands where a trailing `!` is part of the command.
fn takes_bang(name: &str) -> bool {
    let is_prefix = |full: &str| !name.is_empty() && full.starts_with(name);
    is_prefix("quit") || is_prefix("global")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ex::address::{AddressBase, AddressSpec};

    #[test]
    fn test_parse_round_trip() {
        let cmd = parse_ex("5,10s/a/b/g").unwrap();
        assert_eq!(cmd.kind, CommandKind::Substitute);
        assert_eq!(cmd.arity(), Arity::Two);
        assert_eq!(cmd.name, "s");
        assert_eq!(cmd.rest, "/a/b/g");
        assert_eq!(
            cmd.range.start,
            Some(AddressSpec::new(AddressBase::Line(5)))
        );
        assert_eq!(cmd.range.end, Some(AddressSpec::new(AddressBase::Line(10))));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_ex(""), Err(ExviError::EmptyCommand)));
        assert!(matches!(parse_ex("   "), Err(ExviError::EmptyCommand)));
    }

    #[test]
    fn test_bare_address_is_goto() {
        let cmd = parse_ex("42").unwrap();
        assert_eq!(cmd.kind, CommandKind::Goto);

        let cmd = parse_ex("'a").unwrap();
        assert_eq!(cmd.kind, CommandKind::Goto);
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            parse_ex("bogus"),
            Err(ExviError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_address_on_addressless_command() {
        assert!(matches!(
            parse_ex("5q"),
            Err(ExviError::UnexpectedAddress(_))
        ));
        assert!(matches!(
            parse_ex("1,2set ws"),
            Err(ExviError::UnexpectedAddress(_))
        ));
    }

    #[test]
    fn test_pair_on_single_address_command() {
        assert!(matches!(
            parse_ex("1,2pu"),
            Err(ExviError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_quit_bang() {
        let cmd = parse_ex("q!").unwrap();
        assert_eq!(cmd.kind, CommandKind::Quit { force: true });
    }

    #[test]
    fn test_global_rest_verbatim() {
        let cmd = parse_ex("1,$g/foo/d").unwrap();
        assert_eq!(cmd.kind, CommandKind::Global { invert: false });
        assert_eq!(cmd.rest, "/foo/d");
    }

    #[test]
    fn test_mark_name_forms() {
        let cmd = parse_ex("ka").unwrap();
        assert_eq!(cmd.kind, CommandKind::Mark);
        assert_eq!(cmd.name, "k");
        assert_eq!(cmd.rest, "a");

        let cmd = parse_ex("mark b").unwrap();
        assert_eq!(cmd.kind, CommandKind::Mark);
        assert_eq!(cmd.rest, " b");

        let cmd = parse_ex("3k x").unwrap();
        assert_eq!(cmd.kind, CommandKind::Mark);
    }

    #[test]
    fn test_bang_delimiter_not_eaten() {
        let cmd = parse_ex("s!a!b!").unwrap();
        assert_eq!(cmd.kind, CommandKind::Substitute);
        assert_eq!(cmd.rest, "!a!b!");
    }

    #[test]
    fn test_repeat_substitute_symbol() {
        let cmd = parse_ex("&g").unwrap();
        assert_eq!(cmd.kind, CommandKind::RepeatSubstitute);
        assert_eq!(cmd.rest, "g");
    }

    #[test]
    fn test_percent_range() {
        let cmd = parse_ex("%p").unwrap();
        assert_eq!(cmd.kind, CommandKind::Print);
        assert!(cmd.range.is_pair());
    }

    #[test]
    fn test_check_does_not_need_buffer() {
        // Syntax-only parse of an address that could never resolve.
        let cmd = parse_ex("'z,/nowhere/d").unwrap();
        assert_eq!(cmd.kind, CommandKind::Delete);
    }
}
