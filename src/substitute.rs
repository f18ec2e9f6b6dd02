//! Substitute parsing and execution.
//!
//! The rest text of a :s command is `delim pattern delim replacement
//! delim flags`, where the delimiter is the first non-alphanumeric
//! character after the command name. Escaped delimiters inside pattern
//! and replacement are kept by remapping them to a sentinel character
//! before tokenizing and restoring them afterwards; input that already
//! contains the sentinel is rejected outright rather than silently
//! mis-tokenized.

use crate::error::{ExviError, Result};
use regex::Regex;

/// Flags on a substitute command. Each letter is independent and
/// order-insensitive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubstituteFlags {
    /// Replace every match on each line, not just the first (g).
    pub global: bool,
    /// Ask the host before each replacement (c).
    pub confirm: bool,
    /// Case-insensitive match (i).
    pub ignore_case: bool,
    /// Report the last affected line afterwards (p).
    pub print: bool,
    /// Count matches without substituting (n).
    pub count_only: bool,
}

impl SubstituteFlags {
    /// Parse a flag string. Unknown letters are an error.
    pub fn parse(s: &str) -> Result<Self> {
        let mut flags = Self::default();
        for c in s.trim().chars() {
            match c {
                'g' => flags.global = true,
                'c' => flags.confirm = true,
                'i' => flags.ignore_case = true,
                'p' => flags.print = true,
                'n' => flags.count_only = true,
                _ => return Err(ExviError::UnknownFlag(c)),
            }
        }
        Ok(flags)
    }
}

/// A parsed substitute directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstituteSpec {
    /// Pattern text; None means reuse the last pattern.
    pub pattern: Option<String>,
    /// Replacement text, vi escapes unexpanded.
    pub replacement: String,
    /// Parsed flags.
    pub flags: SubstituteFlags,
}

/// Parse the rest text of a substitute command.
pub fn parse_spec(rest: &str, sentinel: char) -> Result<SubstituteSpec> {
    let delim = rest
        .chars()
        .next()
        .ok_or(ExviError::NoPreviousSubstitution)?;
    if delim.is_alphanumeric() || delim == '\\' || delim == ' ' || delim == sentinel {
        return Err(ExviError::InvalidCommand(format!(
            "bad substitute delimiter '{}'",
            delim
        )));
    }

    let body = &rest[delim.len_utf8()..];
    if body.contains(sentinel) {
        return Err(ExviError::SentinelCollision);
    }

    // Remap escaped delimiters so the split below cannot see them.
    let mut remapped = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&delim) {
            remapped.push(sentinel);
            chars.next();
        } else {
            remapped.push(c);
        }
    }

    let parts: Vec<&str> = remapped.split(delim).collect();
    if parts.len() > 3 {
        return Err(ExviError::TrailingCharacters(rest.to_string()));
    }

    let restore = |s: &str| s.replace(sentinel, &delim.to_string());
    let pattern = restore(parts.first().unwrap_or(&""));
    let replacement = restore(parts.get(1).unwrap_or(&""));
    let flags = SubstituteFlags::parse(parts.get(2).unwrap_or(&""))?;

    Ok(SubstituteSpec {
        pattern: if pattern.is_empty() {
            None
        } else {
            Some(pattern)
        },
        replacement,
        flags,
    })
}

/// Per-match confirmation callback: line number, line text, match span.
pub type ConfirmFn<'a> = dyn FnMut(usize, &str, (usize, usize)) -> bool + 'a;

/// Executes a compiled substitution line by line.
#[derive(Debug)]
pub struct Substitutor {
    regex: Regex,
    replacement: String,
    flags: SubstituteFlags,
}

impl Substitutor {
    /// Build from a compiled regex and raw replacement text.
    pub fn new(regex: Regex, replacement: &str, flags: SubstituteFlags) -> Self {
        Self {
            regex,
            replacement: convert_replacement(replacement),
            flags,
        }
    }

    /// The flags in effect.
    pub fn flags(&self) -> SubstituteFlags {
        self.flags
    }

    /// Substitute in one line. Returns the new text and the number of
    /// replacements made (or matches counted, with the n flag).
    pub fn substitute_line(
        &self,
        line_no: usize,
        text: &str,
        confirm: &mut ConfirmFn<'_>,
    ) -> (String, usize) {
        if self.flags.count_only {
            return (text.to_string(), self.regex.find_iter(text).count());
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut count = 0;

        for caps in self.regex.captures_iter(text) {
            let m = caps.get(0).expect("group 0 always present");
            let accept =
                !self.flags.confirm || confirm(line_no, text, (m.start(), m.end()));
            if accept {
                out.push_str(&text[last..m.start()]);
                caps.expand(&self.replacement, &mut out);
                last = m.end();
                count += 1;
            }
            if !self.flags.global {
                // Without g only the first match is considered at all.
                break;
            }
        }
        out.push_str(&text[last..]);
        (out, count)
    }
}

/// Convert vi replacement escapes into the capture-expansion syntax the
/// regex crate understands: `&` and `\0`-`\9` become group references,
/// `\n` and `\t` become control characters, `\\` and `\&` go literal,
/// and a literal `$` is protected from expansion.
fn convert_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('&') => out.push('&'),
                Some('\\') => out.push('\\'),
                Some(d @ '0'..='9') => {
                    out.push_str("${");
                    out.push(d);
                    out.push('}');
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '&' => out.push_str("${0}"),
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }

    out
}
