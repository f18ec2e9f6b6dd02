//! Ex address parsing and resolution.
//!
//! An address names one line: absolutely, relative to the cursor, through
//! a marker, by pattern search, or from the visual selection. A range is
//! one or two addresses. Parsing never touches the buffer; resolution
//! happens against a `ResolveCtx` and never clamps, so an offset landing
//! outside the buffer is an error rather than a silent adjustment.

use crate::buffer::{Selection, TextBuffer};
use crate::error::{ExviError, Result};
use crate::search::{FindState, SearchDirection};
use crate::store::Markers;

/// Base of one address, before offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressBase {
    /// Current line (.).
    Current,
    /// Last line ($).
    Last,
    /// Absolute line number.
    Line(usize),
    /// Marker ('x). '< and '> name the visual selection bounds.
    Mark(char),
    /// Pattern search forward (/pattern/). Empty reuses the last pattern.
    SearchForward(String),
    /// Pattern search backward (?pattern?).
    SearchBackward(String),
}

/// One address: a base plus an accumulated signed offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpec {
    /// The base address.
    pub base: AddressBase,
    /// Signed line offset applied after the base resolves.
    pub offset: i64,
}

impl AddressSpec {
    /// An address with no offset.
    pub fn new(base: AddressBase) -> Self {
        Self { base, offset: 0 }
    }

    /// Resolve to a line number against the buffer's current line. The
    /// result is not bounds-checked here; range resolution validates it
    /// against the buffer.
    pub fn resolve(&self, ctx: &mut ResolveCtx<'_>) -> Result<i64> {
        let current = ctx.buffer.current_line();
        self.resolve_from(ctx, current)
    }

    /// Resolve with an explicit notion of the current line. Search
    /// addresses start scanning from `current`.
    pub fn resolve_from(&self, ctx: &mut ResolveCtx<'_>, current: usize) -> Result<i64> {
        let base = match &self.base {
            AddressBase::Current => current as i64,
            AddressBase::Last => ctx.buffer.last_line() as i64,
            AddressBase::Line(n) => *n as i64,
            AddressBase::Mark('<') => {
                ctx.selection.ok_or(ExviError::NoSelection)?.start as i64
            }
            AddressBase::Mark('>') => ctx.selection.ok_or(ExviError::NoSelection)?.end as i64,
            AddressBase::Mark(key) => {
                ctx.markers.get(*key).ok_or(ExviError::MarkNotSet(*key))? as i64
            }
            AddressBase::SearchForward(pattern) => {
                if !pattern.is_empty() {
                    ctx.find.set_pattern(pattern, ctx.ignorecase)?;
                }
                ctx.find
                    .find(ctx.buffer, current, SearchDirection::Forward, ctx.wrapscan)?
                    as i64
            }
            AddressBase::SearchBackward(pattern) => {
                if !pattern.is_empty() {
                    ctx.find.set_pattern(pattern, ctx.ignorecase)?;
                }
                ctx.find
                    .find(ctx.buffer, current, SearchDirection::Backward, ctx.wrapscan)?
                    as i64
            }
        };
        Ok(base + self.offset)
    }
}

/// Everything address resolution may consult.
pub struct ResolveCtx<'a> {
    /// The host buffer.
    pub buffer: &'a dyn TextBuffer,
    /// Marker store for 'x addresses.
    pub markers: &'a Markers,
    /// Find state; search addresses compile into it.
    pub find: &'a mut FindState,
    /// Captured visual selection, when one exists.
    pub selection: Option<Selection>,
    /// Whether pattern searches wrap.
    pub wrapscan: bool,
    /// Whether patterns fold case.
    pub ignorecase: bool,
}

/// A range of one or two addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressRange {
    /// First address, None when nothing was written.
    pub start: Option<AddressSpec>,
    /// Second address, None when only one was written.
    pub end: Option<AddressSpec>,
}

impl AddressRange {
    /// A range with nothing specified.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single-address range.
    pub fn single(spec: AddressSpec) -> Self {
        Self {
            start: Some(spec),
            end: None,
        }
    }

    /// The whole buffer (1,$).
    pub fn all() -> Self {
        Self {
            start: Some(AddressSpec::new(AddressBase::Line(1))),
            end: Some(AddressSpec::new(AddressBase::Last)),
        }
    }

    /// True when the user wrote at least one address.
    pub fn is_explicit(&self) -> bool {
        self.start.is_some()
    }

    /// True when the user wrote two addresses.
    pub fn is_pair(&self) -> bool {
        self.end.is_some()
    }

    /// Resolve to concrete (start, end) line numbers, both validated
    /// against the buffer. A missing range defaults to the current line.
    /// The second address resolves with the first as the current line,
    /// so `/a/,/b/` finds b after a. A reversed pair is an error, never
    /// swapped.
    pub fn resolve(&self, ctx: &mut ResolveCtx<'_>) -> Result<(usize, usize)> {
        let start = match &self.start {
            Some(spec) => spec.resolve(ctx)?,
            None => ctx.buffer.current_line() as i64,
        };
        let start = check_bounds(start, ctx.buffer)?;

        let end = match &self.end {
            Some(spec) => check_bounds(spec.resolve_from(ctx, start)?, ctx.buffer)?,
            None => start,
        };

        if start > end {
            return Err(ExviError::InvalidRange(format!("{},{}", start, end)));
        }
        Ok((start, end))
    }

    /// Resolve a single optional address with a default line.
    pub fn resolve_single(&self, ctx: &mut ResolveCtx<'_>, default: usize) -> Result<usize> {
        match &self.start {
            Some(spec) => check_bounds(spec.resolve(ctx)?, ctx.buffer),
            None => Ok(default),
        }
    }
}

fn check_bounds(line: i64, buffer: &dyn TextBuffer) -> Result<usize> {
    if line < 1 || line > buffer.last_line() as i64 {
        Err(ExviError::AddressOutOfRange(line))
    } else {
        Ok(line as usize)
    }
}

/// Parse one address from the head of `input`. Returns None when the
/// input does not start with an address.
pub fn parse_address(input: &str) -> Result<Option<(AddressSpec, &str)>> {
    let input = input.trim_start();
    let Some(first) = input.chars().next() else {
        return Ok(None);
    };

    let (base, rest) = match first {
        '.' => (AddressBase::Current, &input[1..]),
        '$' => (AddressBase::Last, &input[1..]),
        '\'' => {
            let Some(key) = input.chars().nth(1) else {
                return Err(ExviError::InvalidAddress("' without mark name".to_string()));
            };
            (AddressBase::Mark(key), &input[1 + key.len_utf8()..])
        }
        '/' | '?' => {
            let (pattern, rest) = scan_pattern(&input[1..], first);
            let base = if first == '/' {
                AddressBase::SearchForward(pattern)
            } else {
                AddressBase::SearchBackward(pattern)
            };
            (base, rest)
        }
        '0'..='9' => {
            let (num, rest) = parse_number(input)
                .ok_or_else(|| ExviError::InvalidAddress(input.to_string()))?;
            (AddressBase::Line(num), rest)
        }
        // A bare offset addresses relative to the current line.
        '+' | '-' => (AddressBase::Current, input),
        _ => return Ok(None),
    };

    let (offset, rest) = parse_offsets(rest);
    Ok(Some((AddressSpec { base, offset }, rest)))
}

/// Scan a search pattern up to the closing delimiter. An unclosed
/// pattern runs to end of input (the trailing delimiter is optional at
/// the end of a command, as in `:/foo`). Escaped delimiters stay in the
/// pattern with their backslash dropped. Also used by the global
/// command to split its pattern from the command list.
pub(crate) fn scan_pattern(input: &str, delim: char) -> (String, &str) {
    let mut pattern = String::new();
    let mut iter = input.char_indices();
    while let Some((i, c)) = iter.next() {
        if c == '\\' {
            match iter.next() {
                Some((_, next)) if next == delim => pattern.push(delim),
                Some((_, next)) => {
                    pattern.push('\\');
                    pattern.push(next);
                }
                None => {
                    pattern.push('\\');
                    break;
                }
            }
        } else if c == delim {
            return (pattern, &input[i + c.len_utf8()..]);
        } else {
            pattern.push(c);
        }
    }
    (pattern, "")
}

/// Parse a run of digits.
fn parse_number(input: &str) -> Option<(usize, &str)> {
    let end = input
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let num: usize = input[..end].parse().ok()?;
    Some((num, &input[end..]))
}

/// Parse a chain of +n / -n offsets. A sign without digits counts 1.
fn parse_offsets(mut input: &str) -> (i64, &str) {
    let mut total: i64 = 0;
    loop {
        let sign = match input.chars().next() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return (total, input),
        };
        let rest = &input[1..];
        if let Some((num, remainder)) = parse_number(rest) {
            total += sign * num as i64;
            input = remainder;
        } else {
            total += sign;
            input = rest;
        }
    }
}

/// Parse an address range from the head of `input`.
pub fn parse_range(input: &str) -> Result<(AddressRange, &str)> {
    let input = input.trim_start();

    // % is shorthand for 1,$.
    if let Some(rest) = input.strip_prefix('%') {
        return Ok((AddressRange::all(), rest));
    }

    let (first, rest) = match parse_address(input)? {
        Some((spec, rest)) => (Some(spec), rest),
        None => (None, input),
    };

    let rest = rest.trim_start();
    if let Some(after_sep) = rest.strip_prefix([',', ';']) {
        let (second, rest) = match parse_address(after_sep)? {
            Some((spec, rest)) => (Some(spec), rest),
            None => (None, after_sep),
        };
        // A separator with a missing side defaults that side to the
        // current line.
        let start = first.unwrap_or_else(|| AddressSpec::new(AddressBase::Current));
        let end = second.unwrap_or_else(|| AddressSpec::new(AddressBase::Current));
        Ok((
            AddressRange {
                start: Some(start),
                end: Some(end),
            },
            rest,
        ))
    } else if let Some(spec) = first {
        Ok((AddressRange::single(spec), rest))
    } else {
        Ok((AddressRange::empty(), rest))
    }
}
