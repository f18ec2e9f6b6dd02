//! Find/replace persisted state.
//!
//! One instance lives for the life of the interpreter and remembers the
//! last compiled pattern (reused by empty-pattern searches and :s//) and
//! the last substitution (reused by the & command). Searching here is
//! line-granular; search addresses only need the matching line number.

use crate::buffer::TextBuffer;
use crate::error::{ExviError, Result};
use regex::{Regex, RegexBuilder};

/// Maximum allowed pattern length, guarding pathological compiles.
pub const MAX_PATTERN_LEN: usize = 4096;

/// Direction of a pattern search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Search forward (/).
    Forward,
    /// Search backward (?).
    Backward,
}

/// Persisted find/replace state.
#[derive(Debug, Default)]
pub struct FindState {
    pattern: Option<String>,
    regex: Option<Regex>,
    /// Last substitution, pattern and replacement, for the & command.
    last_substitution: Option<(String, String)>,
}

impl FindState {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and remember a pattern. Returns the compiled regex;
    /// cloning one is cheap.
    pub fn set_pattern(&mut self, pattern: &str, ignorecase: bool) -> Result<Regex> {
        let regex = compile_pattern(pattern, ignorecase)?;
        self.pattern = Some(pattern.to_string());
        self.regex = Some(regex.clone());
        Ok(regex)
    }

    /// The last pattern, if any.
    pub fn last_pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// The last compiled regex, if any.
    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Remember a substitution for the & command.
    pub fn set_last_substitution(&mut self, pattern: &str, replacement: &str) {
        self.last_substitution = Some((pattern.to_string(), replacement.to_string()));
    }

    /// The last substitution, if any.
    pub fn last_substitution(&self) -> Option<(&str, &str)> {
        self.last_substitution
            .as_ref()
            .map(|(p, r)| (p.as_str(), r.as_str()))
    }

    /// Find the next matching line in a direction.
    pub fn find(
        &self,
        buffer: &dyn TextBuffer,
        from: usize,
        direction: SearchDirection,
        wrapscan: bool,
    ) -> Result<usize> {
        match direction {
            SearchDirection::Forward => self.find_forward(buffer, from, wrapscan),
            SearchDirection::Backward => self.find_backward(buffer, from, wrapscan),
        }
    }

    /// Find the first line at or after `from` whose text matches, walking
    /// forward and wrapping past the last line when `wrapscan` is set.
    /// The scan starts on the line after `from`.
    pub fn find_forward(
        &self,
        buffer: &dyn TextBuffer,
        from: usize,
        wrapscan: bool,
    ) -> Result<usize> {
        let regex = self.regex.as_ref().ok_or(ExviError::NoPreviousPattern)?;
        let last = buffer.last_line();
        for line in (from + 1)..=last {
            if matches_line(regex, buffer, line) {
                return Ok(line);
            }
        }
        if wrapscan {
            for line in 1..=from.min(last) {
                if matches_line(regex, buffer, line) {
                    return Ok(line);
                }
            }
        }
        Err(ExviError::PatternNotFound(
            self.pattern.clone().unwrap_or_default(),
        ))
    }

    /// Find the first matching line before `from`, walking backward and
    /// wrapping past line 1 when `wrapscan` is set.
    pub fn find_backward(
        &self,
        buffer: &dyn TextBuffer,
        from: usize,
        wrapscan: bool,
    ) -> Result<usize> {
        let regex = self.regex.as_ref().ok_or(ExviError::NoPreviousPattern)?;
        let last = buffer.last_line();
        for line in (1..from.min(last + 1)).rev() {
            if matches_line(regex, buffer, line) {
                return Ok(line);
            }
        }
        if wrapscan {
            for line in (from + 1..=last).rev() {
                if matches_line(regex, buffer, line) {
                    return Ok(line);
                }
            }
        }
        Err(ExviError::PatternNotFound(
            self.pattern.clone().unwrap_or_default(),
        ))
    }
}

fn matches_line(regex: &Regex, buffer: &dyn TextBuffer, line: usize) -> bool {
    buffer
        .line_text(line)
        .map(|text| regex.is_match(text))
        .unwrap_or(false)
}

/// Compile a pattern with the shared length cap and case policy.
pub fn compile_pattern(pattern: &str, ignorecase: bool) -> Result<Regex> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(ExviError::PatternTooLong(MAX_PATTERN_LEN));
    }
    RegexBuilder::new(pattern)
        .case_insensitive(ignorecase)
        .build()
        .map_err(|e| ExviError::InvalidRegex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LineBuffer;

    fn state_with(pattern: &str) -> FindState {
        let mut s = FindState::new();
        s.set_pattern(pattern, false).unwrap();
        s
    }

    #[test]
    fn test_find_forward() {
        let buf = LineBuffer::from_text("alpha\nbeta\ngamma\nbeta");
        let s = state_with("beta");
        assert_eq!(s.find_forward(&buf, 1, true).unwrap(), 2);
        assert_eq!(s.find_forward(&buf, 2, true).unwrap(), 4);
    }

    #[test]
    fn test_find_forward_wraps() {
        let buf = LineBuffer::from_text("beta\nalpha");
        let s = state_with("beta");
        assert_eq!(s.find_forward(&buf, 2, true).unwrap(), 1);
        assert!(s.find_forward(&buf, 2, false).is_err());
    }

    #[test]
    fn test_find_backward() {
        let buf = LineBuffer::from_text("beta\nalpha\nbeta");
        let s = state_with("beta");
        assert_eq!(s.find_backward(&buf, 3, true).unwrap(), 1);
    }

    #[test]
    fn test_find_backward_wraps() {
        let buf = LineBuffer::from_text("alpha\nbeta");
        let s = state_with("beta");
        assert_eq!(s.find_backward(&buf, 1, true).unwrap(), 2);
        assert!(s.find_backward(&buf, 1, false).is_err());
    }

    #[test]
    fn test_no_previous_pattern() {
        let buf = LineBuffer::from_text("x");
        let s = FindState::new();
        assert!(matches!(
            s.find_forward(&buf, 1, true),
            Err(ExviError::NoPreviousPattern)
        ));
    }

    #[test]
    fn test_ignorecase_compile() {
        let re = compile_pattern("HeLLo", true).unwrap();
        assert!(re.is_match("hello"));
    }

    #[test]
    fn test_pattern_cap() {
        let long = "a".repeat(MAX_PATTERN_LEN + 1);
        assert!(matches!(
            compile_pattern(&long, false),
            Err(ExviError::PatternTooLong(_))
        ));
    }

    #[test]
    fn test_last_substitution() {
        let mut s = FindState::new();
        assert!(s.last_substitution().is_none());
        s.set_last_substitution("foo", "bar");
        assert_eq!(s.last_substitution(), Some(("foo", "bar")));
    }
}
