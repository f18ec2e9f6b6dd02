//! Interpreter options.
//!
//! Options are set via :set and govern search wrap, case folding and the
//! interpreter's own limits.

use crate::error::{ExviError, Result};
use std::path::PathBuf;

/// Default macro playback depth limit.
pub const DEFAULT_MAX_MACRO_DEPTH: usize = 10;

/// Default sentinel byte for escaped-delimiter remapping.
pub const DEFAULT_SENTINEL: char = '\u{1}';

/// Interpreter options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Searches wrap at buffer boundaries (wrapscan/ws).
    pub wrapscan: bool,
    /// Case insensitive patterns (ignorecase/ic).
    pub ignorecase: bool,
    /// Columns for the shift commands (shiftwidth/sw).
    pub shiftwidth: usize,
    /// Maximum macro playback stack depth (maxdepth/md).
    pub max_macro_depth: usize,
    /// Sentinel character used while tokenizing escaped delimiters.
    pub sentinel: char,
    /// Directory holding macro templates, unset by default.
    pub template_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            wrapscan: true,
            ignorecase: false,
            shiftwidth: 8,
            max_macro_depth: DEFAULT_MAX_MACRO_DEPTH,
            sentinel: DEFAULT_SENTINEL,
            template_dir: None,
        }
    }
}

impl Options {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a :set argument. Returns an optional message to display.
    pub fn set(&mut self, arg: &str) -> Result<Option<String>> {
        let arg = arg.trim();

        if arg == "all" {
            return Ok(Some(self.show_all()));
        }
        if arg.is_empty() {
            return Ok(Some(self.show_all()));
        }

        if let Some(name) = arg.strip_prefix("no") {
            return self.set_bool(name, false);
        }

        if let Some((name, value)) = arg.split_once('=') {
            return self.set_value(name.trim(), value.trim());
        }

        if let Some(name) = arg.strip_suffix('?') {
            return self.query(name.trim());
        }

        self.set_bool(arg, true)
    }

    fn set_bool(&mut self, name: &str, value: bool) -> Result<Option<String>> {
        match name {
            "wrapscan" | "ws" => self.wrapscan = value,
            "ignorecase" | "ic" => self.ignorecase = value,
            _ => return Err(ExviError::InvalidOption(name.to_string())),
        }
        Ok(None)
    }

    fn set_value(&mut self, name: &str, value: &str) -> Result<Option<String>> {
        match name {
            "maxdepth" | "md" => {
                let n = parse_positive(name, value)?;
                self.max_macro_depth = n;
            }
            "shiftwidth" | "sw" => {
                let n = parse_positive(name, value)?;
                self.shiftwidth = n;
            }
            "templatedir" | "td" => {
                self.template_dir = Some(PathBuf::from(value));
            }
            _ => return Err(ExviError::InvalidOption(name.to_string())),
        }
        Ok(None)
    }

    fn query(&self, name: &str) -> Result<Option<String>> {
        let text = match name {
            "wrapscan" | "ws" => Self::flag("wrapscan", self.wrapscan),
            "ignorecase" | "ic" => Self::flag("ignorecase", self.ignorecase),
            "maxdepth" | "md" => format!("maxdepth={}", self.max_macro_depth),
            "shiftwidth" | "sw" => format!("shiftwidth={}", self.shiftwidth),
            "templatedir" | "td" => match &self.template_dir {
                Some(d) => format!("templatedir={}", d.display()),
                None => "notemplatedir".to_string(),
            },
            _ => return Err(ExviError::InvalidOption(name.to_string())),
        };
        Ok(Some(text))
    }

    fn show_all(&self) -> String {
        let mut parts = vec![
            Self::flag("wrapscan", self.wrapscan),
            Self::flag("ignorecase", self.ignorecase),
            format!("shiftwidth={}", self.shiftwidth),
            format!("maxdepth={}", self.max_macro_depth),
        ];
        if let Some(d) = &self.template_dir {
            parts.push(format!("templatedir={}", d.display()));
        }
        parts.join(" ")
    }

    fn flag(name: &str, value: bool) -> String {
        if value {
            name.to_string()
        } else {
            format!("no{}", name)
        }
    }
}

fn parse_positive(name: &str, value: &str) -> Result<usize> {
    let n: usize = value
        .parse()
        .map_err(|_| ExviError::InvalidOption(format!("{}={}", name, value)))?;
    if n == 0 {
        return Err(ExviError::InvalidOption(format!("{}={}", name, value)));
    }
    Ok(n)
}
