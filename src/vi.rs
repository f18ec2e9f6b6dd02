//! Modal state machine.
//!
//! Modes are driven by a static, ordered transition table. Each entry
//! pairs a (state, input) match with the next state and a hook index;
//! the first matching entry wins, so table order encodes priority. Hooks
//! are plain data here; the interpreter runs the named hook strictly
//! before flipping the state, so pending insert text and the visual
//! selection are settled by the time the new mode is observable.

use std::fmt;

/// Editing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViState {
    /// Command mode.
    #[default]
    Normal,
    /// Text insertion.
    Insert,
    /// Character-wise selection.
    Visual,
    /// Line-wise selection.
    VisualLine,
    /// Block-wise selection.
    VisualBlock,
}

impl ViState {
    /// True for any of the visual modes.
    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            ViState::Visual | ViState::VisualLine | ViState::VisualBlock
        )
    }
}

impl fmt::Display for ViState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViState::Normal => "NORMAL",
            ViState::Insert => "INSERT",
            ViState::Visual => "VISUAL",
            ViState::VisualLine => "VISUAL LINE",
            ViState::VisualBlock => "VISUAL BLOCK",
        };
        write!(f, "{}", name)
    }
}

/// One input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViKey {
    /// A printable character (newline included).
    Char(char),
    /// A control chord, by its letter.
    Ctrl(char),
    /// The escape key.
    Escape,
}

impl ViKey {
    /// Map a raw character from the input stream onto a key. Control
    /// bytes become chords, except newline and tab which insert as
    /// themselves; carriage return folds into newline.
    pub fn from_char(c: char) -> Self {
        match c {
            '\u{1b}' => ViKey::Escape,
            '\r' => ViKey::Char('\n'),
            '\n' | '\t' => ViKey::Char(c),
            c if (c as u32) < 0x20 => ViKey::Ctrl((c as u8 + b'`') as char),
            c => ViKey::Char(c),
        }
    }

    /// The raw character this key came from, for verbatim macro capture.
    pub fn to_char(self) -> char {
        match self {
            ViKey::Char(c) => c,
            ViKey::Ctrl(c) => ((c as u8).wrapping_sub(b'`')) as char,
            ViKey::Escape => '\u{1b}',
        }
    }
}

/// Input pattern of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    /// A specific character.
    Exact(char),
    /// A specific control chord.
    Ctrl(char),
    /// The escape key.
    Escape,
}

impl KeyMatch {
    fn matches(&self, key: ViKey) -> bool {
        match (self, key) {
            (KeyMatch::Exact(a), ViKey::Char(b)) => *a == b,
            (KeyMatch::Ctrl(a), ViKey::Ctrl(b)) => *a == b,
            (KeyMatch::Escape, ViKey::Escape) => true,
            _ => false,
        }
    }
}

/// Pre-transition work, run before the state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Nothing to do.
    None,
    /// Remember where insertion starts.
    BeginInsert,
    /// Commit pending inserted text to the buffer.
    FlushInsert,
    /// Anchor a new selection at the current line.
    BeginVisual,
    /// Capture the live selection for later '< '> addressing.
    CaptureSelection,
    /// Capture the selection and open an ex line primed with it.
    ExFromVisual,
}

/// One transition table entry.
#[derive(Debug)]
pub struct Transition {
    /// State the entry applies in.
    pub from: ViState,
    /// Input it consumes.
    pub on: KeyMatch,
    /// State after the transition.
    pub to: ViState,
    /// Hook to run before the state flips.
    pub hook: Hook,
}

const fn entry(from: ViState, on: KeyMatch, to: ViState, hook: Hook) -> Transition {
    Transition { from, on, to, hook }
}

/// The transition table. Scanned top to bottom; the first match wins.
pub static TRANSITIONS: &[Transition] = &[
    entry(
        ViState::Normal,
        KeyMatch::Exact('i'),
        ViState::Insert,
        Hook::BeginInsert,
    ),
    entry(
        ViState::Normal,
        KeyMatch::Exact('v'),
        ViState::Visual,
        Hook::BeginVisual,
    ),
    entry(
        ViState::Normal,
        KeyMatch::Exact('V'),
        ViState::VisualLine,
        Hook::BeginVisual,
    ),
    entry(
        ViState::Normal,
        KeyMatch::Ctrl('v'),
        ViState::VisualBlock,
        Hook::BeginVisual,
    ),
    entry(
        ViState::Insert,
        KeyMatch::Escape,
        ViState::Normal,
        Hook::FlushInsert,
    ),
    // Leaving a visual mode always settles the selection first.
    entry(
        ViState::Visual,
        KeyMatch::Escape,
        ViState::Normal,
        Hook::CaptureSelection,
    ),
    entry(
        ViState::VisualLine,
        KeyMatch::Escape,
        ViState::Normal,
        Hook::CaptureSelection,
    ),
    entry(
        ViState::VisualBlock,
        KeyMatch::Escape,
        ViState::Normal,
        Hook::CaptureSelection,
    ),
    // Re-pressing the mode key toggles the mode off; the other visual
    // keys switch in place without disturbing the anchor.
    entry(
        ViState::Visual,
        KeyMatch::Exact('v'),
        ViState::Normal,
        Hook::CaptureSelection,
    ),
    entry(
        ViState::Visual,
        KeyMatch::Exact('V'),
        ViState::VisualLine,
        Hook::None,
    ),
    entry(
        ViState::Visual,
        KeyMatch::Ctrl('v'),
        ViState::VisualBlock,
        Hook::None,
    ),
    entry(
        ViState::VisualLine,
        KeyMatch::Exact('V'),
        ViState::Normal,
        Hook::CaptureSelection,
    ),
    entry(
        ViState::VisualLine,
        KeyMatch::Exact('v'),
        ViState::Visual,
        Hook::None,
    ),
    entry(
        ViState::VisualLine,
        KeyMatch::Ctrl('v'),
        ViState::VisualBlock,
        Hook::None,
    ),
    entry(
        ViState::VisualBlock,
        KeyMatch::Ctrl('v'),
        ViState::Normal,
        Hook::CaptureSelection,
    ),
    entry(
        ViState::VisualBlock,
        KeyMatch::Exact('v'),
        ViState::Visual,
        Hook::None,
    ),
    entry(
        ViState::VisualBlock,
        KeyMatch::Exact('V'),
        ViState::VisualLine,
        Hook::None,
    ),
    // Ex entry from a visual mode leaves it, carrying the selection.
    entry(
        ViState::Visual,
        KeyMatch::Exact(':'),
        ViState::Normal,
        Hook::ExFromVisual,
    ),
    entry(
        ViState::VisualLine,
        KeyMatch::Exact(':'),
        ViState::Normal,
        Hook::ExFromVisual,
    ),
    entry(
        ViState::VisualBlock,
        KeyMatch::Exact(':'),
        ViState::Normal,
        Hook::ExFromVisual,
    ),
];

/// The mode machine. Holds only the current state; the interpreter owns
/// every side effect.
#[derive(Debug, Default)]
pub struct ViMachine {
    state: ViState,
}

impl ViMachine {
    /// Create a machine in NORMAL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ViState {
        self.state
    }

    /// Find the table entry for a key in the current state, if the key
    /// is a state-changing event.
    pub fn find(&self, key: ViKey) -> Option<&'static Transition> {
        TRANSITIONS
            .iter()
            .find(|t| t.from == self.state && t.on.matches(key))
    }

    /// True when the key is a state-changing event in the current
    /// state. Independent of whether the buffer side would veto the
    /// resulting edit.
    pub fn would_transition(&self, key: ViKey) -> bool {
        self.find(key).is_some()
    }

    /// Apply a previously found entry. The caller must have run the
    /// entry's hook already.
    pub fn apply(&mut self, entry: &Transition) {
        self.state = entry.to;
    }

    /// Force a state, for transitions initiated by ex commands.
    pub fn set_state(&mut self, state: ViState) {
        self.state = state;
    }
}
