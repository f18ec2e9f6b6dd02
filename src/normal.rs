//! Incremental key parser for NORMAL and VISUAL modes.
//!
//! Keys that are not in the mode transition table land here. The parser
//! accumulates count digits and pending two-key sequences (register
//! names for q and @, marker names for m and ') and emits a complete
//! action once one is recognized.

use crate::vi::ViKey;

/// A recognized normal-mode action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalAction {
    /// Input consumed, more keys needed.
    Pending,
    /// Move the cursor by whole lines.
    Move {
        /// Downward when true.
        down: bool,
        /// Repeat count.
        count: usize,
    },
    /// Open an ex command line.
    StartEx,
    /// Begin recording into a register.
    StartRecord(char),
    /// Close the active recording.
    StopRecord,
    /// Play a register.
    Play {
        /// Source register.
        register: char,
        /// Repeat count.
        count: usize,
    },
    /// Place a marker at the current line.
    SetMark(char),
    /// Jump to a marker.
    GotoMark(char),
    /// Key with no meaning here.
    Unknown(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    RecordRegister,
    PlayRegister,
    MarkSet,
    MarkGoto,
}

/// The parser. One per interpreter; reset clears partial input.
#[derive(Debug)]
pub struct NormalParser {
    count: usize,
    has_count: bool,
    pending: Pending,
}

impl Default for NormalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl NormalParser {
    /// Create a fresh parser.
    pub fn new() -> Self {
        Self {
            count: 0,
            has_count: false,
            pending: Pending::None,
        }
    }

    /// Drop any partial input.
    pub fn reset(&mut self) {
        self.count = 0;
        self.has_count = false;
        self.pending = Pending::None;
    }

    /// True when no partial sequence is in flight.
    pub fn is_ready(&self) -> bool {
        !self.has_count && self.pending == Pending::None
    }

    /// True when the next key is an argument to a pending two-key
    /// sequence (a register or marker name).
    pub fn awaiting_argument(&self) -> bool {
        self.pending != Pending::None
    }

    /// Feed one key. `recording` selects the stop-record meaning of q.
    pub fn push(&mut self, key: ViKey, recording: bool) -> NormalAction {
        let c = match key {
            ViKey::Escape => {
                self.reset();
                return NormalAction::Pending;
            }
            ViKey::Ctrl(c) => {
                self.reset();
                return NormalAction::Unknown(c);
            }
            ViKey::Char(c) => c,
        };

        match self.pending {
            Pending::RecordRegister => {
                self.reset();
                return NormalAction::StartRecord(c);
            }
            Pending::PlayRegister => {
                let count = self.take_count();
                self.reset();
                return NormalAction::Play { register: c, count };
            }
            Pending::MarkSet => {
                self.reset();
                return NormalAction::SetMark(c);
            }
            Pending::MarkGoto => {
                self.reset();
                return NormalAction::GotoMark(c);
            }
            Pending::None => {}
        }

        match c {
            // A leading 0 is not a count.
            '0'..='9' if c != '0' || self.has_count => {
                self.count = self.count * 10 + (c as usize - '0' as usize);
                self.has_count = true;
                NormalAction::Pending
            }
            'j' | 'k' => {
                let count = self.take_count();
                self.reset();
                NormalAction::Move {
                    down: c == 'j',
                    count,
                }
            }
            ':' => {
                self.reset();
                NormalAction::StartEx
            }
            'q' if recording => {
                self.reset();
                NormalAction::StopRecord
            }
            'q' => {
                self.pending = Pending::RecordRegister;
                NormalAction::Pending
            }
            '@' => {
                self.pending = Pending::PlayRegister;
                NormalAction::Pending
            }
            'm' => {
                self.pending = Pending::MarkSet;
                NormalAction::Pending
            }
            '\'' => {
                self.pending = Pending::MarkGoto;
                NormalAction::Pending
            }
            other => {
                self.reset();
                NormalAction::Unknown(other)
            }
        }
    }

    fn take_count(&mut self) -> usize {
        if self.has_count {
            self.count
        } else {
            1
        }
    }
}
